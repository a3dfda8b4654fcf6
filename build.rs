use std::env;

use anyhow::*;
use fs_extra::{copy_items, dir::CopyOptions};

fn main() -> Result<()> {
    // Re-run when the bundled demo content changes.
    println!("cargo:rerun-if-changed=content/*");

    // Bundled content is read from `OUT_DIR/content` when a relative path does
    // not exist next to the working directory.
    let out_dir = env::var("OUT_DIR")?;

    let copy_options = CopyOptions::new().overwrite(true);
    copy_items(&["content/"], out_dir, &copy_options)?;

    Ok(())
}
