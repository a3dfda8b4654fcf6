use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

/// Find `file_path` on disk. Paths that do not exist relative to the working
/// directory are looked up in the content directory bundled at build time.
pub fn resolve_content_path<P>(file_path: P) -> PathBuf
where
    P: AsRef<Path>,
{
    let file_path = file_path.as_ref();

    if file_path.is_absolute() || file_path.exists() {
        file_path.to_path_buf()
    } else {
        bundled_content_dir().join(file_path)
    }
}

/// The `content/` directory copied into `OUT_DIR` by the build script.
pub fn bundled_content_dir() -> PathBuf {
    Path::new(env!("OUT_DIR")).join("content")
}

/// Loads a file and returns it as a string. See `resolve_content_path` for
/// how relative paths are found.
pub async fn load_as_string<P>(file_path: P) -> anyhow::Result<String>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    info!("load file as string: {file_path:?}");

    let full_path = resolve_content_path(&file_path);
    std::fs::read_to_string(&full_path)
        .with_context(|| format!("failed to read {}", full_path.display()))
}

/// Loads a file and returns it as a vector of bytes. See
/// `resolve_content_path` for how relative paths are found.
pub async fn load_as_binary<P>(file_path: P) -> anyhow::Result<Vec<u8>>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    info!("load file as binary: {file_path:?}");

    let full_path = resolve_content_path(&file_path);
    std::fs::read(&full_path).with_context(|| format!("failed to read {}", full_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_missing_paths_use_bundled_content() {
        let resolved = resolve_content_path("models/not-next-to-the-working-dir.obj");
        assert!(resolved.starts_with(bundled_content_dir()));
    }

    #[test]
    fn bundled_model_can_be_read() {
        let text = pollster::block_on(load_as_string("models/icosahedron.obj")).unwrap();
        assert!(text.lines().any(|l| l.starts_with("f ")));
    }

    #[test]
    fn missing_file_error_names_the_path() {
        let err = pollster::block_on(load_as_binary("/no/such/lumen/file.bin")).unwrap_err();
        assert!(format!("{err:#}").contains("/no/such/lumen/file.bin"));
    }
}
