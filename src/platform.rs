//! Functions that wrap platform functionality such as reading bundled content.
mod fileio;

pub use fileio::*;
