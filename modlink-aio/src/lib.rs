// modlink-aio/src/lib.rs
//! IO primitives for modlink (filesystem, module path entries, external processes)

pub mod archive;
pub mod fs;
pub mod process;

pub use archive::{write_jar, EntryArchive};
pub use fs::*;
pub use process::run_command;
