// modlink-core/src/pipeline/mod.rs
pub mod assemble;
pub mod engine;
pub mod worker;

pub use assemble::{assemble_image, resolve_and_merge, BuildContext, BuildSummary};
pub use engine::{check_unique_names, resolve_module_path};
