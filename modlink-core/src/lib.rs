// modlink-core/src/lib.rs
pub mod emit;
pub mod launcher;
pub mod link;
pub mod merge;
pub mod module;
pub mod pipeline;

pub use link::{JlinkLinker, LinkPlan, Linker, PlanLinker};
pub use merge::merge_entries;
pub use module::{resolve_entry, PlatformModules};
pub use pipeline::{assemble_image, resolve_and_merge, BuildContext, BuildSummary};
