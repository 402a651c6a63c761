// modlink-common/src/model/mod.rs
pub mod descriptor;
pub mod entry;
pub mod exclusion;
pub mod launcher;
pub mod merged;

pub use descriptor::{ModuleDescriptor, RequiresModifiers};
pub use entry::{DescriptorOrigin, EntryKind, NameSource, ResolvedEntry};
pub use exclusion::{ExcludeProvides, ExclusionRuleSet, ServicePattern};
pub use launcher::{LauncherSpec, Launchers};
pub use merged::MergedModule;
