// modlink-common/src/lib.rs
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;

// Re-export key types
pub use config::ImageConfig;
pub use error::{ModlinkError, Result};
pub use model::{
    ExclusionRuleSet, LauncherSpec, MergedModule, ModuleDescriptor, RequiresModifiers,
    ResolvedEntry,
};
pub use pipeline::{CancellationFlag, PipelineEvent, Stage};
