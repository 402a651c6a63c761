// modlink-common/src/pipeline.rs
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ModlinkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Resolve,
    Merge,
    Link,
    Launchers,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Resolve => "resolve",
            Self::Merge => "merge",
            Self::Link => "link",
            Self::Launchers => "launchers",
            Self::Publish => "publish",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    PipelineStarted {
        entry_count: usize,
    },
    StageStarted {
        stage: Stage,
    },
    EntryResolved {
        path: PathBuf,
        module: String,
        automatic: bool,
    },
    MergeFinished {
        module: String,
        requires: usize,
        exports: usize,
        uses: usize,
        provides: usize,
    },
    LinkStarted {
        root_modules: Vec<String>,
    },
    LauncherWritten {
        name: String,
        path: PathBuf,
    },
    PipelineFinished {
        output: PathBuf,
        duration_secs: f64,
    },
    PipelineFailed {
        error: String,
    },
    LogWarn {
        message: String,
    },
}

impl PipelineEvent {
    pub fn failed(error: &ModlinkError) -> Self {
        PipelineEvent::PipelineFailed {
            error: error.to_string(),
        }
    }
}

/// Shared abort signal, checked between pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Errors with `Cancelled` if the flag was raised before `next` starts.
    pub fn check(&self, next: Stage) -> Result<()> {
        if self.is_cancelled() {
            return Err(ModlinkError::Cancelled(next.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        assert!(flag.check(Stage::Link).is_ok());
        handle.cancel();
        let err = flag.check(Stage::Link).unwrap_err();
        assert_eq!(err.to_string(), "Build cancelled before link");
    }
}
