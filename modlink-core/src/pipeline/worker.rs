// modlink-core/src/pipeline/worker.rs
use std::path::PathBuf;

use modlink_common::error::Result;
use modlink_common::model::ResolvedEntry;
use modlink_common::pipeline::PipelineEvent;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::module::resolve_entry;

/// One module path element waiting to be resolved. `index` is its position on
/// the module path and is used to put results back in order.
#[derive(Debug, Clone)]
pub struct ResolveJob {
    pub index: usize,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct ResolveOutcome {
    pub index: usize,
    pub path: PathBuf,
    pub result: Result<ResolvedEntry>,
}

#[instrument(skip_all, fields(index = job.index, entry = %job.path.display()))]
pub(super) fn execute_resolve_job(
    job: ResolveJob,
    event_tx: &broadcast::Sender<PipelineEvent>,
) -> ResolveOutcome {
    debug!("[{}] Resolving {}", job.index, job.path.display());
    let result = resolve_entry(&job.path);
    if let Ok(entry) = &result {
        let _ = event_tx.send(PipelineEvent::EntryResolved {
            path: entry.path.clone(),
            module: entry.module_name().to_string(),
            automatic: entry.is_automatic(),
        });
    }
    ResolveOutcome {
        index: job.index,
        path: job.path,
        result,
    }
}
