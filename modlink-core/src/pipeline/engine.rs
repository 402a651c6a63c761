// modlink-core/src/pipeline/engine.rs
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use crossbeam_channel::unbounded;
use modlink_common::error::{CollisionKind, ModlinkError, Result};
use modlink_common::model::ResolvedEntry;
use modlink_common::pipeline::PipelineEvent;
use threadpool::ThreadPool;
use tokio::sync::broadcast;
use tracing::{debug, error, instrument};

use super::worker::{self, ResolveJob, ResolveOutcome};

fn worker_count(jobs: usize) -> usize {
    std::cmp::max(1, num_cpus::get().saturating_sub(1))
        .min(8)
        .min(jobs.max(1))
}

/// Resolves every module path element on a bounded worker pool.
///
/// Results are returned in module path order whatever order the workers
/// finish in; the first failing entry in that order decides the error. A path
/// listed twice is resolved once. Two entries with the same module name are a
/// `NameCollision`.
#[instrument(skip_all, name = "resolve_pool", fields(entries = module_path.len()))]
pub fn resolve_module_path(
    module_path: &[PathBuf],
    event_tx: &broadcast::Sender<PipelineEvent>,
) -> Result<Vec<ResolvedEntry>> {
    let mut seen = HashSet::new();
    let jobs: Vec<ResolveJob> = module_path
        .iter()
        .filter(|path| {
            let fresh = seen.insert((*path).clone());
            if !fresh {
                debug!("Skipping repeated module path entry {}", path.display());
            }
            fresh
        })
        .enumerate()
        .map(|(index, path)| ResolveJob {
            index,
            path: path.clone(),
        })
        .collect();

    let num_workers = worker_count(jobs.len());
    let pool = ThreadPool::new(num_workers);
    debug!(
        "Resolving {} entries with {} workers.",
        jobs.len(),
        num_workers
    );

    let (outcome_tx, outcome_rx) = unbounded::<ResolveOutcome>();
    let job_count = jobs.len();
    for job in jobs {
        let outcome_tx = outcome_tx.clone();
        let event_tx = event_tx.clone();
        pool.execute(move || {
            let outcome = worker::execute_resolve_job(job, &event_tx);
            let _ = outcome_tx.send(outcome);
        });
    }
    drop(outcome_tx);
    pool.join();

    let mut outcomes: Vec<ResolveOutcome> = outcome_rx.iter().collect();
    if outcomes.len() != job_count {
        return Err(ModlinkError::Config(format!(
            "{} of {} resolution jobs did not report back",
            job_count - outcomes.len(),
            job_count
        )));
    }
    outcomes.sort_by_key(|o| o.index);

    let mut entries = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome.result {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                error!("Failed to resolve {}: {}", outcome.path.display(), e);
                return Err(e);
            }
        }
    }

    check_unique_names(&entries)?;
    Ok(entries)
}

/// Every module name must be declared by exactly one entry.
pub fn check_unique_names(entries: &[ResolvedEntry]) -> Result<()> {
    let mut by_name: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for entry in entries {
        by_name
            .entry(entry.module_name())
            .or_default()
            .push(entry.path.display().to_string());
    }
    if let Some((name, mut sources)) = by_name.into_iter().find(|(_, s)| s.len() > 1) {
        sources.sort();
        error!("Module '{}' is declared by {} entries", name, sources.len());
        return Err(ModlinkError::NameCollision {
            kind: CollisionKind::Module,
            name: name.to_string(),
            sources,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    use modlink_common::model::{DescriptorOrigin, EntryKind, ModuleDescriptor};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    fn plain_jar(dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file("org/lib/Impl.class", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"\xCA\xFE\xBA\xBE").unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn repeated_path_is_resolved_once() {
        let dir = TempDir::new().unwrap();
        let jar = plain_jar(dir.path(), "lib-1.0.jar");
        let (tx, mut rx) = broadcast::channel(16);

        let entries = resolve_module_path(&[jar.clone(), jar.clone()], &tx).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].module_name(), "lib");

        let mut resolved = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, PipelineEvent::EntryResolved { .. }) {
                resolved += 1;
            }
        }
        assert_eq!(resolved, 1);
    }

    #[test]
    fn earliest_failing_entry_decides_the_error() {
        let dir = TempDir::new().unwrap();
        let mut module_path = Vec::new();
        for i in 0..12 {
            let path = if i == 2 || i == 7 {
                let path = dir.path().join(format!("broken{i}.jar"));
                std::fs::write(&path, b"not a zip").unwrap();
                path
            } else {
                plain_jar(dir.path(), &format!("lib{i}-1.0.jar"))
            };
            module_path.push(path);
        }
        let (tx, _rx) = broadcast::channel(64);

        // Several rounds so workers finish in varying orders.
        for _ in 0..8 {
            match resolve_module_path(&module_path, &tx).unwrap_err() {
                ModlinkError::Archive(path, _) => assert_eq!(path, module_path[2]),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn collision_sources_are_sorted() {
        let entry = |path: &str| ResolvedEntry {
            path: PathBuf::from(path),
            kind: EntryKind::Jar,
            origin: DescriptorOrigin::Explicit,
            descriptor: ModuleDescriptor::new("b").unwrap(),
        };
        let err = check_unique_names(&[entry("/z/b.jar"), entry("/a/b.jar")]).unwrap_err();
        match err {
            ModlinkError::NameCollision {
                kind,
                name,
                sources,
            } => {
                assert_eq!(kind, CollisionKind::Module);
                assert_eq!(name, "b");
                assert_eq!(sources, ["/a/b.jar", "/z/b.jar"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
