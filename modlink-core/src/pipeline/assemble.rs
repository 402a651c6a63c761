// modlink-core/src/pipeline/assemble.rs
use std::path::PathBuf;
use std::time::Instant;

use modlink_aio::{publish_directory, staging_dir_for};
use modlink_common::config::ImageConfig;
use modlink_common::error::Result;
use modlink_common::model::{MergedModule, ResolvedEntry};
use modlink_common::pipeline::{CancellationFlag, PipelineEvent, Stage};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

use super::engine::resolve_module_path;
use crate::emit::emit_merged_module;
use crate::launcher::{validate_launchers, write_launchers, BIN_DIR};
use crate::link::{write_link_modules, LinkPlan, Linker};
use crate::merge::merge_entries;
use crate::module::PlatformModules;

/// Staging subdirectory holding the jars written for the linker.
const MODULES_DIR: &str = "modules";

/// What one `assemble_image` call needs besides the configuration.
pub struct BuildContext<'a> {
    pub config: &'a ImageConfig,
    pub linker: &'a dyn Linker,
    pub cancel: CancellationFlag,
    pub event_tx: broadcast::Sender<PipelineEvent>,
}

impl<'a> BuildContext<'a> {
    pub fn new(config: &'a ImageConfig, linker: &'a dyn Linker) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            linker,
            cancel: CancellationFlag::new(),
            event_tx,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, event_tx: broadcast::Sender<PipelineEvent>) -> Self {
        self.event_tx = event_tx;
        self
    }

    fn emit(&self, event: PipelineEvent) {
        let _ = self.event_tx.send(event);
    }

    fn enter(&self, stage: Stage) -> Result<()> {
        self.cancel.check(stage)?;
        debug!("Entering stage {}", stage);
        self.emit(PipelineEvent::StageStarted { stage });
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub output: PathBuf,
    pub merged: MergedModule,
    pub launchers: Vec<PathBuf>,
    pub emitted: Vec<PathBuf>,
}

/// Reader and Synthesizer over the module path, then the Merger.
pub fn resolve_and_merge(
    config: &ImageConfig,
    event_tx: &broadcast::Sender<PipelineEvent>,
) -> Result<(Vec<ResolvedEntry>, MergedModule)> {
    let entries = resolve_module_path(config.module_path(), event_tx)?;
    let merged = merge_resolved(config, &entries)?;
    Ok((entries, merged))
}

fn merge_resolved(config: &ImageConfig, entries: &[ResolvedEntry]) -> Result<MergedModule> {
    let platform = PlatformModules::from_config(config);
    debug!(
        "Platform catalogue: {} modules ({:?})",
        platform.len(),
        platform.source()
    );
    merge_entries(
        entries,
        config.exclusions(),
        config.merged_module_name(),
        &platform,
    )
}

/// Runs the whole build. The image is assembled in a staging directory beside
/// the output and only moved into place once every stage has succeeded.
#[instrument(skip_all, fields(module = ctx.config.module_name(), linker = ctx.linker.name()))]
pub fn assemble_image(ctx: &BuildContext<'_>) -> Result<BuildSummary> {
    let started = Instant::now();
    ctx.emit(PipelineEvent::PipelineStarted {
        entry_count: ctx.config.module_path().len(),
    });

    match run_stages(ctx) {
        Ok(summary) => {
            let duration_secs = started.elapsed().as_secs_f64();
            info!(
                "Image for '{}' written to {}",
                ctx.config.module_name(),
                summary.output.display()
            );
            ctx.emit(PipelineEvent::PipelineFinished {
                output: summary.output.clone(),
                duration_secs,
            });
            Ok(summary)
        }
        Err(e) => {
            error!("Build failed: {}", e);
            ctx.emit(PipelineEvent::failed(&e));
            Err(e)
        }
    }
}

fn run_stages(ctx: &BuildContext<'_>) -> Result<BuildSummary> {
    let config = ctx.config;

    ctx.enter(Stage::Resolve)?;
    let entries = resolve_module_path(config.module_path(), &ctx.event_tx)?;

    ctx.enter(Stage::Merge)?;
    let merged = merge_resolved(config, &entries)?;
    ctx.emit(PipelineEvent::MergeFinished {
        module: merged.name().to_string(),
        requires: merged.descriptor.requires.len(),
        exports: merged.descriptor.exports.len(),
        uses: merged.descriptor.uses.len(),
        provides: merged.descriptor.provides.len(),
    });
    validate_launchers(config, &merged)?;

    ctx.enter(Stage::Link)?;
    let staging = staging_dir_for(config.output_dir())?;
    let image_dir = staging.path().join("image");
    let modules = write_link_modules(&staging.path().join(MODULES_DIR), &entries, &merged)?;
    let plan = LinkPlan::new(config, &entries, &merged, &modules);
    ctx.emit(PipelineEvent::LinkStarted {
        root_modules: plan.root_modules.clone(),
    });
    ctx.linker.link(&plan, &image_dir)?;

    ctx.enter(Stage::Launchers)?;
    write_launchers(&image_dir, config, &plan.launchers)?;
    let launcher_paths: Vec<PathBuf> = config
        .launchers()
        .iter()
        .map(|l| config.output_dir().join(BIN_DIR).join(l.name()))
        .collect();
    for (spec, path) in config.launchers().iter().zip(&launcher_paths) {
        ctx.emit(PipelineEvent::LauncherWritten {
            name: spec.name().to_string(),
            path: path.clone(),
        });
    }

    ctx.enter(Stage::Publish)?;
    publish_directory(&image_dir, config.output_dir())?;
    drop(staging);
    // Only a published image gets its merged descriptor written out.
    let emitted = match config.emit_dir() {
        Some(dir) => emit_merged_module(dir, &merged)?,
        None => Vec::new(),
    };

    Ok(BuildSummary {
        output: config.output_dir().to_path_buf(),
        merged,
        launchers: launcher_paths,
        emitted,
    })
}
