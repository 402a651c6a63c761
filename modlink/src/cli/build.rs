// modlink/src/cli/build.rs
use std::path::PathBuf;

use clap::Args;
use modlink_common::error::{ModlinkError, Result};
use modlink_common::pipeline::{CancellationFlag, PipelineEvent};
use modlink_common::ImageConfig;
use modlink_core::link::{JlinkLinker, Linker, PlanLinker};
use modlink_core::{assemble_image, BuildContext};
use tokio::sync::broadcast;
use tracing::{debug, error, instrument, warn};

const EVENT_CHANNEL_SIZE: usize = 256;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Write the image here instead of the configured output
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Record the link plan as link-plan.json instead of running jlink
    #[arg(long)]
    pub dry_run: bool,
}

impl BuildArgs {
    #[instrument(skip_all, fields(dry_run = self.dry_run))]
    pub async fn run(&self, config: &ImageConfig) -> Result<()> {
        let config = match &self.output {
            Some(output) => config.with_output_dir(output),
            None => config.clone(),
        };
        let linker: Box<dyn Linker> = if self.dry_run {
            Box::new(PlanLinker)
        } else {
            Box::new(JlinkLinker::locate(&config)?)
        };

        let (event_tx, _event_rx) = broadcast::channel::<PipelineEvent>(EVENT_CHANNEL_SIZE);
        let status_handle = tokio::spawn(super::status::handle_events(event_tx.subscribe()));

        let cancel = CancellationFlag::new();
        let signal_cancel = cancel.clone();
        let signal_tx = event_tx.clone();
        let signal_handle = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current stage");
                let _ = signal_tx.send(PipelineEvent::LogWarn {
                    message: "Interrupted; stopping after the current stage".to_string(),
                });
                signal_cancel.cancel();
            }
        });

        let pipeline_tx = event_tx.clone();
        let result = tokio::task::spawn_blocking(move || {
            let ctx = BuildContext::new(&config, linker.as_ref())
                .with_cancellation(cancel)
                .with_events(pipeline_tx);
            assemble_image(&ctx).map(|_| ())
        })
        .await
        .map_err(|e| {
            error!("Build task failed to complete: {}", e);
            ModlinkError::Config(format!("build task failed: {e}"))
        })?;

        signal_handle.abort();
        drop(event_tx);
        if let Err(join_err) = status_handle.await {
            error!("Status task join error: {}", join_err);
        }
        debug!("Build command finished, ok: {}", result.is_ok());
        result
    }
}
