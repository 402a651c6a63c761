// modlink/src/cli/describe.rs
use std::sync::Arc;

use clap::Args;
use modlink_common::error::Result;
use modlink_common::ImageConfig;
use modlink_core::pipeline::resolve_module_path;
use tokio::sync::broadcast;
use tracing::instrument;

#[derive(Args, Debug)]
pub struct Describe {
    /// Print the entries on one line
    #[arg(long)]
    pub compact: bool,
}

impl Describe {
    #[instrument(skip_all)]
    pub async fn run(&self, config: &ImageConfig) -> Result<()> {
        let (event_tx, _event_rx) = broadcast::channel(16);
        let entries = resolve_module_path(config.module_path(), &event_tx)?;
        let json = if self.compact {
            serde_json::to_string(&entries)
        } else {
            serde_json::to_string_pretty(&entries)
        }
        .map_err(Arc::new)?;
        println!("{json}");
        Ok(())
    }
}
