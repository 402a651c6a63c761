// modlink/src/cli/status.rs
use colored::*;
use modlink_common::pipeline::{PipelineEvent, Stage};
use tokio::sync::broadcast;
use tracing::debug;

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Resolve => "Resolving module path",
        Stage::Merge => "Merging module descriptors",
        Stage::Link => "Linking runtime image",
        Stage::Launchers => "Writing launchers",
        Stage::Publish => "Publishing image",
    }
}

fn render(event: &PipelineEvent) -> Option<String> {
    let line = match event {
        PipelineEvent::PipelineStarted { entry_count } => format!(
            "{}{} {}",
            "==> ".bold().blue(),
            "Assembling image from".bold(),
            format!("{entry_count} entries").cyan()
        ),
        PipelineEvent::StageStarted { stage } => {
            format!("{}{}", "==> ".bold().blue(), stage_label(*stage).bold())
        }
        PipelineEvent::EntryResolved {
            path,
            module,
            automatic,
        } => {
            let kind = if *automatic {
                "automatic".yellow()
            } else {
                "explicit".green()
            };
            format!(
                "  {} {} ({}) {}",
                "✓".green(),
                module.cyan(),
                kind,
                path.display().to_string().dimmed()
            )
        }
        PipelineEvent::MergeFinished {
            module,
            requires,
            exports,
            uses,
            provides,
        } => format!(
            "  {} {}: {} requires, {} exports, {} uses, {} provides",
            "✓".green(),
            module.cyan(),
            requires,
            exports,
            uses,
            provides
        ),
        PipelineEvent::LinkStarted { root_modules } => format!(
            "  {} {}",
            "roots:".dimmed(),
            root_modules.join(", ")
        ),
        PipelineEvent::LauncherWritten { name, path } => format!(
            "  {} {} {}",
            "✓".green(),
            name.cyan(),
            path.display().to_string().dimmed()
        ),
        PipelineEvent::PipelineFinished {
            output,
            duration_secs,
        } => format!(
            "{}{} {} {}",
            "==> ".bold().green(),
            "Image written to".bold(),
            output.display().to_string().cyan(),
            format!("({duration_secs:.1}s)").dimmed()
        ),
        PipelineEvent::PipelineFailed { error } => {
            format!("{} {}", "✗ Build failed:".red().bold(), error)
        }
        PipelineEvent::LogWarn { message } => format!("{} {}", "Warning:".yellow(), message),
    };
    Some(line)
}

/// Prints pipeline events until every sender is gone.
pub async fn handle_events(mut event_rx: broadcast::Receiver<PipelineEvent>) {
    loop {
        match event_rx.recv().await {
            Ok(event) => {
                if let Some(line) = render(&event) {
                    if matches!(event, PipelineEvent::PipelineFailed { .. }) {
                        eprintln!("{line}");
                    } else {
                        println!("{line}");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Status display lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
