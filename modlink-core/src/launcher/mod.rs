// modlink-core/src/launcher/mod.rs
//! Launcher Generator: one start script per configured launcher under `bin/`.

use std::path::{Path, PathBuf};

use modlink_aio::{set_permissions, write_file};
use modlink_common::config::ImageConfig;
use modlink_common::error::{ModlinkError, Result};
use modlink_common::model::{LauncherSpec, MergedModule};
use tracing::{debug, error, instrument};

use crate::link::LaunchTarget;

pub const BIN_DIR: &str = "bin";

/// Checks every launcher's module against the merged module set. Each
/// launcher is checked on its own; a secondary launcher does not inherit the
/// primary's module.
pub fn validate_launchers(config: &ImageConfig, merged: &MergedModule) -> Result<()> {
    for launcher in config.launchers().iter() {
        let module = launcher.target_module(config.module_name());
        let retained = config.additional_modules().iter().any(|m| m == module);
        if !merged.contains_module(module) && !retained {
            error!(
                "Launcher '{}' targets module '{}' which is not in the image",
                launcher.name(),
                module
            );
            return Err(ModlinkError::UnknownLauncherTarget {
                launcher: launcher.name().to_string(),
                module: module.to_string(),
            });
        }
    }
    Ok(())
}

fn is_shell_safe(arg: &str) -> bool {
    !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.:=+/,@%".contains(c))
}

fn shell_quote(arg: &str) -> String {
    if is_shell_safe(arg) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn batch_quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '&', '|', '<', '>', '^', '"']) {
        arg.to_string()
    } else {
        format!("\"{}\"", arg.replace('"', "\"\""))
    }
}

fn java_arguments(spec: &LauncherSpec, module: &str, quote: fn(&str) -> String) -> String {
    let mut args: Vec<String> = spec.jvm_args().iter().map(|a| quote(a)).collect();
    args.push("-m".to_string());
    args.push(quote(&format!("{module}/{}", spec.main_class())));
    args.join(" ")
}

/// POSIX shell launcher. Without a console the JVM is detached with `nohup`.
pub fn render_unix_launcher(spec: &LauncherSpec, module: &str) -> String {
    let args = java_arguments(spec, module, shell_quote);
    let mut script = String::from("#!/bin/sh\nDIR=\"$(cd \"$(dirname \"$0\")\" && pwd)\"\n");
    if spec.console() {
        script.push_str(&format!("exec \"$DIR/java\" {args} \"$@\"\n"));
    } else {
        script.push_str(&format!(
            "nohup \"$DIR/java\" {args} \"$@\" >/dev/null 2>&1 &\n"
        ));
    }
    script
}

/// Windows batch launcher. Without a console `javaw` is started detached.
pub fn render_windows_launcher(spec: &LauncherSpec, module: &str) -> String {
    let args = java_arguments(spec, module, batch_quote);
    let command = if spec.console() {
        format!("\"%DIR%java\" {args} %*")
    } else {
        format!("start \"\" \"%DIR%javaw\" {args} %*")
    };
    ["@echo off", "set \"DIR=%~dp0\"", command.as_str(), ""].join("\r\n")
}

/// Writes `bin/<name>` and `bin/<name>.bat` for every launcher. The module
/// each script starts is the one the link plan chose for that launcher.
#[instrument(skip_all, fields(image = %image_dir.display()))]
pub fn write_launchers(
    image_dir: &Path,
    config: &ImageConfig,
    targets: &[LaunchTarget],
) -> Result<Vec<PathBuf>> {
    let bin = image_dir.join(BIN_DIR);
    let mut written = Vec::new();
    for spec in config.launchers().iter() {
        let module = targets
            .iter()
            .find(|t| t.name == spec.name())
            .map(|t| t.module.as_str())
            .unwrap_or_else(|| spec.target_module(config.module_name()));

        let unix = bin.join(spec.name());
        write_file(&unix, render_unix_launcher(spec, module).as_bytes())?;
        set_permissions(&unix, 0o755)?;

        let windows = bin.join(format!("{}.bat", spec.name()));
        write_file(&windows, render_windows_launcher(spec, module).as_bytes())?;

        debug!(
            "Wrote launcher '{}' for {}/{}",
            spec.name(),
            module,
            spec.main_class()
        );
        written.push(unix);
        written.push(windows);
    }
    Ok(written)
}
