// modlink-core/src/link/jlink.rs
use std::path::{Path, PathBuf};

use modlink_aio::run_command;
use modlink_common::config::ImageConfig;
use modlink_common::error::{LinkFailureKind, ModlinkError, Result};
use tracing::{debug, error, instrument};

use super::diagnostic::classify_linker_output;
use super::{LinkPlan, Linker};

#[derive(Debug, Clone)]
pub struct JlinkLinker {
    binary: PathBuf,
}

impl JlinkLinker {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Finds jlink: `MODLINK_JLINK`, then `<java_home>/bin`, then `PATH`.
    pub fn locate(config: &ImageConfig) -> Result<Self> {
        if let Some(binary) = config.jlink_binary() {
            debug!("Using jlink from MODLINK_JLINK: {}", binary.display());
            return Ok(Self::new(binary));
        }
        if let Some(home) = config.java_home() {
            let candidate = home.join("bin").join(executable_name());
            if candidate.is_file() {
                debug!("Using jlink from java home: {}", candidate.display());
                return Ok(Self::new(candidate));
            }
            debug!("No jlink at {}", candidate.display());
        }
        match which::which("jlink") {
            Ok(path) => {
                debug!("Using jlink from PATH: {}", path.display());
                Ok(Self::new(path))
            }
            Err(e) => {
                error!("jlink could not be located: {}", e);
                Err(ModlinkError::LinkFailure {
                    kind: LinkFailureKind::ToolNotFound,
                    diagnostic: "jlink not found; set java_home, JAVA_HOME or MODLINK_JLINK"
                        .to_string(),
                })
            }
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

fn executable_name() -> &'static str {
    if cfg!(windows) {
        "jlink.exe"
    } else {
        "jlink"
    }
}

impl Linker for JlinkLinker {
    fn name(&self) -> &str {
        "jlink"
    }

    #[instrument(skip_all, fields(roots = plan.root_modules.len()))]
    fn link(&self, plan: &LinkPlan, image_dir: &Path) -> Result<()> {
        let args = plan.to_args(image_dir)?;
        let output = run_command(&self.binary, &args, None, None)?;
        if output.status.success() {
            debug!("jlink wrote {}", image_dir.display());
            return Ok(());
        }

        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        let err = plan.attribute(classify_linker_output(&text));
        error!("jlink failed ({}): {}", output.status, err);
        Err(err)
    }
}
