// modlink-core/src/link/mod.rs
//! Boundary to the platform module linker.

pub mod diagnostic;
pub mod jlink;
pub mod modules;
pub mod plan;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use modlink_common::config::ImageConfig;
use modlink_common::error::{ModlinkError, Result};
use modlink_common::model::{MergedModule, ResolvedEntry};
use serde::{Deserialize, Serialize};

pub use diagnostic::classify_linker_output;
pub use jlink::JlinkLinker;
pub use modules::{write_link_modules, LinkModules};
pub use plan::PlanLinker;

/// Options modlink passes itself; user-supplied copies are dropped.
const MANAGED_OPTIONS: &[&str] = &["--output", "--module-path", "-p", "--add-modules", "--launcher"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchTarget {
    pub name: String,
    pub module: String,
    pub main_class: String,
}

/// Everything the linker is told about one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPlan {
    pub module_path: Vec<PathBuf>,
    pub root_modules: Vec<String>,
    pub launchers: Vec<LaunchTarget>,
    pub options: Vec<String>,
    /// Final location of the image, not the staging directory it is built in.
    pub output: PathBuf,
    /// Module path entries behind each linked module.
    #[serde(default)]
    pub sources: BTreeMap<String, Vec<PathBuf>>,
}

impl LinkPlan {
    /// Explicit entries keep their place on the module path; automatic ones are
    /// linked through `modules` instead.
    pub fn new(
        config: &ImageConfig,
        entries: &[ResolvedEntry],
        merged: &MergedModule,
        modules: &LinkModules,
    ) -> Self {
        let mut module_path = Vec::new();
        let mut sources: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for entry in entries {
            sources
                .entry(entry.module_name().to_string())
                .or_default()
                .push(entry.path.clone());
            if modules.replaces(entry.module_name()) {
                sources
                    .entry(merged.name().to_string())
                    .or_default()
                    .push(entry.path.clone());
            } else {
                module_path.push(entry.path.clone());
            }
        }
        module_path.extend(modules.jars().cloned());
        if let Some(home) = config.java_home() {
            let jmods = home.join("jmods");
            if jmods.is_dir() {
                module_path.push(jmods);
            }
        }

        let mut roots = merged.root_modules();
        roots.retain(|m| !modules.replaces(m));
        if modules.merged_jar.is_some() {
            roots.insert(merged.name().to_string());
        }
        roots.extend(config.additional_modules().iter().cloned());

        let launchers = config
            .launchers()
            .iter()
            .map(|l| {
                let target = l.target_module(config.module_name());
                let module = if modules.replaces(target) {
                    merged.name()
                } else {
                    target
                };
                LaunchTarget {
                    name: l.name().to_string(),
                    module: module.to_string(),
                    main_class: l.main_class().to_string(),
                }
            })
            .collect();

        let options = config
            .jlink_options()
            .iter()
            .filter(|o| {
                !MANAGED_OPTIONS.contains(&o.split('=').next().unwrap_or_default())
            })
            .cloned()
            .collect();

        Self {
            module_path,
            root_modules: roots.into_iter().collect(),
            launchers,
            options,
            output: config.output_dir().to_path_buf(),
            sources,
        }
    }

    /// Adds the entries behind the modules a duplicate package error names.
    pub fn attribute(&self, err: ModlinkError) -> ModlinkError {
        match err {
            ModlinkError::DuplicatePackage {
                package, modules, ..
            } => {
                let sources = modules
                    .iter()
                    .filter_map(|m| self.sources.get(m))
                    .flatten()
                    .cloned()
                    .collect();
                ModlinkError::DuplicatePackage {
                    package,
                    modules,
                    sources,
                }
            }
            other => other,
        }
    }

    /// Command line for `jlink`, writing the image to `image_dir`.
    pub fn to_args(&self, image_dir: &Path) -> Result<Vec<OsString>> {
        let module_path = std::env::join_paths(&self.module_path).map_err(|e| {
            ModlinkError::Config(format!("module path cannot be passed to the linker: {e}"))
        })?;
        let mut args: Vec<OsString> = vec![
            "--module-path".into(),
            module_path,
            "--add-modules".into(),
            self.root_modules.join(",").into(),
        ];
        for launcher in &self.launchers {
            args.push("--launcher".into());
            args.push(
                format!(
                    "{}={}/{}",
                    launcher.name, launcher.module, launcher.main_class
                )
                .into(),
            );
        }
        args.extend(self.options.iter().map(OsString::from));
        args.push("--output".into());
        args.push(image_dir.as_os_str().to_os_string());
        Ok(args)
    }
}

/// Produces a runtime image in `image_dir`, which must not exist yet.
pub trait Linker: Send + Sync {
    fn name(&self) -> &str;

    fn link(&self, plan: &LinkPlan, image_dir: &Path) -> Result<()>;
}
