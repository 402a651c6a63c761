// modlink-common/src/model/launcher.rs
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CollisionKind, ModlinkError, Result};

/// Executables a runtime image can ship in `bin/`. A launcher script of the
/// same name would replace the tool.
const RUNTIME_TOOLS: &[&str] = &[
    "jar", "jarsigner", "java", "javac", "javadoc", "javap", "javaw", "jcmd", "jconsole", "jdb",
    "jdeprscan", "jdeps", "jfr", "jhsdb", "jimage", "jinfo", "jlink", "jmap", "jmod", "jpackage",
    "jps", "jrunscript", "jshell", "jstack", "jstat", "jstatd", "jwebserver", "keytool", "kinit",
    "klist", "ktab", "rmiregistry", "serialver",
];

fn is_runtime_tool(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let stem = lower.strip_suffix(".exe").unwrap_or(&lower);
    RUNTIME_TOOLS.contains(&stem)
}

/// One generated entry point of the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherSpec {
    name: String,
    module_name: Option<String>,
    main_class: String,
    jvm_args: Vec<String>,
    console: bool,
}

impl LauncherSpec {
    pub fn builder(name: impl Into<String>) -> LauncherSpecBuilder {
        LauncherSpecBuilder {
            name: name.into(),
            module_name: None,
            main_class: None,
            jvm_args: Vec::new(),
            console: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module named on the launcher itself, if any.
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Module the launcher starts: its own, else the image's default module.
    pub fn target_module<'a>(&'a self, default_module: &'a str) -> &'a str {
        self.module_name.as_deref().unwrap_or(default_module)
    }

    pub fn main_class(&self) -> &str {
        &self.main_class
    }

    pub fn jvm_args(&self) -> &[String] {
        &self.jvm_args
    }

    pub fn console(&self) -> bool {
        self.console
    }
}

#[derive(Debug, Clone)]
pub struct LauncherSpecBuilder {
    name: String,
    module_name: Option<String>,
    main_class: Option<String>,
    jvm_args: Vec<String>,
    console: bool,
}

impl LauncherSpecBuilder {
    pub fn module_name(mut self, module: impl Into<String>) -> Self {
        self.module_name = Some(module.into());
        self
    }

    pub fn main_class(mut self, main_class: impl Into<String>) -> Self {
        self.main_class = Some(main_class.into());
        self
    }

    pub fn jvm_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jvm_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn no_console(mut self, no_console: bool) -> Self {
        self.console = !no_console;
        self
    }

    pub fn build(self) -> Result<LauncherSpec> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ModlinkError::Config(
                "launcher name must not be empty".to_string(),
            ));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ModlinkError::Config(format!(
                "launcher name '{name}' must be a plain file name"
            )));
        }
        if is_runtime_tool(&name) {
            return Err(ModlinkError::Config(format!(
                "launcher name '{name}' is taken by a runtime tool in bin/"
            )));
        }
        let main_class = match self.main_class {
            Some(class) if !class.trim().is_empty() => class.trim().to_string(),
            _ => {
                return Err(ModlinkError::Config(format!(
                    "launcher '{name}' has no main class"
                )))
            }
        };
        let module_name = self
            .module_name
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        Ok(LauncherSpec {
            name,
            module_name,
            main_class,
            jvm_args: self.jvm_args,
            console: self.console,
        })
    }
}

/// The primary launcher plus secondary launchers keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launchers {
    primary: LauncherSpec,
    secondary: BTreeMap<String, LauncherSpec>,
}

impl Launchers {
    /// Fails with a launcher `NameCollision` if any two launchers share a name.
    pub fn new(primary: LauncherSpec, secondary: Vec<LauncherSpec>) -> Result<Self> {
        let mut by_name: BTreeMap<String, LauncherSpec> = BTreeMap::new();
        for launcher in secondary {
            if launcher.name == primary.name || by_name.contains_key(&launcher.name) {
                let first = if launcher.name == primary.name {
                    "launcher"
                } else {
                    "secondary_launcher"
                };
                return Err(ModlinkError::NameCollision {
                    kind: CollisionKind::Launcher,
                    name: launcher.name.clone(),
                    sources: vec![first.to_string(), "secondary_launcher".to_string()],
                });
            }
            by_name.insert(launcher.name.clone(), launcher);
        }
        Ok(Self {
            primary,
            secondary: by_name,
        })
    }

    pub fn primary(&self) -> &LauncherSpec {
        &self.primary
    }

    /// Primary first, then secondaries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &LauncherSpec> {
        std::iter::once(&self.primary).chain(self.secondary.values())
    }

    pub fn len(&self) -> usize {
        1 + self.secondary.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
