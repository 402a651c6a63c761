// modlink-core/src/module/platform.rs
use std::collections::BTreeSet;
use std::path::Path;

use modlink_common::config::ImageConfig;
use tracing::{debug, warn};

/// Java SE and JDK modules of a current LTS runtime, used when neither the
/// configuration nor a `jmods` directory names the platform modules.
const BUILTIN_PLATFORM_MODULES: &[&str] = &[
    "java.base",
    "java.compiler",
    "java.datatransfer",
    "java.desktop",
    "java.instrument",
    "java.logging",
    "java.management",
    "java.management.rmi",
    "java.naming",
    "java.net.http",
    "java.prefs",
    "java.rmi",
    "java.scripting",
    "java.se",
    "java.security.jgss",
    "java.security.sasl",
    "java.smartcardio",
    "java.sql",
    "java.sql.rowset",
    "java.transaction.xa",
    "java.xml",
    "java.xml.crypto",
    "jdk.accessibility",
    "jdk.attach",
    "jdk.charsets",
    "jdk.compiler",
    "jdk.crypto.cryptoki",
    "jdk.crypto.ec",
    "jdk.dynalink",
    "jdk.editpad",
    "jdk.hotspot.agent",
    "jdk.httpserver",
    "jdk.incubator.vector",
    "jdk.internal.ed",
    "jdk.internal.jvmstat",
    "jdk.internal.le",
    "jdk.internal.opt",
    "jdk.jartool",
    "jdk.javadoc",
    "jdk.jcmd",
    "jdk.jconsole",
    "jdk.jdeps",
    "jdk.jdi",
    "jdk.jdwp.agent",
    "jdk.jfr",
    "jdk.jlink",
    "jdk.jpackage",
    "jdk.jshell",
    "jdk.jsobject",
    "jdk.jstatd",
    "jdk.localedata",
    "jdk.management",
    "jdk.management.agent",
    "jdk.management.jfr",
    "jdk.naming.dns",
    "jdk.naming.rmi",
    "jdk.net",
    "jdk.nio.mapmode",
    "jdk.random",
    "jdk.sctp",
    "jdk.security.auth",
    "jdk.security.jgss",
    "jdk.unsupported",
    "jdk.unsupported.desktop",
    "jdk.xml.dom",
    "jdk.zipfs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogueSource {
    Configured,
    Jmods,
    Builtin,
}

/// Names of the modules the target runtime can supply itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformModules {
    modules: BTreeSet<String>,
    source: CatalogueSource,
}

impl PlatformModules {
    pub fn from_config(config: &ImageConfig) -> Self {
        if let Some(modules) = config.platform_modules() {
            debug!("Using {} configured platform modules", modules.len());
            return Self {
                modules: modules.iter().cloned().collect(),
                source: CatalogueSource::Configured,
            };
        }
        if let Some(home) = config.java_home() {
            if let Some(catalogue) = Self::from_jmods(&home.join("jmods")) {
                return catalogue;
            }
        }
        Self::builtin()
    }

    /// Module names from `*.jmod` files, `None` if the directory is unusable.
    pub fn from_jmods(dir: &Path) -> Option<Self> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("No jmods directory at {}: {}", dir.display(), e);
                return None;
            }
        };
        let modules: BTreeSet<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_suffix(".jmod"))
                    .map(str::to_string)
            })
            .collect();
        if modules.is_empty() {
            warn!("{} contains no .jmod files, falling back to built-in platform modules", dir.display());
            return None;
        }
        debug!("Found {} platform modules in {}", modules.len(), dir.display());
        Some(Self {
            modules,
            source: CatalogueSource::Jmods,
        })
    }

    pub fn builtin() -> Self {
        Self {
            modules: BUILTIN_PLATFORM_MODULES.iter().map(|m| m.to_string()).collect(),
            source: CatalogueSource::Builtin,
        }
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    pub fn source(&self) -> CatalogueSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PlatformModules {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            modules: iter.into_iter().map(Into::into).collect(),
            source: CatalogueSource::Configured,
        }
    }
}
