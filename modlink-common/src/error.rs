use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// What kind of name clashed in a `NameCollision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    Module,
    Launcher,
}

impl fmt::Display for CollisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module => write!(f, "module"),
            Self::Launcher => write!(f, "launcher"),
        }
    }
}

/// One link of the chain that led to a conflicting declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub module: String,
    pub source: PathBuf,
}

impl fmt::Display for Contributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.module, self.source.display())
    }
}

/// Classified jlink failures that are not a duplicate package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFailureKind {
    MissingModule,
    UnresolvedService,
    AutomaticModule,
    ToolNotFound,
    Other,
}

impl fmt::Display for LinkFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::MissingModule => "missing module",
            Self::UnresolvedService => "unresolvable service",
            Self::AutomaticModule => "automatic module not linkable",
            Self::ToolNotFound => "linker not found",
            Self::Other => "linker error",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone)]
pub enum ModlinkError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("JSON Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Archive Error in {0}: {1}")]
    Archive(PathBuf, String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Not a module: {0}")]
    NotAModule(PathBuf),

    #[error("Malformed module-info in {0}: {1}")]
    ClassFormat(PathBuf, String),

    #[error("Name collision: {kind} '{name}' is declared by {}", join(.sources))]
    NameCollision {
        kind: CollisionKind,
        name: String,
        sources: Vec<String>,
    },

    #[error("Unresolved dependency: module '{module}' not found, required by {}", join(.required_by))]
    UnresolvedDependency {
        module: String,
        required_by: Vec<Contributor>,
    },

    #[error("Unknown launcher target: launcher '{launcher}' refers to module '{module}' which is not part of the image")]
    UnknownLauncherTarget { launcher: String, module: String },

    #[error("Duplicate package '{package}' in modules {}{}", .modules.join(", "), from_entries(.sources))]
    DuplicatePackage {
        package: String,
        modules: Vec<String>,
        sources: Vec<PathBuf>,
    },

    #[error("Link failure ({kind}): {diagnostic}")]
    LinkFailure {
        kind: LinkFailureKind,
        diagnostic: String,
    },

    #[error("Filesystem Error at {0}: {1}")]
    Filesystem(PathBuf, String),

    #[error("Build cancelled before {0}")]
    Cancelled(String),
}

fn from_entries(sources: &[PathBuf]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let paths: Vec<String> = sources.iter().map(|p| p.display().to_string()).collect();
    format!(" (from {})", paths.join(", "))
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" <- ")
}

/// Exit code families of the `modlink` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Resolution,
    MergeValidation,
    Link,
    Filesystem,
    Cancelled,
}

impl ErrorCategory {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Configuration => 2,
            Self::Resolution => 3,
            Self::MergeValidation => 4,
            Self::Link => 5,
            Self::Filesystem => 6,
            Self::Cancelled => 130,
        }
    }
}

impl ModlinkError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) | Self::Toml(_) => ErrorCategory::Configuration,
            Self::NameCollision {
                kind: CollisionKind::Launcher,
                ..
            }
            | Self::UnknownLauncherTarget { .. } => ErrorCategory::Configuration,
            Self::NotAModule(_)
            | Self::ClassFormat(..)
            | Self::Archive(..)
            | Self::NameCollision {
                kind: CollisionKind::Module,
                ..
            } => ErrorCategory::Resolution,
            Self::UnresolvedDependency { .. } => ErrorCategory::MergeValidation,
            Self::DuplicatePackage { .. } | Self::LinkFailure { .. } => ErrorCategory::Link,
            Self::Io(_) | Self::Json(_) | Self::Filesystem(..) => ErrorCategory::Filesystem,
            Self::Cancelled(_) => ErrorCategory::Cancelled,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }
}

impl From<std::io::Error> for ModlinkError {
    fn from(err: std::io::Error) -> Self {
        ModlinkError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for ModlinkError {
    fn from(err: serde_json::Error) -> Self {
        ModlinkError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for ModlinkError {
    fn from(err: toml::de::Error) -> Self {
        ModlinkError::Toml(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ModlinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_grouped_by_category() {
        let collision = ModlinkError::NameCollision {
            kind: CollisionKind::Module,
            name: "b".into(),
            sources: vec!["b-1.0.jar".into(), "b-2.0.jar".into()],
        };
        assert_eq!(collision.exit_code(), 3);

        let launcher = ModlinkError::NameCollision {
            kind: CollisionKind::Launcher,
            name: "hello".into(),
            sources: vec!["secondary_launcher".into(), "secondary_launcher".into()],
        };
        assert_eq!(launcher.exit_code(), 2);

        let unresolved = ModlinkError::UnresolvedDependency {
            module: "c".into(),
            required_by: vec![],
        };
        assert_eq!(unresolved.exit_code(), 4);
        assert_eq!(
            ModlinkError::Filesystem("/tmp/x".into(), "denied".into()).exit_code(),
            6
        );
    }

    #[test]
    fn unresolved_dependency_names_the_whole_chain() {
        let err = ModlinkError::UnresolvedDependency {
            module: "org.missing".into(),
            required_by: vec![
                Contributor {
                    module: "org.app".into(),
                    source: PathBuf::from("/libs/app.jar"),
                },
                Contributor {
                    module: "org.lib".into(),
                    source: PathBuf::from("/libs/lib.jar"),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("'org.missing'"));
        assert!(message.contains("org.app (/libs/app.jar) <- org.lib (/libs/lib.jar)"));
    }
}
