// modlink-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ModlinkError, Result};
use crate::model::exclusion::{ExcludeProvides, ExclusionRuleSet};
use crate::model::launcher::{LauncherSpec, Launchers};

pub const DEFAULT_CONFIG_FILENAME: &str = "modlink.toml";
const MERGED_MODULE_SUFFIX: &str = ".merged.module";
/// Image directory used when the configuration names none.
pub const DEFAULT_OUTPUT_DIR: &str = "build/image";

/// Raw launcher table as written in `modlink.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawLauncher {
    pub name: Option<String>,
    pub main_class: Option<String>,
    pub module_name: Option<String>,
    #[serde(default)]
    pub jvm_args: Vec<String>,
    #[serde(default)]
    pub no_console: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMergedModule {
    #[serde(default)]
    pub exclude_requires: Vec<String>,
    #[serde(default)]
    pub exclude_uses: Vec<String>,
    #[serde(default)]
    pub exclude_provides: Vec<ExcludeProvides>,
    pub emit_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub module_name: String,
    pub main_class: Option<String>,
    #[serde(default)]
    pub module_path: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub merged_module_name: Option<String>,
    pub java_home: Option<PathBuf>,
    #[serde(default)]
    pub jlink_options: Vec<String>,
    #[serde(default)]
    pub additional_modules: Vec<String>,
    pub platform_modules: Option<Vec<String>>,
    pub launcher: Option<RawLauncher>,
    #[serde(default)]
    pub secondary_launcher: Vec<RawLauncher>,
    #[serde(default)]
    pub merged_module: RawMergedModule,
}

/// Immutable description of one image build.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    module_name: String,
    module_path: Vec<PathBuf>,
    output_dir: PathBuf,
    merged_module_name: String,
    exclusions: ExclusionRuleSet,
    launchers: Launchers,
    java_home: Option<PathBuf>,
    jlink_binary: Option<PathBuf>,
    jlink_options: Vec<String>,
    additional_modules: Vec<String>,
    platform_modules: Option<Vec<String>>,
    emit_dir: Option<PathBuf>,
}

impl ImageConfig {
    pub fn builder(module_name: impl Into<String>) -> ImageConfigBuilder {
        ImageConfigBuilder::new(module_name)
    }

    /// Loads `path` and applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading image configuration from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            ModlinkError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_toml_str(&text, &base_dir)
    }

    /// Parses TOML text; relative paths are resolved against `base_dir`.
    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text)?;
        Self::from_raw(raw, base_dir)
    }

    pub fn from_raw(raw: RawConfig, base_dir: &Path) -> Result<Self> {
        let resolve = |p: PathBuf| {
            if p.is_absolute() {
                p
            } else {
                base_dir.join(p)
            }
        };

        let raw_primary = raw.launcher.unwrap_or_default();
        let default_launcher_name = raw
            .module_name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_string();
        let primary = launcher_from_raw(
            raw_primary,
            Some(default_launcher_name),
            raw.main_class.clone(),
        )?;
        let secondary = raw
            .secondary_launcher
            .into_iter()
            .map(|l| launcher_from_raw(l, None, None))
            .collect::<Result<Vec<_>>>()?;

        let mut exclusions = ExclusionRuleSet::builder()
            .exclude_requires(raw.merged_module.exclude_requires)
            .exclude_uses(raw.merged_module.exclude_uses);
        for provides in raw.merged_module.exclude_provides {
            exclusions = exclusions.exclude_provides(provides.service_pattern);
        }

        let java_home = raw.java_home.map(&resolve).or_else(|| {
            env::var_os("JAVA_HOME")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        });
        let jlink_binary = env::var_os("MODLINK_JLINK")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let mut builder = ImageConfig::builder(raw.module_name)
            .module_path(raw.module_path.into_iter().map(&resolve))
            .launchers(primary, secondary)
            .exclusions(exclusions.build()?)
            .jlink_options(raw.jlink_options)
            .additional_modules(raw.additional_modules);
        let output = raw
            .output
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        builder = builder.output_dir(resolve(output));
        if let Some(name) = raw.merged_module_name {
            builder = builder.merged_module_name(name);
        }
        if let Some(home) = java_home {
            builder = builder.java_home(home);
        }
        if let Some(jlink) = jlink_binary {
            builder = builder.jlink_binary(jlink);
        }
        if let Some(modules) = raw.platform_modules {
            builder = builder.platform_modules(modules);
        }
        if let Some(dir) = raw.merged_module.emit_dir {
            builder = builder.emit_dir(resolve(dir));
        }
        builder.build()
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn module_path(&self) -> &[PathBuf] {
        &self.module_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn merged_module_name(&self) -> &str {
        &self.merged_module_name
    }

    pub fn exclusions(&self) -> &ExclusionRuleSet {
        &self.exclusions
    }

    pub fn launchers(&self) -> &Launchers {
        &self.launchers
    }

    pub fn java_home(&self) -> Option<&Path> {
        self.java_home.as_deref()
    }

    pub fn jlink_binary(&self) -> Option<&Path> {
        self.jlink_binary.as_deref()
    }

    pub fn jlink_options(&self) -> &[String] {
        &self.jlink_options
    }

    pub fn additional_modules(&self) -> &[String] {
        &self.additional_modules
    }

    pub fn platform_modules(&self) -> Option<&[String]> {
        self.platform_modules.as_deref()
    }

    pub fn emit_dir(&self) -> Option<&Path> {
        self.emit_dir.as_deref()
    }

    /// A copy that writes its image somewhere else.
    pub fn with_output_dir(&self, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..self.clone()
        }
    }
}

fn launcher_from_raw(
    raw: RawLauncher,
    default_name: Option<String>,
    default_main_class: Option<String>,
) -> Result<LauncherSpec> {
    let name = raw.name.or(default_name).ok_or_else(|| {
        ModlinkError::Config("every secondary_launcher needs a name".to_string())
    })?;
    let mut builder = LauncherSpec::builder(name)
        .jvm_args(raw.jvm_args)
        .no_console(raw.no_console);
    if let Some(class) = raw.main_class.or(default_main_class) {
        builder = builder.main_class(class);
    }
    if let Some(module) = raw.module_name {
        builder = builder.module_name(module);
    }
    builder.build()
}

#[derive(Debug)]
pub struct ImageConfigBuilder {
    module_name: String,
    module_path: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
    merged_module_name: Option<String>,
    exclusions: ExclusionRuleSet,
    launchers: Option<(LauncherSpec, Vec<LauncherSpec>)>,
    java_home: Option<PathBuf>,
    jlink_binary: Option<PathBuf>,
    jlink_options: Vec<String>,
    additional_modules: Vec<String>,
    platform_modules: Option<Vec<String>>,
    emit_dir: Option<PathBuf>,
}

impl ImageConfigBuilder {
    fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            module_path: Vec::new(),
            output_dir: None,
            merged_module_name: None,
            exclusions: ExclusionRuleSet::default(),
            launchers: None,
            java_home: None,
            jlink_binary: None,
            jlink_options: Vec::new(),
            additional_modules: Vec::new(),
            platform_modules: None,
            emit_dir: None,
        }
    }

    pub fn module_path<I, P>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.module_path.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn merged_module_name(mut self, name: impl Into<String>) -> Self {
        self.merged_module_name = Some(name.into());
        self
    }

    pub fn exclusions(mut self, exclusions: ExclusionRuleSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn launchers(mut self, primary: LauncherSpec, secondary: Vec<LauncherSpec>) -> Self {
        self.launchers = Some((primary, secondary));
        self
    }

    pub fn java_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.java_home = Some(dir.into());
        self
    }

    pub fn jlink_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.jlink_binary = Some(path.into());
        self
    }

    pub fn jlink_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jlink_options.extend(options.into_iter().map(Into::into));
        self
    }

    pub fn additional_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_modules
            .extend(modules.into_iter().map(Into::into));
        self
    }

    pub fn platform_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platform_modules = Some(modules.into_iter().map(Into::into).collect());
        self
    }

    pub fn emit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.emit_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<ImageConfig> {
        let module_name = self.module_name.trim().to_string();
        if module_name.is_empty() {
            return Err(ModlinkError::Config(
                "module_name must not be empty".to_string(),
            ));
        }
        if self.module_path.is_empty() {
            return Err(ModlinkError::Config(
                "module_path must list at least one entry".to_string(),
            ));
        }
        let output_dir = self
            .output_dir
            .ok_or_else(|| ModlinkError::Config("output directory is required".to_string()))?;
        if output_dir.file_name().is_none() {
            return Err(ModlinkError::Config(format!(
                "output directory {} must name a directory",
                output_dir.display()
            )));
        }
        let (primary, secondary) = self
            .launchers
            .ok_or_else(|| ModlinkError::Config("a primary launcher is required".to_string()))?;
        let launchers = Launchers::new(primary, secondary)?;

        let merged_module_name = self
            .merged_module_name
            .unwrap_or_else(|| format!("{module_name}{MERGED_MODULE_SUFFIX}"));

        for option in &self.jlink_options {
            if matches!(
                option.split('=').next(),
                Some("--output" | "--module-path" | "-p" | "--add-modules" | "--launcher")
            ) {
                warn!("jlink option '{}' is managed by modlink and will be ignored", option);
            }
        }

        Ok(ImageConfig {
            module_name,
            module_path: self.module_path,
            output_dir,
            merged_module_name,
            exclusions: self.exclusions,
            launchers,
            java_home: self.java_home,
            jlink_binary: self.jlink_binary,
            jlink_options: self.jlink_options,
            additional_modules: self.additional_modules,
            platform_modules: self.platform_modules,
            emit_dir: self.emit_dir,
        })
    }
}

/// Directory for rolling log files; `MODLINK_LOG_DIR` wins over the platform default.
pub fn log_dir() -> PathBuf {
    if let Some(dir) = env::var_os("MODLINK_LOG_DIR").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    ProjectDirs::from("org", "modlink", "modlink")
        .map(|dirs| dirs.cache_dir().join("logs"))
        .unwrap_or_else(|| env::temp_dir().join("modlink-logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollisionKind;

    const MULTI_LAUNCH: &str = r#"
        module_name = "org.example.multi"
        main_class = "org.example.multi.Hello"
        module_path = ["libs/app.jar", "/opt/libs/b-1.0.jar"]
        output = "build/image"

        [launcher]
        name = "hello"
        no_console = false
        jvm_args = ["-Xms512m", "-Xmx4g", "-XX:+UseShenandoahGC"]

        [[secondary_launcher]]
        name = "helloAgain"
        main_class = "org.example.multi.HelloAgain"

        [[secondary_launcher]]
        name = "howdy"
        module_name = "org.example.multi"
        main_class = "org.example.multi.Howdy"

        [merged_module]
        exclude_requires = ["java.compiler", "java.rmi"]
        exclude_uses = ["org.apache.logging.log4j.message.ThreadDumpMessage.ThreadInfoFactory"]
        exclude_provides = [{ service_pattern = "org.apache.logging.*" }]
    "#;

    #[test]
    fn parses_multi_launcher_configuration() {
        let config = ImageConfig::from_toml_str(MULTI_LAUNCH, Path::new("/work")).unwrap();

        assert_eq!(config.module_name(), "org.example.multi");
        assert_eq!(
            config.module_path(),
            [
                PathBuf::from("/work/libs/app.jar"),
                PathBuf::from("/opt/libs/b-1.0.jar")
            ]
        );
        assert_eq!(config.output_dir(), Path::new("/work/build/image"));
        assert_eq!(config.merged_module_name(), "org.example.multi.merged.module");

        let primary = config.launchers().primary();
        assert_eq!(primary.name(), "hello");
        assert_eq!(primary.main_class(), "org.example.multi.Hello");
        assert_eq!(primary.jvm_args().len(), 3);
        assert!(primary.console());
        assert_eq!(config.launchers().len(), 3);

        let exclusions = config.exclusions();
        assert_eq!(exclusions.excluded_requires(), ["java.compiler", "java.rmi"]);
        assert!(exclusions.excludes_provides("org.apache.logging.log4j.spi.Provider"));
    }

    #[test]
    fn primary_launcher_defaults_from_module_name() {
        let text = r#"
            module_name = "org.beryx.modular.hello"
            main_class = "org.beryx.modular.hello.Hello"
            module_path = ["a.jar"]
            output = "image"
        "#;
        let config = ImageConfig::from_toml_str(text, Path::new("/w")).unwrap();
        assert_eq!(config.launchers().primary().name(), "hello");
        assert_eq!(config.output_dir(), Path::new("/w/image"));

        let without_output = text.replace("output = \"image\"", "");
        let config = ImageConfig::from_toml_str(&without_output, Path::new("/w")).unwrap();
        assert_eq!(config.output_dir(), Path::new("/w/build/image"));
    }

    #[test]
    fn duplicate_secondary_launchers_fail_at_load() {
        let text = r#"
            module_name = "org.example.multi"
            main_class = "org.example.multi.Hello"
            module_path = ["a.jar"]
            output = "image"

            [[secondary_launcher]]
            name = "howdy"
            main_class = "org.example.multi.Howdy"

            [[secondary_launcher]]
            name = "howdy"
            main_class = "org.example.multi.Howdy2"
        "#;
        let err = ImageConfig::from_toml_str(text, Path::new("/w")).unwrap_err();
        assert!(matches!(
            err,
            ModlinkError::NameCollision {
                kind: CollisionKind::Launcher,
                ..
            }
        ));
    }

    #[test]
    fn unknown_keys_are_configuration_errors() {
        let text = r#"
            module_name = "a"
            main_class = "a.Main"
            module_path = ["a.jar"]
            output = "image"
            mergedModule = {}
        "#;
        let err = ImageConfig::from_toml_str(text, Path::new("/w")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn builder_requires_output_and_entries() {
        let launcher = LauncherSpec::builder("app").main_class("a.Main").build().unwrap();
        let err = ImageConfig::builder("a")
            .launchers(launcher.clone(), vec![])
            .output_dir("/tmp/image")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("module_path"));

        let err = ImageConfig::builder("a")
            .module_path(["a.jar"])
            .launchers(launcher, vec![])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("output directory"));
    }
}
