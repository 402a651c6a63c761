// modlink/src/cli/suggest.rs
use std::collections::BTreeSet;

use clap::{Args, ValueEnum};
use modlink_common::error::{ModlinkError, Result};
use modlink_common::model::descriptor::source_name;
use modlink_common::model::{ExcludeProvides, ResolvedEntry};
use modlink_common::ImageConfig;
use modlink_core::pipeline::resolve_module_path;
use modlink_core::resolve_and_merge;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SuggestFormat {
    /// module-info.java text of the merged module
    Java,
    /// A [merged_module] block listing every exclusion candidate
    Toml,
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    #[arg(long, value_enum, default_value_t = SuggestFormat::Java)]
    pub format: SuggestFormat,
}

#[derive(Debug, Default, Serialize)]
struct MergedModuleTemplate {
    exclude_requires: Vec<String>,
    exclude_uses: Vec<String>,
    exclude_provides: Vec<ExcludeProvides>,
}

#[derive(Debug, Serialize)]
struct SuggestDocument {
    merged_module: MergedModuleTemplate,
}

impl SuggestArgs {
    #[instrument(skip_all, fields(format = ?self.format))]
    pub async fn run(&self, config: &ImageConfig) -> Result<()> {
        let (event_tx, _event_rx) = broadcast::channel(16);
        match self.format {
            SuggestFormat::Java => {
                let (_, merged) = resolve_and_merge(config, &event_tx)?;
                print!("{}", merged.descriptor.render_source());
            }
            SuggestFormat::Toml => {
                // Candidates come straight from the entries so a module path
                // that only resolves with exclusions still gets a template.
                let entries = resolve_module_path(config.module_path(), &event_tx)?;
                let document = SuggestDocument {
                    merged_module: exclusion_candidates(&entries),
                };
                let text = toml::to_string_pretty(&document).map_err(|e| {
                    ModlinkError::Config(format!("failed to render suggestion: {e}"))
                })?;
                print!("{text}");
            }
        }
        debug!("Suggestion printed");
        Ok(())
    }
}

fn exclusion_candidates(entries: &[ResolvedEntry]) -> MergedModuleTemplate {
    let entry_modules: BTreeSet<&str> = entries.iter().map(|e| e.module_name()).collect();
    let mut requires = BTreeSet::new();
    let mut uses = BTreeSet::new();
    let mut provides = BTreeSet::new();
    for entry in entries {
        let descriptor = &entry.descriptor;
        requires.extend(
            descriptor
                .requires
                .keys()
                .filter(|m| m.as_str() != "java.base" && !entry_modules.contains(m.as_str()))
                .cloned(),
        );
        uses.extend(descriptor.uses.iter().map(|s| source_name(s)));
        provides.extend(descriptor.provides.keys().map(|s| source_name(s)));
    }
    MergedModuleTemplate {
        exclude_requires: requires.into_iter().collect(),
        exclude_uses: uses.into_iter().collect(),
        exclude_provides: provides
            .into_iter()
            .map(|service_pattern| ExcludeProvides { service_pattern })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use modlink_common::model::{DescriptorOrigin, EntryKind, ModuleDescriptor, RequiresModifiers};

    use super::*;

    fn entry(descriptor: ModuleDescriptor) -> ResolvedEntry {
        ResolvedEntry {
            path: PathBuf::from(format!("{}.jar", descriptor.name)),
            kind: EntryKind::Jar,
            origin: DescriptorOrigin::Explicit,
            descriptor,
        }
    }

    #[test]
    fn candidates_skip_entry_modules_and_java_base() {
        let app = ModuleDescriptor::new("org.example.app")
            .unwrap()
            .with_requires("b", RequiresModifiers::empty())
            .with_requires("java.base", RequiresModifiers::MANDATED)
            .with_requires("java.sql", RequiresModifiers::empty())
            .with_uses("org.example.spi.Codec$Factory")
            .with_provides("com.example.Plugin", ["org.example.app.PluginImpl"]);
        let b = ModuleDescriptor::new("b").unwrap();

        let template = exclusion_candidates(&[entry(app), entry(b)]);
        assert_eq!(template.exclude_requires, vec!["java.sql".to_string()]);
        assert_eq!(
            template.exclude_uses,
            vec!["org.example.spi.Codec.Factory".to_string()]
        );
        assert_eq!(template.exclude_provides.len(), 1);
        assert_eq!(template.exclude_provides[0].service_pattern, "com.example.Plugin");

        let text = toml::to_string_pretty(&SuggestDocument {
            merged_module: template,
        })
        .unwrap();
        assert!(text.contains("[merged_module]"));
        assert!(text.contains("service_pattern = \"com.example.Plugin\""));
    }
}
