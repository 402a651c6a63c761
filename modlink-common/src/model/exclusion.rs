// modlink-common/src/model/exclusion.rs
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModlinkError, Result};

/// A service-interface pattern for `exclude_provides`.
///
/// `*` is only accepted as the last character, where it matches any suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServicePattern {
    raw: String,
}

impl ServicePattern {
    pub fn parse(pattern: impl Into<String>) -> Result<Self> {
        let raw = pattern.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ModlinkError::Config(
                "exclude_provides service_pattern must not be empty".to_string(),
            ));
        }
        if let Some(pos) = trimmed.find('*') {
            if pos != trimmed.len() - 1 {
                return Err(ModlinkError::Config(format!(
                    "service_pattern '{trimmed}' may only use '*' as a trailing wildcard"
                )));
            }
        }
        Ok(Self {
            raw: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches against a fully qualified interface name.
    pub fn matches(&self, interface: &str) -> bool {
        match self.raw.strip_suffix('*') {
            Some(prefix) => interface.starts_with(prefix),
            None => self.raw == interface,
        }
    }
}

impl fmt::Display for ServicePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Configuration shape of one `exclude_provides` item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludeProvides {
    pub service_pattern: String,
}

/// Exclusions applied once to the fully merged module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRuleSet {
    requires: Vec<String>,
    uses: Vec<String>,
    provides: Vec<ServicePattern>,
}

impl ExclusionRuleSet {
    pub fn builder() -> ExclusionRuleSetBuilder {
        ExclusionRuleSetBuilder::default()
    }

    pub fn excluded_requires(&self) -> &[String] {
        &self.requires
    }

    pub fn excluded_uses(&self) -> &[String] {
        &self.uses
    }

    pub fn excluded_provides(&self) -> &[ServicePattern] {
        &self.provides
    }

    /// Exact match. A nested service written in source form (`Outer.Inner`)
    /// also matches its binary name (`Outer$Inner`).
    pub fn excludes_uses(&self, service: &str) -> bool {
        let source_form = service.replace('$', ".");
        self.uses
            .iter()
            .any(|rule| rule == service || *rule == source_form)
    }

    pub fn excludes_provides(&self, interface: &str) -> bool {
        let source_form = interface.replace('$', ".");
        self.provides
            .iter()
            .any(|pattern| pattern.matches(interface) || pattern.matches(&source_form))
    }
}

#[derive(Debug, Default)]
pub struct ExclusionRuleSetBuilder {
    requires: Vec<String>,
    uses: Vec<String>,
    provides: Vec<String>,
}

impl ExclusionRuleSetBuilder {
    pub fn exclude_requires<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(modules.into_iter().map(Into::into));
        self
    }

    pub fn exclude_uses<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uses.extend(services.into_iter().map(Into::into));
        self
    }

    pub fn exclude_provides(mut self, service_pattern: impl Into<String>) -> Self {
        self.provides.push(service_pattern.into());
        self
    }

    pub fn build(self) -> Result<ExclusionRuleSet> {
        let mut requires = Vec::with_capacity(self.requires.len());
        for module in self.requires {
            let module = module.trim().to_string();
            if module.is_empty() {
                return Err(ModlinkError::Config(
                    "exclude_requires entries must not be empty".to_string(),
                ));
            }
            if !requires.contains(&module) {
                requires.push(module);
            }
        }

        let mut uses = Vec::with_capacity(self.uses.len());
        for service in self.uses {
            let service = service.trim().to_string();
            if service.is_empty() {
                return Err(ModlinkError::Config(
                    "exclude_uses entries must not be empty".to_string(),
                ));
            }
            if !uses.contains(&service) {
                uses.push(service);
            }
        }

        let provides = self
            .provides
            .into_iter()
            .map(ServicePattern::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(ExclusionRuleSet {
            requires,
            uses,
            provides,
        })
    }
}
