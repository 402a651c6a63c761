// modlink-common/src/model/descriptor.rs
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{ModlinkError, Result};

bitflags! {
    /// Modifiers on a `requires` clause. Bit values match the class-file
    /// `requires_flags` so they round-trip without translation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RequiresModifiers: u16 {
        const TRANSITIVE = 0x0020;
        const STATIC     = 0x0040;
        const SYNTHETIC  = 0x1000;
        const MANDATED   = 0x8000;
    }
}

impl Default for RequiresModifiers {
    fn default() -> Self {
        Self::empty()
    }
}

impl RequiresModifiers {
    /// Keywords as they appear in `module-info.java`.
    pub fn source_keywords(&self) -> Vec<&'static str> {
        let mut keywords = Vec::new();
        if self.contains(Self::STATIC) {
            keywords.push("static");
        }
        if self.contains(Self::TRANSITIVE) {
            keywords.push("transitive");
        }
        keywords
    }
}

pub const JAVA_KEYWORDS: [&str; 51] = [
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface",
    "long", "native", "new", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "try", "void", "volatile", "while", "_",
];

const LITERALS: [&str; 3] = ["true", "false", "null"];

/// True when every dot-separated segment is a legal Java identifier.
pub fn is_valid_module_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    name.split('.').all(|segment| {
        let mut chars = segment.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        (first.is_alphabetic() || first == '_' || first == '$')
            && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
            && !JAVA_KEYWORDS.contains(&segment)
            && !LITERALS.contains(&segment)
    })
}

/// Declarations of one module: what it requires, exports, opens, uses and provides.
///
/// All collections are ordered so two descriptors built from the same data
/// compare and serialize identically regardless of discovery order. Provider
/// lists keep their declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub requires: BTreeMap<String, RequiresModifiers>,
    #[serde(default)]
    pub exports: BTreeSet<String>,
    #[serde(default)]
    pub opens: BTreeSet<String>,
    #[serde(default)]
    pub uses: BTreeSet<String>,
    #[serde(default)]
    pub provides: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub packages: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModlinkError::Config(
                "module name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name,
            version: None,
            open: false,
            requires: BTreeMap::new(),
            exports: BTreeSet::new(),
            opens: BTreeSet::new(),
            uses: BTreeSet::new(),
            provides: BTreeMap::new(),
            packages: BTreeSet::new(),
            main_class: None,
        })
    }

    pub fn with_requires(mut self, module: impl Into<String>, modifiers: RequiresModifiers) -> Self {
        self.add_requires(module, modifiers);
        self
    }

    pub fn with_exports(mut self, package: impl Into<String>) -> Self {
        let package = package.into();
        self.packages.insert(package.clone());
        self.exports.insert(package);
        self
    }

    pub fn with_uses(mut self, service: impl Into<String>) -> Self {
        self.uses.insert(service.into());
        self
    }

    pub fn with_provides<I, S>(mut self, service: impl Into<String>, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let service = service.into();
        for provider in providers {
            self.add_provider(service.clone(), provider.into());
        }
        self
    }

    pub fn add_requires(&mut self, module: impl Into<String>, modifiers: RequiresModifiers) {
        let entry = self.requires.entry(module.into()).or_default();
        *entry |= modifiers;
    }

    /// Appends a provider, ignoring a repeat of one already listed for the service.
    pub fn add_provider(&mut self, service: String, provider: String) {
        let providers = self.provides.entry(service).or_default();
        if !providers.contains(&provider) {
            providers.push(provider);
        }
    }

    /// Renders the descriptor as `module-info.java` source.
    pub fn render_source(&self) -> String {
        let mut out = String::new();
        let open = if self.open { "open " } else { "" };
        let _ = writeln!(out, "{open}module {} {{", self.name);

        let mut printed_requires = false;
        for (module, modifiers) in &self.requires {
            if modifiers.contains(RequiresModifiers::MANDATED) {
                continue;
            }
            let mut clause = String::from("requires ");
            for keyword in modifiers.source_keywords() {
                clause.push_str(keyword);
                clause.push(' ');
            }
            let _ = writeln!(out, "    {clause}{module};");
            printed_requires = true;
        }
        if printed_requires {
            out.push('\n');
        }
        for package in &self.exports {
            let _ = writeln!(out, "    exports {package};");
        }
        if !self.open {
            for package in &self.opens {
                let _ = writeln!(out, "    opens {package};");
            }
        }
        for service in &self.uses {
            let _ = writeln!(out, "    uses {};", source_name(service));
        }
        for (service, providers) in &self.provides {
            let providers: Vec<String> = providers.iter().map(|p| source_name(p)).collect();
            let _ = writeln!(
                out,
                "    provides {} with {};",
                source_name(service),
                providers.join(", ")
            );
        }
        out.push_str("}\n");
        out
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (requires {}, exports {}, uses {}, provides {})",
            self.name,
            self.requires.len(),
            self.exports.len(),
            self.uses.len(),
            self.provides.len()
        )
    }
}

/// Binary class names use `$` for nested classes, source uses `.`.
pub fn source_name(binary_name: &str) -> String {
    binary_name.replace('$', ".")
}
