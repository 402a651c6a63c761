// modlink-core/src/module/manifest.rs
use std::collections::BTreeMap;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Main section of a jar manifest. Per-entry sections are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    attributes: BTreeMap<String, String>,
}

impl Manifest {
    pub fn parse(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let mut attributes = BTreeMap::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                // End of the main section.
                break;
            }
            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(continuation);
                }
                continue;
            }
            if let Some((key, value)) = current.take() {
                attributes.insert(key.to_ascii_lowercase(), value);
            }
            if let Some((key, value)) = line.split_once(':') {
                current = Some((key.trim().to_string(), value.trim_start().to_string()));
            }
        }
        if let Some((key, value)) = current {
            attributes.insert(key.to_ascii_lowercase(), value);
        }
        Self { attributes }
    }

    /// Attribute names are case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn automatic_module_name(&self) -> Option<&str> {
        self.get("Automatic-Module-Name")
    }

    pub fn main_class(&self) -> Option<&str> {
        self.get("Main-Class")
    }

    pub fn is_multi_release(&self) -> bool {
        self.get("Multi-Release")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_main_section_with_continuations() {
        let manifest = Manifest::parse(
            b"Manifest-Version: 1.0\r\nAutomatic-Module-Name: org.apache.logging.lo\r\n g4j.core\r\nMain-Class: org.example.Main\r\nMulti-Release: true\r\n\r\nName: org/example/\r\nSealed: true\r\n",
        );
        assert_eq!(
            manifest.automatic_module_name(),
            Some("org.apache.logging.log4j.core")
        );
        assert_eq!(manifest.main_class(), Some("org.example.Main"));
        assert!(manifest.is_multi_release());
        assert_eq!(manifest.get("sealed"), None);
    }

    #[test]
    fn blank_values_are_absent() {
        let manifest = Manifest::parse(b"Automatic-Module-Name:   \n");
        assert_eq!(manifest.automatic_module_name(), None);
    }
}
