//! Ordered key/value payload consumed by the gateway's `LoadDocument`.
//!
//! Rendered as INI text: `[section]` headers followed by `key=value` lines,
//! in insertion order. Section and key order is significant to the gateway
//! and is preserved exactly.

use serde::Serialize;

/// One `[name]` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadSection {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl PayloadSection {
    /// Set `key`, replacing an existing value in place.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Flat, ordered gateway input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatewayPayload {
    sections: Vec<PayloadSection>,
}

impl GatewayPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// The section called `name`, appended if absent.
    pub fn section(&mut self, name: &str) -> &mut PayloadSection {
        let index = match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(PayloadSection {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == section)
            .and_then(|s| s.get(key))
    }

    pub fn sections(&self) -> &[PayloadSection] {
        &self.sections
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            for (key, value) in &section.entries {
                out.push_str(key);
                out.push('=');
                // Values are single-line in the gateway format.
                out.push_str(&value.replace(['\r', '\n'], " "));
                out.push('\n');
            }
        }
        out
    }
}

/// `prefix` followed by a 3-digit, 1-based index (`infMunDescarga001`).
pub(crate) fn indexed(prefix: &str, index: usize) -> String {
    format!("{prefix}{:03}", index + 1)
}
