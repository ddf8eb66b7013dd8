//! Reading the `---` header of an existing document.
//!
//! Headers written by the built-in templates are valid YAML. Headers written
//! by custom templates may not be (an unquoted title containing `: ` is
//! enough), so a document whose header fails to parse as a YAML mapping is
//! read line by line as `key: value` pairs instead.

use issuemirror_core::{ItemKind, UpdateMode};
use issuemirror_renderer::document;
use serde_yaml::{Mapping, Value};

/// Parsed header of a local document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    fields: Mapping,
}

impl Frontmatter {
    /// Parse the header of `doc`. `None` when the document has no header.
    pub fn parse(doc: &str) -> Option<Self> {
        let (yaml, _) = document::split_header(doc)?;
        let fields = match serde_yaml::from_str::<Value>(yaml) {
            Ok(Value::Mapping(map)) => map,
            Ok(Value::Null) => Mapping::new(),
            Ok(_) | Err(_) => {
                tracing::debug!("header is not a YAML mapping; reading it line by line");
                parse_lines(yaml)
            }
        };
        Some(Frontmatter { fields })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// A scalar value as text. Sequences and mappings yield `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<u64> {
        match self.get("number")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn update_mode(&self) -> Option<UpdateMode> {
        self.get_str("updateMode").and_then(|raw| UpdateMode::from_header(&raw))
    }

    pub fn allow_delete(&self) -> Option<bool> {
        match self.get("allowDelete")? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Raw `updated` value (RFC 3339 when written by this tool).
    pub fn updated(&self) -> Option<String> {
        self.get_str("updated")
    }

    pub fn repository(&self) -> Option<String> {
        self.get_str("repository")
    }

    pub fn kind(&self) -> Option<ItemKind> {
        self.get_str("type").and_then(|raw| raw.parse().ok())
    }
}

fn parse_lines(yaml: &str) -> Mapping {
    let mut map = Mapping::new();
    for line in yaml.lines() {
        if line.starts_with(char::is_whitespace) || line.trim_start().starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        map.insert(
            Value::String(key.trim().to_string()),
            Value::String(value.to_string()),
        );
    }
    map
}
