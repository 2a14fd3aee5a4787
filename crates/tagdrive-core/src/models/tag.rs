use serde::{Deserialize, Serialize};

/// Default colour for tags created without one.
pub const DEFAULT_TAG_COLOR: &str = "#ffffff";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub group: String,
}

/// Adds the leading `#` when it is missing. Empty input stays empty.
pub fn normalize_color(color: &str) -> String {
    if color.is_empty() || color.starts_with('#') {
        color.to_string()
    } else {
        format!("#{}", color)
    }
}
