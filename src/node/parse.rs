//! YAML text → `NodeTree`.

use serde_yaml::Value;
use crate::error::Location;
use super::{Node, NodeTree, Style};

/// A syntax error found while reading document text.
#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub location: Option<Location>,
    pub message: String,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location {
            Some(location) => write!(f, "{} at {}", self.message, location),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Parse document text. The leading run of `#` lines becomes the header;
/// a document with no content yields a null root.
pub fn parse_document(text: &str, style: Style) -> Result<NodeTree, SyntaxError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut tree = NodeTree::new(style, split_header(text));

    let has_content = text
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#'));
    if !has_content {
        return Ok(tree);
    }

    let value: Value = serde_yaml::from_str(text).map_err(|e| SyntaxError {
        location: e.location().map(|l| Location {
            line: l.line(),
            column: l.column(),
        }),
        message: e.to_string(),
    })?;
    tree.set_root(Node::from(value));
    Ok(tree)
}

fn split_header(text: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .take_while(|line| line.starts_with('#'))
        .map(|line| {
            let line = &line[1..];
            line.strip_prefix(' ').unwrap_or(line).trim_end()
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
