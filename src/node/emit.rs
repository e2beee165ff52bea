//! `NodeTree` → YAML text.
//!
//! Output must read back into the same tree: strings are written plain only
//! when YAML would resolve them to the same string, otherwise double-quoted.

use super::{Node, NodeTree, NodeValue, Scalar, Style};

pub fn emit_document(tree: &NodeTree) -> String {
    let mut out = String::new();

    if let Some(header) = tree.header() {
        for line in header.lines() {
            if line.is_empty() {
                out.push_str("#\n");
            } else {
                out.push_str("# ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('\n');
    }

    let root = tree.root();
    let block_root = matches!(root.value(), NodeValue::Mapping(e) if !e.is_empty())
        || matches!(root.value(), NodeValue::Sequence(i) if !i.is_empty());
    if let (Style::Block, Some(tag), true) = (tree.style(), root.tag(), block_root) {
        out.push_str(tag);
        out.push('\n');
    }
    match (tree.style(), root.value()) {
        (Style::Block, NodeValue::Mapping(entries)) if !entries.is_empty() => {
            emit_mapping(&mut out, entries, 0);
        }
        (Style::Block, NodeValue::Sequence(items)) if !items.is_empty() => {
            emit_sequence(&mut out, items, 0);
        }
        (_, NodeValue::Null) if root.tag().is_none() => {
            out.push_str("{}\n");
        }
        _ => {
            emit_flow(&mut out, root);
            out.push('\n');
        }
    }
    out
}

fn pad(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

fn emit_comment(out: &mut String, comment: Option<&str>, indent: usize) {
    let Some(comment) = comment else { return };
    for line in comment.lines() {
        pad(out, indent);
        if line.is_empty() {
            out.push_str("#\n");
        } else {
            out.push_str("# ");
            out.push_str(line);
            out.push('\n');
        }
    }
}

fn emit_mapping(out: &mut String, entries: &[(String, Node)], indent: usize) {
    for (key, node) in entries {
        emit_comment(out, node.comment(), indent);
        pad(out, indent);
        out.push_str(&format_string(key));
        out.push(':');
        match node.value() {
            NodeValue::Mapping(children) if !children.is_empty() => {
                push_tag(out, node);
                out.push('\n');
                emit_mapping(out, children, indent + 2);
            }
            NodeValue::Sequence(items) if !items.is_empty() => {
                push_tag(out, node);
                out.push('\n');
                // A tagged sequence cannot share the key's indentation.
                let indent = if node.tag().is_some() { indent + 2 } else { indent };
                emit_sequence(out, items, indent);
            }
            _ => {
                out.push(' ');
                emit_flow(out, node);
                out.push('\n');
            }
        }
    }
}

fn emit_sequence(out: &mut String, items: &[Node], indent: usize) {
    for item in items {
        emit_comment(out, item.comment(), indent);
        let mut nested = String::new();
        match item.value() {
            NodeValue::Mapping(children) if !children.is_empty() => {
                emit_mapping(&mut nested, children, indent + 2);
            }
            NodeValue::Sequence(children) if !children.is_empty() => {
                emit_sequence(&mut nested, children, indent + 2);
            }
            _ => {
                pad(out, indent);
                out.push_str("- ");
                emit_flow(out, item);
                out.push('\n');
                continue;
            }
        }
        if let Some(tag) = item.tag() {
            pad(out, indent);
            out.push_str("- ");
            out.push_str(tag);
            out.push('\n');
            out.push_str(&nested);
            continue;
        }
        // The nested block starts indented by `indent + 2`; its first line
        // shares the dash line. Leading comments move above the dash.
        let mut rest = nested.as_str();
        while let Some(end) = rest.find('\n') {
            let line = rest[..end].trim_start();
            if !line.starts_with('#') {
                break;
            }
            pad(out, indent);
            out.push_str(line);
            out.push('\n');
            rest = &rest[end + 1..];
        }
        pad(out, indent);
        out.push_str("- ");
        out.push_str(&rest[indent + 2..]);
    }
}

fn push_tag(out: &mut String, node: &Node) {
    if let Some(tag) = node.tag() {
        out.push(' ');
        out.push_str(tag);
    }
}

fn emit_flow(out: &mut String, node: &Node) {
    if let Some(tag) = node.tag() {
        out.push_str(tag);
        out.push(' ');
    }
    match node.value() {
        NodeValue::Null => out.push_str("null"),
        NodeValue::Scalar(scalar) => out.push_str(&format_scalar(scalar)),
        NodeValue::Sequence(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                emit_flow(out, item);
            }
            out.push(']');
        }
        NodeValue::Mapping(entries) => {
            out.push('{');
            for (i, (key, child)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format_string(key));
                out.push_str(": ");
                emit_flow(out, child);
            }
            out.push('}');
        }
    }
}

pub(crate) fn format_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Bool(b) => b.to_string(),
        Scalar::Int(i) => i.to_string(),
        Scalar::UInt(u) => u.to_string(),
        Scalar::Float(f) => format_float(*f),
        Scalar::Str(s) => format_string(s),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        return ".nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { ".inf".to_string() } else { "-.inf".to_string() };
    }
    let text = format!("{:?}", f);
    if text.contains('.') {
        return text;
    }
    // `1e20` → `1.0e20` so every reader sees a float.
    match text.find('e') {
        Some(pos) => format!("{}.0{}", &text[..pos], &text[pos..]),
        None => format!("{}.0", text),
    }
}

fn format_string(s: &str) -> String {
    if is_plain_safe(s) {
        s.to_string()
    } else {
        quote(s)
    }
}

const LEADING_INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

fn is_plain_safe(s: &str) -> bool {
    let Some(first) = s.chars().next() else {
        return false;
    };
    if LEADING_INDICATORS.contains(&first) || s.trim() != s {
        return false;
    }
    if s.chars().any(|c| c.is_control() || matches!(c, '#' | ',' | '[' | ']' | '{' | '}')) {
        return false;
    }
    if s.ends_with(':') || s.contains(": ") {
        return false;
    }
    // Anything YAML would read as a bool, number, null or document marker
    // must be quoted.
    matches!(
        serde_yaml::from_str::<serde_yaml::Value>(s),
        Ok(serde_yaml::Value::String(ref parsed)) if parsed == s
    )
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() || matches!(c, '\u{2028}' | '\u{2029}') => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
