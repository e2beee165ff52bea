//! In-memory document tree.
//!
//! # Data Flow
//! ```text
//! file text
//!     → parse.rs (YAML → NodeTree, header split off)
//!     → codecs + default backfill (document.rs)
//!     → serde_yaml::Value → typed document
//!
//! typed document
//!     → serde_yaml::Value → NodeTree (comments from field descriptors)
//!     → emit.rs (block or flow text, header on top)
//! ```
//!
//! # Design Decisions
//! - Mapping keys are always strings and keep insertion order
//! - Comments live on the node they describe, not on the parent
//! - YAML tags (`!Variant`) stay on their node, so enum variants that carry
//!   data read back as the same variant
//! - Style is chosen once when the tree is created

mod emit;
mod parse;

pub use emit::emit_document;
pub use parse::{parse_document, SyntaxError};

use serde::{Deserialize, Serialize};
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::Value;

/// Output style for a whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// Indentation-structured, one entry per line, comments kept.
    #[default]
    Block,
    /// Single-line `{key: value}` form; node comments are not written.
    Flow,
}

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Textual form of the scalar, as a user would type it.
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::UInt(u) => u.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Str(s) => s.clone(),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<u64> for Scalar {
    fn from(u: u64) -> Self {
        i64::try_from(u).map(Scalar::Int).unwrap_or(Scalar::UInt(u))
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeValue {
    #[default]
    Null,
    Scalar(Scalar),
    Sequence(Vec<Node>),
    Mapping(Vec<(String, Node)>),
}

/// One node of the document tree with its optional comment and tag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    value: NodeValue,
    comment: Option<String>,
    /// Tag text including the leading `!`.
    tag: Option<String>,
}

impl Node {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn scalar(scalar: impl Into<Scalar>) -> Self {
        Self {
            value: NodeValue::Scalar(scalar.into()),
            comment: None,
            tag: None,
        }
    }

    pub fn sequence(items: Vec<Node>) -> Self {
        Self {
            value: NodeValue::Sequence(items),
            comment: None,
            tag: None,
        }
    }

    pub fn mapping(entries: Vec<(String, Node)>) -> Self {
        Self {
            value: NodeValue::Mapping(entries),
            comment: None,
            tag: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Attach a YAML tag such as `!Money`; a missing `!` is added.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.tag = Some(if tag.starts_with('!') { tag } else { format!("!{}", tag) });
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn value(&self) -> &NodeValue {
        &self.value
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, NodeValue::Null)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.value {
            NodeValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&[(String, Node)]> {
        match &self.value {
            NodeValue::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Child of a mapping node.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, node)| node)
    }

    /// Follow a dotted path such as `database.pool.size`.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        path.split('.').try_fold(self, |node, key| node.get(key))
    }

    /// Insert or replace a mapping entry. A null node becomes a mapping.
    /// Returns false if the node is a scalar or sequence.
    pub fn insert(&mut self, key: impl Into<String>, node: Node) -> bool {
        if self.is_null() {
            self.value = NodeValue::Mapping(Vec::new());
        }
        let NodeValue::Mapping(entries) = &mut self.value else {
            return false;
        };
        let key = key.into();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = node,
            None => entries.push((key, node)),
        }
        true
    }

    /// Replace the value, keeping the comment.
    pub fn replace_value(&mut self, value: NodeValue) {
        self.value = value;
    }

    /// Visit every node addressed by `segments`; `*` matches any mapping key
    /// or any sequence element.
    pub fn for_each_at<E>(
        &mut self,
        segments: &[&str],
        visit: &mut dyn FnMut(&mut Node) -> Result<(), E>,
    ) -> Result<(), E> {
        let Some((head, rest)) = segments.split_first() else {
            return visit(self);
        };
        match &mut self.value {
            NodeValue::Mapping(entries) => {
                for (key, child) in entries.iter_mut() {
                    if *head == "*" || key == head {
                        child.for_each_at(rest, visit)?;
                    }
                }
            }
            NodeValue::Sequence(items) if *head == "*" => {
                for item in items.iter_mut() {
                    item.for_each_at(rest, visit)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Copy defaults forward: insert every key of `defaults` missing here,
    /// recursing into nested mappings unless `is_atomic` says the mapping at
    /// that dotted path is owned by the user. An empty (null) root becomes the
    /// defaults wholesale. Comments missing here are taken from `defaults`
    /// without counting as a change.
    ///
    /// Returns true if any value was added.
    pub fn merge_defaults(&mut self, defaults: &Node, is_atomic: &dyn Fn(&str) -> bool) -> bool {
        if self.is_null() && self.tag.is_none() && !defaults.is_null() {
            let comment = self.comment.take().or_else(|| defaults.comment.clone());
            *self = defaults.clone();
            self.comment = comment;
            return true;
        }
        self.merge_at(defaults, "", is_atomic)
    }

    fn merge_at(&mut self, defaults: &Node, path: &str, is_atomic: &dyn Fn(&str) -> bool) -> bool {
        if self.comment.is_none() {
            self.comment = defaults.comment.clone();
        }
        if !path.is_empty() && is_atomic(path) {
            return false;
        }
        // Different variants of an enum share nothing to backfill.
        if self.tag != defaults.tag {
            return false;
        }
        let (NodeValue::Mapping(entries), NodeValue::Mapping(default_entries)) =
            (&mut self.value, &defaults.value)
        else {
            return false;
        };

        let mut changed = false;
        for (key, default_node) in default_entries {
            let child_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", path, key)
            };
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some((_, node)) => changed |= node.merge_at(default_node, &child_path, is_atomic),
                None => {
                    entries.push((key.clone(), default_node.clone()));
                    changed = true;
                }
            }
        }
        changed
    }

    /// Structural equality ignoring comments.
    pub fn same_content(&self, other: &Node) -> bool {
        if self.tag != other.tag {
            return false;
        }
        match (&self.value, &other.value) {
            (NodeValue::Mapping(a), NodeValue::Mapping(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, na), (kb, nb))| ka == kb && na.same_content(nb))
            }
            (NodeValue::Sequence(a), NodeValue::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_content(y))
            }
            (a, b) => a == b,
        }
    }

    pub fn to_value(&self) -> Value {
        let value = self.untagged_value();
        match &self.tag {
            Some(tag) => Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new(tag.as_str()),
                value,
            })),
            None => value,
        }
    }

    fn untagged_value(&self) -> Value {
        match &self.value {
            NodeValue::Null => Value::Null,
            NodeValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            NodeValue::Scalar(Scalar::Int(i)) => Value::Number((*i).into()),
            NodeValue::Scalar(Scalar::UInt(u)) => Value::Number((*u).into()),
            NodeValue::Scalar(Scalar::Float(f)) => Value::Number((*f).into()),
            NodeValue::Scalar(Scalar::Str(s)) => Value::String(s.clone()),
            NodeValue::Sequence(items) => Value::Sequence(items.iter().map(Node::to_value).collect()),
            NodeValue::Mapping(entries) => Value::Mapping(
                entries
                    .iter()
                    .map(|(k, node)| (Value::String(k.clone()), node.to_value()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::scalar(b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Node::scalar(i),
                (None, Some(u)) => Node::scalar(u),
                (None, None) => Node::scalar(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Node::scalar(s),
            Value::Sequence(items) => Node::sequence(items.into_iter().map(Node::from).collect()),
            Value::Mapping(mapping) => Node::mapping(
                mapping
                    .into_iter()
                    .map(|(k, v)| (key_text(k), Node::from(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => {
                let TaggedValue { tag, value } = *tagged;
                let mut node = Node::from(value);
                node.tag = Some(tag.to_string());
                node
            }
        }
    }
}

fn key_text(key: Value) -> String {
    match key {
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// A parsed document: header comment, fixed style and root node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTree {
    header: Option<String>,
    style: Style,
    root: Node,
}

impl NodeTree {
    pub fn new(style: Style, header: Option<String>) -> Self {
        Self {
            header,
            style,
            root: Node::null(),
        }
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    /// Use `header` only if the document does not already carry one.
    pub fn header_or(&mut self, header: &str) {
        if self.header.is_none() && !header.is_empty() {
            self.header = Some(header.to_string());
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn set_root(&mut self, root: Node) {
        self.root = root;
    }

    pub fn emit(&self) -> String {
        emit_document(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        Node::mapping(vec![
            ("name".into(), Node::scalar("lobby")),
            (
                "limits".into(),
                Node::mapping(vec![("players".into(), Node::scalar(20i64))]),
            ),
        ])
    }

    #[test]
    fn test_lookup_dotted_path() {
        let node = sample();
        assert_eq!(node.lookup("limits.players").and_then(Node::as_scalar), Some(&Scalar::Int(20)));
        assert!(node.lookup("limits.missing").is_none());
    }

    #[test]
    fn test_merge_inserts_missing_keys() {
        let mut loaded = Node::mapping(vec![("name".into(), Node::scalar("custom"))]);
        let changed = loaded.merge_defaults(&sample(), &|_| false);
        assert!(changed);
        assert_eq!(loaded.get("name").and_then(Node::as_scalar), Some(&Scalar::from("custom")));
        assert_eq!(loaded.lookup("limits.players").and_then(Node::as_scalar), Some(&Scalar::Int(20)));

        let again = loaded.merge_defaults(&sample(), &|_| false);
        assert!(!again);
    }

    #[test]
    fn test_merge_recurses_into_nested_mappings() {
        let mut loaded = Node::mapping(vec![("limits".into(), Node::mapping(vec![]))]);
        assert!(loaded.merge_defaults(&sample(), &|_| false));
        assert!(loaded.lookup("limits.players").is_some());
    }

    #[test]
    fn test_merge_respects_atomic_paths() {
        let mut loaded = Node::mapping(vec![("limits".into(), Node::mapping(vec![]))]);
        let changed = loaded.merge_defaults(&sample(), &|path| path == "limits");
        assert!(changed);
        assert!(loaded.lookup("limits.players").is_none());
    }

    #[test]
    fn test_merge_replaces_null_root() {
        let mut loaded = Node::null();
        assert!(loaded.merge_defaults(&sample(), &|_| false));
        assert!(loaded.same_content(&sample()));
    }

    #[test]
    fn test_merge_keeps_explicit_null_field() {
        let defaults = Node::mapping(vec![("motd".into(), Node::scalar("hi"))]);
        let mut loaded = Node::mapping(vec![("motd".into(), Node::null())]);
        assert!(!loaded.merge_defaults(&defaults, &|_| false));
        assert!(loaded.get("motd").unwrap().is_null());
    }

    #[test]
    fn test_merge_copies_comments_without_change() {
        let defaults = Node::mapping(vec![("name".into(), Node::scalar("x").with_comment("Display name"))]);
        let mut loaded = Node::mapping(vec![("name".into(), Node::scalar("y"))]);
        assert!(!loaded.merge_defaults(&defaults, &|_| false));
        assert_eq!(loaded.get("name").unwrap().comment(), Some("Display name"));
    }

    #[test]
    fn test_for_each_at_wildcard() {
        let mut node = Node::mapping(vec![(
            "items".into(),
            Node::sequence(vec![Node::scalar("a"), Node::scalar("b")]),
        )]);
        let mut seen = Vec::new();
        node.for_each_at::<()>(&["items", "*"], &mut |n| {
            seen.push(n.as_scalar().unwrap().as_text());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn test_value_conversion_keeps_order_and_types() {
        let node = sample();
        let back = Node::from(node.to_value());
        assert_eq!(back, node);
        let keys: Vec<_> = back.entries().unwrap().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["name", "limits"]);
    }

    #[test]
    fn test_tagged_value_keeps_its_tag() {
        let value: Value = serde_yaml::from_str("reward: !Money\n  amount: 5\n").unwrap();
        let node = Node::from(value.clone());
        let reward = node.get("reward").unwrap();
        assert_eq!(reward.tag(), Some("!Money"));
        assert!(reward.get("amount").is_some());
        assert_eq!(node.to_value(), value);
    }

    #[test]
    fn test_merge_skips_other_variant() {
        let defaults = Node::mapping(vec![(
            "reward".into(),
            Node::mapping(vec![("amount".into(), Node::scalar(5i64))]).with_tag("Money"),
        )]);
        let mut loaded = Node::mapping(vec![(
            "reward".into(),
            Node::mapping(vec![("id".into(), Node::scalar("diamond"))]).with_tag("Item"),
        )]);
        assert!(!loaded.merge_defaults(&defaults, &|_| false));
        assert!(loaded.lookup("reward.amount").is_none());
        assert!(!loaded.same_content(&defaults));
    }

    #[test]
    fn test_large_unsigned_stays_integer() {
        let node = Node::from(Value::Number(u64::MAX.into()));
        assert_eq!(node.as_scalar(), Some(&Scalar::UInt(u64::MAX)));
        assert_eq!(node.to_value(), Value::Number(u64::MAX.into()));
        assert_eq!(Scalar::from(7u64), Scalar::Int(7));
    }

    #[test]
    fn test_insert_into_null_creates_mapping() {
        let mut node = Node::null();
        assert!(node.insert("a", Node::scalar(1i64)));
        assert!(node.insert("a", Node::scalar(2i64)));
        assert_eq!(node.entries().unwrap().len(), 1);
        assert!(!Node::scalar(true).insert("x", Node::null()));
    }
}
