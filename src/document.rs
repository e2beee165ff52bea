//! Document types and their schema.
//!
//! A document type is a plain serde type plus an explicit schema: a stable
//! kind name, a list of field descriptors, an output style and optional
//! custom codecs. Defaults come from the type's `Default` impl.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{CodecError, CodecFactory, CodecSet};
use crate::node::{Node, NodeValue, Style};

/// A typed configuration unit backed by one file.
pub trait Document: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Identifier used in the path registration table and in logs.
    const KIND: &'static str;

    fn fields() -> Vec<FieldDescriptor> {
        Vec::new()
    }

    fn style() -> Style {
        Style::Block
    }

    fn codecs() -> Vec<CodecFactory> {
        Vec::new()
    }
}

/// Schema entry for one field, addressed by dotted path (`*` matches any
/// key or list element).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    path: String,
    comment: Option<String>,
    codec: Option<String>,
    atomic: bool,
}

impl FieldDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            comment: None,
            codec: None,
            atomic: false,
        }
    }

    /// Comment written above the field.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Name of the codec applied to the field's scalar.
    pub fn codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }

    /// Treat the field as one value during default backfill: if present,
    /// its entries are never topped up from the defaults. Use for maps whose
    /// keys belong to the user.
    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn comment_text(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn codec_name(&self) -> Option<&str> {
        self.codec.as_deref()
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    pub(crate) fn segments(&self) -> Vec<&str> {
        self.path.split('.').collect()
    }

    /// Whether this descriptor addresses the concrete dotted `path`.
    pub fn matches(&self, path: &str) -> bool {
        let pattern = self.path.split('.');
        let mut concrete = path.split('.');
        for segment in pattern {
            match concrete.next() {
                Some(part) if segment == "*" || segment == part => {}
                _ => return false,
            }
        }
        concrete.next().is_none()
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("field `{field}`: codec `{codec}` failed: {message}")]
    Codec {
        field: String,
        codec: String,
        message: String,
    },

    /// The document root is not a mapping but the type needs one.
    #[error("document root is {found}, expected a mapping")]
    NotAMapping { found: &'static str },

    #[error(transparent)]
    Serde(#[from] serde_yaml::Error),
}

impl DocumentError {
    pub(crate) fn codec(field: &FieldDescriptor, codec: &str, err: CodecError) -> Self {
        DocumentError::Codec {
            field: field.path().to_string(),
            codec: codec.to_string(),
            message: err.0,
        }
    }
}

/// Typed value → on-disk node, with codecs applied and comments attached.
pub fn encode<T: Document>(value: &T, codecs: &CodecSet) -> Result<Node, DocumentError> {
    let fields = T::fields();
    let mut root = Node::from(serde_yaml::to_value(value)?);
    codecs.encode_fields(&mut root, &fields)?;
    attach_comments(&mut root, &fields);
    Ok(root)
}

/// On-disk node → typed value.
pub fn decode<T: Document>(root: &Node, codecs: &CodecSet) -> Result<T, DocumentError> {
    let fields = T::fields();
    let mut root = root.clone();
    codecs.decode_fields(&mut root, &fields)?;
    Ok(serde_yaml::from_value(root.to_value())?)
}

/// Copy the type's defaults into `root` and attach field comments.
/// Returns true if any value was added.
pub fn backfill<T: Document>(root: &mut Node, codecs: &CodecSet) -> Result<bool, DocumentError> {
    let fields = T::fields();
    let defaults = encode(&T::default(), codecs)?;
    let is_atomic = |path: &str| fields.iter().any(|f| f.is_atomic() && f.matches(path));
    let changed = root.merge_defaults(&defaults, &is_atomic);

    if defaults.entries().is_some() && root.entries().is_none() {
        return Err(DocumentError::NotAMapping {
            found: describe(root),
        });
    }
    // Field comments also reach entries the defaults do not have.
    attach_comments(root, &fields);
    Ok(changed)
}

fn attach_comments(root: &mut Node, fields: &[FieldDescriptor]) {
    for field in fields {
        let Some(comment) = field.comment_text() else {
            continue;
        };
        let _ = root.for_each_at::<()>(&field.segments(), &mut |node| {
            node.set_comment(Some(comment.to_string()));
            Ok(())
        });
    }
}

fn describe(node: &Node) -> &'static str {
    match node.value() {
        NodeValue::Null => "empty",
        NodeValue::Scalar(_) => "a scalar",
        NodeValue::Sequence(_) => "a list",
        NodeValue::Mapping(_) => "a mapping",
    }
}

/// A document with no schema: any mapping, key order kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Untyped(pub serde_yaml::Mapping);

impl Document for Untyped {
    const KIND: &'static str = "untyped";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Scalar;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Lobby {
        name: String,
        max_players: u32,
        spawn: Spawn,
        kits: BTreeMap<String, u32>,
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Spawn {
        world: String,
        y: f64,
    }

    impl Default for Lobby {
        fn default() -> Self {
            Self {
                name: "lobby".into(),
                max_players: 20,
                spawn: Spawn {
                    world: "world".into(),
                    y: 64.0,
                },
                kits: BTreeMap::from([("starter".to_string(), 1)]),
            }
        }
    }

    impl Document for Lobby {
        const KIND: &'static str = "lobby";

        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::new("name").comment("Shown in the server list"),
                FieldDescriptor::new("max_players").codec("int"),
                FieldDescriptor::new("kits").atomic(),
            ]
        }
    }

    #[test]
    fn test_encode_attaches_comments_in_field_order() {
        let node = encode(&Lobby::default(), &CodecSet::builtin()).unwrap();
        let keys: Vec<_> = node.entries().unwrap().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["name", "max_players", "spawn", "kits"]);
        assert_eq!(node.get("name").unwrap().comment(), Some("Shown in the server list"));
    }

    #[test]
    fn test_decode_uses_codecs() {
        let root = Node::mapping(vec![("max_players".into(), Node::scalar("50"))]);
        let lobby: Lobby = decode(&root, &CodecSet::builtin()).unwrap();
        assert_eq!(lobby.max_players, 50);
        assert_eq!(lobby.name, "lobby");
    }

    #[test]
    fn test_backfill_fills_missing_and_nested_fields() {
        let codecs = CodecSet::builtin();
        let mut root = Node::mapping(vec![
            ("name".into(), Node::scalar("hub")),
            ("spawn".into(), Node::mapping(vec![("world".into(), Node::scalar("nether"))])),
        ]);
        assert!(backfill::<Lobby>(&mut root, &codecs).unwrap());
        assert_eq!(root.lookup("spawn.y").and_then(Node::as_scalar), Some(&Scalar::Float(64.0)));
        assert_eq!(root.lookup("spawn.world").and_then(Node::as_scalar), Some(&Scalar::from("nether")));
        assert!(!backfill::<Lobby>(&mut root, &codecs).unwrap());
    }

    #[test]
    fn test_backfill_leaves_atomic_maps_alone() {
        let codecs = CodecSet::builtin();
        let mut root = encode(&Lobby::default(), &codecs).unwrap();
        root.insert("kits", Node::mapping(vec![("vip".into(), Node::scalar(3i64))]));
        assert!(!backfill::<Lobby>(&mut root, &codecs).unwrap());
        let lobby: Lobby = decode(&root, &codecs).unwrap();
        assert_eq!(lobby.kits, BTreeMap::from([("vip".to_string(), 3)]));
    }

    #[test]
    fn test_backfill_rejects_scalar_root() {
        let mut root = Node::scalar("just text");
        let err = backfill::<Lobby>(&mut root, &CodecSet::builtin()).unwrap_err();
        assert!(matches!(err, DocumentError::NotAMapping { .. }));
    }

    #[test]
    fn test_descriptor_matching() {
        let field = FieldDescriptor::new("rewards.*.item");
        assert!(field.matches("rewards.first.item"));
        assert!(!field.matches("rewards.first"));
        assert!(!field.matches("rewards.first.item.extra"));
    }

    #[test]
    fn test_untyped_round_trip() {
        let mut root = Node::mapping(vec![("b".into(), Node::scalar(1i64)), ("a".into(), Node::scalar("x"))]);
        let codecs = CodecSet::builtin();
        backfill::<Untyped>(&mut root, &codecs).unwrap();
        let doc: Untyped = decode(&root, &codecs).unwrap();
        let back = encode(&doc, &codecs).unwrap();
        assert_eq!(back, root);
    }
}
