//! Scalar codecs.
//!
//! # Responsibilities
//! - Convert an on-disk scalar into the structured node a type deserializes from
//! - Convert a serialized structured node back into a single scalar
//! - Apply codecs at the paths named by a document's field descriptors
//!
//! # Design Decisions
//! - Codecs are looked up by name, so a missing custom codec degrades to
//!   built-in handling instead of failing the load
//! - Built-in codecs coerce between scalar kinds (`"12"` → `12` for `int`)

pub mod registry;

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::document::{DocumentError, FieldDescriptor};
use crate::node::{Node, NodeValue, Scalar};

pub use registry::SerializerRegistry;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Encoder/decoder for one scalar representation.
pub trait ScalarCodec: Send + Sync {
    /// Name that field descriptors use to refer to this codec.
    fn name(&self) -> &str;

    /// On-disk scalar → node handed to deserialization.
    fn decode(&self, scalar: &Scalar) -> Result<Node, CodecError>;

    /// Serialized node → on-disk scalar.
    fn encode(&self, node: &Node) -> Result<Scalar, CodecError>;
}

type BuildFn = dyn Fn() -> Result<Arc<dyn ScalarCodec>, CodecError> + Send + Sync;

/// Deferred construction of a codec; building may fail.
#[derive(Clone)]
pub struct CodecFactory {
    name: String,
    build: Arc<BuildFn>,
}

impl CodecFactory {
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ScalarCodec>, CodecError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(build),
        }
    }

    /// Factory for a codec that needs no setup.
    pub fn of<C: ScalarCodec + Default + 'static>() -> Self {
        let name = C::default().name().to_string();
        Self::new(name, || Ok(Arc::new(C::default()) as Arc<dyn ScalarCodec>))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self) -> Result<Arc<dyn ScalarCodec>, CodecError> {
        (self.build)()
    }
}

impl std::fmt::Debug for CodecFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecFactory").field("name", &self.name).finish()
    }
}

/// The codecs available to one document type.
#[derive(Clone, Default)]
pub struct CodecSet {
    codecs: HashMap<String, Arc<dyn ScalarCodec>>,
}

impl CodecSet {
    /// The built-in scalar codecs: `string`, `int`, `float`, `bool`.
    pub fn builtin() -> Self {
        let mut set = Self::default();
        set.insert(Arc::new(StringCodec));
        set.insert(Arc::new(IntCodec));
        set.insert(Arc::new(FloatCodec));
        set.insert(Arc::new(BoolCodec));
        set
    }

    /// Add a codec, replacing any codec with the same name.
    pub fn insert(&mut self, codec: Arc<dyn ScalarCodec>) {
        self.codecs.insert(codec.name().to_string(), codec);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ScalarCodec>> {
        self.codecs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.codecs.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Decode every scalar addressed by a field descriptor that names a codec.
    pub fn decode_fields(&self, root: &mut Node, fields: &[FieldDescriptor]) -> Result<(), DocumentError> {
        for (field, codec) in self.bound(fields) {
            let segments = field.segments();
            root.for_each_at::<DocumentError>(&segments, &mut |node| {
                let Some(scalar) = node.as_scalar() else {
                    return Ok(());
                };
                let decoded = codec
                    .decode(scalar)
                    .map_err(|e| DocumentError::codec(field, codec.name(), e))?;
                node.replace_value(decoded.value().clone());
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Encode every node addressed by a field descriptor that names a codec.
    pub fn encode_fields(&self, root: &mut Node, fields: &[FieldDescriptor]) -> Result<(), DocumentError> {
        for (field, codec) in self.bound(fields) {
            let segments = field.segments();
            root.for_each_at::<DocumentError>(&segments, &mut |node| {
                if node.is_null() {
                    return Ok(());
                }
                let scalar = codec
                    .encode(node)
                    .map_err(|e| DocumentError::codec(field, codec.name(), e))?;
                node.replace_value(NodeValue::Scalar(scalar));
                Ok(())
            })?;
        }
        Ok(())
    }

    fn bound<'a>(
        &'a self,
        fields: &'a [FieldDescriptor],
    ) -> impl Iterator<Item = (&'a FieldDescriptor, &'a Arc<dyn ScalarCodec>)> + 'a {
        fields
            .iter()
            .filter_map(move |field| Some((field, self.get(field.codec_name()?)?)))
    }
}

fn scalar_of(node: &Node) -> Result<&Scalar, CodecError> {
    node.as_scalar()
        .ok_or_else(|| CodecError::new("expected a scalar value"))
}

/// Any scalar as its text.
#[derive(Debug, Default)]
pub struct StringCodec;

impl ScalarCodec for StringCodec {
    fn name(&self) -> &str {
        "string"
    }

    fn decode(&self, scalar: &Scalar) -> Result<Node, CodecError> {
        Ok(Node::scalar(scalar.as_text()))
    }

    fn encode(&self, node: &Node) -> Result<Scalar, CodecError> {
        Ok(Scalar::Str(scalar_of(node)?.as_text()))
    }
}

#[derive(Debug, Default)]
pub struct IntCodec;

impl ScalarCodec for IntCodec {
    fn name(&self) -> &str {
        "int"
    }

    fn decode(&self, scalar: &Scalar) -> Result<Node, CodecError> {
        let value = match scalar {
            Scalar::Int(i) => *i,
            Scalar::Float(f) if f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f) => *f as i64,
            Scalar::UInt(u) => i64::try_from(*u)
                .map_err(|_| CodecError::new(format!("`{}` is out of range for an integer", u)))?,
            Scalar::Str(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| CodecError::new(format!("`{}` is not an integer", s)))?,
            other => return Err(CodecError::new(format!("`{}` is not an integer", other.as_text()))),
        };
        Ok(Node::scalar(value))
    }

    fn encode(&self, node: &Node) -> Result<Scalar, CodecError> {
        scalar_of(node).cloned()
    }
}

#[derive(Debug, Default)]
pub struct FloatCodec;

impl ScalarCodec for FloatCodec {
    fn name(&self) -> &str {
        "float"
    }

    fn decode(&self, scalar: &Scalar) -> Result<Node, CodecError> {
        let value = match scalar {
            Scalar::Float(f) => *f,
            Scalar::Int(i) => *i as f64,
            Scalar::UInt(u) => *u as f64,
            Scalar::Str(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| CodecError::new(format!("`{}` is not a number", s)))?,
            Scalar::Bool(b) => return Err(CodecError::new(format!("`{}` is not a number", b))),
        };
        Ok(Node::scalar(value))
    }

    fn encode(&self, node: &Node) -> Result<Scalar, CodecError> {
        scalar_of(node).cloned()
    }
}

#[derive(Debug, Default)]
pub struct BoolCodec;

impl ScalarCodec for BoolCodec {
    fn name(&self) -> &str {
        "bool"
    }

    fn decode(&self, scalar: &Scalar) -> Result<Node, CodecError> {
        let value = match scalar {
            Scalar::Bool(b) => *b,
            Scalar::Int(0) => false,
            Scalar::Int(1) => true,
            Scalar::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => true,
                "false" | "no" | "off" | "0" => false,
                _ => return Err(CodecError::new(format!("`{}` is not a boolean", s))),
            },
            other => return Err(CodecError::new(format!("`{}` is not a boolean", other.as_text()))),
        };
        Ok(Node::scalar(value))
    }

    fn encode(&self, node: &Node) -> Result<Scalar, CodecError> {
        scalar_of(node).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        assert_eq!(CodecSet::builtin().names(), vec!["bool", "float", "int", "string"]);
    }

    #[test]
    fn test_int_coercion() {
        let codec = IntCodec;
        assert_eq!(codec.decode(&Scalar::from(" 42 ")).unwrap(), Node::scalar(42i64));
        assert_eq!(codec.decode(&Scalar::Float(3.0)).unwrap(), Node::scalar(3i64));
        assert!(codec.decode(&Scalar::from("four")).is_err());
        assert!(codec.decode(&Scalar::Float(3.5)).is_err());
        assert!(codec.decode(&Scalar::Float(1e30)).is_err());
        assert!(codec.decode(&Scalar::Float(-1e19)).is_err());
        assert!(codec.decode(&Scalar::UInt(u64::MAX)).is_err());
    }

    #[test]
    fn test_bool_coercion() {
        let codec = BoolCodec;
        assert_eq!(codec.decode(&Scalar::from("Yes")).unwrap(), Node::scalar(true));
        assert_eq!(codec.decode(&Scalar::Int(0)).unwrap(), Node::scalar(false));
        assert!(codec.decode(&Scalar::from("maybe")).is_err());
    }

    #[test]
    fn test_string_codec_accepts_any_scalar() {
        let codec = StringCodec;
        assert_eq!(codec.decode(&Scalar::Int(7)).unwrap(), Node::scalar("7"));
        assert_eq!(codec.encode(&Node::scalar(true)).unwrap(), Scalar::from("true"));
        assert!(codec.encode(&Node::mapping(vec![])).is_err());
    }

    #[test]
    fn test_decode_fields_applies_at_wildcard_paths() {
        let set = CodecSet::builtin();
        let fields = vec![FieldDescriptor::new("ports.*").codec("int")];
        let mut root = Node::mapping(vec![(
            "ports".into(),
            Node::sequence(vec![Node::scalar("80"), Node::scalar(443i64)]),
        )]);
        set.decode_fields(&mut root, &fields).unwrap();
        let ports = root.get("ports").unwrap();
        assert_eq!(
            ports,
            &Node::sequence(vec![Node::scalar(80i64), Node::scalar(443i64)])
        );
    }

    #[test]
    fn test_unknown_codec_is_ignored() {
        let set = CodecSet::builtin();
        let fields = vec![FieldDescriptor::new("name").codec("does-not-exist")];
        let mut root = Node::mapping(vec![("name".into(), Node::scalar(5i64))]);
        set.decode_fields(&mut root, &fields).unwrap();
        assert_eq!(root.get("name"), Some(&Node::scalar(5i64)));
    }

    #[test]
    fn test_decode_failure_names_field() {
        let set = CodecSet::builtin();
        let fields = vec![FieldDescriptor::new("port").codec("int")];
        let mut root = Node::mapping(vec![("port".into(), Node::scalar("http"))]);
        let err = set.decode_fields(&mut root, &fields).unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_factory_of() {
        let factory = CodecFactory::of::<BoolCodec>();
        assert_eq!(factory.name(), "bool");
        assert_eq!(factory.build().unwrap().name(), "bool");
    }
}
