//! Per-document-type codec registration.

use std::any::TypeId;
use std::sync::Arc;
use dashmap::DashMap;

use crate::codec::{CodecFactory, CodecSet};
use crate::document::Document;
use crate::error::StoreError;
use crate::report::{ErrorReporter, FailureKind};

/// Builds and caches the codec set of each document type.
///
/// A type's codecs are the built-ins, then the factories the type declares
/// through [`Document::codecs`], then any registered at runtime with
/// [`SerializerRegistry::register`]. A factory that fails to build is
/// reported and skipped.
pub struct SerializerRegistry {
    extra: DashMap<TypeId, Vec<CodecFactory>>,
    built: DashMap<TypeId, Arc<CodecSet>>,
    reporter: ErrorReporter,
}

impl SerializerRegistry {
    pub fn new(reporter: ErrorReporter) -> Self {
        Self {
            extra: DashMap::new(),
            built: DashMap::new(),
            reporter,
        }
    }

    /// Add a codec for `T` on top of those it declares.
    pub fn register<T: Document>(&self, factory: CodecFactory) {
        let id = TypeId::of::<T>();
        self.extra.entry(id).or_default().push(factory);
        self.built.remove(&id);
    }

    /// The codec set for `T`, built on first use.
    pub fn codecs_for<T: Document>(&self) -> Arc<CodecSet> {
        let id = TypeId::of::<T>();
        if let Some(set) = self.built.get(&id) {
            return Arc::clone(set.value());
        }

        let mut set = CodecSet::builtin();
        let extra = self
            .extra
            .get(&id)
            .map(|factories| factories.value().clone())
            .unwrap_or_default();

        for factory in T::codecs().into_iter().chain(extra) {
            match factory.build() {
                Ok(codec) => {
                    tracing::debug!(kind = T::KIND, codec = factory.name(), "Codec registered");
                    set.insert(codec);
                }
                Err(e) => {
                    let err = StoreError::CodecRegistration {
                        kind: T::KIND.to_string(),
                        codec: factory.name().to_string(),
                        reason: e.to_string(),
                    };
                    self.reporter.report(FailureKind::CodecRegistration, None, &err);
                }
            }
        }

        for field in T::fields() {
            if let Some(codec) = field.codec_name() {
                if !set.contains(codec) {
                    tracing::warn!(
                        kind = T::KIND,
                        field = field.path(),
                        codec,
                        "Field refers to an unknown codec; using built-in handling"
                    );
                }
            }
        }

        let set = Arc::new(set);
        self.built.insert(id, Arc::clone(&set));
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecError, ScalarCodec};
    use crate::document::FieldDescriptor;
    use crate::node::{Node, Scalar};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default)]
    struct UpperCodec;

    impl ScalarCodec for UpperCodec {
        fn name(&self) -> &str {
            "upper"
        }

        fn decode(&self, scalar: &Scalar) -> Result<Node, CodecError> {
            Ok(Node::scalar(scalar.as_text().to_lowercase()))
        }

        fn encode(&self, node: &Node) -> Result<Scalar, CodecError> {
            Ok(Scalar::Str(node.as_scalar().map(Scalar::as_text).unwrap_or_default().to_uppercase()))
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Shouting {
        word: String,
    }

    impl Document for Shouting {
        const KIND: &'static str = "shouting";

        fn fields() -> Vec<FieldDescriptor> {
            vec![FieldDescriptor::new("word").codec("upper")]
        }

        fn codecs() -> Vec<CodecFactory> {
            vec![
                CodecFactory::of::<UpperCodec>(),
                CodecFactory::new("broken", || Err(CodecError::new("missing native library"))),
            ]
        }
    }

    #[test]
    fn test_declared_codecs_are_built_and_failures_reported() {
        let reporter = ErrorReporter::new();
        let mut failures = reporter.subscribe();
        let registry = SerializerRegistry::new(reporter);

        let set = registry.codecs_for::<Shouting>();
        assert!(set.contains("upper"));
        assert!(set.contains("string"));
        assert!(!set.contains("broken"));

        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.kind, FailureKind::CodecRegistration);
        assert!(failure.message.contains("broken"));
    }

    #[test]
    fn test_sets_are_cached_until_registration() {
        let registry = SerializerRegistry::new(ErrorReporter::new());
        let first = registry.codecs_for::<Shouting>();
        let second = registry.codecs_for::<Shouting>();
        assert!(Arc::ptr_eq(&first, &second));

        registry.register::<Shouting>(CodecFactory::new("extra", || {
            Ok(Arc::new(UpperCodec) as Arc<dyn ScalarCodec>)
        }));
        let third = registry.codecs_for::<Shouting>();
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
