//! Live configuration store.
//!
//! Typed documents backed by YAML files: each file is bound to a serde type,
//! filled with the type's defaults, written back in canonical form and
//! reloaded in place when it changes on disk.
//!
//! ```text
//! ConfigStore
//!   ├─ path        template → concrete path
//!   ├─ directory   seed defaults, load every file of a tree
//!   ├─ reference   file ⇄ NodeTree ⇄ Arc<T>
//!   │    ├─ node       YAML tree, header and comments
//!   │    ├─ document   schema, codecs, default backfill
//!   │    └─ persist    atomic writes
//!   ├─ watch       one OS watcher, debounced callbacks
//!   ├─ codec       per-type scalar codecs
//!   └─ report      failures that never reach host code
//! ```

pub mod codec;
pub mod directory;
pub mod document;
pub mod error;
pub mod node;
pub mod observability;
pub mod path;
mod persist;
pub mod reference;
pub mod report;
pub mod settings;
pub mod store;
pub mod watch;

pub use codec::{CodecError, CodecFactory, CodecSet, ScalarCodec, SerializerRegistry};
pub use directory::DefaultConfig;
pub use document::{Document, FieldDescriptor, Untyped};
pub use error::{StoreError, StoreResult};
pub use node::{Node, NodeTree, NodeValue, Scalar, Style};
pub use path::{resolve, Substitution};
pub use reference::ConfigReference;
pub use report::{ErrorReporter, Failure, FailureKind};
pub use settings::StoreSettings;
pub use store::ConfigStore;
pub use watch::{WatchOptions, WatchState, WatcherContext};
