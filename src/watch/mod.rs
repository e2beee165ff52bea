//! File watching for live reload.
//!
//! # Data Flow
//! ```text
//! OS notification (notify::RecommendedWatcher, one per context)
//!     → event handler (filters change events, forwards paths)
//!     → dispatcher thread (coalesces bursts per path)
//!     → registration lookup by canonical file path
//!     → reload callback of the owning ConfigReference
//! ```
//!
//! # Design Decisions
//! - Parent directories are watched, not files, so editors that replace the
//!   file by rename are still seen
//! - One registration per path; registering again replaces the callback
//! - A failed path stops reloading without affecting any other path
//! - Without an OS watcher every registration is load-once

pub mod context;
pub mod state;

pub use context::{ReloadCallback, WatchHandle, WatchOptions, WatcherContext};
pub use state::WatchState;
