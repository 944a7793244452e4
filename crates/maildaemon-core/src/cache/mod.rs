//! Per-connection mirror of remote folders and messages.
//!
//! The mirror is rebuilt by polling: each update diffs the server's current
//! folder list and message identifiers against what is already known and
//! fetches only what is new. Nothing is persisted.

mod model;
mod sync;

pub use model::{CacheState, Folder, NOSELECT};
pub use sync::EmailCache;
