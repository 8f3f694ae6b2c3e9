//! Real-time race session core.
//!
//! - `store` - registry of live sessions, one lock per session
//! - `participants` - join / leave / ready bookkeeping
//! - `lifecycle` - the WAITING → ACTIVE → FINISHED state machine
//! - `snapshot` - read views with identity redaction
//! - `notifier` - per-race event channels for the socket layer
//! - `archive` - durable copy through an external store
//! - `manager` - commits changes, then publishes and archives them

pub mod archive;
pub mod lifecycle;
pub mod manager;
pub mod notifier;
pub mod participants;
pub mod snapshot;
pub mod store;
