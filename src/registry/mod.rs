//! Stream session registry
//!
//! The registry owns every relayed stream: it validates the config, binds the
//! source, spawns the stream's tasks and tears them down again.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<StreamRegistry>
//!                     ┌──────────────────────────┐
//!                     │ streams: HashMap<Id,     │
//!                     │   Arc<StreamEntry {      │
//!                     │     ctx: state, cancel,  │
//!                     │     tasks,               │
//!                     │   }>                     │
//!                     │ >                        │
//!                     │ store: Arc<SegmentStore> │
//!                     └────────────┬─────────────┘
//!                                  │ start()
//!         ┌────────────────────────┼────────────────────────┐
//!         ▼                        ▼                        ▼
//!     [capture]                 [gate]                  [sweeper]
//!     store.put()         store.peek/remove()     store.purge_older_than()
//!                          sink.deliver()
//! ```
//!
//! # Shutdown
//!
//! `stop()` cancels the stream's token, awaits all three tasks and purges the
//! stream's segments before the entry is removed. Streams that fail on their
//! own are finalized the same way by the cleanup task.

pub mod config;
pub mod entry;
pub mod error;
pub mod store;

pub use config::RelayConfig;
pub use entry::{StreamEntry, StreamInfo};
pub use error::RegistryError;
pub use store::StreamRegistry;
