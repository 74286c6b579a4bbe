//! geoalert event intake and alert worker infrastructure.
//!
//! - [`webhook`] — binds an HTTP server and receives map-producer webhook
//!   deliveries (single envelopes or batches). Every envelope is pushed through
//!   the [`ingest::Ingestor`] into the shared event queue.
//!
//! - [`worker`] — a pool of Tokio tasks draining the event queue into an
//!   [`AlertDispatcher`]. Concrete notification backends live outside this
//!   crate; [`LogDispatcher`] records alerts through `tracing`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details, request limits, and worker lifecycle
//! all live here. The [`ingest`] crate sees none of it.

pub mod errors;
pub mod webhook;
pub mod worker;

pub use errors::{DispatchError, ListenerError};
pub use webhook::{build_router, serve, DeliverySummary};
pub use worker::{AlertDispatcher, LogDispatcher, WorkerPool};
