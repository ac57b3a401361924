//! PairLink Runtime
//!
//! The engine behind a PairLink device: a session task owning all mutable
//! state, a link manager driving the peer connection lifecycle, a call
//! tracker for signaling, and an in-memory transport for tests and demos.
//! Boundary types live in `pairlink-core`; view layers talk to a running
//! [`PairlinkRuntime`] exclusively through commands and app events.

pub mod call;
pub mod link;
pub mod memory;
pub mod runtime;
pub mod session;
pub mod sync;

pub use call::CallTracker;
pub use link::{LinkManager, LinkState};
pub use memory::{MemoryHub, MemoryTransport};
pub use runtime::PairlinkRuntime;
pub use session::SessionTask;
pub use sync::apply_inbound;
