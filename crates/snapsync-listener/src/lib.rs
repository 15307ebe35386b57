//! Asynchronous operation tracking for snapsync.
//!
//! The snapshot cache's async contracts are exercised by tests that need a
//! join point: "every operation the host kicked off has drained". The
//! [`OperationListener`] provides it — a counter of in-flight operations
//! with droppable tokens and futures that resolve on the next zero
//! transition.

pub mod listener;

pub use listener::{ListenerConfig, OperationListener, OperationRecord, OperationToken};
