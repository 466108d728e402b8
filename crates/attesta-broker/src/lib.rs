//! Attesta Broker — the message/queue service seam.
//!
//! The pipeline talks to a shared broker through the [`Broker`] trait: a
//! publish/subscribe channel plus the keyed auxiliary structures backing the
//! retry set, the dead-letter list, the failed-event list, and the sync
//! timeline. [`MemoryBroker`] is the in-process implementation used for
//! development and tests; production deployments back the trait with a
//! shared queue service.

pub mod broker;
pub mod error;
pub mod memory;

pub use broker::Broker;
pub use error::BrokerError;
pub use memory::MemoryBroker;
