//! Inbound packet queues for cyclenet.
//!
//! The receive side decodes each datagram and pushes it into the queue for
//! its kind. Once per tick the simulation reads those queues in one of two
//! styles:
//!
//! - **FIFO** (`dequeue` / `drain`): every message matters, in order.
//!   Join requests, inputs, realize requests, snapshots.
//! - **Latest-wins** (`latest`): only the newest matters. Weather sync.
//!
//! Queues are bounded. A full FIFO queue rejects the newest message; a full
//! latest-wins queue evicts its oldest. Either way the drop is counted and
//! logged.

mod queue;
mod registry;

pub use queue::{Drain, Enqueued, InboundQueue, Overflow};
pub use registry::{InboundRegistry, QueueConfig};
