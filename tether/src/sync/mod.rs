//! Synchronization between event loops and the threads observing them.
//!
//! - [`CompletionLatch`]: a one-shot, broadcast completion signal that a
//!   plain thread can wait on with a timeout, and an event loop can await.

mod latch;

pub use latch::{CompletionLatch, Settled};
