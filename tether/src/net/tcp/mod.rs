//! TCP sockets driven by the runtime reactor.
//!
//! It is split into:
//! - [`listener`]: accepting incoming TCP connections,
//! - [`stream`]: reading and writing connected sockets.

pub mod listener;
pub mod stream;
