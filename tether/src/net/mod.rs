//! TCP networking.
//!
//! This module provides:
//! - [`TcpListener`] and [`TcpStream`], non-blocking sockets driven by the
//!   runtime reactor,
//! - [`NetServer`], an accept loop that gives every connection its own
//!   execution context.
//!
//! These types integrate directly with the runtime and should be
//! used instead of blocking `std::net` sockets on event loops.

mod server;
mod tcp;

pub use server::{ConnectHandler, NetServer, NetSocket};
pub use tcp::listener::TcpListener;
pub use tcp::stream::TcpStream;
