//! A deliberately small HTTP/1.x server on top of [`NetServer`].
//!
//! Request line and headers only, one request per connection, every
//! response sent with `Connection: close`.
//!
//! [`NetServer`]: crate::net::NetServer

mod request;
mod response;
mod server;

pub use request::{HttpServerRequest, MAX_HEAD_SIZE};
pub use response::HttpServerResponse;
pub use server::{HttpServer, RequestHandler};
