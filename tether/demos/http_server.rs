//! Example: a small HTTP server answering every request with a fixed page.
//!
//! Run with `RUST_LOG=info cargo run --example http_server`, then point a
//! browser at http://127.0.0.1:8080.

use tether::RuntimeBuilder;
use tether::http::HttpServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

const PAGE: &str = "<html><body><h1>Hello from tether!</h1></body></html>";

fn main() -> Result<(), tether::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let runtime = RuntimeBuilder::from_env()?.build()?;
    let server = HttpServer::new(runtime.handle());

    server.request_handler(|request| {
        info!(method = request.method(), uri = request.uri(), "request");

        for (name, value) in request.headers() {
            info!("  {name}: {value}");
        }

        request
            .response
            .put_header("Content-Type", "text/html; charset=UTF-8")
            .end(PAGE);

        Ok(())
    });

    let address = server.listen("127.0.0.1:8080")?;
    info!(%address, "listening");

    loop {
        std::thread::park();
    }
}
