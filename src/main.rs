//! admitdesk service entry point.
//!
//! Initializes configuration, storage, services, and starts the HTTP server.

use admitdesk::run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run().await
}
