//! Server binary: reads `PORT` from the environment and runs until
//! terminated.

use fourline::{FourlineError, FourlineServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), FourlineError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3000);

    let server = FourlineServer::builder()
        .bind(&format!("0.0.0.0:{port}"))
        .build()
        .await?;

    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await
}
