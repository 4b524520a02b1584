//! Serve command - run the HTTP API.

use clap::Args;
use console::style;
use tracing::info;

use docsift_server::{create_router, AppState};

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(short, long, default_value_t = 8000)]
    port: u16,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    println!("{} Loading pipeline models...", style("ℹ").blue());
    let pipeline = super::build_pipeline(&config)?;

    let app = create_router(AppState { pipeline });

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);
    println!("{} Serving on http://{}", style("✓").green(), addr);

    axum::serve(listener, app).await?;
    Ok(())
}
