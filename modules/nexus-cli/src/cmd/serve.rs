use anyhow::{Context, Result};
use console::style;

pub async fn run(host: &str, port: u16) -> Result<()> {
    eprintln!("{}", style("Starting Nexus API server...").green().bold());

    let port = port_override(std::env::var("PORT").ok().as_deref()).unwrap_or(port);
    let addr = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve {host}:{port}"))?
        .next()
        .with_context(|| format!("No address for {host}:{port}"))?;

    nexus_api::serve(nexus_api::create_app(), addr).await
}

/// `PORT` wins over `--port` when it holds a valid port number.
fn port_override(value: Option<&str>) -> Option<u16> {
    value.and_then(|v| v.trim().parse().ok())
}
