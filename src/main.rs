use anyhow::Context;
use serde_json::json;
use warden::config::Config;
use warden::router::RequestRouter;
use warden::server::Server;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    let mut router = RequestRouter::new();
    router
        .register("/health", |_| Ok(json!({ "status": "ok" }).to_string().into_bytes()))
        .register("/echo", |body| Ok(body.to_vec()));

    let mut server = Server::new(&cfg, router.into_handler())
        .with_context(|| format!("cannot start server on {}", cfg.server.listen_addr()))?;

    let signal = server.run()?;
    tracing::info!(signal, "Shutdown signal received");

    Ok(())
}
