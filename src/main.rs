use pdf_chat::config::Config;
use pdf_chat::server::run_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // .env is optional; real environment variables take precedence.
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        tracing::warn!("failed to load .env: {e}");
    }

    tracing::info!("pdf-chat starting");

    let config = Config::load()?;
    run_server(config).await?;

    tracing::info!("pdf-chat shutting down");
    Ok(())
}
