use anyhow::Context;
use gdrive_syncd::daemon::{DaemonConfig, DaemonRuntime};
use gdrive_syncd::storage::CredentialStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    Logout,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--logout" => mode = CliMode::Logout,
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gdrive_syncd=info,gdrive_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match parse_cli_mode(std::env::args())? {
        CliMode::Logout => {
            let config = DaemonConfig::from_env()?;
            let store = CredentialStore::new(&config.credentials_path);
            store
                .delete()
                .with_context(|| format!("failed to remove {:?}", store.path()))?;
            tracing::info!(path = %store.path().display(), "saved credentials removed");
            return Ok(());
        }
        CliMode::Help => {
            println!("Usage: gdrive-syncd [--logout]");
            println!("  --logout   Remove saved OAuth credentials and exit");
            println!();
            println!("Watches GDRIVE_WATCH_DIR (default ~/Media) and uploads new files to Google Drive.");
            return Ok(());
        }
        CliMode::Run => {}
    }
    let config = DaemonConfig::from_env()?;
    let daemon = DaemonRuntime::bootstrap(config).await?;
    daemon.run().await
}
