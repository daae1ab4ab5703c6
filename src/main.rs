use clap::Parser;
use quorum::adapters::{LocalBlobStore, PostgresStore};
use quorum::cli::{self, Cli, Commands};
use quorum::config::{AppConfig, LoggingConfig};
use quorum::domain::AgendaStatus;
use quorum::error::{QuorumError, Result};
use quorum::services::DocumentGateway;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Migrate => {
            let config = AppConfig::load_from(&cli.config_dir)?;
            init_logging(&config.logging);
            let store = connect(&config).await?;
            store.migrate().await?;
            println!("✓ Migrations applied");
        }
        Commands::List { status } => {
            init_logging_simple();
            let config = AppConfig::load_from(&cli.config_dir)?;
            let status = status
                .as_deref()
                .map(AgendaStatus::try_from)
                .transpose()
                .map_err(QuorumError::Validation)?;
            let store = connect(&config).await?;
            cli::list_agendas(&store, status).await?;
        }
        Commands::Show { id } => {
            init_logging_simple();
            let config = AppConfig::load_from(&cli.config_dir)?;
            let store = connect(&config).await?;
            cli::show_agenda(&store, *id).await?;
        }
        Commands::History { id } => {
            init_logging_simple();
            let config = AppConfig::load_from(&cli.config_dir)?;
            let store = connect(&config).await?;
            cli::show_history(&store, *id).await?;
        }
        Commands::Sweep => {
            let config = AppConfig::load_from(&cli.config_dir)?;
            init_logging(&config.logging);
            let blobs = Arc::new(LocalBlobStore::new(
                &config.storage.root,
                config.storage.signing_key.clone(),
            ));
            let gateway = DocumentGateway::new(blobs, config.access.clone());
            cli::sweep_scratch(&gateway).await?;
        }
        Commands::CheckConfig => {
            init_logging_simple();
            let config = AppConfig::load_from(&cli.config_dir)?;
            cli::check_config(&config)?;
        }
    }

    Ok(())
}

async fn connect(config: &AppConfig) -> Result<PostgresStore> {
    PostgresStore::new(&config.database.url, config.database.max_connections).await
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.level)));

    // JSON mode logs to stdout only
    if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
        return;
    }

    let file_layer = config.file_dir.as_ref().and_then(|dir| {
        // tracing_appender::rolling::daily panics if it cannot create the
        // initial log file, so preflight writability first.
        if std::fs::create_dir_all(dir).is_err() {
            eprintln!(
                "Warning: could not create log directory {}, file logging disabled",
                dir.display()
            );
            return None;
        }
        let test_path = dir.join(".quorum_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                let file_appender = tracing_appender::rolling::daily(dir, "quorum.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive for the lifetime of the process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: could not write to log directory {} ({}), file logging disabled",
                    dir.display(),
                    e
                );
                None
            }
        }
    });

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}

fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
