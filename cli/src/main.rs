use clap::Parser;
mod app;
mod commands;
mod http;
use commands::cli;
use prorab_core::api::{AppContext, EngineError};
use prorab_plugins::factory::DefaultServicesFactory;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, EngineError> {
    let args = cli::Args::parse();
    let cfg = prorab_core::api::load_default().map_err(|e| EngineError::Config(e.to_string()))?;
    init_tracing(&cfg.logging).map_err(EngineError::Config)?;

    let ctx = AppContext::new(cfg, Some(Arc::new(DefaultServicesFactory)));

    match args.command {
        Some(cli::Commands::Serve(serve_args)) => {
            http::handle_serve(serve_args, &ctx).await?;
            Ok(0)
        }
        Some(cli::Commands::Ask(ask_args)) => app::run_ask(ask_args, &ctx).await,
        Some(cli::Commands::Keys) => Ok(app::run_keys(&ctx)),
        None => {
            // Bare invocation starts the server with config-file defaults.
            http::handle_serve(
                cli::ServeArgs {
                    host: "127.0.0.1".into(),
                    port: 8080,
                    session_id: None,
                },
                &ctx,
            )
            .await?;
            Ok(0)
        }
    }
}

fn exit_code_for_error(e: &EngineError) -> i32 {
    // 0: success
    // 11: config error
    // 20: IO error
    // 50: internal/uncategorized
    match e {
        EngineError::Config(_) | EngineError::InvalidRequest(_) => 11,
        EngineError::Io(_) => 20,
        _ => 50,
    }
}

fn init_tracing(logging: &prorab_core::api::LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("prorab"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("prorab.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
