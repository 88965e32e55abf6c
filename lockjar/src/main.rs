// lockjar/src/main.rs
use std::{fs, process};

use clap::Parser;
use colored::Colorize;
use lockjar_common::config::Config;
use tracing::{debug, error};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::CliArgs;

fn init_tracing(config: &Config, verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let max_log_level = level_filter.into_level().unwrap_or(tracing::Level::INFO);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("LOCKJAR_LOG")
        .from_env_lossy();

    let log_dir = config.logs_dir();
    if verbose > 0 && fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::daily(&log_dir, "lockjar.log");
        let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

        let stderr_writer = std::io::stderr.with_max_level(max_log_level);
        let file_writer = non_blocking_appender.with_max_level(max_log_level);

        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(stderr_writer.and(file_writer))
            .with_ansi(true)
            .without_time()
            .try_init();

        // Flushes on drop; must outlive every log call.
        Box::leak(Box::new(guard));

        debug!("Verbose logging enabled. Writing logs to: {}/lockjar.log", log_dir.display());
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", format!("Error: {message}").red().bold());
    process::exit(1);
}

#[tokio::main]
async fn main() {
    let cli_args = CliArgs::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => fail(e),
    };
    if cli_args.verbose > 0 {
        config.verbose = true;
    }
    init_tracing(&config, cli_args.verbose);
    debug!("Loaded config: {:?}", config);

    if let Err(e) = cli_args.command.run(&config).await {
        if e.is_fatal() {
            error!("Run aborted: {:?}", e);
        } else {
            debug!("Command failed: {:?}", e);
        }
        fail(e);
    }
    debug!("Command completed successfully.");
}
