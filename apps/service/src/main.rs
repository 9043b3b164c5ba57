#![warn(clippy::all)]

mod cli;
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use urlcheck::{
    HttpChecker, Lifecycle, Notifier, ScheduleRegistry, SmtpMailer, StatisticsLine,
    StatisticsRegistry, TlsTrustPolicy, load_checks_file,
};

use cli::Cli;
use config::Config;

fn main() -> ExitCode {
    // Password indirections may point at variables from a local .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logger::init_tracing_with_verbosity(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Scheduler not started: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(report) => {
            for line in report {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Vec<StatisticsLine>> {
    let mut config = Config::from_config(cli.config.as_ref()).context("Loading settings")?;
    cli.apply(&mut config);
    if cli.show_config {
        println!("{config}");
    }

    let loaded = load_checks_file(&cli.checks_file)?;
    let registry = ScheduleRegistry::load(loaded.definitions);
    if registry.is_empty() {
        warn!("No valid check definition, nothing will be probed");
    }

    let notifier = build_notifier(&config).await;
    let stats = Arc::new(StatisticsRegistry::new());

    let lifecycle = Lifecycle::start(
        &registry,
        Arc::new(HttpChecker::new(TlsTrustPolicy::AcceptAll)),
        stats,
        Arc::new(notifier),
        config.dispatcher.to_dispatcher_config(),
    )?;

    let report = lifecycle.run_until(shutdown_signal()).await;
    info!(checks = report.len(), "Final statistics");
    Ok(report)
}

async fn build_notifier(config: &Config) -> Notifier {
    if !config.mail.enabled {
        info!("Mail alerts disabled");
        return Notifier::disabled();
    }

    match SmtpMailer::new(&config.smtp) {
        Ok(mailer) => Notifier::connect(Arc::new(mailer)).await,
        Err(e) => {
            warn!("Mail transport not configured, alerts are disabled: {e}");
            Notifier::disabled()
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
