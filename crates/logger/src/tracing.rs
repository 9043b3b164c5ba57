use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer, Registry, filter::EnvFilter, fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Output format of the log layer, selected with `RUST_LOG_FORMAT`.
///
/// Logs always go to stderr; stdout is left to the program's own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn from_env_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Initialize tracing with the level raised by `-v` flags (0 = info, 1 = debug, 2+ = trace).
pub fn init_tracing_with_verbosity(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    initialize_tracing(level);
}

fn initialize_tracing(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT")
        .map(|value| LogFormat::from_env_value(&value))
        .unwrap_or_default();

    let layer = log_layer(log_format, env_filter, std::io::stderr);

    if let Err(error) = tracing_subscriber::registry().with(layer).try_init() {
        warn!("Tracing subscriber already initialized: {error}");
    }
}

fn log_layer<W>(
    format: LogFormat,
    env_filter: EnvFilter,
    writer: W,
) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(writer)
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    }
}
