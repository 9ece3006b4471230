use std::net::SocketAddr;
use std::num::NonZeroU64;

use clap::Parser;
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

use crate::AppState;
use crate::BucketConfig;
use crate::BucketKind;

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Command line configuration for the throttle server.
#[derive(Debug, Clone, Parser)]
#[command(name = "throttle-server", version, about = "Leaky and token bucket admission control over HTTP")]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, env = "THROTTLE_BIND", default_value = "127.0.0.1:8888")]
    pub bind: SocketAddr,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Configure the leaky bucket at startup with this capacity
    #[arg(long, requires = "leak_rate")]
    pub leaky_capacity: Option<NonZeroU64>,

    /// Leak rate (requests/sec) for the startup leaky bucket
    #[arg(long, requires = "leaky_capacity")]
    pub leak_rate: Option<NonZeroU64>,

    /// Configure the token bucket at startup with this capacity
    #[arg(long, requires = "refill_rate")]
    pub token_capacity: Option<NonZeroU64>,

    /// Refill rate (tokens/sec) for the startup token bucket
    #[arg(long, requires = "token_capacity")]
    pub refill_rate: Option<NonZeroU64>,
}

impl ServerArgs {
    /// Startup configuration requested for `kind`, if both values were given.
    pub fn preset(&self, kind: BucketKind) -> Option<BucketConfig> {
        let (capacity, rate) = match kind {
            BucketKind::Leaky => (self.leaky_capacity?, self.leak_rate?),
            BucketKind::Token => (self.token_capacity?, self.refill_rate?),
        };
        Some(BucketConfig { capacity, rate })
    }

    /// Install every requested startup bucket into `state`.
    pub fn apply_presets(&self, state: &AppState) {
        for kind in [BucketKind::Leaky, BucketKind::Token] {
            if let Some(config) = self.preset(kind) {
                state.configure(kind, config);
            }
        }
    }
}

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match format {
        LogFormat::Pretty => builder.with_thread_ids(true).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}
