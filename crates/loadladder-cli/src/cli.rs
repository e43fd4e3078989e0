use std::path::PathBuf;

use clap::Parser;
use loadladder_core::config::{FallbackPolicy, LadderConfig};

/// Drive concurrent GET load against an API at increasing user counts and
/// report latency, throughput, error rate and the scaling trend.
#[derive(Debug, Parser)]
#[command(name = "loadladder", version)]
pub struct Args {
    /// JSON config file; command-line flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// API host.
    #[arg(long)]
    pub host: Option<String>,

    /// API port.
    #[arg(long)]
    pub port: Option<u16>,

    /// http or https.
    #[arg(long)]
    pub protocol: Option<String>,

    /// Seconds per scenario.
    #[arg(long)]
    pub duration: Option<u64>,

    /// Quick ladder: 30 seconds per scenario with 1, 5, 20 and 50 users.
    #[arg(long)]
    pub quick: bool,

    /// Comma-separated user loads, e.g. `1,5,20`.
    #[arg(long, value_delimiter = ',')]
    pub users: Option<Vec<u32>>,

    /// Directory receiving CSV and Markdown reports.
    #[arg(long)]
    pub results_dir: Option<String>,

    /// Generate simulated results without touching the network.
    #[arg(long, conflicts_with = "no_fallback")]
    pub simulate: bool,

    /// Never fall back to simulated results when the API is unreachable.
    #[arg(long)]
    pub no_fallback: bool,
}

impl Args {
    /// Layer the command-line flags on top of `base`.
    ///
    /// `--quick` is applied first so explicit `--duration` and `--users`
    /// still win over the quick ladder.
    pub fn apply(self, base: LadderConfig) -> LadderConfig {
        let mut config = if self.quick { base.quick() } else { base };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(users) = self.users {
            config.user_loads = users;
        }
        if let Some(dir) = self.results_dir {
            config.results_dir = dir;
        }
        if self.simulate {
            config.fallback = FallbackPolicy::Always;
        } else if self.no_fallback {
            config.fallback = FallbackPolicy::Never;
        }

        config
    }
}
