//! Logging setup: human-readable events on stderr.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when `RUST_LOG` is unset, by verbosity.
pub fn default_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "warn",
        0 => "docchat=info,docchat_cli=info,docchat_rag=info,warn",
        1 => "docchat=debug,docchat_cli=debug,docchat_rag=debug,info",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the flags.
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, quiet)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(stderr_layer).init();
}
