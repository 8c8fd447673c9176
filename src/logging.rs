//! Console logging.
//!
//! Filtering follows `RUST_LOG` (for example `RUST_LOG=tome_reader=debug`).
//! Without it the level is `warn`, raised by each `-v` on the command line.
//! Output goes to stderr so stdout stays usable for `--json`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_filter(filter);

    // A second init (tests, embedding hosts) keeps the existing subscriber.
    let _ = tracing_subscriber::registry().with(console_layer).try_init();
}
