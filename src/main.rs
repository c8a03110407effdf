//! relkv CLI entry point
//!
//! Installs the log subscriber (filtered by `RUST_LOG`, logging to
//! stderr so stdout stays JSON), then delegates to `cli::run`.

use relkv::cli;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run() {
        let _ = cli::write_error(&mut std::io::stdout(), e.code_str(), e.message());
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
