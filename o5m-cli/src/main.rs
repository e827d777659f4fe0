//! Entry point for the `o5m2sqlite` binary.
#![forbid(unsafe_code)]

use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = o5m_cli::run() {
        eprintln!("o5m2sqlite: {}", o5m_cli::render_error(&err));
        std::process::exit(1);
    }
}
