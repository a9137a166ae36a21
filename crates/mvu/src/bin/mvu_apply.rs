//! `mvu-apply`: apply the update statements of a response to stat data.
//!
//! Usage:
//!   mvu-apply '<response-text>' [config.json]
//!
//! The stat data is read from stdin as JSON. The report (new stat data,
//! delta, per-command results and skipped statements) is written to stdout.
//! Set `RUST_LOG=mvu=debug` to trace every command.

use std::io::{self, Read, Write};

use mvu::cli::apply_response_json;
use mvu::EngineConfig;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let text = match args.get(1) {
        Some(t) => t.clone(),
        None => {
            eprintln!("First argument must be the response text.");
            std::process::exit(1);
        }
    };

    let config = match args.get(2) {
        Some(path) => match EngineConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    match apply_response_json(buf.trim(), &text, config) {
        Ok(report) => {
            let mut out = io::stdout();
            if let Err(e) = out.write_all(report.as_bytes()).and_then(|_| out.write_all(b"\n")) {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
