//! stubhttpd - A Minimal Concurrent TCP Listener
//!
//! This is the main entry point for the stubhttpd server.
//! It parses the command line, sets up logging and runs the acceptor.

use anyhow::Context;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use stubhttpd::config::{Config, Startup};
use stubhttpd::connection::ConnectionStats;
use stubhttpd::server::Acceptor;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!(
        r#"
stubhttpd - A Minimal Concurrent TCP Listener

USAGE:
    stubhttpd [OPTIONS]

OPTIONS:
    -h, --host <IPV4>              IPv4 address to bind to (default: 0.0.0.0)
    -p, --port <PORT>              Port to listen on (default: {})
    -b, --backlog <N>              Accept backlog (default: {})
    -l, --log-file <PATH>          Append logs to PATH instead of stdout
    -t, --idle-timeout <SECONDS>   Close silent connections (default: never)
    -v, --version                  Print version information
        --help                     Print this help message

EXAMPLES:
    stubhttpd                              # Listen on 0.0.0.0:80
    stubhttpd --port 8080 -l log.txt       # Port 8080, log to log.txt
    stubhttpd --host 127.0.0.1 -t 30       # Loopback only, 30s idle limit

TRYING IT:
    $ printf 'FOO /x\r\n\r\n' | nc -q1 127.0.0.1 8080
    400 Bad Request HTTP/2.0
"#,
        stubhttpd::DEFAULT_PORT,
        stubhttpd::DEFAULT_BACKLOG
    );
}

/// Sets up the tracing subscriber, writing to the log file when one is set.
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(Startup::Serve(config)) => config,
        Ok(Startup::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Startup::Version) => {
            println!("stubhttpd version {}", stubhttpd::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging
    init_logging(&config)?;
    info!(version = stubhttpd::VERSION, "stubhttpd starting");

    let stats = Arc::new(ConnectionStats::new());

    // Bind the listening socket; failure here is fatal
    let acceptor = match Acceptor::bind(&config, stats) {
        Ok(acceptor) => acceptor,
        Err(e) => {
            error!(error = %e, "Failed to start listener");
            return Err(e.into());
        }
    };
    info!("Ready to accept connections");

    // Main accept loop
    acceptor.run().await;

    Ok(())
}
