//! # docform
//!
//! Inspect and edit the form metadata of a redb-backed document.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              apps/docform (THE BINARY)       │
//! │                                              │
//! │   ┌─────────────┐      ┌────────────────┐    │
//! │   │    CLI      │ ───▶ │  docform-core  │    │
//! │   │   (clap)    │      │  (THE LOGIC)   │    │
//! │   └─────────────┘      └───────┬────────┘    │
//! │                                ▼             │
//! │                        ┌────────────────┐    │
//! │                        │ RedbDocument   │    │
//! │                        └────────────────┘    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! docform -D letter.redb init
//! docform -D letter.redb set-value Name Ann
//! docform -D letter.redb print-function add SuperbriefDrucken
//! docform -D letter.redb eval Greeting --param Name=Ann
//! ```

use clap::Parser;
use docform::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // DOCFORM_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("DOCFORM_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "docform=debug,docform_core=debug"
    } else {
        "docform=info,docform_core=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
