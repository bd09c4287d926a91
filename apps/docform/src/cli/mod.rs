//! # docform CLI Module
//!
//! ## Available Commands
//!
//! - `init` - Create a document file
//! - `status` - Show persistence mode, provenance and form summary
//! - `get` / `set` / `remove` - Raw metadata blocks by key
//! - `values` - Stored form values
//! - `set-value` - Set or drop one form value
//! - `print-function` - Manage requested print functions
//! - `eval` - Evaluate a trafo
//! - `autofunction` - Register a document-local autofunction

mod commands;

use clap::{Parser, Subcommand};
use docform_core::{DocError, MetadataKey};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// docform - form metadata of text documents
///
/// Reads and writes the metadata blocks a document carries (form values,
/// form description, print functions) under a configurable persistence
/// strategy.
#[derive(Parser, Debug)]
#[command(name = "docform")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the document file
    #[arg(short = 'D', long, global = true, default_value = "document.redb")]
    pub document: PathBuf,

    /// TOML settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Persistence mode: annotation, transition, rdfReadLegacy or rdf
    #[arg(short, long, global = true)]
    pub mode: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new document file
    Init {
        /// Replace an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show document status
    Status,

    /// Print a raw metadata block
    Get {
        /// Metadata key descriptor (e.g. WollMuxFormularwerte)
        #[arg(value_parser = parse_key)]
        key: MetadataKey,
    },

    /// Store a raw metadata block
    Set {
        /// Metadata key descriptor
        #[arg(value_parser = parse_key)]
        key: MetadataKey,

        /// Block content
        value: String,
    },

    /// Remove a metadata block
    Remove {
        /// Metadata key descriptor
        #[arg(value_parser = parse_key)]
        key: MetadataKey,
    },

    /// List stored form values
    Values,

    /// Set a form value; without VALUE the id is dropped
    SetValue {
        /// Field id
        id: String,

        /// New value
        value: Option<String>,
    },

    /// Manage print functions
    PrintFunction {
        #[command(subcommand)]
        action: PrintFunctionAction,
    },

    /// Evaluate a trafo
    Eval {
        /// Function name
        name: String,

        /// Named parameter as ID=VALUE (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Pass one value to every parameter
        #[arg(short, long, conflicts_with = "params")]
        single: Option<String>,
    },

    /// Register a document-local autofunction
    Autofunction {
        /// Function body in block syntax, e.g. "CAT(VALUE 'a' '!')"
        body: String,
    },
}

/// `print-function` actions.
#[derive(Subcommand, Debug)]
pub enum PrintFunctionAction {
    /// Request a print function
    Add {
        /// Function name
        name: String,
    },
    /// Drop a print function
    Remove {
        /// Function name
        name: String,
    },
    /// List requested print functions
    List,
}

// =============================================================================
// ARGUMENT PARSERS
// =============================================================================

/// Parse a metadata key descriptor.
pub fn parse_key(s: &str) -> Result<MetadataKey, String> {
    MetadataKey::from_descriptor(s).ok_or_else(|| {
        let known: Vec<&str> = MetadataKey::ALL.iter().map(|k| k.descriptor()).collect();
        format!("unknown key '{}' (expected one of: {})", s, known.join(", "))
    })
}

/// Parse `ID=VALUE`.
pub fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((id, value)) if !id.is_empty() => Ok((id.to_string(), value.to_string())),
        _ => Err(format!("expected ID=VALUE, got '{}'", s)),
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), DocError> {
    let ctx = Context {
        document: cli.document,
        config: cli.config,
        mode: cli.mode,
        json_mode: cli.json_mode,
    };

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Status) | None => cmd_status(&ctx),
        Some(Commands::Get { key }) => cmd_get(&ctx, key),
        Some(Commands::Set { key, value }) => cmd_set(&ctx, key, &value),
        Some(Commands::Remove { key }) => cmd_remove(&ctx, key),
        Some(Commands::Values) => cmd_values(&ctx),
        Some(Commands::SetValue { id, value }) => cmd_set_value(&ctx, &id, value.as_deref()),
        Some(Commands::PrintFunction { action }) => cmd_print_function(&ctx, action),
        Some(Commands::Eval {
            name,
            params,
            single,
        }) => cmd_eval(&ctx, &name, params, single.as_deref()),
        Some(Commands::Autofunction { body }) => cmd_autofunction(&ctx, &body),
    }
}
