//! # Settings
//!
//! Process-wide configuration shared by every opened document. Loaded by the
//! caller (the CLI reads it from TOML); the core only interprets it.
//!
//! ```toml
//! persistence_mode = "transition"
//! tool_version = "2.3.0"
//! host_version = "7.6"
//! override_frag = "overrideFrag((FRAG_ID 'Kopf' NEW_FRAG_ID 'KopfNeu'))"
//!
//! [functions]
//! Upper = "CAT(VALUE 'x')"
//! ```

use crate::functions::Function;
use crate::override_frag::OverrideFragMap;
use crate::primitives::VERSION_UNKNOWN;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

/// Configuration for opening documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Persistence mode name; missing or unknown selects `transition`.
    pub persistence_mode: Option<String>,
    /// Version of the running tool, recorded on first write.
    pub tool_version: String,
    /// Version of the running host application, recorded on first write.
    pub host_version: String,
    /// Global trafo definitions: name → body in block syntax.
    pub functions: BTreeMap<String, String>,
    /// Initial fragment overrides in block syntax.
    pub override_frag: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            persistence_mode: None,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            host_version: VERSION_UNKNOWN.to_string(),
            functions: BTreeMap::new(),
            override_frag: None,
        }
    }
}

impl Settings {
    /// Compile the global function table. Definitions that do not compile
    /// are logged and left out.
    #[must_use]
    pub fn global_functions(&self) -> Arc<BTreeMap<String, Function>> {
        let mut table = BTreeMap::new();
        for (name, body) in &self.functions {
            match Function::parse(name.clone(), body) {
                Ok(function) => {
                    table.insert(name.clone(), function);
                }
                Err(e) => error!("Global function '{}' ignored: {}", name, e),
            }
        }
        Arc::new(table)
    }

    /// The configured fragment overrides; empty when unset or unreadable.
    #[must_use]
    pub fn initial_override_frag(&self) -> OverrideFragMap {
        let Some(block) = &self.override_frag else {
            return OverrideFragMap::default();
        };
        OverrideFragMap::from_block(block).unwrap_or_else(|e| {
            error!("Configured overrideFrag ignored: {}", e);
            OverrideFragMap::default()
        })
    }
}
