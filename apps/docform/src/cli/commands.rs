//! # CLI Command Implementations
//!
//! Each command opens the document, runs one model operation and, when it
//! changed anything, flushes before returning.

use docform_core::{DocError, DocumentModel, MetadataKey, Preset, RedbDocument, Settings};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::PrintFunctionAction;

/// Maximum size of a settings file (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    /// Document file.
    pub document: PathBuf,
    /// Optional TOML settings file.
    pub config: Option<PathBuf>,
    /// Persistence mode override.
    pub mode: Option<String>,
    /// Print JSON instead of text.
    pub json_mode: bool,
}

// =============================================================================
// SETUP
// =============================================================================

/// Load settings from `path` (defaults when `None`), then apply the mode
/// override.
pub fn load_settings(path: Option<&Path>, mode: Option<&str>) -> Result<Settings, DocError> {
    let mut settings = match path {
        Some(path) => {
            let metadata = std::fs::metadata(path).map_err(|e| {
                DocError::Io(format!("Cannot read settings '{}': {}", path.display(), e))
            })?;
            if metadata.len() > MAX_CONFIG_FILE_SIZE {
                return Err(DocError::Io(format!(
                    "Settings file {} bytes exceeds maximum allowed {} bytes",
                    metadata.len(),
                    MAX_CONFIG_FILE_SIZE
                )));
            }
            let text = std::fs::read_to_string(path).map_err(|e| {
                DocError::Io(format!("Cannot read settings '{}': {}", path.display(), e))
            })?;
            toml::from_str::<Settings>(&text)
                .map_err(|e| DocError::Io(format!("Invalid settings '{}': {}", path.display(), e)))?
        }
        None => Settings::default(),
    };
    if let Some(mode) = mode {
        settings.persistence_mode = Some(mode.to_string());
    }
    Ok(settings)
}

/// Open the document of `ctx`.
pub fn open_model(ctx: &Context) -> Result<DocumentModel, DocError> {
    let settings = load_settings(ctx.config.as_deref(), ctx.mode.as_deref())?;
    let document = RedbDocument::open(&ctx.document)?;
    tracing::debug!("Opened {}", ctx.document.display());
    Ok(DocumentModel::open_document(Arc::new(document), &settings))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create a document file and record the running versions.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), DocError> {
    if ctx.document.exists() {
        if !force {
            return Err(DocError::Io(format!(
                "Document '{}' already exists (use --force to replace it)",
                ctx.document.display()
            )));
        }
        std::fs::remove_file(&ctx.document)
            .map_err(|e| DocError::Io(format!("Cannot remove old document: {}", e)))?;
    }

    let model = open_model(ctx)?;
    model.update_last_touched_by_version_info();
    model.flush_persistent_data();

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "document": ctx.document.to_string_lossy(),
            "mode": model.mode().name(),
        }));
    } else {
        println!("Initialized {} ({} mode)", ctx.document.display(), model.mode());
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show persistence mode, provenance and form summary.
pub fn cmd_status(ctx: &Context) -> Result<(), DocError> {
    let model = open_model(ctx)?;
    let values = model.form_field_values();
    let print_functions = model.print_functions();
    let unknown = model
        .id_to_preset_value()
        .values()
        .filter(|p| p.is_unknown())
        .count();

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "document": ctx.document.to_string_lossy(),
            "mode": model.mode().name(),
            "form_document": model.is_form_document(),
            "tool_version": model.last_touched_tool_version(),
            "host_version": model.last_touched_host_version(),
            "stored_values": values.len(),
            "unknown_presets": unknown,
            "print_functions": print_functions,
        }));
        return Ok(());
    }

    println!("docform Document Status");
    println!("=======================");
    println!("Document:        {}", ctx.document.display());
    println!("Mode:            {}", model.mode());
    println!("Form document:   {}", model.is_form_document());
    println!("Tool version:    {}", model.last_touched_tool_version());
    println!("Host version:    {}", model.last_touched_host_version());
    println!();
    println!("Stored values:   {}", values.len());
    println!("Unknown presets: {}", unknown);
    println!("Print functions: {}", print_functions.join(", "));
    Ok(())
}

// =============================================================================
// RAW METADATA COMMANDS
// =============================================================================

/// Print the raw block stored under `key`.
pub fn cmd_get(ctx: &Context, key: MetadataKey) -> Result<(), DocError> {
    let model = open_model(ctx)?;
    let value = model.get_metadata(key);
    if ctx.json_mode {
        print_json(&serde_json::json!({ "key": key.descriptor(), "value": value }));
    } else {
        match value {
            Some(v) => println!("{}", v),
            None => println!("({} not set)", key),
        }
    }
    Ok(())
}

/// Store a raw block under `key`.
pub fn cmd_set(ctx: &Context, key: MetadataKey, value: &str) -> Result<(), DocError> {
    let model = open_model(ctx)?;
    model.set_metadata(key, value);
    model.flush_persistent_data();
    tracing::info!("Stored {}", key);
    Ok(())
}

/// Remove the block stored under `key`.
pub fn cmd_remove(ctx: &Context, key: MetadataKey) -> Result<(), DocError> {
    let model = open_model(ctx)?;
    model.remove_metadata(key);
    model.flush_persistent_data();
    tracing::info!("Removed {}", key);
    Ok(())
}

// =============================================================================
// VALUE COMMANDS
// =============================================================================

/// List stored values together with their presets.
pub fn cmd_values(ctx: &Context) -> Result<(), DocError> {
    let model = open_model(ctx)?;
    let values = model.form_field_values();
    let presets = model.id_to_preset_value();

    if ctx.json_mode {
        let entries: Vec<serde_json::Value> = presets
            .iter()
            .map(|(id, preset)| {
                serde_json::json!({
                    "id": id,
                    "stored": values.get(id),
                    "preset": preset.as_value(),
                })
            })
            .collect();
        print_json(&serde_json::Value::Array(entries));
        return Ok(());
    }

    if presets.is_empty() {
        println!("(no values)");
    }
    for (id, preset) in &presets {
        match preset {
            Preset::Value(v) => println!("{} = {}", id, v),
            Preset::Unknown => println!(
                "{} = {} (document disagrees)",
                id,
                values.get(id).unwrap_or("")
            ),
        }
    }
    Ok(())
}

/// Set or drop one value.
pub fn cmd_set_value(ctx: &Context, id: &str, value: Option<&str>) -> Result<(), DocError> {
    let model = open_model(ctx)?;
    model.set_form_field_value(id, value);
    model.update_form_fields(id);
    model.flush_persistent_data();
    match value {
        Some(v) => tracing::info!("{} = {}", id, v),
        None => tracing::info!("{} dropped", id),
    }
    Ok(())
}

// =============================================================================
// PRINT FUNCTION COMMAND
// =============================================================================

/// Add, remove or list print functions.
pub fn cmd_print_function(ctx: &Context, action: PrintFunctionAction) -> Result<(), DocError> {
    let model = open_model(ctx)?;
    match action {
        PrintFunctionAction::Add { name } => {
            model.add_print_function(&name);
            model.flush_persistent_data();
        }
        PrintFunctionAction::Remove { name } => {
            model.remove_print_function(&name);
            model.flush_persistent_data();
        }
        PrintFunctionAction::List => {
            let names = model.print_functions();
            if ctx.json_mode {
                print_json(&serde_json::json!(names));
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// TRAFO COMMANDS
// =============================================================================

/// Evaluate a trafo with named parameters or one broadcast value.
pub fn cmd_eval(
    ctx: &Context,
    name: &str,
    params: Vec<(String, String)>,
    single: Option<&str>,
) -> Result<(), DocError> {
    let model = open_model(ctx)?;
    let result = match single {
        Some(value) => model.evaluate_single(name, value),
        None => {
            let params: BTreeMap<String, String> = params.into_iter().collect();
            model.evaluate(name, &params)
        }
    };
    if ctx.json_mode {
        print_json(&serde_json::json!({ "function": name, "result": result }));
    } else {
        println!("{}", result);
    }
    Ok(())
}

/// Register an autofunction and print its name.
pub fn cmd_autofunction(ctx: &Context, body: &str) -> Result<(), DocError> {
    let model = open_model(ctx)?;
    let name = model
        .add_local_autofunction(body)
        .ok_or_else(|| DocError::InvalidFunction(format!("cannot compile '{}'", body)))?;
    model.flush_persistent_data();
    if ctx.json_mode {
        print_json(&serde_json::json!({ "name": name }));
    } else {
        println!("{}", name);
    }
    Ok(())
}
