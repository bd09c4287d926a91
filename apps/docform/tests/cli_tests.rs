//! Tests for argument parsing and command execution.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use clap::Parser;
use docform::cli::{
    Cli, Commands, Context, PrintFunctionAction, execute, load_settings, open_model, parse_key,
    parse_param,
};
use docform_core::{MetadataKey, PersistenceMode};
use std::path::Path;

fn cli(document: &Path, args: &[&str]) -> Cli {
    let mut argv = vec!["docform", "-D", document.to_str().unwrap()];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

fn context(document: &Path) -> Context {
    Context {
        document: document.to_path_buf(),
        config: None,
        mode: None,
        json_mode: false,
    }
}

// =============================================================================
// ARGUMENT PARSING TESTS
// =============================================================================

#[test]
fn test_parse_key_accepts_descriptors() {
    assert_eq!(
        parse_key("WollMuxFormularwerte").unwrap(),
        MetadataKey::FormValues
    );
    let err = parse_key("Formularwerte").unwrap_err();
    assert!(err.contains("WollMuxFormularwerte"));
}

#[test]
fn test_parse_param() {
    assert_eq!(
        parse_param("Name=Ann").unwrap(),
        ("Name".to_string(), "Ann".to_string())
    );
    assert_eq!(
        parse_param("Note=a=b").unwrap(),
        ("Note".to_string(), "a=b".to_string())
    );
    assert_eq!(parse_param("Empty=").unwrap().1, "");
    assert!(parse_param("=x").is_err());
    assert!(parse_param("novalue").is_err());
}

#[test]
fn test_default_command_is_status() {
    let parsed = Cli::try_parse_from(["docform"]).unwrap();
    assert!(parsed.command.is_none());
    assert_eq!(parsed.document.to_str(), Some("document.redb"));
}

#[test]
fn test_global_flags_after_subcommand() {
    let parsed = Cli::try_parse_from(["docform", "values", "--json-mode", "-m", "annotation"])
        .unwrap();
    assert!(parsed.json_mode);
    assert_eq!(parsed.mode.as_deref(), Some("annotation"));
    assert!(matches!(parsed.command, Some(Commands::Values)));
}

#[test]
fn test_eval_collects_params() {
    let parsed =
        Cli::try_parse_from(["docform", "eval", "Greet", "-p", "N=Ann", "--param", "T=Dr"])
            .unwrap();
    match parsed.command {
        Some(Commands::Eval {
            name,
            params,
            single,
        }) => {
            assert_eq!(name, "Greet");
            assert_eq!(params.len(), 2);
            assert_eq!(params[1], ("T".to_string(), "Dr".to_string()));
            assert!(single.is_none());
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_eval_single_conflicts_with_params() {
    assert!(Cli::try_parse_from(["docform", "eval", "F", "-p", "a=1", "-s", "x"]).is_err());
}

#[test]
fn test_set_value_without_value_drops() {
    let parsed = Cli::try_parse_from(["docform", "set-value", "Name"]).unwrap();
    match parsed.command {
        Some(Commands::SetValue { id, value }) => {
            assert_eq!(id, "Name");
            assert!(value.is_none());
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_unknown_key_is_rejected() {
    assert!(Cli::try_parse_from(["docform", "get", "Bogus"]).is_err());
}

#[test]
fn test_print_function_subcommands() {
    let parsed = Cli::try_parse_from(["docform", "print-function", "add", "Brief"]).unwrap();
    assert!(matches!(
        parsed.command,
        Some(Commands::PrintFunction {
            action: PrintFunctionAction::Add { .. }
        })
    ));
}

// =============================================================================
// SETTINGS TESTS
// =============================================================================

#[test]
fn test_load_settings_defaults_and_override() {
    let settings = load_settings(None, Some("rdf")).unwrap();
    assert_eq!(settings.persistence_mode.as_deref(), Some("rdf"));
    assert!(settings.functions.is_empty());
}

#[test]
fn test_load_settings_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docform.toml");
    std::fs::write(
        &path,
        "persistence_mode = \"annotation\"\nhost_version = \"7.6\"\n\n[functions]\nUpper = \"CAT(VALUE 'x')\"\n",
    )
    .unwrap();

    let settings = load_settings(Some(&path), None).unwrap();
    assert_eq!(settings.persistence_mode.as_deref(), Some("annotation"));
    assert_eq!(settings.host_version, "7.6");
    assert!(settings.functions.contains_key("Upper"));
}

#[test]
fn test_load_settings_rejects_bad_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "persistence_mode = [").unwrap();
    assert!(load_settings(Some(&path), None).is_err());
    assert!(load_settings(Some(&dir.path().join("missing.toml")), None).is_err());
}

// =============================================================================
// EXECUTION TESTS
// =============================================================================

#[test]
fn test_init_refuses_existing_document() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("letter.redb");

    execute(cli(&doc, &["init"])).unwrap();
    assert!(doc.exists());
    assert!(execute(cli(&doc, &["init"])).is_err());
    execute(cli(&doc, &["init", "--force"])).unwrap();
}

#[test]
fn test_init_records_versions() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("letter.redb");
    execute(cli(&doc, &["init"])).unwrap();

    let model = open_model(&context(&doc)).unwrap();
    assert_eq!(
        model.last_touched_tool_version(),
        env!("CARGO_PKG_VERSION").to_string()
    );
}

#[test]
fn test_set_value_persists_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("letter.redb");

    execute(cli(&doc, &["set-value", "Name", "Ann"])).unwrap();
    execute(cli(&doc, &["set-value", "City", "Ulm"])).unwrap();
    execute(cli(&doc, &["set-value", "City"])).unwrap();

    let model = open_model(&context(&doc)).unwrap();
    assert_eq!(model.form_field_value("Name").as_deref(), Some("Ann"));
    assert_eq!(model.form_field_value("City"), None);
}

#[test]
fn test_raw_set_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("letter.redb");

    execute(cli(
        &doc,
        &["set", "WollMuxFormularwerte", "WM(Formularwerte((ID 'A' VALUE 'x')))"],
    ))
    .unwrap();
    {
        let model = open_model(&context(&doc)).unwrap();
        assert_eq!(model.form_field_value("A").as_deref(), Some("x"));
    }

    execute(cli(&doc, &["remove", "WollMuxFormularwerte"])).unwrap();
    let model = open_model(&context(&doc)).unwrap();
    assert_eq!(model.get_metadata(MetadataKey::FormValues), None);
}

#[test]
fn test_print_functions_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("letter.redb");

    execute(cli(&doc, &["print-function", "add", "Brief"])).unwrap();
    execute(cli(&doc, &["print-function", "add", "Kopie"])).unwrap();
    execute(cli(&doc, &["print-function", "remove", "Brief"])).unwrap();
    execute(cli(&doc, &["print-function", "list"])).unwrap();

    let model = open_model(&context(&doc)).unwrap();
    assert_eq!(model.print_functions(), vec!["Kopie".to_string()]);
}

#[test]
fn test_autofunction_is_stored() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("letter.redb");

    execute(cli(&doc, &["autofunction", "CAT(VALUE 'a' '!')"])).unwrap();
    assert!(execute(cli(&doc, &["autofunction", "NOSUCH('x')"])).is_err());

    let model = open_model(&context(&doc)).unwrap();
    let description = model.get_metadata(MetadataKey::FormDescription).unwrap();
    assert!(description.contains("AUTOFUNCTION_"));
}

#[test]
fn test_mode_flag_selects_backend() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("letter.redb");

    execute(cli(&doc, &["-m", "annotation", "set-value", "Name", "Ann"])).unwrap();

    let mut ctx = context(&doc);
    ctx.mode = Some("annotation".to_string());
    let model = open_model(&ctx).unwrap();
    assert_eq!(model.mode(), PersistenceMode::Annotation);
    assert_eq!(model.form_field_value("Name").as_deref(), Some("Ann"));
}

#[test]
fn test_read_only_commands_succeed_on_fresh_document() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("letter.redb");

    execute(cli(&doc, &[])).unwrap();
    execute(cli(&doc, &["--json-mode", "status"])).unwrap();
    execute(cli(&doc, &["values"])).unwrap();
    execute(cli(&doc, &["get", "WollMuxFormularwerte"])).unwrap();
    execute(cli(&doc, &["eval", "Missing", "-s", "x"])).unwrap();
}
