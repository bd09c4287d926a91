//! # Document Model
//!
//! The form engine of one open document. It owns the persistence strategy,
//! the stored value table, the function registry, the form description and
//! the current field index, and serializes every entry point through one
//! mutex per document.
//!
//! ## Caching
//!
//! The blocks the model interprets (values, form description, print
//! functions, overrides, document kind, versions) are read once at open and
//! cached. Every model operation writes through to the store. A raw
//! [`DocumentModel::set_metadata`] or [`DocumentModel::remove_metadata`]
//! reloads the affected block.

use crate::autofunction::AutofunctionManager;
use crate::conf::{self, ConfNode};
use crate::config::Settings;
use crate::fields::{FieldBinding, FieldIndex, FormField};
use crate::form_description::FormDescription;
use crate::functions::{Function, FunctionRegistry};
use crate::host::{FieldScanner, HostDocument};
use crate::override_frag::OverrideFragMap;
use crate::preset::PresetResolver;
use crate::primitives::{FORM_DOCUMENT_TYPE, MAILMERGE_SECTION, ROOT_SECTION, VERSION_UNKNOWN};
use crate::print_functions::PrintFunctions;
use crate::simulation::SimulationContext;
use crate::storage::{PersistentStore, StoreFactory, preserve_modified};
use crate::substitution::{FieldSubstitution, SubstitutionEngine};
use crate::trafo::TrafoEngine;
use crate::values::FieldValueTable;
use crate::{DocError, MetadataKey, PersistenceMode, Preset};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

// =============================================================================
// DOCUMENT MODEL
// =============================================================================

/// Form engine for one open document.
pub struct DocumentModel {
    mode: PersistenceMode,
    state: Mutex<ModelState>,
}

impl std::fmt::Debug for DocumentModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentModel")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl DocumentModel {
    /// Open a document whose host object also discovers its fields.
    pub fn open_document<D>(document: Arc<D>, settings: &Settings) -> Self
    where
        D: HostDocument + FieldScanner + 'static,
    {
        let host: Arc<dyn HostDocument> = Arc::clone(&document) as Arc<dyn HostDocument>;
        let scanner: Arc<dyn FieldScanner> = document;
        Self::open(host, scanner, settings)
    }

    /// Open a document: pick the persistence strategy, read every cached
    /// block and scan the fields.
    pub fn open(
        host: Arc<dyn HostDocument>,
        scanner: Arc<dyn FieldScanner>,
        settings: &Settings,
    ) -> Self {
        let store = StoreFactory::create(Arc::clone(&host), settings.persistence_mode.as_deref());
        let mode = store.mode();
        let mut state = ModelState {
            host,
            scanner,
            store,
            running_tool_version: settings.tool_version.clone(),
            running_host_version: settings.host_version.clone(),
            touched: false,
            tool_version: VERSION_UNKNOWN.to_string(),
            host_version: VERSION_UNKNOWN.to_string(),
            document_kind: None,
            values: FieldValueTable::new(),
            registry: FunctionRegistry::new(settings.global_functions()),
            description: FormDescription::new(),
            autofunctions: AutofunctionManager::new(),
            index: FieldIndex::default(),
            print_functions: PrintFunctions::default(),
            override_frag: OverrideFragMap::default(),
            group_visibility: BTreeMap::new(),
            simulation: None,
            preview: true,
        };
        for key in MetadataKey::ALL {
            state.load(key);
        }
        if state.override_frag.is_empty() {
            state.override_frag = settings.initial_override_frag();
        }
        state.rescan();
        debug!(
            "Opened document in {} mode with {} fields",
            mode,
            state.index.all().len()
        );
        Self {
            mode,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, ModelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The persistence strategy in use.
    #[must_use]
    pub fn mode(&self) -> PersistenceMode {
        self.mode
    }

    // -------------------------------------------------------------------------
    // Metadata passthrough
    // -------------------------------------------------------------------------

    /// Raw stored value of `key`.
    pub fn get_metadata(&self, key: MetadataKey) -> Option<String> {
        self.state().store.get(key)
    }

    /// Store a raw value under `key`.
    pub fn set_metadata(&self, key: MetadataKey, value: &str) {
        let mut state = self.state();
        state.store.set(key, value);
        state.reload(key);
    }

    /// Remove `key`.
    pub fn remove_metadata(&self, key: MetadataKey) {
        let mut state = self.state();
        state.store.remove(key);
        state.reload(key);
    }

    /// Push buffered metadata into document storage.
    pub fn flush_persistent_data(&self) {
        self.state().store.flush();
    }

    // -------------------------------------------------------------------------
    // Values and presets
    // -------------------------------------------------------------------------

    /// Set (or, with `None`, drop) the value of `id`. While simulating only
    /// the simulation sees the change.
    pub fn set_form_field_value(&self, id: &str, value: Option<&str>) {
        self.state().set_form_field_value(id, value);
    }

    /// Current value of `id` (the simulated one while simulating).
    pub fn form_field_value(&self, id: &str) -> Option<String> {
        self.state().current_values().get(id).map(str::to_string)
    }

    /// Copy of the value table (the simulated one while simulating).
    pub fn form_field_values(&self) -> FieldValueTable {
        self.state().current_values().clone()
    }

    /// Start value of every id, checked against the document content.
    pub fn id_to_preset_value(&self) -> BTreeMap<String, Preset> {
        let state = self.state();
        PresetResolver::new(&state.index, &state.values, &state.registry).resolve()
    }

    // -------------------------------------------------------------------------
    // Trafos
    // -------------------------------------------------------------------------

    /// Evaluate `name` with named parameter values.
    pub fn evaluate(&self, name: &str, params: &BTreeMap<String, String>) -> String {
        TrafoEngine::new(&self.state().registry).evaluate(name, params)
    }

    /// Evaluate `name` with `value` for every parameter.
    pub fn evaluate_single(&self, name: &str, value: &str) -> String {
        TrafoEngine::new(&self.state().registry).evaluate_single(name, value)
    }

    /// `trafo` evaluated against the current (or simulated) values.
    pub fn transformed_value(&self, trafo: &str) -> String {
        let state = self.state();
        TrafoEngine::new(&state.registry).evaluate(trafo, state.current_values().as_map())
    }

    /// Replace the definition of a document-local function.
    pub fn set_trafo(&self, name: &str, body: &str) -> Result<(), DocError> {
        self.state().set_trafo(name, body)
    }

    /// Register a new autofunction. Returns its name, or `None` if `body`
    /// does not parse.
    pub fn add_local_autofunction(&self, body: &str) -> Option<String> {
        self.state().add_local_autofunction(body)
    }

    /// Drop every autofunction no handle refers to.
    pub fn cleanup_garbage_of_unreferenced_autofunctions(&self) {
        self.state().cleanup_garbage();
    }

    // -------------------------------------------------------------------------
    // Field display
    // -------------------------------------------------------------------------

    /// Rediscover the fields of the document.
    pub fn rescan(&self) {
        self.state().rescan();
    }

    /// Replace every occurrence of `old_id` by `substitution`.
    pub fn apply_field_substitution(&self, old_id: &str, substitution: &FieldSubstitution) {
        self.state().apply_field_substitution(old_id, substitution);
    }

    /// Redraw every handle showing `id`.
    pub fn update_form_fields(&self, id: &str) {
        self.state().update_form_fields(id);
    }

    /// Switch between showing values and showing `<id>` placeholders.
    pub fn set_form_fields_preview_mode(&self, preview: bool) {
        let mut state = self.state();
        state.preview = preview;
        state.update_all_form_fields();
        state.cleanup_garbage();
    }

    /// Whether values are shown.
    pub fn is_preview_mode(&self) -> bool {
        self.state().preview
    }

    /// Put the cursor into a handle of `id`.
    pub fn focus_form_field(&self, id: &str) {
        self.state().focus_form_field(id);
    }

    /// Show or hide a visibility group.
    pub fn set_visible_state(&self, group: &str, visible: bool) {
        self.state().set_visible_state(group, visible);
    }

    /// Current (or simulated) state of a visibility group; groups never set
    /// are visible.
    pub fn is_group_visible(&self, group: &str) -> bool {
        let state = self.state();
        let recorded = match &state.simulation {
            Some(sim) => sim.group_visibility(group),
            None => state.group_visibility.get(group).copied(),
        };
        recorded.unwrap_or(true)
    }

    // -------------------------------------------------------------------------
    // Simulation
    // -------------------------------------------------------------------------

    /// Start recording changes instead of applying them. A running
    /// simulation is discarded.
    pub fn start_simulation(&self) {
        let mut state = self.state();
        let context =
            SimulationContext::start(&state.values, &state.group_visibility, &state.index);
        state.simulation = Some(context);
    }

    /// Stop recording and return what was recorded.
    pub fn stop_simulation(&self) -> Option<SimulationContext> {
        self.state().simulation.take()
    }

    /// Whether a simulation is running.
    pub fn is_simulating(&self) -> bool {
        self.state().simulation.is_some()
    }

    // -------------------------------------------------------------------------
    // Document-level metadata
    // -------------------------------------------------------------------------

    /// Tool version that last wrote to the document.
    pub fn last_touched_tool_version(&self) -> String {
        self.state().tool_version.clone()
    }

    /// Host version that last wrote to the document.
    pub fn last_touched_host_version(&self) -> String {
        self.state().host_version.clone()
    }

    /// Record the running versions (once per session).
    pub fn update_last_touched_by_version_info(&self) {
        self.state().update_last_touched_by_version_info();
    }

    /// Persist the form-document kind.
    pub fn mark_as_form_document(&self) {
        let mut state = self.state();
        state.update_last_touched_by_version_info();
        state.store.set(MetadataKey::DocumentKind, FORM_DOCUMENT_TYPE);
        state.document_kind = Some(FORM_DOCUMENT_TYPE.to_string());
    }

    /// Whether the document is marked as form document or defines a form
    /// window.
    pub fn is_form_document(&self) -> bool {
        let state = self.state();
        state.document_kind.as_deref() == Some(FORM_DOCUMENT_TYPE) || state.description.has_window()
    }

    /// Stored document kind.
    pub fn document_kind(&self) -> Option<String> {
        self.state().document_kind.clone()
    }

    /// Request a print function.
    pub fn add_print_function(&self, name: &str) {
        let mut state = self.state();
        if name.trim().is_empty() {
            error!("Empty print function name ignored");
            return;
        }
        state.print_functions.add(name.trim());
        state.store_print_functions();
    }

    /// Drop a print function.
    pub fn remove_print_function(&self, name: &str) {
        let mut state = self.state();
        if state.print_functions.remove(name) {
            state.store_print_functions();
        }
    }

    /// Requested print functions, sorted.
    pub fn print_functions(&self) -> Vec<String> {
        self.state()
            .print_functions
            .iter()
            .map(str::to_string)
            .collect()
    }

    /// Set or clear the filename generator function.
    pub fn set_filename_generator_func(&self, function: Option<&ConfNode>) {
        let mut state = self.state();
        state.update_last_touched_by_version_info();
        match function {
            Some(node) => state.store.set(MetadataKey::FilenameGenerator, &node.render()),
            None => state.store.remove(MetadataKey::FilenameGenerator),
        }
    }

    /// The filename generator function; unreadable blocks read as absent.
    pub fn filename_generator_func(&self) -> Option<ConfNode> {
        let stored = self.state().store.get(MetadataKey::FilenameGenerator)?;
        match conf::parse(&stored) {
            Ok(items) => items.into_iter().next(),
            Err(e) => {
                error!("Filename generator ignored: {}", e);
                None
            }
        }
    }

    /// Set or clear the mail-merge settings. The children of `config` are
    /// stored under `WM(Seriendruck(...))`.
    pub fn set_mailmerge_config(&self, config: Option<&ConfNode>) {
        let mut state = self.state();
        match config {
            Some(node) => {
                let block = ConfNode::node(
                    ROOT_SECTION,
                    vec![ConfNode::node(MAILMERGE_SECTION, node.children().to_vec())],
                );
                state.store.set(MetadataKey::MailMerge, &block.render());
            }
            None => state.store.remove(MetadataKey::MailMerge),
        }
    }

    /// The `Seriendruck` node of the mail-merge settings.
    pub fn mailmerge_config(&self) -> Option<ConfNode> {
        let stored = self.state().store.get(MetadataKey::MailMerge)?;
        match conf::parse(&stored) {
            Ok(items) => conf::find_all(&items, MAILMERGE_SECTION)
                .first()
                .map(|n| (*n).clone()),
            Err(e) => {
                error!("Mail-merge settings ignored: {}", e);
                None
            }
        }
    }

    /// The merged `Formular` node.
    pub fn form_description(&self) -> ConfNode {
        self.state().description.form().clone()
    }

    /// Replace the form description and re-register its local functions.
    pub fn set_form_description(&self, form: &ConfNode) {
        let mut state = self.state();
        state.description = FormDescription::from_form(form);
        state.register_local_functions();
        state.store_form_description();
        state.host.set_modified(true);
        state.rescan();
    }

    /// Override fragment `frag_id` by `new_frag_id`.
    pub fn set_override_frag(&self, frag_id: &str, new_frag_id: &str) -> Result<(), DocError> {
        let mut state = self.state();
        if !state.override_frag.insert(frag_id, new_frag_id)? {
            return Ok(());
        }
        let block = state.override_frag.to_block();
        state.store.set(MetadataKey::OverrideFrag, &block);
        Ok(())
    }

    /// Replacement of fragment `frag_id`.
    pub fn override_frag(&self, frag_id: &str) -> Option<String> {
        self.state().override_frag.get(frag_id).map(str::to_string)
    }

    /// Turn the document back into a plain document: drop the form
    /// description and the stored values.
    pub fn de_form(&self) {
        let mut state = self.state();
        state.store.remove(MetadataKey::FormDescription);
        state.store.remove(MetadataKey::FormValues);
        state.description = FormDescription::new();
        state.values = FieldValueTable::new();
        state.register_local_functions();
        state.rescan();
    }
}

// =============================================================================
// MODEL STATE
// =============================================================================

struct ModelState {
    host: Arc<dyn HostDocument>,
    scanner: Arc<dyn FieldScanner>,
    store: PersistentStore,
    running_tool_version: String,
    running_host_version: String,
    touched: bool,
    tool_version: String,
    host_version: String,
    document_kind: Option<String>,
    values: FieldValueTable,
    registry: FunctionRegistry,
    description: FormDescription,
    autofunctions: AutofunctionManager,
    index: FieldIndex,
    print_functions: PrintFunctions,
    override_frag: OverrideFragMap,
    group_visibility: BTreeMap<String, bool>,
    simulation: Option<SimulationContext>,
    preview: bool,
}

impl ModelState {
    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    fn load(&mut self, key: MetadataKey) {
        let stored = self.store.get(key);
        match key {
            MetadataKey::FormDescription => {
                self.description = match stored.map(|s| FormDescription::from_block(&s)) {
                    Some(Ok(d)) => d,
                    Some(Err(e)) => {
                        error!("Form description ignored: {}", e);
                        FormDescription::new()
                    }
                    None => FormDescription::new(),
                };
                self.register_local_functions();
            }
            MetadataKey::FormValues => {
                self.values = match stored.map(|s| FieldValueTable::from_block(&s)) {
                    Some(Ok(v)) => v,
                    Some(Err(e)) => {
                        error!("Stored form values ignored: {}", e);
                        FieldValueTable::new()
                    }
                    None => FieldValueTable::new(),
                };
            }
            MetadataKey::PrintFunctions => {
                self.print_functions = stored
                    .map(|s| PrintFunctions::from_stored(&s))
                    .unwrap_or_default();
            }
            MetadataKey::OverrideFrag => {
                self.override_frag = match stored.map(|s| OverrideFragMap::from_block(&s)) {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        error!("Stored overrideFrag ignored: {}", e);
                        OverrideFragMap::default()
                    }
                    None => OverrideFragMap::default(),
                };
            }
            MetadataKey::DocumentKind => self.document_kind = stored,
            MetadataKey::ToolVersion => {
                self.tool_version = stored.unwrap_or_else(|| VERSION_UNKNOWN.to_string());
            }
            MetadataKey::HostVersion => {
                self.host_version = stored.unwrap_or_else(|| VERSION_UNKNOWN.to_string());
            }
            MetadataKey::MailMerge | MetadataKey::FilenameGenerator => {}
        }
    }

    fn reload(&mut self, key: MetadataKey) {
        self.load(key);
        if key == MetadataKey::FormDescription {
            self.rescan();
        }
    }

    fn register_local_functions(&mut self) {
        self.registry.clear_local();
        for (name, body) in self.description.function_definitions() {
            let registered =
                Function::new(name.clone(), body).and_then(|f| self.registry.add_local(f));
            if let Err(e) = registered {
                error!("Local function '{}' ignored: {}", name, e);
            }
        }
    }

    fn rescan(&mut self) {
        let handles = self.scanner.scan_fields().unwrap_or_else(|e| {
            error!("Field scan failed: {}", e);
            Vec::new()
        });
        self.index = FieldIndex::build(handles, &self.registry);
    }

    // -------------------------------------------------------------------------
    // Writing
    // -------------------------------------------------------------------------

    fn update_last_touched_by_version_info(&mut self) {
        if self.touched {
            return;
        }
        self.touched = true;
        let host = Arc::clone(&self.host);
        preserve_modified(host.as_ref(), || {
            self.store
                .set(MetadataKey::ToolVersion, &self.running_tool_version);
            self.store
                .set(MetadataKey::HostVersion, &self.running_host_version);
        });
        self.tool_version.clone_from(&self.running_tool_version);
        self.host_version.clone_from(&self.running_host_version);
    }

    fn store_values(&mut self) {
        self.update_last_touched_by_version_info();
        let block = self.values.to_block();
        self.store.set(MetadataKey::FormValues, &block);
    }

    fn store_form_description(&mut self) {
        self.update_last_touched_by_version_info();
        if self.description.is_worth_storing() {
            let block = self.description.to_block();
            self.store.set(MetadataKey::FormDescription, &block);
        } else {
            self.store.remove(MetadataKey::FormDescription);
        }
    }

    fn store_print_functions(&mut self) {
        self.update_last_touched_by_version_info();
        match self.print_functions.to_stored() {
            Some(value) => self.store.set(MetadataKey::PrintFunctions, &value),
            None => self.store.remove(MetadataKey::PrintFunctions),
        }
    }

    fn current_values(&self) -> &FieldValueTable {
        self.simulation
            .as_ref()
            .map_or(&self.values, SimulationContext::values)
    }

    fn set_form_field_value(&mut self, id: &str, value: Option<&str>) {
        if let Some(sim) = &mut self.simulation {
            sim.set_value(id, value);
            return;
        }
        self.values.set(id, value);
        self.store_values();
    }

    // -------------------------------------------------------------------------
    // Display
    // -------------------------------------------------------------------------

    fn update_form_fields(&mut self, id: &str) {
        let contents: Vec<(FormField, String)> = {
            let table = self.current_values();
            let trafos = TrafoEngine::new(&self.registry);
            let value = table.get(id).unwrap_or_default();
            let mut out: Vec<(FormField, String)> = self
                .index
                .fields(id)
                .iter()
                .map(|field| {
                    let content = if self.preview {
                        render(field, value, table, trafos)
                    } else {
                        format!("<{}>", id)
                    };
                    (field.clone(), content)
                })
                .collect();
            if self.preview {
                out.extend(
                    self.index
                        .static_fields()
                        .iter()
                        .map(|field| (field.clone(), render(field, value, table, trafos))),
                );
            }
            out
        };

        match &mut self.simulation {
            Some(sim) => {
                for (field, content) in contents {
                    sim.set_field_content(field.key(), content);
                }
            }
            None => {
                for (field, content) in &contents {
                    field.handle().set_value(content);
                }
                if !contents.is_empty() {
                    self.host.set_modified(true);
                }
            }
        }
    }

    fn update_all_form_fields(&mut self) {
        let ids: BTreeSet<String> = self
            .index
            .ids()
            .chain(self.current_values().ids())
            .map(str::to_string)
            .collect();
        for id in ids {
            self.update_form_fields(&id);
        }
    }

    fn focus_form_field(&self, id: &str) {
        let fields = self.index.fields(id);
        let target = fields
            .iter()
            .find(|f| {
                matches!(f.binding(), FieldBinding::MultiParameter { .. })
                    && f.handle().field_id().is_none()
            })
            .or_else(|| fields.iter().find(|f| !f.is_transformed()))
            .or_else(|| fields.first());
        match target {
            Some(field) => field.handle().focus(),
            None => debug!("No field to focus for '{}'", id),
        }
    }

    fn set_visible_state(&mut self, group: &str, visible: bool) {
        if let Some(sim) = &mut self.simulation {
            sim.set_group_visibility(group, visible);
            return;
        }
        self.group_visibility.insert(group.to_string(), visible);
        for element in self.scanner.visibility_elements() {
            let groups = element.groups();
            if !groups.iter().any(|g| g == group) {
                continue;
            }
            let shown = groups
                .iter()
                .all(|g| self.group_visibility.get(g).copied().unwrap_or(true));
            element.set_visible(shown);
        }
    }

    // -------------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------------

    fn apply_field_substitution(&mut self, old_id: &str, substitution: &FieldSubstitution) {
        if substitution.is_empty() {
            return;
        }
        let outcome = SubstitutionEngine::new(&self.index, &self.registry).apply(old_id, substitution);
        if !outcome.rewritten.is_empty() {
            for function in outcome.rewritten.into_values() {
                self.description.set_function(&function);
                if let Err(e) = self.registry.replace_local(function) {
                    error!("{}", e);
                }
            }
            self.store_form_description();
        }
        self.rescan();
        self.set_form_field_value(old_id, None);
        for id in &outcome.new_ids {
            self.update_form_fields(id);
        }
        self.cleanup_garbage();
    }

    fn set_trafo(&mut self, name: &str, body: &str) -> Result<(), DocError> {
        if !self.registry.is_local(name) {
            return Err(DocError::IllegalRebind(name.to_string()));
        }
        let function = Function::parse(name, body)?;
        self.description.set_function(&function);
        self.registry.replace_local(function)?;
        self.store_form_description();
        self.rescan();
        self.update_all_form_fields();
        Ok(())
    }

    fn add_local_autofunction(&mut self, body: &str) -> Option<String> {
        let items = match conf::parse(body) {
            Ok(items) => items,
            Err(e) => {
                error!("Autofunction body rejected: {}", e);
                return None;
            }
        };
        let name = self
            .autofunctions
            .add(&mut self.registry, &mut self.description, items)?;
        self.store_form_description();
        Some(name)
    }

    fn cleanup_garbage(&mut self) {
        let host = Arc::clone(&self.host);
        preserve_modified(host.as_ref(), || {
            let used = self.index.used_trafos();
            let removed = self.autofunctions.collect_garbage(
                host.as_ref(),
                &mut self.registry,
                &mut self.description,
                &used,
            );
            if !removed.is_empty() {
                self.store_form_description();
            }
        });
    }
}

fn render(field: &FormField, value: &str, table: &FieldValueTable, trafos: TrafoEngine<'_>) -> String {
    match field.binding() {
        FieldBinding::Untransformed => value.to_string(),
        FieldBinding::SingleParameter { trafo } => trafos.evaluate_single(trafo, value),
        FieldBinding::MultiParameter { trafo } => trafos.evaluate(trafo, table.as_map()),
    }
}
