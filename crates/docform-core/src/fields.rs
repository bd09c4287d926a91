//! # Field Index
//!
//! Groups the handles found by a scan under the ids they display. The
//! binding kind of every handle is resolved once, here.
//!
//! - Untransformed and single-parameter handles are listed under their own id.
//! - Multi-parameter handles are listed under every parameter of their trafo.
//! - Handles whose trafo declares no parameters are "static": they depend on
//!   no id and are redrawn together with every id.

use crate::FieldKey;
use crate::functions::FunctionRegistry;
use crate::host::FormFieldHandle;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// How a handle derives its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldBinding {
    /// Shows the value of its id as-is.
    Untransformed,
    /// Shows `trafo` applied to the value of its own id.
    SingleParameter {
        /// Trafo name.
        trafo: String,
    },
    /// Shows `trafo` applied to the values of all its parameters.
    MultiParameter {
        /// Trafo name.
        trafo: String,
    },
}

impl FieldBinding {
    /// Classify `handle`.
    #[must_use]
    pub fn resolve(handle: &dyn FormFieldHandle) -> Self {
        match handle.trafo_name() {
            None => Self::Untransformed,
            Some(trafo) if handle.is_single_parameter_trafo() => Self::SingleParameter { trafo },
            Some(trafo) => Self::MultiParameter { trafo },
        }
    }

    /// Bound trafo name, if any.
    #[must_use]
    pub fn trafo(&self) -> Option<&str> {
        match self {
            Self::Untransformed => None,
            Self::SingleParameter { trafo } | Self::MultiParameter { trafo } => Some(trafo),
        }
    }
}

/// One handle together with its resolved binding.
#[derive(Clone)]
pub struct FormField {
    key: FieldKey,
    handle: Arc<dyn FormFieldHandle>,
    binding: FieldBinding,
}

impl std::fmt::Debug for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormField")
            .field("key", &self.key)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl FormField {
    /// Identity within the scan.
    #[must_use]
    pub fn key(&self) -> FieldKey {
        self.key
    }

    /// The host handle.
    #[must_use]
    pub fn handle(&self) -> &dyn FormFieldHandle {
        self.handle.as_ref()
    }

    /// Resolved binding.
    #[must_use]
    pub fn binding(&self) -> &FieldBinding {
        &self.binding
    }

    /// Whether a trafo is bound.
    #[must_use]
    pub fn is_transformed(&self) -> bool {
        !matches!(self.binding, FieldBinding::Untransformed)
    }
}

/// id → handles index built from one scan.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    by_id: BTreeMap<String, Vec<FormField>>,
    static_fields: Vec<FormField>,
    all: Vec<FormField>,
}

impl FieldIndex {
    /// Index `handles` (in document order), resolving multi-parameter ids
    /// through `registry`.
    #[must_use]
    pub fn build(handles: Vec<Arc<dyn FormFieldHandle>>, registry: &FunctionRegistry) -> Self {
        let mut index = Self::default();
        for (n, handle) in handles.into_iter().enumerate() {
            let binding = FieldBinding::resolve(handle.as_ref());
            let ids: Vec<String> = match &binding {
                FieldBinding::MultiParameter { trafo } => match registry.get(trafo) {
                    Some(function) => function.params().to_vec(),
                    None => handle.field_id().into_iter().collect(),
                },
                _ => handle.field_id().into_iter().collect(),
            };
            let field = FormField {
                key: FieldKey(n as u64),
                handle,
                binding,
            };
            if ids.is_empty() && field.is_transformed() {
                index.static_fields.push(field.clone());
            }
            for id in ids {
                index.by_id.entry(id).or_default().push(field.clone());
            }
            index.all.push(field);
        }
        index
    }

    /// Handles listed under `id`, in document order.
    #[must_use]
    pub fn fields(&self, id: &str) -> &[FormField] {
        self.by_id.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every id with at least one handle.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.keys().map(String::as_str)
    }

    /// Handles that depend on no id.
    #[must_use]
    pub fn static_fields(&self) -> &[FormField] {
        &self.static_fields
    }

    /// Every handle, in document order.
    #[must_use]
    pub fn all(&self) -> &[FormField] {
        &self.all
    }

    /// Names of every trafo bound to some handle.
    #[must_use]
    pub fn used_trafos(&self) -> BTreeSet<String> {
        self.all
            .iter()
            .filter_map(|f| f.binding.trafo().map(str::to_string))
            .collect()
    }
}
