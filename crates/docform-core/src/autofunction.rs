//! # Autofunctions
//!
//! Document-local functions created on the fly (for instance when a user
//! wraps a field in a trafo through the form editor). They are named
//! `AUTOFUNCTION_<n>` and collected again once no handle refers to them.

use crate::conf::ConfNode;
use crate::form_description::FormDescription;
use crate::functions::{Function, FunctionRegistry};
use crate::host::HostDocument;
use crate::primitives::AUTOFUNCTION_PREFIX;
use std::collections::BTreeSet;
use tracing::{debug, error, warn};

/// Hands out autofunction names and collects unused autofunctions.
#[derive(Debug, Clone, Default)]
pub struct AutofunctionManager {
    counter: u64,
}

/// Whether `name` carries the autofunction prefix.
#[must_use]
pub fn is_autofunction(name: &str) -> bool {
    name.starts_with(AUTOFUNCTION_PREFIX)
}

impl AutofunctionManager {
    /// A manager starting at `AUTOFUNCTION_1`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next name not known to `registry`.
    pub fn next_name(&mut self, registry: &FunctionRegistry) -> String {
        loop {
            self.counter = self.counter.saturating_add(1);
            let name = format!("{}{}", AUTOFUNCTION_PREFIX, self.counter);
            if registry.get(&name).is_none() {
                return name;
            }
        }
    }

    /// Register `body` as a new autofunction, both in `registry` and in the
    /// `Funktionen` section of `description`. Returns the new name, or
    /// `None` if the body does not compile.
    pub fn add(
        &mut self,
        registry: &mut FunctionRegistry,
        description: &mut FormDescription,
        body: Vec<ConfNode>,
    ) -> Option<String> {
        let name = self.next_name(registry);
        let function = match Function::new(name.clone(), body) {
            Ok(f) => f,
            Err(e) => {
                error!("Autofunction rejected: {}", e);
                return None;
            }
        };
        description.set_function(&function);
        if let Err(e) = registry.add_local(function) {
            error!("Autofunction {} could not be registered: {}", name, e);
            return None;
        }
        debug!("Added autofunction {}", name);
        Some(name)
    }

    /// Remove every autofunction not in `used` from `registry`, from
    /// `description` and from the host's function resources. Returns the
    /// names removed from the registry.
    pub fn collect_garbage(
        &self,
        host: &dyn HostDocument,
        registry: &mut FunctionRegistry,
        description: &mut FormDescription,
        used: &BTreeSet<String>,
    ) -> Vec<String> {
        let mut removed = Vec::new();
        for name in registry.local_names() {
            if is_autofunction(&name) && !used.contains(&name) {
                registry.remove_local(&name);
                description.remove_function(&name);
                removed.push(name);
            }
        }

        match host.function_resources() {
            Ok(resources) => {
                for name in resources {
                    if !is_autofunction(&name) || used.contains(&name) {
                        continue;
                    }
                    if let Err(e) = host.release_function_resource(&name) {
                        warn!("Could not release function resource {}: {}", name, e);
                    }
                }
            }
            Err(e) => warn!("Could not list function resources: {}", e),
        }

        if !removed.is_empty() {
            debug!("Collected {} unused autofunctions", removed.len());
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryDocument;

    #[test]
    fn names_skip_existing_functions() {
        let mut reg = FunctionRegistry::default();
        reg.add_local(Function::parse("AUTOFUNCTION_1", "'x'").expect("parse"))
            .expect("add");
        let mut mgr = AutofunctionManager::new();
        assert_eq!(mgr.next_name(&reg), "AUTOFUNCTION_2");
        assert_eq!(mgr.next_name(&reg), "AUTOFUNCTION_3");
    }

    #[test]
    fn add_registers_and_describes() {
        let mut reg = FunctionRegistry::default();
        let mut desc = FormDescription::new();
        let mut mgr = AutofunctionManager::new();
        let name = mgr
            .add(&mut reg, &mut desc, vec![ConfNode::str("x")])
            .expect("added");
        assert!(reg.is_local(&name));
        assert_eq!(desc.function_definitions()[0].0, name);

        assert_eq!(mgr.add(&mut reg, &mut desc, Vec::new()), None);
    }

    #[test]
    fn garbage_is_collected_everywhere() {
        let doc = InMemoryDocument::new();
        doc.push_function_resource("AUTOFUNCTION_1");
        doc.push_function_resource("AUTOFUNCTION_2");
        doc.push_function_resource("Manual");

        let mut reg = FunctionRegistry::default();
        let mut desc = FormDescription::new();
        let mut mgr = AutofunctionManager::new();
        let used = mgr
            .add(&mut reg, &mut desc, vec![ConfNode::str("a")])
            .expect("added");
        let unused = mgr
            .add(&mut reg, &mut desc, vec![ConfNode::str("b")])
            .expect("added");
        reg.add_local(Function::parse("Manual", "'m'").expect("parse"))
            .expect("add");

        let removed =
            mgr.collect_garbage(&doc, &mut reg, &mut desc, &BTreeSet::from([used.clone()]));
        assert_eq!(removed, [unused.clone()]);
        assert!(reg.is_local(&used));
        assert!(reg.is_local("Manual"));
        assert!(!reg.is_local(&unused));
        assert_eq!(desc.function_definitions().len(), 1);
        assert_eq!(
            doc.function_resources().expect("resources"),
            ["AUTOFUNCTION_1", "Manual"]
        );
    }
}
