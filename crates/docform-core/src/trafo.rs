//! # Trafo Evaluation
//!
//! Runs named functions against field values. Undefined functions never
//! fail: they render a visible marker so the problem shows up in the
//! document itself, and an error is logged.

use crate::functions::FunctionRegistry;
use std::collections::BTreeMap;
use tracing::error;

/// Text rendered in place of a field whose trafo is not defined.
#[must_use]
pub fn undefined_trafo_marker(name: &str) -> String {
    format!("<ERROR: TRAFO '{}' not defined>", name)
}

/// Evaluates trafos from one registry.
#[derive(Debug, Clone, Copy)]
pub struct TrafoEngine<'a> {
    registry: &'a FunctionRegistry,
}

impl<'a> TrafoEngine<'a> {
    /// An engine over `registry`.
    #[must_use]
    pub fn new(registry: &'a FunctionRegistry) -> Self {
        Self { registry }
    }

    /// Evaluate `name` with named parameter values. Only the declared
    /// parameters are passed on; missing ones stay absent.
    #[must_use]
    pub fn evaluate(&self, name: &str, params: &BTreeMap<String, String>) -> String {
        let Some(function) = self.registry.get(name) else {
            error!("Transformation function '{}' is not defined", name);
            return undefined_trafo_marker(name);
        };
        let restricted: BTreeMap<String, String> = function
            .params()
            .iter()
            .filter_map(|p| params.get(p).map(|v| (p.clone(), v.clone())))
            .collect();
        function.evaluate(&restricted)
    }

    /// Evaluate `name`, passing `value` for every declared parameter.
    #[must_use]
    pub fn evaluate_single(&self, name: &str, value: &str) -> String {
        let Some(function) = self.registry.get(name) else {
            error!("Transformation function '{}' is not defined", name);
            return undefined_trafo_marker(name);
        };
        let broadcast: BTreeMap<String, String> = function
            .params()
            .iter()
            .map(|p| (p.clone(), value.to_string()))
            .collect();
        function.evaluate(&broadcast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Function;
    use std::sync::Arc;

    fn registry() -> FunctionRegistry {
        let mut reg = FunctionRegistry::new(Arc::new(BTreeMap::new()));
        reg.add_local(Function::parse("Double", "VALUE 'x' VALUE 'x'").expect("parse"))
            .expect("add");
        reg.add_local(Function::parse("Join", "VALUE 'a' '-' VALUE 'b'").expect("parse"))
            .expect("add");
        reg
    }

    #[test]
    fn undefined_function_renders_marker() {
        let reg = registry();
        let engine = TrafoEngine::new(&reg);
        assert_eq!(
            engine.evaluate("noSuchFunction", &BTreeMap::new()),
            "<ERROR: TRAFO 'noSuchFunction' not defined>"
        );
        assert_eq!(
            engine.evaluate_single("noSuchFunction", "v"),
            undefined_trafo_marker("noSuchFunction")
        );
    }

    #[test]
    fn single_value_is_broadcast() {
        let reg = registry();
        let engine = TrafoEngine::new(&reg);
        assert_eq!(engine.evaluate_single("Double", "A"), "AA");
        assert_eq!(engine.evaluate_single("Join", "z"), "z-z");
    }

    #[test]
    fn map_evaluation_uses_declared_params() {
        let reg = registry();
        let engine = TrafoEngine::new(&reg);
        let mut params = BTreeMap::new();
        params.insert("a".to_string(), "1".to_string());
        params.insert("b".to_string(), "2".to_string());
        params.insert("unused".to_string(), "3".to_string());
        assert_eq!(engine.evaluate("Join", &params), "1-2");
    }
}
