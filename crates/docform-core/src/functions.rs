//! # Functions
//!
//! Named transformation functions ("trafos") and the registry that resolves
//! them.
//!
//! A function body is a forest of block-grammar expressions:
//!
//! ```text
//! CAT(VALUE 'FirstName' ' ' VALUE 'LastName')
//! IF(STRCMP(VALUE 'Title' 'Dr.') THEN('Dear Doctor') ELSE('Dear ' VALUE 'Name'))
//! ```
//!
//! Several top-level expressions concatenate. The parameters of a function
//! are the ids read by its `VALUE` expressions, in first-occurrence order.
//!
//! Two registries exist per document: the global one (from configuration,
//! shared read-only between documents) and the document-local one, which
//! alone may be edited.

use crate::DocError;
use crate::conf::{self, ConfNode};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

const TRUE: &str = "true";
const FALSE: &str = "false";

/// One compiled expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A string literal.
    Literal(String),
    /// The value of a field id.
    Value(String),
    /// Concatenation.
    Cat(Vec<Expr>),
    /// Conditional; the condition is true if it renders as `true`.
    If {
        /// Condition.
        condition: Box<Expr>,
        /// Rendered when the condition holds.
        then: Vec<Expr>,
        /// Rendered otherwise.
        otherwise: Vec<Expr>,
    },
    /// String comparison: `true` if all equal, `-1`/`1` if the first is
    /// consistently smaller/larger, `0` if mixed.
    StrCmp(Vec<Expr>),
    /// `true` if every operand is `true`.
    And(Vec<Expr>),
    /// `true` if any operand is `true`.
    Or(Vec<Expr>),
    /// `true` if any operand is not `true`.
    Not(Vec<Expr>),
    /// Character count of the concatenated operands.
    Length(Vec<Expr>),
}

impl Expr {
    /// Compile one block node.
    pub fn compile(node: &ConfNode) -> Result<Self, DocError> {
        let (name, children) = match node {
            ConfNode::Str(s) => return Ok(Self::Literal(s.clone())),
            ConfNode::Node { name, children } => (name.as_str(), children.as_slice()),
        };
        match name {
            "VALUE" => match children {
                [ConfNode::Str(id)] => Ok(Self::Value(id.clone())),
                _ => Err(DocError::InvalidFunction(
                    "VALUE expects exactly one field id".to_string(),
                )),
            },
            "CAT" | "THEN" | "ELSE" => Ok(Self::Cat(compile_all(children)?)),
            "IF" => compile_if(children),
            "STRCMP" => {
                if children.len() < 2 {
                    return Err(DocError::InvalidFunction(
                        "STRCMP needs at least 2 operands".to_string(),
                    ));
                }
                Ok(Self::StrCmp(compile_all(children)?))
            }
            "AND" => Ok(Self::And(compile_all(children)?)),
            "OR" => Ok(Self::Or(compile_all(children)?)),
            "NOT" => Ok(Self::Not(compile_all(children)?)),
            "LENGTH" => Ok(Self::Length(compile_all(children)?)),
            "" => Err(DocError::InvalidFunction(
                "opening bracket without function name".to_string(),
            )),
            other => Err(DocError::InvalidFunction(format!(
                "'{}' is not a supported function",
                other
            ))),
        }
    }

    /// Evaluate; `None` when a referenced id has no value.
    fn eval(&self, values: &BTreeMap<String, String>) -> Option<String> {
        match self {
            Self::Literal(s) => Some(s.clone()),
            Self::Value(id) => values.get(id).cloned(),
            Self::Cat(parts) => eval_cat(parts, values),
            Self::If {
                condition,
                then,
                otherwise,
            } => {
                if is_true(&condition.eval(values)?) {
                    eval_cat(then, values)
                } else {
                    eval_cat(otherwise, values)
                }
            }
            Self::StrCmp(operands) => eval_strcmp(operands, values),
            Self::And(operands) => {
                for op in operands {
                    if !is_true(&op.eval(values)?) {
                        return Some(FALSE.to_string());
                    }
                }
                Some(TRUE.to_string())
            }
            Self::Or(operands) => {
                for op in operands {
                    if is_true(&op.eval(values)?) {
                        return Some(TRUE.to_string());
                    }
                }
                Some(FALSE.to_string())
            }
            Self::Not(operands) => {
                for op in operands {
                    if !is_true(&op.eval(values)?) {
                        return Some(TRUE.to_string());
                    }
                }
                Some(FALSE.to_string())
            }
            Self::Length(parts) => Some(eval_cat(parts, values)?.chars().count().to_string()),
        }
    }

    fn collect_params(&self, out: &mut Vec<String>) {
        match self {
            Self::Literal(_) => {}
            Self::Value(id) => {
                if !out.contains(id) {
                    out.push(id.clone());
                }
            }
            Self::If {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_params(out);
                then.iter().for_each(|e| e.collect_params(out));
                otherwise.iter().for_each(|e| e.collect_params(out));
            }
            Self::Cat(ops)
            | Self::StrCmp(ops)
            | Self::And(ops)
            | Self::Or(ops)
            | Self::Not(ops)
            | Self::Length(ops) => ops.iter().for_each(|e| e.collect_params(out)),
        }
    }
}

fn is_true(s: &str) -> bool {
    s.eq_ignore_ascii_case(TRUE)
}

fn compile_all(nodes: &[ConfNode]) -> Result<Vec<Expr>, DocError> {
    nodes.iter().map(Expr::compile).collect()
}

fn compile_if(children: &[ConfNode]) -> Result<Expr, DocError> {
    let mut condition = None;
    let mut then = Vec::new();
    let mut otherwise = Vec::new();
    for child in children {
        match child {
            ConfNode::Node { name, children } if name == "THEN" => then = compile_all(children)?,
            ConfNode::Node { name, children } if name == "ELSE" => {
                otherwise = compile_all(children)?;
            }
            _ if condition.is_none() => condition = Some(Expr::compile(child)?),
            _ => {
                return Err(DocError::InvalidFunction(
                    "IF accepts one condition plus THEN and ELSE".to_string(),
                ));
            }
        }
    }
    let condition =
        condition.ok_or_else(|| DocError::InvalidFunction("IF without condition".to_string()))?;
    Ok(Expr::If {
        condition: Box::new(condition),
        then,
        otherwise,
    })
}

fn eval_cat(parts: &[Expr], values: &BTreeMap<String, String>) -> Option<String> {
    let mut out = String::new();
    for part in parts {
        out.push_str(&part.eval(values)?);
    }
    Some(out)
}

fn eval_strcmp(operands: &[Expr], values: &BTreeMap<String, String>) -> Option<String> {
    let mut iter = operands.iter();
    let first = iter.next()?.eval(values)?;
    let mut trend: i64 = 0;
    for op in iter {
        let res: i64 = match first.as_str().cmp(op.eval(values)?.as_str()) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        };
        if res.saturating_mul(trend) < 0 {
            return Some("0".to_string());
        }
        trend = trend.saturating_add(res);
    }
    Some(
        match trend.signum() {
            -1 => "-1",
            1 => "1",
            _ => TRUE,
        }
        .to_string(),
    )
}

/// Rewrite every `VALUE 'old'` below `node` to `VALUE 'new'`.
fn substitute_value(node: &mut ConfNode, old_id: &str, new_id: &str) {
    let ConfNode::Node { name, children } = node else {
        return;
    };
    if name.as_str() == "VALUE" {
        if let [ConfNode::Str(id)] = children.as_mut_slice() {
            if id.as_str() == old_id {
                *id = new_id.to_string();
            }
            return;
        }
    }
    for child in children {
        substitute_value(child, old_id, new_id);
    }
}

// =============================================================================
// FUNCTION
// =============================================================================

/// A named, compiled function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    name: String,
    definition: Vec<ConfNode>,
    body: Vec<Expr>,
    params: Vec<String>,
}

impl Function {
    /// Compile `definition` (the body expressions) under `name`.
    pub fn new(name: impl Into<String>, definition: Vec<ConfNode>) -> Result<Self, DocError> {
        let name = name.into();
        if definition.is_empty() {
            return Err(DocError::InvalidFunction(format!(
                "function '{}' has an empty body",
                name
            )));
        }
        let body = compile_all(&definition)?;
        let mut params = Vec::new();
        body.iter().for_each(|e| e.collect_params(&mut params));
        Ok(Self {
            name,
            definition,
            body,
            params,
        })
    }

    /// Parse a body written in block syntax.
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, DocError> {
        let definition = conf::parse(source).map_err(|e| match e {
            DocError::MalformedBlock(msg) => DocError::InvalidFunction(msg),
            other => other,
        })?;
        Self::new(name, definition)
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameters, in first-occurrence order.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Body expressions as written.
    #[must_use]
    pub fn definition(&self) -> &[ConfNode] {
        &self.definition
    }

    /// The body rendered in block syntax.
    #[must_use]
    pub fn source(&self) -> String {
        conf::render_items(&self.definition)
    }

    /// `NAME(body...)`, as stored in a `Funktionen` section.
    #[must_use]
    pub fn to_conf(&self) -> ConfNode {
        ConfNode::node(self.name.clone(), self.definition.clone())
    }

    /// Evaluate against named values. Ids without a value make the result
    /// empty.
    #[must_use]
    pub fn evaluate(&self, values: &BTreeMap<String, String>) -> String {
        eval_cat(&self.body, values).unwrap_or_default()
    }

    /// A copy reading `new_id` wherever this function read `old_id`.
    pub fn with_substituted_value(&self, old_id: &str, new_id: &str) -> Result<Self, DocError> {
        let mut definition = self.definition.clone();
        for node in &mut definition {
            substitute_value(node, old_id, new_id);
        }
        Self::new(self.name.clone(), definition)
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Global plus document-local functions; lookups prefer local ones.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    global: Arc<BTreeMap<String, Function>>,
    local: BTreeMap<String, Function>,
}

impl FunctionRegistry {
    /// A registry over a shared global function table.
    #[must_use]
    pub fn new(global: Arc<BTreeMap<String, Function>>) -> Self {
        Self {
            global,
            local: BTreeMap::new(),
        }
    }

    /// Look a function up.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.local.get(name).or_else(|| self.global.get(name))
    }

    /// Whether `name` is a document-local function.
    #[must_use]
    pub fn is_local(&self, name: &str) -> bool {
        self.local.contains_key(name)
    }

    /// Names of every document-local function.
    #[must_use]
    pub fn local_names(&self) -> Vec<String> {
        self.local.keys().cloned().collect()
    }

    /// Register a new local function.
    ///
    /// # Errors
    ///
    /// Returns `DocError::DuplicateId` if the name is already registered.
    pub fn add_local(&mut self, function: Function) -> Result<(), DocError> {
        if self.get(function.name()).is_some() {
            return Err(DocError::DuplicateId(function.name().to_string()));
        }
        self.local.insert(function.name().to_string(), function);
        Ok(())
    }

    /// Replace the definition of an existing local function.
    ///
    /// # Errors
    ///
    /// Returns `DocError::IllegalRebind` if the function is not local.
    pub fn replace_local(&mut self, function: Function) -> Result<(), DocError> {
        match self.local.get_mut(function.name()) {
            Some(slot) => {
                *slot = function;
                Ok(())
            }
            None => Err(DocError::IllegalRebind(function.name().to_string())),
        }
    }

    /// Drop a local function.
    pub fn remove_local(&mut self, name: &str) -> Option<Function> {
        self.local.remove(name)
    }

    /// Drop every local function.
    pub fn clear_local(&mut self) {
        self.local.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn params_in_first_occurrence_order() {
        let f = Function::parse("F", "CAT(VALUE 'b' VALUE 'a' VALUE 'b')").expect("parse");
        assert_eq!(f.params(), ["b", "a"]);
    }

    #[test]
    fn top_level_expressions_concatenate() {
        let f = Function::parse("F", "'Dear ' VALUE 'Name' '!'").expect("parse");
        assert_eq!(f.evaluate(&values(&[("Name", "Ann")])), "Dear Ann!");
    }

    #[test]
    fn missing_value_renders_empty() {
        let f = Function::parse("F", "'x' VALUE 'gone'").expect("parse");
        assert_eq!(f.evaluate(&BTreeMap::new()), "");
    }

    #[test]
    fn if_and_strcmp() {
        let f = Function::parse(
            "F",
            "IF(STRCMP(VALUE 'T' 'Dr.') THEN('Doctor') ELSE('Dear ' VALUE 'T'))",
        )
        .expect("parse");
        assert_eq!(f.evaluate(&values(&[("T", "Dr.")])), "Doctor");
        assert_eq!(f.evaluate(&values(&[("T", "Ms.")])), "Dear Ms.");
    }

    #[test]
    fn strcmp_orders() {
        let f = Function::parse("F", "STRCMP('a' 'b' 'c')").expect("parse");
        assert_eq!(f.evaluate(&BTreeMap::new()), "-1");
        let f = Function::parse("F", "STRCMP('b' 'a' 'c')").expect("parse");
        assert_eq!(f.evaluate(&BTreeMap::new()), "0");
    }

    #[test]
    fn boolean_functions() {
        let vals = values(&[("a", "TRUE"), ("b", "no")]);
        let and = Function::parse("F", "AND(VALUE 'a' VALUE 'b')").expect("parse");
        let or = Function::parse("F", "OR(VALUE 'a' VALUE 'b')").expect("parse");
        let not = Function::parse("F", "NOT(VALUE 'a')").expect("parse");
        assert_eq!(and.evaluate(&vals), "false");
        assert_eq!(or.evaluate(&vals), "true");
        assert_eq!(not.evaluate(&vals), "false");
    }

    #[test]
    fn length_counts_chars() {
        let f = Function::parse("F", "LENGTH(VALUE 'a' 'ü')").expect("parse");
        assert_eq!(f.evaluate(&values(&[("a", "ab")])), "3");
    }

    #[test]
    fn unknown_constructor_is_rejected() {
        assert!(matches!(
            Function::parse("F", "FROBNICATE('x')"),
            Err(DocError::InvalidFunction(_))
        ));
        assert!(matches!(
            Function::parse("F", "CAT("),
            Err(DocError::InvalidFunction(_))
        ));
        assert!(matches!(Function::parse("F", ""), Err(DocError::InvalidFunction(_))));
    }

    #[test]
    fn substituted_value_rewrites_params() {
        let f = Function::parse("F", "CAT(VALUE 'old' VALUE 'other')").expect("parse");
        let g = f.with_substituted_value("old", "new").expect("rewrite");
        assert_eq!(g.params(), ["new", "other"]);
        assert_eq!(g.source(), "CAT(VALUE 'new' VALUE 'other')");
    }

    #[test]
    fn registry_rules() {
        let mut global = BTreeMap::new();
        global.insert(
            "G".to_string(),
            Function::parse("G", "'g'").expect("parse"),
        );
        let mut reg = FunctionRegistry::new(Arc::new(global));
        assert!(matches!(
            reg.add_local(Function::parse("G", "'x'").expect("parse")),
            Err(DocError::DuplicateId(_))
        ));
        assert!(matches!(
            reg.replace_local(Function::parse("G", "'x'").expect("parse")),
            Err(DocError::IllegalRebind(_))
        ));
        reg.add_local(Function::parse("L", "'l'").expect("parse"))
            .expect("add");
        assert!(reg.is_local("L"));
        assert!(!reg.is_local("G"));
        reg.replace_local(Function::parse("L", "'m'").expect("parse"))
            .expect("replace");
        assert_eq!(reg.get("L").map(|f| f.evaluate(&BTreeMap::new())), Some("m".into()));
    }
}
