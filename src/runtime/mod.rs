//! Everything the evaluator needs that outlives a single statement: defined
//! functions, variable storage, and the active call stack. Kept as one plain
//! data struct the evaluator drives, the way the teacher's `Environment`
//! held bindings for its tree-walker — except scoping here is per-identifier
//! value stacks (push on call, pop on return) rather than an environment
//! chain, since this language has no lexical closures or block scoping to
//! resolve distances for.

use std::collections::HashMap;
use std::rc::Rc;

use crate::parser::FunctionDefinition;

/// Storage for one variable name: a stack of values, one entry per call
/// frame that has ever written to it. The global/top-level frame is the
/// first entry, pushed lazily on first use.
#[derive(Debug, Default)]
struct VarSlot(Vec<f64>);

impl VarSlot {
    fn read(&self) -> f64 {
        *self.0.last().unwrap_or(&0.0)
    }

    fn write_top(&mut self, value: f64) {
        match self.0.last_mut() {
            Some(top) => *top = value,
            None => self.0.push(value),
        }
    }
}

/// The interpreter's mutable world. One instance lives for the whole
/// program run, persisting variables and function definitions across
/// commands the way a REPL session is expected to.
#[derive(Debug, Default)]
pub struct RuntimeContext {
    functions: HashMap<String, Rc<FunctionDefinition>>,
    variables: HashMap<String, VarSlot>,
    call_stack: Vec<String>,
}

/// Name reported for diagnostics raised outside any function call.
pub const TOP_LEVEL_FRAME: &str = "(main)";

impl RuntimeContext {
    pub fn new() -> Self {
        RuntimeContext::default()
    }

    pub fn define_function(&mut self, def: FunctionDefinition) {
        self.functions.insert(def.name.clone(), Rc::new(def));
    }

    pub fn lookup_function(&self, name: &str) -> Option<Rc<FunctionDefinition>> {
        self.functions.get(name).cloned()
    }

    /// The name of the innermost active call, or the top-level frame name if
    /// none is active. Read at the point an error is raised, before any
    /// unwinding pops frames off the call stack.
    pub fn current_frame(&self) -> &str {
        self.call_stack.last().map(String::as_str).unwrap_or(TOP_LEVEL_FRAME)
    }

    pub fn push_call(&mut self, function_name: impl Into<String>) {
        self.call_stack.push(function_name.into());
    }

    pub fn pop_call(&mut self) {
        self.call_stack.pop();
    }

    pub fn read_var(&self, name: &str) -> f64 {
        self.variables.get(name).map(VarSlot::read).unwrap_or(0.0)
    }

    /// Writes to the innermost live frame of `name`, creating the variable
    /// (as a single top-level frame) on first use.
    pub fn write_var(&mut self, name: &str, value: f64) {
        self.variables
            .entry(name.to_string())
            .or_default()
            .write_top(value);
    }

    /// Pushes a fresh frame for `name`, used when a called function's
    /// parameter or auto variable shadows any existing value under the same
    /// name. The frame starts at `initial`.
    pub fn push_scope(&mut self, name: &str, initial: f64) {
        self.variables
            .entry(name.to_string())
            .or_default()
            .0
            .push(initial);
    }

    /// Pops the innermost frame of `name`, restoring whatever value (if any)
    /// was shadowed. Called once per parameter/auto on function return.
    pub fn pop_scope(&mut self, name: &str) {
        if let Some(slot) = self.variables.get_mut(name) {
            slot.0.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_reads_as_zero() {
        let rt = RuntimeContext::new();
        assert_eq!(rt.read_var("x"), 0.0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut rt = RuntimeContext::new();
        rt.write_var("x", 42.0);
        assert_eq!(rt.read_var("x"), 42.0);
    }

    #[test]
    fn push_scope_shadows_and_pop_scope_restores() {
        let mut rt = RuntimeContext::new();
        rt.write_var("x", 1.0);
        rt.push_scope("x", 99.0);
        assert_eq!(rt.read_var("x"), 99.0);
        rt.write_var("x", 100.0);
        assert_eq!(rt.read_var("x"), 100.0);
        rt.pop_scope("x");
        assert_eq!(rt.read_var("x"), 1.0);
    }

    #[test]
    fn call_stack_reports_innermost_frame() {
        let mut rt = RuntimeContext::new();
        assert_eq!(rt.current_frame(), TOP_LEVEL_FRAME);
        rt.push_call("f");
        assert_eq!(rt.current_frame(), "f");
        rt.push_call("g");
        assert_eq!(rt.current_frame(), "g");
        rt.pop_call();
        assert_eq!(rt.current_frame(), "f");
    }

    #[test]
    fn function_definitions_are_retrievable_by_name() {
        let mut rt = RuntimeContext::new();
        let def = FunctionDefinition {
            name: "f".to_string(),
            params: vec![],
            autos: vec![],
            body: vec![],
        };
        rt.define_function(def);
        assert!(rt.lookup_function("f").is_some());
        assert!(rt.lookup_function("g").is_none());
    }

    #[test]
    fn redefining_a_function_replaces_it() {
        let mut rt = RuntimeContext::new();
        rt.define_function(FunctionDefinition {
            name: "f".to_string(),
            params: vec!["a".to_string()],
            autos: vec![],
            body: vec![],
        });
        rt.define_function(FunctionDefinition {
            name: "f".to_string(),
            params: vec![],
            autos: vec![],
            body: vec![],
        });
        assert_eq!(rt.lookup_function("f").unwrap().params.len(), 0);
    }
}
