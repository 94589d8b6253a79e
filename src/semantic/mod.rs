//! The semantic checker: structural rules that must hold before a command is
//! executed. Reset at every command boundary and driven from the parser at
//! exactly the points where the relevant structure is recognized (entering
//! a `define`, entering/leaving a `while` head, seeing `break`/`continue`/
//! `return`, adding a parameter or auto name).

use crate::diagnostics::SemanticError;

#[derive(Debug, Default)]
pub struct SemanticContext {
    in_function: bool,
    loop_depth: u32,
    /// First semantic error seen this command, if any. Parsing continues
    /// past it (the AST is still built to completion) but the command will
    /// not execute once this is set.
    failed: Option<SemanticError>,
    names_in_scope: Vec<String>,
}

impl SemanticContext {
    pub fn new() -> Self {
        SemanticContext::default()
    }

    pub fn reset(&mut self) {
        *self = SemanticContext::default();
    }

    pub fn has_failed(&self) -> bool {
        self.failed.is_some()
    }

    pub fn take_error(&mut self) -> Option<SemanticError> {
        self.failed.take()
    }

    fn report(&mut self, message: &str, line: usize, column: usize) {
        if self.failed.is_none() {
            self.failed = Some(SemanticError {
                message: message.to_string(),
                line,
                column,
            });
        }
    }

    pub fn enter_function(&mut self) {
        self.in_function = true;
        self.names_in_scope.clear();
    }

    pub fn leave_function(&mut self) {
        self.in_function = false;
        self.names_in_scope.clear();
    }

    pub fn enter_loop(&mut self) {
        self.loop_depth += 1;
    }

    pub fn leave_loop(&mut self) {
        self.loop_depth -= 1;
    }

    pub fn check_break(&mut self, line: usize, column: usize) {
        if self.loop_depth == 0 {
            self.report("break outside while", line, column);
        }
    }

    pub fn check_continue(&mut self, line: usize, column: usize) {
        if self.loop_depth == 0 {
            self.report("continue outside while", line, column);
        }
    }

    pub fn check_return(&mut self, line: usize, column: usize) {
        if !self.in_function {
            self.report("return outside function definition", line, column);
        }
    }

    /// Registers `name` as a parameter or auto variable of the function
    /// currently being defined, reporting a duplicate against every name
    /// registered so far (earlier parameters, and earlier autos).
    pub fn check_and_add_name(&mut self, name: &str, line: usize, column: usize) {
        if self.names_in_scope.iter().any(|n| n == name) {
            self.report(
                "duplicate name in parameter or auto variable list",
                line,
                column,
            );
        }
        self.names_in_scope.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_outside_while_is_reported() {
        let mut sc = SemanticContext::new();
        sc.check_break(1, 1);
        assert!(sc.has_failed());
        assert_eq!(sc.take_error().unwrap().message, "break outside while");
    }

    #[test]
    fn break_inside_while_is_fine() {
        let mut sc = SemanticContext::new();
        sc.enter_loop();
        sc.check_break(1, 1);
        assert!(!sc.has_failed());
        sc.leave_loop();
    }

    #[test]
    fn return_outside_function_is_reported() {
        let mut sc = SemanticContext::new();
        sc.check_return(2, 3);
        assert!(sc.has_failed());
    }

    #[test]
    fn duplicate_parameter_name_is_reported() {
        let mut sc = SemanticContext::new();
        sc.enter_function();
        sc.check_and_add_name("x", 1, 1);
        sc.check_and_add_name("x", 1, 5);
        assert!(sc.has_failed());
        assert_eq!(
            sc.take_error().unwrap().message,
            "duplicate name in parameter or auto variable list"
        );
    }

    #[test]
    fn auto_name_colliding_with_param_is_reported() {
        let mut sc = SemanticContext::new();
        sc.enter_function();
        sc.check_and_add_name("x", 1, 1);
        sc.check_and_add_name("x", 1, 10);
        assert!(sc.has_failed());
    }

    #[test]
    fn reset_clears_all_state() {
        let mut sc = SemanticContext::new();
        sc.enter_function();
        sc.enter_loop();
        sc.check_break(1, 1);
        sc.reset();
        assert!(!sc.has_failed());
        sc.check_return(1, 1);
        assert!(sc.has_failed());
    }

    #[test]
    fn only_first_error_is_retained() {
        let mut sc = SemanticContext::new();
        sc.check_break(1, 1);
        sc.check_continue(2, 2);
        let err = sc.take_error().unwrap();
        assert_eq!(err.line, 1);
    }
}
