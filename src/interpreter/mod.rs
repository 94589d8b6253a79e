//! The tree-walking evaluator: statements execute for effect against a
//! `RuntimeContext`, expressions evaluate to `f64`. Non-local transfers
//! (`break`/`continue`/`return`) are carried as an ordinary `Ok(Flow)`
//! value — the semantic checker already guarantees they only appear where
//! a `while`/function call is waiting to catch them, so there is nothing
//! for a `?` to skip past. `halt` and runtime errors are the only things
//! that truly need to unwind arbitrarily far, which is why they alone go
//! through `Err(Unwind)`.

use std::io::Write;

use crate::diagnostics::{RuntimeError, Unwind};
use crate::parser::{ArithOp, CmpOp, Command, Expr, IncrDecr, Stmt};
use crate::runtime::RuntimeContext;

/// What executing one statement produced, other than its side effects.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(f64),
}

type Evaluated<T> = Result<T, Unwind>;

/// Walks `Command`s against a `RuntimeContext`, writing displayable
/// expression-statement results to `out`.
pub struct Evaluator<W: Write> {
    out: W,
}

impl<W: Write> Evaluator<W> {
    pub fn new(out: W) -> Self {
        Evaluator { out }
    }

    /// Executes one parsed command. A `FunctionDefinition` installs itself
    /// in `rt` and never runs; a `Statements` command runs to completion or
    /// unwinds via `Unwind`.
    pub fn exec_command(&mut self, command: Command, rt: &mut RuntimeContext) -> Evaluated<()> {
        match command {
            Command::FunctionDefinition(def) => {
                rt.define_function(def);
                Ok(())
            }
            Command::Statements(stmts) => {
                self.exec_stmt_list(&stmts, rt)?;
                Ok(())
            }
        }
    }

    fn exec_stmt_list(&mut self, stmts: &[Stmt], rt: &mut RuntimeContext) -> Evaluated<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt, rt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, rt: &mut RuntimeContext) -> Evaluated<Flow> {
        match stmt {
            Stmt::ExprStmt(e) => {
                let value = self.eval_expr(e, rt)?;
                if e.displayable() {
                    let _ = writeln!(self.out, "{value}");
                }
                Ok(Flow::Normal)
            }
            Stmt::If(cond, then_branch, else_branch) => {
                if self.eval_expr(cond, rt)? != 0.0 {
                    self.exec_stmt(then_branch, rt)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch, rt)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While(cond, body) => {
                while self.eval_expr(cond, rt)? != 0.0 {
                    match self.exec_stmt(body, rt)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts) => self.exec_stmt_list(stmts, rt),
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Halt => Err(Unwind::Halt),
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval_expr(e, rt)?,
                    None => 0.0,
                };
                Ok(Flow::Return(value))
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr, rt: &mut RuntimeContext) -> Evaluated<f64> {
        match expr {
            Expr::Const(c) => Ok(*c),
            Expr::Var(name) => Ok(rt.read_var(name)),
            Expr::PreOp(name, op) => {
                let updated = apply_incr_decr(rt.read_var(name), *op);
                rt.write_var(name, updated);
                Ok(updated)
            }
            Expr::PostOp(name, op) => {
                let original = rt.read_var(name);
                rt.write_var(name, apply_incr_decr(original, *op));
                Ok(original)
            }
            Expr::Arith(l, r, op) => {
                let lv = self.eval_expr(l, rt)?;
                let rv = self.eval_expr(r, rt)?;
                self.eval_arith(*op, lv, rv, rt)
            }
            Expr::Cmp(l, r, op) => {
                let lv = self.eval_expr(l, rt)?;
                let rv = self.eval_expr(r, rt)?;
                Ok(eval_cmp(*op, lv, rv))
            }
            Expr::Not(e) => {
                let v = self.eval_expr(e, rt)?;
                Ok(if v == 0.0 { 1.0 } else { 0.0 })
            }
            Expr::Neg(e) => Ok(-self.eval_expr(e, rt)?),
            Expr::Assign(name, e) => {
                let v = self.eval_expr(e, rt)?;
                rt.write_var(name, v);
                Ok(v)
            }
            Expr::Call(name, args) => self.call(name, args, rt),
        }
    }

    fn eval_arith(&mut self, op: ArithOp, lv: f64, rv: f64, rt: &RuntimeContext) -> Evaluated<f64> {
        match op {
            ArithOp::Plus => Ok(lv + rv),
            ArithOp::Minus => Ok(lv - rv),
            ArithOp::Mul => Ok(lv * rv),
            ArithOp::Div => {
                if rv == 0.0 {
                    Err(RuntimeError::new(rt.current_frame(), "division by zero").into())
                } else {
                    Ok(lv / rv)
                }
            }
            ArithOp::Mod => {
                if rv == 0.0 {
                    Err(RuntimeError::new(rt.current_frame(), "modulo zero").into())
                } else {
                    Ok(lv - (lv / rv).floor() * rv)
                }
            }
            ArithOp::Pow => {
                let exponent = rv.floor().max(0.0);
                Ok(lv.powf(exponent))
            }
        }
    }

    fn call(&mut self, name: &str, args: &[Expr], rt: &mut RuntimeContext) -> Evaluated<f64> {
        let def = rt.lookup_function(name).ok_or_else(|| {
            Unwind::from(RuntimeError::new(
                rt.current_frame(),
                format!("function '{name}' not defined"),
            ))
        })?;

        if args.len() != def.params.len() {
            return Err(RuntimeError::new(
                rt.current_frame(),
                format!("wrong number of arguments for function '{name}'"),
            )
            .into());
        }

        // Arguments evaluate left to right in the caller's scope, before any
        // of the callee's frames are pushed.
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg, rt)?);
        }

        for (param, value) in def.params.iter().zip(values.iter()) {
            rt.push_scope(param, *value);
        }
        for auto in &def.autos {
            rt.push_scope(auto, 0.0);
        }
        rt.push_call(def.name.clone());

        let outcome = self.exec_stmt_list(&def.body, rt);

        // The unwind must happen before the error (if any) propagates
        // further, or `variables` would stay out of sync with `call_stack`.
        rt.pop_call();
        for auto in def.autos.iter().rev() {
            rt.pop_scope(auto);
        }
        for param in def.params.iter().rev() {
            rt.pop_scope(param);
        }

        match outcome? {
            Flow::Return(v) => Ok(v),
            Flow::Normal => Ok(0.0),
            Flow::Break | Flow::Continue => Ok(0.0),
        }
    }
}

fn apply_incr_decr(current: f64, op: IncrDecr) -> f64 {
    match op {
        IncrDecr::Incr => current + 1.0,
        IncrDecr::Decr => current - 1.0,
    }
}

fn eval_cmp(op: CmpOp, lv: f64, rv: f64) -> f64 {
    let result = match op {
        CmpOp::Lt => lv < rv,
        CmpOp::Le => lv <= rv,
        CmpOp::Gt => lv > rv,
        CmpOp::Ge => lv >= rv,
        CmpOp::Eq => lv == rv,
        CmpOp::Ne => lv != rv,
        // No short-circuiting: both sides are already evaluated by the
        // caller before this function ever sees them.
        CmpOp::And => lv != 0.0 && rv != 0.0,
        CmpOp::Or => lv != 0.0 || rv != 0.0,
    };
    if result {
        1.0
    } else {
        0.0
    }
}
