//! Tree-walking evaluator.
//!
//! One [`Interpreter`] runs one module and the calls made into it. Limits
//! on call depth and executed steps turn runaway generated code into
//! ordinary exceptions (`RecursionError`, `TimeoutError`).

use super::ast::*;
use super::builtins::{self, exception_matches, make_set};
use super::error::{exception_type, Exception};
use super::format::format_value;
use super::methods;
use super::ops::{self, Index};
use super::parser::parse_expression;
use super::re;
use super::stack::ensure_sufficient_stack;
use super::value::{Dict, Function, HostFunction, Scope, Value};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Resource limits for one interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum nesting of user-function calls.
    pub max_depth: usize,
    /// Maximum statements and loop iterations executed.
    pub max_steps: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_depth: 1000,
            max_steps: 5_000_000,
        }
    }
}

/// Control flow out of a statement.
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Name resolution context of the code currently running.
struct Frame {
    /// `None` at module level, where names live in the globals.
    locals: Option<Scope>,
    enclosing: Vec<Scope>,
    declared_global: HashSet<String>,
    declared_nonlocal: HashSet<String>,
}

impl Frame {
    fn module() -> Self {
        Frame {
            locals: None,
            enclosing: Vec::new(),
            declared_global: HashSet::new(),
            declared_nonlocal: HashSet::new(),
        }
    }

    fn function(closure: Vec<Scope>, locals: HashMap<String, Value>) -> Self {
        Frame {
            locals: Some(Arc::new(RwLock::new(locals))),
            enclosing: closure,
            declared_global: HashSet::new(),
            declared_nonlocal: HashSet::new(),
        }
    }

    /// Scope chain a closure created here would see.
    fn chain(&self) -> Vec<Scope> {
        let mut chain = self.enclosing.clone();
        if let Some(locals) = &self.locals {
            chain.push(locals.clone());
        }
        chain
    }

    /// Comprehensions get their own scope so loop variables do not leak.
    fn child(&self) -> Self {
        Frame {
            locals: Some(Arc::new(RwLock::new(HashMap::new()))),
            enclosing: self.chain(),
            declared_global: self.declared_global.clone(),
            declared_nonlocal: HashSet::new(),
        }
    }
}

pub struct Interpreter {
    globals: HashMap<String, Value>,
    limits: Limits,
    depth: usize,
    steps: u64,
    /// Exceptions currently being handled, innermost last; bare `raise` re-raises the top.
    handling: Vec<Exception>,
    /// Scopes captured by closures; cleared on drop to break reference cycles.
    captured: Vec<Weak<RwLock<HashMap<String, Value>>>>,
    output: String,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        for scope in self.captured.drain(..) {
            if let Some(scope) = scope.upgrade() {
                scope.write().clear();
            }
        }
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        let mut globals = HashMap::new();
        // Keeps `if __name__ == "__main__":` blocks from running.
        globals.insert("__name__".to_string(), Value::str("__erin__"));
        Interpreter {
            globals,
            limits,
            depth: 0,
            steps: 0,
            handling: Vec::new(),
            captured: Vec::new(),
            output: String::new(),
        }
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// Expose a Rust closure to the program as a global function.
    pub fn define_host<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&[Value], &[(String, Value)]) -> Result<Value, Exception> + Send + Sync + 'static,
    {
        let host = HostFunction {
            name: name.to_string(),
            func: Box::new(func),
        };
        self.define(name, Value::Host(Arc::new(host)));
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Text written by `print` so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub(crate) fn print(&mut self, text: String) {
        self.output.push_str(&text);
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Execute module-level statements (definitions, imports, constants).
    pub fn run_module(&mut self, module: &[Stmt]) -> Result<(), Exception> {
        let mut frame = Frame::module();
        self.exec_block(module, &mut frame)?;
        Ok(())
    }

    /// Call any callable value.
    pub fn call(
        &mut self,
        func: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, Exception> {
        match func {
            Value::Function(f) => self.call_function(f, args, kwargs),
            Value::Builtin(name) => builtins::call(self, *name, args, kwargs),
            Value::Method(m) => methods::call(self, m, args, kwargs),
            Value::Host(h) => (h.func)(&args, &kwargs),
            other => Err(Exception::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn tick(&mut self) -> Result<(), Exception> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(Exception::new(
                "TimeoutError",
                format!("execution exceeded {} steps", self.limits.max_steps),
            ));
        }
        Ok(())
    }

    fn call_function(
        &mut self,
        f: &Arc<Function>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, Exception> {
        if self.depth >= self.limits.max_depth {
            return Err(Exception::new(
                "RecursionError",
                "maximum recursion depth exceeded",
            ));
        }
        let locals = bind_arguments(f, args, kwargs)?;
        let mut frame = Frame::function(f.closure.clone(), locals);
        trace!("🔁 [Interpreter] call {} at depth {}", f.def.name, self.depth);
        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.exec_block(&f.def.body, &mut frame));
        self.depth -= 1;
        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }

    fn make_function(&mut self, def: &Arc<FunctionDef>, frame: &mut Frame) -> Result<Value, Exception> {
        let mut defaults = Vec::with_capacity(def.params.len());
        for param in &def.params {
            defaults.push(match &param.default {
                Some(expr) => Some(self.eval(expr, frame)?),
                None => None,
            });
        }
        if let Some(locals) = &frame.locals {
            let scope = Arc::downgrade(locals);
            if !self.captured.iter().rev().take(8).any(|w| w.ptr_eq(&scope)) {
                if self.captured.len() >= 4096 {
                    self.captured.retain(|w| w.strong_count() > 0);
                }
                self.captured.push(scope);
            }
        }
        Ok(Value::Function(Arc::new(Function {
            def: def.clone(),
            defaults,
            closure: frame.chain(),
        })))
    }

    // ------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------

    fn load(&self, name: &str, frame: &Frame) -> Result<Value, Exception> {
        if !frame.declared_global.contains(name) {
            if let Some(locals) = &frame.locals {
                if let Some(v) = locals.read().get(name) {
                    return Ok(v.clone());
                }
            }
            for scope in frame.enclosing.iter().rev() {
                if let Some(v) = scope.read().get(name) {
                    return Ok(v.clone());
                }
            }
        }
        if let Some(v) = self.globals.get(name) {
            return Ok(v.clone());
        }
        builtins::lookup(name)
            .ok_or_else(|| Exception::name_error(format!("name '{}' is not defined", name)))
    }

    fn store(&mut self, name: &str, value: Value, frame: &mut Frame) -> Result<(), Exception> {
        if frame.declared_nonlocal.contains(name) {
            for scope in frame.enclosing.iter().rev() {
                let mut scope = scope.write();
                if scope.contains_key(name) {
                    scope.insert(name.to_string(), value);
                    return Ok(());
                }
            }
            return Err(Exception::new(
                "SyntaxError",
                format!("no binding for nonlocal '{}' found", name),
            ));
        }
        match &frame.locals {
            Some(locals) if !frame.declared_global.contains(name) => {
                locals.write().insert(name.to_string(), value);
            }
            _ => {
                self.globals.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    fn delete_name(&mut self, name: &str, frame: &mut Frame) -> Result<(), Exception> {
        let removed = match &frame.locals {
            Some(locals) if !frame.declared_global.contains(name) => {
                locals.write().remove(name).is_some()
            }
            _ => self.globals.remove(name).is_some(),
        };
        if removed {
            Ok(())
        } else {
            Err(Exception::name_error(format!("name '{}' is not defined", name)))
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn exec_block(&mut self, body: &[Stmt], frame: &mut Frame) -> Result<Flow, Exception> {
        for stmt in body {
            match self.exec(stmt, frame)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, frame: &mut Frame) -> Result<Flow, Exception> {
        self.tick()?;
        match stmt {
            Stmt::FunctionDef(def) => {
                let function = self.make_function(def, frame)?;
                self.store(&def.name, function, frame)?;
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::If { test, body, orelse } => {
                let branch = if self.eval(test, frame)?.truthy() {
                    body
                } else {
                    orelse
                };
                return self.exec_block(branch, frame);
            }
            Stmt::While { test, body, orelse } => {
                loop {
                    if !self.eval(test, frame)?.truthy() {
                        return self.exec_block(orelse, frame);
                    }
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let iterable = self.eval(iter, frame)?;
                let mut broke = false;
                for item in iterable.iter_values()? {
                    self.tick()?;
                    self.assign(target, item, frame)?;
                    match self.exec_block(body, frame)? {
                        Flow::Break => {
                            broke = true;
                            break;
                        }
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                if !broke {
                    return self.exec_block(orelse, frame);
                }
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Pass => {}
            Stmt::Assign { targets, value } => {
                let value = self.eval(value, frame)?;
                for target in targets {
                    self.assign(target, value.clone(), frame)?;
                }
            }
            Stmt::AugAssign { target, op, value } => self.aug_assign(target, *op, value, frame)?,
            Stmt::Expr(expr) => {
                self.eval(expr, frame)?;
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => return self.exec_try(body, handlers, orelse, finalbody, frame),
            Stmt::Raise(exc) => return Err(self.raise(exc.as_ref(), frame)?),
            Stmt::Assert(test, msg) => {
                if !self.eval(test, frame)?.truthy() {
                    let message = match msg {
                        Some(expr) => self.eval(expr, frame)?.to_str(),
                        None => String::new(),
                    };
                    return Err(Exception::new("AssertionError", message));
                }
            }
            Stmt::Import(names) => {
                for (module, alias) in names {
                    let value = builtins::import(module)?;
                    let bound = match alias {
                        Some(alias) => alias.as_str(),
                        None => module.split('.').next().unwrap_or(module),
                    };
                    self.store(bound, value, frame)?;
                }
            }
            Stmt::ImportFrom { module, names } => {
                if module == "__future__" {
                    return Ok(Flow::Normal);
                }
                builtins::import(module)?;
                for (name, alias) in names {
                    if name == "*" {
                        return Err(Exception::new(
                            "ImportError",
                            format!("'from {} import *' is not supported", module),
                        ));
                    }
                    let value = builtins::module_attr(module, name).map_err(|_| {
                        Exception::new(
                            "ImportError",
                            format!("cannot import name '{}' from '{}'", name, module),
                        )
                    })?;
                    self.store(alias.as_deref().unwrap_or(name), value, frame)?;
                }
            }
            Stmt::Global(names) => frame.declared_global.extend(names.iter().cloned()),
            Stmt::Nonlocal(names) => {
                if frame.locals.is_none() {
                    return Err(Exception::new(
                        "SyntaxError",
                        "nonlocal declaration not allowed at module level",
                    ));
                }
                frame.declared_nonlocal.extend(names.iter().cloned());
            }
            Stmt::Delete(targets) => {
                for target in targets {
                    self.delete(target, frame)?;
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_try(
        &mut self,
        body: &[Stmt],
        handlers: &[Handler],
        orelse: &[Stmt],
        finalbody: &[Stmt],
        frame: &mut Frame,
    ) -> Result<Flow, Exception> {
        let outcome = match self.exec_block(body, frame) {
            Ok(Flow::Normal) => self.exec_block(orelse, frame),
            Ok(flow) => Ok(flow),
            Err(exc) => self.handle(exc, handlers, frame),
        };
        if !finalbody.is_empty() {
            match self.exec_block(finalbody, frame)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        outcome
    }

    fn handle(
        &mut self,
        exc: Exception,
        handlers: &[Handler],
        frame: &mut Frame,
    ) -> Result<Flow, Exception> {
        for handler in handlers {
            let caught = match &handler.class {
                None => true,
                Some(class) => {
                    let class = self.eval(class, frame)?;
                    exception_matches(&exc, &class)?
                }
            };
            if !caught {
                continue;
            }
            trace!("🛟 [Interpreter] caught {}", exc);
            if let Some(name) = &handler.name {
                self.store(name, Value::Exception(Arc::new(exc.clone())), frame)?;
            }
            self.handling.push(exc);
            let result = self.exec_block(&handler.body, frame);
            self.handling.pop();
            if let Some(name) = &handler.name {
                let _ = self.delete_name(name, frame);
            }
            return result;
        }
        Err(exc)
    }

    fn raise(&mut self, exc: Option<&Expr>, frame: &mut Frame) -> Result<Exception, Exception> {
        let Some(expr) = exc else {
            return Ok(self
                .handling
                .last()
                .cloned()
                .unwrap_or_else(|| Exception::runtime_error("No active exception to reraise")));
        };
        match self.eval(expr, frame)? {
            Value::Exception(exc) => Ok(exc.as_ref().clone()),
            Value::Builtin(name) => match exception_type(name) {
                Some(kind) => Ok(Exception::new(kind, "")),
                None => Err(Exception::type_error(
                    "exceptions must derive from BaseException",
                )),
            },
            _ => Err(Exception::type_error(
                "exceptions must derive from BaseException",
            )),
        }
    }

    fn assign(&mut self, target: &Expr, value: Value, frame: &mut Frame) -> Result<(), Exception> {
        match target {
            Expr::Name(name) => self.store(name, value, frame),
            Expr::Tuple(targets) | Expr::List(targets) => self.unpack(targets, value, frame),
            Expr::Subscript(container, index) => {
                let container = self.eval(container, frame)?;
                let index = self.index(index, frame)?;
                ops::set_item(&container, &index, value)
            }
            Expr::Attribute(obj, attr) => {
                let obj = self.eval(obj, frame)?;
                Err(Exception::attribute_error(format!(
                    "'{}' object attribute '{}' is read-only",
                    obj.type_name(),
                    attr
                )))
            }
            _ => Err(Exception::new("SyntaxError", "cannot assign to expression")),
        }
    }

    fn unpack(&mut self, targets: &[Expr], value: Value, frame: &mut Frame) -> Result<(), Exception> {
        let values: Vec<Value> = value.iter_values().map_err(|_| {
            Exception::type_error(format!(
                "cannot unpack non-iterable {} object",
                value.type_name()
            ))
        })?
        .collect();
        let star = targets.iter().position(|t| matches!(t, Expr::Starred(_)));
        match star {
            None => {
                if values.len() != targets.len() {
                    return Err(Exception::value_error(if values.len() > targets.len() {
                        format!("too many values to unpack (expected {})", targets.len())
                    } else {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            values.len()
                        )
                    }));
                }
                for (target, value) in targets.iter().zip(values) {
                    self.assign(target, value, frame)?;
                }
            }
            Some(star) => {
                let fixed = targets.len() - 1;
                if values.len() < fixed {
                    return Err(Exception::value_error(format!(
                        "not enough values to unpack (expected at least {}, got {})",
                        fixed,
                        values.len()
                    )));
                }
                let after = fixed - star;
                let mut values = values;
                let tail = values.split_off(values.len() - after);
                let middle = values.split_off(star);
                for (target, value) in targets[..star].iter().zip(values) {
                    self.assign(target, value, frame)?;
                }
                if let Expr::Starred(inner) = &targets[star] {
                    self.assign(inner, Value::list(middle), frame)?;
                }
                for (target, value) in targets[star + 1..].iter().zip(tail) {
                    self.assign(target, value, frame)?;
                }
            }
        }
        Ok(())
    }

    fn aug_assign(
        &mut self,
        target: &Expr,
        op: BinOp,
        value: &Expr,
        frame: &mut Frame,
    ) -> Result<(), Exception> {
        match target {
            Expr::Name(name) => {
                let current = self.load(name, frame)?;
                let rhs = self.eval(value, frame)?;
                let updated = self.in_place(op, current, &rhs)?;
                self.store(name, updated, frame)
            }
            Expr::Subscript(container, index) => {
                let container = self.eval(container, frame)?;
                let index = self.index(index, frame)?;
                let current = ops::get_item(&container, &index)?;
                let rhs = self.eval(value, frame)?;
                let updated = self.in_place(op, current, &rhs)?;
                ops::set_item(&container, &index, updated)
            }
            Expr::Attribute(obj, attr) => {
                let obj = self.eval(obj, frame)?;
                Err(Exception::attribute_error(format!(
                    "'{}' object attribute '{}' is read-only",
                    obj.type_name(),
                    attr
                )))
            }
            _ => Err(Exception::new(
                "SyntaxError",
                "illegal expression for augmented assignment",
            )),
        }
    }

    /// `+=` on a list extends it in place, so aliases see the change.
    fn in_place(&mut self, op: BinOp, current: Value, rhs: &Value) -> Result<Value, Exception> {
        if let (BinOp::Add, Value::List(items)) = (op, &current) {
            let extra: Vec<Value> = rhs.iter_values()?.collect();
            items.write().extend(extra);
            return Ok(current);
        }
        ops::binary(op, &current, rhs)
    }

    fn delete(&mut self, target: &Expr, frame: &mut Frame) -> Result<(), Exception> {
        match target {
            Expr::Name(name) => self.delete_name(name, frame),
            Expr::Subscript(container, index) => {
                let container = self.eval(container, frame)?;
                let index = self.index(index, frame)?;
                ops::del_item(&container, &index)
            }
            Expr::Tuple(items) | Expr::List(items) => {
                for item in items {
                    self.delete(item, frame)?;
                }
                Ok(())
            }
            _ => Err(Exception::new("SyntaxError", "cannot delete expression")),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn eval(&mut self, expr: &Expr, frame: &mut Frame) -> Result<Value, Exception> {
        ensure_sufficient_stack(|| self.eval_inner(expr, frame))
    }

    fn eval_inner(&mut self, expr: &Expr, frame: &mut Frame) -> Result<Value, Exception> {
        match expr {
            Expr::Constant(value) => Ok(value.clone()),
            Expr::Name(name) => self.load(name, frame),
            Expr::List(items) => Ok(Value::list(self.eval_items(items, frame)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_items(items, frame)?)),
            Expr::Set(items) => make_set(self.eval_items(items, frame)?),
            Expr::Dict(items) => {
                let mut dict = Dict::new();
                for item in items {
                    match item {
                        DictItem::Pair(k, v) => {
                            let k = self.eval(k, frame)?;
                            let v = self.eval(v, frame)?;
                            dict.insert(k, v)?;
                        }
                        DictItem::Unpack(source) => match self.eval(source, frame)? {
                            Value::Dict(other) => {
                                for (k, v) in other.read().items() {
                                    dict.insert(k, v)?;
                                }
                            }
                            other => {
                                return Err(Exception::type_error(format!(
                                    "'{}' object is not a mapping",
                                    other.type_name()
                                )))
                            }
                        },
                    }
                }
                Ok(Value::from_dict(dict))
            }
            Expr::Starred(_) => Err(Exception::new(
                "SyntaxError",
                "can't use starred expression here",
            )),
            Expr::BinOp(left, op, right) => {
                let left = self.eval(left, frame)?;
                let right = self.eval(right, frame)?;
                ops::binary(*op, &left, &right)
            }
            Expr::UnaryOp(op, operand) => {
                let operand = self.eval(operand, frame)?;
                ops::unary(*op, &operand)
            }
            Expr::BoolOp(op, values) => {
                let mut last = Value::None;
                for value in values {
                    last = self.eval(value, frame)?;
                    let decided = match op {
                        BoolOp::And => !last.truthy(),
                        BoolOp::Or => last.truthy(),
                    };
                    if decided {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Compare(left, comparisons) => {
                let mut left = self.eval(left, frame)?;
                for (op, right) in comparisons {
                    let right = self.eval(right, frame)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::IfExp { test, body, orelse } => {
                if self.eval(test, frame)?.truthy() {
                    self.eval(body, frame)
                } else {
                    self.eval(orelse, frame)
                }
            }
            Expr::Lambda(def) => self.make_function(def, frame),
            Expr::Call { func, args } => {
                let func = self.eval(func, frame)?;
                let (args, kwargs) = self.eval_args(args, frame)?;
                self.call(&func, args, kwargs)
            }
            Expr::Attribute(obj, attr) => {
                let obj = self.eval(obj, frame)?;
                get_attr(&obj, attr)
            }
            Expr::Subscript(container, index) => {
                let container = self.eval(container, frame)?;
                let index = self.index(index, frame)?;
                ops::get_item(&container, &index)
            }
            Expr::Slice(..) => Err(Exception::type_error("slice outside of a subscript")),
            Expr::ListComp { elt, generators } => {
                let mut out = Vec::new();
                let mut inner = frame.child();
                self.comprehend(generators, &mut inner, &mut |interp, f| {
                    out.push(interp.eval(elt, f)?);
                    Ok(())
                })?;
                Ok(Value::list(out))
            }
            Expr::SetComp { elt, generators } => {
                let mut out = Vec::new();
                let mut inner = frame.child();
                self.comprehend(generators, &mut inner, &mut |interp, f| {
                    out.push(interp.eval(elt, f)?);
                    Ok(())
                })?;
                make_set(out)
            }
            Expr::DictComp {
                key,
                value,
                generators,
            } => {
                let mut out = Dict::new();
                let mut inner = frame.child();
                self.comprehend(generators, &mut inner, &mut |interp, f| {
                    let k = interp.eval(key, f)?;
                    let v = interp.eval(value, f)?;
                    out.insert(k, v)
                })?;
                Ok(Value::from_dict(out))
            }
            Expr::FString(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        FPart::Lit(text) => out.push_str(text),
                        FPart::Expr {
                            expr,
                            conversion,
                            spec,
                        } => {
                            let value = self.eval(expr, frame)?;
                            let value = match conversion {
                                Some('r') | Some('a') => Value::Str(value.repr()),
                                Some('s') => Value::Str(value.to_str()),
                                _ => value,
                            };
                            let spec = match spec {
                                Some(spec) if spec.contains('{') => {
                                    self.expand_nested_spec(spec, frame)?
                                }
                                Some(spec) => spec.clone(),
                                None => String::new(),
                            };
                            out.push_str(&format_value(&value, &spec)?);
                        }
                    }
                }
                Ok(Value::Str(out))
            }
        }
    }

    /// `f"{x:{width}}"`: substitute the inner fields of a format spec.
    fn expand_nested_spec(&mut self, spec: &str, frame: &mut Frame) -> Result<String, Exception> {
        let mut out = String::new();
        let mut rest = spec;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let close = rest[open..]
                .find('}')
                .map(|c| open + c)
                .ok_or_else(|| Exception::value_error("unmatched '{' in format spec"))?;
            let expr = parse_expression(&rest[open + 1..close], 1)
                .map_err(|e| Exception::new("SyntaxError", e.message))?;
            out.push_str(&self.eval(&expr, frame)?.to_str());
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn comprehend(
        &mut self,
        generators: &[Comprehension],
        frame: &mut Frame,
        emit: &mut dyn FnMut(&mut Self, &mut Frame) -> Result<(), Exception>,
    ) -> Result<(), Exception> {
        let Some((first, rest)) = generators.split_first() else {
            return emit(self, frame);
        };
        let iterable = self.eval(&first.iter, frame)?;
        'items: for item in iterable.iter_values()? {
            self.tick()?;
            self.assign(&first.target, item, frame)?;
            for condition in &first.ifs {
                if !self.eval(condition, frame)?.truthy() {
                    continue 'items;
                }
            }
            self.comprehend(rest, frame, emit)?;
        }
        Ok(())
    }

    fn eval_items(&mut self, items: &[Expr], frame: &mut Frame) -> Result<Vec<Value>, Exception> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expr::Starred(inner) => {
                    let value = self.eval(inner, frame)?;
                    out.extend(value.iter_values()?);
                }
                other => out.push(self.eval(other, frame)?),
            }
        }
        Ok(out)
    }

    #[allow(clippy::type_complexity)]
    fn eval_args(
        &mut self,
        args: &[Arg],
        frame: &mut Frame,
    ) -> Result<(Vec<Value>, Vec<(String, Value)>), Exception> {
        let mut positional = Vec::with_capacity(args.len());
        let mut keywords: Vec<(String, Value)> = Vec::new();
        for arg in args {
            match arg {
                Arg::Pos(expr) => positional.push(self.eval(expr, frame)?),
                Arg::Star(expr) => {
                    let value = self.eval(expr, frame)?;
                    positional.extend(value.iter_values()?);
                }
                Arg::Kw(name, expr) => {
                    let value = self.eval(expr, frame)?;
                    push_keyword(&mut keywords, name.clone(), value)?;
                }
                Arg::StarStar(expr) => match self.eval(expr, frame)? {
                    Value::Dict(d) => {
                        for (k, v) in d.read().items() {
                            let Value::Str(k) = k else {
                                return Err(Exception::type_error("keywords must be strings"));
                            };
                            push_keyword(&mut keywords, k, v)?;
                        }
                    }
                    other => {
                        return Err(Exception::type_error(format!(
                            "argument after ** must be a mapping, not {}",
                            other.type_name()
                        )))
                    }
                },
            }
        }
        Ok((positional, keywords))
    }

    fn index(&mut self, index: &Expr, frame: &mut Frame) -> Result<Index, Exception> {
        let Expr::Slice(lower, upper, step) = index else {
            return Ok(Index::Item(self.eval(index, frame)?));
        };
        let mut bound = |interp: &mut Self, e: &Option<Box<Expr>>| -> Result<Option<i64>, Exception> {
            match e {
                None => Ok(None),
                Some(e) => match interp.eval(e, frame)? {
                    Value::None => Ok(None),
                    v => v.as_int().map(Some).ok_or_else(|| {
                        Exception::type_error(
                            "slice indices must be integers or None or have an __index__ method",
                        )
                    }),
                },
            }
        };
        let lower = bound(self, lower)?;
        let upper = bound(self, upper)?;
        let step = bound(self, step)?;
        Ok(Index::Slice(lower, upper, step))
    }
}

fn push_keyword(
    keywords: &mut Vec<(String, Value)>,
    name: String,
    value: Value,
) -> Result<(), Exception> {
    if keywords.iter().any(|(k, _)| *k == name) {
        return Err(Exception::type_error(format!(
            "got multiple values for keyword argument '{}'",
            name
        )));
    }
    keywords.push((name, value));
    Ok(())
}

/// `value.attr` for everything that is not a user object.
pub fn get_attr(value: &Value, attr: &str) -> Result<Value, Exception> {
    match (value, attr) {
        (Value::Module(module), _) => builtins::module_attr(module, attr),
        (Value::Exception(exc), "args") => Ok(Value::tuple(if exc.message.is_empty() {
            Vec::new()
        } else {
            vec![Value::str(exc.message.clone())]
        })),
        (Value::Function(f), "__name__") => Ok(Value::str(f.def.name.clone())),
        (Value::Builtin(name), "__name__") => {
            Ok(Value::str(name.rsplit('.').next().unwrap_or(*name)))
        }
        (Value::Host(h), "__name__") => Ok(Value::str(h.name.clone())),
        (Value::Pattern(p), _) => re::pattern_attr(p, attr)
            .or_else(|| methods::bind(value, attr))
            .ok_or_else(|| no_attribute(value, attr)),
        (Value::Match(m), _) => m
            .attr(attr)
            .or_else(|| methods::bind(value, attr))
            .ok_or_else(|| no_attribute(value, attr)),
        (Value::Function(_), "__doc__") => Ok(Value::None),
        (Value::Builtin(owner), _) => methods::unbound(*owner, attr).ok_or_else(|| {
            Exception::attribute_error(format!(
                "type object '{}' has no attribute '{}'",
                owner, attr
            ))
        }),
        (Value::Int(i), "real" | "numerator") => Ok(Value::Int(*i)),
        (Value::Int(_), "imag") => Ok(Value::Int(0)),
        (Value::Int(_), "denominator") => Ok(Value::Int(1)),
        (Value::Float(f), "real") => Ok(Value::Float(*f)),
        (Value::Float(_), "imag") => Ok(Value::Float(0.0)),
        _ => methods::bind(value, attr).ok_or_else(|| no_attribute(value, attr)),
    }
}

fn no_attribute(value: &Value, attr: &str) -> Exception {
    Exception::attribute_error(format!(
        "'{}' object has no attribute '{}'",
        value.type_name(),
        attr
    ))
}

/// Match call arguments to parameters, producing the callee's locals.
fn bind_arguments(
    f: &Function,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<HashMap<String, Value>, Exception> {
    let def = &f.def;
    let name = &def.name;
    let positional_count = def.params.iter().filter(|p| !p.kw_only).count();
    let mut slots: Vec<Option<Value>> = vec![None; def.params.len()];
    let mut extra_positional = Vec::new();

    let given = args.len();
    for (i, arg) in args.into_iter().enumerate() {
        if i < positional_count {
            slots[i] = Some(arg);
        } else if def.vararg.is_some() {
            extra_positional.push(arg);
        } else {
            let required = def.params[..positional_count]
                .iter()
                .filter(|p| p.default.is_none())
                .count();
            let takes = if required == positional_count {
                format!(
                    "{} positional argument{}",
                    positional_count,
                    if positional_count == 1 { "" } else { "s" }
                )
            } else {
                format!("from {} to {} positional arguments", required, positional_count)
            };
            return Err(Exception::type_error(format!(
                "{}() takes {} but {} {} given",
                name,
                takes,
                given,
                if given == 1 { "was" } else { "were" }
            )));
        }
    }

    let mut extra_keywords = Dict::new();
    for (key, value) in kwargs {
        match def.params.iter().position(|p| p.name == key) {
            Some(idx) => {
                if slots[idx].is_some() {
                    return Err(Exception::type_error(format!(
                        "{}() got multiple values for argument '{}'",
                        name, key
                    )));
                }
                slots[idx] = Some(value);
            }
            None if def.kwarg.is_some() => {
                extra_keywords.insert(Value::Str(key), value)?;
            }
            None => {
                return Err(Exception::type_error(format!(
                    "{}() got an unexpected keyword argument '{}'",
                    name, key
                )))
            }
        }
    }

    let mut missing_positional = Vec::new();
    let mut missing_keyword = Vec::new();
    let mut locals = HashMap::with_capacity(def.params.len() + 2);
    for ((param, slot), default) in def.params.iter().zip(slots).zip(&f.defaults) {
        match slot.or_else(|| default.clone()) {
            Some(value) => {
                locals.insert(param.name.clone(), value);
            }
            None if param.kw_only => missing_keyword.push(param.name.as_str()),
            None => missing_positional.push(param.name.as_str()),
        }
    }
    for (missing, kind) in [
        (missing_positional, "positional"),
        (missing_keyword, "keyword-only"),
    ] {
        if !missing.is_empty() {
            return Err(Exception::type_error(format!(
                "{}() missing {} required {} argument{}: {}",
                name,
                missing.len(),
                kind,
                if missing.len() == 1 { "" } else { "s" },
                quote_names(&missing)
            )));
        }
    }

    if let Some(vararg) = &def.vararg {
        locals.insert(vararg.clone(), Value::tuple(extra_positional));
    }
    if let Some(kwarg) = &def.kwarg {
        locals.insert(kwarg.clone(), Value::from_dict(extra_keywords));
    }
    Ok(locals)
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`.
fn quote_names(names: &[&str]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{}'", n)).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{} and {}", a, b),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::parser::parse_module;

    fn run(source: &str, func: &str, args: Vec<Value>) -> Result<Value, Exception> {
        let module = parse_module(source).expect("source parses");
        let mut interp = Interpreter::new();
        interp.run_module(&module)?;
        let f = interp.global(func).expect("function defined");
        interp.call(&f, args, Vec::new())
    }

    #[test]
    fn test_add_and_recursion() {
        let src = "def add(a, b):\n    return a + b\n";
        assert_eq!(run(src, "add", vec![Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));

        let fib = "\
def fib(n):
    if n < 2:
        return n
    return fib(n - 1) + fib(n - 2)
";
        assert_eq!(run(fib, "fib", vec![Value::Int(15)]).unwrap(), Value::Int(610));
    }

    #[test]
    fn test_recursion_limit() {
        let src = "def forever(n):\n    return forever(n + 1)\n";
        let err = run(src, "forever", vec![Value::Int(0)]).unwrap_err();
        assert_eq!(err.kind, "RecursionError");
    }

    #[test]
    fn test_step_budget() {
        let src = "def spin():\n    while True:\n        try:\n            pass\n        except Exception:\n            pass\n";
        let module = parse_module(src).unwrap();
        let mut interp = Interpreter::with_limits(Limits {
            max_depth: 100,
            max_steps: 10_000,
        });
        interp.run_module(&module).unwrap();
        let f = interp.global("spin").unwrap();
        let err = interp.call(&f, vec![], vec![]).unwrap_err();
        assert_eq!(err.kind, "TimeoutError");
    }

    #[test]
    fn test_strings_and_slices() {
        let src = "def reverse_string(s):\n    return s[::-1]\n";
        assert_eq!(
            run(src, "reverse_string", vec![Value::str("hello")]).unwrap(),
            Value::str("olleh")
        );
        let src = "def shout(name, times=2):\n    return f'{name.upper()}!' * times\n";
        assert_eq!(
            run(src, "shout", vec![Value::str("hi")]).unwrap(),
            Value::str("HI!HI!")
        );
    }

    #[test]
    fn test_comprehensions_do_not_leak() {
        let src = "\
def evens(n):
    x = 'outer'
    squares = [x * x for x in range(n) if x % 2 == 0]
    lookup = {k: v for k, v in zip('ab', [1, 2])}
    return squares, lookup, x
";
        let out = run(src, "evens", vec![Value::Int(6)]).unwrap();
        assert_eq!(out.repr(), "([0, 4, 16], {'a': 1, 'b': 2}, 'outer')");
    }

    #[test]
    fn test_exceptions() {
        let src = "\
def safe_div(a, b):
    try:
        return a / b
    except ZeroDivisionError as e:
        return str(e)
    finally:
        pass
";
        assert_eq!(
            run(src, "safe_div", vec![Value::Int(1), Value::Int(0)]).unwrap(),
            Value::str("division by zero")
        );

        let src = "def check(x):\n    if x < 0:\n        raise ValueError('negative input')\n    return x\n";
        let err = run(src, "check", vec![Value::Int(-1)]).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: negative input");

        let src = "def reraise():\n    try:\n        {}['k']\n    except KeyError:\n        raise\n";
        let err = run(src, "reraise", vec![]).unwrap_err();
        assert_eq!(err.kind, "KeyError");
    }

    #[test]
    fn test_closures_and_nonlocal() {
        let src = "\
def counter():
    count = 0
    def bump():
        nonlocal count
        count += 1
        return count
    bump()
    bump()
    return bump()
";
        assert_eq!(run(src, "counter", vec![]).unwrap(), Value::Int(3));

        let src = "\
def outer():
    def is_even(n):
        return True if n == 0 else is_odd(n - 1)
    def is_odd(n):
        return False if n == 0 else is_even(n - 1)
    return is_even(10)
";
        assert_eq!(run(src, "outer", vec![]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_argument_binding_errors() {
        let src = "def f(a, b=1, *, c):\n    return a\n";
        let err = run(src, "f", vec![]).unwrap_err();
        assert_eq!(err.message, "f() missing 1 required positional argument: 'a'");
        let err = run(src, "f", vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err.message, "f() missing 1 required keyword-only argument: 'c'");
        let err = run(src, "f", vec![Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap_err();
        assert_eq!(
            err.message,
            "f() takes from 1 to 2 positional arguments but 3 were given"
        );
    }

    #[test]
    fn test_shared_list_mutation_and_unpacking() {
        let src = "\
def fill(items):
    items.append(1)
    items += [2]
    first, *rest = items
    return first, rest
";
        let list = Value::list(vec![Value::Int(0)]);
        let out = run(src, "fill", vec![list.clone()]).unwrap();
        assert_eq!(out.repr(), "(0, [1, 2])");
        assert_eq!(list.repr(), "[0, 1, 2]");
    }

    #[test]
    fn test_imports_and_host_functions() {
        let src = "\
import math
from typing import List
def hyp(a: float, b: float) -> float:
    return round(math.sqrt(a ** 2 + b ** 2), 2)
def ask(q):
    return chat(q)
";
        let module = parse_module(src).unwrap();
        let mut interp = Interpreter::new();
        interp.define_host("chat", |args, _| Ok(Value::str(format!("echo: {}", args[0]))));
        interp.run_module(&module).unwrap();
        let hyp = interp.global("hyp").unwrap();
        assert_eq!(
            interp.call(&hyp, vec![Value::Int(3), Value::Int(4)], vec![]).unwrap(),
            Value::Float(5.0)
        );
        let ask = interp.global("ask").unwrap();
        assert_eq!(
            interp.call(&ask, vec![Value::str("hi")], vec![]).unwrap(),
            Value::str("echo: hi")
        );

        let err = Interpreter::new()
            .run_module(&parse_module("import numpy\n").unwrap())
            .unwrap_err();
        assert_eq!(err.kind, "ModuleNotFoundError");
    }

    #[test]
    fn test_self_referencing_lists() {
        let src = "\
def show():
    l = []
    l.append(l)
    return repr(l), str(l), '{}'.format(l)

def same():
    a = [1]
    a.append(a)
    b = [1]
    b.append(b)
    return a == b

def member():
    a = []
    a.append(a)
    b = []
    b.append(b)
    return a in [b]
";
        assert_eq!(
            run(src, "show", vec![]).unwrap().repr(),
            "('[[...]]', '[[...]]', '[[...]]')"
        );
        assert_eq!(run(src, "same", vec![]).unwrap_err().kind, "RecursionError");
        assert_eq!(run(src, "member", vec![]).unwrap_err().kind, "RecursionError");
    }

    #[test]
    fn test_oversized_padding_is_refused() {
        let src = "\
def pad():
    return '{:>99999999999}'.format(1)

def precise():
    return f'{1:.99999999999f}'

def centered():
    return 'a'.center(10 ** 11)
";
        assert_eq!(run(src, "pad", vec![]).unwrap_err().kind, "MemoryError");
        assert_eq!(run(src, "precise", vec![]).unwrap_err().kind, "ValueError");
        assert_eq!(run(src, "centered", vec![]).unwrap_err().kind, "MemoryError");
    }

    #[test]
    fn test_regex_module() {
        let src = r#"
import re

def parse(s):
    m = re.match(r'(\w+)=(\d+)', s)
    if not m:
        return None
    return m.group(1), int(m.group(2)), m[0], m.span()

def checked(p):
    try:
        return re.compile(p).pattern
    except re.error:
        return 'bad'

def shout(s):
    return re.sub(r'[aeiou]', lambda m: m.group().upper(), s)
"#;
        assert_eq!(
            run(src, "parse", vec![Value::str("x=42;")]).unwrap().repr(),
            "('x', 42, 'x=42', (0, 4))"
        );
        assert!(run(src, "parse", vec![Value::str("=1")]).unwrap().is_none());
        assert_eq!(
            run(src, "checked", vec![Value::str("(?<=a)b")]).unwrap(),
            Value::str("bad")
        );
        assert_eq!(run(src, "checked", vec![Value::str("a+")]).unwrap(), Value::str("a+"));
        assert_eq!(
            run(src, "shout", vec![Value::str("hello")]).unwrap(),
            Value::str("hEllO")
        );
    }

    #[test]
    fn test_print_is_captured() {
        let module = parse_module("print('a', 1, sep='-')\n").unwrap();
        let mut interp = Interpreter::new();
        interp.run_module(&module).unwrap();
        assert_eq!(interp.output(), "a-1\n");
    }
}
