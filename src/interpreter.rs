use crate::ast::{
    BinaryOp, Block, CastType, Expr, FuncDef, LogicalOp, Program, RelationalOp, Stmt, UnaryOp,
    VarDecl,
};
use crate::context::{Context, ContextKind, ContextManager, SymbolTable};
use crate::error::{Diagnostic, Diagnostics, ErrorKind, Location};
use crate::value::{Instance, Value, ValueProxy};
use std::cmp::Ordering;
use std::io::Write;

/// Deepest chain of nested calls before evaluation gives up.
pub const MAX_CALL_DEPTH: usize = 100;

/// What executing a statement asks of the enclosing body.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Option<Value>),
}

#[derive(Debug, Clone, Copy)]
enum Arity {
    Exact(usize),
    Variadic,
}

#[derive(Debug, Clone, Copy)]
enum Builtin {
    Print,
    Len,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "print" => Some(Builtin::Print),
            "len" => Some(Builtin::Len),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
        }
    }

    fn arity(self) -> Arity {
        match self {
            Builtin::Print => Arity::Variadic,
            Builtin::Len => Arity::Exact(1),
        }
    }
}

/// Tree-walking evaluator. Problems are recorded in the diagnostics sink and
/// the offending expression yields no value; evaluation then carries on.
pub struct Interpreter<W: Write> {
    contexts: ContextManager,
    diagnostics: Diagnostics,
    out: W,
    call_depth: usize,
}

impl<W: Write> Interpreter<W> {
    pub fn new(program: Program, diagnostics: Diagnostics, out: W) -> Self {
        Self {
            contexts: ContextManager::new(SymbolTable::new(program)),
            diagnostics,
            out,
            call_depth: 0,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs `main()` and returns what it returned.
    pub fn run(&mut self) -> Option<Value> {
        let Some(main) = self.contexts.symbols().lookup_function("main") else {
            return self.fail(
                ErrorKind::UndefinedSymbol,
                &Location::default(),
                "there is no 'main' function to run",
            );
        };
        let location = main.location.clone();
        self.invoke(&main, Vec::new(), &location, None)
    }

    /// Current value of a variable visible from the innermost scope.
    pub fn lookup_value(&self, name: &str) -> Option<Value> {
        self.contexts.lookup(name).and_then(|proxy| proxy.get())
    }

    pub fn execute_statement(&mut self, statement: &Stmt) -> Flow {
        match statement {
            Stmt::Var(decl) => {
                self.declare_variable(decl);
                Flow::Normal
            }
            Stmt::Expression { expr, .. } => {
                self.evaluate_expression(expr);
                Flow::Normal
            }
            Stmt::Assign { target, value, .. } => {
                self.assign(target, value);
                Flow::Normal
            }
            Stmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => match self.condition(condition) {
                Some(true) => self.execute_block(then_block),
                Some(false) => else_block
                    .as_ref()
                    .map_or(Flow::Normal, |block| self.execute_block(block)),
                None => Flow::Normal,
            },
            Stmt::While {
                condition, body, ..
            } => {
                while let Some(true) = self.condition(condition) {
                    if let Flow::Return(value) = self.execute_block(body) {
                        return Flow::Return(value);
                    }
                }
                Flow::Normal
            }
            Stmt::For {
                iterator,
                iterable,
                body,
                location,
            } => self.execute_for(iterator, iterable, body, location),
            Stmt::Switch {
                scrutinee, cases, ..
            } => self.execute_switch(scrutinee, cases),
            Stmt::Return { value, .. } => {
                Flow::Return(value.as_ref().and_then(|expr| self.evaluate_expression(expr)))
            }
        }
    }

    pub fn execute_block(&mut self, block: &Block) -> Flow {
        self.scoped(Context::new(ContextKind::Block), |this| {
            this.execute_statements(&block.statements)
        })
    }

    fn execute_statements(&mut self, statements: &[Stmt]) -> Flow {
        for statement in statements {
            if let Flow::Return(value) = self.execute_statement(statement) {
                return Flow::Return(value);
            }
        }
        Flow::Normal
    }

    /// Runs `body` with `context` pushed and pops it afterwards.
    fn scoped<T>(&mut self, context: Context, body: impl FnOnce(&mut Self) -> T) -> T {
        self.contexts.push(context);
        let result = body(self);
        self.contexts.pop();
        result
    }

    fn declare_variable(&mut self, decl: &VarDecl) {
        let value = decl
            .initializer
            .as_ref()
            .and_then(|expr| self.evaluate_expression(expr));
        if !self.contexts.declare(&decl.name, ValueProxy::from_option(value)) {
            self.fail_on::<()>(
                ErrorKind::AlreadyDeclared,
                &decl.location,
                &decl.name,
                format!("variable '{}' is already declared in this scope", decl.name),
            );
        }
    }

    fn execute_for(
        &mut self,
        iterator: &str,
        iterable: &Expr,
        body: &Block,
        location: &Location,
    ) -> Flow {
        let items = match self.evaluate_expression(iterable) {
            Some(Value::List(items)) => items,
            Some(Value::String(text)) => text.chars().map(|c| Value::String(c.to_string())).collect(),
            Some(other) => {
                self.fail::<()>(
                    ErrorKind::UnsupportedOperation,
                    location,
                    format!("cannot iterate over {}", other.type_name()),
                );
                return Flow::Normal;
            }
            None => return Flow::Normal,
        };

        for item in items {
            let mut scope = Context::new(ContextKind::Block);
            scope.declare(iterator, ValueProxy::new(item));
            let flow = self.scoped(scope, |this| this.execute_statements(&body.statements));
            if let Flow::Return(value) = flow {
                return Flow::Return(value);
            }
        }
        Flow::Normal
    }

    fn execute_switch(&mut self, scrutinee: &Expr, cases: &[(Expr, Block)]) -> Flow {
        let Some(value) = self.evaluate_expression(scrutinee) else {
            return Flow::Normal;
        };

        let mut labels: Vec<Value> = Vec::new();
        let mut selected = None;
        for (label, block) in cases {
            let Some(label_value) = self.evaluate_expression(label) else {
                continue;
            };
            if labels.contains(&label_value) {
                self.fail::<()>(
                    ErrorKind::DuplicateLabel,
                    label.location(),
                    format!("label {} appears more than once", label_value),
                );
                continue;
            }
            if selected.is_none() && label_value == value {
                selected = Some(block);
            }
            labels.push(label_value);
        }

        selected.map_or(Flow::Normal, |block| self.execute_block(block))
    }

    fn condition(&mut self, condition: &Expr) -> Option<bool> {
        match self.evaluate_expression(condition)? {
            Value::Bool(b) => Some(b),
            other => self.fail(
                ErrorKind::UnsupportedOperation,
                condition.location(),
                format!("condition must be bool, found {}", other.type_name()),
            ),
        }
    }

    pub fn evaluate_expression(&mut self, expr: &Expr) -> Option<Value> {
        match expr {
            Expr::Integer { value, .. } => Some(Value::Int(*value)),
            Expr::Float { value, .. } => Some(Value::Float(*value)),
            Expr::String { value, .. } => Some(Value::String(value.clone())),
            Expr::Identifier { name, location } => self.read_variable(name, location),
            Expr::Unary {
                operator,
                operand,
                location,
            } => {
                let operand = self.evaluate_expression(operand)?;
                self.evaluate_unary(*operator, operand, location)
            }
            Expr::Binary {
                left,
                operator,
                right,
                location,
            } => {
                let left = self.evaluate_expression(left)?;
                let right = self.evaluate_expression(right)?;
                self.evaluate_binary(*operator, left, right, location)
            }
            Expr::Relational {
                left,
                operator,
                right,
                location,
            } => {
                let left = self.evaluate_expression(left)?;
                let right = self.evaluate_expression(right)?;
                self.evaluate_relational(*operator, left, right, location)
            }
            Expr::Logical {
                left,
                operator,
                right,
                location,
            } => self.evaluate_logical(*operator, left, right, location),
            Expr::Assign { target, value, .. } => self.assign(target, value),
            Expr::Call {
                callee,
                args,
                location,
            } => self.call(callee, args, location),
            Expr::New {
                class,
                args,
                location,
            } => self.construct(class, args, location),
            Expr::Member { name, location, .. } => {
                let proxy = self.resolve_target(expr)?;
                match proxy.get() {
                    Some(value) => Some(value),
                    None => self.fail_on(
                        ErrorKind::UninitializedVariable,
                        location,
                        name,
                        format!("attribute '{}' has no value", name),
                    ),
                }
            }
            Expr::Cast {
                target,
                operand,
                location,
            } => {
                let operand = self.evaluate_expression(operand)?;
                self.evaluate_cast(*target, operand, location)
            }
            Expr::List { elements, .. } => elements
                .iter()
                .map(|element| self.evaluate_expression(element))
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
        }
    }

    fn evaluate_unary(
        &mut self,
        operator: UnaryOp,
        operand: Value,
        location: &Location,
    ) -> Option<Value> {
        match (operator, operand) {
            (UnaryOp::Minus, Value::Int(n)) => Some(Value::Int(n.wrapping_neg())),
            (UnaryOp::Minus, Value::Float(n)) => Some(Value::Float(-n)),
            (_, Value::Bool(b)) => Some(Value::Bool(!b)),
            (UnaryOp::Minus, other) => self.fail_on(
                ErrorKind::UnsupportedOperation,
                location,
                "-",
                format!("cannot negate {}", other.type_name()),
            ),
            (UnaryOp::Not, other) => self.fail_on(
                ErrorKind::UnsupportedOperation,
                location,
                "not",
                format!("cannot invert {}", other.type_name()),
            ),
        }
    }

    fn evaluate_binary(
        &mut self,
        operator: BinaryOp,
        left: Value,
        right: Value,
        location: &Location,
    ) -> Option<Value> {
        match (left, right) {
            (Value::Int(l), Value::Int(r)) => match operator {
                BinaryOp::Add => Some(Value::Int(l.wrapping_add(r))),
                BinaryOp::Subtract => Some(Value::Int(l.wrapping_sub(r))),
                BinaryOp::Multiply => Some(Value::Int(l.wrapping_mul(r))),
                BinaryOp::Divide if r == 0 => self.division_by_zero(location),
                BinaryOp::Divide => Some(Value::Int(l.wrapping_div(r))),
            },
            (Value::Float(l), Value::Float(r)) => match operator {
                BinaryOp::Add => Some(Value::Float(l + r)),
                BinaryOp::Subtract => Some(Value::Float(l - r)),
                BinaryOp::Multiply => Some(Value::Float(l * r)),
                BinaryOp::Divide if r == 0.0 => self.division_by_zero(location),
                BinaryOp::Divide => Some(Value::Float(l / r)),
            },
            (Value::String(l), Value::String(r)) if operator == BinaryOp::Add => {
                Some(Value::String(l + &r))
            }
            (l, r) => self.fail_on(
                ErrorKind::UnsupportedOperation,
                location,
                operator.symbol(),
                format!(
                    "cannot {} {} and {}",
                    operator.verb(),
                    l.type_name(),
                    r.type_name()
                ),
            ),
        }
    }

    fn division_by_zero(&self, location: &Location) -> Option<Value> {
        self.fail_on(
            ErrorKind::DivisionByZero,
            location,
            BinaryOp::Divide.symbol(),
            "right operand of '/' is zero",
        )
    }

    fn evaluate_relational(
        &mut self,
        operator: RelationalOp,
        left: Value,
        right: Value,
        location: &Location,
    ) -> Option<Value> {
        let equality = matches!(operator, RelationalOp::Equal | RelationalOp::NotEqual);
        let ordering = match (&left, &right) {
            (Value::Int(l), Value::Int(r)) => l.partial_cmp(r),
            (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
            (Value::String(l), Value::String(r)) => l.partial_cmp(r),
            (Value::Bool(l), Value::Bool(r)) if equality => l.partial_cmp(r),
            _ => {
                return self.fail_on(
                    ErrorKind::UnsupportedOperation,
                    location,
                    operator.symbol(),
                    format!("cannot compare {} and {}", left.type_name(), right.type_name()),
                )
            }
        };

        let result = match operator {
            RelationalOp::Equal => ordering == Some(Ordering::Equal),
            RelationalOp::NotEqual => ordering != Some(Ordering::Equal),
            RelationalOp::Less => ordering == Some(Ordering::Less),
            RelationalOp::LessEqual => {
                matches!(ordering, Some(Ordering::Less | Ordering::Equal))
            }
            RelationalOp::Greater => ordering == Some(Ordering::Greater),
            RelationalOp::GreaterEqual => {
                matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
            }
        };
        Some(Value::Bool(result))
    }

    fn evaluate_logical(
        &mut self,
        operator: LogicalOp,
        left: &Expr,
        right: &Expr,
        location: &Location,
    ) -> Option<Value> {
        let keyword = match operator {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        };

        let left = match self.evaluate_expression(left)? {
            Value::Bool(b) => b,
            other => {
                return self.fail_on(
                    ErrorKind::UnsupportedOperation,
                    location,
                    keyword,
                    format!("'{}' needs bool operands, found {}", keyword, other.type_name()),
                )
            }
        };
        match (operator, left) {
            (LogicalOp::And, false) => return Some(Value::Bool(false)),
            (LogicalOp::Or, true) => return Some(Value::Bool(true)),
            _ => {}
        }

        match self.evaluate_expression(right)? {
            Value::Bool(b) => Some(Value::Bool(b)),
            other => self.fail_on(
                ErrorKind::UnsupportedOperation,
                location,
                keyword,
                format!("'{}' needs bool operands, found {}", keyword, other.type_name()),
            ),
        }
    }

    fn evaluate_cast(&mut self, target: CastType, operand: Value, location: &Location) -> Option<Value> {
        match (target, operand) {
            (CastType::Int, Value::Int(n)) => Some(Value::Int(n)),
            (CastType::Int, Value::Float(n)) => Some(Value::Int(n as i32)),
            (CastType::Float, Value::Int(n)) => Some(Value::Float(n as f32)),
            (CastType::Float, Value::Float(n)) => Some(Value::Float(n)),
            (target, other) => self.fail_on(
                ErrorKind::UnsupportedOperation,
                location,
                target.name(),
                format!("cannot cast {} to {}", other.type_name(), target.name()),
            ),
        }
    }

    fn read_variable(&mut self, name: &str, location: &Location) -> Option<Value> {
        let proxy = self.lookup(name, location)?;
        match proxy.get() {
            Some(value) => Some(value),
            None => self.fail_on(
                ErrorKind::UninitializedVariable,
                location,
                name,
                format!("variable '{}' has no value", name),
            ),
        }
    }

    fn lookup(&self, name: &str, location: &Location) -> Option<ValueProxy> {
        match self.contexts.lookup(name) {
            Some(proxy) => Some(proxy),
            None => self.fail_on(
                ErrorKind::UndeclaredVariable,
                location,
                name,
                format!("'{}' is not declared", name),
            ),
        }
    }

    /// Evaluates `value` and stores it in the cell `target` refers to.
    fn assign(&mut self, target: &Expr, value: &Expr) -> Option<Value> {
        let value = self.evaluate_expression(value)?;
        let proxy = self.resolve_target(target)?;
        proxy.set(value.clone());
        Some(value)
    }

    /// The cell behind a variable or `variable.attribute` expression.
    fn resolve_target(&mut self, target: &Expr) -> Option<ValueProxy> {
        match target {
            Expr::Identifier { name, location } => self.lookup(name, location),
            Expr::Member {
                object,
                name,
                location,
            } => {
                let instance = self.member_object(object, location)?;
                match instance.fields.get(name) {
                    Some(proxy) => Some(proxy),
                    None => self.fail_on(
                        ErrorKind::UndefinedSymbol,
                        location,
                        name,
                        format!("'{}' has no attribute '{}'", instance.class, name),
                    ),
                }
            }
            other => self.fail(
                ErrorKind::UnsupportedOperation,
                other.location(),
                "only variables and attributes can be assigned",
            ),
        }
    }

    /// The instance on the left of a `.`, which must be a plain variable.
    fn member_object(&mut self, object: &Expr, location: &Location) -> Option<Instance> {
        let Expr::Identifier {
            name,
            location: object_location,
        } = object
        else {
            return self.fail(
                ErrorKind::UnsupportedChaining,
                location,
                "members can only be accessed on a variable",
            );
        };

        match self.read_variable(name, object_location)? {
            Value::Object(instance) => Some(instance),
            other => self.fail(
                ErrorKind::UnsupportedOperation,
                location,
                format!("{} has no members", other.type_name()),
            ),
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr], location: &Location) -> Option<Value> {
        match callee {
            Expr::Identifier { name, .. } => self.call_function(name, args, location),
            Expr::Member {
                object,
                name,
                location: member_location,
            } => self.call_method(object, name, args, member_location),
            _ => self.fail(
                ErrorKind::UnsupportedChaining,
                location,
                "only functions and methods can be called by name",
            ),
        }
    }

    fn call_function(&mut self, name: &str, args: &[Expr], location: &Location) -> Option<Value> {
        if let Some(function) = self.contexts.symbols().lookup_function(name) {
            let args = self.evaluate_arguments(args)?;
            return self.invoke(&function, args, location, None);
        }
        if let Some(builtin) = Builtin::lookup(name) {
            return self.call_builtin(builtin, args, location);
        }
        self.fail_on(
            ErrorKind::UndefinedSymbol,
            location,
            name,
            format!("there is no function named '{}'", name),
        )
    }

    fn call_method(
        &mut self,
        object: &Expr,
        name: &str,
        args: &[Expr],
        location: &Location,
    ) -> Option<Value> {
        let instance = self.member_object(object, location)?;
        let Some(class) = self.contexts.symbols().lookup_class(&instance.class) else {
            return self.fail(
                ErrorKind::UndefinedSymbol,
                location,
                format!("there is no class named '{}'", instance.class),
            );
        };
        let Some(method) = class.methods.get(name) else {
            return self.fail_on(
                ErrorKind::UndefinedSymbol,
                location,
                name,
                format!("'{}' has no method '{}'", class.name, name),
            );
        };
        let args = self.evaluate_arguments(args)?;
        self.invoke(method, args, location, Some(instance.fields))
    }

    fn construct(&mut self, class_name: &str, args: &[Expr], location: &Location) -> Option<Value> {
        let Some(class) = self.contexts.symbols().lookup_class(class_name) else {
            return self.fail_on(
                ErrorKind::UndefinedSymbol,
                location,
                class_name,
                format!("there is no class named '{}'", class_name),
            );
        };

        // `new` nests like a call.
        self.one_level_deeper(&class.name, location, |this| {
            // Initializers see only globals, never the caller's locals.
            let fields = this.scoped(Context::new(ContextKind::Function), |this| {
                let mut fields = Context::new(ContextKind::Object);
                for attribute in &class.attributes {
                    let value = attribute
                        .initializer
                        .as_ref()
                        .and_then(|expr| this.evaluate_expression(expr));
                    fields.declare(&attribute.name, ValueProxy::from_option(value));
                }
                fields
            });
            let instance = Instance {
                class: class.name.clone(),
                fields,
            };

            match class.constructor() {
                Some(constructor) => {
                    let args = this.evaluate_arguments(args)?;
                    this.invoke(constructor, args, location, Some(instance.fields.clone()));
                }
                None if !args.is_empty() => {
                    return this.fail_on(
                        ErrorKind::UnmatchedArguments,
                        location,
                        &class.name,
                        format!(
                            "'{}' has no constructor but got {} argument(s)",
                            class.name,
                            args.len()
                        ),
                    );
                }
                None => {}
            }

            Some(Value::Object(instance))
        })
    }

    /// Runs `body` one call level deeper, or reports `RecursionLimit` for
    /// `name` when calls are already nested `MAX_CALL_DEPTH` deep.
    fn one_level_deeper<T>(
        &mut self,
        name: &str,
        location: &Location,
        body: impl FnOnce(&mut Self) -> Option<T>,
    ) -> Option<T> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return self.fail_on(
                ErrorKind::RecursionLimit,
                location,
                name,
                format!("calls nested deeper than {}", MAX_CALL_DEPTH),
            );
        }
        self.call_depth += 1;
        let result = body(self);
        self.call_depth -= 1;
        result
    }

    /// Variables and attributes are passed as their cell, so the callee can
    /// write through to the caller. Anything else gets a fresh cell.
    fn evaluate_arguments(&mut self, args: &[Expr]) -> Option<Vec<ValueProxy>> {
        args.iter()
            .map(|arg| match arg {
                Expr::Identifier { .. } | Expr::Member { .. } => self.resolve_target(arg),
                _ => self.evaluate_expression(arg).map(ValueProxy::new),
            })
            .collect()
    }

    fn invoke(
        &mut self,
        function: &FuncDef,
        args: Vec<ValueProxy>,
        location: &Location,
        object: Option<Context>,
    ) -> Option<Value> {
        if args.len() != function.params.len() {
            return self.fail_on(
                ErrorKind::UnmatchedArguments,
                location,
                &function.name,
                format!(
                    "'{}' takes {} argument(s) but got {}",
                    function.name,
                    function.params.len(),
                    args.len()
                ),
            );
        }

        let mut frame = Context::new(ContextKind::Function);
        for (param, arg) in function.params.iter().zip(args) {
            frame.declare(param, arg);
        }

        tracing::debug!(function = %function.name, depth = self.call_depth, "call");
        let flow = self.one_level_deeper(&function.name, location, |this| {
            let body = |this: &mut Self| {
                this.scoped(frame, |this| this.execute_statements(&function.body.statements))
            };
            Some(match object {
                Some(object) => this.scoped(object, body),
                None => body(this),
            })
        })?;

        match flow {
            Flow::Return(value) => value,
            Flow::Normal => None,
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: &[Expr], location: &Location) -> Option<Value> {
        if let Arity::Exact(expected) = builtin.arity() {
            if args.len() != expected {
                return self.fail_on(
                    ErrorKind::UnmatchedArguments,
                    location,
                    builtin.name(),
                    format!(
                        "{}() takes {} argument(s) but got {}",
                        builtin.name(),
                        expected,
                        args.len()
                    ),
                );
            }
        }

        let values = args
            .iter()
            .map(|arg| self.evaluate_expression(arg))
            .collect::<Option<Vec<_>>>()?;

        match builtin {
            Builtin::Print => {
                let line = values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                if let Err(error) = writeln!(self.out, "{}", line) {
                    tracing::warn!(%error, "failed to write program output");
                }
                None
            }
            Builtin::Len => match values.first() {
                Some(Value::String(s)) => Some(Value::Int(saturate(s.chars().count()))),
                Some(Value::List(items)) => Some(Value::Int(saturate(items.len()))),
                other => self.fail(
                    ErrorKind::UnsupportedOperation,
                    location,
                    format!(
                        "len() is not supported for {}",
                        other.map_or("nothing", Value::type_name)
                    ),
                ),
            },
        }
    }

    fn fail<T>(&self, kind: ErrorKind, location: &Location, explanation: impl Into<String>) -> Option<T> {
        self.diagnostics.report(
            Diagnostic::new(kind, location.clone(), String::new()).with_explanation(explanation),
        );
        None
    }

    /// Like `fail`, keeping the offending name or operator as the fragment.
    fn fail_on<T>(
        &self,
        kind: ErrorKind,
        location: &Location,
        fragment: &str,
        explanation: impl Into<String>,
    ) -> Option<T> {
        self.diagnostics.report(
            Diagnostic::new(kind, location.clone(), String::new())
                .with_fragment(fragment)
                .with_explanation(explanation),
        );
        None
    }
}

fn saturate(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
