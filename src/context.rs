use crate::ast::{ClassDef, FuncDef, Program};
use crate::value::ValueProxy;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Global,
    Function,
    Block,
    /// Attributes of the instance a method runs on.
    Object,
}

/// The bindings of one lexical scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    kind: ContextKind,
    bindings: HashMap<String, ValueProxy>,
}

impl Context {
    pub fn new(kind: ContextKind) -> Self {
        Self {
            kind,
            bindings: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<ValueProxy> {
        self.bindings.get(name).cloned()
    }

    /// Adds a binding. Returns `false` and leaves the context untouched when
    /// the name is already bound here.
    pub fn declare(&mut self, name: &str, proxy: ValueProxy) -> bool {
        if self.bindings.contains_key(name) {
            return false;
        }
        self.bindings.insert(name.to_string(), proxy);
        true
    }
}

/// Function and class definitions of a program, fixed before evaluation
/// starts.
#[derive(Debug, Default)]
pub struct SymbolTable {
    functions: HashMap<String, Rc<FuncDef>>,
    classes: HashMap<String, Rc<ClassDef>>,
}

impl SymbolTable {
    pub fn new(program: Program) -> Self {
        Self {
            functions: program
                .functions
                .into_iter()
                .map(|(name, def)| (name, Rc::new(def)))
                .collect(),
            classes: program
                .classes
                .into_iter()
                .map(|(name, def)| (name, Rc::new(def)))
                .collect(),
        }
    }

    pub fn lookup_function(&self, name: &str) -> Option<Rc<FuncDef>> {
        self.functions.get(name).cloned()
    }

    pub fn lookup_class(&self, name: &str) -> Option<Rc<ClassDef>> {
        self.classes.get(name).cloned()
    }
}

/// Stack of scopes, innermost last, above a global scope that is never
/// popped.
#[derive(Debug)]
pub struct ContextManager {
    stack: Vec<Context>,
    symbols: SymbolTable,
}

impl ContextManager {
    pub fn new(symbols: SymbolTable) -> Self {
        Self {
            stack: vec![Context::new(ContextKind::Global)],
            symbols,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn push(&mut self, context: Context) {
        self.stack.push(context);
    }

    pub fn pop(&mut self) -> Option<Context> {
        if self.stack.len() > 1 {
            self.stack.pop()
        } else {
            None
        }
    }

    /// Declares in the innermost scope.
    pub fn declare(&mut self, name: &str, proxy: ValueProxy) -> bool {
        match self.stack.last_mut() {
            Some(context) => context.declare(name, proxy),
            None => false,
        }
    }

    /// Resolves a name from the innermost scope outwards. The search stops at
    /// the nearest function scope (and the object scope of a method directly
    /// beneath it) and then falls back to the global scope.
    pub fn lookup(&self, name: &str) -> Option<ValueProxy> {
        let mut scopes = self.stack[1..].iter().rev().peekable();
        while let Some(context) = scopes.next() {
            if let Some(proxy) = context.get(name) {
                return Some(proxy);
            }
            if context.kind == ContextKind::Function {
                if let Some(object) = scopes.peek().filter(|c| c.kind == ContextKind::Object) {
                    if let Some(proxy) = object.get(name) {
                        return Some(proxy);
                    }
                }
                break;
            }
        }
        self.stack.first().and_then(|global| global.get(name))
    }
}
