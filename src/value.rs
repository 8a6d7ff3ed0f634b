use crate::context::Context;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    String(String),
    List(Vec<Value>),
    Object(Instance),
}

/// An instance of a user class. Copies of the value share the field cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub class: String,
    pub fields: Context,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                // Always show at least one decimal place for floats
                if n.fract() == 0.0 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, item) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(instance) => write!(f, "<{} instance>", instance.class),
        }
    }
}

/// A shared cell holding a value. Every binding of a variable refers to a
/// proxy, so writing through one binding is seen by all of them. An empty
/// cell is a variable declared without a value.
#[derive(Debug, Clone, Default)]
pub struct ValueProxy(Rc<RefCell<Option<Value>>>);

impl ValueProxy {
    pub fn new(value: Value) -> Self {
        Self(Rc::new(RefCell::new(Some(value))))
    }

    pub fn from_option(value: Option<Value>) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn get(&self) -> Option<Value> {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.borrow_mut() = Some(value);
    }

    pub fn is_same(&self, other: &ValueProxy) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Proxies are equal when they are the same cell.
impl PartialEq for ValueProxy {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}
