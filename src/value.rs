//! Dynamic values exchanged between the stage, the staged objects and their doubles.
//!
//! Staged types are not known at compile time by the stage: they are described at runtime by a
//! [TypeInfo] and manipulated through the [Object] trait, which combines the [std::any::Any]
//! trait (to recover the concrete type) with a name-based method dispatch (to let a double stand
//! in for any type).
//!
//! * A [TypeName] is a stable identifier used as key of the substitution table.
//! * A [TypeInfo] lists every identity satisfied by a type: its own name, all its ancestors and
//!   all the contracts it implements.
//! * A [Value] is either a scalar, a list, a bare type reference or a shared [Object].

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::iter;
use std::rc::Rc;

use thiserror::Error;

/// Stable identifier of a type
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Cow<'static, str>);

impl TypeName {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for TypeName {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&TypeName> for TypeName {
    fn from(name: &TypeName) -> Self {
        name.clone()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a type: its name and every ancestor type and contract it satisfies.
///
/// The full closure is computed when the description is assembled: extending a parent copies the
/// parent's own ancestors and contracts, implementing a contract copies the contracts it extends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeInfo {
    name: TypeName,
    ancestors: Vec<TypeName>,
    contracts: Vec<TypeName>,
}

impl TypeInfo {
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            ancestors: Vec::new(),
            contracts: Vec::new(),
        }
    }

    /// Inherit from a parent type, along with its ancestors and contracts.
    pub fn extends(mut self, parent: &TypeInfo) -> Self {
        push_unique(&mut self.ancestors, &parent.name);
        for ancestor in &parent.ancestors {
            push_unique(&mut self.ancestors, ancestor);
        }
        for contract in &parent.contracts {
            push_unique(&mut self.contracts, contract);
        }
        self
    }

    /// Implement a contract, along with the contracts it extends.
    pub fn implements(mut self, contract: &TypeInfo) -> Self {
        push_unique(&mut self.contracts, &contract.name);
        for inherited in contract.ancestors.iter().chain(&contract.contracts) {
            push_unique(&mut self.contracts, inherited);
        }
        self
    }

    pub fn name(&self) -> &TypeName {
        &self.name
    }

    pub fn ancestors(&self) -> &[TypeName] {
        &self.ancestors
    }

    pub fn contracts(&self) -> &[TypeName] {
        &self.contracts
    }

    /// Every key an instance of this type can be registered under.
    pub fn identity_keys(&self) -> impl Iterator<Item = &TypeName> {
        iter::once(&self.name)
            .chain(&self.ancestors)
            .chain(&self.contracts)
    }

    pub fn satisfies(&self, ty: &TypeName) -> bool {
        self.identity_keys().any(|key| key == ty)
    }
}

fn push_unique(names: &mut Vec<TypeName>, name: &TypeName) {
    if !names.contains(name) {
        names.push(name.clone());
    }
}

/// Upcast helpers, implemented for all sized types
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// An instance that can be staged: registered as substitute, injected and called by name.
pub trait Object: AsAny {
    /// Identity of the concrete type of this instance
    fn type_info(&self) -> &TypeInfo;

    /// Call a method with positional arguments
    fn call(&self, method: &str, args: Arguments) -> Result<Value, CallError>;
}

/// Dynamic value passed as argument or returned by a call.
///
/// Objects are shared by reference: cloning a value never copies the object itself.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// A bare reference to a type, not an instance of it
    Type(TypeName),
    Object(Rc<dyn Object>),
}

impl Value {
    pub fn object<T: Object>(object: T) -> Self {
        Value::Object(Rc::new(object))
    }

    pub fn type_ref(name: impl Into<TypeName>) -> Self {
        Value::Type(name.into())
    }

    /// Short description of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Type(_) => "type name",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&Rc<dyn Object>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Test if this value is an object satisfying the given type identity.
    pub fn satisfies(&self, ty: &TypeName) -> bool {
        self.as_object()
            .is_some_and(|object| object.type_info().satisfies(ty))
    }

    /// Test if both values are the very same object.
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => same_object(a, b),
            _ => false,
        }
    }

    /// Recover the concrete type of an object value.
    pub fn downcast<T: Object>(&self) -> Option<Rc<T>> {
        self.as_object()
            .and_then(|object| Rc::clone(object).into_any().downcast::<T>().ok())
    }

    /// Call a method on an object value.
    pub fn call(&self, method: &str, args: impl Into<Arguments>) -> Result<Value, CallError> {
        match self {
            Value::Object(object) => object.call(method, args.into()),
            other => Err(CallError::NotAnObject {
                method: method.to_owned(),
                found: other.kind(),
            }),
        }
    }
}

/// Compare the addresses of two shared objects, ignoring their vtables.
pub fn same_object(a: &Rc<dyn Object>, b: &Rc<dyn Object>) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => same_object(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Type(ty) => write!(f, "Type({ty})"),
            Value::Object(object) => write!(f, "Object({})", object.type_info().name()),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<TypeName> for Value {
    fn from(ty: TypeName) -> Self {
        Value::Type(ty)
    }
}

impl From<Rc<dyn Object>> for Value {
    fn from(object: Rc<dyn Object>) -> Self {
        Value::Object(object)
    }
}

impl<T: Object> From<Rc<T>> for Value {
    fn from(object: Rc<T>) -> Self {
        Value::Object(object)
    }
}

/// Positional arguments of a constructor or method call
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments(Vec<Value>);

impl Arguments {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn get(&self, position: usize) -> Result<&Value, CallError> {
        self.0
            .get(position)
            .ok_or(CallError::MissingArgument(position))
    }

    pub fn object(&self, position: usize) -> Result<Rc<dyn Object>, CallError> {
        match self.get(position)? {
            Value::Object(object) => Ok(Rc::clone(object)),
            other => Err(CallError::bad_argument(position, "object", other)),
        }
    }

    pub fn str(&self, position: usize) -> Result<&str, CallError> {
        match self.get(position)? {
            Value::Str(s) => Ok(s),
            other => Err(CallError::bad_argument(position, "string", other)),
        }
    }

    pub fn int(&self, position: usize) -> Result<i64, CallError> {
        match self.get(position)? {
            Value::Int(i) => Ok(*i),
            other => Err(CallError::bad_argument(position, "int", other)),
        }
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl<const N: usize> From<[Value; N]> for Arguments {
    fn from(values: [Value; N]) -> Self {
        Self(values.into())
    }
}

impl<'a> IntoIterator for &'a Arguments {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Error raised on purpose by a staged object, carried back to the caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{class}: {message} (code {code})")]
pub struct Thrown {
    pub class: TypeName,
    pub message: String,
    pub code: i64,
}

/// Errors triggered while calling a constructor or a method
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error(transparent)]
    Thrown(#[from] Thrown),
    #[error("No expectation of {ty} matches {method}() with {arguments} argument(s)")]
    UnexpectedCall {
        ty: TypeName,
        method: String,
        arguments: usize,
    },
    #[error("{ty}::{method}() should be called exactly {expected} time(s)")]
    CountExceeded {
        ty: TypeName,
        method: String,
        expected: usize,
    },
    #[error("{ty} has no method {method}()")]
    UnknownMethod { ty: TypeName, method: String },
    #[error("Missing argument at position {0}")]
    MissingArgument(usize),
    #[error("Argument {position} should be a {expected}, found a {found}")]
    BadArgument {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Cannot call {method}() on a {found}")]
    NotAnObject { method: String, found: &'static str },
    #[error("The receiver of this double was dropped")]
    ReceiverUnavailable,
}

impl CallError {
    pub fn unknown_method(info: &TypeInfo, method: &str) -> Self {
        CallError::UnknownMethod {
            ty: info.name().clone(),
            method: method.to_owned(),
        }
    }

    fn bad_argument(position: usize, expected: &'static str, found: &Value) -> Self {
        CallError::BadArgument {
            position,
            expected,
            found: found.kind(),
        }
    }
}
