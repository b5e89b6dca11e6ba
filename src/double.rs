//! Test doubles built from declarative call expectations.
//!
//! Expectations are inert data until they are handed to a [DoubleFactory]:
//!
//! * A [CallExpectation] describes a method name, argument matchers, a response and the exact
//!   number of calls expected.
//! * A [ThrowExpectation] answers a single call by raising a [Thrown] error.
//! * [Expectation::configure] wraps an opaque configurator acting directly on the [DoubleBuilder].
//!
//! The [Receiver] marker stands for the double itself, both as argument matcher and as response.
//! The builder binds it to the double's own allocation when sealing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use thiserror::Error;
use tracing::trace;

use crate::value::{Arguments, CallError, Object, Thrown, TypeInfo, TypeName, Value};

/// Marker for the double under construction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Receiver;

/// Predicate over one argument of an expected call
#[derive(Clone)]
pub enum Matcher {
    Any,
    /// Structural equality, or identity for objects
    Eq(Value),
    /// Any object satisfying the type identity
    OfType(TypeName),
    Where(Rc<dyn Fn(&Value) -> bool>),
    /// Any object satisfying the type of the receiving double, itself included
    Receiver,
}

impl Matcher {
    pub fn of_type(ty: impl Into<TypeName>) -> Self {
        Matcher::OfType(ty.into())
    }

    pub fn on(predicate: impl Fn(&Value) -> bool + 'static) -> Self {
        Matcher::Where(Rc::new(predicate))
    }

    fn matches(&self, value: &Value, receiver: &TypeInfo) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Eq(expected) => expected == value,
            Matcher::OfType(ty) => value.satisfies(ty),
            Matcher::Where(predicate) => predicate(value),
            Matcher::Receiver => value.satisfies(receiver.name()),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Any => f.write_str("Any"),
            Matcher::Eq(value) => write!(f, "Eq({value:?})"),
            Matcher::OfType(ty) => write!(f, "OfType({ty})"),
            Matcher::Where(_) => f.write_str("Where(..)"),
            Matcher::Receiver => f.write_str("Receiver"),
        }
    }
}

impl From<Receiver> for Matcher {
    fn from(_: Receiver) -> Self {
        Matcher::Receiver
    }
}

impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        Matcher::Eq(value)
    }
}

impl From<&str> for Matcher {
    fn from(s: &str) -> Self {
        Matcher::Eq(s.into())
    }
}

impl From<String> for Matcher {
    fn from(s: String) -> Self {
        Matcher::Eq(s.into())
    }
}

impl From<i64> for Matcher {
    fn from(i: i64) -> Self {
        Matcher::Eq(i.into())
    }
}

impl From<bool> for Matcher {
    fn from(b: bool) -> Self {
        Matcher::Eq(b.into())
    }
}

impl From<Rc<dyn Object>> for Matcher {
    fn from(object: Rc<dyn Object>) -> Self {
        Matcher::Eq(object.into())
    }
}

impl<T: Object> From<Rc<T>> for Matcher {
    fn from(object: Rc<T>) -> Self {
        Matcher::Eq(object.into())
    }
}

/// Answer of a double to an expected call
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Value(Value),
    /// Return the double itself, for fluent interfaces
    Receiver,
}

impl From<Receiver> for Response {
    fn from(_: Receiver) -> Self {
        Response::Receiver
    }
}

impl From<Value> for Response {
    fn from(value: Value) -> Self {
        Response::Value(value)
    }
}

impl From<()> for Response {
    fn from(_: ()) -> Self {
        Response::Value(Value::Null)
    }
}

impl From<&str> for Response {
    fn from(s: &str) -> Self {
        Response::Value(s.into())
    }
}

impl From<String> for Response {
    fn from(s: String) -> Self {
        Response::Value(s.into())
    }
}

impl From<i64> for Response {
    fn from(i: i64) -> Self {
        Response::Value(i.into())
    }
}

impl From<bool> for Response {
    fn from(b: bool) -> Self {
        Response::Value(b.into())
    }
}

impl From<Rc<dyn Object>> for Response {
    fn from(object: Rc<dyn Object>) -> Self {
        Response::Value(object.into())
    }
}

impl<T: Object> From<Rc<T>> for Response {
    fn from(object: Rc<T>) -> Self {
        Response::Value(object.into())
    }
}

/// Expect calls to a method with matching arguments
#[derive(Clone, Debug)]
pub struct CallExpectation {
    method: String,
    arguments: Vec<Matcher>,
    response: Response,
    times: usize,
}

impl CallExpectation {
    /// Expect a single call, answered by the response.
    pub fn on(
        method: impl Into<String>,
        arguments: impl IntoIterator<Item = Matcher>,
        response: impl Into<Response>,
    ) -> Self {
        Self {
            method: method.into(),
            arguments: arguments.into_iter().collect(),
            response: response.into(),
            times: 1,
        }
    }

    pub fn times(mut self, times: usize) -> Self {
        self.times = times;
        self
    }

    pub fn once(self) -> Self {
        self.times(1)
    }

    pub fn never(self) -> Self {
        self.times(0)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arguments(&self) -> &[Matcher] {
        &self.arguments
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn expected_calls(&self) -> usize {
        self.times
    }
}

/// Expect a single call to a method, answered by an error
#[derive(Clone, Debug)]
pub struct ThrowExpectation {
    method: String,
    arguments: Vec<Matcher>,
    error: Thrown,
}

impl ThrowExpectation {
    /// Throw an error of the given class, with an empty message and code 0.
    pub fn on(
        method: impl Into<String>,
        arguments: impl IntoIterator<Item = Matcher>,
        class: impl Into<TypeName>,
    ) -> Self {
        Self {
            method: method.into(),
            arguments: arguments.into_iter().collect(),
            error: Thrown {
                class: class.into(),
                message: String::new(),
                code: 0,
            },
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error.message = message.into();
        self
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.error.code = code;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arguments(&self) -> &[Matcher] {
        &self.arguments
    }

    pub fn error(&self) -> &Thrown {
        &self.error
    }
}

type Configurator = Box<dyn FnOnce(&mut DoubleBuilder)>;

/// Any definition accepted when building a double
pub enum Expectation {
    Call(CallExpectation),
    Throw(ThrowExpectation),
    Configure(Configurator),
}

impl Expectation {
    /// Wrap a closure acting directly on the builder of the double.
    pub fn configure(configure: impl FnOnce(&mut DoubleBuilder) + 'static) -> Self {
        Expectation::Configure(Box::new(configure))
    }
}

impl From<CallExpectation> for Expectation {
    fn from(expectation: CallExpectation) -> Self {
        Expectation::Call(expectation)
    }
}

impl From<ThrowExpectation> for Expectation {
    fn from(expectation: ThrowExpectation) -> Self {
        Expectation::Throw(expectation)
    }
}

#[derive(Debug)]
enum Outcome {
    Return(Value),
    ReturnReceiver,
    Throw(Thrown),
}

/// An expectation sealed into a double, counting the calls it answered
#[derive(Debug)]
struct Armed {
    method: String,
    arguments: Vec<Matcher>,
    outcome: Outcome,
    expected: usize,
    received: Cell<usize>,
}

impl Armed {
    fn accepts(&self, method: &str, args: &Arguments, receiver: &TypeInfo) -> bool {
        self.method == method
            && self.arguments.len() == args.len()
            && self
                .arguments
                .iter()
                .zip(args)
                .all(|(matcher, value)| matcher.matches(value, receiver))
    }

    fn exhausted(&self) -> bool {
        self.received.get() >= self.expected
    }

    fn record(&self) {
        self.received.set(self.received.get() + 1);
    }
}

impl From<CallExpectation> for Armed {
    fn from(expectation: CallExpectation) -> Self {
        let outcome = match expectation.response {
            Response::Value(value) => Outcome::Return(value),
            Response::Receiver => Outcome::ReturnReceiver,
        };
        Self {
            method: expectation.method,
            arguments: expectation.arguments,
            outcome,
            expected: expectation.times,
            received: Cell::new(0),
        }
    }
}

impl From<ThrowExpectation> for Armed {
    fn from(expectation: ThrowExpectation) -> Self {
        Self {
            method: expectation.method,
            arguments: expectation.arguments,
            outcome: Outcome::Throw(expectation.error),
            expected: 1,
            received: Cell::new(0),
        }
    }
}

/// Collect the expectations of a double before sealing it.
pub struct DoubleBuilder {
    info: TypeInfo,
    expectations: Vec<Armed>,
}

impl DoubleBuilder {
    pub fn new(info: TypeInfo) -> Self {
        Self {
            info,
            expectations: Vec::new(),
        }
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.info
    }

    pub fn expect(&mut self, expectation: impl Into<Expectation>) -> &mut Self {
        match expectation.into() {
            Expectation::Call(call) => self.expectations.push(call.into()),
            Expectation::Throw(throw) => self.expectations.push(throw.into()),
            Expectation::Configure(configure) => configure(self),
        }
        self
    }

    /// Seal the double and bind its receiver.
    pub fn build(self) -> Rc<Double> {
        Rc::new_cyclic(|receiver| Double {
            info: self.info,
            expectations: self.expectations,
            receiver: receiver.clone(),
        })
    }
}

/// Object standing in for any type, answering only the calls it expects
#[derive(Debug)]
pub struct Double {
    info: TypeInfo,
    expectations: Vec<Armed>,
    receiver: Weak<Double>,
}

impl Double {
    /// Number of calls answered for a method, over all its expectations
    pub fn received(&self, method: &str) -> usize {
        self.expectations
            .iter()
            .filter(|e| e.method == method)
            .map(|e| e.received.get())
            .sum()
    }

    /// Check that every expectation received its exact number of calls.
    pub fn verify(&self) -> Result<(), CountMismatch> {
        match self
            .expectations
            .iter()
            .find(|e| e.received.get() != e.expected)
        {
            None => Ok(()),
            Some(e) => Err(CountMismatch {
                ty: self.info.name().clone(),
                method: e.method.clone(),
                expected: e.expected,
                received: e.received.get(),
            }),
        }
    }

    fn receiver(&self) -> Result<Value, CallError> {
        self.receiver
            .upgrade()
            .map(Value::from)
            .ok_or(CallError::ReceiverUnavailable)
    }
}

impl Object for Double {
    fn type_info(&self) -> &TypeInfo {
        &self.info
    }

    fn call(&self, method: &str, args: Arguments) -> Result<Value, CallError> {
        let mut candidates = self
            .expectations
            .iter()
            .filter(|e| e.accepts(method, &args, &self.info))
            .peekable();

        let Some(first) = candidates.peek().copied() else {
            return Err(CallError::UnexpectedCall {
                ty: self.info.name().clone(),
                method: method.to_owned(),
                arguments: args.len(),
            });
        };
        let Some(armed) = candidates.find(|e| !e.exhausted()) else {
            first.record();
            return Err(CallError::CountExceeded {
                ty: self.info.name().clone(),
                method: method.to_owned(),
                expected: first.expected,
            });
        };

        armed.record();
        trace!(ty = %self.info.name(), method, "double answered");
        match &armed.outcome {
            Outcome::Return(value) => Ok(value.clone()),
            Outcome::ReturnReceiver => self.receiver(),
            Outcome::Throw(error) => Err(error.clone().into()),
        }
    }
}

/// A double received a wrong number of calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{ty}::{method}() should be called exactly {expected} time(s) but was called {received} time(s)")]
pub struct CountMismatch {
    pub ty: TypeName,
    pub method: String,
    pub expected: usize,
    pub received: usize,
}

/// Build doubles and verify them after use
pub trait DoubleFactory {
    /// Build a double satisfying the identity of the given type.
    fn create_double(&self, info: &TypeInfo, expectations: Vec<Expectation>) -> Rc<dyn Object>;

    /// Check the expectations of every double built so far.
    fn verify(&self) -> Result<(), CountMismatch>;
}

/// Default factory, keeping track of every [Double] it built
#[derive(Default)]
pub struct Doubles {
    created: RefCell<Vec<Rc<Double>>>,
}

impl Doubles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        info: &TypeInfo,
        expectations: impl IntoIterator<Item = Expectation>,
    ) -> Rc<Double> {
        let mut builder = DoubleBuilder::new(info.clone());
        for expectation in expectations {
            builder.expect(expectation);
        }
        let double = builder.build();
        trace!(ty = %info.name(), "double created");
        self.created.borrow_mut().push(Rc::clone(&double));
        double
    }

    pub fn len(&self) -> usize {
        self.created.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.borrow().is_empty()
    }
}

impl DoubleFactory for Doubles {
    fn create_double(&self, info: &TypeInfo, expectations: Vec<Expectation>) -> Rc<dyn Object> {
        self.create(info, expectations)
    }

    fn verify(&self) -> Result<(), CountMismatch> {
        self.created
            .borrow()
            .iter()
            .try_for_each(|double| double.verify())
    }
}
