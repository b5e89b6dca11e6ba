//! Test staging: build objects and call their methods while every dependency is filled in with
//! a provided instance, a provided double, or an empty double built on the fly.
//!
//! # Simple use case
//!
//! ```
//! # use std::rc::Rc;
//! # use mockstage::*;
//! // Describe the types and implement their dynamic interface
//! type_info! {
//!     static CLOCK: "Clock";
//!     static GREETER: "Greeter";
//! }
//!
//! struct Greeter {
//!     clock: Rc<dyn Object>,
//! }
//!
//! impl Object for Greeter {
//!     fn type_info(&self) -> &TypeInfo {
//!         &GREETER
//!     }
//!
//!     fn call(&self, method: &str, args: Arguments) -> Result<Value, CallError> {
//!         match method {
//!             "greet" => {
//!                 let hour = self.clock.call("hour", Arguments::none())?;
//!                 let greeting = if hour.as_int() < Some(12) { "Good morning" } else { "Hello" };
//!                 Ok(format!("{greeting} {}", args.str(0)?).into())
//!             }
//!             _ => Err(CallError::unknown_method(&GREETER, method)),
//!         }
//!     }
//! }
//!
//! # fn main() -> Result<(), StageError> {
//! // Declare how to build them and which parameters they expect
//! let registry = ClassRegistry::new().contract(&CLOCK).class(
//!     Class::new(&GREETER, |args| Ok(Greeter { clock: args.object(0)? }))
//!         .constructor([ParameterDescriptor::typed("clock", "Clock")])
//!         .method("greet", [ParameterDescriptor::untyped("name")]),
//! );
//!
//! // Stage the greeter with a double for its clock
//! let mut stage = Stage::new(registry);
//! stage.with_double("Clock", [CallExpectation::on("hour", [], 9i64)])?;
//!
//! let name = overrides! { "name" => "Ada" };
//! let greeting = stage.build_and_invoke_with("Greeter", "greet", &name)?;
//! assert_eq!(greeting, Value::from("Good morning Ada"));
//! stage.verify()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! The stage never inspects types by itself, it relies on two collaborators chosen when it is
//! created:
//!
//! * A [Reflect] + [Instantiate] implementation describes the parameters of constructors and
//!   methods, and builds instances. [ClassRegistry] collects explicit [Class] declarations.
//! * A [DoubleFactory] builds doubles from [Expectation]s and verifies them. [Doubles] is the
//!   default implementation.
//!
//! Instances are registered with [Stage::provide] under every identity of their [TypeInfo]: the
//! type itself, its ancestors and its contracts. Untyped parameters (including scalars) are
//! provided by name with [Stage::provide_named]. Registrations go either to the unscoped table,
//! visible everywhere, or to one of the two [Scope]s: [Scope::CONSTRUCTOR] is used when building
//! and [Scope::CALL] when calling methods. When the same key is registered twice, the latest
//! registration wins.
//!
//! Each parameter is then resolved with the first matching rule: request overrides, scoped table,
//! unscoped table, declared default value, empty double of the declared type. An untyped parameter
//! matching none of them is a [StageError::Resolution].

mod double;
mod helpers;
mod reflect;
mod resolve;
mod stage;
mod table;
mod value;

pub use double::{
    CallExpectation, CountMismatch, Double, DoubleBuilder, DoubleFactory, Doubles, Expectation,
    Matcher, Receiver, Response, ThrowExpectation,
};
pub use reflect::{describe, Class, ClassRegistry, Instantiate, ParameterDescriptor, Reflect};
pub use resolve::{Overrides, StageError};
pub use stage::Stage;
pub use table::{Key, Scope, SubstitutionTable};
pub use value::{
    same_object, Arguments, AsAny, CallError, Object, Thrown, TypeInfo, TypeName, Value,
};

#[doc(hidden)]
pub use once_cell;

#[cfg(test)]
mod tests;
