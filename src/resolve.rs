//! Resolution of constructor and method parameters.
//!
//! Each parameter is resolved independently, the first rule providing a value wins:
//!
//! 1. an override given for this request, by parameter name;
//! 2. a substitute registered in the active scope, then in the unscoped table, under the declared
//!    type of the parameter, or under its name if it has no declared type;
//! 3. the default value declared by the parameter;
//! 4. an empty double of the declared type.
//!
//! An untyped parameter which is still unresolved is reported as a [StageError::Resolution].
//! Resolution only reads the substitution table.

use std::collections::HashMap;

use thiserror::Error;
use tracing::trace;

use crate::double::{CountMismatch, DoubleFactory};
use crate::reflect::{describe, ParameterDescriptor, Reflect};
use crate::table::{Key, Scope, SubstitutionTable};
use crate::value::{CallError, TypeName, Value};

/// Values given for a single request, by parameter name
pub type Overrides = HashMap<String, Value>;

/// Errors triggered while registering substitutes or staging a type
#[derive(Error, Debug)]
pub enum StageError {
    #[error("A substitute must be an object instance, found a {found}")]
    InvalidSubstitute { found: &'static str },
    #[error("Unknown or unsupported scope \"{0}\"")]
    UnknownScope(Scope),
    #[error("Unable to resolve parameter `{parameter}` of {site}: it has no type, no provided value and no default")]
    Resolution { site: String, parameter: String },
    #[error("Unknown type {0}")]
    UnknownType(TypeName),
    #[error("{ty} has no method {method}()")]
    UnknownMethod { ty: TypeName, method: String },
    #[error("{0} can not be instantiated")]
    NotInstantiable(TypeName),
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Verification(#[from] CountMismatch),
}

/// Rule which provided the value of a parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tier {
    Override,
    Table,
    Default,
    AutoDouble,
}

/// Resolve parameters against a stage, for a single scope
pub(crate) struct Resolver<'a, R, D> {
    table: &'a SubstitutionTable,
    reflector: &'a R,
    doubles: &'a D,
    scope: &'a Scope,
}

impl<'a, R: Reflect, D: DoubleFactory> Resolver<'a, R, D> {
    pub(crate) fn new(
        table: &'a SubstitutionTable,
        reflector: &'a R,
        doubles: &'a D,
        scope: &'a Scope,
    ) -> Self {
        Self {
            table,
            reflector,
            doubles,
            scope,
        }
    }

    /// Resolve all parameters, in declaration order.
    pub(crate) fn resolve_all(
        &self,
        site: &str,
        parameters: &[ParameterDescriptor],
        overrides: &Overrides,
    ) -> Result<Vec<Value>, StageError> {
        parameters
            .iter()
            .map(|parameter| {
                let (value, tier) = self.resolve(site, parameter, overrides)?;
                trace!(
                    site,
                    parameter = parameter.name(),
                    scope = %self.scope,
                    ?tier,
                    "parameter resolved"
                );
                Ok(value)
            })
            .collect()
    }

    fn resolve(
        &self,
        site: &str,
        parameter: &ParameterDescriptor,
        overrides: &Overrides,
    ) -> Result<(Value, Tier), StageError> {
        if let Some(value) = overrides.get(parameter.name()) {
            return Ok((value.clone(), Tier::Override));
        }

        let key = match parameter.declared_type() {
            Some(ty) => Key::Type(ty.clone()),
            None => Key::named(parameter.name()),
        };
        if let Some(value) = self.table.lookup(&key, Some(self.scope))? {
            return Ok((value.clone(), Tier::Table));
        }

        if let Some(value) = parameter.default_value() {
            return Ok((value.clone(), Tier::Default));
        }

        match parameter.declared_type() {
            Some(ty) => Ok((self.auto_double(ty), Tier::AutoDouble)),
            None => Err(StageError::Resolution {
                site: site.to_owned(),
                parameter: parameter.name().to_owned(),
            }),
        }
    }

    fn auto_double(&self, ty: &TypeName) -> Value {
        let info = describe(self.reflector, ty);
        Value::Object(self.doubles.create_double(&info, Vec::new()))
    }
}
