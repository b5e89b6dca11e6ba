//! Substitution table: identity keys associated to substitute values, partitioned by scope.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::resolve::StageError;
use crate::value::{TypeName, Value};

/// Partition of the substitution table.
///
/// The set of scopes is fixed: [Scope::CONSTRUCTOR] and [Scope::CALL]. Any other scope is
/// rejected by the table with [StageError::UnknownScope].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Scope(Cow<'static, str>);

impl Scope {
    /// Active while resolving constructor parameters
    pub const CONSTRUCTOR: Scope = Scope(Cow::Borrowed("constructor"));
    /// Active while resolving method parameters
    pub const CALL: Scope = Scope(Cow::Borrowed("call"));

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a substitute: a type identity, or the name of an untyped parameter
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Type(TypeName),
    Named(String),
}

impl Key {
    pub fn named(name: impl Into<String>) -> Self {
        Key::Named(name.into())
    }
}

impl From<TypeName> for Key {
    fn from(ty: TypeName) -> Self {
        Key::Type(ty)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Type(ty) => write!(f, "{ty}"),
            Key::Named(name) => write!(f, "${name}"),
        }
    }
}

type Partition = HashMap<Key, Value>;

/// Substitute values, in the unscoped partition and in each scope.
///
/// Registrations accumulate: a key registered twice in the same partition keeps the latest value.
#[derive(Debug)]
pub struct SubstitutionTable {
    unscoped: Partition,
    scopes: HashMap<Scope, Partition>,
}

impl Default for SubstitutionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SubstitutionTable {
    pub fn new() -> Self {
        Self {
            unscoped: Partition::new(),
            scopes: [Scope::CONSTRUCTOR, Scope::CALL]
                .into_iter()
                .map(|scope| (scope, Partition::new()))
                .collect(),
        }
    }

    /// Register an object under its own type and every ancestor and contract it satisfies.
    ///
    /// Return an error if the value is not an object instance or if the scope is unknown.
    pub fn register(&mut self, value: Value, scope: Option<&Scope>) -> Result<(), StageError> {
        let Value::Object(object) = &value else {
            return Err(StageError::InvalidSubstitute { found: value.kind() });
        };
        let info = object.type_info();
        let keys: Vec<Key> = info.identity_keys().cloned().map(Key::Type).collect();
        debug!(
            ty = %info.name(),
            keys = keys.len(),
            scope = scope.map_or("unscoped", Scope::as_str),
            "registering substitute"
        );

        let partition = self.partition_mut(scope)?;
        for key in keys {
            partition.insert(key, value.clone());
        }
        Ok(())
    }

    /// Register a value for untyped parameters with the given name.
    pub fn register_named(
        &mut self,
        name: &str,
        value: Value,
        scope: Option<&Scope>,
    ) -> Result<(), StageError> {
        debug!(
            name,
            scope = scope.map_or("unscoped", Scope::as_str),
            "registering named value"
        );
        self.partition_mut(scope)?.insert(Key::named(name), value);
        Ok(())
    }

    /// Find the substitute for a key, in the scope first and then in the unscoped partition.
    pub fn lookup(&self, key: &Key, scope: Option<&Scope>) -> Result<Option<&Value>, StageError> {
        if let Some(scope) = scope {
            let partition = self
                .scopes
                .get(scope)
                .ok_or_else(|| StageError::UnknownScope(scope.clone()))?;
            if let Some(value) = partition.get(key) {
                return Ok(Some(value));
            }
        }
        Ok(self.unscoped.get(key))
    }

    /// Number of keys stored in a partition
    pub fn len(&self, scope: Option<&Scope>) -> Result<usize, StageError> {
        match scope {
            None => Ok(self.unscoped.len()),
            Some(scope) => self
                .scopes
                .get(scope)
                .map(HashMap::len)
                .ok_or_else(|| StageError::UnknownScope(scope.clone())),
        }
    }

    fn partition_mut(&mut self, scope: Option<&Scope>) -> Result<&mut Partition, StageError> {
        match scope {
            None => Ok(&mut self.unscoped),
            Some(scope) => self
                .scopes
                .get_mut(scope)
                .ok_or_else(|| StageError::UnknownScope(scope.clone())),
        }
    }
}
