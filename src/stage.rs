use std::rc::Rc;

use tracing::debug;

use crate::double::{CountMismatch, DoubleFactory, Doubles, Expectation};
use crate::reflect::{describe, ClassRegistry, Instantiate, Reflect};
use crate::resolve::{Overrides, Resolver, StageError};
use crate::table::{Scope, SubstitutionTable};
use crate::value::{Object, TypeName, Value};

/// Resolution engine: builds objects and calls their methods with every dependency filled in.
///
/// Registrations accumulate in the stage's own [SubstitutionTable], building or calling never
/// modifies it. A stage is meant to be used by a single test.
pub struct Stage<R = ClassRegistry, D = Doubles> {
    table: SubstitutionTable,
    reflector: R,
    doubles: D,
}

impl<R: Reflect + Instantiate> Stage<R> {
    /// Create a stage using the default double factory.
    pub fn new(reflector: R) -> Self {
        Self::with_factory(reflector, Doubles::new())
    }
}

impl<R: Reflect + Instantiate, D: DoubleFactory> Stage<R, D> {
    pub fn with_factory(reflector: R, doubles: D) -> Self {
        Self {
            table: SubstitutionTable::new(),
            reflector,
            doubles,
        }
    }

    pub fn reflector(&self) -> &R {
        &self.reflector
    }

    pub fn doubles(&self) -> &D {
        &self.doubles
    }

    pub fn table(&self) -> &SubstitutionTable {
        &self.table
    }

    /// Provide an instance for every type it satisfies, in all scopes.
    ///
    /// Return an error if the value is not an object instance.
    pub fn provide(&mut self, value: impl Into<Value>) -> Result<&mut Self, StageError> {
        self.table.register(value.into(), None)?;
        Ok(self)
    }

    /// Provide an instance for every type it satisfies, in a single scope.
    pub fn provide_in(
        &mut self,
        value: impl Into<Value>,
        scope: Scope,
    ) -> Result<&mut Self, StageError> {
        self.table.register(value.into(), Some(&scope))?;
        Ok(self)
    }

    /// Provide the value of untyped parameters with the given name, in all scopes.
    pub fn provide_named(
        &mut self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, StageError> {
        self.table.register_named(name, value.into(), None)?;
        Ok(self)
    }

    /// Provide the value of untyped parameters with the given name, in a single scope.
    pub fn provide_named_in(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        scope: Scope,
    ) -> Result<&mut Self, StageError> {
        self.table.register_named(name, value.into(), Some(&scope))?;
        Ok(self)
    }

    /// Build a double without registering it, to use as return value or argument.
    pub fn double<I>(&self, ty: impl Into<TypeName>, expectations: I) -> Rc<dyn Object>
    where
        I: IntoIterator,
        I::Item: Into<Expectation>,
    {
        let ty = ty.into();
        let info = describe(&self.reflector, &ty);
        let expectations = expectations.into_iter().map(Into::into).collect();
        self.doubles.create_double(&info, expectations)
    }

    /// Build a double and provide it in all scopes.
    pub fn with_double<I>(
        &mut self,
        ty: impl Into<TypeName>,
        expectations: I,
    ) -> Result<&mut Self, StageError>
    where
        I: IntoIterator,
        I::Item: Into<Expectation>,
    {
        let double = self.double(ty, expectations);
        self.provide(double)
    }

    /// Build a double and provide it in a single scope.
    pub fn with_double_in<I>(
        &mut self,
        ty: impl Into<TypeName>,
        expectations: I,
        scope: Scope,
    ) -> Result<&mut Self, StageError>
    where
        I: IntoIterator,
        I::Item: Into<Expectation>,
    {
        let double = self.double(ty, expectations);
        self.provide_in(double, scope)
    }

    /// Build an instance of the target type.
    pub fn build(&self, ty: impl Into<TypeName>) -> Result<Rc<dyn Object>, StageError> {
        self.build_with(ty, &Overrides::new())
    }

    /// Build an instance of the target type, with values for some constructor parameters.
    pub fn build_with(
        &self,
        ty: impl Into<TypeName>,
        overrides: &Overrides,
    ) -> Result<Rc<dyn Object>, StageError> {
        let ty = ty.into();
        let parameters = self.reflector.parameters_of(&ty)?;
        debug!(ty = %ty, parameters = parameters.len(), "building");

        let arguments = self
            .resolver(&Scope::CONSTRUCTOR)
            .resolve_all(ty.as_str(), &parameters, overrides)?;
        self.reflector.instantiate(&ty, arguments.into())
    }

    /// Call a method of the target.
    pub fn invoke(&self, target: &Rc<dyn Object>, method: &str) -> Result<Value, StageError> {
        self.invoke_with(target, method, &Overrides::new())
    }

    /// Call a method of the target, with values for some of its parameters.
    pub fn invoke_with(
        &self,
        target: &Rc<dyn Object>,
        method: &str,
        overrides: &Overrides,
    ) -> Result<Value, StageError> {
        let ty = target.type_info().name();
        let parameters = self.reflector.parameters_of_method(ty, method)?;
        debug!(ty = %ty, method, parameters = parameters.len(), "invoking");

        let site = format!("{ty}::{method}");
        let arguments = self
            .resolver(&Scope::CALL)
            .resolve_all(&site, &parameters, overrides)?;
        Ok(target.call(method, arguments.into())?)
    }

    /// Build an instance of the target type and call one of its methods.
    ///
    /// The overrides only apply to the method parameters.
    pub fn build_and_invoke(
        &self,
        ty: impl Into<TypeName>,
        method: &str,
    ) -> Result<Value, StageError> {
        self.build_and_invoke_with(ty, method, &Overrides::new())
    }

    pub fn build_and_invoke_with(
        &self,
        ty: impl Into<TypeName>,
        method: &str,
        overrides: &Overrides,
    ) -> Result<Value, StageError> {
        let target = self.build(ty)?;
        self.invoke_with(&target, method, overrides)
    }

    /// Check the expectations of every double built by this stage.
    pub fn verify(&self) -> Result<(), CountMismatch> {
        self.doubles.verify()
    }

    fn resolver<'a>(&'a self, scope: &'a Scope) -> Resolver<'a, R, D> {
        Resolver::new(&self.table, &self.reflector, &self.doubles, scope)
    }
}
