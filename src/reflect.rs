//! Read-only description of the stageable types, and their instantiation.
//!
//! The stage never inspects types by itself: it queries a [Reflect] implementation for the
//! parameters of constructors and methods, and hands the resolved arguments to an [Instantiate]
//! implementation. [ClassRegistry] provides both from explicit declarations.

use std::collections::HashMap;
use std::rc::Rc;

use crate::resolve::StageError;
use crate::value::{Arguments, CallError, Object, TypeInfo, TypeName, Value};

/// Structural description of a constructor or method parameter
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDescriptor {
    name: String,
    declared_type: Option<TypeName>,
    default: Option<Value>,
}

impl ParameterDescriptor {
    /// A parameter expecting an instance of the given type
    pub fn typed(name: impl Into<String>, ty: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            declared_type: Some(ty.into()),
            default: None,
        }
    }

    /// A parameter without declared type (including scalars)
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Option<&TypeName> {
        self.declared_type.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Query the hierarchy and the parameters of staged types
pub trait Reflect {
    /// Identity of a type, if it is known
    fn type_info(&self, ty: &TypeName) -> Option<TypeInfo>;

    /// Ordered constructor parameters, empty if the type declares no constructor
    fn parameters_of(&self, ty: &TypeName) -> Result<Vec<ParameterDescriptor>, StageError>;

    /// Ordered parameters of a method
    fn parameters_of_method(
        &self,
        ty: &TypeName,
        method: &str,
    ) -> Result<Vec<ParameterDescriptor>, StageError>;
}

/// Create instances from positional constructor arguments
pub trait Instantiate {
    fn instantiate(&self, ty: &TypeName, args: Arguments) -> Result<Rc<dyn Object>, StageError>;
}

/// Describe a type, falling back to a bare identity when the reflector does not know it.
pub fn describe(reflector: &impl Reflect, ty: &TypeName) -> TypeInfo {
    reflector
        .type_info(ty)
        .unwrap_or_else(|| TypeInfo::new(ty))
}

type Factory = Box<dyn Fn(Arguments) -> Result<Rc<dyn Object>, CallError>>;

/// Declaration of a stageable type: its identity, constructor and methods.
pub struct Class {
    info: TypeInfo,
    factory: Option<Factory>,
    constructor: Vec<ParameterDescriptor>,
    methods: HashMap<String, Vec<ParameterDescriptor>>,
}

impl Class {
    /// Declare an instantiable type.
    ///
    /// The factory receives the resolved constructor arguments, in declaration order.
    pub fn new<T, F>(info: &TypeInfo, factory: F) -> Self
    where
        T: Object,
        F: Fn(Arguments) -> Result<T, CallError> + 'static,
    {
        let factory: Factory =
            Box::new(move |args| factory(args).map(|object| Rc::new(object) as Rc<dyn Object>));
        Self {
            info: info.clone(),
            factory: Some(factory),
            constructor: Vec::new(),
            methods: HashMap::new(),
        }
    }

    /// Declare a type that can be substituted but never instantiated (contract or abstract type).
    pub fn contract(info: &TypeInfo) -> Self {
        Self {
            info: info.clone(),
            factory: None,
            constructor: Vec::new(),
            methods: HashMap::new(),
        }
    }

    pub fn constructor(
        mut self,
        parameters: impl IntoIterator<Item = ParameterDescriptor>,
    ) -> Self {
        self.constructor = parameters.into_iter().collect();
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        parameters: impl IntoIterator<Item = ParameterDescriptor>,
    ) -> Self {
        self.methods
            .insert(name.into(), parameters.into_iter().collect());
        self
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.info
    }

    pub fn is_instantiable(&self) -> bool {
        self.factory.is_some()
    }
}

/// Collection of declared types, implementing both [Reflect] and [Instantiate].
#[derive(Default)]
pub struct ClassRegistry {
    classes: HashMap<TypeName, Class>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration, replacing any previous declaration of the same type.
    pub fn class(mut self, class: Class) -> Self {
        self.register(class);
        self
    }

    /// Add a contract declaration.
    pub fn contract(self, info: &TypeInfo) -> Self {
        self.class(Class::contract(info))
    }

    pub fn register(&mut self, class: Class) {
        self.classes.insert(class.info.name().clone(), class);
    }

    pub fn get(&self, ty: &TypeName) -> Option<&Class> {
        self.classes.get(ty)
    }

    fn lookup(&self, ty: &TypeName) -> Result<&Class, StageError> {
        self.get(ty)
            .ok_or_else(|| StageError::UnknownType(ty.clone()))
    }
}

impl Reflect for ClassRegistry {
    fn type_info(&self, ty: &TypeName) -> Option<TypeInfo> {
        self.get(ty).map(|class| class.info.clone())
    }

    fn parameters_of(&self, ty: &TypeName) -> Result<Vec<ParameterDescriptor>, StageError> {
        Ok(self.lookup(ty)?.constructor.clone())
    }

    fn parameters_of_method(
        &self,
        ty: &TypeName,
        method: &str,
    ) -> Result<Vec<ParameterDescriptor>, StageError> {
        self.lookup(ty)?
            .methods
            .get(method)
            .cloned()
            .ok_or_else(|| StageError::UnknownMethod {
                ty: ty.clone(),
                method: method.to_owned(),
            })
    }
}

impl Instantiate for ClassRegistry {
    fn instantiate(&self, ty: &TypeName, args: Arguments) -> Result<Rc<dyn Object>, StageError> {
        let factory = self
            .lookup(ty)?
            .factory
            .as_ref()
            .ok_or_else(|| StageError::NotInstantiable(ty.clone()))?;
        Ok(factory(args)?)
    }
}
