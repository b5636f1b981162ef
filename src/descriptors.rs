//! Type descriptors: the explicit registration table the engine resolves against.
//!
//! Rust has no runtime reflection, so every type the container can build is
//! described up front by a [`TypeDef`]: its kind, generic parameters, supertypes,
//! constructors and lifecycle hooks. Types are identified at runtime by
//! [`TypeRef`], which also models open generics through [`TypeRef::Param`].

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;
use crate::lifetime::Lifestyle;
use crate::traits::Dispose;

/// Type-erased shared instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Converts an instance of a concrete type into the representation of one of its
/// supertypes (usually `Arc<Arc<dyn Trait>>`).
pub type CastFn = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;

/// Hook run against a built instance (initializer or disposer).
pub type InstanceHook = Arc<dyn Fn(&AnyArc) -> Result<(), BoxError> + Send + Sync>;

/// Constructor body: receives the bound parameter values.
pub type ConstructFn = Arc<dyn Fn(&ConstructArgs<'_>) -> Result<AnyArc, BoxError> + Send + Sync>;

/// Nested factory method invoked against a resolved provider instance.
pub type FactoryMethodFn = Arc<dyn Fn(&AnyArc, &Arguments) -> Result<AnyArc, BoxError> + Send + Sync>;

/// Member injector used by `build_up`.
pub type InjectFn = Arc<dyn Fn(&mut dyn Any, &ConstructArgs<'_>) -> Result<(), BoxError> + Send + Sync>;

/// Runtime type identity.
///
/// A `TypeRef` is either a named type with ordered type arguments, or a reference
/// to the `n`-th generic parameter of the enclosing definition. Any `TypeRef`
/// containing a parameter is *open*.
///
/// ```rust
/// use ferrous_resolve::TypeRef;
///
/// let open = TypeRef::generic("Service", [TypeRef::param(0)]);
/// let closed = open.substitute(&[TypeRef::named("i32")]);
/// assert!(open.is_open());
/// assert_eq!(closed.to_string(), "Service<i32>");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeRef {
    /// Generic parameter of the enclosing definition, by position.
    Param(usize),
    /// A named type with its type arguments.
    Named { name: Arc<str>, args: Vec<TypeRef> },
}

impl TypeRef {
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        TypeRef::Named { name: name.into(), args: Vec::new() }
    }

    pub fn generic<I>(name: impl Into<Arc<str>>, args: I) -> Self
    where
        I: IntoIterator<Item = TypeRef>,
    {
        TypeRef::Named { name: name.into(), args: args.into_iter().collect() }
    }

    pub fn param(index: usize) -> Self {
        TypeRef::Param(index)
    }

    /// The open definition `name<T0, .., Tn>`.
    pub fn definition(name: impl Into<Arc<str>>, arity: usize) -> Self {
        Self::generic(name, (0..arity).map(TypeRef::Param))
    }

    /// Definition name, `None` for a generic parameter.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            TypeRef::Param(_) => None,
        }
    }

    pub fn args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Named { args, .. } => args,
            TypeRef::Param(_) => &[],
        }
    }

    pub fn is_open(&self) -> bool {
        match self {
            TypeRef::Param(_) => true,
            TypeRef::Named { args, .. } => args.iter().any(TypeRef::is_open),
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.args().is_empty()
    }

    /// True for `name<T0, .., Tn>` with every argument the parameter at its position.
    pub fn is_definition(&self) -> bool {
        self.is_generic()
            && self
                .args()
                .iter()
                .enumerate()
                .all(|(i, a)| *a == TypeRef::Param(i))
    }

    /// The open definition this type was closed from.
    pub fn to_definition(&self) -> Option<TypeRef> {
        match self {
            TypeRef::Named { name, args } if !args.is_empty() => {
                Some(TypeRef::definition(name.clone(), args.len()))
            }
            _ => None,
        }
    }

    /// Replaces parameter references with `args`; out-of-range parameters stay open.
    pub fn substitute(&self, args: &[TypeRef]) -> TypeRef {
        match self {
            TypeRef::Param(i) => args.get(*i).cloned().unwrap_or(TypeRef::Param(*i)),
            TypeRef::Named { name, args: own } => TypeRef::Named {
                name: name.clone(),
                args: own.iter().map(|a| a.substitute(args)).collect(),
            },
        }
    }

    /// Nesting depth of type arguments; a plain name has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.args().iter().map(TypeRef::depth).max().unwrap_or(0)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Param(i) => write!(f, "T{}", i),
            TypeRef::Named { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::named(name)
    }
}

/// What the container may do with a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Built through one of its constructors.
    Concrete,
    /// Resolved by fanning out over its implementors.
    Abstract,
    /// A primitive/value type; only ever supplied by configuration.
    Simple,
}

/// Generic parameter of a definition.
#[derive(Debug, Clone)]
pub struct GenericParam {
    pub(crate) name: String,
    pub(crate) constraints: Vec<TypeRef>,
    pub(crate) default_constructor: bool,
}

impl GenericParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), constraints: Vec::new(), default_constructor: false }
    }

    /// Closed types substituted for this parameter must be assignable to `ty`.
    pub fn constraint(mut self, ty: TypeRef) -> Self {
        self.constraints.push(ty);
        self
    }

    /// Substituted types must have a parameterless constructor.
    pub fn default_constructor(mut self) -> Self {
        self.default_constructor = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A supertype form, expressed over the implementing definition's own parameters.
#[derive(Clone)]
pub struct Supertype {
    pub(crate) form: TypeRef,
    pub(crate) cast: Option<CastFn>,
}

impl Supertype {
    pub fn form(&self) -> &TypeRef {
        &self.form
    }
}

impl fmt::Debug for Supertype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supertype")
            .field("form", &self.form)
            .field("cast", &self.cast.is_some())
            .finish()
    }
}

/// How a constructor parameter is bound.
#[derive(Debug, Clone)]
pub enum ParamShape {
    /// A single instance of the type.
    Service(TypeRef),
    /// Every instance of the type, as a [`ServiceList`](crate::ServiceList).
    All(TypeRef),
    /// A [`ServiceFactory`](crate::ServiceFactory) creating the type on demand,
    /// with or without call-time arguments.
    Factory(TypeRef),
    /// A [`TypeFactory`](crate::TypeFactory) taking the type and arguments per call.
    TypeFactory,
    /// A [`LazyService`](crate::LazyService) resolved on first access.
    Lazy(TypeRef),
    /// A named resource stream, as a [`Resource`](crate::Resource).
    Resource(String),
    /// The nested factory method of the type, bound to its resolved provider.
    FactoryMethod(TypeRef),
    /// A [`ConstructorDelegate`](crate::ConstructorDelegate) whose named arguments
    /// map onto the type's constructor parameters.
    Delegate { target: TypeRef, names: Vec<String> },
}

impl ParamShape {
    /// The service type behind the wrapper, if any.
    pub fn target(&self) -> Option<&TypeRef> {
        match self {
            ParamShape::Service(t)
            | ParamShape::All(t)
            | ParamShape::Factory(t)
            | ParamShape::Lazy(t)
            | ParamShape::FactoryMethod(t)
            | ParamShape::Delegate { target: t, .. } => Some(t),
            ParamShape::TypeFactory | ParamShape::Resource(_) => None,
        }
    }
}

/// Default value of a parameter, kept with its rendering for traces.
#[derive(Clone)]
pub(crate) struct DefaultValue {
    pub(crate) value: AnyArc,
    pub(crate) display: String,
}

/// A constructor or member parameter.
#[derive(Clone)]
pub struct Parameter {
    pub(crate) name: String,
    pub(crate) shape: ParamShape,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) optional: bool,
    pub(crate) contracts: Vec<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, shape: ParamShape) -> Self {
        Self {
            name: name.into(),
            shape,
            default: None,
            optional: false,
            contracts: Vec::new(),
        }
    }

    pub fn service(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, ParamShape::Service(ty))
    }

    pub fn all(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, ParamShape::All(ty))
    }

    pub fn factory(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, ParamShape::Factory(ty))
    }

    pub fn type_factory(name: impl Into<String>) -> Self {
        Self::new(name, ParamShape::TypeFactory)
    }

    pub fn lazy(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, ParamShape::Lazy(ty))
    }

    pub fn resource(name: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::new(name, ParamShape::Resource(resource.into()))
    }

    pub fn factory_method(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, ParamShape::FactoryMethod(ty))
    }

    pub fn delegate<I, S>(name: impl Into<String>, target: TypeRef, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            ParamShape::Delegate { target, names: names.into_iter().map(Into::into).collect() },
        )
    }

    /// Value used when nothing else binds the parameter.
    pub fn default_value<T>(mut self, value: T) -> Self
    where
        T: Any + Send + Sync + fmt::Debug,
    {
        let display = format!("{:?}", value);
        self.default = Some(DefaultValue { value: Arc::new(value), display });
        self
    }

    /// Bind to "no value" instead of failing when nothing resolves.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Resolve the dependency with an extra contract pushed onto the chain.
    pub fn contract(mut self, name: impl Into<String>) -> Self {
        self.contracts.push(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &ParamShape {
        &self.shape
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("optional", &self.optional)
            .field("contracts", &self.contracts)
            .finish()
    }
}

/// A constructor: ordered parameters plus the body that consumes their values.
#[derive(Clone)]
pub struct Constructor {
    pub(crate) params: Vec<Parameter>,
    pub(crate) designated: bool,
    pub(crate) invoke: ConstructFn,
}

impl Constructor {
    pub fn new<T, F>(params: Vec<Parameter>, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&ConstructArgs<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            params,
            designated: false,
            invoke: Arc::new(move |args| body(args).map(|v| Arc::new(v) as AnyArc)),
        }
    }

    /// Constructor whose body already produces a type-erased instance.
    pub fn from_any<F>(params: Vec<Parameter>, body: F) -> Self
    where
        F: Fn(&ConstructArgs<'_>) -> Result<AnyArc, BoxError> + Send + Sync + 'static,
    {
        Self { params, designated: false, invoke: Arc::new(body) }
    }

    /// Marks this constructor as the one to use when a type has several.
    pub fn designated(mut self) -> Self {
        self.designated = true;
        self
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .field("designated", &self.designated)
            .finish()
    }
}

/// Values bound to a constructor's parameters.
pub struct ConstructArgs<'a> {
    pub(crate) service: &'a TypeRef,
    pub(crate) values: Vec<(String, Option<AnyArc>)>,
}

impl<'a> ConstructArgs<'a> {
    pub(crate) fn new(service: &'a TypeRef, values: Vec<(String, Option<AnyArc>)>) -> Self {
        Self { service, values }
    }

    /// The closed type being constructed.
    pub fn service_type(&self) -> &TypeRef {
        self.service
    }

    /// Type arguments of the closed type being constructed.
    pub fn type_args(&self) -> &[TypeRef] {
        self.service.args()
    }

    /// Raw value of a parameter; `None` when it was bound to "no value".
    pub fn any(&self, name: &str) -> Result<Option<AnyArc>, BoxError> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| format!("[{}] has no parameter [{}]", self.service, name).into())
    }

    pub fn optional<T: Any + Send + Sync>(&self, name: &str) -> Result<Option<Arc<T>>, BoxError> {
        match self.any(name)? {
            None => Ok(None),
            Some(value) => value.downcast::<T>().map(Some).map_err(|_| {
                format!("parameter [{}] is not a [{}]", name, std::any::type_name::<T>()).into()
            }),
        }
    }

    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, BoxError> {
        self.optional::<T>(name)?
            .ok_or_else(|| format!("parameter [{}] has no value", name).into())
    }

    /// Clones a value parameter out of its `Arc`.
    pub fn value<T: Any + Send + Sync + Clone>(&self, name: &str) -> Result<T, BoxError> {
        self.get::<T>(name).map(|v| (*v).clone())
    }

    /// A trait object bound through a supertype cast.
    pub fn get_trait<I>(&self, name: &str) -> Result<Arc<I>, BoxError>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let value = self
            .any(name)?
            .ok_or_else(|| -> BoxError { format!("parameter [{}] has no value", name).into() })?;
        downcast_trait::<I>(&value).ok_or_else(|| {
            format!("parameter [{}] is not a [{}]", name, std::any::type_name::<I>()).into()
        })
    }
}

/// Reads an `Arc<I>` stored inside a type-erased instance.
pub(crate) fn downcast_trait<I>(value: &AnyArc) -> Option<Arc<I>>
where
    I: ?Sized + Send + Sync + 'static,
{
    value.downcast_ref::<Arc<I>>().cloned()
}

#[derive(Clone)]
pub(crate) struct Argument {
    pub(crate) name: String,
    pub(crate) value: AnyArc,
    pub(crate) display: String,
}

/// Call-time constructor arguments, matched to parameters by name.
///
/// ```rust
/// use ferrous_resolve::Arguments;
///
/// let args = Arguments::new().with("port", 8080u16).with("host", "localhost".to_string());
/// assert_eq!(args.len(), 2);
/// assert_eq!(args.names().collect::<Vec<_>>(), vec!["port", "host"]);
/// ```
#[derive(Clone, Default)]
pub struct Arguments {
    pub(crate) entries: Vec<Argument>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T>(mut self, name: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync + fmt::Debug,
    {
        let display = format!("{:?}", value);
        self.entries.push(Argument { name: name.into(), value: Arc::new(value), display });
        self
    }

    pub fn with_any(mut self, name: impl Into<String>, value: AnyArc) -> Self {
        self.entries.push(Argument { name: name.into(), value, display: "<argument>".into() });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|a| a.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&AnyArc> {
        self.entries.iter().find(|a| a.name == name).map(|a| &a.value)
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|a| (&a.name, &a.display)))
            .finish()
    }
}

/// Nested factory method declared by a type.
#[derive(Clone)]
pub struct FactoryMethod {
    pub(crate) provider: TypeRef,
    pub(crate) invoke: FactoryMethodFn,
}

/// Registration entry describing one type.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{Constructor, Parameter, TypeDef, TypeRef};
///
/// struct Clock;
/// struct Scheduler { clock: std::sync::Arc<Clock> }
///
/// let clock = TypeDef::concrete("Clock")
///     .constructor(Constructor::new(vec![], |_| Ok(Clock)));
/// let scheduler = TypeDef::concrete("Scheduler").constructor(Constructor::new(
///     vec![Parameter::service("clock", TypeRef::named("Clock"))],
///     |args| Ok(Scheduler { clock: args.get::<Clock>("clock")? }),
/// ));
/// assert_eq!(scheduler.name(), "Scheduler");
/// assert_eq!(clock.constructors().len(), 1);
/// ```
#[derive(Clone)]
pub struct TypeDef {
    pub(crate) name: Arc<str>,
    pub(crate) module: String,
    pub(crate) kind: TypeKind,
    pub(crate) generic_params: Vec<GenericParam>,
    pub(crate) supertypes: Vec<Supertype>,
    pub(crate) constructors: Vec<Constructor>,
    pub(crate) lifestyle: Lifestyle,
    pub(crate) initializer: Option<InstanceHook>,
    pub(crate) disposer: Option<InstanceHook>,
    pub(crate) factory_method: Option<FactoryMethod>,
    pub(crate) members: Vec<Parameter>,
    pub(crate) injector: Option<InjectFn>,
    pub(crate) type_id: Option<TypeId>,
}

impl TypeDef {
    fn with_kind(name: impl Into<Arc<str>>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            module: String::new(),
            kind,
            generic_params: Vec::new(),
            supertypes: Vec::new(),
            constructors: Vec::new(),
            lifestyle: Lifestyle::Shared,
            initializer: None,
            disposer: None,
            factory_method: None,
            members: Vec::new(),
            injector: None,
            type_id: None,
        }
    }

    pub fn concrete(name: impl Into<Arc<str>>) -> Self {
        Self::with_kind(name, TypeKind::Concrete)
    }

    /// An abstract type (trait or interface) resolved through its implementors.
    pub fn interface(name: impl Into<Arc<str>>) -> Self {
        Self::with_kind(name, TypeKind::Abstract)
    }

    pub fn simple(name: impl Into<Arc<str>>) -> Self {
        Self::with_kind(name, TypeKind::Simple)
    }

    /// Module the type belongs to, matched by the universe's module filter.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn generic_param(mut self, param: GenericParam) -> Self {
        self.generic_params.push(param);
        self
    }

    /// Declares a supertype; `form` may reference this type's generic parameters.
    pub fn implements(mut self, form: TypeRef) -> Self {
        self.supertypes.push(Supertype { form, cast: None });
        self
    }

    /// Declares a supertype and how an instance is viewed as it.
    ///
    /// Instances reached through the supertype are stored as `Arc<Arc<I>>`, which
    /// is what [`Resolver::get_trait`](crate::Resolver::get_trait) reads back.
    pub fn implements_as<T, I, F>(mut self, form: TypeRef, cast: F) -> Self
    where
        T: Any + Send + Sync,
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let cast: CastFn = Arc::new(move |value: &AnyArc| {
            value
                .clone()
                .downcast::<T>()
                .ok()
                .map(|concrete| Arc::new(cast(concrete)) as AnyArc)
        });
        self.supertypes.push(Supertype { form, cast: Some(cast) });
        self
    }

    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn lifestyle(mut self, lifestyle: Lifestyle) -> Self {
        self.lifestyle = lifestyle;
        self
    }

    pub fn per_request(self) -> Self {
        self.lifestyle(Lifestyle::PerRequest)
    }

    /// Associates a Rust type so the typed `Resolver` helpers can find this entry.
    pub fn with_type<T: 'static>(mut self) -> Self {
        self.type_id = Some(TypeId::of::<T>());
        self
    }

    /// Post-construction hook, run once per built record before it is published.
    pub fn initializer<T, F>(mut self, hook: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.initializer = Some(typed_hook(hook));
        self
    }

    /// Disposes instances through their [`Dispose`] implementation.
    pub fn disposable<T: Dispose>(self) -> Self {
        self.disposer::<T, _>(|instance| instance.dispose())
    }

    pub fn disposer<T, F>(mut self, hook: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.disposer = Some(typed_hook(hook));
        self
    }

    /// Declares the nested factory method `P -> T` used by
    /// [`ParamShape::FactoryMethod`] parameters.
    pub fn factory_method<P, T, F>(mut self, provider: TypeRef, method: F) -> Self
    where
        P: Any + Send + Sync,
        T: Any + Send + Sync,
        F: Fn(&P, &Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let invoke: FactoryMethodFn = Arc::new(move |provider: &AnyArc, args: &Arguments| {
            let provider = provider
                .downcast_ref::<P>()
                .ok_or_else(|| -> BoxError {
                    format!("factory provider is not a [{}]", std::any::type_name::<P>()).into()
                })?;
            method(provider, args).map(|v| Arc::new(v) as AnyArc)
        });
        self.factory_method = Some(FactoryMethod { provider, invoke });
        self
    }

    /// Members injected into externally constructed instances by `build_up`.
    pub fn injector<T, F>(mut self, members: Vec<Parameter>, inject: F) -> Self
    where
        T: Any,
        F: Fn(&mut T, &ConstructArgs<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.members = members;
        self.injector = Some(Arc::new(move |target: &mut dyn Any, args: &ConstructArgs<'_>| {
            let target = target.downcast_mut::<T>().ok_or_else(|| -> BoxError {
                format!("build-up target is not a [{}]", std::any::type_name::<T>()).into()
            })?;
            inject(target, args)
        }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_name(&self) -> &str {
        &self.module
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn lifestyle_of(&self) -> Lifestyle {
        self.lifestyle
    }

    pub fn arity(&self) -> usize {
        self.generic_params.len()
    }

    pub fn is_generic_definition(&self) -> bool {
        !self.generic_params.is_empty()
    }

    pub fn generic_params(&self) -> &[GenericParam] {
        &self.generic_params
    }

    pub fn supertypes(&self) -> &[Supertype] {
        &self.supertypes
    }

    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// This type as a `TypeRef`, open over its own parameters when generic.
    pub fn definition_ref(&self) -> TypeRef {
        TypeRef::definition(self.name.clone(), self.arity())
    }

    pub fn has_default_constructor(&self) -> bool {
        self.constructors.iter().any(|c| c.params.is_empty())
    }

    /// The single eligible constructor: the only one, or the only designated one.
    pub fn select_constructor(&self) -> Result<&Constructor, String> {
        match self.constructors.as_slice() {
            [] => Err(format!("no constructors registered for [{}]", self.name)),
            [single] => Ok(single),
            many => {
                let mut designated = many.iter().filter(|c| c.designated);
                match (designated.next(), designated.next()) {
                    (Some(c), None) => Ok(c),
                    (None, _) => Err(format!(
                        "many constructors for [{}], mark one as designated",
                        self.name
                    )),
                    (Some(_), Some(_)) => Err(format!(
                        "many designated constructors for [{}]",
                        self.name
                    )),
                }
            }
        }
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("kind", &self.kind)
            .field("generic_params", &self.generic_params)
            .field("supertypes", &self.supertypes)
            .field("constructors", &self.constructors.len())
            .field("lifestyle", &self.lifestyle)
            .finish()
    }
}

fn typed_hook<T, F>(hook: F) -> InstanceHook
where
    T: Any + Send + Sync,
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(move |value: &AnyArc| match value.downcast_ref::<T>() {
        Some(instance) => hook(instance),
        None => Err(format!("instance is not a [{}]", std::any::type_name::<T>()).into()),
    })
}
