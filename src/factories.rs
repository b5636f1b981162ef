//! Deferred and wrapped dependency shapes handed to constructors.
//!
//! Constructors never see the container directly. A parameter declared as a factory,
//! a lazy service, a list, a resource or a delegate is bound to one of the types
//! below, which resolve through a weak container handle when invoked.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::container::{resolve_deferred, DeferredScope, WeakContainer};
use crate::descriptors::{downcast_trait, AnyArc, Arguments, FactoryMethodFn, TypeRef};
use crate::error::{BoxError, ContainerError, DiResult};

fn downcast<T: Any + Send + Sync>(value: AnyArc, ty: &TypeRef) -> DiResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| ContainerError::TypeMismatch {
        service: ty.to_string(),
        expected: std::any::type_name::<T>(),
    })
}

fn single(
    container: &WeakContainer,
    scope: &DeferredScope,
    ty: &TypeRef,
    arguments: Option<Arguments>,
    create_new: bool,
) -> DiResult<AnyArc> {
    let container = container.require()?;
    resolve_deferred(&container, ty, arguments, scope, create_new).single_value()
}

/// Builds fresh instances of one service on demand.
///
/// Invoked inside the constructor that received it, the factory resolves within that
/// constructor's scope and shows up in its trace; invoked later, it resolves under
/// the contracts that were active when it was bound.
#[derive(Clone)]
pub struct ServiceFactory {
    container: WeakContainer,
    target: TypeRef,
    scope: DeferredScope,
}

impl ServiceFactory {
    pub(crate) fn new(container: WeakContainer, target: TypeRef, scope: DeferredScope) -> Self {
        Self { container, target, scope }
    }

    pub fn target(&self) -> &TypeRef {
        &self.target
    }

    pub fn create(&self) -> DiResult<AnyArc> {
        single(&self.container, &self.scope, &self.target, None, true)
    }

    /// Creates an instance with call-time arguments matched to constructor parameters.
    pub fn create_with(&self, arguments: Arguments) -> DiResult<AnyArc> {
        single(&self.container, &self.scope, &self.target, Some(arguments), true)
    }

    pub fn create_as<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
        downcast(self.create()?, &self.target)
    }

    pub fn create_as_with<T: Any + Send + Sync>(&self, arguments: Arguments) -> DiResult<Arc<T>> {
        downcast(self.create_with(arguments)?, &self.target)
    }
}

impl fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceFactory").field("target", &self.target).finish()
    }
}

/// Builds fresh instances of any type, chosen per call.
#[derive(Clone)]
pub struct TypeFactory {
    container: WeakContainer,
    scope: DeferredScope,
}

impl TypeFactory {
    pub(crate) fn new(container: WeakContainer, scope: DeferredScope) -> Self {
        Self { container, scope }
    }

    pub fn create(&self, ty: &TypeRef, arguments: Option<Arguments>) -> DiResult<AnyArc> {
        single(&self.container, &self.scope, ty, arguments, true)
    }

    pub fn create_as<T: Any + Send + Sync>(
        &self,
        ty: &TypeRef,
        arguments: Option<Arguments>,
    ) -> DiResult<Arc<T>> {
        downcast(self.create(ty, arguments)?, ty)
    }
}

impl fmt::Debug for TypeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeFactory").finish_non_exhaustive()
    }
}

/// A shared service resolved on first access, at most once.
///
/// A failed first access is cached as well; later calls return the same error.
pub struct LazyService {
    container: WeakContainer,
    target: TypeRef,
    scope: DeferredScope,
    cell: OnceCell<Result<AnyArc, Arc<ContainerError>>>,
}

impl LazyService {
    pub(crate) fn new(container: WeakContainer, target: TypeRef, scope: DeferredScope) -> Self {
        Self { container, target, scope, cell: OnceCell::new() }
    }

    pub fn target(&self) -> &TypeRef {
        &self.target
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> Result<AnyArc, Arc<ContainerError>> {
        self.cell
            .get_or_init(|| {
                single(&self.container, &self.scope, &self.target, None, false).map_err(Arc::new)
            })
            .clone()
    }

    pub fn get_as<T: Any + Send + Sync>(&self) -> Result<Arc<T>, Arc<ContainerError>> {
        downcast(self.get()?, &self.target).map_err(Arc::new)
    }
}

impl fmt::Debug for LazyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyService")
            .field("target", &self.target)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Every instance of a service, in candidate order.
#[derive(Clone)]
pub struct ServiceList {
    target: TypeRef,
    values: Vec<AnyArc>,
}

impl ServiceList {
    pub(crate) fn new(target: TypeRef, values: Vec<AnyArc>) -> Self {
        Self { target, values }
    }

    pub fn target(&self) -> &TypeRef {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[AnyArc] {
        &self.values
    }

    /// Instances that are a `T`; others are skipped.
    pub fn typed<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
        self.values
            .iter()
            .filter_map(|v| v.clone().downcast::<T>().ok())
            .collect()
    }

    /// Instances viewed through the trait object their registration casts to.
    pub fn traits<I>(&self) -> Vec<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.values.iter().filter_map(downcast_trait::<I>).collect()
    }
}

impl fmt::Debug for ServiceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceList")
            .field("target", &self.target)
            .field("len", &self.values.len())
            .finish()
    }
}

/// Bytes of a named resource.
#[derive(Clone, PartialEq, Eq)]
pub struct Resource {
    name: String,
    data: Arc<[u8]>,
}

impl Resource {
    pub(crate) fn new(name: impl Into<String>, data: Arc<[u8]>) -> Self {
        Self { name: name.into(), data }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Source of named resource streams for `Resource` parameters.
pub trait ResourceProvider: Send + Sync {
    fn open(&self, name: &str) -> Option<Arc<[u8]>>;
}

/// In-memory resources.
///
/// ```rust
/// use ferrous_resolve::{MapResources, ResourceProvider};
///
/// let resources = MapResources::new().with("schema.sql", "create table t(id int);");
/// assert!(resources.open("schema.sql").is_some());
/// assert!(resources.open("missing").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapResources {
    entries: HashMap<String, Arc<[u8]>>,
}

impl MapResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, data: impl AsRef<[u8]>) -> Self {
        self.entries.insert(name.into(), Arc::from(data.as_ref()));
        self
    }
}

impl ResourceProvider for MapResources {
    fn open(&self, name: &str) -> Option<Arc<[u8]>> {
        self.entries.get(name).cloned()
    }
}

/// A type's nested factory method, bound to a resolved provider instance.
#[derive(Clone)]
pub struct FactoryMethodDelegate {
    target: TypeRef,
    provider: AnyArc,
    invoke: FactoryMethodFn,
}

impl FactoryMethodDelegate {
    pub(crate) fn new(target: TypeRef, provider: AnyArc, invoke: FactoryMethodFn) -> Self {
        Self { target, provider, invoke }
    }

    pub fn target(&self) -> &TypeRef {
        &self.target
    }

    pub fn call(&self, arguments: &Arguments) -> Result<AnyArc, BoxError> {
        (self.invoke)(&self.provider, arguments)
    }

    pub fn call_as<T: Any + Send + Sync>(&self, arguments: &Arguments) -> Result<Arc<T>, BoxError> {
        self.call(arguments)?.downcast::<T>().map_err(|_| {
            format!("factory method of [{}] did not produce a [{}]", self.target, std::any::type_name::<T>())
                .into()
        })
    }
}

impl fmt::Debug for FactoryMethodDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryMethodDelegate").field("target", &self.target).finish()
    }
}

/// Constructor-shaped delegate: its named arguments fill the matching constructor
/// parameters of the target, the rest are resolved as usual.
#[derive(Clone)]
pub struct ConstructorDelegate {
    factory: ServiceFactory,
    names: Vec<String>,
}

impl ConstructorDelegate {
    pub(crate) fn new(factory: ServiceFactory, names: Vec<String>) -> Self {
        Self { factory, names }
    }

    pub fn target(&self) -> &TypeRef {
        self.factory.target()
    }

    /// Names this delegate accepts, in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn invoke(&self, arguments: Arguments) -> DiResult<AnyArc> {
        if let Some(unknown) = arguments.names().find(|n| !self.names.iter().any(|m| m == n)) {
            return Err(ContainerError::Registration(format!(
                "delegate for [{}] has no argument [{}]",
                self.factory.target(),
                unknown
            )));
        }
        self.factory.create_with(arguments)
    }

    pub fn invoke_as<T: Any + Send + Sync>(&self, arguments: Arguments) -> DiResult<Arc<T>> {
        downcast(self.invoke(arguments)?, self.factory.target())
    }
}

impl fmt::Debug for ConstructorDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDelegate")
            .field("target", self.factory.target())
            .field("names", &self.names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_list_filters_by_type() {
        let list = ServiceList::new(
            TypeRef::named("IPlugin"),
            vec![Arc::new(1u32) as AnyArc, Arc::new("x".to_string()), Arc::new(2u32)],
        );
        assert_eq!(list.len(), 3);
        let numbers: Vec<u32> = list.typed::<u32>().iter().map(|v| **v).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn service_list_trait_views() {
        trait Named: Send + Sync {
            fn name(&self) -> &str;
        }
        struct A;
        impl Named for A {
            fn name(&self) -> &str {
                "a"
            }
        }
        let view: Arc<dyn Named> = Arc::new(A);
        let list = ServiceList::new(TypeRef::named("Named"), vec![Arc::new(view) as AnyArc]);
        let names: Vec<String> = list.traits::<dyn Named>().iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn resource_text() {
        let resource = Resource::new("greeting", Arc::from(&b"hello"[..]));
        assert_eq!(resource.as_str(), Some("hello"));
        assert_eq!(resource.bytes().len(), 5);
    }

    #[test]
    fn dropped_container_fails_factories() {
        let weak = {
            let container = crate::ServiceCollection::new().build();
            container.downgrade()
        };
        let scope = DeferredScope { ambient: Vec::new(), contracts: Vec::new(), declaring: 0 };
        let factory = ServiceFactory::new(weak, TypeRef::named("Anything"), scope);
        assert!(matches!(factory.create(), Err(ContainerError::Disposed)));
    }
}
