//! Resolver traits for service resolution.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::descriptors::{downcast_trait, AnyArc, Arguments, TypeRef};
use crate::error::{ContainerError, DiResult};
use crate::record::ServiceRecord;

fn owned(contracts: &[&str]) -> Vec<String> {
    contracts.iter().map(|c| c.to_string()).collect()
}

fn downcast<T: Any + Send + Sync>(value: AnyArc, ty: &TypeRef) -> DiResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| ContainerError::TypeMismatch {
        service: ty.to_string(),
        expected: std::any::type_name::<T>(),
    })
}

fn view<I>(value: &AnyArc, ty: &TypeRef) -> DiResult<Arc<I>>
where
    I: ?Sized + Send + Sync + 'static,
{
    downcast_trait::<I>(value).ok_or_else(|| ContainerError::TypeMismatch {
        service: ty.to_string(),
        expected: std::any::type_name::<I>(),
    })
}

/// Core resolver trait for object-safe service resolution.
///
/// Implementations produce [`ServiceRecord`]s: the full outcome of a request,
/// including failures and the dependency tree. Most users should use the
/// [`Resolver`] trait instead, which turns records into typed values.
pub trait ResolverCore: Send + Sync {
    /// Resolves the shared record for `ty` with `contracts` pushed onto the active
    /// contract chain.
    ///
    /// # Returns
    ///
    /// * `Ok(record)` - The record, whatever its status
    /// * `Err(ContainerError::Disposed)` - The container was disposed
    fn resolve_record(&self, ty: &TypeRef, contracts: &[String]) -> DiResult<Arc<ServiceRecord>>;

    /// Builds a fresh, uncached record for `ty`, passing call-time `arguments` to the
    /// constructor.
    fn create_record(
        &self,
        ty: &TypeRef,
        arguments: Option<Arguments>,
        contracts: &[String],
    ) -> DiResult<Arc<ServiceRecord>>;

    /// The registered type whose Rust type is `type_id`.
    fn type_ref_of(&self, type_id: TypeId, type_name: &'static str) -> DiResult<TypeRef>;
}

/// High-level resolver interface with typed helpers.
///
/// Both [`Container`](crate::Container) and [`ResolverContext`](crate::ResolverContext)
/// implement this trait, so configured factories resolve the same way callers do.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Constructor, Resolver, ServiceCollection, TypeDef, TypeRef};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn prefix(&self) -> &str;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn prefix(&self) -> &str {
///         "console"
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_type(TypeDef::interface("Logger"));
/// services.add_type(
///     TypeDef::concrete("ConsoleLogger")
///         .with_type::<ConsoleLogger>()
///         .implements_as::<ConsoleLogger, dyn Logger, _>(
///             TypeRef::named("Logger"),
///             |l| l as Arc<dyn Logger>,
///         )
///         .constructor(Constructor::new(vec![], |_| Ok(ConsoleLogger))),
/// );
///
/// let container = services.build();
/// let logger = container.get_trait::<dyn Logger>(&TypeRef::named("Logger")).unwrap();
/// assert_eq!(logger.prefix(), "console");
/// let concrete = container.get::<ConsoleLogger>().unwrap();
/// assert_eq!(concrete.prefix(), "console");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves exactly one shared instance of `ty`.
    ///
    /// Fails with [`ContainerError::Resolution`] when the record is in error, or holds
    /// zero or several instances.
    fn get_service(&self, ty: &TypeRef) -> DiResult<AnyArc> {
        self.resolve_record(ty, &[])?.single_value()
    }

    /// Like [`get_service`](Self::get_service), under extra contracts.
    fn get_service_in(&self, ty: &TypeRef, contracts: &[&str]) -> DiResult<AnyArc> {
        self.resolve_record(ty, &owned(contracts))?.single_value()
    }

    /// Every shared instance of `ty`; an abstract type yields one per implementation.
    fn get_all_services(&self, ty: &TypeRef) -> DiResult<Vec<AnyArc>> {
        self.resolve_record(ty, &[])?.all_values()
    }

    fn get_all_services_in(&self, ty: &TypeRef, contracts: &[&str]) -> DiResult<Vec<AnyArc>> {
        self.resolve_record(ty, &owned(contracts))?.all_values()
    }

    /// Builds a fresh instance of `ty`, bypassing the cache.
    ///
    /// # Arguments
    ///
    /// * `ty` - The service type
    /// * `arguments` - Call-time values, matched to constructor parameters by name;
    ///   any argument left unused is an error
    fn create_service(&self, ty: &TypeRef, arguments: Option<Arguments>) -> DiResult<AnyArc> {
        self.create_record(ty, arguments, &[])?.single_value()
    }

    /// The record behind `ty`, for inspection and diagnostics.
    fn resolve_service(&self, ty: &TypeRef) -> DiResult<Arc<ServiceRecord>> {
        self.resolve_record(ty, &[])
    }

    /// Resolves the registered type bound to the Rust type `T`.
    ///
    /// The type must have been registered with [`TypeDef::with_type`](crate::TypeDef::with_type).
    fn get<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let ty = self.type_ref_of(TypeId::of::<T>(), std::any::type_name::<T>())?;
        downcast(self.get_service(&ty)?, &ty)
    }

    fn get_in<T: Any + Send + Sync>(&self, contracts: &[&str]) -> DiResult<Arc<T>> {
        let ty = self.type_ref_of(TypeId::of::<T>(), std::any::type_name::<T>())?;
        downcast(self.get_service_in(&ty, contracts)?, &ty)
    }

    fn create<T: Any + Send + Sync>(&self, arguments: Option<Arguments>) -> DiResult<Arc<T>> {
        let ty = self.type_ref_of(TypeId::of::<T>(), std::any::type_name::<T>())?;
        downcast(self.create_service(&ty, arguments)?, &ty)
    }

    /// Resolves `ty` and downcasts the instance to `T`.
    fn get_as<T: Any + Send + Sync>(&self, ty: &TypeRef) -> DiResult<Arc<T>> {
        downcast(self.get_service(ty)?, ty)
    }

    fn get_all_as<T: Any + Send + Sync>(&self, ty: &TypeRef) -> DiResult<Vec<Arc<T>>> {
        self.get_all_services(ty)?
            .into_iter()
            .map(|value| downcast(value, ty))
            .collect()
    }

    /// Resolves `ty` viewed as the trait object `I`.
    ///
    /// Works for abstract types whose implementations were registered with
    /// [`TypeDef::implements_as`](crate::TypeDef::implements_as).
    fn get_trait<I>(&self, ty: &TypeRef) -> DiResult<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        view(&self.get_service(ty)?, ty)
    }

    fn get_all_traits<I>(&self, ty: &TypeRef) -> DiResult<Vec<Arc<I>>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.get_all_services(ty)?.iter().map(|value| view(value, ty)).collect()
    }
}
