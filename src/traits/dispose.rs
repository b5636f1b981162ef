//! Disposal trait for resource cleanup.

use crate::error::BoxError;

/// Synchronous teardown for container-owned instances.
///
/// Register the hook with [`TypeDef::disposable`](crate::TypeDef::disposable).
/// On [`Container::dispose`](crate::Container::dispose) every owned instance is
/// disposed in reverse construction order; a failing hook does not stop the
/// remaining ones, failures are aggregated into
/// [`ContainerError::Dispose`](crate::ContainerError::Dispose).
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{BoxError, Constructor, Dispose, Resolver, ServiceCollection, TypeDef};
///
/// struct Cache;
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> Result<(), BoxError> {
///         // flush...
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_type(
///     TypeDef::concrete("Cache")
///         .with_type::<Cache>()
///         .constructor(Constructor::new(vec![], |_| Ok(Cache)))
///         .disposable::<Cache>(),
/// );
/// let container = services.build();
/// container.get_service(&"Cache".into()).unwrap();
/// container.dispose().unwrap();
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Release the resources held by this instance.
    fn dispose(&self) -> Result<(), BoxError>;
}
