//! Service module system for modular registration.
//!
//! A module groups type definitions and configuration that belong together, so an
//! application can assemble its collection from reusable pieces.

use crate::{DiResult, ServiceCollection};

/// A module that can register types and configuration with a [`ServiceCollection`].
///
/// # Example
///
/// ```rust
/// use ferrous_resolve::{
///     Constructor, DiResult, Resolver, ServiceCollection, ServiceCollectionExt,
///     ServiceConfiguration, ServiceModule, TypeDef, TypeRef,
/// };
///
/// struct Mailer { host: String }
///
/// struct MailModule { host: String }
///
/// impl ServiceModule for MailModule {
///     fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
///         services.try_add_type(TypeDef::concrete("Mailer").with_type::<Mailer>().constructor(
///             Constructor::new(
///                 vec![ferrous_resolve::Parameter::service("host", TypeRef::named("String"))],
///                 |args| Ok(Mailer { host: args.value::<String>("host")? }),
///             ),
///         ))?;
///         services.configure(
///             TypeRef::named("Mailer"),
///             ServiceConfiguration::new().dependency_value("host", self.host),
///         );
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let container = ServiceCollection::new()
///     .add_module(MailModule { host: "smtp.local".into() })?
///     .build();
/// assert_eq!(container.get::<Mailer>()?.host, "smtp.local");
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule {
    /// Register this module's types and configuration.
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()>;
}

/// Chaining module registration on an owned collection.
pub trait ServiceCollectionExt {
    fn add_module<M: ServiceModule>(self, module: M) -> DiResult<Self>
    where
        Self: Sized;
}

impl ServiceCollectionExt for ServiceCollection {
    fn add_module<M: ServiceModule>(mut self, module: M) -> DiResult<Self> {
        module.register_services(&mut self)?;
        Ok(self)
    }
}

/// In-place module registration, matching the `&mut Self` style of the collection.
pub trait ServiceCollectionModuleExt {
    fn add_module_mut<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self>;
}

impl ServiceCollectionModuleExt for ServiceCollection {
    fn add_module_mut<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.register_services(self)?;
        Ok(self)
    }
}
