//! Resolver handed to configured factories.

use std::any::TypeId;
use std::sync::Arc;

use super::{engine, Container, Request};
use crate::container::context;
use crate::descriptors::{Arguments, TypeRef};
use crate::error::DiResult;
use crate::record::{ServiceDependency, ServiceRecord};
use crate::traits::{Resolver, ResolverCore};

/// Context passed to factory functions for resolving dependencies.
///
/// Resolutions made through it happen inside the record being built: they see the
/// active contract chain and are attached to that record as dependencies, so the
/// contracts they consume count as consumed by the factory's service too.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Resolver, ServiceCollection, ServiceConfiguration, TypeDef, TypeRef};
///
/// struct Settings { name: String }
///
/// let mut services = ServiceCollection::new();
/// services.add_type(TypeDef::concrete("Settings").with_type::<Settings>());
/// services.configure(
///     TypeRef::named("Settings"),
///     ServiceConfiguration::new().factory(|ctx| {
///         let name = ctx.get_as::<String>(&TypeRef::named("Greeting"))?;
///         Ok(Settings { name: (*name).clone() })
///     }),
/// );
/// services.add_type(TypeDef::concrete("Greeting"));
/// services.configure(TypeRef::named("Greeting"), ServiceConfiguration::new().instance("hi".to_string()));
///
/// let container = services.build();
/// assert_eq!(container.get::<Settings>().unwrap().name, "hi");
/// ```
pub struct ResolverContext<'a> {
    container: &'a Container,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// The container the factory runs in.
    pub fn container(&self) -> &Container {
        self.container
    }

    fn attach(&self, record: &Arc<ServiceRecord>) {
        let label = record.name().ty().to_string();
        context::attach_to_current(ServiceDependency::service(label, record.clone()));
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn resolve_record(&self, ty: &TypeRef, contracts: &[String]) -> DiResult<Arc<ServiceRecord>> {
        let record = engine::resolve(self.container, ty, Request::shared(contracts));
        self.attach(&record);
        Ok(record)
    }

    fn create_record(
        &self,
        ty: &TypeRef,
        arguments: Option<Arguments>,
        contracts: &[String],
    ) -> DiResult<Arc<ServiceRecord>> {
        let record = engine::resolve(self.container, ty, Request::fresh(arguments, contracts));
        self.attach(&record);
        Ok(record)
    }

    fn type_ref_of(&self, type_id: TypeId, type_name: &'static str) -> DiResult<TypeRef> {
        self.container.type_ref_of(type_id, type_name)
    }
}

impl<'a> Resolver for ResolverContext<'a> {}
