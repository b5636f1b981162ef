//! The container: resolution engine, cache and lifecycle.

mod builder;
pub(crate) mod context;
mod engine;
mod parameters;
mod resolver;
mod slot;
mod strategies;

pub use resolver::ResolverContext;
pub use strategies::{InstantiationStrategy, ServiceBuilderHandle};
pub(crate) use strategies::default_strategies;
pub(crate) use engine::{resolve_deferred, DeferredScope, Request};

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::RandomState;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::{ContainerSettings, ParameterSource};
use crate::configuration::{ConfigurationSource, LayeredConfiguration};
use crate::descriptors::{Arguments, TypeRef};
use crate::error::{ContainerError, DiResult};
use crate::factories::ResourceProvider;
use crate::generics::GenericCloser;
use crate::internal::DisposeBag;
use crate::key::ServiceName;
use crate::record::ServiceRecord;
use crate::registration::TypeUniverse;
use crate::traits::{Resolver, ResolverCore};

use slot::ServiceSlot;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct ContainerInner {
    pub(crate) id: u64,
    pub(crate) universe: Arc<TypeUniverse>,
    pub(crate) configuration: Arc<dyn ConfigurationSource>,
    pub(crate) closer: Arc<GenericCloser>,
    pub(crate) settings: ContainerSettings,
    pub(crate) parameters: Vec<Arc<dyn ParameterSource>>,
    pub(crate) resources: Option<Arc<dyn ResourceProvider>>,
    pub(crate) cache: RwLock<HashMap<ServiceName, Arc<ServiceSlot>, RandomState>>,
    pub(crate) disposables: Mutex<DisposeBag>,
    pub(crate) construction_counter: AtomicU64,
    pub(crate) strategies: Arc<Vec<Box<dyn InstantiationStrategy>>>,
    pub(crate) disposed: AtomicBool,
}

impl ContainerInner {
    pub(crate) fn slot(&self, name: &ServiceName) -> Arc<ServiceSlot> {
        if let Some(slot) = self.cache.read().get(name) {
            return slot.clone();
        }
        self.cache
            .write()
            .entry(name.clone())
            .or_insert_with(|| Arc::new(ServiceSlot::new()))
            .clone()
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        let pending = self.disposables.get_mut().len();
        if pending > 0 {
            warn!(container = self.id, pending, "container dropped with undisposed services; call dispose()");
        }
    }
}

/// The service container.
///
/// Cheap to clone: clones share the cache and lifecycle. Resolution goes through the
/// [`Resolver`] trait; the container itself adds lifecycle and diagnostic operations.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{Constructor, Parameter, Resolver, ServiceCollection, TypeDef, TypeRef};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut services = ServiceCollection::new();
/// services.add_type(
///     TypeDef::concrete("Database").with_type::<Database>().constructor(Constructor::new(
///         vec![Parameter::service("url", TypeRef::named("String"))],
///         |args| Ok(Database { url: args.value::<String>("url")? }),
///     )),
/// );
/// services.add_type(
///     TypeDef::concrete("UserService").with_type::<UserService>().constructor(Constructor::new(
///         vec![Parameter::service("db", TypeRef::named("Database"))],
///         |args| Ok(UserService { db: args.get::<Database>("db")? }),
///     )),
/// );
/// services.configure(
///     TypeRef::named("Database"),
///     ferrous_resolve::ServiceConfiguration::new()
///         .dependency_value("url", "postgres://localhost".to_string()),
/// );
///
/// let container = services.build();
/// let users = container.get::<UserService>().unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// assert!(Arc::ptr_eq(&users, &container.get::<UserService>().unwrap()));
/// ```
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

/// Non-owning handle held by deferred factories.
#[derive(Clone)]
pub struct WeakContainer {
    inner: Weak<ContainerInner>,
}

impl WeakContainer {
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }

    pub(crate) fn require(&self) -> DiResult<Container> {
        let container = self.upgrade().ok_or(ContainerError::Disposed)?;
        if container.is_disposed() {
            return Err(ContainerError::Disposed);
        }
        Ok(container)
    }
}

impl std::fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakContainer").field("alive", &(self.inner.strong_count() > 0)).finish()
    }
}

impl Container {
    pub(crate) fn new(
        universe: Arc<TypeUniverse>,
        configuration: Arc<dyn ConfigurationSource>,
        closer: Arc<GenericCloser>,
        settings: ContainerSettings,
        parameters: Vec<Arc<dyn ParameterSource>>,
        resources: Option<Arc<dyn ResourceProvider>>,
        strategies: Arc<Vec<Box<dyn InstantiationStrategy>>>,
    ) -> Self {
        let id = NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed);
        debug!(container = id, "container created");
        Self {
            inner: Arc::new(ContainerInner {
                id,
                universe,
                configuration,
                closer,
                settings,
                parameters,
                resources,
                cache: RwLock::new(HashMap::default()),
                disposables: Mutex::new(DisposeBag::default()),
                construction_counter: AtomicU64::new(0),
                strategies,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn universe(&self) -> &TypeUniverse {
        &self.inner.universe
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.inner.settings
    }

    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer { inner: Arc::downgrade(&self.inner) }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> DiResult<()> {
        if self.is_disposed() {
            return Err(ContainerError::Disposed);
        }
        Ok(())
    }

    /// Closed forms the generic definition behind `ty` can be used as.
    pub fn close_generic(&self, ty: &TypeRef) -> Vec<TypeRef> {
        match self.inner.universe.get_ref(ty) {
            Some(def) if def.is_generic_definition() => {
                self.inner.closer.close(&self.inner.universe, def).to_vec()
            }
            _ => Vec::new(),
        }
    }

    /// Injects the members declared for `ty` into an externally constructed object.
    pub fn build_up<T: Any>(&self, ty: &TypeRef, target: &mut T) -> DiResult<()> {
        self.ensure_live()?;
        engine::build_up(self, ty, target)
    }

    /// A new container sharing this one's types, with `overrides` shadowing its
    /// configuration. The new container has its own cache and lifecycle.
    pub fn clone_with_overrides(&self, overrides: Arc<dyn ConfigurationSource>) -> Container {
        let inner = &self.inner;
        let configuration: Arc<dyn ConfigurationSource> =
            Arc::new(LayeredConfiguration::new(overrides, inner.configuration.clone()));
        Container::new(
            inner.universe.clone(),
            configuration,
            Arc::new(GenericCloser::new()),
            inner.settings.clone(),
            inner.parameters.clone(),
            inner.resources.clone(),
            inner.strategies.clone(),
        )
    }

    /// Disposes every owned instance in reverse construction order and releases the
    /// cache. Only the first call does any work.
    ///
    /// Every failing disposer is reported in [`ContainerError::Dispose`].
    pub fn dispose(&self) -> DiResult<()> {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let failures = self.inner.disposables.lock().run_all_reverse();
        let released = std::mem::take(&mut *self.inner.cache.write());
        debug!(container = self.inner.id, released = released.len(), "container disposed");
        drop(released);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ContainerError::Dispose(failures))
        }
    }

    /// Published records, ordered by construction.
    pub fn cached_records(&self) -> Vec<Arc<ServiceRecord>> {
        let mut records: Vec<Arc<ServiceRecord>> = self
            .inner
            .cache
            .read()
            .values()
            .filter_map(|slot| slot.peek())
            .collect();
        records.sort_by_key(|r| r.construction_index);
        records.dedup_by(|a, b| Arc::ptr_eq(a, b));
        records
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        s.push_str("=== Container Debug ===\n");
        for record in self.cached_records() {
            s.push_str(&format!("#{} ", record.construction_index));
            s.push_str(&record.trace());
        }
        s
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("cached", &self.inner.cache.read().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl ResolverCore for Container {
    fn resolve_record(&self, ty: &TypeRef, contracts: &[String]) -> DiResult<Arc<ServiceRecord>> {
        self.ensure_live()?;
        Ok(engine::resolve(self, ty, Request::shared(contracts)))
    }

    fn create_record(
        &self,
        ty: &TypeRef,
        arguments: Option<Arguments>,
        contracts: &[String],
    ) -> DiResult<Arc<ServiceRecord>> {
        self.ensure_live()?;
        Ok(engine::resolve(self, ty, Request::fresh(arguments, contracts)))
    }

    fn type_ref_of(&self, type_id: TypeId, type_name: &'static str) -> DiResult<TypeRef> {
        self.inner
            .universe
            .name_of_id(type_id)
            .map(|name| TypeRef::named(name.clone()))
            .ok_or(ContainerError::UnknownRustType(type_name))
    }
}

impl Resolver for Container {}
