//! # ferrous-resolve
//!
//! A runtime service resolution engine: types are described once in a registration
//! table, and the container builds object graphs from it, scoped by contracts.
//!
//! ## Features
//!
//! - **Contract scoping**: resolve a service under an ordered chain of named contracts;
//!   services that never consult a contract collapse onto the contract-less instance
//! - **Contract unions**: one contract standing for several, resolved as parallel graphs
//! - **Generic closing**: open generic definitions are closed from their
//!   implementations, dependencies or constraints
//! - **Construction traces**: every request yields a record tree, rendered as an
//!   indented trace in error messages
//! - **Thread-safe**: per-service slots with blocking hand-off, thread-local cycle
//!   detection
//! - **Deferred construction**: factories, lazy services, delegates and nested factory
//!   methods as constructor parameters
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_resolve::{Constructor, Parameter, Resolver, ServiceCollection, TypeDef, TypeRef};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_type(TypeDef::concrete("Database").with_type::<Database>().constructor(
//!     Constructor::new(vec![Parameter::service("url", TypeRef::named("String"))], |args| {
//!         Ok(Database { connection_string: args.value::<String>("url")? })
//!     }),
//! ));
//! services.add_type(TypeDef::concrete("UserService").with_type::<UserService>().constructor(
//!     Constructor::new(vec![Parameter::service("db", TypeRef::named("Database"))], |args| {
//!         Ok(UserService { db: args.get::<Database>("db")? })
//!     }),
//! ));
//! services.parameters(ferrous_resolve::MapParameters::new().with("url", "postgres://localhost"));
//!
//! let container = services.build();
//! let users = container.get::<UserService>().unwrap();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Failures
//!
//! Resolution never panics on a missing dependency. The error carries the trace of
//! the request, with the failing node marked:
//!
//! ```rust
//! use ferrous_resolve::{Constructor, Parameter, Resolver, ServiceCollection, TypeDef, TypeRef};
//!
//! let mut services = ServiceCollection::new();
//! services.add_type(TypeDef::concrete("A").constructor(Constructor::new(
//!     vec![Parameter::service("b", TypeRef::named("B"))],
//!     |_| Ok(()),
//! )));
//! services.add_type(TypeDef::concrete("B").constructor(Constructor::new(
//!     vec![Parameter::service("p", TypeRef::named("i32"))],
//!     |_| Ok(()),
//! )));
//!
//! let container = services.build();
//! let error = container.get_service(&TypeRef::named("A")).unwrap_err();
//! assert_eq!(error.trace(), Some("A\n\tB\n\t\t!p <---------------\n"));
//! assert!(error.to_string().contains("parameter not configured"));
//! ```

pub mod collection;
pub mod config;
pub mod configuration;
pub mod contracts;
pub mod descriptors;
pub mod error;
pub mod factories;
pub mod generics;
pub mod key;
pub mod lifetime;
pub mod record;
pub mod trace;
pub mod traits;

mod container;
mod internal;
mod registration;

pub use collection::{ServiceCollection, ServiceCollectionExt, ServiceCollectionModuleExt, ServiceModule};
pub use config::{ConfigValue, ContainerSettings, EnvironmentParameters, MapParameters, ParameterSource};
pub use configuration::{
    ConfigurationBuilder, ConfigurationLookup, ConfigurationRegistry, ConfigurationSource,
    ContractConfiguration, DependencyKey, LayeredConfiguration, ServiceConfiguration,
};
pub use container::{
    Container, InstantiationStrategy, ResolverContext, ServiceBuilderHandle, WeakContainer,
};
pub use contracts::{ContractError, ContractStack};
pub use descriptors::{
    AnyArc, Arguments, ConstructArgs, Constructor, GenericParam, ParamShape, Parameter, TypeDef,
    TypeKind, TypeRef,
};
pub use error::{BoxError, ContainerError, DiResult, DisposeFailure, SharedError};
pub use factories::{
    ConstructorDelegate, FactoryMethodDelegate, LazyService, MapResources, Resource,
    ResourceProvider, ServiceFactory, ServiceList, TypeFactory,
};
pub use generics::GenericCloser;
pub use key::ServiceName;
pub use lifetime::Lifestyle;
pub use record::{
    DependencyKind, ServiceDependency, ServiceError, ServiceInstance, ServiceRecord, ServiceStatus,
};
pub use registration::{TypeUniverse, CONTAINER_TYPE};
pub use trace::{render_record, DiagnosticWriter, TextTraceWriter};
pub use traits::{Dispose, Resolver, ResolverCore};
