//! Ordered instantiation strategies; the first one that applies builds the service.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::builder::ServiceBuilder;
use super::engine::{resolve, Request};
use super::parameters;
use super::resolver::ResolverContext;
use super::Container;
use crate::descriptors::{AnyArc, CastFn, ConstructArgs, TypeKind, TypeRef};
use crate::error::SharedError;
use crate::internal::panic_message;
use crate::lifetime::Lifestyle;
use crate::record::ServiceDependency;
use crate::registration::CONTAINER_TYPE;

/// One way of producing a service.
///
/// Returns `true` when the strategy handled the builder, successfully or not.
pub trait InstantiationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_instantiate(&self, container: &Container, builder: &mut ServiceBuilderHandle<'_>) -> bool;
}

/// The part of an in-progress service a strategy may touch.
pub struct ServiceBuilderHandle<'a>(pub(crate) &'a mut ServiceBuilder);

impl ServiceBuilderHandle<'_> {
    pub fn service_type(&self) -> &TypeRef {
        self.0.ty()
    }

    pub fn contracts(&self) -> &[String] {
        self.0.declared.contracts()
    }

    /// Whether the caller asked for a fresh, uncached instance.
    pub fn is_create_new(&self) -> bool {
        self.0.create_new
    }

    pub fn add_instance(&mut self, value: AnyArc, owned: bool) {
        self.0.add_instance(value, owned);
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.0.set_error(message.into());
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.0.set_comment(comment.into());
    }
}

pub(crate) fn default_strategies() -> Vec<Box<dyn InstantiationStrategy>> {
    vec![
        Box::new(SimpleTypeStrategy),
        Box::new(ContainerSelfStrategy),
        Box::new(ConfiguredInstanceStrategy),
        Box::new(ConfiguredFactoryStrategy),
        Box::new(OpenGenericStrategy),
        Box::new(PerRequestStrategy),
        Box::new(AbstractStrategy),
        Box::new(ConstructorStrategy),
    ]
}

struct SimpleTypeStrategy;

impl InstantiationStrategy for SimpleTypeStrategy {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn try_instantiate(&self, container: &Container, builder: &mut ServiceBuilderHandle<'_>) -> bool {
        let builder = &mut *builder.0;
        let simple = container
            .universe()
            .get_ref(builder.ty())
            .is_some_and(|def| def.kind == TypeKind::Simple);
        let configured = builder
            .configuration
            .as_ref()
            .is_some_and(|c| c.instance.is_some() || c.factory.is_some());
        if !simple || configured {
            return false;
        }
        builder.set_error(format!("can't create simple type [{}]", builder.ty()));
        true
    }
}

struct ContainerSelfStrategy;

impl InstantiationStrategy for ContainerSelfStrategy {
    fn name(&self) -> &'static str {
        "container"
    }

    fn try_instantiate(&self, container: &Container, builder: &mut ServiceBuilderHandle<'_>) -> bool {
        let builder = &mut *builder.0;
        if builder.ty().name() != Some(CONTAINER_TYPE) {
            return false;
        }
        builder.add_instance(Arc::new(container.clone()), false);
        true
    }
}

struct ConfiguredInstanceStrategy;

impl InstantiationStrategy for ConfiguredInstanceStrategy {
    fn name(&self) -> &'static str {
        "instance"
    }

    fn try_instantiate(&self, _container: &Container, builder: &mut ServiceBuilderHandle<'_>) -> bool {
        let builder = &mut *builder.0;
        let Some(instance) = builder.configuration.as_ref().and_then(|c| c.instance.clone()) else {
            return false;
        };
        builder.add_instance(instance.value, instance.owned);
        true
    }
}

struct ConfiguredFactoryStrategy;

impl InstantiationStrategy for ConfiguredFactoryStrategy {
    fn name(&self) -> &'static str {
        "factory"
    }

    fn try_instantiate(&self, container: &Container, builder: &mut ServiceBuilderHandle<'_>) -> bool {
        let builder = &mut *builder.0;
        let Some(factory) = builder.configuration.as_ref().and_then(|c| c.factory.clone()) else {
            return false;
        };
        let context = ResolverContext::new(container);
        match panic::catch_unwind(AssertUnwindSafe(|| factory(&context))) {
            Ok(Ok(value)) => builder.add_instance(value, true),
            Ok(Err(error)) => {
                let message = format!("factory for [{}] failed: {}", builder.declared, error);
                builder.set_error_with_source(message, SharedError::new(error));
            }
            Err(payload) => {
                let message = format!(
                    "factory for [{}] panicked: {}",
                    builder.declared,
                    panic_message(payload.as_ref())
                );
                builder.set_error(message);
            }
        }
        true
    }
}

struct OpenGenericStrategy;

impl InstantiationStrategy for OpenGenericStrategy {
    fn name(&self) -> &'static str {
        "open-generic"
    }

    fn try_instantiate(&self, container: &Container, builder: &mut ServiceBuilderHandle<'_>) -> bool {
        let builder = &mut *builder.0;
        let ty = builder.ty();
        let arity_mismatch = container
            .universe()
            .get_ref(ty)
            .is_some_and(|def| def.arity() != ty.args().len());
        if !ty.is_open() && !arity_mismatch {
            return false;
        }
        builder.set_error(format!("can't create open generic [{}]", ty));
        true
    }
}

struct PerRequestStrategy;

impl InstantiationStrategy for PerRequestStrategy {
    fn name(&self) -> &'static str {
        "per-request"
    }

    fn try_instantiate(&self, container: &Container, builder: &mut ServiceBuilderHandle<'_>) -> bool {
        let builder = &mut *builder.0;
        let per_request = container
            .universe()
            .get_ref(builder.ty())
            .is_some_and(|def| def.lifestyle == Lifestyle::PerRequest);
        if !per_request || builder.create_new {
            return false;
        }
        builder.set_error(format!(
            "service [{}] is per-request; inject a factory or call create",
            builder.ty()
        ));
        true
    }
}

struct AbstractStrategy;

impl AbstractStrategy {
    /// Implementations of `requested` with the cast into its representation.
    fn candidates(
        container: &Container,
        builder: &mut ServiceBuilder,
        requested: &TypeRef,
    ) -> Vec<(TypeRef, Option<CastFn>)> {
        let universe = container.universe();
        let closer = &container.inner.closer;
        let Some(target) = requested.name() else { return Vec::new() };
        let mut out: Vec<(TypeRef, Option<CastFn>)> = Vec::new();
        let mut push = |ty: TypeRef, cast: Option<CastFn>| {
            if !out.iter().any(|(t, _)| *t == ty) {
                out.push((ty, cast));
            }
        };

        let configured = builder
            .configuration
            .as_ref()
            .and_then(|c| c.implementations.clone());
        if let Some(implementations) = configured {
            for implementation in implementations {
                let cast = universe.get_ref(&implementation).and_then(|def| {
                    universe
                        .implementation_forms(def, target)
                        .into_iter()
                        .find(|(form, _)| form.substitute(implementation.args()) == *requested)
                        .and_then(|(_, cast)| cast)
                });
                push(implementation, cast);
            }
            return out;
        }

        for implementor in universe.implementors_of(target) {
            for (form, cast) in universe.implementation_forms(implementor, target) {
                if !implementor.is_generic_definition() {
                    if form == *requested {
                        push(TypeRef::named(implementor.name.clone()), cast);
                    }
                    continue;
                }
                let closed = closer.close_for(universe, implementor, &form, requested);
                if closed.is_empty() {
                    builder.add_dependency(
                        ServiceDependency::missing(implementor.definition_ref().to_string(), None)
                            .with_comment("can't create open generic"),
                    );
                }
                for ty in closed {
                    push(ty, cast.clone());
                }
            }
        }
        out
    }
}

impl InstantiationStrategy for AbstractStrategy {
    fn name(&self) -> &'static str {
        "abstract"
    }

    fn try_instantiate(&self, container: &Container, builder: &mut ServiceBuilderHandle<'_>) -> bool {
        let builder = &mut *builder.0;
        let requested = builder.ty().clone();
        let is_abstract = container
            .universe()
            .get_ref(&requested)
            .is_some_and(|def| def.kind == TypeKind::Abstract);
        let has_list = builder
            .configuration
            .as_ref()
            .is_some_and(|c| c.implementations.is_some());
        if !is_abstract && !has_list {
            return false;
        }

        let arguments = builder.arguments();
        builder.mark_arguments_used();
        for (implementation, cast) in Self::candidates(container, builder, &requested) {
            let request = Request {
                create_new: builder.create_new,
                arguments: arguments.clone(),
                contracts: &[],
            };
            let child = resolve(container, &implementation, request);
            builder.link_to(child, cast.as_ref());
        }
        true
    }
}

struct ConstructorStrategy;

impl InstantiationStrategy for ConstructorStrategy {
    fn name(&self) -> &'static str {
        "constructor"
    }

    fn try_instantiate(&self, container: &Container, builder: &mut ServiceBuilderHandle<'_>) -> bool {
        let builder = &mut *builder.0;
        let universe = container.universe();
        let ty = builder.ty().clone();
        let Some(def) = universe.get_ref(&ty) else {
            builder.set_error(format!("type [{}] is not registered", ty));
            return true;
        };
        let constructor = match def.select_constructor() {
            Ok(constructor) => constructor,
            Err(message) => {
                builder.set_error(message);
                return true;
            }
        };

        let values = parameters::bind_all(container, builder, def, &constructor.params);
        let unused = builder.unused_arguments();
        if !unused.is_empty() {
            let message = format!(
                "unused arguments [{}] for service [{}]",
                unused.join(", "),
                builder.declared
            );
            builder.set_error(message);
            return true;
        }
        let Some(values) = values.filter(|_| !builder.is_bad()) else {
            return true;
        };

        let args = ConstructArgs::new(&ty, values);
        match panic::catch_unwind(AssertUnwindSafe(|| (constructor.invoke)(&args))) {
            Ok(Ok(value)) => builder.add_instance(value, true),
            Ok(Err(error)) => {
                let message = format!("construction of [{}] failed: {}", builder.declared, error);
                builder.set_error_with_source(message, SharedError::new(error));
            }
            Err(payload) => {
                let message = format!(
                    "construction of [{}] panicked: {}",
                    builder.declared,
                    panic_message(payload.as_ref())
                );
                builder.set_error(message);
            }
        }
        true
    }
}
