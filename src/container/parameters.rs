//! Binding of constructor and member parameters.
//!
//! Each parameter is bound by the first rung that applies: call-time argument,
//! external parameter source, per-dependency configuration, nested resolution of its
//! shape, resource stream, default value, optional "no value", and finally an error.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::builder::ServiceBuilder;
use super::context;
use super::engine::{resolve, DeferredScope, Request};
use super::resolver::ResolverContext;
use super::Container;
use crate::configuration::DependencyConfiguration;
use crate::descriptors::{AnyArc, ParamShape, Parameter, TypeDef, TypeKind, TypeRef};
use crate::error::SharedError;
use crate::factories::{
    ConstructorDelegate, FactoryMethodDelegate, LazyService, Resource, ServiceFactory,
    ServiceList, TypeFactory,
};
use crate::internal::panic_message;
use crate::record::{ServiceDependency, ServiceError, ServiceRecord};
use crate::registration::CONTAINER_TYPE;

enum Binding {
    Value(Option<AnyArc>),
    /// Nothing applied at this rung; try the next one.
    Unbound,
    Failed,
}

/// Binds every parameter, recording one edge per parameter on `builder`.
///
/// Returns `None` when any parameter failed; all parameters are still visited so
/// the trace shows every problem.
pub(crate) fn bind_all(
    container: &Container,
    builder: &mut ServiceBuilder,
    def: &TypeDef,
    params: &[Parameter],
) -> Option<Vec<(String, Option<AnyArc>)>> {
    let mut values = Vec::with_capacity(params.len());
    let mut failed = false;
    for param in params {
        match bind_parameter(container, builder, def, param) {
            Binding::Value(value) => values.push((param.name.clone(), value)),
            Binding::Unbound | Binding::Failed => failed = true,
        }
    }
    (!failed).then_some(values)
}

fn bind_parameter(
    container: &Container,
    builder: &mut ServiceBuilder,
    def: &TypeDef,
    param: &Parameter,
) -> Binding {
    if let Some((value, display)) = builder.take_argument(&param.name) {
        builder.add_dependency(ServiceDependency::constant(&param.name, display).with_comment("argument"));
        return Binding::Value(Some(value));
    }

    let mut shape = close_shape(&param.shape, builder.ty().args());
    let simple = is_simple(container, &shape);
    if let Some(ty) = &simple {
        match from_parameter_sources(container, builder, def, param, ty) {
            Binding::Unbound => {}
            bound => return bound,
        }
    }

    let dependency = builder
        .configuration
        .clone()
        .and_then(|c| c.dependency_for(&param.name, shape.target()).cloned());
    if let Some(dependency) = dependency {
        match from_dependency(container, builder, param, &dependency) {
            Binding::Unbound => {}
            bound => return bound,
        }
        if let Some(implementation) = dependency.implementation {
            shape = retarget(shape, implementation);
        }
    }

    if simple.is_none() {
        match from_shape(container, builder, param, &shape) {
            Binding::Unbound => {}
            bound => return bound,
        }
    }

    if let Some(default) = &param.default {
        builder.add_dependency(
            ServiceDependency::constant(&param.name, default.display.clone()).with_comment("default"),
        );
        return Binding::Value(Some(default.value.clone()));
    }
    if param.optional {
        builder.add_dependency(ServiceDependency::missing(&param.name, None).with_comment("optional"));
        return Binding::Value(None);
    }
    let message = format!(
        "parameter not configured: [{}] of service [{}]",
        param.name, builder.declared
    );
    builder.add_dependency(ServiceDependency::missing(&param.name, Some(ServiceError::new(message))));
    Binding::Failed
}

/// The simple type behind a plain service parameter, if it is one.
fn is_simple(container: &Container, shape: &ParamShape) -> Option<TypeRef> {
    match shape {
        ParamShape::Service(ty) => container
            .universe()
            .get_ref(ty)
            .filter(|def| def.kind == TypeKind::Simple)
            .map(|_| ty.clone()),
        _ => None,
    }
}

/// Substitutes the type arguments of the service being built into a parameter's
/// open target.
fn close_shape(shape: &ParamShape, args: &[TypeRef]) -> ParamShape {
    match shape.target() {
        Some(target) if !args.is_empty() && target.is_open() => {
            retarget(shape.clone(), target.substitute(args))
        }
        _ => shape.clone(),
    }
}

fn from_parameter_sources(
    container: &Container,
    builder: &mut ServiceBuilder,
    def: &TypeDef,
    param: &Parameter,
    ty: &TypeRef,
) -> Binding {
    let qualified = format!("{}.{}", def.name, param.name);
    let keys = [qualified.as_str(), param.name.as_str()];
    let found = container
        .inner
        .parameters
        .iter()
        .find_map(|source| keys.iter().find_map(|key| source.get(key).map(|v| (*key, v))));
    let Some((key, value)) = found else {
        return Binding::Unbound;
    };
    let type_name = ty.name().unwrap_or_default();
    match value.to_simple(type_name) {
        Ok(converted) => {
            builder.add_dependency(
                ServiceDependency::constant(&param.name, value.to_string())
                    .with_comment(format!("parameter {}", key)),
            );
            Binding::Value(Some(converted))
        }
        Err(message) => {
            let message = format!("parameter [{}] of service [{}]: {}", key, builder.declared, message);
            builder.add_dependency(ServiceDependency::missing(&param.name, Some(ServiceError::new(message))));
            Binding::Failed
        }
    }
}

fn from_dependency(
    container: &Container,
    builder: &mut ServiceBuilder,
    param: &Parameter,
    dependency: &DependencyConfiguration,
) -> Binding {
    if let Some((value, display)) = &dependency.value {
        builder.add_dependency(ServiceDependency::constant(&param.name, display.clone()).with_comment("configured"));
        return Binding::Value(Some(value.clone()));
    }
    let Some(factory) = dependency.factory.clone() else {
        return Binding::Unbound;
    };
    let context = ResolverContext::new(container);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| factory(&context)));
    // Resolutions made by the factory were attached to this builder's late edges.
    match outcome {
        Ok(Ok(value)) => {
            builder.add_dependency(
                ServiceDependency::constant(&param.name, "<factory>").with_comment("configured factory"),
            );
            Binding::Value(Some(value))
        }
        Ok(Err(error)) => {
            let message = format!("dependency factory [{}] of [{}] failed: {}", param.name, builder.declared, error);
            let error = ServiceError::with_source(message, SharedError::new(error));
            builder.add_dependency(ServiceDependency::missing(&param.name, Some(error)));
            Binding::Failed
        }
        Err(payload) => {
            let message = format!(
                "dependency factory [{}] of [{}] panicked: {}",
                param.name,
                builder.declared,
                panic_message(payload.as_ref())
            );
            builder.add_dependency(ServiceDependency::missing(&param.name, Some(ServiceError::new(message))));
            Binding::Failed
        }
    }
}

fn retarget(shape: ParamShape, implementation: TypeRef) -> ParamShape {
    match shape {
        ParamShape::Service(_) => ParamShape::Service(implementation),
        ParamShape::All(_) => ParamShape::All(implementation),
        ParamShape::Factory(_) => ParamShape::Factory(implementation),
        ParamShape::Lazy(_) => ParamShape::Lazy(implementation),
        ParamShape::FactoryMethod(_) => ParamShape::FactoryMethod(implementation),
        ParamShape::Delegate { names, .. } => ParamShape::Delegate { target: implementation, names },
        other => other,
    }
}

fn deferred_scope(builder: &ServiceBuilder, param: &Parameter) -> DeferredScope {
    DeferredScope {
        ambient: context::current_contracts(),
        contracts: param.contracts.clone(),
        declaring: builder.id,
    }
}

fn from_shape(
    container: &Container,
    builder: &mut ServiceBuilder,
    param: &Parameter,
    shape: &ParamShape,
) -> Binding {
    let weak = container.downgrade();
    match shape {
        ParamShape::Service(ty) if ty.name() == Some(CONTAINER_TYPE) => {
            // Edges must not keep the container alive through its own cache.
            builder.add_dependency(ServiceDependency::constant(&param.name, CONTAINER_TYPE));
            Binding::Value(Some(Arc::new(container.clone())))
        }
        ParamShape::Service(ty) => {
            let record = resolve(container, ty, Request::shared(&param.contracts));
            single_instance(builder, param, ty, record)
        }
        ParamShape::All(ty) => {
            let record = resolve(container, ty, Request::shared(&param.contracts));
            let values: Vec<AnyArc> = record.instances().iter().map(|i| i.value().clone()).collect();
            let bad = record.status().is_bad();
            builder.add_dependency(ServiceDependency::service(&param.name, record));
            if bad {
                return Binding::Failed;
            }
            Binding::Value(Some(Arc::new(ServiceList::new(ty.clone(), values))))
        }
        ParamShape::Factory(ty) => {
            let factory = ServiceFactory::new(weak, ty.clone(), deferred_scope(builder, param));
            deferred_edge(builder, param, format!("factory {}", ty));
            Binding::Value(Some(Arc::new(factory)))
        }
        ParamShape::TypeFactory => {
            let factory = TypeFactory::new(weak, deferred_scope(builder, param));
            deferred_edge(builder, param, "type factory".to_string());
            Binding::Value(Some(Arc::new(factory)))
        }
        ParamShape::Lazy(ty) => {
            let lazy = LazyService::new(weak, ty.clone(), deferred_scope(builder, param));
            deferred_edge(builder, param, format!("lazy {}", ty));
            Binding::Value(Some(Arc::new(lazy)))
        }
        ParamShape::Delegate { target, names } => {
            let factory = ServiceFactory::new(weak, target.clone(), deferred_scope(builder, param));
            deferred_edge(builder, param, format!("delegate {}", target));
            Binding::Value(Some(Arc::new(ConstructorDelegate::new(factory, names.clone()))))
        }
        ParamShape::FactoryMethod(ty) => factory_method(container, builder, param, ty),
        ParamShape::Resource(name) => {
            let Some(data) = container.inner.resources.as_ref().and_then(|r| r.open(name)) else {
                return Binding::Unbound;
            };
            builder.add_dependency(ServiceDependency::resource(&param.name, name.clone()));
            Binding::Value(Some(Arc::new(Resource::new(name.clone(), data))))
        }
    }
}

fn deferred_edge(builder: &mut ServiceBuilder, param: &Parameter, display: String) {
    builder.add_dependency(ServiceDependency::constant(&param.name, display));
}

fn single_instance(
    builder: &mut ServiceBuilder,
    param: &Parameter,
    ty: &TypeRef,
    record: Arc<ServiceRecord>,
) -> Binding {
    if record.status().is_bad() {
        builder.add_dependency(ServiceDependency::service(&param.name, record));
        return Binding::Failed;
    }
    let count = record.instances().len();
    if count == 1 {
        let value = record.instances()[0].value().clone();
        builder.add_dependency(ServiceDependency::service(&param.name, record));
        return Binding::Value(Some(value));
    }
    if count == 0 && param.default.is_some() {
        return Binding::Unbound;
    }
    if count == 0 && param.optional {
        builder.add_dependency(ServiceDependency::service(&param.name, record).with_comment("optional"));
        return Binding::Value(None);
    }
    let quantity = if count == 0 { "no" } else { "many" };
    let message = format!(
        "{} instances for [{}], parameter [{}] of service [{}]",
        quantity, ty, param.name, builder.declared
    );
    builder.add_dependency(ServiceDependency::service(&param.name, record).with_error(ServiceError::new(message)));
    Binding::Failed
}

fn factory_method(
    container: &Container,
    builder: &mut ServiceBuilder,
    param: &Parameter,
    ty: &TypeRef,
) -> Binding {
    let method = container
        .universe()
        .get_ref(ty)
        .and_then(|def| def.factory_method.clone());
    let Some(method) = method else {
        let message = format!("type [{}] declares no factory method", ty);
        builder.add_dependency(ServiceDependency::missing(&param.name, Some(ServiceError::new(message))));
        return Binding::Failed;
    };
    let record = resolve(container, &method.provider, Request::shared(&param.contracts));
    if record.status().is_bad() {
        builder.add_dependency(ServiceDependency::service(&param.name, record));
        return Binding::Failed;
    }
    if record.instances().len() != 1 {
        let message = format!("factory method of [{}] needs exactly one [{}]", ty, method.provider);
        builder.add_dependency(ServiceDependency::service(&param.name, record).with_error(ServiceError::new(message)));
        return Binding::Failed;
    }
    let provider = record.instances()[0].value().clone();
    builder.add_dependency(ServiceDependency::service(&param.name, record));
    Binding::Value(Some(Arc::new(FactoryMethodDelegate::new(ty.clone(), provider, method.invoke))))
}
