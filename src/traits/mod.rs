//! Core traits for the service container.

mod dispose;
mod resolver;

pub use dispose::Dispose;
pub use resolver::{Resolver, ResolverCore};
