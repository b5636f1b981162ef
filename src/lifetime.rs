//! Service lifestyle definitions.

/// How instances of a type may be shared.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::Lifestyle;
///
/// assert_eq!(Lifestyle::default(), Lifestyle::Shared);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifestyle {
    /// One instance per (type, consumed contracts) for the container's lifetime.
    #[default]
    Shared,
    /// A fresh instance per request.
    ///
    /// Such types can only be produced through `create` or a deferred factory;
    /// resolving them as a shared service is rejected.
    PerRequest,
}
