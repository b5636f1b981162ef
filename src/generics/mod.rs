//! Inference of closed forms for open generic definitions.

mod closer;
mod unify;

pub use closer::GenericCloser;
