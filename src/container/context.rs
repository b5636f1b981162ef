//! Thread-local resolution context.
//!
//! Each thread keeps a stack of frames, one per container currently resolving on it.
//! A frame tracks the services under construction (cycle detection), the builders in
//! progress (deferred factories use them to decide whether to stitch into the current
//! record) and the active contract chain. Every mutation is paired with an RAII guard
//! so frames unwind correctly on error or panic.

use std::cell::RefCell;

use crate::contracts::ContractStack;
use crate::key::ServiceName;
use crate::record::ServiceDependency;

thread_local! {
    static FRAMES: RefCell<Vec<ContextFrame>> = const { RefCell::new(Vec::new()) };
}

struct ContextFrame {
    container_id: u64,
    entries: usize,
    constructing: Vec<ServiceName>,
    builders: Vec<BuilderFrame>,
    contracts: ContractStack,
}

struct BuilderFrame {
    id: u64,
    late: Vec<ServiceDependency>,
}

fn with_top<R>(f: impl FnOnce(&mut ContextFrame) -> R) -> Option<R> {
    FRAMES.with(|frames| frames.borrow_mut().last_mut().map(f))
}

/// Enters the context of `container_id`, reusing the top frame when it belongs to the
/// same container and chaining a new frame otherwise.
pub(crate) fn enter(container_id: u64) -> ContextGuard {
    FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        match frames.last_mut() {
            Some(top) if top.container_id == container_id => top.entries += 1,
            _ => frames.push(ContextFrame {
                container_id,
                entries: 1,
                constructing: Vec::new(),
                builders: Vec::new(),
                contracts: ContractStack::new(),
            }),
        }
    });
    ContextGuard { _private: () }
}

pub(crate) struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let _ = FRAMES.try_with(|frames| {
            let mut frames = frames.borrow_mut();
            if let Some(top) = frames.last_mut() {
                top.entries -= 1;
                if top.entries == 0 {
                    frames.pop();
                }
            }
        });
    }
}

/// Whether `name` is being built anywhere in this thread's logical call chain.
pub(crate) fn has_cycle(name: &ServiceName) -> bool {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .iter()
            .any(|frame| frame.constructing.iter().any(|n| n == name))
    })
}

/// Services under construction, outermost first, across all frames.
pub(crate) fn construction_stack() -> Vec<String> {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .iter()
            .flat_map(|frame| frame.constructing.iter().map(ToString::to_string))
            .collect()
    })
}

pub(crate) fn current_contracts() -> Vec<String> {
    with_top(|top| top.contracts.snapshot()).unwrap_or_default()
}

/// Marks a service as under construction until dropped.
pub(crate) struct ConstructionGuard {
    _private: (),
}

impl ConstructionGuard {
    pub(crate) fn begin(name: ServiceName) -> Self {
        with_top(|top| top.constructing.push(name));
        Self { _private: () }
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        let _ = FRAMES.try_with(|frames| {
            if let Some(top) = frames.borrow_mut().last_mut() {
                top.constructing.pop();
            }
        });
    }
}

/// Contracts pushed for the lifetime of the guard.
pub(crate) struct ContractGuard {
    pushed: usize,
}

impl ContractGuard {
    /// Pushes `names`; on a duplicate rolls back and returns the offending name.
    pub(crate) fn push<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        if names.is_empty() {
            return Ok(Self { pushed: 0 });
        }
        let outcome = with_top(|top| {
            let outcome = top.contracts.push(names);
            if outcome.duplicate.is_some() {
                top.contracts.pop_last(outcome.pushed);
            }
            outcome
        });
        match outcome {
            Some(outcome) => match outcome.duplicate {
                Some(duplicate) => Err(duplicate),
                None => Ok(Self { pushed: outcome.pushed }),
            },
            None => Ok(Self { pushed: 0 }),
        }
    }
}

impl Drop for ContractGuard {
    fn drop(&mut self) {
        if self.pushed == 0 {
            return;
        }
        let pushed = self.pushed;
        let _ = FRAMES.try_with(|frames| {
            if let Some(top) = frames.borrow_mut().last_mut() {
                top.contracts.pop_last(pushed);
            }
        });
    }
}

/// Swaps the whole contract chain, restoring the previous one on drop.
pub(crate) struct ReplaceGuard {
    previous: Option<Vec<String>>,
}

impl ReplaceGuard {
    pub(crate) fn new(chain: Vec<String>) -> Self {
        Self { previous: with_top(|top| top.contracts.replace(chain)) }
    }
}

impl Drop for ReplaceGuard {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else { return };
        let _ = FRAMES.try_with(|frames| {
            if let Some(top) = frames.borrow_mut().last_mut() {
                top.contracts.restore(previous);
            }
        });
    }
}

/// Registers an in-progress builder; edges attached to it later are collected by
/// [`BuilderGuard::finish`].
pub(crate) struct BuilderGuard {
    id: u64,
    finished: bool,
}

impl BuilderGuard {
    pub(crate) fn push(id: u64) -> Self {
        with_top(|top| top.builders.push(BuilderFrame { id, late: Vec::new() }));
        Self { id, finished: false }
    }

    pub(crate) fn finish(mut self) -> Vec<ServiceDependency> {
        self.finished = true;
        let id = self.id;
        with_top(|top| {
            if top.builders.last().map(|b| b.id) == Some(id) {
                top.builders.pop().map(|f| f.late)
            } else {
                None
            }
        })
        .flatten()
        .unwrap_or_default()
    }
}

impl Drop for BuilderGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let id = self.id;
        let _ = FRAMES.try_with(|frames| {
            if let Some(top) = frames.borrow_mut().last_mut() {
                if top.builders.last().map(|b| b.id) == Some(id) {
                    top.builders.pop();
                }
            }
        });
    }
}

/// Whether `builder_id` is the innermost builder of `container_id`'s frame on this thread.
pub(crate) fn is_current_builder(container_id: u64, builder_id: u64) -> bool {
    with_top(|top| {
        top.container_id == container_id && top.builders.last().map(|b| b.id) == Some(builder_id)
    })
    .unwrap_or(false)
}

/// Attaches an edge to the innermost builder of the top frame.
pub(crate) fn attach_to_current(dependency: ServiceDependency) -> bool {
    with_top(|top| match top.builders.last_mut() {
        Some(frame) => {
            frame.late.push(dependency);
            true
        }
        None => false,
    })
    .unwrap_or(false)
}
