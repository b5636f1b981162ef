//! Closed-form inference for open generic definitions, memoized per definition.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::RwLock;
use tracing::debug;

use super::unify::unify;
use crate::descriptors::{TypeDef, TypeKind, TypeRef};
use crate::registration::TypeUniverse;

/// Derived closures nested deeper than this are dropped, so recursive generics terminate.
pub(crate) const MAX_CLOSURE_DEPTH: usize = 8;

/// Memoized closed forms per open generic definition.
///
/// Inference runs over a node table with explicit work queues: marking walks from
/// the requested definition to everything its closures are derived from, deducing
/// propagates closures breadth-first along referer edges until nothing changes.
#[derive(Default)]
pub struct GenericCloser {
    cache: RwLock<HashMap<Arc<str>, Arc<Vec<TypeRef>>, RandomState>>,
}

impl GenericCloser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed forms usable for `def`, in discovery order.
    pub fn close(&self, universe: &TypeUniverse, def: &TypeDef) -> Arc<Vec<TypeRef>> {
        if let Some(found) = self.cache.read().get(def.name()) {
            return found.clone();
        }

        let mut inference = Inference::new(universe);
        let root = inference.node(&def.name);
        inference.mark_all();
        inference.deduce_all();

        let mut cache = self.cache.write();
        for node in &inference.nodes {
            cache
                .entry(node.name.clone())
                .or_insert_with(|| Arc::new(node.closures.clone()));
        }
        let result = cache
            .get(def.name())
            .cloned()
            .unwrap_or_else(|| Arc::new(inference.nodes[root].closures.clone()));
        debug!(definition = def.name(), closures = ?result, "closed generic definition");
        result
    }

    /// Closed forms of the generic `implementor` whose `form` equals `requested`.
    ///
    /// Unification binds whatever `requested` pins down; positions it leaves open are
    /// taken from the inferred closures of `implementor`.
    pub(crate) fn close_for(
        &self,
        universe: &TypeUniverse,
        implementor: &TypeDef,
        form: &TypeRef,
        requested: &TypeRef,
    ) -> Vec<TypeRef> {
        let mut bindings = vec![None; implementor.arity()];
        if !unify(form, requested, &mut bindings) {
            return Vec::new();
        }
        if let Some(args) = bindings.iter().cloned().collect::<Option<Vec<_>>>() {
            return vec![implementor.definition_ref().substitute(&args)];
        }
        self.close(universe, implementor)
            .iter()
            .filter(|closed| form.substitute(closed.args()) == *requested)
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for GenericCloser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericCloser")
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

enum Referer {
    /// `target`'s constructor consumes `pattern`, an open form of this node.
    Dependency { target: usize, pattern: TypeRef },
    /// This node implements `target` as `form`, over this node's own parameters.
    Implementation { target: usize, form: TypeRef },
}

struct Node {
    name: Arc<str>,
    closures: Vec<TypeRef>,
    partials: Vec<Vec<Option<TypeRef>>>,
    referers: Vec<Referer>,
}

struct Inference<'u> {
    universe: &'u TypeUniverse,
    nodes: Vec<Node>,
    index: HashMap<Arc<str>, usize, RandomState>,
    to_mark: VecDeque<usize>,
    to_deduce: VecDeque<(usize, TypeRef)>,
}

impl<'u> Inference<'u> {
    fn new(universe: &'u TypeUniverse) -> Self {
        Self {
            universe,
            nodes: Vec::new(),
            index: HashMap::default(),
            to_mark: VecDeque::new(),
            to_deduce: VecDeque::new(),
        }
    }

    fn node(&mut self, name: &Arc<str>) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(Node {
            name: name.clone(),
            closures: Vec::new(),
            partials: Vec::new(),
            referers: Vec::new(),
        });
        self.index.insert(name.clone(), i);
        self.to_mark.push_back(i);
        i
    }

    fn mark_all(&mut self) {
        while let Some(i) = self.to_mark.pop_front() {
            let universe = self.universe;
            let Some(def) = universe.get(&self.nodes[i].name) else { continue };
            match def.kind {
                TypeKind::Abstract => self.mark_abstract(i, def),
                TypeKind::Concrete if def.is_generic_definition() => self.mark_concrete(i, def),
                _ => {}
            }
        }
    }

    fn mark_abstract(&mut self, i: usize, def: &'u TypeDef) {
        let universe = self.universe;
        for implementor in universe.implementors_of(def.name()) {
            for (form, _) in universe.implementation_forms(implementor, def.name()) {
                if implementor.is_generic_definition() {
                    let source = self.node(&implementor.name);
                    self.nodes[source].referers.push(Referer::Implementation { target: i, form });
                } else if !form.is_open() {
                    self.add_closure(i, form);
                }
            }
        }
    }

    fn mark_concrete(&mut self, i: usize, def: &'u TypeDef) {
        let universe = self.universe;
        let mut linked = false;
        if let Ok(constructor) = def.select_constructor() {
            for param in &constructor.params {
                let Some(pattern) = param.shape.target() else { continue };
                if !pattern.is_generic() || !pattern.is_open() {
                    continue;
                }
                let Some(dependency) = universe.get_ref(pattern) else { continue };
                let source = self.node(&dependency.name);
                self.nodes[source]
                    .referers
                    .push(Referer::Dependency { target: i, pattern: pattern.clone() });
                linked = true;
            }
        }
        if !linked {
            for closed in self.close_by_constraints(def) {
                self.add_closure(i, closed);
            }
        }
    }

    /// Product of every parameter's constraint-satisfying types, minus combinations a
    /// non-generic subtype already provides.
    fn close_by_constraints(&self, def: &TypeDef) -> Vec<TypeRef> {
        let universe = self.universe;
        let mut per_param: Vec<Vec<TypeRef>> = Vec::new();
        for param in &def.generic_params {
            if param.constraints.is_empty() {
                return Vec::new();
            }
            let mut candidates: Option<Vec<TypeRef>> = None;
            for constraint in param.constraints.iter().filter(|c| !c.is_open()) {
                let satisfying: Vec<TypeRef> = universe
                    .iter()
                    .filter(|d| d.kind == TypeKind::Concrete && !d.is_generic_definition())
                    .filter(|d| universe.is_visible(d))
                    .map(|d| TypeRef::named(d.name.clone()))
                    .filter(|t| universe.is_assignable(t, constraint))
                    .collect();
                candidates = Some(match candidates {
                    None => satisfying,
                    Some(previous) => previous.into_iter().filter(|t| satisfying.contains(t)).collect(),
                });
            }
            let mut candidates = candidates.unwrap_or_default();
            if param.default_constructor {
                candidates.retain(|t| universe.get_ref(t).is_some_and(TypeDef::has_default_constructor));
            }
            if candidates.is_empty() {
                return Vec::new();
            }
            per_param.push(candidates);
        }

        let overridden: Vec<TypeRef> = universe
            .iter()
            .filter(|d| d.kind == TypeKind::Concrete && !d.is_generic_definition())
            .flat_map(|d| universe.implementation_forms(d, def.name()))
            .map(|(form, _)| form)
            .collect();

        let mut combos: Vec<Vec<TypeRef>> = vec![Vec::new()];
        for candidates in &per_param {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    candidates.iter().map(move |c| {
                        let mut next = prefix.clone();
                        next.push(c.clone());
                        next
                    })
                })
                .collect();
        }
        combos
            .into_iter()
            .map(|args| def.definition_ref().substitute(&args))
            .filter(|closed| !overridden.contains(closed))
            .collect()
    }

    fn add_closure(&mut self, i: usize, closed: TypeRef) {
        if closed.depth() > MAX_CLOSURE_DEPTH {
            debug!(closure = %closed, "dropped closure nested too deep");
            return;
        }
        if self.nodes[i].closures.contains(&closed) {
            return;
        }
        self.nodes[i].closures.push(closed.clone());
        self.to_deduce.push_back((i, closed));
    }

    fn deduce_all(&mut self) {
        while let Some((i, closed)) = self.to_deduce.pop_front() {
            let derived: Vec<(usize, Derived)> = self.nodes[i]
                .referers
                .iter()
                .filter_map(|referer| match referer {
                    Referer::Implementation { target, form } => {
                        let lifted = form.substitute(closed.args());
                        (!lifted.is_open()).then_some((*target, Derived::Closed(lifted)))
                    }
                    Referer::Dependency { target, pattern } => {
                        let arity = self
                            .universe
                            .get(&self.nodes[*target].name)
                            .map_or(0, TypeDef::arity);
                        let mut bindings = vec![None; arity];
                        unify(pattern, &closed, &mut bindings)
                            .then_some((*target, Derived::Partial(bindings)))
                    }
                })
                .collect();
            for (target, derived) in derived {
                match derived {
                    Derived::Closed(ty) => self.add_closure(target, ty),
                    Derived::Partial(bindings) => self.add_partial(target, bindings),
                }
            }
        }
    }

    fn add_partial(&mut self, i: usize, bindings: Vec<Option<TypeRef>>) {
        if bindings.iter().all(Option::is_some) {
            self.complete(i, bindings.into_iter().flatten().collect());
            return;
        }
        let mut fresh = vec![bindings.clone()];
        for existing in &self.nodes[i].partials {
            if let Some(merged) = merge(&bindings, existing) {
                fresh.push(merged);
            }
        }
        for partial in fresh {
            if partial.iter().all(Option::is_some) {
                self.complete(i, partial.into_iter().flatten().collect());
            } else if !self.nodes[i].partials.contains(&partial) {
                self.nodes[i].partials.push(partial);
            }
        }
    }

    fn complete(&mut self, i: usize, args: Vec<TypeRef>) {
        let universe = self.universe;
        let Some(def) = universe.get(&self.nodes[i].name) else { return };
        let satisfied = def.generic_params.iter().zip(&args).all(|(param, arg)| {
            param
                .constraints
                .iter()
                .all(|c| universe.is_assignable(arg, &c.substitute(&args)))
                && (!param.default_constructor
                    || universe.get_ref(arg).is_some_and(TypeDef::has_default_constructor))
        });
        if satisfied {
            self.add_closure(i, def.definition_ref().substitute(&args));
        }
    }
}

enum Derived {
    Closed(TypeRef),
    Partial(Vec<Option<TypeRef>>),
}

fn merge(a: &[Option<TypeRef>], b: &[Option<TypeRef>]) -> Option<Vec<Option<TypeRef>>> {
    a.iter()
        .zip(b)
        .map(|pair| match pair {
            (Some(x), Some(y)) if x != y => Err(()),
            (Some(x), _) | (None, Some(x)) => Ok(Some(x.clone())),
            (None, None) => Ok(None),
        })
        .collect::<Result<Vec<_>, ()>>()
        .ok()
}
