//! The type universe: every [`TypeDef`] the container knows, with its inheritance index.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;

use crate::descriptors::{CastFn, TypeDef, TypeKind, TypeRef};

/// Name under which the container itself is resolvable.
pub const CONTAINER_TYPE: &str = "Container";

/// Bound on the supertype closure of one definition; guards malformed cyclic hierarchies.
const MAX_SUPERTYPE_FORMS: usize = 256;

macro_rules! simple_types {
    ($universe:ident; $($ty:ty => $name:literal),* $(,)?) => {
        $( $universe.insert(TypeDef::simple($name).with_type::<$ty>()); )*
    };
}

/// Registered types in declaration order.
pub struct TypeUniverse {
    defs: HashMap<Arc<str>, TypeDef, RandomState>,
    order: Vec<Arc<str>>,
    by_type_id: HashMap<TypeId, Arc<str>, RandomState>,
    /// Supertype name -> concrete implementors, transitive, declaration order.
    inheritors: HashMap<Arc<str>, Vec<Arc<str>>, RandomState>,
    module_prefixes: Vec<String>,
}

impl TypeUniverse {
    pub(crate) fn new() -> Self {
        let mut universe = Self {
            defs: HashMap::default(),
            order: Vec::new(),
            by_type_id: HashMap::default(),
            inheritors: HashMap::default(),
            module_prefixes: Vec::new(),
        };
        simple_types!(universe;
            bool => "bool", char => "char",
            i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64", i128 => "i128", isize => "isize",
            u8 => "u8", u16 => "u16", u32 => "u32", u64 => "u64", u128 => "u128", usize => "usize",
            f32 => "f32", f64 => "f64", String => "String",
        );
        universe.insert(TypeDef::concrete(CONTAINER_TYPE).with_type::<crate::Container>());
        universe
    }

    /// Adds or replaces a definition; a replacement keeps the original position.
    pub(crate) fn insert(&mut self, def: TypeDef) {
        let name = def.name.clone();
        if let Some(id) = def.type_id {
            self.by_type_id.insert(id, name.clone());
        }
        if self.defs.insert(name.clone(), def).is_none() {
            self.order.push(name);
        }
    }

    pub(crate) fn set_module_prefixes(&mut self, prefixes: Vec<String>) {
        self.module_prefixes = prefixes;
    }

    /// Builds the transitive inheritor index.
    pub(crate) fn finalize(&mut self) {
        let mut inheritors: HashMap<Arc<str>, Vec<Arc<str>>, RandomState> = HashMap::default();
        for name in &self.order {
            let Some(def) = self.defs.get(name) else { continue };
            if def.kind != TypeKind::Concrete {
                continue;
            }
            for (form, _) in self.supertype_closure(def) {
                if let Some(super_name) = form.name() {
                    let list = inheritors.entry(Arc::from(super_name)).or_default();
                    if !list.contains(name) {
                        list.push(name.clone());
                    }
                }
            }
        }
        self.inheritors = inheritors;
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.defs.get(name)
    }

    pub fn get_ref(&self, ty: &TypeRef) -> Option<&TypeDef> {
        ty.name().and_then(|name| self.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub(crate) fn name_of_id(&self, id: TypeId) -> Option<&Arc<str>> {
        self.by_type_id.get(&id)
    }

    #[cfg(test)]
    fn name_of<T: 'static>(&self) -> Option<&Arc<str>> {
        self.name_of_id(TypeId::of::<T>())
    }

    /// Definitions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDef> {
        self.order.iter().filter_map(move |name| self.defs.get(name))
    }

    pub(crate) fn is_visible(&self, def: &TypeDef) -> bool {
        self.module_prefixes.is_empty()
            || self.module_prefixes.iter().any(|p| def.module.starts_with(p.as_str()))
    }

    /// Concrete implementors of `name` passing the module filter, in declaration order.
    pub fn implementors_of(&self, name: &str) -> Vec<&TypeDef> {
        self.inheritors
            .get(name)
            .map(|list| {
                list.iter()
                    .filter_map(|n| self.defs.get(n))
                    .filter(|def| self.is_visible(def))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every supertype form of `def`, expressed over `def`'s own parameters.
    ///
    /// Only a directly declared supertype carries its cast.
    pub(crate) fn supertype_closure(&self, def: &TypeDef) -> Vec<(TypeRef, Option<CastFn>)> {
        let mut out: Vec<(TypeRef, Option<CastFn>)> = Vec::new();
        let mut frontier: Vec<TypeRef> = Vec::new();
        for s in &def.supertypes {
            if !out.iter().any(|(f, _)| *f == s.form) {
                out.push((s.form.clone(), s.cast.clone()));
                frontier.push(s.form.clone());
            }
        }
        while let Some(form) = frontier.pop() {
            if out.len() > MAX_SUPERTYPE_FORMS {
                break;
            }
            let Some(parent) = self.get_ref(&form) else { continue };
            for s in &parent.supertypes {
                let lifted = s.form.substitute(form.args());
                if !out.iter().any(|(f, _)| *f == lifted) {
                    out.push((lifted.clone(), None));
                    frontier.push(lifted);
                }
            }
        }
        out
    }

    /// Supertype forms of `def` whose definition is `target`.
    pub(crate) fn implementation_forms(
        &self,
        def: &TypeDef,
        target: &str,
    ) -> Vec<(TypeRef, Option<CastFn>)> {
        self.supertype_closure(def)
            .into_iter()
            .filter(|(form, _)| form.name() == Some(target))
            .collect()
    }

    /// Whether a value of closed type `ty` can be used where `target` is expected.
    pub fn is_assignable(&self, ty: &TypeRef, target: &TypeRef) -> bool {
        if ty == target {
            return true;
        }
        let Some(def) = self.get_ref(ty) else { return false };
        self.supertype_closure(def)
            .iter()
            .any(|(form, _)| form.substitute(ty.args()) == *target)
    }
}

impl std::fmt::Debug for TypeUniverse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeUniverse")
            .field("types", &self.order)
            .field("module_prefixes", &self.module_prefixes)
            .finish()
    }
}
