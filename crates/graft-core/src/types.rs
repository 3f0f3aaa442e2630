//! Runtime type metadata: keys, assignability, and normalization.
//!
//! Rust carries no inheritance or enum introspection at runtime, so the
//! engine is handed an explicit `TypeModel` describing the relationships
//! it should honor: which types upcast to which (and how), which
//! requested types normalize to a canonical type, and which types are
//! enumerations with named variants.

use std::any::{Any, TypeId, type_name};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::rule::{ApplyError, ApplyFn, compose};
use crate::value::{AnyValue, DynValue};

/// Identifier for a runtime type: its `TypeId` plus its name for
/// diagnostics. Equality and hashing consider only the id.
#[derive(Clone, Copy, Debug)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// The key of a concrete type.
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The underlying `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The full type name, module path included.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&short_name(self.name))
    }
}

impl std::error::Error for TypeKey {}

/// Strip module paths from a type name, inside generic arguments too:
/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
pub(crate) fn short_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for ch in full.chars() {
        match ch {
            ':' => segment.clear(),
            c if c.is_alphanumeric() || c == '_' => segment.push(c),
            c => {
                out.push_str(&segment);
                segment.clear();
                out.push(c);
            }
        }
    }
    out.push_str(&segment);
    out
}

/// A type with named variants, eligible for synthesized String
/// conversions in both directions.
pub trait Enumerated: Sized {
    /// All variant names, in declaration order.
    fn variant_names() -> &'static [&'static str];

    /// Parse a variant by name. Case-sensitive.
    fn from_variant_name(name: &str) -> Option<Self>;

    /// The name of this variant.
    fn variant_name(&self) -> &'static str;
}

/// Enum introspection, erased for storage in the model.
pub(crate) struct EnumSupport {
    pub(crate) key: TypeKey,
    pub(crate) variants: &'static [&'static str],
    pub(crate) parse: Arc<dyn Fn(&str) -> Option<DynValue> + Send + Sync>,
    pub(crate) name_of: Arc<dyn Fn(&dyn AnyValue) -> Option<&'static str> + Send + Sync>,
}

/// Host-declared type relationships.
///
/// Built once before the catalog is frozen, read-only afterward. The
/// declaration order of upcasts is significant: it is the order the
/// search walks a type's ancestry, and therefore part of the tie-break
/// between equally short coercion paths.
#[derive(Default)]
pub struct TypeModel {
    supers: IndexMap<TypeId, Vec<(TypeKey, ApplyFn)>>,
    canonical: IndexMap<TypeId, TypeKey>,
    enums: IndexMap<TypeId, EnumSupport>,
}

impl TypeModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `S` is assignable to `B`, with the conversion Rust
    /// cannot perform implicitly.
    pub fn extends<S, B, F>(&mut self, upcast: F) -> &mut Self
    where
        S: Any + fmt::Debug + Send + Sync,
        B: Any + fmt::Debug + Send + Sync,
        F: Fn(&S) -> B + Send + Sync + 'static,
    {
        let expected = TypeKey::of::<S>();
        let erased: ApplyFn = Arc::new(move |value| {
            let s = value
                .as_any()
                .downcast_ref::<S>()
                .ok_or(ApplyError::InputMismatch {
                    expected,
                    got: value.value_type(),
                })?;
            Ok(Box::new(upcast(s)) as DynValue)
        });
        self.supers
            .entry(TypeId::of::<S>())
            .or_default()
            .push((TypeKey::of::<B>(), erased));
        self
    }

    /// Declare that requests for `Requested` are satisfied by its
    /// canonical form `Canonical`.
    ///
    /// Only the dynamic API honors this: the typed API must downcast
    /// its result, so it requires the requested type to be canonical.
    pub fn normalize<Requested, Canonical>(&mut self) -> &mut Self
    where
        Requested: Any,
        Canonical: Any,
    {
        self.canonical
            .insert(TypeId::of::<Requested>(), TypeKey::of::<Canonical>());
        self
    }

    /// Register an enumeration type for synthesized String conversions.
    pub fn register_enum<E>(&mut self) -> &mut Self
    where
        E: Enumerated + Any + fmt::Debug + Send + Sync,
    {
        let support = EnumSupport {
            key: TypeKey::of::<E>(),
            variants: E::variant_names(),
            parse: Arc::new(|name| {
                E::from_variant_name(name).map(|e| Box::new(e) as DynValue)
            }),
            name_of: Arc::new(|value| {
                value.as_any().downcast_ref::<E>().map(|e| e.variant_name())
            }),
        };
        self.enums.insert(TypeId::of::<E>(), support);
        self
    }

    /// The effective type for a requested target: its canonical form if
    /// one was declared, otherwise the type itself.
    pub fn effective(&self, target: TypeKey) -> TypeKey {
        self.canonical.get(&target.id()).copied().unwrap_or(target)
    }

    /// Whether a value of `from` can stand in where `to` is expected.
    pub fn is_assignable(&self, from: TypeKey, to: TypeKey) -> bool {
        if from == to {
            return true;
        }
        let mut seen: HashSet<TypeId> = HashSet::new();
        let mut frontier: VecDeque<TypeId> = VecDeque::new();
        frontier.push_back(from.id());
        while let Some(id) = frontier.pop_front() {
            for (base, _) in self.supers.get(&id).into_iter().flatten() {
                if *base == to {
                    return true;
                }
                if seen.insert(base.id()) {
                    frontier.push_back(base.id());
                }
            }
        }
        false
    }

    /// All ancestors of `ty`, nearest first, each paired with the
    /// upcast composed from `ty` to that ancestor. `ty` itself is not
    /// included.
    pub(crate) fn ancestry(&self, ty: TypeKey) -> Vec<(TypeKey, ApplyFn)> {
        let mut out: Vec<(TypeKey, ApplyFn)> = Vec::new();
        let mut seen: HashSet<TypeId> = HashSet::new();
        seen.insert(ty.id());
        let mut frontier: VecDeque<(TypeKey, ApplyFn)> = VecDeque::new();
        for (base, up) in self.supers.get(&ty.id()).into_iter().flatten() {
            if seen.insert(base.id()) {
                frontier.push_back((*base, up.clone()));
            }
        }
        while let Some((key, up)) = frontier.pop_front() {
            for (base, next) in self.supers.get(&key.id()).into_iter().flatten() {
                if seen.insert(base.id()) {
                    frontier.push_back((*base, compose(up.clone(), next.clone())));
                }
            }
            out.push((key, up));
        }
        out
    }

    /// The composed upcast from `from` to `to`, if `to` is a declared
    /// ancestor of `from`.
    pub(crate) fn upcast(&self, from: TypeKey, to: TypeKey) -> Option<ApplyFn> {
        self.ancestry(from)
            .into_iter()
            .find(|(key, _)| *key == to)
            .map(|(_, up)| up)
    }

    pub(crate) fn enum_support(&self, ty: TypeKey) -> Option<&EnumSupport> {
        self.enums.get(&ty.id())
    }

    /// Whether `ty` was registered as an enumeration.
    pub fn is_enum(&self, ty: TypeKey) -> bool {
        self.enums.contains_key(&ty.id())
    }
}
