//! The coercion engine: search over the catalog, with a per-target
//! cache in front of it.
//!
//! Given a value and a requested target type, the engine finds a
//! conversion as a path through the catalog graph, composing multiple
//! rules when no direct one exists. The search is breadth-first with a
//! FIFO queue, so the first discovered path is also a shortest one;
//! among equally short paths, enqueue order (ancestry declaration
//! order, then rule contribution order) decides, deterministically.

use std::any::TypeId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::CoerceError;
use crate::rule::{ApplyFn, CoercionRule, compose};
use crate::types::{TypeKey, TypeModel};
use crate::value::{DynValue, Null};

/// A resolved conversion from one type to another, reusable across
/// values. Obtained from [`TypeCoercer::get_coercion`] or handed out of
/// the engine's cache.
#[derive(Clone)]
pub struct Coercion {
    source: TypeKey,
    target: TypeKey,
    description: Arc<str>,
    kind: Kind,
}

#[derive(Clone)]
enum Kind {
    /// The value already satisfies the target type.
    Identity,
    Apply(ApplyFn),
}

impl Coercion {
    fn identity(ty: TypeKey) -> Self {
        Self {
            source: ty,
            target: ty,
            description: Arc::from(""),
            kind: Kind::Identity,
        }
    }

    fn from_apply(
        source: TypeKey,
        target: TypeKey,
        description: impl AsRef<str>,
        apply: ApplyFn,
    ) -> Self {
        Self {
            source,
            target,
            description: Arc::from(description.as_ref()),
            kind: Kind::Apply(apply),
        }
    }

    fn from_rule(source: TypeKey, rule: &CoercionRule) -> Self {
        Self::from_apply(source, rule.target(), rule.description(), rule.apply_fn())
    }

    pub fn source(&self) -> TypeKey {
        self.source
    }

    pub fn target(&self) -> TypeKey {
        self.target
    }

    /// The path this coercion follows, e.g.
    /// `"String --> i64, i64 --> i32"`. Empty when no conversion is
    /// needed.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Apply the conversion. Identity coercions return the value
    /// unchanged, same box.
    pub fn apply(&self, value: DynValue) -> Result<DynValue, CoerceError> {
        match &self.kind {
            Kind::Identity => Ok(value),
            Kind::Apply(f) => f(value.as_ref()).map_err(|cause| CoerceError::ApplyFailed {
                value: format!("{:?}", value),
                target: self.target,
                path: self.description.to_string(),
                cause,
            }),
        }
    }
}

impl fmt::Debug for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coercion")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("path", &self.description)
            .finish()
    }
}

/// A path under consideration during search: the composed conversion
/// from the original source type to `target` so far.
struct Candidate {
    target: TypeKey,
    apply: ApplyFn,
    description: String,
}

/// Cache bucket for one target type. The inner map is keyed by source
/// type and is lock-free; entries are independent and idempotent to
/// recompute, so a duplicated search on a true race is harmless.
struct TargetCache {
    entries: DashMap<TypeId, Coercion>,
}

impl TargetCache {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

/// The type coercion engine.
///
/// Construction freezes the catalog; rules cannot be contributed
/// afterward. The engine is `Sync` and meant to be shared across
/// request threads behind an `Arc`.
pub struct TypeCoercer {
    catalog: Catalog,
    model: Arc<TypeModel>,
    cache: RwLock<HashMap<TypeId, Arc<TargetCache>>>,
}

impl TypeCoercer {
    /// Build the engine over a frozen catalog.
    pub fn new(catalog: Catalog) -> Self {
        let model = catalog.model_arc();
        Self {
            catalog,
            model,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The catalog this engine searches.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Coerce a value to `T`.
    ///
    /// `Ok(None)` means the null pass-through: the input was the
    /// [`Null`] sentinel and no rule maps it to `T`.
    pub fn coerce<T: 'static>(&self, value: DynValue) -> Result<Option<T>, CoerceError> {
        let requested = TypeKey::of::<T>();
        let out = self.coerce_dyn(value, requested)?;
        if out.as_any().is::<Null>() {
            return Ok(None);
        }
        let produced = out.value_type();
        match out.into_any().downcast::<T>() {
            Ok(v) => Ok(Some(*v)),
            Err(_) => Err(CoerceError::TargetMismatch {
                requested,
                produced,
            }),
        }
    }

    /// Coerce a value to a target known only at runtime. The result may
    /// be a boxed [`Null`] (the null pass-through).
    pub fn coerce_dyn(&self, value: DynValue, target: TypeKey) -> Result<DynValue, CoerceError> {
        let effective = self.model.effective(target);
        if value.as_any().type_id() == effective.id() {
            // Already the right type: a true no-op, not a coercion.
            return Ok(value);
        }
        let source = value.value_type();
        if let Some(up) = self.model.upcast(source, effective) {
            return Coercion::from_apply(source, effective, "", up).apply(value);
        }
        self.lookup(source, effective)?.apply(value)
    }

    /// The conversion `coerce` would use for this type pair, without
    /// applying it. Useful for callers converting many values of the
    /// same type.
    pub fn get_coercion(&self, source: TypeKey, target: TypeKey) -> Result<Coercion, CoerceError> {
        let effective = self.model.effective(target);
        if source == effective {
            return Ok(Coercion::identity(source));
        }
        if let Some(up) = self.model.upcast(source, effective) {
            return Ok(Coercion::from_apply(source, effective, "", up));
        }
        self.lookup(source, effective)
    }

    /// Describe the path a coercion between these types would take,
    /// e.g. `"Object --> String, String --> i64"`. Empty string when no
    /// coercion is needed. Resolves (and caches) exactly as `coerce`
    /// would.
    pub fn explain(&self, source: TypeKey, target: TypeKey) -> Result<String, CoerceError> {
        Ok(self.get_coercion(source, target)?.description().to_string())
    }

    /// Drop every cached conversion, keeping the bucket structure.
    /// Safe to call while other threads are coercing; they recompute
    /// on their next lookup.
    pub fn clear_cache(&self) {
        let buckets = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for bucket in buckets.values() {
            bucket.entries.clear();
        }
        debug!("coercion cache cleared");
    }

    /// Cache lookup, falling back to the search. Failed searches are
    /// not cached; a later identical request searches again.
    fn lookup(&self, source: TypeKey, target: TypeKey) -> Result<Coercion, CoerceError> {
        let bucket = self.bucket_for(target);
        if let Some(hit) = bucket.entries.get(&source.id()) {
            return Ok(hit.clone());
        }
        let resolved = self.resolve(source, target)?;
        bucket.entries.insert(source.id(), resolved.clone());
        Ok(resolved)
    }

    /// Get or create the bucket for a target type. Readers are the
    /// common case; the write lock is taken only for first-time bucket
    /// creation, double-checking after the upgrade because another
    /// thread may have raced ahead.
    fn bucket_for(&self, target: TypeKey) -> Arc<TargetCache> {
        {
            let buckets = self
                .cache
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(bucket) = buckets.get(&target.id()) {
                return bucket.clone();
            }
        }
        let mut buckets = self
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        buckets
            .entry(target.id())
            .or_insert_with(|| Arc::new(TargetCache::new()))
            .clone()
    }

    /// Search the catalog graph for a conversion from `source` to
    /// `target`, composing rules when no direct one exists.
    fn resolve(&self, source: TypeKey, target: TypeKey) -> Result<Coercion, CoerceError> {
        if source.id() == TypeId::of::<Null>() {
            return Ok(self.null_coercion(target));
        }

        // An exact-match rule is the cheapest possible answer.
        for rule in self.catalog.rules_for(source, target) {
            if rule.source() == source && rule.target() == target {
                debug!(source = %source, target = %target, "resolved by exact rule");
                return Ok(Coercion::from_rule(source, &rule));
            }
        }

        let mut queue: VecDeque<Candidate> = VecDeque::new();
        let mut considered: HashSet<(TypeId, TypeId)> = HashSet::new();
        self.seed(source, target, &mut queue, &mut considered);

        while let Some(candidate) = queue.pop_front() {
            // 1. Done if the candidate lands on (or upcasts into) the target.
            if candidate.target == target {
                debug!(source = %source, target = %target, path = %candidate.description, "coercion resolved");
                return Ok(Coercion::from_apply(
                    source,
                    target,
                    &candidate.description,
                    candidate.apply,
                ));
            }
            if let Some(up) = self.model.upcast(candidate.target, target) {
                debug!(source = %source, target = %target, path = %candidate.description, "coercion resolved");
                return Ok(Coercion::from_apply(
                    source,
                    target,
                    &candidate.description,
                    compose(candidate.apply, up),
                ));
            }

            // 2. Otherwise treat the candidate's target as an
            // intermediate type and extend the path by one rule.
            for (ancestor, up) in self.lineage(candidate.target) {
                for rule in self.catalog.rules_for(ancestor, target) {
                    if considered.contains(&rule.key()) {
                        continue;
                    }
                    // Never step back toward the source type.
                    if self.model.is_assignable(rule.target(), source) {
                        continue;
                    }
                    considered.insert(rule.key());
                    let step = match &up {
                        None => rule.apply_fn(),
                        Some(u) => compose(u.clone(), rule.apply_fn()),
                    };
                    queue.push_back(Candidate {
                        target: rule.target(),
                        apply: compose(candidate.apply.clone(), step),
                        description: format!("{}, {}", candidate.description, rule.description()),
                    });
                }
            }
        }

        Err(CoerceError::NoRule {
            source,
            target,
            available: self.catalog.summary(),
        })
    }

    /// Seed the queue with every rule applicable to the source type or
    /// one of its ancestors, nearest first. The order here is the
    /// shortest-path guarantee: rules for closer ancestors enter the
    /// FIFO queue earlier.
    fn seed(
        &self,
        source: TypeKey,
        target: TypeKey,
        queue: &mut VecDeque<Candidate>,
        considered: &mut HashSet<(TypeId, TypeId)>,
    ) {
        for (ancestor, up) in self.lineage(source) {
            for rule in self.catalog.rules_for(ancestor, target) {
                if !considered.insert(rule.key()) {
                    continue;
                }
                let apply = match &up {
                    None => rule.apply_fn(),
                    Some(u) => compose(u.clone(), rule.apply_fn()),
                };
                queue.push_back(Candidate {
                    target: rule.target(),
                    apply,
                    description: rule.description().to_string(),
                });
            }
        }
    }

    /// A type and its ancestors, self first. Upcasts for ancestors are
    /// composed from the type itself.
    fn lineage(&self, ty: TypeKey) -> Vec<(TypeKey, Option<ApplyFn>)> {
        let mut out = vec![(ty, None)];
        out.extend(
            self.model
                .ancestry(ty)
                .into_iter()
                .map(|(key, up)| (key, Some(up))),
        );
        out
    }

    /// Conversion from the null sentinel: exact-target rules only, no
    /// hierarchy walk, no compounding. Unmapped targets pass the
    /// absence through; this is never an error.
    fn null_coercion(&self, target: TypeKey) -> Coercion {
        let null = TypeKey::of::<Null>();
        for rule in self.catalog.rules_for(null, target) {
            if rule.target() == target {
                return Coercion::from_rule(null, &rule);
            }
        }
        Coercion::from_apply(
            null,
            target,
            format!("null --> {}", target),
            Arc::new(|_| Ok(Box::new(Null) as DynValue)),
        )
    }
}
