//! Catalog of contributed coercion rules.

use std::any::TypeId;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::rule::{ApplyError, ApplyFn, CoercionRule};
use crate::types::{EnumSupport, TypeKey, TypeModel};
use crate::value::{AnyValue, DynValue};

/// The full set of atomic conversion rules, indexed by source type.
///
/// Built once from host contributions, frozen when handed to the
/// engine. Lookups never mutate the catalog: the two String↔enum rules
/// that cannot be statically enumerated are synthesized fresh on every
/// lookup and appended to a copy of the indexed list, so the catalog
/// holds no references to enum types it was never told about.
pub struct Catalog {
    model: Arc<TypeModel>,
    rules: IndexMap<TypeId, Vec<Arc<CoercionRule>>>,
    count: usize,
}

impl Catalog {
    /// Create an empty catalog over the given type model.
    pub fn new(model: TypeModel) -> Self {
        Self {
            model: Arc::new(model),
            rules: IndexMap::new(),
            count: 0,
        }
    }

    /// Contribute a rule. Contribution order is preserved and is part
    /// of the search tie-break.
    pub fn add(&mut self, rule: CoercionRule) -> &mut Self {
        self.rules
            .entry(rule.source().id())
            .or_default()
            .push(Arc::new(rule));
        self.count += 1;
        self
    }

    /// Contribute a batch of rules in order.
    pub fn add_all(&mut self, rules: impl IntoIterator<Item = CoercionRule>) -> &mut Self {
        for rule in rules {
            self.add(rule);
        }
        self
    }

    /// The type model this catalog was built over.
    pub fn model(&self) -> &TypeModel {
        &self.model
    }

    pub(crate) fn model_arc(&self) -> Arc<TypeModel> {
        self.model.clone()
    }

    /// All rules whose source type is exactly `source`, in contribution
    /// order, with synthetic String↔enum rules appended when `source`
    /// and `target` call for them.
    pub fn rules_for(&self, source: TypeKey, target: TypeKey) -> Vec<Arc<CoercionRule>> {
        let mut out = self
            .rules
            .get(&source.id())
            .cloned()
            .unwrap_or_default();

        if source.id() == TypeId::of::<String>() {
            if let Some(support) = self.model.enum_support(target) {
                out.push(Arc::new(string_to_enum(support)));
            }
        }
        if target.id() == TypeId::of::<String>() {
            if let Some(support) = self.model.enum_support(source) {
                out.push(Arc::new(enum_to_string(support)));
            }
        }

        out
    }

    /// Iterate every contributed rule.
    pub fn iter(&self) -> impl Iterator<Item = &CoercionRule> {
        self.rules.values().flatten().map(|r| r.as_ref())
    }

    /// Number of contributed rules.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// One rule per line, for "unknown coercion" diagnostics.
    pub(crate) fn summary(&self) -> String {
        if self.is_empty() {
            return "  (no coercions contributed)".to_string();
        }
        let mut lines: Vec<String> = self
            .iter()
            .map(|r| format!("  {}", r.description()))
            .collect();
        lines.sort();
        lines.join("\n")
    }
}

/// Synthesize `String --> E` for a registered enum: parse a variant by
/// name, case-sensitive.
fn string_to_enum(support: &EnumSupport) -> CoercionRule {
    let target = support.key;
    let variants = support.variants;
    let parse = support.parse.clone();
    let expected = TypeKey::of::<String>();
    let apply: ApplyFn = Arc::new(move |value: &dyn AnyValue| {
        let s = value
            .as_any()
            .downcast_ref::<String>()
            .ok_or(ApplyError::InputMismatch {
                expected,
                got: value.value_type(),
            })?;
        parse(s).ok_or_else(|| ApplyError::NoSuchVariant {
            value: s.clone(),
            enum_type: target,
            expected: variants,
        })
    });
    CoercionRule::from_parts(expected, target, apply)
}

/// Synthesize `E --> String` for a registered enum: the variant's name.
fn enum_to_string(support: &EnumSupport) -> CoercionRule {
    let source = support.key;
    let name_of = support.name_of.clone();
    let apply: ApplyFn = Arc::new(move |value: &dyn AnyValue| {
        let name = name_of(value).ok_or(ApplyError::InputMismatch {
            expected: source,
            got: value.value_type(),
        })?;
        Ok(Box::new(name.to_string()) as DynValue)
    });
    CoercionRule::from_parts(source, TypeKey::of::<String>(), apply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Enumerated;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Color {
        Red,
        Green,
    }

    impl Enumerated for Color {
        fn variant_names() -> &'static [&'static str] {
            &["RED", "GREEN"]
        }

        fn from_variant_name(name: &str) -> Option<Self> {
            match name {
                "RED" => Some(Color::Red),
                "GREEN" => Some(Color::Green),
                _ => None,
            }
        }

        fn variant_name(&self) -> &'static str {
            match self {
                Color::Red => "RED",
                Color::Green => "GREEN",
            }
        }
    }

    fn make_catalog() -> Catalog {
        let mut model = TypeModel::new();
        model.register_enum::<Color>();

        let mut catalog = Catalog::new(model);
        catalog
            .add(CoercionRule::new(|s: &String| {
                s.parse::<i64>().map_err(ApplyError::other)
            }))
            .add(CoercionRule::infallible(|v: &i64| *v as f64));
        catalog
    }

    #[test]
    fn test_rules_for_exact_source() {
        let catalog = make_catalog();

        let rules = catalog.rules_for(TypeKey::of::<i64>(), TypeKey::of::<f64>());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].description(), "i64 --> f64");

        let rules = catalog.rules_for(TypeKey::of::<bool>(), TypeKey::of::<f64>());
        assert!(rules.is_empty());
    }

    #[test]
    fn test_string_to_enum_spliced() {
        let catalog = make_catalog();

        let rules = catalog.rules_for(TypeKey::of::<String>(), TypeKey::of::<Color>());
        assert_eq!(rules.len(), 2);
        let synthetic = rules.last().unwrap();
        assert_eq!(synthetic.target(), TypeKey::of::<Color>());

        let out = synthetic.apply(&"GREEN".to_string()).unwrap();
        assert_eq!(*out.into_any().downcast::<Color>().unwrap(), Color::Green);
    }

    #[test]
    fn test_string_to_enum_is_case_sensitive() {
        let catalog = make_catalog();

        let rules = catalog.rules_for(TypeKey::of::<String>(), TypeKey::of::<Color>());
        let synthetic = rules.last().unwrap();

        let err = synthetic.apply(&"red".to_string()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"red\""), "message was: {msg}");
        assert!(msg.contains("RED, GREEN"), "message was: {msg}");
    }

    #[test]
    fn test_enum_to_string_spliced() {
        let catalog = make_catalog();

        let rules = catalog.rules_for(TypeKey::of::<Color>(), TypeKey::of::<String>());
        assert_eq!(rules.len(), 1);

        let out = rules[0].apply(&Color::Red).unwrap();
        assert_eq!(*out.into_any().downcast::<String>().unwrap(), "RED");
    }

    #[test]
    fn test_synthetic_rules_not_retained() {
        let catalog = make_catalog();

        // Splicing happens per lookup; the contributed count is stable.
        let before = catalog.len();
        let _ = catalog.rules_for(TypeKey::of::<String>(), TypeKey::of::<Color>());
        let _ = catalog.rules_for(TypeKey::of::<Color>(), TypeKey::of::<String>());
        assert_eq!(catalog.len(), before);
    }

    #[test]
    fn test_summary_lists_rules() {
        let catalog = make_catalog();
        let summary = catalog.summary();
        assert!(summary.contains("String --> i64"));
        assert!(summary.contains("i64 --> f64"));

        let empty = Catalog::new(TypeModel::new());
        assert!(empty.summary().contains("no coercions"));
    }
}
