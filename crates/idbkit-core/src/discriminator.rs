//! Type discriminator policy
//!
//! A store may hold records of several logical types side by side. Each
//! result type states, statically, which discriminator value identifies it;
//! the store states which field carries that value. Together they resolve to
//! the `(name, value)` filter the batch walk applies.

use serde_json::Value;

/// A resolved discriminator filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminator {
    /// Record field holding the type name.
    pub name: String,
    /// Value (or value prefix, when hierarchical) the field must carry.
    pub value: String,
    /// Match records whose field starts with `value` rather than equals it.
    pub hierarchical: bool,
}

impl Discriminator {
    pub fn exact(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            hierarchical: false,
        }
    }

    pub fn prefix(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            hierarchical: true,
        }
    }

    /// Whether a raw record belongs to this type.
    ///
    /// Records without the field, or with a non-string value there, never match.
    pub fn matches(&self, record: &Value) -> bool {
        match record.get(&self.name).and_then(Value::as_str) {
            Some(field) if self.hierarchical => field.starts_with(&self.value),
            Some(field) => field == self.value,
            None => false,
        }
    }
}

/// How a store marks the type of each record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DiscriminatorScheme {
    /// Every record is visible to every result type.
    #[default]
    None,
    /// `name` carries the type; `hierarchical` enables prefix matching.
    Field { name: String, hierarchical: bool },
}

impl DiscriminatorScheme {
    pub fn field(name: impl Into<String>) -> Self {
        DiscriminatorScheme::Field {
            name: name.into(),
            hierarchical: false,
        }
    }

    pub fn hierarchical(name: impl Into<String>) -> Self {
        DiscriminatorScheme::Field {
            name: name.into(),
            hierarchical: true,
        }
    }

    /// Resolve the filter for `T` under this scheme.
    ///
    /// `None` when the store has no scheme or `T` declares no value; the walk
    /// then returns every record and decoding unrelated shapes is the caller's
    /// problem.
    pub fn resolve<T: TypeDiscriminator + ?Sized>(&self) -> Option<Discriminator> {
        self.resolve_value(T::discriminator_value())
    }

    pub fn resolve_value(&self, value: Option<&str>) -> Option<Discriminator> {
        match (self, value) {
            (
                DiscriminatorScheme::Field { name, hierarchical },
                Some(value),
            ) => Some(Discriminator {
                name: name.clone(),
                value: value.to_string(),
                hierarchical: *hierarchical,
            }),
            _ => None,
        }
    }
}

/// Implemented by result types that share a store with other types.
///
/// The default is "no discriminator", which is right for single-type stores
/// and for `serde_json::Value`.
pub trait TypeDiscriminator {
    fn discriminator_value() -> Option<&'static str> {
        None
    }
}

impl TypeDiscriminator for Value {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Dog;
    impl TypeDiscriminator for Dog {
        fn discriminator_value() -> Option<&'static str> {
            Some("Animal.Dog")
        }
    }

    struct Untyped;
    impl TypeDiscriminator for Untyped {}

    #[test]
    fn test_exact_match() {
        let d = Discriminator::exact("kind", "Animal.Dog");
        assert!(d.matches(&json!({"kind": "Animal.Dog"})));
        assert!(!d.matches(&json!({"kind": "Animal.Dog.Puppy"})));
        assert!(!d.matches(&json!({"kind": 3})));
        assert!(!d.matches(&json!({"other": "Animal.Dog"})));
    }

    #[test]
    fn test_prefix_match() {
        let d = Discriminator::prefix("kind", "Animal");
        assert!(d.matches(&json!({"kind": "Animal"})));
        assert!(d.matches(&json!({"kind": "Animal.Cat"})));
        assert!(!d.matches(&json!({"kind": "Plant"})));
    }

    #[test]
    fn test_resolve() {
        assert_eq!(DiscriminatorScheme::None.resolve::<Dog>(), None);
        assert_eq!(DiscriminatorScheme::field("kind").resolve::<Untyped>(), None);
        assert_eq!(
            DiscriminatorScheme::field("kind").resolve::<Dog>(),
            Some(Discriminator::exact("kind", "Animal.Dog"))
        );
        assert_eq!(
            DiscriminatorScheme::hierarchical("kind").resolve::<Dog>(),
            Some(Discriminator::prefix("kind", "Animal.Dog"))
        );
    }
}
