// src/catalog.rs
//! Category catalog: the canonical, lower-case category names plus the
//! historical aliases that collapse onto them.

use std::collections::{HashMap, HashSet};

use crate::error::CatalogError;

/// Lower-case + trim, the canonical spelling of any name.
pub fn canonical(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Canonical names in the order they were supplied (report order).
    categories: Vec<String>,
    known: HashSet<String>,
    /// alias (canonical spelling) -> canonical category
    aliases: HashMap<String, String>,
}

impl Catalog {
    /// Build a catalog from raw names and `(alias, target)` pairs.
    /// Blank entries are dropped; everything is canonicalized.
    pub fn new<I, S, A>(categories: I, aliases: A) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        A: IntoIterator<Item = (S, S)>,
    {
        let mut ordered = Vec::new();
        let mut known = HashSet::new();
        for raw in categories {
            let name = canonical(raw.as_ref());
            if name.is_empty() {
                continue;
            }
            if !known.insert(name.clone()) {
                return Err(CatalogError::DuplicateCategory(name));
            }
            ordered.push(name);
        }
        if ordered.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut alias_map = HashMap::new();
        for (alias, target) in aliases {
            let alias = canonical(alias.as_ref());
            let target = canonical(target.as_ref());
            if alias.is_empty() {
                continue;
            }
            if known.contains(&alias) {
                return Err(CatalogError::AliasShadowsCategory(alias));
            }
            if !known.contains(&target) {
                return Err(CatalogError::AliasTargetUnknown { alias, target });
            }
            alias_map.insert(alias, target);
        }

        Ok(Self {
            categories: ordered,
            known,
            aliases: alias_map,
        })
    }

    /// Resolve a raw name to its canonical identifier. Total and idempotent:
    /// unknown names come back canonicalized but otherwise untouched.
    pub fn normalize(&self, raw: &str) -> String {
        let name = canonical(raw);
        match self.aliases.get(&name) {
            Some(target) => target.clone(),
            None => name,
        }
    }

    pub fn contains(&self, category: &str) -> bool {
        self.known.contains(category)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        Catalog::new(
            ["France", " Egypt ", "", "Bosnia and Herzegovina"],
            [("Bosnia", "Bosnia and Herzegovina")],
        )
        .unwrap()
    }

    #[test]
    fn names_are_canonicalized_and_blank_dropped() {
        let c = sample();
        assert_eq!(
            c.categories(),
            &["france", "egypt", "bosnia and herzegovina"]
        );
        assert!(c.contains("egypt"));
        assert!(!c.contains("Egypt"));
    }

    #[test]
    fn alias_collapses_to_canonical() {
        let c = sample();
        assert_eq!(c.normalize("Bosnia"), "bosnia and herzegovina");
        assert_eq!(c.normalize("FRANCE"), "france");
        assert_eq!(c.normalize("Atlantis"), "atlantis");
    }

    #[test]
    fn normalize_is_idempotent() {
        let c = sample();
        for raw in ["Bosnia", "bosnia and herzegovina", " France ", "Narnia", ""] {
            let once = c.normalize(raw);
            assert_eq!(c.normalize(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn rejects_ambiguous_catalogs() {
        assert_eq!(
            Catalog::new(["a", "A"], Vec::<(&str, &str)>::new()),
            Err(CatalogError::DuplicateCategory("a".into()))
        );
        assert_eq!(
            Catalog::new(["a", "b"], [("a", "b")]),
            Err(CatalogError::AliasShadowsCategory("a".into()))
        );
        assert!(matches!(
            Catalog::new(["a"], [("x", "y")]),
            Err(CatalogError::AliasTargetUnknown { .. })
        ));
        assert_eq!(
            Catalog::new(["", "  "], Vec::<(&str, &str)>::new()),
            Err(CatalogError::Empty)
        );
    }
}
