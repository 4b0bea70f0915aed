//! The binding environment.
//!
//! Insertion-ordered so that star projections expand deterministically.
//! `WITH` and `RETURN` replace the whole scope with their projected names;
//! `MATCH` and `UNWIND` extend it.

use std::collections::HashMap;

use super::ast::EntityKind;

#[derive(Debug, Clone)]
pub struct Binding<'a> {
    pub kind: EntityKind,
    /// False for the fresh names given to anonymous pattern positions.
    pub user_named: bool,
    /// Fragment of the binding site, for secondary spans in conflicts.
    pub fragment: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct Scope<'a> {
    entries: Vec<(String, Binding<'a>)>,
    index: HashMap<String, usize>,
}

impl<'a> Scope<'a> {
    pub fn new() -> Self {
        Scope::default()
    }

    pub fn get(&self, name: &str) -> Option<&Binding<'a>> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn bind(&mut self, name: &str, binding: Binding<'a>) {
        match self.index.get(name) {
            Some(&i) => self.entries[i].1 = binding,
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), binding));
            }
        }
    }

    /// User-named node and relationship variables in binding order, the
    /// expansion set for `RETURN *` / `WITH *`.
    pub fn entity_variables(&self) -> Vec<(&str, EntityKind)> {
        self.entries
            .iter()
            .filter(|(_, b)| {
                b.user_named
                    && matches!(b.kind, EntityKind::Node | EntityKind::Relationship)
            })
            .map(|(name, b)| (name.as_str(), b.kind))
            .collect()
    }

    /// Replace the environment with projected names, the WITH barrier.
    pub fn replace(&mut self, bindings: Vec<(String, Binding<'a>)>) {
        self.entries.clear();
        self.index.clear();
        for (name, binding) in bindings {
            self.bind(&name, binding);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node<'a>() -> Binding<'a> {
        Binding {
            kind: EntityKind::Node,
            user_named: true,
            fragment: None,
        }
    }

    #[test]
    fn binding_order_is_preserved() {
        let mut scope = Scope::new();
        scope.bind("b", node());
        scope.bind("a", node());
        let names: Vec<_> = scope.entity_variables().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn anonymous_variables_are_not_star_expanded() {
        let mut scope = Scope::new();
        scope.bind("u", node());
        scope.bind(
            "_anon0",
            Binding {
                kind: EntityKind::Node,
                user_named: false,
                fragment: None,
            },
        );
        scope.bind(
            "x",
            Binding {
                kind: EntityKind::Scalar,
                user_named: true,
                fragment: None,
            },
        );
        let names: Vec<_> = scope.entity_variables().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["u"]);
    }

    #[test]
    fn replace_clears_previous_bindings() {
        let mut scope = Scope::new();
        scope.bind("u", node());
        scope.replace(vec![(
            "name".to_string(),
            Binding {
                kind: EntityKind::Scalar,
                user_named: true,
                fragment: None,
            },
        )]);
        assert!(scope.get("u").is_none());
        assert!(scope.get("name").is_some());
    }
}
