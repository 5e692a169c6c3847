//! The identifier table: a hierarchical namespace → type tree.
//!
//! Built once per session by the host (from whatever type metadata it has)
//! and read-only to the interpreter. A node with children and no types is a
//! namespace; a node with types is a type group (multiple entries when the
//! host registers several generic arities under one name).

use ecow::EcoString;
use hashbrown::HashMap;

use crate::host::value::TypeRef;

/// One node of the identifier tree.
#[derive(Debug, Default)]
pub struct SymbolNode {
    name: EcoString,
    children: HashMap<EcoString, SymbolNode>,
    types: Vec<TypeRef>,
}

impl SymbolNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn child(&self, name: &str) -> Option<&SymbolNode> {
        self.children.get(name)
    }

    /// The host types registered directly at this node.
    pub fn types(&self) -> &[TypeRef] {
        &self.types
    }

    pub fn is_namespace(&self) -> bool {
        self.types.is_empty() && !self.children.is_empty()
    }

    /// Child names in deterministic (sorted) order, for suggestion lists.
    pub fn child_names(&self) -> Vec<EcoString> {
        let mut names: Vec<EcoString> = self.children.keys().cloned().collect();
        names.sort();
        names
    }

    fn insert_path(&mut self, path: &[&str], ty: Option<TypeRef>) {
        match path {
            [] => {
                if let Some(ty) = ty {
                    self.types.push(ty);
                }
            }
            [head, rest @ ..] => {
                let child = self
                    .children
                    .entry(EcoString::from(*head))
                    .or_insert_with(|| SymbolNode {
                        name: EcoString::from(*head),
                        ..SymbolNode::default()
                    });
                child.insert_path(rest, ty);
            }
        }
    }
}

/// Read-only identifier table consumed by the parser and suggestion engine.
#[derive(Debug, Default)]
pub struct SymbolTable {
    root: SymbolNode,
}

impl SymbolTable {
    pub fn root(&self) -> &SymbolNode {
        &self.root
    }

    /// Walk a dotted path from the root.
    pub fn lookup(&self, path: &[&str]) -> Option<&SymbolNode> {
        let mut node = &self.root;
        for segment in path {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Resolve a bare identifier: try the root first, then each `using`
    /// namespace prefix. First match wins; `using` order is significant.
    pub fn resolve(&self, name: &str, usings: &[EcoString]) -> Option<&SymbolNode> {
        if let Some(node) = self.root.child(name) {
            return Some(node);
        }
        for prefix in usings {
            let segments: Vec<&str> = prefix.split('.').collect();
            if let Some(ns) = self.lookup(&segments) {
                if let Some(node) = ns.child(name) {
                    return Some(node);
                }
            }
        }
        None
    }

    /// Visible top-level names (root children plus the children of each
    /// `using` namespace), deduplicated and sorted. `cancel` is polled
    /// between namespaces so a background suggestion build can bail out.
    pub fn visible_names(
        &self,
        usings: &[EcoString],
        cancel: impl Fn() -> bool,
    ) -> Vec<EcoString> {
        let mut names: Vec<EcoString> = self.root.child_names();
        for prefix in usings {
            if cancel() {
                break;
            }
            let segments: Vec<&str> = prefix.split('.').collect();
            if let Some(ns) = self.lookup(&segments) {
                names.extend(ns.child_names());
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

/// Builder used by the host to assemble the table before handing it to the
/// engine. The interpreter never mutates the result.
#[derive(Debug, Default)]
pub struct SymbolTableBuilder {
    root: SymbolNode,
}

impl SymbolTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type under a dotted path, e.g. `"Game.Entities.Player"`.
    pub fn add_type(mut self, path: &str, ty: TypeRef) -> Self {
        let segments: Vec<&str> = path.split('.').collect();
        self.root.insert_path(&segments, Some(ty));
        self
    }

    /// Register an empty namespace path (useful so `using` prefixes resolve
    /// even before any type lands under them).
    pub fn add_namespace(mut self, path: &str) -> Self {
        let segments: Vec<&str> = path.split('.').collect();
        self.root.insert_path(&segments, None);
        self
    }

    pub fn build(self) -> SymbolTable {
        SymbolTable { root: self.root }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lookup_walks_namespaces() {
        let table = SymbolTableBuilder::new()
            .add_type("Game.Player", TypeRef(1))
            .add_type("Game.Enemy", TypeRef(2))
            .build();

        let game = table.lookup(&["Game"]).unwrap();
        assert!(game.is_namespace());
        assert_eq!(table.lookup(&["Game", "Player"]).unwrap().types(), &[TypeRef(1)]);
        assert!(table.lookup(&["Game", "Missing"]).is_none());
    }

    #[test]
    fn resolve_honors_using_order() {
        let table = SymbolTableBuilder::new()
            .add_type("A.Thing", TypeRef(1))
            .add_type("B.Thing", TypeRef(2))
            .build();

        let usings = vec![EcoString::from("B"), EcoString::from("A")];
        let node = table.resolve("Thing", &usings).unwrap();
        assert_eq!(node.types(), &[TypeRef(2)]);
    }

    #[test]
    fn visible_names_sorted_and_deduped() {
        let table = SymbolTableBuilder::new()
            .add_type("Zed", TypeRef(1))
            .add_type("NS.Alpha", TypeRef(2))
            .add_type("NS.Zed", TypeRef(3))
            .build();

        let usings = vec![EcoString::from("NS")];
        let names = table.visible_names(&usings, || false);
        assert_eq!(names, vec!["Alpha", "NS", "Zed"]);
    }

    #[test]
    fn cancellation_stops_namespace_scan() {
        let table = SymbolTableBuilder::new()
            .add_type("NS.Alpha", TypeRef(1))
            .build();
        let usings = vec![EcoString::from("NS")];
        let names = table.visible_names(&usings, || true);
        // Only root children; the using scan was cancelled.
        assert_eq!(names, vec!["NS"]);
    }
}
