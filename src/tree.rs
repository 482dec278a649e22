use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::orientation::Side;

/// A node of the canonical tree. `parent` and `order` are the single
/// source of truth; every on-screen position is derived from them.
/// Dimensions are semantic inputs measured by whoever renders content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub order: u32,
    #[serde(default)]
    pub side: Option<Side>,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub collapsed: bool,
}

/// Validated canonical tree: exactly one root, acyclic parent graph,
/// unique `order` within every sibling set. Holds a derived child index
/// (ids sorted by `order`) that edits keep consistent.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: BTreeMap<String, Node>,
    children: BTreeMap<String, Vec<String>>,
    root: String,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Result<Self, EngineError> {
        if nodes.is_empty() {
            return Err(EngineError::DegenerateInput {
                reason: "tree has no nodes".to_string(),
            });
        }

        let mut map: BTreeMap<String, Node> = BTreeMap::new();
        for node in nodes {
            if map.insert(node.id.clone(), node).is_some() {
                return Err(EngineError::DegenerateInput {
                    reason: "duplicate node id".to_string(),
                });
            }
        }

        let mut root = None;
        for node in map.values() {
            match &node.parent {
                None => {
                    if root.replace(node.id.clone()).is_some() {
                        return Err(EngineError::DegenerateInput {
                            reason: "more than one root".to_string(),
                        });
                    }
                }
                Some(parent) => {
                    if parent == &node.id {
                        return Err(EngineError::DegenerateInput {
                            reason: format!("node '{}' is its own parent", node.id),
                        });
                    }
                    if !map.contains_key(parent) {
                        return Err(EngineError::DegenerateInput {
                            reason: format!("node '{}' references missing parent '{parent}'", node.id),
                        });
                    }
                }
            }
        }
        let Some(root) = root else {
            return Err(EngineError::DegenerateInput {
                reason: "no root node".to_string(),
            });
        };

        // Bounded parent walk: a chain longer than the node count means a
        // cycle (and, with a single root, also covers connectivity).
        for node in map.values() {
            let mut current = node.parent.as_deref();
            let mut steps = 0usize;
            while let Some(id) = current {
                steps += 1;
                if steps > map.len() {
                    return Err(EngineError::DegenerateInput {
                        reason: format!("parent cycle reachable from '{}'", node.id),
                    });
                }
                current = map.get(id).and_then(|n| n.parent.as_deref());
            }
        }

        let mut tree = Self {
            nodes: map,
            children: BTreeMap::new(),
            root,
        };
        tree.rebuild_index();

        for (parent, children) in &tree.children {
            let mut orders: Vec<u32> = children
                .iter()
                .filter_map(|id| tree.nodes.get(id))
                .map(|n| n.order)
                .collect();
            orders.sort_unstable();
            orders.dedup();
            if orders.len() != children.len() {
                return Err(EngineError::DegenerateInput {
                    reason: format!("duplicate sibling order under '{parent}'"),
                });
            }
        }

        Ok(tree)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Like [`Tree::get`] but failing with `UnknownNode`.
    pub fn node(&self, id: &str) -> Result<&Node, EngineError> {
        self.nodes.get(id).ok_or_else(|| EngineError::UnknownNode {
            id: id.to_string(),
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Snapshot of the node set, suitable for the serialization boundary.
    pub fn to_nodes(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    /// Child ids in canonical order. Empty for leaves and unknown ids.
    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Children as laid out: none while the node is collapsed.
    pub fn visible_children(&self, id: &str) -> &[String] {
        match self.nodes.get(id) {
            Some(node) if node.collapsed => &[],
            _ => self.children(id),
        }
    }

    pub fn parent(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).and_then(|n| n.parent.as_deref())
    }

    /// Walks from `id`'s parent up to the root.
    pub fn ancestors<'a>(&'a self, id: &str) -> Ancestors<'a> {
        Ancestors {
            tree: self,
            current: self.parent(id).map(str::to_string),
        }
    }

    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    pub fn depth(&self, id: &str) -> usize {
        self.ancestors(id).count()
    }

    /// Preorder ids of the subtree rooted at `id`, including `id` itself.
    pub fn subtree(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if !self.contains(&current) {
                continue;
            }
            for child in self.children(&current).iter().rev() {
                stack.push(child.clone());
            }
            out.push(current);
        }
        out
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn rebuild_index(&mut self) {
        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for node in self.nodes.values() {
            if let Some(parent) = &node.parent {
                children.entry(parent.clone()).or_default().push(node.id.clone());
            }
        }
        for list in children.values_mut() {
            list.sort_by_key(|id| self.nodes.get(id).map(|n| n.order).unwrap_or(u32::MAX));
        }
        self.children = children;
    }
}

pub struct Ancestors<'a> {
    tree: &'a Tree,
    current: Option<String>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current.take()?;
        let (key, node) = self.tree.nodes.get_key_value(&id)?;
        self.current = node.parent.clone();
        Some(key.as_str())
    }
}

#[cfg(test)]
pub(crate) fn test_node(id: &str, parent: Option<&str>, order: u32) -> Node {
    Node {
        id: id.to_string(),
        parent: parent.map(str::to_string),
        order,
        side: None,
        width: 100.0,
        height: 40.0,
        collapsed: false,
    }
}
