use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::config::LayoutConfig;
use crate::error::EngineError;
use crate::geometry::Point;
use crate::orientation::Side;
use crate::tree::Tree;

/// Where a dragged set is being dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum DropTarget {
    /// Onto a node: a leaf gains a child container, a parent's existing
    /// container receives the set at `index` (appended when omitted).
    Node { id: String, index: Option<usize> },
    /// Onto the open canvas, in root-relative coordinates. The set
    /// joins the root's children.
    Canvas { point: Point },
}

/// One node's `(parent, order, side)` transition. An edit lists every
/// affected node, including siblings renumbered to close an order gap,
/// so the persistence layer can mirror the change verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeChange {
    pub id: String,
    pub old_parent: Option<String>,
    pub new_parent: Option<String>,
    pub old_order: u32,
    pub new_order: u32,
    pub old_side: Option<Side>,
    pub new_side: Option<Side>,
}

/// Advisory initial position for one member of a multi-node canvas drop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSlot {
    pub id: String,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeEdit {
    pub changes: Vec<NodeChange>,
    pub grid: Vec<GridSlot>,
}

/// Read-only target check shared with drag hover feedback: rejects when
/// the target, or any of its ancestors, belongs to the dragged set.
pub(crate) fn validate_target(
    tree: &Tree,
    selection: &BTreeSet<String>,
    target_id: &str,
) -> Result<(), EngineError> {
    if selection.contains(target_id) {
        return Err(EngineError::CircularReference {
            node: target_id.to_string(),
            target: target_id.to_string(),
        });
    }
    for ancestor in tree.ancestors(target_id) {
        if selection.contains(ancestor) {
            return Err(EngineError::CircularReference {
                node: ancestor.to_string(),
                target: target_id.to_string(),
            });
        }
    }
    Ok(())
}

/// Validates a structural edit and describes it without mutating the
/// tree. Apply with [`apply_edit`], or use [`commit_move`] for both.
pub fn propose_move(
    tree: &Tree,
    node_ids: &[String],
    target: &DropTarget,
    config: &LayoutConfig,
) -> Result<TreeEdit, EngineError> {
    if node_ids.is_empty() {
        return Err(EngineError::DegenerateInput {
            reason: "empty drag selection".to_string(),
        });
    }
    let mut selection: BTreeSet<String> = BTreeSet::new();
    for id in node_ids {
        tree.node(id)?;
        selection.insert(id.clone());
    }

    let root = tree.root().to_string();
    let (new_parent, drop_index, canvas_point) = match target {
        DropTarget::Node { id, index } => {
            tree.node(id)?;
            validate_target(tree, &selection, id)?;
            (id.clone(), *index, None)
        }
        DropTarget::Canvas { point } => {
            if selection.contains(&root) {
                return Err(EngineError::CircularReference {
                    node: root.clone(),
                    target: root.clone(),
                });
            }
            (root.clone(), None, Some(*point))
        }
    };

    // Top of each dragged subtree: a selected node with no selected
    // ancestor. Everything below it rides along untouched.
    let mut moved: Vec<String> = selection
        .iter()
        .filter(|id| !tree.ancestors(id).any(|a| selection.contains(a)))
        .cloned()
        .collect();
    moved.sort_by_key(|id| {
        tree.get(id)
            .map(|node| (node.parent.clone().unwrap_or_default(), node.order))
            .unwrap_or_default()
    });

    // A dragged parent with only part of its children selected sheds the
    // unselected ones onto its own former parent (the children's former
    // grandparent), falling back to the root.
    let mut detached: Vec<(String, String)> = Vec::new();
    for id in &selection {
        let kids = tree.children(id);
        if kids.is_empty() {
            continue;
        }
        let selected_kids = kids.iter().filter(|kid| selection.contains(*kid)).count();
        if selected_kids == 0 || selected_kids == kids.len() {
            continue;
        }
        let fallback = tree
            .ancestors(id)
            .find(|a| !selection.contains(*a))
            .unwrap_or(tree.root())
            .to_string();
        for kid in kids {
            if !selection.contains(kid) {
                detached.push((kid.clone(), fallback.clone()));
            }
        }
    }

    let mut departing: BTreeSet<String> = moved.iter().cloned().collect();
    departing.extend(detached.iter().map(|(kid, _)| kid.clone()));

    let mut affected: BTreeSet<String> = BTreeSet::new();
    affected.insert(new_parent.clone());
    for id in &moved {
        if let Some(parent) = tree.parent(id) {
            affected.insert(parent.to_string());
        }
    }
    for (kid, fallback) in &detached {
        if let Some(parent) = tree.parent(kid) {
            affected.insert(parent.to_string());
        }
        affected.insert(fallback.clone());
    }

    let mut sequences: BTreeMap<String, Vec<String>> = affected
        .iter()
        .map(|parent| {
            let remaining: Vec<String> = tree
                .children(parent)
                .iter()
                .filter(|child| !departing.contains(*child))
                .cloned()
                .collect();
            (parent.clone(), remaining)
        })
        .collect();

    if let Some(seq) = sequences.get_mut(&new_parent) {
        let index = drop_index.unwrap_or(seq.len()).min(seq.len());
        for (offset, id) in moved.iter().enumerate() {
            seq.insert(index + offset, id.clone());
        }
    }
    for (kid, fallback) in &detached {
        if let Some(seq) = sequences.get_mut(fallback) {
            seq.push(kid.clone());
        }
    }

    let side_overrides = assign_sides(
        tree,
        &root,
        &new_parent,
        &moved,
        &detached,
        &departing,
        canvas_point,
    );

    let mut changes = Vec::new();
    for (parent, seq) in &sequences {
        for (position, id) in seq.iter().enumerate() {
            let Some(node) = tree.get(id) else {
                continue;
            };
            let new_order = position as u32;
            let new_side = side_overrides.get(id).copied().unwrap_or(node.side);
            if node.parent.as_deref() != Some(parent.as_str())
                || node.order != new_order
                || node.side != new_side
            {
                changes.push(NodeChange {
                    id: id.clone(),
                    old_parent: node.parent.clone(),
                    new_parent: Some(parent.clone()),
                    old_order: node.order,
                    new_order,
                    old_side: node.side,
                    new_side,
                });
            }
        }
    }

    let mut grid = Vec::new();
    if moved.len() > 1
        && let Some(point) = canvas_point
    {
        grid = selection_grid(tree, &moved, point, config.grid_gap);
    }

    Ok(TreeEdit { changes, grid })
}

/// Side bookkeeping for nodes landing under the root: a canvas drop
/// takes the side of the drop point, anything else the less-populated
/// side. Landing deeper clears the stored side (it is inherited from
/// the branch's root child thereafter). A plain reorder keeps sides.
fn assign_sides(
    tree: &Tree,
    root: &str,
    new_parent: &str,
    moved: &[String],
    detached: &[(String, String)],
    departing: &BTreeSet<String>,
    canvas_point: Option<Point>,
) -> BTreeMap<String, Option<Side>> {
    let mut overrides: BTreeMap<String, Option<Side>> = BTreeMap::new();

    let mut left = 0usize;
    let mut right = 0usize;
    for child in tree.children(root) {
        if departing.contains(child) {
            continue;
        }
        match tree.get(child).and_then(|node| node.side) {
            Some(Side::Left) => left += 1,
            Some(Side::Right) => right += 1,
            None => {}
        }
    }
    let mut balanced = |overrides: &mut BTreeMap<String, Option<Side>>, id: &str| {
        let side = if left <= right { Side::Left } else { Side::Right };
        match side {
            Side::Left => left += 1,
            Side::Right => right += 1,
        }
        overrides.insert(id.to_string(), Some(side));
    };

    for id in moved {
        if tree.parent(id) == Some(new_parent) {
            continue;
        }
        if new_parent == root {
            match canvas_point {
                Some(point) => {
                    let side = if point.x < 0.0 { Side::Left } else { Side::Right };
                    overrides.insert(id.clone(), Some(side));
                }
                None => balanced(&mut overrides, id),
            }
        } else {
            overrides.insert(id.clone(), None);
        }
    }
    for (kid, fallback) in detached {
        if fallback == root {
            balanced(&mut overrides, kid);
        } else {
            overrides.insert(kid.clone(), None);
        }
    }
    overrides
}

/// Roughly square grid for a multi-node drop, anchored at the drop
/// point, cells traversed left-to-right then top-to-bottom.
pub(crate) fn selection_grid(
    tree: &Tree,
    moved: &[String],
    anchor: Point,
    gap: f32,
) -> Vec<GridSlot> {
    let columns = (moved.len() as f32).sqrt().ceil() as usize;
    let cell_width = moved
        .iter()
        .filter_map(|id| tree.get(id))
        .map(|node| node.width)
        .fold(0.0, f32::max)
        + gap;
    let cell_height = moved
        .iter()
        .filter_map(|id| tree.get(id))
        .map(|node| node.height)
        .fold(0.0, f32::max)
        + gap;
    moved
        .iter()
        .enumerate()
        .map(|(i, id)| GridSlot {
            id: id.clone(),
            x: anchor.x + (i % columns) as f32 * cell_width,
            y: anchor.y + (i / columns) as f32 * cell_height,
        })
        .collect()
}

/// Applies a validated edit. All-or-nothing: every referenced id is
/// checked before the first field is written.
pub fn apply_edit(tree: &mut Tree, edit: &TreeEdit) -> Result<(), EngineError> {
    for change in &edit.changes {
        tree.node(&change.id)?;
        if let Some(parent) = &change.new_parent {
            tree.node(parent)?;
        }
    }
    for change in &edit.changes {
        if let Some(node) = tree.node_mut(&change.id) {
            node.parent = change.new_parent.clone();
            node.order = change.new_order;
            node.side = change.new_side;
        }
    }
    tree.rebuild_index();
    Ok(())
}

/// Validates, applies, and returns the edit in one call.
pub fn commit_move(
    tree: &mut Tree,
    node_ids: &[String],
    target: &DropTarget,
    config: &LayoutConfig,
) -> Result<TreeEdit, EngineError> {
    let edit = propose_move(tree, node_ids, target, config)?;
    apply_edit(tree, &edit)?;
    debug!(changes = edit.changes.len(), "tree edit committed");
    Ok(edit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::test_node;

    fn scattered() -> Tree {
        // root ── a ── a1, a2
        //      ── b ── b1
        //      ── c
        Tree::new(vec![
            test_node("root", None, 0),
            test_node("a", Some("root"), 0),
            test_node("b", Some("root"), 1),
            test_node("c", Some("root"), 2),
            test_node("a1", Some("a"), 0),
            test_node("a2", Some("a"), 1),
            test_node("b1", Some("b"), 0),
        ])
        .unwrap()
    }

    fn orders(tree: &Tree, parent: &str) -> Vec<(String, u32)> {
        tree.children(parent)
            .iter()
            .map(|id| (id.clone(), tree.get(id).unwrap().order))
            .collect()
    }

    #[test]
    fn dropping_into_own_subtree_is_rejected_without_mutation() {
        let mut tree = scattered();
        let before = tree.to_nodes();
        let err = commit_move(
            &mut tree,
            &["a".to_string()],
            &DropTarget::Node {
                id: "a1".to_string(),
                index: None,
            },
            &LayoutConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::CircularReference { .. }));
        assert_eq!(tree.to_nodes(), before);
    }

    #[test]
    fn dropping_onto_itself_is_rejected() {
        let tree = scattered();
        let err = propose_move(
            &tree,
            &["b".to_string()],
            &DropTarget::Node {
                id: "b".to_string(),
                index: None,
            },
            &LayoutConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::CircularReference { .. }));
    }

    #[test]
    fn leaf_target_gains_a_child_container_and_gaps_close() {
        let mut tree = scattered();
        commit_move(
            &mut tree,
            &["b".to_string()],
            &DropTarget::Node {
                id: "c".to_string(),
                index: None,
            },
            &LayoutConfig::default(),
        )
        .unwrap();

        assert_eq!(tree.parent("b"), Some("c"));
        // b kept its own subtree.
        assert_eq!(tree.parent("b1"), Some("b"));
        // Former siblings renumber without gaps or duplicates.
        assert_eq!(
            orders(&tree, "root"),
            vec![("a".to_string(), 0), ("c".to_string(), 1)]
        );
        // Side is inherited below the root.
        assert_eq!(tree.get("b").unwrap().side, None);
    }

    #[test]
    fn reorder_within_a_parent_preserves_relative_order_of_others() {
        let mut tree = scattered();
        commit_move(
            &mut tree,
            &["c".to_string()],
            &DropTarget::Node {
                id: "root".to_string(),
                index: Some(0),
            },
            &LayoutConfig::default(),
        )
        .unwrap();
        assert_eq!(
            orders(&tree, "root"),
            vec![
                ("c".to_string(), 0),
                ("a".to_string(), 1),
                ("b".to_string(), 2)
            ]
        );
    }

    #[test]
    fn three_scattered_nodes_grid_onto_a_leaf() {
        let mut tree = scattered();
        let edit = commit_move(
            &mut tree,
            &["a1".to_string(), "b1".to_string(), "a2".to_string()],
            &DropTarget::Node {
                id: "c".to_string(),
                index: None,
            },
            &LayoutConfig::default(),
        )
        .unwrap();

        let container = orders(&tree, "c");
        assert_eq!(container.len(), 3);
        let order_values: Vec<u32> = container.iter().map(|(_, order)| *order).collect();
        assert_eq!(order_values, vec![0, 1, 2]);

        // Former parents closed their gaps with no duplicates.
        assert!(tree.children("a").is_empty());
        assert!(tree.children("b").is_empty());
        // Node drops carry no canvas grid slots.
        assert!(edit.grid.is_empty());
    }

    #[test]
    fn multi_node_canvas_drop_arranges_a_square_grid() {
        let mut tree = scattered();
        let edit = commit_move(
            &mut tree,
            &["a1".to_string(), "a2".to_string(), "b1".to_string()],
            &DropTarget::Canvas {
                point: Point::new(120.0, -40.0),
            },
            &LayoutConfig::default(),
        )
        .unwrap();

        assert_eq!(tree.parent("a1"), Some("root"));
        assert_eq!(tree.parent("a2"), Some("root"));
        assert_eq!(tree.parent("b1"), Some("root"));

        // ceil(sqrt(3)) = 2 columns: two cells on the first row, one on
        // the second, traversed left-to-right then top-to-bottom.
        assert_eq!(edit.grid.len(), 3);
        assert_eq!(edit.grid[0].x, 120.0);
        assert_eq!(edit.grid[0].y, -40.0);
        assert!(edit.grid[1].x > edit.grid[0].x);
        assert_eq!(edit.grid[1].y, edit.grid[0].y);
        assert_eq!(edit.grid[2].x, edit.grid[0].x);
        assert!(edit.grid[2].y > edit.grid[0].y);

        // Dropped on the right half: all three land on the right side.
        for id in ["a1", "a2", "b1"] {
            assert_eq!(tree.get(id).unwrap().side, Some(Side::Right));
        }
    }

    #[test]
    fn partially_selected_children_detach_to_the_former_grandparent() {
        let mut tree = scattered();
        // Drag a together with a1 only; a2 must fall back to root.
        commit_move(
            &mut tree,
            &["a".to_string(), "a1".to_string()],
            &DropTarget::Node {
                id: "c".to_string(),
                index: None,
            },
            &LayoutConfig::default(),
        )
        .unwrap();

        assert_eq!(tree.parent("a"), Some("c"));
        assert_eq!(tree.parent("a1"), Some("a"));
        assert_eq!(tree.parent("a2"), Some("root"));
    }

    #[test]
    fn acyclicity_survives_every_successful_edit() {
        let mut tree = scattered();
        commit_move(
            &mut tree,
            &["b".to_string()],
            &DropTarget::Node {
                id: "a1".to_string(),
                index: None,
            },
            &LayoutConfig::default(),
        )
        .unwrap();

        let node_count = tree.len();
        for node in tree.to_nodes() {
            let steps = tree.ancestors(&node.id).count();
            assert!(steps <= node_count);
            if node.id != "root" {
                assert!(tree.is_ancestor("root", &node.id));
            }
        }
    }

    #[test]
    fn canvas_drop_left_of_the_root_assigns_the_left_side() {
        let mut tree = scattered();
        commit_move(
            &mut tree,
            &["b1".to_string()],
            &DropTarget::Canvas {
                point: Point::new(-200.0, 0.0),
            },
            &LayoutConfig::default(),
        )
        .unwrap();
        assert_eq!(tree.parent("b1"), Some("root"));
        assert_eq!(tree.get("b1").unwrap().side, Some(Side::Left));
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let tree = scattered();
        let err = propose_move(
            &tree,
            &["ghost".to_string()],
            &DropTarget::Node {
                id: "c".to_string(),
                index: None,
            },
            &LayoutConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::UnknownNode { .. }));
    }

    #[test]
    fn edits_round_trip_through_plain_nodes() {
        let mut tree = scattered();
        commit_move(
            &mut tree,
            &["b".to_string()],
            &DropTarget::Node {
                id: "c".to_string(),
                index: None,
            },
            &LayoutConfig::default(),
        )
        .unwrap();
        let rebuilt = Tree::new(tree.to_nodes()).unwrap();
        assert_eq!(rebuilt.children("c"), tree.children("c"));
    }

    #[test]
    fn moving_under_root_balances_sides() {
        let mut nodes = vec![
            test_node("root", None, 0),
            test_node("a", Some("root"), 0),
            test_node("b", Some("root"), 1),
            test_node("c", Some("a"), 0),
        ];
        nodes[1].side = Some(Side::Right);
        nodes[2].side = Some(Side::Right);
        let mut tree = Tree::new(nodes).unwrap();

        commit_move(
            &mut tree,
            &["c".to_string()],
            &DropTarget::Node {
                id: "root".to_string(),
                index: None,
            },
            &LayoutConfig::default(),
        )
        .unwrap();
        assert_eq!(tree.get("c").unwrap().side, Some(Side::Left));
    }

    #[test]
    fn reapplying_an_edit_description_is_a_state_noop() {
        let mut tree = scattered();
        let edit = propose_move(
            &tree,
            &["b".to_string()],
            &DropTarget::Node {
                id: "c".to_string(),
                index: None,
            },
            &LayoutConfig::default(),
        )
        .unwrap();
        apply_edit(&mut tree, &edit).unwrap();
        // Re-applying the same description is a no-op state-wise.
        apply_edit(&mut tree, &edit).unwrap();
        assert_eq!(tree.parent("b"), Some("c"));
    }
}
