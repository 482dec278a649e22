use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::LayoutConfig;
use crate::edit::{self, DropTarget, GridSlot, TreeEdit};
use crate::error::EngineError;
use crate::geometry::Point;
use crate::layout::{Position, node_rect};
use crate::tree::Tree;

/// Highlight classification for the node (or canvas) under the pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoverFeedback {
    /// Open canvas: a valid root-level drop.
    Canvas,
    /// A childless node that would gain a child container.
    Leaf(String),
    /// A node with an existing child container.
    Container(String),
    /// Hovering inside the dragged set or its descendants.
    Invalid(String),
}

/// Result of a pointer-move while dragging.
#[derive(Debug, Clone, PartialEq)]
pub enum DragUpdate {
    Hover(HoverFeedback),
    /// The structural modifier was released mid-drag: the session is
    /// gone and the caller restores these positions verbatim.
    Cancelled { restore: BTreeMap<String, Position> },
}

/// Result of a commit attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    Committed(TreeEdit),
    /// Validation rejected the drop; the caller snaps nodes back.
    Rejected {
        error: EngineError,
        restore: BTreeMap<String, Position>,
    },
}

/// Transient state of one in-progress drag. Never serialized.
#[derive(Debug, Clone)]
pub struct DragSession {
    dragged: Vec<String>,
    original_positions: BTreeMap<String, Position>,
    candidate_target: Option<String>,
    structural: bool,
}

impl DragSession {
    pub fn dragged(&self) -> &[String] {
        &self.dragged
    }

    pub fn candidate_target(&self) -> Option<&str> {
        self.candidate_target.as_deref()
    }

    pub fn is_structural(&self) -> bool {
        self.structural
    }

    /// Ghost grid for a multi-node drag, anchored at the pointer.
    pub fn selection_grid(
        &self,
        tree: &Tree,
        config: &LayoutConfig,
        anchor: Point,
    ) -> Vec<GridSlot> {
        edit::selection_grid(tree, &self.dragged, anchor, config.grid_gap)
    }
}

/// One-session-at-a-time state machine:
/// `Idle -> Dragging -> {Committed | Cancelled} -> Idle`. Edit commits
/// are strictly serialized; a second `begin` while dragging is refused.
#[derive(Debug, Default)]
pub struct DragController {
    session: Option<DragSession>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Starts a session, capturing the original position of every node
    /// in the dragged subtrees for cancel/revert. `structural` records
    /// whether the modifier that turns a reposition into a reparent was
    /// held at drag-start.
    pub fn begin(
        &mut self,
        tree: &Tree,
        positions: &BTreeMap<String, Position>,
        node_ids: &[String],
        structural: bool,
    ) -> Result<(), EngineError> {
        if self.session.is_some() {
            return Err(EngineError::SessionActive);
        }
        if node_ids.is_empty() {
            return Err(EngineError::DegenerateInput {
                reason: "empty drag selection".to_string(),
            });
        }
        let mut originals = BTreeMap::new();
        for id in node_ids {
            tree.node(id)?;
            for member in tree.subtree(id) {
                if let Some(position) = positions.get(&member) {
                    originals.insert(member, *position);
                }
            }
        }
        self.session = Some(DragSession {
            dragged: node_ids.to_vec(),
            original_positions: originals,
            candidate_target: None,
            structural,
        });
        Ok(())
    }

    /// Per pointer-move: refreshes the hover candidate and classifies it
    /// with the read-only validator. Releasing the structural modifier
    /// cancels the session on the spot.
    pub fn update(
        &mut self,
        tree: &Tree,
        positions: &BTreeMap<String, Position>,
        pointer: Point,
        structural_held: bool,
    ) -> Result<DragUpdate, EngineError> {
        match self.session.take() {
            None => Err(EngineError::NoSession),
            Some(session) if session.structural && !structural_held => {
                debug!("structural modifier released, cancelling drag");
                Ok(DragUpdate::Cancelled {
                    restore: session.original_positions,
                })
            }
            Some(mut session) => {
                let candidate = hit_test(tree, positions, pointer, &session.dragged);
                session.candidate_target = candidate.clone();
                let feedback = classify(tree, &session.dragged, candidate);
                self.session = Some(session);
                Ok(DragUpdate::Hover(feedback))
            }
        }
    }

    /// Explicit cancel (e.g. Escape): returns the positions to restore.
    pub fn cancel(&mut self) -> Result<BTreeMap<String, Position>, EngineError> {
        let session = self.session.take().ok_or(EngineError::NoSession)?;
        Ok(session.original_positions)
    }

    /// Pointer release: runs the validator/executor exactly once. A
    /// rejected drop consumes the session and hands back the original
    /// positions so the caller can snap the nodes home.
    pub fn commit(
        &mut self,
        tree: &mut Tree,
        target: &DropTarget,
        config: &LayoutConfig,
    ) -> Result<DragOutcome, EngineError> {
        let session = self.session.take().ok_or(EngineError::NoSession)?;
        match edit::commit_move(tree, &session.dragged, target, config) {
            Ok(tree_edit) => Ok(DragOutcome::Committed(tree_edit)),
            Err(error) => {
                debug!(%error, "drop rejected, session discarded");
                Ok(DragOutcome::Rejected {
                    error,
                    restore: session.original_positions,
                })
            }
        }
    }
}

/// Deepest positioned node containing the pointer, skipping the dragged
/// subtrees. Ties break by id for determinism.
fn hit_test(
    tree: &Tree,
    positions: &BTreeMap<String, Position>,
    pointer: Point,
    dragged: &[String],
) -> Option<String> {
    let mut excluded: BTreeSet<String> = BTreeSet::new();
    for id in dragged {
        excluded.extend(tree.subtree(id));
    }

    let mut best: Option<(usize, String)> = None;
    for node in tree.nodes() {
        if excluded.contains(&node.id) {
            continue;
        }
        let Some(rect) = node_rect(tree, positions, &node.id) else {
            continue;
        };
        if !rect.contains(pointer) {
            continue;
        }
        let depth = tree.depth(&node.id);
        let better = match &best {
            None => true,
            Some((best_depth, best_id)) => {
                depth > *best_depth || (depth == *best_depth && node.id < *best_id)
            }
        };
        if better {
            best = Some((depth, node.id.clone()));
        }
    }
    best.map(|(_, id)| id)
}

fn classify(tree: &Tree, dragged: &[String], candidate: Option<String>) -> HoverFeedback {
    let selection: BTreeSet<String> = dragged.iter().cloned().collect();
    match candidate {
        None => {
            if selection.contains(tree.root()) {
                HoverFeedback::Invalid(tree.root().to_string())
            } else {
                HoverFeedback::Canvas
            }
        }
        Some(id) => match edit::validate_target(tree, &selection, &id) {
            Ok(()) => {
                if tree.children(&id).is_empty() {
                    HoverFeedback::Leaf(id)
                } else {
                    HoverFeedback::Container(id)
                }
            }
            Err(_) => HoverFeedback::Invalid(id),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::compute_layout;
    use crate::orientation::Orientation;
    use crate::tree::test_node;

    fn setup() -> (Tree, BTreeMap<String, Position>) {
        let tree = Tree::new(vec![
            test_node("root", None, 0),
            test_node("a", Some("root"), 0),
            test_node("b", Some("root"), 1),
            test_node("a1", Some("a"), 0),
        ])
        .unwrap();
        let layout = compute_layout(&tree, Orientation::LeftToRight, &LayoutConfig::default());
        (tree, layout.positions)
    }

    #[test]
    fn sessions_are_serialized() {
        let (tree, positions) = setup();
        let mut controller = DragController::new();
        controller
            .begin(&tree, &positions, &["a".to_string()], true)
            .unwrap();
        let err = controller
            .begin(&tree, &positions, &["b".to_string()], true)
            .unwrap_err();
        assert!(matches!(err, EngineError::SessionActive));
    }

    #[test]
    fn releasing_the_modifier_cancels_and_restores() {
        let (tree, positions) = setup();
        let mut controller = DragController::new();
        controller
            .begin(&tree, &positions, &["a".to_string()], true)
            .unwrap();

        let update = controller
            .update(&tree, &positions, Point::new(0.0, 0.0), false)
            .unwrap();
        let DragUpdate::Cancelled { restore } = update else {
            panic!("expected cancellation");
        };
        // Originals cover the dragged node and its whole subtree,
        // verbatim.
        assert_eq!(restore["a"], positions["a"]);
        assert_eq!(restore["a1"], positions["a1"]);
        assert!(!controller.is_dragging());
    }

    #[test]
    fn plain_repositions_survive_modifier_changes() {
        let (tree, positions) = setup();
        let mut controller = DragController::new();
        controller
            .begin(&tree, &positions, &["b".to_string()], false)
            .unwrap();
        let update = controller
            .update(&tree, &positions, Point::new(0.0, 0.0), false)
            .unwrap();
        assert!(matches!(update, DragUpdate::Hover(_)));
        assert!(controller.is_dragging());
    }

    #[test]
    fn hover_classifies_leaf_container_canvas_and_invalid() {
        let (tree, positions) = setup();
        let mut controller = DragController::new();
        controller
            .begin(&tree, &positions, &["b".to_string()], true)
            .unwrap();

        let over_leaf = positions["a1"];
        let update = controller
            .update(&tree, &positions, Point::new(over_leaf.x, over_leaf.y), true)
            .unwrap();
        assert_eq!(update, DragUpdate::Hover(HoverFeedback::Leaf("a1".to_string())));

        let over_container = positions["a"];
        let update = controller
            .update(
                &tree,
                &positions,
                Point::new(over_container.x, over_container.y),
                true,
            )
            .unwrap();
        assert_eq!(
            update,
            DragUpdate::Hover(HoverFeedback::Container("a".to_string()))
        );

        let update = controller
            .update(&tree, &positions, Point::new(9_000.0, 9_000.0), true)
            .unwrap();
        assert_eq!(update, DragUpdate::Hover(HoverFeedback::Canvas));

        let over_self = positions["b"];
        let update = controller
            .update(&tree, &positions, Point::new(over_self.x, over_self.y), true)
            .unwrap();
        // The dragged subtree is excluded from hit testing, so hovering
        // it reads as canvas rather than a self-target.
        assert_eq!(update, DragUpdate::Hover(HoverFeedback::Canvas));
    }

    #[test]
    fn commit_runs_the_executor_once_and_returns_the_edit() {
        let (mut tree, positions) = setup();
        let mut controller = DragController::new();
        controller
            .begin(&tree, &positions, &["b".to_string()], true)
            .unwrap();
        let outcome = controller
            .commit(
                &mut tree,
                &DropTarget::Node {
                    id: "a1".to_string(),
                    index: None,
                },
                &LayoutConfig::default(),
            )
            .unwrap();
        let DragOutcome::Committed(edit) = outcome else {
            panic!("expected commit");
        };
        assert!(!edit.changes.is_empty());
        assert_eq!(tree.parent("b"), Some("a1"));
        assert!(!controller.is_dragging());
        assert!(matches!(
            controller.cancel().unwrap_err(),
            EngineError::NoSession
        ));
    }

    #[test]
    fn rejected_commit_restores_and_leaves_the_tree_alone() {
        let (mut tree, positions) = setup();
        let before = tree.to_nodes();
        let mut controller = DragController::new();
        controller
            .begin(&tree, &positions, &["a".to_string()], true)
            .unwrap();
        let outcome = controller
            .commit(
                &mut tree,
                &DropTarget::Node {
                    id: "a1".to_string(),
                    index: None,
                },
                &LayoutConfig::default(),
            )
            .unwrap();
        let DragOutcome::Rejected { error, restore } = outcome else {
            panic!("expected rejection");
        };
        assert!(matches!(error, EngineError::CircularReference { .. }));
        assert_eq!(restore["a"], positions["a"]);
        assert_eq!(tree.to_nodes(), before);
    }
}
