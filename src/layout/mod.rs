mod linear;
mod overlap;
mod radial;

pub use overlap::{ResolveReport, resolve_from_moved_node};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::error::LayoutWarning;
use crate::geometry::Rect;
use crate::orientation::{Orientation, Side, to_visual_position};
use crate::tree::Tree;

/// Center of a node relative to the root's origin. Derived state:
/// recomputed whenever the tree, config, or orientation changes, and
/// never fed back into a later layout call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Result of a full layout pass.
#[derive(Debug, Clone)]
pub struct Layout {
    pub orientation: Orientation,
    pub positions: BTreeMap<String, Position>,
    /// Radius of each ring, outermost last. Empty for the linear modes.
    pub ring_radii: Vec<f32>,
    pub warnings: Vec<LayoutWarning>,
    pub width: f32,
    pub height: f32,
}

/// Computes a position for every visible node. Deterministic and
/// idempotent: identical inputs yield bit-identical positions. Never
/// fails for crowded geometry; see [`Layout::warnings`].
pub fn compute_layout(tree: &Tree, orientation: Orientation, config: &LayoutConfig) -> Layout {
    let mut layout = if orientation.is_angular() {
        radial::compute_radial_layout(tree, orientation, config)
    } else {
        linear::compute_linear_layout(tree, orientation, config)
    };
    measure_bounds(&mut layout, tree);
    layout
}

fn measure_bounds(layout: &mut Layout, tree: &Tree) {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for (id, position) in &layout.positions {
        let Some(node) = tree.get(id) else {
            continue;
        };
        min_x = min_x.min(position.x - node.width / 2.0);
        min_y = min_y.min(position.y - node.height / 2.0);
        max_x = max_x.max(position.x + node.width / 2.0);
        max_y = max_y.max(position.y + node.height / 2.0);
    }
    layout.width = if min_x == f32::MAX {
        1.0
    } else {
        (max_x - min_x).max(1.0)
    };
    layout.height = if min_y == f32::MAX {
        1.0
    } else {
        (max_y - min_y).max(1.0)
    };
}

pub(crate) fn node_rect(
    tree: &Tree,
    positions: &BTreeMap<String, Position>,
    id: &str,
) -> Option<Rect> {
    let node = tree.get(id)?;
    let position = positions.get(id)?;
    Some(Rect::new(position.x, position.y, node.width, node.height))
}

/// Root children split by side, each list in visual top-to-bottom order.
/// A stored `side` wins; otherwise the slot mapping assigns one from the
/// canonical index.
pub(crate) fn root_children_by_side(
    tree: &Tree,
    orientation: Orientation,
) -> (Vec<String>, Vec<String>) {
    let ids = tree.visible_children(tree.root());
    let total = ids.len();
    let mut left = Vec::new();
    let mut right = Vec::new();
    for (index, id) in ids.iter().enumerate() {
        let side = tree
            .get(id)
            .and_then(|node| node.side)
            .unwrap_or_else(|| to_visual_position(index, orientation, total).side);
        match side {
            Side::Left => left.push(id.clone()),
            Side::Right => right.push(id.clone()),
        }
    }
    if orientation.reversed_side() == Some(Side::Left) {
        left.reverse();
    }
    if orientation.reversed_side() == Some(Side::Right) {
        right.reverse();
    }
    (left, right)
}
