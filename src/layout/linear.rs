use std::collections::{BTreeMap, HashMap};

use crate::config::LayoutConfig;
use crate::orientation::{Orientation, Side, visual_order};
use crate::tree::Tree;

use super::{Layout, Position, root_children_by_side};

pub(super) fn compute_linear_layout(
    tree: &Tree,
    orientation: Orientation,
    config: &LayoutConfig,
) -> Layout {
    let root = tree.root();
    let mut positions = BTreeMap::new();
    positions.insert(root.to_string(), Position { x: 0.0, y: 0.0 });

    let mut extents: HashMap<String, f32> = HashMap::new();
    let root_width = tree.get(root).map(|node| node.width).unwrap_or(0.0);
    let origin = Position { x: 0.0, y: 0.0 };

    let (left, right) = root_children_by_side(tree, orientation);
    place_children(
        &right,
        Side::Right,
        origin,
        root_width,
        tree,
        orientation,
        config,
        &mut extents,
        &mut positions,
    );
    place_children(
        &left,
        Side::Left,
        origin,
        root_width,
        tree,
        orientation,
        config,
        &mut extents,
        &mut positions,
    );

    Layout {
        orientation,
        positions,
        ring_radii: Vec::new(),
        warnings: Vec::new(),
        width: 0.0,
        height: 0.0,
    }
}

/// Vertical room a subtree's block occupies: the node's own height or
/// the stacked extent of its visible children, whichever is larger.
fn subtree_extent(
    id: &str,
    tree: &Tree,
    config: &LayoutConfig,
    memo: &mut HashMap<String, f32>,
) -> f32 {
    if let Some(value) = memo.get(id) {
        return *value;
    }
    let Some(node) = tree.get(id) else {
        return 0.0;
    };
    let mut extent = node.height;
    let children = tree.visible_children(id);
    if !children.is_empty() {
        let mut total = 0.0;
        for child in children {
            total += subtree_extent(child, tree, config, memo);
        }
        total += config.sibling_gap * (children.len() as f32 - 1.0);
        extent = extent.max(total);
    }
    memo.insert(id.to_string(), extent);
    extent
}

#[allow(clippy::too_many_arguments)]
fn place_children(
    children: &[String],
    side: Side,
    parent_center: Position,
    parent_width: f32,
    tree: &Tree,
    orientation: Orientation,
    config: &LayoutConfig,
    extents: &mut HashMap<String, f32>,
    positions: &mut BTreeMap<String, Position>,
) {
    if children.is_empty() {
        return;
    }
    let direction = match side {
        Side::Right => 1.0,
        Side::Left => -1.0,
    };

    let mut total = 0.0;
    for child in children {
        total += subtree_extent(child, tree, config, extents);
    }
    total += config.sibling_gap * (children.len() as f32 - 1.0);

    let mut cursor = parent_center.y - total / 2.0;
    for child_id in children {
        let extent = extents.get(child_id).copied().unwrap_or(0.0);
        let Some(node) = tree.get(child_id) else {
            continue;
        };
        let center = Position {
            x: parent_center.x
                + direction * (parent_width / 2.0 + node.width / 2.0 + config.level_indent),
            y: cursor + extent / 2.0,
        };
        positions.insert(child_id.clone(), center);

        let grandchildren = tree.visible_children(child_id);
        let ordered: Vec<String> = visual_order(side, orientation, grandchildren.len())
            .into_iter()
            .map(|i| grandchildren[i].clone())
            .collect();
        place_children(
            &ordered,
            side,
            center,
            node.width,
            tree,
            orientation,
            config,
            extents,
            positions,
        );
        cursor += extent + config.sibling_gap;
    }
}
