use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::LayoutConfig;
use crate::error::EngineError;
use crate::geometry::Rect;
use crate::tree::Tree;

use super::{Position, node_rect};

/// Outcome of a moved-node resolution pass. `visited` counts the
/// sibling rectangles examined, the quantity bounded by
/// `O(depth × max_siblings)` regardless of total tree size.
#[derive(Debug, Clone)]
pub struct ResolveReport {
    pub moved: Vec<String>,
    pub visited: usize,
}

/// Repairs overlaps introduced by moving one node, walking bottom-up
/// from the moved node to the root. At each level only that level's
/// siblings are examined: overlapping pairs are pushed apart (their
/// subtrees translating rigidly), then the parent's bounding region is
/// grown to contain the result before moving a level up. Candidates are
/// filtered by true rectangle distance, never side-of-root membership:
/// with angular orientations two nodes can classify to opposite sides
/// yet sit geometrically adjacent.
pub fn resolve_from_moved_node(
    moved_id: &str,
    tree: &Tree,
    config: &LayoutConfig,
    positions: &mut BTreeMap<String, Position>,
) -> Result<ResolveReport, EngineError> {
    tree.node(moved_id)?;

    let mut visited = 0usize;
    let mut changed: BTreeSet<String> = BTreeSet::new();

    let Some(mut region) = subtree_bounds(tree, positions, moved_id) else {
        return Ok(ResolveReport {
            moved: Vec::new(),
            visited,
        });
    };

    let mut current = moved_id.to_string();
    while let Some(parent) = tree.parent(&current).map(str::to_string) {
        let siblings = tree.visible_children(&parent).to_vec();
        visited += siblings.len();

        let mut ids = Vec::with_capacity(siblings.len());
        let mut rects = Vec::with_capacity(siblings.len());
        for id in &siblings {
            let rect = if *id == current {
                Some(region)
            } else {
                node_rect(tree, positions, id)
            };
            if let Some(rect) = rect {
                ids.push(id.clone());
                rects.push(rect);
            }
        }

        let originals = rects.clone();
        let max_iters = config.max_iterations.max(4) * rects.len().max(1);
        let settled = separate(&mut rects, max_iters);
        if !settled {
            debug!(parent = %parent, "sibling separation hit its iteration cap");
        }

        for ((id, rect), original) in ids.iter().zip(&rects).zip(&originals) {
            let dx = rect.cx - original.cx;
            let dy = rect.cy - original.cy;
            if dx == 0.0 && dy == 0.0 {
                continue;
            }
            shift_subtree(tree, positions, id, dx, dy, &mut changed);
            if *id == current {
                region.cx += dx;
                region.cy += dy;
            }
        }

        let mut parent_region = node_rect(tree, positions, &parent).unwrap_or(region);
        for (id, rect) in ids.iter().zip(&rects) {
            let rect = if *id == current { region } else { *rect };
            parent_region = parent_region.union(rect);
        }
        region = parent_region;
        current = parent;
    }

    Ok(ResolveReport {
        moved: changed.into_iter().collect(),
        visited,
    })
}

/// Bounding box of every positioned node in the subtree rooted at `id`.
fn subtree_bounds(
    tree: &Tree,
    positions: &BTreeMap<String, Position>,
    id: &str,
) -> Option<Rect> {
    let mut bounds: Option<Rect> = None;
    for member in tree.subtree(id) {
        if let Some(rect) = node_rect(tree, positions, &member) {
            bounds = Some(match bounds {
                Some(existing) => existing.union(rect),
                None => rect,
            });
        }
    }
    bounds
}

fn shift_subtree(
    tree: &Tree,
    positions: &mut BTreeMap<String, Position>,
    id: &str,
    dx: f32,
    dy: f32,
    changed: &mut BTreeSet<String>,
) {
    for member in tree.subtree(id) {
        if let Some(position) = positions.get_mut(&member) {
            position.x += dx;
            position.y += dy;
            changed.insert(member);
        }
    }
}

/// Pushes the worst overlapping pair apart along its axis of least
/// penetration until no pair overlaps or the cap is hit. Returns whether
/// every pair ended up separated.
fn separate(rects: &mut [Rect], iteration_cap: usize) -> bool {
    const MARGIN: f32 = 0.5;

    for _ in 0..iteration_cap {
        let mut worst: Option<(usize, usize, f32)> = None;
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                if !rects[i].overlaps(rects[j]) {
                    continue;
                }
                let depth = penetration(rects[i], rects[j]);
                if worst.is_none_or(|(_, _, existing)| depth > existing) {
                    worst = Some((i, j, depth));
                }
            }
        }
        let Some((i, j, _)) = worst else {
            return true;
        };

        let a = rects[i];
        let b = rects[j];
        let need_x = (a.width + b.width) / 2.0;
        let need_y = (a.height + b.height) / 2.0;
        let dx = b.cx - a.cx;
        let dy = b.cy - a.cy;
        let pen_x = need_x - dx.abs() + MARGIN;
        let pen_y = need_y - dy.abs() + MARGIN;
        if pen_x <= pen_y {
            let push = if dx >= 0.0 { pen_x } else { -pen_x };
            rects[i].cx -= push / 2.0;
            rects[j].cx += push / 2.0;
        } else {
            let push = if dy >= 0.0 { pen_y } else { -pen_y };
            rects[i].cy -= push / 2.0;
            rects[j].cy += push / 2.0;
        }
    }
    false
}

fn penetration(a: Rect, b: Rect) -> f32 {
    let pen_x = (a.width + b.width) / 2.0 - (b.cx - a.cx).abs();
    let pen_y = (a.height + b.height) / 2.0 - (b.cy - a.cy).abs();
    pen_x.min(pen_y)
}
