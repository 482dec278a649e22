use std::collections::BTreeMap;
use std::f32::consts::TAU;

use tracing::debug;

use crate::config::LayoutConfig;
use crate::error::LayoutWarning;
use crate::geometry::Rect;
use crate::orientation::Orientation;
use crate::tree::Tree;

use super::{Layout, Position};

/// One parent's children sharing a slice of a ring. `start`/`range` are
/// sweep-space angles: 0 at the top, increasing along the orientation's
/// sweep direction.
struct RingGroup {
    children: Vec<String>,
    start: f32,
    range: f32,
}

struct RelaxOutcome {
    residual: f32,
    converged: bool,
}

pub(super) fn compute_radial_layout(
    tree: &Tree,
    orientation: Orientation,
    config: &LayoutConfig,
) -> Layout {
    let root = tree.root();
    let mut positions = BTreeMap::new();
    positions.insert(root.to_string(), Position { x: 0.0, y: 0.0 });

    let mut warnings = Vec::new();
    let mut ring_radii = Vec::new();

    let sweep = root_sweep_order(tree, orientation);
    let mut current = if sweep.is_empty() {
        Vec::new()
    } else {
        vec![RingGroup {
            children: sweep,
            start: 0.0,
            range: TAU,
        }]
    };

    let mut previous_radius = 0.0_f32;
    let mut depth = 1usize;
    while !current.is_empty() {
        let natural = if depth == 1 {
            config.base_radius
        } else {
            previous_radius + config.ring_spacing
        };
        let mut radius = natural;
        for group in &current {
            if group.range <= f32::EPSILON {
                continue;
            }
            let needed: f32 = group
                .children
                .iter()
                .filter_map(|id| tree.get(id))
                .map(|node| node.width * config.shrink_factor + config.min_spacing)
                .sum();
            radius = radius.max(needed / group.range);
        }
        if radius > natural {
            debug!(depth, radius, "ring radius auto-increased to fit its nodes");
            warnings.push(LayoutWarning::Capacity { depth, radius });
        }
        ring_radii.push(radius);

        let mut worst_residual: Option<f32> = None;
        let mut next = Vec::new();
        for group in &current {
            let outcome = place_group(tree, group, radius, orientation, config, &mut positions);
            if !outcome.converged {
                let entry = worst_residual.get_or_insert(0.0);
                *entry = entry.max(outcome.residual);
            }

            let shares = allocate_sectors(tree, &group.children, group.range, config);
            let mut cursor = group.start;
            for (id, share) in group.children.iter().zip(&shares) {
                let grandchildren = tree.visible_children(id);
                if !grandchildren.is_empty() {
                    next.push(RingGroup {
                        children: grandchildren.to_vec(),
                        start: cursor,
                        range: *share,
                    });
                }
                cursor += share;
            }
        }
        if let Some(residual) = worst_residual {
            warnings.push(LayoutWarning::Convergence { depth, residual });
        }

        previous_radius = radius;
        current = next;
        depth += 1;
    }

    Layout {
        orientation,
        positions,
        ring_radii,
        warnings,
        width: 0.0,
        height: 0.0,
    }
}

/// Root children in sweep order: the leading side's members first, then
/// the trailing side's, both in canonical order. Angle space runs along
/// the sweep, so the trailing side's bottom-to-top visual reversal falls
/// out of the geometry.
fn root_sweep_order(tree: &Tree, orientation: Orientation) -> Vec<String> {
    let ids = tree.visible_children(tree.root());
    let total = ids.len();
    let leading_side = orientation.leading_side();
    let mut leading = Vec::new();
    let mut trailing = Vec::new();
    for (index, id) in ids.iter().enumerate() {
        let side = tree
            .get(id)
            .and_then(|node| node.side)
            .unwrap_or_else(|| crate::orientation::to_visual_position(index, orientation, total).side);
        if side == leading_side {
            leading.push(id.clone());
        } else {
            trailing.push(id.clone());
        }
    }
    leading.append(&mut trailing);
    leading
}

/// Seeds a group's angles at equal steps, relaxes toward equal linear
/// spacing, and writes the resulting positions. Retries once with the
/// shrink fallback when overlaps survive relaxation.
fn place_group(
    tree: &Tree,
    group: &RingGroup,
    radius: f32,
    orientation: Orientation,
    config: &LayoutConfig,
    positions: &mut BTreeMap<String, Position>,
) -> RelaxOutcome {
    let count = group.children.len();
    let cyclic = group.range >= TAU - 1e-3;

    let sizes: Vec<(f32, f32)> = group
        .children
        .iter()
        .map(|id| {
            tree.get(id)
                .map(|node| (node.width, node.height))
                .unwrap_or((0.0, 0.0))
        })
        .collect();

    let mut angles = seed_angles(group, count);
    let mut outcome = relax(&sizes, &mut angles, radius, group, cyclic, orientation, config);

    if has_adjacent_overlap(&sizes, &angles, radius, orientation, cyclic) {
        let shrunk: Vec<(f32, f32)> = sizes
            .iter()
            .map(|(w, h)| (w * config.shrink_factor, h * config.shrink_factor))
            .collect();
        angles = seed_angles(group, count);
        outcome = relax(&shrunk, &mut angles, radius, group, cyclic, orientation, config);
        if has_adjacent_overlap(&sizes, &angles, radius, orientation, cyclic) {
            outcome.converged = false;
            outcome.residual = outcome.residual.max(config.convergence_threshold);
        }
    }

    for (id, angle) in group.children.iter().zip(&angles) {
        positions.insert(id.clone(), angle_to_position(*angle, radius, orientation));
    }
    outcome
}

/// Equal angular steps, always derived from the node count alone so a
/// stale layout can never seed a local minimum.
fn seed_angles(group: &RingGroup, count: usize) -> Vec<f32> {
    (0..count)
        .map(|i| group.start + group.range * (i as f32 + 0.5) / count as f32)
        .collect()
}

fn relax(
    sizes: &[(f32, f32)],
    angles: &mut [f32],
    radius: f32,
    group: &RingGroup,
    cyclic: bool,
    orientation: Orientation,
    config: &LayoutConfig,
) -> RelaxOutcome {
    let count = angles.len();
    if count < 2 {
        return RelaxOutcome {
            residual: 0.0,
            converged: true,
        };
    }

    let pair_count = if cyclic { count } else { count - 1 };
    let radius = radius.max(1.0);
    let mut residual = 0.0_f32;
    for _ in 0..config.max_iterations {
        let rects: Vec<Rect> = angles
            .iter()
            .zip(sizes)
            .map(|(angle, (w, h))| {
                let p = angle_to_position(*angle, radius, orientation);
                Rect::new(p.x, p.y, *w, *h)
            })
            .collect();

        let mut distances = Vec::with_capacity(pair_count);
        for i in 0..pair_count {
            let j = (i + 1) % count;
            distances.push(rects[i].distance(rects[j]));
        }
        let target = distances.iter().sum::<f32>() / pair_count as f32;

        let mut adjust = vec![0.0_f32; count];
        for (i, distance) in distances.iter().enumerate() {
            let j = (i + 1) % count;
            let delta = config.relaxation_factor * (target - distance) / radius;
            adjust[i] -= delta / 2.0;
            adjust[j] += delta / 2.0;
        }

        let mut max_step = 0.0_f32;
        for (angle, step) in angles.iter_mut().zip(&adjust) {
            *angle += step;
            max_step = max_step.max(step.abs());
        }
        if !cyclic {
            let lo = group.start;
            let hi = group.start + group.range;
            for angle in angles.iter_mut() {
                *angle = angle.clamp(lo, hi);
            }
        }
        // Damping keeps neighbors from crossing in practice; clamp the
        // sweep order anyway so a pathological step cannot reorder it.
        for i in 1..count {
            if angles[i] < angles[i - 1] {
                angles[i] = angles[i - 1] + 1e-4;
            }
        }

        residual = max_step * radius;
        if residual < config.convergence_threshold {
            return RelaxOutcome {
                residual,
                converged: true,
            };
        }
    }
    RelaxOutcome {
        residual,
        converged: false,
    }
}

fn has_adjacent_overlap(
    sizes: &[(f32, f32)],
    angles: &[f32],
    radius: f32,
    orientation: Orientation,
    cyclic: bool,
) -> bool {
    let count = angles.len();
    if count < 2 {
        return false;
    }
    let rects: Vec<Rect> = angles
        .iter()
        .zip(sizes)
        .map(|(angle, (w, h))| {
            let p = angle_to_position(*angle, radius, orientation);
            Rect::new(p.x, p.y, *w, *h)
        })
        .collect();
    let pair_count = if cyclic { count } else { count - 1 };
    (0..pair_count).any(|i| rects[i].overlaps(rects[(i + 1) % count]))
}

/// Angular budget per child, proportional to direct child count with a
/// floor keeping low-fanout branches usable, normalized to the range.
fn allocate_sectors(
    tree: &Tree,
    children: &[String],
    range: f32,
    config: &LayoutConfig,
) -> Vec<f32> {
    let count = children.len();
    if count == 0 {
        return Vec::new();
    }
    let floor = range / (count as f32 * config.sector_floor_divisor.max(1.0));
    let weights: Vec<f32> = children
        .iter()
        .map(|id| tree.visible_children(id).len() as f32)
        .collect();
    let total: f32 = weights.iter().sum();
    let mut shares: Vec<f32> = if total > 0.0 {
        weights.iter().map(|w| range * w / total).collect()
    } else {
        vec![range / count as f32; count]
    };
    for share in shares.iter_mut() {
        *share = share.max(floor);
    }
    let sum: f32 = shares.iter().sum();
    if sum > 0.0 {
        let scale = range / sum;
        for share in shares.iter_mut() {
            *share *= scale;
        }
    }
    shares
}

/// Sweep angle to screen position: 0 is straight up, the sweep direction
/// follows the orientation, y grows downward.
fn angle_to_position(angle: f32, radius: f32, orientation: Orientation) -> Position {
    let (sin, cos) = angle.sin_cos();
    let x = match orientation {
        Orientation::Anticlockwise => -radius * sin,
        _ => radius * sin,
    };
    Position {
        x,
        y: -radius * cos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Tree, test_node};

    fn fan(children: usize, width: f32, height: f32) -> Tree {
        let mut nodes = vec![test_node("root", None, 0)];
        for i in 0..children {
            let mut node = test_node(&format!("c{i}"), Some("root"), i as u32);
            node.width = width;
            node.height = height;
            nodes.push(node);
        }
        Tree::new(nodes).unwrap()
    }

    #[test]
    fn crowded_ring_grows_its_radius_and_stays_overlap_free() {
        let tree = fan(14, 120.0, 40.0);
        let config = LayoutConfig {
            min_spacing: 20.0,
            base_radius: 100.0,
            ..LayoutConfig::default()
        };
        let layout = compute_radial_layout(&tree, Orientation::Clockwise, &config);

        assert!(layout.ring_radii[0] >= 100.0);
        assert!(
            layout
                .warnings
                .iter()
                .any(|w| matches!(w, LayoutWarning::Capacity { depth: 1, .. }))
        );

        let rects: Vec<Rect> = (0..14)
            .map(|i| {
                let id = format!("c{i}");
                let p = layout.positions[&id];
                Rect::new(p.x, p.y, 120.0, 40.0)
            })
            .collect();
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                assert!(!rects[i].overlaps(rects[j]), "c{i} overlaps c{j}");
            }
        }
    }

    #[test]
    fn relaxation_equalizes_neighbor_spacing() {
        let tree = fan(10, 120.0, 40.0);
        let config = LayoutConfig::default();
        let layout = compute_radial_layout(&tree, Orientation::Clockwise, &config);
        let radius = layout.ring_radii[0];

        let rects: Vec<Rect> = (0..10)
            .map(|i| {
                let id = format!("c{i}");
                let p = layout.positions[&id];
                Rect::new(p.x, p.y, 120.0, 40.0)
            })
            .collect();
        let distances: Vec<f32> = (0..10)
            .map(|i| rects[i].distance(rects[(i + 1) % 10]))
            .collect();
        let mean = distances.iter().sum::<f32>() / distances.len() as f32;
        assert!(mean > 0.0, "ring of radius {radius} collapsed");
        for distance in &distances {
            assert!(
                (distance - mean).abs() <= mean * 0.5,
                "spacing {distance} strays from mean {mean}"
            );
        }
    }

    #[test]
    fn sectors_sum_to_their_range_with_floors_applied() {
        let tree = Tree::new(vec![
            test_node("root", None, 0),
            test_node("a", Some("root"), 0),
            test_node("b", Some("root"), 1),
            test_node("a1", Some("a"), 0),
            test_node("a2", Some("a"), 1),
            test_node("a3", Some("a"), 2),
        ])
        .unwrap();
        let config = LayoutConfig::default();
        let children = vec!["a".to_string(), "b".to_string()];
        let shares = allocate_sectors(&tree, &children, TAU, &config);
        let sum: f32 = shares.iter().sum();
        assert!((sum - TAU).abs() < 1e-4);
        // "b" has no children but keeps at least the floor share.
        let floor = TAU / (2.0 * config.sector_floor_divisor);
        assert!(shares[1] >= floor * 0.99);
        assert!(shares[0] > shares[1]);
    }

    #[test]
    fn children_stay_inside_their_parents_half() {
        // Two root children, each with leaves: the subtree of the first
        // sweeps the first half of the circle, the second the rest.
        let mut nodes = vec![
            test_node("root", None, 0),
            test_node("a", Some("root"), 0),
            test_node("b", Some("root"), 1),
        ];
        for i in 0..3 {
            nodes.push(test_node(&format!("a{i}"), Some("a"), i as u32));
            nodes.push(test_node(&format!("b{i}"), Some("b"), i as u32));
        }
        let tree = Tree::new(nodes).unwrap();
        let config = LayoutConfig::default();
        let layout = compute_radial_layout(&tree, Orientation::Clockwise, &config);

        // a sits on the right half, b on the left (clockwise sweep).
        assert!(layout.positions["a"].x > 0.0);
        assert!(layout.positions["b"].x < 0.0);
    }

    #[test]
    fn collapsed_branches_get_no_descendant_positions() {
        let mut nodes = vec![
            test_node("root", None, 0),
            test_node("a", Some("root"), 0),
            test_node("b", Some("root"), 1),
            test_node("a1", Some("a"), 0),
        ];
        nodes[1].collapsed = true;
        let tree = Tree::new(nodes).unwrap();
        let layout =
            compute_radial_layout(&tree, Orientation::Clockwise, &LayoutConfig::default());
        assert!(layout.positions.contains_key("a"));
        assert!(!layout.positions.contains_key("a1"));
    }
}
