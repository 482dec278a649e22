use serde::{Deserialize, Serialize};

/// Left/right classification of a branch relative to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// How canonical sibling order maps to visual slots. A pure view
/// parameter: switching orientation never touches `order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Orientation {
    Clockwise,
    Anticlockwise,
    LeftToRight,
    RightToLeft,
}

impl Orientation {
    /// The two angular modes lay branches on rings; the linear modes
    /// use indented block stacking.
    pub fn is_angular(self) -> bool {
        matches!(self, Self::Clockwise | Self::Anticlockwise)
    }

    /// Side receiving the first half of the canonical order.
    pub fn leading_side(self) -> Side {
        match self {
            Self::Clockwise | Self::LeftToRight => Side::Right,
            Self::Anticlockwise | Self::RightToLeft => Side::Left,
        }
    }

    /// Side whose within-side visual order runs bottom-to-top, so that
    /// the angular modes read as one continuous clock sweep. A function
    /// of orientation alone, applied against the side a branch inherits
    /// from its root-child ancestor (mirroring across the root's axis,
    /// never a node's local parent axis).
    pub fn reversed_side(self) -> Option<Side> {
        match self {
            Self::Clockwise => Some(Side::Left),
            Self::Anticlockwise => Some(Side::Right),
            Self::LeftToRight | Self::RightToLeft => None,
        }
    }
}

/// A visual slot among a node's siblings: which side of the root the
/// slot sits on and its top-to-bottom index within that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualSlot {
    pub side: Side,
    pub index_on_side: usize,
}

/// Number of siblings the leading side takes out of `total`.
fn leading_count(total: usize) -> usize {
    total.div_ceil(2)
}

/// Maps a canonical sibling index to its visual slot. Bijective over
/// `[0, total)` for a fixed `(orientation, total)`; `to_data_index` is
/// the exact inverse.
pub fn to_visual_position(data_index: usize, orientation: Orientation, total: usize) -> VisualSlot {
    debug_assert!(data_index < total);
    let mid = leading_count(total);
    let leading = orientation.leading_side();
    if data_index < mid {
        return VisualSlot {
            side: leading,
            index_on_side: data_index,
        };
    }
    let trailing = leading.opposite();
    let offset = data_index - mid;
    let trailing_total = total - mid;
    let index_on_side = if orientation.reversed_side() == Some(trailing) {
        trailing_total - 1 - offset
    } else {
        offset
    };
    VisualSlot {
        side: trailing,
        index_on_side,
    }
}

/// Inverse of [`to_visual_position`].
pub fn to_data_index(slot: VisualSlot, orientation: Orientation, total: usize) -> usize {
    let mid = leading_count(total);
    let leading = orientation.leading_side();
    if slot.side == leading {
        debug_assert!(slot.index_on_side < mid);
        return slot.index_on_side;
    }
    let trailing_total = total - mid;
    debug_assert!(slot.index_on_side < trailing_total);
    let offset = if orientation.reversed_side() == Some(slot.side) {
        trailing_total - 1 - slot.index_on_side
    } else {
        slot.index_on_side
    };
    mid + offset
}

/// Visual top-to-bottom ordering of `count` same-side siblings whose
/// branch sits on `side`. Identity for the linear modes and for the
/// non-reversed side of the angular modes.
pub fn visual_order(side: Side, orientation: Orientation, count: usize) -> Vec<usize> {
    if orientation.reversed_side() == Some(side) {
        (0..count).rev().collect()
    } else {
        (0..count).collect()
    }
}
