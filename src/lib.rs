#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod drag;
pub mod edit;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod layout_dump;
pub mod orientation;
pub mod tree;

pub use config::{Config, LayoutConfig, load_config};
pub use drag::{DragController, DragOutcome, DragSession, DragUpdate, HoverFeedback};
pub use edit::{DropTarget, GridSlot, NodeChange, TreeEdit, apply_edit, commit_move, propose_move};
pub use error::{EngineError, LayoutWarning};
pub use geometry::{Point, Rect};
pub use layout::{Layout, Position, ResolveReport, compute_layout, resolve_from_moved_node};
pub use orientation::{Orientation, Side, VisualSlot, to_data_index, to_visual_position};
pub use tree::{Node, Tree};

#[cfg(feature = "cli")]
pub use cli::run;
