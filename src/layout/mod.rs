//! Pane layout: the resizable preview and console panes.

pub mod geometry;
pub mod manager;
pub mod pointer;

pub use geometry::{Point, Rect};
pub use manager::{DragAxis, LayoutBounds, LayoutManager, LayoutState};
pub use pointer::{ListenerGuard, ListenerRegistry};
