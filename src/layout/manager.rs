//! Resizable pane layout driven by divider drags.
//!
//! # State Machine
//!
//! ```text
//!              pointer_down(Horizontal)
//!   ┌──────┐ ─────────────────────────► ┌────────────┐
//!   │ None │                            │ Horizontal │
//!   └──────┘ ◄───────────────────────── └────────────┘
//!     │  ▲          pointer_up
//!     │  │ pointer_up
//!     ▼  │
//!   ┌──────────┐
//!   │ Vertical │  ◄── pointer_down(Vertical)
//!   └──────────┘
//! ```
//!
//! A global pointer listener is attached on entry to a drag state and
//! detached on exit. While a drag is active the preview pane must be covered
//! by an overlay, otherwise the sandboxed preview swallows the pointer events.

use serde::{Deserialize, Serialize};

use crate::layout::geometry::{Point, Rect};
use crate::layout::pointer::{ListenerGuard, ListenerRegistry};

/// Which divider, if any, is being dragged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragAxis {
    /// No drag in progress.
    #[default]
    None,
    /// The editor/preview divider: resizes the preview width.
    Horizontal,
    /// The preview/console divider: resizes the console height.
    Vertical,
}

/// Limits and defaults of the two resizable dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutBounds {
    /// Smallest preview width, as a fraction of the workspace.
    pub min_preview_fraction: f64,
    /// Largest preview width, as a fraction of the workspace.
    pub max_preview_fraction: f64,
    /// Initial preview width fraction.
    pub default_preview_fraction: f64,
    /// Smallest console height in pixels.
    pub min_console_height: f64,
    /// Largest console height in pixels.
    pub max_console_height: f64,
    /// Initial console height in pixels.
    pub default_console_height: f64,
}

impl Default for LayoutBounds {
    fn default() -> Self {
        Self {
            min_preview_fraction: 0.20,
            max_preview_fraction: 0.80,
            default_preview_fraction: 0.40,
            min_console_height: 100.0,
            max_console_height: 500.0,
            default_console_height: 192.0,
        }
    }
}

impl LayoutBounds {
    /// Repair unusable bounds: non-finite values fall back to the defaults,
    /// reversed ranges are swapped and each default is pulled into its range.
    pub fn normalized(self) -> Self {
        let fallback = Self::default();
        let (min_preview_fraction, max_preview_fraction) = ordered(
            finite_or(self.min_preview_fraction, fallback.min_preview_fraction),
            finite_or(self.max_preview_fraction, fallback.max_preview_fraction),
        );
        let (min_console_height, max_console_height) = ordered(
            finite_or(self.min_console_height, fallback.min_console_height),
            finite_or(self.max_console_height, fallback.max_console_height),
        );
        Self {
            min_preview_fraction,
            max_preview_fraction,
            default_preview_fraction: finite_or(self.default_preview_fraction, fallback.default_preview_fraction)
                .clamp(min_preview_fraction, max_preview_fraction),
            min_console_height,
            max_console_height,
            default_console_height: finite_or(self.default_console_height, fallback.default_console_height)
                .clamp(min_console_height, max_console_height),
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Current pane dimensions and drag state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutState {
    /// Share of the workspace width given to the preview pane.
    pub preview_width_fraction: f64,
    /// Height of the console pane in pixels.
    pub console_height_px: f64,
    /// Active drag, if any.
    pub drag_axis: DragAxis,
}

impl LayoutState {
    fn initial(bounds: &LayoutBounds) -> Self {
        Self {
            preview_width_fraction: bounds.default_preview_fraction,
            console_height_px: bounds.default_console_height,
            drag_axis: DragAxis::None,
        }
    }
}

/// Owns the layout state and the drag's pointer listener.
#[derive(Debug)]
pub struct LayoutManager {
    bounds: LayoutBounds,
    state: LayoutState,
    listeners: ListenerRegistry,
    listener: Option<ListenerGuard>,
}

impl Default for LayoutManager {
    fn default() -> Self {
        Self::new(ListenerRegistry::new())
    }
}

impl LayoutManager {
    /// Create a manager with the default bounds.
    pub fn new(listeners: ListenerRegistry) -> Self {
        Self::with_bounds(LayoutBounds::default(), listeners)
    }

    /// Create a manager with custom bounds, normalized first.
    pub fn with_bounds(bounds: LayoutBounds, listeners: ListenerRegistry) -> Self {
        let bounds = bounds.normalized();
        Self {
            state: LayoutState::initial(&bounds),
            bounds,
            listeners,
            listener: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> LayoutState {
        self.state
    }

    /// The bounds in effect.
    pub fn bounds(&self) -> &LayoutBounds {
        &self.bounds
    }

    /// Active drag axis.
    pub fn drag_axis(&self) -> DragAxis {
        self.state.drag_axis
    }

    /// Check if a drag is in progress.
    pub fn is_dragging(&self) -> bool {
        self.state.drag_axis != DragAxis::None
    }

    /// Whether the preview must be covered to capture pointer events.
    pub fn overlay_visible(&self) -> bool {
        self.is_dragging()
    }

    /// Start dragging a divider. Ignored while another drag is active.
    pub fn pointer_down(&mut self, axis: DragAxis) {
        if axis == DragAxis::None || self.is_dragging() {
            return;
        }
        self.listener = Some(self.listeners.attach());
        self.state.drag_axis = axis;
        tracing::trace!(?axis, "drag started");
    }

    /// Track the pointer during a drag. Returns `true` if a dimension changed.
    pub fn pointer_move(&mut self, pointer: Point, container: Rect) -> bool {
        match self.state.drag_axis {
            DragAxis::None => false,
            DragAxis::Horizontal => {
                if !container.has_width() {
                    return false;
                }
                let raw = (container.right() - pointer.x) / container.width;
                if !raw.is_finite() {
                    return false;
                }
                let fraction = raw.clamp(self.bounds.min_preview_fraction, self.bounds.max_preview_fraction);
                let changed = fraction != self.state.preview_width_fraction;
                self.state.preview_width_fraction = fraction;
                changed
            }
            DragAxis::Vertical => {
                let raw = container.bottom() - pointer.y;
                if !raw.is_finite() {
                    return false;
                }
                let height = raw.clamp(self.bounds.min_console_height, self.bounds.max_console_height);
                let changed = height != self.state.console_height_px;
                self.state.console_height_px = height;
                changed
            }
        }
    }

    /// End any drag and detach its listener.
    pub fn pointer_up(&mut self) {
        if self.listener.take().is_some() {
            tracing::trace!(axis = ?self.state.drag_axis, "drag ended");
        }
        self.state.drag_axis = DragAxis::None;
    }

    /// Restore both dimensions to their defaults. An active drag continues.
    pub fn reset(&mut self) {
        self.state.preview_width_fraction = self.bounds.default_preview_fraction;
        self.state.console_height_px = self.bounds.default_console_height;
    }
}
