//! Pointer-drag handling shared by both views
//!
//! The controller turns drag gestures into position overrides on a
//! [`DragTarget`]. Each target updates the link geometry it owns
//! synchronously inside `drag_moved`, so the next frame never shows links
//! detached from a moved node.

use tracing::debug;

use crate::geometry::Point;

/// A layout that can have one of its nodes moved by the user
pub trait DragTarget {
    /// Resolve a node id to the layout's node index
    fn node_index(&self, id: &str) -> Option<usize>;

    /// The node at `index` is now under direct user control
    fn drag_started(&mut self, index: usize);

    /// Move the node toward `pointer`; returns the position actually applied
    /// after any clamping
    fn drag_moved(&mut self, index: usize, pointer: Point) -> Point;

    /// The node is released back to automatic layout
    fn drag_ended(&mut self, index: usize);
}

impl<T: DragTarget + ?Sized> DragTarget for &mut T {
    fn node_index(&self, id: &str) -> Option<usize> {
        (**self).node_index(id)
    }

    fn drag_started(&mut self, index: usize) {
        (**self).drag_started(index)
    }

    fn drag_moved(&mut self, index: usize, pointer: Point) -> Point {
        (**self).drag_moved(index, pointer)
    }

    fn drag_ended(&mut self, index: usize) {
        (**self).drag_ended(index)
    }
}

#[derive(Debug, Clone)]
struct ActiveDrag {
    id: String,
    index: usize,
}

/// Single-pointer drag state machine over a layout
#[derive(Debug)]
pub struct InteractionController<T> {
    target: T,
    active: Option<ActiveDrag>,
}

impl<T: DragTarget> InteractionController<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            active: None,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_inner(self) -> T {
        self.target
    }

    /// Id of the node currently being dragged
    pub fn active(&self) -> Option<&str> {
        self.active.as_ref().map(|drag| drag.id.as_str())
    }

    /// Begin dragging a node. Ignored (returns `false`) while another drag
    /// is active or when the id is unknown.
    pub fn on_drag_start(&mut self, id: &str) -> bool {
        if let Some(active) = &self.active {
            debug!(active = %active.id, requested = id, "drag already active; ignoring start");
            return false;
        }
        let Some(index) = self.target.node_index(id) else {
            debug!(node = id, "drag start on unknown node ignored");
            return false;
        };

        self.target.drag_started(index);
        self.active = Some(ActiveDrag {
            id: id.to_string(),
            index,
        });
        true
    }

    /// Move the dragged node. Returns the applied (clamped) position, or
    /// `None` when `id` is not the node being dragged or the pointer has a
    /// non-finite coordinate. Such moves leave the layout untouched.
    pub fn on_drag_move(&mut self, id: &str, pointer: Point) -> Option<Point> {
        let index = self.active.as_ref().filter(|drag| drag.id == id)?.index;
        if !(pointer.x.is_finite() && pointer.y.is_finite()) {
            debug!(id, x = pointer.x, y = pointer.y, "ignoring non-finite pointer");
            return None;
        }
        Some(self.target.drag_moved(index, pointer))
    }

    /// Finish the drag of `id`; returns `false` when it was not active
    pub fn on_drag_end(&mut self, id: &str) -> bool {
        match self.active.take() {
            Some(drag) if drag.id == id => {
                self.target.drag_ended(drag.index);
                true
            }
            other => {
                self.active = other;
                false
            }
        }
    }
}
