//! Pointer gestures that turn input into candidate rectangles.

use crate::geometry::{BoxRect, clamp_min_size, drag_create_rect};
use crate::store::{FREEHAND_MIN_BOX_SIZE, Tool};
use kurbo::Point;

/// State of a drag-to-create interaction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    /// Waiting for a pointer press.
    #[default]
    Idle,
    /// Pointer is down and a box is being drawn.
    Drawing {
        /// Where the pointer went down.
        start: Point,
        /// Latest pointer position.
        current: Point,
    },
}

/// Drag-to-create gesture for the add-box tool.
#[derive(Debug, Clone)]
pub struct CreateGesture {
    state: GestureState,
    min_size: i32,
}

impl Default for CreateGesture {
    fn default() -> Self {
        Self::new(FREEHAND_MIN_BOX_SIZE)
    }
}

impl CreateGesture {
    pub fn new(min_size: i32) -> Self {
        Self {
            state: GestureState::Idle,
            min_size,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, GestureState::Drawing { .. })
    }

    /// Start drawing. Ignored unless the add-box tool is active.
    pub fn begin(&mut self, tool: Tool, point: Point) -> bool {
        if tool != Tool::AddBox {
            return false;
        }
        self.state = GestureState::Drawing {
            start: point,
            current: point,
        };
        true
    }

    /// Track pointer movement while drawing.
    pub fn update(&mut self, point: Point) {
        if let GestureState::Drawing { current, .. } = &mut self.state {
            *current = point;
        }
    }

    /// The rectangle as drawn so far, before minimum-size clamping.
    pub fn preview(&self) -> Option<BoxRect> {
        match self.state {
            GestureState::Drawing { start, current } => Some(drag_create_rect(start, current)),
            GestureState::Idle => None,
        }
    }

    /// Release the pointer and produce the final, clamped rectangle.
    pub fn finish(&mut self, point: Point) -> Option<BoxRect> {
        self.update(point);
        let rect = self.preview()?;
        self.state = GestureState::Idle;
        Some(clamp_min_size(rect, self.min_size, self.min_size))
    }

    pub fn cancel(&mut self) {
        self.state = GestureState::Idle;
    }
}
