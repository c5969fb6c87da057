//! Pure coordinate math for boxes on the canvas.
//!
//! Every function here is deterministic and side-effect free. Rounding is
//! half-away-from-zero throughout (`f64::round`), so a rescale followed by its
//! inverse lands back within one pixel of where it started.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Geometry validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("Rectangle has non-positive size: {w}x{h}")]
    NonPositiveSize { w: i32, h: i32 },
    #[error("Cannot scale relative to a degenerate parent ({w}x{h})")]
    DegenerateParent { w: i32, h: i32 },
}

/// Integer pixel rectangle with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoxRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoxRect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// X coordinate of the right edge.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    /// Y coordinate of the bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    /// Whether both dimensions are strictly positive.
    pub fn is_valid(&self) -> bool {
        self.w > 0 && self.h > 0
    }

    /// Move the rectangle by an offset, keeping its size.
    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy), self.w, self.h)
    }

    /// Move the rectangle to an absolute position, keeping its size.
    pub fn with_position(self, x: i32, y: i32) -> Self {
        Self::new(x, y, self.w, self.h)
    }

    /// Hit-test a pointer position (in canvas pixels).
    pub fn contains(&self, point: Point) -> bool {
        self.to_kurbo().contains(point)
    }

    /// Edges are computed in `f64` so extreme coordinates cannot overflow.
    pub fn to_kurbo(&self) -> Rect {
        let (x, y) = (self.x as f64, self.y as f64);
        Rect::new(x, y, x + self.w as f64, y + self.h as f64)
    }
}

impl From<BoxRect> for Rect {
    fn from(rect: BoxRect) -> Self {
        rect.to_kurbo()
    }
}

/// Horizontal placement of a box inside its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Round a pixel value half away from zero.
pub fn round_px(value: f64) -> i32 {
    value.round() as i32
}

/// Normalise two pointer positions into a rectangle with non-negative size.
///
/// Pointer coordinates are rounded to whole pixels first, so the returned
/// rectangle spans exactly from the smaller to the larger rounded corner.
pub fn drag_create_rect(start: Point, current: Point) -> BoxRect {
    let (x0, y0) = (round_px(start.x), round_px(start.y));
    let (x1, y1) = (round_px(current.x), round_px(current.y));
    let span = |a: i32, b: i32| a.abs_diff(b).min(i32::MAX as u32) as i32;
    BoxRect::new(x0.min(x1), y0.min(y1), span(x0, x1), span(y0, y1))
}

/// Grow a rectangle to at least `min_w` x `min_h`. Position is unchanged.
pub fn clamp_min_size(rect: BoxRect, min_w: i32, min_h: i32) -> BoxRect {
    BoxRect::new(rect.x, rect.y, rect.w.max(min_w), rect.h.max(min_h))
}

/// Reject rectangles whose width or height is not strictly positive.
pub fn validate_rect(rect: BoxRect) -> Result<BoxRect, GeometryError> {
    if rect.is_valid() {
        Ok(rect)
    } else {
        Err(GeometryError::NonPositiveSize { w: rect.w, h: rect.h })
    }
}

/// Map a child rectangle from an old parent frame into a new one.
///
/// The child's offset from the parent origin and its size are scaled by the
/// ratio of the new parent size to the old one, independently per axis.
/// Scaled sizes never drop below one pixel.
pub fn rescale_proportional(
    old_parent: BoxRect,
    new_parent: BoxRect,
    child: BoxRect,
) -> Result<BoxRect, GeometryError> {
    if old_parent.w <= 0 || old_parent.h <= 0 {
        return Err(GeometryError::DegenerateParent {
            w: old_parent.w,
            h: old_parent.h,
        });
    }
    validate_rect(new_parent)?;

    let scale_x = new_parent.w as f64 / old_parent.w as f64;
    let scale_y = new_parent.h as f64 / old_parent.h as f64;
    let rel_x = child.x as f64 - old_parent.x as f64;
    let rel_y = child.y as f64 - old_parent.y as f64;

    Ok(BoxRect::new(
        new_parent.x.saturating_add(round_px(rel_x * scale_x)),
        new_parent.y.saturating_add(round_px(rel_y * scale_y)),
        round_px(child.w as f64 * scale_x).max(1),
        round_px(child.h as f64 * scale_y).max(1),
    ))
}

/// X offset that places a box of `box_width` inside `container_width`.
pub fn align_within(container_width: i32, box_width: i32, alignment: Alignment) -> i32 {
    match alignment {
        Alignment::Left => 0,
        Alignment::Center => round_px((container_width - box_width) as f64 / 2.0),
        Alignment::Right => container_width - box_width,
    }
}

/// Height that keeps a `natural_w` x `natural_h` image proportional at `target_w`.
pub fn fit_width(natural_w: i32, natural_h: i32, target_w: i32) -> Result<i32, GeometryError> {
    if natural_w <= 0 || natural_h <= 0 {
        return Err(GeometryError::DegenerateParent {
            w: natural_w,
            h: natural_h,
        });
    }
    Ok(round_px(natural_h as f64 * target_w as f64 / natural_w as f64).max(1))
}

/// Resize handle positions around a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResizeHandle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl ResizeHandle {
    fn moves_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::Left | Self::BottomLeft)
    }

    fn moves_right(self) -> bool {
        matches!(self, Self::TopRight | Self::Right | Self::BottomRight)
    }

    fn moves_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::Top | Self::TopRight)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::Bottom | Self::BottomRight)
    }
}

/// Apply a pointer delta to one resize handle.
///
/// The edges opposite the handle stay fixed; the result never shrinks below
/// `min_w` x `min_h`.
pub fn resize_from_handle(
    rect: BoxRect,
    handle: ResizeHandle,
    dx: i32,
    dy: i32,
    min_w: i32,
    min_h: i32,
) -> BoxRect {
    let (mut left, mut top, mut right, mut bottom) = (rect.x, rect.y, rect.right(), rect.bottom());

    if handle.moves_left() {
        left = left.saturating_add(dx).min(right.saturating_sub(min_w));
    }
    if handle.moves_right() {
        right = right.saturating_add(dx).max(left.saturating_add(min_w));
    }
    if handle.moves_top() {
        top = top.saturating_add(dy).min(bottom.saturating_sub(min_h));
    }
    if handle.moves_bottom() {
        bottom = bottom.saturating_add(dy).max(top.saturating_add(min_h));
    }

    let (w, h) = (right.saturating_sub(left), bottom.saturating_sub(top));
    clamp_min_size(BoxRect::new(left, top, w, h), min_w, min_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_create_normalizes_corners() {
        let rect = drag_create_rect(Point::new(300.0, 50.0), Point::new(100.0, 250.0));
        assert_eq!(rect, BoxRect::new(100, 50, 200, 200));
    }

    #[test]
    fn test_drag_create_rounds_pointer_positions() {
        let rect = drag_create_rect(Point::new(10.4, 10.5), Point::new(20.5, -0.5));
        assert_eq!(rect, BoxRect::new(10, -1, 11, 12));
    }

    #[test]
    fn test_clamp_min_size() {
        let rect = clamp_min_size(BoxRect::new(10, 10, 5, 5), 40, 40);
        assert_eq!(rect, BoxRect::new(10, 10, 40, 40));

        let big = clamp_min_size(BoxRect::new(-3, 4, 80, 90), 40, 40);
        assert_eq!(big, BoxRect::new(-3, 4, 80, 90));
    }

    #[test]
    fn test_validate_rect() {
        assert!(validate_rect(BoxRect::new(0, 0, 1, 1)).is_ok());
        assert_eq!(
            validate_rect(BoxRect::new(0, 0, 0, 10)),
            Err(GeometryError::NonPositiveSize { w: 0, h: 10 })
        );
    }

    #[test]
    fn test_align_within() {
        assert_eq!(align_within(1100, 200, Alignment::Center), 450);
        assert_eq!(align_within(1100, 200, Alignment::Left), 0);
        assert_eq!(align_within(1100, 200, Alignment::Right), 900);
        // Odd gaps round half away from zero.
        assert_eq!(align_within(101, 100, Alignment::Center), 1);
    }

    #[test]
    fn test_rescale_halves_width() {
        let old_parent = BoxRect::new(0, 0, 500, 300);
        let new_parent = BoxRect::new(0, 0, 250, 300);
        let child = BoxRect::new(50, 20, 100, 40);

        let scaled = rescale_proportional(old_parent, new_parent, child).unwrap();
        assert_eq!(scaled, BoxRect::new(25, 20, 50, 40));
    }

    #[test]
    fn test_rescale_follows_parent_translation() {
        let old_parent = BoxRect::new(100, 100, 400, 200);
        let new_parent = BoxRect::new(300, 50, 800, 100);
        let child = BoxRect::new(150, 120, 40, 20);

        let scaled = rescale_proportional(old_parent, new_parent, child).unwrap();
        assert_eq!(scaled, BoxRect::new(400, 60, 80, 10));
    }

    #[test]
    fn test_rescale_rejects_degenerate_parent() {
        let child = BoxRect::new(0, 0, 10, 10);
        let new_parent = BoxRect::new(0, 0, 100, 100);

        assert_eq!(
            rescale_proportional(BoxRect::new(0, 0, 0, 100), new_parent, child),
            Err(GeometryError::DegenerateParent { w: 0, h: 100 })
        );
        assert_eq!(
            rescale_proportional(BoxRect::new(0, 0, 100, 0), new_parent, child),
            Err(GeometryError::DegenerateParent { w: 100, h: 0 })
        );
    }

    #[test]
    fn test_rescale_never_yields_zero_size() {
        let scaled = rescale_proportional(
            BoxRect::new(0, 0, 1000, 1000),
            BoxRect::new(0, 0, 10, 10),
            BoxRect::new(0, 0, 20, 20),
        )
        .unwrap();
        assert_eq!((scaled.w, scaled.h), (1, 1));
    }

    #[test]
    fn test_fit_width() {
        assert_eq!(fit_width(1600, 900, 800), Ok(450));
        assert!(fit_width(0, 900, 800).is_err());
    }

    #[test]
    fn test_resize_bottom_right_grows() {
        let rect = BoxRect::new(10, 10, 100, 50);
        let resized = resize_from_handle(rect, ResizeHandle::BottomRight, 20, 30, 16, 16);
        assert_eq!(resized, BoxRect::new(10, 10, 120, 80));
    }

    #[test]
    fn test_resize_top_left_keeps_opposite_corner() {
        let rect = BoxRect::new(10, 10, 100, 50);
        let resized = resize_from_handle(rect, ResizeHandle::TopLeft, 95, 45, 16, 16);
        assert_eq!(resized, BoxRect::new(94, 44, 16, 16));
        assert_eq!(resized.right(), rect.right());
        assert_eq!(resized.bottom(), rect.bottom());
    }

    #[test]
    fn test_resize_edge_only_moves_one_axis() {
        let rect = BoxRect::new(0, 0, 100, 100);
        let resized = resize_from_handle(rect, ResizeHandle::Right, 25, 999, 16, 16);
        assert_eq!(resized, BoxRect::new(0, 0, 125, 100));
    }

    #[test]
    fn test_contains_point() {
        let rect = BoxRect::new(10, 10, 20, 20);
        assert!(rect.contains(Point::new(15.0, 15.0)));
        assert!(!rect.contains(Point::new(31.0, 15.0)));
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let rect = BoxRect::new(i32::MAX, i32::MAX - 1, 100, 100);
        assert_eq!(rect.right(), i32::MAX);
        assert_eq!(rect.bottom(), i32::MAX);
        assert!(!rect.contains(Point::new(5.0, 5.0)));
        assert_eq!(rect.translate(10, 10).x, i32::MAX);

        let far = drag_create_rect(Point::new(-3.0e9, 0.0), Point::new(3.0e9, 10.0));
        assert_eq!(far.w, i32::MAX);

        let moved = rescale_proportional(
            BoxRect::new(i32::MIN, 0, 100, 100),
            BoxRect::new(i32::MAX - 10, 0, 100, 100),
            BoxRect::new(i32::MAX - 50, 0, 10, 10),
        )
        .unwrap();
        assert_eq!(moved.x, i32::MAX);

        let grown = resize_from_handle(rect, ResizeHandle::BottomRight, 500, 500, 1, 1);
        assert!(grown.is_valid());
    }
}
