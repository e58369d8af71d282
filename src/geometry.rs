//! Screen-space geometry shared by capture, matching and input injection.

use crate::util::{TriggerError, TriggerResult};
use std::fmt;

/// Integer screen coordinate, used both as a match position and a click target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this point shifted by `origin`.
    pub fn offset_by(self, origin: Point) -> Self {
        Self {
            x: self.x.saturating_add(origin.x),
            y: self.y.saturating_add(origin.y),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned capture rectangle, relative to the selected monitor.
///
/// Width and height are always non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rectangle {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl Rectangle {
    /// Creates a rectangle, rejecting zero-sized extents.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> TriggerResult<Self> {
        if width == 0 || height == 0 {
            return Err(TriggerError::InvalidDimensions {
                width: width as usize,
                height: height as usize,
            });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Top-left corner of the rectangle.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Top-left corner of the part that can lie on a monitor.
    ///
    /// Clipping against the monitor only ever trims a negative origin to zero,
    /// so this is where pixel `(0, 0)` of a clipped capture sits.
    pub fn visible_origin(&self) -> Point {
        Point::new(self.x.max(0), self.y.max(0))
    }

    /// Intersects the rectangle with a `bounds_width x bounds_height` frame
    /// anchored at the origin.
    ///
    /// Returns `(x, y, width, height)` in frame pixels, or `None` when the
    /// intersection is empty.
    pub fn clip_to(&self, bounds_width: u32, bounds_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = i64::from(self.x).max(0);
        let y0 = i64::from(self.y).max(0);
        let x1 = (i64::from(self.x) + i64::from(self.width)).min(i64::from(bounds_width));
        let y1 = (i64::from(self.y) + i64::from(self.height)).min(i64::from(bounds_height));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.x, self.y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Point, Rectangle};
    use crate::util::TriggerError;

    #[test]
    fn rectangle_rejects_zero_extent() {
        assert_eq!(
            Rectangle::new(0, 0, 0, 5).unwrap_err(),
            TriggerError::InvalidDimensions {
                width: 0,
                height: 5
            }
        );
        assert!(Rectangle::new(0, 0, 5, 0).is_err());
    }

    #[test]
    fn clip_keeps_inner_rectangle() {
        let rect = Rectangle::new(375, 160, 550, 950).unwrap();
        assert_eq!(rect.clip_to(2560, 1440), Some((375, 160, 550, 950)));
    }

    #[test]
    fn clip_trims_overhang_and_negative_origin() {
        let rect = Rectangle::new(-10, 90, 50, 50).unwrap();
        assert_eq!(rect.clip_to(100, 100), Some((0, 90, 40, 10)));
    }

    #[test]
    fn visible_origin_matches_clip() {
        let rect = Rectangle::new(-10, -5, 60, 60).unwrap();
        assert_eq!(rect.visible_origin(), Point::new(0, 0));
        let (x, y, _, _) = rect.clip_to(100, 100).unwrap();
        assert_eq!(rect.visible_origin(), Point::new(x as i32, y as i32));
        let inside = Rectangle::new(12, 7, 5, 5).unwrap();
        assert_eq!(inside.visible_origin(), inside.origin());
    }

    #[test]
    fn clip_outside_frame_is_none() {
        let rect = Rectangle::new(200, 200, 10, 10).unwrap();
        assert_eq!(rect.clip_to(100, 100), None);
    }

    #[test]
    fn point_offset_adds_origin() {
        let hit = Point::new(4, 7).offset_by(Point::new(375, 160));
        assert_eq!(hit, Point::new(379, 167));
    }
}
