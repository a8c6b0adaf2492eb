use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Four-point polygon in reading order: top-left, top-right, bottom-right,
/// bottom-left. Rotated text keeps the order relative to its own baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    pub fn from_rect(left: f32, top: f32, width: f32, height: f32) -> Self {
        Quad([
            Point::new(left, top),
            Point::new(left + width, top),
            Point::new(left + width, top + height),
            Point::new(left, top + height),
        ])
    }

    pub fn top_left(&self) -> Point {
        self.0[0]
    }

    pub fn top_right(&self) -> Point {
        self.0[1]
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    pub fn bounds(&self) -> Bounds {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for point in &self.0 {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        Bounds {
            left: min_x.floor().max(0.0) as u32,
            top: min_y.floor().max(0.0) as u32,
            right: max_x.ceil().max(0.0) as u32,
            bottom: max_y.ceil().max(0.0) as u32,
        }
    }
}

/// Axis-aligned pixel rectangle. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Bounds {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) as f32 * 0.5,
            (self.top + self.bottom) as f32 * 0.5,
        )
    }

    pub fn clamp_to(&self, width: u32, height: u32) -> Bounds {
        Bounds {
            left: self.left.min(width),
            top: self.top.min(height),
            right: self.right.min(width),
            bottom: self.bottom.min(height),
        }
    }

    /// Shrinks every side by `inset` pixels; `None` when nothing is left.
    pub fn inset(&self, inset: u32) -> Option<Bounds> {
        let inner = Bounds {
            left: self.left.saturating_add(inset),
            top: self.top.saturating_add(inset),
            right: self.right.saturating_sub(inset),
            bottom: self.bottom.saturating_sub(inset),
        };
        if inner.right <= inner.left || inner.bottom <= inner.top {
            None
        } else {
            Some(inner)
        }
    }
}

/// Angle in degrees of the vector `from -> to`, clockwise positive in image
/// coordinates (y grows downward).
pub fn edge_angle_degrees(from: Point, to: Point) -> f32 {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx.abs() < f32::EPSILON && dy.abs() < f32::EPSILON {
        return 0.0;
    }
    dy.atan2(dx).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_bounds_cover_rotated_points() {
        let quad = Quad([
            Point::new(10.2, 5.0),
            Point::new(50.0, 9.7),
            Point::new(48.0, 30.0),
            Point::new(8.5, 25.1),
        ]);
        let bounds = quad.bounds();
        assert_eq!(
            bounds,
            Bounds {
                left: 8,
                top: 5,
                right: 50,
                bottom: 30
            }
        );
    }

    #[test]
    fn union_takes_outer_edges() {
        let a = Quad::from_rect(0.0, 10.0, 20.0, 10.0).bounds();
        let b = Quad::from_rect(30.0, 5.0, 10.0, 30.0).bounds();
        let merged = a.union(&b);
        assert_eq!((merged.left, merged.top, merged.right, merged.bottom), (0, 5, 40, 35));
        assert_eq!(merged.width(), 40);
        assert_eq!(merged.height(), 30);
    }

    #[test]
    fn inset_collapses_small_boxes() {
        let bounds = Quad::from_rect(0.0, 0.0, 4.0, 10.0).bounds();
        assert!(bounds.inset(2).is_none());
        assert_eq!(bounds.inset(1).map(|b| b.width()), Some(2));
    }

    #[test]
    fn edge_angle_is_zero_for_horizontal_edges() {
        assert_eq!(edge_angle_degrees(Point::new(0.0, 0.0), Point::new(100.0, 0.0)), 0.0);
        let angle = edge_angle_degrees(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        assert!((angle - 45.0).abs() < 1e-4);
    }
}
