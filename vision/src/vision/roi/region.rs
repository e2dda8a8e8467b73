use nalgebra::Vector2;
use opencv::core::Rect;

/// Axis-aligned rectangle in pixel coordinates, `min` inclusive and `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub min: Vector2<i32>,
    pub max: Vector2<i32>,
}

impl Region {
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            min: Vector2::new(x1, y1),
            max: Vector2::new(x2, y2),
        }
    }

    pub fn full(width: i32, height: i32) -> Self {
        Self::from_corners(0, 0, width, height)
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self::from_corners(rect.x, rect.y, rect.x + rect.width, rect.y + rect.height)
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.min.x, self.min.y, self.width(), self.height())
    }

    pub fn x(&self) -> i32 {
        self.min.x
    }

    pub fn y(&self) -> i32 {
        self.min.y
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vector2<i32> {
        Vector2::new(self.min.x + self.width() / 2, self.min.y + self.height() / 2)
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Grows this region so that it also covers `other`.
    pub fn union(&self, other: &Region) -> Region {
        Region {
            min: Vector2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Vector2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn scaled(&self, x: f32, y: f32) -> Region {
        Region::from_corners(
            (self.min.x as f32 * x).round() as i32,
            (self.min.y as f32 * y).round() as i32,
            (self.max.x as f32 * x).round() as i32,
            (self.max.y as f32 * y).round() as i32,
        )
    }

    /// Clamps to `[0, width] x [0, height]`; a region that ends up empty becomes the full frame.
    pub fn clamped_or_full(&self, width: i32, height: i32) -> Region {
        let x1 = self.min.x.clamp(0, width);
        let y1 = self.min.y.clamp(0, height);
        let clamped = Region::from_corners(x1, y1, self.max.x.clamp(x1, width), self.max.y.clamp(y1, height));
        if clamped.is_degenerate() {
            log::debug!("Degenerate region {self:?}, using the full frame");
            Region::full(width, height)
        } else {
            clamped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_conversion_keeps_geometry() {
        let region = Region::from_rect(Rect::new(4, 6, 10, 20));
        assert_eq!(region.max, Vector2::new(14, 26));
        assert_eq!(region.to_rect(), Rect::new(4, 6, 10, 20));
    }

    #[test]
    fn union_covers_both() {
        let a = Region::from_corners(2, 8, 10, 12);
        let b = Region::from_corners(5, 1, 20, 9);
        assert_eq!(a.union(&b), Region::from_corners(2, 1, 20, 12));
    }

    #[test]
    fn empty_region_falls_back_to_full_frame() {
        let region = Region::from_corners(50, 50, 50, 70);
        assert_eq!(region.clamped_or_full(320, 240), Region::full(320, 240));

        let outside = Region::from_corners(-10, 5, 400, 100);
        assert_eq!(outside.clamped_or_full(320, 240), Region::from_corners(0, 5, 320, 100));
    }
}
