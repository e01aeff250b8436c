use serde::{Deserialize, Serialize};

/// Axis-aligned box in page pixel space, origin at the top-left corner.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Exclusive right edge, saturating at `i32::MAX`.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width.max(0)) * i64::from(self.height.max(0))
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Integer centre, rounded towards the top-left like pixel indices.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn center_f64(&self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }

    /// Inclusive on all four edges.
    pub fn contains_point(&self, (px, py): (i32, i32)) -> bool {
        self.x <= px && px <= self.right() && self.y <= py && py <= self.bottom()
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(Self::from_corners(x0, y0, x1, y1))
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    pub fn iou(&self, other: &Self) -> f64 {
        let inter_area = self.intersection(other).map(|b| b.area()).unwrap_or(0);
        let union = self.area() + other.area() - inter_area;
        if union <= 0 {
            0.0
        } else {
            inter_area as f64 / union as f64
        }
    }

    pub fn center_distance(&self, other: &Self) -> f64 {
        let (cx1, cy1) = self.center_f64();
        let (cx2, cy2) = other.center_f64();
        ((cx1 - cx2).powi(2) + (cy1 - cy2).powi(2)).sqrt()
    }

    /// Clips the box to a `width` x `height` canvas. Degenerate boxes keep at
    /// least one pixel so every element leaves a mark on the canvas.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let max_x = (width as i32 - 1).max(0);
        let max_y = (height as i32 - 1).max(0);
        let x = self.x.clamp(0, max_x);
        let y = self.y.clamp(0, max_y);
        let w = self.width.min(width as i32 - x).max(1);
        let h = self.height.min(height as i32 - y).max(1);
        Self::new(x, y, w, h)
    }

    /// Smallest box covering every box in the iterator.
    pub fn enclosing<'a>(boxes: impl IntoIterator<Item = &'a BBox>) -> Option<Self> {
        boxes.into_iter().fold(None, |acc, bbox| match acc {
            None => Some(*bbox),
            Some(current) => Some(current.union(bbox)),
        })
    }
}
