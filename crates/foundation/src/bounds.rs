/// Axis-aligned screen-space rectangles.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn from_origin_size(origin: [f64; 2], w: f64, h: f64) -> Self {
        Aabb2 {
            min: origin,
            max: [origin[0] + w, origin[1] + h],
        }
    }

    pub fn width(&self) -> f64 {
        (self.max[0] - self.min[0]).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max[1] - self.min[1]).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        ]
    }

    pub fn contains_point(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }

    pub fn intersects(&self, other: &Self) -> bool {
        !(self.max[0] < other.min[0]
            || self.min[0] > other.max[0]
            || self.max[1] < other.min[1]
            || self.min[1] > other.max[1])
    }

    /// Area of overlap with `other`; zero when disjoint.
    pub fn intersection_area(&self, other: &Self) -> f64 {
        let w = self.max[0].min(other.max[0]) - self.min[0].max(other.min[0]);
        let h = self.max[1].min(other.max[1]) - self.min[1].max(other.min[1]);
        if w <= 0.0 || h <= 0.0 { 0.0 } else { w * h }
    }
}
