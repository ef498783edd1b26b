use shared::{PLAYER_RADIUS, TRAIL_STROKE_WIDTH, WORLD_HEIGHT, WORLD_WIDTH};

///Represents a point or offset in arena space.
/// Positive x is to the right, positive y is down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(&self, other: &Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f64) -> Vector2 {
        Vector2::new(self.x * scalar, self.y * scalar)
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2::new(self.x + other.x, self.y + other.y)
    }

    ///Returns `self - other`.
    pub fn sub(&self, other: &Vector2) -> Vector2 {
        Vector2::new(self.x - other.x, self.y - other.y)
    }

    pub fn distance(&self, other: &Vector2) -> f64 {
        self.sub(other).magnitude()
    }
}

///Shortest distance from `point` to the segment `a`-`b`.
pub fn distance_to_segment(point: &Vector2, a: &Vector2, b: &Vector2) -> f64 {
    let ab = b.sub(a);
    let length_sq = ab.dot(&ab);
    if length_sq == 0.0 {
        return point.distance(a);
    }

    let t = (point.sub(a).dot(&ab) / length_sq).clamp(0.0, 1.0);
    point.distance(&a.add(&ab.scale(t)))
}

///True when a cycle head at `position` touches one of the four walls.
pub fn hits_wall(position: &Vector2) -> bool {
    position.x < PLAYER_RADIUS
        || position.x > WORLD_WIDTH - PLAYER_RADIUS
        || position.y < PLAYER_RADIUS
        || position.y > WORLD_HEIGHT - PLAYER_RADIUS
}

///The path a cycle has drawn this round, treated as a polyline stroked
/// with [`TRAIL_STROKE_WIDTH`].
#[derive(Debug, Clone, Default)]
pub struct Trail {
    points: Vec<Vector2>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: Vector2) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Vector2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point-vs-thick-polyline hit test.
    ///
    /// A point is inside the trail when it lies within half the stroke width
    /// of any segment. A single-point trail is a dot of the same width.
    pub fn contains(&self, point: &Vector2) -> bool {
        let half_width = TRAIL_STROKE_WIDTH / 2.0;

        match self.points.as_slice() {
            [] => false,
            [only] => point.distance(only) <= half_width,
            points => points
                .windows(2)
                .any(|segment| distance_to_segment(point, &segment[0], &segment[1]) <= half_width),
        }
    }
}
