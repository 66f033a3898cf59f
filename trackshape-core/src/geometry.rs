/// Geometry primitives exchanged with callers
use nalgebra::{Point3, Vector3};
use std::fmt;
use std::ops::{Add, Sub};

/// A position in shape or track space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const ORIGIN: Point = Point::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_point3(self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }

    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Straight-line distance in 3D
    pub fn distance(&self, other: &Point) -> f64 {
        (self.to_point3() - other.to_point3()).norm()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<Point3<f64>> for Point {
    fn from(p: Point3<f64>) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}

impl From<Vector3<f64>> for Point {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl Add<Vector3<f64>> for Point {
    type Output = Point;

    fn add(self, rhs: Vector3<f64>) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point {
    type Output = Vector3<f64>;

    fn sub(self, rhs: Point) -> Vector3<f64> {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.x, self.y, self.z)
    }
}

/// A texture coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UvPoint {
    pub u: f64,
    pub v: f64,
}

impl UvPoint {
    pub const fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }
}

/// A normal vector. Not necessarily unit length.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Normal {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Normal {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Unit-length copy; the zero vector stays zero
    pub fn normalized(self) -> Self {
        let v = self.to_vector();
        let len = v.norm();
        if len > 0.0 {
            (v / len).into()
        } else {
            self
        }
    }
}

impl From<Vector3<f64>> for Normal {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Calculate the unit face normal of a triangle from its corner positions.
///
/// Uses the `(b - a) x (c - a)` winding. Degenerate triangles yield the
/// zero vector.
pub fn face_normal(a: &Point, b: &Point, c: &Point) -> Normal {
    let edge1 = *b - *a;
    let edge2 = *c - *a;
    Normal::from(edge1.cross(&edge2)).normalized()
}

/// One sample of a track centerline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterPoint {
    pub position: Point,
    /// Unit tangent in the direction of increasing `distance_along`
    pub heading: Vector3<f64>,
    /// Arc length from the first sample of the centerline
    pub distance_along: f64,
}

impl CenterPoint {
    pub fn new(position: Point, heading: Vector3<f64>, distance_along: f64) -> Self {
        Self {
            position,
            heading,
            distance_along,
        }
    }

    /// Horizontal unit vector to the right of the heading (`up x heading`).
    ///
    /// Falls back to +x when the heading is vertical.
    pub fn lateral(&self) -> Vector3<f64> {
        let lateral = Vector3::y().cross(&self.heading);
        let len = lateral.norm();
        if len > f64::EPSILON {
            lateral / len
        } else {
            Vector3::x()
        }
    }
}
