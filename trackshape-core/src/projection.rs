/// Projection of 3D geometry onto the coordinate planes used by track queries
use nalgebra::{Point2, Vector2, Vector3};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::geometry::Point;

/// Coordinate plane a query is evaluated in; the remaining axis is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    /// Ground plane (height dropped)
    #[default]
    Xz,
    Xy,
    Yz,
}

impl Plane {
    /// Project a point to 2D plane coordinates
    pub fn project(&self, point: &Point) -> Point2<f64> {
        let (u, v) = self.pick(point.x, point.y, point.z);
        Point2::new(u, v)
    }

    /// Project a direction to 2D plane coordinates
    pub fn project_vector(&self, vector: &Vector3<f64>) -> Vector2<f64> {
        let (u, v) = self.pick(vector.x, vector.y, vector.z);
        Vector2::new(u, v)
    }

    fn pick(&self, x: f64, y: f64, z: f64) -> (f64, f64) {
        match self {
            Plane::Xz => (x, z),
            Plane::Xy => (x, y),
            Plane::Yz => (y, z),
        }
    }

    /// Euclidean distance between two points after projection
    pub fn distance(&self, a: &Point, b: &Point) -> f64 {
        (self.project(a) - self.project(b)).norm()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Plane::Xz => "xz",
            Plane::Xy => "xy",
            Plane::Yz => "yz",
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Plane {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xz" => Ok(Plane::Xz),
            "xy" => Ok(Plane::Xy),
            "yz" => Ok(Plane::Yz),
            other => Err(Error::invalid_parameter(
                "plane",
                format!("'{other}', expected 'xz', 'xy' or 'yz'"),
            )),
        }
    }
}
