/// Editing and sampling defaults
///
/// Values used when the editor has to invent data (new vertex colours,
/// face normals) and when callers do not pick a trackcenter density or
/// query plane.
/// Loadable from TOML; every field falls back to its default.
use serde::Deserialize;

use crate::error::Result;
use crate::geometry::Point;
use crate::projection::Plane;
use crate::trackcenter::{
    distance_along_nearest_trackcenter, find_closest_trackcenter, Trackcenter,
};

/// Default vertex flags for newly added vertices
pub const DEFAULT_VERTEX_FLAGS: u32 = 0x0000_0000;

/// Default diffuse colour for newly added vertices
pub const DEFAULT_DIFFUSE_COLOUR: u32 = 0xff96_9696;

/// Default specular colour for newly added vertices
pub const DEFAULT_SPECULAR_COLOUR: u32 = 0xff80_8080;

/// Default trackcenter sampling density
pub const DEFAULT_SAMPLES_PER_METER: f64 = 10.0;

/// Settings for vertex and triangle insertion
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    pub vertex_flags: u32,
    pub diffuse_colour: u32,
    pub specular_colour: u32,
    /// Compute a face normal for inserted triangles instead of reusing
    /// normal 0.
    pub compute_face_normals: bool,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            vertex_flags: DEFAULT_VERTEX_FLAGS,
            diffuse_colour: DEFAULT_DIFFUSE_COLOUR,
            specular_colour: DEFAULT_SPECULAR_COLOUR,
            compute_face_normals: true,
        }
    }
}

/// Settings for centerline generation and queries
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackcenterConfig {
    pub samples_per_meter: f64,
    pub plane: Plane,
}

impl TrackcenterConfig {
    /// Nearest of `trackcenters` to `point`, measured in the configured plane
    pub fn closest_trackcenter<'a>(
        &self,
        point: &Point,
        trackcenters: &'a [Trackcenter],
    ) -> Result<&'a Trackcenter> {
        find_closest_trackcenter(point, trackcenters, self.plane)
    }

    /// Arc length of `point` along the nearest trackcenter in the configured
    /// plane
    pub fn distance_along_nearest(&self, point: &Point, trackcenters: &[Trackcenter]) -> Result<f64> {
        distance_along_nearest_trackcenter(point, trackcenters, self.plane)
    }
}

impl Default for TrackcenterConfig {
    fn default() -> Self {
        Self {
            samples_per_meter: DEFAULT_SAMPLES_PER_METER,
            plane: Plane::Xz,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub edit: EditConfig,
    pub trackcenter: TrackcenterConfig,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
