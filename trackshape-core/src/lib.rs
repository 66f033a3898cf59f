/// Trackshape Core Library - MSTS shape editing and track centerline geometry
///
/// This library reads text shape files into an editable model that writes
/// back unchanged wherever it was not edited, and generates sampled track
/// centerlines used to reposition shape vertices.

pub mod config;
pub mod error;
pub mod geometry;
pub mod projection;
pub mod section;
pub mod shape;
pub mod syntax;
pub mod trackcenter;
pub mod transform;

// Re-export commonly used types
pub use config::{Config, EditConfig, TrackcenterConfig};
pub use error::{Error, Result};
pub use geometry::{CenterPoint, Normal, Point, UvPoint};
pub use projection::Plane;
pub use section::{generate_trackcenters_from_section, SectionKind, TrackSection};
pub use shape::{
    Document, Encoding, IndexedTrilist, MatrixRecord, PrimStateRecord, SubMeshRef, TrilistRef,
    VertexRecord,
};
pub use trackcenter::Trackcenter;
pub use transform::{resolve_transform, Frame};
