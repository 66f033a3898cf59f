/// Coordinate frames of named shape matrices
///
/// Shape matrices form a parent chain. A [`Frame`] is the composed
/// local-to-model transform of one matrix, used to carry geometry between
/// sub-objects with different origins.
use nalgebra::{Matrix3, Matrix4, Vector3};
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::geometry::{Normal, Point};
use crate::shape::{Document, VertexRecord};

/// Compose the named matrix with all of its parents (`parent * .. * local`)
pub fn resolve_transform(document: &Document, matrix_name: &str) -> Result<Matrix4<f64>> {
    let mut seen = HashSet::new();
    let mut composed = Matrix4::identity();
    let mut current = Some(matrix_name.to_string());

    while let Some(name) = current {
        if !seen.insert(name.clone()) {
            return Err(Error::CycleDetected { name });
        }
        let record = document.matrix(&name)?;
        composed = record.transform * composed;
        current = record.parent;
    }

    Ok(composed)
}

/// Local-to-model transform with its normal matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    matrix: Matrix4<f64>,
    /// Inverse-transpose of the linear part
    normal_matrix: Matrix3<f64>,
}

impl Frame {
    /// Fails for matrices whose linear part cannot be inverted
    pub fn new(matrix: Matrix4<f64>) -> Result<Self> {
        let linear: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let inverse = linear
            .try_inverse()
            .ok_or_else(|| Error::invalid_parameter("matrix", "linear part is singular"))?;
        Ok(Self {
            matrix,
            normal_matrix: inverse.transpose(),
        })
    }

    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
            normal_matrix: Matrix3::identity(),
        }
    }

    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            matrix: Matrix4::new_translation(&Vector3::new(x, y, z)),
            normal_matrix: Matrix3::identity(),
        }
    }

    /// Frame of a named matrix in `document`
    pub fn resolve(document: &Document, matrix_name: &str) -> Result<Self> {
        Self::new(resolve_transform(document, matrix_name)?)
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn transform_point(&self, point: &Point) -> Point {
        self.matrix.transform_point(&point.to_point3()).into()
    }

    /// Transform a normal; translation is ignored and the result renormalised
    pub fn transform_normal(&self, normal: &Normal) -> Normal {
        Normal::from(self.normal_matrix * normal.to_vector()).normalized()
    }

    /// Point and normal of a vertex carried into this frame
    pub fn transform_vertex(&self, vertex: &VertexRecord) -> VertexRecord {
        VertexRecord {
            point: self.transform_point(&vertex.point),
            normal: self.transform_normal(&vertex.normal),
            ..vertex.clone()
        }
    }

    pub fn inverse(&self) -> Result<Self> {
        let inverse = self
            .matrix
            .try_inverse()
            .ok_or_else(|| Error::invalid_parameter("matrix", "frame is not invertible"))?;
        Self::new(inverse)
    }

    /// Frame mapping this frame's local coordinates into `target`'s local
    /// coordinates, keeping model-space positions
    pub fn relative_to(&self, target: &Frame) -> Result<Self> {
        Self::new(target.inverse()?.matrix * self.matrix)
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::identity()
    }
}
