/// Track-section records and multi-track centerline generation
use nalgebra::Vector3;
use serde::Deserialize;
use tracing::debug;

use crate::config::TrackcenterConfig;
use crate::error::{Error, Result};
use crate::trackcenter::{generate_curve_centerpoints, generate_straight_centerpoints, Trackcenter};

/// Geometry of the primary line of a section
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SectionKind {
    /// Arc of `radius` metres through `angle` degrees, positive toward +x
    Curve { radius: f64, angle: f64 },
    Straight { length: f64 },
}

/// A track section as supplied by a track database
///
/// `parallel_offsets` are lateral positions of each track relative to the
/// primary line, positive to the right. No offsets means one track on the
/// primary line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackSection {
    #[serde(flatten)]
    pub kind: SectionKind,
    #[serde(default)]
    pub parallel_offsets: Vec<f64>,
}

impl TrackSection {
    pub fn straight(length: f64, parallel_offsets: Vec<f64>) -> Self {
        Self {
            kind: SectionKind::Straight { length },
            parallel_offsets,
        }
    }

    pub fn curve(radius: f64, angle: f64, parallel_offsets: Vec<f64>) -> Self {
        Self {
            kind: SectionKind::Curve { radius, angle },
            parallel_offsets,
        }
    }

    /// Offsets of every track, in declared order
    pub fn offsets(&self) -> Vec<f64> {
        if self.parallel_offsets.is_empty() {
            vec![0.0]
        } else {
            self.parallel_offsets.clone()
        }
    }

    /// Centerlines sampled at the configured density
    pub fn trackcenters(&self, config: &TrackcenterConfig) -> Result<Vec<Trackcenter>> {
        generate_trackcenters_from_section(self, config.samples_per_meter)
    }
}

/// One centerline per parallel track of `section`, in declared order
///
/// Curved tracks are concentric: a track `offset` metres to the right of a
/// right-hand curve runs on radius `radius - offset`.
pub fn generate_trackcenters_from_section(
    section: &TrackSection,
    samples_per_meter: f64,
) -> Result<Vec<Trackcenter>> {
    let mut trackcenters = Vec::with_capacity(section.parallel_offsets.len().max(1));
    for offset in section.offsets() {
        if !offset.is_finite() {
            return Err(Error::invalid_parameter(
                "parallel_offsets",
                format!("{offset} is not finite"),
            ));
        }
        let shift = Vector3::new(offset, 0.0, 0.0);
        let line = match section.kind {
            SectionKind::Straight { length } => {
                generate_straight_centerpoints(length, samples_per_meter)?
            }
            SectionKind::Curve { radius, angle } => {
                let radius = radius - angle.signum() * offset;
                if radius <= 0.0 {
                    return Err(Error::invalid_parameter(
                        "parallel_offsets",
                        format!("offset {offset} leaves no radius on this curve"),
                    ));
                }
                generate_curve_centerpoints(radius, angle, samples_per_meter)?
            }
        };
        trackcenters.push(line.translated(shift));
    }
    debug!(
        kind = ?section.kind,
        tracks = trackcenters.len(),
        "generated section trackcenters"
    );
    Ok(trackcenters)
}
