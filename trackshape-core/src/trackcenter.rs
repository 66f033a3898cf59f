/// Sampled track centerlines and the queries used to reposition vertices
/// relative to them
///
/// Generators lay track out from the origin heading +z; a positive turn
/// angle curves toward +x. Lateral offsets are positive to the right of the
/// heading, which is +x for a track heading +z.
use nalgebra::{Vector2, Vector3};
use std::ops::{Add, Range};
use tracing::trace;

use crate::error::{Error, Result};
use crate::geometry::{CenterPoint, Point};
use crate::projection::Plane;

/// Upper bound on the samples one generator call may produce
pub const MAX_SAMPLES: usize = 10_000_000;

/// Ordered centerline samples with increasing `distance_along`
///
/// Joined trackcenters hold several lines back to back; each line is a run
/// of samples whose `distance_along` keeps increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trackcenter {
    pub points: Vec<CenterPoint>,
}

impl Trackcenter {
    pub fn new(points: Vec<CenterPoint>) -> Self {
        Self { points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `distance_along` of the last sample
    pub fn length(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.distance_along)
    }

    /// Copy moved by `offset`; headings and distances are unchanged
    pub fn translated(&self, offset: Vector3<f64>) -> Self {
        Self::new(
            self.points
                .iter()
                .map(|p| CenterPoint {
                    position: p.position + offset,
                    ..*p
                })
                .collect(),
        )
    }

    /// Append the samples of `other` as they are
    pub fn extend(&mut self, other: &Trackcenter) {
        self.points.extend_from_slice(&other.points);
    }

    /// Position at arc length `distance` on the first line
    ///
    /// Interpolates between the bracketing samples and extrapolates along the
    /// end headings outside the sampled range. `None` when empty.
    pub fn point_at(&self, distance: f64) -> Option<CenterPoint> {
        if self.points.is_empty() {
            return None;
        }
        point_in_run(&self.points[run_around(&self.points, 0)], distance)
    }
}

/// Index range of the increasing `distance_along` run holding `index`
fn run_around(points: &[CenterPoint], index: usize) -> Range<usize> {
    let mut start = index;
    while start > 0 && points[start - 1].distance_along < points[start].distance_along {
        start -= 1;
    }
    let mut end = index + 1;
    while end < points.len() && points[end - 1].distance_along < points[end].distance_along {
        end += 1;
    }
    start..end
}

fn point_in_run(run: &[CenterPoint], distance: f64) -> Option<CenterPoint> {
    let first = run.first()?;
    let last = run.last()?;
    if run.len() == 1 || distance <= first.distance_along {
        return Some(extrapolate(first, distance));
    }
    if distance >= last.distance_along {
        return Some(extrapolate(last, distance));
    }
    let upper = run
        .partition_point(|p| p.distance_along <= distance)
        .clamp(1, run.len() - 1);
    let (a, b) = (&run[upper - 1], &run[upper]);
    let span = b.distance_along - a.distance_along;
    let t = if span > 0.0 {
        (distance - a.distance_along) / span
    } else {
        0.0
    };
    Some(lerp(a, b, t))
}

impl Add for Trackcenter {
    type Output = Trackcenter;

    fn add(mut self, rhs: Trackcenter) -> Trackcenter {
        self.extend(&rhs);
        self
    }
}

fn extrapolate(from: &CenterPoint, distance: f64) -> CenterPoint {
    let step = distance - from.distance_along;
    CenterPoint::new(from.position + from.heading * step, from.heading, distance)
}

fn lerp(a: &CenterPoint, b: &CenterPoint, t: f64) -> CenterPoint {
    let position = a.position + (b.position - a.position) * t;
    let heading = a.heading.lerp(&b.heading, t);
    let heading = if heading.norm() > f64::EPSILON {
        heading.normalize()
    } else {
        a.heading
    };
    let distance = a.distance_along + (b.distance_along - a.distance_along) * t;
    CenterPoint::new(position, heading, distance)
}

fn check_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid_parameter(name, format!("{value} is not finite")))
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<()> {
    check_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_parameter(name, format!("{value} must be positive")))
    }
}

/// Number of samples for a line of `length` metres
fn sample_count(length: f64, samples_per_meter: f64) -> Result<usize> {
    if length == 0.0 {
        return Ok(1);
    }
    let count = (length * samples_per_meter).round();
    if count > MAX_SAMPLES as f64 {
        return Err(Error::invalid_parameter(
            "samples_per_meter",
            format!("{length} m at {samples_per_meter} samples/m exceeds {MAX_SAMPLES} samples"),
        ));
    }
    Ok((count as usize).max(2))
}

/// Arc lengths of evenly spaced samples including both ends
fn sample_distances(length: f64, samples_per_meter: f64) -> Result<impl Iterator<Item = f64>> {
    let n = sample_count(length, samples_per_meter)?;
    Ok((0..n).map(move |i| {
        if n == 1 {
            0.0
        } else {
            i as f64 * length / (n - 1) as f64
        }
    }))
}

/// Sample a straight line of `length` metres along +z
pub fn generate_straight_centerpoints(length: f64, samples_per_meter: f64) -> Result<Trackcenter> {
    check_finite("length", length)?;
    if length < 0.0 {
        return Err(Error::invalid_parameter("length", "must not be negative"));
    }
    check_positive("samples_per_meter", samples_per_meter)?;

    let points: Vec<CenterPoint> = sample_distances(length, samples_per_meter)?
        .map(straight_point)
        .collect();
    trace!(length, samples = points.len(), "generated straight centerline");
    Ok(Trackcenter::new(points))
}

/// Sample a circular arc of `radius` through `turn_angle` degrees
pub fn generate_curve_centerpoints(
    radius: f64,
    turn_angle: f64,
    samples_per_meter: f64,
) -> Result<Trackcenter> {
    check_positive("radius", radius)?;
    check_finite("turn_angle", turn_angle)?;
    check_positive("samples_per_meter", samples_per_meter)?;

    let sign = turn_angle.signum();
    let arc_length = radius * turn_angle.to_radians().abs();
    let points: Vec<CenterPoint> = sample_distances(arc_length, samples_per_meter)?
        .map(|s| curve_point(radius, sign, s))
        .collect();
    trace!(radius, turn_angle, samples = points.len(), "generated curve centerline");
    Ok(Trackcenter::new(points))
}

fn straight_point(distance: f64) -> CenterPoint {
    CenterPoint::new(Point::new(0.0, 0.0, distance), Vector3::z(), distance)
}

/// Point `distance` metres along an arc turning toward `sign` x
fn curve_point(radius: f64, sign: f64, distance: f64) -> CenterPoint {
    let theta = distance / radius;
    let (sin, cos) = theta.sin_cos();
    CenterPoint::new(
        Point::new(sign * radius * (1.0 - cos), 0.0, radius * sin),
        Vector3::new(sign * sin, 0.0, cos),
        distance,
    )
}

/// Centerline point at `angle` degrees along a curve of `radius`
pub fn curve_centerpoint_from_angle(radius: f64, angle: f64) -> Result<CenterPoint> {
    check_positive("radius", radius)?;
    check_finite("angle", angle)?;
    Ok(curve_point(
        radius,
        angle.signum(),
        radius * angle.to_radians().abs(),
    ))
}

/// Centerline point `length` metres along a straight
pub fn straight_centerpoint_from_length(length: f64) -> Result<CenterPoint> {
    check_finite("length", length)?;
    Ok(straight_point(length))
}

/// Euclidean distance between two points projected onto `plane`
pub fn distance_between(a: &Point, b: &Point, plane: Plane) -> f64 {
    plane.distance(a, b)
}

fn closest_index(point: &Point, trackcenter: &Trackcenter, plane: Plane) -> Option<(usize, f64)> {
    let points = &trackcenter.points;
    let mut best: Option<(usize, f64)> = None;
    for (i, cp) in points.iter().enumerate() {
        let distance = plane.distance(point, &cp.position);
        let closer = match best {
            None => true,
            Some((j, d)) => {
                distance < d || (distance == d && cp.distance_along < points[j].distance_along)
            }
        };
        if closer {
            best = Some((i, distance));
        }
    }
    best
}

/// Nearest sample of `trackcenter` to `point` in `plane`
///
/// Ties go to the smaller `distance_along`, then to the earlier sample.
pub fn find_closest_centerpoint(
    point: &Point,
    trackcenter: &Trackcenter,
    plane: Plane,
) -> Result<CenterPoint> {
    closest_index(point, trackcenter, plane)
        .map(|(i, _)| trackcenter.points[i])
        .ok_or_else(|| Error::not_found("centerpoint", "empty trackcenter"))
}

/// Trackcenter holding the nearest sample to `point`; the first wins ties
pub fn find_closest_trackcenter<'a>(
    point: &Point,
    trackcenters: &'a [Trackcenter],
    plane: Plane,
) -> Result<&'a Trackcenter> {
    let mut best: Option<(&Trackcenter, f64)> = None;
    for trackcenter in trackcenters {
        if let Some((_, distance)) = closest_index(point, trackcenter, plane) {
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((trackcenter, distance));
            }
        }
    }
    best.map(|(tc, _)| tc)
        .ok_or_else(|| Error::not_found("trackcenter", "no samples to search"))
}

/// Perpendicular distance from the centerline at `centerpoint`
///
/// Positive on the right of the projected heading (`(h_v, -h_u)` in plane
/// coordinates). When the heading has no extent in `plane` the planar
/// distance is signed by the first plane axis.
pub fn signed_distance_between(point: &Point, centerpoint: &CenterPoint, plane: Plane) -> f64 {
    let offset: Vector2<f64> = plane.project(point) - plane.project(&centerpoint.position);
    let heading = plane.project_vector(&centerpoint.heading);
    let length = heading.norm();
    if length > f64::EPSILON {
        let right = Vector2::new(heading.y, -heading.x) / length;
        offset.dot(&right)
    } else if offset.x < 0.0 {
        -offset.norm()
    } else {
        offset.norm()
    }
}

/// Closest point on the sampled centerline in the ground plane
///
/// The nearest sample is refined onto its adjacent segments, so the result
/// is interpolated rather than snapped to a sample.
pub fn project_onto_trackcenter(point: &Point, trackcenter: &Trackcenter) -> Result<CenterPoint> {
    Ok(project(point, trackcenter)?.0)
}

/// Foot on the centerline and the sample run of the line it lies on
fn project(point: &Point, trackcenter: &Trackcenter) -> Result<(CenterPoint, Range<usize>)> {
    let (nearest, _) = closest_index(point, trackcenter, Plane::Xz)
        .ok_or_else(|| Error::not_found("centerpoint", "empty trackcenter"))?;
    let points = &trackcenter.points;
    let run = run_around(points, nearest);
    let target = Plane::Xz.project(point);

    let mut best = (points[nearest], Plane::Xz.distance(point, &points[nearest].position));
    let segments = [nearest.checked_sub(1), Some(nearest)];
    for start in segments.into_iter().flatten() {
        if start < run.start || start + 1 >= run.end {
            continue;
        }
        let (begin, end) = (&points[start], &points[start + 1]);
        let a = Plane::Xz.project(&begin.position);
        let b = Plane::Xz.project(&end.position);
        let ab = b - a;
        let span = ab.norm_squared();
        if span <= 0.0 {
            continue;
        }
        let t = ((target - a).dot(&ab) / span).clamp(0.0, 1.0);
        let foot = lerp(begin, end, t);
        let distance = Plane::Xz.distance(point, &foot.position);
        if distance < best.1 {
            best = (foot, distance);
        }
    }
    Ok((best.0, run))
}

/// Arc length of the centerline point nearest `point`
pub fn distance_along_trackcenter(point: &Point, trackcenter: &Trackcenter) -> Result<f64> {
    Ok(project_onto_trackcenter(point, trackcenter)?.distance_along)
}

/// Arc length along whichever trackcenter is nearest `point`
pub fn distance_along_nearest_trackcenter(
    point: &Point,
    trackcenters: &[Trackcenter],
    plane: Plane,
) -> Result<f64> {
    let trackcenter = find_closest_trackcenter(point, trackcenters, plane)?;
    distance_along_trackcenter(point, trackcenter)
}

/// Offsets of `point` from its foot on the centerline
struct Offsets {
    foot: CenterPoint,
    /// Samples of the line the foot lies on
    run: Range<usize>,
    lateral: f64,
    rise: f64,
}

fn offsets(point: &Point, trackcenter: &Trackcenter) -> Result<Offsets> {
    let (foot, run) = project(point, trackcenter)?;
    Ok(Offsets {
        lateral: signed_distance_between(point, &foot, Plane::Xz),
        rise: point.y - foot.position.y,
        foot,
        run,
    })
}

fn place(center: &CenterPoint, lateral: f64, rise: f64) -> Point {
    center.position + center.lateral() * lateral + Vector3::y() * rise
}

/// Move `point` sideways so it sits `new_offset` from the centerline
///
/// The height is taken from the centerline.
pub fn get_new_position_from_trackcenter(
    new_offset: f64,
    point: &Point,
    trackcenter: &Trackcenter,
) -> Result<Point> {
    check_finite("new_offset", new_offset)?;
    let foot = project_onto_trackcenter(point, trackcenter)?;
    Ok(place(&foot, new_offset, 0.0))
}

/// Slide `point` `delta_distance` metres along the centerline, keeping its
/// lateral and vertical offset
///
/// On joined trackcenters the point stays on the line it is nearest to.
pub fn get_new_position_along_trackcenter(
    delta_distance: f64,
    point: &Point,
    trackcenter: &Trackcenter,
) -> Result<Point> {
    check_finite("delta_distance", delta_distance)?;
    let offsets = offsets(point, trackcenter)?;
    let target = point_in_run(
        &trackcenter.points[offsets.run],
        offsets.foot.distance_along + delta_distance,
    )
    .ok_or_else(|| Error::not_found("centerpoint", "empty trackcenter"))?;
    Ok(place(&target, offsets.lateral, offsets.rise))
}

/// Relocate `point` to the spot `angle` degrees into a curve of `radius`
/// starting where its nearest line starts, keeping its offsets
pub fn get_new_position_from_angle(
    radius: f64,
    angle: f64,
    point: &Point,
    trackcenter: &Trackcenter,
) -> Result<Point> {
    let target = curve_centerpoint_from_angle(radius, angle)?;
    relocate(target, point, trackcenter)
}

/// Relocate `point` to the spot `length` metres along a straight starting
/// where its nearest line starts, keeping its offsets
pub fn get_new_position_from_length(
    length: f64,
    point: &Point,
    trackcenter: &Trackcenter,
) -> Result<Point> {
    let target = straight_centerpoint_from_length(length)?;
    relocate(target, point, trackcenter)
}

fn relocate(target: CenterPoint, point: &Point, trackcenter: &Trackcenter) -> Result<Point> {
    let offsets = offsets(point, trackcenter)?;
    let start = trackcenter.points[offsets.run.start].position;
    let center = CenterPoint {
        position: start + target.position.to_vector(),
        ..target
    };
    Ok(place(&center, offsets.lateral, offsets.rise))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-6;

    fn assert_close(a: &Point, b: &Point) {
        assert!(a.distance(b) < EPS, "{a} != {b}");
    }

    #[test]
    fn test_straight_sampling() {
        let tc = generate_straight_centerpoints(50.0, 10.0).unwrap();
        assert_eq!(tc.len(), 500);
        assert!((tc.length() - 50.0).abs() < EPS);
        assert_eq!(tc.points[0].position, Point::ORIGIN);
        assert_close(&tc.points[499].position, &Point::new(0.0, 0.0, 50.0));
        assert!(tc.points.iter().all(|p| p.heading == Vector3::z()));
    }

    #[test]
    fn test_degenerate_lengths() {
        let single = generate_straight_centerpoints(0.0, 10.0).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.points[0].distance_along, 0.0);

        let short = generate_straight_centerpoints(0.04, 10.0).unwrap();
        assert_eq!(short.len(), 2);
        assert!((short.length() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_generator_input() {
        assert!(matches!(
            generate_straight_centerpoints(-1.0, 10.0),
            Err(Error::InvalidParameter { name: "length", .. })
        ));
        assert!(generate_straight_centerpoints(10.0, 0.0).is_err());
        assert!(generate_curve_centerpoints(0.0, 10.0, 10.0).is_err());
        assert!(generate_curve_centerpoints(500.0, f64::NAN, 10.0).is_err());
    }

    #[test]
    fn test_curve_chord_length() {
        let radius = 500.0;
        let angle: f64 = 20.0;
        let tc = generate_curve_centerpoints(radius, angle, 10.0).unwrap();
        let first = tc.points.first().unwrap().position;
        let last = tc.points.last().unwrap().position;
        let chord = 2.0 * radius * (angle.to_radians() / 2.0).sin();
        assert!((first.distance(&last) - chord).abs() < EPS);
        assert!((tc.length() - radius * angle.to_radians()).abs() < EPS);

        let end = tc.points.last().unwrap();
        let expected = Vector3::new(angle.to_radians().sin(), 0.0, angle.to_radians().cos());
        assert!((end.heading - expected).norm() < EPS);
        assert!(end.position.x > 0.0);
    }

    #[test]
    fn test_curve_distance_is_strictly_increasing() {
        let tc = generate_curve_centerpoints(500.0, 20.0, 7.0).unwrap();
        assert!(tc.len() > 2);
        assert!(tc
            .points
            .windows(2)
            .all(|w| w[1].distance_along > w[0].distance_along));
    }

    #[test]
    fn test_left_hand_curve_mirrors() {
        let right = generate_curve_centerpoints(300.0, 15.0, 5.0).unwrap();
        let left = generate_curve_centerpoints(300.0, -15.0, 5.0).unwrap();
        assert_eq!(right.len(), left.len());
        for (r, l) in right.points.iter().zip(&left.points) {
            assert!((r.position.x + l.position.x).abs() < EPS);
            assert!((r.position.z - l.position.z).abs() < EPS);
        }
    }

    #[test]
    fn test_closest_centerpoint_prefers_first() {
        let a = CenterPoint::new(Point::new(0.0, 0.0, 0.0), Vector3::z(), 0.0);
        let b = CenterPoint::new(Point::new(0.0, 0.0, 2.0), Vector3::z(), 2.0);
        let tc = Trackcenter::new(vec![a, b]);
        let found = find_closest_centerpoint(&Point::new(5.0, 0.0, 1.0), &tc, Plane::Xz).unwrap();
        assert_eq!(found.distance_along, 0.0);
        let found = find_closest_centerpoint(&Point::new(0.0, 9.0, 1.9), &tc, Plane::Xz).unwrap();
        assert_eq!(found.distance_along, 2.0);
        assert!(find_closest_centerpoint(&Point::ORIGIN, &Trackcenter::empty(), Plane::Xz).is_err());
    }

    #[test]
    fn test_closest_trackcenter() {
        let base = generate_straight_centerpoints(10.0, 2.0).unwrap();
        let tracks = vec![
            base.translated(Vector3::new(-2.5, 0.0, 0.0)),
            base.translated(Vector3::new(2.5, 0.0, 0.0)),
        ];
        let found = find_closest_trackcenter(&Point::new(2.0, 0.0, 4.0), &tracks, Plane::Xz).unwrap();
        assert_eq!(found, &tracks[1]);
        let tie = find_closest_trackcenter(&Point::new(0.0, 0.0, 4.0), &tracks, Plane::Xz).unwrap();
        assert_eq!(tie, &tracks[0]);
        assert!(matches!(
            find_closest_trackcenter(&Point::ORIGIN, &[], Plane::Xz),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_signed_distance_sides() {
        let cp = CenterPoint::new(Point::new(0.0, 0.0, 5.0), Vector3::z(), 5.0);
        assert!((signed_distance_between(&Point::new(1.5, 3.0, 5.0), &cp, Plane::Xz) - 1.5).abs() < EPS);
        assert!((signed_distance_between(&Point::new(-1.0, 0.0, 7.0), &cp, Plane::Xz) + 1.0).abs() < EPS);
        assert_eq!(signed_distance_between(&Point::new(0.0, 0.0, 9.0), &cp, Plane::Xz), 0.0);

        // heading along +x: right-hand side is -z
        let east = CenterPoint::new(Point::ORIGIN, Vector3::x(), 0.0);
        assert!((signed_distance_between(&Point::new(3.0, 0.0, -2.0), &east, Plane::Xz) - 2.0).abs() < EPS);
    }

    #[test]
    fn test_signed_distance_without_planar_heading() {
        let cp = CenterPoint::new(Point::ORIGIN, Vector3::z(), 0.0);
        assert!((signed_distance_between(&Point::new(-3.0, 4.0, 1.0), &cp, Plane::Xy) + 5.0).abs() < EPS);
    }

    #[test]
    fn test_new_position_from_trackcenter_straight() {
        let tc = generate_straight_centerpoints(20.0, 10.0).unwrap();
        let moved = get_new_position_from_trackcenter(-2.0, &Point::new(3.0, 0.7, 12.34), &tc).unwrap();
        assert_close(&moved, &Point::new(-2.0, 0.0, 12.34));
    }

    #[test]
    fn test_offset_round_trip_on_curve() {
        let tc = generate_curve_centerpoints(500.0, 20.0, 10.0).unwrap();
        let original = Point::new(20.0, 0.4, 120.0);
        for (d0, d) in [(1.0, 2.4925), (-3.0, 7.4775), (0.0, -2.4925)] {
            let first = get_new_position_from_trackcenter(d0, &original, &tc).unwrap();
            let second = get_new_position_from_trackcenter(d, &first, &tc).unwrap();
            let foot = project_onto_trackcenter(&second, &tc).unwrap();
            let offset = signed_distance_between(&second, &foot, Plane::Xz);
            assert!((offset - d).abs() < 1e-4, "offset {offset} for {d}");
        }
    }

    #[test]
    fn test_new_position_along_straight() {
        let tc = generate_straight_centerpoints(50.0, 10.0).unwrap();
        let point = Point::new(1.2, 0.3, 10.0);
        assert_close(
            &get_new_position_along_trackcenter(5.0, &point, &tc).unwrap(),
            &Point::new(1.2, 0.3, 15.0),
        );
        assert_close(
            &get_new_position_along_trackcenter(45.0, &point, &tc).unwrap(),
            &Point::new(1.2, 0.3, 55.0),
        );
        assert_close(
            &get_new_position_along_trackcenter(-12.5, &point, &tc).unwrap(),
            &Point::new(1.2, 0.3, -2.5),
        );
    }

    #[test]
    fn test_new_position_along_curve_keeps_offset() {
        let tc = generate_curve_centerpoints(400.0, 10.0, 10.0).unwrap();
        let start = get_new_position_from_trackcenter(1.5, &tc.points[100].position, &tc).unwrap();
        let moved = get_new_position_along_trackcenter(25.0, &start, &tc).unwrap();

        let foot = project_onto_trackcenter(&moved, &tc).unwrap();
        assert!((signed_distance_between(&moved, &foot, Plane::Xz) - 1.5).abs() < 1e-4);
        assert!((foot.distance_along - (tc.points[100].distance_along + 25.0)).abs() < 1e-3);
    }

    #[test]
    fn test_distance_along() {
        let tc = generate_straight_centerpoints(30.0, 1.0).unwrap();
        let d = distance_along_trackcenter(&Point::new(4.0, 1.0, 7.25), &tc).unwrap();
        assert!((d - 7.25).abs() < EPS);

        let tracks = vec![tc.translated(Vector3::new(-5.0, 0.0, 0.0)), tc.clone()];
        let d = distance_along_nearest_trackcenter(&Point::new(0.5, 0.0, 3.0), &tracks, Plane::Xz).unwrap();
        assert!((d - 3.0).abs() < EPS);
    }

    #[test]
    fn test_point_at_interpolates() {
        let tc = generate_straight_centerpoints(10.0, 1.0).unwrap();
        let cp = tc.point_at(5.0).unwrap();
        assert_close(&cp.position, &Point::new(0.0, 0.0, 5.0));
        assert!((cp.distance_along - 5.0).abs() < EPS);
        assert!(Trackcenter::empty().point_at(1.0).is_none());
    }

    #[test]
    fn test_centerpoint_from_angle_and_length() {
        let cp = curve_centerpoint_from_angle(100.0, -90.0).unwrap();
        assert_close(&cp.position, &Point::new(-100.0, 0.0, 100.0));
        assert!((cp.distance_along - 100.0 * std::f64::consts::FRAC_PI_2).abs() < EPS);

        let cp = straight_centerpoint_from_length(12.0).unwrap();
        assert_eq!(cp.position, Point::new(0.0, 0.0, 12.0));
    }

    #[test]
    fn test_new_position_from_angle_keeps_offset() {
        let tc = generate_curve_centerpoints(500.0, 20.0, 10.0).unwrap();
        let point = Point::new(2.0, 0.25, 0.0);
        let moved = get_new_position_from_angle(500.0, 10.0, &point, &tc).unwrap();

        let target = curve_centerpoint_from_angle(500.0, 10.0).unwrap();
        let expected = target.position + target.lateral() * 2.0 + Vector3::y() * 0.25;
        assert_close(&moved, &expected);
    }

    #[test]
    fn test_new_position_from_length() {
        let tc = generate_straight_centerpoints(10.0, 10.0)
            .unwrap()
            .translated(Vector3::new(0.0, 1.0, 100.0));
        let moved = get_new_position_from_length(4.0, &Point::new(-1.0, 1.5, 102.0), &tc).unwrap();
        assert_close(&moved, &Point::new(-1.0, 1.5, 104.0));
    }

    #[test]
    fn test_concatenation() {
        let a = generate_straight_centerpoints(5.0, 2.0).unwrap();
        let b = generate_curve_centerpoints(50.0, 5.0, 2.0).unwrap();
        let joined = a.clone() + b.clone();
        assert_eq!(joined.len(), a.len() + b.len());
        let mut extended = Trackcenter::empty();
        extended.extend(&a);
        extended.extend(&b);
        assert_eq!(extended, joined);
    }

    fn parallel_pair() -> (Trackcenter, Trackcenter) {
        let base = generate_straight_centerpoints(10.0, 10.0).unwrap();
        (
            base.translated(Vector3::new(-2.5, 0.0, 0.0)),
            base.translated(Vector3::new(2.5, 0.0, 0.0)),
        )
    }

    #[test]
    fn test_move_along_joined_tracks_stays_on_line() {
        let (left, right) = parallel_pair();
        let joined = left + right;

        let moved = get_new_position_along_trackcenter(2.0, &Point::new(-2.5, 0.0, 5.0), &joined).unwrap();
        assert_close(&moved, &Point::new(-2.5, 0.0, 7.0));
        let moved = get_new_position_along_trackcenter(2.0, &Point::new(2.5, 0.0, 5.0), &joined).unwrap();
        assert_close(&moved, &Point::new(2.5, 0.0, 7.0));

        // past the end of the first line, extrapolate that line
        let moved = get_new_position_along_trackcenter(3.0, &Point::new(-2.0, 0.0, 9.0), &joined).unwrap();
        assert_close(&moved, &Point::new(-2.0, 0.0, 12.0));
        let moved = get_new_position_along_trackcenter(-4.0, &Point::new(3.0, 0.0, 1.0), &joined).unwrap();
        assert_close(&moved, &Point::new(3.0, 0.0, -3.0));
    }

    #[test]
    fn test_relocate_on_joined_tracks_uses_own_line() {
        let (left, right) = parallel_pair();
        let joined = left + right.translated(Vector3::new(0.0, 0.0, 50.0));
        let moved = get_new_position_from_length(4.0, &Point::new(3.0, 0.0, 51.0), &joined).unwrap();
        assert_close(&moved, &Point::new(3.0, 0.0, 54.0));
    }

    #[test]
    fn test_point_at_uses_first_line_of_joined_tracks() {
        let (left, right) = parallel_pair();
        let joined = left + right;
        let cp = joined.point_at(15.0).unwrap();
        assert_close(&cp.position, &Point::new(-2.5, 0.0, 15.0));
        let cp = joined.point_at(5.0).unwrap();
        assert_close(&cp.position, &Point::new(-2.5, 0.0, 5.0));
    }

    #[test]
    fn test_closest_centerpoint_tie_prefers_smaller_distance_along() {
        let later = CenterPoint::new(Point::new(0.0, 0.0, 2.0), Vector3::z(), 7.0);
        let earlier = CenterPoint::new(Point::new(0.0, 0.0, 0.0), Vector3::z(), 3.0);
        let tc = Trackcenter::new(vec![later, earlier]);
        let found = find_closest_centerpoint(&Point::new(4.0, 0.0, 1.0), &tc, Plane::Xz).unwrap();
        assert_eq!(found.distance_along, 3.0);
    }

    #[test]
    fn test_sample_count_is_bounded() {
        assert!(matches!(
            generate_straight_centerpoints(1e12, 1e9),
            Err(Error::InvalidParameter { name: "samples_per_meter", .. })
        ));
        assert!(generate_curve_centerpoints(1e15, 90.0, 10.0).is_err());
        assert!(generate_straight_centerpoints(f64::MAX, 10.0).is_err());
        let at_cap = MAX_SAMPLES as f64 / 10.0;
        assert!(generate_straight_centerpoints(at_cap * 2.0, 10.0).is_err());
    }

    proptest! {
        #[test]
        fn test_straight_sampling_properties(length in 0.1f64..300.0, density in 0.5f64..20.0) {
            let tc = generate_straight_centerpoints(length, density).unwrap();
            let expected = ((length * density).round() as usize).max(2);
            prop_assert_eq!(tc.len(), expected);
            prop_assert!((tc.length() - length).abs() < 1e-9);
        }

        #[test]
        fn test_curve_chord_property(radius in 10.0f64..2000.0, angle in -90.0f64..90.0) {
            prop_assume!(angle.abs() > 0.01);
            let tc = generate_curve_centerpoints(radius, angle, 2.0).unwrap();
            let first = tc.points.first().unwrap().position;
            let last = tc.points.last().unwrap().position;
            let chord = 2.0 * radius * (angle.to_radians().abs() / 2.0).sin();
            prop_assert!((first.distance(&last) - chord).abs() < 1e-6);
        }
    }
}
