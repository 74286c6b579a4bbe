//! Named polygon geofences.
//!
//! A [`Geofence`] is immutable once built: its bounding box is computed in
//! [`Geofence::new`] and never recomputed, so a loaded [`GeofenceSet`] can be
//! shared read-only (behind an `Arc`) by every webhook handler without locking.
//!
//! Containment uses a bounding-box rejection followed by the crossing-number
//! (ray-casting) test. Points lying exactly on an edge follow the usual
//! convention of that test: a point on a vertical right-hand edge counts as
//! inside, one on a left-hand edge as outside. The answer is deterministic for
//! a given point, which is all alert filtering needs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::GeofenceError;
use crate::types::Coordinates;

/// A polygon vertex. For event filtering `x` is latitude and `y` longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box of a polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn around(points: &[Point]) -> Self {
        let first = points[0];
        points.iter().fold(
            BoundingBox {
                min_x: first.x,
                max_x: first.x,
                min_y: first.y,
                max_y: first.y,
            },
            |b, p| BoundingBox {
                min_x: b.min_x.min(p.x),
                max_x: b.max_x.max(p.x),
                min_y: b.min_y.min(p.y),
                max_y: b.max_y.max(p.y),
            },
        )
    }

    /// Returns `true` if the point lies inside or on the box.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }
}

// ---------------------------------------------------------------------------
// Geofence
// ---------------------------------------------------------------------------

/// A named, simple (possibly non-convex) polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    name: String,
    points: Vec<Point>,
    bounds: BoundingBox,
}

impl Geofence {
    /// Builds a geofence from its name and ordered vertices.
    ///
    /// The polygon is closed implicitly (the last vertex connects back to the
    /// first).
    ///
    /// # Errors
    ///
    /// - [`GeofenceError::EmptyName`] if `name` is empty.
    /// - [`GeofenceError::TooFewVertices`] for fewer than three vertices.
    /// - [`GeofenceError::NonFiniteVertex`] if any coordinate is NaN or infinite.
    pub fn new<P: Into<Point>>(
        name: impl Into<String>,
        points: impl IntoIterator<Item = P>,
    ) -> Result<Self, GeofenceError> {
        let name = name.into();
        if name.is_empty() {
            return Err(GeofenceError::EmptyName);
        }

        let points: Vec<Point> = points.into_iter().map(Into::into).collect();
        if points.len() < 3 {
            return Err(GeofenceError::TooFewVertices {
                name,
                count: points.len(),
            });
        }
        if let Some(index) = points.iter().position(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(GeofenceError::NonFiniteVertex { name, index });
        }

        let bounds = BoundingBox::around(&points);
        Ok(Self { name, points, bounds })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounds
    }

    /// Returns `true` if `(x, y)` lies inside the polygon.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if !self.bounds.contains(x, y) {
            return false;
        }

        let mut inside = false;
        let n = self.points.len();
        let mut p1 = self.points[0];
        for i in 1..=n {
            let p2 = self.points[i % n];
            // Half-open in y so a ray through a shared vertex is counted once.
            if p1.y.min(p2.y) < y && y <= p1.y.max(p2.y) && x <= p1.x.max(p2.x) {
                // The y-interval test guarantees p1.y != p2.y here.
                let vertical = p1.x == p2.x;
                if vertical || x <= (y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y) + p1.x {
                    inside = !inside;
                }
            }
            p1 = p2;
        }
        inside
    }

    /// Returns `true` if the event location lies inside the polygon.
    pub fn contains_coordinates(&self, coordinates: Coordinates) -> bool {
        self.contains(coordinates.lat, coordinates.lng)
    }
}

// ---------------------------------------------------------------------------
// Geofence set
// ---------------------------------------------------------------------------

/// Outcome of checking a location against a [`GeofenceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceVerdict<'a> {
    /// No geofences are configured; every location is admitted.
    Unrestricted,
    /// Name of the first fence, in load order, containing the location.
    Inside(&'a str),
    Outside,
}

impl FenceVerdict<'_> {
    /// Returns `true` unless the location falls outside every configured fence.
    pub fn admits(&self) -> bool {
        !matches!(self, FenceVerdict::Outside)
    }
}

/// The ordered collection of geofences loaded at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeofenceSet {
    fences: Vec<Geofence>,
}

impl GeofenceSet {
    /// Creates a set, rejecting duplicate names.
    pub fn new(fences: Vec<Geofence>) -> Result<Self, GeofenceError> {
        let mut seen = HashSet::new();
        for fence in &fences {
            if !seen.insert(fence.name()) {
                return Err(GeofenceError::DuplicateName {
                    name: fence.name().to_owned(),
                });
            }
        }
        Ok(Self { fences })
    }

    /// Builds a set from `(name, [(x, y), ...])` definitions.
    pub fn from_definitions<I, P>(definitions: I) -> Result<Self, GeofenceError>
    where
        I: IntoIterator<Item = (String, Vec<P>)>,
        P: Into<Point>,
    {
        let fences = definitions
            .into_iter()
            .map(|(name, points)| Geofence::new(name, points))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fences)
    }

    /// An empty set that admits every location.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Geofence> {
        self.fences.iter()
    }

    /// Classifies `coordinates` against the configured fences.
    pub fn check(&self, coordinates: Coordinates) -> FenceVerdict<'_> {
        if self.fences.is_empty() {
            return FenceVerdict::Unrestricted;
        }
        self.fences
            .iter()
            .find(|fence| fence.contains_coordinates(coordinates))
            .map_or(FenceVerdict::Outside, |fence| FenceVerdict::Inside(fence.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geofence {
        Geofence::new("square", [(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]).unwrap()
    }

    #[test]
    fn square_contains_centre_but_not_far_point() {
        let fence = square();
        assert!(fence.contains(5.0, 5.0));
        assert!(!fence.contains(15.0, 15.0));
    }

    #[test]
    fn edge_points_are_deterministic() {
        let fence = square();
        let first = fence.contains(10.0, 5.0);
        for _ in 0..100 {
            assert_eq!(fence.contains(10.0, 5.0), first);
        }
        // Crossing-number convention: right-hand vertical edge counts, left does not.
        assert!(first);
        assert!(!fence.contains(0.0, 5.0));
    }

    #[test]
    fn points_outside_bounding_box_are_rejected() {
        let fence = square();
        let bounds = fence.bounding_box();
        assert_eq!(
            bounds,
            BoundingBox {
                min_x: 0.0,
                max_x: 10.0,
                min_y: 0.0,
                max_y: 10.0
            }
        );
        for (x, y) in [(-0.1, 5.0), (10.1, 5.0), (5.0, -0.1), (5.0, 10.1)] {
            assert!(!bounds.contains(x, y));
            assert!(!fence.contains(x, y));
        }
    }

    #[test]
    fn concave_polygon_excludes_notch() {
        // A "U" shape: the notch between the arms lies inside the bounding box
        // but outside the polygon.
        let fence = Geofence::new(
            "u",
            [
                (0.0, 0.0),
                (0.0, 9.0),
                (3.0, 9.0),
                (3.0, 3.0),
                (6.0, 3.0),
                (6.0, 9.0),
                (9.0, 9.0),
                (9.0, 0.0),
            ],
        )
        .unwrap();

        assert!(fence.contains(1.5, 6.0));
        assert!(fence.contains(7.5, 6.0));
        assert!(fence.contains(4.5, 1.5));
        assert!(!fence.contains(4.5, 6.0));
    }

    #[test]
    fn degenerate_polygons_are_rejected() {
        assert_eq!(
            Geofence::new("line", [(0.0, 0.0), (1.0, 1.0)]),
            Err(GeofenceError::TooFewVertices {
                name: "line".into(),
                count: 2
            })
        );
        assert_eq!(
            Geofence::new("", [(0.0, 0.0), (1.0, 1.0), (1.0, 0.0)]),
            Err(GeofenceError::EmptyName)
        );
        assert!(matches!(
            Geofence::new("nan", [(0.0, 0.0), (f64::NAN, 1.0), (1.0, 0.0)]),
            Err(GeofenceError::NonFiniteVertex { index: 1, .. })
        ));
    }

    #[test]
    fn set_reports_first_matching_fence() {
        let set = GeofenceSet::from_definitions(vec![
            ("west".to_string(), vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]),
            ("overlap".to_string(), vec![(5.0, 5.0), (5.0, 20.0), (20.0, 20.0), (20.0, 5.0)]),
        ])
        .unwrap();

        let at = |lat, lng| Coordinates::new(lat, lng).unwrap();
        assert_eq!(set.check(at(6.0, 6.0)), FenceVerdict::Inside("west"));
        assert_eq!(set.check(at(15.0, 15.0)), FenceVerdict::Inside("overlap"));
        assert_eq!(set.check(at(-1.0, -1.0)), FenceVerdict::Outside);
        assert!(!set.check(at(-1.0, -1.0)).admits());
    }

    #[test]
    fn empty_set_is_unrestricted() {
        let set = GeofenceSet::unrestricted();
        assert_eq!(set.check(Coordinates::new(1.0, 1.0).unwrap()), FenceVerdict::Unrestricted);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = GeofenceSet::new(vec![square(), square()]);
        assert_eq!(
            result,
            Err(GeofenceError::DuplicateName {
                name: "square".into()
            })
        );
    }
}
