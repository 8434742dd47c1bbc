//! Planar geometry for zones: polygons with holes, multipolygons, and uniform
//! sampling of interior points.
//!
//! All coordinates are assumed to be in one projected reference system, so
//! distances and areas are Euclidean.
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Rejection sampling gives up after this many draws and falls back to the centroid.
pub const MAX_SAMPLING_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    #[must_use]
    pub fn distance_squared(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[must_use]
    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    fn around(points: impl IntoIterator<Item = Point>) -> Option<BoundingBox> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(
            BoundingBox {
                min: first,
                max: first,
            },
            |bbox, p| BoundingBox {
                min: Point::new(bbox.min.x.min(p.x), bbox.min.y.min(p.y)),
                max: Point::new(bbox.max.x.max(p.x), bbox.max.y.max(p.y)),
            },
        ))
    }
}

// Signed shoelace area and the area-weighted centroid accumulators of a ring.
fn ring_moments(ring: &[Point]) -> (f64, f64, f64) {
    let mut area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (a, b) in ring.iter().zip(ring.iter().cycle().skip(1)) {
        let cross = a.x * b.y - b.x * a.y;
        area += cross;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    (area / 2.0, cx / 6.0, cy / 6.0)
}

// Even-odd crossing test against one ring.
fn ring_crossings(ring: &[Point], point: &Point) -> bool {
    let mut inside = false;
    for (a, b) in ring.iter().zip(ring.iter().cycle().skip(1)) {
        if (a.y > point.y) != (b.y > point.y) {
            let x_at_y = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if point.x < x_at_y {
                inside = !inside;
            }
        }
    }
    inside
}

fn vertex_mean<'a>(points: impl IntoIterator<Item = &'a Point>) -> Point {
    let (sum, count) = points
        .into_iter()
        .fold((Point::default(), 0_usize), |(sum, count), p| {
            (Point::new(sum.x + p.x, sum.y + p.y), count + 1)
        });
    if count == 0 {
        return Point::default();
    }
    #[allow(clippy::cast_precision_loss)]
    let n = count as f64;
    Point::new(sum.x / n, sum.y / n)
}

/// A polygon: one exterior ring and any number of holes. Rings may be open
/// or closed and in either orientation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub exterior: Vec<Point>,
    pub holes: Vec<Vec<Point>>,
}

impl Polygon {
    #[must_use]
    pub fn new(exterior: Vec<Point>, holes: Vec<Vec<Point>>) -> Polygon {
        Polygon { exterior, holes }
    }

    fn rings(&self) -> impl Iterator<Item = &Vec<Point>> {
        std::iter::once(&self.exterior).chain(self.holes.iter())
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        let exterior = ring_moments(&self.exterior).0.abs();
        let holes: f64 = self.holes.iter().map(|h| ring_moments(h).0.abs()).sum();
        (exterior - holes).max(0.0)
    }

    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        self.rings()
            .filter(|ring| ring_crossings(ring, point))
            .count()
            % 2
            == 1
    }
}

/// A zone's geometry. A plain polygon is a multipolygon with one part.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiPolygon(pub Vec<Polygon>);

impl From<Polygon> for MultiPolygon {
    fn from(polygon: Polygon) -> Self {
        MultiPolygon(vec![polygon])
    }
}

impl MultiPolygon {
    /// An axis-aligned rectangle, mostly useful for building test zones.
    #[must_use]
    pub fn rectangle(min: Point, max: Point) -> MultiPolygon {
        Polygon::new(
            vec![
                min,
                Point::new(max.x, min.y),
                max,
                Point::new(min.x, max.y),
            ],
            vec![],
        )
        .into()
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.0.iter().map(Polygon::area).sum()
    }

    /// Area-weighted centroid. Degenerate geometry falls back to the mean of
    /// the exterior vertices.
    #[must_use]
    pub fn centroid(&self) -> Point {
        let mut area = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for polygon in &self.0 {
            for (i, ring) in polygon.rings().enumerate() {
                let (a, x, y) = ring_moments(ring);
                // Exteriors count positive and holes negative, whatever their winding.
                let sign = if (a < 0.0) == (i == 0) { -1.0 } else { 1.0 };
                area += sign * a;
                cx += sign * x;
                cy += sign * y;
            }
        }
        if area > f64::EPSILON {
            return Point::new(cx / area, cy / area);
        }
        vertex_mean(self.0.iter().flat_map(|p| p.exterior.iter()))
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::around(self.0.iter().flat_map(|p| p.exterior.iter().copied()))
    }

    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        self.0.iter().any(|polygon| polygon.contains(point))
    }

    /// Draws a point uniformly from the interior by rejection sampling in the
    /// bounding box. Zero-area geometry, or running out of attempts, yields
    /// the centroid.
    pub fn sample_interior_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        let bbox = match self.bounding_box() {
            Some(bbox) if self.area() > 0.0 => bbox,
            _ => {
                warn!("sampling a degenerate geometry; using its centroid");
                return self.centroid();
            }
        };
        for _ in 0..MAX_SAMPLING_ATTEMPTS {
            let candidate = Point::new(
                rng.random_range(bbox.min.x..=bbox.max.x),
                rng.random_range(bbox.min.y..=bbox.max.y),
            );
            if self.contains(&candidate) {
                return candidate;
            }
        }
        warn!("no interior point found after {MAX_SAMPLING_ATTEMPTS} attempts; using the centroid");
        self.centroid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn square(min: f64, max: f64) -> Vec<Point> {
        vec![
            Point::new(min, min),
            Point::new(max, min),
            Point::new(max, max),
            Point::new(min, max),
        ]
    }

    #[test]
    fn square_with_hole() {
        let polygon = Polygon::new(square(0.0, 10.0), vec![square(4.0, 6.0)]);
        assert_relative_eq!(polygon.area(), 96.0);
        assert!(polygon.contains(&Point::new(1.0, 1.0)));
        assert!(!polygon.contains(&Point::new(5.0, 5.0)));
        assert!(!polygon.contains(&Point::new(11.0, 5.0)));

        let centroid = MultiPolygon::from(polygon).centroid();
        assert_relative_eq!(centroid.x, 5.0);
        assert_relative_eq!(centroid.y, 5.0);
    }

    #[test]
    fn multipolygon_area_and_centroid() {
        let geometry = MultiPolygon(vec![
            Polygon::new(square(0.0, 2.0), vec![]),
            Polygon::new(square(10.0, 12.0), vec![]),
        ]);
        assert_relative_eq!(geometry.area(), 8.0);
        let centroid = geometry.centroid();
        assert_relative_eq!(centroid.x, 6.0);
        assert_relative_eq!(centroid.y, 6.0);
        assert!(geometry.contains(&Point::new(11.0, 11.0)));
        assert!(!geometry.contains(&Point::new(5.0, 5.0)));
    }

    #[test]
    fn closed_ring_matches_open_ring() {
        let mut closed = square(0.0, 4.0);
        closed.push(closed[0]);
        assert_relative_eq!(Polygon::new(closed, vec![]).area(), 16.0);
    }

    #[test]
    fn samples_stay_inside() {
        let geometry = MultiPolygon::from(Polygon::new(square(0.0, 10.0), vec![square(2.0, 8.0)]));
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..500 {
            let p = geometry.sample_interior_point(&mut rng);
            assert!(geometry.contains(&p));
        }
    }

    #[test]
    fn degenerate_geometry_uses_centroid() {
        let line = MultiPolygon::from(Polygon::new(
            vec![Point::new(0.0, 0.0), Point::new(2.0, 2.0), Point::new(4.0, 4.0)],
            vec![],
        ));
        assert_relative_eq!(line.area(), 0.0);
        let mut rng = SmallRng::seed_from_u64(1);
        let p = line.sample_interior_point(&mut rng);
        assert_relative_eq!(p.x, 2.0);
        assert_relative_eq!(p.y, 2.0);

        let empty = MultiPolygon::default();
        assert_eq!(empty.sample_interior_point(&mut rng), Point::default());
    }

    #[test]
    fn distance() {
        assert_relative_eq!(Point::new(0.0, 0.0).distance(&Point::new(3.0, 4.0)), 5.0);
    }
}
