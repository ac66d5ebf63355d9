//! Print Area Shapes
//!
//! Rectangles and polygons share one capability surface so the geometry
//! rules never branch on the shape kind. All coordinates are canvas pixels.

use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, origin at the top-left corner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Interval overlap on both axes, deeper than `tolerance`.
    pub fn overlaps(&self, other: &Rect, tolerance: f64) -> bool {
        let overlap_w = self.right().min(other.right()) - self.x.max(other.x);
        let overlap_h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        overlap_w > tolerance + EPSILON && overlap_h > tolerance + EPSILON
    }

    fn corners(&self) -> Vec<Point> {
        vec![
            Point::new(self.x, self.y),
            Point::new(self.right(), self.y),
            Point::new(self.right(), self.bottom()),
            Point::new(self.x, self.bottom()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Polygon {
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Rectangle(Rect),
    Polygon(Polygon),
}

impl Shape {
    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::Rectangle(Rect::new(x, y, width, height))
    }

    pub fn polygon(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self::Polygon(Polygon {
            points: points.into_iter().map(|(x, y)| Point::new(x, y)).collect(),
        })
    }

    /// Rejects shapes no placement rule can reason about.
    pub fn check_well_formed(&self) -> Result<(), String> {
        let vertices = self.vertices();
        if vertices.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err("coordinates must be finite numbers".to_string());
        }
        match self {
            Self::Rectangle(r) => {
                if r.width <= 0.0 || r.height <= 0.0 {
                    return Err(format!(
                        "rectangle must have positive size, got {}x{}",
                        r.width, r.height
                    ));
                }
            }
            Self::Polygon(p) => {
                if p.points.len() < 3 {
                    return Err(format!("polygon needs at least 3 points, got {}", p.points.len()));
                }
                if self.area() <= EPSILON {
                    return Err("polygon has zero area".to_string());
                }
                if has_repeated_vertex(&p.points) {
                    return Err("polygon repeats a vertex".to_string());
                }
                if self_intersects(&p.points) {
                    return Err("polygon edges cross or touch each other".to_string());
                }
            }
        }
        Ok(())
    }

    pub fn vertices(&self) -> Vec<Point> {
        match self {
            Self::Rectangle(r) => r.corners(),
            Self::Polygon(p) => p.points.clone(),
        }
    }

    pub fn bounding_box(&self) -> Rect {
        match self {
            Self::Rectangle(r) => *r,
            Self::Polygon(p) => {
                let mut min = Point::new(f64::INFINITY, f64::INFINITY);
                let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
                for pt in &p.points {
                    min.x = min.x.min(pt.x);
                    min.y = min.y.min(pt.y);
                    max.x = max.x.max(pt.x);
                    max.y = max.y.max(pt.y);
                }
                if p.points.is_empty() {
                    return Rect::new(0.0, 0.0, 0.0, 0.0);
                }
                Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
            }
        }
    }

    /// Enclosed area in square pixels.
    pub fn area(&self) -> f64 {
        match self {
            Self::Rectangle(r) => r.area(),
            Self::Polygon(p) => signed_area(&p.points).abs(),
        }
    }

    /// Inside or on the boundary.
    pub fn contains_point(&self, pt: Point) -> bool {
        match self {
            Self::Rectangle(r) => r.contains_point(pt),
            Self::Polygon(p) => on_boundary(&p.points, pt) || strictly_inside(&p.points, pt),
        }
    }

    /// True when the interiors share area. Shapes that only touch along an
    /// edge or at a corner do not intersect.
    ///
    /// `tolerance` is measured on the bounding box of the shared region: an
    /// overlap no deeper than `tolerance` on either axis is ignored. For two
    /// rectangles that box is the interval overlap itself.
    pub fn intersects(&self, other: &Shape, tolerance: f64) -> bool {
        if !self.bounding_box().overlaps(&other.bounding_box(), tolerance) {
            return false;
        }
        if let (Self::Rectangle(_), Self::Rectangle(_)) = (self, other) {
            return true;
        }
        let (a, b) = (self.vertices(), other.vertices());
        if !polygons_overlap(&a, &b) {
            return false;
        }
        if tolerance <= 0.0 {
            return true;
        }
        match overlap_extent(self, other, &a, &b) {
            Some(extent) => {
                extent.width > tolerance + EPSILON && extent.height > tolerance + EPSILON
            }
            None => false,
        }
    }
}

fn signed_area(points: &[Point]) -> f64 {
    edges(points)
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum::<f64>()
        / 2.0
}

fn centroid(points: &[Point]) -> Option<Point> {
    let area = signed_area(points);
    if area.abs() <= EPSILON {
        return None;
    }
    let (mut cx, mut cy) = (0.0, 0.0);
    for (a, b) in edges(points) {
        let cross = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    Some(Point::new(cx / (6.0 * area), cy / (6.0 * area)))
}

fn edges(points: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = points.len();
    (0..n).map(move |i| (points[i], points[(i + 1) % n]))
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    orientation(a, b, p).abs() <= EPSILON
        && p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

/// Segments cross at a single interior point of both.
fn properly_cross(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);
    ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
}

fn on_boundary(points: &[Point], p: Point) -> bool {
    edges(points).any(|(a, b)| on_segment(a, b, p))
}

fn strictly_inside(points: &[Point], p: Point) -> bool {
    if on_boundary(points, p) {
        return false;
    }
    let mut inside = false;
    for (a, b) in edges(points) {
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

fn has_repeated_vertex(points: &[Point]) -> bool {
    points.iter().enumerate().any(|(i, p)| {
        points[i + 1..]
            .iter()
            .any(|q| (p.x - q.x).abs() <= EPSILON && (p.y - q.y).abs() <= EPSILON)
    })
}

/// Any two edges meeting outside their shared vertex, including a vertex
/// resting on a non-adjacent edge and collinear edges that fold back.
fn self_intersects(points: &[Point]) -> bool {
    let n = points.len();
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        let touches = (0..n)
            .filter(|&k| k != i && k != (i + 1) % n)
            .any(|k| on_segment(a, b, points[k]));
        if touches {
            return true;
        }
    }
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                continue;
            }
            let (a1, a2) = (points[i], points[(i + 1) % n]);
            let (b1, b2) = (points[j], points[(j + 1) % n]);
            if properly_cross(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

/// General simple-polygon interior overlap test.
///
/// Edge crossings catch partial overlap; vertex, edge-midpoint and centroid
/// probes catch containment and coincident outlines.
fn polygons_overlap(a: &[Point], b: &[Point]) -> bool {
    for (a1, a2) in edges(a) {
        for (b1, b2) in edges(b) {
            if properly_cross(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    probe_inside(a, b) || probe_inside(b, a)
}

/// Point where two properly crossing segments meet.
fn crossing_point(a1: Point, a2: Point, b1: Point, b2: Point) -> Point {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let t = d1 / (d1 - d2);
    Point::new(a1.x + t * (a2.x - a1.x), a1.y + t * (a2.y - a1.y))
}

/// Bounding box of the region two shapes share. Every vertex of that region
/// is a vertex of one shape lying in the other, or an edge crossing.
fn overlap_extent(sa: &Shape, sb: &Shape, a: &[Point], b: &[Point]) -> Option<Rect> {
    let mut corners: Vec<Point> = a.iter().copied().filter(|p| sb.contains_point(*p)).collect();
    corners.extend(b.iter().copied().filter(|p| sa.contains_point(*p)));
    for (a1, a2) in edges(a) {
        for (b1, b2) in edges(b) {
            if properly_cross(a1, a2, b1, b2) {
                corners.push(crossing_point(a1, a2, b1, b2));
            }
        }
    }
    if corners.is_empty() {
        return None;
    }
    Some(Shape::Polygon(Polygon { points: corners }).bounding_box())
}

fn probe_inside(probes: &[Point], container: &[Point]) -> bool {
    if probes.iter().any(|p| strictly_inside(container, *p)) {
        return true;
    }
    let midpoint_inside = edges(probes).any(|(p, q)| {
        strictly_inside(container, Point::new((p.x + q.x) / 2.0, (p.y + q.y) / 2.0))
    });
    if midpoint_inside {
        return true;
    }
    match centroid(probes) {
        Some(c) if strictly_inside(probes, c) => strictly_inside(container, c),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Shape {
        Shape::polygon([(x, y), (x + size, y), (x + size, y + size), (x, y + size)])
    }

    #[test]
    fn rect_overlap_uses_intervals() {
        let front = Shape::rect(100.0, 100.0, 300.0, 300.0);
        let front2 = Shape::rect(250.0, 250.0, 300.0, 300.0);
        let back = Shape::rect(400.0, 100.0, 100.0, 100.0);
        assert!(front.intersects(&front2, 0.0));
        // shares the x = 400 edge only
        assert!(!front.intersects(&back, 0.0));
    }

    #[test]
    fn tolerance_allows_shallow_overlap() {
        let a = Shape::rect(0.0, 0.0, 100.0, 100.0);
        let b = Shape::rect(98.0, 0.0, 100.0, 100.0);
        assert!(a.intersects(&b, 0.0));
        assert!(!a.intersects(&b, 2.0));
    }

    #[test]
    fn crossing_polygons_intersect() {
        let diamond = Shape::polygon([(50.0, 0.0), (100.0, 50.0), (50.0, 100.0), (0.0, 50.0)]);
        let rect = Shape::rect(60.0, 40.0, 100.0, 20.0);
        assert!(diamond.intersects(&rect, 0.0));
        assert!(rect.intersects(&diamond, 0.0));
    }

    #[test]
    fn bounding_boxes_overlap_but_polygons_do_not() {
        let lower_left = Shape::polygon([(0.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        let upper_right = Shape::polygon([(10.0, 0.0), (110.0, 0.0), (110.0, 100.0)]);
        assert!(!lower_left.intersects(&upper_right, 0.0));
    }

    #[test]
    fn contained_and_identical_polygons_intersect() {
        let outer = square(0.0, 0.0, 100.0);
        let inner = square(25.0, 25.0, 10.0);
        assert!(outer.intersects(&inner, 0.0));
        assert!(inner.intersects(&outer, 0.0));
        assert!(outer.intersects(&square(0.0, 0.0, 100.0), 0.0));
    }

    #[test]
    fn adjacent_polygons_do_not_intersect() {
        assert!(!square(0.0, 0.0, 50.0).intersects(&square(50.0, 0.0, 50.0), 0.0));
    }

    #[test]
    fn polygon_area_and_bounds() {
        let triangle = Shape::polygon([(0.0, 0.0), (40.0, 0.0), (0.0, 30.0)]);
        assert_eq!(triangle.area(), 600.0);
        assert_eq!(triangle.bounding_box(), Rect::new(0.0, 0.0, 40.0, 30.0));
        assert!(triangle.contains_point(Point::new(5.0, 5.0)));
        assert!(!triangle.contains_point(Point::new(39.0, 29.0)));
    }

    #[test]
    fn malformed_shapes_rejected() {
        assert!(Shape::rect(0.0, 0.0, 0.0, 10.0).check_well_formed().is_err());
        assert!(Shape::polygon([(0.0, 0.0), (1.0, 1.0)]).check_well_formed().is_err());
        let bowtie = Shape::polygon([(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)]);
        assert!(bowtie.check_well_formed().is_err());
        assert!(square(0.0, 0.0, 10.0).check_well_formed().is_ok());
    }

    #[test]
    fn degenerate_polygons_rejected() {
        let repeated = Shape::polygon([
            (0.0, 300.0),
            (300.0, 200.0),
            (200.0, 200.0),
            (0.0, 0.0),
            (200.0, 200.0),
        ]);
        assert!(repeated.check_well_formed().is_err());
        // vertex (50, 0) rests on the bottom edge without crossing it
        let pinched = Shape::polygon([
            (0.0, 0.0),
            (100.0, 0.0),
            (100.0, 100.0),
            (50.0, 0.0),
            (0.0, 100.0),
        ]);
        assert!(pinched.check_well_formed().is_err());
        let spike = Shape::polygon([(0.0, 0.0), (100.0, 0.0), (50.0, 0.0), (50.0, 50.0)]);
        assert!(spike.check_well_formed().is_err());
        let collinear = Shape::polygon([(0.0, 0.0), (50.0, 0.0), (100.0, 0.0), (100.0, 100.0)]);
        assert!(collinear.check_well_formed().is_ok());
    }

    #[test]
    fn tolerance_measures_shared_region_for_polygons() {
        let triangle = Shape::polygon([(0.0, 0.0), (100.0, 0.0), (0.0, 100.0)]);
        // boxes overlap 51px deep; the shapes share a 2x2 corner
        let rect = Shape::rect(49.0, 49.0, 101.0, 101.0);
        assert!(triangle.intersects(&rect, 0.0));
        assert!(triangle.intersects(&rect, 1.0));
        assert!(!triangle.intersects(&rect, 3.0));
        assert!(!rect.intersects(&triangle, 3.0));
    }

    #[test]
    fn shape_json_is_tagged() {
        let json = serde_json::to_value(Shape::rect(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json["type"], "rectangle");
        assert_eq!(json["width"], 3.0);
    }
}
