//! Print Area Geometry - Placement Rules
//!
//! Rules run cheapest first: bounds, minimum size, overlap, resolution.
//! Each rule produces structured violations; the engine decides whether to
//! keep going after a failing rule.

use crate::catalog::{CatalogStore, PrintType};
use crate::config::GeometryPolicy;
use crate::draft::{ColorVariant, PrintArea};
use crate::validation::{Violation, ViolationKind};

/// Everything a placement rule may look at.
pub struct PlacementContext<'a> {
    pub area: &'a PrintArea,
    pub variant: &'a ColorVariant,
    pub catalog: &'a CatalogStore,
    pub policy: &'a GeometryPolicy,
}

impl PlacementContext<'_> {
    /// Print areas on the same variant, other than the one being placed.
    fn neighbours(&self) -> impl Iterator<Item = &PrintArea> {
        let id = self.area.id;
        self.variant.print_areas.iter().filter(move |a| a.id != id)
    }

    fn violation(&self, rule: &str, kind: ViolationKind, message: String) -> Violation {
        Violation::error(rule, kind, message)
            .on_variant(self.variant.id)
            .on_area(self.area.id)
    }
}

pub trait PlacementRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, ctx: &PlacementContext<'_>) -> Vec<Violation>;
}

// --- Concrete Rules ---

pub struct CanvasBoundsRule;

impl PlacementRule for CanvasBoundsRule {
    fn name(&self) -> &'static str { "canvas_bounds" }

    fn check(&self, ctx: &PlacementContext<'_>) -> Vec<Violation> {
        let canvas = ctx.variant.canvas.bounds();
        let bbox = ctx.area.shape.bounding_box();
        let mut violations = vec![];

        let inside = bbox.x >= 0.0
            && bbox.y >= 0.0
            && bbox.right() <= canvas.right()
            && bbox.bottom() <= canvas.bottom();
        if !inside {
            violations.push(
                ctx.violation(
                    self.name(),
                    ViolationKind::OutOfBounds,
                    format!("Print area '{}' extends beyond the canvas", ctx.area.name),
                )
                .expected(format!("within 0,0 .. {}x{}", canvas.width, canvas.height))
                .actual(format!(
                    "{},{} .. {},{}",
                    bbox.x,
                    bbox.y,
                    bbox.right(),
                    bbox.bottom()
                ))
                .remediation("Move or shrink the print area onto the garment mockup"),
            );
        }

        if ctx.policy.require_anchor_inside && !ctx.area.shape.contains_point(ctx.area.anchor) {
            violations.push(
                ctx.violation(
                    self.name(),
                    ViolationKind::OutOfBounds,
                    format!("Anchor of print area '{}' lies outside its shape", ctx.area.name),
                )
                .actual(format!("{},{}", ctx.area.anchor.x, ctx.area.anchor.y))
                .remediation("Place the anchor inside the print area"),
            );
        }

        violations
    }
}

pub struct MinimumAreaRule;

impl PlacementRule for MinimumAreaRule {
    fn name(&self) -> &'static str { "minimum_area" }

    fn check(&self, ctx: &PlacementContext<'_>) -> Vec<Violation> {
        let area = normalized_area(ctx.area, ctx.variant);
        let floor = ctx.policy.min_print_area_sq_in;
        if area >= floor {
            return vec![];
        }
        vec![ctx
            .violation(
                self.name(),
                ViolationKind::BelowMinimumArea,
                format!("Print area '{}' is too small to print", ctx.area.name),
            )
            .expected(format!("{:.2} sq in minimum", floor))
            .actual(format!("{:.2} sq in", area))
            .remediation("Enlarge the print area")]
    }
}

pub struct OverlapRule;

impl PlacementRule for OverlapRule {
    fn name(&self) -> &'static str { "overlap" }

    fn check(&self, ctx: &PlacementContext<'_>) -> Vec<Violation> {
        let tolerance = ctx.policy.overlap_tolerance_px;
        ctx.neighbours()
            .filter(|other| ctx.area.shape.intersects(&other.shape, tolerance))
            .map(|other| {
                let mut pair = [ctx.area.id, other.id];
                pair.sort();
                let mut violation = Violation::error(
                    self.name(),
                    ViolationKind::Overlap,
                    format!("Print areas '{}' and '{}' overlap", ctx.area.name, other.name),
                )
                .on_variant(ctx.variant.id)
                .remediation("Separate the print areas; two designs cannot share garment space");
                violation.print_areas = pair.to_vec();
                violation
            })
            .collect()
    }
}

/// Minimum DPI and maximum physical size per allowed print type.
/// Print types unknown to the catalog are left to the compatibility check.
pub struct ResolutionRule;

impl PlacementRule for ResolutionRule {
    fn name(&self) -> &'static str { "resolution" }

    fn check(&self, ctx: &PlacementContext<'_>) -> Vec<Violation> {
        let canvas = &ctx.variant.canvas;
        let bbox = ctx.area.shape.bounding_box();
        let width_in = bbox.width / canvas.pixels_per_inch_x();
        let height_in = bbox.height / canvas.pixels_per_inch_y();
        let dpi = canvas.effective_dpi();

        let mut violations = vec![];
        for id in &ctx.area.allowed_print_types {
            let Ok(print_type) = ctx.catalog.get::<PrintType>(id) else {
                continue;
            };

            if dpi < f64::from(print_type.min_dpi) {
                violations.push(
                    ctx.violation(
                        self.name(),
                        ViolationKind::Resolution,
                        format!(
                            "Canvas resolution too low for {} on print area '{}'",
                            print_type.name, ctx.area.name
                        ),
                    )
                    .on_print_type(id.clone())
                    .expected(format!("{} dpi minimum", print_type.min_dpi))
                    .actual(format!("{:.1} dpi", dpi))
                    .remediation("Upload a higher resolution mockup or remove this print type"),
                );
            }

            if width_in > print_type.max_print_width_in
                || height_in > print_type.max_print_height_in
            {
                violations.push(
                    ctx.violation(
                        self.name(),
                        ViolationKind::ExceedsMaxPrintSize,
                        format!(
                            "Print area '{}' is larger than {} can print",
                            ctx.area.name, print_type.name
                        ),
                    )
                    .on_print_type(id.clone())
                    .expected(format!(
                        "{:.2}x{:.2} in maximum",
                        print_type.max_print_width_in, print_type.max_print_height_in
                    ))
                    .actual(format!("{:.2}x{:.2} in", width_in, height_in))
                    .remediation("Shrink the print area or choose another print type"),
                );
            }
        }
        violations
    }
}

/// Area of the print region in square inches of garment.
pub fn normalized_area(area: &PrintArea, variant: &ColorVariant) -> f64 {
    let canvas = &variant.canvas;
    area.shape.area() / (canvas.pixels_per_inch_x() * canvas.pixels_per_inch_y())
}

/// Geometry engine orchestrates placement rules under a policy.
pub struct PrintAreaGeometryEngine {
    rules: Vec<Box<dyn PlacementRule>>,
    policy: GeometryPolicy,
}

impl PrintAreaGeometryEngine {
    pub fn new(policy: GeometryPolicy) -> Self {
        Self {
            rules: vec![
                Box::new(CanvasBoundsRule),
                Box::new(MinimumAreaRule),
                Box::new(OverlapRule),
                Box::new(ResolutionRule),
            ],
            policy,
        }
    }

    pub fn policy(&self) -> &GeometryPolicy {
        &self.policy
    }

    /// Checks one print area against its variant's canvas and the other
    /// print areas already on that variant. Empty means the placement is ok.
    pub fn validate_placement(
        &self,
        area: &PrintArea,
        variant: &ColorVariant,
        catalog: &CatalogStore,
    ) -> Vec<Violation> {
        let ctx = PlacementContext { area, variant, catalog, policy: &self.policy };
        let mut all_violations = vec![];

        for rule in &self.rules {
            let violations = rule.check(&ctx);
            let failed = !violations.is_empty();
            all_violations.extend(violations);
            if failed && self.policy.short_circuit {
                break;
            }
        }

        all_violations
    }

    pub fn normalized_area(&self, area: &PrintArea, variant: &ColorVariant) -> f64 {
        normalized_area(area, variant)
    }
}

impl Default for PrintAreaGeometryEngine {
    fn default() -> Self {
        Self::new(GeometryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::CanvasImage;
    use crate::ids::{ColorId, ColorVariantId, FabricId, PrintAreaId, PrintTypeId};
    use crate::shape::{Point, Shape};
    use std::collections::BTreeSet;

    fn catalog() -> CatalogStore {
        let mut store = CatalogStore::new();
        store
            .create(PrintType {
                id: PrintTypeId::new("dtg"),
                name: "DTG".into(),
                min_dpi: 75,
                max_dpi: 600,
                max_print_width_in: 12.0,
                max_print_height_in: 16.0,
                fabrics: BTreeSet::from([FabricId::new("cotton")]),
            })
            .unwrap();
        store
            .create(PrintType {
                id: PrintTypeId::new("sublimation"),
                name: "Sublimation".into(),
                min_dpi: 200,
                max_dpi: 1200,
                max_print_width_in: 2.0,
                max_print_height_in: 2.0,
                fabrics: BTreeSet::new(),
            })
            .unwrap();
        store
    }

    fn area(name: &str, shape: Shape, types: &[&str]) -> PrintArea {
        let anchor = shape.bounding_box().center();
        PrintArea {
            id: PrintAreaId::generate(),
            name: name.into(),
            anchor,
            shape,
            allowed_print_types: types.iter().map(|t| PrintTypeId::new(*t)).collect(),
            max_print_dpi: None,
            warnings: vec![],
        }
    }

    fn variant(areas: Vec<PrintArea>) -> ColorVariant {
        ColorVariant {
            id: ColorVariantId::generate(),
            color: ColorId::new("red"),
            fabric: FabricId::new("cotton"),
            canvas: CanvasImage {
                asset: "sha256:tee-red".into(),
                width_px: 1000,
                height_px: 1200,
                physical_width_in: 10.0,
                physical_height_in: 12.0,
            },
            print_areas: areas,
        }
    }

    #[test]
    fn well_placed_area_passes() {
        let engine = PrintAreaGeometryEngine::default();
        let front = area("front", Shape::rect(100.0, 100.0, 300.0, 300.0), &["dtg"]);
        let violations = engine.validate_placement(&front, &variant(vec![]), &catalog());
        assert!(violations.is_empty(), "{:?}", violations);
        assert_eq!(engine.normalized_area(&front, &variant(vec![])), 9.0);
    }

    #[test]
    fn out_of_bounds_detected() {
        let engine = PrintAreaGeometryEngine::default();
        let sleeve = area("sleeve", Shape::rect(-10.0, 100.0, 300.0, 300.0), &["dtg"]);
        let violations = engine.validate_placement(&sleeve, &variant(vec![]), &catalog());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::OutOfBounds);
    }

    #[test]
    fn anchor_outside_shape_detected() {
        let engine = PrintAreaGeometryEngine::default();
        let mut front = area("front", Shape::rect(100.0, 100.0, 300.0, 300.0), &["dtg"]);
        front.anchor = Point::new(900.0, 900.0);
        let violations = engine.validate_placement(&front, &variant(vec![]), &catalog());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("Anchor"));
    }

    #[test]
    fn tiny_area_below_floor() {
        let engine = PrintAreaGeometryEngine::default();
        let tag = area("tag", Shape::rect(10.0, 10.0, 100.0, 100.0), &["dtg"]);
        let violations = engine.validate_placement(&tag, &variant(vec![]), &catalog());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::BelowMinimumArea);
    }

    #[test]
    fn overlap_names_both_areas() {
        let engine = PrintAreaGeometryEngine::default();
        let front = area("front", Shape::rect(100.0, 100.0, 300.0, 300.0), &["dtg"]);
        let front2 = area("front2", Shape::rect(250.0, 250.0, 300.0, 300.0), &["dtg"]);
        let v = variant(vec![front.clone()]);

        let violations = engine.validate_placement(&front2, &v, &catalog());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Overlap);
        assert!(violations[0].involves(front.id));
        assert!(violations[0].involves(front2.id));
    }

    #[test]
    fn resolution_names_offending_print_type() {
        let engine = PrintAreaGeometryEngine::default();
        let front = area("front", Shape::rect(100.0, 100.0, 300.0, 300.0), &["dtg", "sublimation"]);
        let violations = engine.validate_placement(&front, &variant(vec![]), &catalog());

        let kinds: Vec<_> = violations.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, vec![ViolationKind::Resolution, ViolationKind::ExceedsMaxPrintSize]);
        assert!(violations
            .iter()
            .all(|v| v.print_type == Some(PrintTypeId::new("sublimation"))));
    }

    #[test]
    fn short_circuit_stops_after_first_failing_rule() {
        let policy = GeometryPolicy { short_circuit: true, ..Default::default() };
        let engine = PrintAreaGeometryEngine::new(policy);
        // out of bounds and too small
        let bad = area("bad", Shape::rect(950.0, 10.0, 100.0, 100.0), &["dtg"]);
        let violations = engine.validate_placement(&bad, &variant(vec![]), &catalog());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::OutOfBounds);
    }
}
