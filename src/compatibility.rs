//! Compatibility Rules - Fabric x PrintType x Color
//!
//! Derived from the support sets declared on the catalog records.
//! There is no separate matrix to keep in sync.

use crate::catalog::{CatalogStore, Color, Fabric, PrintType};
use crate::draft::{ColorVariant, PrintArea};
use crate::ids::{ColorId, FabricId, PrintTypeId};
use crate::validation::{Violation, ViolationKind};

const RULE: &str = "compatibility";

pub struct CompatibilityRuleEngine<'a> {
    catalog: &'a CatalogStore,
}

impl<'a> CompatibilityRuleEngine<'a> {
    pub fn new(catalog: &'a CatalogStore) -> Self {
        Self { catalog }
    }

    pub fn is_compatible(
        &self,
        fabric: &FabricId,
        print_type: &PrintTypeId,
        color: &ColorId,
    ) -> bool {
        self.explain(fabric, print_type, color).is_empty()
    }

    /// Every reason the combination cannot be produced, fabric-side first.
    /// Empty when compatible.
    pub fn explain(
        &self,
        fabric_id: &FabricId,
        print_type_id: &PrintTypeId,
        color_id: &ColorId,
    ) -> Vec<String> {
        let fabric = self.catalog.get::<Fabric>(fabric_id).ok();
        let print_type = self.catalog.get::<PrintType>(print_type_id).ok();
        let color = self.catalog.get::<Color>(color_id).ok();

        let mut reasons = vec![];
        if fabric.is_none() {
            reasons.push(format!("Fabric {} not found", fabric_id));
        }
        if print_type.is_none() {
            reasons.push(format!("PrintType {} not found", print_type_id));
        }
        if color.is_none() {
            reasons.push(format!("Color {} not found", color_id));
        }

        if let Some(fabric) = fabric {
            if !fabric.print_types.contains(print_type_id) {
                reasons.push(format!(
                    "PrintType {} unsupported on Fabric {}",
                    print_type_id, fabric_id
                ));
            }
            if !fabric.colors.contains(color_id) {
                reasons.push(format!("Color {} not offered on Fabric {}", color_id, fabric_id));
            }
        }
        if let Some(print_type) = print_type {
            if !print_type.fabrics.contains(fabric_id) {
                reasons.push(format!(
                    "PrintType {} does not list Fabric {}",
                    print_type_id, fabric_id
                ));
            }
        }
        if let Some(color) = color {
            if !color.fabrics.contains(fabric_id) {
                reasons.push(format!(
                    "Color {} is not available on Fabric {}",
                    color_id, fabric_id
                ));
            }
        }

        reasons
    }

    /// Whether the color can be offered on the fabric at all.
    pub fn color_on_fabric(&self, fabric_id: &FabricId, color_id: &ColorId) -> bool {
        let fabric_offers = self
            .catalog
            .get::<Fabric>(fabric_id)
            .map_or(false, |f| f.colors.contains(color_id));
        let color_lists = self
            .catalog
            .get::<Color>(color_id)
            .map_or(false, |c| c.fabrics.contains(fabric_id));
        fabric_offers && color_lists
    }

    /// A print area needs at least one allowed print type that can be
    /// produced on its variant's fabric and color.
    ///
    /// When none qualifies every allowed type is reported as an error. When
    /// some qualify, the rest are reported as warnings.
    pub fn check_print_area(&self, area: &PrintArea, variant: &ColorVariant) -> Vec<Violation> {
        let rejected: Vec<_> = area
            .allowed_print_types
            .iter()
            .filter_map(|pt| {
                let reasons = self.explain(&variant.fabric, pt, &variant.color);
                (!reasons.is_empty()).then(|| (pt, reasons))
            })
            .collect();
        let none_compatible = rejected.len() == area.allowed_print_types.len();

        rejected
            .into_iter()
            .map(|(pt, reasons)| {
                let violation = Violation::error(
                    RULE,
                    ViolationKind::Compatibility,
                    format!(
                        "PrintType {} cannot be used on print area '{}': {}",
                        pt,
                        area.name,
                        reasons.join("; ")
                    ),
                )
                .on_variant(variant.id)
                .on_area(area.id)
                .on_print_type(pt.clone())
                .expected(format!("{} on {} in {}", pt, variant.fabric, variant.color))
                .remediation("Choose a print type supported by this fabric and color");
                if none_compatible {
                    violation
                } else {
                    violation.into_warning()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn catalog() -> CatalogStore {
        let mut store = CatalogStore::new();
        store
            .create(Fabric {
                id: FabricId::new("cotton"),
                name: "Cotton".into(),
                print_types: BTreeSet::from([PrintTypeId::new("dtg")]),
                colors: BTreeSet::from([ColorId::new("red")]),
            })
            .unwrap();
        store
            .create(PrintType {
                id: PrintTypeId::new("dtg"),
                name: "Direct to Garment".into(),
                min_dpi: 150,
                max_dpi: 600,
                max_print_width_in: 16.0,
                max_print_height_in: 20.0,
                fabrics: BTreeSet::from([FabricId::new("cotton")]),
            })
            .unwrap();
        store
            .create(PrintType {
                id: PrintTypeId::new("screen"),
                name: "Screen Print".into(),
                min_dpi: 100,
                max_dpi: 300,
                max_print_width_in: 14.0,
                max_print_height_in: 16.0,
                fabrics: BTreeSet::new(),
            })
            .unwrap();
        store
            .create(Color {
                id: ColorId::new("red"),
                name: "Red".into(),
                swatch: "#c0392b".into(),
                fabrics: BTreeSet::from([FabricId::new("cotton")]),
            })
            .unwrap();
        store
    }

    #[test]
    fn declared_support_is_compatible() {
        let store = catalog();
        let rules = CompatibilityRuleEngine::new(&store);
        assert!(rules.is_compatible(&"cotton".into(), &"dtg".into(), &"red".into()));
        assert!(rules.color_on_fabric(&"cotton".into(), &"red".into()));
    }

    #[test]
    fn explain_names_unsupported_print_type() {
        let store = catalog();
        let rules = CompatibilityRuleEngine::new(&store);
        let reasons = rules.explain(&"cotton".into(), &"screen".into(), &"red".into());
        assert_eq!(
            reasons,
            vec![
                "PrintType screen unsupported on Fabric cotton".to_string(),
                "PrintType screen does not list Fabric cotton".to_string(),
            ]
        );
    }

    #[test]
    fn print_area_with_only_incompatible_type_is_an_error() {
        use crate::draft::CanvasImage;
        use crate::ids::{ColorVariantId, PrintAreaId};
        use crate::shape::{Point, Shape};
        use crate::validation::Severity;

        let store = catalog();
        let rules = CompatibilityRuleEngine::new(&store);
        let mut area = PrintArea {
            id: PrintAreaId::generate(),
            name: "front".into(),
            anchor: Point::new(50.0, 50.0),
            shape: Shape::rect(0.0, 0.0, 100.0, 100.0),
            allowed_print_types: BTreeSet::from([PrintTypeId::new("screen")]),
            max_print_dpi: None,
            warnings: vec![],
        };
        let variant = ColorVariant {
            id: ColorVariantId::generate(),
            color: "red".into(),
            fabric: "cotton".into(),
            canvas: CanvasImage {
                asset: "sha256:red".into(),
                width_px: 100,
                height_px: 100,
                physical_width_in: 1.0,
                physical_height_in: 1.0,
            },
            print_areas: vec![],
        };

        let findings = rules.check_print_area(&area, &variant);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(findings[0].print_type, Some(PrintTypeId::new("screen")));

        area.allowed_print_types.insert(PrintTypeId::new("dtg"));
        let findings = rules.check_print_area(&area, &variant);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn unknown_entities_are_reasons() {
        let store = catalog();
        let rules = CompatibilityRuleEngine::new(&store);
        let reasons = rules.explain(&"silk".into(), &"dtg".into(), &"red".into());
        assert_eq!(reasons[0], "Fabric silk not found");
        assert!(!rules.is_compatible(&"silk".into(), &"dtg".into(), &"red".into()));
    }
}
