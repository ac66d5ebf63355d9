//! Draft configuration data model
//!
//! A draft is the single mutable copy of a product's variants and print
//! areas. Published configurations are frozen copies of the same records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::{CatalogEntity, Color, Fabric, PrintType, Product};
use crate::ids::{ColorId, ColorVariantId, DraftId, FabricId, PrintAreaId, PrintTypeId, ProductId};
use crate::shape::{Point, Rect, Shape};
use crate::validation::Violation;

/// Flat garment mockup for one color. The engine never decodes the image;
/// it only uses the declared dimensions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanvasImage {
    /// Content-addressed asset reference.
    pub asset: String,
    pub width_px: u32,
    pub height_px: u32,
    /// Real-world span of the canvas on the garment.
    pub physical_width_in: f64,
    pub physical_height_in: f64,
}

impl CanvasImage {
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width_px), f64::from(self.height_px))
    }

    pub fn pixels_per_inch_x(&self) -> f64 {
        f64::from(self.width_px) / self.physical_width_in
    }

    pub fn pixels_per_inch_y(&self) -> f64 {
        f64::from(self.height_px) / self.physical_height_in
    }

    /// Resolution the mockup delivers when printed at garment scale.
    pub fn effective_dpi(&self) -> f64 {
        self.pixels_per_inch_x().min(self.pixels_per_inch_y())
    }

    pub(crate) fn check_well_formed(&self) -> Result<(), String> {
        if self.width_px == 0 || self.height_px == 0 {
            return Err(format!("canvas has zero size {}x{}", self.width_px, self.height_px));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.physical_width_in) || !positive(self.physical_height_in) {
            return Err("canvas physical size must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrintArea {
    pub id: PrintAreaId,
    pub name: String,
    pub anchor: Point,
    pub shape: Shape,
    pub allowed_print_types: BTreeSet<PrintTypeId>,
    /// Smallest `max_dpi` across the allowed print types.
    pub max_print_dpi: Option<u32>,
    /// Findings from the eager placement check on add.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Violation>,
}

/// Input for [`crate::composer::VariantComposer::add_print_area`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrintArea {
    pub name: String,
    pub shape: Shape,
    /// Defaults to the bounding-box centre.
    #[serde(default)]
    pub anchor: Option<Point>,
    pub allowed_print_types: BTreeSet<PrintTypeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColorVariant {
    pub id: ColorVariantId,
    pub color: ColorId,
    pub fabric: FabricId,
    pub canvas: CanvasImage,
    #[serde(default)]
    pub print_areas: Vec<PrintArea>,
}

impl ColorVariant {
    pub fn print_area(&self, id: PrintAreaId) -> Option<&PrintArea> {
        self.print_areas.iter().find(|a| a.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DraftConfiguration {
    pub id: DraftId,
    pub product: ProductId,
    /// Published version this draft was cloned from.
    pub base_version: Option<u64>,
    pub fabrics: BTreeSet<FabricId>,
    pub variants: Vec<ColorVariant>,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DraftConfiguration {
    pub fn variant(&self, id: ColorVariantId) -> Option<&ColorVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub(crate) fn variant_mut(&mut self, id: ColorVariantId) -> Option<&mut ColorVariant> {
        self.variants.iter_mut().find(|v| v.id == id)
    }

    pub fn print_area_count(&self) -> usize {
        self.variants.iter().map(|v| v.print_areas.len()).sum()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Catalog records a configuration can hold on to.
pub trait Referenceable: CatalogEntity {
    fn referenced_in(
        id: &Self::Id,
        product: &ProductId,
        fabrics: &BTreeSet<FabricId>,
        variants: &[ColorVariant],
    ) -> bool;
}

impl Referenceable for Fabric {
    fn referenced_in(
        id: &FabricId,
        _: &ProductId,
        fabrics: &BTreeSet<FabricId>,
        variants: &[ColorVariant],
    ) -> bool {
        fabrics.contains(id) || variants.iter().any(|v| &v.fabric == id)
    }
}

impl Referenceable for Color {
    fn referenced_in(
        id: &ColorId,
        _: &ProductId,
        _: &BTreeSet<FabricId>,
        variants: &[ColorVariant],
    ) -> bool {
        variants.iter().any(|v| &v.color == id)
    }
}

impl Referenceable for PrintType {
    fn referenced_in(
        id: &PrintTypeId,
        _: &ProductId,
        _: &BTreeSet<FabricId>,
        variants: &[ColorVariant],
    ) -> bool {
        variants
            .iter()
            .flat_map(|v| &v.print_areas)
            .any(|a| a.allowed_print_types.contains(id))
    }
}

impl Referenceable for Product {
    fn referenced_in(
        id: &ProductId,
        product: &ProductId,
        _: &BTreeSet<FabricId>,
        _: &[ColorVariant],
    ) -> bool {
        id == product
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> CanvasImage {
        CanvasImage {
            asset: "sha256:tee-red".into(),
            width_px: 1000,
            height_px: 1200,
            physical_width_in: 10.0,
            physical_height_in: 16.0,
        }
    }

    #[test]
    fn effective_dpi_is_the_coarser_axis() {
        let canvas = canvas();
        assert_eq!(canvas.pixels_per_inch_x(), 100.0);
        assert_eq!(canvas.pixels_per_inch_y(), 75.0);
        assert_eq!(canvas.effective_dpi(), 75.0);
        assert_eq!(canvas.bounds(), Rect::new(0.0, 0.0, 1000.0, 1200.0));
    }

    #[test]
    fn canvas_without_physical_size_rejected() {
        let mut canvas = canvas();
        canvas.physical_width_in = 0.0;
        assert!(canvas.check_well_formed().is_err());
    }
}
