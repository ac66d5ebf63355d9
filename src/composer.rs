//! Variant Composer - Draft Ownership and Editing
//!
//! Owns the one open draft per product. Every admin edit flows through here.
//! A failed edit returns the error and leaves the draft as it was.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogStore, Color, Fabric, PrintType, Product};
use crate::compatibility::CompatibilityRuleEngine;
use crate::draft::{CanvasImage, ColorVariant, DraftConfiguration, NewPrintArea, PrintArea};
use crate::error::{EngineError, EntityKind, Result};
use crate::geometry::PrintAreaGeometryEngine;
use crate::ids::{ColorId, ColorVariantId, DraftId, FabricId, PrintAreaId, ProductId};
use crate::publish::{max_print_dpi, PublishedStore};
use crate::validation::{Severity, Violation, ViolationKind};

#[derive(Debug, Default)]
struct ComposerState {
    /// Single-writer lock: product -> its open draft.
    open: HashMap<ProductId, DraftId>,
    drafts: HashMap<DraftId, DraftConfiguration>,
    retired: HashSet<DraftId>,
}

impl ComposerState {
    fn check_live(&self, id: DraftId) -> Result<()> {
        if self.retired.contains(&id) {
            return Err(EngineError::conflict(format!("draft {} has been retired", id)));
        }
        Ok(())
    }

    fn draft(&self, id: DraftId) -> Result<&DraftConfiguration> {
        self.check_live(id)?;
        self.drafts
            .get(&id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Draft, id))
    }

    fn draft_mut(&mut self, id: DraftId) -> Result<&mut DraftConfiguration> {
        self.check_live(id)?;
        self.drafts
            .get_mut(&id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Draft, id))
    }

    /// Releases the product lock and burns the draft id.
    fn retire(&mut self, id: DraftId) -> Option<DraftConfiguration> {
        let draft = self.drafts.remove(&id)?;
        self.open.remove(&draft.product);
        self.retired.insert(id);
        Some(draft)
    }
}

pub struct VariantComposer {
    catalog: Arc<RwLock<CatalogStore>>,
    published: Arc<PublishedStore>,
    geometry: Arc<PrintAreaGeometryEngine>,
    state: Mutex<ComposerState>,
}

impl VariantComposer {
    pub fn new(
        catalog: Arc<RwLock<CatalogStore>>,
        published: Arc<PublishedStore>,
        geometry: Arc<PrintAreaGeometryEngine>,
    ) -> Self {
        Self {
            catalog,
            published,
            geometry,
            state: Mutex::new(ComposerState::default()),
        }
    }

    /// Opens the product's draft, cloned from its latest published version
    /// when there is one.
    ///
    /// Fails with `Conflict` while another draft for the product is open.
    pub fn start_draft(&self, product_id: &ProductId) -> Result<DraftConfiguration> {
        let mut state = self.state.lock();
        let catalog = self.catalog.read();

        let record = catalog.record::<Product>(product_id)?;
        if record.is_deprecated() {
            return Err(EngineError::conflict(format!("product {} is deprecated", product_id)));
        }
        if let Some(open) = state.open.get(product_id) {
            return Err(EngineError::conflict(format!(
                "product {} already has open draft {}",
                product_id, open
            )));
        }

        let now = Utc::now();
        let draft = match self.published.latest(product_id) {
            Some(latest) => DraftConfiguration {
                id: DraftId::generate(),
                product: product_id.clone(),
                base_version: Some(latest.version),
                fabrics: latest.fabrics.clone(),
                variants: latest.variants.clone(),
                opened_at: now,
                updated_at: now,
            },
            None => DraftConfiguration {
                id: DraftId::generate(),
                product: product_id.clone(),
                base_version: None,
                fabrics: record.entity.fabrics.clone(),
                variants: vec![],
                opened_at: now,
                updated_at: now,
            },
        };

        state.open.insert(product_id.clone(), draft.id);
        state.drafts.insert(draft.id, draft.clone());
        info!(
            product = %product_id,
            draft = %draft.id,
            base_version = ?draft.base_version,
            "draft started"
        );
        Ok(draft)
    }

    pub fn draft(&self, draft_id: DraftId) -> Result<DraftConfiguration> {
        self.state.lock().draft(draft_id).cloned()
    }

    pub fn open_draft(&self, product_id: &ProductId) -> Option<DraftId> {
        self.state.lock().open.get(product_id).copied()
    }

    /// Releases the product lock without publishing.
    pub fn discard_draft(&self, draft_id: DraftId) -> Result<()> {
        let mut state = self.state.lock();
        state.draft(draft_id)?;
        if let Some(draft) = state.retire(draft_id) {
            info!(product = %draft.product, draft = %draft_id, "draft discarded");
        }
        Ok(())
    }

    pub fn select_fabric(&self, draft_id: DraftId, fabric_id: &FabricId) -> Result<()> {
        let mut state = self.state.lock();
        let catalog = self.catalog.read();
        let draft = state.draft_mut(draft_id)?;

        if catalog.record::<Fabric>(fabric_id)?.is_deprecated() {
            return Err(EngineError::conflict(format!("fabric {} is deprecated", fabric_id)));
        }
        if draft.fabrics.insert(fabric_id.clone()) {
            draft.touch();
            debug!(draft = %draft_id, fabric = %fabric_id, "fabric selected");
        }
        Ok(())
    }

    pub fn deselect_fabric(&self, draft_id: DraftId, fabric_id: &FabricId) -> Result<()> {
        let mut state = self.state.lock();
        let draft = state.draft_mut(draft_id)?;

        if let Some(variant) = draft.variants.iter().find(|v| &v.fabric == fabric_id) {
            return Err(EngineError::conflict(format!(
                "fabric {} is used by color variant {}",
                fabric_id, variant.id
            )));
        }
        if draft.fabrics.remove(fabric_id) {
            draft.touch();
            debug!(draft = %draft_id, fabric = %fabric_id, "fabric deselected");
        }
        Ok(())
    }

    /// Adds a variant on the first assigned fabric (by id) that offers the color.
    pub fn add_color_variant(
        &self,
        draft_id: DraftId,
        color_id: &ColorId,
        canvas: CanvasImage,
    ) -> Result<ColorVariant> {
        self.insert_variant(draft_id, color_id, None, canvas)
    }

    pub fn add_color_variant_on_fabric(
        &self,
        draft_id: DraftId,
        color_id: &ColorId,
        fabric_id: &FabricId,
        canvas: CanvasImage,
    ) -> Result<ColorVariant> {
        self.insert_variant(draft_id, color_id, Some(fabric_id), canvas)
    }

    fn insert_variant(
        &self,
        draft_id: DraftId,
        color_id: &ColorId,
        fabric_id: Option<&FabricId>,
        canvas: CanvasImage,
    ) -> Result<ColorVariant> {
        let mut state = self.state.lock();
        let catalog = self.catalog.read();
        let draft = state.draft_mut(draft_id)?;

        canvas.check_well_formed().map_err(|reason| EngineError::InvalidGeometry {
            subject: format!("canvas {}", canvas.asset),
            reason,
        })?;
        if catalog.record::<Color>(color_id)?.is_deprecated() {
            return Err(EngineError::InvalidColor {
                color: color_id.clone(),
                reason: "color is deprecated".to_string(),
            });
        }

        let rules = CompatibilityRuleEngine::new(&catalog);
        let fabric = match fabric_id {
            Some(fabric) => {
                if !draft.fabrics.contains(fabric) {
                    return Err(EngineError::conflict(format!(
                        "fabric {} is not assigned to draft {}",
                        fabric, draft_id
                    )));
                }
                if !rules.color_on_fabric(fabric, color_id) {
                    return Err(EngineError::InvalidColor {
                        color: color_id.clone(),
                        reason: format!("not offered on fabric {}", fabric),
                    });
                }
                fabric.clone()
            }
            None => draft
                .fabrics
                .iter()
                .filter(|f| !catalog.is_deprecated::<Fabric>(f))
                .find(|f| rules.color_on_fabric(f, color_id))
                .cloned()
                .ok_or_else(|| EngineError::InvalidColor {
                    color: color_id.clone(),
                    reason: format!(
                        "not offered on any assigned fabric ({})",
                        draft.fabrics.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                    ),
                })?,
        };

        if draft.variants.iter().any(|v| &v.color == color_id && v.fabric == fabric) {
            return Err(EngineError::conflict(format!(
                "draft {} already has a {} variant on {}",
                draft_id, color_id, fabric
            )));
        }

        let variant = ColorVariant {
            id: ColorVariantId::generate(),
            color: color_id.clone(),
            fabric,
            canvas,
            print_areas: vec![],
        };
        draft.variants.push(variant.clone());
        draft.touch();
        debug!(
            draft = %draft_id,
            variant = %variant.id,
            color = %color_id,
            fabric = %variant.fabric,
            "color variant added"
        );
        Ok(variant)
    }

    pub fn remove_color_variant(
        &self,
        draft_id: DraftId,
        variant_id: ColorVariantId,
    ) -> Result<ColorVariant> {
        let mut state = self.state.lock();
        let draft = state.draft_mut(draft_id)?;
        let index = draft
            .variants
            .iter()
            .position(|v| v.id == variant_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::ColorVariant, variant_id))?;

        let removed = draft.variants.remove(index);
        draft.touch();
        debug!(draft = %draft_id, variant = %variant_id, "color variant removed");
        Ok(removed)
    }

    /// Places a print area on a variant.
    ///
    /// Malformed shapes and unknown print types are rejected outright.
    /// Placement and compatibility findings are attached to the new area as
    /// warnings, or rejected when the policy asks for strict placement.
    pub fn add_print_area(
        &self,
        draft_id: DraftId,
        variant_id: ColorVariantId,
        spec: NewPrintArea,
    ) -> Result<PrintArea> {
        let mut state = self.state.lock();
        let catalog = self.catalog.read();
        let draft = state.draft_mut(draft_id)?;

        spec.shape.check_well_formed().map_err(|reason| EngineError::InvalidGeometry {
            subject: format!("print area '{}'", spec.name),
            reason,
        })?;
        for print_type in &spec.allowed_print_types {
            if catalog.record::<PrintType>(print_type)?.is_deprecated() {
                return Err(EngineError::conflict(format!(
                    "print type {} is deprecated",
                    print_type
                )));
            }
        }

        let variant = draft
            .variant_mut(variant_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::ColorVariant, variant_id))?;

        let anchor = spec.anchor.unwrap_or_else(|| spec.shape.bounding_box().center());
        let mut area = PrintArea {
            id: PrintAreaId::generate(),
            name: spec.name,
            anchor,
            max_print_dpi: max_print_dpi(&spec.allowed_print_types, &catalog),
            shape: spec.shape,
            allowed_print_types: spec.allowed_print_types,
            warnings: vec![],
        };

        let mut findings = self.geometry.validate_placement(&area, variant, &catalog);
        findings.extend(CompatibilityRuleEngine::new(&catalog).check_print_area(&area, variant));

        if self.geometry.policy().strict_placement {
            if let Some(blocking) = findings.iter().find(|v| v.severity == Severity::Error) {
                return Err(violation_error(blocking, &area));
            }
        }
        if !findings.is_empty() {
            warn!(
                draft = %draft_id,
                print_area = %area.id,
                findings = findings.len(),
                "print area placed with warnings"
            );
        }
        area.warnings = findings.into_iter().map(Violation::into_warning).collect();

        variant.print_areas.push(area.clone());
        draft.touch();
        debug!(draft = %draft_id, variant = %variant_id, print_area = %area.id, "print area added");
        Ok(area)
    }

    pub fn remove_print_area(
        &self,
        draft_id: DraftId,
        variant_id: ColorVariantId,
        area_id: PrintAreaId,
    ) -> Result<PrintArea> {
        let mut state = self.state.lock();
        let draft = state.draft_mut(draft_id)?;
        let variant = draft
            .variant_mut(variant_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::ColorVariant, variant_id))?;
        let index = variant
            .print_areas
            .iter()
            .position(|a| a.id == area_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::PrintArea, area_id))?;

        let removed = variant.print_areas.remove(index);
        draft.touch();
        debug!(draft = %draft_id, print_area = %area_id, "print area removed");
        Ok(removed)
    }

    /// Runs `f` against every open draft while edits are held off.
    pub(crate) fn with_open_drafts<R>(&self, f: impl FnOnce(&[&DraftConfiguration]) -> R) -> R {
        let state = self.state.lock();
        let drafts: Vec<_> = state.drafts.values().collect();
        f(&drafts)
    }

    pub(crate) fn inspect<R>(
        &self,
        draft_id: DraftId,
        f: impl FnOnce(&DraftConfiguration) -> R,
    ) -> Result<R> {
        let state = self.state.lock();
        Ok(f(state.draft(draft_id)?))
    }

    /// Runs `f` with the draft held; retires the draft only if `f` succeeds.
    pub(crate) fn retire_with<R>(
        &self,
        draft_id: DraftId,
        f: impl FnOnce(&DraftConfiguration) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.lock();
        let result = f(state.draft(draft_id)?)?;
        state.retire(draft_id);
        Ok(result)
    }
}

fn violation_error(violation: &Violation, area: &PrintArea) -> EngineError {
    match (violation.kind, &violation.print_type) {
        (ViolationKind::Compatibility, Some(print_type)) => EngineError::CompatibilityViolation {
            print_area: area.id,
            print_type: print_type.clone(),
            reasons: vec![violation.message.clone()],
        },
        (ViolationKind::Resolution | ViolationKind::ExceedsMaxPrintSize, Some(print_type)) => {
            EngineError::ResolutionViolation {
                print_area: area.id,
                print_type: print_type.clone(),
                reason: violation.message.clone(),
            }
        }
        _ => EngineError::InvalidGeometry {
            subject: format!("print area '{}'", area.name),
            reason: violation.message.clone(),
        },
    }
}
