//! Publish Pipeline - Single Entry Point
//!
//! CRITICAL: publish MUST run the full validation pass. No bypass.
//! A rejected draft is left exactly as it was; an accepted one is frozen
//! into a new version and retired.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogStore, PrintType};
use crate::compatibility::CompatibilityRuleEngine;
use crate::composer::VariantComposer;
use crate::draft::{ColorVariant, DraftConfiguration, PrintArea};
use crate::error::{EngineError, EntityKind, Result};
use crate::geometry::PrintAreaGeometryEngine;
use crate::hashing::compute_content_hash;
use crate::ids::{DraftId, FabricId, PrintAreaId, PrintTypeId, ProductId};
use crate::validation::{ValidationReport, Violation, ViolationKind};
use crate::ENGINE_VERSION;

/// Frozen, storefront-visible configuration of one product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishedConfiguration {
    pub product: ProductId,
    pub version: u64,
    /// Draft this version was promoted from.
    pub draft: DraftId,
    pub fabrics: BTreeSet<FabricId>,
    pub variants: Vec<ColorVariant>,
    pub content_hash: String,
    pub engine_version: String,
    pub published_at: DateTime<Utc>,
}

impl PublishedConfiguration {
    pub fn print_areas(&self) -> impl Iterator<Item = (&ColorVariant, &PrintArea)> {
        self.variants
            .iter()
            .flat_map(|v| v.print_areas.iter().map(move |a| (v, a)))
    }
}

/// Sent to subscribers after a version is committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishEvent {
    pub product: ProductId,
    pub version: u64,
}

/// Version history per product. Readers clone an `Arc` under a short read
/// lock and never wait on drafts or validation.
pub struct PublishedStore {
    history: RwLock<HashMap<ProductId, Vec<Arc<PublishedConfiguration>>>>,
    events: broadcast::Sender<PublishEvent>,
}

impl PublishedStore {
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self { history: RwLock::new(HashMap::new()), events }
    }

    pub fn latest(&self, product: &ProductId) -> Option<Arc<PublishedConfiguration>> {
        self.history.read().get(product).and_then(|h| h.last().cloned())
    }

    pub fn version(
        &self,
        product: &ProductId,
        version: u64,
    ) -> Result<Arc<PublishedConfiguration>> {
        self.history
            .read()
            .get(product)
            .and_then(|h| h.iter().find(|c| c.version == version).cloned())
            .ok_or_else(|| {
                EngineError::not_found(
                    EntityKind::PublishedConfiguration,
                    format!("{}@{}", product, version),
                )
            })
    }

    /// Every version of the product, oldest first.
    pub fn history(&self, product: &ProductId) -> Vec<Arc<PublishedConfiguration>> {
        self.history.read().get(product).cloned().unwrap_or_default()
    }

    /// Latest version of every product.
    pub fn all_latest(&self) -> Vec<Arc<PublishedConfiguration>> {
        self.history
            .read()
            .values()
            .filter_map(|h| h.last().cloned())
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishEvent> {
        self.events.subscribe()
    }

    /// Assigns the next version number and makes the result visible in one
    /// step. Nothing is visible if `build` fails.
    fn commit(
        &self,
        product: &ProductId,
        build: impl FnOnce(u64) -> Result<PublishedConfiguration>,
    ) -> Result<Arc<PublishedConfiguration>> {
        let published = {
            let mut history = self.history.write();
            let versions = history.entry(product.clone()).or_default();
            let next = versions.last().map_or(1, |c| c.version + 1);
            let published = Arc::new(build(next)?);
            versions.push(Arc::clone(&published));
            published
        };

        let event = PublishEvent { product: product.clone(), version: published.version };
        if self.events.send(event).is_err() {
            debug!(product = %product, "no publish subscribers");
        }
        Ok(published)
    }
}

impl Default for PublishedStore {
    fn default() -> Self {
        Self::new(128)
    }
}

/// The publish pipeline - runs completeness, compatibility and geometry over
/// a whole draft and promotes it on success.
pub struct PublishPipeline {
    catalog: Arc<RwLock<CatalogStore>>,
    composer: Arc<VariantComposer>,
    published: Arc<PublishedStore>,
    geometry: Arc<PrintAreaGeometryEngine>,
}

impl PublishPipeline {
    pub fn new(
        catalog: Arc<RwLock<CatalogStore>>,
        composer: Arc<VariantComposer>,
        published: Arc<PublishedStore>,
        geometry: Arc<PrintAreaGeometryEngine>,
    ) -> Self {
        Self { catalog, composer, published, geometry }
    }

    /// Full validation pass without publishing.
    pub fn validate(&self, draft: DraftId) -> Result<ValidationReport> {
        self.composer.inspect(draft, |draft| {
            let catalog = self.catalog.read();
            validate_draft(draft, &catalog, &self.geometry)
        })
    }

    /// Validates and promotes the draft.
    ///
    /// On any error-level violation returns [`EngineError::Validation`] with
    /// every finding, and the draft stays open and unchanged.
    pub fn publish(&self, draft: DraftId) -> Result<Arc<PublishedConfiguration>> {
        self.composer.retire_with(draft, |draft| {
            let catalog = self.catalog.read();

            // MANDATORY: validation always runs before commit.
            let report = validate_draft(draft, &catalog, &self.geometry);
            if !report.valid {
                warn!(
                    product = %draft.product,
                    draft = %draft.id,
                    violations = report.len(),
                    "publish rejected"
                );
                return Err(EngineError::Validation(report));
            }

            let variants = freeze_variants(&draft.variants, &catalog);
            let content_hash = compute_content_hash(&draft.product, &draft.fabrics, &variants)?;
            let published = self.published.commit(&draft.product, |version| {
                Ok(PublishedConfiguration {
                    product: draft.product.clone(),
                    version,
                    draft: draft.id,
                    fabrics: draft.fabrics.clone(),
                    variants,
                    content_hash,
                    engine_version: ENGINE_VERSION.to_string(),
                    published_at: Utc::now(),
                })
            })?;

            info!(
                product = %published.product,
                version = published.version,
                hash = %published.content_hash,
                "configuration published"
            );
            Ok(published)
        })
    }
}

/// Runs every check over the draft and collects all findings. No check
/// stops another from running.
pub fn validate_draft(
    draft: &DraftConfiguration,
    catalog: &CatalogStore,
    geometry: &PrintAreaGeometryEngine,
) -> ValidationReport {
    let mut violations = check_completeness(draft);
    violations.extend(check_compatibility(draft, catalog));
    violations.extend(check_geometry(draft, catalog, geometry));
    ValidationReport::new(draft.product.clone(), draft.id, violations)
}

fn check_completeness(draft: &DraftConfiguration) -> Vec<Violation> {
    let mut violations = vec![];
    if draft.variants.is_empty() {
        violations.push(
            Violation::error(
                "completeness",
                ViolationKind::Incomplete,
                "Draft has no color variants",
            )
                .remediation("Add at least one color variant"),
        );
    }

    for variant in &draft.variants {
        if variant.print_areas.is_empty() {
            violations.push(
                Violation::error(
                    "completeness",
                    ViolationKind::Incomplete,
                    format!("Color variant {} has no print areas", variant.color),
                )
                .on_variant(variant.id)
                .remediation("Define at least one print area"),
            );
        }
        for area in &variant.print_areas {
            if area.allowed_print_types.is_empty() {
                violations.push(
                    Violation::error(
                        "completeness",
                        ViolationKind::Incomplete,
                        format!("Print area '{}' allows no print types", area.name),
                    )
                    .on_variant(variant.id)
                    .on_area(area.id)
                    .remediation("Allow at least one print type"),
                );
            }
        }
    }
    violations
}

fn check_compatibility(draft: &DraftConfiguration, catalog: &CatalogStore) -> Vec<Violation> {
    let rules = CompatibilityRuleEngine::new(catalog);
    draft
        .variants
        .iter()
        .flat_map(|v| v.print_areas.iter().map(move |a| (v, a)))
        .flat_map(|(variant, area)| rules.check_print_area(area, variant))
        .collect()
}

/// Placement checks per area; each overlapping pair is reported once.
fn check_geometry(
    draft: &DraftConfiguration,
    catalog: &CatalogStore,
    geometry: &PrintAreaGeometryEngine,
) -> Vec<Violation> {
    let mut seen_pairs: HashSet<Vec<PrintAreaId>> = HashSet::new();
    let mut violations = vec![];

    for variant in &draft.variants {
        for area in &variant.print_areas {
            for violation in geometry.validate_placement(area, variant, catalog) {
                if violation.kind == ViolationKind::Overlap
                    && !seen_pairs.insert(violation.print_areas.clone())
                {
                    continue;
                }
                violations.push(violation);
            }
        }
    }
    violations
}

/// Published copies drop draft-time warnings and carry a fresh DPI ceiling.
fn freeze_variants(variants: &[ColorVariant], catalog: &CatalogStore) -> Vec<ColorVariant> {
    variants
        .iter()
        .map(|variant| {
            let mut variant = variant.clone();
            for area in &mut variant.print_areas {
                area.warnings.clear();
                area.max_print_dpi = max_print_dpi(&area.allowed_print_types, catalog);
            }
            variant
        })
        .collect()
}

/// Smallest `max_dpi` among the known print types.
pub(crate) fn max_print_dpi<'a>(
    print_types: impl IntoIterator<Item = &'a PrintTypeId>,
    catalog: &CatalogStore,
) -> Option<u32> {
    print_types
        .into_iter()
        .filter_map(|id| catalog.get::<PrintType>(id).ok())
        .map(|pt| pt.max_dpi)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(product: &ProductId, version: u64) -> PublishedConfiguration {
        PublishedConfiguration {
            product: product.clone(),
            version,
            draft: DraftId::generate(),
            fabrics: BTreeSet::new(),
            variants: vec![],
            content_hash: String::new(),
            engine_version: ENGINE_VERSION.to_string(),
            published_at: Utc::now(),
        }
    }

    #[test]
    fn commit_numbers_versions_per_product() {
        let store = PublishedStore::default();
        let tee = ProductId::new("tee");
        let hoodie = ProductId::new("hoodie");

        store.commit(&tee, |v| Ok(config(&tee, v))).unwrap();
        store.commit(&tee, |v| Ok(config(&tee, v))).unwrap();
        store.commit(&hoodie, |v| Ok(config(&hoodie, v))).unwrap();

        assert_eq!(store.latest(&tee).unwrap().version, 2);
        assert_eq!(store.latest(&hoodie).unwrap().version, 1);
        assert_eq!(store.all_latest().len(), 2);
    }

    #[test]
    fn failed_build_commits_nothing() {
        let store = PublishedStore::default();
        let tee = ProductId::new("tee");
        let mut events = store.subscribe();

        let result = store.commit(&tee, |_| Err(EngineError::conflict("cancelled")));
        assert!(result.is_err());
        assert!(store.latest(&tee).is_none());
        assert!(events.try_recv().is_err());
        assert!(matches!(store.version(&tee, 1), Err(EngineError::NotFound { .. })));
    }
}
