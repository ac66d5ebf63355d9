//! Configuration Engine - the wired-up subsystem
//!
//! Admin surfaces edit through [`VariantComposer`] or a [`DraftSession`];
//! the storefront reads through [`ConfigurationEngine::latest_published`]
//! and [`ConfigurationEngine::subscribe`].

use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::catalog::{CatalogEntity, CatalogStore};
use crate::composer::VariantComposer;
use crate::config::EngineConfig;
use crate::draft::{
    CanvasImage, ColorVariant, DraftConfiguration, NewPrintArea, PrintArea, Referenceable,
};
use crate::error::{EngineError, EntityKind, Result};
use crate::geometry::PrintAreaGeometryEngine;
use crate::ids::{ColorId, ColorVariantId, DraftId, FabricId, PrintAreaId, ProductId};
use crate::publish::{PublishEvent, PublishPipeline, PublishedConfiguration, PublishedStore};
use crate::validation::ValidationReport;

pub struct ConfigurationEngine {
    config: EngineConfig,
    catalog: Arc<RwLock<CatalogStore>>,
    published: Arc<PublishedStore>,
    geometry: Arc<PrintAreaGeometryEngine>,
    composer: Arc<VariantComposer>,
    pipeline: PublishPipeline,
}

impl ConfigurationEngine {
    pub fn new(config: EngineConfig, catalog: CatalogStore) -> Self {
        let catalog = Arc::new(RwLock::new(catalog));
        let published = Arc::new(PublishedStore::new(config.event_capacity));
        let geometry = Arc::new(PrintAreaGeometryEngine::new(config.geometry.clone()));
        let composer = Arc::new(VariantComposer::new(
            Arc::clone(&catalog),
            Arc::clone(&published),
            Arc::clone(&geometry),
        ));
        let pipeline = PublishPipeline::new(
            Arc::clone(&catalog),
            Arc::clone(&composer),
            Arc::clone(&published),
            Arc::clone(&geometry),
        );
        Self { config, catalog, published, geometry, composer, pipeline }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the catalog. Hold the guard briefly; draft edits wait on it.
    pub fn catalog(&self) -> RwLockReadGuard<'_, CatalogStore> {
        self.catalog.read()
    }

    pub fn create<T: CatalogEntity>(&self, entity: T) -> Result<T> {
        self.catalog.write().create(entity).cloned()
    }

    /// Deprecates a catalog record.
    ///
    /// Fails with `Conflict` while any open draft selects it, or while the
    /// latest published configuration of any product references it.
    /// Products are only checked against open drafts.
    pub fn deprecate<T: Referenceable>(&self, id: &T::Id) -> Result<()> {
        self.composer.with_open_drafts(|drafts| {
            if let Some(draft) = drafts
                .iter()
                .find(|d| T::referenced_in(id, &d.product, &d.fabrics, &d.variants))
            {
                return Err(EngineError::conflict(format!(
                    "{} {} is selected in open draft {}",
                    T::KIND,
                    id,
                    draft.id
                )));
            }

            let mut catalog = self.catalog.write();
            if T::KIND != EntityKind::Product {
                let latest = self.published.all_latest();
                if let Some(config) = latest
                    .iter()
                    .find(|c| T::referenced_in(id, &c.product, &c.fabrics, &c.variants))
                {
                    return Err(EngineError::conflict(format!(
                        "{} {} is referenced by {} version {}",
                        T::KIND,
                        id,
                        config.product,
                        config.version
                    )));
                }
            }
            catalog.deprecate::<T>(id)
        })
    }

    pub fn composer(&self) -> &VariantComposer {
        &self.composer
    }

    pub fn geometry(&self) -> &PrintAreaGeometryEngine {
        &self.geometry
    }

    pub fn validate(&self, draft: DraftId) -> Result<ValidationReport> {
        self.pipeline.validate(draft)
    }

    pub fn publish(&self, draft: DraftId) -> Result<Arc<PublishedConfiguration>> {
        self.pipeline.publish(draft)
    }

    /// Storefront read path. Never blocked by an open draft.
    pub fn latest_published(&self, product: &ProductId) -> Result<Arc<PublishedConfiguration>> {
        self.published
            .latest(product)
            .ok_or_else(|| EngineError::not_found(EntityKind::PublishedConfiguration, product))
    }

    pub fn published(&self) -> &PublishedStore {
        &self.published
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishEvent> {
        self.published.subscribe()
    }

    /// Opens a draft whose lock is released when the session is dropped
    /// without publishing.
    pub fn open_session(&self, product: &ProductId) -> Result<DraftSession<'_>> {
        let draft = self.composer.start_draft(product)?;
        Ok(DraftSession { engine: self, draft: draft.id, finished: false })
    }
}

impl Default for ConfigurationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), CatalogStore::new())
    }
}

/// Scoped ownership of one product's draft.
pub struct DraftSession<'e> {
    engine: &'e ConfigurationEngine,
    draft: DraftId,
    finished: bool,
}

impl DraftSession<'_> {
    pub fn id(&self) -> DraftId {
        self.draft
    }

    pub fn snapshot(&self) -> Result<DraftConfiguration> {
        self.engine.composer.draft(self.draft)
    }

    pub fn select_fabric(&self, fabric: &FabricId) -> Result<()> {
        self.engine.composer.select_fabric(self.draft, fabric)
    }

    pub fn add_color_variant(&self, color: &ColorId, canvas: CanvasImage) -> Result<ColorVariant> {
        self.engine.composer.add_color_variant(self.draft, color, canvas)
    }

    pub fn add_print_area(&self, variant: ColorVariantId, spec: NewPrintArea) -> Result<PrintArea> {
        self.engine.composer.add_print_area(self.draft, variant, spec)
    }

    pub fn remove_print_area(
        &self,
        variant: ColorVariantId,
        area: PrintAreaId,
    ) -> Result<PrintArea> {
        self.engine.composer.remove_print_area(self.draft, variant, area)
    }

    pub fn validate(&self) -> Result<ValidationReport> {
        self.engine.validate(self.draft)
    }

    /// On rejection the session stays open so the violations can be fixed.
    pub fn publish(&mut self) -> Result<Arc<PublishedConfiguration>> {
        let published = self.engine.publish(self.draft)?;
        self.finished = true;
        Ok(published)
    }

    pub fn discard(mut self) -> Result<()> {
        self.finished = true;
        self.engine.composer.discard_draft(self.draft)
    }
}

impl Drop for DraftSession<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.engine.composer.discard_draft(self.draft) {
            warn!(draft = %self.draft, error = %err, "failed to release draft session");
        }
    }
}
