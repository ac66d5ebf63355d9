//! PrintForge Core - Print-Area & Variant Configuration Engine
//!
//! # Guarantees
//! 1. One open draft per product, never merged
//! 2. Published configurations are immutable and versioned
//! 3. Publish always validates, and validates everything
//! 4. A rejected publish changes nothing
//! 5. Catalog records are deprecated, never deleted

pub mod catalog;
pub mod compatibility;
pub mod composer;
pub mod config;
pub mod draft;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod hashing;
pub mod ids;
pub mod publish;
pub mod shape;
pub mod validation;

pub use catalog::{CatalogStore, Color, Fabric, ListFilter, PrintType, Product};
pub use compatibility::CompatibilityRuleEngine;
pub use composer::VariantComposer;
pub use config::{EngineConfig, GeometryPolicy};
pub use draft::{CanvasImage, ColorVariant, DraftConfiguration, NewPrintArea, PrintArea};
pub use engine::{ConfigurationEngine, DraftSession};
pub use error::{EngineError, EntityKind, Result};
pub use geometry::PrintAreaGeometryEngine;
pub use ids::{ColorId, ColorVariantId, DraftId, FabricId, PrintAreaId, PrintTypeId, ProductId};
pub use publish::{PublishEvent, PublishPipeline, PublishedConfiguration, PublishedStore};
pub use shape::{Point, Rect, Shape};
pub use validation::{Severity, ValidationReport, Violation, ViolationKind};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
