//! Catalog Store - Fabrics, Print Types, Colors, Products
//!
//! Pure data access. Records are created once and only ever deprecated;
//! cross-entity rules belong to the compatibility engine.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{EngineError, EntityKind, Result};
use crate::ids::{ColorId, FabricId, PrintTypeId, ProductId};
use crate::ENGINE_VERSION;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fabric {
    pub id: FabricId,
    pub name: String,
    #[serde(default)]
    pub print_types: BTreeSet<PrintTypeId>,
    #[serde(default)]
    pub colors: BTreeSet<ColorId>,
}

/// A printing technique and its production limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrintType {
    pub id: PrintTypeId,
    pub name: String,
    pub min_dpi: u32,
    pub max_dpi: u32,
    pub max_print_width_in: f64,
    pub max_print_height_in: f64,
    #[serde(default)]
    pub fabrics: BTreeSet<FabricId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Color {
    pub id: ColorId,
    pub name: String,
    /// Swatch asset reference or hex code.
    pub swatch: String,
    #[serde(default)]
    pub fabrics: BTreeSet<FabricId>,
}

/// Base product. Its variants and print areas live in draft and
/// published configurations, never in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    /// Fabrics a new draft starts with.
    #[serde(default)]
    pub fabrics: BTreeSet<FabricId>,
}

/// Stored form of a catalog entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record<T> {
    #[serde(flatten)]
    pub entity: T,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deprecated_at: Option<DateTime<Utc>>,
}

impl<T> Record<T> {
    pub fn is_deprecated(&self) -> bool {
        self.deprecated_at.is_some()
    }
}

/// Backing tables, one per entity kind.
#[derive(Debug, Clone, Default)]
pub struct CatalogTables {
    fabrics: BTreeMap<FabricId, Record<Fabric>>,
    print_types: BTreeMap<PrintTypeId, Record<PrintType>>,
    colors: BTreeMap<ColorId, Record<Color>>,
    products: BTreeMap<ProductId, Record<Product>>,
}

/// Implemented by every record kind the store holds.
pub trait CatalogEntity: Clone + Serialize + DeserializeOwned {
    type Id: Ord + Clone + fmt::Display;
    const KIND: EntityKind;

    fn id(&self) -> &Self::Id;
    fn name(&self) -> &str;
    fn table(tables: &CatalogTables) -> &BTreeMap<Self::Id, Record<Self>>;
    fn table_mut(tables: &mut CatalogTables) -> &mut BTreeMap<Self::Id, Record<Self>>;
}

macro_rules! impl_catalog_entity {
    ($entity:ty, $id:ty, $kind:expr, $table:ident) => {
        impl CatalogEntity for $entity {
            type Id = $id;
            const KIND: EntityKind = $kind;

            fn id(&self) -> &Self::Id {
                &self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn table(tables: &CatalogTables) -> &BTreeMap<Self::Id, Record<Self>> {
                &tables.$table
            }

            fn table_mut(tables: &mut CatalogTables) -> &mut BTreeMap<Self::Id, Record<Self>> {
                &mut tables.$table
            }
        }
    };
}

impl_catalog_entity!(Fabric, FabricId, EntityKind::Fabric, fabrics);
impl_catalog_entity!(PrintType, PrintTypeId, EntityKind::PrintType, print_types);
impl_catalog_entity!(Color, ColorId, EntityKind::Color, colors);
impl_catalog_entity!(Product, ProductId, EntityKind::Product, products);

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub include_deprecated: bool,
    /// Case-insensitive substring match on the display name.
    pub name_contains: Option<String>,
}

impl ListFilter {
    pub fn all() -> Self {
        Self { include_deprecated: true, name_contains: None }
    }

    pub fn selectable() -> Self {
        Self::default()
    }

    fn matches<T: CatalogEntity>(&self, record: &Record<T>) -> bool {
        if record.is_deprecated() && !self.include_deprecated {
            return false;
        }
        match &self.name_contains {
            Some(needle) => record
                .entity
                .name()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Deprecated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub action: AuditAction,
    pub kind: EntityKind,
    pub id: String,
}

/// Serialized form of the whole catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    #[serde(default = "current_engine_version")]
    pub engine_version: String,
    #[serde(default)]
    pub fabrics: Vec<Record<Fabric>>,
    #[serde(default)]
    pub print_types: Vec<Record<PrintType>>,
    #[serde(default)]
    pub colors: Vec<Record<Color>>,
    #[serde(default)]
    pub products: Vec<Record<Product>>,
    #[serde(default)]
    pub audit: Vec<AuditEntry>,
}

fn current_engine_version() -> String {
    ENGINE_VERSION.to_string()
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self {
            engine_version: current_engine_version(),
            fabrics: vec![],
            print_types: vec![],
            colors: vec![],
            products: vec![],
            audit: vec![],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    tables: CatalogTables,
    audit: Vec<AuditEntry>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: CatalogEntity>(&self, id: &T::Id) -> Result<&T> {
        self.record::<T>(id).map(|r| &r.entity)
    }

    pub fn record<T: CatalogEntity>(&self, id: &T::Id) -> Result<&Record<T>> {
        T::table(&self.tables)
            .get(id)
            .ok_or_else(|| EngineError::not_found(T::KIND, id))
    }

    pub fn contains<T: CatalogEntity>(&self, id: &T::Id) -> bool {
        T::table(&self.tables).contains_key(id)
    }

    pub fn is_deprecated<T: CatalogEntity>(&self, id: &T::Id) -> bool {
        T::table(&self.tables)
            .get(id)
            .map_or(false, Record::is_deprecated)
    }

    /// Entities ordered by identifier.
    pub fn list<T: CatalogEntity>(&self, filter: &ListFilter) -> Vec<&T> {
        T::table(&self.tables)
            .values()
            .filter(|r| filter.matches(*r))
            .map(|r| &r.entity)
            .collect()
    }

    pub fn create<T: CatalogEntity>(&mut self, entity: T) -> Result<&T> {
        let id = entity.id().clone();
        let table = T::table_mut(&mut self.tables);
        if table.contains_key(&id) {
            return Err(EngineError::conflict(format!("{} {} already exists", T::KIND, id)));
        }

        let now = Utc::now();
        table.insert(
            id.clone(),
            Record { entity, created_at: now, deprecated_at: None },
        );
        self.audit.push(AuditEntry {
            at: now,
            action: AuditAction::Created,
            kind: T::KIND,
            id: id.to_string(),
        });
        info!(kind = %T::KIND, id = %id, "catalog entity created");

        self.get::<T>(&id)
    }

    /// Hides the entity from new selection. Idempotent.
    ///
    /// Reference checks against drafts and published configurations are the
    /// caller's job; see [`crate::engine::ConfigurationEngine::deprecate`].
    pub fn deprecate<T: CatalogEntity>(&mut self, id: &T::Id) -> Result<()> {
        let record = T::table_mut(&mut self.tables)
            .get_mut(id)
            .ok_or_else(|| EngineError::not_found(T::KIND, id))?;
        if record.is_deprecated() {
            return Ok(());
        }

        let now = Utc::now();
        record.deprecated_at = Some(now);
        self.audit.push(AuditEntry {
            at: now,
            action: AuditAction::Deprecated,
            kind: T::KIND,
            id: id.to_string(),
        });
        info!(kind = %T::KIND, id = %id, "catalog entity deprecated");
        Ok(())
    }

    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            engine_version: current_engine_version(),
            fabrics: self.tables.fabrics.values().cloned().collect(),
            print_types: self.tables.print_types.values().cloned().collect(),
            colors: self.tables.colors.values().cloned().collect(),
            products: self.tables.products.values().cloned().collect(),
            audit: self.audit.clone(),
        }
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Result<Self> {
        check_snapshot_version(&snapshot.engine_version)?;

        let mut tables = CatalogTables::default();
        load_table(&mut tables, snapshot.fabrics);
        load_table(&mut tables, snapshot.print_types);
        load_table(&mut tables, snapshot.colors);
        load_table(&mut tables, snapshot.products);

        Ok(Self { tables, audit: snapshot.audit })
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_snapshot(serde_json::from_str(&content)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn load_table<T: CatalogEntity>(tables: &mut CatalogTables, records: Vec<Record<T>>) {
    let table = T::table_mut(tables);
    for record in records {
        table.insert(record.entity.id().clone(), record);
    }
}

/// Snapshots from a newer major engine version may carry fields this build
/// would silently drop.
fn check_snapshot_version(found: &str) -> Result<()> {
    let incompatible = || EngineError::IncompatibleSnapshot {
        found: found.to_string(),
        supported: ENGINE_VERSION.to_string(),
    };
    let snapshot = semver::Version::parse(found).map_err(|_| incompatible())?;
    let engine = semver::Version::parse(ENGINE_VERSION).map_err(|_| incompatible())?;
    if snapshot.major > engine.major {
        return Err(incompatible());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cotton() -> Fabric {
        Fabric {
            id: FabricId::new("cotton"),
            name: "Cotton".to_string(),
            print_types: BTreeSet::from([PrintTypeId::new("dtg")]),
            colors: BTreeSet::from([ColorId::new("red")]),
        }
    }

    #[test]
    fn create_then_get() {
        let mut store = CatalogStore::new();
        store.create(cotton()).unwrap();

        let fabric = store.get::<Fabric>(&FabricId::new("cotton")).unwrap();
        assert_eq!(fabric.name, "Cotton");
        assert_eq!(store.audit_log().len(), 1);
        assert_eq!(store.audit_log()[0].action, AuditAction::Created);
    }

    #[test]
    fn duplicate_create_conflicts() {
        let mut store = CatalogStore::new();
        store.create(cotton()).unwrap();
        let err = store.create(cotton()).unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[test]
    fn unknown_entity_not_found() {
        let store = CatalogStore::new();
        let err = store.get::<Color>(&ColorId::new("teal")).unwrap_err();
        assert!(err.to_string().contains("Color not found: teal"));
    }

    #[test]
    fn deprecated_hidden_from_selectable_list() {
        let mut store = CatalogStore::new();
        store.create(cotton()).unwrap();
        store
            .create(Fabric {
                id: FabricId::new("linen"),
                name: "Linen".to_string(),
                print_types: BTreeSet::new(),
                colors: BTreeSet::new(),
            })
            .unwrap();

        store.deprecate::<Fabric>(&FabricId::new("cotton")).unwrap();
        store.deprecate::<Fabric>(&FabricId::new("cotton")).unwrap();

        let selectable = store.list::<Fabric>(&ListFilter::selectable());
        assert_eq!(selectable.len(), 1);
        assert_eq!(selectable[0].id.as_str(), "linen");
        assert_eq!(store.list::<Fabric>(&ListFilter::all()).len(), 2);
        // second deprecate is a no-op
        assert_eq!(store.audit_log().len(), 3);
    }

    #[test]
    fn name_filter_is_case_insensitive() {
        let mut store = CatalogStore::new();
        store.create(cotton()).unwrap();
        let filter = ListFilter { include_deprecated: false, name_contains: Some("COT".into()) };
        assert_eq!(store.list::<Fabric>(&filter).len(), 1);
    }

    #[test]
    fn snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let mut store = CatalogStore::new();
        store.create(cotton()).unwrap();
        store.deprecate::<Fabric>(&FabricId::new("cotton")).unwrap();
        store.save_to_file(&path).unwrap();

        let loaded = CatalogStore::load_from_file(&path).unwrap();
        assert!(loaded.is_deprecated::<Fabric>(&FabricId::new("cotton")));
        assert_eq!(loaded.audit_log().len(), 2);
    }

    #[test]
    fn newer_major_snapshot_rejected() {
        let snapshot = CatalogSnapshot {
            engine_version: "99.0.0".to_string(),
            ..Default::default()
        };
        let err = CatalogStore::from_snapshot(snapshot).unwrap_err();
        assert!(matches!(err, EngineError::IncompatibleSnapshot { .. }));
    }
}
