//! PrintForge CLI - Bridge interface for the admin backend
//!
//! Commands: catalog, check, publish
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when any draft fails validation

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use printforge_core::{
    catalog::CatalogSnapshot, CanvasImage, CatalogStore, Color, ColorId, ConfigurationEngine,
    DraftId, EngineConfig, EngineError, Fabric, FabricId, ListFilter, NewPrintArea, PrintType,
    Product, ProductId, VariantComposer,
};

#[derive(Parser)]
#[command(name = "printforge-cli")]
#[command(about = "PrintForge CLI - print-area and variant configuration engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace file: catalog plus draft documents
    #[arg(short, long)]
    workspace: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog entities
    Catalog {
        /// Include deprecated entities
        #[arg(long)]
        all: bool,
    },

    /// Validate every draft document without publishing
    Check,

    /// Validate and publish every draft document
    Publish,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Workspace {
    catalog: CatalogSnapshot,
    #[serde(default)]
    drafts: Vec<DraftDocument>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftDocument {
    product: ProductId,
    #[serde(default)]
    fabrics: BTreeSet<FabricId>,
    #[serde(default)]
    variants: Vec<VariantDocument>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantDocument {
    color: ColorId,
    #[serde(default)]
    fabric: Option<FabricId>,
    canvas: CanvasImage,
    #[serde(default)]
    print_areas: Vec<NewPrintArea>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (engine, drafts) = match load(&cli.workspace, cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            emit(&json!({ "success": false, "error": e.to_string() }));
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Catalog { all } => {
            let filter = if all { ListFilter::all() } else { ListFilter::selectable() };
            let catalog = engine.catalog();
            emit(&json!({
                "fabrics": catalog.list::<Fabric>(&filter),
                "printTypes": catalog.list::<PrintType>(&filter),
                "colors": catalog.list::<Color>(&filter),
                "products": catalog.list::<Product>(&filter),
            }));
            ExitCode::SUCCESS
        }

        Commands::Check => {
            let results: Vec<_> = drafts.iter().map(|d| check_document(&engine, d)).collect();
            let valid = results.iter().all(|(ok, _)| *ok);
            let reports: Vec<_> = results.into_iter().map(|(_, value)| value).collect();
            emit(&json!({ "valid": valid, "reports": reports }));
            exit_code(valid)
        }

        Commands::Publish => {
            let results: Vec<_> = drafts.iter().map(|d| publish_document(&engine, d)).collect();
            let success = results.iter().all(|(ok, _)| *ok);
            let results: Vec<_> = results.into_iter().map(|(_, value)| value).collect();
            emit(&json!({ "success": success, "results": results }));
            exit_code(success)
        }
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

/// Replays and validates one document. The draft stays open afterwards.
fn check_document(engine: &ConfigurationEngine, document: &DraftDocument) -> (bool, Value) {
    match replay(engine, document).and_then(|draft| engine.validate(draft)) {
        Ok(report) => (report.valid, json!(report)),
        Err(e) => (false, json!({ "product": document.product, "error": e.to_string() })),
    }
}

fn publish_document(engine: &ConfigurationEngine, document: &DraftDocument) -> (bool, Value) {
    match replay(engine, document).and_then(|draft| engine.publish(draft)) {
        Ok(published) => (true, json!({ "success": true, "published": published.as_ref() })),
        Err(EngineError::Validation(report)) => {
            (false, json!({ "success": false, "report": report }))
        }
        Err(e) => (
            false,
            json!({
                "success": false,
                "product": document.product,
                "error": e.to_string(),
            }),
        ),
    }
}

fn load(
    workspace: &Path,
    config: Option<&Path>,
) -> Result<(ConfigurationEngine, Vec<DraftDocument>), EngineError> {
    let config = match config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };
    let workspace: Workspace = serde_json::from_str(&fs::read_to_string(workspace)?)?;
    let catalog = CatalogStore::from_snapshot(workspace.catalog)?;
    Ok((ConfigurationEngine::new(config, catalog), workspace.drafts))
}

/// Rebuilds a draft from its document through the regular edit operations.
/// A document that fails to replay releases its draft.
fn replay(engine: &ConfigurationEngine, document: &DraftDocument) -> Result<DraftId, EngineError> {
    let composer = engine.composer();
    let draft = composer.start_draft(&document.product)?.id;

    if let Err(e) = fill(composer, draft, document) {
        composer.discard_draft(draft)?;
        return Err(e);
    }
    Ok(draft)
}

fn fill(
    composer: &VariantComposer,
    draft: DraftId,
    document: &DraftDocument,
) -> Result<(), EngineError> {
    for fabric in &document.fabrics {
        composer.select_fabric(draft, fabric)?;
    }
    for variant_doc in &document.variants {
        let canvas = variant_doc.canvas.clone();
        let variant = match &variant_doc.fabric {
            Some(fabric) => {
                composer.add_color_variant_on_fabric(draft, &variant_doc.color, fabric, canvas)?
            }
            None => composer.add_color_variant(draft, &variant_doc.color, canvas)?,
        };
        for area in &variant_doc.print_areas {
            composer.add_print_area(draft, variant.id, area.clone())?;
        }
    }
    Ok(())
}

fn emit(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("failed to render output: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<T: From<&'static str> + Ord>(values: &[&'static str]) -> BTreeSet<T> {
        values.iter().map(|v| T::from(*v)).collect()
    }

    fn catalog_json() -> Value {
        let mut store = CatalogStore::new();
        store
            .create(Fabric {
                id: "cotton".into(),
                name: "Cotton".into(),
                print_types: ids(&["dtg"]),
                colors: ids(&["red"]),
            })
            .unwrap();
        store
            .create(PrintType {
                id: "dtg".into(),
                name: "DTG".into(),
                min_dpi: 75,
                max_dpi: 600,
                max_print_width_in: 12.0,
                max_print_height_in: 16.0,
                fabrics: ids(&["cotton"]),
            })
            .unwrap();
        store
            .create(Color {
                id: "red".into(),
                name: "Red".into(),
                swatch: "swatch:red".into(),
                fabrics: ids(&["cotton"]),
            })
            .unwrap();
        for id in ["tee-a", "tee-b"] {
            store
                .create(Product {
                    id: id.into(),
                    name: id.into(),
                    category: "t-shirt".into(),
                    fabrics: ids(&["cotton"]),
                })
                .unwrap();
        }
        serde_json::to_value(store.snapshot()).unwrap()
    }

    fn rect(x: f64, y: f64) -> Value {
        json!({ "type": "rectangle", "x": x, "y": y, "width": 300.0, "height": 300.0 })
    }

    fn draft_json(product: &str, shapes: Vec<Value>) -> Value {
        let areas: Vec<_> = shapes
            .into_iter()
            .enumerate()
            .map(|(i, shape)| {
                json!({
                    "name": format!("area-{}", i),
                    "shape": shape,
                    "allowedPrintTypes": ["dtg"],
                })
            })
            .collect();
        json!({
            "product": product,
            "variants": [{
                "color": "red",
                "canvas": {
                    "asset": "sha256:mockup",
                    "widthPx": 1000,
                    "heightPx": 1200,
                    "physicalWidthIn": 10.0,
                    "physicalHeightIn": 12.0,
                },
                "printAreas": areas,
            }],
        })
    }

    fn load_workspace(drafts: Vec<Value>) -> (ConfigurationEngine, Vec<DraftDocument>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workspace.json");
        let workspace = json!({ "catalog": catalog_json(), "drafts": drafts });
        fs::write(&path, workspace.to_string()).unwrap();
        load(&path, None).unwrap()
    }

    #[test]
    fn publish_renders_published_configuration() {
        let (engine, drafts) = load_workspace(vec![draft_json("tee-a", vec![rect(100.0, 100.0)])]);

        let (ok, value) = publish_document(&engine, &drafts[0]);
        assert!(ok, "{}", value);
        assert_eq!(value["published"]["version"], 1);
        assert_eq!(value["published"]["product"], "tee-a");
        assert_eq!(engine.latest_published(&"tee-a".into()).unwrap().version, 1);
    }

    #[test]
    fn publish_renders_report_for_invalid_draft() {
        let overlapping = vec![rect(100.0, 100.0), rect(250.0, 250.0)];
        let (engine, drafts) = load_workspace(vec![
            draft_json("tee-a", vec![rect(100.0, 100.0)]),
            draft_json("tee-b", overlapping),
        ]);

        assert!(publish_document(&engine, &drafts[0]).0);
        let (ok, value) = publish_document(&engine, &drafts[1]);
        assert!(!ok);
        assert_eq!(value["report"]["valid"], false);
        assert!(engine.latest_published(&"tee-b".into()).is_err());
    }

    #[test]
    fn check_leaves_nothing_published() {
        let (engine, drafts) = load_workspace(vec![draft_json("tee-a", vec![rect(100.0, 100.0)])]);

        let (ok, value) = check_document(&engine, &drafts[0]);
        assert!(ok, "{}", value);
        assert!(engine.latest_published(&"tee-a".into()).is_err());
    }

    #[test]
    fn failed_replay_releases_draft() {
        let (engine, drafts) = load_workspace(vec![draft_json("tee-a", vec![json!({
            "type": "polygon",
            "points": [{ "x": 0.0, "y": 0.0 }, { "x": 10.0, "y": 10.0 }],
        })])]);

        let (ok, value) = check_document(&engine, &drafts[0]);
        assert!(!ok);
        assert!(value["error"].is_string());
        assert_eq!(engine.composer().open_draft(&"tee-a".into()), None);
    }
}
