use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::ids::{ColorId, PrintAreaId, PrintTypeId};
use crate::validation::ValidationReport;

/// Kind of record an identifier refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Fabric,
    PrintType,
    Color,
    Product,
    Draft,
    ColorVariant,
    PrintArea,
    PublishedConfiguration,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fabric => "Fabric",
            Self::PrintType => "PrintType",
            Self::Color => "Color",
            Self::Product => "Product",
            Self::Draft => "Draft",
            Self::ColorVariant => "ColorVariant",
            Self::PrintArea => "PrintArea",
            Self::PublishedConfiguration => "PublishedConfiguration",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid color {color}: {reason}")]
    InvalidColor { color: ColorId, reason: String },

    #[error("Invalid geometry for {subject}: {reason}")]
    InvalidGeometry { subject: String, reason: String },

    #[error("Resolution violation on print area {print_area} for {print_type}: {reason}")]
    ResolutionViolation {
        print_area: PrintAreaId,
        print_type: PrintTypeId,
        reason: String,
    },

    #[error(
        "Print type {print_type} incompatible on print area {print_area}: {}",
        .reasons.join("; ")
    )]
    CompatibilityViolation {
        print_area: PrintAreaId,
        print_type: PrintTypeId,
        reasons: Vec<String>,
    },

    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    #[error("Snapshot written by engine {found} is not readable by engine {supported}")]
    IncompatibleSnapshot { found: String, supported: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// The aggregated report, when this error came out of a rejected publish.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Validation(report) => Some(report),
            _ => None,
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
