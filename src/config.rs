//! Engine Configuration - Business Policy
//!
//! Every threshold used by the geometry rules lives here.
//! Missing fields fall back to serde defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub geometry: GeometryPolicy,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize { 128 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryPolicy::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryPolicy {
    /// Smallest printable region, in square inches of garment.
    #[serde(default = "default_min_print_area")]
    pub min_print_area_sq_in: f64,
    /// Overlaps whose shared region spans at most this many canvas pixels on
    /// either axis are ignored. Applies to rectangles and polygons alike.
    #[serde(default)]
    pub overlap_tolerance_px: f64,
    /// Stop a placement check at the first failing rule.
    #[serde(default)]
    pub short_circuit: bool,
    #[serde(default = "default_true")]
    pub require_anchor_inside: bool,
    /// Reject a print area on add instead of attaching warnings.
    #[serde(default)]
    pub strict_placement: bool,
}

fn default_true() -> bool { true }
fn default_min_print_area() -> f64 { 4.0 }

impl Default for GeometryPolicy {
    fn default() -> Self {
        Self {
            min_print_area_sq_in: default_min_print_area(),
            overlap_tolerance_px: 0.0,
            short_circuit: false,
            require_anchor_inside: true,
            strict_placement: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"geometry": {{"minPrintAreaSqIn": 1.5}}}}"#).unwrap();

        let config = EngineConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.geometry.min_print_area_sq_in, 1.5);
        assert_eq!(config.geometry.overlap_tolerance_px, 0.0);
        assert!(config.geometry.require_anchor_inside);
        assert_eq!(config.event_capacity, 128);
    }
}
