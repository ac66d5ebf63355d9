//! Violations and Reports
//!
//! Rules produce structured violations.
//! The publish pipeline folds them into a single report.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ColorVariantId, DraftId, PrintAreaId, PrintTypeId, ProductId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Incomplete,
    Compatibility,
    OutOfBounds,
    BelowMinimumArea,
    Overlap,
    Resolution,
    ExceedsMaxPrintSize,
}

impl ViolationKind {
    pub fn is_geometry(self) -> bool {
        matches!(
            self,
            Self::OutOfBounds
                | Self::BelowMinimumArea
                | Self::Overlap
                | Self::Resolution
                | Self::ExceedsMaxPrintSize
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub rule: String,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_variant: Option<ColorVariantId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub print_areas: Vec<PrintAreaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_type: Option<PrintTypeId>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub actual: Option<String>,
    #[serde(default)]
    pub remediation: Vec<String>,
}

impl Violation {
    pub fn error(rule: &str, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            kind,
            severity: Severity::Error,
            message: message.into(),
            color_variant: None,
            print_areas: vec![],
            print_type: None,
            expected: None,
            actual: None,
            remediation: vec![],
        }
    }

    pub fn on_variant(mut self, variant: ColorVariantId) -> Self {
        self.color_variant = Some(variant);
        self
    }

    pub fn on_area(mut self, area: PrintAreaId) -> Self {
        self.print_areas.push(area);
        self
    }

    pub fn on_print_type(mut self, print_type: PrintTypeId) -> Self {
        self.print_type = Some(print_type);
        self
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    pub fn remediation(mut self, hint: impl Into<String>) -> Self {
        self.remediation.push(hint.into());
        self
    }

    /// Downgrades the violation to a warning attached to a draft print area.
    pub fn into_warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn involves(&self, area: PrintAreaId) -> bool {
        self.print_areas.contains(&area)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule, self.message)
    }
}

/// Aggregate of every violation found in one validation pass over a draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub product: ProductId,
    pub draft: DraftId,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new(product: ProductId, draft: DraftId, violations: Vec<Violation>) -> Self {
        let valid = !violations.iter().any(|v| v.severity == Severity::Error);
        Self { valid, product, draft, violations }
    }

    pub fn has_errors(&self) -> bool {
        !self.valid
    }

    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<_> = self.violations.iter().map(ToString::to_string).collect();
        write!(
            f,
            "{} violation(s) in draft {} of product {}: {}",
            self.violations.len(),
            self.draft,
            self.product,
            messages.join("; ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_invalidate_report() {
        let warning = Violation::error("min_area", ViolationKind::BelowMinimumArea, "too small")
            .into_warning();
        let report =
            ValidationReport::new(ProductId::new("tee"), DraftId::generate(), vec![warning]);
        assert!(report.valid);
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn errors_invalidate_report() {
        let error = Violation::error("bounds", ViolationKind::OutOfBounds, "outside canvas");
        let report = ValidationReport::new(ProductId::new("tee"), DraftId::generate(), vec![error]);
        assert!(report.has_errors());
        assert_eq!(report.of_kind(ViolationKind::OutOfBounds).count(), 1);
        assert!(report.to_string().contains("bounds: outside canvas"));
    }
}
