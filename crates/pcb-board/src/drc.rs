use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// KiCad DRC report structure matching the JSON schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrcReport {
    #[serde(default)]
    pub coordinate_units: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub kicad_version: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub violations: Vec<DrcViolation>,
    #[serde(default)]
    pub unconnected_items: Vec<serde_json::Value>,
    #[serde(default)]
    pub schematic_parity: Vec<serde_json::Value>,
}

/// A single DRC violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrcViolation {
    #[serde(rename = "type")]
    pub violation_type: String,
    pub severity: String,
    pub description: String,
    #[serde(default)]
    pub items: Vec<DrcItem>,
    /// Whether this violation has been excluded by the user in KiCad
    #[serde(default)]
    pub excluded: bool,
}

/// An item involved in a DRC violation (track, via, pad, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrcItem {
    pub description: String,
    pub pos: DrcPosition,
    #[serde(default)]
    pub uuid: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DrcPosition {
    pub x: f64,
    pub y: f64,
}

impl DrcReport {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse DRC JSON report")
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path.as_ref()).context("Failed to read DRC report file")?;
        Self::from_json(&contents)
    }

    /// Get count of violations by severity, as (errors, warnings)
    pub fn violation_counts(&self) -> (usize, usize) {
        let errors = self
            .violations
            .iter()
            .filter(|v| v.severity == "error")
            .count();
        let warnings = self
            .violations
            .iter()
            .filter(|v| v.severity == "warning")
            .count();
        (errors, warnings)
    }

    /// Violations not excluded in KiCad, optionally limited to one severity.
    pub fn active_violations<'a>(
        &'a self,
        severity: Option<&'a str>,
    ) -> impl Iterator<Item = &'a DrcViolation> + 'a {
        self.violations
            .iter()
            .filter(|v| !v.excluded)
            .filter(move |v| severity.is_none_or(|s| v.severity.eq_ignore_ascii_case(s)))
    }
}

impl DrcViolation {
    /// Position of the first item involved, if any.
    pub fn location(&self) -> Option<DrcPosition> {
        self.items.first().map(|i| i.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "$schema": "https://schemas.kicad.org/drc.v1.json",
        "coordinate_units": "mm",
        "date": "2025-01-01T00:00:00+0000",
        "kicad_version": "9.0.0",
        "source": "board.kicad_pcb",
        "violations": [
            {"type": "clearance", "severity": "error", "description": "Clearance violation",
             "items": [{"description": "Track [GND] on F.Cu", "pos": {"x": 10.0, "y": 5.5}, "uuid": "a"}]},
            {"type": "silk_overlap", "severity": "warning", "description": "Silkscreen overlap", "items": []},
            {"type": "courtyards_overlap", "severity": "error", "description": "Courtyards overlap", "items": [], "excluded": true}
        ],
        "unconnected_items": [],
        "schematic_parity": []
    }"#;

    #[test]
    fn counts_and_filters() {
        let report = DrcReport::from_json(REPORT).unwrap();
        assert_eq!(report.violation_counts(), (2, 1));
        assert_eq!(report.active_violations(None).count(), 2);
        assert_eq!(report.active_violations(Some("ERROR")).count(), 1);
        let first = report.active_violations(Some("error")).next().unwrap();
        assert_eq!(first.location().map(|p| p.x), Some(10.0));
    }

    #[test]
    fn tolerates_sparse_reports() {
        let report = DrcReport::from_json(r#"{"violations": []}"#).unwrap();
        assert_eq!(report.violation_counts(), (0, 0));
        assert_eq!(report.active_violations(None).count(), 0);
    }
}
