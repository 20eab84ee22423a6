//! Board design rules and design-rule checking.

use log::info;
use pcb_board::units::{mm, to_mm};
use pcb_board::{Board, DrcReport, DrcViolation};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::engine::Engine;
use crate::error::{CommandResult, KernelResultExt};
use crate::files::{expand_path, write_atomic};
use crate::response::Outcome;
use crate::session::SessionContext;

/// Any subset of the rules; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignRules {
    pub clearance: Option<f64>,
    pub track_width: Option<f64>,
    pub via_diameter: Option<f64>,
    pub via_drill: Option<f64>,
    pub micro_via_diameter: Option<f64>,
    pub micro_via_drill: Option<f64>,
    pub min_track_width: Option<f64>,
    pub min_via_diameter: Option<f64>,
    pub min_via_drill: Option<f64>,
    pub min_micro_via_diameter: Option<f64>,
    pub min_micro_via_drill: Option<f64>,
    pub min_hole_diameter: Option<f64>,
    pub require_courtyard: Option<bool>,
    pub courtyard_clearance: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDrc {
    pub report_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrcViolations {
    pub severity: Option<String>,
}

#[derive(Debug, Clone)]
pub enum DesignRuleCommand {
    Set(DesignRules),
    Get,
    RunDrc(RunDrc),
    Violations(DrcViolations),
}

pub struct DesignRuleEngine;

impl Engine for DesignRuleEngine {
    type Command = DesignRuleCommand;

    fn execute(
        &self,
        ctx: &mut SessionContext<'_>,
        command: DesignRuleCommand,
    ) -> CommandResult<Outcome> {
        match command {
            DesignRuleCommand::Set(rules) => {
                apply_rules(ctx.board, &rules);
                Ok(Outcome::new("Updated design rules").with("rules", rules_json(ctx.board)))
            }
            DesignRuleCommand::Get => Ok(Outcome::data().with("rules", rules_json(ctx.board))),
            DesignRuleCommand::RunDrc(params) => run_drc(ctx, params),
            DesignRuleCommand::Violations(params) => {
                let severity = params
                    .severity
                    .as_deref()
                    .filter(|s| !s.eq_ignore_ascii_case("all"));
                let violations: Vec<Value> = ctx
                    .drc
                    .as_ref()
                    .map(|report| report.active_violations(severity).map(violation_json).collect())
                    .unwrap_or_default();
                Ok(Outcome::data().with("violations", violations))
            }
        }
    }
}

fn apply_rules(board: &mut Board, rules: &DesignRules) {
    let set = |field: &mut i64, value: Option<f64>| {
        if let Some(value) = value {
            *field = mm(value);
        }
    };

    let class = board.default_net_class_mut();
    set(&mut class.track_width, rules.track_width);
    set(&mut class.via_diameter, rules.via_diameter);
    set(&mut class.via_drill, rules.via_drill);
    set(&mut class.uvia_diameter, rules.micro_via_diameter);
    set(&mut class.uvia_drill, rules.micro_via_drill);

    let design = &mut board.design;
    set(&mut design.min_clearance, rules.clearance);
    set(&mut design.min_track_width, rules.min_track_width);
    set(&mut design.min_via_diameter, rules.min_via_diameter);
    set(&mut design.min_via_drill, rules.min_via_drill);
    set(&mut design.min_uvia_diameter, rules.min_micro_via_diameter);
    set(&mut design.min_uvia_drill, rules.min_micro_via_drill);
    set(&mut design.min_hole_diameter, rules.min_hole_diameter);
    set(&mut design.courtyard_clearance, rules.courtyard_clearance);
    if let Some(require) = rules.require_courtyard {
        design.require_courtyard = require;
    }
}

fn rules_json(board: &Board) -> Value {
    let class = board.default_net_class();
    let design = &board.design;
    json!({
        "clearance": to_mm(design.min_clearance),
        "trackWidth": to_mm(class.track_width),
        "viaDiameter": to_mm(class.via_diameter),
        "viaDrill": to_mm(class.via_drill),
        "microViaDiameter": to_mm(class.uvia_diameter),
        "microViaDrill": to_mm(class.uvia_drill),
        "minTrackWidth": to_mm(design.min_track_width),
        "minViaDiameter": to_mm(design.min_via_diameter),
        "minViaDrill": to_mm(design.min_via_drill),
        "minMicroViaDiameter": to_mm(design.min_uvia_diameter),
        "minMicroViaDrill": to_mm(design.min_uvia_drill),
        "minHoleDiameter": to_mm(design.min_hole_diameter),
        "requireCourtyard": design.require_courtyard,
        "courtyardClearance": to_mm(design.courtyard_clearance),
    })
}

fn violation_json(violation: &DrcViolation) -> Value {
    let location = violation
        .location()
        .map(|pos| json!({"x": pos.x, "y": pos.y, "unit": "mm"}));
    json!({
        "type": violation.violation_type,
        "severity": violation.severity,
        "message": violation.description,
        "location": location,
    })
}

fn run_drc(ctx: &mut SessionContext<'_>, params: RunDrc) -> CommandResult<Outcome> {
    let report: DrcReport = ctx
        .kernel
        .run_drc(ctx.board)
        .or_internal("Failed to run DRC")?;

    let report_path = params.report_path.as_deref().map(expand_path);
    if let Some(path) = &report_path {
        serde_json::to_string_pretty(&report)
            .map_err(anyhow::Error::from)
            .and_then(|text| write_atomic(path, text.as_bytes()))
            .or_internal("Failed to write DRC report")?;
    }

    let violations: Vec<Value> = report.active_violations(None).map(violation_json).collect();
    let (errors, warnings) = report.violation_counts();
    info!("DRC finished: {errors} errors, {warnings} warnings");
    let outcome = Outcome::new(format!("Found {} DRC violations", violations.len()))
        .with("violations", violations)
        .with("unconnectedCount", report.unconnected_items.len())
        .with("reportPath", report_path);
    *ctx.drc = Some(report);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    fn report() -> DrcReport {
        DrcReport::from_json(
            r#"{
                "coordinate_units": "mm",
                "violations": [
                    {"type": "clearance", "severity": "error", "description": "Clearance violation",
                     "items": [{"description": "Track", "pos": {"x": 10.0, "y": 5.5}}]},
                    {"type": "silk_overlap", "severity": "warning", "description": "Silkscreen overlap"},
                    {"type": "hole_clearance", "severity": "error", "description": "Hole clearance", "excluded": true}
                ],
                "unconnected_items": [{"type": "unconnected_items"}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn partial_update_keeps_other_rules() {
        let mut fixture = Fixture::default();
        let params = crate::params::parse(json!({
            "clearance": 0.15,
            "viaDrill": 0.3,
            "requireCourtyard": true
        }))
        .unwrap();
        let outcome = DesignRuleEngine
            .execute(&mut fixture.ctx(), DesignRuleCommand::Set(params))
            .unwrap();
        let rules = outcome.get("rules").unwrap();
        assert_eq!(rules["clearance"], 0.15);
        assert_eq!(rules["viaDrill"], 0.3);
        assert_eq!(rules["viaDiameter"], 0.8);
        assert_eq!(rules["requireCourtyard"], true);
        assert_eq!(fixture.board.via_dimensions(), (mm(0.8), mm(0.3)));

        let again = DesignRuleEngine
            .execute(&mut fixture.ctx(), DesignRuleCommand::Get)
            .unwrap();
        assert_eq!(again.get("rules"), Some(rules));
    }

    #[test]
    fn drc_is_stored_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let mut fixture = Fixture::default();
        fixture.kernel.drc = report();

        let empty = DesignRuleEngine
            .execute(&mut fixture.ctx(), DesignRuleCommand::Violations(DrcViolations::default()))
            .unwrap();
        assert_eq!(empty.get("violations").unwrap(), &json!([]));

        let path = dir.path().join("drc.json");
        let outcome = DesignRuleEngine
            .execute(
                &mut fixture.ctx(),
                DesignRuleCommand::RunDrc(RunDrc {
                    report_path: Some(path.display().to_string()),
                }),
            )
            .unwrap();
        assert_eq!(outcome.message.as_deref(), Some("Found 2 DRC violations"));
        let first = &outcome.get("violations").unwrap()[0];
        assert_eq!(first["location"], json!({"x": 10.0, "y": 5.5, "unit": "mm"}));
        assert_eq!(first["message"], "Clearance violation");
        assert_eq!(outcome.get("unconnectedCount").unwrap(), 1);
        assert!(DrcReport::from_file(&path).is_ok());

        let warnings = DesignRuleEngine
            .execute(
                &mut fixture.ctx(),
                DesignRuleCommand::Violations(DrcViolations {
                    severity: Some("warning".into()),
                }),
            )
            .unwrap();
        let warnings = warnings.get("violations").unwrap().as_array().unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0]["type"], "silk_overlap");
        assert_eq!(warnings[0]["location"], Value::Null);
    }
}
