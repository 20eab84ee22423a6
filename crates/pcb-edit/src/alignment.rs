//! Lining components up and spreading them out.

use std::str::FromStr;

use log::warn;
use pcb_board::units::{mm, tenths_to_degrees};
use pcb_board::{Board, Point, Rect};
use serde::Deserialize;
use serde_json::json;

use crate::engine::Engine;
use crate::error::{CommandError, CommandResult, required};
use crate::params::Position;
use crate::response::Outcome;
use crate::session::SessionContext;

/// Distance kept between a snapped component and the board edge.
const EDGE_MARGIN_MM: f64 = 2.0;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignComponents {
    #[serde(default)]
    pub references: Vec<String>,
    pub alignment: Option<String>,
    pub distribution: Option<String>,
    /// Millimetres between neighbours for `distribution = "spacing"`.
    pub spacing: Option<f64>,
    pub edge: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Horizontal,
    Vertical,
    Edge,
}

impl FromStr for Alignment {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "horizontal" => Ok(Alignment::Horizontal),
            "vertical" => Ok(Alignment::Vertical),
            "edge" => Ok(Alignment::Edge),
            other => Err(CommandError::InvalidParameter(format!(
                "Alignment must be 'horizontal', 'vertical', or 'edge', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    None,
    Equal,
    /// Fixed step in internal units.
    Spacing(i64),
}

impl Distribution {
    fn parse(name: Option<&str>, spacing: Option<f64>) -> CommandResult<Self> {
        match name.unwrap_or("none") {
            "none" => Ok(Distribution::None),
            "equal" => Ok(Distribution::Equal),
            "spacing" => Ok(Distribution::Spacing(mm(required(spacing, "spacing")?))),
            other => Err(CommandError::InvalidParameter(format!(
                "Distribution must be 'none', 'equal', or 'spacing', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn get(self, p: Point) -> i64 {
        match self {
            Axis::X => p.x,
            Axis::Y => p.y,
        }
    }

    fn set(self, p: &mut Point, value: i64) {
        match self {
            Axis::X => p.x = value,
            Axis::Y => p.y = value,
        }
    }
}

/// Put every point on one line across `along`, sorted by their `along`
/// coordinate, then optionally respace them.
///
/// The shared coordinate is the truncated integer mean. Equal distribution
/// keeps the two extremes and steps by `span / (n - 1)` in integer units.
fn line_up(points: &mut [(usize, Point)], along: Axis, across: Axis, distribution: Distribution) {
    let n = points.len();
    if n == 0 {
        return;
    }
    // Integer division, so negative sums round toward zero rather than down.
    let mean = points.iter().map(|(_, p)| across.get(*p)).sum::<i64>() / n as i64;
    points.sort_by_key(|(_, p)| along.get(*p));
    for (_, p) in points.iter_mut() {
        across.set(p, mean);
    }

    match distribution {
        Distribution::None => {}
        Distribution::Equal if n > 2 => {
            let first = along.get(points[0].1);
            let last = along.get(points[n - 1].1);
            let step = (last - first) / (n as i64 - 1);
            for (i, (_, p)) in points.iter_mut().enumerate().take(n - 1).skip(1) {
                along.set(p, first + i as i64 * step);
            }
        }
        Distribution::Equal => {}
        Distribution::Spacing(spacing) => {
            let mut current = along.get(points[0].1);
            for (_, p) in points.iter_mut().skip(1) {
                current += spacing;
                along.set(p, current);
            }
        }
    }
}

/// Snap to one board edge, inset by the margin. Unknown edges are left alone.
fn snap_to_edge(points: &mut [(usize, Point)], bounds: Rect, edge: &str) {
    let margin = mm(EDGE_MARGIN_MM);
    let (axis, value) = match edge {
        "left" => (Axis::X, bounds.left + margin),
        "right" => (Axis::X, bounds.right - margin),
        "top" => (Axis::Y, bounds.top + margin),
        "bottom" => (Axis::Y, bounds.bottom - margin),
        other => {
            warn!("Unknown edge alignment: {other}");
            return;
        }
    };
    for (_, p) in points.iter_mut() {
        axis.set(p, value);
    }
}

pub struct AlignmentEngine;

impl Engine for AlignmentEngine {
    type Command = AlignComponents;

    fn execute(
        &self,
        ctx: &mut SessionContext<'_>,
        params: AlignComponents,
    ) -> CommandResult<Outcome> {
        if params.references.len() < 2 {
            return Err(CommandError::MissingParameter(
                "references (at least two)".to_string(),
            ));
        }
        let board: &mut Board = &mut *ctx.board;
        let mut points = params
            .references
            .iter()
            .map(|reference| {
                board
                    .footprints
                    .iter()
                    .position(|f| f.reference() == reference)
                    .map(|idx| (idx, board.footprints[idx].position))
                    .ok_or_else(|| {
                        CommandError::NotFound(format!("Could not find component: {reference}"))
                    })
            })
            .collect::<CommandResult<Vec<_>>>()?;

        let alignment: Alignment = params.alignment.as_deref().unwrap_or("horizontal").parse()?;
        let distribution = Distribution::parse(params.distribution.as_deref(), params.spacing)?;
        match alignment {
            Alignment::Horizontal => line_up(&mut points, Axis::X, Axis::Y, distribution),
            Alignment::Vertical => line_up(&mut points, Axis::Y, Axis::X, distribution),
            Alignment::Edge => {
                let edge = required(params.edge.as_deref(), "edge")?;
                let bounds = board.bounding_box().ok_or_else(|| {
                    CommandError::InvalidParameter(
                        "The board has no outline or items to align against".to_string(),
                    )
                })?;
                snap_to_edge(&mut points, bounds, edge);
            }
        }

        let mut components = Vec::with_capacity(points.len());
        for (idx, position) in points {
            let footprint = &mut board.footprints[idx];
            footprint.position = position;
            components.push(json!({
                "reference": footprint.reference(),
                "position": Position::from(position),
                "rotation": tenths_to_degrees(footprint.rotation),
            }));
        }

        Ok(Outcome::new(format!("Aligned {} components", components.len()))
            .with("alignment", params.alignment.as_deref().unwrap_or("horizontal"))
            .with("distribution", params.distribution.as_deref().unwrap_or("none"))
            .with("components", components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use pcb_board::items::Shape;
    use pcb_board::Drawing;

    fn align(fixture: &mut Fixture, params: serde_json::Value) -> CommandResult<Outcome> {
        AlignmentEngine.execute(&mut fixture.ctx(), crate::params::parse(params)?)
    }

    fn position(fixture: &Fixture, reference: &str) -> Point {
        fixture.board.footprint(reference).unwrap().position
    }

    #[test]
    fn horizontal_uses_truncated_mean() {
        let mut fixture = Fixture::default();
        fixture.part("R1", 30.0, 10.0);
        fixture.part("R2", 10.0, 11.0);
        fixture.part("R3", 20.0, 10.000_000_5);
        let outcome = align(&mut fixture, json!({"references": ["R1", "R2", "R3"]})).unwrap();

        let mean = (mm(10.0) + mm(11.0) + mm(10.000_000_5)) / 3;
        for r in ["R1", "R2", "R3"] {
            assert_eq!(position(&fixture, r).y, mean);
        }
        assert_eq!(position(&fixture, "R1").x, mm(30.0));
        let order: Vec<_> = outcome
            .get("components")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["reference"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["R2", "R3", "R1"]);
    }

    #[test]
    fn negative_mean_rounds_toward_zero() {
        let mut fixture = Fixture::default();
        fixture.part("R1", 0.0, -10.0);
        fixture.part("R2", 1.0, -11.0);
        fixture.part("R3", 2.0, -10.000_001);
        align(&mut fixture, json!({"references": ["R1", "R2", "R3"]})).unwrap();

        // The coordinates sum to -31_000_001 nm.
        for r in ["R1", "R2", "R3"] {
            assert_eq!(position(&fixture, r).y, -10_333_333);
        }
    }

    #[test]
    fn equal_distribution_is_arithmetic() {
        let mut fixture = Fixture::default();
        fixture.part("R1", 0.0, 0.0);
        fixture.part("R2", 1.0, 0.0);
        fixture.part("R3", 2.0, 5.0);
        fixture.part("R4", 10.0, 3.0);
        align(
            &mut fixture,
            json!({"references": ["R4", "R3", "R2", "R1"], "distribution": "equal"}),
        )
        .unwrap();
        let xs: Vec<i64> = ["R1", "R2", "R3", "R4"]
            .iter()
            .map(|r| position(&fixture, r).x)
            .collect();
        let step = mm(10.0) / 3;
        assert_eq!(xs, vec![0, step, 2 * step, mm(10.0)]);
    }

    #[test]
    fn vertical_spacing_walks_from_first() {
        let mut fixture = Fixture::default();
        fixture.part("C1", 4.0, 9.0);
        fixture.part("C2", 6.0, 1.0);
        fixture.part("C3", 5.0, 3.0);
        align(
            &mut fixture,
            json!({
                "references": ["C1", "C2", "C3"],
                "alignment": "vertical",
                "distribution": "spacing",
                "spacing": 2.5
            }),
        )
        .unwrap();
        assert_eq!(position(&fixture, "C2"), Point::mm(5.0, 1.0));
        assert_eq!(position(&fixture, "C3"), Point::mm(5.0, 3.5));
        assert_eq!(position(&fixture, "C1"), Point::mm(5.0, 6.0));
    }

    #[test]
    fn spacing_needs_a_value() {
        let mut fixture = Fixture::default();
        fixture.part("R1", 0.0, 0.0);
        fixture.part("R2", 1.0, 0.0);
        let err = align(
            &mut fixture,
            json!({"references": ["R1", "R2"], "distribution": "spacing"}),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::MissingParameter(p) if p == "spacing"));
    }

    #[test]
    fn edge_snaps_inside_outline() {
        let mut fixture = Fixture::default();
        fixture.part("R1", 20.0, 20.0);
        fixture.part("R2", 40.0, 30.0);
        fixture.board.set_outline(vec![Drawing::new(
            Shape::Rect {
                start: Point::mm(0.0, 0.0),
                end: Point::mm(100.0, 50.0),
            },
            "Edge.Cuts",
            mm(0.1),
        )]);
        align(
            &mut fixture,
            json!({"references": ["R1", "R2"], "alignment": "edge", "edge": "bottom"}),
        )
        .unwrap();
        assert_eq!(position(&fixture, "R1"), Point::mm(20.0, 48.0));
        assert_eq!(position(&fixture, "R2"), Point::mm(40.0, 48.0));

        align(
            &mut fixture,
            json!({"references": ["R1", "R2"], "alignment": "edge", "edge": "diagonal"}),
        )
        .unwrap();
        assert_eq!(position(&fixture, "R1"), Point::mm(20.0, 48.0));
    }

    #[test]
    fn argument_errors() {
        let mut fixture = Fixture::default();
        fixture.part("R1", 0.0, 0.0);
        fixture.part("R2", 1.0, 0.0);
        assert!(matches!(
            align(&mut fixture, json!({"references": ["R1"]})),
            Err(CommandError::MissingParameter(_))
        ));
        assert!(matches!(
            align(&mut fixture, json!({"references": ["R1", "R9"]})),
            Err(CommandError::NotFound(_))
        ));
        assert!(matches!(
            align(&mut fixture, json!({"references": ["R1", "R2"], "alignment": "edge"})),
            Err(CommandError::MissingParameter(p)) if p == "edge"
        ));
        assert!(matches!(
            align(&mut fixture, json!({"references": ["R1", "R2"], "alignment": "diagonal"})),
            Err(CommandError::InvalidParameter(_))
        ));
    }
}
