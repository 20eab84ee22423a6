//! Putting footprints on the board and editing them afterwards.

use indexmap::IndexMap;
use log::{debug, warn};
use pcb_board::units::{degrees_to_tenths, mm, normalize_tenths, tenths_to_degrees};
use pcb_board::{Board, Footprint, Point};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::engine::Engine;
use crate::error::{CommandError, CommandResult, KernelResultExt, required};
use crate::params::{PointParam, Position};
use crate::response::Outcome;
use crate::session::SessionContext;

/// Offset applied to a duplicate placed without an explicit position.
const DUPLICATE_OFFSET_X: f64 = 5.0;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceComponent {
    pub component_id: Option<String>,
    pub position: Option<PointParam>,
    pub reference: Option<String>,
    pub value: Option<String>,
    pub footprint: Option<String>,
    #[serde(default)]
    pub rotation: f64,
    pub layer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceArray {
    pub component_id: Option<String>,
    pub pattern: Option<String>,
    pub count: Option<u32>,
    pub reference_prefix: Option<String>,
    pub value: Option<String>,
    pub layer: Option<String>,
    #[serde(default)]
    pub rotation: f64,
    pub start_position: Option<PointParam>,
    pub rows: Option<u32>,
    pub columns: Option<u32>,
    pub spacing_x: Option<f64>,
    pub spacing_y: Option<f64>,
    pub center: Option<PointParam>,
    pub radius: Option<f64>,
    #[serde(default)]
    pub angle_start: f64,
    pub angle_step: Option<f64>,
    #[serde(default)]
    pub rotation_offset: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateComponent {
    pub reference: Option<String>,
    pub new_reference: Option<String>,
    pub position: Option<PointParam>,
    pub rotation: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveComponent {
    pub reference: Option<String>,
    pub position: Option<PointParam>,
    pub rotation: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateComponent {
    pub reference: Option<String>,
    pub angle: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditComponent {
    pub reference: Option<String>,
    pub new_reference: Option<String>,
    pub value: Option<String>,
    pub footprint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRef {
    pub reference: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PlacementCommand {
    Place(PlaceComponent),
    PlaceArray(PlaceArray),
    Duplicate(DuplicateComponent),
    Move(MoveComponent),
    Rotate(RotateComponent),
    Delete(ComponentRef),
    Edit(EditComponent),
    Properties(ComponentRef),
    List,
}

/// Summary of a placed footprint as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInfo {
    pub reference: String,
    pub value: String,
    pub footprint: String,
    pub lib_id: String,
    pub position: Position,
    pub rotation: f64,
    pub layer: String,
}

impl ComponentInfo {
    pub fn of(footprint: &Footprint) -> Self {
        Self {
            reference: footprint.reference().to_string(),
            value: footprint.value().to_string(),
            footprint: footprint.footprint_name().to_string(),
            lib_id: footprint.lib_id.clone(),
            position: footprint.position.into(),
            rotation: tenths_to_degrees(footprint.rotation),
            layer: footprint.layer.clone(),
        }
    }
}

/// Where and how one instance of a library footprint goes.
struct Placement {
    position: Point,
    reference: Option<String>,
    value: Option<String>,
    footprint: Option<String>,
    rotation: f64,
    layer: String,
}

pub struct PlacementEngine;

impl Engine for PlacementEngine {
    type Command = PlacementCommand;

    fn execute(
        &self,
        ctx: &mut SessionContext<'_>,
        command: PlacementCommand,
    ) -> CommandResult<Outcome> {
        match command {
            PlacementCommand::Place(params) => self.place(ctx, params),
            PlacementCommand::PlaceArray(params) => self.place_array(ctx, params),
            PlacementCommand::Duplicate(params) => duplicate(ctx.board, params),
            PlacementCommand::Move(params) => move_component(ctx.board, params),
            PlacementCommand::Rotate(params) => rotate(ctx.board, params),
            PlacementCommand::Delete(params) => delete(ctx.board, params),
            PlacementCommand::Edit(params) => edit(ctx.board, params),
            PlacementCommand::Properties(params) => properties(ctx.board, params),
            PlacementCommand::List => Ok(Outcome::data().with(
                "components",
                ctx.board.footprints.iter().map(ComponentInfo::of).collect::<Vec<_>>(),
            )),
        }
    }
}

impl PlacementEngine {
    fn place(
        &self,
        ctx: &mut SessionContext<'_>,
        params: PlaceComponent,
    ) -> CommandResult<Outcome> {
        let component_id = required(params.component_id, "componentId")?;
        let position = required(params.position, "position")?.to_point()?;
        let template = resolve_footprint(ctx, &component_id)?;
        let info = instantiate(
            ctx.board,
            &template,
            Placement {
                position,
                reference: params.reference,
                value: params.value,
                footprint: params.footprint,
                rotation: params.rotation,
                layer: params.layer.unwrap_or_else(|| "F.Cu".to_string()),
            },
        )?;
        Ok(Outcome::new(format!("Placed component: {component_id}")).with("component", info))
    }

    fn place_array(
        &self,
        ctx: &mut SessionContext<'_>,
        params: PlaceArray,
    ) -> CommandResult<Outcome> {
        let component_id = required(params.component_id.clone(), "componentId")?;
        let count = required(params.count, "count")?;
        if count == 0 {
            return Err(CommandError::InvalidParameter(
                "count must be at least 1".to_string(),
            ));
        }
        let pattern = params.pattern.clone().unwrap_or_else(|| "grid".to_string());
        let cells = match pattern.as_str() {
            "grid" => grid_cells(&params, count)?,
            "circular" => circular_cells(&params, count)?,
            other => {
                return Err(CommandError::Unsupported(format!(
                    "Unsupported array pattern '{other}': expected 'grid' or 'circular'"
                )));
            }
        };

        let template = resolve_footprint(ctx, &component_id)?;
        let prefix = params.reference_prefix.as_deref().unwrap_or("U");
        let layer = params.layer.as_deref().unwrap_or("F.Cu");
        let mut placed = Vec::new();
        let mut failed = Vec::new();
        for cell in cells {
            let reference = format!("{prefix}{}", cell.index);
            let placement = Placement {
                position: cell.position.to_point()?,
                reference: Some(reference.clone()),
                value: params.value.clone(),
                footprint: None,
                rotation: cell.rotation,
                layer: layer.to_string(),
            };
            match instantiate(ctx.board, &template, placement) {
                Ok(info) => placed.push(info),
                Err(err) => {
                    warn!("Skipping {reference} in {pattern} array: {err}");
                    failed.push(json!({
                        "reference": reference,
                        "message": err.to_string(),
                        "errorCode": err.code(),
                    }));
                }
            }
        }

        let message = if failed.is_empty() {
            format!("Placed {count} components in {pattern} pattern")
        } else {
            format!("Placed {} of {count} components in {pattern} pattern", placed.len())
        };
        Ok(Outcome::new(message)
            .with("components", placed)
            .with("failed", failed))
    }
}

/// One slot of an array. `index` is 1-based.
struct Cell {
    index: u32,
    position: PointParam,
    rotation: f64,
}

fn grid_cells(params: &PlaceArray, count: u32) -> CommandResult<Vec<Cell>> {
    let start = required(params.start_position.as_ref(), "startPosition")?;
    let rows = required(params.rows, "rows")?;
    let columns = required(params.columns, "columns")?;
    let spacing_x = required(params.spacing_x, "spacingX")?;
    let spacing_y = required(params.spacing_y, "spacingY")?;
    if rows.checked_mul(columns) != Some(count) {
        return Err(CommandError::InvalidParameter(format!(
            "rows * columns must equal count ({rows} * {columns} != {count})"
        )));
    }

    let mut cells = Vec::with_capacity(count as usize);
    for row in 0..rows {
        for col in 0..columns {
            cells.push(Cell {
                index: row * columns + col + 1,
                position: PointParam {
                    x: start.x + f64::from(col) * spacing_x,
                    y: start.y + f64::from(row) * spacing_y,
                    unit: start.unit.clone(),
                },
                rotation: params.rotation,
            });
        }
    }
    Ok(cells)
}

/// Items face outward: each is rotated by its own angle plus the offset.
fn circular_cells(params: &PlaceArray, count: u32) -> CommandResult<Vec<Cell>> {
    let center = required(params.center.as_ref(), "center")?;
    let radius = required(params.radius, "radius")?;
    let step = required(params.angle_step, "angleStep")?;

    Ok((0..count)
        .map(|i| {
            let angle = params.angle_start + f64::from(i) * step;
            let (sin, cos) = angle.to_radians().sin_cos();
            Cell {
                index: i + 1,
                position: PointParam {
                    x: center.x + radius * cos,
                    y: center.y + radius * sin,
                    unit: center.unit.clone(),
                },
                rotation: angle + params.rotation_offset,
            }
        })
        .collect())
}

fn resolve_footprint(ctx: &SessionContext<'_>, component_id: &str) -> CommandResult<Footprint> {
    ctx.kernel
        .load_footprint(component_id)
        .or_internal("Failed to load footprint")?
        .ok_or_else(|| CommandError::NotFound(format!("Could not find component: {component_id}")))
}

/// Prefix used when the caller does not name the new part, taken from the
/// library's reference designator (`D**` gives `D`).
fn reference_prefix(footprint: &Footprint) -> String {
    let prefix: String = footprint
        .reference()
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    match prefix.as_str() {
        "" | "REF" => "U".to_string(),
        _ => prefix,
    }
}

fn instantiate(
    board: &mut Board,
    template: &Footprint,
    placement: Placement,
) -> CommandResult<ComponentInfo> {
    let reference = match placement.reference {
        Some(reference) if board.has_reference(&reference) => {
            return Err(CommandError::AlreadyExists(format!(
                "A component with reference {reference} already exists"
            )));
        }
        Some(reference) => reference,
        None => board.next_reference(&reference_prefix(template)),
    };

    let mut footprint = template.duplicate();
    footprint.set_reference(&reference);
    if let Some(value) = &placement.value {
        footprint.set_value(value);
    }
    if let Some(name) = &placement.footprint {
        footprint.set_footprint_name(name);
    }
    footprint.position = placement.position;
    footprint.rotation = normalize_tenths(degrees_to_tenths(placement.rotation));
    match placement.layer.as_str() {
        "F.Cu" | "B.Cu" => footprint.set_side(&placement.layer),
        other => warn!("Ignoring placement layer {other} for {reference}; use F.Cu or B.Cu"),
    }

    debug!("Placing {} as {reference}", footprint.lib_id);
    let placed = board.add_footprint(footprint)?;
    Ok(ComponentInfo::of(placed))
}

fn find<'a>(board: &'a Board, reference: &str) -> CommandResult<&'a Footprint> {
    board
        .footprint(reference)
        .ok_or_else(|| CommandError::NotFound(format!("Could not find component: {reference}")))
}

fn find_mut<'a>(board: &'a mut Board, reference: &str) -> CommandResult<&'a mut Footprint> {
    board
        .footprint_mut(reference)
        .ok_or_else(|| CommandError::NotFound(format!("Could not find component: {reference}")))
}

fn duplicate(board: &mut Board, params: DuplicateComponent) -> CommandResult<Outcome> {
    let reference = required(params.reference, "reference")?;
    let new_reference = required(params.new_reference, "newReference")?;
    let source = find(board, &reference)?;
    if board.has_reference(&new_reference) {
        return Err(CommandError::AlreadyExists(format!(
            "A component with reference {new_reference} already exists"
        )));
    }

    let mut copy = source.duplicate();
    copy.set_reference(&new_reference);
    copy.position = match &params.position {
        Some(p) => p.to_point()?,
        None => source.position + Point::new(mm(DUPLICATE_OFFSET_X), 0),
    };
    if let Some(rotation) = params.rotation {
        copy.rotation = normalize_tenths(degrees_to_tenths(rotation));
    }
    let info = ComponentInfo::of(board.add_footprint(copy)?);
    Ok(Outcome::new(format!("Duplicated component {reference} to {new_reference}"))
        .with("component", info))
}

fn move_component(board: &mut Board, params: MoveComponent) -> CommandResult<Outcome> {
    let reference = required(params.reference, "reference")?;
    let position = required(params.position, "position")?.to_point()?;
    let footprint = find_mut(board, &reference)?;
    footprint.position = position;
    if let Some(rotation) = params.rotation {
        footprint.rotation = normalize_tenths(degrees_to_tenths(rotation));
    }
    Ok(Outcome::new(format!("Moved component: {reference}"))
        .with("component", ComponentInfo::of(footprint)))
}

fn rotate(board: &mut Board, params: RotateComponent) -> CommandResult<Outcome> {
    let reference = required(params.reference, "reference")?;
    let angle = required(params.angle, "angle")?;
    let footprint = find_mut(board, &reference)?;
    footprint.rotation = normalize_tenths(degrees_to_tenths(angle));
    Ok(Outcome::new(format!("Rotated component: {reference}")).with(
        "component",
        json!({
            "reference": reference,
            "rotation": tenths_to_degrees(footprint.rotation),
        }),
    ))
}

fn delete(board: &mut Board, params: ComponentRef) -> CommandResult<Outcome> {
    let reference = required(params.reference, "reference")?;
    board
        .remove_footprint(&reference)
        .ok_or_else(|| CommandError::NotFound(format!("Could not find component: {reference}")))?;
    Ok(Outcome::new(format!("Deleted component: {reference}")))
}

fn edit(board: &mut Board, params: EditComponent) -> CommandResult<Outcome> {
    let reference = required(params.reference, "reference")?;
    find(board, &reference)?;
    if let Some(new_reference) = &params.new_reference
        && *new_reference != reference
        && board.has_reference(new_reference)
    {
        return Err(CommandError::AlreadyExists(format!(
            "A component with reference {new_reference} already exists"
        )));
    }

    let footprint = find_mut(board, &reference)?;
    if let Some(new_reference) = &params.new_reference {
        footprint.set_reference(new_reference);
    }
    if let Some(value) = &params.value {
        footprint.set_value(value);
    }
    if let Some(name) = &params.footprint {
        footprint.set_footprint_name(name);
    }
    Ok(Outcome::new(format!("Updated component: {reference}")).with(
        "component",
        json!({
            "reference": footprint.reference(),
            "value": footprint.value(),
            "footprint": footprint.footprint_name(),
        }),
    ))
}

fn properties(board: &Board, params: ComponentRef) -> CommandResult<Outcome> {
    let reference = required(params.reference, "reference")?;
    let footprint = find(board, &reference)?;
    let fields: IndexMap<&str, &str> = footprint
        .properties
        .iter()
        .map(|p| (p.name.as_str(), p.value.as_str()))
        .collect();
    let mut component = serde_json::to_value(ComponentInfo::of(footprint)).unwrap_or_default();
    if let Some(obj) = component.as_object_mut() {
        obj.insert(
            "attributes".to_string(),
            json!({
                "smd": footprint.has_attribute("smd"),
                "throughHole": footprint.has_attribute("through_hole"),
                "virtual": footprint.has_attribute("virtual")
                    || footprint.has_attribute("board_only"),
                "excludeFromBom": footprint.has_attribute("exclude_from_bom"),
                "dnp": footprint.has_attribute("dnp"),
            }),
        );
        obj.insert("properties".to_string(), json!(fields));
        obj.insert("padCount".to_string(), json!(footprint.pads.len()));
        obj.insert("locked".to_string(), json!(footprint.locked));
    }
    Ok(Outcome::data().with("component", component))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    fn place(fixture: &mut Fixture, params: serde_json::Value) -> CommandResult<Outcome> {
        let params = crate::params::parse(params)?;
        PlacementEngine.execute(&mut fixture.ctx(), PlacementCommand::Place(params))
    }

    fn array(fixture: &mut Fixture, params: serde_json::Value) -> CommandResult<Outcome> {
        let params = crate::params::parse(params)?;
        PlacementEngine.execute(&mut fixture.ctx(), PlacementCommand::PlaceArray(params))
    }

    #[test]
    fn place_resolves_library_part() {
        let mut fixture = Fixture::default();
        let outcome = place(
            &mut fixture,
            json!({
                "componentId": "Resistor_SMD:R_0603_1608Metric",
                "position": {"x": 10, "y": 20, "unit": "mm"},
                "reference": "R1",
                "value": "10k",
                "rotation": 90
            }),
        )
        .unwrap();
        assert_eq!(
            outcome.message.as_deref(),
            Some("Placed component: Resistor_SMD:R_0603_1608Metric")
        );
        assert_eq!(outcome.get("component").unwrap()["rotation"], 90.0);

        let fp = fixture.board.footprint("R1").unwrap();
        assert_eq!(fp.position, Point::mm(10.0, 20.0));
        assert_eq!(fp.rotation, 900);
        assert_eq!(fp.value(), "10k");
        assert_eq!(fp.pads.len(), 2);
    }

    #[test]
    fn place_errors() {
        let mut fixture = Fixture::default();
        assert!(matches!(
            place(&mut fixture, json!({"position": {"x": 0, "y": 0}})),
            Err(CommandError::MissingParameter(p)) if p == "componentId"
        ));
        assert!(matches!(
            place(&mut fixture, json!({"componentId": "R_0603_1608Metric"})),
            Err(CommandError::MissingParameter(p)) if p == "position"
        ));
        assert!(matches!(
            place(
                &mut fixture,
                json!({"componentId": "Nope:Nothing", "position": {"x": 0, "y": 0}})
            ),
            Err(CommandError::NotFound(_))
        ));
        fixture.part("R1", 0.0, 0.0);
        assert!(matches!(
            place(
                &mut fixture,
                json!({"componentId": "R_0603_1608Metric",
                       "position": {"x": 0, "y": 0}, "reference": "R1"})
            ),
            Err(CommandError::AlreadyExists(_))
        ));
    }

    #[test]
    fn unnamed_parts_are_annotated() {
        let mut fixture = Fixture::default();
        let spot = json!({"x": 0, "y": 0});
        for id in ["LED_0805_2012Metric", "LED_0805_2012Metric", "R_0603_1608Metric"] {
            place(&mut fixture, json!({"componentId": id, "position": spot})).unwrap();
        }
        let refs: Vec<&str> = fixture.board.footprints.iter().map(|f| f.reference()).collect();
        assert_eq!(refs, vec!["D1", "D2", "U1"]);
    }

    #[test]
    fn back_side_placement_flips() {
        let mut fixture = Fixture::default();
        place(
            &mut fixture,
            json!({
                "componentId": "R_0603_1608Metric",
                "position": {"x": 0, "y": 0},
                "reference": "R9",
                "layer": "B.Cu"
            }),
        )
        .unwrap();
        let fp = fixture.board.footprint("R9").unwrap();
        assert!(fp.is_back());
        assert_eq!(fp.pads[0].layers[0], "B.Cu");
    }

    #[test]
    fn grid_array() {
        let mut fixture = Fixture::default();
        let outcome = array(
            &mut fixture,
            json!({
                "componentId": "R_0603_1608Metric",
                "pattern": "grid",
                "count": 6,
                "referencePrefix": "R",
                "startPosition": {"x": 10, "y": 10, "unit": "mm"},
                "rows": 2,
                "columns": 3,
                "spacingX": 5,
                "spacingY": 4
            }),
        )
        .unwrap();
        assert_eq!(outcome.get("components").unwrap().as_array().unwrap().len(), 6);
        assert_eq!(outcome.get("failed").unwrap(), &json!([]));
        for row in 0..2 {
            for col in 0..3 {
                let reference = format!("R{}", row * 3 + col + 1);
                let fp = fixture.board.footprint(&reference).unwrap();
                assert_eq!(
                    fp.position,
                    Point::mm(10.0 + 5.0 * f64::from(col), 10.0 + 4.0 * f64::from(row))
                );
            }
        }
    }

    #[test]
    fn grid_array_rejects_mismatched_count() {
        let mut fixture = Fixture::default();
        let err = array(
            &mut fixture,
            json!({
                "componentId": "R_0603_1608Metric",
                "count": 5,
                "startPosition": {"x": 0, "y": 0},
                "rows": 2,
                "columns": 3,
                "spacingX": 1,
                "spacingY": 1
            }),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::InvalidParameter(_)));
        assert!(fixture.board.footprints.is_empty());
    }

    #[test]
    fn circular_array_keeps_radius() {
        let mut fixture = Fixture::default();
        array(
            &mut fixture,
            json!({
                "componentId": "LED_0805_2012Metric",
                "pattern": "circular",
                "count": 4,
                "referencePrefix": "D",
                "center": {"x": 50, "y": 50},
                "radius": 12.5,
                "angleStep": 90,
                "rotationOffset": 90
            }),
        )
        .unwrap();
        let center = Point::mm(50.0, 50.0);
        for (i, fp) in fixture.board.footprints.iter().enumerate() {
            let d = pcb_board::geometry::distance(fp.position, center);
            assert!((d - mm(12.5) as f64).abs() <= 1e-6 * mm(12.5) as f64 + 1.0);
            assert_eq!(fp.rotation, normalize_tenths((i as i32) * 900 + 900));
        }
        assert_eq!(fixture.board.footprint("D2").unwrap().position, Point::mm(50.0, 62.5));
    }

    #[test]
    fn array_reports_cells_that_could_not_be_placed() {
        let mut fixture = Fixture::default();
        fixture.part("R2", 0.0, 0.0);
        let outcome = array(
            &mut fixture,
            json!({
                "componentId": "R_0603_1608Metric",
                "count": 3,
                "referencePrefix": "R",
                "startPosition": {"x": 0, "y": 10},
                "rows": 1,
                "columns": 3,
                "spacingX": 2,
                "spacingY": 2
            }),
        )
        .unwrap();
        assert_eq!(outcome.message.as_deref(), Some("Placed 2 of 3 components in grid pattern"));
        assert_eq!(outcome.get("failed").unwrap()[0]["reference"], "R2");
        assert_eq!(outcome.get("failed").unwrap()[0]["errorCode"], "ALREADY_EXISTS");
    }

    #[test]
    fn unknown_pattern_is_unsupported() {
        let mut fixture = Fixture::default();
        let err = array(
            &mut fixture,
            json!({"componentId": "R_0603_1608Metric", "count": 3, "pattern": "spiral"}),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::Unsupported(_)));
    }

    #[test]
    fn duplicate_offsets_by_default() {
        let mut fixture = Fixture::default();
        fixture.part("R1", 10.0, 10.0);
        fixture.board.footprint_mut("R1").unwrap().rotation = 450;
        let run = |fixture: &mut Fixture, params| {
            PlacementEngine.execute(
                &mut fixture.ctx(),
                PlacementCommand::Duplicate(crate::params::parse(params).unwrap()),
            )
        };
        run(&mut fixture, json!({"reference": "R1", "newReference": "R2"})).unwrap();
        let copy = fixture.board.footprint("R2").unwrap();
        assert_eq!(copy.position, Point::mm(15.0, 10.0));
        assert_eq!(copy.rotation, 450);
        assert_eq!(copy.value(), "10k");
        assert_eq!(copy.pads.len(), 2);

        assert!(matches!(
            run(&mut fixture, json!({"reference": "R1", "newReference": "R2"})),
            Err(CommandError::AlreadyExists(_))
        ));
        assert!(matches!(
            run(&mut fixture, json!({"reference": "R7", "newReference": "R8"})),
            Err(CommandError::NotFound(_))
        ));
    }

    #[test]
    fn edit_move_rotate_delete() {
        let mut fixture = Fixture::default();
        fixture.part("R1", 0.0, 0.0);
        fixture.part("R2", 5.0, 0.0);
        let mut run = |command| PlacementEngine.execute(&mut fixture.ctx(), command);

        run(PlacementCommand::Move(MoveComponent {
            reference: Some("R1".into()),
            position: Some(PointParam::mm(3.0, 4.0)),
            rotation: None,
        }))
        .unwrap();
        run(PlacementCommand::Rotate(RotateComponent {
            reference: Some("R1".into()),
            angle: Some(-90.0),
        }))
        .unwrap();
        assert!(matches!(
            run(PlacementCommand::Edit(EditComponent {
                reference: Some("R1".into()),
                new_reference: Some("R2".into()),
                ..Default::default()
            })),
            Err(CommandError::AlreadyExists(_))
        ));
        run(PlacementCommand::Edit(EditComponent {
            reference: Some("R1".into()),
            new_reference: Some("R3".into()),
            value: Some("4k7".into()),
            footprint: None,
        }))
        .unwrap();
        run(PlacementCommand::Delete(ComponentRef {
            reference: Some("R2".into()),
        }))
        .unwrap();
        assert!(matches!(
            run(PlacementCommand::Delete(ComponentRef {
                reference: Some("R2".into())
            })),
            Err(CommandError::NotFound(_))
        ));

        let fp = fixture.board.footprint("R3").unwrap();
        assert_eq!(fp.position, Point::mm(3.0, 4.0));
        assert_eq!(fp.rotation, 2700);
        assert_eq!(fp.value(), "4k7");
        assert_eq!(fixture.board.footprints.len(), 1);
    }

    #[test]
    fn properties_report_attributes() {
        let mut fixture = Fixture::default();
        fixture.part("R1", 1.0, 2.0);
        let outcome = PlacementEngine
            .execute(
                &mut fixture.ctx(),
                PlacementCommand::Properties(ComponentRef {
                    reference: Some("R1".into()),
                }),
            )
            .unwrap();
        let component = outcome.get("component").unwrap();
        assert_eq!(component["attributes"]["smd"], true);
        assert_eq!(component["properties"]["Value"], "10k");
        assert_eq!(component["position"], json!({"x": 1.0, "y": 2.0, "unit": "mm"}));
        assert_eq!(component["padCount"], 2);
    }
}
