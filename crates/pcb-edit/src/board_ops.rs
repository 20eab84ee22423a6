//! Board-level editing: outline, layers, text, mounting holes, and the
//! summary views.

use log::{debug, warn};
use pcb_board::geometry::is_simple_polygon;
use pcb_board::items::{BoardText, Pad, Shape, new_uuid};
use pcb_board::layers::{LayerType, is_copper, standard_layer};
use pcb_board::units::{
    degrees_to_tenths, mm, normalize_tenths, tenths_to_degrees, to_internal, to_mm,
};
use pcb_board::{Board, Drawing, Footprint, LengthUnit, PlotRequest, Point};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::engine::Engine;
use crate::error::{CommandError, CommandResult, KernelResultExt, required};
use crate::export::plot_layers;
use crate::params::{PointParam, Position};
use crate::response::Outcome;
use crate::session::SessionContext;

const OUTLINE_WIDTH_MM: f64 = 0.1;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSize {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardOutline {
    pub shape: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub center: Option<PointParam>,
    pub radius: Option<f64>,
    #[serde(default)]
    pub points: Vec<PointParam>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLayer {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLayer {
    pub layer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountingHole {
    pub position: Option<PointParam>,
    pub diameter: Option<f64>,
    pub pad_diameter: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddText {
    pub text: Option<String>,
    pub position: Option<PointParam>,
    pub layer: Option<String>,
    pub size: Option<f64>,
    pub thickness: Option<f64>,
    pub rotation: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub format: Option<String>,
    #[serde(default)]
    pub layers: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum BoardCommand {
    SetSize(BoardSize),
    AddOutline(BoardOutline),
    AddLayer(AddLayer),
    SetActiveLayer(ActiveLayer),
    LayerList,
    Info,
    AddMountingHole(MountingHole),
    AddText(AddText),
    View(BoardView),
}

pub struct BoardEngine;

impl Engine for BoardEngine {
    type Command = BoardCommand;

    fn execute(
        &self,
        ctx: &mut SessionContext<'_>,
        command: BoardCommand,
    ) -> CommandResult<Outcome> {
        match command {
            BoardCommand::SetSize(params) => set_board_size(ctx.board, params),
            BoardCommand::AddOutline(params) => add_board_outline(ctx.board, params),
            BoardCommand::AddLayer(params) => add_layer(ctx.board, params),
            BoardCommand::SetActiveLayer(params) => {
                let name = required(params.layer, "layer")?;
                let layer = ctx.board.resolve_layer(&name).ok_or_else(|| {
                    CommandError::InvalidParameter(format!("Layer '{name}' does not exist"))
                })?;
                let canonical = layer.name.clone();
                ctx.board.active_layer = canonical.clone();
                let id = layer_id(ctx.board, &canonical);
                Ok(Outcome::new(format!("Set active layer to {canonical}"))
                    .with("layer", json!({"name": canonical, "id": id})))
            }
            BoardCommand::LayerList => Ok(Outcome::data().with("layers", layer_list(ctx.board))),
            BoardCommand::Info => Ok(Outcome::data().with("board", board_info(ctx.board))),
            BoardCommand::AddMountingHole(params) => add_mounting_hole(ctx.board, params),
            BoardCommand::AddText(params) => add_text(ctx.board, params),
            BoardCommand::View(params) => board_view(ctx, params),
        }
    }
}

fn unit(name: Option<&str>) -> CommandResult<LengthUnit> {
    Ok(name.map(str::parse::<LengthUnit>).transpose()?.unwrap_or_default())
}

fn positive(value: f64, name: &str) -> CommandResult<f64> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(CommandError::InvalidParameter(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

fn edge(shape: Shape) -> Drawing {
    Drawing::new(shape, "Edge.Cuts", mm(OUTLINE_WIDTH_MM))
}

fn layer_id(board: &Board, name: &str) -> Option<u32> {
    board.resolve_layer(name).map(|l| l.id)
}

fn size_json(board: &Board) -> Value {
    let (width, height) = board
        .outline()
        .map(Drawing::bounding_box)
        .reduce(|a, b| a.union(b))
        .map_or((0.0, 0.0), |r| (to_mm(r.width()), to_mm(r.height())));
    json!({"width": width, "height": height, "unit": "mm"})
}

fn set_board_size(board: &mut Board, params: BoardSize) -> CommandResult<Outcome> {
    let (Some(width), Some(height)) = (params.width, params.height) else {
        return Err(CommandError::missing("width and height"));
    };
    let width = positive(width, "width")?;
    let height = positive(height, "height")?;
    let unit = unit(params.unit.as_deref())?;

    let origin = board
        .outline()
        .map(Drawing::bounding_box)
        .reduce(|a, b| a.union(b))
        .map_or_else(Point::default, |r| r.top_left());
    let end = origin + Point::new(to_internal(width, unit), to_internal(height, unit));
    board.set_outline(vec![edge(Shape::Rect { start: origin, end })]);
    debug!("Board outline now spans {origin:?} to {end:?}");

    Ok(
        Outcome::new(format!("Set board size to {width}x{height} {}", unit.as_str()))
            .with("size", json!({"width": width, "height": height, "unit": unit.as_str()})),
    )
}

fn add_board_outline(board: &mut Board, params: BoardOutline) -> CommandResult<Outcome> {
    let shape = required(params.shape, "shape")?;
    let unit = unit(params.unit.as_deref())?;
    let length = |value: f64| to_internal(value, unit);

    let drawing = match shape.as_str() {
        "rectangle" | "rect" => {
            let (Some(width), Some(height)) = (params.width, params.height) else {
                return Err(CommandError::missing("width and height"));
            };
            let start = Point::new(
                length(params.x.unwrap_or(0.0)),
                length(params.y.unwrap_or(0.0)),
            );
            let end = start
                + Point::new(
                    length(positive(width, "width")?),
                    length(positive(height, "height")?),
                );
            edge(Shape::Rect { start, end })
        }
        "circle" => {
            let center = required(params.center, "center")?.to_point()?;
            let radius = positive(required(params.radius, "radius")?, "radius")?;
            edge(Shape::Circle {
                center,
                radius: length(radius),
            })
        }
        "polygon" => {
            if params.points.len() < 3 {
                return Err(CommandError::InvalidParameter(
                    "A polygon outline needs at least 3 points".to_string(),
                ));
            }
            let points = params
                .points
                .iter()
                .map(PointParam::to_point)
                .collect::<CommandResult<Vec<_>>>()?;
            if !is_simple_polygon(&points) {
                return Err(CommandError::InvalidParameter(
                    "Board outline must not intersect itself".to_string(),
                ));
            }
            edge(Shape::Polygon { points })
        }
        other => {
            return Err(CommandError::InvalidParameter(format!(
                "Outline shape must be 'rectangle', 'circle', or 'polygon', got '{other}'"
            )));
        }
    };

    board.set_outline(vec![drawing]);
    Ok(Outcome::new(format!("Added board outline: {shape}"))
        .with("outline", json!({"shape": shape, "size": size_json(board)})))
}

fn add_layer(board: &mut Board, params: AddLayer) -> CommandResult<Outcome> {
    let name = required(params.name, "name")?;
    let (id, canonical) = standard_layer(&name).ok_or_else(|| {
        CommandError::InvalidParameter(format!("'{name}' is not a KiCad layer name"))
    })?;
    let kind = match params.kind.as_deref() {
        Some(kind) => kind.parse::<LayerType>().map_err(CommandError::InvalidParameter)?,
        None if is_copper(id) => LayerType::Signal,
        None => LayerType::User,
    };
    if !is_copper(id) && kind != LayerType::User {
        warn!("Layer {canonical} is not copper; storing type {kind} anyway");
    }
    board.layers.enable(id, &canonical, kind);
    Ok(Outcome::new(format!("Added layer: {canonical}"))
        .with("layer", json!({"name": canonical, "type": kind, "id": id})))
}

fn layer_list(board: &Board) -> Vec<Value> {
    board
        .layers
        .iter()
        .map(|l| {
            json!({
                "name": l.name,
                "type": l.kind,
                "id": l.id,
                "isCopper": is_copper(l.id),
                "userName": l.user_name,
            })
        })
        .collect()
}

fn board_info(board: &Board) -> Value {
    json!({
        "filename": board.file_name,
        "size": size_json(board),
        "layers": layer_list(board),
        "title": board.title_block.title,
        "activeLayer": board.active_layer,
        "thickness": to_mm(board.thickness),
        "counts": {
            "footprints": board.footprints.len(),
            "tracks": board.tracks.len(),
            "vias": board.vias.len(),
            "zones": board.zones.len(),
            "nets": board.nets().len().saturating_sub(1),
        },
    })
}

fn add_mounting_hole(board: &mut Board, params: MountingHole) -> CommandResult<Outcome> {
    let position = required(params.position, "position")?.to_point()?;
    let diameter = positive(required(params.diameter, "diameter")?, "diameter")?;
    let pad_diameter = params
        .pad_diameter
        .map(|d| positive(d, "padDiameter"))
        .transpose()?;
    if let Some(pad) = pad_diameter
        && pad <= diameter
    {
        return Err(CommandError::InvalidParameter(format!(
            "padDiameter ({pad}) must exceed the hole diameter ({diameter})"
        )));
    }

    let reference = board.next_reference("H");
    let mut hole = Footprint::new(&format!("MountingHole:MountingHole_{diameter}mm"));
    hole.set_reference(&reference);
    hole.set_value("MountingHole");
    hole.position = position;
    hole.attributes = vec!["exclude_from_pos_files".into(), "exclude_from_bom".into()];
    hole.pads.push(Pad::hole(
        if pad_diameter.is_some() { "1" } else { "" },
        mm(diameter),
        pad_diameter.map(mm),
    ));
    board.add_footprint(hole)?;

    Ok(Outcome::new(format!("Added mounting hole {reference}")).with(
        "mountingHole",
        json!({
            "reference": reference,
            "position": Position::from(position),
            "diameter": diameter,
            "padDiameter": pad_diameter,
            "plated": pad_diameter.is_some(),
        }),
    ))
}

fn add_text(board: &mut Board, params: AddText) -> CommandResult<Outcome> {
    let text = required(params.text, "text")?;
    let position = required(params.position, "position")?.to_point()?;
    let layer_name = params.layer.as_deref().unwrap_or("F.SilkS");
    let layer = board
        .resolve_layer(layer_name)
        .map(|l| l.name.clone())
        .ok_or_else(|| {
            CommandError::InvalidParameter(format!("Layer '{layer_name}' does not exist"))
        })?;
    let size = positive(params.size.unwrap_or(1.0), "size")?;
    let thickness = positive(params.thickness.unwrap_or(0.15), "thickness")?;
    let rotation = normalize_tenths(degrees_to_tenths(params.rotation.unwrap_or(0.0)));

    let item = BoardText {
        uuid: new_uuid(),
        text,
        position,
        rotation,
        layer,
        size: mm(size),
        thickness: mm(thickness),
    };
    let report = json!({
        "uuid": item.uuid,
        "text": item.text,
        "position": Position::from(item.position),
        "layer": item.layer,
        "size": size,
        "thickness": thickness,
        "rotation": tenths_to_degrees(item.rotation),
    });
    board.texts.push(item);
    Ok(Outcome::new("Added text").with("text", report))
}

fn board_view(ctx: &mut SessionContext<'_>, params: BoardView) -> CommandResult<Outcome> {
    let format = params.format.unwrap_or_else(|| "svg".to_string()).to_ascii_lowercase();
    if format != "svg" {
        return Err(CommandError::Unsupported(format!(
            "Board view format {format} is not supported; use svg"
        )));
    }
    let layers = plot_layers(ctx.board, &params.layers)?;
    let svg = tempfile::tempdir()
        .map_err(anyhow::Error::from)
        .and_then(|dir| {
            let output = dir.path().join("view.svg");
            let request = PlotRequest::Svg {
                output: output.clone(),
                layers,
                black_and_white: false,
            };
            ctx.kernel.plot(ctx.board, &request)?;
            Ok(std::fs::read_to_string(&output)?)
        })
        .or_internal("Failed to render board view")?;
    Ok(Outcome::data()
        .with("imageData", svg)
        .with("format", "svg"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    fn run(fixture: &mut Fixture, command: BoardCommand) -> CommandResult<Outcome> {
        BoardEngine.execute(&mut fixture.ctx(), command)
    }

    fn parse<T: serde::de::DeserializeOwned>(value: Value) -> T {
        crate::params::parse(value).unwrap()
    }

    #[test]
    fn board_size_keeps_outline_origin() {
        let mut fixture = Fixture::default();
        run(
            &mut fixture,
            BoardCommand::AddOutline(parse(json!({
                "shape": "rectangle", "x": 10, "y": 20, "width": 30, "height": 40
            }))),
        )
        .unwrap();
        let outcome = run(
            &mut fixture,
            BoardCommand::SetSize(parse(json!({"width": 2, "height": 1, "unit": "inch"}))),
        )
        .unwrap();
        assert_eq!(outcome.message.as_deref(), Some("Set board size to 2x1 inch"));

        let outline: Vec<_> = fixture.board.outline().collect();
        assert_eq!(outline.len(), 1);
        assert_eq!(
            outline[0].shape,
            Shape::Rect {
                start: Point::mm(10.0, 20.0),
                end: Point::mm(10.0 + 50.8, 20.0 + 25.4),
            }
        );
    }

    #[test]
    fn board_size_requires_both_dimensions() {
        let mut fixture = Fixture::default();
        assert!(matches!(
            run(&mut fixture, BoardCommand::SetSize(parse(json!({"width": 20})))),
            Err(CommandError::MissingParameter(_))
        ));
        assert!(matches!(
            run(&mut fixture, BoardCommand::SetSize(parse(json!({"width": 20, "height": -1})))),
            Err(CommandError::InvalidParameter(_))
        ));
    }

    #[test]
    fn outlines() {
        let mut fixture = Fixture::default();
        let outcome = run(
            &mut fixture,
            BoardCommand::AddOutline(parse(json!({
                "shape": "circle", "center": {"x": 25, "y": 25}, "radius": 20
            }))),
        )
        .unwrap();
        assert_eq!(outcome.get("outline").unwrap()["size"]["width"], 40.0);

        run(
            &mut fixture,
            BoardCommand::AddOutline(parse(json!({
                "shape": "polygon",
                "points": [{"x": 0, "y": 0}, {"x": 30, "y": 0}, {"x": 15, "y": 20}]
            }))),
        )
        .unwrap();
        let outline: Vec<_> = fixture.board.outline().collect();
        assert!(matches!(
            &outline[..],
            [d] if matches!(&d.shape, Shape::Polygon { points } if points.len() == 3)
        ));

        assert!(matches!(
            run(&mut fixture, BoardCommand::AddOutline(parse(json!({"shape": "hexagon"})))),
            Err(CommandError::InvalidParameter(_))
        ));
        assert!(matches!(
            run(
                &mut fixture,
                BoardCommand::AddOutline(parse(json!({"shape": "circle", "radius": 3})))
            ),
            Err(CommandError::MissingParameter(p)) if p == "center"
        ));
    }

    #[test]
    fn layers() {
        let mut fixture = Fixture::default();
        let outcome = run(
            &mut fixture,
            BoardCommand::AddLayer(parse(json!({"name": "In1.Cu", "type": "power"}))),
        )
        .unwrap();
        assert_eq!(outcome.get("layer").unwrap()["id"], 1);
        assert_eq!(fixture.board.layers.copper_count(), 3);
        assert!(fixture.board.is_copper_layer("In1.Cu"));

        assert!(matches!(
            run(&mut fixture, BoardCommand::AddLayer(parse(json!({"name": "Top"})))),
            Err(CommandError::InvalidParameter(_))
        ));

        run(
            &mut fixture,
            BoardCommand::SetActiveLayer(parse(json!({"layer": "F.Silkscreen"}))),
        )
        .unwrap();
        assert_eq!(fixture.board.active_layer, "F.SilkS");
        assert!(matches!(
            run(&mut fixture, BoardCommand::SetActiveLayer(parse(json!({"layer": "In2.Cu"})))),
            Err(CommandError::InvalidParameter(_))
        ));

        let list = run(&mut fixture, BoardCommand::LayerList).unwrap();
        let inner = &list.get("layers").unwrap()[1];
        assert_eq!(inner["name"], "In1.Cu");
        assert_eq!(inner["type"], "power");
    }

    #[test]
    fn info_reports_size_and_counts() {
        let mut fixture = Fixture::default();
        fixture.part("R1", 1.0, 1.0);
        let size = parse(json!({"width": 50, "height": 40}));
        run(&mut fixture, BoardCommand::SetSize(size)).unwrap();
        let info = run(&mut fixture, BoardCommand::Info).unwrap();
        let board = info.get("board").unwrap();
        assert_eq!(board["size"], json!({"width": 50.0, "height": 40.0, "unit": "mm"}));
        assert_eq!(board["activeLayer"], "F.Cu");
        assert_eq!(board["counts"]["footprints"], 1);
    }

    #[test]
    fn mounting_holes_are_numbered() {
        let mut fixture = Fixture::default();
        let first = run(
            &mut fixture,
            BoardCommand::AddMountingHole(parse(json!({
                "position": {"x": 3, "y": 3}, "diameter": 3.2
            }))),
        )
        .unwrap();
        let second = run(
            &mut fixture,
            BoardCommand::AddMountingHole(parse(json!({
                "position": {"x": 47, "y": 3}, "diameter": 3.2, "padDiameter": 6
            }))),
        )
        .unwrap();
        assert_eq!(first.get("mountingHole").unwrap()["reference"], "H1");
        assert_eq!(second.get("mountingHole").unwrap()["reference"], "H2");

        let h1 = fixture.board.footprint("H1").unwrap();
        assert_eq!(h1.pads[0].kind, "np_thru_hole");
        assert_eq!(h1.pads[0].drill, Some(mm(3.2)));
        let h2 = fixture.board.footprint("H2").unwrap();
        assert_eq!(h2.pads[0].kind, "thru_hole");
        assert_eq!(h2.pads[0].size, (mm(6.0), mm(6.0)));

        assert!(matches!(
            run(
                &mut fixture,
                BoardCommand::AddMountingHole(parse(json!({
                    "position": {"x": 0, "y": 0}, "diameter": 3.2, "padDiameter": 3
                })))
            ),
            Err(CommandError::InvalidParameter(_))
        ));
    }

    #[test]
    fn text_defaults() {
        let mut fixture = Fixture::default();
        run(
            &mut fixture,
            BoardCommand::AddText(parse(json!({
                "text": "REV A", "position": {"x": 5, "y": 5}, "rotation": -90
            }))),
        )
        .unwrap();
        let text = &fixture.board.texts[0];
        assert_eq!(text.layer, "F.SilkS");
        assert_eq!(text.size, mm(1.0));
        assert_eq!(text.thickness, mm(0.15));
        assert_eq!(text.rotation, 2700);

        assert!(matches!(
            run(
                &mut fixture,
                BoardCommand::AddText(parse(json!({
                    "text": "x", "position": {"x": 0, "y": 0}, "layer": "In5.Cu"
                })))
            ),
            Err(CommandError::InvalidParameter(_))
        ));
    }

    #[test]
    fn view_is_svg_only() {
        let mut fixture = Fixture::default();
        let view = run(&mut fixture, BoardCommand::View(BoardView::default())).unwrap();
        assert!(view.get("imageData").unwrap().as_str().unwrap().starts_with("<svg"));
        assert!(matches!(
            run(&mut fixture, BoardCommand::View(parse(json!({"format": "png"})))),
            Err(CommandError::Unsupported(_))
        ));
    }
}
