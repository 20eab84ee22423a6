//! Copper: traces, vias, differential pairs, pours, and the nets and net
//! classes they belong to.

use log::{debug, warn};
use pcb_board::geometry::{distance_to_segment, is_simple_polygon};
use pcb_board::items::new_uuid;
use pcb_board::layers::is_copper;
use pcb_board::units::{mm, to_mm};
use pcb_board::{Board, Point, Track, Via, ViaKind, Zone, ZoneFill};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::engine::Engine;
use crate::error::{CommandError, CommandResult, KernelResultExt, required};
use crate::params::{Endpoint, PointParam, Position};
use crate::response::Outcome;
use crate::session::SessionContext;

/// A position-based delete only takes a track closer than this.
const DELETE_RADIUS_MM: f64 = 1.0;
const DEFAULT_DIFF_PAIR_GAP_MM: f64 = 0.2;
const DEFAULT_POUR_MIN_WIDTH_MM: f64 = 0.2;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNet {
    pub name: Option<String>,
    #[serde(alias = "netClass")]
    pub class: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTrace {
    pub start: Option<Endpoint>,
    pub end: Option<Endpoint>,
    pub layer: Option<String>,
    pub width: Option<f64>,
    pub net: Option<String>,
    #[serde(default)]
    pub via: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVia {
    pub position: Option<PointParam>,
    pub size: Option<f64>,
    pub drill: Option<f64>,
    pub net: Option<String>,
    #[serde(alias = "from_layer")]
    pub from_layer: Option<String>,
    #[serde(alias = "to_layer")]
    pub to_layer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTrace {
    #[serde(alias = "traceUuid")]
    pub trace_id: Option<String>,
    pub position: Option<PointParam>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNetClass {
    pub name: Option<String>,
    pub clearance: Option<f64>,
    pub track_width: Option<f64>,
    pub via_diameter: Option<f64>,
    pub via_drill: Option<f64>,
    #[serde(alias = "microViaDiameter")]
    pub uvia_diameter: Option<f64>,
    #[serde(alias = "microViaDrill")]
    pub uvia_drill: Option<f64>,
    pub diff_pair_width: Option<f64>,
    pub diff_pair_gap: Option<f64>,
    #[serde(default)]
    pub nets: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCopperPour {
    pub layer: Option<String>,
    pub net: Option<String>,
    pub clearance: Option<f64>,
    pub min_width: Option<f64>,
    #[serde(default)]
    pub points: Vec<PointParam>,
    #[serde(default)]
    pub priority: u32,
    pub fill_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDifferentialPair {
    pub start_pos: Option<Endpoint>,
    pub end_pos: Option<Endpoint>,
    pub net_pos: Option<String>,
    pub net_neg: Option<String>,
    pub layer: Option<String>,
    pub width: Option<f64>,
    pub gap: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum RoutingCommand {
    AddNet(AddNet),
    RouteTrace(RouteTrace),
    AddVia(AddVia),
    DeleteTrace(DeleteTrace),
    NetsList,
    CreateNetClass(CreateNetClass),
    AddCopperPour(AddCopperPour),
    RouteDifferentialPair(RouteDifferentialPair),
}

pub struct RoutingEngine;

impl Engine for RoutingEngine {
    type Command = RoutingCommand;

    fn execute(
        &self,
        ctx: &mut SessionContext<'_>,
        command: RoutingCommand,
    ) -> CommandResult<Outcome> {
        match command {
            RoutingCommand::AddNet(params) => add_net(ctx.board, params),
            RoutingCommand::RouteTrace(params) => route_trace(ctx.board, params),
            RoutingCommand::AddVia(params) => {
                let via = add_via(ctx.board, params)?;
                Ok(Outcome::new("Added via").with("via", via))
            }
            RoutingCommand::DeleteTrace(params) => delete_trace(ctx.board, params),
            RoutingCommand::NetsList => Ok(Outcome::data().with("nets", ctx.board.nets())),
            RoutingCommand::CreateNetClass(params) => create_net_class(ctx.board, params),
            RoutingCommand::AddCopperPour(params) => add_copper_pour(ctx, params),
            RoutingCommand::RouteDifferentialPair(params) => route_diff_pair(ctx.board, params),
        }
    }
}

/// Canonical name of an enabled copper layer.
fn copper_layer(board: &Board, name: &str) -> CommandResult<String> {
    match board.resolve_layer(name) {
        Some(layer) if is_copper(layer.id) => Ok(layer.name.clone()),
        Some(_) => Err(CommandError::InvalidParameter(format!(
            "Layer '{name}' is not a copper layer"
        ))),
        None => Err(CommandError::InvalidParameter(format!(
            "Layer '{name}' does not exist"
        ))),
    }
}

/// Nets are only attached when they already exist on the board.
fn known_net(board: &Board, net: Option<&str>, item: &str) -> Option<String> {
    let name = net?;
    if board.net(name).is_some() {
        Some(name.to_string())
    } else {
        warn!("Net {name} does not exist; adding {item} without a net");
        None
    }
}

fn add_net(board: &mut Board, params: AddNet) -> CommandResult<Outcome> {
    let name = required(params.name, "name")?;
    let code = board.ensure_net(&name).code;
    if let Some(class) = &params.class
        && !board.assign_net_class(&name, class)
    {
        warn!("Net class {class} does not exist; {name} keeps its class");
    }
    let class = board.net(&name).map(|n| n.class.clone()).unwrap_or_default();
    Ok(Outcome::new(format!("Added net: {name}")).with(
        "net",
        json!({"name": name, "class": class, "netcode": code}),
    ))
}

fn track_json(track: &Track) -> Value {
    json!({
        "uuid": track.uuid,
        "start": Position::from(track.start),
        "end": Position::from(track.end),
        "layer": track.layer,
        "width": to_mm(track.width),
        "net": track.net,
    })
}

fn route_trace(board: &mut Board, params: RouteTrace) -> CommandResult<Outcome> {
    let start = required(params.start.as_ref(), "start")?.resolve(board)?;
    let end = required(params.end.as_ref(), "end")?.resolve(board)?;
    let layer = copper_layer(board, params.layer.as_deref().unwrap_or("F.Cu"))?;
    if start == end {
        return Err(CommandError::InvalidParameter(
            "Trace start and end must be different points".to_string(),
        ));
    }

    let track = Track {
        uuid: new_uuid(),
        start,
        end,
        width: params.width.map_or_else(|| board.track_width(), mm),
        layer,
        net: known_net(board, params.net.as_deref(), "trace"),
    };
    let mut trace = track_json(&track);

    // The via is the only step that can fail, so it goes first.
    if params.via
        && let Some(net) = params.net
    {
        let via = add_via(
            board,
            AddVia {
                position: Some(PointParam::mm(to_mm(end.x), to_mm(end.y))),
                net: Some(net),
                ..Default::default()
            },
        )?;
        trace["via"] = via;
    }
    board.tracks.push(track);
    Ok(Outcome::new("Added trace").with("trace", trace))
}

fn add_via(board: &mut Board, params: AddVia) -> CommandResult<Value> {
    let position = required(params.position, "position")?.to_point()?;
    let from_layer = copper_layer(board, params.from_layer.as_deref().unwrap_or("F.Cu"))?;
    let to_layer = copper_layer(board, params.to_layer.as_deref().unwrap_or("B.Cu"))?;
    if from_layer == to_layer {
        return Err(CommandError::InvalidParameter(format!(
            "A via must connect two different layers, got {from_layer} twice"
        )));
    }
    let (default_size, default_drill) = board.via_dimensions();
    let kind = match (from_layer.as_str(), to_layer.as_str()) {
        ("F.Cu", "B.Cu") | ("B.Cu", "F.Cu") => ViaKind::Through,
        _ => ViaKind::Blind,
    };

    let via = Via {
        uuid: new_uuid(),
        position,
        size: params.size.map_or(default_size, mm),
        drill: params.drill.map_or(default_drill, mm),
        from_layer,
        to_layer,
        kind,
        net: known_net(board, params.net.as_deref(), "via"),
    };
    let report = json!({
        "uuid": via.uuid,
        "position": Position::from(via.position),
        "size": to_mm(via.size),
        "drill": to_mm(via.drill),
        "fromLayer": via.from_layer,
        "toLayer": via.to_layer,
        "type": via.kind,
        "net": via.net,
    });
    board.vias.push(via);
    Ok(report)
}

/// Index of the track nearest to `point`, if one lies within `radius`.
/// Ties go to the earliest track.
pub fn nearest_track(tracks: &[Track], point: Point, radius: i64) -> Option<usize> {
    tracks
        .iter()
        .enumerate()
        .map(|(i, t)| (i, distance_to_segment(point, t.start, t.end)))
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            Some((_, best_d)) if best_d <= d => best,
            _ => Some((i, d)),
        })
        .filter(|(_, d)| *d < radius as f64)
        .map(|(i, _)| i)
}

fn delete_trace(board: &mut Board, params: DeleteTrace) -> CommandResult<Outcome> {
    match (params.trace_id, params.position) {
        (Some(id), None) => {
            board.remove_track(&id).ok_or_else(|| {
                CommandError::NotFound(format!("Could not find track with id: {id}"))
            })?;
            Ok(Outcome::new(format!("Deleted track: {id}")))
        }
        (None, Some(position)) => {
            let point = position.to_point()?;
            let radius = mm(DELETE_RADIUS_MM);
            let idx = nearest_track(&board.tracks, point, radius).ok_or_else(|| {
                CommandError::NotFound("No track found near specified position".to_string())
            })?;
            let track = board.tracks.remove(idx);
            debug!("Deleted track {} nearest to {point:?}", track.uuid);
            Ok(Outcome::new("Deleted track at specified position")
                .with("trace", track_json(&track)))
        }
        _ => Err(CommandError::MissingParameter(
            "exactly one of traceId or position".to_string(),
        )),
    }
}

fn create_net_class(board: &mut Board, params: CreateNetClass) -> CommandResult<Outcome> {
    let name = required(params.name, "name")?;
    let class = board.upsert_net_class(&name);
    let updates = [
        (params.clearance, &mut class.clearance),
        (params.track_width, &mut class.track_width),
        (params.via_diameter, &mut class.via_diameter),
        (params.via_drill, &mut class.via_drill),
        (params.uvia_diameter, &mut class.uvia_diameter),
        (params.uvia_drill, &mut class.uvia_drill),
        (params.diff_pair_width, &mut class.diff_pair_width),
        (params.diff_pair_gap, &mut class.diff_pair_gap),
    ];
    for (value, field) in updates {
        if let Some(value) = value {
            *field = mm(value);
        }
    }

    let mut unknown = Vec::new();
    for net in &params.nets {
        if !board.assign_net_class(net, &name) {
            warn!("Net {net} does not exist; not assigned to {name}");
            unknown.push(net.clone());
        }
    }

    let class = board
        .net_class(&name)
        .ok_or_else(|| CommandError::NotFound(format!("Net class {name} vanished")))?;
    Ok(Outcome::new(format!("Created net class: {name}"))
        .with(
            "netClass",
            json!({
                "name": class.name,
                "clearance": to_mm(class.clearance),
                "trackWidth": to_mm(class.track_width),
                "viaDiameter": to_mm(class.via_diameter),
                "viaDrill": to_mm(class.via_drill),
                "uviaDiameter": to_mm(class.uvia_diameter),
                "uviaDrill": to_mm(class.uvia_drill),
                "diffPairWidth": to_mm(class.diff_pair_width),
                "diffPairGap": to_mm(class.diff_pair_gap),
                "nets": board.nets_in_class(&name),
            }),
        )
        .with("unknownNets", unknown))
}

fn add_copper_pour(ctx: &mut SessionContext<'_>, params: AddCopperPour) -> CommandResult<Outcome> {
    if params.points.len() < 3 {
        return Err(CommandError::InvalidParameter(format!(
            "At least 3 points are required for a copper pour outline, got {}",
            params.points.len()
        )));
    }
    let board = &mut *ctx.board;
    let layer = copper_layer(board, params.layer.as_deref().unwrap_or("F.Cu"))?;
    let fill: ZoneFill = params
        .fill_type
        .as_deref()
        .unwrap_or("solid")
        .parse()
        .map_err(CommandError::InvalidParameter)?;
    let outline = params
        .points
        .iter()
        .map(PointParam::to_point)
        .collect::<CommandResult<Vec<_>>>()?;
    if !is_simple_polygon(&outline) {
        return Err(CommandError::InvalidParameter(
            "Copper pour outline must be a simple polygon".to_string(),
        ));
    }

    let zone = Zone {
        uuid: new_uuid(),
        layer,
        net: known_net(board, params.net.as_deref(), "copper pour"),
        outline,
        clearance: params
            .clearance
            .map_or_else(|| board.default_net_class().clearance, mm),
        min_width: mm(params.min_width.unwrap_or(DEFAULT_POUR_MIN_WIDTH_MM)),
        priority: params.priority,
        fill,
        extra: Vec::new(),
    };
    let pour = json!({
        "uuid": zone.uuid,
        "layer": zone.layer,
        "net": zone.net,
        "clearance": to_mm(zone.clearance),
        "minWidth": to_mm(zone.min_width),
        "priority": zone.priority,
        "fillType": zone.fill,
        "pointCount": zone.outline.len(),
    });
    board.add_zone(zone);
    ctx.kernel
        .fill_zones(board)
        .or_internal("Failed to fill copper pour")?;
    Ok(Outcome::new("Added copper pour").with("pour", pour))
}

/// Offset of each rail from the centreline: the unit normal `(-d.y, d.x)`
/// scaled by half the gap.
pub fn diff_pair_offset(start: Point, end: Point, gap: i64) -> Option<Point> {
    let (dx, dy) = ((end.x - start.x) as f64, (end.y - start.y) as f64);
    let length = dx.hypot(dy);
    if length == 0.0 {
        return None;
    }
    let (px, py) = (-dy / length, dx / length);
    let half = gap as f64 / 2.0;
    Some(Point::new((px * half).round() as i64, (py * half).round() as i64))
}

fn route_diff_pair(board: &mut Board, params: RouteDifferentialPair) -> CommandResult<Outcome> {
    let start = required(params.start_pos.as_ref(), "startPos")?;
    let end = required(params.end_pos.as_ref(), "endPos")?;
    let net_pos = required(params.net_pos, "netPos")?;
    let net_neg = required(params.net_neg, "netNeg")?;
    let layer = copper_layer(board, params.layer.as_deref().unwrap_or("F.Cu"))?;
    for net in [&net_pos, &net_neg] {
        if board.net(net).is_none() {
            return Err(CommandError::NotFound(format!("Net {net} does not exist")));
        }
    }
    let start = start.resolve(board)?;
    let end = end.resolve(board)?;

    let gap_mm = params.gap.unwrap_or(DEFAULT_DIFF_PAIR_GAP_MM);
    let offset = diff_pair_offset(start, end, mm(gap_mm)).ok_or_else(|| {
        CommandError::InvalidParameter("Start and end points must be different".to_string())
    })?;
    let width = params.width.map_or_else(|| board.track_width(), mm);
    let rail = |from: Point, to: Point, net: &str| Track {
        uuid: new_uuid(),
        start: from,
        end: to,
        width,
        layer: layer.clone(),
        net: Some(net.to_string()),
    };
    let positive = rail(start + offset, end + offset, &net_pos);
    let negative = rail(start - offset, end - offset, &net_neg);
    let length = positive.length();
    let tracks = vec![track_json(&positive), track_json(&negative)];
    board.tracks.push(positive);
    board.tracks.push(negative);

    Ok(Outcome::new("Added differential pair traces").with(
        "diffPair",
        json!({
            "posNet": net_pos,
            "negNet": net_neg,
            "layer": layer,
            "width": to_mm(width),
            "gap": gap_mm,
            "length": length / 1_000_000.0,
            "tracks": tracks,
        }),
    ))
}
