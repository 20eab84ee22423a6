//! Reading and writing `.kicad_pcb` boards and `.kicad_mod` footprints.
//!
//! Items the model understands are converted to typed structures; anything
//! else is kept as raw S-expressions and written back in place, so a board
//! produced by KiCad survives a load/save cycle.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use log::debug;
use pcb_sexpr::{ListBuilder, Sexpr, format_tree, kv};

use crate::board::Board;
use crate::geometry::{self, Point};
use crate::items::{
    BoardText, Drawing, Footprint, Pad, Property, Shape, TitleBlock, Track, Via, ViaKind, Zone,
    ZoneFill, new_uuid,
};
use crate::layers::{LayerTable, LayerType};
use crate::project::{ProjectFile, project_path};
use crate::units::{degrees_to_tenths, mm, normalize_tenths, tenths_to_degrees, to_mm};

const GENERATOR: &str = "pcb-edit";
const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Footprint children written after the pads.
const FOOTPRINT_TAIL: &[&str] = &["model", "group", "embedded_fonts"];

/// Zone children mapped onto [`Zone`] fields.
const ZONE_FIELDS: &[&str] = &[
    "net",
    "net_name",
    "layer",
    "layers",
    "uuid",
    "tstamp",
    "hatch",
    "priority",
    "connect_pads",
    "min_thickness",
    "filled_areas_thickness",
    "fill",
    "polygon",
];

// Reading

/// Load a board and, when present, the rules stored in its `.kicad_pro`.
pub fn read_board(path: &Path) -> Result<Board> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read board file {}", path.display()))?;
    let mut board =
        parse_board(&text).with_context(|| format!("Failed to load {}", path.display()))?;
    let pro = project_path(path);
    if pro.exists() {
        ProjectFile::load(&pro)?.apply_to(&mut board);
    }
    board.file_name = Some(path.to_path_buf());
    debug!(
        "Loaded {} ({} footprints, {} tracks, {} nets)",
        path.display(),
        board.footprints.len(),
        board.tracks.len(),
        board.nets().len()
    );
    Ok(board)
}

pub fn parse_board(text: &str) -> Result<Board> {
    let root = pcb_sexpr::parse(text).context("Malformed S-expression")?;
    if !root.is_node("kicad_pcb") {
        bail!("Not a KiCad board: expected a (kicad_pcb ...) document");
    }

    let mut board = Board::new();
    for net in root.find_all("net") {
        if let (Some(code), Some(name)) = (
            net.arg(1).and_then(Sexpr::as_int),
            net.arg(2).and_then(Sexpr::as_atom),
        ) {
            board.insert_net(code as u32, name);
        }
    }

    for item in root.args() {
        match item.head() {
            Some("version") => {
                if let Some(v) = item.arg(1).and_then(Sexpr::as_int) {
                    board.version = v;
                }
            }
            Some("generator" | "generator_version" | "net") => {}
            Some("general") => {
                if let Some(t) = item.f64_of("thickness") {
                    board.thickness = mm(t);
                }
            }
            Some("paper") => {
                if let Some(p) = item.arg(1).and_then(Sexpr::as_atom) {
                    board.paper = p.to_string();
                }
            }
            Some("title_block") => board.title_block = parse_title_block(item),
            Some("layers") => board.layers = parse_layers(item),
            Some("setup") => board.setup = Some(item.clone()),
            Some("footprint" | "module") => board.footprints.push(footprint_from_sexpr(item)),
            Some("segment") => match parse_track(item, &board) {
                Some(track) => board.tracks.push(track),
                None => board.extra.push(item.clone()),
            },
            Some("via") => match parse_via(item, &board) {
                Some(via) => board.vias.push(via),
                None => board.extra.push(item.clone()),
            },
            Some("zone") => board.zones.push(parse_zone(item, &board)),
            Some("gr_line" | "gr_rect" | "gr_circle" | "gr_poly") => match parse_drawing(item) {
                Some(drawing) => board.drawings.push(drawing),
                None => board.extra.push(item.clone()),
            },
            Some("gr_text") => match parse_text(item) {
                Some(text) => board.texts.push(text),
                None => board.extra.push(item.clone()),
            },
            _ => board.extra.push(item.clone()),
        }
    }
    Ok(board)
}

/// Parse the contents of a `.kicad_mod` file.
pub fn parse_footprint_file(text: &str) -> Result<Footprint> {
    let root = pcb_sexpr::parse(text).context("Malformed S-expression")?;
    if !(root.is_node("footprint") || root.is_node("module")) {
        bail!("Not a KiCad footprint: expected a (footprint ...) document");
    }
    Ok(footprint_from_sexpr(&root))
}

pub fn read_footprint_file(path: &Path) -> Result<Footprint> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read footprint {}", path.display()))?;
    parse_footprint_file(&text).with_context(|| format!("Failed to load {}", path.display()))
}

fn point_of(node: &Sexpr) -> Option<Point> {
    Some(Point::mm(node.arg(1)?.as_f64()?, node.arg(2)?.as_f64()?))
}

fn child_point(node: &Sexpr, name: &str) -> Option<Point> {
    point_of(node.find(name)?)
}

/// Third number of `(at x y angle)`.
fn angle_of(node: &Sexpr) -> i32 {
    node.arg(3)
        .and_then(Sexpr::as_f64)
        .map_or(0, degrees_to_tenths)
}

fn length_of(node: &Sexpr, name: &str) -> Option<i64> {
    node.f64_of(name).map(mm)
}

fn uuid_of(node: &Sexpr) -> Option<String> {
    node.atom_of("uuid")
        .or_else(|| node.atom_of("tstamp"))
        .map(str::to_owned)
}

fn points_of(node: &Sexpr) -> Vec<Point> {
    node.find("pts")
        .map(|pts| pts.find_all("xy").filter_map(point_of).collect())
        .unwrap_or_default()
}

/// Net of an item, by `(net code)` or by `(net "name")`.
fn net_of(node: &Sexpr, board: &Board) -> Option<String> {
    let net = node.find("net")?;
    let name = match net.arg(1)? {
        Sexpr::Int(code) => board.net_by_code(*code as u32)?.name.clone(),
        other => other.as_atom()?.to_string(),
    };
    (!name.is_empty()).then_some(name)
}

fn stroke_width(node: &Sexpr) -> i64 {
    node.find("stroke")
        .and_then(|s| length_of(s, "width"))
        .or_else(|| length_of(node, "width"))
        .unwrap_or(0)
}

fn parse_title_block(node: &Sexpr) -> TitleBlock {
    let text = |name: &str| node.atom_of(name).unwrap_or_default().to_string();
    TitleBlock {
        title: text("title"),
        date: text("date"),
        rev: text("rev"),
        company: text("company"),
        comments: node
            .find_all("comment")
            .filter_map(|c| {
                let n = c.arg(1)?.as_int()?;
                Some((n as u32, c.arg(2)?.as_atom()?.to_string()))
            })
            .collect(),
    }
}

fn parse_layers(node: &Sexpr) -> LayerTable {
    let mut table = LayerTable::default();
    for entry in node.args() {
        let Some(items) = entry.as_list() else {
            continue;
        };
        let (Some(id), Some(name)) = (
            items.first().and_then(Sexpr::as_int),
            items.get(1).and_then(Sexpr::as_atom),
        ) else {
            continue;
        };
        let kind = items
            .get(2)
            .and_then(Sexpr::as_atom)
            .and_then(|k| k.parse().ok())
            .unwrap_or(LayerType::User);
        table.enable(id as u32, name, kind);
        if let Some(user_name) = items.get(3).and_then(Sexpr::as_atom) {
            table.set_user_name(id as u32, user_name);
        }
    }
    table
}

/// Convert a `(footprint ...)` node, from a board or a library file.
pub fn footprint_from_sexpr(node: &Sexpr) -> Footprint {
    let lib_id = node.arg(1).and_then(Sexpr::as_atom).unwrap_or_default();
    let mut fp = Footprint::new(lib_id);
    let mut pads = Vec::new();

    for item in node.args().iter().skip(1) {
        if let Some(sym) = item.as_sym() {
            if sym == "locked" {
                fp.locked = true;
            }
            continue;
        }
        match item.head() {
            Some("version" | "generator" | "generator_version" | "tedit") => {}
            Some("layer") => {
                if let Some(layer) = item.arg(1).and_then(Sexpr::as_atom) {
                    fp.layer = layer.to_string();
                }
            }
            Some("uuid" | "tstamp") => {
                if let Some(uuid) = item.arg(1).and_then(Sexpr::as_atom) {
                    fp.uuid = uuid.to_string();
                }
            }
            Some("at") => {
                fp.position = point_of(item).unwrap_or_default();
                fp.rotation = angle_of(item);
            }
            Some("locked") => fp.locked = item.arg(1).and_then(Sexpr::as_atom) == Some("yes"),
            Some("property") => {
                if let Some(prop) = parse_property(item, 1) {
                    fp.properties.push(prop);
                }
            }
            Some("fp_text")
                if matches!(
                    item.arg(1).and_then(Sexpr::as_atom),
                    Some("reference" | "value")
                ) =>
            {
                if let Some(mut prop) = parse_property(item, 1) {
                    prop.name = if prop.name == "reference" {
                        "Reference".to_string()
                    } else {
                        "Value".to_string()
                    };
                    fp.properties.push(prop);
                }
            }
            Some("attr") => {
                fp.attributes = item
                    .args()
                    .iter()
                    .filter_map(Sexpr::as_atom)
                    .map(str::to_owned)
                    .collect();
            }
            Some("pad") => pads.push(item),
            _ => fp.extra.push(item.clone()),
        }
    }

    // Pad angles in files are absolute, so they wait for the footprint's own rotation.
    fp.pads = pads.into_iter().map(|p| parse_pad(p, fp.rotation)).collect();
    fp
}

fn parse_property(node: &Sexpr, first: usize) -> Option<Property> {
    let items = node.as_list()?;
    Some(Property {
        name: items.get(first)?.as_atom()?.to_string(),
        value: items.get(first + 1)?.as_atom()?.to_string(),
        attrs: items.get(first + 2..).map(<[Sexpr]>::to_vec).unwrap_or_default(),
    })
}

fn parse_pad(node: &Sexpr, footprint_rotation: i32) -> Pad {
    let atom = |i: usize| {
        node.arg(i)
            .and_then(Sexpr::as_atom)
            .unwrap_or_default()
            .to_string()
    };
    let mut pad = Pad {
        number: atom(1),
        kind: atom(2),
        shape: atom(3),
        offset: Point::default(),
        rotation: 0,
        size: (0, 0),
        drill: None,
        layers: Vec::new(),
        net: None,
        uuid: None,
        extra: Vec::new(),
    };
    for item in node.args().iter().skip(3) {
        match item.head() {
            Some("at") => {
                pad.offset = point_of(item).unwrap_or_default();
                pad.rotation = normalize_tenths(angle_of(item) - footprint_rotation);
            }
            Some("size") => {
                if let Some(p) = point_of(item) {
                    pad.size = (p.x, p.y);
                }
            }
            Some("drill") if matches!(item.args(), [d] if d.as_f64().is_some()) => {
                pad.drill = item.arg(1).and_then(Sexpr::as_f64).map(mm);
            }
            Some("layers") => {
                pad.layers = item
                    .args()
                    .iter()
                    .filter_map(Sexpr::as_atom)
                    .map(str::to_owned)
                    .collect();
            }
            Some("net") => {
                let name = match item.arg(1) {
                    Some(Sexpr::Int(_)) => item.arg(2).and_then(Sexpr::as_atom),
                    Some(other) => other.as_atom(),
                    None => None,
                };
                pad.net = name.filter(|n| !n.is_empty()).map(str::to_owned);
            }
            Some("uuid" | "tstamp") => {
                pad.uuid = item.arg(1).and_then(Sexpr::as_atom).map(str::to_owned);
            }
            _ => pad.extra.push(item.clone()),
        }
    }
    pad
}

fn parse_track(node: &Sexpr, board: &Board) -> Option<Track> {
    Some(Track {
        uuid: uuid_of(node).unwrap_or_else(new_uuid),
        start: child_point(node, "start")?,
        end: child_point(node, "end")?,
        width: length_of(node, "width").unwrap_or_else(|| board.track_width()),
        layer: node.atom_of("layer")?.to_string(),
        net: net_of(node, board),
    })
}

fn parse_via(node: &Sexpr, board: &Board) -> Option<Via> {
    let layers = node.find("layers")?;
    let kind = node
        .args()
        .iter()
        .find_map(|a| match a.as_sym() {
            Some("blind") => Some(ViaKind::Blind),
            Some("micro") => Some(ViaKind::Micro),
            _ => None,
        })
        .unwrap_or_default();
    Some(Via {
        uuid: uuid_of(node).unwrap_or_else(new_uuid),
        position: child_point(node, "at")?,
        size: length_of(node, "size")?,
        drill: length_of(node, "drill")?,
        from_layer: layers.arg(1)?.as_atom()?.to_string(),
        to_layer: layers.arg(2)?.as_atom()?.to_string(),
        kind,
        net: net_of(node, board),
    })
}

fn parse_zone(node: &Sexpr, board: &Board) -> Zone {
    let net = net_of(node, board).or_else(|| {
        node.atom_of("net_name")
            .filter(|n| !n.is_empty())
            .map(str::to_owned)
    });
    let layer = node
        .atom_of("layer")
        .or_else(|| node.find("layers").and_then(|l| l.arg(1)?.as_atom()))
        .unwrap_or("F.Cu")
        .to_string();
    let fill = match node.find("fill").and_then(|f| f.atom_of("mode")) {
        Some("hatch") => ZoneFill::Hatched,
        _ => ZoneFill::Solid,
    };
    Zone {
        uuid: uuid_of(node).unwrap_or_else(new_uuid),
        layer,
        net,
        outline: node.find("polygon").map(points_of).unwrap_or_default(),
        clearance: node
            .find("connect_pads")
            .and_then(|c| length_of(c, "clearance"))
            .unwrap_or(0),
        min_width: length_of(node, "min_thickness").unwrap_or(0),
        priority: node
            .value_of("priority")
            .and_then(Sexpr::as_int)
            .map_or(0, |p| p as u32),
        fill,
        extra: node
            .args()
            .iter()
            .filter(|c| !c.head().is_some_and(|h| ZONE_FIELDS.contains(&h)))
            .cloned()
            .collect(),
    }
}

fn parse_drawing(node: &Sexpr) -> Option<Drawing> {
    let shape = match node.head()? {
        "gr_line" => Shape::Line {
            start: child_point(node, "start")?,
            end: child_point(node, "end")?,
        },
        "gr_rect" => Shape::Rect {
            start: child_point(node, "start")?,
            end: child_point(node, "end")?,
        },
        "gr_circle" => {
            let center = child_point(node, "center")?;
            let end = child_point(node, "end")?;
            Shape::Circle {
                center,
                radius: geometry::distance(center, end).round() as i64,
            }
        }
        "gr_poly" => Shape::Polygon {
            points: points_of(node),
        },
        _ => return None,
    };
    Some(Drawing {
        uuid: uuid_of(node).unwrap_or_else(new_uuid),
        shape,
        layer: node.atom_of("layer")?.to_string(),
        width: stroke_width(node),
        filled: matches!(node.atom_of("fill"), Some("solid" | "yes")),
    })
}

fn parse_text(node: &Sexpr) -> Option<BoardText> {
    let at = node.find("at")?;
    let font = node.find("effects").and_then(|e| e.find("font"));
    Some(BoardText {
        uuid: uuid_of(node).unwrap_or_else(new_uuid),
        text: node.arg(1)?.as_atom()?.to_string(),
        position: point_of(at)?,
        rotation: angle_of(at),
        layer: node.atom_of("layer")?.to_string(),
        size: font
            .and_then(|f| f.find("size"))
            .and_then(|s| s.arg(1)?.as_f64())
            .map_or(mm(1.0), mm),
        thickness: font
            .and_then(|f| length_of(f, "thickness"))
            .unwrap_or(mm(0.15)),
    })
}

// Writing

/// Write the board atomically and record its rules in the sibling `.kicad_pro`.
pub fn write_board(board: &Board, path: &Path) -> Result<()> {
    let text = format_board(board);
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| {
            f.write_all(text.as_bytes())?;
            f.flush()
        })
        .map_err(|err| anyhow::anyhow!("Failed to write {}: {err}", path.display()))?;

    let pro = project_path(path);
    let mut project = ProjectFile::load_or_default(&pro)?;
    project.update_from(board);
    if project.meta.filename.is_empty()
        && let Some(name) = pro.file_name()
    {
        project.meta.filename = name.to_string_lossy().into_owned();
    }
    project.save(&pro)?;
    debug!("Saved {}", path.display());
    Ok(())
}

pub fn format_board(board: &Board) -> String {
    format_tree(&board_to_sexpr(board))
}

fn len(iu: i64) -> Sexpr {
    Sexpr::float(to_mm(iu))
}

fn xy_node(name: &str, p: Point) -> Sexpr {
    Sexpr::node(name, [len(p.x), len(p.y)])
}

/// `(at x y [angle])`, omitting a zero angle.
fn at_node(p: Point, rotation: i32) -> Sexpr {
    let mut b = ListBuilder::node("at");
    b.push(len(p.x))
        .push(len(p.y))
        .push_if(rotation != 0, tenths_to_degrees(rotation));
    b.build()
}

fn layer_node(layer: &str) -> Sexpr {
    kv("layer", Sexpr::string(layer))
}

fn uuid_node(uuid: &str) -> Sexpr {
    kv("uuid", Sexpr::string(uuid))
}

fn net_code(board: &Board, net: Option<&str>) -> i64 {
    net.and_then(|n| board.net(n))
        .map_or(0, |n| i64::from(n.code))
}

fn stroke_node(width: i64) -> Sexpr {
    Sexpr::node("stroke", [kv("width", len(width)), kv("type", "default")])
}

fn pts_node(points: &[Point]) -> Sexpr {
    Sexpr::node("pts", points.iter().map(|p| xy_node("xy", *p)))
}

pub fn board_to_sexpr(board: &Board) -> Sexpr {
    let mut b = ListBuilder::node("kicad_pcb");
    b.push(kv("version", board.version))
        .push(kv("generator", Sexpr::string(GENERATOR)))
        .push(kv("generator_version", Sexpr::string(GENERATOR_VERSION)))
        .push(Sexpr::node(
            "general",
            [kv("thickness", len(board.thickness)), kv("legacy_teardrops", false)],
        ))
        .push(kv("paper", Sexpr::string(&board.paper)))
        .push_opt(title_block_to_sexpr(&board.title_block))
        .push(layers_to_sexpr(&board.layers))
        .push(board.setup.clone().unwrap_or_else(|| {
            Sexpr::node("setup", [kv("pad_to_mask_clearance", 0)])
        }));
    for net in board.nets() {
        b.push(Sexpr::node(
            "net",
            [Sexpr::int(i64::from(net.code)), Sexpr::string(&net.name)],
        ));
    }
    b.extend(board.footprints.iter().map(|fp| footprint_to_sexpr(fp, board)))
        .extend(board.drawings.iter().map(drawing_to_sexpr))
        .extend(board.texts.iter().map(text_to_sexpr))
        .extend(board.tracks.iter().map(|t| track_to_sexpr(t, board)))
        .extend(board.vias.iter().map(|v| via_to_sexpr(v, board)))
        .extend(board.zones.iter().map(|z| zone_to_sexpr(z, board)))
        .extend(board.extra.iter().cloned());
    b.build()
}

fn title_block_to_sexpr(tb: &TitleBlock) -> Option<Sexpr> {
    let mut b = ListBuilder::node("title_block");
    let mut any = false;
    for (name, value) in [
        ("title", &tb.title),
        ("date", &tb.date),
        ("rev", &tb.rev),
        ("company", &tb.company),
    ] {
        if !value.is_empty() {
            b.push(kv(name, Sexpr::string(value)));
            any = true;
        }
    }
    for (n, text) in &tb.comments {
        b.push(Sexpr::node("comment", [Sexpr::int(i64::from(*n)), Sexpr::string(text)]));
        any = true;
    }
    any.then(|| b.build())
}

fn layers_to_sexpr(layers: &LayerTable) -> Sexpr {
    Sexpr::node(
        "layers",
        layers.iter().map(|l| {
            let mut items = vec![
                Sexpr::int(i64::from(l.id)),
                Sexpr::string(&l.name),
                Sexpr::symbol(l.kind.as_str()),
            ];
            if let Some(user_name) = &l.user_name {
                items.push(Sexpr::string(user_name));
            }
            Sexpr::list(items)
        }),
    )
}

pub fn footprint_to_sexpr(fp: &Footprint, board: &Board) -> Sexpr {
    let mut b = ListBuilder::node("footprint");
    b.push(Sexpr::string(&fp.lib_id))
        .push_if(fp.locked, kv("locked", true))
        .push(layer_node(&fp.layer))
        .push(uuid_node(&fp.uuid))
        .push(at_node(fp.position, fp.rotation));
    for prop in &fp.properties {
        b.push(Sexpr::node(
            "property",
            [Sexpr::string(&prop.name), Sexpr::string(&prop.value)]
                .into_iter()
                .chain(prop.attrs.iter().cloned()),
        ));
    }
    if !fp.attributes.is_empty() {
        b.push(Sexpr::node(
            "attr",
            fp.attributes.iter().map(|a| Sexpr::symbol(a.as_str())),
        ));
    }
    let (tail, body): (Vec<&Sexpr>, Vec<&Sexpr>) = fp
        .extra
        .iter()
        .partition(|e| e.head().is_some_and(|h| FOOTPRINT_TAIL.contains(&h)));
    b.extend(body.into_iter().cloned())
        .extend(fp.pads.iter().map(|p| pad_to_sexpr(p, fp.rotation, board)))
        .extend(tail.into_iter().cloned());
    b.build()
}

fn pad_to_sexpr(pad: &Pad, footprint_rotation: i32, board: &Board) -> Sexpr {
    let mut b = ListBuilder::node("pad");
    b.push(Sexpr::string(&pad.number))
        .push(pad.kind.as_str())
        .push(pad.shape.as_str())
        .push(at_node(
            pad.offset,
            normalize_tenths(pad.rotation + footprint_rotation),
        ))
        .push(Sexpr::node("size", [len(pad.size.0), len(pad.size.1)]))
        .push_opt(pad.drill.map(|d| kv("drill", len(d))))
        .push(Sexpr::node(
            "layers",
            pad.layers.iter().map(|l| Sexpr::string(l.as_str())),
        ))
        .extend(pad.extra.iter().cloned());
    if let Some(net) = &pad.net {
        b.push(Sexpr::node(
            "net",
            [Sexpr::int(net_code(board, Some(net.as_str()))), Sexpr::string(net)],
        ));
    }
    b.push_opt(pad.uuid.as_deref().map(uuid_node));
    b.build()
}

fn track_to_sexpr(track: &Track, board: &Board) -> Sexpr {
    Sexpr::node(
        "segment",
        [
            xy_node("start", track.start),
            xy_node("end", track.end),
            kv("width", len(track.width)),
            layer_node(&track.layer),
            kv("net", net_code(board, track.net.as_deref())),
            uuid_node(&track.uuid),
        ],
    )
}

fn via_to_sexpr(via: &Via, board: &Board) -> Sexpr {
    let mut b = ListBuilder::node("via");
    match via.kind {
        ViaKind::Through => {}
        ViaKind::Blind => {
            b.push("blind");
        }
        ViaKind::Micro => {
            b.push("micro");
        }
    }
    b.push(at_node(via.position, 0))
        .push(kv("size", len(via.size)))
        .push(kv("drill", len(via.drill)))
        .push(Sexpr::node(
            "layers",
            [
                Sexpr::string(&via.from_layer),
                Sexpr::string(&via.to_layer),
            ],
        ))
        .push(kv("net", net_code(board, via.net.as_deref())))
        .push(uuid_node(&via.uuid));
    b.build()
}

fn zone_to_sexpr(zone: &Zone, board: &Board) -> Sexpr {
    let net = zone.net.as_deref();
    let is_filled = zone.extra.iter().any(|e| e.is_node("filled_polygon"));
    let mut fill = ListBuilder::node("fill");
    fill.push_if(is_filled, "yes")
        .push(kv("thermal_gap", len(zone.clearance)))
        .push(kv("thermal_bridge_width", len(zone.min_width.max(mm(0.5)))));
    if zone.fill == ZoneFill::Hatched {
        fill.push(kv("mode", "hatch"))
            .push(kv("hatch_thickness", len(zone.min_width.max(mm(0.5)))))
            .push(kv("hatch_gap", len(mm(1.0))))
            .push(kv("hatch_orientation", 0));
    }

    let mut b = ListBuilder::node("zone");
    b.push(kv("net", net_code(board, net)))
        .push(kv("net_name", Sexpr::string(net.unwrap_or_default())))
        .push(layer_node(&zone.layer))
        .push(uuid_node(&zone.uuid))
        .push(Sexpr::node("hatch", [Sexpr::symbol("edge"), len(mm(0.5))]))
        .push_if(zone.priority > 0, kv("priority", zone.priority))
        .push(Sexpr::node(
            "connect_pads",
            [kv("clearance", len(zone.clearance))],
        ))
        .push(kv("min_thickness", len(zone.min_width)))
        .push(kv("filled_areas_thickness", false))
        .push(fill.build())
        .push(Sexpr::node("polygon", [pts_node(&zone.outline)]))
        .extend(zone.extra.iter().cloned());
    b.build()
}

fn drawing_to_sexpr(drawing: &Drawing) -> Sexpr {
    let fill = || kv("fill", if drawing.filled { "solid" } else { "none" });
    let (tag, mut items) = match &drawing.shape {
        Shape::Line { start, end } => (
            "gr_line",
            vec![xy_node("start", *start), xy_node("end", *end)],
        ),
        Shape::Rect { start, end } => (
            "gr_rect",
            vec![xy_node("start", *start), xy_node("end", *end)],
        ),
        Shape::Circle { center, radius } => (
            "gr_circle",
            vec![
                xy_node("center", *center),
                xy_node("end", Point::new(center.x + radius, center.y)),
            ],
        ),
        Shape::Polygon { points } => ("gr_poly", vec![pts_node(points)]),
    };
    items.push(stroke_node(drawing.width));
    if !matches!(drawing.shape, Shape::Line { .. }) {
        items.push(fill());
    }
    items.push(layer_node(&drawing.layer));
    items.push(uuid_node(&drawing.uuid));
    Sexpr::node(tag, items)
}

fn text_to_sexpr(text: &BoardText) -> Sexpr {
    let mut effects = ListBuilder::node("effects");
    effects.push(Sexpr::node(
        "font",
        [
            Sexpr::node("size", [len(text.size), len(text.size)]),
            kv("thickness", len(text.thickness)),
        ],
    ));
    if text.layer.starts_with("B.") {
        effects.push(kv("justify", "mirror"));
    }
    Sexpr::node(
        "gr_text",
        [
            Sexpr::string(&text.text),
            at_node(text.position, text.rotation),
            layer_node(&text.layer),
            uuid_node(&text.uuid),
            effects.build(),
        ],
    )
}
