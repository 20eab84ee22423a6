//! Board items: footprints and their pads, copper (tracks, vias, zones),
//! graphics, nets and net classes.

use std::fmt;
use std::str::FromStr;

use pcb_sexpr::Sexpr;
use serde::Serialize;

use crate::geometry::{self, Point, Rect};
use crate::layers;
use crate::units::mm;

pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `(property "Name" "Value" ...)` on a footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: String,
    /// Placement and text effects (`at`, `layer`, `effects`, ...), kept verbatim.
    pub attrs: Vec<Sexpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pad {
    pub number: String,
    /// `smd`, `thru_hole`, `np_thru_hole` or `connect`.
    pub kind: String,
    /// `rect`, `roundrect`, `circle`, `oval`, `trapezoid` or `custom`.
    pub shape: String,
    /// Position in footprint coordinates (before footprint rotation).
    pub offset: Point,
    /// Orientation relative to the footprint.
    pub rotation: i32,
    pub size: (i64, i64),
    pub drill: Option<i64>,
    pub layers: Vec<String>,
    pub net: Option<String>,
    pub uuid: Option<String>,
    pub extra: Vec<Sexpr>,
}

impl Pad {
    pub fn smd(number: &str, offset: Point, size: (i64, i64)) -> Self {
        Self {
            number: number.to_string(),
            kind: "smd".to_string(),
            shape: "roundrect".to_string(),
            offset,
            rotation: 0,
            size,
            drill: None,
            layers: vec!["F.Cu".into(), "F.Paste".into(), "F.Mask".into()],
            net: None,
            uuid: Some(new_uuid()),
            extra: Vec::new(),
        }
    }

    /// Circular hole. Plated holes get a copper annulus of `pad_diameter`.
    pub fn hole(number: &str, drill: i64, pad_diameter: Option<i64>) -> Self {
        let (kind, size) = match pad_diameter {
            Some(d) => ("thru_hole", d),
            None => ("np_thru_hole", drill),
        };
        Self {
            number: number.to_string(),
            kind: kind.to_string(),
            shape: "circle".to_string(),
            offset: Point::default(),
            rotation: 0,
            size: (size, size),
            drill: Some(drill),
            layers: vec!["*.Cu".to_string(), "*.Mask".to_string()],
            net: None,
            uuid: Some(new_uuid()),
            extra: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    /// Library identifier, `Library:Name`.
    pub lib_id: String,
    pub uuid: String,
    pub position: Point,
    /// Tenths of a degree.
    pub rotation: i32,
    pub layer: String,
    pub locked: bool,
    pub properties: Vec<Property>,
    /// Tokens of `(attr ...)`, e.g. `smd`, `exclude_from_bom`, `dnp`.
    pub attributes: Vec<String>,
    pub pads: Vec<Pad>,
    /// Graphics, 3D models, descriptions and anything else carried verbatim.
    pub extra: Vec<Sexpr>,
}

impl Footprint {
    pub fn new(lib_id: &str) -> Self {
        Self {
            lib_id: lib_id.to_string(),
            uuid: new_uuid(),
            position: Point::default(),
            rotation: 0,
            layer: "F.Cu".to_string(),
            locked: false,
            properties: Vec::new(),
            attributes: Vec::new(),
            pads: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn set_property(&mut self, name: &str, value: &str) {
        if let Some(p) = self.properties.iter_mut().find(|p| p.name == name) {
            p.value = value.to_string();
            return;
        }
        let layer = match name {
            "Reference" => "F.SilkS",
            _ => "F.Fab",
        };
        let mut attrs = vec![
            Sexpr::node("at", [Sexpr::int(0), Sexpr::int(0), Sexpr::int(0)]),
            Sexpr::node("layer", [Sexpr::string(layer)]),
        ];
        if !matches!(name, "Reference" | "Value") {
            attrs.push(Sexpr::node("hide", [Sexpr::symbol("yes")]));
        }
        attrs.push(Sexpr::node(
            "effects",
            [Sexpr::node(
                "font",
                [
                    Sexpr::node("size", [Sexpr::int(1), Sexpr::int(1)]),
                    Sexpr::node("thickness", [Sexpr::float(0.15)]),
                ],
            )],
        ));
        self.properties.push(Property {
            name: name.to_string(),
            value: value.to_string(),
            attrs,
        });
    }

    pub fn reference(&self) -> &str {
        self.property("Reference").unwrap_or_default()
    }

    pub fn set_reference(&mut self, reference: &str) {
        self.set_property("Reference", reference);
    }

    pub fn value(&self) -> &str {
        self.property("Value").unwrap_or_default()
    }

    pub fn set_value(&mut self, value: &str) {
        self.set_property("Value", value);
    }

    /// Footprint name without the library prefix.
    pub fn footprint_name(&self) -> &str {
        self.lib_id
            .split_once(':')
            .map_or(self.lib_id.as_str(), |(_, name)| name)
    }

    pub fn set_footprint_name(&mut self, name: &str) {
        self.lib_id = match self.lib_id.split_once(':') {
            Some((lib, _)) if !name.contains(':') => format!("{lib}:{name}"),
            _ => name.to_string(),
        };
    }

    pub fn has_attribute(&self, attr: &str) -> bool {
        self.attributes.iter().any(|a| a == attr)
    }

    pub fn is_back(&self) -> bool {
        self.layer == "B.Cu"
    }

    pub fn pad(&self, number: &str) -> Option<&Pad> {
        self.pads.iter().find(|p| p.number == number)
    }

    /// Board position of a pad centre.
    pub fn pad_position(&self, number: &str) -> Option<Point> {
        let pad = self.pad(number)?;
        Some(self.position + geometry::rotate(pad.offset, self.rotation))
    }

    pub fn bounding_box(&self) -> Rect {
        let corners = self.pads.iter().flat_map(|pad| {
            let (hw, hh) = (pad.size.0 / 2, pad.size.1 / 2);
            [
                Point::new(pad.offset.x - hw, pad.offset.y - hh),
                Point::new(pad.offset.x + hw, pad.offset.y + hh),
            ]
        });
        let absolute = corners.map(|c| self.position + geometry::rotate(c, self.rotation));
        Rect::from_points(absolute)
            .unwrap_or_else(|| Rect::from_corners(self.position, self.position))
    }

    /// Move the footprint to the other board side when `layer` names the
    /// opposite copper layer. Layers are swapped and local geometry mirrored in X.
    pub fn set_side(&mut self, layer: &str) {
        let to_back = layer == "B.Cu";
        if layer != "F.Cu" && !to_back {
            return;
        }
        if to_back != self.is_back() {
            for pad in &mut self.pads {
                pad.offset.x = -pad.offset.x;
                pad.rotation = -pad.rotation;
                for l in &mut pad.layers {
                    if let Some(flipped) = layers::flipped_name(l) {
                        *l = flipped;
                    }
                }
            }
            for prop in &mut self.properties {
                for attr in &mut prop.attrs {
                    mirror_local_geometry(attr);
                }
            }
            for item in &mut self.extra {
                mirror_local_geometry(item);
            }
        }
        self.layer = layer.to_string();
    }

    /// Deep copy with new identifiers for the footprint and every pad.
    pub fn duplicate(&self) -> Footprint {
        let mut copy = self.clone();
        copy.uuid = new_uuid();
        for pad in &mut copy.pads {
            if pad.uuid.is_some() {
                pad.uuid = Some(new_uuid());
            }
        }
        for item in &mut copy.extra {
            item.visit_mut(&mut |node| {
                if node.is_node("uuid")
                    && let Some(items) = node.as_list_mut()
                {
                    items.truncate(1);
                    items.push(Sexpr::string(new_uuid()));
                }
            });
        }
        copy
    }
}

fn mirror_local_geometry(node: &mut Sexpr) {
    node.visit_mut(&mut |n| {
        let tag = n.head().map(str::to_owned);
        let Some(items) = n.as_list_mut() else {
            return;
        };
        match tag.as_deref() {
            Some("at" | "start" | "end" | "center" | "mid" | "xy") => {
                if let Some(x) = items.get(1).and_then(Sexpr::as_f64) {
                    items[1] = Sexpr::float(-x);
                }
            }
            Some("layer" | "layers") => {
                for item in items.iter_mut().skip(1) {
                    if let Some(flipped) = item.as_atom().and_then(layers::flipped_name) {
                        *item = Sexpr::string(flipped);
                    }
                }
            }
            _ => {}
        }
    });
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub uuid: String,
    pub start: Point,
    pub end: Point,
    pub width: i64,
    pub layer: String,
    pub net: Option<String>,
}

impl Track {
    pub fn length(&self) -> f64 {
        geometry::distance(self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViaKind {
    #[default]
    Through,
    Blind,
    Micro,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Via {
    pub uuid: String,
    pub position: Point,
    pub size: i64,
    pub drill: i64,
    pub from_layer: String,
    pub to_layer: String,
    pub kind: ViaKind,
    pub net: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneFill {
    #[default]
    Solid,
    Hatched,
}

impl FromStr for ZoneFill {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "solid" => Ok(ZoneFill::Solid),
            "hatched" | "hatch" => Ok(ZoneFill::Hatched),
            other => Err(format!("unknown fill type '{other}'")),
        }
    }
}

impl fmt::Display for ZoneFill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ZoneFill::Solid => "solid",
            ZoneFill::Hatched => "hatched",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub uuid: String,
    pub layer: String,
    pub net: Option<String>,
    pub outline: Vec<Point>,
    pub clearance: i64,
    pub min_width: i64,
    pub priority: u32,
    pub fill: ZoneFill,
    /// Previously computed fill polygons and other unmodelled children.
    pub extra: Vec<Sexpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Line { start: Point, end: Point },
    Rect { start: Point, end: Point },
    Circle { center: Point, radius: i64 },
    Polygon { points: Vec<Point> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub uuid: String,
    pub shape: Shape,
    pub layer: String,
    pub width: i64,
    pub filled: bool,
}

impl Drawing {
    pub fn new(shape: Shape, layer: &str, width: i64) -> Self {
        Self {
            uuid: new_uuid(),
            shape,
            layer: layer.to_string(),
            width,
            filled: false,
        }
    }

    pub fn bounding_box(&self) -> Rect {
        match &self.shape {
            Shape::Line { start, end } | Shape::Rect { start, end } => {
                Rect::from_corners(*start, *end)
            }
            Shape::Circle { center, radius } => Rect::from_corners(
                Point::new(center.x - radius, center.y - radius),
                Point::new(center.x + radius, center.y + radius),
            ),
            Shape::Polygon { points } => Rect::from_points(points.iter().copied())
                .unwrap_or_else(|| Rect::from_corners(Point::default(), Point::default())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardText {
    pub uuid: String,
    pub text: String,
    pub position: Point,
    pub rotation: i32,
    pub layer: String,
    pub size: i64,
    pub thickness: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Net {
    pub code: u32,
    pub name: String,
    /// Name of the net class this net belongs to.
    pub class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetClass {
    pub name: String,
    pub clearance: i64,
    pub track_width: i64,
    pub via_diameter: i64,
    pub via_drill: i64,
    pub uvia_diameter: i64,
    pub uvia_drill: i64,
    pub diff_pair_width: i64,
    pub diff_pair_gap: i64,
}

pub const DEFAULT_NET_CLASS: &str = "Default";

impl NetClass {
    /// KiCad's stock rule values.
    pub fn with_defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            clearance: mm(0.2),
            track_width: mm(0.25),
            via_diameter: mm(0.8),
            via_drill: mm(0.4),
            uvia_diameter: mm(0.3),
            uvia_drill: mm(0.1),
            diff_pair_width: mm(0.2),
            diff_pair_gap: mm(0.25),
        }
    }
}

/// Board-wide minimum constraints. The sizes used for new tracks and vias
/// live on the `Default` net class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignSettings {
    pub min_clearance: i64,
    pub min_track_width: i64,
    pub min_via_diameter: i64,
    pub min_via_drill: i64,
    pub min_uvia_diameter: i64,
    pub min_uvia_drill: i64,
    pub min_hole_diameter: i64,
    pub require_courtyard: bool,
    pub courtyard_clearance: i64,
}

impl Default for DesignSettings {
    fn default() -> Self {
        Self {
            min_clearance: mm(0.2),
            min_track_width: mm(0.2),
            min_via_diameter: mm(0.5),
            min_via_drill: mm(0.3),
            min_uvia_diameter: mm(0.2),
            min_uvia_drill: mm(0.1),
            min_hole_diameter: mm(0.3),
            require_courtyard: false,
            courtyard_clearance: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TitleBlock {
    pub title: String,
    pub date: String,
    pub rev: String,
    pub company: String,
    pub comments: Vec<(u32, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resistor() -> Footprint {
        let mut fp = Footprint::new("Resistor_SMD:R_0603_1608Metric");
        fp.set_reference("R1");
        fp.set_value("10k");
        fp.pads.push(Pad::smd("1", Point::mm(-0.8, 0.0), (mm(0.9), mm(0.95))));
        fp.pads.push(Pad::smd("2", Point::mm(0.8, 0.0), (mm(0.9), mm(0.95))));
        fp.position = Point::mm(10.0, 20.0);
        fp
    }

    #[test]
    fn properties() {
        let mut fp = resistor();
        assert_eq!(fp.reference(), "R1");
        assert_eq!(fp.value(), "10k");
        assert_eq!(fp.footprint_name(), "R_0603_1608Metric");
        fp.set_value("4k7");
        assert_eq!(fp.value(), "4k7");
        assert_eq!(fp.properties.len(), 2);
        fp.set_footprint_name("R_0805_2012Metric");
        assert_eq!(fp.lib_id, "Resistor_SMD:R_0805_2012Metric");
    }

    #[test]
    fn pad_positions_follow_rotation() {
        let mut fp = resistor();
        assert_eq!(fp.pad_position("2"), Some(Point::mm(10.8, 20.0)));
        fp.rotation = 900;
        assert_eq!(fp.pad_position("2"), Some(Point::mm(10.0, 19.2)));
        assert_eq!(fp.pad_position("3"), None);
    }

    #[test]
    fn flipping_to_back_mirrors_pads() {
        let mut fp = resistor();
        fp.set_side("B.Cu");
        assert!(fp.is_back());
        assert_eq!(fp.pads[0].offset, Point::mm(0.8, 0.0));
        assert_eq!(fp.pads[0].layers, vec!["B.Cu", "B.Paste", "B.Mask"]);
        let silk = fp.properties[0].attrs.iter().find(|a| a.is_node("layer")).unwrap();
        assert_eq!(silk.arg(1).and_then(Sexpr::as_atom), Some("B.SilkS"));

        fp.set_side("B.Cu");
        assert_eq!(fp.pads[0].offset, Point::mm(0.8, 0.0));
        fp.set_side("Dwgs.User");
        assert_eq!(fp.layer, "B.Cu");
    }

    #[test]
    fn duplicate_gets_new_ids() {
        let fp = resistor();
        let copy = fp.duplicate();
        assert_ne!(copy.uuid, fp.uuid);
        assert_ne!(copy.pads[0].uuid, fp.pads[0].uuid);
        assert_eq!(copy.pads[0].offset, fp.pads[0].offset);
        assert_eq!(copy.value(), "10k");
    }

    #[test]
    fn footprint_bounding_box() {
        let fp = resistor();
        let bbox = fp.bounding_box();
        assert_eq!(bbox.left, mm(10.0 - 0.8 - 0.45));
        assert_eq!(bbox.right, mm(10.0 + 0.8 + 0.45));
    }
}
