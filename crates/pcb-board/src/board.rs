use std::path::PathBuf;

use pcb_sexpr::Sexpr;
use thiserror::Error;

use crate::geometry::{Point, Rect};
use crate::items::{
    BoardText, DEFAULT_NET_CLASS, DesignSettings, Drawing, Footprint, Net, NetClass, TitleBlock,
    Track, Via, Zone,
};
use crate::layers::{self, Layer, LayerTable};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("Reference '{0}' is already used on this board")]
    DuplicateReference(String),
}

/// An open PCB document.
#[derive(Debug, Clone)]
pub struct Board {
    /// Path of the `.kicad_pcb` file this board was loaded from or last saved to.
    pub file_name: Option<PathBuf>,
    pub version: i64,
    pub thickness: i64,
    pub paper: String,
    pub title_block: TitleBlock,
    pub layers: LayerTable,
    pub design: DesignSettings,
    pub active_layer: String,
    pub footprints: Vec<Footprint>,
    pub tracks: Vec<Track>,
    pub vias: Vec<Via>,
    pub zones: Vec<Zone>,
    pub drawings: Vec<Drawing>,
    pub texts: Vec<BoardText>,
    /// `(setup ...)` block, carried verbatim.
    pub setup: Option<Sexpr>,
    /// Top-level items this model does not interpret, in file order.
    pub extra: Vec<Sexpr>,
    /// Zones were edited since their fill was last computed.
    pub zones_need_refill: bool,
    nets: Vec<Net>,
    default_class: NetClass,
    net_classes: Vec<NetClass>,
}

pub const FILE_FORMAT_VERSION: i64 = 20240108;

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Empty two-layer board with KiCad's default rules.
    pub fn new() -> Self {
        Self {
            file_name: None,
            version: FILE_FORMAT_VERSION,
            thickness: crate::units::mm(1.6),
            paper: "A4".to_string(),
            title_block: TitleBlock::default(),
            layers: LayerTable::two_layer(),
            design: DesignSettings::default(),
            active_layer: "F.Cu".to_string(),
            footprints: Vec::new(),
            tracks: Vec::new(),
            vias: Vec::new(),
            zones: Vec::new(),
            drawings: Vec::new(),
            texts: Vec::new(),
            setup: None,
            extra: Vec::new(),
            zones_need_refill: false,
            nets: vec![Net {
                code: 0,
                name: String::new(),
                class: DEFAULT_NET_CLASS.to_string(),
            }],
            default_class: NetClass::with_defaults(DEFAULT_NET_CLASS),
            net_classes: Vec::new(),
        }
    }

    pub fn resolve_layer(&self, name: &str) -> Option<&Layer> {
        self.layers.resolve(name)
    }

    // Footprints

    pub fn footprint(&self, reference: &str) -> Option<&Footprint> {
        self.footprints.iter().find(|f| f.reference() == reference)
    }

    pub fn footprint_mut(&mut self, reference: &str) -> Option<&mut Footprint> {
        self.footprints.iter_mut().find(|f| f.reference() == reference)
    }

    pub fn has_reference(&self, reference: &str) -> bool {
        self.footprint(reference).is_some()
    }

    /// Insert a footprint, refusing duplicate references.
    pub fn add_footprint(&mut self, footprint: Footprint) -> Result<&Footprint, BoardError> {
        let reference = footprint.reference();
        if !reference.is_empty() && self.has_reference(reference) {
            return Err(BoardError::DuplicateReference(reference.to_string()));
        }
        for pad in &footprint.pads {
            if let Some(net) = &pad.net {
                self.ensure_net(net);
            }
        }
        self.footprints.push(footprint);
        Ok(&self.footprints[self.footprints.len() - 1])
    }

    pub fn remove_footprint(&mut self, reference: &str) -> Option<Footprint> {
        let idx = self.footprints.iter().position(|f| f.reference() == reference)?;
        Some(self.footprints.remove(idx))
    }

    /// Board position of a pad, looked up by footprint reference and pad number.
    pub fn pad_position(&self, reference: &str, pad: &str) -> Option<Point> {
        self.footprint(reference)?.pad_position(pad)
    }

    /// Lowest free reference `prefix<n>`, n ≥ 1.
    pub fn next_reference(&self, prefix: &str) -> String {
        let used: std::collections::BTreeSet<u32> = self
            .footprints
            .iter()
            .filter_map(|f| f.reference().strip_prefix(prefix)?.parse().ok())
            .collect();
        let n = (1..).find(|n| !used.contains(n)).unwrap_or(1);
        format!("{prefix}{n}")
    }

    // Nets

    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    pub fn net(&self, name: &str) -> Option<&Net> {
        self.nets.iter().find(|n| n.name == name)
    }

    pub fn net_by_code(&self, code: u32) -> Option<&Net> {
        self.nets.iter().find(|n| n.code == code)
    }

    /// Find a net by name or create it with the next free code.
    pub fn ensure_net(&mut self, name: &str) -> &Net {
        if let Some(idx) = self.nets.iter().position(|n| n.name == name) {
            return &self.nets[idx];
        }
        let code = self.nets.iter().map(|n| n.code).max().map_or(0, |c| c + 1);
        self.nets.push(Net {
            code,
            name: name.to_string(),
            class: DEFAULT_NET_CLASS.to_string(),
        });
        &self.nets[self.nets.len() - 1]
    }

    /// Insert a net with a code from a file. Existing names keep their code.
    pub fn insert_net(&mut self, code: u32, name: &str) {
        if self.net(name).is_none() {
            self.nets.push(Net {
                code,
                name: name.to_string(),
                class: DEFAULT_NET_CLASS.to_string(),
            });
        }
    }

    /// Returns false when either the net or the class is unknown.
    pub fn assign_net_class(&mut self, net: &str, class: &str) -> bool {
        if self.net_class(class).is_none() {
            return false;
        }
        match self.nets.iter_mut().find(|n| n.name == net) {
            Some(n) => {
                n.class = class.to_string();
                true
            }
            None => false,
        }
    }

    // Net classes

    /// The `Default` class followed by every other class in creation order.
    pub fn net_classes(&self) -> impl Iterator<Item = &NetClass> {
        std::iter::once(&self.default_class).chain(self.net_classes.iter())
    }

    pub fn net_class(&self, name: &str) -> Option<&NetClass> {
        self.net_classes().find(|c| c.name == name)
    }

    /// The class used for nets without an explicit assignment.
    pub fn default_net_class(&self) -> &NetClass {
        &self.default_class
    }

    pub fn default_net_class_mut(&mut self) -> &mut NetClass {
        &mut self.default_class
    }

    /// Existing class of that name, or a new one seeded from the defaults.
    pub fn upsert_net_class(&mut self, name: &str) -> &mut NetClass {
        if name == DEFAULT_NET_CLASS {
            return &mut self.default_class;
        }
        if let Some(idx) = self.net_classes.iter().position(|c| c.name == name) {
            return &mut self.net_classes[idx];
        }
        let mut class = self.default_class.clone();
        class.name = name.to_string();
        self.net_classes.push(class);
        let last = self.net_classes.len() - 1;
        &mut self.net_classes[last]
    }

    pub fn nets_in_class(&self, class: &str) -> Vec<&str> {
        self.nets
            .iter()
            .filter(|n| n.code != 0 && n.class == class)
            .map(|n| n.name.as_str())
            .collect()
    }

    // Design rule defaults

    pub fn track_width(&self) -> i64 {
        self.default_net_class().track_width
    }

    pub fn via_dimensions(&self) -> (i64, i64) {
        let class = self.default_net_class();
        (class.via_diameter, class.via_drill)
    }

    // Copper

    pub fn remove_track(&mut self, uuid: &str) -> Option<Track> {
        let idx = self.tracks.iter().position(|t| t.uuid == uuid)?;
        Some(self.tracks.remove(idx))
    }

    pub fn add_zone(&mut self, zone: Zone) {
        self.zones.push(zone);
        self.zones_need_refill = true;
    }

    // Outline and extents

    pub fn outline(&self) -> impl Iterator<Item = &Drawing> {
        self.drawings.iter().filter(|d| d.layer == "Edge.Cuts")
    }

    /// Replace the Edge.Cuts outline with the given drawings.
    pub fn set_outline(&mut self, shapes: Vec<Drawing>) {
        self.drawings.retain(|d| d.layer != "Edge.Cuts");
        self.drawings.extend(shapes);
    }

    /// Extent of the Edge.Cuts outline, or of every item when no outline
    /// exists. `None` for an empty board.
    pub fn bounding_box(&self) -> Option<Rect> {
        let outline = self
            .outline()
            .map(Drawing::bounding_box)
            .reduce(Rect::union);
        if outline.is_some() {
            return outline;
        }
        let footprints = self.footprints.iter().map(Footprint::bounding_box);
        let tracks = self.tracks.iter().map(|t| Rect::from_corners(t.start, t.end));
        let vias = self.vias.iter().map(|v| {
            let r = v.size / 2;
            Rect::from_corners(
                Point::new(v.position.x - r, v.position.y - r),
                Point::new(v.position.x + r, v.position.y + r),
            )
        });
        let zones = self
            .zones
            .iter()
            .filter_map(|z| Rect::from_points(z.outline.iter().copied()));
        let drawings = self.drawings.iter().map(Drawing::bounding_box);
        let texts = self.texts.iter().map(|t| Rect::from_corners(t.position, t.position));
        footprints
            .chain(tracks)
            .chain(vias)
            .chain(zones)
            .chain(drawings)
            .chain(texts)
            .reduce(Rect::union)
    }

    pub fn is_copper_layer(&self, name: &str) -> bool {
        self.resolve_layer(name).is_some_and(|l| layers::is_copper(l.id))
    }
}
