//! The `.kicad_pro` project file that sits next to a board.
//!
//! KiCad keeps design rules and net classes here rather than in the board
//! file. Only the keys this crate manages are typed; everything else is
//! preserved as raw JSON so existing projects survive a round trip.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::board::Board;
use crate::items::{DEFAULT_NET_CLASS, NetClass};
use crate::units::{mm, to_mm};

pub fn project_path(board_path: &Path) -> PathBuf {
    board_path.with_extension("kicad_pro")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default)]
    pub board: ProjectBoard,
    #[serde(default)]
    pub net_settings: NetSettings,
    #[serde(default)]
    pub meta: ProjectMeta,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectBoard {
    #[serde(default)]
    pub design_settings: ProjectDesignSettings,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectDesignSettings {
    #[serde(default)]
    pub rules: Map<String, Value>,
    #[serde(default)]
    pub rule_severities: Map<String, Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetSettings {
    #[serde(default)]
    pub classes: Vec<ProjectNetClass>,
    /// Net name to class name. KiCad writes `null` when empty.
    #[serde(default)]
    pub netclass_assignments: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectNetClass {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clearance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_diameter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_drill: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microvia_diameter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microvia_drill: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_pair_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_pair_gap: Option<f64>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMeta {
    #[serde(default)]
    pub filename: String,
    #[serde(default = "default_meta_version")]
    pub version: u32,
}

fn default_meta_version() -> u32 {
    1
}

impl Default for ProjectMeta {
    fn default() -> Self {
        Self {
            filename: String::new(),
            version: default_meta_version(),
        }
    }
}

const MIN_CLEARANCE: &str = "min_clearance";
const MIN_TRACK_WIDTH: &str = "min_track_width";
const MIN_VIA_DIAMETER: &str = "min_via_diameter";
const MIN_VIA_DRILL: &str = "min_via_drill";
const MIN_UVIA_DIAMETER: &str = "min_microvia_diameter";
const MIN_UVIA_DRILL: &str = "min_microvia_drill";
const MIN_HOLE: &str = "min_through_hole_diameter";
const MIN_COURTYARD_CLEARANCE: &str = "min_courtyard_clearance";
const MISSING_COURTYARD: &str = "missing_courtyard";

impl ProjectFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read project file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse project file {}", path.display()))
    }

    /// Load the project file if it exists, otherwise start from an empty one.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|f| {
                f.write_all(text.as_bytes())?;
                f.flush()
            })
            .map_err(|err| anyhow::anyhow!("Failed to write {}: {err}", path.display()))
    }

    /// Copy rules, net classes and class assignments into `board`.
    pub fn apply_to(&self, board: &mut Board) {
        let rules = &self.board.design_settings.rules;
        let get = |key: &str| rules.get(key).and_then(Value::as_f64).map(mm);
        let design = &mut board.design;
        if let Some(v) = get(MIN_CLEARANCE) {
            design.min_clearance = v;
        }
        if let Some(v) = get(MIN_TRACK_WIDTH) {
            design.min_track_width = v;
        }
        if let Some(v) = get(MIN_VIA_DIAMETER) {
            design.min_via_diameter = v;
        }
        if let Some(v) = get(MIN_VIA_DRILL) {
            design.min_via_drill = v;
        }
        if let Some(v) = get(MIN_UVIA_DIAMETER) {
            design.min_uvia_diameter = v;
        }
        if let Some(v) = get(MIN_UVIA_DRILL) {
            design.min_uvia_drill = v;
        }
        if let Some(v) = get(MIN_HOLE) {
            design.min_hole_diameter = v;
        }
        if let Some(v) = get(MIN_COURTYARD_CLEARANCE) {
            design.courtyard_clearance = v;
        }
        if let Some(severity) = self
            .board
            .design_settings
            .rule_severities
            .get(MISSING_COURTYARD)
            .and_then(Value::as_str)
        {
            design.require_courtyard = severity != "ignore";
        }

        for pc in &self.net_settings.classes {
            let class = board.upsert_net_class(&pc.name);
            let fields = [
                (pc.clearance, &mut class.clearance),
                (pc.track_width, &mut class.track_width),
                (pc.via_diameter, &mut class.via_diameter),
                (pc.via_drill, &mut class.via_drill),
                (pc.microvia_diameter, &mut class.uvia_diameter),
                (pc.microvia_drill, &mut class.uvia_drill),
                (pc.diff_pair_width, &mut class.diff_pair_width),
                (pc.diff_pair_gap, &mut class.diff_pair_gap),
            ];
            for (value, slot) in fields {
                if let Some(v) = value {
                    *slot = mm(v);
                }
            }
        }

        for (net, class) in self.net_settings.netclass_assignments.iter().flatten() {
            let class = match class {
                Value::String(s) => Some(s.as_str()),
                Value::Array(items) => items.first().and_then(Value::as_str),
                _ => None,
            };
            if let Some(class) = class {
                board.ensure_net(net);
                board.assign_net_class(net, class);
            }
        }
    }

    /// Record the board's rules, classes and assignments, keeping every
    /// unrelated key untouched.
    pub fn update_from(&mut self, board: &Board) {
        let design = &board.design;
        let rules = &mut self.board.design_settings.rules;
        for (key, value) in [
            (MIN_CLEARANCE, design.min_clearance),
            (MIN_TRACK_WIDTH, design.min_track_width),
            (MIN_VIA_DIAMETER, design.min_via_diameter),
            (MIN_VIA_DRILL, design.min_via_drill),
            (MIN_UVIA_DIAMETER, design.min_uvia_diameter),
            (MIN_UVIA_DRILL, design.min_uvia_drill),
            (MIN_HOLE, design.min_hole_diameter),
            (MIN_COURTYARD_CLEARANCE, design.courtyard_clearance),
        ] {
            rules.insert(key.to_string(), mm_value(value));
        }
        let severity = if design.require_courtyard { "error" } else { "ignore" };
        self.board
            .design_settings
            .rule_severities
            .insert(MISSING_COURTYARD.to_string(), Value::from(severity));

        let previous = std::mem::take(&mut self.net_settings.classes);
        self.net_settings.classes = board
            .net_classes()
            .map(|class| {
                let other = previous
                    .iter()
                    .find(|p| p.name == class.name)
                    .map(|p| p.other.clone())
                    .unwrap_or_default();
                to_project_class(class, other)
            })
            .collect();

        let assignments: Map<String, Value> = board
            .nets()
            .iter()
            .filter(|n| n.code != 0 && n.class != DEFAULT_NET_CLASS)
            .map(|n| (n.name.clone(), Value::from(n.class.clone())))
            .collect();
        self.net_settings.netclass_assignments =
            (!assignments.is_empty()).then_some(assignments);
    }
}

fn mm_value(iu: i64) -> Value {
    Value::from(to_mm(iu))
}

fn to_project_class(class: &NetClass, other: Map<String, Value>) -> ProjectNetClass {
    ProjectNetClass {
        name: class.name.clone(),
        clearance: Some(to_mm(class.clearance)),
        track_width: Some(to_mm(class.track_width)),
        via_diameter: Some(to_mm(class.via_diameter)),
        via_drill: Some(to_mm(class.via_drill)),
        microvia_diameter: Some(to_mm(class.uvia_diameter)),
        microvia_drill: Some(to_mm(class.uvia_drill)),
        diff_pair_width: Some(to_mm(class.diff_pair_width)),
        diff_pair_gap: Some(to_mm(class.diff_pair_gap)),
        other,
    }
}
