//! KiCad's fixed layer set and the per-board table of enabled layers.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

pub const F_CU: u32 = 0;
pub const B_CU: u32 = 31;
pub const EDGE_CUTS: u32 = 44;

/// Canonical names of the non-copper layers, with the long aliases newer
/// KiCad releases display.
const TECHNICAL_LAYERS: &[(u32, &str, &str)] = &[
    (32, "B.Adhes", "B.Adhesive"),
    (33, "F.Adhes", "F.Adhesive"),
    (34, "B.Paste", "B.Paste"),
    (35, "F.Paste", "F.Paste"),
    (36, "B.SilkS", "B.Silkscreen"),
    (37, "F.SilkS", "F.Silkscreen"),
    (38, "B.Mask", "B.Mask"),
    (39, "F.Mask", "F.Mask"),
    (40, "Dwgs.User", "User.Drawings"),
    (41, "Cmts.User", "User.Comments"),
    (42, "Eco1.User", "User.Eco1"),
    (43, "Eco2.User", "User.Eco2"),
    (44, "Edge.Cuts", "Edge.Cuts"),
    (45, "Margin", "Margin"),
    (46, "B.CrtYd", "B.Courtyard"),
    (47, "F.CrtYd", "F.Courtyard"),
    (48, "B.Fab", "B.Fab"),
    (49, "F.Fab", "F.Fab"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Signal,
    Power,
    Mixed,
    Jumper,
    User,
}

impl LayerType {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerType::Signal => "signal",
            LayerType::Power => "power",
            LayerType::Mixed => "mixed",
            LayerType::Jumper => "jumper",
            LayerType::User => "user",
        }
    }
}

impl FromStr for LayerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "signal" => Ok(LayerType::Signal),
            "power" => Ok(LayerType::Power),
            "mixed" => Ok(LayerType::Mixed),
            "jumper" => Ok(LayerType::Jumper),
            "user" => Ok(LayerType::User),
            other => Err(format!("unknown layer type '{other}'")),
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up a layer of the standard set by canonical name or alias,
/// returning its id and canonical name.
pub fn standard_layer(name: &str) -> Option<(u32, String)> {
    match name {
        "F.Cu" => return Some((F_CU, name.to_string())),
        "B.Cu" => return Some((B_CU, name.to_string())),
        _ => {}
    }
    if let Some(n) = name
        .strip_prefix("In")
        .and_then(|rest| rest.strip_suffix(".Cu"))
        .and_then(|n| n.parse::<u32>().ok())
        && (1..=30).contains(&n)
    {
        return Some((n, name.to_string()));
    }
    if let Some(n) = name
        .strip_prefix("User.")
        .and_then(|n| n.parse::<u32>().ok())
        && (1..=9).contains(&n)
    {
        return Some((49 + n, name.to_string()));
    }
    TECHNICAL_LAYERS
        .iter()
        .find(|(_, canonical, alias)| *canonical == name || *alias == name)
        .map(|(id, canonical, _)| (*id, canonical.to_string()))
}

pub fn is_copper(id: u32) -> bool {
    id <= B_CU
}

/// Name of the same layer on the opposite board side (`F.SilkS` ↔ `B.SilkS`).
pub fn flipped_name(name: &str) -> Option<String> {
    if let Some(rest) = name.strip_prefix("F.") {
        Some(format!("B.{rest}"))
    } else {
        name.strip_prefix("B.").map(|rest| format!("F.{rest}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layer {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LayerType,
    /// Display name set in board setup, if different from `name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// Enabled layers of a board, kept in id order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayerTable {
    layers: Vec<Layer>,
}

impl LayerTable {
    /// The layer stack KiCad gives a new two-layer board.
    pub fn two_layer() -> Self {
        let mut table = LayerTable::default();
        table.enable(F_CU, "F.Cu", LayerType::Signal);
        table.enable(B_CU, "B.Cu", LayerType::Signal);
        for (id, name, alias) in TECHNICAL_LAYERS {
            table.enable(*id, name, LayerType::User);
            if alias != name {
                table.set_user_name(*id, alias);
            }
        }
        table
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn copper_count(&self) -> usize {
        self.layers.iter().filter(|l| is_copper(l.id)).count()
    }

    /// Insert or update a layer, keeping id order.
    pub fn enable(&mut self, id: u32, name: &str, kind: LayerType) {
        match self.layers.binary_search_by_key(&id, |l| l.id) {
            Ok(idx) => {
                self.layers[idx].name = name.to_string();
                self.layers[idx].kind = kind;
            }
            Err(idx) => self.layers.insert(
                idx,
                Layer {
                    id,
                    name: name.to_string(),
                    kind,
                    user_name: None,
                },
            ),
        }
    }

    pub fn set_user_name(&mut self, id: u32, user_name: &str) {
        if let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) {
            layer.user_name = Some(user_name.to_string());
        }
    }

    pub fn by_id(&self, id: u32) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Resolve a name to an enabled layer. Accepts canonical names, the
    /// standard aliases, and user names from board setup.
    pub fn resolve(&self, name: &str) -> Option<&Layer> {
        if let Some(layer) = self
            .layers
            .iter()
            .find(|l| l.name == name || l.user_name.as_deref() == Some(name))
        {
            return Some(layer);
        }
        let (id, _) = standard_layer(name)?;
        self.by_id(id)
    }
}
