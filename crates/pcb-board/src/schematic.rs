//! Minimal `.kicad_sch` document: enough to create a sheet, place symbol
//! instances and draw wires. Library symbol bodies are not resolved.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use pcb_sexpr::{ListBuilder, Sexpr, format_tree, kv};
use serde::Serialize;

use crate::items::new_uuid;
use crate::units::{degrees_to_tenths, normalize_tenths, tenths_to_degrees};

pub const SCHEMATIC_VERSION: i64 = 20230121;
const GENERATOR: &str = "pcb-edit";

/// A symbol instance to place on a sheet. Coordinates are millimetres.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSpec {
    pub library: String,
    pub name: String,
    pub reference: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub unit: u32,
    pub value: Option<String>,
    pub footprint: Option<String>,
    pub datasheet: Option<String>,
    /// Extra fields; the four standard ones are not overridden from here.
    pub properties: Vec<(String, String)>,
}

impl SymbolSpec {
    pub fn lib_id(&self) -> String {
        format!("{}:{}", self.library, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchematicInfo {
    pub version: i64,
    pub generator: String,
    pub symbols: usize,
    pub wires: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchematicDocument {
    root: Sexpr,
}

const STANDARD_FIELDS: &[&str] = &["Reference", "Value", "Footprint", "Datasheet"];

impl SchematicDocument {
    pub fn new() -> Self {
        let root = Sexpr::node(
            "kicad_sch",
            [
                kv("version", SCHEMATIC_VERSION),
                kv("generator", Sexpr::string(GENERATOR)),
                kv("uuid", Sexpr::string(new_uuid())),
                kv("paper", Sexpr::string("A4")),
                Sexpr::node("lib_symbols", []),
            ],
        );
        Self { root }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let root = pcb_sexpr::parse(text).context("Malformed S-expression")?;
        if !root.is_node("kicad_sch") {
            bail!("Not a KiCad schematic: expected a (kicad_sch ...) document");
        }
        Ok(Self { root })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schematic {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to load {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = format_tree(&self.root);
        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|f| {
                f.write_all(text.as_bytes())?;
                f.flush()
            })
            .map_err(|err| anyhow::anyhow!("Failed to write {}: {err}", path.display()))
    }

    pub fn info(&self) -> SchematicInfo {
        SchematicInfo {
            version: self
                .root
                .value_of("version")
                .and_then(Sexpr::as_int)
                .unwrap_or_default(),
            generator: self.root.atom_of("generator").unwrap_or_default().to_string(),
            symbols: self.root.find_all("symbol").count(),
            wires: self.root.find_all("wire").count(),
        }
    }

    /// References of every placed symbol, in file order.
    pub fn references(&self) -> Vec<String> {
        self.root
            .find_all("symbol")
            .filter_map(symbol_reference)
            .map(str::to_owned)
            .collect()
    }

    /// Place a symbol instance, returning its uuid.
    pub fn add_symbol(&mut self, spec: &SymbolSpec) -> String {
        let uuid = new_uuid();
        let rotation = normalize_tenths(degrees_to_tenths(spec.rotation));
        let at = Sexpr::node(
            "at",
            [
                Sexpr::float(spec.x),
                Sexpr::float(spec.y),
                Sexpr::float(tenths_to_degrees(rotation)),
            ],
        );

        let mut fields: Vec<(&str, &str)> = vec![
            ("Reference", spec.reference.as_str()),
            ("Value", spec.value.as_deref().unwrap_or(spec.name.as_str())),
            ("Footprint", spec.footprint.as_deref().unwrap_or_default()),
            ("Datasheet", spec.datasheet.as_deref().unwrap_or("~")),
        ];
        fields.extend(
            spec.properties
                .iter()
                .filter(|(k, _)| !STANDARD_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );

        let mut symbol = ListBuilder::node("symbol");
        symbol
            .push(kv("lib_id", Sexpr::string(spec.lib_id())))
            .push(at.clone())
            .push(kv("unit", spec.unit))
            .push(kv("in_bom", true))
            .push(kv("on_board", true))
            .push(kv("uuid", Sexpr::string(uuid.as_str())));
        for (i, (name, value)) in fields.into_iter().enumerate() {
            let mut property = ListBuilder::node("property");
            property
                .push(Sexpr::string(name))
                .push(Sexpr::string(value))
                .push(at.clone())
                .push(Sexpr::node(
                    "effects",
                    [Sexpr::node(
                        "font",
                        [Sexpr::node("size", [Sexpr::float(1.27), Sexpr::float(1.27)])],
                    )],
                ))
                .push_if(i >= 2, kv("hide", true));
            symbol.push(property.build());
        }
        self.push(symbol.build());
        uuid
    }

    /// Remove a symbol by reference. Returns false when absent.
    pub fn remove_symbol(&mut self, reference: &str) -> bool {
        let Some(items) = self.root.as_list_mut() else {
            return false;
        };
        let Some(idx) = items
            .iter()
            .position(|s| s.is_node("symbol") && symbol_reference(s) == Some(reference))
        else {
            return false;
        };
        items.remove(idx);
        true
    }

    /// Draw a wire between two points in millimetres, returning its uuid.
    pub fn add_wire(&mut self, start: (f64, f64), end: (f64, f64)) -> String {
        let uuid = new_uuid();
        let xy = |(x, y): (f64, f64)| Sexpr::node("xy", [Sexpr::float(x), Sexpr::float(y)]);
        self.push(Sexpr::node(
            "wire",
            [
                Sexpr::node("pts", [xy(start), xy(end)]),
                Sexpr::node("stroke", [kv("width", 0), kv("type", "default")]),
                kv("uuid", Sexpr::string(uuid.as_str())),
            ],
        ));
        uuid
    }

    fn push(&mut self, item: Sexpr) {
        if let Some(items) = self.root.as_list_mut() {
            items.push(item);
        }
    }
}

impl Default for SchematicDocument {
    fn default() -> Self {
        Self::new()
    }
}

fn symbol_reference(symbol: &Sexpr) -> Option<&str> {
    symbol
        .find_all("property")
        .find(|p| p.arg(1).and_then(Sexpr::as_atom) == Some("Reference"))?
        .arg(2)?
        .as_atom()
}
