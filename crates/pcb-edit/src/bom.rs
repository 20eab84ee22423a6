//! Bill of materials: collecting component rows, grouping them, and writing
//! them out as CSV, XML, HTML or JSON.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use anyhow::Result;
use indexmap::IndexMap;
use log::warn;
use minijinja::{Environment, context};
use pcb_board::units::{tenths_to_degrees, to_mm};
use pcb_board::{Board, Footprint};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::{Map, Value, json};

use crate::error::CommandError;

/// Extra per-component columns a BOM may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BomAttribute {
    Description,
    Datasheet,
    Orientation,
    Position,
    Side,
    PadCount,
    IsLocked,
    Attributes,
    LibId,
}

impl BomAttribute {
    pub const ALL: [BomAttribute; 9] = [
        BomAttribute::Description,
        BomAttribute::Datasheet,
        BomAttribute::Orientation,
        BomAttribute::Position,
        BomAttribute::Side,
        BomAttribute::PadCount,
        BomAttribute::IsLocked,
        BomAttribute::Attributes,
        BomAttribute::LibId,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BomAttribute::Description => "Description",
            BomAttribute::Datasheet => "Datasheet",
            BomAttribute::Orientation => "Orientation",
            BomAttribute::Position => "Position",
            BomAttribute::Side => "Side",
            BomAttribute::PadCount => "PadCount",
            BomAttribute::IsLocked => "IsLocked",
            BomAttribute::Attributes => "Attributes",
            BomAttribute::LibId => "LibId",
        }
    }

    fn read(self, fp: &Footprint) -> Value {
        match self {
            BomAttribute::Description => json!(fp.property("Description").unwrap_or_default()),
            BomAttribute::Datasheet => json!(fp.property("Datasheet").unwrap_or_default()),
            BomAttribute::Orientation => json!(tenths_to_degrees(fp.rotation)),
            BomAttribute::Position => json!([to_mm(fp.position.x), to_mm(fp.position.y)]),
            BomAttribute::Side => json!(if fp.is_back() { "bottom" } else { "top" }),
            BomAttribute::PadCount => json!(fp.pads.len()),
            BomAttribute::IsLocked => json!(fp.locked),
            BomAttribute::Attributes => json!(fp.attributes),
            BomAttribute::LibId => json!(fp.lib_id),
        }
    }
}

impl FromStr for BomAttribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BomAttribute::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown BOM attribute '{s}'"))
    }
}

/// Resolve requested attribute names. Unknown names are skipped with a warning.
pub fn resolve_attributes(names: &[String]) -> Vec<BomAttribute> {
    let mut resolved = Vec::new();
    for name in names {
        match name.parse::<BomAttribute>() {
            Ok(attr) if !resolved.contains(&attr) => resolved.push(attr),
            Ok(_) => {}
            Err(err) => warn!("Skipping {err}"),
        }
    }
    resolved
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BomFormat {
    Csv,
    Xml,
    Html,
    Json,
}

impl FromStr for BomFormat {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CSV" => Ok(BomFormat::Csv),
            "XML" => Ok(BomFormat::Xml),
            "HTML" => Ok(BomFormat::Html),
            "JSON" => Ok(BomFormat::Json),
            _ => Err(CommandError::Unsupported(format!(
                "BOM format {s} is not supported"
            ))),
        }
    }
}

impl fmt::Display for BomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BomFormat::Csv => "CSV",
            BomFormat::Xml => "XML",
            BomFormat::Html => "HTML",
            BomFormat::Json => "JSON",
        })
    }
}

/// Rows of a BOM with a fixed column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bom {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl Bom {
    /// One row per footprint in board order.
    pub fn from_board(board: &Board, attributes: &[BomAttribute]) -> Self {
        let mut columns: Vec<String> = ["reference", "value", "footprint", "layer"]
            .map(String::from)
            .to_vec();
        columns.extend(attributes.iter().map(|a| a.name().to_string()));

        let rows = board
            .footprints
            .iter()
            .map(|fp| {
                let mut row = Map::new();
                row.insert("reference".into(), json!(fp.reference()));
                row.insert("value".into(), json!(fp.value()));
                row.insert("footprint".into(), json!(fp.footprint_name()));
                row.insert("layer".into(), json!(fp.layer));
                for attr in attributes {
                    row.insert(attr.name().into(), attr.read(fp));
                }
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Merge rows sharing value and footprint, in order of first appearance.
    /// Per-component columns do not survive grouping.
    pub fn grouped(&self) -> Self {
        let mut groups: IndexMap<(String, String), Vec<String>> = IndexMap::new();
        for row in &self.rows {
            let text = |key: &str| {
                row.get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            groups
                .entry((text("value"), text("footprint")))
                .or_default()
                .push(text("reference"));
        }

        let rows = groups
            .into_iter()
            .map(|((value, footprint), references)| {
                let mut row = Map::new();
                row.insert("value".into(), json!(value));
                row.insert("footprint".into(), json!(footprint));
                row.insert("quantity".into(), json!(references.len()));
                row.insert("references".into(), json!(references));
                row
            })
            .collect();
        Self {
            columns: ["value", "footprint", "quantity", "references"]
                .map(String::from)
                .to_vec(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn cells(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| row.get(c).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    pub fn render(&self, format: BomFormat) -> Result<String> {
        match format {
            BomFormat::Csv => self.to_csv(),
            BomFormat::Xml => self.to_xml(),
            BomFormat::Html => self.to_html(),
            BomFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "components": self.rows,
            }))?),
        }
    }

    fn to_csv(&self) -> Result<String> {
        let mut buf = Vec::new();
        {
            let mut writer = csv::WriterBuilder::new()
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(&mut buf);
            writer.write_record(&self.columns)?;
            for row in self.cells() {
                writer.write_record(&row)?;
            }
            writer.flush()?;
        }
        Ok(String::from_utf8(buf)?)
    }

    fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("bom")))?;
        for row in self.cells() {
            writer.write_event(Event::Start(BytesStart::new("component")))?;
            for (column, value) in self.columns.iter().zip(row) {
                writer.write_event(Event::Start(BytesStart::new(column.as_str())))?;
                writer.write_event(Event::Text(BytesText::new(&value)))?;
                writer.write_event(Event::End(BytesEnd::new(column.as_str())))?;
            }
            writer.write_event(Event::End(BytesEnd::new("component")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("bom")))?;
        let mut xml = String::from_utf8(writer.into_inner().into_inner())?;
        xml.push('\n');
        Ok(xml)
    }

    fn to_html(&self) -> Result<String> {
        let mut env = Environment::new();
        env.add_template("bom.html", HTML_TEMPLATE)?;
        let html = env.get_template("bom.html")?.render(context! {
            columns => &self.columns,
            rows => self.cells(),
        })?;
        Ok(html)
    }
}

/// Flat text for one cell. Lists are joined with ", ".
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

const HTML_TEMPLATE: &str = r#"<html>
<head><title>Bill of Materials</title></head>
<body>
<table border="1">
<tr>{% for column in columns %}<th>{{ column }}</th>{% endfor %}</tr>
{% for row in rows %}<tr>{% for cell in row %}<td>{{ cell }}</td>{% endfor %}</tr>
{% endfor %}</table>
</body>
</html>
"#;
