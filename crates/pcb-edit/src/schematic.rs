//! Schematic sheets: creating and loading them, placing symbols and wires,
//! and finding symbol libraries.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::GlobBuilder;
use log::{debug, info, warn};
use pcb_board::{BoardKernel, SchematicDocument, SymbolSpec};
use serde::Deserialize;
use serde_json::json;
use walkdir::WalkDir;

use crate::error::{CommandError, CommandResult, KernelResultExt, required};
use crate::files::expand_path;
use crate::response::Outcome;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchematic {
    pub project_name: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSchematic {
    pub filename: Option<String>,
}

/// A symbol to place. Everything but the position has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchematicComponent {
    pub library: String,
    #[serde(rename = "type")]
    pub name: String,
    pub reference: String,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub unit: u32,
    pub value: Option<String>,
    pub footprint: Option<String>,
    pub datasheet: Option<String>,
    pub properties: indexmap::IndexMap<String, String>,
}

impl Default for SchematicComponent {
    fn default() -> Self {
        Self {
            library: "Device".to_string(),
            name: "R".to_string(),
            reference: "R?".to_string(),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            unit: 1,
            value: None,
            footprint: None,
            datasheet: None,
            properties: Default::default(),
        }
    }
}

impl From<SchematicComponent> for SymbolSpec {
    fn from(c: SchematicComponent) -> Self {
        SymbolSpec {
            library: c.library,
            name: c.name,
            reference: c.reference,
            x: c.x,
            y: c.y,
            rotation: c.rotation,
            unit: c.unit,
            value: c.value,
            footprint: c.footprint,
            datasheet: c.datasheet,
            properties: c.properties.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSchematicComponent {
    pub schematic_path: Option<String>,
    pub component: Option<SchematicComponent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSchematicWire {
    pub schematic_path: Option<String>,
    pub start_point: Option<(f64, f64)>,
    pub end_point: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLibraries {
    pub search_paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSchematicPdf {
    pub schematic_path: Option<String>,
    pub output_path: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SchematicCommand {
    Create(CreateSchematic),
    Load(LoadSchematic),
    AddComponent(AddSchematicComponent),
    AddWire(AddSchematicWire),
    ListLibraries(ListLibraries),
    ExportPdf(ExportSchematicPdf),
}

/// Schematic commands work on files named in their parameters, not on the
/// open board.
pub struct SchematicEditor<'a> {
    pub kernel: &'a dyn BoardKernel,
    /// Used by `list_schematic_libraries` when the request names no paths.
    pub default_patterns: &'a [String],
}

impl SchematicEditor<'_> {
    pub fn execute(&self, command: SchematicCommand) -> CommandResult<Outcome> {
        match command {
            SchematicCommand::Create(params) => create(params),
            SchematicCommand::Load(params) => {
                let path = existing(params.filename, "filename")?;
                let doc = SchematicDocument::load(&path).or_internal("Failed to load schematic")?;
                Ok(Outcome::new(format!("Loaded schematic: {}", path.display()))
                    .with("metadata", doc.info()))
            }
            SchematicCommand::AddComponent(params) => add_component(params),
            SchematicCommand::AddWire(params) => add_wire(params),
            SchematicCommand::ListLibraries(params) => {
                let patterns = match params.search_paths {
                    Some(paths) => paths,
                    None => self.default_patterns.to_vec(),
                };
                let paths = find_libraries(&patterns);
                let names: Vec<String> = paths
                    .iter()
                    .filter_map(|p| p.file_stem())
                    .map(|s| s.to_string_lossy().into_owned())
                    .collect();
                info!("Found {} symbol libraries", names.len());
                Ok(Outcome::data().with("libraries", json!({"paths": paths, "names": names})))
            }
            SchematicCommand::ExportPdf(params) => {
                let schematic = existing(params.schematic_path, "schematicPath")?;
                let output = expand_path(&required(params.output_path, "outputPath")?);
                self.kernel
                    .plot_schematic_pdf(&schematic, &output)
                    .or_internal("Failed to export schematic PDF")?;
                Ok(Outcome::new("Exported schematic to PDF")
                    .with("file", json!({"path": output, "format": "PDF"})))
            }
        }
    }
}

/// A required path parameter naming a file that must already exist.
fn existing(raw: Option<String>, name: &str) -> CommandResult<PathBuf> {
    let path = expand_path(&required(raw, name)?);
    if path.is_file() {
        Ok(path)
    } else {
        Err(CommandError::NotFound(format!(
            "Schematic file not found: {}",
            path.display()
        )))
    }
}

fn create(params: CreateSchematic) -> CommandResult<Outcome> {
    let name = required(params.project_name, "projectName")?;
    let dir = expand_path(params.path.as_deref().unwrap_or("."));
    let path = dir.join(format!("{name}.kicad_sch"));
    if path.exists() {
        return Err(CommandError::AlreadyExists(format!(
            "Schematic already exists: {}",
            path.display()
        )));
    }
    std::fs::create_dir_all(&dir)
        .map_err(anyhow::Error::from)
        .and_then(|_| SchematicDocument::new().save(&path))
        .or_internal("Failed to create schematic")?;
    Ok(Outcome::new(format!("Created schematic: {name}")).with("filePath", path))
}

fn add_component(params: AddSchematicComponent) -> CommandResult<Outcome> {
    let path = existing(params.schematic_path, "schematicPath")?;
    let component = required(params.component, "component")?;
    let mut doc = SchematicDocument::load(&path).or_internal("Failed to load schematic")?;

    let spec = SymbolSpec::from(component);
    if !spec.reference.ends_with('?') && doc.references().contains(&spec.reference) {
        return Err(CommandError::AlreadyExists(format!(
            "Reference {} is already used in {}",
            spec.reference,
            path.display()
        )));
    }
    let uuid = doc.add_symbol(&spec);
    doc.save(&path).or_internal("Failed to save schematic")?;

    Ok(Outcome::new(format!("Added component {} to schematic", spec.reference)).with(
        "component",
        json!({"reference": spec.reference, "libId": spec.lib_id(), "uuid": uuid}),
    ))
}

fn add_wire(params: AddSchematicWire) -> CommandResult<Outcome> {
    let path = existing(params.schematic_path, "schematicPath")?;
    let start = required(params.start_point, "startPoint")?;
    let end = required(params.end_point, "endPoint")?;
    if start == end {
        return Err(CommandError::InvalidParameter(
            "Wire start and end must differ".to_string(),
        ));
    }
    let mut doc = SchematicDocument::load(&path).or_internal("Failed to load schematic")?;
    let uuid = doc.add_wire(start, end);
    doc.save(&path).or_internal("Failed to save schematic")?;
    Ok(Outcome::new("Added wire").with(
        "wire",
        json!({"uuid": uuid, "start": [start.0, start.1], "end": [end.0, end.1]}),
    ))
}

/// Where KiCad installs its symbol libraries on this platform, plus the
/// per-user library folder.
pub fn default_symbol_patterns() -> Vec<String> {
    let mut patterns = Vec::new();
    if cfg!(target_os = "windows") {
        patterns.push("C:/Program Files/KiCad/*/share/kicad/symbols/*.kicad_sym".to_string());
    } else if cfg!(target_os = "macos") {
        patterns.push(
            "/Applications/KiCad/KiCad.app/Contents/SharedSupport/symbols/*.kicad_sym".to_string(),
        );
    } else {
        patterns.push("/usr/share/kicad/symbols/*.kicad_sym".to_string());
        patterns.push("/usr/local/share/kicad/symbols/*.kicad_sym".to_string());
    }
    if let Some(docs) = dirs::document_dir() {
        patterns.push(format!("{}/KiCad/*/symbols/*.kicad_sym", docs.display()));
    }
    patterns
}

fn is_glob(part: &str) -> bool {
    part.contains(['*', '?', '[', '{'])
}

/// The literal directory a pattern starts from, and how deep below it a
/// match can lie (`None` for `**` patterns).
fn glob_root(pattern: &Path) -> (PathBuf, Option<usize>) {
    let mut root = PathBuf::new();
    let mut rest = Vec::new();
    for component in pattern.components() {
        let text = component.as_os_str().to_string_lossy();
        if rest.is_empty() && !is_glob(&text) {
            root.push(component);
        } else {
            rest.push(text.into_owned());
        }
    }
    if rest.is_empty() {
        // A literal path: the file itself.
        let parent = root.parent().map(Path::to_path_buf).unwrap_or_default();
        return (parent, Some(1));
    }
    let depth = (!rest.iter().any(|p| p == "**")).then_some(rest.len());
    (root, depth)
}

fn matches_in(pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern_path = expand_path(pattern);
    let matcher = GlobBuilder::new(&pattern_path.to_string_lossy())
        .literal_separator(true)
        .build()?
        .compile_matcher();
    let (root, depth) = glob_root(&pattern_path);
    if !root.is_dir() {
        debug!("Skipping {pattern}: {} is not a directory", root.display());
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(&root).follow_links(true);
    if let Some(depth) = depth {
        walker = walker.max_depth(depth);
    }
    let mut found = Vec::new();
    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() && matcher.is_match(entry.path()) {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

/// Every file matching any pattern, without duplicates, in pattern order.
pub fn find_libraries(patterns: &[String]) -> Vec<PathBuf> {
    let mut seen = BTreeSet::new();
    let mut libraries = Vec::new();
    for pattern in patterns {
        match matches_in(pattern) {
            Ok(found) => {
                for path in found {
                    if seen.insert(path.clone()) {
                        libraries.push(path);
                    }
                }
            }
            Err(err) => warn!("Error searching for libraries at {pattern}: {err}"),
        }
    }
    libraries
}
