//! Fabrication and documentation outputs.

use std::path::{Path, PathBuf};

use log::{info, warn};
use pcb_board::{Board, PlotRequest};
use serde::Deserialize;
use serde_json::json;

use crate::bom::{Bom, BomFormat, resolve_attributes};
use crate::engine::Engine;
use crate::error::{CommandError, CommandResult, KernelResultExt, required};
use crate::files::{expand_path, write_atomic};
use crate::response::Outcome;
use crate::session::SessionContext;

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportGerber {
    pub output_dir: Option<String>,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub use_protel_extensions: bool,
    #[serde(default = "yes")]
    pub generate_drill_files: bool,
    #[serde(default)]
    pub generate_map_file: bool,
    #[serde(default)]
    pub use_aux_origin: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPdf {
    pub output_path: Option<String>,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub black_and_white: bool,
    #[serde(default = "yes")]
    pub frame_reference: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSvg {
    pub output_path: Option<String>,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub black_and_white: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Export3d {
    pub output_path: Option<String>,
    pub format: Option<String>,
    #[serde(default = "yes")]
    pub include_components: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBom {
    pub output_path: Option<String>,
    pub format: Option<String>,
    #[serde(default = "yes")]
    pub group_by_value: bool,
    #[serde(default)]
    pub include_attributes: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ExportCommand {
    Gerber(ExportGerber),
    Pdf(ExportPdf),
    Svg(ExportSvg),
    ThreeD(Export3d),
    Bom(ExportBom),
}

pub struct ExportEngine;

impl Engine for ExportEngine {
    type Command = ExportCommand;

    fn execute(
        &self,
        ctx: &mut SessionContext<'_>,
        command: ExportCommand,
    ) -> CommandResult<Outcome> {
        match command {
            ExportCommand::Gerber(params) => export_gerber(ctx, params),
            ExportCommand::Pdf(params) => export_pdf(ctx, params),
            ExportCommand::Svg(params) => export_svg(ctx, params),
            ExportCommand::ThreeD(params) => export_3d(ctx, params),
            ExportCommand::Bom(params) => export_bom(ctx.board, params),
        }
    }
}

/// Canonical names of the requested layers, or every enabled layer when none
/// were requested. Unknown names are skipped.
pub(crate) fn plot_layers(board: &Board, requested: &[String]) -> CommandResult<Vec<String>> {
    if requested.is_empty() {
        return Ok(board.layers.iter().map(|l| l.name.clone()).collect());
    }
    let mut layers = Vec::new();
    for name in requested {
        match board.resolve_layer(name) {
            Some(layer) => layers.push(layer.name.clone()),
            None => warn!("Skipping unknown layer {name}"),
        }
    }
    if layers.is_empty() {
        return Err(CommandError::InvalidParameter(format!(
            "None of the requested layers exist: {}",
            requested.join(", ")
        )));
    }
    Ok(layers)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn export_gerber(ctx: &mut SessionContext<'_>, params: ExportGerber) -> CommandResult<Outcome> {
    let output_dir = expand_path(&required(params.output_dir, "outputDir")?);
    let layers = plot_layers(ctx.board, &params.layers)?;
    let request = PlotRequest::Gerbers {
        output_dir: output_dir.clone(),
        layers: layers.clone(),
        drill_files: params.generate_drill_files,
        map_file: params.generate_map_file,
        protel_extensions: params.use_protel_extensions,
        aux_origin: params.use_aux_origin,
    };
    let written = ctx
        .kernel
        .plot(ctx.board, &request)
        .or_internal("Failed to export Gerber files")?;

    let (mut gerber, mut drill, mut map) = (Vec::new(), Vec::new(), Vec::new());
    for path in &written {
        if has_extension(path, &["drl", "cnc"]) {
            drill.push(file_name(path));
        } else if has_extension(path, &["gbrjob"]) {
            map.push(file_name(path));
        } else {
            gerber.push(file_name(path));
        }
    }
    info!("Wrote {} files to {}", written.len(), output_dir.display());
    Ok(Outcome::new("Exported Gerber files")
        .with("files", json!({"gerber": gerber, "drill": drill, "map": map}))
        .with("layers", layers)
        .with("outputDir", output_dir))
}

fn export_pdf(ctx: &mut SessionContext<'_>, params: ExportPdf) -> CommandResult<Outcome> {
    let output = expand_path(&required(params.output_path, "outputPath")?);
    let layers = plot_layers(ctx.board, &params.layers)?;
    let request = PlotRequest::Pdf {
        output: output.clone(),
        layers: layers.clone(),
        black_and_white: params.black_and_white,
        frame_reference: params.frame_reference,
    };
    ctx.kernel
        .plot(ctx.board, &request)
        .or_internal("Failed to export PDF file")?;
    Ok(Outcome::new("Exported PDF file").with("file", json!({"path": output, "layers": layers})))
}

fn export_svg(ctx: &mut SessionContext<'_>, params: ExportSvg) -> CommandResult<Outcome> {
    let output = expand_path(&required(params.output_path, "outputPath")?);
    let layers = plot_layers(ctx.board, &params.layers)?;
    let request = PlotRequest::Svg {
        output: output.clone(),
        layers: layers.clone(),
        black_and_white: params.black_and_white,
    };
    ctx.kernel
        .plot(ctx.board, &request)
        .or_internal("Failed to export SVG file")?;
    Ok(Outcome::new("Exported SVG file").with("file", json!({"path": output, "layers": layers})))
}

fn export_3d(ctx: &mut SessionContext<'_>, params: Export3d) -> CommandResult<Outcome> {
    let output: PathBuf = expand_path(&required(params.output_path, "outputPath")?);
    let format = params.format.unwrap_or_else(|| "STEP".to_string());
    let request = match format.to_ascii_uppercase().as_str() {
        "STEP" => PlotRequest::Step {
            output: output.clone(),
            include_components: params.include_components,
        },
        "VRML" => PlotRequest::Vrml {
            output: output.clone(),
        },
        _ => {
            return Err(CommandError::Unsupported(format!(
                "Format {format} is not supported"
            )));
        }
    };
    ctx.kernel
        .plot(ctx.board, &request)
        .or_internal("Failed to export 3D model")?;
    Ok(Outcome::new(format!("Exported {format} file"))
        .with("file", json!({"path": output, "format": format})))
}

fn export_bom(board: &Board, params: ExportBom) -> CommandResult<Outcome> {
    let output = expand_path(&required(params.output_path, "outputPath")?);
    let format: BomFormat = params.format.as_deref().unwrap_or("CSV").parse()?;
    let attributes = resolve_attributes(&params.include_attributes);

    let mut bom = Bom::from_board(board, &attributes);
    if params.group_by_value {
        bom = bom.grouped();
    }
    let text = bom
        .render(format)
        .and_then(|text| write_atomic(&output, text.as_bytes()).map(|_| text))
        .or_internal("Failed to export BOM")?;
    info!("Wrote {} BOM rows ({} bytes) to {}", bom.len(), text.len(), output.display());

    Ok(Outcome::new(format!("Exported BOM to {format}")).with(
        "file",
        json!({
            "path": output,
            "format": format.to_string(),
            "componentCount": bom.len(),
        }),
    ))
}
