//! The capabilities the editing core consumes from the board kernel, and the
//! implementation backed by KiCad's files and `kicad-cli`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use tempfile::TempDir;

use crate::board::Board;
use crate::drc::DrcReport;
use crate::io;
use crate::items::Footprint;
use crate::kicad_cli::KiCadCliBuilder;
use crate::library::FootprintLibrary;

/// A plot job handed to the kernel's plotter.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotRequest {
    Gerbers {
        output_dir: PathBuf,
        /// Empty plots every enabled layer.
        layers: Vec<String>,
        drill_files: bool,
        map_file: bool,
        protel_extensions: bool,
        aux_origin: bool,
    },
    Pdf {
        output: PathBuf,
        layers: Vec<String>,
        black_and_white: bool,
        frame_reference: bool,
    },
    Svg {
        output: PathBuf,
        layers: Vec<String>,
        black_and_white: bool,
    },
    Step {
        output: PathBuf,
        include_components: bool,
    },
    Vrml {
        output: PathBuf,
    },
}

pub trait BoardKernel {
    fn load_board(&self, path: &Path) -> Result<Board> {
        io::read_board(path)
    }

    fn save_board(&self, board: &Board, path: &Path) -> Result<()> {
        io::write_board(board, path)
    }

    /// Resolve `Library:Name` against the footprint libraries. `Ok(None)`
    /// when no library provides it.
    fn load_footprint(&self, lib_id: &str) -> Result<Option<Footprint>>;

    fn run_drc(&self, board: &Board) -> Result<DrcReport>;

    /// Recompute copper fills. Kernels without an in-process filler defer the
    /// work to the next DRC or plot.
    fn fill_zones(&self, board: &mut Board) -> Result<()>;

    /// Produce plot output, returning the files written.
    fn plot(&self, board: &Board, request: &PlotRequest) -> Result<Vec<PathBuf>>;

    fn plot_schematic_pdf(&self, schematic: &Path, output: &Path) -> Result<()>;
}

/// Kernel backed by on-disk KiCad files and the `kicad-cli` executable.
#[derive(Debug, Clone, Default)]
pub struct KicadKernel {
    library: FootprintLibrary,
}

impl KicadKernel {
    pub fn new(library: FootprintLibrary) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &FootprintLibrary {
        &self.library
    }

    /// Write the in-memory board to a scratch directory so `kicad-cli` sees
    /// exactly the current state, including unsaved edits.
    fn snapshot(&self, board: &Board) -> Result<(TempDir, PathBuf)> {
        let dir = tempfile::tempdir().context("Failed to create scratch directory")?;
        let name = board
            .file_name
            .as_deref()
            .and_then(Path::file_name)
            .map_or_else(|| "board.kicad_pcb".into(), |n| n.to_os_string());
        let path = dir.path().join(name);
        io::write_board(board, &path)?;
        Ok((dir, path))
    }
}

fn layer_list(board: &Board, layers: &[String]) -> String {
    if layers.is_empty() {
        board
            .layers
            .iter()
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    } else {
        layers.join(",")
    }
}

fn files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

impl BoardKernel for KicadKernel {
    fn load_footprint(&self, lib_id: &str) -> Result<Option<Footprint>> {
        self.library.load(lib_id)
    }

    fn run_drc(&self, board: &Board) -> Result<DrcReport> {
        let (dir, pcb) = self.snapshot(board)?;
        let report = dir.path().join("drc.json");
        let mut builder = KiCadCliBuilder::new()
            .command("pcb")
            .subcommand("drc")
            .arg("--format")
            .arg("json")
            .arg("--severity-all");
        if board.zones_need_refill {
            builder = builder.arg("--refill-zones");
        }
        builder
            .arg("--output")
            .path(&report)
            .path(&pcb)
            .run()
            .context("Failed to run KiCad DRC")?;
        DrcReport::from_file(&report).context("Failed to parse DRC report")
    }

    fn fill_zones(&self, board: &mut Board) -> Result<()> {
        debug!("Deferring fill of {} zones to kicad-cli", board.zones.len());
        board.zones_need_refill = true;
        Ok(())
    }

    fn plot(&self, board: &Board, request: &PlotRequest) -> Result<Vec<PathBuf>> {
        let (_dir, pcb) = self.snapshot(board)?;
        let refill = board.zones_need_refill;
        match request {
            PlotRequest::Gerbers {
                output_dir,
                layers,
                drill_files,
                map_file,
                protel_extensions,
                aux_origin,
            } => {
                std::fs::create_dir_all(output_dir)
                    .with_context(|| format!("Failed to create {}", output_dir.display()))?;
                let mut gerbers = KiCadCliBuilder::new()
                    .command("pcb")
                    .subcommand("export")
                    .arg("gerbers")
                    .arg("--output")
                    .arg(format!("{}/", output_dir.display()))
                    .arg("--layers")
                    .arg(layer_list(board, layers));
                if !protel_extensions {
                    gerbers = gerbers.arg("--no-protel-ext");
                }
                if *aux_origin {
                    gerbers = gerbers.arg("--use-drill-file-origin");
                }
                if refill {
                    gerbers = gerbers.arg("--check-zones");
                }
                gerbers.path(&pcb).run().context("Failed to export Gerber files")?;

                if *drill_files {
                    let mut drill = KiCadCliBuilder::new()
                        .command("pcb")
                        .subcommand("export")
                        .arg("drill")
                        .arg("--output")
                        .arg(format!("{}/", output_dir.display()));
                    if *map_file {
                        drill = drill.arg("--generate-map");
                    }
                    drill.path(&pcb).run().context("Failed to export drill files")?;
                }
                info!("Exported Gerber files to {}", output_dir.display());
                files_in(output_dir)
            }
            PlotRequest::Pdf {
                output,
                layers,
                black_and_white,
                frame_reference,
            } => {
                ensure_parent(output)?;
                let mut builder = KiCadCliBuilder::new()
                    .command("pcb")
                    .subcommand("export")
                    .arg("pdf")
                    .arg("--output")
                    .path(output)
                    .arg("--layers")
                    .arg(layer_list(board, layers));
                if *black_and_white {
                    builder = builder.arg("--black-and-white");
                }
                if !frame_reference {
                    builder = builder.arg("--exclude-drawing-sheet");
                }
                builder.path(&pcb).run().context("Failed to export PDF")?;
                Ok(vec![output.clone()])
            }
            PlotRequest::Svg {
                output,
                layers,
                black_and_white,
            } => {
                ensure_parent(output)?;
                let mut builder = KiCadCliBuilder::new()
                    .command("pcb")
                    .subcommand("export")
                    .arg("svg")
                    .arg("--output")
                    .path(output)
                    .arg("--layers")
                    .arg(layer_list(board, layers))
                    .arg("--page-size-mode")
                    .arg("2")
                    .arg("--exclude-drawing-sheet");
                if *black_and_white {
                    builder = builder.arg("--black-and-white");
                }
                builder.path(&pcb).run().context("Failed to export SVG")?;
                Ok(vec![output.clone()])
            }
            PlotRequest::Step {
                output,
                include_components,
            } => {
                ensure_parent(output)?;
                let mut builder = KiCadCliBuilder::new()
                    .command("pcb")
                    .subcommand("export")
                    .arg("step")
                    .arg("--force")
                    .arg("--output")
                    .path(output);
                if !include_components {
                    builder = builder.arg("--board-only");
                }
                builder
                    .suppress_error_output(true)
                    .path(&pcb)
                    .run()
                    .context("Failed to export STEP model")?;
                Ok(vec![output.clone()])
            }
            PlotRequest::Vrml { output } => {
                ensure_parent(output)?;
                KiCadCliBuilder::new()
                    .command("pcb")
                    .subcommand("export")
                    .arg("vrml")
                    .arg("--force")
                    .arg("--output")
                    .path(output)
                    .suppress_error_output(true)
                    .path(&pcb)
                    .run()
                    .context("Failed to export VRML model")?;
                Ok(vec![output.clone()])
            }
        }
    }

    fn plot_schematic_pdf(&self, schematic: &Path, output: &Path) -> Result<()> {
        ensure_parent(output)?;
        KiCadCliBuilder::new()
            .command("sch")
            .subcommand("export")
            .arg("pdf")
            .arg("--output")
            .path(output)
            .path(schematic)
            .run()
            .context("Failed to export schematic PDF")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::mm;

    #[test]
    fn layer_list_defaults_to_enabled_layers() {
        let board = Board::new();
        let all = layer_list(&board, &[]);
        assert!(all.starts_with("F.Cu,B.Cu,B.Adhes"));
        assert_eq!(layer_list(&board, &["F.Cu".into(), "Edge.Cuts".into()]), "F.Cu,Edge.Cuts");
    }

    #[test]
    fn snapshot_keeps_file_name() -> Result<()> {
        let mut board = Board::new();
        board.thickness = mm(0.8);
        board.file_name = Some(PathBuf::from("/projects/blinky/blinky.kicad_pcb"));
        let kernel = KicadKernel::default();
        let (_dir, path) = kernel.snapshot(&board)?;
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("blinky.kicad_pcb"));
        assert_eq!(io::read_board(&path)?.thickness, mm(0.8));
        assert!(path.with_extension("kicad_pro").exists());
        Ok(())
    }

    #[test]
    fn fill_is_deferred() -> Result<()> {
        let mut board = Board::new();
        KicadKernel::default().fill_zones(&mut board)?;
        assert!(board.zones_need_refill);
        Ok(())
    }
}
