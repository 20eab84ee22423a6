//! In-memory kernel and fixtures for engine tests.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use anyhow::Result;
use pcb_board::items::Pad;
use pcb_board::units::mm;
use pcb_board::{Board, BoardKernel, DrcReport, Footprint, PlotRequest, Point};

use crate::session::SessionContext;

pub struct TestKernel {
    pub footprints: Vec<Footprint>,
    pub drc: DrcReport,
    pub plots: RefCell<Vec<PlotRequest>>,
}

pub fn resistor_0603() -> Footprint {
    let mut fp = Footprint::new("Resistor_SMD:R_0603_1608Metric");
    fp.set_reference("REF**");
    fp.set_value("R_0603_1608Metric");
    fp.attributes.push("smd".to_string());
    fp.pads.push(Pad::smd("1", Point::mm(-0.825, 0.0), (mm(0.8), mm(0.95))));
    fp.pads.push(Pad::smd("2", Point::mm(0.825, 0.0), (mm(0.8), mm(0.95))));
    fp
}

pub fn led_0805() -> Footprint {
    let mut fp = Footprint::new("LED_SMD:LED_0805_2012Metric");
    fp.set_reference("D**");
    fp.set_value("LED_0805_2012Metric");
    fp.attributes.push("smd".to_string());
    fp.pads.push(Pad::smd("1", Point::mm(-0.9375, 0.0), (mm(0.975), mm(1.4))));
    fp.pads.push(Pad::smd("2", Point::mm(0.9375, 0.0), (mm(0.975), mm(1.4))));
    fp
}

impl Default for TestKernel {
    fn default() -> Self {
        Self {
            footprints: vec![resistor_0603(), led_0805()],
            drc: DrcReport::default(),
            plots: RefCell::new(Vec::new()),
        }
    }
}

fn touch(path: &Path, contents: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(path.to_path_buf())
}

impl BoardKernel for TestKernel {
    fn load_footprint(&self, lib_id: &str) -> Result<Option<Footprint>> {
        Ok(self
            .footprints
            .iter()
            .find(|f| f.lib_id == lib_id || f.footprint_name() == lib_id)
            .cloned())
    }

    fn run_drc(&self, _board: &Board) -> Result<DrcReport> {
        Ok(self.drc.clone())
    }

    fn fill_zones(&self, board: &mut Board) -> Result<()> {
        board.zones_need_refill = false;
        Ok(())
    }

    fn plot(&self, _board: &Board, request: &PlotRequest) -> Result<Vec<PathBuf>> {
        self.plots.borrow_mut().push(request.clone());
        let written = match request {
            PlotRequest::Gerbers {
                output_dir,
                drill_files,
                ..
            } => {
                let mut files = vec![
                    touch(&output_dir.join("board-F_Cu.gtl"), "G04*")?,
                    touch(&output_dir.join("board-B_Cu.gbl"), "G04*")?,
                ];
                if *drill_files {
                    files.push(touch(&output_dir.join("board.drl"), "M48")?);
                }
                files
            }
            PlotRequest::Svg { output, .. } => {
                vec![touch(output, r#"<svg xmlns="http://www.w3.org/2000/svg"></svg>"#)?]
            }
            PlotRequest::Pdf { output, .. }
            | PlotRequest::Step { output, .. }
            | PlotRequest::Vrml { output } => vec![touch(output, "plot")?],
        };
        Ok(written)
    }

    fn plot_schematic_pdf(&self, _schematic: &Path, output: &Path) -> Result<()> {
        touch(output, "%PDF-1.7")?;
        Ok(())
    }
}

/// A board plus kernel, lending out a [`SessionContext`].
#[derive(Default)]
pub struct Fixture {
    pub board: Board,
    pub drc: Option<DrcReport>,
    pub kernel: TestKernel,
}

impl Fixture {
    pub fn ctx(&mut self) -> SessionContext<'_> {
        SessionContext {
            board: &mut self.board,
            drc: &mut self.drc,
            kernel: &self.kernel,
        }
    }

    /// Put a bare part at a position, bypassing the library.
    pub fn part(&mut self, reference: &str, x: f64, y: f64) {
        let mut fp = resistor_0603();
        fp.set_reference(reference);
        fp.set_value("10k");
        fp.position = Point::mm(x, y);
        self.board.add_footprint(fp).expect("unique reference");
    }
}
