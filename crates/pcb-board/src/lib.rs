//! In-memory model of a KiCad board plus the collaborators around it: file
//! I/O, footprint libraries, schematic sheets and `kicad-cli`.

pub mod board;
pub mod drc;
pub mod geometry;
pub mod io;
pub mod items;
pub mod kernel;
pub mod kicad_cli;
pub mod layers;
pub mod library;
pub mod project;
pub mod schematic;
pub mod units;

pub use board::{Board, BoardError};
pub use drc::{DrcReport, DrcViolation};
pub use geometry::{Point, Rect};
pub use items::{
    BoardText, DesignSettings, Drawing, Footprint, Net, NetClass, Pad, Shape, Track, Via, ViaKind,
    Zone, ZoneFill,
};
pub use kernel::{BoardKernel, KicadKernel, PlotRequest};
pub use layers::{Layer, LayerType};
pub use library::FootprintLibrary;
pub use schematic::{SchematicDocument, SymbolSpec};
pub use units::LengthUnit;
