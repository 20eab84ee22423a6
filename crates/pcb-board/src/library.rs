//! Lookup of footprints in `.pretty` library directories.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::debug;
use walkdir::WalkDir;

use crate::io::read_footprint_file;
use crate::items::Footprint;

const FOOTPRINT_DIR_VARS: &[&str] = &[
    "KICAD_FOOTPRINT_DIR",
    "KICAD9_FOOTPRINT_DIR",
    "KICAD8_FOOTPRINT_DIR",
];

#[cfg(target_os = "macos")]
const SYSTEM_FOOTPRINT_DIR: &str =
    "/Applications/KiCad/KiCad.app/Contents/SharedSupport/footprints";

#[cfg(target_os = "windows")]
const SYSTEM_FOOTPRINT_DIR: &str = r"C:\Program Files\KiCad\9.0\share\kicad\footprints";

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const SYSTEM_FOOTPRINT_DIR: &str = "/usr/share/kicad/footprints";

/// A set of directories holding `<Library>.pretty/<Name>.kicad_mod` files.
/// A root may itself be a `.pretty` directory.
#[derive(Debug, Clone, Default)]
pub struct FootprintLibrary {
    roots: Vec<PathBuf>,
}

impl FootprintLibrary {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Directories named by the KiCad footprint environment variables, then
    /// the system library, keeping only those that exist.
    pub fn default_roots() -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = FOOTPRINT_DIR_VARS
            .iter()
            .filter_map(|var| std::env::var_os(var))
            .flat_map(|value| std::env::split_paths(&value).collect::<Vec<_>>())
            .collect();
        roots.push(PathBuf::from(SYSTEM_FOOTPRINT_DIR));
        roots.retain(|r| r.is_dir());
        roots.dedup();
        roots
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Names of every library reachable from the roots.
    pub fn libraries(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .pretty_dirs()
            .filter_map(|dir| library_name(&dir))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn pretty_dirs(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.roots.iter().flat_map(|root| {
            WalkDir::new(root)
                .max_depth(2)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_dir() && library_name(e.path()).is_some())
                .map(|e| e.into_path())
        })
    }

    /// Path of the footprint file for `Library:Name`, or for a bare `Name`
    /// searched across all libraries.
    pub fn find(&self, lib_id: &str) -> Option<PathBuf> {
        let (library, name) = match lib_id.split_once(':') {
            Some((lib, name)) => (Some(lib), name),
            None => (None, lib_id),
        };
        let file_name = format!("{name}.kicad_mod");
        self.pretty_dirs()
            .filter(|dir| library.is_none_or(|lib| library_name(dir).as_deref() == Some(lib)))
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
    }

    /// Load a footprint. `Ok(None)` when no library has it.
    pub fn load(&self, lib_id: &str) -> Result<Option<Footprint>> {
        let Some(path) = self.find(lib_id) else {
            debug!("Footprint {lib_id} not found in {} libraries", self.roots.len());
            return Ok(None);
        };
        let mut footprint = read_footprint_file(&path)?;
        footprint.lib_id = match (lib_id.contains(':'), path.parent().and_then(library_name)) {
            (false, Some(lib)) => format!("{lib}:{}", footprint_stem(&path)),
            _ => lib_id.to_string(),
        };
        Ok(Some(footprint))
    }
}

fn library_name(dir: &Path) -> Option<String> {
    let name = dir.file_name()?.to_str()?;
    name.strip_suffix(".pretty").map(str::to_owned)
}

fn footprint_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    const R0603: &str = r#"(footprint "R_0603_1608Metric" (layer "F.Cu")
        (property "Reference" "REF**") (property "Value" "R_0603_1608Metric")
        (attr smd)
        (pad "1" smd roundrect (at -0.825 0) (size 0.8 0.95) (layers "F.Cu" "F.Paste" "F.Mask"))
        (pad "2" smd roundrect (at 0.825 0) (size 0.8 0.95) (layers "F.Cu" "F.Paste" "F.Mask")))"#;

    fn library() -> Result<(TempDir, FootprintLibrary)> {
        let temp = TempDir::new()?;
        temp.child("Resistor_SMD.pretty/R_0603_1608Metric.kicad_mod")
            .write_str(R0603)?;
        temp.child("Capacitor_SMD.pretty/C_0402.kicad_mod")
            .write_str(&R0603.replace("R_0603_1608Metric", "C_0402"))?;
        let lib = FootprintLibrary::new(vec![temp.path().to_path_buf()]);
        Ok((temp, lib))
    }

    #[test]
    fn finds_by_library_and_name() -> Result<()> {
        let (_temp, lib) = library()?;
        assert_eq!(lib.libraries(), vec!["Capacitor_SMD", "Resistor_SMD"]);
        let fp = lib.load("Resistor_SMD:R_0603_1608Metric")?.unwrap();
        assert_eq!(fp.lib_id, "Resistor_SMD:R_0603_1608Metric");
        assert_eq!(fp.pads.len(), 2);
        assert!(lib.load("Capacitor_SMD:R_0603_1608Metric")?.is_none());
        Ok(())
    }

    #[test]
    fn bare_name_searches_every_library() -> Result<()> {
        let (_temp, lib) = library()?;
        let fp = lib.load("C_0402")?.unwrap();
        assert_eq!(fp.lib_id, "Capacitor_SMD:C_0402");
        assert!(lib.load("Missing")?.is_none());
        Ok(())
    }

    #[test]
    fn root_may_be_a_pretty_dir() -> Result<()> {
        let (temp, _) = library()?;
        let lib = FootprintLibrary::new(vec![temp.path().join("Resistor_SMD.pretty")]);
        assert!(lib.find("Resistor_SMD:R_0603_1608Metric").is_some());
        Ok(())
    }
}
