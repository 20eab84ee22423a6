use anyhow::Result;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use pcb_board::io::{read_board, write_board};
use pcb_board::items::{Pad, Track, new_uuid};
use pcb_board::units::mm;
use pcb_board::{Board, Footprint, Point};

fn sample_board() -> Board {
    let mut board = Board::new();
    board.title_block.title = "Sensor".to_string();
    let mut fp = Footprint::new("Capacitor_SMD:C_0402_1005Metric");
    fp.set_reference("C1");
    fp.set_value("100n");
    fp.position = Point::mm(12.0, 8.0);
    let mut pad = Pad::smd("1", Point::mm(-0.48, 0.0), (mm(0.56), mm(0.62)));
    pad.net = Some("VDD".to_string());
    fp.pads.push(pad);
    board.add_footprint(fp).unwrap();
    board.tracks.push(Track {
        uuid: new_uuid(),
        start: Point::mm(11.52, 8.0),
        end: Point::mm(5.0, 8.0),
        width: mm(0.3),
        layer: "F.Cu".to_string(),
        net: Some("VDD".to_string()),
    });
    board.upsert_net_class("Power").track_width = mm(0.4);
    board.assign_net_class("VDD", "Power");
    board.design.min_clearance = mm(0.15);
    board
}

#[test]
fn save_writes_board_and_project() -> Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("sensor.kicad_pcb");
    write_board(&sample_board(), &path)?;

    assert!(std::fs::read_to_string(&path)?.starts_with("(kicad_pcb"));
    let project: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(temp.child("sensor.kicad_pro").path())?)?;
    assert_eq!(project["meta"]["filename"], "sensor.kicad_pro");
    assert_eq!(project["net_settings"]["netclass_assignments"]["VDD"], "Power");
    assert_eq!(project["board"]["design_settings"]["rules"]["min_clearance"], 0.15);
    Ok(())
}

#[test]
fn reload_restores_rules_and_nets() -> Result<()> {
    let temp = TempDir::new()?;
    let path = temp.path().join("sensor.kicad_pcb");
    write_board(&sample_board(), &path)?;

    let board = read_board(&path)?;
    assert_eq!(board.file_name.as_deref(), Some(path.as_path()));
    assert_eq!(board.title_block.title, "Sensor");
    assert_eq!(board.design.min_clearance, mm(0.15));
    assert_eq!(board.net("VDD").map(|n| n.class.as_str()), Some("Power"));
    assert_eq!(board.net_class("Power").map(|c| c.track_width), Some(mm(0.4)));
    assert_eq!(board.footprint("C1").map(|f| f.value()), Some("100n"));
    assert_eq!(board.tracks[0].net.as_deref(), Some("VDD"));
    Ok(())
}

#[test]
fn project_keys_written_by_kicad_are_kept() -> Result<()> {
    let temp = TempDir::new()?;
    temp.child("sensor.kicad_pro").write_str(
        r#"{"board": {"layer_presets": []}, "libraries": {"pinned_footprint_libs": []}, "meta": {"filename": "sensor.kicad_pro", "version": 1}}"#,
    )?;
    let path = temp.path().join("sensor.kicad_pcb");
    write_board(&sample_board(), &path)?;

    let project: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(temp.child("sensor.kicad_pro").path())?)?;
    assert!(project["libraries"]["pinned_footprint_libs"].is_array());
    assert!(project["board"]["layer_presets"].is_array());
    Ok(())
}

#[test]
fn unreadable_board_reports_path() {
    let err = read_board(std::path::Path::new("/nonexistent/board.kicad_pcb")).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/board.kicad_pcb"));
}
