use anyhow::Result;
use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use serde_json::Value;

const R0603: &str = r#"(footprint "R_0603_1608Metric" (layer "F.Cu")
    (property "Reference" "REF**") (property "Value" "R_0603_1608Metric")
    (attr smd)
    (pad "1" smd roundrect (at -0.825 0) (size 0.8 0.95) (layers "F.Cu" "F.Paste" "F.Mask"))
    (pad "2" smd roundrect (at 0.825 0) (size 0.8 0.95) (layers "F.Cu" "F.Paste" "F.Mask")))"#;

fn footprint_lib(temp: &TempDir) -> Result<std::path::PathBuf> {
    let lib = temp.child("libs");
    lib.child("Resistor_SMD.pretty/R_0603_1608Metric.kicad_mod")
        .write_str(R0603)?;
    Ok(lib.path().to_path_buf())
}

fn responses(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("every stdout line is JSON"))
        .collect()
}

#[test]
fn edits_a_board_over_stdin() -> Result<()> {
    let temp = TempDir::new()?;
    let lib = footprint_lib(&temp)?;
    let project = temp.child("blinky");
    let requests = [
        serde_json::json!({"command": "create_project",
                           "params": {"projectName": "blinky", "path": project.path()}}),
        serde_json::json!({"command": "place_component", "params": {
            "componentId": "Resistor_SMD:R_0603_1608Metric",
            "position": {"x": 10, "y": 10}, "reference": "R1", "value": "330"}}),
        serde_json::json!({"command": "place_component", "params": {
            "componentId": "R_0603_1608Metric",
            "position": {"x": 20, "y": 10}, "reference": "R2", "value": "330"}}),
        serde_json::json!({"command": "add_net", "params": {"name": "LED"}}),
        serde_json::json!({"command": "route_trace", "params": {
            "start": {"componentRef": "R1", "pad": "2"},
            "end": {"componentRef": "R2", "pad": 1},
            "net": "LED"}}),
        serde_json::json!({"command": "save_project"}),
    ];
    let mut input = String::from("\n");
    for request in &requests {
        input.push_str(&request.to_string());
        input.push('\n');
    }

    let output = Command::cargo_bin("pcb-edit")?
        .arg("--footprint-lib")
        .arg(&lib)
        .env_remove("KICAD_FOOTPRINT_DIR")
        .write_stdin(input)
        .output()?;
    assert!(output.status.success());

    let responses = responses(&output.stdout);
    assert_eq!(responses.len(), requests.len());
    for response in &responses {
        assert_eq!(response["success"], true, "{response}");
    }
    assert_eq!(
        responses[4]["trace"]["start"],
        serde_json::json!({"x": 10.825, "y": 10.0, "unit": "mm"})
    );

    let board = std::fs::read_to_string(project.child("blinky.kicad_pcb").path())?;
    assert!(board.contains("\"R2\""));
    assert!(project.child("blinky.kicad_pro").path().is_file());
    Ok(())
}

#[test]
fn missing_footprint_library_is_fatal() -> Result<()> {
    let output = Command::cargo_bin("pcb-edit")?
        .arg("--footprint-lib")
        .arg("/nonexistent/footprints")
        .write_stdin("")
        .output()?;
    assert_eq!(output.status.code(), Some(1));

    let responses = responses(&output.stdout);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["success"], false);
    assert_eq!(responses[0]["errorCode"], "INTERNAL_ERROR");
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
    Ok(())
}

#[test]
fn logs_go_to_the_log_file() -> Result<()> {
    let temp = TempDir::new()?;
    let log = temp.child("pcb-edit.log");
    let output = Command::cargo_bin("pcb-edit")?
        .arg("--log-file")
        .arg(log.path())
        .arg("--debug")
        .write_stdin("{\"command\": \"get_board_info\"}\n")
        .output()?;
    assert!(output.status.success());
    assert_eq!(responses(&output.stdout)[0]["errorCode"], "NO_BOARD_LOADED");
    let logged = std::fs::read_to_string(log.path())?;
    assert!(logged.contains("Handling command: get_board_info"));
    Ok(())
}
