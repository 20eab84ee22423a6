use anyhow::Result;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use pcb_board::{FootprintLibrary, KicadKernel};
use pcb_edit::CommandRouter;
use pcb_edit::server::serve;
use serde_json::{Value, json};
use serial_test::serial;

const HOLE: &str = r#"(footprint "TestPoint_Pad_D1.0mm" (layer "F.Cu")
    (property "Reference" "TP**") (property "Value" "TestPoint")
    (pad "1" smd circle (at 0 0) (size 1 1) (layers "F.Cu" "F.Mask")))"#;

fn run(router: &mut CommandRouter, requests: &[Value]) -> Result<Vec<Value>> {
    let input: String = requests.iter().map(|r| format!("{r}\n")).collect();
    let mut output = Vec::new();
    serve(router, input.as_bytes(), &mut output)?;
    Ok(String::from_utf8(output)?
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?)
}

#[test]
#[serial]
fn footprint_dir_from_environment() -> Result<()> {
    let temp = TempDir::new()?;
    temp.child("lib/TestPoint.pretty/TestPoint_Pad_D1.0mm.kicad_mod")
        .write_str(HOLE)?;
    // SAFETY: every test reading KICAD_FOOTPRINT_DIR is serialized.
    unsafe { std::env::set_var("KICAD_FOOTPRINT_DIR", temp.child("lib").path()) };
    let library = FootprintLibrary::new(FootprintLibrary::default_roots());
    unsafe { std::env::remove_var("KICAD_FOOTPRINT_DIR") };

    let mut router = CommandRouter::new(Box::new(KicadKernel::new(library)));
    let responses = run(
        &mut router,
        &[
            json!({"command": "create_project",
                   "params": {"projectName": "tp", "path": temp.path()}}),
            json!({"command": "place_component_array", "params": {
                "componentId": "TestPoint:TestPoint_Pad_D1.0mm",
                "pattern": "grid", "count": 4, "rows": 2, "columns": 2,
                "startPosition": {"x": 0, "y": 0}, "spacingX": 2.54, "spacingY": 2.54,
                "referencePrefix": "TP"}}),
            json!({"command": "get_component_list"}),
        ],
    )?;
    assert_eq!(responses[1]["success"], true, "{}", responses[1]);
    let references: Vec<&str> = responses[2]["components"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["reference"].as_str())
        .collect();
    assert_eq!(references, ["TP1", "TP2", "TP3", "TP4"]);
    Ok(())
}

#[test]
#[serial]
fn session_survives_failures() -> Result<()> {
    let temp = TempDir::new()?;
    let mut router = CommandRouter::new(Box::new(KicadKernel::default()));
    let responses = run(
        &mut router,
        &[
            json!({"command": "add_net", "params": {"name": "GND"}}),
            json!({"command": "create_project", "params": {"path": temp.path()}}),
            json!({"command": "place_component", "params": {
                "componentId": "Nope:Missing", "position": {"x": 0, "y": 0}}}),
            json!({"command": "add_net", "params": {"name": "GND"}}),
            json!({"command": "add_net", "params": {"name": "GND"}}),
            json!({"command": "get_nets_list"}),
            json!({"command": "route_differential_pair", "params": {
                "startPos": {"x": 0, "y": 0}, "endPos": {"x": 10, "y": 0},
                "netPos": "USB_P", "netNeg": "USB_N"}}),
        ],
    )?;
    let codes: Vec<&str> = responses
        .iter()
        .map(|r| r["errorCode"].as_str().unwrap_or("OK"))
        .collect();
    assert_eq!(
        codes,
        ["NO_BOARD_LOADED", "OK", "NOT_FOUND", "OK", "OK", "OK", "NOT_FOUND"]
    );
    let nets = responses[5]["nets"].as_array().unwrap();
    assert_eq!(nets.iter().filter(|n| n["name"] == "GND").count(), 1);
    assert!(temp.child("New_Project.kicad_pcb").path().is_file());
    Ok(())
}
