//! The closed set of commands the server understands.

use serde_json::Value;

use crate::alignment::AlignComponents;
use crate::board_ops::BoardCommand;
use crate::design_rules::DesignRuleCommand;
use crate::error::{CommandError, CommandResult};
use crate::export::ExportCommand;
use crate::params::parse;
use crate::placement::PlacementCommand;
use crate::project::ProjectCommand;
use crate::routing::RoutingCommand;
use crate::schematic::SchematicCommand;

/// Every command name, in the order the groups are documented.
pub const COMMAND_NAMES: &[&str] = &[
    // project
    "create_project",
    "open_project",
    "save_project",
    "get_project_info",
    // board
    "set_board_size",
    "add_layer",
    "set_active_layer",
    "get_board_info",
    "get_layer_list",
    "get_board_2d_view",
    "add_board_outline",
    "add_mounting_hole",
    "add_text",
    // components
    "place_component",
    "move_component",
    "rotate_component",
    "delete_component",
    "edit_component",
    "get_component_properties",
    "get_component_list",
    "place_component_array",
    "align_components",
    "duplicate_component",
    // routing
    "add_net",
    "route_trace",
    "add_via",
    "delete_trace",
    "get_nets_list",
    "create_netclass",
    "add_copper_pour",
    "route_differential_pair",
    // design rules
    "set_design_rules",
    "get_design_rules",
    "run_drc",
    "get_drc_violations",
    // export
    "export_gerber",
    "export_pdf",
    "export_svg",
    "export_3d",
    "export_bom",
    // schematic
    "create_schematic",
    "load_schematic",
    "add_schematic_component",
    "add_schematic_wire",
    "list_schematic_libraries",
    "export_schematic_pdf",
];

/// Commands accepted before any board is loaded.
const BOARDLESS: &[&str] = &["create_project", "open_project", "list_schematic_libraries"];

pub fn is_known(name: &str) -> bool {
    COMMAND_NAMES.contains(&name)
}

pub fn requires_board(name: &str) -> bool {
    !BOARDLESS.contains(&name)
}

#[derive(Debug, Clone)]
pub enum Command {
    Project(ProjectCommand),
    Board(BoardCommand),
    Placement(PlacementCommand),
    Align(AlignComponents),
    Routing(RoutingCommand),
    DesignRule(DesignRuleCommand),
    Export(ExportCommand),
    Schematic(SchematicCommand),
}

impl Command {
    /// Decode a request into its typed command.
    pub fn from_request(name: &str, params: Value) -> CommandResult<Self> {
        use Command as C;
        let command = match name {
            "create_project" => C::Project(ProjectCommand::Create(parse(params)?)),
            "open_project" => C::Project(ProjectCommand::Open(parse(params)?)),
            "save_project" => C::Project(ProjectCommand::Save(parse(params)?)),
            "get_project_info" => C::Project(ProjectCommand::Info),

            "set_board_size" => C::Board(BoardCommand::SetSize(parse(params)?)),
            "add_layer" => C::Board(BoardCommand::AddLayer(parse(params)?)),
            "set_active_layer" => C::Board(BoardCommand::SetActiveLayer(parse(params)?)),
            "get_board_info" => C::Board(BoardCommand::Info),
            "get_layer_list" => C::Board(BoardCommand::LayerList),
            "get_board_2d_view" => C::Board(BoardCommand::View(parse(params)?)),
            "add_board_outline" => C::Board(BoardCommand::AddOutline(parse(params)?)),
            "add_mounting_hole" => C::Board(BoardCommand::AddMountingHole(parse(params)?)),
            "add_text" => C::Board(BoardCommand::AddText(parse(params)?)),

            "place_component" => C::Placement(PlacementCommand::Place(parse(params)?)),
            "move_component" => C::Placement(PlacementCommand::Move(parse(params)?)),
            "rotate_component" => C::Placement(PlacementCommand::Rotate(parse(params)?)),
            "delete_component" => C::Placement(PlacementCommand::Delete(parse(params)?)),
            "edit_component" => C::Placement(PlacementCommand::Edit(parse(params)?)),
            "get_component_properties" => {
                C::Placement(PlacementCommand::Properties(parse(params)?))
            }
            "get_component_list" => C::Placement(PlacementCommand::List),
            "place_component_array" => C::Placement(PlacementCommand::PlaceArray(parse(params)?)),
            "align_components" => C::Align(parse(params)?),
            "duplicate_component" => C::Placement(PlacementCommand::Duplicate(parse(params)?)),

            "add_net" => C::Routing(RoutingCommand::AddNet(parse(params)?)),
            "route_trace" => C::Routing(RoutingCommand::RouteTrace(parse(params)?)),
            "add_via" => C::Routing(RoutingCommand::AddVia(parse(params)?)),
            "delete_trace" => C::Routing(RoutingCommand::DeleteTrace(parse(params)?)),
            "get_nets_list" => C::Routing(RoutingCommand::NetsList),
            "create_netclass" => C::Routing(RoutingCommand::CreateNetClass(parse(params)?)),
            "add_copper_pour" => C::Routing(RoutingCommand::AddCopperPour(parse(params)?)),
            "route_differential_pair" => {
                C::Routing(RoutingCommand::RouteDifferentialPair(parse(params)?))
            }

            "set_design_rules" => C::DesignRule(DesignRuleCommand::Set(parse(params)?)),
            "get_design_rules" => C::DesignRule(DesignRuleCommand::Get),
            "run_drc" => C::DesignRule(DesignRuleCommand::RunDrc(parse(params)?)),
            "get_drc_violations" => C::DesignRule(DesignRuleCommand::Violations(parse(params)?)),

            "export_gerber" => C::Export(ExportCommand::Gerber(parse(params)?)),
            "export_pdf" => C::Export(ExportCommand::Pdf(parse(params)?)),
            "export_svg" => C::Export(ExportCommand::Svg(parse(params)?)),
            "export_3d" => C::Export(ExportCommand::ThreeD(parse(params)?)),
            "export_bom" => C::Export(ExportCommand::Bom(parse(params)?)),

            "create_schematic" => C::Schematic(SchematicCommand::Create(parse(params)?)),
            "load_schematic" => C::Schematic(SchematicCommand::Load(parse(params)?)),
            "add_schematic_component" => {
                C::Schematic(SchematicCommand::AddComponent(parse(params)?))
            }
            "add_schematic_wire" => C::Schematic(SchematicCommand::AddWire(parse(params)?)),
            "list_schematic_libraries" => {
                C::Schematic(SchematicCommand::ListLibraries(parse(params)?))
            }
            "export_schematic_pdf" => C::Schematic(SchematicCommand::ExportPdf(parse(params)?)),

            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_listed_name_decodes() {
        for name in COMMAND_NAMES {
            match Command::from_request(name, json!({})) {
                Err(CommandError::UnknownCommand(_)) => panic!("{name} is not dispatched"),
                // Some commands have required fields without defaults.
                Ok(_) | Err(_) => {}
            }
        }
        assert!(matches!(
            Command::from_request("launch_rocket", Value::Null),
            Err(CommandError::UnknownCommand(name)) if name == "launch_rocket"
        ));
    }

    #[test]
    fn boardless_commands() {
        assert!(!requires_board("create_project"));
        assert!(!requires_board("list_schematic_libraries"));
        assert!(requires_board("save_project"));
        assert!(requires_board("create_schematic"));
        assert!(is_known("export_3d"));
        assert!(!is_known("export_step"));
    }

    #[test]
    fn params_are_typed() {
        let command = Command::from_request("delete_trace", json!({"traceUuid": "abc"})).unwrap();
        match command {
            Command::Routing(RoutingCommand::DeleteTrace(params)) => {
                assert_eq!(params.trace_id.as_deref(), Some("abc"))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            Command::from_request("add_net", json!({"name": 5})),
            Err(CommandError::InvalidParameter(_))
        ));
    }
}
