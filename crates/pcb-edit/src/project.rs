//! Creating, opening and saving the board the session works on.

use std::path::{Path, PathBuf};

use chrono::Local;
use log::{info, warn};
use pcb_board::{Board, BoardKernel};
use serde::Deserialize;
use serde_json::json;

use crate::error::{CommandError, CommandResult, KernelResultExt, required};
use crate::files::expand_path;
use crate::response::Outcome;
use crate::session::BoardSession;

const DEFAULT_PROJECT_NAME: &str = "New_Project";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    pub project_name: Option<String>,
    pub path: Option<String>,
    pub template: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenProject {
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProject {
    pub filename: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ProjectCommand {
    Create(CreateProject),
    Open(OpenProject),
    Save(SaveProject),
    Info,
}

/// Project commands swap the whole board in and out, so they work on the
/// session itself rather than on a borrowed board.
pub fn execute(
    session: &mut BoardSession,
    kernel: &dyn BoardKernel,
    command: ProjectCommand,
) -> CommandResult<Outcome> {
    match command {
        ProjectCommand::Create(params) => create_project(session, kernel, params),
        ProjectCommand::Open(params) => open_project(session, kernel, params),
        ProjectCommand::Save(params) => {
            let board = session.board_mut().ok_or(CommandError::NoBoardLoaded)?;
            save_project(board, kernel, params)
        }
        ProjectCommand::Info => {
            let board = session.board().ok_or(CommandError::NoBoardLoaded)?;
            Ok(project_info(board))
        }
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn create_project(
    session: &mut BoardSession,
    kernel: &dyn BoardKernel,
    params: CreateProject,
) -> CommandResult<Outcome> {
    let name = params
        .project_name
        .as_deref()
        .map(|n| n.trim_end_matches(".kicad_pro"))
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_PROJECT_NAME)
        .to_string();
    let dir = match params.path.as_deref() {
        Some(path) => expand_path(path),
        None => std::env::current_dir()
            .map_err(anyhow::Error::from)
            .or_internal("Failed to resolve the working directory")?,
    };
    let project_path = dir.join(format!("{name}.kicad_pro"));
    let board_path = project_path.with_extension("kicad_pcb");

    let mut board = Board::new();
    board.title_block.title = name.clone();
    board.title_block.date = Local::now().format("%Y-%m-%d").to_string();
    if let Some(template) = params.template.as_deref() {
        let template_path = expand_path(template);
        if template_path.exists() {
            let template = kernel
                .load_board(&template_path)
                .or_internal("Failed to load template board")?;
            board.design = template.design.clone();
            board.layers = template.layers.clone();
            board.thickness = template.thickness;
            *board.default_net_class_mut() = template.default_net_class().clone();
            info!("Copied design settings from {}", template_path.display());
        } else {
            warn!("Template {} does not exist; using defaults", template_path.display());
        }
    }
    board.file_name = Some(board_path.clone());

    std::fs::create_dir_all(&dir)
        .map_err(anyhow::Error::from)
        .and_then(|_| kernel.save_board(&board, &board_path))
        .or_internal("Failed to create project")?;
    session.install(board);

    Ok(Outcome::new(format!("Created project: {name}")).with(
        "project",
        json!({"name": name, "path": project_path, "boardPath": board_path}),
    ))
}

fn open_project(
    session: &mut BoardSession,
    kernel: &dyn BoardKernel,
    params: OpenProject,
) -> CommandResult<Outcome> {
    let filename = expand_path(&required(params.filename, "filename")?);
    let board_path: PathBuf = if filename.extension().is_some_and(|e| e == "kicad_pro") {
        filename.with_extension("kicad_pcb")
    } else {
        filename.clone()
    };

    let mut board = kernel
        .load_board(&board_path)
        .or_internal("Failed to open project")?;
    board.file_name = Some(board_path.clone());
    session.install(board);

    let basename = board_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Outcome::new(format!("Opened project: {basename}")).with(
        "project",
        json!({"name": stem(&board_path), "path": filename, "boardPath": board_path}),
    ))
}

fn save_project(
    board: &mut Board,
    kernel: &dyn BoardKernel,
    params: SaveProject,
) -> CommandResult<Outcome> {
    let path = params
        .filename
        .as_deref()
        .map(expand_path)
        .or_else(|| board.file_name.clone())
        .ok_or_else(|| CommandError::Internal {
            message: "Failed to save project".to_string(),
            details: "The board has no file name; pass filename to save it".to_string(),
        })?;
    if board.zones_need_refill
        && let Err(err) = kernel.fill_zones(board)
    {
        warn!("Saving with stale zone fills: {err:#}");
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(anyhow::Error::from)
            .or_internal("Failed to save project")?;
    }
    kernel
        .save_board(board, &path)
        .or_internal("Failed to save project")?;
    // Only a successful save-as retargets the board.
    board.file_name = Some(path.clone());

    Ok(Outcome::new(format!("Saved project to: {}", path.display()))
        .with("project", json!({"name": stem(&path), "path": path})))
}

fn project_info(board: &Board) -> Outcome {
    let title = &board.title_block;
    let comment = |n: u32| {
        title
            .comments
            .iter()
            .find(|(i, _)| *i == n)
            .map(|(_, text)| text.as_str())
            .unwrap_or_default()
    };
    let path = board.file_name.as_deref();
    Outcome::data().with(
        "project",
        json!({
            "name": path.map(stem).unwrap_or_default(),
            "path": path,
            "title": title.title,
            "date": title.date,
            "revision": title.rev,
            "company": title.company,
            "comment1": comment(1),
            "comment2": comment(2),
            "comment3": comment(3),
            "comment4": comment(4),
        }),
    )
}
