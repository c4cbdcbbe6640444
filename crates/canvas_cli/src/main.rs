//! Canvas store inspection CLI.
//!
//! # Responsibility
//! - Verify `canvas_core` linkage (`ping`).
//! - Print the numbered display of a stored canvas and its recent audit trail.

use canvas_core::db::open_db;
use canvas_core::{
    init_logging, project_display, AuditService, CanvasRepository, CoreConfig,
    SqliteAuditLogRepository, SqliteCanvasRepository,
};
use log::error;
use std::process::ExitCode;
use uuid::Uuid;

const USAGE: &str = "usage: canvas_cli <ping | display <canvas_id> | audit <entity_id>>";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_command module=cli status=error error={message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir)?;
    }

    match args {
        [command] if command == "ping" => {
            println!("canvas_core ping={}", canvas_core::ping());
            println!("canvas_core version={}", canvas_core::core_version());
            Ok(())
        }
        [command, canvas_id] if command == "display" => display(&config, parse_id(canvas_id)?),
        [command, entity_id] if command == "audit" => audit(&config, parse_id(entity_id)?),
        _ => Err(USAGE.to_string()),
    }
}

fn display(config: &CoreConfig, canvas_id: Uuid) -> Result<(), String> {
    let conn = open_db(&config.db_path).map_err(|err| err.to_string())?;
    let repo = SqliteCanvasRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let items = repo
        .read_collection(canvas_id)
        .map_err(|err| err.to_string())?;

    for block in project_display(&items) {
        let Some(head) = items.iter().find(|item| item.item_id == block.item_id) else {
            continue;
        };
        println!(
            "{:>3}  {} [{}] span={}",
            block.display_index,
            head.name,
            head.component_type.as_str(),
            block.span
        );
        for child_id in &block.children {
            if let Some(child) = items.iter().find(|item| item.item_id == *child_id) {
                println!("       - {} [{}]", child.name, child.component_type.as_str());
            }
        }
    }
    Ok(())
}

fn audit(config: &CoreConfig, entity_id: Uuid) -> Result<(), String> {
    let conn = open_db(&config.db_path).map_err(|err| err.to_string())?;
    let repo = SqliteAuditLogRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let service = AuditService::with_limits(repo, config.audit_limits);
    let records = service
        .recent_changes(entity_id, None)
        .map_err(|err| err.to_string())?;

    for record in records {
        println!(
            "{} {} {} by {}",
            record.timestamp,
            record.action_type(),
            record.field_name,
            record.actor.user_name
        );
    }
    Ok(())
}

fn parse_id(value: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value).map_err(|_| format!("invalid id `{value}`\n{USAGE}"))
}
