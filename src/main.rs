#[macro_use]
mod macros;

mod cli;
mod desk;
mod error;
mod metadata;
mod query;
mod render;
mod server;
mod settings;
mod source;
mod types;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use dialoguer::{Confirm, Input};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, ConfigCommand, NoteCommand, TaskCommand, UserCommand};
use crate::desk::Desk;
use crate::error::{ServiceError, ServiceResult};
use crate::metadata::{PKG_DESCRIPTION, PKG_NAME, PKG_VERSION};
use crate::settings::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let write = cli.command.is_write();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let prefix = if write { "could not save:" } else { "could not load:" };
            eprintln!("{} {e}", prefix.red().bold());
            ExitCode::FAILURE
        }
    }
}

fn settings_path(cli: &Cli) -> ServiceResult<PathBuf> {
    cli.global
        .settings
        .clone()
        .or_else(Settings::default_path)
        .ok_or_else(|| ServiceError::Config("No config directory; pass --settings".to_string()))
}

async fn run(cli: Cli) -> ServiceResult<()> {
    if let Command::Version = cli.command {
        println!("{PKG_NAME} {PKG_VERSION}");
        println!("{PKG_DESCRIPTION}");
        return Ok(());
    }

    let path = settings_path(&cli)?;
    let file_settings = Settings::load(&path)?;
    let mut overrides = cli.global.overrides();
    if let Command::Serve(args) = &cli.command {
        args.apply_to(&mut overrides);
    }
    let settings = file_settings.clone().apply(overrides);

    match cli.command {
        Command::Config(ConfigCommand::Show) => {
            println!("{}", "settings file:".dimmed());
            println!("{}", path.display());
            println!("{}", render::json(&settings)?);
            Ok(())
        }
        Command::Config(ConfigCommand::Edit) => edit_settings(file_settings, &path),
        Command::Serve(_) => {
            let desk = Desk::new(source::from_settings(&settings)?);
            tracing::info!(source = desk.source_name(), "Starting {PKG_NAME} MCP server");
            server::serve(desk, &settings).await
        }
        command => {
            settings.validate()?;
            let desk = Desk::new(source::from_settings(&settings)?);
            dispatch(&desk, command, cli.global.json)
        }
    }
}

fn show<T: Serialize>(value: &T, json: bool, text: impl FnOnce(&T) -> String) -> ServiceResult<()> {
    if json {
        println!("{}", render::json(value)?);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}

fn confirmed(prompt: String, yes: bool) -> ServiceResult<bool> {
    if yes {
        return Ok(true);
    }
    let ok = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| ServiceError::Other(e.to_string()))?;
    if !ok {
        println!("{}", "Cancelled".dimmed());
    }
    Ok(ok)
}

fn deleted(kind: &str, id: &str, json: bool) -> ServiceResult<()> {
    show(&serde_json::json!({ "deleted": id }), json, |_| {
        format!("{} {kind} {id}", "Deleted".green())
    })
}

fn dispatch(desk: &Desk, command: Command, json: bool) -> ServiceResult<()> {
    match command {
        Command::Tasks(cmd) => match cmd {
            TaskCommand::List(args) => {
                show(&desk.task_board(&args.filter(), args.sort)?, json, |t| render::tasks(t))
            }
            TaskCommand::Get { id } => show(&desk.task(&id)?, json, render::task),
            TaskCommand::Create(args) => {
                show(&desk.create_task(args.into_new_task())?, json, render::task)
            }
            TaskCommand::Update(args) => {
                show(&desk.update_task(&args.id, args.patch())?, json, render::task)
            }
            TaskCommand::Delete { id, yes } => {
                if !confirmed(format!("Delete task {id}?"), yes)? {
                    return Ok(());
                }
                desk.delete_task(&id)?;
                deleted("task", &id, json)
            }
            TaskCommand::Assign { id, user } => {
                show(&desk.assign_task(&id, Some(&user))?, json, render::task)
            }
            TaskCommand::Status { id, status } => {
                show(&desk.set_task_status(&id, status)?, json, render::task)
            }
            TaskCommand::Complete { id } => show(&desk.complete_task(&id)?, json, render::task),
            TaskCommand::Board => {
                show(&desk.assignment_board()?, json, |b| render::assignments(b))
            }
            TaskCommand::Stats { user } => {
                show(&desk.task_stats(user.as_deref())?, json, render::stats)
            }
        },
        Command::Notes(cmd) => match cmd {
            NoteCommand::List(args) => {
                show(&desk.note_board(&args.filter())?, json, |n| render::notes(n))
            }
            NoteCommand::Get { id } => show(&desk.note(&id)?, json, render::note),
            NoteCommand::Create(args) => {
                show(&desk.create_note(args.into_new_note())?, json, render::note)
            }
            NoteCommand::Update(args) => {
                show(&desk.update_note(&args.id, args.patch())?, json, render::note)
            }
            NoteCommand::Delete { id, yes } => {
                if !confirmed(format!("Delete note {id}?"), yes)? {
                    return Ok(());
                }
                desk.delete_note(&id)?;
                deleted("note", &id, json)
            }
            NoteCommand::Category { id, category } => {
                show(&desk.set_note_category(&id, category)?, json, render::note)
            }
        },
        Command::Users(cmd) => match cmd {
            UserCommand::List { role } => show(&desk.users(role)?, json, |u| render::users(u)),
            UserCommand::Get { id } => show(&desk.user(&id)?, json, render::user),
            UserCommand::Create(args) => {
                show(&desk.create_user(args.into_new_user())?, json, render::user)
            }
            UserCommand::Update(args) => {
                show(&desk.update_user(&args.id, args.patch())?, json, render::user)
            }
            UserCommand::Delete { id, yes } => {
                if !confirmed(format!("Delete user {id}?"), yes)? {
                    return Ok(());
                }
                desk.delete_user(&id)?;
                deleted("user", &id, json)
            }
            UserCommand::Role { id, role } => {
                show(&desk.set_user_role(&id, role)?, json, render::user)
            }
        },
        Command::Config(_) | Command::Serve(_) | Command::Version => Ok(()),
    }
}

fn edit_settings(current: Settings, path: &std::path::Path) -> ServiceResult<()> {
    let prompt_err = |e: dialoguer::Error| ServiceError::Other(e.to_string());

    let api_url: String = Input::new()
        .with_prompt("REST backend URL")
        .default(current.api_url.clone())
        .interact_text()
        .map_err(prompt_err)?;
    let offline = Confirm::new()
        .with_prompt("Offline mode (fallback store only)?")
        .default(current.offline)
        .interact()
        .map_err(prompt_err)?;
    let mock_delay_ms: u64 = Input::new()
        .with_prompt("Fallback store delay (ms)")
        .default(current.mock_delay_ms)
        .interact_text()
        .map_err(prompt_err)?;
    let store_file: String = Input::new()
        .with_prompt("Fallback store file (empty keeps it in memory)")
        .default(
            current
                .store_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        )
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;
    let enable_stdio = Confirm::new()
        .with_prompt("Serve MCP over stdio?")
        .default(current.enable_stdio)
        .interact()
        .map_err(prompt_err)?;
    let enable_http = Confirm::new()
        .with_prompt("Serve MCP over streamable HTTP?")
        .default(current.enable_http)
        .interact()
        .map_err(prompt_err)?;
    let http_addr: String = Input::new()
        .with_prompt("HTTP bind address")
        .default(current.http_addr.clone())
        .interact_text()
        .map_err(prompt_err)?;

    let updated = Settings {
        api_url,
        offline,
        mock_delay_ms,
        store_file: (!store_file.trim().is_empty()).then(|| PathBuf::from(store_file.trim())),
        http_addr,
        enable_stdio,
        enable_http,
    };
    updated.validate()?;
    updated.save(path)?;
    tracing::info!(path = %path.display(), "Settings saved");
    println!("{} {}", "Saved".green(), path.display());
    Ok(())
}
