use std::io::{self, IsTerminal, Write};

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::controller::{Command, Controller, Outcome};
use crate::render::Renderer;
use crate::shell;
use crate::storage::Storage;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "edit", "delete", "select", "complete", "done", "undo", "purge", "clear",
        "theme", "export", "shell", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Turns a 1-based position typed by the user into a list index.
pub fn parse_position(token: &str) -> anyhow::Result<usize> {
    let n: usize = token
        .trim()
        .parse()
        .with_context(|| format!("expected a task number, got: {token}"))?;
    n.checked_sub(1)
        .ok_or_else(|| anyhow!("task numbers start at 1"))
}

#[instrument(skip(controller, cfg, renderer, inv, out))]
pub fn dispatch<S: Storage, W: Write>(
    controller: &mut Controller<S>,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
    out: &mut W,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "add" => cmd_add(controller, &inv.command_args, out),
        "list" => renderer.render(controller, out),
        "edit" => cmd_edit(controller, &inv.command_args, out),
        "delete" => cmd_delete(controller, &inv.command_args, out),
        "select" => cmd_select(controller, &inv.command_args, out),
        "complete" => cmd_complete(controller, &inv.command_args, out),
        "done" => run_command(controller, Command::MarkSelectedDone, out),
        "undo" => run_command(controller, Command::UndoSelectedDone, out),
        "purge" => run_command(controller, Command::DeleteSelected, out),
        "clear" => cmd_clear(controller, cfg, &inv.command_args, out),
        "theme" => run_command(controller, Command::ToggleTheme, out),
        "export" => cmd_export(controller, out),
        "shell" => {
            let stdin = io::stdin();
            let shell_renderer = renderer.clone().with_command_prefix(":");
            shell::run_shell(controller, cfg, &shell_renderer, stdin.lock(), out)
        }
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn run_command<S: Storage, W: Write>(
    controller: &mut Controller<S>,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()> {
    let outcome = controller.apply(command)?;
    report(out, &outcome)
}

/// One line of feedback per command outcome, shared with the shell.
pub fn report<W: Write>(out: &mut W, outcome: &Outcome) -> anyhow::Result<()> {
    match outcome {
        Outcome::Added { position } => writeln!(out, "Added task {}.", position + 1)?,
        Outcome::Edited { position } => writeln!(out, "Edited task {}.", position + 1)?,
        Outcome::EditRequested(request) => writeln!(
            out,
            "Edit task {}: {}",
            request.position + 1,
            request.current_text
        )?,
        Outcome::Selected { position, selected } => writeln!(
            out,
            "Task {} {}.",
            position + 1,
            if *selected { "selected" } else { "unselected" }
        )?,
        Outcome::Completed {
            position,
            completed,
        } => writeln!(
            out,
            "Task {} marked {}.",
            position + 1,
            if *completed { "done" } else { "not done" }
        )?,
        Outcome::Removed { count } => writeln!(out, "Deleted {count} task(s).")?,
        Outcome::Changed { count } => writeln!(out, "Updated {count} task(s).")?,
        Outcome::ThemeChanged(theme) => writeln!(out, "Theme: {}.", theme.storage_value())?,
        Outcome::Ignored => writeln!(out, "Nothing changed.")?,
    }
    Ok(())
}

#[instrument(skip(controller, args, out))]
fn cmd_add<S: Storage, W: Write>(
    controller: &mut Controller<S>,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command add");
    run_command(controller, Command::Add(args.join(" ")), out)
}

#[instrument(skip(controller, args, out))]
fn cmd_edit<S: Storage, W: Write>(
    controller: &mut Controller<S>,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command edit");
    let (pos, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("edit requires a task number"))?;
    if rest.is_empty() {
        return Err(anyhow!("edit requires replacement text"));
    }

    let request = match controller.apply(Command::RequestEdit(parse_position(pos)?))? {
        Outcome::EditRequested(request) => request,
        other => return report(out, &other),
    };
    let reply = Some(rest.join(" "));
    run_command(controller, Command::CommitEdit { request, reply }, out)
}

#[instrument(skip(controller, args, out))]
fn cmd_delete<S: Storage, W: Write>(
    controller: &mut Controller<S>,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command delete");
    let pos = single_position(args, "delete")?;
    run_command(controller, Command::Delete(pos), out)
}

#[instrument(skip(controller, args, out))]
fn cmd_select<S: Storage, W: Write>(
    controller: &mut Controller<S>,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command select");
    let pos = single_position(args, "select")?;
    run_command(controller, Command::ToggleSelect(pos), out)
}

#[instrument(skip(controller, args, out))]
fn cmd_complete<S: Storage, W: Write>(
    controller: &mut Controller<S>,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command complete");
    let pos = single_position(args, "complete")?;
    run_command(controller, Command::ToggleComplete(pos), out)
}

#[instrument(skip(controller, cfg, args, out))]
fn cmd_clear<S: Storage, W: Write>(
    controller: &mut Controller<S>,
    cfg: &Config,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command clear");

    let forced = args.iter().any(|a| a == "--yes" || a == "-y");
    let confirmed = if forced || !cfg.confirmation {
        true
    } else if io::stdin().is_terminal() {
        let stdin = io::stdin();
        shell::ask_confirmation(&mut stdin.lock(), out, "Delete all tasks?")?
    } else {
        debug!("stdin is not a terminal; treating clear as declined");
        false
    };

    run_command(controller, Command::ClearAll { confirmed }, out)
}

#[instrument(skip(controller, out))]
fn cmd_export<S: Storage, W: Write>(controller: &Controller<S>, out: &mut W) -> anyhow::Result<()> {
    info!("command export");
    let rendered = serde_json::to_string_pretty(controller.tasks().as_slice())?;
    writeln!(out, "{rendered}")?;
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Commands: add <text>, list, edit <n> <text>, delete <n>, select <n>, complete <n>, \
         done, undo, purge, clear [--yes], theme, export, shell, help, version"
    )?;
    Ok(())
}

fn single_position(args: &[String], command: &str) -> anyhow::Result<usize> {
    match args {
        [one] => parse_position(one),
        [] => Err(anyhow!("{command} requires a task number")),
        _ => Err(anyhow!("{command} takes exactly one task number")),
    }
}

#[cfg(test)]
mod tests {
    use super::{expand_command_abbrev, known_command_names, parse_position};

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("pu", &known), Some("purge"));
        assert_eq!(expand_command_abbrev("done", &known), Some("done"));
        assert_eq!(expand_command_abbrev("d", &known), None);
        assert_eq!(expand_command_abbrev("cl", &known), Some("clear"));
    }

    #[test]
    fn positions_are_one_based() {
        assert_eq!(parse_position("1").expect("parse"), 0);
        assert_eq!(parse_position(" 3 ").expect("parse"), 2);
        assert!(parse_position("0").is_err());
        assert!(parse_position("x").is_err());
    }
}
