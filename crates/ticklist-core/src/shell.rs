use std::io::{BufRead, Write};

use anyhow::anyhow;
use tracing::{debug, info, instrument, warn};

use crate::commands::{expand_command_abbrev, parse_position, report};
use crate::config::Config;
use crate::controller::{Command, Controller, Outcome};
use crate::render::Renderer;
use crate::storage::Storage;

const SHELL_COMMANDS: &[&str] = &[
    "add", "select", "complete", "edit", "delete", "done", "undo", "purge", "clear", "theme", "settings",
    "list", "help", "quit",
];

/// Settings menu open/closed flag. Any line that is not a menu item closes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsMenu {
    open: bool,
}

impl SettingsMenu {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn toggle(&mut self) {
        self.open = !self.open;
    }

    pub fn close(&mut self) {
        self.open = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellLine {
    Text(String),
    Select(usize),
    Complete(usize),
    Edit(usize),
    Delete(usize),
    Done,
    Undo,
    Purge,
    Clear,
    Theme,
    Settings,
    List,
    Help,
    Quit,
}

impl ShellLine {
    pub fn is_menu_item(&self) -> bool {
        matches!(self, Self::Theme | Self::Clear)
    }
}

/// Lines starting with `:` are commands. `::text` and `:add text` add
/// `text` literally, so task text may itself start with `:`.
pub fn parse_line(line: &str) -> anyhow::Result<ShellLine> {
    let Some(rest) = line.trim_start().strip_prefix(':') else {
        return Ok(ShellLine::Text(line.to_string()));
    };
    if rest.starts_with(':') {
        return Ok(ShellLine::Text(rest.to_string()));
    }

    let rest = rest.trim_start();
    let (token, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if token.is_empty() {
        return Err(anyhow!("missing command after ':'"));
    }
    let name = expand_command_abbrev(token, SHELL_COMMANDS)
        .ok_or_else(|| anyhow!("unknown or ambiguous command: {token}"))?;
    if name == "add" {
        return Ok(ShellLine::Text(tail.to_string()));
    }
    let args: Vec<&str> = tail.split_whitespace().collect();

    let position = || -> anyhow::Result<usize> {
        match args.as_slice() {
            [one] => parse_position(one),
            _ => Err(anyhow!(":{name} takes exactly one task number")),
        }
    };

    let parsed = match name {
        "select" => ShellLine::Select(position()?),
        "complete" => ShellLine::Complete(position()?),
        "edit" => ShellLine::Edit(position()?),
        "delete" => ShellLine::Delete(position()?),
        "done" => ShellLine::Done,
        "undo" => ShellLine::Undo,
        "purge" => ShellLine::Purge,
        "clear" => ShellLine::Clear,
        "theme" => ShellLine::Theme,
        "settings" => ShellLine::Settings,
        "list" => ShellLine::List,
        "help" => ShellLine::Help,
        _ => ShellLine::Quit,
    };
    Ok(parsed)
}

/// Asks a yes/no question. Anything but `y`/`yes`, including end of
/// input, is a no.
pub fn ask_confirmation<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    prompt: &str,
) -> anyhow::Result<bool> {
    write!(out, "{prompt} [y/N]: ")?;
    out.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(out)?;
        return Ok(false);
    }

    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

#[instrument(skip_all)]
pub fn run_shell<S: Storage, R: BufRead, W: Write>(
    controller: &mut Controller<S>,
    cfg: &Config,
    renderer: &Renderer,
    mut input: R,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("starting interactive shell");
    let confirm_clear = cfg.confirmation;
    let mut menu = SettingsMenu::default();

    writeln!(out, "Type a task and press Enter. :help lists commands.")?;
    renderer.render(controller, out)?;

    loop {
        write!(out, "> ")?;
        out.flush()?;

        let mut raw = String::new();
        if input.read_line(&mut raw)? == 0 {
            writeln!(out)?;
            break;
        }
        let line = raw.trim_end_matches(['\r', '\n']);

        let parsed = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                menu.close();
                writeln!(out, "error: {err:#}")?;
                continue;
            }
        };
        debug!(?parsed, "shell line");

        match parsed {
            ShellLine::Settings => menu.toggle(),
            ref other if !other.is_menu_item() => menu.close(),
            _ => {}
        }

        let result = match parsed {
            ShellLine::Quit => break,
            ShellLine::Help => {
                write_help(out)?;
                continue;
            }
            ShellLine::List | ShellLine::Settings => Ok(None),
            ShellLine::Edit(pos) => edit_interactive(controller, pos, &mut input, out).map(Some),
            ShellLine::Clear => {
                let confirmed = !confirm_clear
                    || ask_confirmation(&mut input, out, "Delete all tasks?")?;
                controller.apply(Command::ClearAll { confirmed }).map(Some)
            }
            other => match command_for(other) {
                Some(command) => controller
                    .apply(command)
                    .map(|outcome| Some(outcome).filter(|o| *o != Outcome::Ignored)),
                None => Ok(None),
            },
        };

        match result {
            Ok(Some(outcome)) => report(out, &outcome)?,
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "shell command failed");
                writeln!(out, "error: {err:#}")?;
            }
        }

        renderer.render(controller, out)?;
        if menu.is_open() {
            renderer.render_settings_menu(controller.theme(), out)?;
        }
    }

    info!("shell finished");
    Ok(())
}

fn command_for(line: ShellLine) -> Option<Command> {
    let command = match line {
        ShellLine::Text(text) => Command::Add(text),
        ShellLine::Select(pos) => Command::ToggleSelect(pos),
        ShellLine::Complete(pos) => Command::ToggleComplete(pos),
        ShellLine::Delete(pos) => Command::Delete(pos),
        ShellLine::Done => Command::MarkSelectedDone,
        ShellLine::Undo => Command::UndoSelectedDone,
        ShellLine::Purge => Command::DeleteSelected,
        ShellLine::Theme => Command::ToggleTheme,
        ShellLine::Edit(_)
        | ShellLine::Clear
        | ShellLine::Settings
        | ShellLine::List
        | ShellLine::Help
        | ShellLine::Quit => return None,
    };
    Some(command)
}

/// Shows the current text, reads one reply line, and commits it. End of
/// input cancels the edit.
fn edit_interactive<S: Storage, R: BufRead, W: Write>(
    controller: &mut Controller<S>,
    pos: usize,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<Outcome> {
    let request = match controller.apply(Command::RequestEdit(pos))? {
        Outcome::EditRequested(request) => request,
        other => return Ok(other),
    };
    report(out, &Outcome::EditRequested(request.clone()))?;
    write!(out, "New text (empty to cancel): ")?;
    out.flush()?;

    let mut raw = String::new();
    let reply = if input.read_line(&mut raw)? == 0 {
        writeln!(out)?;
        None
    } else {
        Some(raw.trim_end_matches(['\r', '\n']).to_string())
    };

    controller.apply(Command::CommitEdit { request, reply })
}

fn write_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Type text and press Enter to add a task.\n\
         ::text      add text that starts with ':' (or :add text)\n\
         :select n   toggle the checkbox of task n\n\
         :complete n toggle completion of task n\n\
         :edit n     rename task n\n\
         :delete n   delete task n\n\
         :done       mark selected tasks done\n\
         :undo       undo done on selected tasks\n\
         :purge      delete selected tasks\n\
         :settings   open or close the settings menu (:theme, :clear)\n\
         :list       show the list\n\
         :quit       leave the shell"
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{ShellLine, ask_confirmation, parse_line, run_shell};
    use crate::config::Config;
    use crate::controller::Controller;
    use crate::render::Renderer;
    use crate::storage::{MemoryStorage, Storage, TASKS_KEY};
    use crate::theme::Theme;

    fn drive(controller: &mut Controller<MemoryStorage>, script: &str) -> String {
        let mut out = Vec::new();
        run_shell(
            controller,
            &Config::default(),
            &Renderer::plain().with_command_prefix(":"),
            Cursor::new(script.as_bytes().to_vec()),
            &mut out,
        )
        .expect("shell");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn parses_commands_and_text() {
        assert_eq!(
            parse_line("Buy milk").expect("parse"),
            ShellLine::Text("Buy milk".to_string())
        );
        assert_eq!(parse_line(":sel 2").expect("parse"), ShellLine::Select(1));
        assert_eq!(parse_line(":q").expect("parse"), ShellLine::Quit);
        assert!(parse_line(":d").is_err());
        assert!(parse_line(":edit").is_err());
        assert!(parse_line(":").is_err());
    }

    #[test]
    fn text_starting_with_colon_is_added_through_escape() {
        assert_eq!(
            parse_line("::) call mom").expect("parse"),
            ShellLine::Text(":) call mom".to_string())
        );
        assert_eq!(
            parse_line(":add :) call mom").expect("parse"),
            ShellLine::Text(":) call mom".to_string())
        );
        assert!(parse_line(":) call mom").is_err());

        let mut controller = Controller::new(MemoryStorage::new());
        drive(&mut controller, "::) call mom\n:a :quit\n:quit\n");

        let texts: Vec<&str> = controller.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec![":) call mom", ":quit"]);
    }

    #[test]
    fn text_lines_add_tasks_and_blank_lines_do_not() {
        let mut controller = Controller::new(MemoryStorage::new());
        drive(&mut controller, "Buy milk\n   \n\nWalk dog\n:quit\n");

        let texts: Vec<&str> = controller.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Buy milk", "Walk dog"]);
    }

    #[test]
    fn edit_reads_the_next_line_as_reply() {
        let mut controller = Controller::new(MemoryStorage::new());
        drive(&mut controller, "A\n:edit 1\nRenamed\n:edit 1\n\n");

        assert_eq!(
            controller.tasks().get(0).map(|t| t.text.as_str()),
            Some("Renamed")
        );
    }

    #[test]
    fn edit_cancelled_by_end_of_input() {
        let mut controller = Controller::new(MemoryStorage::new());
        drive(&mut controller, "A\n:edit 1\n");

        assert_eq!(controller.tasks().get(0).map(|t| t.text.as_str()), Some("A"));
    }

    #[test]
    fn clear_requires_yes() {
        let mut controller = Controller::new(MemoryStorage::new());
        drive(&mut controller, "A\n:clear\nn\n");
        assert_eq!(controller.tasks().len(), 1);

        drive(&mut controller, ":clear\nyes\n");
        assert!(controller.tasks().is_empty());
        assert_eq!(controller.storage().get_item(TASKS_KEY).expect("get"), None);
    }

    #[test]
    fn settings_menu_closes_on_outside_line() {
        let mut controller = Controller::new(MemoryStorage::new());
        let out = drive(&mut controller, ":settings\n:theme\nA\n");

        assert_eq!(controller.theme(), Theme::Dark);
        assert_eq!(out.matches("Settings: dark mode").count(), 2);
        let after_add = out.rsplit("Added task 1.").next().expect("add report");
        assert!(!after_add.contains("Settings:"));
    }

    #[test]
    fn bad_position_reports_error_and_continues() {
        let mut controller = Controller::new(MemoryStorage::new());
        let out = drive(&mut controller, ":del 4\nA\n");

        assert!(out.contains("error: no task #4"));
        assert_eq!(controller.tasks().len(), 1);
    }

    #[test]
    fn confirmation_accepts_only_yes() {
        let mut out = Vec::new();
        assert!(ask_confirmation(&mut Cursor::new("Y\n"), &mut out, "ok?").expect("ask"));
        assert!(!ask_confirmation(&mut Cursor::new("sure\n"), &mut out, "ok?").expect("ask"));
        assert!(!ask_confirmation(&mut Cursor::new(""), &mut out, "ok?").expect("ask"));
    }
}
