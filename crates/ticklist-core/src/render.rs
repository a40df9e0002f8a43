use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::actions::ActionVisibility;
use crate::config::Config;
use crate::controller::Controller;
use crate::storage::Storage;
use crate::theme::{Palette, Theme};

/// Draws the current controller state. Holds no task state of its own.
#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    command_prefix: &'static str,
}

impl Renderer {
    /// Colour needs both `color=on` and a terminal on stdout.
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color && io::stdout().is_terminal(),
            command_prefix: "",
        }
    }

    pub fn plain() -> Self {
        Self {
            color: false,
            command_prefix: "",
        }
    }

    /// Shell commands are typed with a leading `:`.
    pub fn with_command_prefix(mut self, prefix: &'static str) -> Self {
        self.command_prefix = prefix;
        self
    }

    #[tracing::instrument(skip_all)]
    pub fn render<S: Storage, W: Write>(
        &self,
        controller: &Controller<S>,
        out: &mut W,
    ) -> anyhow::Result<()> {
        let palette = controller.theme().palette();
        let tasks = controller.tasks();

        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
        } else {
            let headers = vec![
                "#".to_string(),
                "Sel".to_string(),
                "Done".to_string(),
                "Task".to_string(),
            ];

            let rows = tasks
                .iter()
                .enumerate()
                .map(|(idx, task)| {
                    let checkbox = if task.selected { "[x]" } else { "[ ]" };
                    let done = if task.completed { "yes" } else { "" };
                    let text_code = if task.completed {
                        palette.completed
                    } else {
                        palette.text
                    };
                    vec![
                        self.paint(&(idx + 1).to_string(), palette.position),
                        self.paint(checkbox, palette.checkbox),
                        done.to_string(),
                        self.paint(&task.text, text_code),
                    ]
                })
                .collect();

            write_table(&mut *out, headers, rows)?;
        }

        self.render_controls(controller.visibility(), &palette, out)
    }

    pub fn render_controls<W: Write>(
        &self,
        visibility: ActionVisibility,
        palette: &Palette,
        out: &mut W,
    ) -> anyhow::Result<()> {
        let visible = visibility.visible();
        if visible.is_empty() {
            return Ok(());
        }

        let controls = visible
            .iter()
            .map(|action| {
                format!(
                    "{} [{}{}]",
                    action.label(),
                    self.command_prefix,
                    action.command_name()
                )
            })
            .collect::<Vec<_>>()
            .join(" | ");
        writeln!(out, "{}", self.paint(&format!("Actions: {controls}"), palette.controls))?;
        Ok(())
    }

    pub fn render_settings_menu<W: Write>(&self, theme: Theme, out: &mut W) -> anyhow::Result<()> {
        let palette = theme.palette();
        let dark = if theme == Theme::Dark { "on" } else { "off" };
        writeln!(
            out,
            "{}",
            self.paint(
                &format!(
                    "Settings: dark mode {dark} [{p}theme] | clear all tasks [{p}clear]",
                    p = self.command_prefix
                ),
                palette.controls
            )
        )?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let last = column_count.saturating_sub(1);
    for (idx, header) in headers.iter().enumerate() {
        if idx == last {
            write!(writer, "{header}")?;
        } else {
            write!(writer, "{:width$} ", header, width = widths[idx])?;
        }
    }
    writeln!(writer)?;

    for (idx, width) in widths.iter().enumerate() {
        write!(writer, "{:-<width$}", "", width = *width)?;
        if idx != last {
            write!(writer, " ")?;
        }
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx == last {
                write!(writer, "{cell}")?;
                continue;
            }
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
