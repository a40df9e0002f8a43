use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ticklist",
    version,
    about = "ticklist: a small persistent task list",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    /// More log output on stderr (repeatable).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output on stderr (repeatable).
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Override one config key, e.g. `--rc confirmation=off`.
    #[arg(long = "rc", value_name = "KEY=VALUE", value_parser = parse_rc_flag)]
    pub rc_overrides: Vec<(String, String)>,

    #[arg(long = "ticklistrc", value_name = "FILE")]
    pub ticklistrc: Option<PathBuf>,

    #[arg(long = "data", value_name = "DIR")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

/// Arguments with positional `rc.key=value` tokens taken out.
#[derive(Debug, Clone, Default)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

/// Splits `key=value` or `key:value` at the first separator and drops a
/// leading `rc.` from the key.
fn split_override(token: &str) -> Option<(String, String)> {
    let (key, value) = token.split_once(['=', ':'])?;
    let key = key.trim();
    let key = key.strip_prefix("rc.").unwrap_or(key);
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

fn parse_rc_flag(s: &str) -> Result<(String, String), String> {
    split_override(s).ok_or_else(|| format!("expected KEY=VALUE, got: {s}"))
}

/// Pulls `rc.key=value` / `rc.key:value` out of the argument list. The
/// binary name in position 0 is never touched.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut pre = PreprocessedArgs::default();

    for (idx, arg) in raw.iter().enumerate() {
        let captured = arg
            .to_str()
            .filter(|s| idx > 0 && s.starts_with("rc."))
            .and_then(split_override);

        match captured {
            Some((key, value)) => {
                debug!(%key, %value, "captured positional rc override");
                pre.rc_overrides.push((key, value));
            }
            None => pre.cleaned_args.push(arg.clone()),
        }
    }

    pre
}

fn default_filter(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        _ => "trace",
    }
}

/// Logs go to stderr so command output on stdout stays clean. `RUST_LOG`
/// wins over `-v`/`-q`.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbose, quiet)))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// The resolved command word plus its remaining arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let mut tokens = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned());

        let Some(first) = tokens.next() else {
            debug!(command = %cfg.default_command, "no explicit command, using default");
            return Ok(Self {
                command: cfg.default_command.clone(),
                command_args: vec![],
            });
        };

        let known = known_command_names();
        let command = expand_command_abbrev(&first, &known)
            .ok_or_else(|| anyhow!("unknown or ambiguous command: {first}"))?;
        debug!(token = %first, expanded = %command, "resolved command token");

        Ok(Self {
            command: command.to_string(),
            command_args: tokens.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{GlobalCli, Invocation, default_filter, preprocess_args};
    use crate::config::Config;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&os(&[
            "ticklist",
            "rc.color:off",
            "list",
            "rc.confirmation=no",
            "rc.nothing",
        ]));
        assert_eq!(pre.cleaned_args, os(&["ticklist", "list", "rc.nothing"]));
        assert_eq!(
            pre.rc_overrides,
            vec![pair("color", "off"), pair("confirmation", "no")]
        );
    }

    #[test]
    fn rc_flag_and_trailing_command() {
        let cli = GlobalCli::try_parse_from(os(&[
            "ticklist",
            "--rc",
            "rc.data.location=/tmp/tl",
            "-vv",
            "clear",
            "--yes",
        ]))
        .expect("parse");
        assert_eq!(cli.rc_overrides, vec![pair("data.location", "/tmp/tl")]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rest, os(&["clear", "--yes"]));

        assert!(GlobalCli::try_parse_from(os(&["ticklist", "--rc", "novalue"])).is_err());
    }

    #[test]
    fn verbosity_maps_to_filter() {
        assert_eq!(default_filter(0, 0), "warn");
        assert_eq!(default_filter(1, 0), "info");
        assert_eq!(default_filter(3, 0), "trace");
        assert_eq!(default_filter(2, 1), "warn");
        assert_eq!(default_filter(0, 2), "error");
    }

    #[test]
    fn abbreviated_command_is_expanded() {
        let inv = Invocation::parse(&Config::default(), os(&["sel", "2"])).expect("parse");
        assert_eq!(inv.command, "select");
        assert_eq!(inv.command_args, vec!["2".to_string()]);
    }

    #[test]
    fn empty_invocation_uses_default_command() {
        let inv = Invocation::parse(&Config::default(), vec![]).expect("parse");
        assert_eq!(inv.command, "list");

        let cfg = Config::from_entries(vec![pair("default.command", "export")]).expect("config");
        let inv = Invocation::parse(&cfg, vec![]).expect("parse");
        assert_eq!(inv.command, "export");
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Invocation::parse(&Config::default(), os(&["frobnicate"])).is_err());
    }
}
