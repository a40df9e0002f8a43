use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::commands::{
  expand_command_abbrev,
  known_command_names
};

const RC_ENV: &str = "TICKLISTRC";
const RC_FILE_NAME: &str =
  ".ticklistrc";
const DATA_DIR_NAME: &str =
  ".ticklist";

/// Settings from the rc file and
/// command-line overrides. Every value
/// is checked when it is set, so a bad
/// rc line fails before any command
/// runs.
#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub struct Config {
  pub data_location: Option<PathBuf>,
  pub default_command: String,
  pub color: bool,
  pub confirmation: bool
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_location: None,
      default_command: "list"
        .to_string(),
      color: true,
      confirmation: true
    }
  }
}

impl Config {
  /// Reads the rc file (if any), then
  /// applies `overrides` on top.
  #[tracing::instrument(skip(
    rc_override,
    overrides
  ))]
  pub fn load<I>(
    rc_override: Option<&Path>,
    overrides: I
  ) -> anyhow::Result<Self>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    let mut entries = Vec::new();
    match resolve_rc_path(rc_override)?
    {
      Some(path) => {
        info!(rc = %path.display(), "loading ticklistrc");
        read_rc(
          &path,
          &mut Vec::new(),
          &mut entries
        )?;
      }
      None => {
        debug!(
          "no ticklistrc; using \
           defaults"
        );
      }
    }

    entries.extend(overrides);
    Self::from_entries(entries)
  }

  pub fn from_entries<I>(
    entries: I
  ) -> anyhow::Result<Self>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    let mut cfg = Self::default();
    for (key, value) in entries {
      cfg.set(&key, &value)?;
    }
    Ok(cfg)
  }

  /// Later calls win. A leading `rc.`
  /// on the key is ignored.
  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    let key = key
      .strip_prefix("rc.")
      .unwrap_or(key);

    match key {
      "data.location" => {
        if value.trim().is_empty() {
          bail!(
            "data.location cannot be \
             empty"
          );
        }
        self.data_location =
          Some(expand_tilde(
            Path::new(value.trim())
          ));
      }
      "default.command" => {
        let known =
          known_command_names();
        let command =
          expand_command_abbrev(
            value.trim(),
            &known
          )
          .ok_or_else(|| {
            anyhow!(
              "default.command: \
               unknown or ambiguous \
               command: {value}"
            )
          })?;
        self.default_command =
          command.to_string();
      }
      "color" => {
        self.color =
          parse_switch(key, value)?;
      }
      "confirmation" => {
        self.confirmation =
          parse_switch(key, value)?;
      }
      other => {
        warn!(
          key = other,
          "ignoring unknown config key"
        );
        return Ok(());
      }
    }

    debug!(key, value, "config value set");
    Ok(())
  }
}

/// `--data` wins over `data.location`,
/// which wins over `~/.ticklist`.
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  if let Some(path) = override_dir {
    return Ok(path.to_path_buf());
  }
  if let Some(path) =
    &cfg.data_location
  {
    return Ok(path.clone());
  }
  Ok(home_dir()?.join(DATA_DIR_NAME))
}

fn resolve_rc_path(
  rc_override: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = rc_override {
    return Ok(Some(
      path.to_path_buf()
    ));
  }

  match std::env::var_os(RC_ENV) {
    Some(value)
      if value.as_os_str()
        == "/dev/null" =>
    {
      Ok(None)
    }
    Some(value) => {
      Ok(Some(PathBuf::from(value)))
    }
    None => {
      let candidate =
        home_dir()?.join(RC_FILE_NAME);
      Ok(
        candidate
          .exists()
          .then_some(candidate)
      )
    }
  }
}

/// Appends `key = value` pairs in file
/// order, following `include` lines.
/// `chain` holds the files currently
/// being read and rejects cycles.
fn read_rc(
  path: &Path,
  chain: &mut Vec<PathBuf>,
  entries: &mut Vec<(String, String)>
) -> anyhow::Result<()> {
  let path = expand_tilde(path);
  let canonical = fs::canonicalize(
    &path
  )
  .with_context(|| {
    format!(
      "failed to read {}",
      path.display()
    )
  })?;
  if chain.contains(&canonical) {
    bail!(
      "include cycle through {}",
      path.display()
    );
  }

  let text = fs::read_to_string(
    &canonical
  )
  .with_context(|| {
    format!(
      "failed to read {}",
      path.display()
    )
  })?;
  let base_dir = canonical
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_else(|| {
      PathBuf::from(".")
    });

  chain.push(canonical.clone());
  for (idx, raw) in
    text.lines().enumerate()
  {
    let line = raw
      .split_once('#')
      .map_or(raw, |(before, _)| {
        before
      })
      .trim();
    if line.is_empty() {
      continue;
    }

    if let Some(target) =
      line.strip_prefix("include ")
    {
      let target = include_target(
        &base_dir,
        target.trim()
      )?;
      if target.exists() {
        read_rc(
          &target, chain, entries
        )?;
      } else {
        warn!(include = %target.display(), "include file does not exist; skipping");
      }
      continue;
    }

    let (key, value) = line
      .split_once('=')
      .ok_or_else(|| {
        anyhow!(
          "{}:{}: expected `key = \
           value`, got: {}",
          path.display(),
          idx + 1,
          raw.trim()
        )
      })?;
    trace!(key = key.trim(), value = value.trim(), "rc entry");
    entries.push((
      key.trim().to_string(),
      value.trim().to_string()
    ));
  }
  chain.pop();

  Ok(())
}

fn include_target(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.is_empty() {
    bail!(
      "include path cannot be empty"
    );
  }
  let expanded =
    expand_tilde(Path::new(include));
  Ok(if expanded.is_absolute() {
    expanded
  } else {
    base_dir.join(expanded)
  })
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  if let Ok(rest) =
    path.strip_prefix("~")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn home_dir() -> anyhow::Result<PathBuf>
{
  dirs::home_dir().ok_or_else(|| {
    anyhow!(
      "cannot determine home directory"
    )
  })
}

fn parse_switch(
  key: &str,
  value: &str
) -> anyhow::Result<bool> {
  match value
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    "on" | "yes" | "true" | "1" => {
      Ok(true)
    }
    "off" | "no" | "false" | "0" => {
      Ok(false)
    }
    _ => {
      Err(anyhow!(
        "invalid value for {key}: \
         {value:?} (expected on or \
         off)"
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::path::{
    Path,
    PathBuf
  };

  use tempfile::tempdir;

  use super::{
    Config,
    resolve_data_dir
  };

  fn pair(
    key: &str,
    value: &str
  ) -> (String, String) {
    (key.to_string(), value.to_string())
  }

  #[test]
  fn rc_file_with_include_and_overrides()
  {
    let temp =
      tempdir().expect("tempdir");
    fs::write(
      temp.path().join("extra.rc"),
      "color = off\n"
    )
    .expect("write include");

    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "# comment\n\
       data.location = /tmp/tl # trailing\n\
       include extra.rc\n\
       include missing.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(
      Some(rc.as_path()),
      vec![pair(
        "rc.confirmation",
        "off"
      )]
    )
    .expect("load config");

    assert_eq!(
      cfg.data_location,
      Some(PathBuf::from("/tmp/tl"))
    );
    assert!(!cfg.color);
    assert!(!cfg.confirmation);
    assert_eq!(
      cfg.default_command,
      "list"
    );
  }

  #[test]
  fn malformed_line_is_an_error() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "no equals sign\n")
      .expect("write rc");

    let err = Config::load(
      Some(rc.as_path()),
      vec![]
    )
    .expect_err("malformed");
    assert!(
      err.to_string().contains(":1:")
    );
  }

  #[test]
  fn bad_switch_fails_at_load() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("main.rc");
    fs::write(&rc, "color = purple\n")
      .expect("write rc");

    let err = Config::load(
      Some(rc.as_path()),
      vec![]
    )
    .expect_err("bad color");
    assert!(
      err.to_string().contains("color")
    );

    assert!(
      Config::from_entries(vec![pair(
        "confirmation",
        "maybe"
      )])
      .is_err()
    );
  }

  #[test]
  fn default_command_is_expanded_and_checked()
  {
    let cfg = Config::from_entries(
      vec![pair(
        "default.command",
        "exp"
      )]
    )
    .expect("expand");
    assert_eq!(
      cfg.default_command,
      "export"
    );

    assert!(
      Config::from_entries(vec![pair(
        "default.command",
        "d"
      )])
      .is_err()
    );
  }

  #[test]
  fn include_cycle_is_rejected() {
    let temp =
      tempdir().expect("tempdir");
    fs::write(
      temp.path().join("a.rc"),
      "include b.rc\n"
    )
    .expect("write a");
    fs::write(
      temp.path().join("b.rc"),
      "color = off\ninclude a.rc\n"
    )
    .expect("write b");

    let err = Config::load(
      Some(
        temp
          .path()
          .join("a.rc")
          .as_path()
      ),
      vec![]
    )
    .expect_err("cycle");
    assert!(
      err.to_string().contains("cycle")
    );
  }

  #[test]
  fn data_dir_precedence() {
    let cfg = Config::from_entries(
      vec![pair(
        "data.location",
        "/srv/tl"
      )]
    )
    .expect("config");

    assert_eq!(
      resolve_data_dir(&cfg, None)
        .expect("resolve"),
      PathBuf::from("/srv/tl")
    );
    assert_eq!(
      resolve_data_dir(
        &cfg,
        Some(Path::new("/other"))
      )
      .expect("resolve"),
      PathBuf::from("/other")
    );
  }
}
