use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::environment::{
  Theme,
  WindowSize
};
use crate::signup::DEFAULT_ENDPOINT;
use crate::time_picker::TimeFormat;

const RC_ENV_VAR: &str = "DATEBOOKRC";
const RC_FILE_NAME: &str =
  ".datebookrc";
const THEME_ENV_VAR: &str =
  "DATEBOOK_THEME";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("color", "on"),
      ("time.format", "auto"),
      ("theme", "auto"),
      ("signup.endpoint", DEFAULT_ENDPOINT),
      ("window.width", "390"),
      ("window.height", "844")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading datebookrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no datebookrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn color(
    &self
  ) -> anyhow::Result<bool> {
    let raw = self
      .get("color")
      .unwrap_or_else(|| {
        "on".to_string()
      });
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "1" | "y" | "yes" | "on"
      | "true" => Ok(true),
      | "0" | "n" | "no" | "off"
      | "false" => Ok(false),
      | other => {
        Err(anyhow!(
          "invalid color setting: \
           {other}"
        ))
      }
    }
  }

  pub fn time_format(
    &self
  ) -> anyhow::Result<TimeFormat> {
    self
      .get("time.format")
      .unwrap_or_default()
      .parse::<TimeFormat>()
  }

  /// `auto` follows `DATEBOOK_THEME` and falls back to light.
  pub fn theme(
    &self
  ) -> anyhow::Result<Theme> {
    let raw = self
      .get("theme")
      .unwrap_or_else(|| {
        "auto".to_string()
      });
    if !raw
      .trim()
      .eq_ignore_ascii_case("auto")
    {
      return raw.parse();
    }

    match std::env::var(THEME_ENV_VAR)
    {
      | Ok(value) => {
        value.parse::<Theme>().or_else(|err| {
          warn!(
            error = %err,
            "ignoring DATEBOOK_THEME"
          );
          Ok(Theme::default())
        })
      }
      | Err(_) => Ok(Theme::default())
    }
  }

  pub fn window_size(
    &self
  ) -> anyhow::Result<WindowSize> {
    let fallback = WindowSize::default();
    Ok(WindowSize {
      width:  self.get_u32(
        "window.width",
        fallback.width
      )?,
      height: self.get_u32(
        "window.height",
        fallback.height
      )?
    })
  }

  pub fn signup_endpoint(
    &self
  ) -> String {
    self
      .get("signup.endpoint")
      .filter(|v| !v.trim().is_empty())
      .unwrap_or_else(|| {
        DEFAULT_ENDPOINT.to_string()
      })
  }

  fn get_u32(
    &self,
    key: &str,
    fallback: u32
  ) -> anyhow::Result<u32> {
    match self.map.get(key) {
      | Some(raw) => {
        raw.trim().parse::<u32>().with_context(
          || {
            format!(
              "invalid {key}: {raw}"
            )
          }
        )
      }
      | None => Ok(fallback)
    }
  }

  fn already_loaded(
    &self,
    path: &Path
  ) -> bool {
    let target = fs::canonicalize(path)
      .unwrap_or_else(|_| {
        path.to_path_buf()
      });
    self.loaded_files.iter().any(
      |seen| {
        fs::canonicalize(seen)
          .unwrap_or_else(|_| {
            seen.clone()
          })
          == target
      }
    )
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if self.already_loaded(
          &include_path
        ) {
          warn!(include = %include_path.display(), "include already loaded; skipping");
        } else if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       datebookrc"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
