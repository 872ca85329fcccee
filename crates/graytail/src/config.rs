//! INI configuration file:
//!
//! ```ini
//! [server]
//! uri = http://graylog.example.com:12900
//! username = reader
//! password = secret
//!
//! [formats]
//! format1 = {_long_timestamp} {_level_color}{_level}{_reset} {_message}
//! ```

use ::config::{Config, File, FileFormat, Source};
use eyre::{bail, eyre, Result, WrapErr};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::format::{Template, DEFAULT_TEMPLATES, FALLBACK_TEMPLATES};

pub const CONFIG_FILE_NAME: &str = "graytail.conf";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub formats: BTreeMap<String, String>,
}

/// Basic auth credentials for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Default config search paths, most specific first.
pub fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        paths.push(home.join(format!(".{}", CONFIG_FILE_NAME)));
        paths.push(home.join(".config").join("graytail").join(CONFIG_FILE_NAME));
    }
    paths.push(Path::new("/etc").join(CONFIG_FILE_NAME));
    paths
}

/// Loads the first existing file out of `paths`.
pub fn load(paths: &[PathBuf]) -> Result<(Settings, PathBuf)> {
    let path = paths.iter().find(|p| p.is_file()).ok_or_else(|| {
        let tried: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        eyre!("no configuration file found, tried: {}", tried.join(", "))
    })?;

    let settings = Settings::from_file(path)?;
    Ok((settings, path.clone()))
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = File::from(path).format(FileFormat::Ini).required(true);
        Self::build(source)
            .wrap_err_with(|| format!("invalid configuration file {}", path.display()))
    }

    pub fn parse(ini: &str) -> Result<Self> {
        Self::build(File::from_str(ini, FileFormat::Ini))
    }

    fn build<S>(source: S) -> Result<Self>
    where
        S: Source + Send + Sync + 'static,
    {
        let settings: Settings = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.uri().is_none() {
            bail!("missing 'uri' in the [server] section");
        }
        if self.server.username.is_some() && self.server.password.is_none() {
            bail!("'username' is set in the [server] section but 'password' is not");
        }
        Ok(())
    }

    /// Server base URI without trailing slashes.
    pub fn uri(&self) -> Option<&str> {
        self.server
            .uri
            .as_deref()
            .map(|uri| uri.trim().trim_end_matches('/'))
            .filter(|uri| !uri.is_empty())
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.server.username, &self.server.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    /// Configured `formatN` templates ordered by N, or the defaults when none
    /// are configured, followed by the fallbacks.
    pub fn templates(&self) -> Vec<Template> {
        let mut numbered: Vec<(u32, &String)> = self
            .formats
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix("format")
                    .and_then(|n| n.parse().ok())
                    .map(|n| (n, value))
            })
            .collect();
        numbered.sort_by_key(|(n, _)| *n);

        let mut templates: Vec<Template> = if numbered.is_empty() {
            DEFAULT_TEMPLATES.iter().map(|t| Template::new(*t)).collect()
        } else {
            numbered
                .into_iter()
                .map(|(_, value)| Template::new(value.as_str()))
                .collect()
        };
        templates.extend(FALLBACK_TEMPLATES.iter().map(|t| Template::new(*t)));
        templates
    }
}
