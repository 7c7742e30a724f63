use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use url::Url;

use crate::opt::{Extension, Resolution};
use crate::setter::Backend;
use crate::{display, Opt};

const DEFAULT_BASE_URL: &str = "https://www.bing.com";

/// The archive endpoint serves at most this many images per request
const MAX_NUMBER: u8 = 8;

/// ... and goes back at most this many days
const MAX_INDEX: u8 = 7;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Config {
    params: UrlParams,
    pub project: Project,
    pub size: Option<Resolution>,
    pub ext: Extension,
    pub backend: Option<Backend>,
    pub command: Vec<String>,
    pub base_url: Url,
    #[serde(skip)]
    detected_size: OnceLock<Resolution>,
}

impl Config {
    /// Merge the config file with options passed on the command line
    pub fn new(opt: &Opt, project: Project, raw_config: Raw) -> anyhow::Result<Self> {
        let base_url = raw_config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL);
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url:?}"))?;

        Ok(Self {
            params: UrlParams {
                number: opt
                    .number
                    .or(raw_config.number)
                    .unwrap_or(MAX_NUMBER)
                    .clamp(1, MAX_NUMBER),
                index: opt.index.or(raw_config.index).map(|x| x.min(MAX_INDEX)),
                market: opt
                    .market
                    .as_deref()
                    .or(raw_config.market.as_deref())
                    .filter(|x| !x.is_empty())
                    .map(std::string::ToString::to_string),
            },
            project,
            size: opt.size.or(raw_config.size),
            ext: opt.ext.or(raw_config.ext).unwrap_or_default(),
            backend: opt.backend.or(raw_config.backend),
            command: raw_config.command.unwrap_or_default(),
            base_url,
            detected_size: OnceLock::new(),
        })
    }

    /// Get the URL to retrieve image metadata from
    #[must_use]
    pub fn to_url(&self) -> Url {
        self.params.to_url(&self.base_url)
    }

    /// The configured image size, falling back to one that fits the screen
    pub fn resolution(&self) -> Resolution {
        self.size.unwrap_or_else(|| {
            *self.detected_size.get_or_init(|| {
                let screen = display::detect();
                let resolution = Resolution::best_fit(screen);
                log::info!("detected a {screen} screen, using {resolution} images");
                resolution
            })
        })
    }

    /// The wallpaper backend to use, detected from the desktop if unset
    pub fn backend(&self) -> Backend {
        self.backend.unwrap_or_else(|| {
            let backend = Backend::detect();
            log::info!("using the {backend:?} backend");
            backend
        })
    }

    /// Join a path (usually from a URL template) onto the base URL
    pub fn join_url(&self, path: &str) -> anyhow::Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid URL path: {path:?}"))
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UrlParams {
    number: u8,
    index: Option<u8>,
    market: Option<String>,
}

impl UrlParams {
    #[must_use]
    pub fn to_url(&self, base_url: &Url) -> Url {
        let mut url = base_url.clone();
        url.set_path("/HPImageArchive.aspx");
        url.query_pairs_mut().clear().extend_pairs(self.params());
        url
    }

    fn params(&self) -> impl Iterator<Item = (&'static str, String)> {
        vec![("format", "js".to_string()), ("n", self.number.to_string())]
            .into_iter()
            .chain(
                vec![
                    ("idx", self.index.map(|x| x.to_string())),
                    ("mkt", self.market.clone()),
                ]
                .into_iter()
                .filter_map(|(k, v)| v.map(|value| (k, value))),
            )
    }
}

/// The config file as written on disk
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Raw {
    pub number: Option<u8>,
    pub index: Option<u8>,
    pub market: Option<String>,
    pub size: Option<Resolution>,
    pub ext: Option<Extension>,
    pub backend: Option<Backend>,
    /// Program and arguments for the `command` backend
    pub command: Option<Vec<String>>,
    pub base_url: Option<String>,
}

impl Raw {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
pub struct Project {
    pub config_file_path: PathBuf,
    pub data_dir: PathBuf,
    pub state_file_path: PathBuf,
}

impl Project {
    /// Try initializing a structure to track project directories
    ///
    /// Paths passed on the command line win over the platform defaults.
    pub fn initialize(opt: &Opt) -> anyhow::Result<Self> {
        let project_dirs = ProjectDirs::from("", "", env!("CARGO_CRATE_NAME"))
            .ok_or_else(|| anyhow!("Failed to detect project directories"))?;

        let state_file_path = match &opt.state_path {
            Some(path) => path.clone(),
            None => project_dirs
                .state_dir()
                .map(|x| x.join("image_index.json"))
                .ok_or_else(|| anyhow!("Failed to detect project state directory"))?,
        };

        Ok(Self {
            config_file_path: opt
                .config_path
                .clone()
                .unwrap_or_else(|| project_dirs.config_dir().join("config.json")),
            data_dir: opt
                .data_path
                .clone()
                .unwrap_or_else(|| project_dirs.data_dir().to_path_buf()),
            state_file_path,
        })
    }

    #[cfg(test)]
    #[must_use]
    pub fn new(config_file_path: PathBuf, data_dir: PathBuf, state_file_path: PathBuf) -> Self {
        Self {
            config_file_path,
            data_dir,
            state_file_path,
        }
    }
}
