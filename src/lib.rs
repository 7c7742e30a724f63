mod client;
mod commands;
pub mod config;
pub mod display;
mod jiff_serde;
pub mod opt;
pub mod setter;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use jiff::Zoned;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use url::Url;

pub use config::Config;
use config::Project;
pub use config::Raw as RawConfig;
pub use opt::Opt;
use opt::{Cmd, ShowConfigKind, ShowKind};

pub async fn run(opt: Opt) -> anyhow::Result<()> {
    if let Some(shell) = opt.completion {
        Opt::print_completion(&mut std::io::stdout(), shell);
        return Ok(());
    }

    let config = opt.get_config()?;

    match opt.cmd {
        None => commands::fetch_and_set(&config, opt.fetch).await?,
        Some(Cmd::Update) => commands::update_images(&config, opt.quiet).await?,
        Some(Cmd::Metadata { url, raw, frozen }) => {
            commands::print_metadata(&config, url, raw, frozen).await?;
        }
        Some(Cmd::Config { args }) => {
            if args.path {
                println!("{}", config.project.config_file_path.display());
            } else {
                let contents = match args.kind {
                    ShowConfigKind::Raw => {
                        to_json(&opt.get_raw_config(&config.project)?, args.compact)?
                    }
                    ShowConfigKind::Resolved => to_json(&config, args.compact)?,
                };
                println!("{contents}");
            }
        }
        Some(Cmd::ProjectDirs) => commands::print_project_dirs(&config)?,
        Some(Cmd::ListImages {
            ref format,
            ref date,
            all,
        }) => commands::list_images(&config, format, all, date.as_deref())?,
        Some(Cmd::Show { kind, update }) => {
            commands::show(&config, ShowKind::from(kind), update)?;
        }
        Some(Cmd::Apply { kind }) => commands::apply(&config, ShowKind::from(kind))?,
        Some(Cmd::Set { ref path }) => setter::set_wallpaper(&config, path)?,
        Some(Cmd::Reset {
            ref items,
            dry_run,
            all,
        }) => commands::reset(&config, all || items.is_empty(), dry_run, items)?,
        Some(Cmd::Completion { shell }) => {
            Opt::print_completion(&mut std::io::stdout(), shell);
        }
    }

    Ok(())
}

fn to_json<T: Serialize>(value: &T, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
}

fn ensure_project_dirs_exist(project: &Project) -> anyhow::Result<()> {
    std::fs::create_dir_all(&project.data_dir)
        .with_context(|| format!("Failed to create {}", project.data_dir.display()))?;

    let state_dir = project
        .state_file_path
        .parent()
        .ok_or_else(|| anyhow!("The state file path is not inside a directory"))?;
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("Failed to create {}", state_dir.display()))?;

    Ok(())
}

/// What's known locally: every image seen so far, and the one in use
#[derive(Debug, Default, Deserialize, Serialize)]
struct AppState {
    image_data: ImageData,
    current_image: Option<PathBuf>,
}

impl AppState {
    /// Read the state file, or start fresh if there isn't one yet
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        let path = &config.project.state_file_path;
        if path.try_exists()? {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, config: &Config) -> anyhow::Result<()> {
        let path = &config.project.state_file_path;
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Pick a random image other than the current one and make it current
    ///
    /// Newer images are more likely to be picked.
    pub fn pick_random(&mut self, config: &Config) -> anyhow::Result<PathBuf> {
        if self.image_data.images.is_empty() {
            anyhow::bail!(
                "Looks like you don't have any images. Try running this with the \"update\" subcommand."
            );
        }

        let candidates = self
            .image_data
            .images
            .iter()
            .filter(|x| !self.is_current(x))
            .collect::<Vec<_>>();

        let image = match candidates.choose_weighted(&mut rand::thread_rng(), |x| {
            x.full_start_date.timestamp().as_second()
        }) {
            Ok(image) => *image,
            // Only the current image is left
            Err(_) if candidates.is_empty() => self
                .image_data
                .images
                .iter()
                .next()
                .ok_or_else(|| anyhow!("No images to pick from"))?,
            Err(err) => return Err(err.into()),
        };
        let image_path = image.file_name(config)?;

        self.current_image = Some(image_path.clone());
        Ok(image_path)
    }

    /// Whether `image` is the one in use, whatever size it was downloaded in
    pub fn is_current(&self, image: &Image) -> bool {
        self.current_image
            .as_deref()
            .is_some_and(|x| image.is_named(x))
    }

    pub fn latest(&self) -> Option<&Image> {
        self.image_data.images.last()
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ImageData {
    images: BTreeSet<Image>,
}

impl ImageData {
    pub fn add_image(&mut self, image: Image) {
        self.images.insert(image);
    }

    /// The image from `days_ago` days back, or the oldest one if there aren't that many
    pub fn nth_newest(&self, days_ago: usize) -> Option<&Image> {
        let oldest = self.images.len().checked_sub(1)?;
        if days_ago > oldest {
            log::warn!("Only {} images are available, using the oldest", oldest + 1);
        }

        self.images.iter().rev().nth(days_ago.min(oldest))
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Clone)]
struct Image {
    #[serde(rename = "fullstartdate", with = "jiff_serde::datetime")]
    full_start_date: Zoned,

    #[serde(rename = "enddate", with = "jiff_serde::date")]
    end_date: Zoned,

    #[serde(rename = "hsh")]
    hash: String,

    title: String,

    url: String,

    #[serde(rename = "urlbase")]
    url_base: String,

    copyright: String,

    #[serde(rename = "copyrightlink")]
    copyright_link: String,
}

impl Image {
    pub fn to_url(&self, config: &Config) -> anyhow::Result<Url> {
        config.join_url(&format!(
            "{}_{}.{}",
            self.url_base,
            config.resolution(),
            config.ext
        ))
    }

    pub fn absolute_file_name(&self, config: &Config) -> anyhow::Result<PathBuf> {
        Ok(config.project.data_dir.join(self.file_name(config)?))
    }

    pub fn file_name(&self, config: &Config) -> anyhow::Result<PathBuf> {
        let url = self.to_url(config)?;
        url.query_pairs()
            .find_map(|(k, v)| (k == "id").then(|| PathBuf::from(format!("{}_{v}", self.hash))))
            .ok_or_else(|| anyhow!("No image id in {url}"))
    }

    /// Whether `file_name` was made by [`Image::file_name`] for this image, at any size
    pub fn is_named(&self, file_name: &Path) -> bool {
        file_name
            .to_str()
            .and_then(|x| x.strip_prefix(&self.hash))
            .is_some_and(|x| x.starts_with('_'))
    }

    /// Where the metadata of a downloaded image is kept, next to the image itself
    pub fn sidecar_file_name(&self, config: &Config) -> anyhow::Result<PathBuf> {
        Ok(self.absolute_file_name(config)?.with_extension("json"))
    }
}
