use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use crate::{config::Project, display::ScreenSize, setter::Backend, Config, RawConfig};

/// The newest image is 0 days ago; the archive only goes back this far.
pub const MAX_DAYS_AGO: u8 = 7;

#[derive(Debug, Parser)]
#[command(version, flatten_help = true)]
pub struct Opt {
    #[arg(long, global = true, default_value = None)]
    pub config_path: Option<PathBuf>,

    #[arg(long, global = true)]
    pub state_path: Option<PathBuf>,

    #[arg(long, global = true)]
    pub data_path: Option<PathBuf>,

    #[arg(long, global = true, default_value = None)]
    pub index: Option<u8>,

    #[arg(long, global = true, default_value = None)]
    pub number: Option<u8>,

    #[arg(long, global = true, default_value = None)]
    pub market: Option<String>,

    /// Image size to download (detected from the screen if not given)
    #[arg(long, global = true, value_enum)]
    pub size: Option<Resolution>,

    #[arg(long, global = true, value_enum)]
    pub ext: Option<Extension>,

    /// How to set the wallpaper (detected from the desktop if not given)
    #[arg(long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Log more (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(flatten)]
    pub fetch: FetchArgs,

    #[command(subcommand)]
    pub cmd: Option<Cmd>,

    #[arg(long, exclusive = true)]
    pub completion: Option<Shell>,
}

impl Opt {
    pub fn get_config(&self) -> anyhow::Result<Config> {
        let project = self.get_project()?;
        self.get_config_with_project(project)
    }

    pub fn get_config_with_project(&self, project: Project) -> anyhow::Result<Config> {
        let raw_config = self.get_raw_config(&project)?;
        Config::new(self, project, raw_config)
    }

    pub fn get_project(&self) -> anyhow::Result<Project> {
        Project::initialize(self)
    }

    pub fn get_raw_config(&self, project: &Project) -> anyhow::Result<RawConfig> {
        let raw_config = if let Some(path) = self.get_config_file(project) {
            RawConfig::from_file(path)?
        } else {
            RawConfig::default()
        };

        Ok(raw_config)
    }

    fn get_config_file<'a>(&'a self, project: &'a Project) -> Option<&'a Path> {
        self.config_path.as_deref().or_else(|| {
            let default_config_path = project.config_file_path.as_path();
            default_config_path
                .try_exists()
                .is_ok_and(|x| x)
                .then_some(default_config_path)
        })
    }

    /// Default filter handed to `env_logger` when `RUST_LOG` isn't set
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }

        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    pub fn print_completion(writer: &mut impl std::io::Write, shell: Shell) {
        use clap::CommandFactory;
        clap_complete::generate(
            shell,
            &mut Self::command(),
            option_env!("CARGO_BIN_NAME").unwrap_or(env!("CARGO_PKG_NAME")),
            writer,
        );
    }
}

/// Flags for the default action: fetch one image and set it as the wallpaper
#[derive(Debug, Default, Args, Clone, Copy)]
pub struct FetchArgs {
    /// Use the image from this many days ago instead of today's (at most 7)
    #[arg(short = 'n', long, default_value_t = 0, allow_negative_numbers = true)]
    pub days_ago: i64,

    /// Print the image metadata to stdout
    #[arg(short, long)]
    pub metadata: bool,

    /// Download the image again even if it already exists
    #[arg(long)]
    pub overwrite: bool,

    /// Download the image, but don't change the wallpaper
    #[arg(long)]
    pub no_set: bool,
}

impl FetchArgs {
    /// Days back, clamped to what the archive serves
    #[must_use]
    pub fn days_ago(&self) -> usize {
        usize::try_from(self.days_ago.clamp(0, i64::from(MAX_DAYS_AGO))).unwrap_or_default()
    }
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Update metadata from the Internet, downloading images if necessary
    Update,

    /// Make an HTTP call to the metadata URL
    Metadata {
        /// Just print the URL that would be called to get metadata
        #[arg(short, long)]
        url: bool,

        /// Return the real JSON (not trimmed) that is returned from the HTTP call
        #[arg(short, long)]
        raw: bool,

        /// Print only from the local state file; don't update
        #[arg(long, conflicts_with_all = ["url", "raw"])]
        frozen: bool,
    },

    /// Show the configuration
    Config {
        #[command(flatten)]
        args: ShowConfigArgs,
    },

    /// Print the resolved project directories
    ///
    /// Note that this takes other CLI flags into account.
    ProjectDirs,

    /// List the images in the local index
    #[command(visible_alias = "list")]
    ListImages {
        /// Which columns to print
        #[arg(short, long, value_enum, value_delimiter = ',', num_args(1..), conflicts_with = "all")]
        format: Vec<ImagePart>,

        /// strftime-style format for the time column
        #[arg(short, long, default_value = None)]
        date: Option<String>,

        /// Print all columns (default if -f is not passed)
        #[arg(long)]
        all: bool,
    },

    /// Print the path of an image from the local index
    Show {
        #[clap(flatten)]
        kind: ShowKindArg,

        /// Save a randomly picked image as the current one
        #[arg(long)]
        update: bool,
    },

    /// Set an image from the local index as the wallpaper
    Apply {
        #[clap(flatten)]
        kind: ShowKindArg,
    },

    /// Set any image file as the wallpaper
    Set { path: PathBuf },

    /// Remove downloaded images and/or local state
    Reset {
        /// Which directories to remove
        #[arg(short, long, value_enum, value_delimiter = ',', conflicts_with = "all")]
        items: Vec<ResetItem>,

        /// Don't remove anything, just show what would be removed
        #[arg(short = 'n', long, visible_alias = "pretend")]
        dry_run: bool,

        /// Reset everything (default if -i is not passed)
        #[arg(long)]
        all: bool,
    },

    /// Print shell completions
    Completion {
        #[arg(short, long)]
        shell: Shell,
    },
}

#[derive(Debug, Args, Clone, Copy)]
pub struct ShowConfigArgs {
    #[arg(short, default_value_t, long, value_enum)]
    pub kind: ShowConfigKind,

    /// Print JSON on a single line
    #[arg(short, long)]
    pub compact: bool,

    /// Print the path of the config file instead
    #[arg(short, long)]
    pub path: bool,
}

#[derive(Debug, Default, ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum ShowConfigKind {
    Raw,
    #[default]
    Resolved,
}

#[derive(Debug, Args, Clone, Copy)]
#[group(required = true, multiple = false)]
pub struct ShowKindArg {
    #[arg(long)]
    current: bool,

    #[arg(long)]
    random: bool,

    #[arg(long)]
    latest: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowKind {
    Current,
    Random,
    Latest,
}

impl From<ShowKindArg> for ShowKind {
    fn from(kind: ShowKindArg) -> Self {
        if kind.current {
            Self::Current
        } else if kind.latest {
            Self::Latest
        } else if kind.random {
            Self::Random
        } else {
            unreachable!("Unknown ShowKindArg");
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    #[default]
    Uhd,
    Resolution(u16, u16),
}

impl Resolution {
    const ALL: &[Self] = &[
        Self::Uhd,
        Self::Resolution(1920, 1200),
        Self::Resolution(1920, 1080),
        Self::Resolution(1366, 768),
        Self::Resolution(1280, 768),
        Self::Resolution(1024, 768),
        Self::Resolution(800, 600),
        Self::Resolution(800, 480),
        Self::Resolution(768, 1280),
        Self::Resolution(720, 1280),
        Self::Resolution(640, 480),
        Self::Resolution(480, 800),
        Self::Resolution(400, 240),
        Self::Resolution(320, 240),
        Self::Resolution(240, 320),
    ];

    /// The smallest size covering the whole screen, or UHD if none does
    ///
    /// Portrait screens only match portrait sizes and vice versa.
    #[must_use]
    pub fn best_fit(screen: ScreenSize) -> Self {
        let portrait = screen.height > screen.width;
        Self::ALL
            .iter()
            .filter_map(|x| match *x {
                Self::Uhd => None,
                Self::Resolution(w, h) => Some((w, h)),
            })
            .filter(|&(w, h)| (h > w) == portrait)
            .filter(|&(w, h)| u32::from(w) >= screen.width && u32::from(h) >= screen.height)
            .min_by_key(|&(w, h)| u32::from(w) * u32::from(h))
            .map_or(Self::Uhd, |(w, h)| Self::Resolution(w, h))
    }
}

impl clap::ValueEnum for Resolution {
    fn value_variants<'a>() -> &'a [Self] {
        Self::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.to_string()))
    }
}

impl std::str::FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "UHD" {
            Ok(Self::Uhd)
        } else {
            let (width, height) = s
                .split_once('x')
                .ok_or_else(|| anyhow::anyhow!("Invalid resolution"))?;
            let resolution = Self::Resolution(width.parse()?, height.parse()?);
            if !Self::ALL.contains(&resolution) {
                log::warn!("unknown resolution {resolution}");
            }
            Ok(resolution)
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uhd => write!(f, "UHD"),
            Self::Resolution(w, h) => write!(f, "{w}x{h}"),
        }
    }
}

#[derive(Debug, Default, ValueEnum, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "lower")]
#[serde(rename_all = "lowercase")]
pub enum Extension {
    #[default]
    Jpg,
    Webp,
}

impl std::fmt::Display for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jpg => write!(f, "jpg"),
            Self::Webp => write!(f, "webp"),
        }
    }
}

mod resolution_serde {
    use super::Resolution;

    struct ResolutionVisitor;

    impl<'de> serde::Deserialize<'de> for Resolution {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            deserializer.deserialize_string(ResolutionVisitor)
        }
    }

    impl<'de> serde::de::Visitor<'de> for ResolutionVisitor {
        type Value = Resolution;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string matching one of the resolution values")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            v.parse().map_err(serde::de::Error::custom)
        }

        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            self.visit_str(&v)
        }
    }

    impl serde::Serialize for Resolution {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            serializer.serialize_str(&self.to_string())
        }
    }
}

#[derive(Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum ResetItem {
    /// Remove downloaded images
    Images,

    /// Reset local state
    State,
}

#[derive(Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum ImagePart {
    Path,
    FullPath,
    Title,
    Url,
    Time,
    Current,
    Copyright,
}

impl ImagePart {
    #[must_use]
    pub fn all() -> Vec<Self> {
        vec![
            Self::Current,
            Self::Time,
            Self::FullPath,
            Self::Path,
            Self::Title,
            Self::Url,
            Self::Copyright,
        ]
    }
}
