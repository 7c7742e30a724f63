use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, bail, Context};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Config;

const PATH_PLACEHOLDER: &str = "{}";

/// Ways of changing the desktop wallpaper
#[derive(Debug, ValueEnum, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The platform API (SystemParametersInfo on Windows), or whatever desktop the
    /// `wallpaper` crate recognizes elsewhere
    Native,

    /// `gsettings` for GNOME and its derivatives (Unity, Cinnamon, Budgie)
    Gnome,

    /// `gsettings` for MATE
    Mate,

    /// Finder through AppleScript
    Osascript,

    /// `feh --bg-fill`, for bare window managers
    Feh,

    /// The `command` from the config file
    Command,
}

impl Backend {
    /// Guess the backend from the platform and desktop session
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Self::Osascript
        } else if cfg!(windows) {
            Self::Native
        } else {
            Self::from_desktop(|key| std::env::var(key).ok())
        }
    }

    fn from_desktop(var: impl Fn(&str) -> Option<String>) -> Self {
        let desktop = var("XDG_CURRENT_DESKTOP")
            .or_else(|| var("DESKTOP_SESSION"))
            .unwrap_or_default()
            .to_lowercase();

        if desktop.contains("mate") {
            Self::Mate
        } else if ["gnome", "unity", "cinnamon", "budgie", "ubuntu"]
            .iter()
            .any(|x| desktop.contains(x))
            || var("GNOME_DESKTOP_SESSION_ID").is_some()
        {
            Self::Gnome
        } else {
            // KDE, XFCE, LXDE and friends are covered by the wallpaper crate
            Self::Native
        }
    }

    /// Commands that set `path` as the wallpaper, in order
    ///
    /// Empty for [`Backend::Native`], which doesn't shell out.
    pub fn commands(&self, path: &Path, user_command: &[String]) -> anyhow::Result<Vec<Command>> {
        let commands = match self {
            Self::Native => vec![],
            Self::Gnome => {
                let uri = Url::from_file_path(path)
                    .map_err(|()| anyhow!("{} is not an absolute path", path.display()))?;
                ["picture-uri", "picture-uri-dark"]
                    .into_iter()
                    .map(|key| {
                        let mut cmd = Command::new("gsettings");
                        cmd.args(["set", "org.gnome.desktop.background", key, uri.as_str()]);
                        cmd
                    })
                    .collect()
            }
            Self::Mate => {
                let mut cmd = Command::new("gsettings");
                cmd.args(["set", "org.mate.background", "picture-filename"])
                    .arg(path);
                vec![cmd]
            }
            Self::Osascript => {
                let path = path
                    .to_str()
                    .ok_or_else(|| anyhow!("{} is not valid UTF-8", path.display()))?
                    .replace('\\', "\\\\")
                    .replace('"', "\\\"");
                let mut cmd = Command::new("osascript");
                cmd.arg("-e").arg(format!(
                    "tell application \"Finder\" to set desktop picture to POSIX file \"{path}\""
                ));
                vec![cmd]
            }
            Self::Feh => {
                let mut cmd = Command::new("feh");
                cmd.arg("--bg-fill").arg(path);
                vec![cmd]
            }
            Self::Command => {
                let Some((program, args)) = user_command.split_first() else {
                    bail!("The command backend needs a \"command\" in the config file");
                };

                let mut cmd = Command::new(program);
                if args.iter().any(|x| x.contains(PATH_PLACEHOLDER)) {
                    let path = path.to_string_lossy();
                    cmd.args(args.iter().map(|x| x.replace(PATH_PLACEHOLDER, &path)));
                } else {
                    cmd.args(args).arg(path);
                }
                vec![cmd]
            }
        };

        Ok(commands)
    }
}

/// Set the image at `path` as the desktop wallpaper
pub fn set_wallpaper(config: &Config, path: &Path) -> anyhow::Result<()> {
    if !path.is_file() {
        bail!("{} is not found", path.display());
    }
    let path = resolve_path(path)?;

    let backend = config.backend();
    log::info!("Setting {} as the wallpaper", path.display());

    if backend == Backend::Native {
        set_native(&path)?;
    } else {
        for cmd in backend.commands(&path, &config.command)? {
            run(cmd)?;
        }
    }

    log::info!("Wallpaper is set.");
    Ok(())
}

/// Make `path` absolute without the `\\?\` prefix that `canonicalize` adds on Windows,
/// which SystemParametersInfo doesn't understand
fn resolve_path(path: &Path) -> anyhow::Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Failed to resolve {}", path.display()))
}

fn set_native(path: &Path) -> anyhow::Result<()> {
    let path = path
        .to_str()
        .ok_or_else(|| anyhow!("{} is not valid UTF-8", path.display()))?;
    wallpaper::set_from_path(path).map_err(|err| anyhow!("Setting wallpaper has failed: {err}"))
}

fn run(mut cmd: Command) -> anyhow::Result<()> {
    log::debug!("running {cmd:?}");
    let program = cmd.get_program().to_string_lossy().into_owned();
    let output = cmd
        .output()
        .with_context(|| format!("Failed to run {program:?}"))?;

    if !output.status.success() {
        bail!(
            "{program:?} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::ffi::OsStr;

    fn argv(cmd: &Command) -> Vec<&OsStr> {
        std::iter::once(cmd.get_program())
            .chain(cmd.get_args())
            .collect()
    }

    fn detect_with(vars: &[(&str, &str)]) -> Backend {
        let vars = vars.iter().copied().collect::<HashMap<_, _>>();
        Backend::from_desktop(|key| vars.get(key).map(std::string::ToString::to_string))
    }

    #[test]
    fn detect_from_desktop_session() {
        assert_eq!(Backend::Gnome, detect_with(&[("XDG_CURRENT_DESKTOP", "ubuntu:GNOME")]));
        assert_eq!(Backend::Gnome, detect_with(&[("DESKTOP_SESSION", "cinnamon")]));
        assert_eq!(Backend::Mate, detect_with(&[("XDG_CURRENT_DESKTOP", "MATE")]));
        assert_eq!(Backend::Gnome, detect_with(&[("GNOME_DESKTOP_SESSION_ID", "this-is-deprecated")]));
        assert_eq!(Backend::Native, detect_with(&[("XDG_CURRENT_DESKTOP", "KDE")]));
        assert_eq!(Backend::Native, detect_with(&[]));
    }

    #[test]
    #[cfg(unix)]
    fn gnome_sets_light_and_dark_uri() {
        let commands = Backend::Gnome
            .commands(Path::new("/home/me/Pictures/a b.jpg"), &[])
            .unwrap();

        let actual = commands.iter().map(argv).collect::<Vec<_>>();
        assert_eq!(
            vec![
                vec![
                    "gsettings",
                    "set",
                    "org.gnome.desktop.background",
                    "picture-uri",
                    "file:///home/me/Pictures/a%20b.jpg"
                ],
                vec![
                    "gsettings",
                    "set",
                    "org.gnome.desktop.background",
                    "picture-uri-dark",
                    "file:///home/me/Pictures/a%20b.jpg"
                ],
            ],
            actual
        );
    }

    #[test]
    fn gnome_needs_an_absolute_path() {
        assert!(Backend::Gnome
            .commands(Path::new("relative.jpg"), &[])
            .is_err());
    }

    #[test]
    fn mate_and_feh_pass_the_path() {
        let path = Path::new("/tmp/image.jpg");

        let mate = Backend::Mate.commands(path, &[]).unwrap();
        assert_eq!(
            vec![
                "gsettings",
                "set",
                "org.mate.background",
                "picture-filename",
                "/tmp/image.jpg"
            ],
            argv(&mate[0])
        );

        let feh = Backend::Feh.commands(path, &[]).unwrap();
        assert_eq!(vec!["feh", "--bg-fill", "/tmp/image.jpg"], argv(&feh[0]));
    }

    #[test]
    fn osascript_quotes_the_path() {
        let commands = Backend::Osascript
            .commands(Path::new("/Users/me/\"odd\".jpg"), &[])
            .unwrap();

        assert_eq!(
            vec![
                "osascript",
                "-e",
                r#"tell application "Finder" to set desktop picture to POSIX file "/Users/me/\"odd\".jpg""#
            ],
            argv(&commands[0])
        );
    }

    #[test]
    fn user_command_replaces_placeholder() {
        let user_command = ["swww", "img", "--path={}"].map(String::from);
        let commands = Backend::Command
            .commands(Path::new("/tmp/image.jpg"), &user_command)
            .unwrap();

        assert_eq!(vec!["swww", "img", "--path=/tmp/image.jpg"], argv(&commands[0]));
    }

    #[test]
    fn user_command_appends_path() {
        let user_command = ["xwallpaper", "--zoom"].map(String::from);
        let commands = Backend::Command
            .commands(Path::new("/tmp/image.jpg"), &user_command)
            .unwrap();

        assert_eq!(vec!["xwallpaper", "--zoom", "/tmp/image.jpg"], argv(&commands[0]));
    }

    #[test]
    fn empty_user_command_is_an_error() {
        assert!(Backend::Command
            .commands(Path::new("/tmp/image.jpg"), &[])
            .is_err());
    }

    fn command_config(command: &[&str]) -> Config {
        let mut config = crate::tests::get_test_config();
        config.backend = Some(Backend::Command);
        config.command = command.iter().map(std::string::ToString::to_string).collect();
        config
    }

    fn scratch_image(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "{}-{}-{name}.jpg",
            env!("CARGO_CRATE_NAME"),
            std::process::id()
        ));
        std::fs::write(&path, b"jpeg").unwrap();
        path
    }

    #[test]
    #[cfg(unix)]
    fn failed_command_reports_stderr() {
        let path = scratch_image("failing");
        let config = command_config(&["sh", "-c", "echo boom >&2; exit 3", "--"]);

        let err = set_wallpaper(&config, &path).unwrap_err();
        assert!(err.to_string().contains("boom"), "{err}");

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn successful_command_sets_wallpaper() {
        let path = scratch_image("succeeding");
        let config = command_config(&["true"]);

        set_wallpaper(&config, &path).unwrap();

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn command_gets_the_absolute_path() {
        let path = scratch_image("absolute");
        let expected = path.to_str().unwrap().to_string();
        let config = command_config(&["sh", "-c", "test \"$1\" = \"$2\"", "--", &expected, "{}"]);

        set_wallpaper(&config, &path).unwrap();

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        let config = command_config(&["true"]);
        let err = set_wallpaper(&config, Path::new("/nonexistent/image.jpg")).unwrap_err();
        assert!(err.to_string().contains("is not found"), "{err}");
    }

    #[test]
    fn resolved_path_is_plain_and_absolute() {
        let resolved = resolve_path(Path::new("image.jpg")).unwrap();

        assert!(resolved.is_absolute());
        assert_eq!(std::env::current_dir().unwrap().join("image.jpg"), resolved);
        assert!(!resolved.to_string_lossy().starts_with(r"\\?\"));
    }

    #[test]
    fn native_has_no_commands() {
        assert!(Backend::Native
            .commands(Path::new("/tmp/image.jpg"), &[])
            .unwrap()
            .is_empty());
    }
}
