use std::fmt;

/// Size of the whole screen in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const FALLBACK: Self = Self {
        width: 1920,
        height: 1080,
    };
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Detect the screen size, falling back to 1920x1080
pub fn detect() -> ScreenSize {
    match try_detect() {
        Some(size) => size,
        None => {
            log::warn!(
                "Failed to detect the screen resolution. Falling back to {}",
                ScreenSize::FALLBACK
            );
            ScreenSize::FALLBACK
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn try_detect() -> Option<ScreenSize> {
    let output = std::process::Command::new("xrandr")
        .arg("-q")
        .output()
        .inspect_err(|err| log::debug!("couldn't run xrandr: {err}"))
        .ok()?;

    if !output.status.success() {
        log::debug!("xrandr exited with {}", output.status);
        return None;
    }

    parse_xrandr(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn try_detect() -> Option<ScreenSize> {
    None
}

/// Read the current size from a line like
/// `Screen 0: minimum 8 x 8, current 2560 x 1440, maximum 32767 x 32767`
pub fn parse_xrandr(output: &str) -> Option<ScreenSize> {
    output
        .lines()
        .filter(|line| line.starts_with("Screen "))
        .find_map(|line| {
            let (_, current) = line.split_once("current ")?;
            let current = current.split(',').next()?;
            let (width, height) = current.split_once(" x ")?;
            Some(ScreenSize {
                width: width.trim().parse().ok()?,
                height: height.trim().parse().ok()?,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_xrandr_query() {
        let output = "\
Screen 0: minimum 8 x 8, current 2560 x 1440, maximum 32767 x 32767
DP-1 connected primary 2560x1440+0+0 (normal left inverted right x axis y axis) 597mm x 336mm
   2560x1440     59.95*+
   1920x1080     60.00
HDMI-1 disconnected (normal left inverted right x axis y axis)
";

        assert_eq!(
            Some(ScreenSize {
                width: 2560,
                height: 1440
            }),
            parse_xrandr(output)
        );
    }

    #[test]
    fn parse_xrandr_without_screen_line() {
        assert_eq!(None, parse_xrandr(""));
        assert_eq!(None, parse_xrandr("Can't open display :0\n"));
        assert_eq!(
            None,
            parse_xrandr("Screen 0: minimum 8 x 8, current ? x ?, maximum 32767 x 32767")
        );
    }

    #[test]
    fn screen_size_display() {
        assert_eq!("1920x1080", ScreenSize::FALLBACK.to_string());
    }
}
