//! Display mode inspection
//!
//! Mode line dumps in the modetest layout and mode selection helpers

use drm::control::{Mode, ModeTypeFlags};
use std::fmt;

/// DRM_MODE_TYPE_* bit names, bit 0 first
const MODE_TYPE_NAMES: &[&str] = &[
    "builtin",
    "clock_c",
    "crtc_c",
    "preferred",
    "default",
    "userdef",
    "driver",
];

/// DRM_MODE_FLAG_* bit names, bit 0 first
const MODE_FLAG_NAMES: &[&str] = &[
    "phsync",
    "nhsync",
    "pvsync",
    "nvsync",
    "interlace",
    "dblscan",
    "csync",
    "pcsync",
    "ncsync",
    "hskew",
    "bcast",
    "pixmux",
    "dblclk",
    "clkdiv2",
];

/// Join the names of the set bits with ", ". Bits without a name are ignored.
pub fn bit_names(bits: u32, names: &[&str]) -> String {
    names
        .iter()
        .enumerate()
        .filter(|(i, _)| bits & (1 << i) != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Plain copy of the timing fields of a mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeLine {
    pub name: String,
    pub vrefresh: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub clock: u32,
    pub flags: u32,
    pub mode_type: u32,
}

impl From<&Mode> for ModeLine {
    fn from(mode: &Mode) -> Self {
        let (hdisplay, vdisplay) = mode.size();
        let (hsync_start, hsync_end, htotal) = mode.hsync();
        let (vsync_start, vsync_end, vtotal) = mode.vsync();
        Self {
            name: mode.name().to_string_lossy().into_owned(),
            vrefresh: mode.vrefresh(),
            hdisplay,
            hsync_start,
            hsync_end,
            htotal,
            vdisplay,
            vsync_start,
            vsync_end,
            vtotal,
            clock: mode.clock(),
            flags: mode.flags().bits(),
            mode_type: mode.mode_type().bits(),
        }
    }
}

impl ModeLine {
    pub fn flag_names(&self) -> String {
        bit_names(self.flags, MODE_FLAG_NAMES)
    }

    pub fn type_names(&self) -> String {
        bit_names(self.mode_type, MODE_TYPE_NAMES)
    }
}

impl fmt::Display for ModeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  {} {} {} {} {} {} {} {} {} {} {} flags: {}; type: {}",
            self.name,
            self.vrefresh,
            self.hdisplay,
            self.hsync_start,
            self.hsync_end,
            self.htotal,
            self.vdisplay,
            self.vsync_start,
            self.vsync_end,
            self.vtotal,
            self.clock,
            self.flag_names(),
            self.type_names()
        )
    }
}

/// Which of the connector's modes to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChoice {
    /// The connector's first mode
    First,
    /// The first mode flagged PREFERRED; every mode up to it is dumped to stdout
    Preferred,
}

/// Pick a mode according to `choice`.
///
/// `Preferred` prints each inspected mode line, stopping at the first
/// preferred one, and does not fall back to another mode.
pub fn select_mode(modes: &[Mode], choice: ModeChoice) -> Option<Mode> {
    match choice {
        ModeChoice::First => modes.first().copied(),
        ModeChoice::Preferred => {
            for mode in modes {
                println!("{}", ModeLine::from(mode));
                if mode.mode_type().contains(ModeTypeFlags::PREFERRED) {
                    return Some(*mode);
                }
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModeLine {
        ModeLine {
            name: "1920x1080".to_string(),
            vrefresh: 60,
            hdisplay: 1920,
            hsync_start: 2008,
            hsync_end: 2052,
            htotal: 2200,
            vdisplay: 1080,
            vsync_start: 1084,
            vsync_end: 1089,
            vtotal: 1125,
            clock: 148500,
            flags: 0b0101,     // phsync | pvsync
            mode_type: 0b1001000, // preferred | driver
        }
    }

    fn mode(hdisplay: u16, preferred: bool) -> Mode {
        let mut info = drm_ffi::drm_mode_modeinfo {
            hdisplay,
            vdisplay: 600,
            vrefresh: 60,
            ..Default::default()
        };
        if preferred {
            info.type_ = ModeTypeFlags::PREFERRED.bits();
        }
        Mode::from(info)
    }

    #[test]
    fn test_select_first_ignores_preferred() {
        let modes = [mode(800, false), mode(1024, true)];
        let chosen = select_mode(&modes, ModeChoice::First).unwrap();
        assert_eq!(chosen.size(), (800, 600));
        assert!(select_mode(&[], ModeChoice::First).is_none());
    }

    #[test]
    fn test_select_stops_at_first_preferred() {
        let modes = [mode(640, false), mode(1024, true), mode(1280, true)];
        let chosen = select_mode(&modes, ModeChoice::Preferred).unwrap();
        assert_eq!(chosen.size(), (1024, 600));
    }

    #[test]
    fn test_select_preferred_has_no_fallback() {
        let modes = [mode(640, false), mode(800, false)];
        assert!(select_mode(&modes, ModeChoice::Preferred).is_none());
    }

    #[test]
    fn test_bit_names() {
        assert_eq!(bit_names(0, MODE_FLAG_NAMES), "");
        assert_eq!(bit_names(1 << 4, MODE_FLAG_NAMES), "interlace");
        assert_eq!(bit_names(0b11, MODE_TYPE_NAMES), "builtin, clock_c");
        // Bits beyond the table are dropped
        assert_eq!(bit_names(1 << 20, MODE_TYPE_NAMES), "");
    }

    #[test]
    fn test_mode_line_format() {
        assert_eq!(
            sample().to_string(),
            "  1920x1080 60 1920 2008 2052 2200 1080 1084 1089 1125 148500 \
             flags: phsync, pvsync; type: preferred, driver"
        );
    }
}
