//! Process-wide configuration read once at startup from environment switches.

use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const ENV_ALLOW_INTERACTIVE_FALLBACK: &str = "ISODESK_ALLOW_INTERACTIVE_FALLBACK";
pub const ENV_ALLOW_LEGACY_INPUT: &str = "ISODESK_ALLOW_LEGACY_INPUT";
pub const ENV_ALLOW_LEGACY_HOTKEYS: &str = "ISODESK_ALLOW_LEGACY_HOTKEYS";
pub const ENV_ALLOW_LEGACY_POINTER: &str = "ISODESK_ALLOW_LEGACY_POINTER";
pub const ENV_COORD_MODE: &str = "ISODESK_COORD_MODE";
pub const ENV_DESKTOP_NAME: &str = "ISODESK_DESKTOP_NAME";
pub const ENV_POLL_INTERVAL_MS: &str = "ISODESK_POLL_INTERVAL_MS";

pub const DEFAULT_DESKTOP_NAME: &str = "isodesk-sandbox";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Opt-in gates for the riskier execution paths. Every gate defaults to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityFlags {
    pub allow_interactive_fallback: bool,
    pub allow_legacy_input: bool,
    pub allow_legacy_hotkeys: bool,
    pub allow_legacy_pointer: bool,
}

impl CapabilityFlags {
    pub fn all() -> Self {
        Self {
            allow_interactive_fallback: true,
            allow_legacy_input: true,
            allow_legacy_hotkeys: true,
            allow_legacy_pointer: true,
        }
    }
}

/// How caller-supplied coordinates are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoordinateMode {
    #[default]
    ScreenRelative,
    ClientRelative,
}

impl FromStr for CoordinateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "screen" | "screenrelative" | "screen-relative" => {
                Ok(CoordinateMode::ScreenRelative)
            }
            "client" | "clientrelative" | "client-relative" | "window" => {
                Ok(CoordinateMode::ClientRelative)
            }
            other => Err(format!("unknown coordinate mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub flags: CapabilityFlags,
    pub coordinate_mode: CoordinateMode,
    /// Well-known name of the isolated desktop; every invocation reopens it by this name.
    pub desktop_name: String,
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flags: CapabilityFlags::default(),
            coordinate_mode: CoordinateMode::default(),
            desktop_name: DEFAULT_DESKTOP_NAME.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flags = CapabilityFlags {
            allow_interactive_fallback: parse_flag(lookup(ENV_ALLOW_INTERACTIVE_FALLBACK)),
            allow_legacy_input: parse_flag(lookup(ENV_ALLOW_LEGACY_INPUT)),
            allow_legacy_hotkeys: parse_flag(lookup(ENV_ALLOW_LEGACY_HOTKEYS)),
            allow_legacy_pointer: parse_flag(lookup(ENV_ALLOW_LEGACY_POINTER)),
        };

        let coordinate_mode = match lookup(ENV_COORD_MODE) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{}: {}, using screen-relative coordinates", ENV_COORD_MODE, e);
                CoordinateMode::ScreenRelative
            }),
            None => CoordinateMode::default(),
        };

        let desktop_name = lookup(ENV_DESKTOP_NAME)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DESKTOP_NAME.to_string());

        let poll_interval = match lookup(ENV_POLL_INTERVAL_MS) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    warn!("{}: invalid value '{}', using default", ENV_POLL_INTERVAL_MS, raw);
                    DEFAULT_POLL_INTERVAL
                }
            },
            None => DEFAULT_POLL_INTERVAL,
        };

        Self {
            flags,
            coordinate_mode,
            desktop_name,
            poll_interval,
        }
    }
}

/// Anything other than an explicit truthy value keeps the gate closed.
fn parse_flag(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}
