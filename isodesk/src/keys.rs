//! Hotkey sequences: `ctrl+shift+s alt+f4 enter`.
//!
//! Chords are separated by whitespace, keys within a chord by `+`. Every key
//! but the last must be a modifier. Names are case-insensitive and may be
//! wrapped in braces (`{ENTER}`).

use crate::errors::AutomationError;
use std::fmt;

pub const VK_BACK: u16 = 0x08;
pub const VK_TAB: u16 = 0x09;
pub const VK_RETURN: u16 = 0x0D;
pub const VK_SHIFT: u16 = 0x10;
pub const VK_CONTROL: u16 = 0x11;
pub const VK_MENU: u16 = 0x12;
pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_SPACE: u16 = 0x20;
pub const VK_LWIN: u16 = 0x5B;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Win,
}

impl Modifier {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "shift" => Some(Modifier::Shift),
            "alt" | "menu" => Some(Modifier::Alt),
            "win" | "windows" | "lwin" | "super" | "meta" => Some(Modifier::Win),
            _ => None,
        }
    }

    pub fn vk(self) -> u16 {
        match self {
            Modifier::Ctrl => VK_CONTROL,
            Modifier::Shift => VK_SHIFT,
            Modifier::Alt => VK_MENU,
            Modifier::Win => VK_LWIN,
        }
    }
}

/// Virtual-key code for a key name.
pub fn virtual_key(name: &str) -> Option<u16> {
    let vk = match name {
        "enter" | "return" => VK_RETURN,
        "tab" => VK_TAB,
        "esc" | "escape" => VK_ESCAPE,
        "space" | "spacebar" => VK_SPACE,
        "backspace" | "back" => VK_BACK,
        "pause" => 0x13,
        "capslock" => 0x14,
        "pageup" | "pgup" => 0x21,
        "pagedown" | "pgdn" => 0x22,
        "end" => 0x23,
        "home" => 0x24,
        "left" => 0x25,
        "up" => 0x26,
        "right" => 0x27,
        "down" => 0x28,
        "printscreen" | "prtsc" => 0x2C,
        "insert" | "ins" => 0x2D,
        "delete" | "del" => 0x2E,
        "apps" | "contextmenu" => 0x5D,
        ";" => 0xBA,
        "=" | "plus" => 0xBB,
        "," | "comma" => 0xBC,
        "-" | "minus" => 0xBD,
        "." | "period" => 0xBE,
        "/" => 0xBF,
        "`" => 0xC0,
        "[" => 0xDB,
        "\\" => 0xDC,
        "]" => 0xDD,
        "'" => 0xDE,
        _ => {
            if let Some(modifier) = Modifier::parse(name) {
                return Some(modifier.vk());
            }
            let mut chars = name.chars();
            if let (Some(c), None) = (chars.next(), chars.clone().next()) {
                if c.is_ascii_alphanumeric() {
                    return Some(c.to_ascii_uppercase() as u16);
                }
            }
            let number = name.strip_prefix('f')?.parse::<u16>().ok()?;
            if (1..=24).contains(&number) {
                return Some(0x70 + number - 1);
            }
            return None;
        }
    };
    Some(vk)
}

/// Modifiers held while one key is pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub modifiers: Vec<Modifier>,
    pub key: u16,
    text: String,
}

impl KeyChord {
    pub fn parse(chord: &str) -> Result<Self, AutomationError> {
        let text = chord.trim().to_string();
        let lowered = text.to_lowercase();
        // `ctrl++` names the plus key.
        let mut parts: Vec<&str> = match lowered.strip_suffix("++") {
            Some(head) => head.split('+').chain(std::iter::once("plus")).collect(),
            None => lowered.split('+').collect(),
        };
        let invalid = || AutomationError::InvalidArgument(format!("invalid key chord '{text}'"));

        let key_name = parts.pop().map(clean).filter(|k| !k.is_empty()).ok_or_else(invalid)?;
        let key = virtual_key(key_name).ok_or_else(|| {
            AutomationError::InvalidArgument(format!("unknown key '{key_name}' in '{text}'"))
        })?;

        let mut modifiers = Vec::with_capacity(parts.len());
        for part in parts {
            let modifier = Modifier::parse(clean(part)).ok_or_else(invalid)?;
            if !modifiers.contains(&modifier) {
                modifiers.push(modifier);
            }
        }

        Ok(Self {
            modifiers,
            key,
            text,
        })
    }

    pub fn has_alt(&self) -> bool {
        self.modifiers.contains(&Modifier::Alt) || self.key == VK_MENU
    }

    /// Enter with nothing held, eligible for the accessibility path.
    pub fn is_plain_enter(&self) -> bool {
        self.modifiers.is_empty() && self.key == VK_RETURN
    }
}

fn clean(part: &str) -> &str {
    part.trim().trim_start_matches('{').trim_end_matches('}')
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Whitespace-separated chords, in order. An empty sequence is an error.
pub fn parse_sequence(seq: &str) -> Result<Vec<KeyChord>, AutomationError> {
    let chords = seq
        .split_whitespace()
        .map(KeyChord::parse)
        .collect::<Result<Vec<_>, _>>()?;
    if chords.is_empty() {
        return Err(AutomationError::InvalidArgument(
            "empty key sequence".to_string(),
        ));
    }
    Ok(chords)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modifiers_and_key() {
        let chord = KeyChord::parse("Ctrl+Shift+S").unwrap();
        assert_eq!(chord.modifiers, vec![Modifier::Ctrl, Modifier::Shift]);
        assert_eq!(chord.key, b'S' as u16);
        assert!(!chord.has_alt());
    }

    #[test]
    fn function_keys_and_named_keys() {
        assert_eq!(KeyChord::parse("alt+f4").unwrap().key, 0x73);
        assert!(KeyChord::parse("alt+f4").unwrap().has_alt());
        assert_eq!(KeyChord::parse("{ENTER}").unwrap().key, VK_RETURN);
        assert_eq!(KeyChord::parse("ctrl++").unwrap().key, 0xBB);
        assert_eq!(virtual_key("f25"), None);
    }

    #[test]
    fn plain_enter_only_without_modifiers() {
        assert!(KeyChord::parse("enter").unwrap().is_plain_enter());
        assert!(!KeyChord::parse("ctrl+enter").unwrap().is_plain_enter());
    }

    #[test]
    fn rejects_bad_chords() {
        assert!(KeyChord::parse("a+ctrl").is_err());
        assert!(KeyChord::parse("ctrl+").is_err());
        assert!(KeyChord::parse("ctrl+nosuchkey").is_err());
        assert!(parse_sequence("   ").is_err());
    }

    #[test]
    fn sequences_split_on_whitespace() {
        let chords = parse_sequence("ctrl+a  delete\tenter").unwrap();
        assert_eq!(chords.len(), 3);
        assert_eq!(chords[1].key, 0x2E);
    }
}
