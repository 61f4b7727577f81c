use std::fmt;

use serde::{Deserialize, Serialize};

/// An input the injector can hold down. Mouse buttons travel the same path
/// as keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VirtualKey {
    /// Lowercase ASCII letter or digit.
    Char(char),
    Space,
    Left,
    Right,
    Up,
    Down,
    MouseLeft,
}

impl VirtualKey {
    /// Win32 virtual-key code (`VK_*`).
    pub fn vk_code(self) -> u16 {
        match self {
            Self::Char(c) => c.to_ascii_uppercase() as u16,
            Self::Space => 0x20,
            Self::Left => 0x25,
            Self::Up => 0x26,
            Self::Right => 0x27,
            Self::Down => 0x28,
            Self::MouseLeft => 0x01,
        }
    }

    pub fn is_mouse(self) -> bool {
        matches!(self, Self::MouseLeft)
    }

    /// Parse the key names used in genre key maps (`"w"`, `"left"`, `"space"`,
    /// `"click"`).
    pub fn parse(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "space" => Some(Self::Space),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "click" => Some(Self::MouseLeft),
            _ => {
                let mut chars = lowered.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphanumeric() => Some(Self::Char(c)),
                    _ => None,
                }
            }
        }
    }
}

impl fmt::Display for VirtualKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{c}"),
            Self::Space => f.write_str("space"),
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
            Self::MouseLeft => f.write_str("click"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyDirection {
    Press,
    Release,
}

/// Discrete action index → key. `None` entries are no-ops.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionMap {
    bindings: Vec<Option<VirtualKey>>,
}

impl ActionMap {
    pub fn new(bindings: Vec<Option<VirtualKey>>) -> Self {
        Self { bindings }
    }

    /// Build from key names; `"nop"` (or any unknown name) binds nothing.
    pub fn from_names(names: &[&str]) -> Self {
        Self::new(names.iter().map(|name| VirtualKey::parse(name)).collect())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Out-of-range indices resolve to nothing, like a no-op.
    pub fn key_for(&self, index: usize) -> Option<VirtualKey> {
        self.bindings.get(index).copied().flatten()
    }
}

/// Keys driven by the continuous (steering, throttle) path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionKeys {
    pub steer_left: VirtualKey,
    pub steer_right: VirtualKey,
    pub accelerate: VirtualKey,
    pub brake: VirtualKey,
}

impl Default for DirectionKeys {
    fn default() -> Self {
        Self {
            steer_left: VirtualKey::Char('a'),
            steer_right: VirtualKey::Char('d'),
            accelerate: VirtualKey::Char('w'),
            brake: VirtualKey::Char('s'),
        }
    }
}
