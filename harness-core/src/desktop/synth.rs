use enigo::{Button, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::error::{DeliveryError, HarnessError};
use crate::input::{DeliveryStrategy, KeyDirection, VirtualKey};

/// OS-level synthesized input, delivered to whichever window has focus.
pub struct SynthesizedInput {
    enigo: Enigo,
}

impl SynthesizedInput {
    pub fn new() -> Result<Self, HarnessError> {
        let enigo = Enigo::new(&Settings::default()).map_err(|err| {
            HarnessError::EnvironmentInit(format!("failed to open input synthesizer: {err}"))
        })?;
        Ok(Self { enigo })
    }
}

fn direction(direction: KeyDirection) -> Direction {
    match direction {
        KeyDirection::Press => Direction::Press,
        KeyDirection::Release => Direction::Release,
    }
}

impl DeliveryStrategy for SynthesizedInput {
    fn name(&self) -> &'static str {
        "synthesized-input"
    }

    fn deliver(&mut self, key: VirtualKey, dir: KeyDirection) -> Result<(), DeliveryError> {
        let result = match key {
            VirtualKey::MouseLeft => self.enigo.button(Button::Left, direction(dir)),
            VirtualKey::Char(c) => self.enigo.key(Key::Unicode(c), direction(dir)),
            VirtualKey::Space => self.enigo.key(Key::Space, direction(dir)),
            VirtualKey::Left => self.enigo.key(Key::LeftArrow, direction(dir)),
            VirtualKey::Right => self.enigo.key(Key::RightArrow, direction(dir)),
            VirtualKey::Up => self.enigo.key(Key::UpArrow, direction(dir)),
            VirtualKey::Down => self.enigo.key(Key::DownArrow, direction(dir)),
        };
        result.map_err(|err| DeliveryError::Rejected(err.to_string()))
    }
}
