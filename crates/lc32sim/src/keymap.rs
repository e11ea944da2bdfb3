//! Resolves the JSON config's named keybinds (e.g. `"X"`, `"ArrowRight"`)
//! against `winit`'s physical key codes, and tracks which of the ten keypad
//! buttons are currently held.
//!
//! Grounded on `emu_nes::controller_map::map_keycode`: a small lookup from
//! `winit::keyboard::KeyCode` to a button enum, driven here by
//! `lc32_devices::BUTTON_ORDER` instead of a fixed NES pad layout since
//! `spec.md` §6 makes every button rebindable.

use winit::keyboard::KeyCode;

use lc32_devices::BUTTON_ORDER;
use lc32_machine::Config;

/// Parse one key-name string from `Keybinds` into a `winit` physical key
/// code. Unrecognized names are treated as unbound (never match any press).
#[must_use]
pub fn key_code_from_name(name: &str) -> Option<KeyCode> {
    Some(match name {
        "A" => KeyCode::KeyA,
        "B" => KeyCode::KeyB,
        "C" => KeyCode::KeyC,
        "D" => KeyCode::KeyD,
        "E" => KeyCode::KeyE,
        "F" => KeyCode::KeyF,
        "G" => KeyCode::KeyG,
        "H" => KeyCode::KeyH,
        "I" => KeyCode::KeyI,
        "J" => KeyCode::KeyJ,
        "K" => KeyCode::KeyK,
        "L" => KeyCode::KeyL,
        "M" => KeyCode::KeyM,
        "N" => KeyCode::KeyN,
        "O" => KeyCode::KeyO,
        "P" => KeyCode::KeyP,
        "Q" => KeyCode::KeyQ,
        "R" => KeyCode::KeyR,
        "S" => KeyCode::KeyS,
        "T" => KeyCode::KeyT,
        "U" => KeyCode::KeyU,
        "V" => KeyCode::KeyV,
        "W" => KeyCode::KeyW,
        "X" => KeyCode::KeyX,
        "Y" => KeyCode::KeyY,
        "Z" => KeyCode::KeyZ,
        "ArrowUp" => KeyCode::ArrowUp,
        "ArrowDown" => KeyCode::ArrowDown,
        "ArrowLeft" => KeyCode::ArrowLeft,
        "ArrowRight" => KeyCode::ArrowRight,
        "Enter" => KeyCode::Enter,
        "Backspace" => KeyCode::Backspace,
        "Space" => KeyCode::Space,
        "Tab" => KeyCode::Tab,
        "ShiftLeft" => KeyCode::ShiftLeft,
        "ShiftRight" => KeyCode::ShiftRight,
        "ControlLeft" => KeyCode::ControlLeft,
        "ControlRight" => KeyCode::ControlRight,
        _ => return None,
    })
}

/// Tracks which of the ten `lc32_devices::BUTTON_ORDER` buttons are held,
/// resolved against a `Config`'s `Keybinds`.
pub struct KeyMap {
    codes: [Option<KeyCode>; 10],
    held: [bool; 10],
}

impl KeyMap {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let binds = &config.keybinds;
        let names = [
            &binds.a,
            &binds.b,
            &binds.select,
            &binds.start,
            &binds.right,
            &binds.left,
            &binds.up,
            &binds.down,
            &binds.r,
            &binds.l,
        ];
        debug_assert_eq!(names.len(), BUTTON_ORDER.len());

        let mut codes = [None; 10];
        for (slot, name) in codes.iter_mut().zip(names) {
            *slot = key_code_from_name(name);
        }

        Self { codes, held: [false; 10] }
    }

    /// Update held state in response to a physical key transition.
    pub fn set_pressed(&mut self, code: KeyCode, pressed: bool) {
        for (i, bound) in self.codes.iter().enumerate() {
            if *bound == Some(code) {
                self.held[i] = pressed;
            }
        }
    }

    #[must_use]
    pub const fn held(&self) -> [bool; 10] {
        self.held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_resolves_every_button() {
        let config = Config::default();
        let map = KeyMap::new(&config);
        assert!(map.codes.iter().all(Option::is_some));
    }

    #[test]
    fn set_pressed_tracks_bound_key() {
        let config = Config::default();
        let mut map = KeyMap::new(&config);
        map.set_pressed(KeyCode::KeyX, true); // "a" defaults to "X"
        assert!(map.held()[0]);
        map.set_pressed(KeyCode::KeyX, false);
        assert!(!map.held()[0]);
    }

    #[test]
    fn unrecognized_key_name_is_unbound() {
        assert_eq!(key_code_from_name("NotAKey"), None);
    }
}
