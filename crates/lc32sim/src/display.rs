//! Windowed `DisplaySink`: converts `BGR555` scanlines into a `pixels`
//! framebuffer and reports the held keypad buttons back to the scheduler.
//!
//! Grounded on `emu_nes::main::App::update_pixels`'s per-channel unpacking
//! of a framebuffer pixel format into the `pixels` crate's RGBA frame; here
//! the source format is 15-bit `BGR555` rather than packed ARGB.

use std::cell::Cell;

use pixels::Pixels;

use lc32_machine::DisplaySink;

use crate::keymap::KeyMap;

/// Unpack one `BGR555` pixel (`0bbbbbgggggrrrrr`, 5 bits per channel) into
/// 8-bit RGB, matching `spec.md` §6's "15-bit RGB in BGR555 layout".
#[must_use]
pub fn bgr555_to_rgb8(pixel: u16) -> (u8, u8, u8) {
    let r5 = pixel & 0x1F;
    let g5 = (pixel >> 5) & 0x1F;
    let b5 = (pixel >> 10) & 0x1F;
    // Replicate the top 3 bits into the low bits so 0x1F maps to 0xFF.
    let expand = |c5: u16| ((c5 << 3) | (c5 >> 2)) as u8;
    (expand(r5), expand(g5), expand(b5))
}

/// Borrows the window's `pixels` framebuffer and a `KeyMap` for one
/// `Machine::run_frame` call. `closed` is shared with the window event
/// handler so a `CloseRequested` event observed mid-frame is reported back
/// to the scheduler at the next scanline boundary.
pub struct WindowSink<'a> {
    pub pixels: &'a mut Pixels<'static>,
    pub keymap: &'a KeyMap,
    pub width: u32,
    pub closed: &'a Cell<bool>,
    pub render_failed: &'a Cell<bool>,
}

impl DisplaySink for WindowSink<'_> {
    fn update_scanline(&mut self, line: u32, pixels: &[u16]) -> bool {
        if self.closed.get() {
            return false;
        }
        let frame = self.pixels.frame_mut();
        let row_start = (line * self.width * 4) as usize;
        for (x, &px) in pixels.iter().enumerate() {
            let (r, g, b) = bgr555_to_rgb8(px);
            let offset = row_start + x * 4;
            frame[offset] = r;
            frame[offset + 1] = g;
            frame[offset + 2] = b;
            frame[offset + 3] = 0xFF;
        }
        true
    }

    fn present(&mut self) {
        if let Err(e) = self.pixels.render() {
            eprintln!("render error: {e}");
            self.render_failed.set(true);
        }
    }

    fn poll_input(&mut self) -> [bool; 10] {
        self.keymap.held()
    }
}

#[cfg(test)]
mod tests {
    use super::bgr555_to_rgb8;

    #[test]
    fn full_white_expands_to_0xff_per_channel() {
        assert_eq!(bgr555_to_rgb8(0x7FFF), (0xFF, 0xFF, 0xFF));
    }

    #[test]
    fn black_stays_zero() {
        assert_eq!(bgr555_to_rgb8(0), (0, 0, 0));
    }

    #[test]
    fn pure_red_channel() {
        let (r, g, b) = bgr555_to_rgb8(0x001F);
        assert_eq!((g, b), (0, 0));
        assert_eq!(r, 0xFF);
    }
}
