use crossterm::style::Color;
use prise_protocol::wire_types::WireColor;

/// Fixed ANSI-16 RGB table, mirroring the daemon's `screen::colors::ANSI_16`
/// slot assignment so a `Named` style resolves to the same color on both
/// sides of the wire.
const ANSI_16: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (205, 0, 0),
    (0, 205, 0),
    (205, 205, 0),
    (0, 0, 238),
    (205, 0, 205),
    (0, 205, 205),
    (229, 229, 229),
    (127, 127, 127),
    (255, 0, 0),
    (0, 255, 0),
    (255, 255, 0),
    (92, 92, 255),
    (255, 0, 255),
    (0, 255, 255),
    (255, 255, 255),
];

/// Resolves a wire color to 8-bit RGB, `None` meaning "the terminal's
/// default foreground/background" (§4.4).
pub fn resolve_rgb(color: WireColor) -> (u8, u8, u8) {
    match color {
        WireColor::Named(idx) => ANSI_16.get(idx as usize).copied().unwrap_or((0, 0, 0)),
        WireColor::Indexed(idx) => indexed_rgb(idx),
        WireColor::Rgb(r, g, b) => (r, g, b),
    }
}

fn indexed_rgb(index: u8) -> (u8, u8, u8) {
    match index {
        0..=15 => ANSI_16[index as usize],
        16..=231 => {
            let idx = index - 16;
            let r = idx / 36;
            let g = (idx % 36) / 6;
            let b = idx % 6;
            let component = |c: u8| if c == 0 { 0 } else { 55 + 40 * c };
            (component(r), component(g), component(b))
        }
        232..=255 => {
            let value = 8 + 10 * (index - 232);
            (value, value, value)
        }
    }
}

pub fn to_crossterm(color: WireColor) -> Color {
    let (r, g, b) = resolve_rgb(color);
    Color::Rgb { r, g, b }
}

/// Rec. 601 perceptual luminance of an 8-bit RGB triple, in `[0, 255]`.
fn luminance_601(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Dims a cell color for an unfocused surface by mixing it `factor` of the
/// way toward a neutral anchor (§9 "Dim-for-focus math"). When the target
/// background is unknown, a perceptual-luminance check picks the mix
/// direction: light colors mix toward black, dark colors toward white, so
/// dimming always reduces contrast rather than occasionally increasing it.
pub fn dim(color: WireColor, factor: f32) -> Color {
    let (r, g, b) = resolve_rgb(color);
    let factor = factor.clamp(0.0, 1.0);
    let anchor: f32 = if luminance_601(r, g, b) > 127.5 { 0.0 } else { 255.0 };
    let mix = |c: u8| ((c as f32) * (1.0 - factor) + anchor * factor).round().clamp(0.0, 255.0) as u8;
    Color::Rgb { r: mix(r), g: mix(g), b: mix(b) }
}
