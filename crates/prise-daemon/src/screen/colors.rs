use alacritty_terminal::vte::ansi::{Color, NamedColor};
use prise_protocol::wire_types::WireColor;

/// Converts an alacritty `Color` into the wire representation (§4.4's
/// "colors ... mirroring the VT interpreter's own `Color` representation").
///
/// `None` means "the terminal's default foreground/background" — the client
/// paints that with its own theme rather than a fixed RGB triple, mirroring
/// how `NamedColor::Foreground`/`Background` are special-cased against a
/// theme rather than a palette slot in a GPUI-rendered terminal.
pub fn resolve_color(color: &Color) -> Option<WireColor> {
    match color {
        Color::Named(named) => resolve_named(*named),
        Color::Indexed(idx) => Some(WireColor::Indexed(*idx)),
        Color::Spec(rgb) => Some(WireColor::Rgb(rgb.r, rgb.g, rgb.b)),
    }
}

fn resolve_named(named: NamedColor) -> Option<WireColor> {
    match named {
        NamedColor::Black | NamedColor::DimBlack => Some(WireColor::Named(0)),
        NamedColor::Red | NamedColor::DimRed => Some(WireColor::Named(1)),
        NamedColor::Green | NamedColor::DimGreen => Some(WireColor::Named(2)),
        NamedColor::Yellow | NamedColor::DimYellow => Some(WireColor::Named(3)),
        NamedColor::Blue | NamedColor::DimBlue => Some(WireColor::Named(4)),
        NamedColor::Magenta | NamedColor::DimMagenta => Some(WireColor::Named(5)),
        NamedColor::Cyan | NamedColor::DimCyan => Some(WireColor::Named(6)),
        NamedColor::White | NamedColor::DimWhite => Some(WireColor::Named(7)),
        NamedColor::BrightBlack => Some(WireColor::Named(8)),
        NamedColor::BrightRed => Some(WireColor::Named(9)),
        NamedColor::BrightGreen => Some(WireColor::Named(10)),
        NamedColor::BrightYellow => Some(WireColor::Named(11)),
        NamedColor::BrightBlue => Some(WireColor::Named(12)),
        NamedColor::BrightMagenta => Some(WireColor::Named(13)),
        NamedColor::BrightCyan => Some(WireColor::Named(14)),
        NamedColor::BrightWhite => Some(WireColor::Named(15)),
        NamedColor::Foreground
        | NamedColor::BrightForeground
        | NamedColor::DimForeground
        | NamedColor::Background
        | NamedColor::Cursor => None,
    }
}

/// Fixed xterm-default RGB for the 256-color palette, used to answer OSC
/// 4/10/11/12 color queries against the master (§4.4's "OSC query
/// handling"). Indices 0-15 follow the same ANSI table as [`resolve_named`];
/// 16-231 are the standard 6x6x6 cube; 232-255 the grayscale ramp.
pub fn default_palette_rgb(index: u8) -> (u8, u8, u8) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_named_colors_map_to_low_slots() {
        assert_eq!(resolve_named(NamedColor::Black), Some(WireColor::Named(0)));
        assert_eq!(resolve_named(NamedColor::White), Some(WireColor::Named(7)));
    }

    #[test]
    fn bright_named_colors_map_to_high_slots() {
        assert_eq!(
            resolve_named(NamedColor::BrightWhite),
            Some(WireColor::Named(15))
        );
    }

    #[test]
    fn default_fg_bg_resolve_to_none() {
        assert_eq!(resolve_named(NamedColor::Foreground), None);
        assert_eq!(resolve_named(NamedColor::Background), None);
    }

    #[test]
    fn indexed_color_passes_through() {
        assert_eq!(resolve_color(&Color::Indexed(200)), Some(WireColor::Indexed(200)));
    }

    #[test]
    fn spec_rgb_passes_through() {
        use alacritty_terminal::vte::ansi::Rgb;
        let rgb = Rgb { r: 10, g: 20, b: 30 };
        assert_eq!(
            resolve_color(&Color::Spec(rgb)),
            Some(WireColor::Rgb(10, 20, 30))
        );
    }

    #[test]
    fn grayscale_ramp_is_monotonic() {
        let (r0, _, _) = default_palette_rgb(232);
        let (r1, _, _) = default_palette_rgb(255);
        assert!(r1 > r0);
    }
}
