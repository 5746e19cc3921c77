// Advance widths of the standard Helvetica font in 1/1000 em, indexed by
// WinAnsi code. Only the printable ASCII and Latin-1 ranges are covered.

const ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
];

const LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333, // 0xA0
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611, // 0xB0
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // 0xC0
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // 0xD0
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278, // 0xE0
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500, // 0xF0
];

fn glyph_width(c: char) -> Option<u16> {
    match c as u32 {
        code @ 0x20..=0x7E => Some(ASCII[(code - 0x20) as usize]),
        code @ 0xA0..=0xFF => Some(LATIN1[(code - 0xA0) as usize]),
        _ => None,
    }
}

/// Encodes `text` as WinAnsi bytes, or returns the first unsupported character.
pub fn encode_win_ansi(text: &str) -> Result<Vec<u8>, char> {
    text.chars()
        .map(|c| glyph_width(c).map(|_| c as u32 as u8).ok_or(c))
        .collect()
}

/// Rendered width of `text` in points at `font_size`.
pub fn text_width(text: &str, font_size: f32) -> Result<f32, char> {
    let mut units: u32 = 0;
    for c in text.chars() {
        units += u32::from(glyph_width(c).ok_or(c)?);
    }
    Ok(units as f32 * font_size / 1000.0)
}
