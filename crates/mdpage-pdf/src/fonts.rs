//! Standard 14 font resources, WinAnsi encoding, and AFM advance widths.

use mdpage_render::{FontFace, ResolvedTextStyle, TextMeasurer};

/// Byte emitted for characters WinAnsi cannot represent.
pub const SUBSTITUTE_BYTE: u8 = b'?';

const FALLBACK_WIDTH: u16 = 556;
const COURIER_WIDTH: u16 = 600;

/// Helvetica advance widths for ASCII 0x20..=0x7E, in 1/1000 em.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
];

/// Helvetica-Bold advance widths for ASCII 0x20..=0x7E, in 1/1000 em.
const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0x30
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 0x50
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 0x60
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 0x70
];

/// PDF resource name for a face.
pub fn resource_name(face: FontFace) -> &'static [u8] {
    match face {
        FontFace::Normal => b"F1",
        FontFace::Bold => b"F2",
        FontFace::Monospace => b"F3",
    }
}

/// Standard 14 base font for a face.
pub fn base_font(face: FontFace) -> &'static [u8] {
    match face {
        FontFace::Normal => b"Helvetica",
        FontFace::Bold => b"Helvetica-Bold",
        FontFace::Monospace => b"Courier",
    }
}

/// Faces in resource order.
pub const FACES: [FontFace; 3] = [FontFace::Normal, FontFace::Bold, FontFace::Monospace];

/// Map a char onto its WinAnsi code, if it has one.
pub fn winansi_byte(ch: char) -> Option<u8> {
    let code = ch as u32;
    match ch {
        ' '..='~' => Some(code as u8),
        '\t' => Some(b' '),
        '\u{00A0}'..='\u{00FF}' => Some(code as u8),
        '\u{20AC}' => Some(0x80),
        '\u{201A}' => Some(0x82),
        '\u{0192}' => Some(0x83),
        '\u{201E}' => Some(0x84),
        '\u{2026}' => Some(0x85),
        '\u{2020}' => Some(0x86),
        '\u{2021}' => Some(0x87),
        '\u{02C6}' => Some(0x88),
        '\u{2030}' => Some(0x89),
        '\u{0160}' => Some(0x8A),
        '\u{2039}' => Some(0x8B),
        '\u{0152}' => Some(0x8C),
        '\u{017D}' => Some(0x8E),
        '\u{2018}' => Some(0x91),
        '\u{2019}' => Some(0x92),
        '\u{201C}' => Some(0x93),
        '\u{201D}' => Some(0x94),
        '\u{2022}' => Some(0x95),
        '\u{2013}' => Some(0x96),
        '\u{2014}' => Some(0x97),
        '\u{02DC}' => Some(0x98),
        '\u{2122}' => Some(0x99),
        '\u{0161}' => Some(0x9A),
        '\u{203A}' => Some(0x9B),
        '\u{0153}' => Some(0x9C),
        '\u{017E}' => Some(0x9E),
        '\u{0178}' => Some(0x9F),
        _ => None,
    }
}

/// Encode `text` as WinAnsi bytes. Returns the bytes and how many chars
/// were replaced with [`SUBSTITUTE_BYTE`].
pub fn encode_winansi(text: &str) -> (Vec<u8>, usize) {
    let mut bytes = Vec::with_capacity(text.len());
    let mut substituted = 0usize;
    for ch in text.chars() {
        match winansi_byte(ch) {
            Some(byte) => bytes.push(byte),
            None => {
                bytes.push(SUBSTITUTE_BYTE);
                substituted += 1;
            }
        }
    }
    (bytes, substituted)
}

/// Advance width of `ch` in 1/1000 em, as it will be drawn.
pub fn glyph_width(face: FontFace, ch: char) -> u16 {
    if face.is_monospace() {
        return COURIER_WIDTH;
    }
    let bold = face == FontFace::Bold;
    let byte = winansi_byte(ch).unwrap_or(SUBSTITUTE_BYTE);
    match byte {
        0x20..=0x7E => {
            let idx = usize::from(byte - 0x20);
            if bold {
                HELVETICA_BOLD_ASCII[idx]
            } else {
                HELVETICA_ASCII[idx]
            }
        }
        0x95 => 350,
        0x96 => 556,
        0x85 | 0x89 | 0x97 => 1000,
        0x91 | 0x92 | 0x82 => {
            if bold {
                278
            } else {
                222
            }
        }
        0x93 | 0x94 | 0x84 => {
            if bold {
                500
            } else {
                333
            }
        }
        0xA0 => 278,
        _ => FALLBACK_WIDTH,
    }
}

/// Text measurer matching the widths of the standard fonts used for output.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardFontMeasurer;

impl TextMeasurer for StandardFontMeasurer {
    fn measure_text_pt(&self, text: &str, style: &ResolvedTextStyle) -> f32 {
        let units: u32 = text
            .chars()
            .map(|ch| u32::from(glyph_width(style.face, ch)))
            .sum();
        units as f32 * style.size_pt / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_and_latin1_encode_directly() {
        assert_eq!(encode_winansi("Hi é!"), (b"Hi \xe9!".to_vec(), 0));
    }

    #[test]
    fn bullet_and_dashes_use_winansi_slots() {
        assert_eq!(encode_winansi("\u{2022} a\u{2013}b\u{2014}"), (b"\x95 a\x96b\x97".to_vec(), 0));
    }

    #[test]
    fn unmapped_chars_are_substituted_and_counted() {
        let (bytes, substituted) = encode_winansi("a你好b");
        assert_eq!(bytes, b"a??b".to_vec());
        assert_eq!(substituted, 2);
    }

    #[test]
    fn widths_follow_afm_tables() {
        let measurer = StandardFontMeasurer;
        let normal = ResolvedTextStyle::new(FontFace::Normal, 10.0);
        let bold = ResolvedTextStyle::new(FontFace::Bold, 10.0);
        let mono = ResolvedTextStyle::new(FontFace::Monospace, 10.0);
        // H e l l o = 722 + 556 + 222 + 222 + 556
        assert!((measurer.measure_text_pt("Hello", &normal) - 22.78).abs() < 0.001);
        // w o r l d = 778 + 611 + 389 + 278 + 611
        assert!((measurer.measure_text_pt("world", &bold) - 26.67).abs() < 0.001);
        assert!((measurer.measure_text_pt("code", &mono) - 24.0).abs() < 0.001);
    }

    #[test]
    fn resource_names_are_distinct_per_face() {
        let names: Vec<&[u8]> = FACES.iter().map(|f| resource_name(*f)).collect();
        assert_eq!(names, vec![&b"F1"[..], &b"F2"[..], &b"F3"[..]]);
        assert_eq!(base_font(FontFace::Bold), b"Helvetica-Bold");
    }
}
