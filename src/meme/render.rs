use crate::meme::composite::{blend_pixel, MAX_CAPTURE_DIMENSION};
use crate::meme::model::{Alignment, Color, TextBox};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

pub const GLYPH_SIZE: i32 = 8;
/// Width of a text block in surface pixels.
pub const BLOCK_WIDTH: f64 = 300.0;
/// Surface pixels per unit of `TextBox::size`.
pub const BASE_FONT_PX: f64 = 16.0;
pub const LINE_HEIGHT: f64 = 1.2;
/// Ceiling for glyph, outline and block lengths in output pixels. One glyph
/// bit at this size already covers the largest capturable canvas.
pub const MAX_TEXT_EXTENT: f64 = (MAX_CAPTURE_DIMENSION * GLYPH_SIZE as u32) as f64;
const COORDINATE_LIMIT: f64 = 1_000_000_000.0;

pub trait GlyphSource {
    /// Rows of an 8x8 glyph, least significant bit leftmost.
    fn glyph(&self, ch: char) -> [u8; 8];
}

/// Public domain 8x8 bitmap font. Unsupported characters draw as `?`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Font8x8;

impl GlyphSource for Font8x8 {
    fn glyph(&self, ch: char) -> [u8; 8] {
        BASIC_FONTS
            .get(ch)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
}

/// Output-pixel placement of one text box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLayout {
    /// Output pixels per glyph bit.
    pub cell: i32,
    pub line_height: i32,
    pub block_left: i32,
    pub block_top: i32,
    pub block_width: i32,
    pub lines: Vec<PlacedLine>,
}

impl TextLayout {
    pub fn advance(&self) -> i32 {
        GLYPH_SIZE * self.cell
    }
}

pub fn layout_text_box(text_box: &TextBox, index: usize, scale: f32) -> TextLayout {
    let scale = scale as f64;
    let font_px = extent(text_box.size * BASE_FONT_PX * scale);
    let cell = ((font_px / GLYPH_SIZE as f64).round() as i32).max(1);
    let advance = GLYPH_SIZE * cell;
    let line_height = ((font_px * LINE_HEIGHT).round() as i32).max(advance);
    let block_width = extent(BLOCK_WIDTH * scale).round() as i32;
    let max_chars = (block_width / advance).max(1) as usize;

    let wrapped: Vec<String> = text_box
        .display_lines(index)
        .iter()
        .flat_map(|line| wrap_line(line, max_chars))
        .collect();

    let line_count = i32::try_from(wrapped.len()).unwrap_or(i32::MAX);
    let block_height = line_count.saturating_mul(line_height);
    let block_left = coordinate(text_box.x * scale).saturating_sub(block_width / 2);
    let block_top = coordinate(text_box.y * scale).saturating_sub(block_height / 2);
    let glyph_pad = (line_height - advance) / 2;

    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let chars = i32::try_from(text.chars().count()).unwrap_or(i32::MAX);
            let line_width = chars.saturating_mul(advance);
            let x = match text_box.alignment {
                Alignment::Left => block_left,
                Alignment::Center => {
                    block_left.saturating_add(block_width.saturating_sub(line_width) / 2)
                }
                Alignment::Right => block_left
                    .saturating_add(block_width)
                    .saturating_sub(line_width),
            };
            let row = i32::try_from(i).unwrap_or(i32::MAX);
            PlacedLine {
                text,
                x,
                y: block_top
                    .saturating_add(row.saturating_mul(line_height))
                    .saturating_add(glyph_pad),
            }
        })
        .collect();

    TextLayout {
        cell,
        line_height,
        block_left,
        block_top,
        block_width,
        lines,
    }
}

/// Clamp a length in output pixels to `[0, MAX_TEXT_EXTENT]`. NaN maps to 0.
fn extent(px: f64) -> f64 {
    if px.is_nan() {
        return 0.0;
    }
    px.clamp(0.0, MAX_TEXT_EXTENT)
}

/// Round a position in output pixels, clamped well inside `i32`.
fn coordinate(px: f64) -> i32 {
    if px.is_nan() {
        return 0;
    }
    px.clamp(-COORDINATE_LIMIT, COORDINATE_LIMIT).round() as i32
}

/// Draw a text box with its four-way outline followed by the fill.
pub fn draw_text_box(
    canvas: &mut RgbaImage,
    text_box: &TextBox,
    index: usize,
    scale: f32,
    glyphs: &dyn GlyphSource,
) {
    let layout = layout_text_box(text_box, index, scale);
    let outline = extent(text_box.outline_width * scale as f64).round() as i32;

    if outline > 0 {
        for (dx, dy) in [
            (outline, outline),
            (-outline, -outline),
            (outline, -outline),
            (-outline, outline),
        ] {
            draw_layout(canvas, &layout, (dx, dy), text_box.outline_color, glyphs);
        }
    }
    draw_layout(canvas, &layout, (0, 0), text_box.font_color, glyphs);
}

fn draw_layout(
    canvas: &mut RgbaImage,
    layout: &TextLayout,
    offset: (i32, i32),
    color: Color,
    glyphs: &dyn GlyphSource,
) {
    let color = Rgba(color.to_rgba_array());
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);
    let advance = layout.advance();
    for line in &layout.lines {
        let top = line.y.saturating_add(offset.1);
        if top >= height || top.saturating_add(advance) <= 0 {
            continue;
        }
        let mut cursor_x = line.x.saturating_add(offset.0);
        for ch in line.text.chars() {
            if cursor_x >= width {
                break;
            }
            if ch != ' ' && cursor_x.saturating_add(advance) > 0 {
                draw_glyph(canvas, glyphs.glyph(ch), (cursor_x, top), layout.cell, color);
            }
            cursor_x = cursor_x.saturating_add(advance);
        }
    }
}

/// Stamp each set bit as a `cell` square, visiting only the part of the
/// square that lies on the canvas.
fn draw_glyph(canvas: &mut RgbaImage, rows: [u8; 8], origin: (i32, i32), cell: i32, color: Rgba<u8>) {
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    let cell = cell as i64;
    for (row_idx, row_bits) in rows.iter().enumerate() {
        let top = origin.1 as i64 + row_idx as i64 * cell;
        let (y0, y1) = (top.max(0), (top + cell).min(height));
        if y0 >= y1 {
            continue;
        }
        for col_idx in 0..GLYPH_SIZE {
            if (row_bits >> col_idx) & 1 == 0 {
                continue;
            }
            let left = origin.0 as i64 + col_idx as i64 * cell;
            let (x0, x1) = (left.max(0), (left + cell).min(width));
            for ty in y0..y1 {
                for tx in x0..x1 {
                    let (tx, ty) = (tx as u32, ty as u32);
                    let dst = *canvas.get_pixel(tx, ty);
                    canvas.put_pixel(tx, ty, blend_pixel(dst, color));
                }
            }
        }
    }
}

/// Greedy word wrap to `max_chars` columns. Words longer than a line are split.
fn wrap_line(line: &str, max_chars: usize) -> Vec<String> {
    if line.chars().count() <= max_chars {
        return vec![line.to_string()];
    }

    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split(' ') {
        let word_len = word.chars().count();
        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            continue;
        }
        if current_len > 0 {
            out.push(std::mem::take(&mut current));
        }

        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > max_chars {
            out.push(chars.drain(..max_chars).collect());
        }
        current = chars.into_iter().collect();
    }
    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_box(text: &str, alignment: Alignment) -> TextBox {
        TextBox {
            text: text.into(),
            x: 150.0,
            y: 100.0,
            alignment,
            ..TextBox::new()
        }
    }

    #[test]
    fn layout_centers_block_on_anchor() {
        let layout = layout_text_box(&text_box("HI", Alignment::Center), 0, 1.0);
        // size 2 at scale 1 is 32px text: 4px cells, 32px advance, 38px lines.
        assert_eq!(layout.cell, 4);
        assert_eq!(layout.line_height, 38);
        assert_eq!(layout.block_left, 0);
        assert_eq!(layout.block_top, 100 - 19);
        assert_eq!(layout.lines[0].x, (300 - 64) / 2);
    }

    #[test]
    fn alignment_moves_lines_inside_block() {
        let left = layout_text_box(&text_box("HI", Alignment::Left), 0, 1.0);
        let right = layout_text_box(&text_box("HI", Alignment::Right), 0, 1.0);
        assert_eq!(left.lines[0].x, 0);
        assert_eq!(right.lines[0].x, 300 - 64);
    }

    #[test]
    fn scale_multiplies_geometry() {
        let one = layout_text_box(&text_box("HI", Alignment::Left), 0, 1.0);
        let two = layout_text_box(&text_box("HI", Alignment::Left), 0, 2.0);
        assert_eq!(two.cell, one.cell * 2);
        assert_eq!(two.block_width, one.block_width * 2);
    }

    #[test]
    fn empty_text_lays_out_placeholder() {
        let layout = layout_text_box(&text_box("", Alignment::Center), 2, 1.0);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].text, "Text 3");
    }

    #[test]
    fn wrap_breaks_on_words_and_long_words() {
        assert_eq!(wrap_line("one does not", 8), vec!["one does", "not"]);
        assert_eq!(wrap_line("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_line(" ", 4), vec![" "]);
    }

    #[test]
    fn draw_writes_fill_and_outline_pixels() {
        let mut canvas = RgbaImage::new(300, 200);
        let mut b = text_box("I", Alignment::Center);
        b.font_color = Color::rgba(255, 0, 0, 255);
        b.outline_color = Color::rgba(0, 0, 255, 255);
        draw_text_box(&mut canvas, &b, 0, 1.0, &Font8x8);

        let red = canvas.pixels().filter(|p| p.0 == [255, 0, 0, 255]).count();
        let blue = canvas.pixels().filter(|p| p.0 == [0, 0, 255, 255]).count();
        assert!(red > 0);
        assert!(blue > 0);
    }

    #[test]
    fn zero_outline_draws_fill_only() {
        let mut canvas = RgbaImage::new(300, 200);
        let mut b = text_box("I", Alignment::Center);
        b.outline_width = 0.0;
        b.outline_color = Color::rgba(0, 0, 255, 255);
        draw_text_box(&mut canvas, &b, 0, 1.0, &Font8x8);
        assert_eq!(canvas.pixels().filter(|p| p.0[2] == 255 && p.0[0] == 0).count(), 0);
    }

    #[test]
    fn drawing_off_canvas_is_bounds_safe() {
        let mut canvas = RgbaImage::new(10, 10);
        let mut b = text_box("WIDE TEXT", Alignment::Center);
        b.x = -400.0;
        b.y = 5000.0;
        draw_text_box(&mut canvas, &b, 0, 2.0, &Font8x8);
        assert!(canvas.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn huge_size_is_clamped_instead_of_overflowing() {
        let mut canvas = RgbaImage::new(10, 10);
        let mut b = text_box("HI", Alignment::Center);
        b.size = 1e12;
        draw_text_box(&mut canvas, &b, 0, 2.0, &Font8x8);

        let layout = layout_text_box(&b, 0, 2.0);
        assert_eq!(layout.advance() as f64, MAX_TEXT_EXTENT);
    }

    #[test]
    fn oversized_glyphs_only_touch_visible_pixels() {
        let mut canvas = RgbaImage::new(10, 10);
        let mut b = text_box("I", Alignment::Center);
        b.size = 2000.0;
        b.x = 2.5;
        b.y = 2.5;

        let started = std::time::Instant::now();
        draw_text_box(&mut canvas, &b, 0, 2.0, &Font8x8);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn huge_outline_width_is_bounds_safe() {
        let mut canvas = RgbaImage::new(10, 10);
        let mut b = text_box("I", Alignment::Left);
        b.outline_width = 1e15;
        b.outline_color = Color::rgba(0, 0, 255, 255);
        b.font_color = Color::rgba(255, 0, 0, 255);
        b.x = 150.0;
        b.y = 0.0;
        draw_text_box(&mut canvas, &b, 0, 1.0, &Font8x8);
        assert_eq!(canvas.pixels().filter(|p| p.0 == [0, 0, 255, 255]).count(), 0);
    }

    #[test]
    fn extreme_and_nan_positions_are_bounds_safe() {
        let mut canvas = RgbaImage::new(10, 10);
        for (x, y) in [
            (1e300, -1e300),
            (-1e300, 1e300),
            (f64::NAN, f64::INFINITY),
            (i32::MAX as f64, i32::MIN as f64),
        ] {
            let mut b = text_box("FAR AWAY", Alignment::Right);
            b.x = x;
            b.y = y;
            draw_text_box(&mut canvas, &b, 0, 2.0, &Font8x8);
        }
    }
}
