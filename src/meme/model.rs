use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Surface size used when a text box is created without an explicit surface.
pub const DEFAULT_SURFACE_WIDTH: f64 = 600.0;
pub const DEFAULT_SURFACE_HEIGHT: f64 = 600.0;

pub const MIN_SIZE: f64 = 1.0;
pub const MAX_SIZE: f64 = 5.0;
pub const MIN_OUTLINE_WIDTH: f64 = 0.0;
pub const MAX_OUTLINE_WIDTH: f64 = 4.0;

const DEFAULT_SIZE: f64 = 2.0;
const DEFAULT_OUTLINE_WIDTH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_rgba_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// `#rrggbb`, or `#rrggbbaa` when the color is not opaque.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(pub String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid hex color `{}`", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseColorError(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        match hex.len() {
            3 => {
                let nibble = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|v| v * 17)
                        .map_err(|_| err())
                };
                Ok(Self::rgba(nibble(0)?, nibble(1)?, nibble(2)?, 255))
            }
            6 => Ok(Self::rgba(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Ok(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(err()),
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

/// One overlay text entity. Position is the box's own center in surface
/// coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBox {
    pub id: String,
    pub text: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_size")]
    pub size: f64,
    #[serde(default = "default_font_color")]
    pub font_color: Color,
    #[serde(default = "default_outline_color")]
    pub outline_color: Color,
    #[serde(default = "default_outline_width")]
    pub outline_width: f64,
    #[serde(default)]
    pub alignment: Alignment,
}

fn default_size() -> f64 {
    DEFAULT_SIZE
}

fn default_font_color() -> Color {
    Color::WHITE
}

fn default_outline_color() -> Color {
    Color::BLACK
}

fn default_outline_width() -> f64 {
    DEFAULT_OUTLINE_WIDTH
}

impl TextBox {
    /// New box centered on the default surface.
    pub fn new() -> Self {
        Self::new_centered(DEFAULT_SURFACE_WIDTH, DEFAULT_SURFACE_HEIGHT)
    }

    /// New box with default styling, centered on a `width` x `height` surface.
    pub fn new_centered(width: f64, height: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: String::new(),
            x: width / 2.0,
            y: height / 2.0,
            size: DEFAULT_SIZE,
            font_color: Color::WHITE,
            outline_color: Color::BLACK,
            outline_width: DEFAULT_OUTLINE_WIDTH,
            alignment: Alignment::Center,
        }
    }

    /// Lines to render. Empty boxes render their placeholder label and blank
    /// lines keep their height.
    pub fn display_lines(&self, index: usize) -> Vec<String> {
        if self.text.is_empty() {
            return vec![placeholder_label(index)];
        }
        self.text
            .split('\n')
            .map(|line| {
                if line.is_empty() {
                    " ".to_string()
                } else {
                    line.to_string()
                }
            })
            .collect()
    }

    fn apply(&mut self, field: TextBoxField) {
        match field {
            TextBoxField::Text(text) => self.text = text,
            TextBoxField::Position { x, y } => {
                self.x = x;
                self.y = y;
            }
            TextBoxField::Size(size) => self.size = size,
            TextBoxField::FontColor(color) => self.font_color = color,
            TextBoxField::OutlineColor(color) => self.outline_color = color,
            TextBoxField::OutlineWidth(width) => self.outline_width = width,
            TextBoxField::Alignment(alignment) => self.alignment = alignment,
        }
    }
}

impl Default for TextBox {
    fn default() -> Self {
        Self::new()
    }
}

/// Label shown for an empty box at position `index` in the list.
pub fn placeholder_label(index: usize) -> String {
    format!("Text {}", index + 1)
}

/// A settable field together with its new value.
#[derive(Debug, Clone, PartialEq)]
pub enum TextBoxField {
    Text(String),
    Position { x: f64, y: f64 },
    Size(f64),
    FontColor(Color),
    OutlineColor(Color),
    OutlineWidth(f64),
    Alignment(Alignment),
}

pub fn create() -> TextBox {
    TextBox::new()
}

/// Returns a new list with the field of the box matching `id` replaced.
/// Unknown ids return an unchanged copy. Values are stored as given.
pub fn update(boxes: &[TextBox], id: &str, field: TextBoxField) -> Vec<TextBox> {
    let mut out = boxes.to_vec();
    if let Some(target) = out.iter_mut().find(|b| b.id == id) {
        target.apply(field);
    }
    out
}

/// Returns a new list without the box matching `id`.
pub fn remove(boxes: &[TextBox], id: &str) -> Vec<TextBox> {
    boxes.iter().filter(|b| b.id != id).cloned().collect()
}

/// Guard for continuous size controls.
pub fn clamp_size(size: f64) -> f64 {
    size.clamp(MIN_SIZE, MAX_SIZE)
}

/// Guard for continuous outline width controls.
pub fn clamp_outline_width(width: f64) -> f64 {
    width.clamp(MIN_OUTLINE_WIDTH, MAX_OUTLINE_WIDTH)
}
