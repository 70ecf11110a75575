use crate::error::CompositionError;
use crate::meme::capture::{Surface, SurfaceCapture, TemplateSlot};
use crate::meme::render::{draw_text_box, Font8x8, GlyphSource};
use base64::{engine::general_purpose, Engine as _};
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ColorType, ImageEncoder, Rgba, RgbaImage};

/// Largest output side a capture may produce.
pub const MAX_CAPTURE_DIMENSION: u32 = 16_384;
pub const DEFAULT_OVERSAMPLE: f32 = 2.0;

/// A rasterized composition.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    image: RgbaImage,
}

impl Bitmap {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>, CompositionError> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(
                self.image.as_raw(),
                self.width(),
                self.height(),
                ColorType::Rgba8,
            )
            .map_err(|e| CompositionError::Encode(e.to_string()))?;
        Ok(bytes)
    }

    /// `data:image/png;base64,...`
    pub fn to_data_url(&self) -> Result<String, CompositionError> {
        let png = self.to_png_bytes()?;
        Ok(format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png)
        ))
    }
}

/// Software rasterizer: template drawn contain-fit, then every text box in
/// list order.
pub struct RasterCompositor {
    glyphs: Box<dyn GlyphSource + Send + Sync>,
}

impl Default for RasterCompositor {
    fn default() -> Self {
        Self::new(Box::new(Font8x8))
    }
}

impl RasterCompositor {
    pub fn new(glyphs: Box<dyn GlyphSource + Send + Sync>) -> Self {
        Self { glyphs }
    }
}

impl SurfaceCapture for RasterCompositor {
    fn capture(&self, surface: &Surface, scale: f32) -> Result<Bitmap, CompositionError> {
        let (out_w, out_h) = output_size(surface, scale)?;
        let mut canvas = RgbaImage::new(out_w, out_h);
        let mut tainted_by = None;

        match &surface.template {
            TemplateSlot::Empty => {}
            TemplateSlot::Pending { url } => {
                return Err(CompositionError::Unsettled(url.clone()));
            }
            TemplateSlot::Errored { url, reason } => {
                tracing::warn!(%url, %reason, "template errored, leaving region blank");
            }
            TemplateSlot::Loaded { url, image } => {
                if image.origin_clean || surface.policy.allow_taint {
                    draw_contain(&mut canvas, &image.pixels);
                    if !image.origin_clean {
                        tainted_by = Some(url.clone());
                    }
                } else {
                    tracing::warn!(%url, "template is not origin-clean, skipping it");
                }
            }
        }

        for (index, text_box) in surface.text_boxes.iter().enumerate() {
            draw_text_box(&mut canvas, text_box, index, scale, self.glyphs.as_ref());
        }

        if let Some(url) = tainted_by {
            return Err(CompositionError::ReadbackBlocked(url));
        }

        tracing::debug!(
            width = out_w,
            height = out_h,
            boxes = surface.text_boxes.len(),
            "surface captured"
        );
        Ok(Bitmap::new(canvas))
    }
}

fn output_size(surface: &Surface, scale: f32) -> Result<(u32, u32), CompositionError> {
    let invalid = || CompositionError::InvalidSurface {
        width: surface.width,
        height: surface.height,
    };
    if surface.width == 0 || surface.height == 0 || !scale.is_finite() || scale <= 0.0 {
        return Err(invalid());
    }

    let out_w = (surface.width as f64 * scale as f64).round();
    let out_h = (surface.height as f64 * scale as f64).round();
    if out_w < 1.0
        || out_h < 1.0
        || out_w > MAX_CAPTURE_DIMENSION as f64
        || out_h > MAX_CAPTURE_DIMENSION as f64
    {
        return Err(invalid());
    }
    Ok((out_w as u32, out_h as u32))
}

/// Scale `template` uniformly to fit `canvas`, centered.
fn draw_contain(canvas: &mut RgbaImage, template: &RgbaImage) {
    let (cw, ch) = canvas.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 {
        return;
    }

    let ratio = (cw as f64 / tw as f64).min(ch as f64 / th as f64);
    let fit_w = ((tw as f64 * ratio).round() as u32).clamp(1, cw);
    let fit_h = ((th as f64 * ratio).round() as u32).clamp(1, ch);
    let fitted = if (fit_w, fit_h) == (tw, th) {
        template.clone()
    } else {
        image::imageops::resize(template, fit_w, fit_h, FilterType::Triangle)
    };

    let off_x = (cw - fit_w) / 2;
    let off_y = (ch - fit_h) / 2;
    for (x, y, src) in fitted.enumerate_pixels() {
        let dst = canvas.get_pixel_mut(off_x + x, off_y + y);
        *dst = blend_pixel(*dst, *src);
    }
}

/// Source-over blend of `top` onto `bottom`.
pub(crate) fn blend_pixel(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    let sa = top[3] as f32 / 255.0;
    let da = bottom[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    if out_a <= f32::EPSILON {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        (((s as f32 * sa) + (d as f32 * da * (1.0 - sa))) / out_a)
            .round()
            .clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(top[0], bottom[0]),
        blend(top[1], bottom[1]),
        blend(top[2], bottom[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meme::loader::{CrossOriginPolicy, LoadedImage};
    use crate::meme::model::{Color, TextBox};

    fn loaded_surface(template: RgbaImage, origin_clean: bool) -> Surface {
        let mut surface = Surface::new(4, 2);
        surface.template = TemplateSlot::Loaded {
            url: "https://i.imgflip.com/30b1gx.jpg".into(),
            image: LoadedImage {
                pixels: template,
                origin_clean,
            },
        };
        surface
    }

    #[test]
    fn blend_matches_source_over() {
        let out = blend_pixel(Rgba([100, 100, 100, 255]), Rgba([200, 0, 0, 128]));
        assert_eq!(out, Rgba([150, 50, 50, 255]));
        assert_eq!(
            blend_pixel(Rgba([0, 0, 0, 0]), Rgba([0, 0, 0, 0])),
            Rgba([0, 0, 0, 0])
        );
    }

    #[test]
    fn capture_oversamples_surface() {
        let surface = loaded_surface(RgbaImage::from_pixel(4, 2, Rgba([10, 20, 30, 255])), true);
        let bitmap = RasterCompositor::default()
            .capture(&surface, 2.0)
            .expect("capture");
        assert_eq!((bitmap.width(), bitmap.height()), (8, 4));
        assert_eq!(bitmap.pixel(7, 3), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn template_is_contain_fit_and_centered() {
        // Square template on a 4x2 surface lands in the middle 2x2.
        let surface = loaded_surface(RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])), true);
        let bitmap = RasterCompositor::default()
            .capture(&surface, 1.0)
            .expect("capture");
        assert_eq!(bitmap.pixel(0, 0)[3], 0);
        assert_eq!(bitmap.pixel(1, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(bitmap.pixel(2, 1), Rgba([255, 0, 0, 255]));
        assert_eq!(bitmap.pixel(3, 1)[3], 0);
    }

    #[test]
    fn out_of_range_text_boxes_still_capture() {
        let mut huge = TextBox::new();
        huge.size = 1e12;
        huge.outline_width = 1e12;
        let mut far = TextBox::new();
        far.x = -1e200;
        far.y = 1e200;
        let surface = Surface::new(20, 20).with_text_boxes(vec![huge, far]);

        let bitmap = RasterCompositor::default()
            .capture(&surface, 2.0)
            .expect("capture");
        assert_eq!((bitmap.width(), bitmap.height()), (40, 40));
    }

    #[test]
    fn unclean_template_is_skipped_without_error() {
        let surface = loaded_surface(RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255])), false);
        let bitmap = RasterCompositor::default()
            .capture(&surface, 1.0)
            .expect("best effort capture");
        assert!(bitmap.as_image().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn allow_taint_blocks_readback() {
        let surface = loaded_surface(RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255])), false)
            .with_policy(CrossOriginPolicy {
                use_cors: true,
                allow_taint: true,
            });
        let err = RasterCompositor::default()
            .capture(&surface, 1.0)
            .expect_err("tainted canvas");
        assert!(matches!(err, CompositionError::ReadbackBlocked(_)));
    }

    #[test]
    fn pending_template_is_rejected() {
        let mut surface = Surface::new(4, 4);
        surface.template = TemplateSlot::Pending {
            url: "https://i.imgflip.com/1g8my4.jpg".into(),
        };
        let err = RasterCompositor::default()
            .capture(&surface, 1.0)
            .expect_err("unsettled");
        assert!(matches!(err, CompositionError::Unsettled(_)));
    }

    #[test]
    fn errored_template_leaves_blank_region() {
        let mut surface = Surface::new(4, 4);
        surface.template = TemplateSlot::Errored {
            url: "https://i.imgflip.com/1g8my4.jpg".into(),
            reason: "404".into(),
        };
        let bitmap = RasterCompositor::default()
            .capture(&surface, 1.0)
            .expect("capture");
        assert!(bitmap.as_image().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn invalid_surfaces_fail() {
        let compositor = RasterCompositor::default();
        assert!(matches!(
            compositor.capture(&Surface::new(0, 10), 2.0),
            Err(CompositionError::InvalidSurface { .. })
        ));
        assert!(matches!(
            compositor.capture(&Surface::new(10, 10), 0.0),
            Err(CompositionError::InvalidSurface { .. })
        ));
        assert!(matches!(
            compositor.capture(&Surface::new(10_000, 10), 2.0),
            Err(CompositionError::InvalidSurface { .. })
        ));
    }

    #[test]
    fn text_boxes_render_over_template() {
        let mut surface = Surface::new(300, 100);
        let mut b = TextBox::new_centered(300.0, 100.0);
        b.text = "MEME".into();
        b.font_color = Color::rgba(0, 255, 0, 255);
        surface.text_boxes = vec![b];

        let bitmap = RasterCompositor::default()
            .capture(&surface, 1.0)
            .expect("capture");
        assert!(bitmap
            .as_image()
            .pixels()
            .any(|p| p.0 == [0, 255, 0, 255]));
    }

    #[test]
    fn data_url_is_png() {
        let bitmap = Bitmap::new(RgbaImage::new(1, 1));
        let url = bitmap.to_data_url().expect("data url");
        assert!(url.starts_with("data:image/png;base64,"));
    }
}
