use crate::error::CompositionError;
use crate::meme::composite::Bitmap;
use crate::meme::loader::{CrossOriginPolicy, ImageLoader, LoadedImage};
use crate::meme::model::TextBox;
use crate::templates::TemplateRef;

/// Load state of the template image on a surface.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSlot {
    Empty,
    Pending { url: String },
    Loaded { url: String, image: LoadedImage },
    Errored { url: String, reason: String },
}

impl TemplateSlot {
    pub fn is_settled(&self) -> bool {
        !matches!(self, TemplateSlot::Pending { .. })
    }
}

/// The composition container: one template image and the ordered text boxes,
/// in surface (CSS pixel) coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub template: TemplateSlot,
    pub text_boxes: Vec<TextBox>,
    pub policy: CrossOriginPolicy,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            template: TemplateSlot::Empty,
            text_boxes: Vec::new(),
            policy: CrossOriginPolicy::default(),
        }
    }

    pub fn with_template(mut self, template: &TemplateRef) -> Self {
        self.template = TemplateSlot::Pending {
            url: template.url.clone(),
        };
        self
    }

    pub fn with_text_boxes(mut self, text_boxes: Vec<TextBox>) -> Self {
        self.text_boxes = text_boxes;
        self
    }

    pub fn with_policy(mut self, policy: CrossOriginPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn is_settled(&self) -> bool {
        self.template.is_settled()
    }

    /// Resolve every pending image. Loaded and errored both count as settled;
    /// load failures are not returned, they leave a blank region.
    pub fn settle(&mut self, loader: &dyn ImageLoader) {
        let TemplateSlot::Pending { url } = &self.template else {
            return;
        };
        let url = url.clone();

        self.template = match loader.load(&url, self.policy) {
            Ok(image) => {
                tracing::debug!(
                    %url,
                    width = image.pixels.width(),
                    height = image.pixels.height(),
                    origin_clean = image.origin_clean,
                    "template image loaded"
                );
                TemplateSlot::Loaded { url, image }
            }
            Err(err) => {
                tracing::warn!(%url, "template image failed to load: {err}");
                TemplateSlot::Errored {
                    url,
                    reason: err.to_string(),
                }
            }
        };
    }
}

/// A backend that turns a settled surface into a bitmap.
pub trait SurfaceCapture {
    fn capture(&self, surface: &Surface, scale: f32) -> Result<Bitmap, CompositionError>;
}
