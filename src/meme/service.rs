use crate::meme::capture::{Surface, SurfaceCapture};
use crate::meme::compress::compress_bitmap;
use crate::meme::composite::DEFAULT_OVERSAMPLE;
use crate::meme::history::{HistoryEntry, HistoryStore, SaveOutcome};
use crate::meme::input::DragController;
use crate::meme::loader::{CrossOriginPolicy, ImageLoader};
use crate::meme::messages::{DownloadReport, Notice, DEFAULT_NOTICE_DURATION};
use crate::meme::model::{self, TextBox, TextBoxField};
use crate::meme::save::{download_filename, DownloadSink};
use crate::meme::storage::StoragePort;
use crate::settings::Settings;
use crate::templates::{TemplateCatalog, TemplateRef, NO_TEMPLATES_MESSAGE};
use rand::Rng;
use std::time::Duration;

pub const SAVED_MESSAGE: &str = "Meme saved to history!";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub surface_width: u32,
    pub surface_height: u32,
    pub scale: f32,
    pub policy: CrossOriginPolicy,
    pub notice_duration: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            surface_width: 600,
            surface_height: 600,
            scale: DEFAULT_OVERSAMPLE,
            policy: CrossOriginPolicy::default(),
            notice_duration: DEFAULT_NOTICE_DURATION,
        }
    }
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            surface_width: settings.surface_width,
            surface_height: settings.surface_height,
            scale: settings.oversample_scale,
            policy: settings.cross_origin_policy(),
            notice_duration: settings.notice_duration(),
        }
    }
}

/// One composition session: the current template, the live text boxes, the
/// drag gesture and the download pipeline feeding history.
///
/// `download` takes `&mut self`, so overlapping downloads cannot start; a
/// second request waits for the first to return.
pub struct MemeSession<S: StoragePort> {
    config: SessionConfig,
    template: Option<TemplateRef>,
    text_boxes: Vec<TextBox>,
    drag: DragController,
    history: HistoryStore<S>,
    capture: Box<dyn SurfaceCapture>,
    loader: Box<dyn ImageLoader>,
    sink: Box<dyn DownloadSink>,
}

impl<S: StoragePort> MemeSession<S> {
    /// Starts with one default text box and the persisted history loaded.
    pub fn new(
        config: SessionConfig,
        mut history: HistoryStore<S>,
        capture: Box<dyn SurfaceCapture>,
        loader: Box<dyn ImageLoader>,
        sink: Box<dyn DownloadSink>,
    ) -> Self {
        history.load();
        let first = TextBox::new_centered(
            config.surface_width as f64,
            config.surface_height as f64,
        );
        Self {
            config,
            template: None,
            text_boxes: vec![first],
            drag: DragController::new(),
            history,
            capture,
            loader,
            sink,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn template(&self) -> Option<&TemplateRef> {
        self.template.as_ref()
    }

    pub fn set_template(&mut self, template: TemplateRef) {
        tracing::debug!(id = %template.id, name = %template.name, "template selected");
        self.template = Some(template);
    }

    /// Switch to a random template from `catalog`.
    pub fn new_template<'c, R: Rng + ?Sized>(
        &mut self,
        catalog: &'c TemplateCatalog,
        rng: &mut R,
    ) -> Result<&'c TemplateRef, Notice> {
        let Some(picked) = catalog.pick_random(rng) else {
            return Err(Notice::error(
                NO_TEMPLATES_MESSAGE,
                self.config.notice_duration,
            ));
        };
        self.set_template(picked.clone());
        Ok(picked)
    }

    pub fn text_boxes(&self) -> &[TextBox] {
        &self.text_boxes
    }

    /// Replace the whole box list, ending any drag in progress.
    pub fn set_text_boxes(&mut self, text_boxes: Vec<TextBox>) {
        self.drag.release();
        self.text_boxes = text_boxes;
    }

    pub fn add_text_box(&mut self) -> String {
        let text_box = TextBox::new_centered(
            self.config.surface_width as f64,
            self.config.surface_height as f64,
        );
        let id = text_box.id.clone();
        self.text_boxes.push(text_box);
        id
    }

    pub fn update_text_box(&mut self, id: &str, field: TextBoxField) {
        self.text_boxes = model::update(&self.text_boxes, id, field);
    }

    pub fn remove_text_box(&mut self, id: &str) {
        if self.drag.active_id() == Some(id) {
            self.drag.release();
        }
        self.text_boxes = model::remove(&self.text_boxes, id);
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_active()
    }

    /// Begin dragging the box `id`. Unknown ids and presses during another
    /// drag are ignored.
    pub fn press(&mut self, id: &str, pointer: (f64, f64)) -> bool {
        let Some(target) = self.text_boxes.iter().find(|b| b.id == id) else {
            return false;
        };
        self.drag.press(target, pointer)
    }

    /// Route a pointer move from anywhere. Returns whether a box moved.
    pub fn pointer_move(&mut self, pointer: (f64, f64)) -> bool {
        let Some(update) = self.drag.pointer_move(pointer) else {
            return false;
        };
        self.text_boxes = update.apply(&self.text_boxes);
        true
    }

    pub fn release(&mut self) -> bool {
        self.drag.release()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub fn reload_history(&mut self) -> &[HistoryEntry] {
        self.history.load();
        self.history.entries()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn history_store(&self) -> &HistoryStore<S> {
        &self.history
    }

    pub fn history_store_mut(&mut self) -> &mut HistoryStore<S> {
        &mut self.history
    }

    /// Snapshot of the composition container.
    pub fn surface(&self) -> Surface {
        let surface = Surface::new(self.config.surface_width, self.config.surface_height)
            .with_text_boxes(self.text_boxes.clone())
            .with_policy(self.config.policy);
        match &self.template {
            Some(template) => surface.with_template(template),
            None => surface,
        }
    }

    /// Rasterize, deliver the PNG, compress and record in history, strictly
    /// in that order. A failure before the history write skips it entirely.
    pub fn download(&mut self) -> DownloadReport {
        let duration = self.config.notice_duration;
        let fail = |message: String, saved_to| {
            tracing::error!("{message}");
            DownloadReport {
                notice: Notice::error(message, duration),
                saved_to,
                history: None,
            }
        };

        let mut surface = self.surface();
        surface.settle(self.loader.as_ref());

        let bitmap = match self.capture.capture(&surface, self.config.scale) {
            Ok(bitmap) => bitmap,
            Err(e) => return fail(format!("Failed to generate meme: {e}"), None),
        };
        let png = match bitmap.to_png_bytes() {
            Ok(png) => png,
            Err(e) => return fail(format!("Failed to generate meme: {e}"), None),
        };

        let filename = download_filename(chrono::Utc::now().timestamp_millis());
        let saved_to = match self.sink.deliver(&filename, &png) {
            Ok(path) => path,
            Err(e) => return fail(format!("Failed to download meme: {e:#}"), None),
        };

        let compressed = match compress_bitmap(&bitmap) {
            Ok(compressed) => compressed,
            Err(e) => {
                return fail(
                    format!("Meme downloaded, but it could not be compressed for history: {e}"),
                    Some(saved_to),
                )
            }
        };

        let result = self.history.save(&compressed.data_url, &self.text_boxes);
        let notice = match &result.outcome {
            SaveOutcome::Persisted | SaveOutcome::PersistedSingle { .. } => {
                Notice::success(SAVED_MESSAGE, duration)
            }
            SaveOutcome::NotPersisted { error } => Notice::error(
                format!("Meme downloaded, but history could not be saved: {error}"),
                duration,
            ),
            SaveOutcome::Rejected { reason } => Notice::error(
                format!("Meme downloaded, but history rejected it: {reason}"),
                duration,
            ),
        };

        DownloadReport {
            notice,
            saved_to: Some(saved_to),
            history: Some(result.outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompositionError, LoadError};
    use crate::meme::composite::{Bitmap, RasterCompositor};
    use crate::meme::loader::LoadedImage;
    use crate::meme::messages::NoticeLevel;
    use crate::meme::storage::MemoryStorage;
    use image::RgbaImage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    struct SolidLoader;

    impl ImageLoader for SolidLoader {
        fn load(&self, _url: &str, _policy: CrossOriginPolicy) -> Result<LoadedImage, LoadError> {
            Ok(LoadedImage {
                pixels: RgbaImage::from_pixel(8, 8, image::Rgba([40, 80, 120, 255])),
                origin_clean: true,
            })
        }
    }

    struct FailingCapture;

    impl SurfaceCapture for FailingCapture {
        fn capture(&self, _surface: &Surface, _scale: f32) -> Result<Bitmap, CompositionError> {
            Err(CompositionError::ReadbackBlocked("https://evil.example/x.png".into()))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        files: Arc<Mutex<Vec<(String, usize)>>>,
    }

    impl DownloadSink for RecordingSink {
        fn deliver(&mut self, filename: &str, png: &[u8]) -> anyhow::Result<PathBuf> {
            self.files
                .lock()
                .expect("sink lock")
                .push((filename.to_string(), png.len()));
            Ok(PathBuf::from(filename))
        }
    }

    fn small_config() -> SessionConfig {
        SessionConfig {
            surface_width: 40,
            surface_height: 20,
            ..SessionConfig::default()
        }
    }

    fn session_with(
        capture: Box<dyn SurfaceCapture>,
        sink: RecordingSink,
    ) -> MemeSession<MemoryStorage> {
        MemeSession::new(
            small_config(),
            HistoryStore::new(MemoryStorage::new()),
            capture,
            Box::new(SolidLoader),
            Box::new(sink),
        )
    }

    fn template() -> TemplateRef {
        TemplateRef {
            id: "87743020".into(),
            url: "https://i.imgflip.com/1otk96.jpg".into(),
            name: "Two Buttons".into(),
        }
    }

    #[test]
    fn session_starts_with_one_centered_box() {
        let session = session_with(Box::new(RasterCompositor::default()), RecordingSink::default());
        assert_eq!(session.text_boxes().len(), 1);
        assert_eq!((session.text_boxes()[0].x, session.text_boxes()[0].y), (20.0, 10.0));
        assert!(session.history().is_empty());
    }

    #[test]
    fn download_delivers_png_and_records_history() {
        let sink = RecordingSink::default();
        let mut session = session_with(Box::new(RasterCompositor::default()), sink.clone());
        session.set_template(template());

        let report = session.download();

        assert_eq!(report.notice.level, NoticeLevel::Success);
        assert_eq!(report.notice.message, SAVED_MESSAGE);
        assert!(matches!(report.history, Some(SaveOutcome::Persisted)));

        let files = sink.files.lock().expect("sink lock");
        assert_eq!(files.len(), 1);
        assert!(files[0].0.starts_with("meme-") && files[0].0.ends_with(".png"));

        let history = session.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].image_url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(history[0].text_boxes, session.text_boxes());
    }

    #[test]
    fn composition_failure_skips_history() {
        let sink = RecordingSink::default();
        let mut session = session_with(Box::new(FailingCapture), sink.clone());

        let report = session.download();

        assert_eq!(report.notice.level, NoticeLevel::Error);
        assert!(report.history.is_none());
        assert!(report.saved_to.is_none());
        assert!(sink.files.lock().expect("sink lock").is_empty());
        assert!(session.reload_history().is_empty());
    }

    #[test]
    fn drag_moves_only_pressed_box() {
        let mut session = session_with(Box::new(RasterCompositor::default()), RecordingSink::default());
        let second = session.add_text_box();
        let first = session.text_boxes()[0].id.clone();
        session.update_text_box(&first, TextBoxField::Position { x: 100.0, y: 100.0 });

        assert!(!session.pointer_move((1.0, 1.0)));
        assert!(session.press(&first, (120.0, 130.0)));
        assert!(!session.press(&second, (0.0, 0.0)));
        assert!(session.pointer_move((200.0, 250.0)));
        assert!(session.release());
        assert!(!session.pointer_move((0.0, 0.0)));

        let boxes = session.text_boxes();
        assert_eq!((boxes[0].x, boxes[0].y), (180.0, 220.0));
        assert_eq!((boxes[1].x, boxes[1].y), (20.0, 10.0));
    }

    #[test]
    fn removing_dragged_box_ends_gesture() {
        let mut session = session_with(Box::new(RasterCompositor::default()), RecordingSink::default());
        let id = session.text_boxes()[0].id.clone();
        session.press(&id, (0.0, 0.0));
        session.remove_text_box(&id);
        assert!(!session.is_dragging());
        assert!(session.text_boxes().is_empty());
    }

    #[test]
    fn new_template_from_empty_catalog_is_a_notice() {
        let mut session = session_with(Box::new(RasterCompositor::default()), RecordingSink::default());
        let err = session
            .new_template(&TemplateCatalog::default(), &mut StdRng::seed_from_u64(3))
            .expect_err("empty catalog");
        assert_eq!(err.message, NO_TEMPLATES_MESSAGE);
        assert!(session.template().is_none());

        let catalog = TemplateCatalog::new(vec![template()]);
        let picked = session
            .new_template(&catalog, &mut StdRng::seed_from_u64(3))
            .expect("picked")
            .clone();
        assert_eq!(session.template(), Some(&picked));
    }

    #[test]
    fn clear_history_empties_view() {
        let mut session = session_with(Box::new(RasterCompositor::default()), RecordingSink::default());
        session.download();
        assert_eq!(session.history().len(), 1);
        session.clear_history();
        assert!(session.history().is_empty());
        assert!(session.reload_history().is_empty());
    }
}
