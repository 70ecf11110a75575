use criterion::{criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};
use meme_composer::meme::capture::{Surface, SurfaceCapture, TemplateSlot};
use meme_composer::meme::composite::RasterCompositor;
use meme_composer::meme::compress::compress_bitmap;
use meme_composer::meme::loader::LoadedImage;
use meme_composer::meme::model::TextBox;

fn surface() -> Surface {
    let mut top = TextBox::new();
    top.text = "WHEN THE BENCHMARK".into();
    top.y = 80.0;
    let mut bottom = TextBox::new();
    bottom.text = "FINALLY COMPILES ON THE FIRST TRY".into();
    bottom.y = 520.0;

    let mut surface = Surface::new(600, 600).with_text_boxes(vec![top, bottom]);
    surface.template = TemplateSlot::Loaded {
        url: "bench://template".into(),
        image: LoadedImage {
            pixels: RgbaImage::from_pixel(500, 400, Rgba([90, 120, 200, 255])),
            origin_clean: true,
        },
    };
    surface
}

fn bench_capture(c: &mut Criterion) {
    let compositor = RasterCompositor::default();
    let surface = surface();
    c.bench_function("capture_600x600_x2", |b| {
        b.iter(|| compositor.capture(&surface, 2.0))
    });

    let bitmap = match compositor.capture(&surface, 2.0) {
        Ok(bitmap) => bitmap,
        Err(e) => panic!("capture failed: {e}"),
    };
    c.bench_function("compress_1200x1200", |b| b.iter(|| compress_bitmap(&bitmap)));
}

criterion_group!(benches, bench_capture);
criterion_main!(benches);
