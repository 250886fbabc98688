use image::{Rgba, RgbaImage};
use tiny_skia::{FilterQuality, IntSize, Pixmap, PixmapPaint, Transform};

/// Copies a straight-alpha image into a premultiplied pixmap.
pub(crate) fn to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())?;
    let mut data = image.as_raw().clone();
    premultiply_rgba_in_place(&mut data);
    Pixmap::from_vec(data, size)
}

pub(crate) fn to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}

pub(crate) fn draw_raster(canvas: &mut Pixmap, source: &Pixmap, transform: Transform) {
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    canvas.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
}

fn premultiply_rgba_in_place(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let alpha = px[3] as u16;
        if alpha == 255 {
            continue;
        }
        for channel in &mut px[..3] {
            *channel = ((*channel as u16 * alpha + 127) / 255) as u8;
        }
    }
}
