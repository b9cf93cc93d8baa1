use crate::error::{CertificateError, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

const DEFAULT_W: u32 = 2000;
const DEFAULT_H: u32 = 1414;

const SUPPORTED: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::WebP,
];

#[derive(Debug, Clone, Default)]
pub enum TemplateResource {
    #[default]
    BuiltIn,
    Uploaded(Arc<[u8]>),
}

impl TemplateResource {
    pub fn uploaded(data: &[u8]) -> Self {
        Self::Uploaded(Arc::from(data))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::BuiltIn)
    }

    pub fn decode(&self) -> Result<Template> {
        let image = match self {
            Self::BuiltIn => default_template(),
            Self::Uploaded(data) => decode_bytes(data)?,
        };
        Ok(Template::new(image))
    }
}

/// Plantilla ya decodificada a su tamaño nativo.
#[derive(Debug, Clone)]
pub struct Template {
    image: Arc<RgbaImage>,
}

impl Template {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn geometry(&self) -> TemplateGeometry {
        let (width, height) = self.image.dimensions();
        TemplateGeometry { width, height }
    }
}

fn decode_bytes(data: &[u8]) -> Result<RgbaImage> {
    let format = image::guess_format(data)
        .map_err(|_| CertificateError::template("Tipo de archivo no reconocido"))?;
    if !SUPPORTED.contains(&format) {
        return Err(CertificateError::template(format!(
            "Formato no soportado: {:?}",
            format
        )));
    }

    let image = image::load(Cursor::new(data), format)
        .map_err(|e| CertificateError::template(format!("No se pudo decodificar la imagen: {}", e)))?
        .into_rgba8();

    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(CertificateError::template("La imagen está vacía"));
    }
    tracing::info!(width = w, height = h, ?format, "plantilla decodificada");
    Ok(image)
}

/// Plantilla incorporada: fondo marfil con doble marco dorado.
fn default_template() -> RgbaImage {
    let paper = Rgba([252, 249, 240, 255]);
    let gold = Rgba([184, 146, 61, 255]);
    let navy = Rgba([31, 41, 55, 255]);

    let mut img = RgbaImage::from_pixel(DEFAULT_W, DEFAULT_H, paper);
    frame(&mut img, 40, 14, navy);
    frame(&mut img, 72, 4, gold);

    // Franja decorativa bajo el título.
    let band_y = DEFAULT_H * 3 / 10;
    for y in band_y..band_y + 3 {
        for x in DEFAULT_W / 4..DEFAULT_W * 3 / 4 {
            img.put_pixel(x, y, gold);
        }
    }
    img
}

fn frame(img: &mut RgbaImage, inset: u32, thickness: u32, color: Rgba<u8>) {
    let (w, h) = img.dimensions();
    for y in inset..h - inset {
        for x in inset..w - inset {
            let edge = x < inset + thickness
                || x >= w - inset - thickness
                || y < inset + thickness
                || y >= h - inset - thickness;
            if edge {
                img.put_pixel(x, y, color);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateGeometry {
    pub width: u32,
    pub height: u32,
}

impl TemplateGeometry {
    pub fn to_pixels(&self, anchor: Anchor) -> (f32, f32) {
        (anchor.x * self.width as f32, anchor.y * self.height as f32)
    }

    pub fn to_anchor(&self, px: f32, py: f32) -> Anchor {
        Anchor::new(px / self.width as f32, py / self.height as f32)
    }
}

/// Centro del texto en coordenadas normalizadas (0..1, 0..1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

impl Default for Anchor {
    fn default() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

impl Anchor {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.5
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Arrastre del ancla en la vista previa. Las coordenadas del puntero están
/// en el espacio de la imagen mostrada, no en píxeles de la plantilla.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
}

impl DragState {
    pub fn pointer_down(&mut self, x: f32, y: f32, display_w: f32, display_h: f32) -> Option<Anchor> {
        *self = Self::Dragging;
        display_anchor(x, y, display_w, display_h)
    }

    pub fn pointer_move(&mut self, x: f32, y: f32, display_w: f32, display_h: f32) -> Option<Anchor> {
        match self {
            Self::Dragging => display_anchor(x, y, display_w, display_h),
            Self::Idle => None,
        }
    }

    pub fn pointer_up(&mut self) {
        *self = Self::Idle;
    }
}

fn display_anchor(x: f32, y: f32, display_w: f32, display_h: f32) -> Option<Anchor> {
    if display_w <= 0.0 || display_h <= 0.0 {
        return None;
    }
    Some(Anchor::new(x / display_w, y / display_h))
}
