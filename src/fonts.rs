//! Catálogo de familias tipográficas y resolución de la fuente real.
//!
//! Las fuentes vectoriales se registran en tiempo de ejecución (bytes TTF/OTF).
//! Si la familia elegida no está registrada se prueba su familia genérica
//! (`serif`, `sans-serif`, `cursive`) y, en último término, la fuente de mapa
//! de bits Spleen incluida en el binario, de modo que siempre hay con qué
//! dibujar.

use crate::error::{CertificateError, Result};
use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use spleen_font::{PSF2Font, FONT_12X24};
use std::collections::HashMap;
use std::str::FromStr;

const SPLEEN_W: usize = 12;
const SPLEEN_H: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericFamily {
    Serif,
    SansSerif,
    Cursive,
}

impl GenericFamily {
    pub fn css_name(self) -> &'static str {
        match self {
            Self::Serif => "serif",
            Self::SansSerif => "sans-serif",
            Self::Cursive => "cursive",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FontFamily {
    #[default]
    PlayfairDisplay,
    GreatVibes,
    Montserrat,
    Lora,
    Roboto,
    DancingScript,
    Georgia,
}

impl FontFamily {
    pub const ALL: [FontFamily; 7] = [
        Self::PlayfairDisplay,
        Self::GreatVibes,
        Self::Montserrat,
        Self::Lora,
        Self::Roboto,
        Self::DancingScript,
        Self::Georgia,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::PlayfairDisplay => "Playfair Display",
            Self::GreatVibes => "Great Vibes",
            Self::Montserrat => "Montserrat",
            Self::Lora => "Lora",
            Self::Roboto => "Roboto",
            Self::DancingScript => "Dancing Script",
            Self::Georgia => "Georgia",
        }
    }

    pub fn generic(self) -> GenericFamily {
        match self {
            Self::PlayfairDisplay | Self::Lora | Self::Georgia => GenericFamily::Serif,
            Self::Montserrat | Self::Roboto => GenericFamily::SansSerif,
            Self::GreatVibes | Self::DancingScript => GenericFamily::Cursive,
        }
    }
}

impl FromStr for FontFamily {
    type Err = CertificateError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CertificateError::input(format!("Fuente desconocida: {}", wanted)))
    }
}

/// Fuentes vectoriales disponibles, por nombre de familia (sin mayúsculas).
#[derive(Clone, Default)]
pub struct FontBook {
    faces: HashMap<String, FontArc>,
}

impl FontBook {
    /// `family` puede ser una familia del catálogo o una genérica (`serif`...).
    pub fn register(&mut self, family: &str, data: Vec<u8>) -> Result<()> {
        let font = FontArc::try_from_vec(data)
            .map_err(|_| CertificateError::input(format!("Fuente inválida para {}", family)))?;
        self.faces.insert(family.trim().to_lowercase(), font);
        tracing::info!(family, "fuente registrada");
        Ok(())
    }

    pub fn contains(&self, family: &str) -> bool {
        self.faces.contains_key(&family.trim().to_lowercase())
    }

    pub fn resolve(&self, family: FontFamily) -> Face {
        if let Some(font) = self.faces.get(&family.name().to_lowercase()) {
            return Face::Outline(font.clone());
        }
        let generic = family.generic().css_name();
        if let Some(font) = self.faces.get(generic) {
            tracing::warn!(family = family.name(), generic, "fuente no cargada, se usa la familia genérica");
            return Face::Outline(font.clone());
        }
        tracing::warn!(family = family.name(), "fuente no cargada, se usa la fuente de mapa de bits incorporada");
        Face::Bitmap
    }
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("families", &self.faces.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Clone)]
pub enum Face {
    Outline(FontArc),
    Bitmap,
}

impl std::fmt::Debug for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Outline(_) => f.write_str("Outline"),
            Self::Bitmap => f.write_str("Bitmap"),
        }
    }
}

impl Face {
    /// Dibuja una sola línea centrada horizontal y verticalmente en (cx, cy).
    /// `plot` recibe cada píxel cubierto con su cobertura 0..1; puede caer
    /// fuera de la superficie.
    pub fn draw_centered(
        &self,
        text: &str,
        size: f32,
        cx: f32,
        cy: f32,
        plot: impl FnMut(i32, i32, f32),
    ) -> Result<()> {
        match self {
            Self::Outline(font) => {
                draw_outline(font, text, size, cx, cy, plot);
                Ok(())
            }
            Self::Bitmap => draw_bitmap(text, size, cx, cy, plot),
        }
    }
}

/// `size` es el tamaño de em en píxeles, como en CSS.
fn px_scale(font: &FontArc, size: f32) -> f32 {
    match font.units_per_em() {
        Some(upem) => size * font.height_unscaled() / upem,
        None => size,
    }
}

fn layout(font: &FontArc, text: &str, size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(px_scale(font, size));
    let mut glyphs = Vec::new();
    let mut caret_x = 0.0f32;
    let mut prev: Option<GlyphId> = None;

    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(p) = prev {
            caret_x += scaled.kern(p, id);
        }
        glyphs.push((id, caret_x));
        caret_x += scaled.h_advance(id);
        prev = Some(id);
    }
    (glyphs, caret_x)
}

fn draw_outline(font: &FontArc, text: &str, size: f32, cx: f32, cy: f32, mut plot: impl FnMut(i32, i32, f32)) {
    let scale = px_scale(font, size);
    let scaled = font.as_scaled(scale);
    let (glyphs, width) = layout(font, text, size);

    let left = cx - width / 2.0;
    // descent es negativo: el centro de la caja ascent..descent queda en cy.
    let baseline = cy + (scaled.ascent() + scaled.descent()) / 2.0;

    for (id, x) in glyphs {
        let glyph = id.with_scale_and_position(scale, point(left + x, baseline));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                plot(
                    px as i32 + bounds.min.x as i32,
                    py as i32 + bounds.min.y as i32,
                    coverage,
                );
            });
        }
    }
}

fn bitmap_cell_width(size: f32) -> f32 {
    size * SPLEEN_W as f32 / SPLEEN_H as f32
}

fn draw_bitmap(text: &str, size: f32, cx: f32, cy: f32, mut plot: impl FnMut(i32, i32, f32)) -> Result<()> {
    let mut spleen = PSF2Font::new(FONT_12X24)
        .map_err(|_| CertificateError::render("No se pudo cargar la fuente incorporada"))?;

    let cell_w = bitmap_cell_width(size);
    let cell_h = size;
    let count = text.chars().count() as f32;
    let left = cx - count * cell_w / 2.0;
    let top = (cy - cell_h / 2.0).round() as i32;
    let dst_w = cell_w.ceil().max(1.0) as usize;
    let dst_h = cell_h.ceil().max(1.0) as usize;

    for (i, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            continue;
        }
        let bits = spleen_bits(&mut spleen, ch);
        let x0 = (left + i as f32 * cell_w).round() as i32;

        for dy in 0..dst_h {
            let sy = (dy * SPLEEN_H / dst_h).min(SPLEEN_H - 1);
            for dx in 0..dst_w {
                let sx = (dx * SPLEEN_W / dst_w).min(SPLEEN_W - 1);
                if bits[sy * SPLEEN_W + sx] {
                    plot(x0 + dx as i32, top + dy as i32, 1.0);
                }
            }
        }
    }
    Ok(())
}

fn spleen_bits(spleen: &mut PSF2Font, ch: char) -> Vec<bool> {
    let mut bits = vec![false; SPLEEN_W * SPLEEN_H];
    let utf8 = ch.to_string();
    match spleen.glyph_for_utf8(utf8.as_bytes()) {
        Some(glyph) => {
            for (row_y, row) in glyph.enumerate() {
                for (col_x, on) in row.enumerate() {
                    if row_y < SPLEEN_H && col_x < SPLEEN_W {
                        bits[row_y * SPLEEN_W + col_x] = on;
                    }
                }
            }
        }
        None => {
            // Caja hueca para caracteres sin glifo.
            for x in 1..SPLEEN_W - 1 {
                bits[4 * SPLEEN_W + x] = true;
                bits[(SPLEEN_H - 5) * SPLEEN_W + x] = true;
            }
            for y in 4..SPLEEN_H - 4 {
                bits[y * SPLEEN_W + 1] = true;
                bits[y * SPLEEN_W + SPLEEN_W - 2] = true;
            }
        }
    }
    bits
}
