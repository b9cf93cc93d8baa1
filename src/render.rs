use crate::error::{CertificateError, Result};
use crate::fonts::{Face, FontFamily};
use crate::template::{Anchor, Template};
use image::codecs::png::PngEncoder;
use image::{imageops, Pixel, Rgba, RgbaImage};

pub const MIN_FONT_SIZE: u32 = 10;
pub const MAX_FONT_SIZE: u32 = 240;
pub const DEFAULT_FONT_SIZE: u32 = 64;
pub const DEFAULT_COLOR: Rgba<u8> = Rgba([31, 41, 55, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleAttributes {
    font_size: u32,
    pub color: Rgba<u8>,
    pub family: FontFamily,
}

impl Default for StyleAttributes {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            color: DEFAULT_COLOR,
            family: FontFamily::default(),
        }
    }
}

impl StyleAttributes {
    pub fn new(font_size: u32, color: Rgba<u8>, family: FontFamily) -> Self {
        Self {
            font_size: clamp_size(font_size),
            color,
            family,
        }
    }

    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    pub fn set_font_size(&mut self, size: u32) {
        self.font_size = clamp_size(size);
    }
}

fn clamp_size(size: u32) -> u32 {
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// Acepta `#rgb`, `#rrggbb` y `#rrggbbaa`.
pub fn parse_color(s: &str) -> Result<Rgba<u8>> {
    let invalid = || CertificateError::input(format!("Color inválido: {}", s));
    let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16).ok_or_else(invalid)? as u8;
                rgb[i] = v * 17;
            }
            Ok(Rgba([rgb[0], rgb[1], rgb[2], 255]))
        }
        6 => Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, 255])),
        8 => Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, channel(6)?])),
        _ => Err(invalid()),
    }
}

pub fn format_color(color: Rgba<u8>) -> String {
    let [r, g, b, a] = color.0;
    if a == 255 {
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
    }
}

/// Compone un certificado sobre una superficie nueva del tamaño de la plantilla.
pub fn render_image(
    name: &str,
    template: &Template,
    anchor: Anchor,
    style: &StyleAttributes,
    face: &Face,
) -> Result<RgbaImage> {
    let geometry = template.geometry();
    let mut surface = RgbaImage::new(geometry.width, geometry.height);

    // La superficie ya mide lo mismo que la plantilla: no hace falta escalar.
    imageops::overlay(&mut surface, template.image(), 0, 0);

    let (cx, cy) = geometry.to_pixels(anchor);
    let color = style.color;
    let (w, h) = (geometry.width as i32, geometry.height as i32);

    face.draw_centered(name, style.font_size() as f32, cx, cy, |x, y, coverage| {
        if x >= 0 && x < w && y >= 0 && y < h {
            blend(surface.get_pixel_mut(x as u32, y as u32), color, coverage);
        }
    })?;

    Ok(surface)
}

pub fn render_certificate(
    name: &str,
    template: &Template,
    anchor: Anchor,
    style: &StyleAttributes,
    face: &Face,
) -> Result<Vec<u8>> {
    let surface = render_image(name, template, anchor, style, face)?;
    encode_png(&surface)
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    img.write_with_encoder(encoder)
        .map_err(|e| CertificateError::render(format!("No se pudo codificar PNG: {}", e)))?;
    Ok(buf)
}

/// Composición "source-over": la cobertura del glifo escala el alfa del color.
fn blend(dst: &mut Rgba<u8>, color: Rgba<u8>, coverage: f32) {
    let alpha = (color[3] as f32 * coverage.clamp(0.0, 1.0)).round() as u8;
    if alpha == 0 {
        return;
    }
    let mut src = color;
    src[3] = alpha;
    dst.blend(&src);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_template(w: u32, h: u32) -> Template {
        Template::new(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
    }

    fn inked(img: &RgbaImage) -> Vec<(u32, u32)> {
        img.enumerate_pixels()
            .filter(|(_, _, p)| p.0 != [255, 255, 255, 255])
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn font_size_is_clamped() {
        let mut style = StyleAttributes::new(4, DEFAULT_COLOR, FontFamily::Lora);
        assert_eq!(style.font_size(), MIN_FONT_SIZE);
        style.set_font_size(1000);
        assert_eq!(style.font_size(), MAX_FONT_SIZE);
        style.set_font_size(72);
        assert_eq!(style.font_size(), 72);
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_color("#fff").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color("#1F2937").unwrap(), Rgba([31, 41, 55, 255]));
        assert_eq!(parse_color(" #ff000080 ").unwrap(), Rgba([255, 0, 0, 128]));
        assert!(parse_color("1f2937").is_err());
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#ggg").is_err());
        assert!(parse_color("#ñ").is_err());
    }

    #[test]
    fn formats_colors() {
        assert_eq!(format_color(DEFAULT_COLOR), "#1f2937");
        assert_eq!(format_color(Rgba([255, 0, 0, 128])), "#ff000080");
    }

    #[test]
    fn output_matches_template_size() {
        let template = white_template(320, 200);
        let img = render_image("Ana", &template, Anchor::default(), &StyleAttributes::default(), &Face::Bitmap)
            .unwrap();
        assert_eq!(img.dimensions(), (320, 200));
    }

    #[test]
    fn text_is_drawn_around_the_anchor() {
        let template = white_template(400, 200);
        let style = StyleAttributes::new(40, Rgba([0, 0, 0, 255]), FontFamily::Roboto);
        let anchor = Anchor::new(0.25, 0.5);
        let img = render_image("Ana", &template, anchor, &style, &Face::Bitmap).unwrap();

        let ink = inked(&img);
        assert!(!ink.is_empty());
        let min_x = ink.iter().map(|p| p.0).min().unwrap();
        let max_x = ink.iter().map(|p| p.0).max().unwrap();
        let min_y = ink.iter().map(|p| p.1).min().unwrap();
        let max_y = ink.iter().map(|p| p.1).max().unwrap();
        assert!(min_x < 100 && max_x > 100);
        assert!(min_y >= 80 && max_y < 120);
        let (x, y) = ink[0];
        assert_eq!(img.get_pixel(x, y).0, [0, 0, 0, 255]);
    }

    #[test]
    fn overflowing_text_is_clipped_not_shrunk() {
        let template = white_template(40, 40);
        let style = StyleAttributes::new(MAX_FONT_SIZE, Rgba([0, 0, 0, 255]), FontFamily::Lora);
        let img = render_image("Maximiliano", &template, Anchor::new(1.0, 1.0), &style, &Face::Bitmap)
            .unwrap();
        assert_eq!(img.dimensions(), (40, 40));
    }

    #[test]
    fn transparent_template_keeps_alpha() {
        let template = Template::new(RgbaImage::new(50, 50));
        let img = render_image("", &template, Anchor::default(), &StyleAttributes::default(), &Face::Bitmap)
            .unwrap();
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn encodes_png() {
        let template = white_template(30, 20);
        let png = render_certificate("x", &template, Anchor::default(), &StyleAttributes::default(), &Face::Bitmap)
            .unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 20));
    }

    #[test]
    fn blend_mixes_by_coverage() {
        let close = |a: [u8; 4], b: [u8; 4]| a.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 1);

        let mut px = Rgba([255, 255, 255, 255]);
        blend(&mut px, Rgba([0, 0, 0, 255]), 0.5);
        assert!(close(px.0, [128, 128, 128, 255]), "{:?}", px.0);

        let mut px = Rgba([0, 0, 0, 0]);
        blend(&mut px, Rgba([200, 10, 10, 255]), 1.0);
        assert!(close(px.0, [200, 10, 10, 255]), "{:?}", px.0);

        let mut px = Rgba([40, 50, 60, 255]);
        blend(&mut px, Rgba([255, 0, 0, 255]), 0.0);
        assert_eq!(px.0, [40, 50, 60, 255]);
    }

    #[test]
    fn bad_color_is_an_input_error() {
        let err = parse_color("rojo").unwrap_err();
        assert!(matches!(err, CertificateError::Input(_)));
        assert!(!err.is_generation_failure());
    }
}
