pub mod builder;
pub mod error;
pub mod fonts;
pub mod render;
pub mod session;
pub mod sheet;
pub mod template;

use session::{GenerationState, Session};
use template::Anchor;
use wasm_bindgen::prelude::*;

pub use error::{CertificateError, Result};

fn js_err(err: CertificateError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Estado del editor expuesto al navegador.
#[wasm_bindgen]
pub struct Studio {
    session: Session,
}

#[wasm_bindgen]
impl Studio {
    #[wasm_bindgen(constructor)]
    pub fn new() -> std::result::Result<Studio, JsValue> {
        let session = Session::new().map_err(js_err)?;
        Ok(Studio { session })
    }

    pub fn load_sheet(&mut self, data: &[u8], file_name: &str) -> std::result::Result<usize, JsValue> {
        let file_name = (!file_name.is_empty()).then_some(file_name);
        self.session.load_sheet(data, file_name).map_err(js_err)
    }

    pub fn column_labels(&self) -> Vec<String> {
        self.session.columns().into_iter().map(|c| c.label).collect()
    }

    pub fn has_column_choice(&self) -> bool {
        self.session.has_column_choice()
    }

    pub fn selected_column(&self) -> usize {
        self.session.selected_column()
    }

    pub fn select_column(&mut self, column: usize) -> std::result::Result<usize, JsValue> {
        self.session.select_column(column).map_err(js_err)
    }

    pub fn names(&self) -> Vec<String> {
        self.session.names().to_vec()
    }

    pub fn upload_message(&self) -> Option<String> {
        self.session.upload_status().message().map(str::to_string)
    }

    pub fn upload_failed(&self) -> bool {
        self.session.upload_status().is_error()
    }

    pub fn load_template(&mut self, data: &[u8]) -> std::result::Result<(), JsValue> {
        self.session.load_template(data).map(|_| ()).map_err(js_err)
    }

    pub fn reset_template(&mut self) -> std::result::Result<(), JsValue> {
        self.session.reset_template().map(|_| ()).map_err(js_err)
    }

    pub fn template_message(&self) -> Option<String> {
        self.session.template_status().message().map(str::to_string)
    }

    pub fn template_failed(&self) -> bool {
        self.session.template_status().is_error()
    }

    pub fn using_default_template(&self) -> bool {
        self.session.using_default_template()
    }

    pub fn template_width(&self) -> u32 {
        self.session.geometry().width
    }

    pub fn template_height(&self) -> u32 {
        self.session.geometry().height
    }

    pub fn anchor_x(&self) -> f32 {
        self.session.anchor().x
    }

    pub fn anchor_y(&self) -> f32 {
        self.session.anchor().y
    }

    /// Posición del ancla en píxeles de la plantilla activa.
    pub fn anchor_pixel_x(&self) -> f32 {
        self.session.anchor_pixels().0
    }

    pub fn anchor_pixel_y(&self) -> f32 {
        self.session.anchor_pixels().1
    }

    pub fn set_anchor(&mut self, x: f32, y: f32) {
        self.session.set_anchor(Anchor::new(x, y));
    }

    pub fn pointer_down(&mut self, x: f32, y: f32, display_w: f32, display_h: f32) {
        self.session.pointer_down(x, y, display_w, display_h);
    }

    pub fn pointer_move(&mut self, x: f32, y: f32, display_w: f32, display_h: f32) {
        self.session.pointer_move(x, y, display_w, display_h);
    }

    pub fn pointer_up(&mut self) {
        self.session.pointer_up();
    }

    pub fn font_families() -> Vec<String> {
        fonts::FontFamily::ALL
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    pub fn font_size(&self) -> u32 {
        self.session.style().font_size()
    }

    pub fn font_color(&self) -> String {
        render::format_color(self.session.style().color)
    }

    pub fn font_family(&self) -> String {
        self.session.style().family.name().to_string()
    }

    pub fn has_font(&self, family: &str) -> bool {
        self.session.has_font(family)
    }

    pub fn set_font_size(&mut self, size: u32) {
        self.session.set_font_size(size);
    }

    pub fn set_font_color(&mut self, color: &str) -> std::result::Result<(), JsValue> {
        self.session.set_font_color(color).map_err(js_err)
    }

    pub fn set_font_family(&mut self, family: &str) -> std::result::Result<(), JsValue> {
        let family = family.parse::<fonts::FontFamily>().map_err(js_err)?;
        self.session.set_font_family(family);
        Ok(())
    }

    pub fn register_font(&mut self, family: &str, data: Vec<u8>) -> std::result::Result<(), JsValue> {
        self.session.register_font(family, data).map_err(js_err)
    }

    pub fn set_preview_name(&mut self, name: &str) {
        self.session.set_preview_override(name);
    }

    pub fn preview_name(&self) -> String {
        self.session.preview_name().to_string()
    }

    pub fn preview_png(&self) -> std::result::Result<Vec<u8>, JsValue> {
        self.session.render_preview().map_err(js_err)
    }

    pub fn can_generate(&self) -> bool {
        self.session.can_generate()
    }

    pub fn is_generating(&self) -> bool {
        *self.session.generation() == GenerationState::Running
    }

    /// Mensaje del último lote fallido; se limpia al arrancar otro.
    pub fn generation_error(&self) -> Option<String> {
        self.session.generation().error().map(str::to_string)
    }

    /// ZIP con un PNG por nombre, o `undefined` si no hay nada que generar.
    pub fn generate(&mut self) -> std::result::Result<Option<Vec<u8>>, JsValue> {
        self.session.generate().map_err(js_err)
    }

    pub fn archive_name() -> String {
        builder::ARCHIVE_NAME.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn studio_reports_editor_state() {
        let mut studio = Studio::new().unwrap();
        assert!(studio.using_default_template());
        assert_eq!(studio.upload_message(), None);
        assert!(!studio.upload_failed());
        assert_eq!(studio.font_color(), "#1f2937");
        assert_eq!(studio.font_family(), "Playfair Display");
        assert_eq!(studio.anchor_pixel_x(), studio.template_width() as f32 / 2.0);

        studio.load_sheet(b"Name\nAna\n", "lista.csv").unwrap();
        assert_eq!(studio.upload_message().as_deref(), Some("1 nombres cargados"));

        studio.set_anchor(0.25, 1.0);
        studio.set_font_color("#FF0000").unwrap();
        studio.set_font_size(500);
        assert_eq!(studio.anchor_pixel_y(), studio.template_height() as f32);
        assert_eq!(studio.font_color(), "#ff0000");
        assert_eq!(studio.font_size(), render::MAX_FONT_SIZE);
        assert!(!studio.has_font("Lora"));

        assert!(studio.generate().unwrap().is_some());
        assert_eq!(studio.generation_error(), None);
        assert!(!studio.template_failed());
        assert_eq!(studio.template_message(), None);
    }
}
