//! Estado de la aplicación: hoja cargada, plantilla activa, ancla, estilo y
//! el estado de la generación. La interfaz lo muta; el lote trabaja sobre
//! una copia tomada al arrancar.

use crate::builder::BatchJob;
use crate::error::{CertificateError, Result};
use crate::fonts::{FontBook, FontFamily};
use crate::render::{self, StyleAttributes};
use crate::sheet::{self, ColumnChoice, NameList, SheetMatrix};
use crate::template::{Anchor, DragState, Template, TemplateGeometry, TemplateResource};

pub const PLACEHOLDER_NAME: &str = "Nombre del participante";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Idle,
    Ok(String),
    Error(String),
}

impl Status {
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Ok(msg) | Self::Error(msg) => Some(msg),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed(String),
}

impl GenerationState {
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    sheet: Option<SheetMatrix>,
    column: usize,
    names: NameList,
    resource: TemplateResource,
    template: Template,
    anchor: Anchor,
    drag: DragState,
    style: StyleAttributes,
    fonts: FontBook,
    preview_override: String,
    upload_status: Status,
    template_status: Status,
    generation: GenerationState,
}

impl Session {
    pub fn new() -> Result<Self> {
        let resource = TemplateResource::BuiltIn;
        let template = resource.decode()?;
        Ok(Self {
            sheet: None,
            column: 0,
            names: Vec::new(),
            resource,
            template,
            anchor: Anchor::default(),
            drag: DragState::default(),
            style: StyleAttributes::default(),
            fonts: FontBook::default(),
            preview_override: String::new(),
            upload_status: Status::Idle,
            template_status: Status::Idle,
            generation: GenerationState::Idle,
        })
    }

    // ---- hoja de cálculo ----

    /// Carga la hoja y elige la columna de nombres. Si falla, se descarta
    /// la lista anterior.
    pub fn load_sheet(&mut self, data: &[u8], file_name: Option<&str>) -> Result<usize> {
        match sheet::read_sheet(data, file_name) {
            Ok(matrix) => {
                self.column = matrix.detect_name_column();
                self.names = matrix.extract_names(self.column);
                self.sheet = Some(matrix);
                self.upload_status = Status::Ok(format!("{} nombres cargados", self.names.len()));
                Ok(self.names.len())
            }
            Err(err) => {
                self.sheet = None;
                self.column = 0;
                self.names.clear();
                self.upload_status = Status::Error(err.to_string());
                Err(err)
            }
        }
    }

    pub fn select_column(&mut self, column: usize) -> Result<usize> {
        let matrix = self
            .sheet
            .as_ref()
            .ok_or_else(|| CertificateError::input("No hay ninguna hoja cargada"))?;
        if column >= matrix.column_count() {
            return Err(CertificateError::input(format!("Columna fuera de rango: {}", column)));
        }
        self.column = column;
        self.names = matrix.extract_names(column);
        self.upload_status = Status::Ok(format!("{} nombres cargados", self.names.len()));
        Ok(self.names.len())
    }

    pub fn columns(&self) -> Vec<ColumnChoice> {
        self.sheet
            .as_ref()
            .map(SheetMatrix::column_choices)
            .unwrap_or_default()
    }

    pub fn sheet(&self) -> Option<&SheetMatrix> {
        self.sheet.as_ref()
    }

    /// El selector sólo tiene sentido con más de una columna.
    pub fn has_column_choice(&self) -> bool {
        self.columns().len() > 1
    }

    pub fn selected_column(&self) -> usize {
        self.column
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    // ---- plantilla ----

    /// Si la nueva imagen no se puede usar, la plantilla anterior sigue activa.
    pub fn load_template(&mut self, data: &[u8]) -> Result<TemplateGeometry> {
        let resource = TemplateResource::uploaded(data);
        match resource.decode() {
            Ok(template) => {
                let geometry = template.geometry();
                self.resource = resource;
                self.template = template;
                self.template_status = Status::Ok(format!("Plantilla {}×{}", geometry.width, geometry.height));
                Ok(geometry)
            }
            Err(err) => {
                self.template_status = Status::Error(err.to_string());
                Err(err)
            }
        }
    }

    pub fn reset_template(&mut self) -> Result<TemplateGeometry> {
        let resource = TemplateResource::BuiltIn;
        self.template = resource.decode()?;
        self.resource = resource;
        self.template_status = Status::Idle;
        Ok(self.template.geometry())
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn using_default_template(&self) -> bool {
        self.resource.is_default()
    }

    pub fn geometry(&self) -> TemplateGeometry {
        self.template.geometry()
    }

    // ---- ancla ----

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.anchor = anchor;
    }

    pub fn anchor_pixels(&self) -> (f32, f32) {
        self.geometry().to_pixels(self.anchor)
    }

    pub fn pointer_down(&mut self, x: f32, y: f32, display_w: f32, display_h: f32) {
        if let Some(anchor) = self.drag.pointer_down(x, y, display_w, display_h) {
            self.anchor = anchor;
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32, display_w: f32, display_h: f32) {
        if let Some(anchor) = self.drag.pointer_move(x, y, display_w, display_h) {
            self.anchor = anchor;
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag.pointer_up();
    }

    // ---- estilo ----

    pub fn style(&self) -> StyleAttributes {
        self.style
    }

    pub fn set_font_size(&mut self, size: u32) {
        self.style.set_font_size(size);
    }

    pub fn set_font_color(&mut self, color: &str) -> Result<()> {
        self.style.color = render::parse_color(color)?;
        Ok(())
    }

    pub fn set_font_family(&mut self, family: FontFamily) {
        self.style.family = family;
    }

    pub fn register_font(&mut self, family: &str, data: Vec<u8>) -> Result<()> {
        self.fonts.register(family, data)
    }

    /// Indica si la familia (o genérica) tiene una fuente vectorial registrada.
    pub fn has_font(&self, family: &str) -> bool {
        self.fonts.contains(family)
    }

    // ---- vista previa ----

    pub fn set_preview_override(&mut self, name: &str) {
        self.preview_override = name.to_string();
    }

    pub fn preview_name(&self) -> &str {
        let custom = self.preview_override.trim();
        if !custom.is_empty() {
            return custom;
        }
        self.names.first().map(String::as_str).unwrap_or(PLACEHOLDER_NAME)
    }

    pub fn render_preview(&self) -> Result<Vec<u8>> {
        let face = self.fonts.resolve(self.style.family);
        render::render_certificate(self.preview_name(), &self.template, self.anchor, &self.style, &face)
    }

    // ---- generación ----

    pub fn can_generate(&self) -> bool {
        !self.names.is_empty() && self.generation != GenerationState::Running
    }

    pub fn generation(&self) -> &GenerationState {
        &self.generation
    }

    pub fn upload_status(&self) -> &Status {
        &self.upload_status
    }

    pub fn template_status(&self) -> &Status {
        &self.template_status
    }

    /// Toma una copia de los datos y marca la generación como en curso.
    /// `None` si ya hay un lote en marcha o no hay nombres.
    pub fn start_batch(&mut self) -> Option<BatchJob> {
        if !self.can_generate() {
            return None;
        }
        let job = BatchJob::new(
            self.names.clone(),
            self.template.clone(),
            self.anchor,
            self.style,
            &self.fonts,
        )?;
        self.generation = GenerationState::Running;
        tracing::info!(names = job.len(), "lote iniciado");
        Some(job)
    }

    pub fn finish_batch(&mut self, result: Result<Vec<u8>>) -> Result<Vec<u8>> {
        match result {
            Ok(archive) => {
                self.generation = GenerationState::Succeeded;
                Ok(archive)
            }
            Err(err) => {
                tracing::warn!(%err, "lote fallido");
                self.generation = GenerationState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Atajo síncrono: arranca, ejecuta y cierra el lote.
    pub fn generate(&mut self) -> Result<Option<Vec<u8>>> {
        match self.start_batch() {
            Some(job) => {
                let result = job.run();
                self.finish_batch(result).map(Some)
            }
            None => Ok(None),
        }
    }
}
