use crate::error::Result;
use crate::fonts::{Face, FontBook};
use crate::render::{render_certificate, StyleAttributes};
use crate::template::{Anchor, Template};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ARCHIVE_NAME: &str = "certificates.zip";

/// Nombre de archivo seguro: sin tildes, en minúsculas y con guiones.
/// Si no queda nada se usa `certificate-{index + 1}`.
pub fn slugify(name: &str, index: usize) -> String {
    let kept: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    let slug = kept
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();

    if slug.is_empty() {
        format!("certificate-{}", index + 1)
    } else {
        slug
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTask<'a> {
    pub index: usize,
    pub name: &'a str,
    pub file_name: String,
}

#[derive(Debug, Clone)]
pub struct RenderedCertificate {
    pub name: String,
    pub file_name: String,
    pub png: Vec<u8>,
}

/// Copia inmutable de todo lo necesario para generar el lote. La plantilla
/// ya está decodificada y la fuente resuelta, así que cada certificado sólo
/// rasteriza texto.
#[derive(Debug, Clone)]
pub struct BatchJob {
    names: Vec<String>,
    template: Template,
    anchor: Anchor,
    style: StyleAttributes,
    face: Face,
}

impl BatchJob {
    /// `None` si no hay nombres: no es un error, simplemente no hay lote.
    pub fn new(
        names: Vec<String>,
        template: Template,
        anchor: Anchor,
        style: StyleAttributes,
        fonts: &FontBook,
    ) -> Option<Self> {
        if names.is_empty() {
            return None;
        }
        let face = fonts.resolve(style.family);
        Some(Self {
            names,
            template,
            anchor,
            style,
            face,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Secuencia perezosa de tareas en orden de entrada; se puede recorrer
    /// de nuevo clonando el iterador o volviendo a llamar.
    pub fn tasks(&self) -> impl Iterator<Item = RenderTask<'_>> + Clone + '_ {
        self.names.iter().enumerate().map(|(index, name)| RenderTask {
            index,
            name: name.as_str(),
            file_name: format!("{}.png", slugify(name, index)),
        })
    }

    pub fn render(&self, task: &RenderTask<'_>) -> Result<RenderedCertificate> {
        let png = render_certificate(task.name, &self.template, self.anchor, &self.style, &self.face)?;
        tracing::debug!(index = task.index, file = %task.file_name, bytes = png.len(), "certificado generado");
        Ok(RenderedCertificate {
            name: task.name.to_string(),
            file_name: task.file_name.clone(),
            png,
        })
    }

    /// Genera los certificados uno a uno; cualquier fallo aborta el lote.
    pub fn run(&self) -> Result<Vec<u8>> {
        self.run_with_progress(|_, _| {})
    }

    pub fn run_with_progress(&self, mut progress: impl FnMut(usize, usize)) -> Result<Vec<u8>> {
        let total = self.len();
        let mut rendered = Vec::with_capacity(total);
        for task in self.tasks() {
            rendered.push(self.render(&task)?);
            progress(task.index + 1, total);
        }
        build_archive(rendered)
    }

    /// Igual que `run`, en paralelo. Los resultados se recogen por posición
    /// de entrada, así el ZIP queda en el mismo orden.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn run_parallel(&self) -> Result<Vec<u8>> {
        use rayon::prelude::*;

        let tasks: Vec<_> = self.tasks().collect();
        let rendered = tasks
            .par_iter()
            .map(|task| self.render(task))
            .collect::<Result<Vec<_>>>()?;
        build_archive(rendered)
    }
}

/// Empaqueta en el orden recibido. Si dos certificados comparten nombre de
/// archivo, el último reemplaza al anterior en su misma posición.
pub fn build_archive(certificates: impl IntoIterator<Item = RenderedCertificate>) -> Result<Vec<u8>> {
    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for cert in certificates {
        match positions.get(&cert.file_name) {
            Some(&pos) => {
                tracing::warn!(file = %cert.file_name, name = %cert.name, "nombre de archivo repetido, se sobrescribe");
                entries[pos].1 = cert.png;
            }
            None => {
                positions.insert(cert.file_name.clone(), entries.len());
                entries.push((cert.file_name, cert.png));
            }
        }
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    for (file_name, png) in &entries {
        writer.start_file(file_name.as_str(), options)?;
        writer.write_all(png)?;
    }

    let archive = writer.finish()?.into_inner();
    tracing::info!(entries = entries.len(), bytes = archive.len(), "ZIP finalizado");
    Ok(archive)
}

/// Genera el ZIP completo. `Ok(None)` cuando la lista está vacía.
pub fn generate(
    names: &[String],
    template: &Template,
    anchor: Anchor,
    style: &StyleAttributes,
    fonts: &FontBook,
) -> Result<Option<Vec<u8>>> {
    match BatchJob::new(names.to_vec(), template.clone(), anchor, *style, fonts) {
        Some(job) => job.run().map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use zip::ZipArchive;

    fn template() -> Template {
        Template::new(RgbaImage::from_pixel(60, 40, Rgba([240, 240, 240, 255])))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn entry_names(archive: &[u8]) -> Vec<String> {
        let zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        zip.file_names().map(str::to_string).collect::<Vec<_>>()
    }

    fn ordered_entry_names(archive: &[u8]) -> Vec<String> {
        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn slug_strips_diacritics() {
        assert_eq!(slugify("José Ñuñez", 0), "jose-nunez");
    }

    #[test]
    fn slug_collapses_whitespace_and_drops_symbols() {
        assert_eq!(slugify("  Ana   María  O'Neil ", 0), "ana-maria-oneil");
        assert_eq!(slugify("Dr. Zoë-Lee_2", 0), "dr-zoe-lee_2");
    }

    #[test]
    fn slug_is_idempotent() {
        for input in ["jose-nunez", "ana_maria", "certificate-7", "x"] {
            assert_eq!(slugify(input, 0), input);
            assert_eq!(slugify(&slugify(input, 3), 3), slugify(input, 3));
        }
    }

    #[test]
    fn slug_falls_back_to_position() {
        assert_eq!(slugify("李小龍", 0), "certificate-1");
        assert_eq!(slugify("!!!", 4), "certificate-5");
    }

    #[test]
    fn equivalent_names_share_a_slug() {
        assert_eq!(slugify("José", 0), slugify("jose", 1));
    }

    #[test]
    fn tasks_are_restartable() {
        let job = BatchJob::new(names(&["Ana", "Luis"]), template(), Anchor::default(), StyleAttributes::default(), &FontBook::default())
            .unwrap();
        let first: Vec<_> = job.tasks().map(|t| t.file_name).collect();
        let second: Vec<_> = job.tasks().map(|t| t.file_name).collect();
        assert_eq!(first, vec!["ana.png", "luis.png"]);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_list_produces_nothing() {
        let out = generate(&[], &template(), Anchor::default(), &StyleAttributes::default(), &FontBook::default())
            .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn archive_has_one_png_per_name_in_order() {
        let list = names(&["Zoe", "Ana", "José Ñuñez"]);
        let archive = generate(&list, &template(), Anchor::default(), &StyleAttributes::default(), &FontBook::default())
            .unwrap()
            .unwrap();
        assert_eq!(ordered_entry_names(&archive), vec!["zoe.png", "ana.png", "jose-nunez.png"]);

        let mut zip = ZipArchive::new(Cursor::new(&archive[..])).unwrap();
        let mut png = Vec::new();
        zip.by_name("ana.png").unwrap().read_to_end(&mut png).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (60, 40));
    }

    #[test]
    fn colliding_slugs_overwrite_in_place() {
        let certs = vec![
            RenderedCertificate { name: "Ana".into(), file_name: "ana.png".into(), png: vec![1] },
            RenderedCertificate { name: "Luis".into(), file_name: "luis.png".into(), png: vec![2] },
            RenderedCertificate { name: "ana".into(), file_name: "ana.png".into(), png: vec![3] },
        ];
        let archive = build_archive(certs).unwrap();
        assert_eq!(ordered_entry_names(&archive), vec!["ana.png", "luis.png"]);
        assert_eq!(entry_names(&archive).len(), 2);

        let mut zip = ZipArchive::new(Cursor::new(&archive[..])).unwrap();
        let mut data = Vec::new();
        zip.by_name("ana.png").unwrap().read_to_end(&mut data).unwrap();
        assert_eq!(data, vec![3]);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn slug_collision_is_logged() {
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl Write for Captured {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        let certs = vec![
            RenderedCertificate { name: "Ana".into(), file_name: "ana.png".into(), png: vec![1] },
            RenderedCertificate { name: "ana".into(), file_name: "ana.png".into(), png: vec![2] },
        ];
        tracing::subscriber::with_default(subscriber, || build_archive(certs).unwrap());

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("nombre de archivo repetido, se sobrescribe"), "{}", text);
        assert!(text.contains("ZIP finalizado"), "{}", text);
    }

    #[test]
    fn parallel_run_keeps_input_order() {
        let list: Vec<String> = (0..12).map(|i| format!("Persona {}", i)).collect();
        let job = BatchJob::new(list, template(), Anchor::default(), StyleAttributes::default(), &FontBook::default())
            .unwrap();
        let sequential = ordered_entry_names(&job.run().unwrap());
        let parallel = ordered_entry_names(&job.run_parallel().unwrap());
        assert_eq!(sequential, parallel);
        assert_eq!(parallel[0], "persona-0.png");
        assert_eq!(parallel[11], "persona-11.png");
    }

    #[test]
    fn progress_reports_every_certificate() {
        let job = BatchJob::new(names(&["a", "b", "c"]), template(), Anchor::default(), StyleAttributes::default(), &FontBook::default())
            .unwrap();
        let mut seen = Vec::new();
        job.run_with_progress(|done, total| seen.push((done, total))).unwrap();
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }
}
