use thiserror::Error;

pub type Result<T> = std::result::Result<T, CertificateError>;

#[derive(Debug, Error)]
pub enum CertificateError {
    /// Datos del usuario que no se pueden usar: hoja ilegible o vacía,
    /// color, familia o archivo de fuente no válidos.
    #[error("Entrada no válida: {0}")]
    Input(String),

    /// Plantilla con formato no soportado o que no se pudo decodificar.
    #[error("Error en la plantilla: {0}")]
    Template(String),

    #[error("Error al generar certificado: {0}")]
    Render(String),

    #[error("Error al empaquetar el ZIP: {0}")]
    Archive(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CertificateError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Render, archivo o errores sin categoría terminan como "generación fallida".
    pub fn is_generation_failure(&self) -> bool {
        !matches!(self, Self::Input(_) | Self::Template(_))
    }
}

impl From<zip::result::ZipError> for CertificateError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(CertificateError::input("x").to_string().contains("no válida"));
        assert!(CertificateError::template("x").to_string().contains("plantilla"));
        assert!(CertificateError::render("x").to_string().contains("generar"));
        assert!(CertificateError::archive("x").to_string().contains("ZIP"));
    }

    #[test]
    fn generation_failures_exclude_upload_errors() {
        assert!(!CertificateError::input("x").is_generation_failure());
        assert!(!CertificateError::template("x").is_generation_failure());
        assert!(CertificateError::render("x").is_generation_failure());
        assert!(CertificateError::archive("x").is_generation_failure());
    }

    #[test]
    fn other_preserves_source() {
        let err = CertificateError::Other(anyhow::anyhow!("boom"));
        assert!(err.to_string().contains("boom"));
    }
}
