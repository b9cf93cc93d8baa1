use crate::error::{CertificateError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use encoding_rs::WINDOWS_1252;
use std::io::Cursor;

/// Celdas de una fila ya normalizadas a texto.
pub type RawRow = Vec<String>;

pub type NameList = Vec<String>;

const HEADER_KEYWORD: &str = "name";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnChoice {
    pub index: usize,
    pub label: String,
}

/// Primera hoja del libro, fila 0 normalmente es la cabecera.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetMatrix {
    rows: Vec<RawRow>,
}

impl SheetMatrix {
    pub fn from_rows(rows: Vec<RawRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    /// Ancho de la fila más larga.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn is_header(&self, column: usize) -> bool {
        self.cell(0, column).to_lowercase().contains(HEADER_KEYWORD)
    }

    /// Primera columna cuya cabecera contiene "name", o la 0.
    pub fn detect_name_column(&self) -> usize {
        (0..self.column_count())
            .find(|&c| self.is_header(c))
            .unwrap_or(0)
    }

    pub fn column_choices(&self) -> Vec<ColumnChoice> {
        (0..self.column_count())
            .map(|index| {
                let header = self.cell(0, index).trim();
                let label = if header.is_empty() {
                    format!("Columna {}", column_letter(index))
                } else {
                    header.to_string()
                };
                ColumnChoice { index, label }
            })
            .collect()
    }

    /// Busca una columna por índice numérico o por el texto de su cabecera.
    pub fn find_column(&self, query: &str) -> Option<usize> {
        let query = query.trim();
        if let Ok(index) = query.parse::<usize>() {
            return (index < self.column_count()).then_some(index);
        }
        let wanted = query.to_lowercase();
        self.column_choices()
            .into_iter()
            .find(|c| c.label.to_lowercase() == wanted)
            .map(|c| c.index)
    }

    pub fn extract_names(&self, column: usize) -> NameList {
        let skip = usize::from(self.is_header(column));
        self.rows
            .iter()
            .skip(skip)
            .filter_map(|row| {
                let name = row.get(column).map(|c| c.trim()).unwrap_or("");
                (!name.is_empty()).then(|| name.to_string())
            })
            .collect()
    }
}

/// Lee la primera hoja. `file_name` sólo se usa para reconocer CSV/TSV.
pub fn read_sheet(data: &[u8], file_name: Option<&str>) -> Result<SheetMatrix> {
    let extension = file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    let sheet = match extension.as_deref() {
        Some("csv") => read_delimited(data, b',')?,
        Some("tsv") | Some("tab") => read_delimited(data, b'\t')?,
        _ => match read_workbook(data) {
            Ok(sheet) => sheet,
            Err(err) if std::str::from_utf8(data).is_ok() => {
                tracing::debug!(%err, "no es un libro, se prueba CSV");
                read_delimited(data, b',')?
            }
            Err(err) => return Err(err),
        },
    };

    if sheet.rows.is_empty() {
        return Err(CertificateError::input("No se detectaron filas"));
    }
    if sheet.column_count() == 0 {
        return Err(CertificateError::input("No se detectaron columnas"));
    }

    tracing::info!(
        rows = sheet.rows.len(),
        columns = sheet.column_count(),
        "hoja cargada"
    );
    Ok(sheet)
}

fn read_workbook(data: &[u8]) -> Result<SheetMatrix> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data.to_vec()))
        .map_err(|e| CertificateError::input(format!("No se pudo abrir el libro: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CertificateError::input("No se encontró ninguna hoja"))?
        .map_err(|e| CertificateError::input(format!("No se pudo leer la hoja: {}", e)))?;

    // calamine recorta las columnas vacías a la izquierda; se rellenan para
    // que los índices coincidan con las letras de la hoja.
    let offset = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    let rows = range
        .rows()
        .map(|cells| {
            std::iter::repeat(String::new())
                .take(offset)
                .chain(cells.iter().map(cell_to_string))
                .collect()
        })
        .collect();

    Ok(SheetMatrix::from_rows(rows))
}

fn read_delimited(data: &[u8], delimiter: u8) -> Result<SheetMatrix> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for (i, record) in reader.byte_records().enumerate() {
        let record = record
            .map_err(|e| CertificateError::input(format!("CSV inválido en fila {}: {}", i + 1, e)))?;
        rows.push(record.iter().map(decode_field).collect());
    }
    Ok(SheetMatrix::from_rows(rows))
}

/// Los CSV exportados por Excel en Windows suelen venir en Windows-1252.
fn decode_field(field: &[u8]) -> String {
    match std::str::from_utf8(field) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _, _) = WINDOWS_1252.decode(field);
            text.into_owned()
        }
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Int(v) => v.to_string(),
        Data::Float(v) => v.to_string(),
        _ => String::new(),
    }
}

/// 0 -> "A", 25 -> "Z", 26 -> "AA".
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}
