//! In-memory workbook loaded from XLSX, XLS or CSV bytes.

use calamine::{open_workbook_from_rs, DataType, Range, Reader, Xls, Xlsx};
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use super::cells::parse_number_text;
use crate::error::{CotizaError, CotizaResult};

/// Supported workbook file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    Xlsx,
    Xls,
    Csv,
}

impl WorkbookFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "csv" | "txt" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Detect format from the leading bytes: zip container or OLE2 compound file.
    pub fn from_magic(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"PK\x03\x04") {
            Some(Self::Xlsx)
        } else if data.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
            Some(Self::Xls)
        } else {
            None
        }
    }

    pub fn detect(filename: &str, data: &[u8]) -> Option<Self> {
        Self::from_magic(data).or_else(|| Self::from_extension(Path::new(filename)))
    }
}

/// A single worksheet cell, reduced to what the readers need.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Numeric value, coercing text such as `S/ 1,250.00`.
    pub fn number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Text(s) => parse_number_text(s),
            _ => None,
        }
    }
}

impl From<&DataType> for Cell {
    fn from(value: &DataType) -> Self {
        match value {
            DataType::Empty => Cell::Empty,
            DataType::String(s) if s.trim().is_empty() => Cell::Empty,
            DataType::String(s) => Cell::Text(s.clone()),
            DataType::Float(f) => Cell::Number(*f),
            DataType::Int(i) => Cell::Number(*i as f64),
            DataType::Bool(b) => Cell::Text(b.to_string()),
            DataType::Error(_) => Cell::Empty,
            other => Cell::Text(other.to_string()),
        }
    }
}

/// A worksheet as a dense grid; row and column indexes are absolute (0-based).
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Build a sheet from string rows; numeric-looking strings become numbers.
    pub fn from_strings(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|s| cell_from_str(s)).collect())
            .collect();
        Self::new(name, rows)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> &[Cell] {
        self.rows.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    fn from_range(name: &str, range: &Range<DataType>) -> Self {
        let (start_row, start_col) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row];
        for source in range.rows() {
            let mut row = vec![Cell::Empty; start_col];
            row.extend(source.iter().map(Cell::from));
            rows.push(row);
        }
        Self::new(name, rows)
    }
}

fn cell_from_str(s: &str) -> Cell {
    if s.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(s.to_string())
    }
}

/// All worksheets of one uploaded file, in workbook order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Parse workbook bytes; the format comes from magic bytes, then the file extension.
    pub fn from_bytes(filename: &str, data: &[u8]) -> CotizaResult<Self> {
        if data.is_empty() {
            return Err(CotizaError::parse(format!("{}: empty file", filename)));
        }

        let format = WorkbookFormat::detect(filename, data)
            .ok_or_else(|| CotizaError::parse(format!("{}: could not determine file format", filename)))?;

        let workbook = match format {
            WorkbookFormat::Xlsx => {
                let mut reader: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))?;
                Self::new(read_sheets(&mut reader)?)
            }
            WorkbookFormat::Xls => {
                let mut reader: Xls<_> = open_workbook_from_rs(Cursor::new(data))?;
                Self::new(read_sheets(&mut reader)?)
            }
            WorkbookFormat::Csv => Self::new(vec![read_csv(filename, data)?]),
        };

        tracing::debug!(
            filename,
            ?format,
            sheets = workbook.sheets.len(),
            "Workbook loaded"
        );
        Ok(workbook)
    }
}

fn read_sheets<RS, R>(reader: &mut R) -> CotizaResult<Vec<Sheet>>
where
    RS: Read + Seek,
    R: Reader<RS>,
    CotizaError: From<R::Error>,
{
    let names: Vec<String> = reader.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());

    for name in names {
        match reader.worksheet_range(&name) {
            Some(Ok(range)) => sheets.push(Sheet::from_range(&name, &range)),
            Some(Err(e)) => return Err(e.into()),
            None => tracing::debug!(sheet = %name, "Worksheet has no cell range"),
        }
    }

    Ok(sheets)
}

/// CSV files become a single sheet named after the file stem.
fn read_csv(filename: &str, data: &[u8]) -> CotizaResult<Sheet> {
    let first_line = data.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    let delimiter = if semicolons > commas { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(data);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(cell_from_str).collect());
    }

    let name = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("CSV")
        .to_string();

    Ok(Sheet::new(name, rows))
}
