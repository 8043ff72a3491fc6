//! Reads a delimited file into a single-sheet [`Book`].
//!
//! The header row, when present, stays in every field's data and the sheet's
//! `data_row_index` points past it.

use std::path::Path;

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};

use crate::{
    book::{Book, BookId, Field, FileType, ProcessStatus, RawValue, Sheet},
    io_utils,
};

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub book_id: BookId,
    /// Resolved from the file extension when unset.
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub has_headers: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            book_id: 1,
            delimiter: None,
            encoding: UTF_8,
            has_headers: true,
        }
    }
}

pub fn extract_csv(path: &Path, options: &ExtractOptions) -> Result<Book> {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} of {path:?}", idx + 1))?;
        let row = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {} of {path:?}", idx + 1))?;
        rows.push(row);
    }
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    debug!("Read {} row(s) x {} column(s) from {path:?}", rows.len(), width);

    let fields = (0..width)
        .map(|column| {
            let data: Vec<RawValue> = rows
                .iter()
                .map(|row| {
                    let cell = row.get(column).filter(|cell| !cell.trim().is_empty());
                    RawValue::from(cell.cloned())
                })
                .collect();
            let title = options
                .has_headers
                .then(|| data.first().and_then(RawValue::as_non_empty))
                .flatten()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Column {}", column + 1));
            Field::new(column as u64 + 1, title, column, data)
        })
        .collect::<Vec<_>>();

    let title = if io_utils::is_dash(path) {
        "stdin".to_string()
    } else {
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("book")
            .to_string()
    };
    let sheet_title = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| *stem != "-")
        .unwrap_or("Sheet1")
        .to_string();

    info!(
        "Extracted {} field(s) from {:?} (delimiter '{}')",
        fields.len(),
        path,
        crate::printable_delimiter(delimiter)
    );
    Ok(Book {
        id: options.book_id,
        title,
        file_type: FileType::Csv,
        status: ProcessStatus::Pending,
        error: None,
        sheets: vec![Sheet {
            id: 1,
            title: sheet_title,
            data_row_index: usize::from(options.has_headers),
            fields,
        }],
    })
}
