use std::io::Write;

use thiserror::Error;

use super::model::{Column, FieldValue};
use super::query::Subset;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("writing export: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Field separator of the flat export.
pub const SEPARATOR: u8 = b'\t';

/// Write `subset` as tab-separated text with decimal commas: no header, no
/// index column, one line per row in subset order, columns in source order.
pub fn write_subset<W: Write>(subset: &Subset, writer: W) -> Result<(), ExportError> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(SEPARATOR)
        .has_headers(false)
        .from_writer(writer);

    for listing in subset.iter() {
        out.write_record(Column::ALL.iter().map(|&c| export_cell(listing.value(c))))?;
    }
    out.flush()?;
    Ok(())
}

/// [`write_subset`] into a `String`.
pub fn subset_to_string(subset: &Subset) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_subset(subset, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn export_cell(value: FieldValue<'_>) -> String {
    match value {
        // Whole floats keep one decimal so the column stays visibly decimal.
        FieldValue::Float(v) if v.fract() == 0.0 => format!("{v:.1}").replace('.', ","),
        FieldValue::Float(v) => v.to_string().replace('.', ","),
        other => other.to_string(),
    }
}
