use crate::certificate::RecordRow;

pub const REQUIRED_COLUMNS: [&str; 3] = ["iatc_id", "name", "issue_date"];

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("CSV is missing required column `{0}`")]
    MissingColumn(&'static str),

    #[error("unreadable CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Reads the uploaded sheet into rows, in file order. Extra columns are ignored;
/// cell contents are validated later, per row.
pub fn parse_csv(data: &[u8]) -> Result<Vec<RecordRow>, RecordError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let mut index = [0usize; 3];
    for (slot, column) in index.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == column)
            .ok_or(RecordError::MissingColumn(column))?;
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let cell = |i: usize| record.get(index[i]).unwrap_or("");
        rows.push(RecordRow::new(cell(0), cell(1), cell(2)));
    }
    Ok(rows)
}
