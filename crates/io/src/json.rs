// JSON document format: a pretty-printed array of cell records

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use livecalc_engine::CellRecord;

use crate::IoError;

pub fn read(path: &Path) -> Result<Vec<CellRecord>, IoError> {
    let content = crate::read_file_as_utf8(path)?;
    from_str(&content)
}

pub fn write(path: &Path, records: &[CellRecord]) -> Result<(), IoError> {
    let file = File::create(path).map_err(|e| IoError::file(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n").map_err(|e| IoError::file(path, e))?;
    writer.flush().map_err(|e| IoError::file(path, e))
}

pub fn from_str(content: &str) -> Result<Vec<CellRecord>, IoError> {
    Ok(serde_json::from_str(content)?)
}

pub fn to_string(records: &[CellRecord]) -> Result<String, IoError> {
    let mut text = serde_json::to_string_pretty(records)?;
    text.push('\n');
    Ok(text)
}
