// Semicolon-delimited document format
//
// One record per line, no header:
//   id;x;y;raw;result;var;description;vis
// Fields are quoted only when they contain `;`, quotes or newlines.
// Trailing fields may be omitted; only id and raw text are required.

use std::path::Path;

use livecalc_engine::{CellRecord, EquationId, VisType};

use crate::IoError;

pub const DELIMITER: u8 = b';';

const FIELD_COUNT: usize = 8;

pub fn read(path: &Path) -> Result<Vec<CellRecord>, IoError> {
    let content = crate::read_file_as_utf8(path)?;
    from_str(&content)
}

pub fn write(path: &Path, records: &[CellRecord]) -> Result<(), IoError> {
    let content = to_string(records)?;
    std::fs::write(path, content).map_err(|e| IoError::file(path, e))
}

pub fn from_str(content: &str) -> Result<Vec<CellRecord>, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let row = result?;
        let number = index as u64 + 1;
        let format_err = |message: String| IoError::Format {
            record: number,
            message,
        };

        if row.len() < 4 {
            return Err(format_err(format!(
                "expected at least 4 fields (id;x;y;raw), found {}",
                row.len()
            )));
        }
        if row.len() > FIELD_COUNT {
            return Err(format_err(format!(
                "expected at most {} fields, found {}",
                FIELD_COUNT,
                row.len()
            )));
        }

        let field = |i: usize| row.get(i).unwrap_or("");
        let id = field(0)
            .trim()
            .trim_start_matches('#')
            .parse::<u64>()
            .map_err(|_| format_err(format!("invalid id: {:?}", field(0))))?;
        let coord = |i: usize, name: &str| -> Result<f64, IoError> {
            let text = field(i).trim();
            if text.is_empty() {
                return Ok(0.0);
            }
            text.parse::<f64>()
                .map_err(|_| format_err(format!("invalid {}: {:?}", name, text)))
        };
        let optional = |i: usize| Some(field(i)).filter(|s| !s.is_empty()).map(str::to_string);

        records.push(CellRecord {
            id: EquationId::from_raw(id),
            position_x: coord(1, "x position")?,
            position_y: coord(2, "y position")?,
            raw_text: field(3).to_string(),
            result_text: field(4).to_string(),
            defined_var_name: optional(5),
            description: optional(6),
            vis_type: field(7).parse::<VisType>().map_err(format_err)?,
        });
    }
    Ok(records)
}

pub fn to_string(records: &[CellRecord]) -> Result<String, IoError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .from_writer(Vec::new());

    for record in records {
        let id = record.id.raw().to_string();
        let x = record.position_x.to_string();
        let y = record.position_y.to_string();
        writer.write_record([
            id.as_str(),
            x.as_str(),
            y.as_str(),
            record.raw_text.as_str(),
            record.result_text.as_str(),
            record.defined_var_name.as_deref().unwrap_or(""),
            record.description.as_deref().unwrap_or(""),
            record.vis_type.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| IoError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes).map_err(|e| IoError::Format {
        record: 0,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, raw: &str) -> CellRecord {
        CellRecord {
            id: EquationId::from_raw(id),
            position_x: 0.0,
            position_y: 0.0,
            raw_text: raw.to_string(),
            result_text: String::new(),
            defined_var_name: None,
            description: None,
            vis_type: VisType::Text,
        }
    }

    #[test]
    fn test_write_layout() {
        let mut r = record(3, "v := d / t # speed");
        r.position_x = 10.0;
        r.position_y = 2.5;
        r.result_text = "5 m/s".into();
        r.defined_var_name = Some("v".into());
        r.description = Some("speed".into());
        r.vis_type = VisType::Symbolic;

        let text = to_string(&[r]).unwrap();
        assert_eq!(text, "3;10;2.5;v := d / t # speed;5 m/s;v;speed;symbolic\n");
    }

    #[test]
    fn test_semicolons_are_quoted() {
        let r = record(1, "a; b");
        let text = to_string(&[r.clone()]).unwrap();
        assert!(text.contains("\"a; b\""));
        assert_eq!(from_str(&text).unwrap(), vec![r]);
    }

    #[test]
    fn test_short_rows_use_defaults() {
        let records = from_str("1;;;x := 1\n2;5;6;x + 1;;\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].raw_text, "x := 1");
        assert_eq!(records[0].vis_type, VisType::Text);
        assert_eq!(records[1].position_x, 5.0);
        assert!(records[1].defined_var_name.is_none());
    }

    #[test]
    fn test_hash_prefixed_id() {
        let records = from_str("#7;0;0;1 + 1\n").unwrap();
        assert_eq!(records[0].id, EquationId::from_raw(7));
    }

    #[test]
    fn test_malformed_rows() {
        let err = from_str("1;0;0\n").unwrap_err();
        assert!(err.to_string().starts_with("record 1: expected at least 4 fields"));

        let err = from_str("1;0;0;x\nabc;0;0;y\n").unwrap_err();
        assert_eq!(err.to_string(), "record 2: invalid id: \"abc\"");

        let err = from_str("1;0;0;x;;;;sparkline\n").unwrap_err();
        assert_eq!(err.to_string(), "record 1: unknown visualization type: sparkline");

        let err = from_str("1;north;0;x\n").unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_empty_document() {
        assert!(from_str("").unwrap().is_empty());
        assert_eq!(to_string(&[]).unwrap(), "");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.lcalc");
        let records = vec![record(1, "x := 2"), record(2, "x * \"3\"")];
        write(&path, &records).unwrap();
        assert_eq!(read(&path).unwrap(), records);
    }
}
