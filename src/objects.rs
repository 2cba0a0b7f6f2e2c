//! Address objects read from `name,value` CSV files.

use crate::error::FmcError;
use crate::model::{NewObject, ObjectKind};
use std::io::Read;
use tracing::warn;

/// Reads headerless `name,value` rows. Short rows are skipped and returned
/// alongside the parsed objects.
pub fn read_csv<R: Read>(reader: R, kind: ObjectKind) -> (Vec<NewObject>, Vec<FmcError>) {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut objects = Vec::new();
    let mut anomalies = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let line = idx + 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!(line, %err, "skipping unreadable CSV row");
                anomalies.push(FmcError::parse(format!("line {line}"), err));
                continue;
            }
        };
        match (record.get(0), record.get(1)) {
            (Some(name), Some(value)) if !name.is_empty() && !value.is_empty() => {
                objects.push(NewObject::new(name, kind, value));
            }
            _ => {
                let raw = record.iter().collect::<Vec<_>>().join(",");
                warn!(line, row = %raw, "skipping CSV row without name and value");
                anomalies.push(FmcError::parse(raw, "expected name,value"));
            }
        }
    }
    (objects, anomalies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_name_value_rows() {
        let text = "web-1,10.0.0.1\n db-1 , 10.0.0.2 \n";
        let (objects, anomalies) = read_csv(text.as_bytes(), ObjectKind::Host);

        assert!(anomalies.is_empty());
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1].name, "db-1");
        assert_eq!(objects[1].value, "10.0.0.2");
        assert_eq!(objects[1].kind, ObjectKind::Host);
        assert_eq!(objects[1].description, "");
    }

    #[test]
    fn short_rows_are_reported() {
        let text = "lonely\nrange-1,10.0.0.1-10.0.0.9\n,10.0.0.5\n";
        let (objects, anomalies) = read_csv(text.as_bytes(), ObjectKind::Range);

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name, "range-1");
        assert_eq!(anomalies.len(), 2);
        assert!(matches!(anomalies[0], FmcError::Parse { .. }));
    }
}
