//! Annotated CSV to frames
//!
//! InfluxDB streams query results as CSV blocks. Each block opens with
//! `#datatype`, `#group` and `#default` annotation rows and a header row;
//! every distinct `table` value inside a block is one series. Each series
//! becomes one frame, with its group key carried as labels.

use chrono::{DateTime, Utc};

use super::error::{FluxError, FluxResult};
use crate::frame::{Field, FieldType, Frame, Labels, Value};
use crate::results::row_limit_notice;

const TIME_COLUMN: &str = "_time";
const BOOKKEEPING_COLUMNS: [&str; 2] = ["result", "table"];
const RANGE_COLUMNS: [&str; 2] = ["_start", "_stop"];

/// One column of a block as described by its annotations
#[derive(Debug, Clone)]
struct ColumnSpec {
    index: usize,
    name: String,
    datatype: String,
    group: bool,
    default: String,
}

impl ColumnSpec {
    fn field_type(&self) -> FieldType {
        match self.datatype.as_str() {
            "long" | "unsignedLong" => FieldType::Int64,
            "double" => FieldType::Float64,
            "boolean" => FieldType::Bool,
            "dateTime:RFC3339" | "dateTime:RFC3339Nano" => FieldType::Time,
            _ => FieldType::String,
        }
    }

    /// A group-key string column folded into labels
    fn is_label(&self) -> bool {
        self.group && self.field_type() == FieldType::String && !RANGE_COLUMNS.contains(&self.name.as_str())
    }

    fn parse(&self, raw: &str) -> FluxResult<Value> {
        let raw = if raw.is_empty() { self.default.as_str() } else { raw };
        if raw.is_empty() {
            return Ok(Value::Null);
        }

        let invalid = || FluxError::Cell {
            column: self.name.clone(),
            datatype: self.datatype.clone(),
            value: raw.to_string(),
        };

        let value = match self.datatype.as_str() {
            "long" => Value::Int64(raw.parse().map_err(|_| invalid())?),
            "unsignedLong" => {
                let v: u64 = raw.parse().map_err(|_| invalid())?;
                Value::Int64(i64::try_from(v).map_err(|_| invalid())?)
            }
            "double" => Value::Float64(parse_double(raw).ok_or_else(invalid)?),
            "boolean" => Value::Bool(raw.parse().map_err(|_| invalid())?),
            "dateTime:RFC3339" | "dateTime:RFC3339Nano" => {
                let t = DateTime::parse_from_rfc3339(raw).map_err(|_| invalid())?;
                Value::Time(t.with_timezone(&Utc))
            }
            _ => Value::String(raw.to_string()),
        };
        Ok(value)
    }
}

fn parse_double(raw: &str) -> Option<f64> {
    match raw {
        "+Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        _ => raw.parse().ok(),
    }
}

/// Annotation rows collected for the next header
#[derive(Debug, Default)]
struct Annotations {
    datatype: Vec<String>,
    group: Vec<String>,
    default: Vec<String>,
}

impl Annotations {
    fn is_empty(&self) -> bool {
        self.datatype.is_empty() && self.group.is_empty() && self.default.is_empty()
    }

    fn columns(&self, header: &[String]) -> Vec<ColumnSpec> {
        header
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, name)| ColumnSpec {
                index,
                name: name.clone(),
                datatype: self.datatype.get(index).cloned().unwrap_or_default(),
                group: self.group.get(index).map(|g| g == "true").unwrap_or(false),
                default: self.default.get(index).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

/// Frame under construction for one `table`
struct SeriesBuilder {
    block: usize,
    table: String,
    columns: Vec<ColumnSpec>,
    frame: Frame,
    labelled: bool,
}

impl SeriesBuilder {
    fn new(block: usize, table: String, columns: &[ColumnSpec], name: &str) -> Self {
        let columns: Vec<ColumnSpec> = columns
            .iter()
            .filter(|c| !BOOKKEEPING_COLUMNS.contains(&c.name.as_str()))
            .cloned()
            .collect();
        let fields = columns
            .iter()
            .filter(|c| !c.is_label())
            .map(|c| Field::new(c.name.clone(), c.field_type()))
            .collect();
        Self {
            block,
            table,
            columns,
            frame: Frame::new(name).with_fields(fields),
            labelled: false,
        }
    }

    fn push(&mut self, record: &csv::StringRecord) -> FluxResult<()> {
        if !self.labelled {
            self.apply_labels(record)?;
        }
        let mut row = Vec::with_capacity(self.frame.fields.len());
        for column in self.columns.iter().filter(|c| !c.is_label()) {
            row.push(column.parse(record.get(column.index).unwrap_or(""))?);
        }
        self.frame.append_row(row)?;
        Ok(())
    }

    fn apply_labels(&mut self, record: &csv::StringRecord) -> FluxResult<()> {
        let mut labels = Labels::new();
        for column in self.columns.iter().filter(|c| c.is_label()) {
            if let Value::String(v) = column.parse(record.get(column.index).unwrap_or(""))? {
                labels.insert(column.name.clone(), v);
            }
        }
        for field in &mut self.frame.fields {
            if field.name != TIME_COLUMN {
                field.labels = labels.clone();
            }
        }
        self.labelled = true;
        Ok(())
    }
}

/// Convert an annotated CSV response into one frame per series
///
/// At most `row_limit` rows are read across all series; the frame that
/// hits the limit carries the truncation notice.
pub fn read_annotated_csv(body: &str, name: &str, row_limit: usize) -> FluxResult<Vec<Frame>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut frames = Vec::new();
    let mut annotations = Annotations::default();
    let mut columns: Option<Vec<ColumnSpec>> = None;
    let mut current: Option<SeriesBuilder> = None;
    let mut total_rows = 0usize;
    let mut block = 0usize;

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let first = record.get(0).unwrap_or("");
        if first.starts_with('#') {
            if columns.is_some() {
                columns = None;
                annotations = Annotations::default();
            }
            let cells: Vec<String> = record.iter().map(str::to_string).collect();
            match first {
                "#datatype" => annotations.datatype = cells,
                "#group" => annotations.group = cells,
                "#default" => annotations.default = cells,
                _ => {}
            }
            continue;
        }

        let Some(specs) = columns.as_ref() else {
            if annotations.is_empty() {
                return Err(FluxError::MissingHeader { row: line + 1 });
            }
            let header: Vec<String> = record.iter().map(str::to_string).collect();
            columns = Some(annotations.columns(&header));
            block += 1;
            continue;
        };

        if let Some(message) = error_message(specs, &record) {
            return Err(FluxError::Query(message));
        }

        if total_rows >= row_limit {
            let target = current.as_mut().map(|s| &mut s.frame).or_else(|| frames.last_mut());
            if let Some(frame) = target {
                frame.add_notice(row_limit_notice(row_limit));
            }
            break;
        }

        let table = specs
            .iter()
            .find(|c| c.name == "table")
            .and_then(|c| record.get(c.index))
            .unwrap_or("")
            .to_string();

        let same_series = current
            .as_ref()
            .map(|s| s.block == block && s.table == table)
            .unwrap_or(false);
        if !same_series {
            if let Some(done) = current.take() {
                frames.push(done.frame);
            }
            current = Some(SeriesBuilder::new(block, table, specs, name));
        }

        if let Some(series) = current.as_mut() {
            series.push(&record)?;
            total_rows += 1;
        }
    }

    if let Some(done) = current.take() {
        frames.push(done.frame);
    }
    Ok(frames)
}

/// The message of an in-band error table, if this row is one
fn error_message(specs: &[ColumnSpec], record: &csv::StringRecord) -> Option<String> {
    let error = specs.iter().find(|c| c.name == "error")?;
    let is_error_table = specs.len() <= 2 && specs.iter().all(|c| c.name == "error" || c.name == "reference");
    if !is_error_table {
        return None;
    }
    record.get(error.index).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TWO_SERIES: &str = "\
#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,double,string,string
#group,false,false,true,true,false,false,true,true
#default,_result,,,,,,,
,result,table,_start,_stop,_time,_value,_field,_measurement
,,0,2021-01-01T00:00:00Z,2021-01-01T01:00:00Z,2021-01-01T00:00:00Z,1.5,usage,cpu
,,0,2021-01-01T00:00:00Z,2021-01-01T01:00:00Z,2021-01-01T00:01:00Z,,usage,cpu
,,1,2021-01-01T00:00:00Z,2021-01-01T01:00:00Z,2021-01-01T00:00:00Z,7,free,mem
";

    #[test]
    fn test_one_frame_per_table() {
        let frames = read_annotated_csv(TWO_SERIES, "A", 100).unwrap();
        assert_eq!(frames.len(), 2);

        let cpu = &frames[0];
        let names: Vec<_> = cpu.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["_start", "_stop", "_time", "_value"]);
        assert_eq!(cpu.rows(), 2);
        assert_eq!(cpu.fields[3].at(0), Value::Float64(1.5));
        assert_eq!(cpu.fields[3].at(1), Value::Null);
        assert_eq!(cpu.fields[3].labels.get("_field").map(String::as_str), Some("usage"));
        assert_eq!(cpu.fields[3].labels.get("_measurement").map(String::as_str), Some("cpu"));
        assert!(cpu.fields[2].labels.is_empty());
        assert_eq!(
            cpu.fields[2].at(1),
            Value::Time(Utc.with_ymd_and_hms(2021, 1, 1, 0, 1, 0).unwrap())
        );

        assert_eq!(frames[1].fields[3].labels.get("_measurement").map(String::as_str), Some("mem"));
    }

    #[test]
    fn test_row_limit_across_frames() {
        let frames = read_annotated_csv(TWO_SERIES, "A", 2).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].rows(), 2);
        assert_eq!(frames[0].meta.notices.len(), 1);
    }

    #[test]
    fn test_defaults_and_types() {
        let body = "\
#datatype,string,long,dateTime:RFC3339Nano,unsignedLong,boolean,string
#group,false,false,false,false,false,false
#default,_result,,,,true,
,result,table,_time,count,ok,host
,,0,2021-01-01T00:00:00.5Z,3,,a
";
        let frames = read_annotated_csv(body, "A", 10).unwrap();
        let frame = &frames[0];
        assert_eq!(frame.fields[1].at(0), Value::Int64(3));
        assert_eq!(frame.fields[2].at(0), Value::Bool(true));
        assert_eq!(frame.fields[3].at(0), Value::String("a".into()));
        assert_eq!(frame.fields[3].field_type(), FieldType::String);
    }

    #[test]
    fn test_unsigned_out_of_range() {
        let body = "\
#datatype,string,long,unsignedLong
#group,false,false,false
#default,_result,,
,result,table,count
,,0,18446744073709551615
";
        let err = read_annotated_csv(body, "A", 10).unwrap_err();
        assert!(matches!(err, FluxError::Cell { .. }));
    }

    #[test]
    fn test_in_band_error() {
        let body = "\
#datatype,string,string
#group,true,true
#default,,
,error,reference
,\"bucket not found\",
";
        let err = read_annotated_csv(body, "A", 10).unwrap_err();
        assert_eq!(err.to_string(), "bucket not found");
    }

    #[test]
    fn test_empty_body() {
        assert!(read_annotated_csv("", "A", 10).unwrap().is_empty());
    }
}
