//! 角度ファイル (.mot)

use ndarray::Array2;
use std::fmt::Write as _;
use std::path::Path;

use super::{parse_f64, read_lines, write_atomic, TimeAxis};
use crate::error::ExportError;

const DESCRIPTION: [&str; 2] = [
    "Units are S.I. units (second, meters, Newtons, ...)",
    "If the header above contains a line with 'inDegrees', this indicates whether rotational values are in degrees (yes) or radians (no).",
];

#[derive(Debug, Clone, PartialEq)]
pub struct MotData {
    pub names: Vec<String>,
    pub time: Vec<f64>,
    /// (フレーム, 角度) 度単位
    pub values: Array2<f64>,
    pub in_degrees: bool,
}

impl MotData {
    pub fn frame_count(&self) -> usize {
        self.time.len()
    }
}

pub fn format_mot(names: &[&str], angles: &Array2<f64>, time: &TimeAxis) -> Result<String, ExportError> {
    let (n_rows, n_columns) = angles.dim();
    if n_columns != names.len() {
        return Err(ExportError::Shape(format!(
            "{} angle names for {} angle columns",
            names.len(),
            n_columns
        )));
    }

    let mut out = String::new();
    out.push_str("Coordinates\nversion=1\n");
    let _ = writeln!(out, "nRows={n_rows}");
    let _ = writeln!(out, "nColumns={n_columns}");
    out.push_str("inDegrees=yes\n\n");
    for line in DESCRIPTION {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("\nendheader\n");
    let _ = writeln!(out, "time\t{}", names.join("\t"));

    for (f, row) in angles.outer_iter().enumerate() {
        let _ = write!(out, "{}", time.at(f));
        for v in row {
            let _ = write!(out, "\t{}", v);
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn write_mot(path: &Path, names: &[&str], angles: &Array2<f64>, time: &TimeAxis) -> Result<(), ExportError> {
    let content = format_mot(names, angles, time)?;
    write_atomic(path, &content)
}

pub fn read_mot(path: &Path) -> Result<MotData, ExportError> {
    let lines = read_lines(path)?;
    let parse_err = |line: usize, message: String| ExportError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    let end = lines
        .iter()
        .position(|l| l.trim() == "endheader")
        .ok_or_else(|| parse_err(1, "missing endheader".to_string()))?;
    let in_degrees = lines[..end]
        .iter()
        .any(|l| l.trim().eq_ignore_ascii_case("inDegrees=yes"));

    let header = lines
        .get(end + 1)
        .ok_or_else(|| parse_err(end + 2, "missing column names".to_string()))?;
    let mut columns = header.split('\t').map(|s| s.trim().to_string());
    match columns.next() {
        Some(first) if first == "time" => {}
        other => return Err(parse_err(end + 2, format!("first column must be time, got {:?}", other))),
    }
    let names: Vec<String> = columns.collect();

    let mut time = Vec::new();
    let mut values = Vec::new();
    for (i, line) in lines.iter().enumerate().skip(end + 2) {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != names.len() + 1 {
            return Err(parse_err(i + 1, format!("expected {} columns, got {}", names.len() + 1, fields.len())));
        }
        for (k, field) in fields.iter().enumerate() {
            let v = parse_f64(field).ok_or_else(|| parse_err(i + 1, format!("bad value {:?}", field)))?;
            if k == 0 {
                time.push(v);
            } else {
                values.push(v);
            }
        }
    }

    let values = Array2::from_shape_vec((time.len(), names.len()), values)
        .map_err(|e| ExportError::Shape(e.to_string()))?;
    Ok(MotData {
        names,
        time,
        values,
        in_degrees,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_header_layout() {
        let angles = array![[10.0, -20.5], [11.0, f64::NAN], [12.0, -21.0]];
        let text = format_mot(&["right knee", "trunk"], &angles, &TimeAxis::new(30.0, 0)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            &lines[..5],
            &["Coordinates", "version=1", "nRows=3", "nColumns=2", "inDegrees=yes"]
        );
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], DESCRIPTION[0]);
        assert_eq!(lines[7], DESCRIPTION[1]);
        assert_eq!(lines[8], "");
        assert_eq!(lines[9], "endheader");
        assert_eq!(lines[10], "time\tright knee\ttrunk");
        assert_eq!(lines[11], "0\t10\t-20.5");
        assert_eq!(lines[12].split('\t').nth(2), Some("NaN"));
    }

    #[test]
    fn test_shape_mismatch() {
        let angles = array![[1.0, 2.0]];
        assert!(format_mot(&["only"], &angles, &TimeAxis::new(30.0, 0)).is_err());
    }
}
