//! マーカー軌跡ファイル (.trc)
//!
//! タブ区切り。5行のヘッダの後、1フレーム1行で
//! `Frame#  Time  X1 Y1 Z1  X2 Y2 Z2 ...` を書く。2D出力なので Z は 0。

use ndarray::Array2;
use std::fmt::Write as _;
use std::path::Path;

use super::{parse_f64, read_lines, write_atomic, TimeAxis};
use crate::error::ExportError;
use crate::postprocess::Trajectory;

/// 読み込んだTRCファイルの内容
#[derive(Debug, Clone, PartialEq)]
pub struct TrcData {
    pub frame_rate: f64,
    pub marker_names: Vec<String>,
    /// 1始まりのフレーム番号
    pub frames: Vec<usize>,
    pub time: Vec<f64>,
    pub x: Array2<f64>,
    pub y: Array2<f64>,
    pub z: Array2<f64>,
}

impl TrcData {
    pub fn frame_count(&self) -> usize {
        self.time.len()
    }
}

/// TRCファイルの全文を作る
pub fn format_trc(path: &Path, names: &[&str], trajectory: &Trajectory, time: &TimeAxis) -> Result<String, ExportError> {
    let (n_frames, n_markers) = trajectory.x.dim();
    if n_markers != names.len() || trajectory.y.dim() != (n_frames, n_markers) {
        return Err(ExportError::Shape(format!(
            "{} marker names for a {}x{} trajectory",
            names.len(),
            n_frames,
            n_markers
        )));
    }

    let mut out = String::new();
    let rate = time.frame_rate;
    // String への書き込みは失敗しない
    let _ = writeln!(out, "PathFileType\t4\t(X/Y/Z)\t{}", path.display());
    let _ = writeln!(
        out,
        "DataRate\tCameraRate\tNumFrames\tNumMarkers\tUnits\tOrigDataRate\tOrigDataStartFrame\tOrigNumFrames"
    );
    let _ = writeln!(
        out,
        "{rate}\t{rate}\t{n_frames}\t{n_markers}\tm\t{rate}\t{}\t{n_frames}",
        time.start_frame
    );
    let _ = writeln!(out, "Frame#\tTime\t{}\t\t", names.join("\t\t\t"));
    let sub: Vec<String> = (1..=n_markers).map(|i| format!("X{i}\tY{i}\tZ{i}")).collect();
    let _ = writeln!(out, "\t\t{}", sub.join("\t"));

    for f in 0..n_frames {
        let _ = write!(out, "{}\t{}", f + 1, time.at(f));
        for m in 0..n_markers {
            let _ = write!(out, "\t{}\t{}\t0", trajectory.x[[f, m]], trajectory.y[[f, m]]);
        }
        out.push('\n');
    }
    Ok(out)
}

/// TRCファイルを書き出す（全体を一度に書き、途中状態のファイルは残さない）
pub fn write_trc(path: &Path, names: &[&str], trajectory: &Trajectory, time: &TimeAxis) -> Result<(), ExportError> {
    let content = format_trc(path, names, trajectory, time)?;
    write_atomic(path, &content)
}

pub fn read_trc(path: &Path) -> Result<TrcData, ExportError> {
    let lines = read_lines(path)?;
    let parse_err = |line: usize, message: String| ExportError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    if lines.len() < 5 || !lines[0].starts_with("PathFileType") {
        return Err(parse_err(1, "missing TRC header".to_string()));
    }
    let values: Vec<&str> = lines[2].split('\t').collect();
    if values.len() < 4 {
        return Err(parse_err(3, "header value row too short".to_string()));
    }
    let frame_rate = parse_f64(values[0]).ok_or_else(|| parse_err(3, format!("bad DataRate {:?}", values[0])))?;
    let n_markers: usize = values[3]
        .trim()
        .parse()
        .map_err(|_| parse_err(3, format!("bad NumMarkers {:?}", values[3])))?;

    let marker_names: Vec<String> = lines[3]
        .split('\t')
        .skip(2)
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .collect();
    if marker_names.len() != n_markers {
        return Err(parse_err(
            4,
            format!("{} marker names, NumMarkers is {}", marker_names.len(), n_markers),
        ));
    }

    let mut frames = Vec::new();
    let mut time = Vec::new();
    let mut xyz = [Vec::new(), Vec::new(), Vec::new()];
    for (i, line) in lines.iter().enumerate().skip(5) {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 + 3 * n_markers {
            return Err(parse_err(i + 1, format!("expected {} columns, got {}", 2 + 3 * n_markers, fields.len())));
        }
        let frame = fields[0]
            .trim()
            .parse()
            .map_err(|_| parse_err(i + 1, format!("bad frame number {:?}", fields[0])))?;
        frames.push(frame);
        time.push(parse_f64(fields[1]).ok_or_else(|| parse_err(i + 1, format!("bad time {:?}", fields[1])))?);
        for (k, field) in fields[2..2 + 3 * n_markers].iter().enumerate() {
            let v = parse_f64(field).ok_or_else(|| parse_err(i + 1, format!("bad value {:?}", field)))?;
            xyz[k % 3].push(v);
        }
    }

    let n_frames = time.len();
    let [x, y, z] = xyz;
    let shape = |v: Vec<f64>| {
        Array2::from_shape_vec((n_frames, n_markers), v).map_err(|e| ExportError::Shape(e.to_string()))
    };
    Ok(TrcData {
        frame_rate,
        marker_names,
        frames,
        time,
        x: shape(x)?,
        y: shape(y)?,
        z: shape(z)?,
    })
}
