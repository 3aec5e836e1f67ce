pub mod mot;
pub mod trc;

pub use mot::{read_mot, write_mot, MotData};
pub use trc::{read_trc, write_trc, TrcData};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ExportError;
use crate::postprocess::ProcessedTrack;

/// 時刻列 `(start_frame + i) / frame_rate`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAxis {
    pub frame_rate: f64,
    pub start_frame: u64,
}

impl TimeAxis {
    pub fn new(frame_rate: f64, start_frame: u64) -> Self {
        Self {
            frame_rate,
            start_frame,
        }
    }

    pub fn at(&self, frame: usize) -> f64 {
        (self.start_frame + frame as u64) as f64 / self.frame_rate
    }
}

/// 一時ファイルに全体を書いてからリネームする
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<(), ExportError> {
    let write_err = |source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, content).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        write_err(e)
    })
}

pub(crate) fn read_lines(path: &Path) -> Result<Vec<String>, ExportError> {
    let text = fs::read_to_string(path).map_err(|source| ExportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text.lines().map(|l| l.trim_end_matches('\r').to_string()).collect())
}

/// 数値セル。`NaN` や空欄は NaN として読む。
pub(crate) fn parse_f64(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    field.parse().ok()
}

/// 人物ごとのTRC/MOTファイル名
pub fn trc_file_name(stem: &str, person: usize) -> String {
    format!("{stem}_px_person{person:02}.trc")
}

pub fn mot_file_name(stem: &str, person: usize) -> String {
    format!("{stem}_angles_person{person:02}.mot")
}

/// 後処理済みの人物を出力ディレクトリに書き出す
pub struct Exporter {
    output_dir: PathBuf,
    stem: String,
    time: TimeAxis,
    save_pose: bool,
    save_angles: bool,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>, stem: impl Into<String>, time: TimeAxis) -> Self {
        Self {
            output_dir: output_dir.into(),
            stem: stem.into(),
            time,
            save_pose: true,
            save_angles: true,
        }
    }

    pub fn from_config(config: &Config, output_dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        let mut exporter = Self::new(
            output_dir,
            stem,
            TimeAxis::new(config.project.frame_rate, config.project.start_frame),
        );
        exporter.save_pose = config.process.save_pose;
        exporter.save_angles = config.process.save_angles;
        exporter
    }

    /// 1人物分。書いたファイルのパスを返す。
    pub fn write_person(
        &self,
        track: &ProcessedTrack,
        keypoint_names: &[&str],
        angle_names: &[&str],
    ) -> Result<Vec<PathBuf>, ExportError> {
        let mut written = Vec::new();
        if let (true, Some(trajectory)) = (self.save_pose, &track.trajectory) {
            let path = self.output_dir.join(trc_file_name(&self.stem, track.id));
            write_trc(&path, keypoint_names, trajectory, &self.time)?;
            info!("person #{}: keypoints saved to {}", track.id, path.display());
            written.push(path);
        }
        if let (true, Some(angles)) = (self.save_angles, &track.angles) {
            if !angle_names.is_empty() {
                let path = self.output_dir.join(mot_file_name(&self.stem, track.id));
                write_mot(&path, angle_names, angles, &self.time)?;
                info!("person #{}: angles saved to {}", track.id, path.display());
                written.push(path);
            }
        }
        Ok(written)
    }

    /// 全人物を書き出す。出力ディレクトリがなければ作る。
    pub fn write_all(
        &self,
        tracks: &[ProcessedTrack],
        keypoint_names: &[&str],
        angle_names: &[&str],
    ) -> Result<Vec<PathBuf>, ExportError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| ExportError::Write {
            path: self.output_dir.clone(),
            source,
        })?;
        let mut written = Vec::new();
        for track in tracks {
            written.extend(self.write_person(track, keypoint_names, angle_names)?);
        }
        if written.is_empty() {
            warn!("no person with enough valid frames, nothing written");
        }
        Ok(written)
    }
}
