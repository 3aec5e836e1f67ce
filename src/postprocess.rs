//! クリップ全体を集計した後の2パス目
//!
//! 人物ごと、座標系列と角度系列ごとに独立して
//! 除外判定 → 補間 → 長い欠損の処理 → フィルタ の順で処理する。

use ndarray::{Array1, Array2, Axis};
use tracing::{debug, info};

use crate::config::{Config, GapFill};
use crate::filter::{self, fill_gaps, filter_runs, interpolate_gaps, Filter1d};
use crate::series::{valid_rows, PersonTrack};

/// この数未満の有効フレームしかない系列は出力しない
pub const MIN_VALID_FRAMES: usize = 5;

/// メートル単位・Y上向きのキーポイント軌跡 (フレーム, キーポイント)
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
}

impl Trajectory {
    /// 画素座標 → x/1000, −y/1000
    pub fn from_pixels(x: &Array2<f64>, y: &Array2<f64>) -> Self {
        Self {
            x: x.mapv(|v| v / 1000.0),
            y: y.mapv(|v| -v / 1000.0),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.x.nrows()
    }
}

/// 後処理済みの1人物。除外された系列は None。
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedTrack {
    pub id: usize,
    pub trajectory: Option<Trajectory>,
    pub angles: Option<Array2<f64>>,
}

impl ProcessedTrack {
    pub fn is_empty(&self) -> bool {
        self.trajectory.is_none() && self.angles.is_none()
    }
}

pub struct PostProcessor {
    interpolate: bool,
    max_gap: usize,
    fill: GapFill,
    filter: Option<Box<dyn Filter1d>>,
    parallel: bool,
}

impl PostProcessor {
    pub fn new(interpolate: bool, max_gap: usize, fill: GapFill, filter: Option<Box<dyn Filter1d>>) -> Self {
        Self {
            interpolate,
            max_gap,
            fill,
            filter,
            parallel: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let pp = &config.post_processing;
        Self::new(
            pp.interpolate,
            pp.interp_gap_smaller_than,
            pp.fill_large_gaps_with,
            filter::from_config(pp, config.project.frame_rate),
        )
    }

    /// 人物ごとのスレッド並列を切り替える（結果は同じ）
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// 1列分: 補間 → 欠損処理 → フィルタ
    ///
    /// 長い欠損の埋め方は補間が有効なときだけ適用する。
    pub fn process_column(&self, column: &mut [f64]) {
        if self.interpolate {
            interpolate_gaps(column, self.max_gap);
            fill_gaps(column, self.fill);
        }
        if let Some(f) = &self.filter {
            filter_runs(f.as_ref(), column);
        }
    }

    pub fn process_table(&self, table: &mut Array2<f64>) {
        for mut col in table.axis_iter_mut(Axis(1)) {
            let mut values = col.to_vec();
            self.process_column(&mut values);
            col.assign(&Array1::from(values));
        }
    }

    pub fn process_track(&self, track: &PersonTrack) -> ProcessedTrack {
        let trajectory = if track.valid_pose_frames() < MIN_VALID_FRAMES {
            info!(
                "person #{}: less than {} valid frames, keypoints not saved",
                track.id, MIN_VALID_FRAMES
            );
            None
        } else {
            let mut t = Trajectory::from_pixels(&track.x, &track.y);
            self.process_table(&mut t.x);
            self.process_table(&mut t.y);
            Some(t)
        };

        let angles = if valid_rows(&track.angles) < MIN_VALID_FRAMES {
            if track.angles.ncols() > 0 {
                info!(
                    "person #{}: less than {} valid frames, angles not saved",
                    track.id, MIN_VALID_FRAMES
                );
            }
            None
        } else {
            let mut a = track.angles.clone();
            self.process_table(&mut a);
            Some(a)
        };

        if let Some(f) = &self.filter {
            debug!("person #{}: filtered with {}", track.id, f.describe());
        }
        ProcessedTrack {
            id: track.id,
            trajectory,
            angles,
        }
    }

    /// 全人物を処理。出力は入力と同じ順。
    pub fn process(&self, tracks: &[PersonTrack]) -> Vec<ProcessedTrack> {
        if !self.parallel || tracks.len() < 2 {
            return tracks.iter().map(|t| self.process_track(t)).collect();
        }
        std::thread::scope(|s| {
            let handles: Vec<_> = tracks
                .iter()
                .map(|t| s.spawn(move || self.process_track(t)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }
}
