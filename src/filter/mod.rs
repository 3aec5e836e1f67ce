pub mod butterworth;
pub mod gaussian;
pub mod interpolate;
pub mod loess;
pub mod median;

pub use butterworth::Butterworth;
pub use gaussian::Gaussian;
pub use interpolate::{fill_gaps, interpolate_gaps};
pub use loess::Loess;
pub use median::Median;

use crate::config::{FilterType, PostProcessingConfig};

/// 1列の時系列フィルタ
///
/// 入力は欠損を含まない連続区間。出力は同じ長さ。
pub trait Filter1d: Send + Sync {
    fn filter_run(&self, run: &[f64]) -> Vec<f64>;

    /// ログ用の説明
    fn describe(&self) -> String;
}

/// 有効値（NaN以外）の連続区間 [start, end) の一覧
pub fn valid_runs(column: &[f64]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, v) in column.iter().enumerate() {
        match (v.is_nan(), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                runs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, column.len()));
    }
    runs
}

/// 欠損で区切られた区間ごとにフィルタを適用（NaNは隣に漏れない）
pub fn filter_runs(filter: &dyn Filter1d, column: &mut [f64]) {
    for (start, end) in valid_runs(column) {
        let smoothed = filter.filter_run(&column[start..end]);
        column[start..end].copy_from_slice(&smoothed);
    }
}

/// 設定からフィルタを作る。`filter = false` なら None。
pub fn from_config(config: &PostProcessingConfig, frame_rate: f64) -> Option<Box<dyn Filter1d>> {
    if !config.filter {
        return None;
    }
    let filter: Box<dyn Filter1d> = match config.filter_type {
        FilterType::Butterworth => Box::new(Butterworth::from_config(&config.butterworth, frame_rate)),
        FilterType::Gaussian => Box::new(Gaussian::from_config(&config.gaussian)),
        FilterType::Loess => Box::new(Loess::from_config(&config.loess)),
        FilterType::Median => Box::new(Median::from_config(&config.median)),
    };
    Some(filter)
}
