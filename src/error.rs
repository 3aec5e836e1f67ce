//! エラー型
//!
//! 入力不正（設定・検出データ）はフレーム処理の前に検出して返す。
//! フレーム単位の信頼度不足や人物単位の有効フレーム不足はエラーではない。

use std::path::PathBuf;
use thiserror::Error;

/// 設定値の検証エラー
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown angle name: {0}")]
    UnknownAngle(String),

    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("frame_rate must be positive, got {0}")]
    InvalidFrameRate(f64),

    #[error("butterworth order must be at least 1")]
    ZeroFilterOrder,

    #[error("butterworth cut-off {cutoff} Hz must be within (0, {nyquist}) Hz")]
    CutoffAboveNyquist { cutoff: f64, nyquist: f64 },

    #[error("gaussian sigma must be positive, got {0}")]
    InvalidSigma(f64),

    #[error("loess window must use at least 2 values, got {0}")]
    LoessWindowTooSmall(usize),

    #[error("median kernel size must be odd and positive, got {0}")]
    InvalidMedianKernel(usize),

    #[error("interp_gap_smaller_than must be at least 1")]
    ZeroGapLength,
}

/// 検出データの形式エラー
#[derive(Debug, Error, PartialEq)]
pub enum DetectionError {
    #[error("frame {frame}, person {person}: {keypoints} keypoints but {scores} scores")]
    ScoreLengthMismatch {
        frame: usize,
        person: usize,
        keypoints: usize,
        scores: usize,
    },

    #[error("frame {frame}, person {person}: expected {expected} keypoints for {model}, got {actual}")]
    KeypointCountMismatch {
        frame: usize,
        person: usize,
        model: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// TRC/MOT ファイルの入出力エラー
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?} line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("table shape mismatch: {0}")]
    Shape(String),
}
