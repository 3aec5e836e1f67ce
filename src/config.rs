use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::angles::{find_angle, joint_angle_names, segment_angle_names};
use crate::error::ConfigError;
use crate::pose::PoseModel;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub pose: PoseConfig,
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub angles: AnglesConfig,
    #[serde(default, rename = "post-processing")]
    pub post_processing: PostProcessingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    /// 入力クリップのフレームレート (fps)
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// 時刻列の開始フレーム番号
    #[serde(default)]
    pub start_frame: u64,
}

fn default_frame_rate() -> f64 { 30.0 }

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            start_frame: 0,
        }
    }
}

/// 人物の追跡方法
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// フレーム間の貪欲マッチング
    #[default]
    Sports2d,
    /// 検出器が付けた track_id をそのまま使う
    Rtmlib,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoseConfig {
    #[serde(default)]
    pub pose_model: PoseModel,
    /// これ未満のスコアのキーポイントは無効
    #[serde(default = "default_keypoint_likelihood_threshold")]
    pub keypoint_likelihood_threshold: f64,
    /// 有効キーポイントの平均スコアの下限
    #[serde(default = "default_average_likelihood_threshold")]
    pub average_likelihood_threshold: f64,
    /// 有効キーポイント数の割合の下限
    #[serde(default = "default_keypoint_number_threshold")]
    pub keypoint_number_threshold: f64,
    #[serde(default)]
    pub tracking_mode: TrackingMode,
}

fn default_keypoint_likelihood_threshold() -> f64 { 0.3 }
fn default_average_likelihood_threshold() -> f64 { 0.5 }
fn default_keypoint_number_threshold() -> f64 { 0.3 }

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            pose_model: PoseModel::default(),
            keypoint_likelihood_threshold: default_keypoint_likelihood_threshold(),
            average_likelihood_threshold: default_average_likelihood_threshold(),
            keypoint_number_threshold: default_keypoint_number_threshold(),
            tracking_mode: TrackingMode::default(),
        }
    }
}

/// 単一人物モードで複数検出があった場合の選び方
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SinglePersonPolicy {
    /// 検出器の出力順で最初の人物
    #[default]
    First,
    /// 平均スコアが最も高い人物
    HighestScore,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessConfig {
    #[serde(default = "default_true")]
    pub multiperson: bool,
    #[serde(default)]
    pub single_person_policy: SinglePersonPolicy,
    #[serde(default = "default_true")]
    pub save_pose: bool,
    #[serde(default = "default_true")]
    pub save_angles: bool,
}

fn default_true() -> bool { true }

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            multiperson: true,
            single_person_policy: SinglePersonPolicy::default(),
            save_pose: true,
            save_angles: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnglesConfig {
    #[serde(default = "default_joint_angles")]
    pub joint_angles: Vec<String>,
    #[serde(default = "default_segment_angles")]
    pub segment_angles: Vec<String>,
    /// 足の向きによる左右反転
    #[serde(default = "default_true")]
    pub flip_left_right: bool,
}

fn default_joint_angles() -> Vec<String> {
    joint_angle_names().into_iter().map(String::from).collect()
}

fn default_segment_angles() -> Vec<String> {
    segment_angle_names().into_iter().map(String::from).collect()
}

impl Default for AnglesConfig {
    fn default() -> Self {
        Self {
            joint_angles: default_joint_angles(),
            segment_angles: default_segment_angles(),
            flip_left_right: true,
        }
    }
}

impl AnglesConfig {
    /// 関節角 → セグメント角の順に並べた全角度名
    pub fn all(&self) -> Vec<String> {
        self.joint_angles
            .iter()
            .chain(&self.segment_angles)
            .cloned()
            .collect()
    }
}

/// 長い欠損区間の埋め方
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GapFill {
    /// 前方埋め → 後方埋め
    #[default]
    LastValue,
    Zeros,
    /// 欠損のまま
    Nan,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Butterworth,
    Gaussian,
    Loess,
    Median,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ButterworthConfig {
    /// 往復後の実効次数
    #[serde(default = "default_butterworth_order")]
    pub order: usize,
    /// カットオフ周波数 (Hz)
    #[serde(default = "default_cut_off_frequency")]
    pub cut_off_frequency: f64,
}

fn default_butterworth_order() -> usize { 4 }
fn default_cut_off_frequency() -> f64 { 6.0 }

impl Default for ButterworthConfig {
    fn default() -> Self {
        Self {
            order: default_butterworth_order(),
            cut_off_frequency: default_cut_off_frequency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GaussianConfig {
    #[serde(default = "default_sigma_kernel")]
    pub sigma_kernel: f64,
}

fn default_sigma_kernel() -> f64 { 1.0 }

impl Default for GaussianConfig {
    fn default() -> Self {
        Self { sigma_kernel: default_sigma_kernel() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoessConfig {
    #[serde(default = "default_nb_values_used")]
    pub nb_values_used: usize,
}

fn default_nb_values_used() -> usize { 5 }

impl Default for LoessConfig {
    fn default() -> Self {
        Self { nb_values_used: default_nb_values_used() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MedianConfig {
    #[serde(default = "default_kernel_size")]
    pub kernel_size: usize,
}

fn default_kernel_size() -> usize { 3 }

impl Default for MedianConfig {
    fn default() -> Self {
        Self { kernel_size: default_kernel_size() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostProcessingConfig {
    #[serde(default = "default_true")]
    pub interpolate: bool,
    /// この長さ未満の欠損区間を線形補間する (フレーム数)
    #[serde(default = "default_interp_gap_smaller_than")]
    pub interp_gap_smaller_than: usize,
    #[serde(default)]
    pub fill_large_gaps_with: GapFill,
    #[serde(default = "default_true")]
    pub filter: bool,
    #[serde(default)]
    pub filter_type: FilterType,
    #[serde(default)]
    pub butterworth: ButterworthConfig,
    #[serde(default)]
    pub gaussian: GaussianConfig,
    #[serde(default)]
    pub loess: LoessConfig,
    #[serde(default)]
    pub median: MedianConfig,
}

fn default_interp_gap_smaller_than() -> usize { 10 }

impl Default for PostProcessingConfig {
    fn default() -> Self {
        Self {
            interpolate: true,
            interp_gap_smaller_than: default_interp_gap_smaller_than(),
            fill_large_gaps_with: GapFill::default(),
            filter: true,
            filter_type: FilterType::default(),
            butterworth: ButterworthConfig::default(),
            gaussian: GaussianConfig::default(),
            loess: LoessConfig::default(),
            median: MedianConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// 読み込みに失敗した場合はデフォルト設定を使う
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}, using default config", e);
                Self::default()
            }
        }
    }

    /// フレーム処理を始める前の設定値チェック
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.project.frame_rate > 0.0) {
            return Err(ConfigError::InvalidFrameRate(self.project.frame_rate));
        }

        let thresholds = [
            ("keypoint_likelihood_threshold", self.pose.keypoint_likelihood_threshold),
            ("average_likelihood_threshold", self.pose.average_likelihood_threshold),
            ("keypoint_number_threshold", self.pose.keypoint_number_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        for name in self.angles.all() {
            if find_angle(&name).is_none() {
                return Err(ConfigError::UnknownAngle(name));
            }
        }

        let pp = &self.post_processing;
        if pp.interpolate && pp.interp_gap_smaller_than == 0 {
            return Err(ConfigError::ZeroGapLength);
        }
        if pp.filter {
            match pp.filter_type {
                FilterType::Butterworth => {
                    if pp.butterworth.order == 0 {
                        return Err(ConfigError::ZeroFilterOrder);
                    }
                    let nyquist = self.project.frame_rate / 2.0;
                    let cutoff = pp.butterworth.cut_off_frequency;
                    if !(cutoff > 0.0 && cutoff < nyquist) {
                        return Err(ConfigError::CutoffAboveNyquist { cutoff, nyquist });
                    }
                }
                FilterType::Gaussian => {
                    if !(pp.gaussian.sigma_kernel > 0.0) {
                        return Err(ConfigError::InvalidSigma(pp.gaussian.sigma_kernel));
                    }
                }
                FilterType::Loess => {
                    if pp.loess.nb_values_used < 2 {
                        return Err(ConfigError::LoessWindowTooSmall(pp.loess.nb_values_used));
                    }
                }
                FilterType::Median => {
                    let k = pp.median.kernel_size;
                    if k == 0 || k % 2 == 0 {
                        return Err(ConfigError::InvalidMedianKernel(k));
                    }
                }
            }
        }
        Ok(())
    }
}
