use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use kinetrack::angles::ANGLE_CATALOGUE;
use kinetrack::config::Config;
use kinetrack::export::{read_mot, read_trc};
use kinetrack::pipeline::run_clip;
use kinetrack::source::{is_json_lines, DetectionClip, FrameReader};

/// `--config` 省略時に探す設定ファイル
const DEFAULT_CONFIG_PATH: &str = "kinetrack.toml";

/// 読み込みスレッドが先行できるフレーム数
const READ_AHEAD_FRAMES: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "kinetrack", version = env!("GIT_VERSION"), about = "2D pose keypoints to TRC/MOT files")]
struct Args {
    /// ログレベル (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 検出結果を処理して人物ごとの TRC/MOT を書き出す
    Process {
        /// 設定ファイル (TOML)。省略時は ./kinetrack.toml、読めなければデフォルト設定
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// 検出結果 (.json または .jsonl)
        #[arg(short, long, value_name = "FILE")]
        detections: PathBuf,

        /// 出力ディレクトリ
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// 出力ファイル名の接頭辞。省略時は検出ファイル名
        #[arg(long)]
        stem: Option<String>,
    },
    /// TRC / MOT ファイルの概要を表示
    Inspect {
        file: PathBuf,
    },
    /// 角度カタログを表示
    Angles,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let parsed = args.log_level.parse::<tracing_subscriber::filter::LevelFilter>();
    let level = parsed
        .as_ref()
        .copied()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
    if parsed.is_err() {
        warn!("unknown log level {:?}, using info", args.log_level);
    }

    match args.command {
        Command::Process {
            config,
            detections,
            output,
            stem,
        } => process(config.as_deref(), &detections, &output, stem),
        Command::Inspect { file } => inspect(&file),
        Command::Angles => {
            list_angles();
            Ok(())
        }
    }
}

fn process(config_path: Option<&Path>, detections: &Path, output: &Path, stem: Option<String>) -> Result<()> {
    info!("kinetrack {}", env!("GIT_VERSION"));
    let mut config = match config_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(DEFAULT_CONFIG_PATH),
    };
    let stem = stem.unwrap_or_else(|| {
        detections
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip".to_string())
    });

    let summary = if is_json_lines(detections) {
        info!("streaming detections from {}", detections.display());
        log_config(&config);
        let reader = FrameReader::start(detections, READ_AHEAD_FRAMES)?;
        let frames = reader.map(|f| f.context("failed to read detections"));
        run_clip(&config, frames, output, &stem)?
    } else {
        let clip = DetectionClip::load(detections)?;
        if let Some(rate) = clip.frame_rate {
            if rate != config.project.frame_rate {
                info!("frame rate {} taken from detections", rate);
                config.project.frame_rate = rate;
            }
        }
        log_config(&config);
        clip.validate(config.pose.pose_model.skeleton())?;
        let frames = clip.frames.into_iter().map(Ok);
        run_clip(&config, frames, output, &stem)?
    };

    info!(
        "{} frames, {} person(s), {} file(s) written to {}",
        summary.frames,
        summary.persons,
        summary.written.len(),
        output.display()
    );
    Ok(())
}

fn log_config(config: &Config) {
    let pp = &config.post_processing;
    info!(
        "model {}, {:?} tracking, multiperson {}, {} fps",
        config.pose.pose_model.name(),
        config.pose.tracking_mode,
        config.process.multiperson,
        config.project.frame_rate
    );
    info!(
        "thresholds: keypoint {}, average {}, number {}",
        config.pose.keypoint_likelihood_threshold,
        config.pose.average_likelihood_threshold,
        config.pose.keypoint_number_threshold
    );
    info!(
        "post-processing: interpolate {} (gaps < {}), fill {:?}, filter {} ({:?})",
        pp.interpolate, pp.interp_gap_smaller_than, pp.fill_large_gaps_with, pp.filter, pp.filter_type
    );
}

fn value_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn format_range(range: Option<(f64, f64)>) -> String {
    match range {
        Some((lo, hi)) => format!("[{:.4}, {:.4}]", lo, hi),
        None => "no valid values".to_string(),
    }
}

fn inspect(path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("trc") => {
            let trc = read_trc(path)?;
            println!("{}: {} frames at {} Hz, {} markers", path.display(), trc.frame_count(), trc.frame_rate, trc.marker_names.len());
            for (i, name) in trc.marker_names.iter().enumerate() {
                println!(
                    "  {:<12} X {}  Y {}",
                    name,
                    format_range(value_range(trc.x.column(i).iter().copied())),
                    format_range(value_range(trc.y.column(i).iter().copied()))
                );
            }
        }
        Some("mot") => {
            let mot = read_mot(path)?;
            if !mot.in_degrees {
                warn!("{} is not in degrees", path.display());
            }
            println!("{}: {} frames, {} angles", path.display(), mot.frame_count(), mot.names.len());
            for (i, name) in mot.names.iter().enumerate() {
                println!("  {:<16} {}", name, format_range(value_range(mot.values.column(i).iter().copied())));
            }
        }
        _ => bail!("unsupported file type: {} (expected .trc or .mot)", path.display()),
    }
    Ok(())
}

fn list_angles() {
    println!("{:<16} {:<8} {:>8} {:>6}  keypoints", "name", "kind", "offset", "scale");
    for spec in ANGLE_CATALOGUE.iter() {
        println!(
            "{:<16} {:<8} {:>8} {:>6}  {}",
            spec.name,
            format!("{:?}", spec.kind).to_lowercase(),
            spec.offset,
            spec.scale,
            spec.keypoints.join(", ")
        );
    }
}
