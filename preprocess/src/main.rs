//! 预处理入口: 从环境变量读取配置, 运行切片到体数据的流水线.
//!
//! 识别的环境变量:
//!
//! - `MR_CLASSES` (必需): 逗号分隔的类别标签.
//! - `MR_INPUT_DCM_DIR`: 切片源根目录, 默认 `$HOME/dataset/dcm`.
//! - `MR_OUTPUT_DIR`: 输出根目录, 默认 `$HOME/dataset/preprocess`.
//! - `MR_CROP_SIZE`: 增广资格判定的裁剪尺寸, 默认 128.
//! - `MR_SAMPLE_IMAGES`: 置 `1` 或 `true` 开启奇偶抽样增广.
//! - `MR_WORKERS`: worker 线程数, 默认硬件并行度.

use log::{error, info};
use mr_berry::{DicomSliceReader, Pipeline, PreprocessConfig};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

/// 1. 若环境变量 `var` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/<leaf>`.
fn dir_from_env_or_home(var: &str, leaf: &str) -> PathBuf {
    match env::var(var) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push("dataset");
            path.push(leaf);
            path
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &str) -> Result<Option<T>, String> {
    match env::var(var) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .map(Some)
            .map_err(|_| format!("invalid {var} value `{raw}`")),
        _ => Ok(None),
    }
}

fn config_from_env() -> Result<PreprocessConfig, String> {
    let classes: Vec<String> = env::var("MR_CLASSES")
        .map_err(|_| "MR_CLASSES is not set; provide a comma-separated class list".to_owned())?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    if classes.is_empty() {
        return Err("MR_CLASSES does not contain any class label".to_owned());
    }

    let mut config = PreprocessConfig::new(
        classes,
        dir_from_env_or_home("MR_INPUT_DCM_DIR", "dcm"),
        dir_from_env_or_home("MR_OUTPUT_DIR", "preprocess"),
    );
    if let Some(crop) = parse_env::<usize>("MR_CROP_SIZE")? {
        config.crop_size = crop;
    }
    if let Some(workers) = parse_env::<usize>("MR_WORKERS")? {
        config.workers = workers;
    }
    config.sample_images = matches!(
        env::var("MR_SAMPLE_IMAGES").as_deref(),
        Ok("1") | Ok("true")
    );

    if !config.input_root.is_dir() {
        return Err(format!(
            "input root `{}` is not a directory",
            config.input_root.display()
        ));
    }
    Ok(config)
}

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
        .unwrap();

    let config = match config_from_env() {
        Ok(config) => config,
        Err(msg) => {
            error!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "preprocessing classes {:?} from {} into {}",
        config.classes,
        config.input_root.display(),
        config.output_root.display()
    );

    let pipeline = Pipeline::new(config, DicomSliceReader);
    match pipeline.run() {
        Ok(summary) => {
            info!(
                "{} groups ok, {} failed, {} artifacts written",
                summary.groups_ok, summary.groups_failed, summary.artifacts
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("preprocess run failed: {e}");
            ExitCode::FAILURE
        }
    }
}
