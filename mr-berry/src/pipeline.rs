//! 并发编排: 逐类别建索引, 按分组派发任务, 汇总清单.

use crate::consts::{DEFAULT_CROP_SIZE, MANIFEST_FILE_NAME, SLICE_EXT};
use crate::error::PreprocessError;
use crate::index::{AuditWindow, GroupingIndex};
use crate::manifest::Manifest;
use crate::reader::SliceRead;
use crate::volume::{self, AssembleOptions};
use crate::writer;
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use threadpool::ThreadPool;

/// 预处理运行配置.
#[derive(Clone, Debug)]
pub struct PreprocessConfig {
    /// 参与处理的类别标签.
    pub classes: Vec<String>,

    /// 切片源根目录, 其下每个类别一个子目录.
    pub input_root: PathBuf,

    /// 产物输出根目录.
    pub output_root: PathBuf,

    /// 增广资格判定的裁剪尺寸.
    pub crop_size: usize,

    /// 是否启用奇偶抽样增广.
    pub sample_images: bool,

    /// worker 线程数.
    pub workers: usize,

    /// 切片文件扩展名 (不带点).
    pub slice_ext: String,
}

impl PreprocessConfig {
    /// 以默认裁剪尺寸、硬件并行度和 `.dcm` 扩展名创建配置.
    /// 增广默认关闭.
    pub fn new<I, S, P, Q>(classes: I, input_root: P, output_root: Q) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            input_root: input_root.into(),
            output_root: output_root.into(),
            crop_size: DEFAULT_CROP_SIZE,
            sample_images: false,
            workers: default_workers(),
            slice_ext: SLICE_EXT.to_owned(),
        }
    }
}

/// 可并行核心数.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 一次运行的汇总.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// 成功组装并写盘的分组数.
    pub groups_ok: usize,

    /// 失败的分组数. 失败已带上下文记入日志, 不产出产物.
    pub groups_failed: usize,

    /// 写出的产物个数.
    pub artifacts: usize,
}

/// 切片到体数据的预处理流水线.
///
/// 每个类别先建分组索引并落审计 CSV, 然后每个分组一个任务投给
/// 有界线程池, 类别内全部任务完成后才进入下一类别. 类别标签与
/// 文件列表都随任务闭包传递, worker 不读任何全局状态; 唯一的
/// 跨任务共享结构是互斥锁保护的清单.
pub struct Pipeline<R: SliceRead + 'static> {
    config: PreprocessConfig,
    reader: Arc<R>,
    manifest: Arc<Manifest>,
}

impl<R: SliceRead + 'static> Pipeline<R> {
    /// 创建流水线.
    pub fn new(config: PreprocessConfig, reader: R) -> Self {
        Self {
            config,
            reader: Arc::new(reader),
            manifest: Arc::new(Manifest::new()),
        }
    }

    /// 运行配置 (检视用).
    #[inline]
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// 共享清单 (检视用).
    #[inline]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// 运行: 建目录, 逐类别并行组装, 最后清单落盘.
    ///
    /// 单个分组的失败只记日志并计数, 不影响兄弟任务; 只有配置级
    /// 错误 (输出目录建不了、类别目录读不了、审计或清单写不出)
    /// 才让整次运行失败.
    pub fn run(&self) -> Result<RunSummary, PreprocessError> {
        self.init_dirs()?;

        let ok = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let artifacts = Arc::new(AtomicUsize::new(0));
        let opts = AssembleOptions {
            sample_images: self.config.sample_images,
            crop_size: self.config.crop_size,
        };
        let workers = self.config.workers.max(1);

        for class in &self.config.classes {
            let index = GroupingIndex::build(&self.config.input_root, class, &self.config.slice_ext)?;
            let audit = self.config.output_root.join(format!("{class}.csv"));
            index.dump_audit_csv(&audit, AuditWindow::default())?;

            info!(
                "class {class}: dispatching {} groups over {workers} workers",
                index.len()
            );

            let pool = ThreadPool::new(workers);
            let class_dir = self.config.output_root.join(class);
            for (key, files) in index.into_groups() {
                let reader = Arc::clone(&self.reader);
                let manifest = Arc::clone(&self.manifest);
                let class = class.clone();
                let class_dir = class_dir.clone();
                let ok = Arc::clone(&ok);
                let failed = Arc::clone(&failed);
                let artifacts = Arc::clone(&artifacts);

                pool.execute(move || {
                    match process_group(&*reader, &class, &class_dir, &key, &files, opts, &manifest)
                    {
                        Ok(written) => {
                            ok.fetch_add(1, Ordering::Relaxed);
                            artifacts.fetch_add(written, Ordering::Relaxed);
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            error!("class {class}, group {key}: {e}");
                        }
                    }
                });
            }
            pool.join();
        }

        let manifest_path = self.config.output_root.join(MANIFEST_FILE_NAME);
        let rows = self.manifest.flush_csv(&manifest_path)?;

        let summary = RunSummary {
            groups_ok: ok.load(Ordering::Relaxed),
            groups_failed: failed.load(Ordering::Relaxed),
            artifacts: artifacts.load(Ordering::Relaxed),
        };
        info!(
            "preprocess finished: {} groups ok, {} failed, {} artifacts, {rows} manifest rows",
            summary.groups_ok, summary.groups_failed, summary.artifacts
        );
        Ok(summary)
    }

    fn init_dirs(&self) -> Result<(), PreprocessError> {
        create_missing_dir(&self.config.output_root)?;
        for class in &self.config.classes {
            create_missing_dir(&self.config.output_root.join(class))?;
        }
        Ok(())
    }
}

/// 单个分组的完整处理: 组装, 写盘, 登记.
fn process_group<R: SliceRead + ?Sized>(
    reader: &R,
    class: &str,
    class_dir: &Path,
    key: &str,
    files: &[PathBuf],
    opts: AssembleOptions,
    manifest: &Manifest,
) -> Result<usize, PreprocessError> {
    info!("{class}/{key}: assembling {} slices", files.len());
    let group = volume::assemble(reader, class, key, files, opts)?;
    let written = writer::save_group(group, class_dir, key, manifest)?;
    Ok(written.len())
}

/// 目录不存在时逐级创建.
fn create_missing_dir(path: &Path) -> Result<(), PreprocessError> {
    if !path.exists() {
        info!("creating directory {}", path.display());
        fs::create_dir_all(path).map_err(|source| PreprocessError::CreateDir {
            path: path.to_owned(),
            source,
        })?;
    }
    Ok(())
}
