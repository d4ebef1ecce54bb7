//! 产物-设备族共享清单.

use crate::device::DeviceFamily;
use crate::error::PreprocessError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 产物路径到设备族的共享清单.
///
/// 所有 worker 并发登记, 每次插入都由互斥锁保护; 这是对
/// "共享可变清单" 唯一允许的并发纪律, 无锁插入是数据竞争.
/// 整个运行只在所有类别处理完之后落盘一次.
#[derive(Debug, Default)]
pub struct Manifest {
    entries: Mutex<BTreeMap<PathBuf, DeviceFamily>>,
}

impl Manifest {
    /// 空清单.
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个产物.
    pub fn record(&self, artifact: &Path, device: DeviceFamily) {
        self.entries
            .lock()
            .unwrap()
            .insert(artifact.to_owned(), device);
    }

    /// 撤销登记. 产物写盘失败后使用, 保证清单里没有指向
    /// 不存在文件的行.
    pub fn forget(&self, artifact: &Path) {
        self.entries.lock().unwrap().remove(artifact);
    }

    /// 已登记的产物条数.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// 是否没有任何登记.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 某个产物登记的设备族.
    pub fn device_of(&self, artifact: &Path) -> Option<DeviceFamily> {
        self.entries.lock().unwrap().get(artifact).cloned()
    }

    /// 把清单写入 `dest`, 表头 `filename,manufacturer,scanner`,
    /// 每个产物一行. 行按产物路径排序, 与 worker 完成次序无关.
    /// 返回写出的行数.
    pub fn flush_csv(&self, dest: &Path) -> Result<usize, PreprocessError> {
        let werr = |source: csv::Error| PreprocessError::WriteCsv {
            path: dest.to_owned(),
            source,
        };

        let mut writer = csv::Writer::from_path(dest).map_err(werr)?;
        writer
            .write_record(["filename", "manufacturer", "scanner"])
            .map_err(werr)?;

        let entries = self.entries.lock().unwrap();
        for (path, device) in entries.iter() {
            let filename = path.display().to_string();
            writer
                .write_record([
                    filename.as_str(),
                    device.manufacturer.as_str(),
                    device.scanner.as_str(),
                ])
                .map_err(werr)?;
        }
        writer.flush().map_err(|source| werr(source.into()))?;

        Ok(entries.len())
    }
}
