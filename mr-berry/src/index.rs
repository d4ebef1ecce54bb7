//! 分组索引: 类别目录扫描与审计持久化.

use crate::consts::{AUDIT_WINDOW_KEEP, AUDIT_WINDOW_SKIP};
use crate::error::PreprocessError;
use crate::key::grouping_key;
use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 一个类别下, 分组键到有序切片路径列表的映射.
///
/// 键序确定; 每个列表内部按文件名字典序排列, 这同时也是切片在
/// 体数据中的堆叠次序. 审计落盘只输出列表的窗口投影
/// ([`AuditWindow`]), 内存中的列表永远保持完整.
#[derive(Debug, Default)]
pub struct GroupingIndex {
    groups: BTreeMap<String, Vec<PathBuf>>,
}

impl GroupingIndex {
    /// 扫描 `<input_root>/<class>` 下所有 `.{ext}` 文件并建立索引.
    ///
    /// 文件名先整体按字典序排序再逐个提取分组键, 保证切片次序
    /// 确定. 提取不出键的文件名记警告并跳过, 不中断扫描;
    /// 目录本身不可读才算失败.
    pub fn build(input_root: &Path, class: &str, ext: &str) -> Result<Self, PreprocessError> {
        let dir = input_root.join(class);
        let entries = fs::read_dir(&dir).map_err(|source| PreprocessError::ListClassDir {
            path: dir.clone(),
            source,
        })?;

        let suffix = format!(".{ext}");
        let names = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .sorted();

        let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        let mut skipped = 0usize;
        for name in names {
            if !name.ends_with(&suffix) {
                continue;
            }
            match grouping_key(&name) {
                Some(key) => groups.entry(key).or_default().push(dir.join(&name)),
                None => {
                    warn!("class {class}: cannot derive grouping key from `{name}`, skipping");
                    skipped += 1;
                }
            }
        }

        info!(
            "class {class}: indexed {} groups ({skipped} malformed names skipped)",
            groups.len()
        );
        Ok(Self { groups })
    }

    /// 分组个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// 是否没有任何分组.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// 取某个键的切片路径列表.
    pub fn get(&self, key: &str) -> Option<&[PathBuf]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// 按键序迭代所有分组.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PathBuf])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// 按键序拆出所有分组, 消耗索引.
    pub fn into_groups(self) -> impl Iterator<Item = (String, Vec<PathBuf>)> {
        self.groups.into_iter()
    }

    /// 把索引的窗口投影写入审计 CSV (表头 `patient_study_id,files`,
    /// 路径以 `;` 连接).
    ///
    /// 投影只作用在输出上, 不修改索引本身.
    pub fn dump_audit_csv(&self, dest: &Path, window: AuditWindow) -> Result<(), PreprocessError> {
        let werr = |source: csv::Error| PreprocessError::WriteCsv {
            path: dest.to_owned(),
            source,
        };

        let mut writer = csv::Writer::from_path(dest).map_err(werr)?;
        writer
            .write_record(["patient_study_id", "files"])
            .map_err(werr)?;
        for (key, files) in &self.groups {
            let projected = window.project(key, files);
            let joined = projected.iter().map(|p| p.display().to_string()).join(";");
            writer
                .write_record([key.as_str(), joined.as_str()])
                .map_err(werr)?;
        }
        writer.flush().map_err(|source| werr(source.into()))?;

        info!("audit index written to {}", dest.display());
        Ok(())
    }
}

/// 审计 CSV 的切片路径窗口策略.
///
/// 每个键在审计文件中最多落 `keep` 条路径, 先跳过开头 `skip` 条
/// (长序列的首尾切片多为定位像, 中段更有代表性). 列表太短开不了
/// 窗时退回保留前 `keep` 条; 连这也不可行时原样写全量列表.
/// 三档各记一条日志, 被窗口丢弃的数据量可以从日志中诊断出来.
#[derive(Clone, Copy, Debug)]
pub struct AuditWindow {
    /// 跳过的前缀长度.
    pub skip: usize,

    /// 最多保留的条数.
    pub keep: usize,
}

impl Default for AuditWindow {
    fn default() -> Self {
        Self {
            skip: AUDIT_WINDOW_SKIP,
            keep: AUDIT_WINDOW_KEEP,
        }
    }
}

impl AuditWindow {
    /// 求 `files` 的窗口投影. 仅用于审计输出.
    pub fn project<'a>(&self, key: &str, files: &'a [PathBuf]) -> &'a [PathBuf] {
        let len = files.len();
        if len > self.skip {
            let end = len.min(self.skip + self.keep);
            if self.skip > 0 || len > end {
                debug!(
                    "audit window for {key}: keeping [{}..{end}) of {len} paths",
                    self.skip
                );
            }
            &files[self.skip..end]
        } else if len <= self.keep {
            warn!("audit window for {key}: {len} paths are too few to window, keeping them all");
            files
        } else {
            warn!("audit window for {key}: falling back to the first {} of {len} paths", self.keep);
            &files[..self.keep]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditWindow, GroupingIndex};
    use std::fs::File;
    use std::path::PathBuf;

    /// 在临时目录下铺一个类别目录, 内含给定文件名的空文件.
    fn fixture(class: &str, names: &[&str]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(class);
        std::fs::create_dir(&dir).unwrap();
        for name in names {
            File::create(dir.join(name)).unwrap();
        }
        root
    }

    #[test]
    fn test_index_groups_and_counts() {
        let root = fixture(
            "AD",
            &[
                "P_1-IM-0001-0002.dcm",
                "P_1-IM-0001-0001.dcm",
                "P_1-IM-0002-0001.dcm",
                "P_2-IM-0001-0001.dcm",
                "notes.txt",
            ],
        );

        let index = GroupingIndex::build(root.path(), "AD", "dcm").unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.iter().map(|(_, v)| v.len()).sum::<usize>(), 4);

        // 组内按文件名字典序.
        let files = index.get("P1-IM-0001").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].to_string_lossy().ends_with("0001.dcm"));
        assert!(files[1].to_string_lossy().ends_with("0002.dcm"));
    }

    #[test]
    fn test_index_skips_malformed_names() {
        let root = fixture("AD", &["P_1-IM-0001-0001.dcm", "broken.dcm"]);
        let index = GroupingIndex::build(root.path(), "AD", "dcm").unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_index_missing_dir_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        assert!(GroupingIndex::build(root.path(), "nope", "dcm").is_err());
    }

    #[test]
    fn test_audit_window_tiers() {
        let paths: Vec<PathBuf> = (0..30).map(|i| PathBuf::from(format!("{i:02}.dcm"))).collect();
        let window = AuditWindow::default();

        // 主窗口: [3, 18).
        let projected = window.project("k", &paths);
        assert_eq!(projected.len(), 15);
        assert_eq!(projected[0], paths[3]);
        assert_eq!(projected[14], paths[17]);

        // 不足以开窗: 原样保留.
        let short = &paths[..2];
        assert_eq!(window.project("k", short), short);

        // 刚好跨过 skip 的短列表: 从 3 开始到结尾.
        let mid = &paths[..5];
        assert_eq!(window.project("k", mid), &mid[3..]);
    }

    #[test]
    fn test_audit_csv_has_one_row_per_key() {
        let root = fixture(
            "CN",
            &["A1-IM-0001-0001.dcm", "A1-IM-0001-0002.dcm", "B2-IM-0001-0001.dcm"],
        );
        let index = GroupingIndex::build(root.path(), "CN", "dcm").unwrap();

        let dest = root.path().join("CN.csv");
        index.dump_audit_csv(&dest, AuditWindow::default()).unwrap();

        let mut reader = csv::Reader::from_path(&dest).unwrap();
        assert_eq!(
            reader.headers().unwrap(),
            &csv::StringRecord::from(vec!["patient_study_id", "files"])
        );
        let rows: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "A1-IM-0001");
        assert_eq!(&rows[1][0], "B2-IM-0001");

        // 落盘是投影, 索引本身保持完整.
        assert_eq!(index.get("A1-IM-0001").unwrap().len(), 2);
    }
}
