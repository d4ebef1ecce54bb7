//! 流水线错误类型.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// 切片读取器返回的错误. 读取器是可替换的外部协作方, 错误类型不固定.
pub type SliceReadError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 预处理流水线错误.
///
/// 只有目录级/落盘级的变体会让整次运行失败; 分组内部的变体
/// (读切片、堆叠、写产物) 在任务边界被捕获并记日志, 不影响兄弟任务.
#[derive(Debug)]
pub enum PreprocessError {
    /// 创建输出目录失败.
    CreateDir {
        /// 目录路径.
        path: PathBuf,
        /// 底层 I/O 错误.
        source: io::Error,
    },

    /// 列出类别源目录失败.
    ListClassDir {
        /// 目录路径.
        path: PathBuf,
        /// 底层 I/O 错误.
        source: io::Error,
    },

    /// 读取单张切片失败.
    ReadSlice {
        /// 切片路径.
        path: PathBuf,
        /// 读取器报告的错误.
        source: SliceReadError,
    },

    /// 分组的切片文件列表为空.
    EmptyGroup {
        /// 分组键.
        key: String,
    },

    /// 组内切片尺寸不一致, 无法堆叠为体数据.
    StackPlanes {
        /// 分组键.
        key: String,
        /// 底层形状错误.
        source: ndarray::ShapeError,
    },

    /// 创建产物文件失败.
    CreateArtifact {
        /// 产物路径.
        path: PathBuf,
        /// 底层 I/O 错误.
        source: io::Error,
    },

    /// 序列化体数据失败.
    WriteArtifact {
        /// 产物路径.
        path: PathBuf,
        /// 底层序列化错误.
        source: bincode::Error,
    },

    /// 写 CSV (审计索引或汇总清单) 失败.
    WriteCsv {
        /// CSV 路径.
        path: PathBuf,
        /// 底层 CSV 错误.
        source: csv::Error,
    },
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDir { path, source } => {
                write!(f, "failed to create directory `{}`: {source}", path.display())
            }
            Self::ListClassDir { path, source } => {
                write!(f, "failed to list class directory `{}`: {source}", path.display())
            }
            Self::ReadSlice { path, source } => {
                write!(f, "failed to read slice `{}`: {source}", path.display())
            }
            Self::EmptyGroup { key } => write!(f, "group `{key}` has no slice files"),
            Self::StackPlanes { key, source } => {
                write!(f, "cannot stack planes of group `{key}`: {source}")
            }
            Self::CreateArtifact { path, source } => {
                write!(f, "failed to create artifact `{}`: {source}", path.display())
            }
            Self::WriteArtifact { path, source } => {
                write!(f, "failed to serialize volume into `{}`: {source}", path.display())
            }
            Self::WriteCsv { path, source } => {
                write!(f, "failed to write csv `{}`: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for PreprocessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDir { source, .. }
            | Self::ListClassDir { source, .. }
            | Self::CreateArtifact { source, .. } => Some(source),
            Self::ReadSlice { source, .. } => Some(source.as_ref()),
            Self::EmptyGroup { .. } => None,
            Self::StackPlanes { source, .. } => Some(source),
            Self::WriteArtifact { source, .. } => Some(source),
            Self::WriteCsv { source, .. } => Some(source),
        }
    }
}
