//! 通用常量.

/// 切片文件的默认扩展名. 其他扩展名的文件在建索引时被直接忽略.
pub const SLICE_EXT: &str = "dcm";

/// 体数据产物文件扩展名.
pub const ARTIFACT_EXT: &str = "bin";

/// 文件名中患者/检查段与切片序号段之间的分隔标记.
pub const SERIES_MARKER: &str = "-IM-";

/// 头信息完全不可读时的默认制造商.
pub const DEFAULT_MANUFACTURER: &str = "GE";

/// 1.5 特斯拉场强类别名.
pub const SCANNER_15T: &str = "1.5T";

/// 3 特斯拉场强类别名.
pub const SCANNER_3T: &str = "3T";

/// 大于等于该场强 (单位 tesla) 的设备归入 3T 类别, 其余归入 1.5T.
pub const FIELD_3T_THRESHOLD: f64 = 2.25;

/// 最终汇总清单的文件名, 落在输出根目录下.
pub const MANIFEST_FILE_NAME: &str = "intensity_map.csv";

/// 审计窗口默认值: 跳过每组开头的切片数.
pub const AUDIT_WINDOW_SKIP: usize = 3;

/// 审计窗口默认值: 每组最多落盘的切片路径数.
pub const AUDIT_WINDOW_KEEP: usize = 15;

/// 增广资格判定的默认裁剪尺寸.
pub const DEFAULT_CROP_SIZE: usize = 128;
