//! 采集设备元数据.

use crate::consts::{DEFAULT_MANUFACTURER, FIELD_3T_THRESHOLD, SCANNER_15T, SCANNER_3T};
use std::fmt;

/// 采集设备族: 制造商 + 场强类别.
///
/// 该结构按组维护: 每读一张切片就用其头信息更新一次,
/// 整组保留最后一次成功读取的值, 而不是多数表决.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceFamily {
    /// 制造商 (规范化后).
    pub manufacturer: String,

    /// 场强类别, 取值为 [`SCANNER_15T`] 或 [`SCANNER_3T`].
    pub scanner: String,
}

impl DeviceFamily {
    /// 头信息完全不可用时的全局默认值: GE, 1.5T.
    pub fn fallback() -> Self {
        Self {
            manufacturer: DEFAULT_MANUFACTURER.to_owned(),
            scanner: SCANNER_15T.to_owned(),
        }
    }

    /// 用一张切片的头字段更新设备族. 缺失或无意义的字段保留原值.
    ///
    /// 两个字段都成功更新时返回 `true`; 否则返回 `false`,
    /// 供调用方记日志 (更新本身照常进行).
    pub fn absorb(&mut self, manufacturer: Option<&str>, field_strength: Option<f64>) -> bool {
        let mut complete = true;

        match manufacturer.map(str::trim) {
            Some(raw) if !raw.is_empty() => self.manufacturer = normalize_manufacturer(raw),
            _ => complete = false,
        }

        match field_strength {
            Some(tesla) if tesla.is_finite() && tesla > 0.0 => {
                self.scanner = classify_field_strength(tesla).to_owned();
            }
            _ => complete = false,
        }

        complete
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.manufacturer, self.scanner)
    }
}

/// 把头信息里五花八门的制造商写法折叠到少数设备族名.
/// 未知厂商按原文 (去除首尾空白) 保留.
pub fn normalize_manufacturer(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    if upper.contains("GENERAL ELECTRIC") || upper.starts_with("GE") {
        DEFAULT_MANUFACTURER.to_owned()
    } else if upper.contains("SIEMENS") {
        "Siemens".to_owned()
    } else if upper.contains("PHILIPS") {
        "Philips".to_owned()
    } else if upper.contains("TOSHIBA") || upper.contains("CANON") {
        "Toshiba".to_owned()
    } else {
        raw.trim().to_owned()
    }
}

/// 场强数值 (tesla) 归类到场强类别名.
#[inline]
pub fn classify_field_strength(tesla: f64) -> &'static str {
    if tesla >= FIELD_3T_THRESHOLD {
        SCANNER_3T
    } else {
        SCANNER_15T
    }
}
