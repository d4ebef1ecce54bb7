//! 分组键提取.

use crate::consts::SERIES_MARKER;

/// 从切片文件名提取分组键 (patient/study id).
///
/// 文件名约定形如 `<patientstudy>-IM-<sliceindex>-<...>.dcm`.
/// 患者/检查段去掉 `_` 与 `-` 分隔符后, 与 `-IM-` 标记及其后第一个
/// `-` 段 (切片序号, 若该段带扩展名则去掉) 拼接成键.
/// 同一次采集的所有切片因此得到同一个键, 与切片序号无关的部分
/// 完全决定键值.
///
/// 不含 `-IM-` 标记的文件名是畸形输入, 返回 `None`,
/// 由调用方记警告并跳过.
pub fn grouping_key(file_name: &str) -> Option<String> {
    let (subject, rest) = file_name.split_once(SERIES_MARKER)?;
    let subject: String = subject.chars().filter(|c| !matches!(c, '_' | '-')).collect();

    // 切片序号后没有更多 `-` 段时, 第一段会带上扩展名.
    let token = rest.split('-').next().unwrap_or(rest);
    let token = token.split('.').next().unwrap_or(token);
    if token.is_empty() {
        return None;
    }

    Some(format!("{subject}{SERIES_MARKER}{token}"))
}
