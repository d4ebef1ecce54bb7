//! 体数据组装.

use crate::device::DeviceFamily;
use crate::error::PreprocessError;
use crate::interleave::{interleave_plane, plane_eligible};
use crate::reader::SliceRead;
use half::f16;
use log::{info, warn};
use ndarray::{stack, Array2, Array3, Axis};
use std::path::PathBuf;

/// 组装结果: 单个体数据, 或四个奇偶抽样子体数据.
///
/// 体数据形状为 (切片数, 高, 宽), 半精度存储.
#[derive(Debug)]
pub enum AssembledVolume {
    /// 未增广: 一个完整体数据.
    Whole(Array3<f16>),

    /// 已增广: 四个平行子体数据, 次序与
    /// [`interleave_plane`] 的返回次序一致.
    Interleaved([Array3<f16>; 4]),
}

impl AssembledVolume {
    /// 对应的产物个数 (1 或 4).
    #[inline]
    pub fn artifact_len(&self) -> usize {
        match self {
            Self::Whole(_) => 1,
            Self::Interleaved(_) => 4,
        }
    }
}

/// 一个分组的组装产出.
#[derive(Debug)]
pub struct GroupVolume {
    /// 体数据.
    pub volume: AssembledVolume,

    /// 整组的设备族: 最后一次成功读取的头信息,
    /// 一次都没读到时为全局默认值.
    pub device: DeviceFamily,
}

/// 组装参数.
#[derive(Clone, Copy, Debug)]
pub struct AssembleOptions {
    /// 是否启用奇偶抽样增广.
    pub sample_images: bool,

    /// 增广资格判定的裁剪尺寸.
    pub crop_size: usize,
}

/// 按 `files` 的次序读取切片并堆叠为体数据, 切片数维在最前.
///
/// 设备头信息不完整只记日志并沿用此前的值; 切片本体读取失败则
/// 整组失败, 由任务边界处理.
///
/// 增广资格按组决定: 仅当开启增广且组内 **所有** 切片的尺寸都
/// 达标时, 整组才做奇偶抽样. 逐切片判定会让同一组里混出两种
/// 形状的产物, 这里不允许.
pub fn assemble<R: SliceRead + ?Sized>(
    reader: &R,
    class: &str,
    key: &str,
    files: &[PathBuf],
    opts: AssembleOptions,
) -> Result<GroupVolume, PreprocessError> {
    if files.is_empty() {
        return Err(PreprocessError::EmptyGroup { key: key.to_owned() });
    }

    let mut device = DeviceFamily::fallback();
    let mut planes: Vec<Array2<f16>> = Vec::with_capacity(files.len());
    let mut eligible = true;

    for path in files {
        let raw = reader
            .read_slice(path)
            .map_err(|source| PreprocessError::ReadSlice {
                path: path.clone(),
                source,
            })?;

        if !device.absorb(raw.manufacturer.as_deref(), raw.field_strength) {
            warn!(
                "{class}/{key}: incomplete device headers in {}, keeping {device}",
                path.display()
            );
        }

        eligible &= plane_eligible(&raw.plane, opts.crop_size);
        planes.push(raw.plane.mapv(f16::from_f32));
    }

    let augment = opts.sample_images && eligible;
    if opts.sample_images && !eligible {
        info!("{class}/{key}: at least one plane is below 2x crop size, stacking unaugmented");
    }

    let volume = if augment {
        info!("{class}/{key}: interleaving {} planes", planes.len());
        let mut quads: [Vec<Array2<f16>>; 4] = Default::default();
        for plane in &planes {
            for (list, sub) in quads.iter_mut().zip(interleave_plane(plane)) {
                list.push(sub);
            }
        }
        let [ee, oo, eo, oe] = quads;
        AssembledVolume::Interleaved([
            stack_planes(key, &ee)?,
            stack_planes(key, &oo)?,
            stack_planes(key, &eo)?,
            stack_planes(key, &oe)?,
        ])
    } else {
        AssembledVolume::Whole(stack_planes(key, &planes)?)
    };

    Ok(GroupVolume { volume, device })
}

/// 堆叠为 (切片数, 高, 宽). 组内形状不一致时报 `StackPlanes`.
fn stack_planes(key: &str, planes: &[Array2<f16>]) -> Result<Array3<f16>, PreprocessError> {
    let views: Vec<_> = planes.iter().map(|p| p.view()).collect();
    stack(Axis(0), &views).map_err(|source| PreprocessError::StackPlanes {
        key: key.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::{assemble, AssembleOptions, AssembledVolume};
    use crate::error::PreprocessError;
    use crate::reader::{RawSlice, SliceRead};
    use crate::SliceReadError;
    use half::f16;
    use ndarray::Array2;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    /// 以文件名为键交出合成切片; 不认识的路径报错.
    struct StubReader {
        slices: HashMap<String, RawSlice>,
    }

    impl StubReader {
        fn new() -> Self {
            Self {
                slices: HashMap::new(),
            }
        }

        fn with(mut self, name: &str, raw: RawSlice) -> Self {
            self.slices.insert(name.to_owned(), raw);
            self
        }
    }

    impl SliceRead for StubReader {
        fn read_slice(&self, path: &Path) -> Result<RawSlice, SliceReadError> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            self.slices
                .get(&name)
                .cloned()
                .ok_or_else(|| format!("no such slice: {name}").into())
        }
    }

    fn flat_slice(h: usize, w: usize, value: f32) -> RawSlice {
        RawSlice {
            plane: Array2::from_elem((h, w), value),
            manufacturer: None,
            field_strength: None,
        }
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    const PLAIN: AssembleOptions = AssembleOptions {
        sample_images: false,
        crop_size: 4,
    };

    const SAMPLED: AssembleOptions = AssembleOptions {
        sample_images: true,
        crop_size: 4,
    };

    #[test]
    fn test_slice_order_is_preserved() {
        let reader = StubReader::new()
            .with("a.dcm", flat_slice(4, 4, 0.0))
            .with("b.dcm", flat_slice(4, 4, 1.0))
            .with("c.dcm", flat_slice(4, 4, 2.0));

        let group = assemble(&reader, "A", "k", &paths(&["a.dcm", "b.dcm", "c.dcm"]), PLAIN).unwrap();
        let AssembledVolume::Whole(v) = group.volume else {
            panic!("expected an unaugmented volume");
        };
        assert_eq!(v.dim(), (3, 4, 4));
        for (i, expected) in [0.0, 1.0, 2.0].into_iter().enumerate() {
            assert_eq!(v[[i, 0, 0]], f16::from_f32(expected));
        }
    }

    #[test]
    fn test_device_last_successful_read_wins() {
        let mut first = flat_slice(4, 4, 0.0);
        first.manufacturer = Some("SIEMENS".to_owned());
        first.field_strength = Some(3.0);
        let mut second = flat_slice(4, 4, 1.0);
        second.manufacturer = Some("Philips".to_owned());
        second.field_strength = Some(1.5);
        // 第三张头信息缺失, 保留第二张的值.
        let third = flat_slice(4, 4, 2.0);

        let reader = StubReader::new()
            .with("0.dcm", first)
            .with("1.dcm", second)
            .with("2.dcm", third);
        let group = assemble(&reader, "A", "k", &paths(&["0.dcm", "1.dcm", "2.dcm"]), PLAIN).unwrap();
        assert_eq!(group.device.to_string(), "Philips_1.5T");
    }

    #[test]
    fn test_device_defaults_without_headers() {
        let reader = StubReader::new().with("a.dcm", flat_slice(4, 4, 0.0));
        let group = assemble(&reader, "A", "k", &paths(&["a.dcm"]), PLAIN).unwrap();
        assert_eq!(group.device.to_string(), "GE_1.5T");
    }

    #[test]
    fn test_group_level_augmentation() {
        let reader = StubReader::new()
            .with("a.dcm", flat_slice(8, 8, 0.0))
            .with("b.dcm", flat_slice(8, 8, 1.0));

        let group = assemble(&reader, "A", "k", &paths(&["a.dcm", "b.dcm"]), SAMPLED).unwrap();
        assert_eq!(group.volume.artifact_len(), 4);
        let AssembledVolume::Interleaved(subs) = group.volume else {
            panic!("expected interleaved sub-volumes");
        };
        for sub in &subs {
            assert_eq!(sub.dim(), (2, 4, 4));
        }
    }

    #[test]
    fn test_one_small_plane_disables_group_augmentation() {
        let reader = StubReader::new()
            .with("a.dcm", flat_slice(8, 8, 0.0))
            .with("b.dcm", flat_slice(6, 8, 1.0));

        // 尺寸不一致会让未增广堆叠报 StackPlanes, 这正是
        // 组级资格判定要暴露而不是掩盖的问题.
        let err = assemble(&reader, "A", "k", &paths(&["a.dcm", "b.dcm"]), SAMPLED).unwrap_err();
        assert!(matches!(err, PreprocessError::StackPlanes { .. }));

        // 形状一致但不达标: 整组回退到未增广.
        let reader = StubReader::new()
            .with("a.dcm", flat_slice(6, 8, 0.0))
            .with("b.dcm", flat_slice(6, 8, 1.0));
        let group = assemble(&reader, "A", "k", &paths(&["a.dcm", "b.dcm"]), SAMPLED).unwrap();
        assert!(matches!(group.volume, AssembledVolume::Whole(_)));
    }

    #[test]
    fn test_read_failure_fails_the_group() {
        let reader = StubReader::new().with("a.dcm", flat_slice(4, 4, 0.0));
        let err = assemble(&reader, "A", "k", &paths(&["a.dcm", "missing.dcm"]), PLAIN).unwrap_err();
        assert!(matches!(err, PreprocessError::ReadSlice { .. }));
    }

    #[test]
    fn test_empty_group_is_rejected() {
        let reader = StubReader::new();
        let err = assemble(&reader, "A", "k", &[], PLAIN).unwrap_err();
        assert!(matches!(err, PreprocessError::EmptyGroup { .. }));
    }
}
