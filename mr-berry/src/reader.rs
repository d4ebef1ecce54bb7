//! 切片读取接口与其 DICOM 实现.

use crate::error::SliceReadError;
use dicom_dictionary_std::tags;
use dicom_object::open_file;
use dicom_pixeldata::PixelDecoder;
use ndarray::{Array2, ArrayD, Axis, Ix2};
use std::path::Path;

/// 一张切片的读取结果: 像素平面与原始设备头字段.
///
/// 头字段按原文交出, 规范化 (厂商折叠、场强归类) 由
/// [`DeviceFamily`](crate::DeviceFamily) 负责.
#[derive(Clone, Debug)]
pub struct RawSlice {
    /// 2D 像素数组, 冗余的长度 1 维度已去除.
    pub plane: Array2<f32>,

    /// `Manufacturer` 头字段原文. 缺失时为 `None`.
    pub manufacturer: Option<String>,

    /// `MagneticFieldStrength` 头字段, 单位 tesla. 缺失时为 `None`.
    pub field_strength: Option<f64>,
}

/// 切片读取抽象.
///
/// 生产实现为 [`DicomSliceReader`]; 测试可以注入合成像素数据、
/// 设备头信息或读取故障, 不必伪造 DICOM 文件.
///
/// # 约定
///
/// 头字段缺失不算错误 (以 `None` 表示); 只有文件本体损坏或像素
/// 数据不可解码时才返回错误, 由调用方决定整组切片的命运.
pub trait SliceRead: Send + Sync {
    /// 读取 `path` 的像素平面与设备头字段.
    fn read_slice(&self, path: &Path) -> Result<RawSlice, SliceReadError>;
}

/// 基于 DICOM 文件的切片读取器.
#[derive(Clone, Copy, Debug, Default)]
pub struct DicomSliceReader;

impl SliceRead for DicomSliceReader {
    fn read_slice(&self, path: &Path) -> Result<RawSlice, SliceReadError> {
        let obj = open_file(path)?;

        let manufacturer = obj
            .element(tags::MANUFACTURER)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        let field_strength = obj
            .element(tags::MAGNETIC_FIELD_STRENGTH)
            .ok()
            .and_then(|e| e.to_float64().ok());

        let decoded = obj.decode_pixel_data()?;
        let plane = squeeze_to_plane(decoded.to_ndarray::<f32>()?.into_dyn())?;

        Ok(RawSlice {
            plane,
            manufacturer,
            field_strength,
        })
    }
}

/// 去掉所有长度为 1 的维度, 把解码结果压到 2D.
///
/// 多帧或多通道数据压不下去时报错: 这类文件不属于本流水线
/// 约定的单帧灰度切片.
fn squeeze_to_plane(mut arr: ArrayD<f32>) -> Result<Array2<f32>, SliceReadError> {
    while arr.ndim() > 2 {
        match arr.shape().iter().position(|&d| d == 1) {
            Some(axis) => arr = arr.index_axis_move(Axis(axis), 0),
            None => {
                return Err(format!(
                    "expected a single-frame grayscale slice, got shape {:?}",
                    arr.shape()
                )
                .into())
            }
        }
    }
    Ok(arr.into_dimensionality::<Ix2>()?)
}

#[cfg(test)]
mod tests {
    use super::squeeze_to_plane;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn test_squeeze_single_frame_grayscale() {
        // 解码器输出 (帧, 行, 列, 通道).
        let arr = ArrayD::<f32>::zeros(IxDyn(&[1, 6, 4, 1]));
        let plane = squeeze_to_plane(arr).unwrap();
        assert_eq!(plane.dim(), (6, 4));
    }

    #[test]
    fn test_squeeze_keeps_spatial_axes() {
        let arr = ArrayD::<f32>::from_shape_fn(IxDyn(&[1, 2, 3, 1]), |ix| (ix[1] * 3 + ix[2]) as f32);
        let plane = squeeze_to_plane(arr).unwrap();
        assert_eq!(plane[[1, 2]], 5.0);
    }

    #[test]
    fn test_squeeze_rejects_multiframe() {
        let arr = ArrayD::<f32>::zeros(IxDyn(&[4, 6, 6, 3]));
        assert!(squeeze_to_plane(arr).is_err());
    }
}
