#![warn(missing_docs)]

//! 核心库. 把按切片散落存储的 DICOM MR 图像按患者/检查
//! (patient/study) 分组, 组装为 3D 体数据并落盘, 供下游模型训练
//! 直接加载.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 流水线结构
//!
//! 1. 分组键提取 (`key`): 从切片文件名解析 patient/study 键,
//!    文件名字典序即切片次序.
//! 2. 分组索引 (`index`): 扫描类别目录建立键到路径列表的映射,
//!    并以窗口投影落审计 CSV.
//! 3. 体数据组装 (`volume`): 按序读切片、折叠设备头信息、
//!    堆叠为 (切片数, 高, 宽) 的半精度体数据.
//! 4. 奇偶抽样增广 (`interleave`): 开关打开且整组切片尺寸达标时,
//!    每组产出四个平行子体数据.
//! 5. 产物写盘 (`writer`) 与共享清单 (`manifest`): 每个产物登记
//!    一条路径到设备族的映射, 运行结束统一落 `intensity_map.csv`.
//! 6. 并发编排 (`pipeline`): 类别内每组一个任务, 投给有界线程池,
//!    单组失败不影响兄弟任务.
//!
//! # 注意
//!
//! 1. 切片读取通过 [`SliceRead`] 抽象; 生产环境用
//!    [`DicomSliceReader`], 测试可注入合成数据与故障.
//! 2. 本 crate 不校验图像内容, 不做重采样/配准, 也不负责训练.

pub mod consts;

mod device;
mod error;
mod index;
mod interleave;
mod key;
mod manifest;
mod pipeline;
mod reader;
mod volume;
mod writer;

pub use device::{classify_field_strength, normalize_manufacturer, DeviceFamily};
pub use error::{PreprocessError, SliceReadError};
pub use index::{AuditWindow, GroupingIndex};
pub use interleave::{interleave_plane, plane_eligible};
pub use key::grouping_key;
pub use manifest::Manifest;
pub use pipeline::{default_workers, Pipeline, PreprocessConfig, RunSummary};
pub use reader::{DicomSliceReader, RawSlice, SliceRead};
pub use volume::{assemble, AssembleOptions, AssembledVolume, GroupVolume};
pub use writer::save_group;
