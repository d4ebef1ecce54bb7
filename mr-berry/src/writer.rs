//! 体数据产物写盘与清单登记.

use crate::consts::ARTIFACT_EXT;
use crate::device::DeviceFamily;
use crate::error::PreprocessError;
use crate::manifest::Manifest;
use crate::volume::{AssembledVolume, GroupVolume};
use half::f16;
use log::{debug, warn};
use ndarray::Array3;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// 把一个分组的产物写入 `<class_dir>/<key>[_<0..3>].bin`
/// 并逐个在清单中登记, 返回写出的产物路径.
///
/// 增广产物的后缀次序与
/// [`interleave_plane`](crate::interleave_plane) 的返回次序一致.
/// 任何一个产物写失败, 本组已写出的产物会被删除、登记会被撤销:
/// 失败的分组在输出里要么全有, 要么全无.
pub fn save_group(
    group: GroupVolume,
    class_dir: &Path,
    key: &str,
    manifest: &Manifest,
) -> Result<Vec<PathBuf>, PreprocessError> {
    let GroupVolume { volume, device } = group;
    match volume {
        AssembledVolume::Whole(v) => {
            let dest = artifact_path(class_dir, key, None);
            save_volume(&v, &dest, &device, manifest)?;
            Ok(vec![dest])
        }
        AssembledVolume::Interleaved(subs) => {
            let mut written = Vec::with_capacity(subs.len());
            for (i, sub) in subs.iter().enumerate() {
                let dest = artifact_path(class_dir, key, Some(i));
                if let Err(e) = save_volume(sub, &dest, &device, manifest) {
                    discard_partial_group(&written, manifest);
                    return Err(e);
                }
                written.push(dest);
            }
            Ok(written)
        }
    }
}

fn artifact_path(class_dir: &Path, key: &str, sub: Option<usize>) -> PathBuf {
    match sub {
        Some(i) => class_dir.join(format!("{key}_{i}.{ARTIFACT_EXT}")),
        None => class_dir.join(format!("{key}.{ARTIFACT_EXT}")),
    }
}

/// 单个体数据写盘. 登记先于写入; 体数据此时已组装完毕,
/// 文件在组装前绝不会被创建. 序列化中途失败时撤销登记并尽力
/// 删除残文件, 不给下游留下损坏产物.
fn save_volume(
    volume: &Array3<f16>,
    dest: &Path,
    device: &DeviceFamily,
    manifest: &Manifest,
) -> Result<(), PreprocessError> {
    manifest.record(dest, device.clone());

    let file = File::create(dest).map_err(|source| {
        manifest.forget(dest);
        PreprocessError::CreateArtifact {
            path: dest.to_owned(),
            source,
        }
    })?;

    match bincode::serialize_into(BufWriter::new(file), volume) {
        Ok(()) => {
            debug!("saved {}", dest.display());
            Ok(())
        }
        Err(source) => {
            manifest.forget(dest);
            remove_best_effort(dest);
            Err(PreprocessError::WriteArtifact {
                path: dest.to_owned(),
                source,
            })
        }
    }
}

fn discard_partial_group(written: &[PathBuf], manifest: &Manifest) {
    for path in written {
        manifest.forget(path);
        remove_best_effort(path);
    }
}

fn remove_best_effort(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("could not remove partial artifact {}: {e}", path.display());
    }
}
