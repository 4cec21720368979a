//! nii 持久化与产物命名.
//!
//! 3D 体数据在内存中按 `(z, H, W)` 组织, 落盘时换回 nii 惯用的
//! `[W, H, z]` 轴序; 2D 切片同理换回 `[w, h]`. 因此任何产物
//! "保存再加载" 后与内存中的数组逐像素一致 (受 `f32` 精度限制).

use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2, ArrayView3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

/// 全体归一化图像的文件名后缀.
pub const SUFFIX_NORM: &str = "-norm";

/// 最大切片图像的文件名后缀.
pub const SUFFIX_SLICE: &str = "-bigstSlice";

/// 最大切片标注的文件名后缀.
pub const SUFFIX_SLICE_LABEL: &str = "-bigstSlice-label";

/// 所有产物统一使用的扩展名.
const OUTPUT_EXT: &str = "nii.gz";

/// 一次流水线运行产出的三个文件路径.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// 全体归一化图像.
    pub norm: PathBuf,

    /// 掩膜后的最大切片图像.
    pub slice: PathBuf,

    /// 最大切片标注.
    pub slice_label: PathBuf,
}

/// 从文件名中提取产物基名: 去掉扩展名和结尾的 `-后缀` 段.
///
/// 例如 `patient7-T1.nii.gz` 的基名为 `patient7`.
fn strip_basename(file_name: &str) -> &str {
    let stem = file_name
        .strip_suffix(".nii.gz")
        .or_else(|| file_name.strip_suffix(".nii"))
        .unwrap_or_else(|| file_name.rsplit_once('.').map_or(file_name, |(s, _)| s));
    stem.rsplit_once('-').map_or(stem, |(s, _)| s)
}

/// 根据输入扫描路径推导三个产物路径. 产物与输入位于同一目录.
pub fn artifact_paths(feature_path: &Path) -> ArtifactPaths {
    let dir = feature_path.parent().unwrap_or_else(|| Path::new(""));
    let name = feature_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = strip_basename(&name);

    ArtifactPaths {
        norm: dir.join(format!("{base}{SUFFIX_NORM}.{OUTPUT_EXT}")),
        slice: dir.join(format!("{base}{SUFFIX_SLICE}.{OUTPUT_EXT}")),
        slice_label: dir.join(format!("{base}{SUFFIX_SLICE_LABEL}.{OUTPUT_EXT}")),
    }
}

/// 将 `(z, H, W)` 顺序的 3D 体数据保存为 nii 文件.
/// `header` 提供除维度、数据类型之外的元信息.
pub fn save_volume<P: AsRef<Path>>(
    path: P,
    header: &NiftiHeader,
    data: ArrayView3<'_, f32>,
) -> nifti::Result<()> {
    // (z, H, W) -> [W, H, z].
    let file_order = data.permuted_axes([2, 1, 0]);
    WriterOptions::new(path.as_ref())
        .reference_header(header)
        .write_nifti(&file_order)
}

/// 将 `(h, w)` 顺序的 2D 切片保存为 nii 文件.
/// `header` 提供除维度、数据类型之外的元信息.
pub fn save_slice<P: AsRef<Path>>(
    path: P,
    header: &NiftiHeader,
    data: ArrayView2<'_, f32>,
) -> nifti::Result<()> {
    // (h, w) -> [w, h].
    let file_order = data.permuted_axes([1, 0]);
    WriterOptions::new(path.as_ref())
        .reference_header(header)
        .write_nifti(&file_order)
}

/// 从 nii 文件加载 2D 切片, 返回 `(h, w)` 顺序的数组.
pub fn load_slice<P: AsRef<Path>>(path: P) -> nifti::Result<Array2<f32>> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;

    // [w, h] -> (h, w).
    let data = obj
        .into_volume()
        .into_ndarray::<f32>()?
        .permuted_axes([1, 0].as_slice());
    debug_assert!(data.is_standard_layout());

    let shape = (data.shape()[0], data.shape()[1]);
    // 该操作不会生成 `Err`, 可直接 unwrap.
    Ok(Array2::from_shape_vec(shape, data.into_raw_vec()).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MrScan, NiftiHeaderAttr};
    use ndarray::{array, Array3};
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mr-berry-store-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_strip_basename() {
        assert_eq!(strip_basename("patient7-T1.nii.gz"), "patient7");
        assert_eq!(strip_basename("patient7-T1.nii"), "patient7");
        assert_eq!(strip_basename("scan.nii.gz"), "scan");
        assert_eq!(strip_basename("scan.nrrd"), "scan");
        assert_eq!(strip_basename("sub-01-T1.nii.gz"), "sub-01");
        assert_eq!(strip_basename("noext"), "noext");
    }

    #[test]
    fn test_artifact_paths() {
        let p = artifact_paths(Path::new("/data/patient7-T1.nii.gz"));
        assert_eq!(p.norm, PathBuf::from("/data/patient7-norm.nii.gz"));
        assert_eq!(p.slice, PathBuf::from("/data/patient7-bigstSlice.nii.gz"));
        assert_eq!(
            p.slice_label,
            PathBuf::from("/data/patient7-bigstSlice-label.nii.gz")
        );

        // 无目录部分时, 产物落在当前目录.
        let p = artifact_paths(Path::new("scan.nii"));
        assert_eq!(p.norm, PathBuf::from("scan-norm.nii.gz"));
    }

    #[test]
    fn test_volume_round_trip() {
        let mut raw = Array3::<f32>::zeros((2, 3, 4));
        for (i, v) in raw.iter_mut().enumerate() {
            *v = i as f32 * 0.5;
        }
        let scan = MrScan::fake(raw.clone());

        let path = temp_dir().join("vol-rt.nii.gz");
        save_volume(&path, scan.header(), scan.data()).unwrap();

        let loaded = MrScan::open(&path).unwrap();
        assert_eq!(loaded.shape(), (2, 3, 4));
        assert!(loaded
            .data()
            .iter()
            .zip(raw.iter())
            .all(|(a, b)| (a - b).abs() < 1e-6));
    }

    #[test]
    fn test_slice_round_trip() {
        let data = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let scan = MrScan::fake(Array3::zeros((1, 1, 1)));

        let path = temp_dir().join("slice-rt.nii.gz");
        save_slice(&path, scan.header(), data.view()).unwrap();

        let loaded = load_slice(&path).unwrap();
        assert_eq!(loaded.dim(), (2, 3));
        assert!(loaded
            .iter()
            .zip(data.iter())
            .all(|(a, b)| (a - b).abs() < 1e-6));
    }
}
