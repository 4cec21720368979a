//! 流水线调度.
//!
//! 固定顺序执行: 加载 -> 偏置校正 -> 选层 -> 归一化 -> 裁剪 ->
//! 落盘. 无分支, 无重试; 任一步失败则整次运行终止, 且偏置校正
//! 失败时不会产生任何输出文件.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::bias::{BiasCorrector, BiasError};
use crate::consts::{DEFAULT_PLANE, DEFAULT_WINDOW_RATIO};
use crate::select::{select_window, SelectionWindow};
use crate::store::{self, ArtifactPaths};
use crate::{extract, norm, MrData3d, NiftiHeaderAttr, NormRange, OpenVolumeError, SlicePlane};

/// 一次流水线运行的全部参数.
///
/// 除两个输入路径外, 其余参数都有文档化的默认值, 一般无需改动.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 3D MR 扫描文件路径.
    pub feature_path: PathBuf,

    /// 3D MR 标注文件路径.
    pub label_path: PathBuf,

    /// 切片搜索与裁剪平面. 默认冠状面.
    pub plane: SlicePlane,

    /// 窗口比例. 默认 0.25.
    pub ratio: f64,

    /// 归一化目标区间. 默认 [1, 128].
    pub range: NormRange,
}

impl PipelineConfig {
    /// 以默认参数构建配置.
    pub fn new(feature_path: impl Into<PathBuf>, label_path: impl Into<PathBuf>) -> Self {
        Self {
            feature_path: feature_path.into(),
            label_path: label_path.into(),
            plane: DEFAULT_PLANE,
            ratio: DEFAULT_WINDOW_RATIO,
            range: NormRange::from_radiomics(),
        }
    }
}

/// 一次成功运行的摘要.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// 沿搜索平面的切片层数.
    pub slices: usize,

    /// 选取窗口. `first`/`last` 仅作诊断记录, 裁剪只消费 `mid`.
    pub window: SelectionWindow,

    /// 三个产物的落盘路径.
    pub artifacts: ArtifactPaths,
}

/// 流水线运行时错误. 每个阶段的失败都是终止性的.
#[derive(Debug)]
pub enum PipelineError {
    /// 加载输入失败, 或扫描与标注几何不一致.
    Open(OpenVolumeError),

    /// 偏置校正失败.
    Bias(BiasError),

    /// 产物落盘失败.
    Save(nifti::NiftiError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(e) => write!(f, "failed to load inputs: {e}"),
            Self::Bias(e) => write!(f, "bias correction failed: {e}"),
            Self::Save(e) => write!(f, "failed to write artifact: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open(e) => Some(e),
            Self::Bias(e) => Some(e),
            Self::Save(e) => Some(e),
        }
    }
}

impl From<OpenVolumeError> for PipelineError {
    #[inline]
    fn from(e: OpenVolumeError) -> Self {
        Self::Open(e)
    }
}

impl From<BiasError> for PipelineError {
    #[inline]
    fn from(e: BiasError) -> Self {
        Self::Bias(e)
    }
}

impl From<nifti::NiftiError> for PipelineError {
    #[inline]
    fn from(e: nifti::NiftiError) -> Self {
        Self::Save(e)
    }
}

/// 执行整条流水线.
///
/// 1. 加载扫描与标注, 校验几何一致;
/// 2. 偏置校正;
/// 3. 推导产物路径;
/// 4. 沿配置平面搜索选取窗口;
/// 5. 归一化并落盘 `-norm`;
/// 6. 在 `window.mid` 层裁剪, 落盘 `-bigstSlice` 与
///   `-bigstSlice-label` (标注切片加宽为 `f32` 存储).
///
/// 全零标注会产生退化窗口 (各层号均为 0), 流水线照常完成.
pub fn run<C: BiasCorrector>(
    cfg: &PipelineConfig,
    corrector: &C,
) -> Result<RunSummary, PipelineError> {
    let data = MrData3d::open(&cfg.feature_path, &cfg.label_path)?;
    let slices = data.plane_len(cfg.plane);
    log::info!(
        "loaded volumes, {} slices along the {} plane",
        slices,
        cfg.plane.name()
    );

    let corrected = corrector.correct(&data.scan, &data.label)?;
    log::info!("bias correction done");

    let artifacts = store::artifact_paths(&cfg.feature_path);

    let window = select_window(&data.label, cfg.plane, cfg.ratio);
    log::info!("biggest slice search done: {window}");

    let normalized = norm::normalize(&corrected, &data.label, cfg.range);
    store::save_volume(&artifacts.norm, normalized.header(), normalized.data())?;
    log::info!("normalized volume written to {}", artifacts.norm.display());

    let (img_slice, label_slice) =
        extract::extract(&normalized, &data.label, cfg.plane, window.mid);
    store::save_slice(&artifacts.slice, normalized.header(), img_slice.array_view())?;
    store::save_slice(
        &artifacts.slice_label,
        data.label.header(),
        label_slice.to_f32().view(),
    )?;
    log::info!(
        "slice artifacts written to {} and {}",
        artifacts.slice.display(),
        artifacts.slice_label.display()
    );

    Ok(RunSummary {
        slices,
        window,
        artifacts,
    })
}

/// 便捷入口: 以默认参数和默认校正器处理一对输入文件.
pub fn run_with_defaults(
    feature_path: impl AsRef<Path>,
    label_path: impl AsRef<Path>,
) -> Result<RunSummary, PipelineError> {
    let cfg = PipelineConfig::new(
        feature_path.as_ref().to_path_buf(),
        label_path.as_ref().to_path_buf(),
    );
    run(&cfg, &crate::bias::BoxSmoothCorrector::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::load_slice;
    use crate::{MrLabel, MrScan};
    use ndarray::Array3;
    use std::path::PathBuf;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mr-berry-pipeline-{}-{}",
            tag,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// 合成一对输入: 冠状面第 2 层有一个 3×3 方块, 其余为零.
    fn write_synthetic_pair(dir: &Path) -> (PathBuf, PathBuf) {
        let mut scan = Array3::<f32>::zeros((5, 5, 5));
        let mut label = Array3::<u8>::zeros((5, 5, 5));
        for z in 1..4 {
            for h in 1..4 {
                scan[(z, h, 2)] = (z * h) as f32;
                label[(z, h, 2)] = 1;
            }
        }
        let scan = MrScan::fake(scan);
        let label = MrLabel::fake(label);

        let feature_path = dir.join("case0-T1.nii.gz");
        let label_path = dir.join("case0-label.nii.gz");
        crate::store::save_volume(&feature_path, scan.header(), scan.data()).unwrap();

        // 标注以 f32 落盘, 加载端按 u8 读回.
        let as_f32 = label.data().mapv(f32::from);
        crate::store::save_volume(&label_path, label.header(), as_f32.view()).unwrap();

        (feature_path, label_path)
    }

    #[test]
    fn test_end_to_end_run() {
        let dir = temp_dir("e2e");
        let (feature_path, label_path) = write_synthetic_pair(&dir);

        let summary = run_with_defaults(&feature_path, &label_path).unwrap();

        assert_eq!(summary.slices, 5);
        assert_eq!(summary.window.mid, 2);
        assert_eq!(summary.window.width, 1);
        assert_eq!(summary.window.first, 2);
        assert_eq!(summary.window.last, 2);

        assert_eq!(summary.artifacts.norm, dir.join("case0-norm.nii.gz"));
        assert!(summary.artifacts.norm.is_file());
        assert!(summary.artifacts.slice.is_file());
        assert!(summary.artifacts.slice_label.is_file());

        // 归一化产物的强度范围应为 [1, 128].
        let norm_vol = MrScan::open(&summary.artifacts.norm).unwrap();
        let lo = norm_vol.data().iter().copied().fold(f32::INFINITY, f32::min);
        let hi = norm_vol
            .data()
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        assert!((lo - 1.0).abs() < 1e-4);
        assert!((hi - 128.0).abs() < 1e-4);

        // 切片产物为 5×5 截面, 标注切片含 9 个前景像素.
        let label_slice = load_slice(&summary.artifacts.slice_label).unwrap();
        assert_eq!(label_slice.dim(), (5, 5));
        let fg = label_slice.iter().filter(|&&v| v != 0.0).count();
        assert_eq!(fg, 9);

        let img_slice = load_slice(&summary.artifacts.slice).unwrap();
        assert_eq!(img_slice.dim(), (5, 5));
        // 掩膜外像素为零.
        assert_eq!(img_slice[(0, 0)], 0.0);
    }

    #[test]
    fn test_degenerate_mask_completes() {
        let dir = temp_dir("degenerate");
        let scan = MrScan::fake(Array3::from_elem((3, 3, 3), 4.0));
        let label = MrLabel::fake(Array3::zeros((3, 3, 3)));

        let feature_path = dir.join("empty-T1.nii.gz");
        let label_path = dir.join("empty-label.nii.gz");
        crate::store::save_volume(&feature_path, scan.header(), scan.data()).unwrap();
        let as_f32 = label.data().mapv(f32::from);
        crate::store::save_volume(&label_path, label.header(), as_f32.view()).unwrap();

        let summary = run_with_defaults(&feature_path, &label_path).unwrap();
        assert!(summary.window.is_degenerate());
        assert_eq!(summary.window.mid, 0);
        assert!(summary.artifacts.norm.is_file());
    }

    #[test]
    fn test_geometry_mismatch_fails_fast() {
        let dir = temp_dir("mismatch");
        let scan = MrScan::fake(Array3::zeros((3, 3, 3)));
        let label = MrLabel::fake(Array3::zeros((3, 3, 4)));

        let feature_path = dir.join("bad-T1.nii.gz");
        let label_path = dir.join("bad-label.nii.gz");
        crate::store::save_volume(&feature_path, scan.header(), scan.data()).unwrap();
        let as_f32 = label.data().mapv(f32::from);
        crate::store::save_volume(&label_path, label.header(), as_f32.view()).unwrap();

        match run_with_defaults(&feature_path, &label_path) {
            Err(PipelineError::Open(OpenVolumeError::ShapeMismatch { .. })) => {}
            other => panic!("期望几何不一致错误, 实际为 {other:?}"),
        }
        // 失败时不产生任何输出.
        assert!(!dir.join("bad-norm.nii.gz").exists());
    }
}
