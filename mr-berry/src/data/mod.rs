use std::fmt;
use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayView, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::gray::*;
use crate::Idx3d;

mod plane;
pub mod slice;

pub use plane::SlicePlane;
pub use slice::{ImgWriteRaw, ImgWriteVis, LabelSlice, OwnedLabelSlice, OwnedScanSlice, ScanSlice};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// `fake_*` 系列方法共用: 将 header 的维度字段与 `(z, H, W)`
/// 数据形状同步, 并打上标记.
fn sync_fake_header(header: &mut NiftiHeader, (z, h, w): Idx3d) {
    header.dim = [3, w as u16, h as u16, z as u16, 1, 1, 1, 1];
    header.intent_name[..4].copy_from_slice(b"fake");
}

/// 3D MR nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 沿平面 `plane` 的切片层数.
    #[inline]
    fn plane_len(&self, plane: SlicePlane) -> usize {
        plane.extent_of(self.shape())
    }
}

/// nii 格式 3D MR 扫描, 包括 header 和强度数据. 强度值以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct MrScan {
    header: BoxedHeader,
    data: Array3<f32>,
}

impl NiftiHeaderAttr for MrScan {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for MrScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl MrScan {
    /// 打开 nii 文件格式的 3D MR 扫描. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(data.is_standard_layout());

        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data =
            Array3::<f32>::from_shape_vec(get_shape_from_header(&header), data.into_raw_vec())
                .unwrap();

        Ok(Self { header, data })
    }

    /// 从已有 header 和 `(z, H, W)` 顺序的数据直接组装实体.
    #[inline]
    pub(crate) fn from_raw(header: BoxedHeader, data: Array3<f32>) -> Self {
        debug_assert!(data.is_standard_layout());
        Self { header, data }
    }

    /// 根据裸强度数据直接创建 `MrScan` 实体. header 取默认值,
    /// 其维度字段与数据同步, 并打上标记.
    ///
    /// # 参数
    ///
    /// `data` 按照内存惯用的 `(z, H, W)` 格式存储.
    ///
    /// # 注意
    ///
    /// 该方法可能会创建不一致的实体, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<f32>) -> Self {
        let mut header = BoxedHeader::default();
        sync_fake_header(&mut header, data.dim());
        Self { header, data }
    }

    /// 根据已有 header 和裸强度数据直接创建 `MrScan` 实体.
    /// header 的维度字段会与数据同步.
    ///
    /// # 注意
    ///
    /// `data` 按照 `(z, H, W)` 格式存储.
    pub fn fake_with_header(header: &NiftiHeader, data: Array3<f32>) -> Self {
        let mut header = Box::new(header.clone());
        sync_fake_header(&mut header, data.dim());
        Self { header, data }
    }

    /// 判断该结构是否是由 `fake_*` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 获取沿平面 `plane` 第 `index` 层的不可变切片视图.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn plane_at(&self, plane: SlicePlane, index: usize) -> ScanSlice<'_> {
        ScanSlice::new(self.data.index_axis(plane.mem_axis(), index))
    }

    /// 获取能按升序迭代平面 `plane` 各层不可变切片的迭代器.
    #[inline]
    pub fn plane_iter(&self, plane: SlicePlane) -> impl ExactSizeIterator<Item = ScanSlice> {
        self.data.axis_iter(plane.mem_axis()).map(ScanSlice::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }
}

/// nii 格式 3D MR 标注, 包括 header 和整数标签. 标签值以 `u8` 保存,
/// 非零像素代表感兴趣区域.
#[derive(Debug, Clone)]
pub struct MrLabel {
    header: BoxedHeader,
    data: Array3<u8>,
}

impl NiftiHeaderAttr for MrLabel {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for MrLabel {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl MrLabel {
    /// 打开 nii 文件格式的 3D MR 标注. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // [W, H, z] -> [z, H, W].
        let data = obj
            .into_volume()
            .into_ndarray::<u8>()?
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(data.is_standard_layout());

        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data =
            Array3::<u8>::from_shape_vec(get_shape_from_header(&header), data.into_raw_vec())
                .unwrap();

        Ok(Self { header, data })
    }

    /// 根据裸标签数据直接创建 `MrLabel` 实体. header 取默认值,
    /// 其维度字段与数据同步, 并打上标记.
    ///
    /// # 参数
    ///
    /// `data` 按照内存惯用的 `(z, H, W)` 格式存储.
    ///
    /// # 注意
    ///
    /// 该方法可能会创建不一致的实体, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<u8>) -> Self {
        let mut header = BoxedHeader::default();
        sync_fake_header(&mut header, data.dim());
        Self { header, data }
    }

    /// 根据已有 header 和裸标签数据直接创建 `MrLabel` 实体.
    /// header 的维度字段会与数据同步.
    pub fn fake_with_header(header: &NiftiHeader, data: Array3<u8>) -> Self {
        let mut header = Box::new(header.clone());
        sync_fake_header(&mut header, data.dim());
        Self { header, data }
    }

    /// 判断该结构是否是由 `fake_*` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 获取沿平面 `plane` 第 `index` 层的不可变切片视图.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn plane_at(&self, plane: SlicePlane, index: usize) -> LabelSlice<'_> {
        LabelSlice::new(self.data.index_axis(plane.mem_axis(), index))
    }

    /// 获取能按升序迭代平面 `plane` 各层不可变切片的迭代器.
    #[inline]
    pub fn plane_iter(&self, plane: SlicePlane) -> impl ExactSizeIterator<Item = LabelSlice> {
        self.data.axis_iter(plane.mem_axis()).map(LabelSlice::new)
    }

    /// 求沿平面 `plane` 第 `index` 层上所有标签值之和.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn plane_sum(&self, plane: SlicePlane, index: usize) -> u64 {
        self.plane_at(plane, index).mask_sum()
    }

    /// 获取 3D 标注中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 该标注是否不含任何感兴趣区域像素?
    #[inline]
    pub fn is_all_background(&self) -> bool {
        self.data.iter().copied().all(is_background)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分.
#[cfg(feature = "rayon")]
impl MrLabel {
    /// 借助 `rayon`, 并行地求平面 `plane` 每层的标签值之和.
    /// 结果按层升序排列, 与逐层串行计算完全一致.
    pub fn par_plane_sums(&self, plane: SlicePlane) -> Vec<u64> {
        let view = self.data.view();
        let axis = plane.mem_axis();
        (0..self.plane_len(plane))
            .into_par_iter()
            .map(|i| LabelSlice::new(view.index_axis(axis, i)).mask_sum())
            .collect()
    }
}

/// 打开成对体数据时的错误.
#[derive(Debug)]
pub enum OpenVolumeError {
    /// 底层 nii 文件读取错误.
    Nifti(nifti::NiftiError),

    /// 扫描与标注的形状不一致.
    ShapeMismatch {
        /// 扫描形状, `(z, H, W)`.
        scan: Idx3d,

        /// 标注形状, `(z, H, W)`.
        label: Idx3d,
    },
}

impl fmt::Display for OpenVolumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nifti(e) => write!(f, "nifti error: {e}"),
            Self::ShapeMismatch { scan, label } => write!(
                f,
                "scan and label geometry mismatch: scan {scan:?}, label {label:?}"
            ),
        }
    }
}

impl std::error::Error for OpenVolumeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Nifti(e) => Some(e),
            Self::ShapeMismatch { .. } => None,
        }
    }
}

impl From<nifti::NiftiError> for OpenVolumeError {
    #[inline]
    fn from(e: nifti::NiftiError) -> Self {
        Self::Nifti(e)
    }
}

/// nii 格式的 3D MR 扫描与对应的标注.
///
/// 该结构完全透明, 仅包含两个公开的 `scan` 和 `label` 子结构,
/// 用户可以直接使用它们来实现相关上层功能.
///
/// 两个子结构的形状一致性在构造时校验.
#[derive(Debug, Clone)]
pub struct MrData3d {
    /// 3D MR 扫描.
    pub scan: MrScan,

    /// 3D MR 标注.
    pub label: MrLabel,
}

impl MrData3d {
    /// 由已加载的扫描和标注组装实体, 并校验两者形状一致.
    pub fn from_parts(scan: MrScan, label: MrLabel) -> Result<Self, OpenVolumeError> {
        if scan.shape() != label.shape() {
            return Err(OpenVolumeError::ShapeMismatch {
                scan: scan.shape(),
                label: label.shape(),
            });
        }
        Ok(Self { scan, label })
    }

    /// 分别打开 nii 文件格式的 3D MR 扫描和对应标注.
    /// 任一文件打开失败或两者形状不一致时返回 `Err`.
    pub fn open(
        scan_path: impl AsRef<Path>,
        label_path: impl AsRef<Path>,
    ) -> Result<Self, OpenVolumeError> {
        let scan = MrScan::open(scan_path.as_ref())?;
        let label = MrLabel::open(label_path.as_ref())?;
        Self::from_parts(scan, label)
    }

    /// 沿平面 `plane` 的切片层数.
    #[inline]
    pub fn plane_len(&self, plane: SlicePlane) -> usize {
        self.label.plane_len(plane)
    }

    /// 依次获取扫描和标注沿平面 `plane` 第 `index` 层的不可变切片.
    ///
    /// 当 `index` 越界时 panic.
    #[inline]
    pub fn plane_at(&self, plane: SlicePlane, index: usize) -> (ScanSlice<'_>, LabelSlice<'_>) {
        (
            self.scan.plane_at(plane, index),
            self.label.plane_at(plane, index),
        )
    }

    /// 获取能按行优先序迭代 3D (扫描, 标注) 像素的迭代器.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&f32, &u8)> {
        self.scan.data.iter().zip(self.label.data.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_fake_is_marked() {
        let label = MrLabel::fake(Array3::zeros((2, 3, 4)));
        assert!(label.is_faked());
        let scan = MrScan::fake(Array3::zeros((2, 3, 4)));
        assert!(scan.is_faked());
    }

    #[test]
    fn test_plane_accessors() {
        let mut raw = Array3::<u8>::zeros((2, 3, 4)); // (z, h, w)
        raw[(1, 2, 3)] = 7;
        let label = MrLabel::fake(raw);

        assert_eq!(label.plane_len(SlicePlane::Coronal), 4);
        assert_eq!(label.plane_len(SlicePlane::Axial), 3);
        assert_eq!(label.plane_len(SlicePlane::Sagittal), 2);

        // 冠状面第 3 层为 (z, h) 截面, 含体素 (1, 2, 3).
        assert_eq!(label.plane_at(SlicePlane::Coronal, 3).shape(), (2, 3));
        assert_eq!(label.plane_sum(SlicePlane::Coronal, 3), 7);
        assert_eq!(label.plane_sum(SlicePlane::Coronal, 0), 0);
        assert_eq!(label.plane_sum(SlicePlane::Axial, 2), 7);
        assert_eq!(label.plane_sum(SlicePlane::Sagittal, 1), 7);
    }

    #[test]
    fn test_geometry_mismatch() {
        let scan = MrScan::fake(Array3::zeros((2, 3, 4)));
        let label = MrLabel::fake(Array3::zeros((2, 3, 5)));
        match MrData3d::from_parts(scan, label) {
            Err(OpenVolumeError::ShapeMismatch { scan, label }) => {
                assert_eq!(scan, (2, 3, 4));
                assert_eq!(label, (2, 3, 5));
            }
            other => panic!("期望形状不一致错误, 实际为 {other:?}"),
        }
    }

    #[test]
    fn test_background_statistics() {
        let mut raw = Array3::<u8>::zeros((2, 2, 2));
        let label = MrLabel::fake(raw.clone());
        assert!(label.is_all_background());
        assert_eq!(label.count(0), 8);

        raw[(0, 1, 1)] = 2;
        let label = MrLabel::fake(raw);
        assert!(!label.is_all_background());
        assert_eq!(label.count(2), 1);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_plane_sums_matches_sequential() {
        let mut raw = Array3::<u8>::zeros((4, 3, 5));
        raw[(0, 0, 0)] = 1;
        raw[(2, 1, 3)] = 2;
        raw[(3, 2, 4)] = 3;
        let label = MrLabel::fake(raw);

        for plane in [SlicePlane::Coronal, SlicePlane::Axial, SlicePlane::Sagittal] {
            let seq: Vec<u64> = (0..label.plane_len(plane))
                .map(|i| label.plane_sum(plane, i))
                .collect();
            assert_eq!(label.par_plane_sums(plane), seq);
        }
    }
}
