use crate::Idx3d;
use ndarray::Axis;

/// 切片提取平面.
///
/// 平面编号沿用 nii 文件轴序 `[W, H, z]`:
/// 0 为冠状面, 1 为横断面, 2 为矢状面.
/// 由于体数据在内存中按 `(z, H, W)` 组织, 文件轴 `k`
/// 对应内存轴 `2 - k`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlicePlane {
    /// 冠状面, 文件轴 0.
    Coronal,

    /// 横断面, 文件轴 1.
    Axial,

    /// 矢状面, 文件轴 2.
    Sagittal,
}

impl SlicePlane {
    /// 平面对应的 nii 文件轴编号.
    #[inline]
    pub const fn file_axis(self) -> usize {
        match self {
            Self::Coronal => 0,
            Self::Axial => 1,
            Self::Sagittal => 2,
        }
    }

    /// 平面对应的内存轴. 内存布局为 `(z, H, W)`.
    #[inline]
    pub const fn mem_axis(self) -> Axis {
        Axis(2 - self.file_axis())
    }

    /// 沿该平面的切片层数. `shape` 为 `(z, H, W)` 顺序.
    #[inline]
    pub const fn extent_of(self, shape: Idx3d) -> usize {
        match self {
            Self::Coronal => shape.2,
            Self::Axial => shape.1,
            Self::Sagittal => shape.0,
        }
    }

    /// 平面英文名.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Coronal => "coronal",
            Self::Axial => "axial",
            Self::Sagittal => "sagittal",
        }
    }
}
