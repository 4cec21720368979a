//! 切片裁剪与二次掩膜.
//!
//! 在选中层裁剪归一化图像与标注, 并将裁剪后的图像切片与标注切片
//! 逐像素相乘. 归一化阶段已经做过一次掩膜, 此处在切片粒度上
//! 再做一次, 使 2D 产物不依赖归一化阶段是否掩膜.

use ndarray::Array2;

use crate::{MrLabel, MrScan, NiftiHeaderAttr, OwnedLabelSlice, OwnedScanSlice, SlicePlane};

/// 在平面 `plane` 第 `index` 层裁剪归一化图像与标注.
///
/// 返回 (掩膜后的图像切片, 标注切片). 两者都会记住产生时的平面与层号.
/// 退化轴在 2D 表示中被折叠.
///
/// # 注意
///
/// 1. 归一化图像与标注形状必须一致, 否则程序 panic.
/// 2. `index` 越界时程序 panic.
pub fn extract(
    normalized: &MrScan,
    label: &MrLabel,
    plane: SlicePlane,
    index: usize,
) -> (OwnedScanSlice, OwnedLabelSlice) {
    assert_eq!(
        normalized.shape(),
        label.shape(),
        "归一化图像和标注形状不一致"
    );

    let scan_slice = normalized.plane_at(plane, index);
    let label_slice = label.plane_at(plane, index);

    // 切片粒度的二次掩膜.
    let masked: Vec<f32> = scan_slice
        .iter()
        .zip(label_slice.iter())
        .map(|(&s, &l)| s * f32::from(l))
        .collect();

    // 形状来源于原切片, 不会失败.
    let masked = Array2::from_shape_vec(scan_slice.shape(), masked).unwrap();

    (
        OwnedScanSlice::new(masked, plane, index),
        OwnedLabelSlice::new(label_slice.array_view().to_owned(), plane, index),
    )
}
