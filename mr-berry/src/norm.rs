//! 掩膜归一化: 扫描与标注逐像素相乘, 再线性重标定到固定强度区间.

use itertools::Itertools;
use itertools::MinMaxResult;
use ndarray::Array3;
use ordered_float::NotNan;

use crate::consts::{NORM_MAX, NORM_MIN};
use crate::{MrLabel, MrScan, NiftiHeaderAttr};

/// 归一化目标强度区间, 包含下界和上界的闭区间.
///
/// 该区间是只读的. 若要修改区间参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NormRange {
    min: f32,
    max: f32,
}

impl NormRange {
    /// 构建归一化区间.
    ///
    /// `min` 和 `max` 必须有限、在合理范围内且满足 `min < max`,
    /// 否则返回 `None`.
    pub fn new(min: f32, max: f32) -> Option<NormRange> {
        if (-1e6..=1e6).contains(&min) && (-1e6..=1e6).contains(&max) && min < max {
            Some(Self { min, max })
        } else {
            None
        }
    }

    /// 构建一个常用于放射组学特征提取的归一化区间 [1, 128].
    /// 所有经过该流水线的图像共用同一区间, 以保证跨图像强度可比.
    #[inline]
    pub const fn from_radiomics() -> NormRange {
        Self {
            min: NORM_MIN,
            max: NORM_MAX,
        }
    }

    /// 区间下界.
    #[inline]
    pub fn min(&self) -> f32 {
        self.min
    }

    /// 区间上界.
    #[inline]
    pub fn max(&self) -> f32 {
        self.max
    }

    /// 区间跨度.
    #[inline]
    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    /// 求落在当前区间内的强度值 `v` 对应的灰度图像素整数值 (0 <= value <= 255).
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, v: f32) -> Option<u8> {
        if !v.is_finite() {
            return None;
        }
        if v <= self.min {
            Some(u8::MIN)
        } else if v >= self.max {
            Some(u8::MAX)
        } else {
            // 255, not 256.
            Some((((v - self.min) / self.span()) * 255.0) as u8)
        }
    }
}

/// 生成全体归一化图像: 将偏置校正后的扫描与标注逐像素相乘
/// (多值标签会按其数值等比例放缩强度, 这是流水线的既定性质),
/// 再将乘积的全局强度范围线性映射到 `range` 区间.
///
/// 输出沿用扫描的 header 几何信息.
///
/// # 注意
///
/// 1. 扫描与标注形状必须一致, 否则程序 panic.
/// 2. 扫描强度必须全为有限值, 否则程序 panic.
/// 3. 若乘积为常量图 (全局最小值等于最大值), 则所有像素统一映射到
///   `range.min()`.
pub fn normalize(scan: &MrScan, label: &MrLabel, range: NormRange) -> MrScan {
    assert_eq!(scan.shape(), label.shape(), "扫描和标注形状不一致");

    let masked: Vec<f32> = scan
        .data()
        .iter()
        .zip(label.data().iter())
        .map(|(&s, &l)| s * f32::from(l))
        .collect();

    // 全局最小/最大值. 输入为有限值时 NotNan 不会失败.
    let (lo, hi) = match masked
        .iter()
        .map(|&v| NotNan::new(v).expect("扫描强度必须全为有限值"))
        .minmax()
    {
        MinMaxResult::MinMax(lo, hi) => (lo.into_inner(), hi.into_inner()),
        MinMaxResult::OneElement(only) => (only.into_inner(), only.into_inner()),
        MinMaxResult::NoElements => unreachable!("体数据不可为空"),
    };

    let span = hi - lo;
    let rescaled: Vec<f32> = if span > 0.0 {
        let scale = range.span() / span;
        masked
            .into_iter()
            .map(|v| (v - lo) * scale + range.min())
            .collect()
    } else {
        // 常量图: 统一映射到区间下界.
        masked.into_iter().map(|_| range.min()).collect()
    };

    // 形状来源于原数据, 不会失败.
    let data = Array3::from_shape_vec(scan.data().dim(), rescaled).unwrap();
    MrScan::from_raw(Box::new(scan.header().clone()), data)
}
