//! box filter 近似高斯平滑的偏置校正实现.
//!
//! 以掩膜内强度估计低频接收场: 掩膜外像素先用掩膜内均值填充,
//! 然后沿三个轴分别做若干遍 box filter (多遍 box filter
//! 收敛于高斯卷积), 最后将平滑场除去并保持掩膜内均值不变.

use std::collections::VecDeque;
use std::ops::{AddAssign, SubAssign};

use ndarray::{Array3, Axis};
use num::Float;

use super::{BiasCorrector, BiasError};
use crate::{MrLabel, MrScan, NiftiHeaderAttr};

/// 平滑场低于该值的像素不做除法, 直接保留原强度.
const FIELD_EPS: f32 = 1e-6;

/// box filter 近似高斯平滑的偏置校正器.
///
/// 参数是只读的. 若要修改参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug)]
pub struct BoxSmoothCorrector {
    sigma: f64,
    passes: usize,
}

impl Default for BoxSmoothCorrector {
    /// 默认参数: sigma 8 体素, 3 遍 box filter.
    #[inline]
    fn default() -> Self {
        Self {
            sigma: 8.0,
            passes: 3,
        }
    }
}

impl BoxSmoothCorrector {
    /// 构建校正器.
    ///
    /// `sigma` 以体素为单位, 必须在 `(0, 1e3]` 内; `passes`
    /// 必须在 `1..=8` 内. 否则返回 `None`.
    pub fn new(sigma: f64, passes: usize) -> Option<BoxSmoothCorrector> {
        if 0.0 < sigma && sigma <= 1e3 && (1..=8).contains(&passes) {
            Some(Self { sigma, passes })
        } else {
            None
        }
    }

    /// 平滑 sigma, 以体素为单位.
    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// box filter 遍数.
    #[inline]
    pub fn passes(&self) -> usize {
        self.passes
    }
}

impl BiasCorrector for BoxSmoothCorrector {
    fn correct(&self, scan: &MrScan, label: &MrLabel) -> Result<MrScan, BiasError> {
        assert_eq!(scan.shape(), label.shape(), "扫描和标注形状不一致");

        if scan.data().iter().any(|v| !v.is_finite()) {
            return Err(BiasError::NonFinite);
        }

        // 全背景标注: 无从估计偏置场, 原样返回.
        if label.is_all_background() {
            return Ok(scan.clone());
        }

        // 掩膜内均值.
        let mut sum = 0.0f64;
        let mut count = 0u64;
        for (&v, &l) in scan.data().iter().zip(label.data().iter()) {
            if l != 0 {
                sum += f64::from(v);
                count += 1;
            }
        }
        let mean_in = (sum / count as f64) as f32;

        // 低频场估计: 掩膜外用掩膜内均值填充, 再做可分离平滑.
        let filled: Vec<f32> = scan
            .data()
            .iter()
            .zip(label.data().iter())
            .map(|(&v, &l)| if l != 0 { v } else { mean_in })
            .collect();
        // 形状来源于原数据, 不会失败.
        let mut field = Array3::from_shape_vec(scan.data().dim(), filled).unwrap();

        for &boxsize in box_sizes(self.sigma, self.passes).iter() {
            for axis in 0..3 {
                smooth_axis(&mut field, Axis(axis), boxsize);
            }
        }

        // 掩膜内平滑场均值, 用于保持整体亮度.
        let mut fsum = 0.0f64;
        for (&f, &l) in field.iter().zip(label.data().iter()) {
            if l != 0 {
                fsum += f64::from(f);
            }
        }
        let mean_field = (fsum / count as f64) as f32;

        let corrected: Vec<f32> = scan
            .data()
            .iter()
            .zip(field.iter())
            .map(|(&v, &f)| if f > FIELD_EPS { v * (mean_field / f) } else { v })
            .collect();
        let corrected = Array3::from_shape_vec(scan.data().dim(), corrected).unwrap();

        Ok(MrScan::from_raw(
            Box::new(scan.header().clone()),
            corrected,
        ))
    }
}

/// 求用 `passes` 遍 box filter 近似 sigma 高斯所需的各遍窗口大小.
/// 窗口大小保证为奇数.
fn box_sizes(sigma: f64, passes: usize) -> Vec<usize> {
    if sigma <= 0.0 || passes == 0 {
        return vec![0; passes];
    }

    // 理想窗口宽度 w_ideal = sqrt(12 σ² / n + 1).
    let wideal = ((12.0 * sigma * sigma / passes as f64) + 1.0).sqrt();
    let wl = (wideal - (wideal + 1.0) % 2.0).round() as usize;
    let wl = if wl % 2 == 0 { wl + 1 } else { wl };
    let wu = wl + 2;

    let (wl_f, n_f) = (wl as f64, passes as f64);
    let mideal = (12.0 * sigma * sigma - n_f * wl_f * wl_f - 4.0 * n_f * wl_f - 3.0 * n_f)
        / (-4.0 * wl_f - 4.0);
    let m = mideal.round() as usize;

    (0..passes).map(|i| if i < m { wl } else { wu }).collect()
}

/// 沿 `axis` 方向对每条 lane 做一遍 box filter.
fn smooth_axis(field: &mut Array3<f32>, axis: Axis, boxsize: usize) {
    let mut buf: Vec<f32> = Vec::new();
    for mut lane in field.lanes_mut(axis) {
        buf.clear();
        buf.extend(lane.iter().copied());
        box_filter_line(&mut buf, boxsize);
        for (dst, &src) in lane.iter_mut().zip(buf.iter()) {
            *dst = src;
        }
    }
}

/// 对一条数据做一遍滑动均值 box filter, 就地修改.
///
/// `boxsize` 必须为奇数且不小于 3, 且数据长度不小于 `boxsize`,
/// 否则该函数是 no-op. 边缘处窗口按实际覆盖长度收缩.
fn box_filter_line<T>(line: &mut [T], boxsize: usize)
where
    T: Float + AddAssign + SubAssign,
{
    if boxsize < 3 || boxsize % 2 == 0 || line.len() < boxsize {
        return;
    }

    let n = line.len();
    let r = boxsize / 2;
    let mut window: VecDeque<T> = VecDeque::with_capacity(boxsize);
    let mut sum = T::zero();

    // 前 r 个元素先进窗.
    for &v in line.iter().take(r) {
        window.push_back(v);
        sum += v;
    }

    // 左边缘: 窗口右沿扩张.
    for i in 0..=r {
        let v = line[i + r];
        window.push_back(v);
        sum += v;
        line[i] = sum / T::from(r + i + 1).unwrap();
    }

    // 中段: 完整窗口.
    for i in (r + 1)..(n - r) {
        // 窗口非空, 可直接 unwrap.
        let old = window.pop_front().unwrap();
        sum -= old;
        let v = line[i + r];
        window.push_back(v);
        sum += v;
        line[i] = sum / T::from(boxsize).unwrap();
    }

    // 右边缘: 窗口收缩.
    for i in (n - r)..n {
        let old = window.pop_front().unwrap();
        sum -= old;
        line[i] = sum / T::from(r + n - i).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn float_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_invalid_params() {
        assert!(BoxSmoothCorrector::new(0.0, 3).is_none());
        assert!(BoxSmoothCorrector::new(-1.0, 3).is_none());
        assert!(BoxSmoothCorrector::new(8.0, 0).is_none());
        assert!(BoxSmoothCorrector::new(8.0, 9).is_none());
        assert!(BoxSmoothCorrector::new(8.0, 3).is_some());
    }

    #[test]
    fn test_box_sizes_odd() {
        for &sigma in &[1.0, 2.5, 5.0, 8.0] {
            for passes in 1..=4 {
                for &s in box_sizes(sigma, passes).iter() {
                    assert_eq!(s % 2, 1, "窗口大小应为奇数, 实际 {s}");
                }
            }
        }
    }

    #[test]
    fn test_box_filter_uniform_line() {
        // 常量数据平滑后保持不变.
        let mut line = vec![2.5f64; 16];
        box_filter_line(&mut line, 5);
        assert!(line.iter().all(|&v| (v - 2.5).abs() < 1e-12));
    }

    #[test]
    fn test_box_filter_short_line_noop() {
        let mut line = vec![1.0f32, 5.0];
        let orig = line.clone();
        box_filter_line(&mut line, 5);
        assert_eq!(line, orig);
    }

    #[test]
    fn test_box_filter_preserves_total_shape() {
        // 单脉冲平滑后扩散为窗口宽度的均值.
        let mut line = vec![0.0f64; 9];
        line[4] = 3.0;
        box_filter_line(&mut line, 3);
        assert!((line[3] - 1.0).abs() < 1e-12);
        assert!((line[4] - 1.0).abs() < 1e-12);
        assert!((line[5] - 1.0).abs() < 1e-12);
        assert!(line[0].abs() < 1e-12);
    }

    #[test]
    fn test_passthrough_on_empty_mask() {
        let scan = MrScan::fake(Array3::from_elem((3, 3, 3), 7.0));
        let label = MrLabel::fake(Array3::zeros((3, 3, 3)));
        let out = BoxSmoothCorrector::default()
            .correct(&scan, &label)
            .unwrap();
        assert!(out
            .data()
            .iter()
            .zip(scan.data().iter())
            .all(|(a, b)| a == b));
    }

    #[test]
    fn test_uniform_scan_unchanged() {
        // 常量扫描的平滑场也是常量, 校正后保持不变.
        let scan = MrScan::fake(Array3::from_elem((4, 4, 4), 10.0));
        let label = MrLabel::fake(Array3::from_elem((4, 4, 4), 1));
        let out = BoxSmoothCorrector::new(2.0, 2)
            .unwrap()
            .correct(&scan, &label)
            .unwrap();
        assert!(out.data().iter().all(|&v| float_eq(v, 10.0)));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut raw = Array3::from_elem((2, 2, 2), 1.0f32);
        raw[(0, 0, 0)] = f32::NAN;
        let scan = MrScan::fake(raw);
        let label = MrLabel::fake(Array3::from_elem((2, 2, 2), 1));
        assert!(matches!(
            BoxSmoothCorrector::default().correct(&scan, &label),
            Err(BiasError::NonFinite)
        ));
    }

    #[test]
    fn test_geometry_preserved() {
        let scan = MrScan::fake(Array3::from_elem((3, 4, 5), 2.0));
        let label = MrLabel::fake(Array3::from_elem((3, 4, 5), 1));
        let out = BoxSmoothCorrector::default()
            .correct(&scan, &label)
            .unwrap();
        assert_eq!(out.data().dim(), (3, 4, 5));
        assert_eq!(out.shape(), scan.shape());
    }
}
