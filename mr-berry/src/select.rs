//! 最大标注切片搜索与窗口推导.
//!
//! 沿指定平面逐层统计标注覆盖 (标签值之和), 取覆盖最大的一层为
//! mid, 统计非零层数为 width, 并按比例推导 first/last 层号.

use std::fmt;

use crate::{MrLabel, SlicePlane};

/// 切片选取窗口: 最大覆盖层 `mid` 及其按比例推导的前后层号.
///
/// `first`/`last` 为带符号层号: 当 `mid` 很小而 `width` 较大时,
/// 推导结果可能落在 `[0, 层数)` 之外. 结构如实记录而不做截断,
/// 越界处理交由消费方决定.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectionWindow {
    /// 窗口起始层号, `round(mid - ratio × width)`.
    pub first: i64,

    /// 标注覆盖最大的层号. 覆盖并列时取最小层号.
    pub mid: usize,

    /// 窗口结束层号, `round(mid + ratio × width)`.
    pub last: i64,

    /// 标注覆盖非零的层数.
    pub width: usize,
}

impl SelectionWindow {
    /// 标注是否完全为空 (退化窗口)?
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.width == 0
    }
}

impl fmt::Display for SelectionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "first={}, mid={}, last={}, width={}",
            self.first, self.mid, self.last, self.width
        )
    }
}

/// 求标注沿平面 `plane` 每层的标签值之和, 按层升序排列.
///
/// 打开 `rayon` feature 时逐层并行计算, 结果与串行完全一致.
pub fn plane_sums(label: &MrLabel, plane: SlicePlane) -> Vec<u64> {
    #[cfg(feature = "rayon")]
    return label.par_plane_sums(plane);

    #[cfg(not(feature = "rayon"))]
    return label
        .plane_iter(plane)
        .map(|slice| slice.mask_sum())
        .collect();
}

/// 沿平面 `plane` 搜索标注覆盖最大的切片, 并推导选取窗口.
///
/// 算法逐层升序扫描:
///
/// 1. 每层求标签值之和作为该层得分;
/// 2. 得分非零的层数记为 `width`;
/// 3. 得分严格大于当前最优者更新 `mid`, 因此得分并列时最小层号胜出;
/// 4. `first`/`last` 取 `mid ∓ ratio × width` 的四舍五入
///   (远离零方向).
///
/// 全零标注会得到 `{first: 0, mid: 0, last: 0, width: 0}`
/// 的退化窗口, 这不是错误.
///
/// # 注意
///
/// `ratio` 必须为非负有限值, 否则程序 panic. 常用取值见
/// [`crate::consts::DEFAULT_WINDOW_RATIO`].
pub fn select_window(label: &MrLabel, plane: SlicePlane, ratio: f64) -> SelectionWindow {
    assert!(
        ratio.is_finite() && ratio >= 0.0,
        "窗口比例必须为非负有限值"
    );

    let sums = plane_sums(label, plane);

    let mut best_score = 0u64;
    let mut mid = 0usize;
    let mut width = 0usize;
    for (index, &score) in sums.iter().enumerate() {
        if score != 0 {
            width += 1;
        }
        if score > best_score {
            best_score = score;
            mid = index;
        }
    }

    let offset = ratio * width as f64;
    // f64::round 即 "四舍五入, 远离零方向".
    let first = (mid as f64 - offset).round() as i64;
    let last = (mid as f64 + offset).round() as i64;

    SelectionWindow {
        first,
        mid,
        last,
        width,
    }
}
