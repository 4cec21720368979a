//! 通用常量.

use crate::SlicePlane;

/// 单通道颜色.
pub mod gray {
    /// 标注中背景像素值.
    pub const ROI_BACKGROUND: u8 = 0;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道暗灰色.
    pub const DARK_GRAY: u8 = 0b_0100_0000;

    /// 单通道灰色.
    pub const GRAY: u8 = 0b_1000_0000;

    /// 单通道亮灰色.
    pub const LIGHT_GRAY: u8 = 0b_1100_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 像素是否属于感兴趣区域?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        p != ROI_BACKGROUND
    }

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        p == ROI_BACKGROUND
    }
}

/// 默认切片提取平面. 流水线固定沿冠状面搜索与裁剪.
pub const DEFAULT_PLANE: SlicePlane = SlicePlane::Coronal;

/// 默认窗口比例. first/last 取 `mid ∓ 比例 × 非零层数` 的四舍五入.
pub const DEFAULT_WINDOW_RATIO: f64 = 0.25;

/// 默认归一化下界.
pub const NORM_MIN: f32 = 1.0;

/// 默认归一化上界.
pub const NORM_MAX: f32 = 128.0;
