//! MR 扫描/标注切片对象的操作与持久化.

use std::path::Path;

use image::ImageResult;
use ndarray::iter::Iter;
use ndarray::{Array2, ArrayView2, Ix2};

use super::SlicePlane;
use crate::consts::gray::*;
use crate::norm::NormRange;
use crate::Idx2d;

/// 不可变、借用的二维 MR 扫描切片.
pub struct ScanSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::MrScan`].
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, f32>,
}

impl<'a> ScanSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }
}

/// 不可变、借用的二维 MR 标注切片.
pub struct LabelSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::MrLabel`].
    data: ArrayView2<'a, u8>,
}

impl<'a> LabelSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, u8>) -> Self {
        Self { data }
    }
}

/// 拥有所有权的二维 MR 扫描切片, 由裁剪操作产生.
/// 结构会记住切片产生时的平面与层号.
#[derive(Debug, Clone)]
pub struct OwnedScanSlice {
    data: Array2<f32>,
    plane: SlicePlane,
    index: usize,
}

/// 拥有所有权的二维 MR 标注切片, 由裁剪操作产生.
/// 结构会记住切片产生时的平面与层号.
#[derive(Debug, Clone)]
pub struct OwnedLabelSlice {
    data: Array2<u8>,
    plane: SlicePlane,
    index: usize,
}

/// 拥有所有权切片的共有方法.
macro_rules! impl_owned_slice {
    ($($slice: ty => $elem: ty),+ $(,)?) => {
        $(
            impl $slice {
                /// 直接初始化.
                #[inline]
                pub(crate) fn new(data: Array2<$elem>, plane: SlicePlane, index: usize) -> Self {
                    Self { data, plane, index }
                }

                /// 切片产生时的平面.
                #[inline]
                pub fn plane(&self) -> SlicePlane {
                    self.plane
                }

                /// 切片产生时的层号.
                #[inline]
                pub fn index(&self) -> usize {
                    self.index
                }
            }
        )+
    };
}

impl_owned_slice!(OwnedScanSlice => f32, OwnedLabelSlice => u8);

/// 不可变方法集合.
macro_rules! impl_slice_immut {
    ($($slice: ty => $elem: ty),+ $(,)?) => {
        $(
            /// 不可变方法集合.
            impl $slice {
                /// 获得 **底层** 数据的一份不可变 shallow copy.
                #[inline]
                pub fn array_view(&self) -> ArrayView2<$elem> {
                    self.data.view()
                }

                /// 获取可以迭代图像像素的迭代器.
                #[inline]
                pub fn iter(&self) -> Iter<'_, $elem, Ix2> {
                    self.data.iter()
                }

                /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
                #[inline]
                pub fn get(&self, pos: Idx2d) -> Option<&$elem> {
                    self.data.get(pos)
                }

                /// 图像的分辨率 (高, 宽).
                #[inline]
                pub fn shape(&self) -> Idx2d {
                    let &[h, w] = self.data.shape() else {
                        unreachable!()
                    };
                    (h, w)
                }

                /// 图像的像素个数.
                #[inline]
                pub fn size(&self) -> usize {
                    let (h, w) = self.shape();
                    h * w
                }

                /// 获得图像的高.
                #[inline]
                pub fn height(&self) -> usize {
                    self.shape().0
                }

                /// 获得图像的宽.
                #[inline]
                pub fn width(&self) -> usize {
                    self.shape().1
                }

                /// 判断一个索引是否合法 (未越界).
                #[inline]
                pub fn check(&self, (h, w): Idx2d) -> bool {
                    let (h_len, w_len) = self.shape();
                    h < h_len && w < w_len
                }

                /// 以行优先规则, 获取能迭代图像所有 `(索引, 像素值)` 的迭代器.
                #[inline]
                pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &$elem)> {
                    self.data.indexed_iter()
                }
            }
        )+
    };
}

impl_slice_immut!(
    ScanSlice<'_> => f32,
    LabelSlice<'_> => u8,
    OwnedScanSlice => f32,
    OwnedLabelSlice => u8,
);

/// 标注切片专有的不可变方法集合.
macro_rules! impl_label_immut {
    ($($slice: ty),+) => {
        $(
            impl $slice {
                /// 求切片上所有标签值之和.
                #[inline]
                pub fn mask_sum(&self) -> u64 {
                    self.data.iter().map(|&p| u64::from(p)).sum()
                }

                /// 该图是否为全背景图?
                #[inline]
                pub fn is_background(&self) -> bool {
                    self.data.iter().copied().all(is_background)
                }

                /// 统计图像中值为 `label` 的像素总个数.
                #[inline]
                pub fn count(&self, label: u8) -> usize {
                    self.data.iter().filter(|&p| *p == label).count()
                }
            }
        )+
    };
}

impl_label_immut!(LabelSlice<'_>, OwnedLabelSlice);

impl OwnedLabelSlice {
    /// 将标签数据加宽为 `f32` 表示, 便于与浮点产物统一落盘.
    pub fn to_f32(&self) -> Array2<f32> {
        self.data.mapv(f32::from)
    }
}

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// `ImgWriteVis` trait 的意图是, 图像将以 "可视化友好"
/// 的方式保存, 而不是 "as is" 的方式. 这意味着, 对于标注切片,
/// 标签值会映射到肉眼较易区分的灰度; 对于扫描切片,
/// 强度值会用流水线的归一化区间映射到 8-bit 灰度.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
///
/// `ImgWriteRaw` trait 的额外意图是, 图像将按原样保存. 这意味着,
/// 标注切片可以直接存储为灰度图, 但以浮点强度存储的扫描切片无能为力.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 使像素更有利于单通道可视化.
#[inline]
pub(crate) fn pretty(label: u8) -> u8 {
    match label {
        // 背景为黑色
        ROI_BACKGROUND => BLACK,

        // 主要区域为白色
        1 => WHITE,

        // 让次级区域颜色更接近主要区域颜色
        2 => LIGHT_GRAY,

        // 其余标签统一映射为灰色
        _ => GRAY,
    }
}

macro_rules! impl_label_vis {
    ($($slice: ty),+) => {
        $(
            /// 会将背景映射为黑色, 标签 1/2 分别映射为白色/亮灰色, 其余为灰色.
            impl ImgWriteVis for $slice {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width) = self.shape();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pretty(pix)]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

macro_rules! impl_label_raw {
    ($($slice: ty),+) => {
        $(
            /// 按原样存储.
            impl ImgWriteRaw for $slice {
                fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width) = self.shape();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pix]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

macro_rules! impl_scan_vis {
    ($($scan: ty),+) => {
        $(
            /// 以流水线归一化区间 [1, 128] 为窗口映射到 8-bit 灰度.
            impl ImgWriteVis for $scan {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width) = self.shape();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    const RANGE: NormRange = NormRange::from_radiomics();
                    for ((h, w), &v) in self.indexed_iter() {
                        let gray = RANGE.eval(v).unwrap();
                        buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

impl_label_vis!(LabelSlice<'_>, OwnedLabelSlice);
impl_label_raw!(LabelSlice<'_>, OwnedLabelSlice);
impl_scan_vis!(ScanSlice<'_>, OwnedScanSlice);
