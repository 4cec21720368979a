#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 从带标注的 3D MR nii 扫描中选取标注覆盖最大的切片,
//! 并输出归一化后的整体图像与裁剪切片.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 按照 "扫描 + 整数标注" 的双文件模式组织数据.
//!   标注中非零像素代表感兴趣区域.
//! 2. 在非期望情况下 (如索引越界), 程序会直接 panic, 而不会导致内存错误.
//!   As what Rust promises. 可恢复的失败 (文件 I/O, 形状不一致,
//!   偏置校正失败) 以 `Result` 形式返回.
//!
//! # 功能一览
//!
//! ### 最大标注切片搜索与窗口推导 ✅
//!
//! 沿指定解剖平面逐层统计标注覆盖, 取覆盖最大层并按比例推导
//! first/mid/last 窗口.
//!
//! 实现位于 `mr-berry/src/select.rs`.
//!
//! ### 标注掩膜归一化 ✅
//!
//! 扫描与标注逐像素相乘后线性重标定到固定强度区间.
//!
//! 实现位于 `mr-berry/src/norm.rs`.
//!
//! ### 切片裁剪与二次掩膜 ✅
//!
//! 在选中层裁剪归一化图像与标注, 并对裁剪结果再次掩膜.
//!
//! 实现位于 `mr-berry/src/extract.rs`.
//!
//! ### 偏置场校正 ✅
//!
//! box filter 近似高斯平滑估计低频接收场并将其除去.
//!
//! 实现位于 `mr-berry/src/bias`.
//!
//! ### nii 持久化与产物命名 ✅
//!
//! 实现位于 `mr-berry/src/store.rs`.
//!
//! ### 流水线调度 ✅
//!
//! 固定顺序: 加载 -> 校正 -> 选层 -> 归一化 -> 裁剪 -> 落盘.
//!
//! 实现位于 `mr-berry/src/pipeline.rs`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 3D MR nii 文件基础数据结构.
mod data;

pub use data::{
    ImgWriteRaw, ImgWriteVis, LabelSlice, MrData3d, MrLabel, MrScan, NiftiHeaderAttr,
    OpenVolumeError, OwnedLabelSlice, OwnedScanSlice, ScanSlice, SlicePlane,
};

pub mod consts;

pub mod bias;
pub mod extract;
pub mod norm;
pub mod pipeline;
pub mod select;
pub mod store;

pub use norm::NormRange;
pub use select::SelectionWindow;

pub mod prelude;
