//! 偏置场 (强度不均匀性) 校正.
//!
//! MR 扫描常带有缓慢变化的乘性强度不均匀 (接收场偏置).
//! 本模块定义校正器接口, 并提供一个基于 box filter
//! 近似高斯平滑的默认实现.

use std::fmt;

use crate::{MrLabel, MrScan};

mod boxsmooth;

pub use boxsmooth::BoxSmoothCorrector;

/// 偏置校正的运行时错误.
#[derive(Debug, Clone)]
pub enum BiasError {
    /// 扫描含有非有限 (NaN / inf) 采样值.
    NonFinite,
}

impl fmt::Display for BiasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite => write!(f, "scan contains non-finite samples"),
        }
    }
}

impl std::error::Error for BiasError {}

/// 偏置场校正器.
///
/// 实现者接受扫描与标注 (标注指示估计偏置场时应关注的区域),
/// 返回与输入几何完全一致的校正后扫描.
pub trait BiasCorrector {
    /// 对 `scan` 做偏置校正, `label` 为感兴趣区域掩膜.
    ///
    /// 全背景标注不是错误: 实现者应原样返回扫描.
    fn correct(&self, scan: &MrScan, label: &MrLabel) -> Result<MrScan, BiasError>;
}
