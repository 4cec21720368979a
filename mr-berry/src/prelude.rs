//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::{
    ImgWriteRaw, ImgWriteVis, LabelSlice, MrData3d, MrLabel, MrScan, NiftiHeaderAttr,
    OpenVolumeError, OwnedLabelSlice, OwnedScanSlice, ScanSlice, SlicePlane,
};

pub use crate::bias::{BiasCorrector, BiasError, BoxSmoothCorrector};
pub use crate::extract::extract;
pub use crate::norm::{normalize, NormRange};
pub use crate::pipeline::{self, PipelineConfig, PipelineError, RunSummary};
pub use crate::select::{plane_sums, select_window, SelectionWindow};
pub use crate::store::{artifact_paths, ArtifactPaths};

pub use crate::consts::{DEFAULT_PLANE, DEFAULT_WINDOW_RATIO, NORM_MAX, NORM_MIN};
