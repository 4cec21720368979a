//! 命令行入口: 从一对 (扫描, 标注) nii 文件生成归一化体数据
//! 与最大标注切片产物.
//!
//! 用法: `bigslice <扫描.nii.gz> <标注.nii.gz>`. 产物写入扫描
//! 文件所在目录.

use std::env;
use std::process::ExitCode;

use log::LevelFilter;
use mr_berry::bias::BoxSmoothCorrector;
use mr_berry::pipeline::{self, PipelineConfig};

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .expect("logger initialization");

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage:");
        eprintln!("{} input3DImageFile input3DLabelImageFile", args[0]);
        return ExitCode::from(2);
    }

    let cfg = PipelineConfig::new(args[1].as_str(), args[2].as_str());
    let corrector = BoxSmoothCorrector::default();

    match pipeline::run(&cfg, &corrector) {
        Ok(summary) => {
            log::info!(
                "done: window [{}], artifacts in {}",
                summary.window,
                summary
                    .artifacts
                    .norm
                    .parent()
                    .unwrap_or_else(|| std::path::Path::new("."))
                    .display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
