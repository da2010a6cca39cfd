// 该文件是 Shanxuan （山选） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::{info, warn};

use shanxuan::{
  FromUrl,
  analysis::{Analyzer, AzureVision, AzureVisionBuilder, ImageAnalysis},
  task::{RegionStatus, RunTask, Task, install_interrupt_handler},
};

/// 离线模式下缓存未命中的条目在调用分析服务之前就会被跳过
struct NoService;

impl Analyzer for NoService {
  type Error = Infallible;

  fn analyze(&self, image_url: &url::Url) -> Result<ImageAnalysis, Self::Error> {
    unreachable!("离线模式不应调用分析服务: {}", image_url)
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let config = args::Args::parse().into_config()?;

  info!("Shanxuan 图片筛选");
  info!("清单目录: {}", config.manifests_dir.display());
  info!("缓存目录: {}", config.analyses_dir.display());
  info!("输出目录: {}", config.out_dir.display());
  info!("目标数量: {}", config.target_count);

  let stop = Arc::new(AtomicBool::new(false));
  install_interrupt_handler(stop.clone())?;

  let task = RunTask::new(&config).with_stop_flag(stop);
  let report = match &config.service {
    Some(service) if !config.offline => {
      let analyzer: AzureVision = AzureVisionBuilder::from_url(&service.endpoint)?
        .key(service.key.as_str())
        .build()?;
      task.run_task(analyzer)?
    }
    _ => {
      warn!("离线模式：只使用已缓存的分析");
      task.run_task(NoService)?
    }
  };

  for region in &report.regions {
    match &region.status {
      RegionStatus::Completed(summary) => info!(
        "{}: {:?}，选出 {}/{}，处理 {}，API 调用 {}",
        region.region,
        summary.outcome,
        summary.passed,
        config.target_count,
        summary.processed,
        summary.api_calls
      ),
      RegionStatus::Failed(reason) => warn!("{}: 中止 ({})", region.region, reason),
      RegionStatus::ManifestSkipped(reason) => warn!("{}: 已跳过 ({})", region.region, reason),
    }
  }

  if !report.is_clean() {
    bail!("部分区域未能完成");
  }
  Ok(())
}
