// 该文件是 Shanxuan （山选） 项目的一部分。
// src/task.rs - 按区域运行筛选任务
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::{thread, time::Duration};

use anyhow::Context;
use tracing::{error, info, warn};

use crate::{
  analysis::Analyzer,
  config::Config,
  manifest::{ManifestError, discover_regions},
  region::{RegionProcessor, RegionSummary},
};

pub trait Task<A>: Sized {
  type Error;
  fn run_task(self, analyzer: A) -> Result<RunReport, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegionStatus {
  Completed(RegionSummary),
  /// 分析服务出错，本区域中止
  Failed(String),
  /// 清单无法解析，本区域未处理
  ManifestSkipped(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionReport {
  pub region: String,
  pub status: RegionStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
  pub regions: Vec<RegionReport>,
}

impl RunReport {
  /// 所有区域都正常结束
  pub fn is_clean(&self) -> bool {
    self
      .regions
      .iter()
      .all(|r| matches!(r.status, RegionStatus::Completed(_)))
  }

  pub fn total_passed(&self) -> usize {
    self
      .regions
      .iter()
      .filter_map(|r| match &r.status {
        RegionStatus::Completed(summary) => Some(summary.passed),
        _ => None,
      })
      .sum()
  }
}

pub struct RunTask<'a> {
  config: &'a Config,
  stop: Arc<AtomicBool>,
}

impl<'a> RunTask<'a> {
  pub fn new(config: &'a Config) -> Self {
    RunTask {
      config,
      stop: Arc::new(AtomicBool::new(false)),
    }
  }

  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.stop = stop;
    self
  }
}

impl<'a, A: Analyzer> Task<A> for RunTask<'a> {
  type Error = anyhow::Error;

  fn run_task(self, analyzer: A) -> Result<RunReport, Self::Error> {
    let config = self.config;
    for dir in [&config.analyses_dir, &config.out_dir] {
      std::fs::create_dir_all(dir).with_context(|| format!("无法创建目录 {}", dir.display()))?;
    }

    let regions = discover_regions(&config.manifests_dir)?;
    info!("发现 {} 个区域清单", regions.len());

    let processor = RegionProcessor::new(config, analyzer).with_stop_flag(self.stop.clone());
    let mut report = RunReport::default();

    for region in regions {
      if self.stop.load(Ordering::SeqCst) {
        warn!("中断信号接收，跳过剩余区域");
        break;
      }

      let entries = match region.load_entries() {
        Ok(entries) => entries,
        Err(e @ ManifestError::Parse(..)) if !config.fail_fast => {
          warn!("跳过区域 {}: {}", region.name, e);
          report.regions.push(RegionReport {
            region: region.name.clone(),
            status: RegionStatus::ManifestSkipped(e.to_string()),
          });
          continue;
        }
        Err(e) => return Err(e.into()),
      };

      match processor.process(&region, &entries) {
        Ok(summary) => report.regions.push(RegionReport {
          region: region.name.clone(),
          status: RegionStatus::Completed(summary),
        }),
        Err(e) if e.is_fatal() || config.fail_fast => {
          return Err(e).with_context(|| format!("区域 {} 处理失败", region.name));
        }
        Err(e) => {
          error!("区域 {} 中止: {}，继续处理下一个区域", region.name, e);
          report.regions.push(RegionReport {
            region: region.name.clone(),
            status: RegionStatus::Failed(e.to_string()),
          });
        }
      }
    }

    info!(
      "任务完成: {} 个区域，共选出 {} 张图片",
      report.regions.len(),
      report.total_passed()
    );
    Ok(report)
  }
}

/// Ctrl-C 后在当前图片处理完时停止；30 秒内未退出则强制结束进程
pub fn install_interrupt_handler(stop: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    stop.store(true, Ordering::SeqCst);
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
}
