// 该文件是 Shanxuan （山选） 项目的一部分。
// src/bin/review.rs - 用已缓存的分析重新筛选
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;

use shanxuan::{cache, classify::ClassifyRules};

/// 不调用服务，只对缓存文件中的全部记录重新执行筛选规则
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 区域分析缓存文件（analyses/<region>.ndjson）
  #[arg(value_name = "CACHE")]
  pub cache: PathBuf,
  /// 标签置信度下限
  #[arg(long, default_value = "0.8", value_name = "THRESHOLD")]
  pub tag_confidence: f64,
  /// 物体面积占比上限
  #[arg(long, default_value = "0.2", value_name = "RATIO")]
  pub max_object_coverage: f64,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  if !args.cache.exists() {
    bail!("缓存文件不存在: {}", args.cache.display());
  }

  let rules = ClassifyRules {
    tag_confidence: args.tag_confidence,
    max_object_coverage: args.max_object_coverage,
  };

  let entries = cache::load(&args.cache)?;
  let mut ids: Vec<_> = entries.keys().collect();
  ids.sort();

  let mut passed = 0usize;
  for id in ids {
    let entry = &entries[id];
    let verdict = rules.classify(&entry.analysis);
    if verdict.passed() {
      passed += 1;
      info!("OK {} {}", entry.picture.web_url(), entry.picture.title);
    } else {
      info!(
        "NG {} {}: {}",
        entry.picture.web_url(),
        entry.picture.title,
        verdict
      );
    }
  }

  info!("{} 条缓存分析中 {} 条通过", entries.len(), passed);
  Ok(())
}
