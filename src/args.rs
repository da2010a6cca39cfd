// 该文件是 Shanxuan （山选） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use shanxuan::config::{
  self, Config, ConfigError, DEFAULT_ANALYSES_DIR, DEFAULT_MANIFESTS_DIR, DEFAULT_OUT_DIR,
};

/// Shanxuan 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// Azure 计算机视觉服务地址
  #[arg(long, env = "AZURE_ENDPOINT", value_name = "URL")]
  pub endpoint: Option<Url>,

  /// Azure 订阅密钥
  #[arg(long, env = "AZURE_KEY", value_name = "KEY", hide_env_values = true)]
  pub key: Option<String>,

  /// 每个区域选出的图片数量
  #[arg(long, env = "TARGET_COUNT", value_name = "COUNT")]
  pub target_count: usize,

  /// 区域清单目录（每个区域一个 JSON 数组文件）
  #[arg(long, default_value = DEFAULT_MANIFESTS_DIR, value_name = "DIR")]
  pub manifests: PathBuf,

  /// 分析缓存目录
  #[arg(long, default_value = DEFAULT_ANALYSES_DIR, value_name = "DIR")]
  pub analyses: PathBuf,

  /// 输出目录
  #[arg(long, default_value = DEFAULT_OUT_DIR, value_name = "DIR")]
  pub out: PathBuf,

  /// 只使用已缓存的分析，不调用服务
  #[arg(long)]
  pub offline: bool,

  /// 任一区域失败即终止
  #[arg(long)]
  pub fail_fast: bool,
}

impl Args {
  pub fn into_config(self) -> Result<Config, ConfigError> {
    Ok(
      config::from_parts(self.endpoint, self.key, self.target_count, self.offline)?
        .with_dirs(self.manifests, self.analyses, self.out)
        .fail_fast(self.fail_fast),
    )
  }
}
