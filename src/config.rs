// 该文件是 Shanxuan （山选） 项目的一部分。
// src/config.rs - 运行配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::classify::ClassifyRules;

pub const DEFAULT_MANIFESTS_DIR: &str = "ingest_manifests";
pub const DEFAULT_ANALYSES_DIR: &str = "analyses";
pub const DEFAULT_OUT_DIR: &str = "out";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
  #[error("AZURE_ENDPOINT 未设置")]
  MissingEndpoint,
  #[error("AZURE_KEY 未设置")]
  MissingKey,
  #[error("TARGET_COUNT 必须为正整数")]
  InvalidTargetCount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
  pub endpoint: Url,
  pub key: String,
}

/// 启动时构造一次，按引用传给各个组件
#[derive(Debug, Clone)]
pub struct Config {
  pub service: Option<ServiceConfig>,
  pub target_count: usize,
  pub manifests_dir: PathBuf,
  pub analyses_dir: PathBuf,
  pub out_dir: PathBuf,
  /// 只使用已有缓存，不调用分析服务
  pub offline: bool,
  /// 任一区域失败即终止整个运行
  pub fail_fast: bool,
  pub rules: ClassifyRules,
}

impl Config {
  pub fn new(target_count: usize) -> Result<Self, ConfigError> {
    if target_count == 0 {
      return Err(ConfigError::InvalidTargetCount);
    }
    Ok(Config {
      service: None,
      target_count,
      manifests_dir: PathBuf::from(DEFAULT_MANIFESTS_DIR),
      analyses_dir: PathBuf::from(DEFAULT_ANALYSES_DIR),
      out_dir: PathBuf::from(DEFAULT_OUT_DIR),
      offline: false,
      fail_fast: false,
      rules: ClassifyRules::default(),
    })
  }

  pub fn with_service(mut self, endpoint: Option<Url>, key: Option<String>) -> Self {
    self.service = match (endpoint, key.filter(|k| !k.is_empty())) {
      (Some(endpoint), Some(key)) => Some(ServiceConfig { endpoint, key }),
      _ => None,
    };
    self
  }

  pub fn with_dirs(
    mut self,
    manifests_dir: impl Into<PathBuf>,
    analyses_dir: impl Into<PathBuf>,
    out_dir: impl Into<PathBuf>,
  ) -> Self {
    self.manifests_dir = manifests_dir.into();
    self.analyses_dir = analyses_dir.into();
    self.out_dir = out_dir.into();
    self
  }

  pub fn offline(mut self, offline: bool) -> Self {
    self.offline = offline;
    self
  }

  pub fn fail_fast(mut self, fail_fast: bool) -> Self {
    self.fail_fast = fail_fast;
    self
  }
}

/// 由命令行或环境变量的原始值构造配置；非离线模式下服务地址与密钥缺一不可
pub fn from_parts(
  endpoint: Option<Url>,
  key: Option<String>,
  target_count: usize,
  offline: bool,
) -> Result<Config, ConfigError> {
  if !offline {
    if endpoint.is_none() {
      return Err(ConfigError::MissingEndpoint);
    }
    if key.as_deref().is_none_or(str::is_empty) {
      return Err(ConfigError::MissingKey);
    }
  }
  Ok(
    Config::new(target_count)?
      .with_service(endpoint, key)
      .offline(offline),
  )
}
