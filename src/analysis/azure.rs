// 该文件是 Shanxuan （山选） 项目的一部分。
// src/analysis/azure.rs - Azure 计算机视觉分析客户端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl,
  analysis::{AnalyzeFailure, Analyzer, ImageAnalysis},
};

const AZURE_ANALYZE_PATH: &str = "/vision/v3.1/analyze";
const AZURE_ANALYZE_QUERY: &str = "visualFeatures=adult,color,tags,objects";
const AZURE_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const AZURE_SCHEMES: [&str; 2] = ["https", "http"];

#[derive(Error, Debug)]
pub enum AzureVisionError {
  #[error("服务地址必须使用 http(s) 方案: {0}")]
  EndpointScheme(String),
  #[error("缺少 API 密钥")]
  MissingKey,
  #[error("HTTP 客户端错误: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("Azure API HTTP 状态 {0}: {1}")]
  Status(StatusCode, String),
  #[error("分析结果解析失败: {0}")]
  Decode(#[from] serde_json::Error),
}

/// 服务拒绝的是这张图片本身（链接失效、格式不支持、尺寸过小），
/// 换一张图片还能继续。
impl AnalyzeFailure for AzureVisionError {
  fn is_entry_specific(&self) -> bool {
    matches!(
      self,
      AzureVisionError::Status(status, _)
        if *status == StatusCode::BAD_REQUEST
          || *status == StatusCode::NOT_FOUND
          || *status == StatusCode::UNSUPPORTED_MEDIA_TYPE
    )
  }
}

#[derive(Serialize)]
struct AnalyzeRequestBody<'a> {
  url: &'a str,
}

pub struct AzureVisionBuilder {
  endpoint: Url,
  key: Option<String>,
}

impl FromUrl for AzureVisionBuilder {
  type Error = AzureVisionError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !AZURE_SCHEMES.contains(&url.scheme()) {
      return Err(AzureVisionError::EndpointScheme(url.to_string()));
    }

    Ok(AzureVisionBuilder {
      endpoint: url.clone(),
      key: None,
    })
  }
}

impl AzureVisionBuilder {
  pub fn key(mut self, key: impl Into<String>) -> Self {
    self.key = Some(key.into());
    self
  }

  pub fn build(self) -> Result<AzureVision, AzureVisionError> {
    let key = self
      .key
      .filter(|k| !k.is_empty())
      .ok_or(AzureVisionError::MissingKey)?;
    let analyze_url = analyze_url(&self.endpoint);
    debug!("分析接口: {}", analyze_url);

    Ok(AzureVision {
      client: Client::builder().build()?,
      analyze_url,
      key,
    })
  }
}

/// 以服务地址为基础替换路径与查询参数
fn analyze_url(endpoint: &Url) -> Url {
  let mut url = endpoint.clone();
  url.set_path(AZURE_ANALYZE_PATH);
  url.set_query(Some(AZURE_ANALYZE_QUERY));
  url.set_fragment(None);
  url
}

pub struct AzureVision {
  client: Client,
  analyze_url: Url,
  key: String,
}

impl Analyzer for AzureVision {
  type Error = AzureVisionError;

  fn analyze(&self, image_url: &Url) -> Result<ImageAnalysis, Self::Error> {
    let target = self.analyze_url.as_str();
    info!(
      "调用 Azure API: {}",
      target.strip_prefix("https://").unwrap_or(target)
    );

    let response = self
      .client
      .post(self.analyze_url.clone())
      .header(AZURE_KEY_HEADER, &self.key)
      .json(&AnalyzeRequestBody {
        url: image_url.as_str(),
      })
      .send()?;

    let status = response.status();
    if status != StatusCode::OK {
      let body = response.text().unwrap_or_default();
      return Err(AzureVisionError::Status(status, body));
    }

    let body = response.bytes()?;
    Ok(serde_json::from_slice(&body)?)
  }
}
