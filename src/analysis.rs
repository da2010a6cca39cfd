// 该文件是 Shanxuan （山选） 项目的一部分。
// src/analysis.rs - 图像分析结果与分析服务接口
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::manifest::ManifestEntry;

pub trait Analyzer {
  type Error: AnalyzeFailure;

  fn analyze(&self, image_url: &Url) -> Result<ImageAnalysis, Self::Error>;
}

impl<A: Analyzer> Analyzer for &A {
  type Error = A::Error;

  fn analyze(&self, image_url: &Url) -> Result<ImageAnalysis, Self::Error> {
    (**self).analyze(image_url)
  }
}

/// 分析失败时区分“只是这张图片不行”和“服务整体不可用”
pub trait AnalyzeFailure: std::error::Error + Send + Sync + 'static {
  fn is_entry_specific(&self) -> bool {
    false
  }
}

impl AnalyzeFailure for std::convert::Infallible {}

/// 旧缓存中缺失的列表写作 `null`，按空列表读取
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AdultInfo {
  pub is_adult_content: bool,
  pub is_racy_content: bool,
  pub is_gory_content: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ColorInfo {
  #[serde(rename = "isBWImg")]
  pub is_bw_img: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Tag {
  pub name: String,
  pub confidence: f64,
}

/// 像素坐标的检测框，可能与其他框重叠
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rectangle {
  pub x: u32,
  pub y: u32,
  pub w: u32,
  pub h: u32,
}

impl Rectangle {
  pub fn area(&self) -> u64 {
    self.w as u64 * self.h as u64
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DetectedObject {
  pub rectangle: Rectangle,
  #[serde(default)]
  pub object: String,
  #[serde(default)]
  pub confidence: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ImageMetadata {
  pub width: u32,
  pub height: u32,
  pub format: String,
}

impl ImageMetadata {
  pub fn area(&self) -> u64 {
    self.width as u64 * self.height as u64
  }
}

/// 分析服务返回的文档，只保留分类用到的部分
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ImageAnalysis {
  pub adult: AdultInfo,
  pub color: ColorInfo,
  #[serde(deserialize_with = "null_as_empty")]
  pub tags: Vec<Tag>,
  #[serde(deserialize_with = "null_as_empty")]
  pub objects: Vec<DetectedObject>,
  pub metadata: ImageMetadata,
}

/// 缓存记录：一张图片及其分析结果
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisEntry {
  pub picture: ManifestEntry,
  pub analysis: ImageAnalysis,
}

mod azure;
pub use self::azure::{AzureVision, AzureVisionBuilder, AzureVisionError};
