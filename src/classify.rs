// 该文件是 Shanxuan （山选） 项目的一部分。
// src/classify.rs - 图像筛选规则
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;
use std::fmt;

use crate::analysis::ImageAnalysis;

const DEFAULT_TAG_CONFIDENCE: f64 = 0.8;
const DEFAULT_MAX_OBJECT_COVERAGE: f64 = 0.2;

/// 未通过的规则，按检查顺序排列
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
  AdultContent,
  BlackAndWhite,
  NotOutdoorNature,
  NoMountainOrHill,
  NoSkyOrLandscape,
  /// 检测物体面积占比（0.0 - 1.0）
  ObjectCoverage(f64),
}

impl fmt::Display for Issue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Issue::AdultContent => f.write_str("adult/racy/gory"),
      Issue::BlackAndWhite => f.write_str("bw"),
      Issue::NotOutdoorNature => f.write_str("!outdoor&&!nature"),
      Issue::NoMountainOrHill => f.write_str("!mountain&&!hill"),
      Issue::NoSkyOrLandscape => f.write_str("!sky&&!landscape"),
      Issue::ObjectCoverage(ratio) => write!(f, "objects {:.2}%", ratio * 100.0),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
  pub issues: Vec<Issue>,
}

impl Verdict {
  pub fn passed(&self) -> bool {
    self.issues.is_empty()
  }

  pub fn codes(&self) -> Vec<String> {
    self.issues.iter().map(ToString::to_string).collect()
  }
}

impl fmt::Display for Verdict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.codes().join(","))
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyRules {
  /// 标签置信度下限（含）
  pub tag_confidence: f64,
  /// 物体面积占比上限（含）
  pub max_object_coverage: f64,
}

impl Default for ClassifyRules {
  fn default() -> Self {
    ClassifyRules {
      tag_confidence: DEFAULT_TAG_CONFIDENCE,
      max_object_coverage: DEFAULT_MAX_OBJECT_COVERAGE,
    }
  }
}

impl ClassifyRules {
  pub fn classify(&self, analysis: &ImageAnalysis) -> Verdict {
    let mut issues = Vec::new();

    let adult = &analysis.adult;
    if adult.is_adult_content || adult.is_racy_content || adult.is_gory_content {
      issues.push(Issue::AdultContent);
    }

    if analysis.color.is_bw_img {
      issues.push(Issue::BlackAndWhite);
    }

    let tags = tag_confidences(analysis);
    let has = |name: &str| tags.get(name).copied().unwrap_or(0.0) >= self.tag_confidence;

    if !(has("outdoor") && has("nature")) {
      issues.push(Issue::NotOutdoorNature);
    }
    if !(has("mountain") || has("hill")) {
      issues.push(Issue::NoMountainOrHill);
    }
    if !(has("sky") || has("landscape")) {
      issues.push(Issue::NoSkyOrLandscape);
    }

    let coverage = object_coverage(analysis);
    if coverage > self.max_object_coverage {
      issues.push(Issue::ObjectCoverage(coverage));
    }

    Verdict { issues }
  }
}

pub fn classify(analysis: &ImageAnalysis) -> Verdict {
  ClassifyRules::default().classify(analysis)
}

/// 同名标签以最后出现的为准
fn tag_confidences(analysis: &ImageAnalysis) -> HashMap<&str, f64> {
  analysis
    .tags
    .iter()
    .map(|tag| (tag.name.as_str(), tag.confidence))
    .collect()
}

/// 检测框面积之和与图像面积之比。框不裁剪，重叠部分重复计算；
/// 图像面积为 0 时占比记为 0。
pub fn object_coverage(analysis: &ImageAnalysis) -> f64 {
  let image_area = analysis.metadata.area();
  if image_area == 0 {
    return 0.0;
  }
  let objects_area: u64 = analysis.objects.iter().map(|o| o.rectangle.area()).sum();
  objects_area as f64 / image_area as f64
}
