// 该文件是 Shanxuan （山选） 项目的一部分。
// src/manifest.rs - 区域清单与 Flickr 链接
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

const MANIFEST_EXTENSION: &str = "json";
const FLICKR_MEDIA_HOST: &str = "live.staticflickr.com";
const FLICKR_SITE_HOST: &str = "www.flickr.com";

#[derive(Error, Debug)]
pub enum ManifestError {
  #[error("读取清单 {0} 失败: {1}")]
  Io(PathBuf, std::io::Error),
  #[error("解析清单 {0} 失败: {1}")]
  Parse(PathBuf, serde_json::Error),
  #[error("清单条目 {0} 无法生成链接: {1}")]
  Url(String, url::ParseError),
}

/// 清单中的一张候选图片
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
  pub id: String,
  pub owner: String,
  pub secret: String,
  pub server: String,
  pub title: String,
}

impl ManifestEntry {
  /// 交给分析服务的预览图地址（`_w` 尺寸）
  pub fn preview_url(&self) -> Result<Url, ManifestError> {
    let raw = format!(
      "https://{}/{}/{}_{}_w.jpg",
      FLICKR_MEDIA_HOST, self.server, self.id, self.secret
    );
    Url::parse(&raw).map_err(|e| ManifestError::Url(self.id.clone(), e))
  }

  /// 仅用于日志的网页地址
  pub fn web_url(&self) -> String {
    format!("https://{}/photos/{}/{}", FLICKR_SITE_HOST, self.owner, self.id)
  }
}

/// 一个区域：清单、分析缓存与输出三个文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
  pub name: String,
  pub manifest: PathBuf,
}

impl Region {
  pub fn from_manifest_path(path: &Path) -> Option<Self> {
    if path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXTENSION) {
      return None;
    }
    let name = path.file_stem()?.to_str()?.to_string();
    Some(Region {
      name,
      manifest: path.to_path_buf(),
    })
  }

  pub fn cache_path(&self, analyses_dir: &Path) -> PathBuf {
    analyses_dir.join(format!("{}.ndjson", self.name))
  }

  pub fn output_path(&self, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}.ndjson", self.name))
  }

  pub fn load_entries(&self) -> Result<Vec<ManifestEntry>, ManifestError> {
    parse_manifest_file(&self.manifest)
  }
}

/// 列出目录下全部 `*.json` 清单，按区域名排序
pub fn discover_regions(dir: &Path) -> Result<Vec<Region>, ManifestError> {
  let read_dir = std::fs::read_dir(dir).map_err(|e| ManifestError::Io(dir.to_path_buf(), e))?;

  let mut regions = Vec::new();
  for item in read_dir {
    let item = item.map_err(|e| ManifestError::Io(dir.to_path_buf(), e))?;
    let path = item.path();
    if !path.is_file() {
      continue;
    }
    match Region::from_manifest_path(&path) {
      Some(region) => regions.push(region),
      None => debug!("忽略非清单文件: {}", path.display()),
    }
  }

  regions.sort_by(|a, b| a.name.cmp(&b.name));
  Ok(regions)
}

pub fn parse_manifest_file(path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
  let file = File::open(path).map_err(|e| ManifestError::Io(path.to_path_buf(), e))?;
  serde_json::from_reader(BufReader::new(file))
    .map_err(|e| ManifestError::Parse(path.to_path_buf(), e))
}

#[cfg(test)]
pub(crate) fn sample_entry(id: &str) -> ManifestEntry {
  ManifestEntry {
    id: id.to_string(),
    owner: "12345678@N00".to_string(),
    secret: "abcdef0123".to_string(),
    server: "65535".to_string(),
    title: format!("photo {}", id),
  }
}
