// 该文件是 Shanxuan （山选） 项目的一部分。
// src/cache.rs - 分析结果缓存（仅追加的 NDJSON 日志）
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::analysis::AnalysisEntry;

#[derive(Error, Debug)]
pub enum CacheError {
  #[error("分析缓存 {0} I/O 错误: {1}")]
  Io(PathBuf, std::io::Error),
  #[error("分析缓存 {path} 第 {line} 行损坏: {source}")]
  Corrupted {
    path: PathBuf,
    line: usize,
    source: serde_json::Error,
  },
  #[error("分析记录序列化失败: {0}")]
  Encode(#[from] serde_json::Error),
}

pub type AnalysisCache = HashMap<String, AnalysisEntry>;

/// 读取已有分析。文件不存在时返回空表；同一 id 出现多次时以文件中靠后的记录为准。
pub fn load(path: &Path) -> Result<AnalysisCache, CacheError> {
  let file = match File::open(path) {
    Ok(file) => file,
    Err(e) if e.kind() == ErrorKind::NotFound => {
      debug!("分析缓存不存在: {}", path.display());
      return Ok(AnalysisCache::new());
    }
    Err(e) => return Err(CacheError::Io(path.to_path_buf(), e)),
  };

  let mut cache = AnalysisCache::new();
  for (index, line) in BufReader::new(file).lines().enumerate() {
    let line = line.map_err(|e| CacheError::Io(path.to_path_buf(), e))?;
    if line.trim().is_empty() {
      continue;
    }
    let entry: AnalysisEntry =
      serde_json::from_str(&line).map_err(|source| CacheError::Corrupted {
        path: path.to_path_buf(),
        line: index + 1,
        source,
      })?;
    cache.insert(entry.picture.id.clone(), entry);
  }

  info!("从 {} 读取到 {} 条已有分析", path.display(), cache.len());
  Ok(cache)
}

/// 缓存追加端，每条记录写入后立即落盘
pub struct CacheWriter {
  path: PathBuf,
  file: File,
}

impl CacheWriter {
  pub fn open(path: &Path) -> Result<Self, CacheError> {
    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(path)
      .map_err(|e| CacheError::Io(path.to_path_buf(), e))?;
    Ok(CacheWriter {
      path: path.to_path_buf(),
      file,
    })
  }

  pub fn append(&mut self, entry: &AnalysisEntry) -> Result<(), CacheError> {
    let mut record = serde_json::to_vec(entry)?;
    record.push(b'\n');
    self
      .file
      .write_all(&record)
      .and_then(|_| self.file.sync_data())
      .map_err(|e| CacheError::Io(self.path.clone(), e))
  }
}
