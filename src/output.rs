// 该文件是 Shanxuan （山选） 项目的一部分。
// src/output.rs - 本次选中图片的输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("写入输出 {0} 失败: {1}")]
  Io(PathBuf, std::io::Error),
  #[error("输出序列化失败: {0}")]
  Encode(#[from] serde_json::Error),
}

/// 每行一个 JSON 字符串形式的图片 id。每次运行都会截断重写，
/// 每行写完即刷新，中途出错时已选中的 id 仍留在文件里。
pub struct SelectionWriter {
  path: PathBuf,
  writer: BufWriter<File>,
  written: usize,
}

impl SelectionWriter {
  pub fn create(path: &Path) -> Result<Self, OutputError> {
    let file = File::create(path).map_err(|e| OutputError::Io(path.to_path_buf(), e))?;
    Ok(SelectionWriter {
      path: path.to_path_buf(),
      writer: BufWriter::new(file),
      written: 0,
    })
  }

  pub fn write_id(&mut self, id: &str) -> Result<(), OutputError> {
    serde_json::to_writer(&mut self.writer, id)?;
    self
      .writer
      .write_all(b"\n")
      .and_then(|_| self.writer.flush())
      .map_err(|e| OutputError::Io(self.path.clone(), e))?;
    self.written += 1;
    Ok(())
  }

  pub fn written(&self) -> usize {
    self.written
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn finish(mut self) -> Result<PathBuf, OutputError> {
    self
      .writer
      .flush()
      .map_err(|e| OutputError::Io(self.path.clone(), e))?;
    Ok(self.path)
  }
}

/// 读回输出文件中的 id 列表
pub fn read_selection(path: &Path) -> Result<Vec<String>, OutputError> {
  let content =
    std::fs::read_to_string(path).map_err(|e| OutputError::Io(path.to_path_buf(), e))?;
  content
    .lines()
    .filter(|line| !line.trim().is_empty())
    .map(|line| serde_json::from_str(line).map_err(OutputError::from))
    .collect()
}
