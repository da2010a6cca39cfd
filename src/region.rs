// 该文件是 Shanxuan （山选） 项目的一部分。
// src/region.rs - 单个区域的筛选流程
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  analysis::{AnalysisEntry, AnalyzeFailure, Analyzer, ImageAnalysis},
  cache::{self, AnalysisCache, CacheError, CacheWriter},
  classify::Verdict,
  config::Config,
  manifest::{ManifestEntry, Region},
  output::{OutputError, SelectionWriter},
};

#[derive(Error, Debug)]
pub enum RegionError {
  #[error("缓存错误: {0}")]
  Cache(#[from] CacheError),
  #[error("输出错误: {0}")]
  Output(#[from] OutputError),
  #[error("分析图片 {id} 失败: {source}")]
  Service {
    id: String,
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl RegionError {
  /// 本地存储出错时继续运行其他区域没有意义
  pub fn is_fatal(&self) -> bool {
    !matches!(self, RegionError::Service { .. })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionOutcome {
  /// 达到目标数量
  Done,
  /// 清单已处理完但未达到目标数量
  Exhausted,
  /// 收到中断信号
  Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
  Passed,
  Rejected(Verdict),
  Skipped(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionSummary {
  pub region: String,
  pub outcome: RegionOutcome,
  pub passed: usize,
  pub processed: usize,
  pub api_calls: usize,
  pub skipped: usize,
  pub output: PathBuf,
}

pub struct RegionProcessor<'a, A> {
  config: &'a Config,
  analyzer: A,
  stop: Arc<AtomicBool>,
}

impl<'a, A> RegionProcessor<'a, A>
where
  A: Analyzer,
{
  pub fn new(config: &'a Config, analyzer: A) -> Self {
    RegionProcessor {
      config,
      analyzer,
      stop: Arc::new(AtomicBool::new(false)),
    }
  }

  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.stop = stop;
    self
  }

  pub fn process(
    &self,
    region: &Region,
    entries: &[ManifestEntry],
  ) -> Result<RegionSummary, RegionError> {
    info!("处理区域 {}", region.name);

    let cache_path = region.cache_path(&self.config.analyses_dir);
    let cached = cache::load(&cache_path)?;
    let mut cache_writer = CacheWriter::open(&cache_path)?;
    let mut output = SelectionWriter::create(&region.output_path(&self.config.out_dir))?;

    let mut summary = RegionSummary {
      region: region.name.clone(),
      outcome: RegionOutcome::Exhausted,
      passed: 0,
      processed: 0,
      api_calls: 0,
      skipped: 0,
      output: output.path().to_path_buf(),
    };

    let target = self.config.target_count;
    for entry in entries {
      if summary.passed >= target {
        break;
      }
      if self.stop.load(Ordering::SeqCst) {
        warn!("收到中断信号，停止处理区域 {}", region.name);
        summary.outcome = RegionOutcome::Interrupted;
        break;
      }

      let outcome = self.process_entry(entry, &cached, &mut cache_writer, &mut summary)?;
      match &outcome {
        EntryOutcome::Passed => {
          summary.passed += 1;
          output.write_id(&entry.id)?;
          info!(
            "{}/{} OK {} {}",
            summary.passed,
            target,
            entry.web_url(),
            entry.title
          );
        }
        EntryOutcome::Rejected(verdict) => {
          info!(
            "{}/{} NG {} {}: {}",
            summary.passed,
            target,
            entry.web_url(),
            entry.title,
            verdict
          );
        }
        EntryOutcome::Skipped(reason) => {
          summary.skipped += 1;
          warn!(
            "{}/{} SKIP {} {}: {}",
            summary.passed,
            target,
            entry.web_url(),
            entry.title,
            reason
          );
        }
      }

      summary.processed += 1;
    }

    if summary.passed >= target {
      summary.outcome = RegionOutcome::Done;
    }

    let written = output.written();
    let path = output.finish()?;
    info!("写入 {}（{} 条）", path.display(), written);
    info!(
      "处理 {} 条后找到 {} 条（{} 次 API 调用，跳过 {} 条）",
      summary.processed, summary.passed, summary.api_calls, summary.skipped
    );

    Ok(summary)
  }

  /// 先查缓存，未命中时调用分析服务并立即追加到缓存
  fn process_entry(
    &self,
    entry: &ManifestEntry,
    cached: &AnalysisCache,
    cache_writer: &mut CacheWriter,
    summary: &mut RegionSummary,
  ) -> Result<EntryOutcome, RegionError> {
    let analysis = match cached.get(&entry.id) {
      Some(existing) => &existing.analysis,
      None => {
        if self.config.offline {
          return Ok(EntryOutcome::Skipped("离线模式下没有缓存的分析".to_string()));
        }

        let image_url = match entry.preview_url() {
          Ok(url) => url,
          Err(e) => return Ok(EntryOutcome::Skipped(e.to_string())),
        };

        summary.api_calls += 1;
        let analysis = match self.analyzer.analyze(&image_url) {
          Ok(analysis) => analysis,
          Err(e) if e.is_entry_specific() => {
            return Ok(EntryOutcome::Skipped(e.to_string()));
          }
          Err(e) => {
            error!("分析图片 {} 失败: {}", entry.id, e);
            return Err(RegionError::Service {
              id: entry.id.clone(),
              source: Box::new(e),
            });
          }
        };

        let record = AnalysisEntry {
          picture: entry.clone(),
          analysis,
        };
        cache_writer.append(&record)?;
        return Ok(self.judge(&record.analysis));
      }
    };

    Ok(self.judge(analysis))
  }

  fn judge(&self, analysis: &ImageAnalysis) -> EntryOutcome {
    let verdict = self.config.rules.classify(analysis);
    if verdict.passed() {
      EntryOutcome::Passed
    } else {
      EntryOutcome::Rejected(verdict)
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::analysis::{ImageMetadata, Tag};
  use crate::manifest::sample_entry;
  use crate::output::read_selection;
  use std::cell::RefCell;
  use std::collections::HashMap;
  use tempfile::TempDir;
  use url::Url;

  #[derive(Debug, thiserror::Error)]
  pub enum FakeError {
    #[error("image rejected")]
    Rejected,
    #[error("service down")]
    Down,
  }

  impl AnalyzeFailure for FakeError {
    fn is_entry_specific(&self) -> bool {
      matches!(self, FakeError::Rejected)
    }
  }

  /// 按图片 id 返回预设结果，并记录调用过的 id
  #[derive(Default)]
  pub struct FakeAnalyzer {
    pub results: HashMap<String, Result<ImageAnalysis, fn() -> FakeError>>,
    pub calls: RefCell<Vec<String>>,
  }

  impl FakeAnalyzer {
    pub fn with(mut self, id: &str, analysis: ImageAnalysis) -> Self {
      self.results.insert(id.to_string(), Ok(analysis));
      self
    }

    pub fn failing(mut self, id: &str, error: fn() -> FakeError) -> Self {
      self.results.insert(id.to_string(), Err(error));
      self
    }

    pub fn calls(&self) -> Vec<String> {
      self.calls.borrow().clone()
    }
  }

  impl Analyzer for FakeAnalyzer {
    type Error = FakeError;

    fn analyze(&self, image_url: &Url) -> Result<ImageAnalysis, Self::Error> {
      // 预览地址形如 .../<server>/<id>_<secret>_w.jpg
      let file = image_url.path_segments().and_then(|s| s.last()).unwrap_or_default();
      let id = file.split('_').next().unwrap_or_default().to_string();
      self.calls.borrow_mut().push(id.clone());
      match self.results.get(&id) {
        Some(Ok(analysis)) => Ok(analysis.clone()),
        Some(Err(error)) => Err(error()),
        None => Err(FakeError::Down),
      }
    }
  }

  pub fn scenic() -> ImageAnalysis {
    let tag = |name: &str, confidence| Tag {
      name: name.to_string(),
      confidence,
    };
    ImageAnalysis {
      tags: vec![
        tag("outdoor", 0.9),
        tag("nature", 0.85),
        tag("mountain", 0.9),
        tag("sky", 0.95),
      ],
      metadata: ImageMetadata {
        width: 100,
        height: 100,
        format: "Jpeg".to_string(),
      },
      ..Default::default()
    }
  }

  pub fn dull() -> ImageAnalysis {
    let mut analysis = scenic();
    analysis.tags[1].confidence = 0.5;
    analysis
  }

  struct Fixture {
    _dir: TempDir,
    config: Config,
    region: Region,
  }

  fn fixture(target_count: usize) -> Fixture {
    let dir = TempDir::new().unwrap();
    let config = Config::new(target_count).unwrap().with_dirs(
      dir.path().join("ingest_manifests"),
      dir.path().join("analyses"),
      dir.path().join("out"),
    );
    std::fs::create_dir_all(&config.analyses_dir).unwrap();
    std::fs::create_dir_all(&config.out_dir).unwrap();
    let region = Region {
      name: "alps".to_string(),
      manifest: config.manifests_dir.join("alps.json"),
    };
    Fixture {
      _dir: dir,
      config,
      region,
    }
  }

  fn entries(ids: &[&str]) -> Vec<ManifestEntry> {
    ids.iter().map(|id| sample_entry(id)).collect()
  }

  #[test]
  fn test_single_passing_entry() {
    let f = fixture(5);
    let analyzer = FakeAnalyzer::default().with("1", scenic());

    let summary = RegionProcessor::new(&f.config, &analyzer)
      .process(&f.region, &entries(&["1"]))
      .unwrap();

    assert_eq!(summary.outcome, RegionOutcome::Exhausted);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.api_calls, 1);
    assert_eq!(read_selection(&summary.output).unwrap(), vec!["1"]);
  }

  #[test]
  fn test_cached_entry_is_not_refetched() {
    let f = fixture(5);
    let cache_path = f.region.cache_path(&f.config.analyses_dir);
    let mut cached = scenic();
    cached.tags.push(Tag {
      name: "lake".to_string(),
      confidence: 0.42,
    });
    CacheWriter::open(&cache_path)
      .unwrap()
      .append(&AnalysisEntry {
        picture: sample_entry("1"),
        analysis: cached.clone(),
      })
      .unwrap();
    let before = std::fs::read(&cache_path).unwrap();

    let analyzer = FakeAnalyzer::default().with("1", dull());
    let summary = RegionProcessor::new(&f.config, &analyzer)
      .process(&f.region, &entries(&["1"]))
      .unwrap();

    assert!(analyzer.calls().is_empty());
    assert_eq!(summary.api_calls, 0);
    assert_eq!(summary.passed, 1);
    assert_eq!(std::fs::read(&cache_path).unwrap(), before);
    assert_eq!(cache::load(&cache_path).unwrap()["1"].analysis, cached);
  }

  #[test]
  fn test_fetch_is_appended_once() {
    let f = fixture(5);
    let analyzer = FakeAnalyzer::default().with("1", scenic()).with("2", dull());
    let processor = RegionProcessor::new(&f.config, &analyzer);

    processor.process(&f.region, &entries(&["1", "2"])).unwrap();
    let summary = processor.process(&f.region, &entries(&["1", "2"])).unwrap();

    assert_eq!(analyzer.calls(), vec!["1", "2"]);
    assert_eq!(summary.api_calls, 0);

    let cache_path = f.region.cache_path(&f.config.analyses_dir);
    let content = std::fs::read_to_string(&cache_path).unwrap();
    assert_eq!(content.lines().count(), 2);
    let cache = cache::load(&cache_path).unwrap();
    assert_eq!(cache["2"].analysis, dull());
  }

  #[test]
  fn test_stops_at_target() {
    let f = fixture(2);
    let analyzer = FakeAnalyzer::default()
      .with("1", scenic())
      .with("2", dull())
      .with("3", scenic())
      .with("4", scenic())
      .with("5", scenic());

    let summary = RegionProcessor::new(&f.config, &analyzer)
      .process(&f.region, &entries(&["1", "2", "3", "4", "5"]))
      .unwrap();

    assert_eq!(summary.outcome, RegionOutcome::Done);
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.processed, 3);
    assert_eq!(analyzer.calls(), vec!["1", "2", "3"]);
    assert_eq!(read_selection(&summary.output).unwrap(), vec!["1", "3"]);
  }

  #[test]
  fn test_output_truncated_each_run() {
    let f = fixture(1);
    let analyzer = FakeAnalyzer::default().with("1", dull()).with("2", scenic());
    let processor = RegionProcessor::new(&f.config, &analyzer);

    let first = processor.process(&f.region, &entries(&["2"])).unwrap();
    assert_eq!(read_selection(&first.output).unwrap(), vec!["2"]);

    let second = processor.process(&f.region, &entries(&["1"])).unwrap();
    assert_eq!(second.outcome, RegionOutcome::Exhausted);
    assert!(read_selection(&second.output).unwrap().is_empty());
  }

  #[test]
  fn test_entry_specific_failure_is_skipped() {
    let f = fixture(5);
    let analyzer = FakeAnalyzer::default()
      .failing("1", || FakeError::Rejected)
      .with("2", scenic());

    let summary = RegionProcessor::new(&f.config, &analyzer)
      .process(&f.region, &entries(&["1", "2"]))
      .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.api_calls, 2);
    assert_eq!(analyzer.calls(), vec!["1", "2"]);
    assert_eq!(read_selection(&summary.output).unwrap(), vec!["2"]);

    let cache = cache::load(&f.region.cache_path(&f.config.analyses_dir)).unwrap();
    assert!(!cache.contains_key("1"));
  }

  #[test]
  fn test_service_failure_keeps_progress() {
    let f = fixture(5);
    let analyzer = FakeAnalyzer::default()
      .with("1", scenic())
      .failing("2", || FakeError::Down)
      .with("3", scenic());

    let err = RegionProcessor::new(&f.config, &analyzer)
      .process(&f.region, &entries(&["1", "2", "3"]))
      .unwrap_err();

    assert!(matches!(&err, RegionError::Service { id, .. } if id == "2"));
    assert!(!err.is_fatal());
    assert_eq!(analyzer.calls(), vec!["1", "2"]);

    let cache = cache::load(&f.region.cache_path(&f.config.analyses_dir)).unwrap();
    assert_eq!(cache.len(), 1);
    assert!(cache.contains_key("1"));
    let output = f.region.output_path(&f.config.out_dir);
    assert_eq!(read_selection(&output).unwrap(), vec!["1"]);
  }

  #[test]
  fn test_offline_skips_cache_misses() {
    let f = fixture(5);
    let config = f.config.clone().offline(true);
    CacheWriter::open(&f.region.cache_path(&config.analyses_dir))
      .unwrap()
      .append(&AnalysisEntry {
        picture: sample_entry("2"),
        analysis: scenic(),
      })
      .unwrap();

    let analyzer = FakeAnalyzer::default().with("1", scenic());
    let summary = RegionProcessor::new(&config, &analyzer)
      .process(&f.region, &entries(&["1", "2"]))
      .unwrap();

    assert!(analyzer.calls().is_empty());
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.passed, 1);
  }

  struct NeverCalled;

  impl Analyzer for NeverCalled {
    type Error = std::convert::Infallible;

    fn analyze(&self, image_url: &Url) -> Result<ImageAnalysis, Self::Error> {
      panic!("offline run reached the analyzer for {}", image_url)
    }
  }

  #[test]
  fn test_offline_never_reaches_analyzer() {
    let f = fixture(2);
    let config = f.config.clone().offline(true);

    let summary = RegionProcessor::new(&config, NeverCalled)
      .process(&f.region, &entries(&["1", "2", "3"]))
      .unwrap();

    assert_eq!(summary.outcome, RegionOutcome::Exhausted);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.api_calls, 0);
  }

  #[test]
  fn test_stop_flag_interrupts() {
    let f = fixture(5);
    let analyzer = FakeAnalyzer::default().with("1", scenic());
    let stop = Arc::new(AtomicBool::new(true));

    let summary = RegionProcessor::new(&f.config, &analyzer)
      .with_stop_flag(stop)
      .process(&f.region, &entries(&["1"]))
      .unwrap();

    assert_eq!(summary.outcome, RegionOutcome::Interrupted);
    assert_eq!(summary.processed, 0);
    assert!(analyzer.calls().is_empty());
  }

  #[test]
  fn test_corrupted_cache_is_fatal() {
    let f = fixture(5);
    std::fs::write(f.region.cache_path(&f.config.analyses_dir), "not json\n").unwrap();

    let analyzer = FakeAnalyzer::default();
    let err = RegionProcessor::new(&f.config, &analyzer)
      .process(&f.region, &entries(&["1"]))
      .unwrap_err();

    assert!(matches!(err, RegionError::Cache(CacheError::Corrupted { .. })));
    assert!(err.is_fatal());
  }
}
