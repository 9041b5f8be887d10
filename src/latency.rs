// 该文件是 Zhuanfeng （转风） 项目的一部分。
// src/latency.rs - 推理延迟统计
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

/// 推理延迟记录
///
/// 只追加的样本序列（毫秒），以及整个会话期间的精确算术平均值。
/// 样本只由推理工作线程的成功路径追加，出错的帧不会进入记录。
#[derive(Debug, Default)]
pub struct LatencyTracker {
  samples: Vec<u64>,
}

impl LatencyTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// 追加一个样本并返回会话开始以来的平均延迟
  pub fn record(&mut self, sample_ms: u64) -> f64 {
    self.samples.push(sample_ms);
    let sum: u64 = self.samples.iter().sum();
    sum as f64 / self.samples.len() as f64
  }

  /// 当前平均延迟；尚无样本时为 None
  pub fn average(&self) -> Option<f64> {
    if self.samples.is_empty() {
      return None;
    }
    let sum: u64 = self.samples.iter().sum();
    Some(sum as f64 / self.samples.len() as f64)
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn samples(&self) -> &[u64] {
    &self.samples
  }
}
