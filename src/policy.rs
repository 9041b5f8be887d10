// 该文件是 Zhuanfeng （转风） 项目的一部分。
// src/policy.rs - 后端切换策略
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::backend::ComputeMode;

/// 默认切换阈值（毫秒）
pub const DEFAULT_SWITCH_THRESHOLD_MS: u64 = 1000;

/// 切换策略接口
///
/// 策略与调度器解耦，可替换为带迟滞的双向策略而无需改动调度器。
pub trait SwitchPolicy {
  /// 根据最新延迟样本与当前模式判定是否切换，返回目标模式
  fn evaluate(&mut self, sample_ms: u64, current: ComputeMode) -> Option<ComputeMode>;
}

/// 单向延迟策略
///
/// 延迟超过阈值时从加速模式降级到通用模式，且只降级一次：
/// 一旦触发过，后续无论延迟如何都不再评估（避免振荡）。
/// 切换失败也不自动重试。
#[derive(Debug)]
pub struct OneWayLatencyPolicy {
  threshold_ms: u64,
  tripped: bool,
}

impl OneWayLatencyPolicy {
  pub fn new(threshold_ms: u64) -> Self {
    Self {
      threshold_ms,
      tripped: false,
    }
  }

  pub fn threshold_ms(&self) -> u64 {
    self.threshold_ms
  }
}

impl Default for OneWayLatencyPolicy {
  fn default() -> Self {
    Self::new(DEFAULT_SWITCH_THRESHOLD_MS)
  }
}

impl SwitchPolicy for OneWayLatencyPolicy {
  fn evaluate(&mut self, sample_ms: u64, current: ComputeMode) -> Option<ComputeMode> {
    if self.tripped || current != ComputeMode::Accelerated {
      return None;
    }

    if sample_ms > self.threshold_ms {
      self.tripped = true;
      return Some(ComputeMode::GeneralPurpose);
    }

    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trips_once_above_threshold() {
    let mut policy = OneWayLatencyPolicy::new(1000);

    assert_eq!(policy.evaluate(200, ComputeMode::Accelerated), None);
    assert_eq!(
      policy.evaluate(1500, ComputeMode::Accelerated),
      Some(ComputeMode::GeneralPurpose)
    );
    assert_eq!(policy.evaluate(300, ComputeMode::GeneralPurpose), None);
  }

  #[test]
  fn never_fires_again_after_tripping() {
    let mut policy = OneWayLatencyPolicy::new(1000);
    assert!(policy.evaluate(5000, ComputeMode::Accelerated).is_some());

    // 即使后续延迟再次超过阈值，也不再评估
    assert_eq!(policy.evaluate(9999, ComputeMode::Accelerated), None);
    assert_eq!(policy.evaluate(9999, ComputeMode::GeneralPurpose), None);
  }

  #[test]
  fn exact_threshold_does_not_trip() {
    let mut policy = OneWayLatencyPolicy::new(1000);
    assert_eq!(policy.evaluate(1000, ComputeMode::Accelerated), None);
  }

  #[test]
  fn ignores_general_purpose_mode() {
    let mut policy = OneWayLatencyPolicy::new(1000);
    assert_eq!(policy.evaluate(5000, ComputeMode::GeneralPurpose), None);
    // 在通用模式下未触发，策略仍保持待命
    assert_eq!(
      policy.evaluate(1500, ComputeMode::Accelerated),
      Some(ComputeMode::GeneralPurpose)
    );
  }
}
