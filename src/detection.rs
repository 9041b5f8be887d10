// 该文件是 Zhuanfeng （转风） 项目的一部分。
// src/detection.rs - 检测结果定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

/// 类别与置信度
#[derive(Debug, Clone)]
pub struct Category {
  /// 类别名称
  pub label: String,
  /// 置信度
  pub score: f32,
}

/// 单个检测目标
#[derive(Debug, Clone)]
pub struct Detection {
  /// 边界框 [x_min, y_min, x_max, y_max]
  pub bbox: [f32; 4],
  /// 类别列表（按置信度降序）
  pub categories: Box<[Category]>,
}

impl Detection {
  /// 置信度最高的类别
  pub fn best_category(&self) -> Option<&Category> {
    self.categories.first()
  }
}

/// 一帧的检测结果
///
/// 每个被接收的帧恰好产生一个结果，由推理工作线程异步交付。
#[derive(Debug, Clone)]
pub struct DetectionResult {
  /// 推理耗时（毫秒）
  pub inference_time_ms: u64,
  /// 检测目标列表
  pub detections: Box<[Detection]>,
}
