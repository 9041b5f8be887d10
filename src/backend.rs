// 该文件是 Zhuanfeng （转风） 项目的一部分。
// src/backend.rs - 推理后端能力定义
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

use thiserror::Error;

use crate::detection::Detection;
use crate::frame::ScratchFrame;

/// 后端计算模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeMode {
  /// 专用硬件加速
  Accelerated,
  /// 通用计算回退
  GeneralPurpose,
}

impl ComputeMode {
  pub fn label(self) -> &'static str {
    match self {
      ComputeMode::Accelerated => "accelerated",
      ComputeMode::GeneralPurpose => "general-purpose",
    }
  }
}

impl std::fmt::Display for ComputeMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Error, Debug)]
pub enum BackendError {
  #[error("Backend init failed ({mode}): {reason}")]
  Init { mode: ComputeMode, reason: String },
  #[error("Detect failed: {0}")]
  Detect(String),
}

impl BackendError {
  pub fn init(mode: ComputeMode, reason: impl Into<String>) -> Self {
    BackendError::Init {
      mode,
      reason: reason.into(),
    }
  }
}

/// 推理内核能力
///
/// 模型本身是外部协作者，这里只消费其固定接口。串行工作线程保证同一
/// 实例上同时至多一个 detect 调用。
pub trait Classifier: Send {
  /// 该实例绑定的计算模式
  fn mode(&self) -> ComputeMode;

  /// 对一帧执行检测
  fn detect(&mut self, frame: &ScratchFrame) -> Result<Box<[Detection]>, BackendError>;
}

/// 后端工厂
///
/// 由会话所有者注入，控制器通过它创建并初始化后端实例。
/// initialize 允许阻塞，调用方负责在采集线程之外执行。
pub trait ClassifierFactory: Send {
  fn initialize(&self, mode: ComputeMode) -> Result<Box<dyn Classifier>, BackendError>;
}
