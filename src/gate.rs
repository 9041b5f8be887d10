// 该文件是 Zhuanfeng （转风） 项目的一部分。
// src/gate.rs - 帧准入门控
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

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};

use tracing::debug;

use crate::dispatcher::Shared;
use crate::frame::{FrameView, ScratchFrame};

/// 准入结果
///
/// Dropped 不是错误，而是最新帧优先策略下的正常淘汰。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
  Accepted,
  Dropped,
}

/// 帧准入门控
///
/// 保证同一时刻至多一帧在途：门控占用期间到达的新帧立即丢弃，
/// submit 永不阻塞等待推理完成，采集管线因此不会被推理拖住。
pub struct AdmissionGate {
  shared: Arc<Shared>,
  jobs: Sender<ScratchFrame>,
  recycle: Receiver<ScratchFrame>,
}

impl AdmissionGate {
  pub(crate) fn new(
    shared: Arc<Shared>,
    jobs: Sender<ScratchFrame>,
    recycle: Receiver<ScratchFrame>,
  ) -> Self {
    Self {
      shared,
      jobs,
      recycle,
    }
  }

  /// 提交一帧
  ///
  /// 接收时把像素复制进复用缓冲区后立刻返回，借用帧可随即由采集方释放。
  /// 门控保持占用直到工作线程报告该帧完成（成功或出错）。
  pub fn submit(&mut self, frame: &FrameView<'_>) -> Admission {
    if !self.shared.try_acquire() {
      debug!("门控占用中，丢弃新帧");
      return Admission::Dropped;
    }

    // 复用上一帧归还的缓冲区；首次使用时才分配
    let mut scratch = self.recycle.try_recv().unwrap_or_default();
    scratch.copy_from(frame);

    if self.jobs.send(scratch).is_err() {
      // 工作线程已退出，静默丢弃
      debug!("推理工作线程不可用，丢弃帧");
      self.shared.release_busy();
      return Admission::Dropped;
    }

    Admission::Accepted
  }

  /// 门控是否占用中
  pub fn is_busy(&self) -> bool {
    self.shared.is_busy()
  }
}
