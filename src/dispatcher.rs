// 该文件是 Zhuanfeng （转风） 项目的一部分。
// src/dispatcher.rs - 推理调度核心
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

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::backend::{Classifier, ClassifierFactory, ComputeMode};
use crate::detection::DetectionResult;
use crate::frame::ScratchFrame;
use crate::latency::LatencyTracker;
use crate::policy::SwitchPolicy;

/// 结果监听器
///
/// 两个回调槽，每个被接收的帧至多触发其中一个一次，始终在推理工作线程
/// 上交付（单线程交付上下文）。出错的帧只触发 on_error，不产生零延迟的
/// 假结果。
pub trait ResultListener: Send {
  fn on_result(&mut self, result: &DetectionResult);
  fn on_error(&mut self, message: &str);
}

/// 调度器状态机
///
/// Switching 只在同步构建替换后端的窗口内出现；GeneralPurpose 是吸收态，
/// 没有转出的迁移。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
  Accelerated,
  Switching,
  GeneralPurpose,
}

impl DispatchState {
  pub(crate) fn from_mode(mode: ComputeMode) -> Self {
    match mode {
      ComputeMode::Accelerated => DispatchState::Accelerated,
      ComputeMode::GeneralPurpose => DispatchState::GeneralPurpose,
    }
  }

  fn to_u8(self) -> u8 {
    match self {
      DispatchState::Accelerated => 0,
      DispatchState::Switching => 1,
      DispatchState::GeneralPurpose => 2,
    }
  }

  fn from_u8(raw: u8) -> Self {
    match raw {
      0 => DispatchState::Accelerated,
      1 => DispatchState::Switching,
      _ => DispatchState::GeneralPurpose,
    }
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 门控、工作线程与观察者共享的状态
///
/// busy 是采集路径（读写）与工作线程（写）之间唯一的共享标志，
/// 其余字段只由工作线程写入、由观察者读取。
pub(crate) struct Shared {
  busy: AtomicBool,
  state: AtomicU8,
  latest: Mutex<Option<DetectionResult>>,
  average_ms: Mutex<Option<f64>>,
}

impl Shared {
  pub(crate) fn new(state: DispatchState) -> Self {
    Self {
      busy: AtomicBool::new(false),
      state: AtomicU8::new(state.to_u8()),
      latest: Mutex::new(None),
      average_ms: Mutex::new(None),
    }
  }

  /// 尝试占用门控；已占用时返回 false
  pub(crate) fn try_acquire(&self) -> bool {
    self
      .busy
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  pub(crate) fn release_busy(&self) {
    self.busy.store(false, Ordering::Release);
  }

  pub(crate) fn is_busy(&self) -> bool {
    self.busy.load(Ordering::Acquire)
  }

  pub(crate) fn set_state(&self, state: DispatchState) {
    self.state.store(state.to_u8(), Ordering::Release);
  }

  pub(crate) fn state(&self) -> DispatchState {
    DispatchState::from_u8(self.state.load(Ordering::Acquire))
  }

  fn publish(&self, result: DetectionResult, average_ms: f64) {
    // 先写平均值再发布结果，观察者看到结果时平均值一定已就绪
    *lock(&self.average_ms) = Some(average_ms);
    *lock(&self.latest) = Some(result);
  }

  fn latest_result(&self) -> Option<DetectionResult> {
    lock(&self.latest).clone()
  }

  fn average_latency_ms(&self) -> Option<f64> {
    *lock(&self.average_ms)
  }
}

/// 呈现端的只读观察者
///
/// 暴露最新检测结果与平均延迟，没有反向的命令通道。
#[derive(Clone)]
pub struct DispatchObserver {
  shared: Arc<Shared>,
}

impl DispatchObserver {
  pub(crate) fn new(shared: Arc<Shared>) -> Self {
    Self { shared }
  }

  pub fn latest_result(&self) -> Option<DetectionResult> {
    self.shared.latest_result()
  }

  pub fn average_latency_ms(&self) -> Option<f64> {
    self.shared.average_latency_ms()
  }

  pub fn state(&self) -> DispatchState {
    self.shared.state()
  }
}

/// 推理工作线程
///
/// 单线程串行处理帧，保证同一后端上至多一个在途 detect 调用，
/// 结果按接收顺序交付。
pub(crate) struct Worker {
  jobs: Receiver<ScratchFrame>,
  recycle: Sender<ScratchFrame>,
  shared: Arc<Shared>,
  classifier: Box<dyn Classifier>,
  factory: Box<dyn ClassifierFactory>,
  policy: Box<dyn SwitchPolicy + Send>,
  tracker: LatencyTracker,
  listener: Box<dyn ResultListener>,
}

impl Worker {
  pub(crate) fn new(
    jobs: Receiver<ScratchFrame>,
    recycle: Sender<ScratchFrame>,
    shared: Arc<Shared>,
    classifier: Box<dyn Classifier>,
    factory: Box<dyn ClassifierFactory>,
    policy: Box<dyn SwitchPolicy + Send>,
    listener: Box<dyn ResultListener>,
  ) -> Self {
    Self {
      jobs,
      recycle,
      shared,
      classifier,
      factory,
      policy,
      tracker: LatencyTracker::new(),
      listener,
    }
  }

  pub(crate) fn run(mut self) {
    info!("推理工作线程启动，初始后端: {}", self.classifier.mode());

    while let Ok(scratch) = self.jobs.recv() {
      self.process(scratch);
    }

    info!("帧通道关闭，推理工作线程退出");
  }

  fn process(&mut self, scratch: ScratchFrame) {
    let started = Instant::now();

    match self.classifier.detect(&scratch) {
      Ok(detections) => {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let result = DetectionResult {
          inference_time_ms: elapsed_ms,
          detections,
        };

        let average_ms = self.tracker.record(elapsed_ms);
        debug!(
          "推理完成，耗时: {} ms, 平均: {:.2} ms, 检测到 {} 个目标",
          elapsed_ms,
          average_ms,
          result.detections.len()
        );

        self.shared.publish(result.clone(), average_ms);
        self.listener.on_result(&result);

        if let Some(target) = self.policy.evaluate(elapsed_ms, self.classifier.mode()) {
          self.switch_to(target);
        }
      }
      Err(err) => {
        // 出错的帧被丢弃：不记录延迟，也不评估切换策略
        warn!("推理失败，丢弃该帧: {}", err);
        self.listener.on_error(&err.to_string());
      }
    }

    // 缓冲区归还门控复用，然后释放门控
    let _ = self.recycle.send(scratch);
    self.shared.release_busy();
  }

  fn switch_to(&mut self, target: ComputeMode) {
    self.shared.set_state(DispatchState::Switching);
    info!(
      "推理延迟超过阈值，切换后端: {} -> {}",
      self.classifier.mode(),
      target
    );

    match self.factory.initialize(target) {
      Ok(replacement) => {
        // 旧实例在此被替换，不再接收任何帧；资源释放由后端自身负责
        self.classifier = replacement;
        self.shared.set_state(DispatchState::from_mode(target));
        info!("后端切换完成: {}", target);
      }
      Err(err) => {
        // 切换失败：保持原后端继续推理，错误经监听器上报，不自动重试
        error!("后端切换失败，继续使用 {}: {}", self.classifier.mode(), err);
        self
          .shared
          .set_state(DispatchState::from_mode(self.classifier.mode()));
        self.listener.on_error(&err.to_string());
      }
    }
  }
}
