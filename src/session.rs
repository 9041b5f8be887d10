// 该文件是 Zhuanfeng （转风） 项目的一部分。
// src/session.rs - 调度会话生命周期
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
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::info;

use crate::backend::{BackendError, ClassifierFactory, ComputeMode};
use crate::dispatcher::{DispatchObserver, DispatchState, ResultListener, Shared, Worker};
use crate::frame::FrameView;
use crate::gate::{Admission, AdmissionGate};
use crate::policy::{OneWayLatencyPolicy, SwitchPolicy};

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("Initial backend unavailable: {0}")]
  Init(#[from] BackendError),
  #[error("Worker spawn failed: {0}")]
  Spawn(std::io::Error),
}

/// 会话配置
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
  /// 延迟切换阈值（毫秒）
  pub switch_threshold_ms: u64,
  /// 初始后端模式
  pub initial_mode: ComputeMode,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      switch_threshold_ms: crate::policy::DEFAULT_SWITCH_THRESHOLD_MS,
      initial_mode: ComputeMode::Accelerated,
    }
  }
}

/// 调度会话
///
/// 显式的 start/stop 生命周期，后端工厂由调用方注入。
/// 首个后端初始化失败是唯一的致命错误，由调用方中止启动。
pub struct Session {
  gate: AdmissionGate,
  shared: Arc<Shared>,
  worker: Option<JoinHandle<()>>,
}

impl Session {
  /// 以默认单向延迟策略启动会话
  pub fn start<F, L>(factory: F, listener: L, config: SessionConfig) -> Result<Self, SessionError>
  where
    F: ClassifierFactory + 'static,
    L: ResultListener + 'static,
  {
    let policy = OneWayLatencyPolicy::new(config.switch_threshold_ms);
    Self::start_with_policy(factory, listener, policy, config)
  }

  /// 以自定义切换策略启动会话
  pub fn start_with_policy<F, L, P>(
    factory: F,
    listener: L,
    policy: P,
    config: SessionConfig,
  ) -> Result<Self, SessionError>
  where
    F: ClassifierFactory + 'static,
    L: ResultListener + 'static,
    P: SwitchPolicy + Send + 'static,
  {
    info!("初始化首个后端: {}", config.initial_mode);
    let classifier = factory.initialize(config.initial_mode)?;

    let shared = Arc::new(Shared::new(DispatchState::from_mode(config.initial_mode)));
    let (jobs_tx, jobs_rx) = mpsc::channel();
    let (recycle_tx, recycle_rx) = mpsc::channel();

    let worker = Worker::new(
      jobs_rx,
      recycle_tx,
      shared.clone(),
      classifier,
      Box::new(factory),
      Box::new(policy),
      Box::new(listener),
    );

    let handle = thread::Builder::new()
      .name("zhuanfeng-infer".to_string())
      .spawn(move || worker.run())
      .map_err(SessionError::Spawn)?;

    Ok(Self {
      gate: AdmissionGate::new(shared.clone(), jobs_tx, recycle_rx),
      shared,
      worker: Some(handle),
    })
  }

  /// 提交一帧；门控占用时立即丢弃
  pub fn submit(&mut self, frame: &FrameView<'_>) -> Admission {
    self.gate.submit(frame)
  }

  /// 呈现端的只读观察者，可克隆后在其他线程读取
  pub fn observer(&self) -> DispatchObserver {
    DispatchObserver::new(self.shared.clone())
  }

  pub fn state(&self) -> DispatchState {
    self.shared.state()
  }

  /// 停止会话：关闭帧通道并等待工作线程退出
  ///
  /// 在途的 detect 调用不会被取消，而是被允许完成。
  pub fn stop(self) {
    let Self { gate, worker, .. } = self;
    // 丢弃门控即关闭帧通道，工作线程随后自行退出
    drop(gate);
    if let Some(handle) = worker {
      let _ = handle.join();
    }
    info!("调度会话已停止");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::Classifier;
  use crate::detection::{Detection, DetectionResult};
  use crate::frame::{PixelFormat, Rotation, ScratchFrame};
  use std::sync::Mutex;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::{Duration, Instant};

  struct SleepyClassifier {
    mode: ComputeMode,
    sleep: Duration,
    calls: Arc<AtomicUsize>,
  }

  impl Classifier for SleepyClassifier {
    fn mode(&self) -> ComputeMode {
      self.mode
    }

    fn detect(&mut self, _frame: &ScratchFrame) -> Result<Box<[Detection]>, BackendError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      std::thread::sleep(self.sleep);
      Ok(Box::new([]))
    }
  }

  struct SleepyFactory {
    sleep: Duration,
    fail_all: bool,
    calls: Arc<AtomicUsize>,
  }

  impl ClassifierFactory for SleepyFactory {
    fn initialize(&self, mode: ComputeMode) -> Result<Box<dyn Classifier>, BackendError> {
      if self.fail_all {
        return Err(BackendError::init(mode, "unavailable"));
      }
      Ok(Box::new(SleepyClassifier {
        mode,
        sleep: self.sleep,
        calls: self.calls.clone(),
      }))
    }
  }

  #[derive(Default)]
  struct CountingListener {
    results: Arc<Mutex<Vec<DetectionResult>>>,
  }

  impl ResultListener for CountingListener {
    fn on_result(&mut self, result: &DetectionResult) {
      self.results.lock().unwrap().push(result.clone());
    }

    fn on_error(&mut self, _message: &str) {}
  }

  fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
      assert!(Instant::now() < deadline, "timed out waiting for condition");
      std::thread::sleep(Duration::from_millis(5));
    }
  }

  fn frame_pixels() -> Vec<u8> {
    vec![0u8; 4 * 4 * 3]
  }

  #[test]
  fn first_init_failure_is_fatal() {
    let factory = SleepyFactory {
      sleep: Duration::ZERO,
      fail_all: true,
      calls: Arc::new(AtomicUsize::new(0)),
    };

    let err = Session::start(factory, CountingListener::default(), SessionConfig::default());
    assert!(matches!(err, Err(SessionError::Init(_))));
  }

  #[test]
  fn submit_delivers_result_to_observer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = SleepyFactory {
      sleep: Duration::from_millis(1),
      fail_all: false,
      calls: calls.clone(),
    };
    let listener = CountingListener::default();
    let results = listener.results.clone();

    let mut session = Session::start(factory, listener, SessionConfig::default()).unwrap();
    let observer = session.observer();
    assert_eq!(observer.state(), DispatchState::Accelerated);

    let pixels = frame_pixels();
    let frame = FrameView::new(&pixels, 4, 4, PixelFormat::Rgb888, Rotation::Deg0);
    assert_eq!(session.submit(&frame), Admission::Accepted);

    wait_until(|| observer.latest_result().is_some());
    assert!(observer.average_latency_ms().is_some());

    session.stop();
    assert_eq!(results.lock().unwrap().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn busy_gate_admits_only_the_first_frame() {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = SleepyFactory {
      sleep: Duration::from_millis(200),
      fail_all: false,
      calls: calls.clone(),
    };

    let mut session =
      Session::start(factory, CountingListener::default(), SessionConfig::default()).unwrap();
    let observer = session.observer();

    let pixels = frame_pixels();
    let frame = FrameView::new(&pixels, 4, 4, PixelFormat::Rgb888, Rotation::Deg0);

    assert_eq!(session.submit(&frame), Admission::Accepted);
    // f1 仍在推理中，f2 必须被立即丢弃且不产生 detect 调用
    assert_eq!(session.submit(&frame), Admission::Dropped);

    wait_until(|| observer.latest_result().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // 完成后门控重新开放
    wait_until(|| !session.gate.is_busy());
    assert_eq!(session.submit(&frame), Admission::Accepted);

    session.stop();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn stop_joins_worker() {
    let factory = SleepyFactory {
      sleep: Duration::ZERO,
      fail_all: false,
      calls: Arc::new(AtomicUsize::new(0)),
    };

    let session =
      Session::start(factory, CountingListener::default(), SessionConfig::default()).unwrap();
    session.stop();
  }
}
