// 该文件是 Zhuanfeng （转风） 项目的一部分。
// src/bin/simulate_stream.rs - 模拟视频流调度演示
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

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use zhuanfeng::{
  Admission, BackendError, Category, Classifier, ClassifierFactory, ComputeMode, Detection,
  DetectionResult, FrameView, PixelFormat, ResultListener, Rotation, ScratchFrame, Session,
  SessionConfig,
};

/// 模拟视频流的调度演示参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// 延迟切换阈值（毫秒）
  #[arg(long, default_value = "1000", value_name = "MS")]
  threshold_ms: u64,

  /// 模拟帧率
  #[arg(long, default_value = "30", value_name = "FPS")]
  fps: u32,

  /// 模拟帧数（0 表示无限制）
  #[arg(long, default_value = "300", value_name = "COUNT")]
  frames: u64,

  /// 加速后端从第几帧开始退化
  #[arg(long, default_value = "60", value_name = "COUNT")]
  degrade_after: u64,

  /// 加速后端正常的推理耗时（毫秒）
  #[arg(long, default_value = "15", value_name = "MS")]
  fast_ms: u64,

  /// 加速后端退化后的推理耗时（毫秒）
  #[arg(long, default_value = "1200", value_name = "MS")]
  degraded_ms: u64,

  /// 通用后端的稳定推理耗时（毫秒）
  #[arg(long, default_value = "80", value_name = "MS")]
  fallback_ms: u64,
}

/// 模拟推理后端：加速模式在处理若干帧后开始退化
struct SimulatedClassifier {
  mode: ComputeMode,
  frames_seen: u64,
  degrade_after: u64,
  fast_ms: u64,
  degraded_ms: u64,
  fallback_ms: u64,
}

impl Classifier for SimulatedClassifier {
  fn mode(&self) -> ComputeMode {
    self.mode
  }

  fn detect(&mut self, frame: &ScratchFrame) -> Result<Box<[Detection]>, BackendError> {
    self.frames_seen += 1;

    let sleep_ms = match self.mode {
      ComputeMode::Accelerated if self.frames_seen > self.degrade_after => self.degraded_ms,
      ComputeMode::Accelerated => self.fast_ms,
      ComputeMode::GeneralPurpose => self.fallback_ms,
    };
    thread::sleep(Duration::from_millis(sleep_ms));

    // 固定返回一个居中的 person 检测
    let w = frame.width() as f32;
    let h = frame.height() as f32;
    Ok(Box::new([Detection {
      bbox: [w * 0.25, h * 0.25, w * 0.75, h * 0.75],
      categories: Box::new([Category {
        label: "person".to_string(),
        score: 0.87,
      }]),
    }]))
  }
}

struct SimulatedFactory {
  degrade_after: u64,
  fast_ms: u64,
  degraded_ms: u64,
  fallback_ms: u64,
}

impl ClassifierFactory for SimulatedFactory {
  fn initialize(&self, mode: ComputeMode) -> Result<Box<dyn Classifier>, BackendError> {
    info!("初始化模拟后端: {}", mode);
    Ok(Box::new(SimulatedClassifier {
      mode,
      frames_seen: 0,
      degrade_after: self.degrade_after,
      fast_ms: self.fast_ms,
      degraded_ms: self.degraded_ms,
      fallback_ms: self.fallback_ms,
    }))
  }
}

/// 叠加层监听器：把最新结果打到日志里
struct OverlayListener {
  delivered: Arc<AtomicU64>,
}

impl ResultListener for OverlayListener {
  fn on_result(&mut self, result: &DetectionResult) {
    self.delivered.fetch_add(1, Ordering::Relaxed);
    let label = result
      .detections
      .first()
      .and_then(|d| d.best_category())
      .map(|c| format!("{} {:.0}%", c.label, c.score * 100.0))
      .unwrap_or_else(|| "无目标".to_string());
    info!(
      "检测结果: {} 个目标 [{}], 推理耗时 {} ms",
      result.detections.len(),
      label,
      result.inference_time_ms
    );
  }

  fn on_error(&mut self, message: &str) {
    error!("推理错误: {}", message);
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();
  let args = Args::parse();

  info!("转风 推理调度模拟");
  info!("切换阈值: {} ms", args.threshold_ms);
  info!("模拟帧率: {} fps", args.fps);

  let delivered = Arc::new(AtomicU64::new(0));
  let factory = SimulatedFactory {
    degrade_after: args.degrade_after,
    fast_ms: args.fast_ms,
    degraded_ms: args.degraded_ms,
    fallback_ms: args.fallback_ms,
  };
  let listener = OverlayListener {
    delivered: delivered.clone(),
  };
  let config = SessionConfig {
    switch_threshold_ms: args.threshold_ms,
    initial_mode: ComputeMode::Accelerated,
  };

  let mut session = Session::start(factory, listener, config)?;
  let observer = session.observer();

  let (tx, rx) = std::sync::mpsc::channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
  .expect("Error setting Ctrl-C handler");

  // 采集线程视角：按固定帧率产生合成帧，submit 永不阻塞
  let width = 640u32;
  let height = 480u32;
  let pixels = vec![0u8; width as usize * height as usize * 3];
  let frame_budget = Duration::from_millis(1000 / args.fps.max(1) as u64);

  let mut submitted = 0u64;
  let mut admitted = 0u64;
  let mut dropped = 0u64;

  loop {
    let cycle_start = Instant::now();

    let frame = FrameView::new(&pixels, width, height, PixelFormat::Rgb888, Rotation::Deg0);
    submitted += 1;
    match session.submit(&frame) {
      Admission::Accepted => admitted += 1,
      Admission::Dropped => dropped += 1,
    }

    if args.frames > 0 && submitted >= args.frames {
      info!("达到指定帧数 {}, 退出采集循环", submitted);
      break;
    }
    if rx.try_recv().is_ok() {
      warn!("中断信号接收，退出采集循环");
      break;
    }

    let elapsed = cycle_start.elapsed();
    if elapsed < frame_budget {
      thread::sleep(frame_budget - elapsed);
    }
  }

  let state = observer.state();
  let average = observer.average_latency_ms();
  session.stop();

  warn!(
    "模拟结束: 提交 {} 帧, 接收 {} 帧, 丢弃 {} 帧, 交付 {} 个结果",
    submitted,
    admitted,
    dropped,
    delivered.load(Ordering::Relaxed)
  );
  match average {
    Some(avg) => warn!("平均推理延迟: {:.2} ms, 最终状态: {:?}", avg, state),
    None => warn!("没有成功的推理样本, 最终状态: {:?}", state),
  }

  Ok(())
}
