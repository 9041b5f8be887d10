// 该文件是 Zhuanfeng （转风） 项目的一部分。
// src/frame.rs - 帧与复用缓冲区定义
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

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
  /// RGB 每像素 3 字节
  #[default]
  Rgb888,
  /// YUYV 每像素 2 字节
  Yuyv,
}

impl PixelFormat {
  pub fn bytes_per_pixel(self) -> usize {
    match self {
      PixelFormat::Rgb888 => 3,
      PixelFormat::Yuyv => 2,
    }
  }
}

/// 帧旋转角度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
  #[default]
  Deg0,
  Deg90,
  Deg180,
  Deg270,
}

impl Rotation {
  pub fn degrees(self) -> u32 {
    match self {
      Rotation::Deg0 => 0,
      Rotation::Deg90 => 90,
      Rotation::Deg180 => 180,
      Rotation::Deg270 => 270,
    }
  }
}

/// 借用的相机帧
///
/// 帧的像素数据由采集管线所有，调度器只在一次 submit 调用期间借用，
/// 不得超出该调用保留引用。
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
  data: &'a [u8],
  width: u32,
  height: u32,
  format: PixelFormat,
  rotation: Rotation,
}

impl<'a> FrameView<'a> {
  pub fn new(
    data: &'a [u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    rotation: Rotation,
  ) -> Self {
    let expected = width as usize * height as usize * format.bytes_per_pixel();
    if data.len() != expected {
      panic!("数据长度不匹配: 期望长度 {}, 实际长度 {}", expected, data.len());
    }

    Self {
      data,
      width,
      height,
      format,
      rotation,
    }
  }

  pub fn data(&self) -> &'a [u8] {
    self.data
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn rotation(&self) -> Rotation {
    self.rotation
  }
}

/// 自有的复用像素缓冲区
///
/// 首次使用时按帧大小分配，之后在门控与推理工作线程之间循环复用，
/// 稳定状态下不再分配内存。
#[derive(Debug, Default)]
pub struct ScratchFrame {
  data: Vec<u8>,
  width: u32,
  height: u32,
  format: PixelFormat,
  rotation: Rotation,
}

impl ScratchFrame {
  pub fn new() -> Self {
    Self::default()
  }

  /// 将一个借用帧的内容复制进缓冲区
  ///
  /// 容量足够时复用既有分配。
  pub fn copy_from(&mut self, frame: &FrameView<'_>) {
    self.data.clear();
    self.data.extend_from_slice(frame.data());
    self.width = frame.width();
    self.height = frame.height();
    self.format = frame.format();
    self.rotation = frame.rotation();
  }

  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn rotation(&self) -> Rotation {
    self.rotation
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scratch_copies_pixels_and_metadata() {
    let pixels = vec![7u8; 4 * 2 * 3];
    let view = FrameView::new(&pixels, 4, 2, PixelFormat::Rgb888, Rotation::Deg90);

    let mut scratch = ScratchFrame::new();
    scratch.copy_from(&view);

    assert_eq!(scratch.data(), &pixels[..]);
    assert_eq!(scratch.width(), 4);
    assert_eq!(scratch.height(), 2);
    assert_eq!(scratch.format(), PixelFormat::Rgb888);
    assert_eq!(scratch.rotation(), Rotation::Deg90);
  }

  #[test]
  fn scratch_reuses_allocation() {
    let big = vec![1u8; 8 * 8 * 3];
    let small = vec![2u8; 2 * 2 * 3];

    let mut scratch = ScratchFrame::new();
    scratch.copy_from(&FrameView::new(&big, 8, 8, PixelFormat::Rgb888, Rotation::Deg0));
    let cap = scratch.data.capacity();

    scratch.copy_from(&FrameView::new(&small, 2, 2, PixelFormat::Rgb888, Rotation::Deg0));
    assert_eq!(scratch.data.capacity(), cap);
    assert_eq!(scratch.data(), &small[..]);
  }

  #[test]
  #[should_panic]
  fn frame_view_rejects_size_mismatch() {
    let pixels = vec![0u8; 10];
    let _ = FrameView::new(&pixels, 4, 2, PixelFormat::Rgb888, Rotation::Deg0);
  }
}
