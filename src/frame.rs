// 该文件是 Liuguang （流光） 项目的一部分。
// src/frame.rs - 帧定义
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

use image::RgbImage;

/// 一帧图像及其在输入源中的位置
///
/// 像素缓冲区一经产生便不可变，克隆只增加引用计数，
/// 因此可以安全地交给后台推理线程，而调度循环继续读取下一帧。
#[derive(Debug, Clone)]
pub struct Frame {
  image: Arc<RgbImage>,
  position: usize,
}

impl Frame {
  pub fn new(image: RgbImage, position: usize) -> Self {
    Self {
      image: Arc::new(image),
      position,
    }
  }

  /// 复用已有的共享缓冲区，仅改变位置
  pub fn from_shared(image: Arc<RgbImage>, position: usize) -> Self {
    Self { image, position }
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn position(&self) -> usize {
    self.position
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  /// 两帧是否指向同一块像素缓冲区
  pub fn shares_buffer(&self, other: &Frame) -> bool {
    Arc::ptr_eq(&self.image, &other.image)
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    self.image.as_ref().clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clones_share_the_pixel_buffer() {
    let frame = Frame::new(RgbImage::new(4, 2), 7);
    let copy = frame.clone();
    assert!(frame.shares_buffer(&copy));
    assert_eq!(copy.position(), 7);
    assert_eq!((copy.width(), copy.height()), (4, 2));
  }

  #[test]
  fn from_shared_keeps_buffer_with_new_position() {
    let frame = Frame::new(RgbImage::new(1, 1), 0);
    let moved = Frame::from_shared(Arc::new(frame.to_rgb_image()), 3);
    assert!(!frame.shares_buffer(&moved));
    assert_eq!(moved.position(), 3);
  }
}
