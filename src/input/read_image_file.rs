// 该文件是 Liuguang （流光） 项目的一部分。
// src/input/read_image_file.rs - 单张图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{DEFAULT_FPS, FrameSource, parse_fps},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Invalid frame rate: {0}")]
  InvalidFps(String),
}

/// 单张静态图像
///
/// 图像没有“上一帧”，向前和向后读取都返回同一幅图像（位置 0）。
pub struct ImageFileInput {
  image: Arc<RgbImage>,
  fps: f64,
  acquired: bool,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let fps = match crate::query_map(url).get("fps") {
      Some(v) => parse_fps(v).ok_or_else(|| ImageFileInputError::InvalidFps(v.clone()))?,
      None => DEFAULT_FPS,
    };

    let path = url.path();
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    info!(
      "打开图像文件: {} ({}x{})",
      path,
      image.width(),
      image.height()
    );

    Ok(Self::new(image).with_fps(fps))
  }
}

impl ImageFileInput {
  pub fn new(image: RgbImage) -> Self {
    Self {
      image: Arc::new(image),
      fps: DEFAULT_FPS,
      acquired: false,
    }
  }

  pub fn with_fps(mut self, fps: f64) -> Self {
    self.fps = fps;
    self
  }

  fn frame(&mut self) -> Option<Frame> {
    self.acquired = true;
    Some(Frame::from_shared(Arc::clone(&self.image), 0))
  }
}

impl FrameSource for ImageFileInput {
  fn acquire_next(&mut self) -> Option<Frame> {
    self.frame()
  }

  fn acquire_previous(&mut self) -> Option<Frame> {
    self.frame()
  }

  fn fps(&self) -> f64 {
    self.fps
  }

  fn frame_count(&self) -> usize {
    1
  }

  fn position(&self) -> Option<usize> {
    self.acquired.then_some(0)
  }

  fn looping(&self) -> bool {
    true
  }

  fn width(&self) -> u32 {
    self.image.width()
  }

  fn height(&self) -> u32 {
    self.image.height()
  }
}
