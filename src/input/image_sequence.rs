// 该文件是 Liuguang （流光） 项目的一部分。
// src/input/image_sequence.rs - 图像序列目录输入
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

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{DEFAULT_FPS, FrameCursor, FrameSource, parse_fps},
};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum ImageSequenceInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("目录中没有图像文件: {0}")]
  Empty(String),
  #[error("无效的帧率: {0}")]
  InvalidFps(String),
}

/// 目录中按文件名排序的图像序列，按需解码
pub struct ImageSequenceInput {
  paths: Vec<PathBuf>,
  cursor: FrameCursor,
  fps: f64,
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for ImageSequenceInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageSequenceInput {
  type Error = ImageSequenceInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageSequenceInputError::SchemeMismatch);
    }

    let query = crate::query_map(url);
    let fps = match query.get("fps") {
      Some(v) => parse_fps(v).ok_or_else(|| ImageSequenceInputError::InvalidFps(v.clone()))?,
      None => DEFAULT_FPS,
    };
    let looping = crate::query_flag(&query, "loop").unwrap_or(true);

    Self::open(url.path(), fps, looping)
  }
}

impl ImageSequenceInput {
  pub fn open(
    directory: impl AsRef<Path>,
    fps: f64,
    looping: bool,
  ) -> Result<Self, ImageSequenceInputError> {
    let directory = directory.as_ref();
    let mut paths = std::fs::read_dir(directory)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| path.is_file() && is_image(path))
      .collect::<Vec<_>>();
    paths.sort();

    let first = paths
      .first()
      .ok_or_else(|| ImageSequenceInputError::Empty(directory.display().to_string()))?;
    let first_image = decode(first)?;

    info!(
      "打开图像序列: {} ({} 帧, {}x{}, {:.2} fps, 循环: {})",
      directory.display(),
      paths.len(),
      first_image.width(),
      first_image.height(),
      fps,
      looping
    );

    Ok(Self {
      cursor: FrameCursor::new(paths.len(), looping),
      paths,
      fps,
      width: first_image.width(),
      height: first_image.height(),
    })
  }

  fn read(&mut self, target: usize) -> Option<Frame> {
    let path = &self.paths[target];
    match decode(path) {
      Ok(image) => {
        debug!("读取第 {} 帧: {}", target, path.display());
        self.cursor.commit(target);
        Some(Frame::new(image, target))
      }
      Err(e) => {
        error!("解码失败 {}: {}", path.display(), e);
        None
      }
    }
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    .unwrap_or(false)
}

fn decode(path: &Path) -> Result<RgbImage, ImageSequenceInputError> {
  Ok(ImageReader::open(path)?.decode()?.to_rgb8())
}

impl FrameSource for ImageSequenceInput {
  fn acquire_next(&mut self) -> Option<Frame> {
    let target = self.cursor.next()?;
    self.read(target)
  }

  fn acquire_previous(&mut self) -> Option<Frame> {
    let target = self.cursor.previous()?;
    self.read(target)
  }

  fn fps(&self) -> f64 {
    self.fps
  }

  fn frame_count(&self) -> usize {
    self.paths.len()
  }

  fn position(&self) -> Option<usize> {
    self.cursor.position()
  }

  fn looping(&self) -> bool {
    self.cursor.looping()
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }
}
