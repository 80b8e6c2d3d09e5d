// 该文件是 Liuguang （流光） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use crate::{FromUrl, frame::Frame, schedule::interval_from_fps, transport::Direction};

/// 没有帧率信息的输入源使用的默认帧率
pub const DEFAULT_FPS: f64 = 30.0;

/// 可顺序读取、可向前/向后单步的帧来源
///
/// 两个获取方法都返回 `None` 表示流结束（EndOfStream）。
/// 打开输入源时出错属于初始化错误，由 [`FromUrl`] 报告。
pub trait FrameSource {
  /// 读取下一帧；开启循环时越过最后一帧回到第 0 帧
  fn acquire_next(&mut self) -> Option<Frame>;

  /// 读取上一帧；在第 0 帧时开启循环则回到最后一帧，否则结束
  fn acquire_previous(&mut self) -> Option<Frame>;

  /// 原生帧率
  fn fps(&self) -> f64;

  /// 帧总数，未知时为 0
  fn frame_count(&self) -> usize;

  /// 最近一次成功读取的帧位置
  fn position(&self) -> Option<usize>;

  fn looping(&self) -> bool;

  fn width(&self) -> u32;

  fn height(&self) -> u32;

  fn acquire(&mut self, direction: Direction) -> Option<Frame> {
    match direction {
      Direction::Forward => self.acquire_next(),
      Direction::Backward => self.acquire_previous(),
    }
  }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
  fn acquire_next(&mut self) -> Option<Frame> {
    (**self).acquire_next()
  }

  fn acquire_previous(&mut self) -> Option<Frame> {
    (**self).acquire_previous()
  }

  fn fps(&self) -> f64 {
    (**self).fps()
  }

  fn frame_count(&self) -> usize {
    (**self).frame_count()
  }

  fn position(&self) -> Option<usize> {
    (**self).position()
  }

  fn looping(&self) -> bool {
    (**self).looping()
  }

  fn width(&self) -> u32 {
    (**self).width()
  }

  fn height(&self) -> u32 {
    (**self).height()
  }
}

/// 解析 `?fps=` 查询参数，只接受能换算为节拍间隔的正帧率
pub(crate) fn parse_fps(value: &str) -> Option<f64> {
  let fps = value.trim().parse::<f64>().ok()?;
  interval_from_fps(fps).map(|_| fps)
}

/// 帧位置游标
///
/// 只计算下一次读取的目标位置，读取成功后再 `commit`，
/// 读取失败时位置保持不变。帧总数未知时不会从第 0 帧向后回绕。
#[derive(Debug, Clone)]
pub struct FrameCursor {
  count: Option<usize>,
  looping: bool,
  current: Option<usize>,
}

impl FrameCursor {
  pub fn new(count: usize, looping: bool) -> Self {
    Self {
      count: Some(count),
      looping,
      current: None,
    }
  }

  /// 帧总数未知的游标，直到 `truncate` 确定总数
  pub fn open_ended(looping: bool) -> Self {
    Self {
      count: None,
      looping,
      current: None,
    }
  }

  pub fn count(&self) -> Option<usize> {
    self.count
  }

  pub fn looping(&self) -> bool {
    self.looping
  }

  pub fn position(&self) -> Option<usize> {
    self.current
  }

  pub fn next(&self) -> Option<usize> {
    match (self.current, self.count) {
      (_, Some(0)) => None,
      (None, _) => Some(0),
      (Some(p), None) => p.checked_add(1),
      (Some(p), Some(count)) if p + 1 < count => Some(p + 1),
      (Some(_), Some(_)) if self.looping => Some(0),
      (Some(_), Some(_)) => None,
    }
  }

  pub fn previous(&self) -> Option<usize> {
    match (self.current, self.count) {
      (_, Some(0)) => None,
      (Some(p), _) if p > 0 => Some(p - 1),
      (_, Some(count)) if self.looping => Some(count - 1),
      _ => None,
    }
  }

  pub fn commit(&mut self, position: usize) {
    self.current = Some(position);
  }

  /// 读到流末尾时确定帧总数，当前位置随之收缩
  pub fn truncate(&mut self, count: usize) {
    self.count = Some(count);
    if let Some(p) = self.current
      && p >= count
    {
      self.current = count.checked_sub(1);
    }
  }
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "image_sequence")]
mod image_sequence;
#[cfg(feature = "image_sequence")]
pub use self::image_sequence::{ImageSequenceInput, ImageSequenceInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{VideoFileInput, VideoFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "image_sequence")]
  #[error("Image sequence input error: {0}")]
  ImageSequenceInputError(#[from] ImageSequenceInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("Video file input error: {0}")]
  VideoFileInputError(#[from] VideoFileInputError),
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
}

/// 按 URL 方案选择的输入源
pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "image_sequence")]
  ImageSequence(ImageSequenceInput),
  #[cfg(feature = "gstreamer_input")]
  VideoFile(VideoFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        return Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?));
      }
    }
    #[cfg(feature = "image_sequence")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageSequenceInput::SCHEME {
        return Ok(InputWrapper::ImageSequence(ImageSequenceInput::from_url(
          url,
        )?));
      }
    }
    #[cfg(feature = "gstreamer_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == VideoFileInput::SCHEME {
        return Ok(InputWrapper::VideoFile(VideoFileInput::from_url(url)?));
      }
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

macro_rules! dispatch_input {
  ($self:ident, $input:ident => $body:expr) => {
    match $self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile($input) => $body,
      #[cfg(feature = "image_sequence")]
      InputWrapper::ImageSequence($input) => $body,
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::VideoFile($input) => $body,
    }
  };
}

impl FrameSource for InputWrapper {
  fn acquire_next(&mut self) -> Option<Frame> {
    dispatch_input!(self, input => input.acquire_next())
  }

  fn acquire_previous(&mut self) -> Option<Frame> {
    dispatch_input!(self, input => input.acquire_previous())
  }

  fn fps(&self) -> f64 {
    dispatch_input!(self, input => input.fps())
  }

  fn frame_count(&self) -> usize {
    dispatch_input!(self, input => input.frame_count())
  }

  fn position(&self) -> Option<usize> {
    dispatch_input!(self, input => input.position())
  }

  fn looping(&self) -> bool {
    dispatch_input!(self, input => input.looping())
  }

  fn width(&self) -> u32 {
    dispatch_input!(self, input => input.width())
  }

  fn height(&self) -> u32 {
    dispatch_input!(self, input => input.height())
  }
}
