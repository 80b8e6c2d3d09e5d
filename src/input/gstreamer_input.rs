// 该文件是 Liuguang （流光） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 视频文件输入
//!
//! 通过 `decodebin` 解码视频文件，以 RGB 帧的形式提供给调度循环。
//! 顺序播放时直接从 appsink 拉取；后退单步或循环回到开头时
//! 使用精确跳转（`FLUSH | ACCURATE`）定位到目标帧的时间戳。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## 用法
//!
//! ```no_run
//! use liuguang::{FromUrl, input::{FrameSource, VideoFileInput}};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("video:///data/dancer.mp4?loop=true")?;
//! let mut input = VideoFileInput::from_url(&url)?;
//! println!("{} fps, {} 帧", input.fps(), input.frame_count());
//! let first = input.acquire_next();
//! # Ok(())
//! # }
//! ```

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{DEFAULT_FPS, FrameCursor, FrameSource},
};

const PREROLL_TIMEOUT_SECS: u64 = 10;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum VideoFileInputError {
  /// URI scheme 不匹配（期望 "video://"）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法转换元素为 appsink
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format")]
  UnsupportedFormat,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 缓冲区大小不匹配
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

/// 可单步、可跳转的视频文件输入
pub struct VideoFileInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  cursor: FrameCursor,
  fps: f64,
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for VideoFileInput {
  const SCHEME: &'static str = "video";
}

impl FromUrl for VideoFileInput {
  type Error = VideoFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(VideoFileInputError::SchemeMismatch);
    }

    let query = crate::query_map(url);
    let looping = crate::query_flag(&query, "loop").unwrap_or(true);
    Self::open(url.path(), looping)
  }
}

impl Drop for VideoFileInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl VideoFileInput {
  pub fn open(path: &str, looping: bool) -> Result<Self, VideoFileInputError> {
    gst::init()?;

    let description = format!(
      "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
       appsink name=sink sync=false max-buffers=1",
      path
    );
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| VideoFileInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(VideoFileInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| VideoFileInputError::AppSinkConversionFailed)?;

    // 预滚以获得帧率、尺寸和时长
    pipeline.set_state(gst::State::Paused)?;
    let (state, _, _) = pipeline.state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS));
    state?;

    let preroll = appsink.pull_preroll()?;
    let caps = preroll
      .caps()
      .ok_or_else(|| VideoFileInputError::PipelineError("No caps in sample".to_string()))?;
    let video_info =
      gst_video::VideoInfo::from_caps(caps).map_err(|_| VideoFileInputError::VideoInfoError)?;

    let fps = {
      let rate = video_info.fps();
      if rate.denom() > 0 && rate.numer() > 0 {
        rate.numer() as f64 / rate.denom() as f64
      } else {
        warn!("视频未声明帧率，使用默认值 {}", DEFAULT_FPS);
        DEFAULT_FPS
      }
    };

    let cursor = match pipeline.query_duration::<gst::ClockTime>() {
      Some(duration) => {
        let frame_count = (duration.nseconds() as f64 * fps / 1e9).round() as usize;
        FrameCursor::new(frame_count, looping)
      }
      None => {
        warn!("无法获取视频时长，读到末尾前不能从开头后退");
        FrameCursor::open_ended(looping)
      }
    };

    info!(
      "打开视频文件: {} ({}x{}, {:.2} fps, 约 {:?} 帧, 循环: {})",
      path,
      video_info.width(),
      video_info.height(),
      fps,
      cursor.count(),
      looping
    );

    pipeline.set_state(gst::State::Playing)?;

    Ok(VideoFileInput {
      width: video_info.width(),
      height: video_info.height(),
      pipeline,
      appsink,
      cursor,
      fps,
    })
  }

  fn seek(&self, position: usize) -> bool {
    let Some(target) = seek_time(position, self.fps) else {
      error!("第 {} 帧的时间戳超出范围", position);
      return false;
    };
    match self
      .pipeline
      .seek_simple(gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE, target)
    {
      Ok(()) => {
        debug!("跳转到第 {} 帧", position);
        true
      }
      Err(e) => {
        error!("跳转到第 {} 帧失败: {}", position, e);
        false
      }
    }
  }

  fn pull(&mut self, position: usize) -> Option<Frame> {
    let sample = self.appsink.pull_sample().ok()?;
    match convert_sample(&sample) {
      Ok(image) => {
        self.cursor.commit(position);
        Some(Frame::new(image, position))
      }
      Err(e) => {
        error!("Failed to fetch sample: {}", e);
        None
      }
    }
  }

  fn read(&mut self, target: usize, sequential: bool) -> Option<Frame> {
    if !sequential && !self.seek(target) {
      return None;
    }
    if let Some(frame) = self.pull(target) {
      return Some(frame);
    }

    // 时长估算的帧数可能多于实际帧数
    if self.cursor.looping() && target != 0 {
      warn!("视频在第 {} 帧提前结束，回到开头", target);
      self.cursor.truncate(target);
      if self.seek(0) {
        return self.pull(0);
      }
    }
    None
  }
}

/// 帧位置对应的时间戳；超出 `ClockTime` 的有效范围时返回 `None`
fn seek_time(position: usize, fps: f64) -> Option<gst::ClockTime> {
  let nanos = position as f64 * 1e9 / fps;
  if !nanos.is_finite() || nanos < 0.0 || nanos >= gst::ClockTime::MAX.nseconds() as f64 {
    return None;
  }
  Some(gst::ClockTime::from_nseconds(nanos as u64))
}

fn convert_sample(sample: &gst::Sample) -> Result<RgbImage, VideoFileInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| VideoFileInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| VideoFileInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| VideoFileInputError::VideoInfoError)?;
  if video_info.format() != gst_video::VideoFormat::Rgb {
    return Err(VideoFileInputError::UnsupportedFormat);
  }

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;

  let map = buffer.map_readable().map_err(|e| {
    VideoFileInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  let row = width * 3;
  let expected = stride * (height - 1) + row;
  if data.len() < expected {
    return Err(VideoFileInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  let mut pixels = Vec::with_capacity(row * height);
  for h in 0..height {
    pixels.extend_from_slice(&data[h * stride..h * stride + row]);
  }

  RgbImage::from_raw(width as u32, height as u32, pixels).ok_or(
    VideoFileInputError::BufferSizeMismatch {
      expected: row * height,
      actual: data.len(),
    },
  )
}

impl FrameSource for VideoFileInput {
  fn acquire_next(&mut self) -> Option<Frame> {
    let target = self.cursor.next()?;
    let sequential = match self.cursor.position() {
      Some(p) => target == p + 1,
      None => target == 0,
    };
    self.read(target, sequential)
  }

  fn acquire_previous(&mut self) -> Option<Frame> {
    let target = self.cursor.previous()?;
    self.read(target, false)
  }

  fn fps(&self) -> f64 {
    self.fps
  }

  fn frame_count(&self) -> usize {
    self.cursor.count().unwrap_or(0)
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
