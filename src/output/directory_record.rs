// 该文件是 Liuguang （流光） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use chrono::{Datelike, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, DrawDetectionOnFrame, Record},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    result: Option<&DetectResult>,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_detection(frame, result).save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.image().save(path)?;
        if let Some(result) = result {
          record.record(result, path)?;
        }
      }
    };

    Ok(())
  }

  pub fn with(kind: &str) -> Self {
    match kind {
      "record-box" => DrawWrapper::Record(Record {
        with_keypoints: false,
      }),
      "record-pose" => DrawWrapper::Record(Record {
        with_keypoints: true,
      }),
      _ => DrawWrapper::Draw(Box::new(Draw::default())),
    }
  }
}

/// 按日期分目录保存每一帧
///
/// 默认只保存有检测结果的帧，`?always` 保存所有帧；
/// `?record` 保存原始帧并把结果写入同名 `.txt`（`?record=box` 不含关键点）。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU32,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let query = crate::query_map(uri);
    let kind = match query.get("record").map(String::as_str) {
      Some("box") => "record-box",
      _ => match crate::query_flag(&query, "record") {
        Some(true) => "record-pose",
        _ => "draw",
      },
    };
    let always = crate::query_flag(&query, "always").unwrap_or(false);

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: DrawWrapper::with(kind),
      frame_counter: AtomicU32::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u32 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, position: usize) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}-{:06}.png",
      now.format("%H-%M-%S"),
      self.frame_id(),
      position
    )))
  }
}

impl Render<Frame, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: Option<&DetectResult>) -> Result<(), Self::Error> {
    if !self.always && result.is_none_or(DetectResult::is_empty) {
      return Ok(());
    }
    let path = self.frame_path(frame.position())?;
    self.draw.save_result(&path, frame, result)?;
    debug!("记录第 {} 帧: {}", frame.position(), path.display());
    Ok(())
  }
}
