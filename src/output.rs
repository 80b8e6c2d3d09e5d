// 该文件是 Liuguang （流光） 项目的一部分。
// src/output.rs - 输出与呈现边界
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::FromUrl;
#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
use crate::FromUrlWithScheme;
use crate::{
  control::ControlSource, dispatch::Analysis, frame::Frame, model::DetectResult,
  transport::ControlEvent,
};
use thiserror::Error;
use tracing::info;
use url::Url;

/// 把一帧及其（可能不存在的）分析结果写到某处
pub trait Render<Frame, Output> {
  type Error;
  fn render_result(&self, frame: &Frame, result: Option<&Output>) -> Result<(), Self::Error>;
}

/// 调度循环与显示端之间的边界，每个节拍各调用一次
pub trait Presenter<T> {
  type Error: std::error::Error + Send + Sync + 'static;

  fn present(&mut self, frame: &Frame, analysis: Option<&Analysis<T>>) -> Result<(), Self::Error>;

  fn poll_control_event(&mut self) -> Option<ControlEvent>;
}

/// 一个显示会话：会话名、输出端以及控制事件来源
pub struct PresentationSession<O, C> {
  name: String,
  output: O,
  control: C,
  presented: u64,
}

impl<O, C> PresentationSession<O, C> {
  pub fn new(name: impl Into<String>, output: O, control: C) -> Self {
    let name = name.into();
    info!("打开显示会话: {}", name);
    Self {
      name,
      output,
      control,
      presented: 0,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn output(&self) -> &O {
    &self.output
  }

  /// 已呈现的帧数
  pub fn presented(&self) -> u64 {
    self.presented
  }
}

impl<T, O, C> Presenter<T> for PresentationSession<O, C>
where
  O: Render<Frame, T>,
  O::Error: std::error::Error + Send + Sync + 'static,
  C: ControlSource,
{
  type Error = O::Error;

  fn present(&mut self, frame: &Frame, analysis: Option<&Analysis<T>>) -> Result<(), Self::Error> {
    self
      .output
      .render_result(frame, analysis.map(Analysis::output))?;
    self.presented += 1;
    Ok(())
  }

  fn poll_control_event(&mut self) -> Option<ControlEvent> {
    self.control.poll_event()
  }
}

impl<O, C> Drop for PresentationSession<O, C> {
  fn drop(&mut self) {
    info!("关闭显示会话: {} (共 {} 帧)", self.name, self.presented);
  }
}

pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render<Frame, DetectResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: Option<&DetectResult>) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}
