// 该文件是 Liuguang （流光） 项目的一部分。
// src/model/replay.rs - 预计算检测结果回放
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

//! 把离线导出的姿态检测结果当作推理引擎回放。
//!
//! 文件格式：
//!
//! ```json
//! {
//!   "input_size": [640, 640],
//!   "frames": [
//!     {
//!       "position": 0,
//!       "detections": [
//!         { "score": 0.91, "bbox": [10, 20, 200, 400],
//!           "keypoints": [[x, y, score], "... 共 17 个"] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! `input_size` 为模型输入尺寸，存在时按帧尺寸计算缩放系数。
//! URL 查询参数 `latency_ms` 模拟推理耗时。

use std::{collections::HashMap, thread, time::Duration};

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{DetectItem, DetectResult, KEYPOINT_NUM, Keypoint, Model, ModelError, ScaleFactor},
};

pub struct ReplayModel {
  detections: HashMap<usize, Box<[DetectItem]>>,
  input_size: Option<(u32, u32)>,
  latency: Duration,
}

impl FromUrlWithScheme for ReplayModel {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayModel {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let latency = crate::query_map(url)
      .get("latency_ms")
      .map(|v| {
        v.parse::<u64>()
          .map_err(|_| ModelError::Format(format!("latency_ms 不是整数: {}", v)))
      })
      .transpose()?
      .map(Duration::from_millis)
      .unwrap_or_default();

    let text = std::fs::read_to_string(url.path())?;
    let model = Self::from_json(&text)?.with_latency(latency);
    info!(
      "加载回放检测结果: {} ({} 帧, 模拟耗时 {:?})",
      url.path(),
      model.detections.len(),
      model.latency
    );
    Ok(model)
  }
}

#[derive(Deserialize)]
struct ReplayFile {
  input_size: Option<[u32; 2]>,
  frames: Vec<ReplayFrame>,
}

#[derive(Deserialize)]
struct ReplayFrame {
  position: usize,
  #[serde(default)]
  detections: Vec<ReplayDetection>,
}

#[derive(Deserialize)]
struct ReplayDetection {
  score: f32,
  bbox: [f32; 4],
  keypoints: Option<[[f32; 3]; KEYPOINT_NUM]>,
}

impl From<ReplayDetection> for DetectItem {
  fn from(detection: ReplayDetection) -> Self {
    let keypoints = detection
      .keypoints
      .map(|points| points.map(|[x, y, score]| Keypoint { x, y, score }))
      .unwrap_or([Keypoint::default(); KEYPOINT_NUM]);
    DetectItem {
      score: detection.score,
      bbox: detection.bbox,
      keypoints,
    }
  }
}

impl ReplayModel {
  pub fn from_json(text: &str) -> Result<Self, ModelError> {
    let file: ReplayFile = serde_json::from_str(text)?;

    let detections = file
      .frames
      .into_iter()
      .map(|frame| {
        let items: Vec<DetectItem> = frame.detections.into_iter().map(DetectItem::from).collect();
        (frame.position, items.into_boxed_slice())
      })
      .collect();

    Ok(Self {
      detections,
      input_size: file.input_size.map(|[w, h]| (w, h)),
      latency: Duration::ZERO,
    })
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }

  pub fn latency(&self) -> Duration {
    self.latency
  }
}

impl Model for ReplayModel {
  type Input = Frame;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    if !self.latency.is_zero() {
      thread::sleep(self.latency);
    }

    let items = self
      .detections
      .get(&input.position())
      .cloned()
      .unwrap_or_default();
    let scale = self
      .input_size
      .map(|size| ScaleFactor::between((input.width(), input.height()), size))
      .unwrap_or_default();
    debug!("回放第 {} 帧: {} 个目标", input.position(), items.len());

    Ok(DetectResult { items, scale })
  }
}
