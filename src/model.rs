// 该文件是 Liuguang （流光） 项目的一部分。
// src/model.rs - 模型
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

/// 推理引擎接口
///
/// 对调度器而言是一个同步、无状态、耗时较长的纯函数；
/// 异步包装由 [`crate::dispatch::InferenceDispatcher`] 提供。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

impl<M: Model + ?Sized> Model for std::sync::Arc<M> {
  type Input = M::Input;
  type Output = M::Output;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

pub const KEYPOINT_NUM: usize = 17;

/// COCO 人体关键点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Joint {
  Nose = 0,
  LeftEye,
  RightEye,
  LeftEar,
  RightEar,
  LeftShoulder,
  RightShoulder,
  LeftElbow,
  RightElbow,
  LeftWrist,
  RightWrist,
  LeftHip,
  RightHip,
  LeftKnee,
  RightKnee,
  LeftAnkle,
  RightAnkle,
}

/// 骨架连线
pub const SKELETON: [(Joint, Joint); 19] = [
  (Joint::LeftAnkle, Joint::LeftKnee),
  (Joint::LeftKnee, Joint::LeftHip),
  (Joint::RightAnkle, Joint::RightKnee),
  (Joint::RightKnee, Joint::RightHip),
  (Joint::LeftHip, Joint::RightHip),
  (Joint::LeftShoulder, Joint::LeftHip),
  (Joint::RightShoulder, Joint::RightHip),
  (Joint::LeftShoulder, Joint::RightShoulder),
  (Joint::LeftShoulder, Joint::LeftElbow),
  (Joint::RightShoulder, Joint::RightElbow),
  (Joint::LeftElbow, Joint::LeftWrist),
  (Joint::RightElbow, Joint::RightWrist),
  (Joint::LeftEye, Joint::RightEye),
  (Joint::Nose, Joint::LeftEye),
  (Joint::Nose, Joint::RightEye),
  (Joint::LeftEye, Joint::LeftEar),
  (Joint::RightEye, Joint::RightEar),
  (Joint::LeftEar, Joint::LeftShoulder),
  (Joint::RightEar, Joint::RightShoulder),
];

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
  pub x: f32,
  pub y: f32,
  pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，模型输入坐标
  pub keypoints: [Keypoint; KEYPOINT_NUM],
}

impl DetectItem {
  pub fn keypoint(&self, joint: Joint) -> &Keypoint {
    &self.keypoints[joint as usize]
  }
}

/// 模型输入坐标到原始帧坐标的缩放系数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor {
  pub w: f32,
  pub h: f32,
}

impl Default for ScaleFactor {
  fn default() -> Self {
    Self { w: 1.0, h: 1.0 }
  }
}

impl ScaleFactor {
  /// 由原始帧尺寸和模型输入尺寸计算
  pub fn between(frame: (u32, u32), model_input: (u32, u32)) -> Self {
    Self {
      w: frame.0 as f32 / model_input.0.max(1) as f32,
      h: frame.1 as f32 / model_input.1.max(1) as f32,
    }
  }

  pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
    (x * self.w, y * self.h)
  }
}

/// 一次推理的完整结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
  pub scale: ScaleFactor,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("检测结果格式错误: {0}")]
  Format(String),
  #[error("推理失败: {0}")]
  Inference(String),
}

mod replay;
pub use self::replay::ReplayModel;
