// 该文件是 Liuguang （流光） 项目的一部分。
// src/output/draw.rs - 姿态检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut},
  rect::Rect,
};

use crate::{
  frame::Frame,
  model::{DetectItem, DetectResult, SKELETON, ScaleFactor},
};

const CONFIDENCE_THRESHOLD: f32 = 0.3;
const BOX_COLOR: [u8; 3] = [0, 0, 200]; // 蓝色
const SKELETON_COLOR: [u8; 3] = [0, 200, 0]; // 绿色
const JOINT_COLOR: [u8; 3] = [200, 0, 0]; // 红色
const BOX_THICKNESS: i32 = 2;
const JOINT_RADIUS: i32 = 3;

pub struct Draw {
  threshold: f32,
  box_color: [u8; 3],
  skeleton_color: [u8; 3],
  joint_color: [u8; 3],
  box_thickness: i32,
  joint_radius: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      threshold: CONFIDENCE_THRESHOLD,
      box_color: BOX_COLOR,
      skeleton_color: SKELETON_COLOR,
      joint_color: JOINT_COLOR,
      box_thickness: BOX_THICKNESS,
      joint_radius: JOINT_RADIUS,
    }
  }
}

impl Draw {
  pub fn with_threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  // bbox 为模型输入坐标 [x_min, y_min, x_max, y_max]，按缩放系数映射回原始帧
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &[f32; 4], scale: &ScaleFactor) {
    let (x_min, y_min) = scale.apply(bbox[0], bbox[1]);
    let (x_max, y_max) = scale.apply(bbox[2], bbox[3]);
    let (x_min, y_min) = (x_min.floor() as i32, y_min.floor() as i32);
    let (x_max, y_max) = (x_max.ceil() as i32, y_max.ceil() as i32);

    for t in 0..self.box_thickness {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.box_color));
    }
  }

  fn draw_pose(&self, image: &mut RgbImage, item: &DetectItem, scale: &ScaleFactor) {
    for keypoint in item.keypoints.iter() {
      if keypoint.score < self.threshold {
        continue;
      }
      let (x, y) = scale.apply(keypoint.x, keypoint.y);
      draw_filled_circle_mut(
        image,
        (x.round() as i32, y.round() as i32),
        self.joint_radius,
        Rgb(self.joint_color),
      );
    }

    for (from, to) in SKELETON {
      let (from, to) = (item.keypoint(from), item.keypoint(to));
      if from.score < self.threshold || to.score < self.threshold {
        continue;
      }
      draw_line_segment_mut(
        image,
        scale.apply(from.x, from.y),
        scale.apply(to.x, to.y),
        Rgb(self.skeleton_color),
      );
    }
  }
}

pub trait DrawDetectionOnImage<T> {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &T);
}

pub trait DrawDetectionOnFrame<T> {
  /// 复制帧并叠加结果；没有结果时得到原始帧的副本
  fn draw_detection(&self, frame: &Frame, result: Option<&T>) -> RgbImage;
}

impl<T, D: DrawDetectionOnImage<T>> DrawDetectionOnFrame<T> for D {
  fn draw_detection(&self, frame: &Frame, result: Option<&T>) -> RgbImage {
    let mut image = frame.to_rgb_image();
    if let Some(result) = result {
      self.draw_detections_on_image(&mut image, result);
    }
    image
  }
}

impl DrawDetectionOnImage<DetectResult> for Draw {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.items.iter() {
      if item.score < self.threshold {
        continue;
      }
      self.draw_bbox(image, &item.bbox, &result.scale);
      self.draw_pose(image, item, &result.scale);
    }
  }
}

/// 把检测结果以文本形式写在图像旁边（同名 `.txt`）
///
/// 每行一个目标：`score, x_min, y_min, x_max, y_max`，坐标已映射到原始帧；
/// 开启 `with_keypoints` 时其后追加 17 组 `x y score`。
pub struct Record {
  pub with_keypoints: bool,
}

impl Record {
  pub fn record(&self, result: &DetectResult, path: &std::path::Path) -> Result<(), std::io::Error> {
    let scale = &result.scale;
    let mut records = Vec::with_capacity(result.len());
    for item in result.items.iter() {
      let (x_min, y_min) = scale.apply(item.bbox[0], item.bbox[1]);
      let (x_max, y_max) = scale.apply(item.bbox[2], item.bbox[3]);
      let mut record = format!(
        "{:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
        item.score, x_min, y_min, x_max, y_max
      );
      if self.with_keypoints {
        for keypoint in item.keypoints.iter() {
          let (x, y) = scale.apply(keypoint.x, keypoint.y);
          record.push_str(&format!(", {:.2} {:.2} {:.4}", x, y, keypoint.score));
        }
      }
      records.push(record);
    }
    std::fs::write(path.with_extension("txt"), records.join("\n"))?;
    Ok(())
  }
}
