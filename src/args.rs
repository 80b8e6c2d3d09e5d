// 该文件是 Liuguang （流光） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Parser;
use liuguang::task::OverlayMode;
use url::Url;

/// Liuguang 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  /// 支持格式:
  /// - 单张图片: image:///path/to/a.png?fps=30
  /// - 图像序列目录: folder:///path/to/frames?fps=25&loop=false
  /// - 视频文件: video:///path/to/clip.mp4?loop=true（需启用 gstreamer_input）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 推理引擎，省略时只按节拍播放
  /// 例如: replay:///path/to/detections.json?latency_ms=120
  #[arg(long, value_name = "MODEL")]
  pub model: Option<Url>,

  /// 输出路径
  /// 支持格式:
  /// - 覆盖写单个文件: image:///tmp/latest.png
  /// - 按日期记录: folder:///tmp/record?always&record=pose
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 覆盖输入源的原生帧率
  #[arg(long, value_name = "FPS")]
  pub fps: Option<f64>,

  /// 最多运行的节拍数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 叠加模式: latest 或 frame-accurate
  #[arg(long, default_value_t = OverlayMode::Latest, value_name = "MODE")]
  pub overlay_mode: OverlayMode,

  /// 连续超时多少个节拍后发出警告，0 表示不警告
  #[arg(long, default_value_t = 30, value_name = "TICKS")]
  pub overrun_warn_ticks: u32,

  /// 显示会话名称
  #[arg(long, default_value = "liuguang", value_name = "NAME")]
  pub session: String,
}
