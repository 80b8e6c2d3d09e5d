// 该文件是 Liuguang （流光） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use liuguang::{
  FromUrl,
  control::KeyboardControl,
  input::InputWrapper,
  model::ReplayModel,
  output::{OutputWrapper, PresentationSession},
  task::{PlaybackTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("输入来源: {}", args.input);
  match &args.model {
    Some(model) => info!("推理引擎: {}", model),
    None => info!("推理引擎: 无"),
  }
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let model = args
    .model
    .as_ref()
    .map(ReplayModel::from_url)
    .transpose()?;
  let output = OutputWrapper::from_url(&args.output)?;
  let session = PresentationSession::new(args.session, output, KeyboardControl::spawn()?);

  let mut task = PlaybackTask::default()
    .with_frame_number(args.frame_number)
    .with_overlay_mode(args.overlay_mode)
    .with_overrun_warn_ticks(args.overrun_warn_ticks);
  if let Some(fps) = args.fps {
    task = task.with_frame_rate(fps)?;
  }

  let report = task.run_task(input, model, session)?;
  info!("播放结束: {:?}", report);

  Ok(())
}
