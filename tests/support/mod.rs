// 该文件是 Liuguang （流光） 项目的一部分。
// tests/support/mod.rs - 调度循环测试用的替身
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

#![allow(dead_code)]

use std::{
  collections::VecDeque,
  sync::{
    Arc, Mutex,
    mpsc::{Receiver, Sender, channel},
  },
  time::{Duration, Instant},
};

use image::{Rgb, RgbImage};
use liuguang::{
  dispatch::Analysis,
  frame::Frame,
  input::{FrameCursor, FrameSource},
  model::{Model, ModelError},
  output::Presenter,
  schedule::Clock,
  transport::ControlEvent,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// 内存中的帧序列，像素值等于帧位置
pub struct MemorySource {
  frames: Vec<Frame>,
  cursor: FrameCursor,
  fps: f64,
  pub acquires: usize,
}

impl MemorySource {
  pub fn new(count: usize, looping: bool) -> Self {
    let frames = (0..count)
      .map(|i| Frame::new(RgbImage::from_pixel(4, 4, Rgb([i as u8; 3])), i))
      .collect();
    Self {
      frames,
      cursor: FrameCursor::new(count, looping),
      fps: 30.0,
      acquires: 0,
    }
  }

  pub fn frame(&self, position: usize) -> &Frame {
    &self.frames[position]
  }

  fn read(&mut self, target: Option<usize>) -> Option<Frame> {
    self.acquires += 1;
    let target = target?;
    self.cursor.commit(target);
    Some(self.frames[target].clone())
  }
}

impl FrameSource for MemorySource {
  fn acquire_next(&mut self) -> Option<Frame> {
    let target = self.cursor.next();
    self.read(target)
  }

  fn acquire_previous(&mut self) -> Option<Frame> {
    let target = self.cursor.previous();
    self.read(target)
  }

  fn fps(&self) -> f64 {
    self.fps
  }

  fn frame_count(&self) -> usize {
    self.frames.len()
  }

  fn position(&self) -> Option<usize> {
    self.cursor.position()
  }

  fn looping(&self) -> bool {
    self.cursor.looping()
  }

  fn width(&self) -> u32 {
    4
  }

  fn height(&self) -> u32 {
    4
  }
}

/// 一次呈现调用的记录
#[derive(Debug, Clone)]
pub struct Presented {
  pub frame: Frame,
  pub ticket: Option<u64>,
  pub analysed_position: Option<usize>,
}

/// 按脚本逐节拍给出控制事件，并记录每次呈现
#[derive(Default)]
pub struct ScriptedPresenter {
  script: VecDeque<Option<ControlEvent>>,
  pub presented: Vec<Presented>,
  delays: VecDeque<Duration>,
  clock: Option<ManualClock>,
  fail_at: Option<usize>,
}

impl ScriptedPresenter {
  pub fn new(script: impl IntoIterator<Item = Option<ControlEvent>>) -> Self {
    Self {
      script: script.into_iter().collect(),
      ..Default::default()
    }
  }

  /// 每次呈现让手动时钟前进给定时长，模拟慢节拍
  pub fn with_delays(mut self, clock: ManualClock, delays: impl IntoIterator<Item = Duration>) -> Self {
    self.clock = Some(clock);
    self.delays = delays.into_iter().collect();
    self
  }

  /// 第 n 次（从 1 开始）呈现返回错误
  pub fn failing_at(mut self, n: usize) -> Self {
    self.fail_at = Some(n);
    self
  }

  pub fn positions(&self) -> Vec<usize> {
    self.presented.iter().map(|p| p.frame.position()).collect()
  }

  pub fn tickets(&self) -> Vec<Option<u64>> {
    self.presented.iter().map(|p| p.ticket).collect()
  }
}

impl Presenter<usize> for ScriptedPresenter {
  type Error = std::io::Error;

  fn present(&mut self, frame: &Frame, analysis: Option<&Analysis<usize>>) -> Result<(), Self::Error> {
    if self.fail_at == Some(self.presented.len() + 1) {
      return Err(std::io::Error::other("display closed"));
    }
    self.presented.push(Presented {
      frame: frame.clone(),
      ticket: analysis.map(Analysis::ticket),
      analysed_position: analysis.map(|a| a.frame().position()),
    });
    if let (Some(clock), Some(delay)) = (&self.clock, self.delays.pop_front()) {
      clock.advance(delay);
    }
    Ok(())
  }

  fn poll_control_event(&mut self) -> Option<ControlEvent> {
    self.script.pop_front().flatten()
  }
}

/// 每次推理都等待测试放行，返回帧位置
pub struct GatedModel {
  gate: Mutex<Receiver<()>>,
}

impl GatedModel {
  pub fn new() -> (Self, Sender<()>) {
    let (tx, rx) = channel();
    (Self { gate: Mutex::new(rx) }, tx)
  }
}

impl Model for GatedModel {
  type Input = Frame;
  type Output = usize;
  type Error = ModelError;

  fn infer(&self, input: &Frame) -> Result<usize, ModelError> {
    self
      .gate
      .lock()
      .unwrap()
      .recv()
      .map_err(|_| ModelError::Inference("gate closed".to_string()))?;
    Ok(input.position())
  }
}

/// 立即返回帧位置
pub struct InstantModel;

impl Model for InstantModel {
  type Input = Frame;
  type Output = usize;
  type Error = ModelError;

  fn infer(&self, input: &Frame) -> Result<usize, ModelError> {
    Ok(input.position())
  }
}

struct ClockState {
  now: Instant,
  sleeps: Vec<Instant>,
}

/// 只在被要求时前进的时钟，记录每次等待的截止时刻
#[derive(Clone)]
pub struct ManualClock {
  start: Instant,
  state: Arc<Mutex<ClockState>>,
}

impl ManualClock {
  pub fn new() -> Self {
    let start = Instant::now();
    Self {
      start,
      state: Arc::new(Mutex::new(ClockState {
        now: start,
        sleeps: Vec::new(),
      })),
    }
  }

  pub fn start(&self) -> Instant {
    self.start
  }

  pub fn advance(&self, by: Duration) {
    self.state.lock().unwrap().now += by;
  }

  pub fn sleeps(&self) -> Vec<Instant> {
    self.state.lock().unwrap().sleeps.clone()
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Instant {
    self.state.lock().unwrap().now
  }

  fn sleep_until(&self, deadline: Instant) {
    let mut state = self.state.lock().unwrap();
    state.sleeps.push(deadline);
    if deadline > state.now {
      state.now = deadline;
    }
  }
}
