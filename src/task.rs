// 该文件是 Liuguang （流光） 项目的一部分。
// src/task.rs - 播放任务与调度循环
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

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  dispatch::{Analysis, DispatchStats, InferenceDispatcher},
  frame::Frame,
  input::{DEFAULT_FPS, FrameSource},
  model::Model,
  output::Presenter,
  schedule::{Clock, SystemClock, TickSchedule, interval_from_fps},
  transport::{Direction, TickAction, Transport},
};

const DEFAULT_OVERRUN_WARN_TICKS: u32 = 30;

pub trait Task<I, M, O>: Sized {
  type Report;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Report, Self::Error>;
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("呈现失败: {0}")]
  Present(Box<dyn std::error::Error + Send + Sync + 'static>),
  #[error("无效的帧率: {0}")]
  InvalidFrameRate(f64),
}

/// 分析结果与帧的对应方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayMode {
  /// 最新结果叠加在当前帧上，不引入显示延迟
  #[default]
  Latest,
  /// 显示最新结果所对应的那一帧，叠加准确但画面滞后
  FrameAccurate,
}

impl FromStr for OverlayMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "latest" => Ok(OverlayMode::Latest),
      "frame-accurate" | "frame_accurate" | "accurate" => Ok(OverlayMode::FrameAccurate),
      other => Err(format!("未知的叠加模式: {}", other)),
    }
  }
}

impl fmt::Display for OverlayMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OverlayMode::Latest => write!(f, "latest"),
      OverlayMode::FrameAccurate => write!(f, "frame-accurate"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
  Quit,
  EndOfStream,
  FrameLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
  Continue,
  Stopped(StopReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
  pub ticks: u64,
  /// 成功推进输入源的次数
  pub advances: u64,
  pub presented: u64,
  /// 完成时已超过截止时刻的节拍数
  pub overruns: u64,
  /// 连续超时达到警告阈值的次数
  pub overrun_warnings: u64,
  pub max_lateness: Duration,
  pub stop_reason: Option<StopReason>,
  pub dispatch: DispatchStats,
}

/// 固定节拍的播放任务
///
/// ```no_run
/// # use liuguang::{task::{OverlayMode, PlaybackTask}};
/// let task = PlaybackTask::default()
///   .with_frame_number(Some(300))
///   .with_overlay_mode(OverlayMode::Latest);
/// ```
#[derive(Debug)]
pub struct PlaybackTask<C = SystemClock> {
  clock: C,
  frame_number: Option<usize>,
  overlay_mode: OverlayMode,
  interval: Option<Duration>,
  overrun_warn_ticks: u32,
}

impl Default for PlaybackTask<SystemClock> {
  fn default() -> Self {
    Self {
      clock: SystemClock,
      frame_number: None,
      overlay_mode: OverlayMode::default(),
      interval: None,
      overrun_warn_ticks: DEFAULT_OVERRUN_WARN_TICKS,
    }
  }
}

impl<C: Clock> PlaybackTask<C> {
  pub fn with_clock<D: Clock>(self, clock: D) -> PlaybackTask<D> {
    PlaybackTask {
      clock,
      frame_number: self.frame_number,
      overlay_mode: self.overlay_mode,
      interval: self.interval,
      overrun_warn_ticks: self.overrun_warn_ticks,
    }
  }

  /// 最多运行的节拍数
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_overlay_mode(mut self, overlay_mode: OverlayMode) -> Self {
    self.overlay_mode = overlay_mode;
    self
  }

  /// 以指定帧率代替输入源的原生帧率
  pub fn with_frame_rate(self, fps: f64) -> Result<Self, TaskError> {
    let interval = interval_from_fps(fps).ok_or(TaskError::InvalidFrameRate(fps))?;
    Ok(self.with_interval(interval))
  }

  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = Some(interval);
    self
  }

  /// 连续超时多少个节拍后发出警告，0 表示不警告
  pub fn with_overrun_warn_ticks(mut self, ticks: u32) -> Self {
    self.overrun_warn_ticks = ticks;
    self
  }

  /// 以当前时刻为起点创建调度循环，此时尚未读取任何帧
  pub fn start<S, M, P>(self, source: S, model: Option<M>, presenter: P) -> Playback<S, M, P, C>
  where
    S: FrameSource,
    M: Model<Input = Frame> + Send + Sync + 'static,
    M::Output: Send + Sync + 'static,
    M::Error: std::error::Error + Send + Sync + 'static,
    P: Presenter<M::Output>,
  {
    let interval = self.interval.unwrap_or_else(|| {
      interval_from_fps(source.fps()).unwrap_or_else(|| {
        warn!(
          "输入源帧率 {} 无效，使用默认帧率 {}",
          source.fps(),
          DEFAULT_FPS
        );
        Duration::from_secs_f64(1.0 / DEFAULT_FPS)
      })
    });

    if model.is_none() {
      info!("未配置推理引擎，仅按节拍播放");
    }
    info!(
      "开始播放: {}x{}, {} 帧, 节拍间隔 {:.2?}, 叠加模式 {}",
      source.width(),
      source.height(),
      source.frame_count(),
      interval,
      self.overlay_mode
    );

    let schedule = TickSchedule::start(self.clock.now(), interval);
    Playback {
      source,
      dispatcher: model.map(InferenceDispatcher::new),
      presenter,
      clock: self.clock,
      transport: Transport::new(),
      schedule,
      current: None,
      overlay_mode: self.overlay_mode,
      frame_number: self.frame_number,
      overrun_warn_ticks: self.overrun_warn_ticks,
      overrun_streak: 0,
      report: PlaybackReport::default(),
    }
  }
}

impl<S, M, P, C> Task<S, Option<M>, P> for PlaybackTask<C>
where
  S: FrameSource,
  M: Model<Input = Frame> + Send + Sync + 'static,
  M::Output: Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
  P: Presenter<M::Output>,
  C: Clock,
{
  type Report = PlaybackReport;
  type Error = TaskError;

  fn run_task(self, input: S, model: Option<M>, output: P) -> Result<Self::Report, Self::Error> {
    self.start(input, model, output).run()
  }
}

/// 正在进行的调度循环
///
/// 每个节拍依次：查询控制事件、推进输入源、提交推理、取回结果、呈现、
/// 等待到固定的截止时刻。
pub struct Playback<S, M: Model, P, C> {
  source: S,
  dispatcher: Option<InferenceDispatcher<M>>,
  presenter: P,
  clock: C,
  transport: Transport,
  schedule: TickSchedule,
  current: Option<Frame>,
  overlay_mode: OverlayMode,
  frame_number: Option<usize>,
  overrun_warn_ticks: u32,
  overrun_streak: u32,
  report: PlaybackReport,
}

impl<S, M, P, C> Playback<S, M, P, C>
where
  S: FrameSource,
  M: Model<Input = Frame> + Send + Sync + 'static,
  M::Output: Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
  P: Presenter<M::Output>,
  C: Clock,
{
  /// 执行一个节拍；停止后再调用只返回停止原因
  pub fn tick(&mut self) -> Result<TickOutcome, TaskError> {
    if let Some(reason) = self.report.stop_reason {
      return Ok(TickOutcome::Stopped(reason));
    }

    let deadline = self.schedule.next_deadline();
    self.report.ticks += 1;

    let event = self.presenter.poll_control_event();
    match self.transport.on_tick(event) {
      TickAction::Quit => return Ok(self.stop(StopReason::Quit)),
      TickAction::Hold => {}
      TickAction::Advance(direction) => match self.source.acquire(direction) {
        Some(frame) => {
          self.report.advances += 1;
          self.current = Some(frame);
        }
        None if direction == Direction::Forward => {
          return Ok(self.stop(StopReason::EndOfStream));
        }
        None => debug!("无法后退，保持当前帧"),
      },
    }

    if let Some(frame) = self.current.clone() {
      if let Some(dispatcher) = self.dispatcher.as_mut() {
        dispatcher.try_submit(&frame);
        dispatcher.poll_completed();
      }
      self.present(&frame)?;
      debug!("节拍 {}: 第 {} 帧", self.report.ticks, frame.position());
    }

    if self
      .frame_number
      .is_some_and(|n| self.report.ticks >= n as u64)
    {
      info!("达到指定帧数 {}, 退出任务循环", self.report.ticks);
      return Ok(self.stop(StopReason::FrameLimit));
    }

    self.check_overrun(deadline);
    self.clock.sleep_until(deadline);
    Ok(TickOutcome::Continue)
  }

  /// 运行到停止为止
  pub fn run(&mut self) -> Result<PlaybackReport, TaskError> {
    loop {
      if let TickOutcome::Stopped(_) = self.tick()? {
        break;
      }
    }
    let report = self.report();
    info!(
      "任务完成: {} 个节拍, 推进 {} 帧, 超时 {} 次 (最大 {:.2?}), 推理 {}/{}",
      report.ticks,
      report.advances,
      report.overruns,
      report.max_lateness,
      report.dispatch.completed,
      report.dispatch.submitted
    );
    Ok(report)
  }

  fn present(&mut self, frame: &Frame) -> Result<(), TaskError> {
    let latest: Option<Arc<Analysis<M::Output>>> = self
      .dispatcher
      .as_ref()
      .and_then(InferenceDispatcher::latest_result);

    let presented = match (self.overlay_mode, latest.as_deref()) {
      (OverlayMode::FrameAccurate, Some(analysis)) => {
        self.presenter.present(analysis.frame(), Some(analysis))
      }
      (_, analysis) => self.presenter.present(frame, analysis),
    };
    presented.map_err(|e| TaskError::Present(Box::new(e)))?;
    self.report.presented += 1;
    Ok(())
  }

  fn check_overrun(&mut self, deadline: std::time::Instant) {
    let now = self.clock.now();
    if now <= deadline {
      if self.overrun_warn_ticks > 0 && self.overrun_streak >= self.overrun_warn_ticks {
        info!("节拍恢复准时 (连续超时 {} 个节拍)", self.overrun_streak);
      }
      self.overrun_streak = 0;
      return;
    }

    let lateness = now - deadline;
    self.report.overruns += 1;
    self.report.max_lateness = self.report.max_lateness.max(lateness);
    self.overrun_streak += 1;
    if self.overrun_streak == self.overrun_warn_ticks {
      self.report.overrun_warnings += 1;
      warn!(
        "已连续 {} 个节拍超时，当前落后 {:.2?}，无法维持目标帧率",
        self.overrun_streak, lateness
      );
    }
  }

  fn stop(&mut self, reason: StopReason) -> TickOutcome {
    match reason {
      StopReason::Quit => info!("用户退出"),
      StopReason::EndOfStream => info!("输入源结束"),
      StopReason::FrameLimit => {}
    }
    self.report.stop_reason = Some(reason);
    TickOutcome::Stopped(reason)
  }

  pub fn report(&self) -> PlaybackReport {
    PlaybackReport {
      dispatch: self
        .dispatcher
        .as_ref()
        .map(InferenceDispatcher::stats)
        .unwrap_or_default(),
      ..self.report.clone()
    }
  }

  /// 当前连续超时的节拍数
  pub fn overrun_streak(&self) -> u32 {
    self.overrun_streak
  }

  pub fn current_frame(&self) -> Option<&Frame> {
    self.current.as_ref()
  }

  pub fn transport(&self) -> &Transport {
    &self.transport
  }

  pub fn schedule(&self) -> &TickSchedule {
    &self.schedule
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  pub fn dispatcher(&self) -> Option<&InferenceDispatcher<M>> {
    self.dispatcher.as_ref()
  }

  pub fn dispatcher_mut(&mut self) -> Option<&mut InferenceDispatcher<M>> {
    self.dispatcher.as_mut()
  }

  pub fn presenter(&self) -> &P {
    &self.presenter
  }

  pub fn presenter_mut(&mut self) -> &mut P {
    &mut self.presenter
  }
}
