// 该文件是 Liuguang （流光） 项目的一部分。
// src/transport.rs - 播放控制状态机
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

use tracing::info;

/// 用户控制事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
  Pause,
  Resume,
  StepForward,
  StepBackward,
  Quit,
}

impl ControlEvent {
  /// 按键映射：p 暂停，r 继续，f 前进一帧，b 后退一帧，q 退出
  pub fn from_key(key: char) -> Option<Self> {
    match key.to_ascii_lowercase() {
      'p' => Some(ControlEvent::Pause),
      'r' => Some(ControlEvent::Resume),
      'f' => Some(ControlEvent::StepForward),
      'b' => Some(ControlEvent::StepBackward),
      'q' => Some(ControlEvent::Quit),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
  #[default]
  Running,
  Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Forward,
  Backward,
}

/// 每个节拍的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
  /// 向指定方向推进输入源恰好一帧
  Advance(Direction),
  /// 保持当前帧
  Hold,
  /// 终止调度循环
  Quit,
}

/// 播放控制状态机
///
/// 每个节拍最多消费一个事件，并且最多推进一次输入源；
/// 暂停状态下只有显式的单步命令才会推进。
#[derive(Debug, Default)]
pub struct Transport {
  state: TransportState,
  quit: bool,
}

impl Transport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn state(&self) -> TransportState {
    self.state
  }

  pub fn is_paused(&self) -> bool {
    self.state == TransportState::Paused
  }

  pub fn is_terminated(&self) -> bool {
    self.quit
  }

  pub fn on_tick(&mut self, event: Option<ControlEvent>) -> TickAction {
    if self.quit {
      return TickAction::Quit;
    }

    match (self.state, event) {
      (_, Some(ControlEvent::Quit)) => {
        info!("收到退出请求");
        self.quit = true;
        TickAction::Quit
      }
      (TransportState::Running, Some(ControlEvent::Pause)) => {
        info!("暂停播放");
        self.state = TransportState::Paused;
        TickAction::Hold
      }
      (TransportState::Running, _) => TickAction::Advance(Direction::Forward),
      (TransportState::Paused, Some(ControlEvent::Resume)) => {
        info!("继续播放");
        self.state = TransportState::Running;
        TickAction::Hold
      }
      (TransportState::Paused, Some(ControlEvent::StepForward)) => {
        TickAction::Advance(Direction::Forward)
      }
      (TransportState::Paused, Some(ControlEvent::StepBackward)) => {
        TickAction::Advance(Direction::Backward)
      }
      (TransportState::Paused, Some(ControlEvent::Pause) | None) => TickAction::Hold,
    }
  }
}
