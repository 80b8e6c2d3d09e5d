// 该文件是 Liuguang （流光） 项目的一部分。
// src/control.rs - 用户控制输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  io::BufRead,
  sync::mpsc::{Receiver, Sender, TryRecvError, channel},
  thread,
  time::Duration,
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::transport::ControlEvent;

const FORCE_EXIT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ControlError {
  #[error("无法设置 Ctrl-C 处理函数: {0}")]
  CtrlC(#[from] ctrlc::Error),
  #[error("无法启动键盘读取线程: {0}")]
  IoError(#[from] std::io::Error),
}

/// 控制事件来源，每个节拍查询一次
pub trait ControlSource {
  /// 取出自上次查询以来的事件；积压多个时只保留最后一个
  fn poll_event(&mut self) -> Option<ControlEvent>;
}

/// 从标准输入逐行读取按键（p/r/f/b/q），Ctrl-C 视为退出
pub struct KeyboardControl {
  receiver: Receiver<ControlEvent>,
}

impl KeyboardControl {
  pub fn spawn() -> Result<Self, ControlError> {
    let (sender, receiver) = channel();

    let interrupt = sender.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = interrupt.send(ControlEvent::Quit);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(FORCE_EXIT_SECS));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    thread::Builder::new()
      .name("liuguang-keyboard".to_string())
      .spawn(move || read_keys(std::io::stdin().lock(), sender))?;

    info!("键盘控制: p 暂停, r 继续, f 前进一帧, b 后退一帧, q 退出");
    Ok(Self { receiver })
  }

  pub fn from_receiver(receiver: Receiver<ControlEvent>) -> Self {
    Self { receiver }
  }
}

fn read_keys(input: impl BufRead, sender: Sender<ControlEvent>) {
  for line in input.lines() {
    let Ok(line) = line else {
      break;
    };
    for key in line.chars().filter(|c| !c.is_whitespace()) {
      match ControlEvent::from_key(key) {
        Some(event) => {
          if sender.send(event).is_err() {
            return;
          }
        }
        None => debug!("忽略未知按键: {:?}", key),
      }
    }
  }
  debug!("标准输入已关闭，停止读取按键");
}

impl ControlSource for KeyboardControl {
  fn poll_event(&mut self) -> Option<ControlEvent> {
    let mut last = None;
    loop {
      match self.receiver.try_recv() {
        Ok(event) => last = Some(event),
        Err(TryRecvError::Empty | TryRecvError::Disconnected) => return last,
      }
    }
  }
}
