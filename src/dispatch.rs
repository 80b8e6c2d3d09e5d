// 该文件是 Liuguang （流光） 项目的一部分。
// src/dispatch.rs - 后台推理调度
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

//! 单槽位的后台推理调度器。
//!
//! 同一时刻最多只有一个推理在进行；槽位被占用时提交的帧直接丢弃，
//! 不排队。调度循环只通过非阻塞的 [`InferenceDispatcher::poll_completed`]
//! 取回结果，因此推理再慢也不会拖住显示。

use std::{
  sync::{
    Arc,
    mpsc::{Receiver, RecvTimeoutError, TryRecvError, sync_channel},
  },
  thread,
  time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use crate::{frame::Frame, model::Model};

/// 一次完成的推理：结果、它对应的帧以及提交序号
#[derive(Debug)]
pub struct Analysis<T> {
  ticket: u64,
  frame: Frame,
  output: T,
  elapsed: Duration,
}

impl<T> Analysis<T> {
  pub fn new(ticket: u64, frame: Frame, output: T, elapsed: Duration) -> Self {
    Self {
      ticket,
      frame,
      output,
      elapsed,
    }
  }

  /// 提交序号，严格递增
  pub fn ticket(&self) -> u64 {
    self.ticket
  }

  /// 计算该结果所用的帧
  pub fn frame(&self) -> &Frame {
    &self.frame
  }

  pub fn output(&self) -> &T {
    &self.output
  }

  /// 推理耗时
  pub fn elapsed(&self) -> Duration {
    self.elapsed
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
  pub submitted: u64,
  pub completed: u64,
  pub failed: u64,
  /// 因槽位被占用而丢弃的提交
  pub rejected: u64,
}

type WorkerMessage<T, E> = (Result<T, E>, Duration);

struct InFlight<T, E> {
  ticket: u64,
  frame: Frame,
  receiver: Receiver<WorkerMessage<T, E>>,
  ready: Option<WorkerMessage<T, E>>,
}

enum Completion<T, E> {
  Finished(WorkerMessage<T, E>),
  Lost,
}

pub struct InferenceDispatcher<M: Model> {
  model: Arc<M>,
  in_flight: Option<InFlight<M::Output, M::Error>>,
  latest: Option<Arc<Analysis<M::Output>>>,
  next_ticket: u64,
  stats: DispatchStats,
}

impl<M> InferenceDispatcher<M>
where
  M: Model<Input = Frame> + Send + Sync + 'static,
  M::Output: Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(model: M) -> Self {
    Self::from_shared(Arc::new(model))
  }

  pub fn from_shared(model: Arc<M>) -> Self {
    Self {
      model,
      in_flight: None,
      latest: None,
      next_ticket: 0,
      stats: DispatchStats::default(),
    }
  }

  /// 槽位空闲时在后台线程上开始推理并返回 `true`；
  /// 已有推理在进行时不做任何事并返回 `false`。
  pub fn try_submit(&mut self, frame: &Frame) -> bool {
    if let Some(in_flight) = &self.in_flight {
      self.stats.rejected += 1;
      debug!(
        "推理 #{} (第 {} 帧) 尚未完成，丢弃第 {} 帧",
        in_flight.ticket,
        in_flight.frame.position(),
        frame.position()
      );
      return false;
    }

    let ticket = self.next_ticket;
    let (sender, receiver) = sync_channel(1);
    let model = Arc::clone(&self.model);
    let input = frame.clone();

    let spawned = thread::Builder::new()
      .name(format!("liuguang-infer-{}", ticket))
      .spawn(move || {
        let start = Instant::now();
        let result = model.infer(&input);
        // 调度器已退出时接收端不存在，结果直接丢弃
        let _ = sender.send((result, start.elapsed()));
      });
    if let Err(e) = spawned {
      error!("无法启动推理线程: {}", e);
      return false;
    }

    debug!("提交推理 #{}: 第 {} 帧", ticket, frame.position());
    self.next_ticket += 1;
    self.stats.submitted += 1;
    self.in_flight = Some(InFlight {
      ticket,
      frame: frame.clone(),
      receiver,
      ready: None,
    });
    true
  }

  /// 非阻塞地检查进行中的推理。
  ///
  /// 自上次调用以来推理完成时返回其结果（每个结果只返回一次）并释放槽位；
  /// 推理失败或线程异常退出时同样释放槽位，但返回 `None`，保留上一次的结果。
  pub fn poll_completed(&mut self) -> Option<Arc<Analysis<M::Output>>> {
    let completion = {
      let in_flight = self.in_flight.as_mut()?;
      match in_flight.ready.take() {
        Some(message) => Completion::Finished(message),
        None => match in_flight.receiver.try_recv() {
          Ok(message) => Completion::Finished(message),
          Err(TryRecvError::Empty) => return None,
          Err(TryRecvError::Disconnected) => Completion::Lost,
        },
      }
    };
    let in_flight = self.in_flight.take()?;

    match completion {
      Completion::Finished((Ok(output), elapsed)) => {
        debug!(
          "推理 #{} 完成 (第 {} 帧)，耗时 {:.2?}",
          in_flight.ticket,
          in_flight.frame.position(),
          elapsed
        );
        self.stats.completed += 1;
        let analysis = Arc::new(Analysis::new(
          in_flight.ticket,
          in_flight.frame,
          output,
          elapsed,
        ));
        self.latest = Some(Arc::clone(&analysis));
        Some(analysis)
      }
      Completion::Finished((Err(e), elapsed)) => {
        warn!(
          "推理 #{} 失败 (第 {} 帧，耗时 {:.2?}): {}",
          in_flight.ticket,
          in_flight.frame.position(),
          elapsed,
          e
        );
        self.stats.failed += 1;
        None
      }
      Completion::Lost => {
        error!("推理线程 #{} 异常退出", in_flight.ticket);
        self.stats.failed += 1;
        None
      }
    }
  }

  /// 最近一次由 [`Self::poll_completed`] 返回的结果
  pub fn latest_result(&self) -> Option<Arc<Analysis<M::Output>>> {
    self.latest.clone()
  }

  pub fn is_busy(&self) -> bool {
    self.in_flight.is_some()
  }

  /// 阻塞等待进行中的推理结束，但不取走结果。
  ///
  /// 有结果可供下一次 `poll_completed` 取回时返回 `true`；
  /// 没有进行中的推理或等待超时返回 `false`。
  pub fn wait_completed(&mut self, timeout: Duration) -> bool {
    let Some(in_flight) = self.in_flight.as_mut() else {
      return false;
    };
    if in_flight.ready.is_some() {
      return true;
    }
    match in_flight.receiver.recv_timeout(timeout) {
      Ok(message) => {
        in_flight.ready = Some(message);
        true
      }
      Err(RecvTimeoutError::Timeout) => false,
      Err(RecvTimeoutError::Disconnected) => true,
    }
  }

  pub fn stats(&self) -> DispatchStats {
    self.stats
  }
}

impl<M: Model> Drop for InferenceDispatcher<M> {
  fn drop(&mut self) {
    if let Some(in_flight) = &self.in_flight {
      info!("推理 #{} 仍在进行，结果将被丢弃", in_flight.ticket);
    }
  }
}
