// 该文件是 Liuguang （流光） 项目的一部分。
// src/schedule.rs - 固定节拍时间表
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

use std::time::{Duration, Instant};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// 调度循环使用的时钟
pub trait Clock {
  fn now(&self) -> Instant;
  /// 阻塞到指定时刻；时刻已过则立即返回
  fn sleep_until(&self, deadline: Instant);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> Instant {
    Instant::now()
  }

  fn sleep_until(&self, deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
      std::thread::sleep(deadline - now);
    }
  }
}

impl<C: Clock + ?Sized> Clock for &C {
  fn now(&self) -> Instant {
    (**self).now()
  }

  fn sleep_until(&self, deadline: Instant) {
    (**self).sleep_until(deadline)
  }
}

/// 由帧率得到节拍间隔
///
/// 帧率非有限、不为正，或间隔超出 `Duration` 的表示范围（帧率过小）、
/// 舍入为零（帧率过大）时返回 `None`。
pub fn interval_from_fps(fps: f64) -> Option<Duration> {
  if !fps.is_finite() || fps <= 0.0 {
    return None;
  }
  let interval = Duration::try_from_secs_f64(1.0 / fps).ok()?;
  (!interval.is_zero()).then_some(interval)
}

/// 固定速率的节拍时间表
///
/// 第 N 个节拍的截止时刻恒为 `start + N × interval`，
/// 与之前各节拍的实际耗时无关，抖动不会累积成漂移。
#[derive(Debug, Clone)]
pub struct TickSchedule {
  start: Instant,
  interval: Duration,
  ticks: u64,
}

impl TickSchedule {
  pub fn start(start: Instant, interval: Duration) -> Self {
    Self {
      start,
      interval,
      ticks: 0,
    }
  }

  pub fn start_time(&self) -> Instant {
    self.start
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  /// 已经发出的节拍数
  pub fn ticks(&self) -> u64 {
    self.ticks
  }

  pub fn deadline(&self, tick: u64) -> Instant {
    self.start + scale(self.interval, tick)
  }

  /// 进入下一个节拍并返回它的截止时刻
  pub fn next_deadline(&mut self) -> Instant {
    self.ticks += 1;
    self.deadline(self.ticks)
  }
}

fn scale(interval: Duration, n: u64) -> Duration {
  let nanos = interval.as_nanos() * u128::from(n);
  let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
  Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deadlines_follow_the_fixed_rate_law() {
    let start = Instant::now();
    let interval = Duration::from_millis(33);
    let mut schedule = TickSchedule::start(start, interval);
    for n in 1..=1000u64 {
      let deadline = schedule.next_deadline();
      assert_eq!(deadline, start + Duration::from_millis(33 * n));
    }
    assert_eq!(schedule.ticks(), 1000);
  }

  #[test]
  fn deadlines_are_strictly_increasing() {
    let mut schedule = TickSchedule::start(Instant::now(), Duration::from_nanos(33_333_333));
    let mut previous = schedule.start_time();
    for _ in 0..10_000 {
      let deadline = schedule.next_deadline();
      assert!(deadline > previous);
      previous = deadline;
    }
  }

  #[test]
  fn fractional_intervals_do_not_drift() {
    let start = Instant::now();
    let interval = Duration::from_nanos(33_333_333);
    let schedule = TickSchedule::start(start, interval);
    assert_eq!(
      schedule.deadline(3_000_000),
      start + Duration::from_nanos(33_333_333 * 3_000_000)
    );
  }

  #[test]
  fn interval_from_fps_rejects_nonsense() {
    assert_eq!(interval_from_fps(25.0), Some(Duration::from_millis(40)));
    assert_eq!(interval_from_fps(0.0), None);
    assert_eq!(interval_from_fps(-30.0), None);
    assert_eq!(interval_from_fps(f64::NAN), None);
    assert_eq!(interval_from_fps(f64::INFINITY), None);
  }

  #[test]
  fn interval_from_fps_rejects_unrepresentable_intervals() {
    assert_eq!(interval_from_fps(1e-300), None);
    assert_eq!(interval_from_fps(f64::MIN_POSITIVE), None);
    assert_eq!(interval_from_fps(1e30), None);
    assert_eq!(interval_from_fps(0.5), Some(Duration::from_secs(2)));
  }

  #[test]
  fn system_clock_returns_immediately_for_past_deadlines() {
    let clock = SystemClock;
    let past = clock.now();
    std::thread::sleep(Duration::from_millis(2));
    let before = Instant::now();
    clock.sleep_until(past);
    assert!(before.elapsed() < Duration::from_millis(50));
  }
}
