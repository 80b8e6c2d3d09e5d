// 该文件是 Liuguang （流光） 项目的一部分。
// tests/playback.rs - 调度循环集成测试
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

mod support;

use std::time::Duration;

use liuguang::{
  input::FrameSource,
  task::{OverlayMode, PlaybackTask, StopReason, Task, TaskError, TickOutcome},
  transport::{ControlEvent, TransportState},
};

use support::{GatedModel, InstantModel, ManualClock, MemorySource, ScriptedPresenter, WAIT};

const INTERVAL: Duration = Duration::from_millis(33);

fn task(clock: &ManualClock) -> PlaybackTask<ManualClock> {
  PlaybackTask::default()
    .with_clock(clock.clone())
    .with_interval(INTERVAL)
}

#[test]
fn slow_inference_is_never_stacked() {
  let clock = ManualClock::new();
  let (model, release) = GatedModel::new();
  let mut playback = task(&clock).start(
    MemorySource::new(10, false),
    Some(model),
    ScriptedPresenter::default(),
  );

  assert_eq!(playback.tick().unwrap(), TickOutcome::Continue);
  assert_eq!(playback.dispatcher().unwrap().stats().submitted, 1);

  for _ in 2..=4 {
    assert_eq!(playback.tick().unwrap(), TickOutcome::Continue);
  }
  let stats = playback.dispatcher().unwrap().stats();
  assert_eq!((stats.submitted, stats.rejected), (1, 3));
  assert_eq!(playback.presenter().tickets(), vec![None; 4]);

  // 推理在第 5 个节拍前完成
  release.send(()).unwrap();
  assert!(playback.dispatcher_mut().unwrap().wait_completed(WAIT));
  playback.tick().unwrap();

  let last = playback.presenter().presented.last().unwrap().clone();
  assert_eq!(last.frame.position(), 4);
  assert_eq!(last.ticket, Some(0));
  assert_eq!(last.analysed_position, Some(0));
  assert_eq!(playback.dispatcher().unwrap().stats().completed, 1);
  assert_eq!(playback.presenter().positions(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn pause_holds_the_same_frame_without_acquiring() {
  let clock = ManualClock::new();
  let script = [None, Some(ControlEvent::Pause), None, None, None];
  let mut playback = task(&clock).start(
    MemorySource::new(10, false),
    None::<InstantModel>,
    ScriptedPresenter::new(script),
  );

  playback.tick().unwrap();
  assert_eq!(playback.source().acquires, 1);
  playback.tick().unwrap();
  assert_eq!(playback.transport().state(), TransportState::Paused);

  for _ in 0..3 {
    assert_eq!(playback.tick().unwrap(), TickOutcome::Continue);
  }
  assert_eq!(playback.source().acquires, 1);
  assert_eq!(playback.source().position(), Some(0));

  let presented = &playback.presenter().presented;
  assert_eq!(presented.len(), 5);
  let first = &presented[0].frame;
  assert!(presented[2..].iter().all(|p| p.frame.shares_buffer(first)));
}

#[test]
fn step_backward_at_start_wraps_when_looping() {
  let clock = ManualClock::new();
  let script = [
    None,
    Some(ControlEvent::Pause),
    Some(ControlEvent::StepBackward),
    Some(ControlEvent::StepForward),
  ];
  let mut playback = task(&clock).start(
    MemorySource::new(5, true),
    None::<InstantModel>,
    ScriptedPresenter::new(script),
  );

  for _ in 0..4 {
    assert_eq!(playback.tick().unwrap(), TickOutcome::Continue);
  }
  assert_eq!(playback.presenter().positions(), vec![0, 0, 4, 0]);
}

#[test]
fn step_backward_at_start_keeps_frame_without_loop() {
  let clock = ManualClock::new();
  let script = [None, Some(ControlEvent::Pause), Some(ControlEvent::StepBackward)];
  let mut playback = task(&clock).start(
    MemorySource::new(5, false),
    None::<InstantModel>,
    ScriptedPresenter::new(script),
  );

  for _ in 0..3 {
    assert_eq!(playback.tick().unwrap(), TickOutcome::Continue);
  }
  assert_eq!(playback.presenter().positions(), vec![0, 0, 0]);
  assert_eq!(playback.current_frame().unwrap().position(), 0);
}

#[test]
fn stepping_backward_while_analysis_is_in_flight() {
  let script = [
    None,
    None,
    None,
    Some(ControlEvent::Pause),
    Some(ControlEvent::StepBackward),
  ];
  for (mode, expected) in [(OverlayMode::Latest, 1), (OverlayMode::FrameAccurate, 0)] {
    let clock = ManualClock::new();
    let (model, release) = GatedModel::new();
    let mut playback = task(&clock).with_overlay_mode(mode).start(
      MemorySource::new(5, false),
      Some(model),
      ScriptedPresenter::new(script),
    );

    for _ in 0..5 {
      assert_eq!(playback.tick().unwrap(), TickOutcome::Continue);
    }
    assert_eq!(playback.current_frame().unwrap().position(), 1);
    assert!(playback.dispatcher().unwrap().is_busy());

    release.send(()).unwrap();
    assert!(playback.dispatcher_mut().unwrap().wait_completed(WAIT));
    playback.tick().unwrap();

    let stats = playback.dispatcher().unwrap().stats();
    assert_eq!((stats.submitted, stats.completed, stats.rejected), (1, 1, 5));

    let last = playback.presenter().presented.last().unwrap().clone();
    assert_eq!(last.ticket, Some(0));
    assert_eq!(last.analysed_position, Some(0));
    assert_eq!(last.frame.position(), expected, "{:?}", mode);
    assert_eq!(playback.current_frame().unwrap().position(), 1);
    assert_eq!(playback.transport().state(), TransportState::Paused);
  }
}

#[test]
fn forward_end_of_stream_stops_cleanly() {
  let clock = ManualClock::new();
  let report = task(&clock)
    .run_task(
      MemorySource::new(3, false),
      None::<InstantModel>,
      ScriptedPresenter::default(),
    )
    .unwrap();

  assert_eq!(report.stop_reason, Some(StopReason::EndOfStream));
  assert_eq!((report.ticks, report.advances, report.presented), (4, 3, 3));
}

#[test]
fn without_a_model_every_tick_presents_no_result() {
  let clock = ManualClock::new();
  let mut playback = task(&clock).with_frame_number(Some(6)).start(
    MemorySource::new(4, true),
    None::<InstantModel>,
    ScriptedPresenter::default(),
  );

  let report = playback.run().unwrap();
  assert_eq!(report.stop_reason, Some(StopReason::FrameLimit));
  assert_eq!(report.presented, 6);
  assert_eq!(report.dispatch.submitted, 0);
  assert!(playback.dispatcher().is_none());
  assert_eq!(playback.presenter().tickets(), vec![None; 6]);
  assert_eq!(playback.presenter().positions(), vec![0, 1, 2, 3, 0, 1]);
}

#[test]
fn deadlines_do_not_drift_after_a_slow_tick() {
  let clock = ManualClock::new();
  let slow = [
    Duration::ZERO,
    Duration::from_millis(100),
    Duration::ZERO,
    Duration::ZERO,
  ];
  let report = task(&clock)
    .with_frame_number(Some(8))
    .run_task(
      MemorySource::new(3, true),
      None::<InstantModel>,
      ScriptedPresenter::default().with_delays(clock.clone(), slow),
    )
    .unwrap();

  let sleeps = clock.sleeps();
  assert_eq!(sleeps.len(), 7);
  for (n, deadline) in sleeps.iter().enumerate() {
    assert_eq!(*deadline, clock.start() + INTERVAL * (n as u32 + 1));
  }
  assert_eq!(report.overruns, 3);
  assert_eq!(report.max_lateness, Duration::from_millis(67));
}

#[test]
fn overrun_streak_warns_once_and_resets_on_recovery() {
  let clock = ManualClock::new();
  let slow = Duration::from_millis(100);
  let delays = [
    slow,
    Duration::ZERO,
    Duration::ZERO,
    Duration::ZERO,
    slow,
    Duration::ZERO,
    Duration::ZERO,
    Duration::ZERO,
  ];
  let mut playback = task(&clock).with_overrun_warn_ticks(2).start(
    MemorySource::new(10, true),
    None::<InstantModel>,
    ScriptedPresenter::default().with_delays(clock.clone(), delays),
  );

  let mut streaks = Vec::new();
  let mut warnings = Vec::new();
  for _ in 0..8 {
    playback.tick().unwrap();
    streaks.push(playback.overrun_streak());
    warnings.push(playback.report().overrun_warnings);
  }
  assert_eq!(streaks, vec![1, 2, 3, 0, 1, 2, 3, 0]);
  assert_eq!(warnings, vec![0, 1, 1, 1, 1, 2, 2, 2]);
  assert_eq!(playback.report().overruns, 6);
}

#[test]
fn overrun_warning_can_be_disabled() {
  let clock = ManualClock::new();
  let report = task(&clock)
    .with_overrun_warn_ticks(0)
    .with_frame_number(Some(4))
    .run_task(
      MemorySource::new(10, true),
      None::<InstantModel>,
      ScriptedPresenter::default().with_delays(clock.clone(), [Duration::from_millis(200)]),
    )
    .unwrap();
  assert_eq!(report.overruns, 3);
  assert_eq!(report.overrun_warnings, 0);
}

#[test]
fn quit_is_terminal() {
  let clock = ManualClock::new();
  let script = [None, Some(ControlEvent::Quit), Some(ControlEvent::Resume)];
  let mut playback = task(&clock).start(
    MemorySource::new(5, true),
    None::<InstantModel>,
    ScriptedPresenter::new(script),
  );

  assert_eq!(playback.tick().unwrap(), TickOutcome::Continue);
  assert_eq!(
    playback.tick().unwrap(),
    TickOutcome::Stopped(StopReason::Quit)
  );
  assert_eq!(
    playback.tick().unwrap(),
    TickOutcome::Stopped(StopReason::Quit)
  );
  assert_eq!(playback.presenter().presented.len(), 1);
  assert!(playback.transport().is_terminated());
}

#[test]
fn pause_on_first_tick_presents_nothing() {
  let clock = ManualClock::new();
  let script = [Some(ControlEvent::Pause), None, Some(ControlEvent::StepForward)];
  let mut playback = task(&clock).start(
    MemorySource::new(5, false),
    Some(InstantModel),
    ScriptedPresenter::new(script),
  );

  playback.tick().unwrap();
  playback.tick().unwrap();
  assert!(playback.presenter().presented.is_empty());
  assert_eq!(playback.dispatcher().unwrap().stats().submitted, 0);

  playback.tick().unwrap();
  assert_eq!(playback.presenter().positions(), vec![0]);
}

#[test]
fn frame_accurate_mode_shows_the_analysed_frame() {
  for (mode, expected) in [(OverlayMode::Latest, 1), (OverlayMode::FrameAccurate, 0)] {
    let clock = ManualClock::new();
    let (model, release) = GatedModel::new();
    let mut playback = task(&clock).with_overlay_mode(mode).start(
      MemorySource::new(5, false),
      Some(model),
      ScriptedPresenter::default(),
    );

    playback.tick().unwrap();
    release.send(()).unwrap();
    assert!(playback.dispatcher_mut().unwrap().wait_completed(WAIT));
    playback.tick().unwrap();

    let last = playback.presenter().presented.last().unwrap().clone();
    assert_eq!(last.frame.position(), expected, "{:?}", mode);
    assert_eq!(last.analysed_position, Some(0));
    assert_eq!(playback.current_frame().unwrap().position(), 1);
  }
}

#[test]
fn results_never_regress_during_playback() {
  let clock = ManualClock::new();
  let mut playback = task(&clock).start(
    MemorySource::new(6, true),
    Some(InstantModel),
    ScriptedPresenter::default(),
  );

  for _ in 0..12 {
    playback.dispatcher_mut().unwrap().wait_completed(WAIT);
    playback.tick().unwrap();
  }

  let presented = &playback.presenter().presented;
  let tickets: Vec<u64> = presented.iter().filter_map(|p| p.ticket).collect();
  assert!(!tickets.is_empty());
  assert!(tickets.windows(2).all(|w| w[0] <= w[1]));
  let stats = playback.dispatcher().unwrap().stats();
  assert!(stats.submitted <= 12);
  assert_eq!(stats.failed, 0);
}

#[test]
fn presentation_failure_stops_the_loop() {
  let clock = ManualClock::new();
  let result = task(&clock).run_task(
    MemorySource::new(5, true),
    None::<InstantModel>,
    ScriptedPresenter::default().failing_at(3),
  );
  assert!(matches!(result, Err(TaskError::Present(_))));
}

#[test]
fn source_frame_rate_sets_the_interval() {
  let clock = ManualClock::new();
  let playback = PlaybackTask::default().with_clock(clock.clone()).start(
    MemorySource::new(2, false),
    None::<InstantModel>,
    ScriptedPresenter::default(),
  );
  assert_eq!(
    playback.schedule().interval(),
    Duration::from_secs_f64(1.0 / 30.0)
  );
}
