use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use lumina_clock::{
    alarm::{AlarmId, AlarmSet, Sound, TimeOfDay},
    alarm_edit::{AlarmBuilder, AlarmEdit},
    audio::{mock::MockBackend, tone::Cue, AudioEngine, AudioState, LayerName},
    clock_source::{ClockSource, ManualClock},
    config::{Config, MemoryStore},
    elapsed::TimerState,
    error::AudioError,
    ringing::RingingState,
    Clock, Pumped,
};

type TestClock = Clock<MockBackend, MemoryStore>;

/// 2024-01-01 was a monday
fn monday(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .unwrap()
}

fn config(alarms: Vec<AlarmBuilder>) -> Config {
    let mut set = AlarmSet::new();
    for alarm in alarms {
        set.insert(alarm);
    }
    Config {
        alarms: set,
        ..Config::new()
    }
}

fn clock(config: Config) -> (MockBackend, MemoryStore, TestClock) {
    let mock = MockBackend::new();
    let store = MemoryStore::with(config);
    let clock = Clock::load(store.clone(), AudioEngine::with_backend(mock.clone())).unwrap();
    (mock, store, clock)
}

/// pumps once a second for `seconds`, collecting what happened
fn run(clock: &mut TestClock, time: &ManualClock, seconds: u32) -> Vec<Pumped> {
    (0..seconds)
        .map(|_| {
            time.advance(Duration::from_secs(1));
            clock.pump(time.wall(), time.monotonic())
        })
        .collect()
}

fn five_am() -> AlarmBuilder {
    AlarmBuilder::new(5, 0, Some(TimeOfDay::AM))
}

#[test]
fn monday_alarm_rings_on_monday_only() {
    let (_mock, _store, mut clock) = clock(config(vec![five_am().days([Weekday::Mon])]));

    let time = ManualClock::new(monday(4, 59, 58));
    let rang: Vec<_> = run(&mut clock, &time, 5).into_iter().filter_map(|p| p.rang).collect();
    assert_eq!(rang, vec![AlarmId(1)]);
    assert_eq!(clock.ringing().map(|s| s.started()), Some(monday(5, 0, 0)));
    clock.dismiss(time.monotonic());

    // tuesday
    time.set_wall(monday(4, 59, 58) + chrono::TimeDelta::days(1));
    assert!(run(&mut clock, &time, 5).iter().all(|p| p.rang.is_none()));
    assert!(clock.ringing().is_none());
}

#[test]
fn inactive_seed_alarms_stay_quiet() {
    let (mock, _store, mut clock) = clock(Config::new());
    // 6:00 am is seeded off
    let time = ManualClock::new(monday(5, 59, 59));
    assert!(run(&mut clock, &time, 3).iter().all(|p| p.rang.is_none()));
    assert_eq!(mock.started(), 0);

    // 5:00 am is seeded on
    time.set_wall(monday(4, 59, 59));
    assert!(run(&mut clock, &time, 1)[0].rang.is_some());
}

#[test]
fn two_alarms_in_the_same_minute_ring_once() {
    let (mock, _store, mut clock) = clock(config(vec![
        five_am().label("first"),
        five_am().label("second").sound(Sound::tone("Zen Garden")),
    ]));
    let time = ManualClock::new(monday(4, 59, 59));

    let pumped = run(&mut clock, &time, 3);
    assert_eq!(pumped[0].rang, Some(AlarmId(1)));
    assert!(pumped[1..].iter().all(|p| p.rang.is_none()));
    assert_eq!(clock.ringing().map(|s| s.alarm().label.as_str()), Some("first"));
    assert_eq!(mock.started(), 1);

    // the second one was dropped, not queued
    clock.dismiss(time.monotonic());
    assert!(run(&mut clock, &time, 120).iter().all(|p| p.rang.is_none()));
}

#[test]
fn fading_alarm_ramps_to_full_volume() {
    let (mock, _store, mut clock) = clock(config(vec![five_am().fade(true)]));
    let time = ManualClock::new(monday(4, 59, 59));
    run(&mut clock, &time, 1);
    assert_eq!(clock.ringing_state(), RingingState::Fading);
    assert_eq!(clock.ringing_volume(), Some(0.1));

    run(&mut clock, &time, 5);
    let volume = clock.ringing_volume().unwrap();
    assert!((volume - 0.25).abs() < 1e-6, "{volume}");

    run(&mut clock, &time, 15);
    assert!((clock.ringing_volume().unwrap() - 1.0).abs() < f32::EPSILON);
    assert!((clock.fade_progress().unwrap() - 1.0).abs() < f32::EPSILON);
    run(&mut clock, &time, 1);
    assert!((clock.ringing_volume().unwrap() - 1.0).abs() < f32::EPSILON);

    // only ever the one source, turned up
    assert_eq!(mock.started(), 1);
    assert_eq!(clock.audio().live_sources(LayerName::Alarm), 1);
}

#[test]
fn dismiss_twice_leaves_nothing_playing() {
    let (mock, _store, mut clock) = clock(config(vec![five_am().fade(true)]));
    let time = ManualClock::new(monday(4, 59, 59));
    run(&mut clock, &time, 3);

    assert!(clock.dismiss(time.monotonic()).is_some());
    assert!(clock.dismiss(time.monotonic()).is_none());
    assert_eq!(clock.ringing_state(), RingingState::Idle);
    assert_eq!(clock.fade_progress(), None);

    run(&mut clock, &time, 2);
    assert_eq!(mock.live_voices(), 0);
    assert_eq!(clock.audio().live_sources(LayerName::Alarm), 0);
}

#[test]
fn snoozed_alarm_rings_again() {
    let (_mock, _store, mut clock) = clock(config(vec![five_am()]));
    let time = ManualClock::new(monday(4, 59, 59));
    run(&mut clock, &time, 1);

    let due = clock.snooze(time.wall(), time.monotonic());
    assert_eq!(due, Some(monday(5, 5, 0)));
    assert!(clock.ringing().is_none());

    let rang: Vec<_> = run(&mut clock, &time, 400).into_iter().filter_map(|p| p.rang).collect();
    assert_eq!(rang, vec![AlarmId(1)]);
    assert!(clock.snoozed().is_none());
}

#[test]
fn removing_the_ringing_alarm_silences_it() {
    let (mock, store, mut clock) = clock(config(vec![five_am()]));
    let time = ManualClock::new(monday(4, 59, 59));
    run(&mut clock, &time, 1);

    assert!(clock.remove_alarm(AlarmId(1), time.monotonic()).is_some());
    assert!(clock.ringing().is_none());
    run(&mut clock, &time, 2);
    assert_eq!(mock.live_voices(), 0);
    assert!(store.current().unwrap().alarms.is_empty());
}

#[test]
fn timer_runs_down_and_rings_once() {
    let (mock, _store, mut clock) = clock(config(vec![]));
    let time = ManualClock::new(monday(12, 0, 0));
    assert!(clock.start_timer_preset(1, time.monotonic()));

    let pumped = run(&mut clock, &time, 75);
    assert_eq!(pumped.iter().filter(|p| p.timer_finished).count(), 1);
    assert!(pumped[59].timer_finished);
    assert_eq!(clock.timer().remaining(), 0);
    assert_eq!(clock.timer().state(), TimerState::Ringing);
    assert_eq!(clock.audio().active_sound(LayerName::Alarm), Some("Classic Bell"));

    assert!(clock.stop_timer(time.monotonic()));
    assert_eq!(clock.timer().state(), TimerState::Setup);
    run(&mut clock, &time, 2);
    assert_eq!(mock.live_voices(), 0);
    assert_eq!(mock.cues(), vec![Cue::Tick, Cue::Click]);
}

#[test]
fn timer_controls_and_ui_sounds() {
    let mut quiet = config(vec![]);
    quiet.audio.ui_sounds = false;
    let (mock, _store, mut clock) = clock(quiet);
    let time = ManualClock::new(monday(12, 0, 0));

    clock.timer_setup_mut().seconds = 0;
    clock.timer_setup_mut().minutes = 0;
    assert!(!clock.start_timer(time.monotonic()), "zero duration");

    clock.timer_setup_mut().seconds = 10;
    assert!(clock.toggle_timer(time.monotonic()));
    run(&mut clock, &time, 4);
    assert!(clock.toggle_timer(time.monotonic()));
    assert_eq!(clock.timer().state(), TimerState::Paused);
    run(&mut clock, &time, 30);
    assert_eq!(clock.timer().display(), "00:06");

    clock.cancel_timer(time.monotonic());
    assert_eq!(clock.timer().state(), TimerState::Setup);
    assert!(mock.cues().is_empty());
    assert_eq!(mock.started(), 0);
}

#[test]
fn stopwatch_laps_use_centiseconds() {
    let (_mock, _store, mut clock) = clock(config(vec![]));
    let time = ManualClock::new(monday(12, 0, 0));
    assert!(clock.lap().is_none());

    clock.start_stopwatch(time.monotonic());
    for _ in 0..100 {
        time.advance(Duration::from_millis(612) + Duration::from_micros(300));
        clock.pump(time.wall(), time.monotonic());
    }
    let lap = clock.lap().unwrap();
    assert_eq!((lap.number, lap.time.as_str()), (1, "01:01.23"));

    clock.pause_stopwatch(time.monotonic());
    time.advance(Duration::from_secs(30));
    clock.pump(time.wall(), time.monotonic());
    assert_eq!(clock.stopwatch().display(), "01:01.23");

    clock.reset_stopwatch();
    assert_eq!(clock.stopwatch().display(), "00:00.00");
    assert!(clock.stopwatch().laps().is_empty());
}

#[test]
fn previews_restart_but_alarms_only_change_volume() {
    let (mock, _store, mut clock) = clock(config(vec![five_am().fade(true)]));
    let time = ManualClock::new(monday(4, 59, 59));

    clock.preview(&Sound::tone("Zen Garden"), time.monotonic());
    clock.preview(&Sound::tone("Zen Garden"), time.monotonic());
    assert_eq!(mock.started(), 2);
    assert_eq!(clock.audio().live_sources(LayerName::Preview), 2);

    run(&mut clock, &time, 10);
    // one more for the alarm, however many fade steps re-asserted it
    assert_eq!(mock.started(), 3);
    assert_eq!(clock.audio().live_sources(LayerName::Preview), 1);

    clock.stop_preview(time.monotonic());
    run(&mut clock, &time, 1);
    assert_eq!(clock.audio().live_sources(LayerName::Preview), 0);
    assert_eq!(clock.audio().active_sound(LayerName::Alarm), Some("Classic Bell"));
}

#[test]
fn alarms_still_ring_without_audio() {
    let store = MemoryStore::with(config(vec![five_am().fade(true)]));
    let audio: AudioEngine<MockBackend> =
        AudioEngine::new(|| Err(AudioError::Unavailable("no device".to_string())));
    let mut clock = Clock::load(store, audio).unwrap();
    let time = ManualClock::new(monday(4, 59, 59));

    assert!(run(&mut clock, &time, 1)[0].rang.is_some());
    assert_eq!(clock.audio_state(), AudioState::Unavailable);
    run(&mut clock, &time, 4);
    let progress = clock.fade_progress().unwrap();
    assert!((progress - 0.2).abs() < 1e-6, "{progress}");
    assert!(clock.dismiss(time.monotonic()).is_some());
}

#[test]
fn alarm_changes_are_saved() {
    let (_mock, store, mut clock) = clock(config(vec![]));
    let id = clock.add_alarm(AlarmBuilder::new(7, 30, None).label("run"));
    assert_eq!(store.saves(), 1);

    assert_eq!(clock.toggle_alarm(id), Some(false));
    clock
        .update_alarm(id, AlarmEdit::Sound(Sound::custom("birds", vec![1, 2, 3])))
        .unwrap();
    assert!(clock.update_alarm(AlarmId(42), AlarmEdit::Active(true)).is_err());
    assert_eq!(store.saves(), 3);

    let saved = store.current().unwrap();
    let alarm = saved.alarms.get(id).unwrap();
    assert!(!alarm.active);
    assert_eq!(alarm.sound.name(), "birds");

    // a fresh clock sees the same alarms
    let reloaded = Clock::load(store.clone(), AudioEngine::<MockBackend>::disabled()).unwrap();
    assert_eq!(reloaded.alarms(), clock.alarms());
}

#[test]
fn upcoming_lists_time_until_each_alarm() {
    let (_mock, _store, clock) = clock(Config::new());
    let now = monday(4, 0, 0);
    let upcoming: Vec<_> = clock
        .upcoming(now)
        .map(|(alarm, until)| (alarm.time.clone(), until.map(|d| d.num_minutes())))
        .collect();
    assert_eq!(
        upcoming,
        vec![
            ("5:00".to_string(), Some(60)),
            ("6:00".to_string(), None),
            ("8:30".to_string(), Some(270)),
            ("10:15".to_string(), None),
        ]
    );
    assert_eq!(
        clock.next_alarm(now).map(|(alarm, _)| alarm.id),
        Some(AlarmId(1))
    );
}

#[test]
fn restarting_a_ringing_timer_silences_it() {
    let (mock, _store, mut clock) = clock(config(vec![]));
    let time = ManualClock::new(monday(12, 0, 0));
    clock.start_timer_preset(1, time.monotonic());
    run(&mut clock, &time, 60);
    assert_eq!(clock.timer().state(), TimerState::Ringing);

    assert!(clock.start_timer_preset(5, time.monotonic()));
    assert_eq!(clock.timer().state(), TimerState::Running);
    assert_eq!(clock.audio().active_sound(LayerName::Alarm), None);
    run(&mut clock, &time, 2);
    assert_eq!(mock.live_voices(), 0);

    // and from the setup too
    run(&mut clock, &time, 300);
    assert_eq!(clock.timer().state(), TimerState::Ringing);
    assert!(clock.start_timer(time.monotonic()));
    run(&mut clock, &time, 2);
    assert_eq!(mock.live_voices(), 0);
    clock.cancel_timer(time.monotonic());
    assert_eq!(clock.timer().state(), TimerState::Setup);
}

#[test]
fn fading_alarm_with_a_broken_clip_keeps_one_source() {
    let (mock, _store, mut clock) = clock(config(vec![
        five_am().fade(true).sound(Sound::custom("broken", vec![9; 16])),
    ]));
    mock.fail_decoding(true);
    let time = ManualClock::new(monday(4, 59, 59));

    assert!(run(&mut clock, &time, 1)[0].rang.is_some());
    run(&mut clock, &time, 30);
    assert_eq!(mock.started(), 1);
    assert_eq!(mock.decodes(), 1);
    assert_eq!(clock.audio().live_sources(LayerName::Alarm), 1);
    assert_eq!(clock.audio().active_sound(LayerName::Alarm), Some("broken"));
    assert!((clock.ringing_volume().unwrap() - 1.0).abs() < f32::EPSILON);
}

#[test]
fn editing_the_ringing_alarm_leaves_the_session_alone() {
    let (mock, _store, mut clock) = clock(config(vec![five_am().fade(true)]));
    let time = ManualClock::new(monday(4, 59, 59));
    run(&mut clock, &time, 4);
    let before = clock.ringing().unwrap().alarm().clone();

    clock.update_alarm(AlarmId(1), AlarmEdit::Active(false)).unwrap();
    clock.update_alarm(AlarmId(1), AlarmEdit::Fade(false)).unwrap();
    clock
        .update_alarm(AlarmId(1), AlarmEdit::Sound(Sound::tone("Zen Garden")))
        .unwrap();
    clock
        .update_alarm(AlarmId(1), AlarmEdit::Label("changed".to_string()))
        .unwrap();
    assert_eq!(clock.toggle_alarm(AlarmId(1)), Some(true));
    assert_eq!(clock.alarms().get(AlarmId(1)).unwrap().label, "changed");

    run(&mut clock, &time, 2);
    assert_eq!(clock.ringing().unwrap().alarm(), &before);
    assert_eq!(clock.ringing_state(), RingingState::Fading);
    let progress = clock.fade_progress().unwrap();
    assert!((progress - 0.25).abs() < 1e-6, "{progress}");
    assert_eq!(clock.audio().active_sound(LayerName::Alarm), Some("Classic Bell"));
    assert_eq!(mock.started(), 1);
}
