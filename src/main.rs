use std::{
    error::Error,
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use chrono::{NaiveTime, TimeDelta, Weekday};
use clap::{Parser, Subcommand};
use log::{error, info};
use lumina_clock::{
    alarm::{parse_minute_of_day, Alarm, AlarmId, Sound, TimeOfDay},
    alarm_edit::AlarmBuilder,
    audio::{tone::Tone, AudioEngine, AudioState, RodioBackend},
    clock_source::{ClockSource, SystemClock},
    communication,
    config::{Config, Store, TomlStore},
    elapsed::{TimerSetup, TimerState, PRESETS},
    Clock,
};

/// how often the engine is pumped, about one display frame
const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// write the default config
    Init {
        #[clap(long, short)]
        force: bool,
    },
    /// add an alarm, the time is "7:30am", "7:30 pm" or "19:30"
    Add {
        time: String,
        #[clap(long, short)]
        label: Option<String>,
        /// one of the built in tones
        #[clap(long, short)]
        sound: Option<String>,
        /// an audio file to ring with instead of a built in tone
        #[clap(long, conflicts_with = "sound")]
        file: Option<PathBuf>,
        /// comma separated, e.g. mon,tue,fri (every day when left out)
        #[clap(long, short, value_delimiter = ',')]
        days: Vec<Weekday>,
        #[clap(long)]
        fade: bool,
        #[clap(long)]
        vibrate: bool,
    },
    Remove {
        id: u64,
    },
    /// turn an alarm on or off
    Toggle {
        id: u64,
    },
    List,
    /// play a sound for a few seconds
    Preview {
        sound: String,
        #[clap(long)]
        file: Option<PathBuf>,
        #[clap(long, default_value_t = 5)]
        seconds: u64,
    },
    Timer {
        /// start one of the presets (in minutes) right away
        #[clap(long, short)]
        preset: Option<u64>,
        #[clap(long, default_value_t = 0)]
        hours: u8,
        #[clap(long, default_value_t = 5)]
        minutes: u8,
        #[clap(long, default_value_t = 0)]
        seconds: u8,
    },
    Stopwatch,
    /// wait for alarms to ring (the default)
    Run,
}

type LiveClock = Clock<RodioBackend, TomlStore>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Alarms,
    Timer,
    Stopwatch,
}

fn main() -> Result<(), Box<dyn Error>> {
    // initilize the logger
    simple_file_logger::init_logger!("lumina_clock")
        .map_err(|e| format!("couldn't initialize logger: {e:?}"))?;

    let args = Args::parse();
    let mut store = TomlStore::user()?;
    match args.command {
        Some(Command::Init { force }) => {
            if force || !store.is_present() {
                store.save(&Config::new())?;
                println!("wrote {}", store.path().display());
            } else {
                println!(
                    "{} already exists, use --force to overwrite it",
                    store.path().display()
                );
            }
        }
        Some(Command::Add {
            time,
            label,
            sound,
            file,
            days,
            fade,
            vibrate,
        }) => {
            let mut builder = parse_alarm_time(&time)?.fade(fade).vibrate(vibrate);
            if let Some(label) = label {
                builder = builder.label(label);
            }
            if let Some(sound) = load_sound(sound, file)? {
                builder = builder.sound(sound);
            }
            if !days.is_empty() {
                builder = builder.days(days);
            }
            let mut clock = open_clock(store)?;
            let id = clock.add_alarm(builder);
            println!("added alarm {id}");
        }
        Some(Command::Remove { id }) => {
            let mut clock = open_clock(store)?;
            match clock.remove_alarm(AlarmId(id), Instant::now()) {
                Some(_) => println!("removed alarm {id}"),
                None => println!("no alarm with id {id}"),
            }
        }
        Some(Command::Toggle { id }) => {
            let mut clock = open_clock(store)?;
            match clock.toggle_alarm(AlarmId(id)) {
                Some(true) => println!("alarm {id} is on"),
                Some(false) => println!("alarm {id} is off"),
                None => println!("no alarm with id {id}"),
            }
        }
        Some(Command::List) => list(&open_clock(store)?),
        Some(Command::Preview {
            sound,
            file,
            seconds,
        }) => {
            let sound = load_sound(Some(sound), file)?.unwrap_or_default();
            let mut clock = open_clock(store)?;
            let start = Instant::now();
            clock.preview(&sound, start);
            let end = start + Duration::from_secs(seconds);
            while SystemClock.monotonic() < end {
                clock.pump(SystemClock.wall(), SystemClock.monotonic());
                thread::sleep(FRAME);
            }
            if clock.audio_state() == AudioState::Unavailable {
                println!("no audio output available");
            }
            // let the fade out finish before the device goes away
            clock.stop_preview(Instant::now());
            thread::sleep(clock.config().audio.preview_fade());
        }
        Some(Command::Timer {
            preset,
            hours,
            minutes,
            seconds,
        }) => {
            let mut clock = open_clock(store)?;
            *clock.timer_setup_mut() = TimerSetup::new(hours, minutes, seconds);
            if let Some(minutes) = preset {
                clock.start_timer_preset(minutes, Instant::now());
            }
            interact(clock, View::Timer);
        }
        Some(Command::Stopwatch) => interact(open_clock(store)?, View::Stopwatch),
        Some(Command::Run) | None => interact(open_clock(store)?, View::Alarms),
    }
    Ok(())
}

fn open_clock(store: TomlStore) -> Result<LiveClock, Box<dyn Error>> {
    Ok(Clock::load(store, AudioEngine::new(RodioBackend::open))?)
}

/// "7:30am", "7:30 PM" or "19:30"
fn parse_alarm_time(input: &str) -> Result<AlarmBuilder, Box<dyn Error>> {
    let lower = input.trim().to_ascii_lowercase();
    let (time, period) = if let Some(time) = lower.strip_suffix("am") {
        (time.trim(), Some(TimeOfDay::AM))
    } else if let Some(time) = lower.strip_suffix("pm") {
        (time.trim(), Some(TimeOfDay::PM))
    } else {
        (lower.as_str(), None)
    };
    if parse_minute_of_day(time, period).is_none() {
        return Err(format!("{input:?} isn't a valid time").into());
    }
    let (hour, minute) = time
        .split_once(':')
        .ok_or_else(|| format!("{input:?} isn't a valid time"))?;
    Ok(AlarmBuilder::new(
        hour.trim().parse()?,
        minute.trim().parse()?,
        period,
    ))
}

fn load_sound(name: Option<String>, file: Option<PathBuf>) -> Result<Option<Sound>, Box<dyn Error>> {
    if let Some(path) = file {
        let data = fs::read(&path)?;
        let name = name.unwrap_or_else(|| {
            path.file_name()
                .map_or_else(|| "custom".to_string(), |name| name.to_string_lossy().into_owned())
        });
        return Ok(Some(Sound::custom(name, data)));
    }
    if let Some(name) = &name {
        if !Tone::names().any(|tone| tone == name.as_str()) {
            println!(
                "{name} isn't a built in tone, it will play as the default ({})",
                Tone::names().collect::<Vec<_>>().join(", ")
            );
        }
    }
    Ok(name.map(Sound::tone))
}

fn list(clock: &LiveClock) {
    let now = SystemClock.wall();
    let format = &clock.config().time_format;
    for (alarm, until) in clock.upcoming(now) {
        println!(
            "{:>3}  {:>8}  {:<3}  {:<20}  {:<16}  {}",
            alarm.id,
            display_time(alarm, format),
            if alarm.active { "on" } else { "off" },
            alarm.label,
            alarm.sound,
            until.map_or_else(|| "-".to_string(), |until| format!("in {}", short(until)))
        );
    }
}

fn display_time(alarm: &Alarm, format: &str) -> String {
    alarm
        .minute_of_day()
        .and_then(|minute| NaiveTime::from_hms_opt(u32::from(minute / 60), u32::from(minute % 60), 0))
        .map_or_else(|| alarm.time.clone(), |time| time.format(format).to_string())
}

fn short(delta: TimeDelta) -> String {
    let minutes = delta.num_minutes();
    match (minutes / (24 * 60), minutes / 60 % 24, minutes % 60) {
        (0, 0, m) => format!("{m}m"),
        (0, h, m) => format!("{h}h {m}m"),
        (d, h, _) => format!("{d}d {h}h"),
    }
}

fn spawn_input() -> Receiver<communication::Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.parse::<communication::Command>() {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(communication::UnknownCommand(input)) => {
                    println!("unknown command {input:?}\n{}", communication::Command::HELP);
                }
            }
        }
    });
    rx
}

/// the main thread owns the clock, the input thread only sends commands
fn interact(mut clock: LiveClock, view: View) {
    println!("{}", communication::Command::HELP);
    if view == View::Timer {
        println!("presets: {PRESETS:?} minutes");
    }
    let rx = spawn_input();
    let mut shown = String::new();
    loop {
        match rx.recv_timeout(FRAME) {
            Ok(communication::Command::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => handle(&mut clock, view, command),
            Err(RecvTimeoutError::Timeout) => {}
        }
        let pumped = clock.pump(SystemClock.wall(), SystemClock.monotonic());
        if let Some(session) = pumped.rang.and(clock.ringing()) {
            let alarm = session.alarm();
            println!("\n{} ringing {} (d: dismiss, s: snooze)", alarm.time, alarm.label);
            if clock.audio_state() == AudioState::Unavailable {
                println!("(no audio output)");
            }
        }
        if pumped.timer_finished {
            println!("\ntimer done (c: stop)");
        }
        let status = status(&clock, view);
        if status != shown {
            print!("\r{status}   ");
            if let Err(e) = io::stdout().flush() {
                error!("couldn't write to stdout: {e}");
                break;
            }
            shown = status;
        }
    }
    info!("shutting down");
    clock.shutdown(Instant::now());
    thread::sleep(clock.config().audio.stop_fade());
}

fn handle(clock: &mut LiveClock, view: View, command: communication::Command) {
    use communication::Command as Input;

    let now = Instant::now();
    match (command, view) {
        (Input::Dismiss, _) => {
            clock.dismiss(now);
        }
        (Input::Snooze, _) => {
            if let Some(due) = clock.snooze(SystemClock.wall(), now) {
                println!("\nsnoozed until {}", due.format("%H:%M:%S"));
            }
        }
        (Input::Toggle, View::Timer) => {
            clock.toggle_timer(now);
        }
        (Input::Cancel, View::Timer) => {
            if clock.timer().state() == TimerState::Ringing {
                clock.stop_timer(now);
            } else {
                clock.cancel_timer(now);
            }
        }
        (Input::Adjust { unit, delta }, View::Timer) => {
            if clock.timer().state() == TimerState::Setup {
                clock.timer_setup_mut().adjust(unit, delta);
            }
        }
        (Input::Preset(minutes), View::Timer) => {
            clock.start_timer_preset(minutes, now);
        }
        (Input::Toggle, View::Stopwatch) => clock.toggle_stopwatch(now),
        (Input::Reset, View::Stopwatch) => clock.reset_stopwatch(),
        (Input::Lap, View::Stopwatch) => {
            if let Some(lap) = clock.lap() {
                println!("\nlap {}  {}", lap.number, lap.time);
            }
        }
        (Input::Cancel, View::Alarms) => {
            clock.dismiss(now);
        }
        _ => {}
    }
}

fn status(clock: &LiveClock, view: View) -> String {
    let now = SystemClock.wall();
    let clock_face = now.format(&clock.config().time_format).to_string();
    match view {
        View::Alarms => {
            let next = clock.next_alarm(now).map_or_else(
                || "no alarms set".to_string(),
                |(alarm, until)| format!("next alarm {} in {}", alarm.time, short(until)),
            );
            let ringing = clock
                .fade_progress()
                .map(|progress| format!("  RINGING {:>3.0}%", progress * 100.0))
                .unwrap_or_default();
            format!("{} | {next}{ringing}", clock_face.trim())
        }
        View::Timer => {
            let timer = clock.timer();
            format!("{:?} {}", timer.state(), timer.display())
        }
        View::Stopwatch => {
            let stopwatch = clock.stopwatch();
            format!(
                "{} {}",
                stopwatch.display(),
                if stopwatch.is_running() { "" } else { "(paused)" }
            )
        }
    }
}
