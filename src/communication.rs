use std::str::FromStr;

use crate::elapsed::TimeUnit;

/// what the input thread sends to whoever owns the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Dismiss,
    Snooze,
    /// start or pause, whichever applies
    Toggle,
    Lap,
    Reset,
    Cancel,
    /// nudge the timer setup before starting
    Adjust { unit: TimeUnit, delta: i16 },
    Preset(u64),
    Quit,
}

impl Command {
    pub const HELP: &'static str = "d: dismiss  s: snooze  space/p: start or pause  l: lap  \
                                    r: reset  c: cancel  +h/-h +m/-m +s/-s: adjust  1..60: preset  q: quit";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let command = match line.to_ascii_lowercase().as_str() {
            "d" | "dismiss" => Self::Dismiss,
            "s" | "snooze" => Self::Snooze,
            // a bare enter reads as an empty line
            "" | "p" | "pause" | "start" => Self::Toggle,
            "l" | "lap" => Self::Lap,
            "r" | "reset" => Self::Reset,
            "c" | "cancel" | "stop" => Self::Cancel,
            "q" | "quit" | "exit" => Self::Quit,
            other => {
                return parse_adjust(other)
                    .or_else(|| other.parse().ok().map(Self::Preset))
                    .ok_or_else(|| UnknownCommand(line.to_string()))
            }
        };
        Ok(command)
    }
}

fn parse_adjust(input: &str) -> Option<Command> {
    let mut chars = input.chars();
    let sign: i16 = match chars.next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let unit = match chars.next()? {
        'h' => TimeUnit::Hours,
        'm' => TimeUnit::Minutes,
        's' => TimeUnit::Seconds,
        _ => return None,
    };
    let amount = match chars.as_str() {
        "" => 1,
        rest => rest.parse::<i16>().ok()?,
    };
    Some(Command::Adjust {
        unit,
        delta: amount.saturating_mul(sign),
    })
}
