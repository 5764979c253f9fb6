//! Interactive command parsing.

use anyhow::{Result, anyhow, bail};

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Play,
    Pause,
    Toggle,
    Next,
    Prev,
    /// Absolute position in seconds.
    Seek(u64),
    /// Volume percent, 0-100.
    Volume(u8),
    Mute,
    Shuffle,
    Repeat,
    Connect,
    Disconnect,
    Status,
    /// Replace the queue with a playlist.
    Load(i64),
    /// Replace the queue with library search results.
    Search(String),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play | pause | toggle        resume, pause, or flip playback
  next | prev                  skip forward or back
  seek <sec>                   jump to a position (e.g. seek 90, seek 1:30)
  vol <0-100>                  set volume
  mute                         mute or restore volume
  shuffle | repeat             toggle queue modes
  connect | disconnect         hand output to or take it back from the remote agent
  load <playlist-id>           play a playlist
  search <term>                play library search results
  status                       show the current track
  quit                         stop and exit";

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<ReplCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "play" | "resume" => ReplCommand::Play,
        "pause" => ReplCommand::Pause,
        "toggle" | "p" => ReplCommand::Toggle,
        "next" | "n" => ReplCommand::Next,
        "prev" | "previous" | "b" => ReplCommand::Prev,
        "seek" => ReplCommand::Seek(parse_position(rest)?),
        "vol" | "volume" => {
            let pct: u8 = rest
                .parse()
                .map_err(|_| anyhow!("volume must be a number between 0 and 100"))?;
            if pct > 100 {
                bail!("volume must be a number between 0 and 100");
            }
            ReplCommand::Volume(pct)
        }
        "mute" => ReplCommand::Mute,
        "shuffle" => ReplCommand::Shuffle,
        "repeat" => ReplCommand::Repeat,
        "connect" => ReplCommand::Connect,
        "disconnect" => ReplCommand::Disconnect,
        "status" | "s" => ReplCommand::Status,
        "load" => ReplCommand::Load(
            rest.parse()
                .map_err(|_| anyhow!("usage: load <playlist-id>"))?,
        ),
        "search" => {
            if rest.is_empty() {
                bail!("usage: search <term>");
            }
            ReplCommand::Search(rest.to_string())
        }
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => bail!("unknown command: {other} (try `help`)"),
    };
    Ok(Some(cmd))
}

/// Accepts plain seconds or `m:ss`.
fn parse_position(raw: &str) -> Result<u64> {
    let usage = || anyhow!("usage: seek <seconds|m:ss>");
    match raw.split_once(':') {
        Some((min, sec)) => {
            let min: u64 = min.parse().map_err(|_| usage())?;
            let sec: u64 = sec.parse().map_err(|_| usage())?;
            if sec >= 60 {
                return Err(usage());
            }
            Ok(min * 60 + sec)
        }
        None => raw.parse().map_err(|_| usage()),
    }
}
