//! Console command parsing.

use std::{path::PathBuf, str::FromStr};

use serde_json::Value;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Simulate a key press.
    Key(String),
    /// Set window opacity.
    Opacity(f64),
    /// Set click-through.
    ClickThrough(bool),
    /// Set topmost.
    Topmost(bool),
    /// Move and resize the window.
    Bounds(i32, i32, i32, i32),
    /// Load a subtitle track from a JSON file.
    SubtitleLoad(PathBuf),
    /// Advance playback to a time in seconds.
    SubtitleTime(f64),
    /// Drop the subtitle track.
    SubtitleClear,
    /// Emit a custom event.
    Emit(String, Value),
    /// List loaded plugins.
    List,
    /// List dispatcher actions.
    Actions,
    /// Load a plugin directory.
    Load(PathBuf),
    /// Unload a plugin.
    Unload(String),
    /// Reload a plugin.
    Reload(String),
    /// Show recent log lines.
    Logs(usize),
    /// Print command help.
    Help,
    /// Exit the shell.
    Quit,
}

/// Help text printed by `help`.
pub const HELP: &str = "\
key <combo>                  press a key combination (e.g. key Ctrl+Alt+K)
opacity <0..1>               set window opacity
clickthrough on|off          toggle mouse pass-through
topmost on|off               toggle always-on-top
bounds <x> <y> <w> <h>       move and resize the window
subtitle load <file.json>    load a subtitle track
subtitle time <secs>         advance playback time
subtitle clear               drop the subtitle track
emit <event> [json]          emit a custom event
list                         loaded plugins
actions                      registered dispatcher actions
load <dir>                   load a plugin directory
unload <id>                  unload a plugin
reload <id>                  reload a plugin
logs [n]                     recent log lines
help                         this text
quit                         exit";

/// Parse an on/off flag.
fn flag(arg: Option<&str>) -> Result<bool, String> {
    match arg.map(str::to_ascii_lowercase).as_deref() {
        Some("on" | "true" | "1") => Ok(true),
        Some("off" | "false" | "0") => Ok(false),
        _ => Err("expected on or off".to_string()),
    }
}

/// Parse a required argument.
fn arg<T: FromStr>(arg: Option<&str>, what: &str) -> Result<T, String> {
    arg.ok_or_else(|| format!("missing {}", what))?
        .parse()
        .map_err(|_| format!("invalid {}", what))
}

/// Parse one console line. Returns `Ok(None)` for blank lines.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    let Some((head, rest)) = line
        .split_once(char::is_whitespace)
        .map(|(h, r)| (h, r.trim()))
        .or_else(|| (!line.is_empty()).then_some((line, "")))
    else {
        return Ok(None);
    };
    let mut words = rest.split_whitespace();
    let cmd = match head.to_ascii_lowercase().as_str() {
        "key" if !rest.is_empty() => Command::Key(rest.to_string()),
        "key" => return Err("missing combo".into()),
        "opacity" => Command::Opacity(arg(words.next(), "opacity")?),
        "clickthrough" => Command::ClickThrough(flag(words.next())?),
        "topmost" => Command::Topmost(flag(words.next())?),
        "bounds" => Command::Bounds(
            arg(words.next(), "x")?,
            arg(words.next(), "y")?,
            arg(words.next(), "width")?,
            arg(words.next(), "height")?,
        ),
        "subtitle" => match words.next() {
            Some("load") => Command::SubtitleLoad(arg(words.next(), "path")?),
            Some("time") => Command::SubtitleTime(arg(words.next(), "time")?),
            Some("clear") => Command::SubtitleClear,
            _ => return Err("expected subtitle load|time|clear".into()),
        },
        "emit" => {
            let (event, payload) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if event.is_empty() {
                return Err("missing event".into());
            }
            let payload = match payload.trim() {
                "" => Value::Null,
                p => serde_json::from_str(p).map_err(|e| format!("invalid json: {}", e))?,
            };
            Command::Emit(event.to_string(), payload)
        }
        "list" => Command::List,
        "actions" => Command::Actions,
        "load" => Command::Load(arg(words.next(), "directory")?),
        "unload" => Command::Unload(arg(words.next(), "plugin id")?),
        "reload" => Command::Reload(arg(words.next(), "plugin id")?),
        "logs" => Command::Logs(words.next().map_or(Ok(20), |n| arg(Some(n), "count"))?),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };
    Ok(Some(cmd))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse("   "), Ok(None));
        assert_eq!(parse("key Ctrl + Alt + K"), Ok(Some(Command::Key("Ctrl + Alt + K".into()))));
        assert_eq!(parse("opacity 0.5"), Ok(Some(Command::Opacity(0.5))));
        assert_eq!(parse("TOPMOST off"), Ok(Some(Command::Topmost(false))));
        assert_eq!(parse("bounds 1 2 3 4"), Ok(Some(Command::Bounds(1, 2, 3, 4))));
        assert_eq!(parse("subtitle time 2.5"), Ok(Some(Command::SubtitleTime(2.5))));
        assert_eq!(
            parse(r#"emit greeter.hello "Ada""#),
            Ok(Some(Command::Emit("greeter.hello".into(), json!("Ada"))))
        );
        assert_eq!(parse("emit tick"), Ok(Some(Command::Emit("tick".into(), Value::Null))));
        assert_eq!(parse("logs"), Ok(Some(Command::Logs(20))));
        assert_eq!(parse("quit"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn reports_bad_input() {
        assert!(parse("key").is_err());
        assert!(parse("opacity high").is_err());
        assert!(parse("clickthrough maybe").is_err());
        assert!(parse("bounds 1 2 3").is_err());
        assert!(parse("subtitle rewind").is_err());
        assert!(parse("emit x {oops").is_err());
        assert!(parse("frobnicate").is_err());
    }
}
