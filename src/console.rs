//! Line-oriented console for driving a session from a terminal
//!
//! Stands in for the presentation layer and the platform's remote transport controls.
//! Snapshots are printed separately as JSON lines; this module only reads commands.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::catalog::{DurationCatalog, PhaseDuration};
use crate::controller::Selection;
use crate::error::SessionError;
use crate::media::{MediaError, Track};
use crate::signals::HostSignal;
use crate::SessionHandle;

const HELP: &str = "\
commands:
  toggle <sound> <capture>   start, pause or resume (catalog indices)
  toggle! <sound> <capture>  same, reloading both countdowns
  interrupt                  simulate an audio interruption
  resume | end               interruption ended, with or without resume
  pause | play               remote transport intents
  deny emission|capture      report a lost capability
  status | options | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Toggle(Selection),
    Signal(HostSignal),
    Deny(Track),
    Status,
    Options,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb {
        "toggle" | "t" => ConsoleCommand::Toggle(parse_selection(&args)?),
        "toggle!" | "t!" => ConsoleCommand::Toggle(parse_selection(&args)?.changed()),
        "interrupt" => ConsoleCommand::Signal(HostSignal::InterruptionBegan),
        "resume" => ConsoleCommand::Signal(HostSignal::InterruptionEnded {
            should_resume: true,
        }),
        "end" => ConsoleCommand::Signal(HostSignal::InterruptionEnded {
            should_resume: false,
        }),
        "pause" => ConsoleCommand::Signal(HostSignal::RemotePause),
        "play" => ConsoleCommand::Signal(HostSignal::RemotePlay),
        "deny" => match args.first().copied() {
            Some("emission") => ConsoleCommand::Deny(Track::Emission),
            Some("capture") => ConsoleCommand::Deny(Track::Capture),
            _ => return Err("usage: deny emission|capture".to_string()),
        },
        "status" => ConsoleCommand::Status,
        "options" => ConsoleCommand::Options,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command: {} (try \"help\")", other)),
    };
    Ok(Some(command))
}

fn parse_selection(args: &[&str]) -> Result<Selection, String> {
    let [sound, capture] = args else {
        return Err("usage: toggle <sound index> <capture index>".to_string());
    };
    let sound = sound
        .parse::<usize>()
        .map_err(|e| format!("bad sound index {:?}: {}", sound, e))?;
    let capture = capture
        .parse::<usize>()
        .map_err(|e| format!("bad capture index {:?}: {}", capture, e))?;
    Ok(Selection::new(sound, capture))
}

fn format_options(title: &str, options: &[PhaseDuration]) -> String {
    let entries: Vec<String> = options
        .iter()
        .enumerate()
        .map(|(i, d)| format!("{}={}", i, d.label()))
        .collect();
    format!("{}: {}", title, entries.join(", "))
}

/// Read commands from stdin until EOF or `quit`.
pub async fn run_console(
    handle: SessionHandle,
    signals: mpsc::Sender<HostSignal>,
    catalog: &DurationCatalog,
) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);

    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match command {
            ConsoleCommand::Toggle(selection) => match handle.toggle_with(selection).await {
                Ok(state) => log::info!("Toggle -> {}", state),
                Err(SessionError::LoopClosed) => break,
                Err(e) => println!("toggle failed: {}", e),
            },
            ConsoleCommand::Signal(signal) => {
                if signals.send(signal).await.is_err() {
                    log::warn!("Signal pump is gone, dropping {:?}", signal);
                }
            }
            ConsoleCommand::Deny(track) => {
                if let Err(e) = handle
                    .capability_failed(track, MediaError::PermissionDenied)
                    .await
                {
                    log::warn!("Failed to report lost {}: {}", track, e);
                    break;
                }
            }
            ConsoleCommand::Status => match serde_json::to_string_pretty(&handle.snapshot()) {
                Ok(json) => println!("{}", json),
                Err(e) => log::warn!("Failed to serialize snapshot: {}", e),
            },
            ConsoleCommand::Options => {
                println!("{}", format_options("sound", catalog.sound_options()));
                println!("{}", format_options("capture", catalog.capture_options()));
            }
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => break,
        }
    }

    Ok(())
}
