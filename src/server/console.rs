//! Line-oriented console transport: commands in on stdin, JSON events out
//! on stdout. Logging stays on stderr.

use crate::protocol::{encode_event, parse_command, CommandChannel, ProcessCommand};
use crate::system::events::{EventBus, EventSubscriber, ProcessEvent};
use log::{debug, error, info, warn};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SHUTDOWN_RETRY: Duration = Duration::from_millis(10);

/// Parses each line and forwards it to the controller. Bad lines are
/// answered with an error event and never reach the sequencer. Returns the
/// number of commands forwarded.
pub fn forward_commands<R: BufRead>(reader: R, commands: &CommandChannel, events: &EventBus) -> usize {
    let mut forwarded = 0;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read console input: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(command) => {
                if commands.try_send(command).is_err() {
                    warn!("Command queue full, dropping {:?}", command);
                    events.publish(ProcessEvent::Error {
                        message: format!("busy, {:?} dropped", command),
                    });
                    continue;
                }
                debug!("Forwarded {:?}", command);
                forwarded += 1;
                if command == ProcessCommand::Shutdown {
                    return forwarded;
                }
            }
            Err(e) => {
                warn!("Rejected console input {:?}: {}", line, e);
                events.publish(ProcessEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    info!("Console input closed, requesting shutdown");
    while commands.try_send(ProcessCommand::Shutdown).is_err() {
        thread::sleep(SHUTDOWN_RETRY);
    }
    forwarded + 1
}

/// Reads stdin on its own OS thread; the executor thread only ever sees the
/// channel.
pub fn spawn_stdin_reader(
    commands: Arc<CommandChannel>,
    events: &'static EventBus,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            let count = forward_commands(stdin.lock(), &commands, events);
            debug!("Console reader finished after {} commands", count);
        })
}

pub fn write_event<W: Write>(writer: &mut W, event: &ProcessEvent) -> std::io::Result<()> {
    let line = encode_event(event).map_err(std::io::Error::other)?;
    writeln!(writer, "{}", line)?;
    writer.flush()
}

#[embassy_executor::task]
pub async fn console_output_task(subscriber: EventSubscriber<'static>) {
    let mut subscriber = subscriber;
    info!("Console output ready");

    loop {
        let event = subscriber.next_event().await;
        let stdout = std::io::stdout();
        if let Err(e) = write_event(&mut stdout.lock(), &event) {
            error!("Failed to write event to stdout: {}", e);
        }
        if event == ProcessEvent::ShuttingDown {
            break;
        }
    }
}
