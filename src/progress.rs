//! Terminal progress bar fed from the engine's event channel.

use std::time::Duration;

use image_downloader_core::download::{EngineEvent, EventReceiver};
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

/// Decides whether the progress bar should be drawn.
pub(crate) fn should_show_progress(
    stderr_is_terminal: bool,
    quiet: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

/// Drains `events` until every sender is dropped, updating a bar when `visible`.
///
/// Log events are not printed here; they already reach the tracing subscriber.
pub(crate) fn spawn_progress(
    visible: bool,
    total: usize,
    mut events: EventReceiver,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = if visible {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        } else {
            ProgressBar::hidden()
        };

        while let Some(event) = events.recv().await {
            if let EngineEvent::Progress(progress) = event {
                bar.set_position(progress.completed as u64);
                bar.set_message(progress.label);
            }
        }

        bar.finish_and_clear();
    })
}
