use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use polycouple::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// Renders workflow progress on stderr.
///
/// Trajectories are streamed, so frames are counted on a spinner instead of
/// filling a bar of known length.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr())
            .with_style(spinner_style());
        pb.finish_and_clear();
        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let shared = Arc::clone(&self.pb);
        Box::new(move |event: Progress| match shared.lock() {
            Ok(pb) => render(&pb, event),
            Err(_) => warn!("Progress bar mutex was poisoned; dropping a progress event."),
        })
    }
}

fn render(pb: &ProgressBar, event: Progress) {
    match event {
        Progress::PhaseStart { name } => {
            pb.reset();
            pb.set_style(spinner_style());
            pb.set_prefix(name);
            pb.set_message(name);
            pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
        }
        Progress::FrameFinished { index, time, items } => {
            if pb.position() == 0 {
                pb.set_style(frame_style());
            }
            pb.inc(1);
            pb.set_message(format!(
                "frame {} (t = {:.1} ps): {} item(s)",
                index, time, items
            ));
        }
        Progress::PhaseFinish => {
            pb.disable_steady_tick();
            pb.finish_with_message("✓ Done");
        }
        Progress::Message(text) if pb.is_finished() => pb.set_message(text),
        Progress::Message(text) => pb.println(format!("  {}", text)),
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn frame_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:<14} {pos:>6} frames  {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
