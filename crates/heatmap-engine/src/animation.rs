//! Play/pause animation clock and its frame loop.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Frames per animation cycle.
pub const CYCLE_FRAMES: u32 = 360;

/// Frame interval of the animation loop (about 60Hz).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Frame counter that only advances while playing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnimationClock {
    frame: u32,
    playing: bool,
}

impl AnimationClock {
    pub fn new(playing: bool) -> Self {
        Self { frame: 0, playing }
    }

    /// Advance one frame if playing. Returns the current frame.
    pub fn tick(&mut self) -> u32 {
        if self.playing {
            self.frame = (self.frame + 1) % CYCLE_FRAMES;
        }
        self.frame
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Jump to `frame` (taken mod the cycle length).
    pub fn seek(&mut self, frame: u32) {
        self.frame = frame % CYCLE_FRAMES;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Pausing freezes the counter; playing resumes from the same frame.
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }
}

/// Background task publishing animation frames on a watch channel.
///
/// Dropping the loop or calling [`AnimationLoop::stop`] cancels the task,
/// so no frame is published afterwards.
#[derive(Debug)]
pub struct AnimationLoop {
    frames: watch::Receiver<u32>,
    task: Option<JoinHandle<()>>,
}

impl AnimationLoop {
    /// Start publishing frames every `interval`, beginning after `start`.
    pub fn start(start: u32, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(start % CYCLE_FRAMES);
        let task = tokio::spawn(async move {
            let mut clock = AnimationClock {
                frame: start % CYCLE_FRAMES,
                playing: true,
            };
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(clock.tick()).is_err() {
                    break;
                }
            }
        });
        Self {
            frames: rx,
            task: Some(task),
        }
    }

    /// Receiver for frame updates.
    pub fn frames(&self) -> watch::Receiver<u32> {
        self.frames.clone()
    }

    /// Latest published frame.
    pub fn current(&self) -> u32 {
        *self.frames.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the loop. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(frame = self.current(), "Animation loop stopped");
        }
    }
}

impl Drop for AnimationLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
