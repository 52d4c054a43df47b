use std::time::{Duration, Instant};

use eframe::egui::{self, CentralPanel, Color32, Context, ViewportBuilder, ViewportId};

use crate::widgets::CountdownNumeral;

pub const TICK: Duration = Duration::from_secs(1);
/// how long `0` stays up after its own second before the window goes away
pub const CLOSE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    Showing(u32),
    Closed,
}

/// phase of a countdown from `seconds` after `elapsed`
///
/// every value from `seconds` down to 0 is shown for one tick,
/// then 0 lingers for [`CLOSE_DELAY`] before the countdown closes
#[must_use]
pub fn phase_after(seconds: u32, elapsed: Duration) -> CountdownPhase {
    let ticks = elapsed.as_millis() / TICK.as_millis();
    if ticks <= u128::from(seconds) {
        // ticks <= seconds so this fits
        #[allow(clippy::cast_possible_truncation)]
        let ticks = ticks as u32;
        return CountdownPhase::Showing(seconds - ticks);
    }
    if elapsed < shown_for(seconds) + CLOSE_DELAY {
        CountdownPhase::Showing(0)
    } else {
        CountdownPhase::Closed
    }
}

/// time until the displayed value changes next, `None` once closed
#[must_use]
pub fn next_change_after(seconds: u32, elapsed: Duration) -> Option<Duration> {
    let shown = shown_for(seconds);
    if elapsed < shown {
        let into_tick = Duration::from_nanos(
            u64::try_from(elapsed.as_nanos() % TICK.as_nanos()).unwrap_or_default(),
        );
        Some(TICK - into_tick)
    } else {
        (shown + CLOSE_DELAY).checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}

fn shown_for(seconds: u32) -> Duration {
    TICK * (seconds + 1)
}

#[derive(Debug, Clone)]
pub struct Countdown {
    seconds: u32,
    started: Instant,
}

impl Countdown {
    #[must_use]
    pub const fn new(seconds: u32, started: Instant) -> Self {
        Self { seconds, started }
    }

    #[must_use]
    pub fn phase_at(&self, now: Instant) -> CountdownPhase {
        phase_after(self.seconds, now.saturating_duration_since(self.started))
    }

    #[must_use]
    pub fn next_change(&self, now: Instant) -> Option<Duration> {
        next_change_after(self.seconds, now.saturating_duration_since(self.started))
    }
}

/// a countdown that is currently on screen in its own viewport
#[derive(Debug, Clone)]
pub struct ActiveCountdown {
    id: ViewportId,
    label: String,
    countdown: Countdown,
}

impl ActiveCountdown {
    #[must_use]
    pub fn new(serial: u64, label: String, countdown: Countdown) -> Self {
        Self {
            id: ViewportId::from_hash_of(("countdown", serial)),
            label,
            countdown,
        }
    }

    #[must_use]
    pub const fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    /// draws the fullscreen black window for the current value
    /// nothing is drawn once the countdown has closed, which closes the viewport
    pub fn show(&self, ctx: &Context, now: Instant) -> CountdownPhase {
        let phase = self.countdown.phase_at(now);
        if let CountdownPhase::Showing(value) = phase {
            ctx.show_viewport_immediate(
                self.id,
                ViewportBuilder::default()
                    .with_title(format!("countdown {}", self.label))
                    .with_fullscreen(true)
                    .with_always_on_top()
                    .with_decorations(false),
                |ctx, _class| {
                    CentralPanel::default()
                        .frame(egui::Frame::default().fill(Color32::BLACK))
                        .show(ctx, |ui| {
                            ui.add(CountdownNumeral::new(value));
                        });
                },
            );
        }
        phase
    }
}
