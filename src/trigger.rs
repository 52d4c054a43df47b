use std::{
    fmt, io,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use chrono::NaiveTime;

use crate::{
    alarm::{same_second, AlarmError, AlarmSpec},
    log_sink::LogSink,
};

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// source of the current wall clock time of day
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveTime {
        chrono::Local::now().time()
    }
}

/// what happens when an alarm goes off
pub trait AlarmHandler: Send + Sync + 'static {
    type Error: fmt::Display;

    /// # Errors
    /// if the alarm couldn't be handled, the trigger logs it and stops
    fn fire(&self, alarm: &AlarmSpec, countdown_seconds: u32) -> Result<(), Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error(transparent)]
    Alarm(#[from] AlarmError),
    #[error("couldn't start the trigger thread for {alarm}: {source}")]
    Spawn { alarm: AlarmSpec, source: io::Error },
}

/// waits for one alarm and fires it once
pub struct AlarmTrigger<C, H> {
    alarm: AlarmSpec,
    fire_at: NaiveTime,
    countdown_seconds: u32,
    clock: Arc<C>,
    handler: Arc<H>,
    log: LogSink,
    poll_interval: Duration,
}

impl<C: Clock, H: AlarmHandler> AlarmTrigger<C, H> {
    /// # Errors
    /// if the countdown would have to start on the previous day
    pub fn new(
        alarm: AlarmSpec,
        countdown_seconds: u32,
        clock: Arc<C>,
        handler: Arc<H>,
        log: LogSink,
    ) -> Result<Self, AlarmError> {
        Ok(Self {
            fire_at: alarm.adjusted_fire_time(countdown_seconds)?,
            alarm,
            countdown_seconds,
            clock,
            handler,
            log,
            poll_interval: POLL_INTERVAL,
        })
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub const fn fire_at(&self) -> NaiveTime {
        self.fire_at
    }

    /// Blocks until the clock shows the adjusted fire time, fires once and returns.
    ///
    /// Only an exact hour:minute:second match counts. Starting after the fire time has
    /// passed does not count as a miss, the loop keeps waiting until the clock shows
    /// that time again the next day.
    pub fn run(self) {
        loop {
            if same_second(self.clock.now(), self.fire_at) {
                self.fire();
                return;
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn fire(&self) {
        self.log.info(format!(
            "{} seconds before {}: playing audio and showing countdown",
            self.countdown_seconds, self.alarm
        ));
        let fired = panic::catch_unwind(AssertUnwindSafe(|| {
            self.handler.fire(&self.alarm, self.countdown_seconds)
        }));
        match fired {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self
                .log
                .error(format!("error triggering countdown for {}: {e}", self.alarm)),
            Err(_) => self
                .log
                .error(format!("triggering countdown for {} panicked", self.alarm)),
        }
    }

    /// # Errors
    /// if the os refuses to start another thread
    pub fn spawn(self) -> Result<JoinHandle<()>, TriggerError> {
        let alarm = self.alarm;
        thread::Builder::new()
            .name(format!("alarm {alarm}"))
            .spawn(move || self.run())
            .map_err(|source| TriggerError::Spawn { alarm, source })
    }
}

/// starts one detached trigger thread per alarm
///
/// # Errors
/// on the first alarm that can't be scheduled
pub fn spawn_all<C: Clock, H: AlarmHandler>(
    alarms: &[AlarmSpec],
    countdown_seconds: u32,
    clock: &Arc<C>,
    handler: &Arc<H>,
    log: &LogSink,
) -> Result<Vec<JoinHandle<()>>, TriggerError> {
    alarms
        .iter()
        .map(|&alarm| {
            let trigger = AlarmTrigger::new(
                alarm,
                countdown_seconds,
                Arc::clone(clock),
                Arc::clone(handler),
                log.clone(),
            )?;
            log.info(format!(
                "alarm {alarm} armed, countdown starts at {}",
                trigger.fire_at().format("%H:%M:%S")
            ));
            trigger.spawn()
        })
        .collect()
}
