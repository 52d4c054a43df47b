#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

use std::{
    sync::mpsc::Receiver,
    time::{Duration, Instant},
};

use communication::{CountdownRequest, TrayCommand};
use countdown::{ActiveCountdown, Countdown, CountdownPhase};
use eframe::egui::{self, CentralPanel, ScrollArea, ViewportCommand};
use log_sink::LogSink;
use tray::TrayController;

pub mod alarm;
pub mod audio;
pub mod communication;
pub mod config;
pub mod coordinator;
pub mod countdown;
pub mod log_sink;
pub mod player;
pub mod tray;
pub mod trigger;
pub mod widgets;

pub const LOG_WINDOW_TITLE: &str = "Roosty Countdown log";

/// The gui side of the program: the log window, the tray and every countdown on screen.
///
/// Everything visible is owned and drawn here on the gui thread, other threads only
/// talk to it through the log sink and the countdown channel.
pub struct AlarmApp {
    log: LogSink,
    tray: Option<TrayController>,
    countdown_requests: Receiver<CountdownRequest>,
    countdowns: Vec<ActiveCountdown>,
    next_serial: u64,
    exiting: bool,
}

impl AlarmApp {
    #[must_use]
    pub fn new(
        log: LogSink,
        tray: Option<TrayController>,
        countdown_requests: Receiver<CountdownRequest>,
    ) -> Self {
        Self {
            log,
            tray,
            countdown_requests,
            countdowns: Vec::new(),
            next_serial: 0,
            exiting: false,
        }
    }

    fn handle_tray_events(&mut self, ctx: &egui::Context) {
        let commands = self
            .tray
            .as_ref()
            .map(TrayController::commands)
            .unwrap_or_default();
        for command in commands {
            match command {
                TrayCommand::Restore => Self::restore_from_tray(ctx),
                TrayCommand::Exit => self.exit(ctx),
            }
        }
    }

    fn minimize_to_tray(ctx: &egui::Context) {
        // hiding the window entirely would stop update() from running, and with it
        // the tray events and countdowns
        ctx.send_viewport_cmd(ViewportCommand::Minimized(true));
    }

    fn restore_from_tray(ctx: &egui::Context) {
        ctx.send_viewport_cmd(ViewportCommand::Minimized(false));
        ctx.send_viewport_cmd(ViewportCommand::Focus);
    }

    fn exit(&mut self, ctx: &egui::Context) {
        self.log.info("exiting...");
        if let Some(mut tray) = self.tray.take() {
            tray.teardown();
        }
        self.exiting = true;
        ctx.send_viewport_cmd(ViewportCommand::Close);
    }

    fn handle_close_request(&mut self, ctx: &egui::Context) {
        if !ctx.input(|i| i.viewport().close_requested()) {
            return;
        }
        // closing the log window only hides it while there is a tray to restore it from
        if !self.exiting && self.tray.is_some() {
            ctx.send_viewport_cmd(ViewportCommand::CancelClose);
            Self::minimize_to_tray(ctx);
        }
    }

    fn receive_countdowns(&mut self, now: Instant) {
        for request in self.countdown_requests.try_iter() {
            self.next_serial += 1;
            self.countdowns.push(ActiveCountdown::new(
                self.next_serial,
                request.label,
                Countdown::new(request.seconds, now),
            ));
        }
    }

    /// draws every running countdown and drops the finished ones
    /// returns how long until one of them changes
    fn show_countdowns(&mut self, ctx: &egui::Context, now: Instant) -> Option<Duration> {
        self.countdowns
            .retain(|countdown| countdown.show(ctx, now) != CountdownPhase::Closed);
        self.countdowns
            .iter()
            .filter_map(|countdown| countdown.countdown().next_change(now))
            .min()
    }

    fn render_log(&self, ctx: &egui::Context) {
        // a copy, so nothing egui logs while drawing waits on the sink
        let lines = self.log.with_lines(<[String]>::to_vec);
        CentralPanel::default().show(ctx, |ui| {
            ScrollArea::vertical()
                .auto_shrink([false; 2])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for line in &lines {
                        ui.label(line.as_str());
                    }
                });
        });
    }

    /// one frame of the gui as of `now`
    fn step(&mut self, ctx: &egui::Context, now: Instant) {
        self.handle_tray_events(ctx);
        self.handle_close_request(ctx);

        self.receive_countdowns(now);
        if let Some(next) = self.show_countdowns(ctx, now) {
            ctx.request_repaint_after(next);
        }

        self.render_log(ctx);
    }
}

impl eframe::App for AlarmApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.step(ctx, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Sender};

    use eframe::egui::{FullOutput, RawInput, ViewportEvent, ViewportId, ViewportInfo};
    use tray_icon::menu::{MenuEvent, MenuId};

    use super::*;

    struct Harness {
        _dir: tempfile::TempDir,
        ctx: egui::Context,
        app: AlarmApp,
        clicks: Sender<MenuEvent>,
        countdowns: Sender<CountdownRequest>,
    }

    impl Harness {
        fn new(with_tray: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let log = LogSink::create(dir.path().join("app_log.txt")).unwrap();
            let (clicks, tray_commands) = mpsc::channel();
            let (countdowns, countdown_requests) = mpsc::channel();
            let tray = with_tray.then(|| TrayController::detached(tray_commands, log.clone()));
            Self {
                _dir: dir,
                ctx: egui::Context::default(),
                app: AlarmApp::new(log, tray, countdown_requests),
                clicks,
                countdowns,
            }
        }

        fn frame(&mut self, input: RawInput, now: Instant) -> Vec<ViewportCommand> {
            let FullOutput {
                viewport_output, ..
            } = self.ctx.run(input, |ctx| self.app.step(ctx, now));
            viewport_output
                .get(&ViewportId::ROOT)
                .map(|output| output.commands.clone())
                .unwrap_or_default()
        }

        fn click(&self, id: &str) {
            self.clicks.send(MenuEvent { id: MenuId::new(id) }).unwrap();
        }
    }

    fn close_requested() -> RawInput {
        let mut input = RawInput::default();
        input.viewports.insert(
            ViewportId::ROOT,
            ViewportInfo {
                events: vec![ViewportEvent::Close],
                ..Default::default()
            },
        );
        input
    }

    fn cancels_close(commands: &[ViewportCommand]) -> bool {
        commands
            .iter()
            .any(|command| matches!(command, ViewportCommand::CancelClose))
    }

    #[test]
    fn closing_with_a_tray_minimizes_instead() {
        let mut harness = Harness::new(true);
        let commands = harness.frame(close_requested(), Instant::now());
        assert!(cancels_close(&commands));
        assert!(commands
            .iter()
            .any(|command| matches!(command, ViewportCommand::Minimized(true))));
        assert!(!harness.app.exiting);
    }

    #[test]
    fn closing_without_a_tray_exits() {
        let mut harness = Harness::new(false);
        let commands = harness.frame(close_requested(), Instant::now());
        assert!(!cancels_close(&commands));
    }

    #[test]
    fn exit_tears_down_the_tray_and_closes() {
        let mut harness = Harness::new(true);
        harness.click("exit");
        let commands = harness.frame(RawInput::default(), Instant::now());
        assert!(harness.app.tray.is_none());
        assert!(harness.app.exiting);
        assert!(commands
            .iter()
            .any(|command| matches!(command, ViewportCommand::Close)));
        assert!(harness
            .app
            .log
            .with_lines(|lines| lines.iter().any(|line| line.ends_with("exiting..."))));

        // the close that follows is not cancelled again
        let commands = harness.frame(close_requested(), Instant::now());
        assert!(!cancels_close(&commands));
    }

    #[test]
    fn restore_brings_the_window_back() {
        let mut harness = Harness::new(true);
        harness.click("restore");
        let commands = harness.frame(RawInput::default(), Instant::now());
        assert!(commands
            .iter()
            .any(|command| matches!(command, ViewportCommand::Minimized(false))));
        assert!(commands
            .iter()
            .any(|command| matches!(command, ViewportCommand::Focus)));
        assert!(harness.app.tray.is_some());
    }

    #[test]
    fn countdown_window_lives_for_its_seconds_plus_close_delay() {
        let mut harness = Harness::new(true);
        let start = Instant::now();
        harness
            .countdowns
            .send(CountdownRequest {
                seconds: 3,
                label: "08:00:00".to_string(),
            })
            .unwrap();

        harness.frame(RawInput::default(), start);
        assert_eq!(harness.app.countdowns.len(), 1);

        let last_value = start + countdown::TICK * 3 + Duration::from_millis(500);
        harness.frame(RawInput::default(), last_value);
        assert_eq!(harness.app.countdowns.len(), 1);

        let lingering = start + countdown::TICK * 4 + Duration::from_millis(50);
        harness.frame(RawInput::default(), lingering);
        assert_eq!(harness.app.countdowns.len(), 1);

        let closed = start + countdown::TICK * 4 + countdown::CLOSE_DELAY;
        harness.frame(RawInput::default(), closed);
        assert!(harness.app.countdowns.is_empty());
    }

    #[test]
    fn overlapping_countdowns_get_their_own_windows() {
        let mut harness = Harness::new(false);
        let start = Instant::now();
        for label in ["a", "b"] {
            harness
                .countdowns
                .send(CountdownRequest {
                    seconds: 1,
                    label: label.to_string(),
                })
                .unwrap();
        }
        harness.frame(RawInput::default(), start);
        assert_eq!(harness.app.countdowns.len(), 2);
        assert_eq!(harness.app.next_serial, 2);

        harness.frame(RawInput::default(), start + countdown::TICK * 3);
        assert!(harness.app.countdowns.is_empty());
    }
}
