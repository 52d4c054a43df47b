use std::{
    io,
    sync::mpsc::{self, Receiver},
    thread::{self, JoinHandle},
};

use eframe::egui::Context;
use tray_icon::{
    menu::{Menu, MenuEvent, MenuId, MenuItem},
    Icon, TrayIcon, TrayIconBuilder,
};

use crate::{communication::TrayCommand, log_sink::LogSink};

pub const TOOLTIP: &str = "Roosty Countdown";
const RESTORE_ID: &str = "restore";
const EXIT_ID: &str = "exit";
const ICON_SIZE: u32 = 32;

#[derive(Debug, thiserror::Error)]
pub enum TrayError {
    #[error("couldn't build tray menu: {0}")]
    Menu(#[from] tray_icon::menu::Error),
    #[error("couldn't create tray icon image: {0}")]
    Icon(#[from] tray_icon::BadIcon),
    #[error("couldn't create tray icon: {0}")]
    Build(#[from] tray_icon::Error),
    #[error("couldn't initialize gtk: {0}")]
    Gtk(String),
    #[error("couldn't start the tray thread: {0}")]
    Thread(#[source] io::Error),
    #[error("tray thread stopped before the icon was created")]
    Stopped,
}

impl TrayCommand {
    #[must_use]
    pub fn from_menu_id(id: &MenuId) -> Option<Self> {
        match id.0.as_str() {
            RESTORE_ID => Some(Self::Restore),
            EXIT_ID => Some(Self::Exit),
            _ => None,
        }
    }
}

/// The tray icon with its Restore and Exit menu.
///
/// Menu clicks arrive on whatever thread the platform uses, they are queued and the gui is
/// woken up so [`TrayController::commands`] sees them on the next frame.
///
/// On linux the icon needs gtk, so it is created on a thread of its own that runs the gtk
/// main loop until [`TrayController::teardown`]. Elsewhere it lives on the gui thread.
pub struct TrayController {
    #[cfg(not(target_os = "linux"))]
    icon: Option<TrayIcon>,
    #[cfg(target_os = "linux")]
    gtk_thread: Option<JoinHandle<()>>,
    commands: Receiver<MenuEvent>,
    log: LogSink,
}

impl TrayController {
    /// # Errors
    /// if the platform has no tray or the icon can't be created
    pub fn init(ctx: &Context, log: LogSink) -> Result<Self, TrayError> {
        let (sender, commands) = mpsc::channel();
        let ctx = ctx.clone();
        MenuEvent::set_event_handler(Some(move |event| {
            if sender.send(event).is_ok() {
                ctx.request_repaint();
            }
        }));

        let controller = Self::start(commands, log);
        if controller.is_err() {
            MenuEvent::set_event_handler(None::<fn(MenuEvent)>);
        }
        controller
    }

    #[cfg(not(target_os = "linux"))]
    fn start(commands: Receiver<MenuEvent>, log: LogSink) -> Result<Self, TrayError> {
        Ok(Self {
            icon: Some(build_icon()?),
            commands,
            log,
        })
    }

    #[cfg(target_os = "linux")]
    fn start(commands: Receiver<MenuEvent>, log: LogSink) -> Result<Self, TrayError> {
        let gtk_thread = spawn_owner(
            "tray",
            || {
                gtk::init().map_err(|e| TrayError::Gtk(e.to_string()))?;
                build_icon()
            },
            |icon| {
                gtk::main();
                // the icon has to go away on the thread that made it
                drop(icon);
            },
        )?;
        Ok(Self {
            gtk_thread: Some(gtk_thread),
            commands,
            log,
        })
    }

    /// a controller without an icon, fed by `commands`
    #[cfg(test)]
    pub(crate) const fn detached(commands: Receiver<MenuEvent>, log: LogSink) -> Self {
        Self {
            #[cfg(not(target_os = "linux"))]
            icon: None,
            #[cfg(target_os = "linux")]
            gtk_thread: None,
            commands,
            log,
        }
    }

    /// every menu command clicked since the last call
    pub fn commands(&self) -> Vec<TrayCommand> {
        self.commands
            .try_iter()
            .filter_map(|event| TrayCommand::from_menu_id(&event.id))
            .collect()
    }

    /// removes the icon, safe to call more than once
    pub fn teardown(&mut self) {
        MenuEvent::set_event_handler(None::<fn(MenuEvent)>);
        #[cfg(not(target_os = "linux"))]
        {
            if let Some(icon) = self.icon.take() {
                if let Err(e) = icon.set_visible(false) {
                    self.log.error(format!("error stopping tray icon: {e}"));
                }
            }
        }
        #[cfg(target_os = "linux")]
        {
            if let Some(gtk_thread) = self.gtk_thread.take() {
                gtk::glib::idle_add_once(gtk::main_quit);
                if gtk_thread.join().is_err() {
                    self.log.error("tray thread panicked");
                }
            }
        }
    }
}

impl Drop for TrayController {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn build_icon() -> Result<TrayIcon, TrayError> {
    let menu = Menu::new();
    menu.append_items(&[
        &MenuItem::with_id(RESTORE_ID, "Restore", true, None),
        &MenuItem::with_id(EXIT_ID, "Exit", true, None),
    ])?;
    Ok(TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_tooltip(TOOLTIP)
        .with_icon(Icon::from_rgba(icon_rgba(ICON_SIZE), ICON_SIZE, ICON_SIZE)?)
        .build()?)
}

/// Starts a thread named `name` that creates something with `setup` and then hands it
/// to `run`, which keeps the thread busy for as long as it needs.
///
/// Returns once `setup` is done, with its error if it failed. The value never leaves the
/// thread, so it doesn't have to be `Send`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn spawn_owner<T, S, R>(name: &str, setup: S, run: R) -> Result<JoinHandle<()>, TrayError>
where
    S: FnOnce() -> Result<T, TrayError> + Send + 'static,
    R: FnOnce(T) + Send + 'static,
{
    let (ready, started) = mpsc::sync_channel(1);
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || match setup() {
            Ok(owned) => {
                if ready.send(Ok(())).is_ok() {
                    run(owned);
                }
            }
            Err(e) => {
                let _ = ready.send(Err(e));
            }
        })
        .map_err(TrayError::Thread)?;

    match started.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        // setup panicked
        Err(_) => {
            let _ = handle.join();
            Err(TrayError::Stopped)
        }
    }
}

/// an orange disc on a transparent background
#[must_use]
pub fn icon_rgba(size: u32) -> Vec<u8> {
    #[allow(clippy::cast_precision_loss)]
    let (center, radius) = (size as f32 / 2.0, size as f32 / 2.0 - 1.0);
    (0..size)
        .flat_map(|y| (0..size).map(move |x| (x, y)))
        .flat_map(|(x, y)| {
            #[allow(clippy::cast_precision_loss)]
            let (dx, dy) = (x as f32 + 0.5 - center, y as f32 + 0.5 - center);
            if dx.hypot(dy) <= radius {
                [0xf2, 0x8c, 0x28, 0xff]
            } else {
                [0, 0, 0, 0]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_ids_map_to_commands() {
        assert_eq!(
            TrayCommand::from_menu_id(&MenuId::new(RESTORE_ID)),
            Some(TrayCommand::Restore)
        );
        assert_eq!(
            TrayCommand::from_menu_id(&MenuId::new(EXIT_ID)),
            Some(TrayCommand::Exit)
        );
        assert_eq!(TrayCommand::from_menu_id(&MenuId::new("other")), None);
    }

    #[test]
    fn owner_thread_reports_setup_errors() {
        let result = spawn_owner(
            "tray-test",
            || Err::<(), _>(TrayError::Gtk("no display".to_string())),
            |()| panic!("ran without setup"),
        );
        assert!(matches!(result, Err(TrayError::Gtk(message)) if message == "no display"));
    }

    #[test]
    fn owner_thread_turns_a_setup_panic_into_an_error() {
        let result = spawn_owner::<(), _, _>("tray-test", || panic!("gtk blew up"), |()| {});
        assert!(matches!(result, Err(TrayError::Stopped)));
    }

    #[test]
    fn owner_thread_keeps_what_setup_made() {
        let (quit, wait) = mpsc::channel::<()>();
        let (done, finished) = mpsc::channel();
        let handle = spawn_owner(
            "tray-test",
            || Ok(std::rc::Rc::new(7)),
            move |owned| {
                wait.recv().unwrap();
                done.send(*owned).unwrap();
            },
        )
        .unwrap();
        assert_eq!(handle.thread().name(), Some("tray-test"));

        quit.send(()).unwrap();
        handle.join().unwrap();
        assert_eq!(finished.recv().unwrap(), 7);
    }

    #[test]
    fn detached_controller_reads_queued_clicks() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogSink::create(dir.path().join("app_log.txt")).unwrap();
        let (sender, commands) = mpsc::channel();
        let mut tray = TrayController::detached(commands, log);

        for id in [RESTORE_ID, "separator", EXIT_ID] {
            sender.send(MenuEvent { id: MenuId::new(id) }).unwrap();
        }
        assert_eq!(tray.commands(), vec![TrayCommand::Restore, TrayCommand::Exit]);
        assert!(tray.commands().is_empty());

        tray.teardown();
        tray.teardown();
    }

    #[test]
    fn icon_is_a_disc() {
        let rgba = icon_rgba(ICON_SIZE);
        assert_eq!(rgba.len(), (ICON_SIZE * ICON_SIZE * 4) as usize);
        let pixel = |x: u32, y: u32| {
            let at = ((y * ICON_SIZE + x) * 4) as usize;
            &rgba[at..at + 4]
        };
        assert_eq!(pixel(0, 0)[3], 0);
        assert_eq!(pixel(ICON_SIZE - 1, ICON_SIZE - 1)[3], 0);
        assert_eq!(pixel(ICON_SIZE / 2, ICON_SIZE / 2)[3], 0xff);
    }
}
