//! The interactive shell: host wiring plus the console loop.

use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use logging::buffer::LogBuffer;
use plugin_runtime::{
    Error, PluginManager, RuntimeSettings,
    api::{Listeners, WindowApi},
    host::{Bounds, HostSlots, UiThread},
    shortcuts::HostShortcuts,
    store::JsonFileStore,
    subtitle::SubtitleData,
};
use tracing::{debug, warn};

use crate::{
    command::{self, Command, HELP},
    console::{ConsoleSurface, ConsoleWindow},
};

/// Initial window rectangle.
const DEFAULT_BOUNDS: Bounds = Bounds {
    x: 100,
    y: 100,
    width: 640,
    height: 360,
};

/// Opacity change applied by the host opacity shortcuts.
const OPACITY_STEP: f64 = 0.1;

/// Whether the loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command.
    Continue,
    /// Stop.
    Quit,
}

/// A running shell. Field order is drop order: plugins unload first.
pub struct Shell {
    /// Loaded plugins and the shared runtime services.
    manager: PluginManager,
    /// Host shortcuts from settings.
    shortcuts: HostShortcuts,
    /// Host-side window writer.
    window: Arc<WindowApi>,
    /// Recent log lines.
    logs: LogBuffer,
}

impl Shell {
    /// Wire a console window and surface to `ui` and bind settings shortcuts.
    pub fn new(
        settings: &RuntimeSettings,
        data_dir: &Path,
        ui: Arc<dyn UiThread>,
        logs: LogBuffer,
    ) -> Self {
        let slots = Arc::new(HostSlots::new(ui));
        slots.set_window(Some(Arc::new(ConsoleWindow::new(DEFAULT_BOUNDS))));
        slots.set_content(Some(Arc::new(ConsoleSurface::default())));
        let manager = PluginManager::new(
            slots.clone(),
            Arc::new(JsonFileStore::new(data_dir)),
            settings.sandbox,
        );
        let listeners = Arc::new(Listeners::new("host", manager.events().clone()));
        let window = Arc::new(WindowApi::new("host", slots, listeners));
        let mut shortcuts =
            HostShortcuts::new(manager.dispatcher().clone(), manager.keys().clone());
        define_actions(&mut shortcuts, &window);
        let bound = shortcuts.apply(&settings.shortcuts);
        debug!(bound, configured = settings.shortcuts.len(), "host_shortcuts_applied");
        Self {
            manager,
            shortcuts,
            window,
            logs,
        }
    }

    /// The plugin manager.
    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    /// Load every plugin under `root`.
    pub fn load_all(&mut self, root: &Path) -> Vec<(PathBuf, Error)> {
        self.manager.load_all(root)
    }

    /// Read commands from `input` until `quit` or end of input.
    pub fn repl(&mut self, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
        write!(out, "> ")?;
        out.flush()?;
        for line in input.lines() {
            let flow = match command::parse(&line?) {
                Ok(Some(cmd)) => self.exec(cmd, out)?,
                Ok(None) => Flow::Continue,
                Err(e) => {
                    writeln!(out, "error: {}", e)?;
                    Flow::Continue
                }
            };
            if flow == Flow::Quit {
                break;
            }
            write!(out, "> ")?;
            out.flush()?;
        }
        Ok(())
    }

    /// Run one command, writing its result to `out`.
    pub fn exec(&mut self, cmd: Command, out: &mut impl Write) -> io::Result<Flow> {
        match cmd {
            Command::Key(combo) => {
                let n = self.manager.keys().press(&combo);
                writeln!(out, "{} handler(s)", n)?;
            }
            Command::Opacity(v) => report(out, self.window.set_opacity(v))?,
            Command::ClickThrough(on) => report(out, self.window.set_click_through(on))?,
            Command::Topmost(on) => report(out, self.window.set_topmost(on))?,
            Command::Bounds(x, y, width, height) => report(
                out,
                self.window.set_bounds(Bounds {
                    x,
                    y,
                    width,
                    height,
                }),
            )?,
            Command::SubtitleLoad(path) => match SubtitleData::from_file(&path) {
                Ok(data) => {
                    let n = data.entries.len();
                    self.manager.subtitles().load(data);
                    writeln!(out, "{} entries", n)?;
                }
                Err(e) => writeln!(out, "error: {}", e.pretty())?,
            },
            Command::SubtitleTime(t) => {
                let changed = self.manager.subtitles().update_time(t);
                let current = self.manager.subtitles().current();
                let text = current.as_ref().map_or("", |e| e.content.as_str());
                writeln!(out, "{}{:?}", if changed { "* " } else { "" }, text)?;
            }
            Command::SubtitleClear => report(out, self.manager.subtitles().clear())?,
            Command::Emit(event, payload) => {
                let n = self.manager.events().emit(&event, &payload);
                writeln!(out, "{} listener(s)", n)?;
            }
            Command::List => {
                for id in self.manager.plugin_ids() {
                    if let Some(p) = self.manager.get(&id) {
                        let m = p.manifest();
                        writeln!(out, "{} {} ({})", m.id, m.version, m.name)?;
                    }
                }
            }
            Command::Actions => {
                for name in self.manager.dispatcher().names() {
                    writeln!(out, "{}", name)?;
                }
            }
            Command::Load(dir) => {
                let result = self.manager.load_dir(&dir).map(|id| format!("loaded {}", id));
                outcome(out, result)?;
            }
            Command::Unload(id) => {
                let result = self.manager.unload(&id).map(|()| format!("unloaded {}", id));
                outcome(out, result)?;
            }
            Command::Reload(id) => {
                let result = self.manager.reload(&id).map(|()| format!("reloaded {}", id));
                outcome(out, result)?;
            }
            Command::Logs(n) => {
                for e in self.logs.tail("", n) {
                    writeln!(out, "{:5} {} {}", e.level, e.target, e.message)?;
                }
            }
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Host shortcuts bound from settings.
    pub fn shortcuts(&self) -> &HostShortcuts {
        &self.shortcuts
    }
}

/// Declare the host actions settings may bind.
fn define_actions(shortcuts: &mut HostShortcuts, window: &Arc<WindowApi>) {
    let w = window.clone();
    shortcuts.define("toggle_click_through", move || {
        w.set_click_through(!w.click_through());
    });
    let w = window.clone();
    shortcuts.define("toggle_topmost", move || {
        w.set_topmost(!w.topmost());
    });
    let w = window.clone();
    shortcuts.define("opacity_up", move || {
        w.set_opacity(w.opacity() + OPACITY_STEP);
    });
    let w = window.clone();
    shortcuts.define("opacity_down", move || {
        w.set_opacity(w.opacity() - OPACITY_STEP);
    });
}

/// Write `ok` or `rejected`.
fn report(out: &mut impl Write, ok: bool) -> io::Result<()> {
    writeln!(out, "{}", if ok { "ok" } else { "rejected" })
}

/// Write a success message or a pretty error.
fn outcome(out: &mut impl Write, result: plugin_runtime::Result<String>) -> io::Result<()> {
    match result {
        Ok(msg) => writeln!(out, "{}", msg),
        Err(e) => {
            warn!(error = %e, "command_failed");
            writeln!(out, "error: {}", e.pretty())
        }
    }
}
