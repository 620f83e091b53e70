//! Plugin discovery and the set of loaded plugins.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, info, warn};

use crate::{
    ActionDispatcher, Error, Result,
    api::window::publish_state,
    context::{HostContext, PluginContext},
    events::EventManager,
    host::HostServices,
    keyhook::SoftwareKeyHook,
    manifest::{MANIFEST_FILE, PluginManifest},
    settings::SandboxLimits,
    store::ConfigStore,
    subtitle::SubtitleTracker,
};

/// Owns the shared host objects and every loaded plugin, in load order.
pub struct PluginManager {
    /// Objects handed to each plugin context.
    shared: HostContext,
    /// In-process key hook feeding the dispatcher.
    keys: Arc<SoftwareKeyHook>,
    /// Loaded plugins, oldest first.
    plugins: Vec<PluginContext>,
}

impl PluginManager {
    /// Create a manager with a fresh dispatcher, event bus, key hook and
    /// subtitle tracker.
    pub fn new(host: Arc<dyn HostServices>, store: Arc<dyn ConfigStore>, limits: SandboxLimits) -> Self {
        let dispatcher = Arc::new(ActionDispatcher::new());
        let keys = Arc::new(SoftwareKeyHook::new(dispatcher.clone()));
        let events = Arc::new(EventManager::new());
        let subtitles = Arc::new(SubtitleTracker::new(events.clone()));
        Self {
            shared: HostContext {
                dispatcher,
                events,
                hook: keys.clone(),
                subtitles,
                host,
                store,
                limits,
            },
            keys,
            plugins: Vec::new(),
        }
    }

    /// Shared host objects.
    pub fn shared(&self) -> &HostContext {
        &self.shared
    }

    /// The key hook; feed key-downs here.
    pub fn keys(&self) -> &Arc<SoftwareKeyHook> {
        &self.keys
    }

    /// The action dispatcher.
    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.shared.dispatcher
    }

    /// The event bus.
    pub fn events(&self) -> &Arc<EventManager> {
        &self.shared.events
    }

    /// The subtitle tracker.
    pub fn subtitles(&self) -> &Arc<SubtitleTracker> {
        &self.shared.subtitles
    }

    /// Plugin directories under `root` (those containing `plugin.json`),
    /// sorted by path.
    pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if path.is_dir() && path.join(MANIFEST_FILE).is_file() {
                dirs.push(path);
            }
        }
        dirs.sort();
        debug!(root = %root.display(), found = dirs.len(), "plugins_discovered");
        Ok(dirs)
    }

    /// Load the plugin in `dir`. Returns its id.
    pub fn load_dir(&mut self, dir: &Path) -> Result<String> {
        let manifest = PluginManifest::load(dir)?;
        self.check_unique(&manifest.id)?;
        let ctx = PluginContext::load(manifest, dir, &self.shared)?;
        Ok(self.push(ctx))
    }

    /// Load a plugin from in-memory source. Returns its id.
    pub fn load_source(&mut self, manifest: PluginManifest, source: &str) -> Result<String> {
        self.check_unique(&manifest.id)?;
        let ctx = PluginContext::from_source(manifest, source, &self.shared)?;
        Ok(self.push(ctx))
    }

    /// Load every plugin under `root`. Failures are logged and returned; they
    /// do not stop the remaining plugins from loading.
    pub fn load_all(&mut self, root: &Path) -> Vec<(PathBuf, Error)> {
        let dirs = match Self::discover(root) {
            Ok(dirs) => dirs,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "plugins_dir_unreadable");
                return vec![(root.to_path_buf(), e)];
            }
        };
        let mut failures = Vec::new();
        for dir in dirs {
            if let Err(e) = self.load_dir(&dir) {
                warn!(dir = %dir.display(), error = %e.pretty(), "plugin_load_failed");
                failures.push((dir, e));
            }
        }
        info!(loaded = self.plugins.len(), failed = failures.len(), "plugins_loaded");
        failures
    }

    /// Unload plugin `id`.
    pub fn unload(&mut self, id: &str) -> Result<()> {
        let index = self.index_of(id)?;
        let ctx = self.plugins.remove(index);
        ctx.unload();
        Ok(())
    }

    /// Unload plugin `id` and load it again from the same place, keeping its
    /// position in the load order.
    pub fn reload(&mut self, id: &str) -> Result<()> {
        let index = self.index_of(id)?;
        let old = self.plugins.remove(index);
        old.unload();
        let ctx = match old.dir() {
            Some(dir) => {
                let manifest = PluginManifest::load(dir)?;
                if manifest.id != id {
                    self.check_unique(&manifest.id)?;
                }
                PluginContext::load(manifest, dir, &self.shared)?
            }
            None => PluginContext::from_source(old.manifest().clone(), old.source(), &self.shared)?,
        };
        info!(plugin = id, "plugin_reloaded");
        self.plugins.insert(index, ctx);
        Ok(())
    }

    /// Unload every plugin, newest first.
    pub fn unload_all(&mut self) {
        while let Some(ctx) = self.plugins.pop() {
            ctx.unload();
        }
    }

    /// Ids of loaded plugins, in load order.
    pub fn plugin_ids(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.id().to_string()).collect()
    }

    /// Loaded plugin `id`.
    pub fn get(&self, id: &str) -> Option<&PluginContext> {
        self.plugins.iter().find(|p| p.id() == id)
    }

    /// Publish the current window state to every subscriber. Returns how many
    /// listeners were reached; zero when there is no window.
    pub fn publish_window_state(&self) -> usize {
        match self.shared.host.window() {
            Some(window) => publish_state(&self.shared.events, &window.state()),
            None => 0,
        }
    }

    /// Fail if `id` is already loaded.
    fn check_unique(&self, id: &str) -> Result<()> {
        if self.get(id).is_some() {
            return Err(Error::DuplicatePlugin(id.to_string()));
        }
        Ok(())
    }

    /// Position of plugin `id`.
    fn index_of(&self, id: &str) -> Result<usize> {
        self.plugins
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| Error::UnknownPlugin(id.to_string()))
    }

    /// Append a loaded plugin and return its id.
    fn push(&mut self, ctx: PluginContext) -> String {
        let id = ctx.id().to_string();
        self.plugins.push(ctx);
        id
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.unload_all();
    }
}
