//! WebView API: inject styles and scripts into the page and run scripts for a
//! result.
//!
//! Injected payloads are embedded in a JavaScript template literal, so
//! backslashes, backticks and `${` are escaped before wrapping. Every wrapper
//! runs inside a `try`/`catch` closure, so a faulting payload logs to the page
//! console instead of aborting the page's own scripts.
//!
//! Deferred timings register a document-creation script with the surface. The
//! ids of those scripts, and the `<style>` elements tagged with the plugin id,
//! are removed again by [`WebViewApi::cleanup`].

use std::{convert::Infallible, mem, result::Result as StdResult, str::FromStr, sync::Arc};

use futures::executor::block_on;
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{
    Error, Result,
    host::{ContentSurface, HostServices},
    value::{ScriptValue, parse_script_result},
};

/// Attribute placed on injected `<style>` elements.
pub const STYLE_TAG_ATTR: &str = "data-floatview-plugin";

/// When injected content runs relative to page load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InjectTiming {
    /// Run now in the current document.
    #[default]
    Immediate,
    /// Run on the `load` event of each new document.
    OnLoad,
    /// Run once the DOM of each new document is ready.
    OnDomReady,
}

impl InjectTiming {
    /// Parse case-insensitively; anything unrecognised is [`InjectTiming::Immediate`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "onload" => Self::OnLoad,
            "ondomready" => Self::OnDomReady,
            _ => Self::Immediate,
        }
    }
}

impl FromStr for InjectTiming {
    type Err = Infallible;

    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl<'de> Deserialize<'de> for InjectTiming {
    fn deserialize<D>(deserializer: D) -> StdResult<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Options accepted by the inject calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InjectOptions {
    /// Delivery point.
    pub timing: InjectTiming,
}

impl InjectOptions {
    /// Options with the given timing.
    pub fn timing(timing: InjectTiming) -> Self {
        Self { timing }
    }
}

/// Escape `s` for embedding between backticks in JavaScript.
pub fn escape_template_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap arbitrary script so faults are reported on the console.
pub fn wrap_script(plugin: &str, script: &str) -> String {
    format!(
        "(function(){{try{{(new Function(`{}`))();}}catch(e){{console.error('[{}] injected script failed',e);}}}})();",
        escape_template_literal(script),
        plugin
    )
}

/// Wrap a stylesheet as a script appending a tagged `<style>` element.
pub fn wrap_css(plugin: &str, css: &str) -> String {
    format!(
        "(function(){{try{{var s=document.createElement('style');s.setAttribute('{attr}','{plugin}');s.textContent=`{css}`;(document.head||document.documentElement).appendChild(s);}}catch(e){{console.error('[{plugin}] injected style failed',e);}}}})();",
        attr = STYLE_TAG_ATTR,
        plugin = plugin,
        css = escape_template_literal(css)
    )
}

/// Wrap `body` so it runs at the point selected by `timing`.
pub fn wrap_timing(timing: InjectTiming, body: &str) -> String {
    match timing {
        InjectTiming::Immediate => body.to_string(),
        InjectTiming::OnLoad => format!("window.addEventListener('load',function(){{{}}});", body),
        InjectTiming::OnDomReady => format!(
            "if(document.readyState==='loading'){{document.addEventListener('DOMContentLoaded',function(){{{body}}});}}else{{{body}}}",
            body = body
        ),
    }
}

/// Script removing every style element injected by `plugin`.
pub fn remove_styles_script(plugin: &str) -> String {
    format!(
        "document.querySelectorAll('style[{}=\"{}\"]').forEach(function(e){{e.remove();}});",
        STYLE_TAG_ATTR, plugin
    )
}

/// The `webview` capability.
pub struct WebViewApi {
    /// Owning plugin id.
    plugin: String,
    /// Host services.
    host: Arc<dyn HostServices>,
    /// Ids of document-creation scripts registered so far.
    document_scripts: Arc<Mutex<Vec<String>>>,
}

impl WebViewApi {
    /// Build the capability for `plugin`.
    pub fn new(plugin: &str, host: Arc<dyn HostServices>) -> Self {
        Self {
            plugin: plugin.to_string(),
            host,
            document_scripts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Inject a stylesheet.
    pub fn inject_css(&self, css: &str, options: InjectOptions) -> bool {
        if css.trim().is_empty() {
            warn!(plugin = %self.plugin, "inject_css_empty");
            return false;
        }
        self.deliver("inject_css", wrap_css(&self.plugin, css), options.timing)
    }

    /// Inject a script.
    pub fn inject_script(&self, script: &str, options: InjectOptions) -> bool {
        if script.trim().is_empty() {
            warn!(plugin = %self.plugin, "inject_script_empty");
            return false;
        }
        self.deliver("inject_script", wrap_script(&self.plugin, script), options.timing)
    }

    /// Number of document-creation scripts currently registered.
    pub fn document_script_count(&self) -> usize {
        self.document_scripts.lock().len()
    }

    /// Post the wrapped payload to the UI thread.
    fn deliver(&self, op: &'static str, wrapped: String, timing: InjectTiming) -> bool {
        let Some(content) = self.host.content() else {
            warn!(plugin = %self.plugin, op, "content_unavailable");
            return false;
        };
        let plugin = self.plugin.clone();
        let ids = self.document_scripts.clone();
        let posted = self.host.ui().post(Box::new(move || match timing {
            InjectTiming::Immediate => content.post_script(&wrapped),
            deferred => {
                let script = wrap_timing(deferred, &wrapped);
                match content.add_document_script(&script) {
                    Some(id) => {
                        debug!(plugin = %plugin, op, id = %id, "document_script_added");
                        ids.lock().push(id);
                    }
                    None => warn!(plugin = %plugin, op, "document_script_rejected"),
                }
            }
        }));
        if !posted {
            warn!(plugin = %self.plugin, op, "ui_thread_unavailable");
        }
        posted
    }

    /// Run `script` in the page and return its decoded result.
    ///
    /// A blank script yields `Null`. A missing surface, an engine failure or a
    /// dropped completion are returned as errors.
    pub async fn execute_script(&self, script: &str) -> Result<ScriptValue> {
        if script.trim().is_empty() {
            warn!(plugin = %self.plugin, "execute_script_empty");
            return Ok(ScriptValue::Null);
        }
        let Some(content) = self.host.content() else {
            return Err(Error::SurfaceUnavailable);
        };
        let (tx, rx) = oneshot::channel();
        let script = script.to_string();
        let job = move || {
            content.execute_script(
                &script,
                Box::new(move |result| {
                    let _ignored = tx.send(result);
                }),
            );
        };
        let ui = self.host.ui();
        if ui.is_current() {
            job();
        } else if !ui.post(Box::new(job)) {
            return Err(Error::SurfaceUnavailable);
        }
        match rx.await {
            Ok(Ok(raw)) => Ok(parse_script_result(&raw)),
            Ok(Err(message)) => {
                debug!(plugin = %self.plugin, error = %message, "execute_script_failed");
                Err(Error::ExecuteScript(message))
            }
            Err(_) => Err(Error::ExecuteAbandoned),
        }
    }

    /// Blocking form of [`WebViewApi::execute_script`] for script bindings.
    pub fn execute_script_blocking(&self, script: &str) -> Result<ScriptValue> {
        block_on(self.execute_script(script))
    }

    /// Remove every document script and tagged style this plugin injected.
    pub fn cleanup(&self) {
        let Some(content) = self.host.content() else {
            let dropped = mem::take(&mut *self.document_scripts.lock());
            if !dropped.is_empty() {
                debug!(plugin = %self.plugin, count = dropped.len(), "webview_cleanup_without_surface");
            }
            return;
        };
        let plugin = self.plugin.clone();
        let ids = self.document_scripts.clone();
        let posted = self.host.ui().post(Box::new(move || {
            let taken = mem::take(&mut *ids.lock());
            remove_all(content.as_ref(), &taken);
            content.post_script(&remove_styles_script(&plugin));
            debug!(plugin = %plugin, scripts = taken.len(), "webview_cleaned_up");
        }));
        if !posted {
            warn!(plugin = %self.plugin, "ui_thread_unavailable");
        }
    }
}

/// Remove each registered document script.
fn remove_all(content: &dyn ContentSurface, ids: &[String]) {
    for id in ids {
        content.remove_document_script(id);
    }
}
