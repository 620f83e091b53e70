//! Per-owner hotkey registry (the Hotkey API).
//!
//! A registry maps canonical key combinations to callbacks for one owner. It
//! validates combos, guarantees at most one registration per combo within the
//! owner, builds a globally unique action name for each registration, and hands
//! a guarded invoker to the shared [`ActionDispatcher`]. Registrations are not
//! exclusive across owners: two plugins may both bind `Ctrl+Q`.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use vk_keycode::{KeyCombination, Modifiers};

use crate::{
    ActionDispatcher,
    action::{ActionHandler, HOST_ACTION_PREFIX, PLUGIN_ACTION_PREFIX},
    callback::{CallbackRef, invoke_guarded},
    keyhook::KeyHook,
};

/// Sentinel id returned when a registration is rejected.
pub const INVALID_ID: i64 = -1;

/// The entity that owns a registry and is responsible for its teardown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    /// The host application itself.
    Host,
    /// A plugin, by id.
    Plugin(String),
}

impl Owner {
    /// Action name for registration `id` of this owner.
    pub fn action_name(&self, id: i64) -> String {
        match self {
            Self::Host => format!("{}Hotkey:{}", HOST_ACTION_PREFIX, id),
            Self::Plugin(plugin) => format!("{}{}:Hotkey:{}", PLUGIN_ACTION_PREFIX, plugin, id),
        }
    }

    /// Short tag used in logs.
    pub fn tag(&self) -> String {
        match self {
            Self::Host => "host".to_string(),
            Self::Plugin(plugin) => format!("plugin:{}", plugin),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// One live registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyRegistration {
    /// Registry-local id, monotonic from 1.
    pub id: i64,
    /// Normalised combination.
    pub combo: KeyCombination,
    /// Globally unique action name.
    pub action_name: String,
    /// Base key virtual key code.
    pub vk_code: u32,
    /// Modifier bits.
    pub modifiers: Modifiers,
}

/// Forward and reverse indexes, kept consistent under one lock.
struct Indexes {
    /// Next id to hand out.
    next_id: i64,
    /// id → registration.
    by_id: BTreeMap<i64, HotkeyRegistration>,
    /// canonical combo → id.
    by_combo: HashMap<String, i64>,
}

/// Hotkey registrations for a single owner.
pub struct HotkeyRegistry {
    /// Owner identity; namespaces action names.
    owner: Owner,
    /// Shared action table.
    dispatcher: Arc<ActionDispatcher>,
    /// Physical input layer.
    hook: Arc<dyn KeyHook>,
    /// Registration indexes.
    indexes: Mutex<Indexes>,
}

impl HotkeyRegistry {
    /// Create an empty registry for `owner`.
    pub fn new(owner: Owner, dispatcher: Arc<ActionDispatcher>, hook: Arc<dyn KeyHook>) -> Self {
        Self {
            owner,
            dispatcher,
            hook,
            indexes: Mutex::new(Indexes {
                next_id: 1,
                by_id: BTreeMap::new(),
                by_combo: HashMap::new(),
            }),
        }
    }

    /// The owner of this registry.
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Register `callback` for `combo`. Returns the new id, or [`INVALID_ID`]
    /// when the combo is empty or invalid, the callback is missing, or the
    /// combo is already registered in this registry.
    pub fn register(&self, combo: &str, callback: Option<CallbackRef>) -> i64 {
        if combo.trim().is_empty() {
            warn!(owner = %self.owner, "hotkey_register_empty_combo");
            return INVALID_ID;
        }
        let Some(callback) = callback else {
            warn!(owner = %self.owner, combo, "hotkey_register_null_callback");
            return INVALID_ID;
        };
        let parsed = match KeyCombination::parse(combo) {
            Ok(c) => c,
            Err(err) => {
                warn!(owner = %self.owner, combo, error = %err, "hotkey_register_invalid_combo");
                return INVALID_ID;
            }
        };
        let canonical = parsed.to_string();

        let mut idx = self.indexes.lock();
        if idx.by_combo.contains_key(&canonical) {
            warn!(owner = %self.owner, combo = %canonical, "hotkey_already_registered");
            return INVALID_ID;
        }

        let id = idx.next_id;
        let action_name = self.owner.action_name(id);

        let context = format!("hotkey {}", canonical);
        let invoker: ActionHandler = Arc::new(move || {
            invoke_guarded(callback.as_ref(), &context, None);
        });
        if self.dispatcher.register_action(&action_name, invoker).is_err() {
            warn!(owner = %self.owner, action = %action_name, "hotkey_action_conflict");
            return INVALID_ID;
        }
        idx.next_id += 1;
        self.hook.bind(&parsed, &action_name);

        idx.by_combo.insert(canonical.clone(), id);
        idx.by_id.insert(
            id,
            HotkeyRegistration {
                id,
                combo: parsed,
                action_name,
                vk_code: parsed.vk_code(),
                modifiers: parsed.modifiers,
            },
        );
        info!(owner = %self.owner, combo = %canonical, id, "hotkey_registered");
        id
    }

    /// Unregister by combination string. Returns false for invalid or unknown combos.
    pub fn unregister(&self, combo: &str) -> bool {
        let Ok(parsed) = KeyCombination::parse(combo) else {
            warn!(owner = %self.owner, combo, "hotkey_unregister_invalid_combo");
            return false;
        };
        let id = self.indexes.lock().by_combo.get(&parsed.to_string()).copied();
        match id {
            Some(id) => self.unregister_by_id(id),
            None => false,
        }
    }

    /// Unregister by id. Returns false if the id is unknown or already removed.
    pub fn unregister_by_id(&self, id: i64) -> bool {
        let reg = {
            let mut idx = self.indexes.lock();
            let Some(reg) = idx.by_id.remove(&id) else {
                return false;
            };
            idx.by_combo.remove(&reg.combo.to_string());
            reg
        };
        self.hook.unbind(&reg.action_name);
        self.dispatcher.unregister_action(&reg.action_name);
        debug!(owner = %self.owner, combo = %reg.combo, id, "hotkey_unregistered");
        true
    }

    /// Whether `combo` is valid and not yet registered in this registry.
    ///
    /// Only local availability is checked; other owners may hold the same combo.
    pub fn is_available(&self, combo: &str) -> bool {
        match KeyCombination::parse(combo) {
            Ok(parsed) => !self.indexes.lock().by_combo.contains_key(&parsed.to_string()),
            Err(_) => false,
        }
    }

    /// Unregister everything this registry owns.
    pub fn cleanup(&self) {
        let ids: Vec<i64> = self.indexes.lock().by_id.keys().copied().collect();
        let count = ids.len();
        for id in ids {
            self.unregister_by_id(id);
        }
        if count > 0 {
            info!(owner = %self.owner, count, "hotkeys_cleaned_up");
        }
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.indexes.lock().by_id.len()
    }

    /// Whether there are no live registrations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of live registrations ordered by id.
    pub fn registrations(&self) -> Vec<HotkeyRegistration> {
        self.indexes.lock().by_id.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        callback::{CallbackFault, FnCallback},
        keyhook::SoftwareKeyHook,
    };

    struct Fixture {
        dispatcher: Arc<ActionDispatcher>,
        hook: Arc<SoftwareKeyHook>,
    }

    impl Fixture {
        fn new() -> Self {
            let dispatcher = Arc::new(ActionDispatcher::new());
            let hook = Arc::new(SoftwareKeyHook::new(dispatcher.clone()));
            Self { dispatcher, hook }
        }

        fn registry(&self, plugin: &str) -> HotkeyRegistry {
            HotkeyRegistry::new(
                Owner::Plugin(plugin.to_string()),
                self.dispatcher.clone(),
                self.hook.clone(),
            )
        }
    }

    fn counting() -> (Arc<AtomicUsize>, CallbackRef) {
        let n = Arc::new(AtomicUsize::new(0));
        let c = n.clone();
        (
            n,
            FnCallback::new("test", move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
    }

    #[test]
    fn register_assigns_ids_and_action_names() {
        let fx = Fixture::new();
        let reg = fx.registry("demo");
        let (_, cb) = counting();
        assert_eq!(reg.register("ctrl+shift+a", Some(cb.clone())), 1);
        assert_eq!(reg.register("F5", Some(cb)), 2);
        let regs = reg.registrations();
        assert_eq!(regs[0].action_name, "Plugin:demo:Hotkey:1");
        assert_eq!(regs[0].vk_code, 0x41);
        assert_eq!(regs[0].modifiers, Modifiers::CTRL | Modifiers::SHIFT);
        assert!(fx.dispatcher.contains("Plugin:demo:Hotkey:2"));
    }

    #[test]
    fn duplicate_combo_in_same_registry_is_rejected() {
        let fx = Fixture::new();
        let reg = fx.registry("demo");
        let (_, cb) = counting();
        assert_eq!(reg.register("Ctrl+Q", Some(cb.clone())), 1);
        assert_eq!(reg.register("q+CONTROL", Some(cb)), INVALID_ID);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn validation_failures_return_sentinel() {
        let fx = Fixture::new();
        let reg = fx.registry("demo");
        let (_, cb) = counting();
        assert_eq!(reg.register("", Some(cb.clone())), INVALID_ID);
        assert_eq!(reg.register("Ctrl+Q", None), INVALID_ID);
        assert_eq!(reg.register("Ctrl+Shift", Some(cb.clone())), INVALID_ID);
        assert_eq!(reg.register("A+B", Some(cb.clone())), INVALID_ID);
        assert_eq!(reg.register("Ctrl+Nope", Some(cb)), INVALID_ID);
        assert!(reg.is_empty());
        assert!(fx.dispatcher.is_empty());
    }

    #[test]
    fn availability_is_local_to_registry() {
        let fx = Fixture::new();
        let a = fx.registry("a");
        let b = fx.registry("b");
        let (_, cb) = counting();
        assert!(a.register("Ctrl+Q", Some(cb)) > 0);
        assert!(!a.is_available("ctrl+q"));
        assert!(b.is_available("ctrl+q"));
        assert!(!b.is_available("ctrl+"));
    }

    #[test]
    fn same_combo_in_two_registries_fires_both() {
        let fx = Fixture::new();
        let a = fx.registry("a");
        let b = fx.registry("b");
        let (na, ca) = counting();
        let (nb, cb) = counting();
        assert_eq!(a.register("Ctrl+Q", Some(ca)), 1);
        assert_eq!(b.register("Ctrl+Q", Some(cb)), 1);
        assert_eq!(fx.hook.press("Ctrl+Q"), 2);
        assert_eq!(na.load(Ordering::SeqCst), 1);
        assert_eq!(nb.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_by_id_is_idempotent() {
        let fx = Fixture::new();
        let reg = fx.registry("demo");
        let (n, cb) = counting();
        let id = reg.register("Alt+F4", Some(cb));
        assert!(!reg.unregister_by_id(42));
        assert!(reg.unregister_by_id(id));
        assert!(!reg.unregister_by_id(id));
        assert_eq!(fx.hook.press("Alt+F4"), 0);
        assert_eq!(n.load(Ordering::SeqCst), 0);
        assert!(reg.is_available("Alt+F4"));
        assert!(fx.dispatcher.is_empty());
    }

    #[test]
    fn unregister_by_combo_uses_reverse_index() {
        let fx = Fixture::new();
        let reg = fx.registry("demo");
        let (_, cb) = counting();
        reg.register("Ctrl+Alt+Delete", Some(cb));
        assert!(!reg.unregister("Ctrl+Delete"));
        assert!(!reg.unregister("garbage+"));
        assert!(reg.unregister("alt+ctrl+del"));
        assert!(reg.is_empty());
    }

    #[test]
    fn ids_keep_increasing_after_removal() {
        let fx = Fixture::new();
        let reg = fx.registry("demo");
        let (_, cb) = counting();
        let first = reg.register("A", Some(cb.clone()));
        reg.unregister_by_id(first);
        assert_eq!(reg.register("A", Some(cb)), first + 1);
    }

    #[test]
    fn faulting_callback_is_contained() {
        let fx = Fixture::new();
        let bad = fx.registry("bad");
        let good = fx.registry("good");
        let (n, cb) = counting();
        bad.register(
            "Ctrl+K",
            Some(FnCallback::new("bad", |_| Err(CallbackFault::new("boom")))),
        );
        good.register("Ctrl+K", Some(cb));
        assert_eq!(fx.hook.press("Ctrl+K"), 2);
        assert_eq!(n.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_removes_everything_owned() {
        let fx = Fixture::new();
        let mine = fx.registry("mine");
        let other = fx.registry("other");
        let (_, cb) = counting();
        mine.register("Ctrl+1", Some(cb.clone()));
        mine.register("Ctrl+2", Some(cb.clone()));
        other.register("Ctrl+1", Some(cb));
        mine.cleanup();
        assert!(mine.is_empty());
        assert_eq!(fx.dispatcher.names(), ["Plugin:other:Hotkey:1"]);
        assert_eq!(fx.hook.bindings().len(), 1);
    }

    #[test]
    fn action_conflict_does_not_consume_an_id() {
        let fx = Fixture::new();
        fx.dispatcher
            .register_action("Plugin:demo:Hotkey:1", Arc::new(|| {}))
            .expect("free name");
        let reg = fx.registry("demo");
        let (_, cb) = counting();
        assert_eq!(reg.register("Ctrl+K", Some(cb.clone())), INVALID_ID);
        assert!(reg.is_empty());
        assert!(fx.hook.bindings().is_empty());

        assert!(fx.dispatcher.unregister_action("Plugin:demo:Hotkey:1"));
        assert_eq!(reg.register("Ctrl+K", Some(cb)), 1);
        assert_eq!(fx.hook.bindings().len(), 1);
    }

    #[test]
    fn host_owner_uses_host_prefix() {
        assert_eq!(Owner::Host.action_name(3), "Host:Hotkey:3");
        assert_eq!(Owner::Plugin("p".into()).action_name(3), "Plugin:p:Hotkey:3");
    }

    #[test]
    fn callback_can_unregister_its_own_hotkey() {
        let fx = Fixture::new();
        let reg = Arc::new(fx.registry("demo"));
        let weak = Arc::downgrade(&reg);
        let id = reg.register(
            "Ctrl+O",
            Some(FnCallback::new("demo", move |_| {
                if let Some(r) = weak.upgrade() {
                    r.unregister("Ctrl+O");
                }
                Ok(())
            })),
        );
        assert_eq!(id, 1);
        assert_eq!(fx.hook.press("Ctrl+O"), 1);
        assert_eq!(fx.hook.press("Ctrl+O"), 0);
        assert!(reg.is_empty());
    }
}
