//! Event registry and fan-out
//!
//! For each occurrence the custom handler's `before` runs first. Unless it
//! returns `true`, and provided the custom handler has an `after` hook, the
//! core handler's `every` runs next and `after` runs last (skipped when
//! `every` returns `true`). Without a custom handler the core handler runs on
//! its own. Handler errors and panics stop the chain and are logged here;
//! they never reach the client.

use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::context::{EventContext, Services};
use crate::application::errors::BotError;
use crate::domain::entities::{event_names, Event};
use crate::plugins::trait_def::{CoreEvent, CustomEvent, EventHandler};

/// An event handler as stored in the registry
#[derive(Debug)]
pub struct RegisteredEvent {
    pub name: String,
    pub is_core: bool,
    pub source: String,
    pub handler: EventHandler,
}

impl RegisteredEvent {
    fn core_hook(&self) -> Option<&Arc<dyn CoreEvent>> {
        match &self.handler {
            EventHandler::Core(h) => Some(h),
            EventHandler::Custom(_) => None,
        }
    }

    fn custom_hook(&self) -> Option<&Arc<dyn CustomEvent>> {
        match &self.handler {
            EventHandler::Custom(h) => Some(h),
            EventHandler::Core(_) => None,
        }
    }
}

/// How a single dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Name is on the ignore list
    Ignored,
    /// No handler registered for the name
    Unhandled,
    /// The custom `before` hook returned `true`
    Vetoed,
    /// The chain ran to the end
    Completed,
    /// A handler returned an error
    Failed,
}

#[derive(Default)]
struct EventRegistry {
    core: HashMap<String, Arc<RegisteredEvent>>,
    custom: HashMap<String, Arc<RegisteredEvent>>,
}

impl EventRegistry {
    fn partition(&mut self, is_core: bool) -> &mut HashMap<String, Arc<RegisteredEvent>> {
        if is_core {
            &mut self.core
        } else {
            &mut self.custom
        }
    }
}

/// Owns core and custom event handlers and fans platform events out to them
#[derive(Default)]
pub struct EventManager {
    registry: RwLock<EventRegistry>,
    services: OnceLock<Services>,
    subscribed: Mutex<HashSet<String>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a handler under its partition. Re-registration replaces.
    pub fn register(
        &self,
        handler: EventHandler,
        name: &str,
        filename: &str,
        is_core: bool,
    ) -> Result<Arc<RegisteredEvent>, BotError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(BotError::validation(format!("Event in {} has no name", filename)));
        }
        if handler.is_core() != is_core {
            return Err(BotError::validation(format!(
                "Event '{}' in {} is a {} handler but was loaded as {}",
                name,
                filename,
                handler.kind(),
                if is_core { "core" } else { "custom" }
            )));
        }
        if event_names::is_ignored(&name) {
            warn!("Event '{}' from {} is never dispatched", name, filename);
        }

        let event = Arc::new(RegisteredEvent {
            name: name.clone(),
            is_core,
            source: filename.to_string(),
            handler,
        });

        let mut registry = self.registry.write().map_err(|_| BotError::poisoned())?;
        if let Some(previous) = registry.partition(is_core).insert(name.clone(), event.clone()) {
            info!("Replacing {} event '{}' (was from {})", previous.handler.kind(), name, previous.source);
        }
        debug!("Registered {} event '{}' from {}", event.handler.kind(), name, filename);
        Ok(event)
    }

    /// Remove a handler, core first, then custom. Awaits its `exit` hook.
    pub async fn unregister(&self, name: &str) -> bool {
        if self.unregister_partition(name, true).await {
            return true;
        }
        self.unregister_partition(name, false).await
    }

    /// Remove the handler from one partition only
    pub async fn unregister_partition(&self, name: &str, is_core: bool) -> bool {
        let name = name.to_lowercase();
        let removed = match self.registry.write() {
            Ok(mut registry) => registry.partition(is_core).remove(&name),
            Err(_) => {
                error!("Event registry lock poisoned");
                return false;
            }
        };
        match removed {
            Some(event) => {
                if let Err(e) = event.handler.exit().await {
                    error!("Event '{}' failed to exit: {}", event.name, e);
                }
                info!("Unregistered {} event: {}", event.handler.kind(), event.name);
                true
            }
            None => false,
        }
    }

    pub fn get_core(&self, name: &str) -> Option<Arc<RegisteredEvent>> {
        self.registry.read().ok()?.core.get(&name.to_lowercase()).cloned()
    }

    pub fn get_custom(&self, name: &str) -> Option<Arc<RegisteredEvent>> {
        self.registry.read().ok()?.custom.get(&name.to_lowercase()).cloned()
    }

    /// Every registered event name, sorted
    pub fn names(&self) -> Vec<String> {
        let Ok(registry) = self.registry.read() else {
            return Vec::new();
        };
        let mut names: Vec<String> = registry
            .core
            .keys()
            .chain(registry.custom.keys())
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.registry
            .read()
            .map(|r| r.core.len() + r.custom.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind to the client: keep the services for dispatch and subscribe one
    /// listener per registered event name.
    pub fn attach(self: &Arc<Self>, services: Services) {
        if self.services.set(services).is_err() {
            warn!("Event manager already attached to a client");
        }
        for name in self.names() {
            self.ensure_subscribed(&name);
        }
    }

    /// Subscribe a listener for `name` unless one exists. Does nothing until
    /// the manager is attached.
    pub fn ensure_subscribed(self: &Arc<Self>, name: &str) {
        let name = name.to_lowercase();
        if event_names::is_ignored(&name) {
            return;
        }
        let Some(services) = self.services.get() else {
            return;
        };
        let newly_added = match self.subscribed.lock() {
            Ok(mut subscribed) => subscribed.insert(name.clone()),
            Err(_) => false,
        };
        if !newly_added {
            return;
        }

        let manager: Weak<EventManager> = Arc::downgrade(self);
        services.client.on(
            &name,
            Arc::new(move |event: Event| {
                if let Some(manager) = manager.upgrade() {
                    manager.event(event);
                }
            }),
        );
        debug!("Subscribed to event '{}'", name);
    }

    /// Fire-and-forget entry point used by client listeners. The chain runs
    /// on its own task so a slow handler never blocks other occurrences.
    pub fn event(self: &Arc<Self>, event: Event) -> Option<JoinHandle<DispatchOutcome>> {
        if event_names::is_ignored(&event.name) {
            return None;
        }
        let Some(services) = self.services.get().cloned() else {
            warn!("Dropping event '{}': manager not attached", event.name);
            return None;
        };
        let manager = Arc::clone(self);
        Some(tokio::spawn(async move {
            manager.dispatch(&services, Arc::new(event)).await
        }))
    }

    /// Run the handler chain for one occurrence and report how it ended
    pub async fn dispatch(&self, services: &Services, event: Arc<Event>) -> DispatchOutcome {
        if event_names::is_ignored(&event.name) {
            return DispatchOutcome::Ignored;
        }

        let (custom, core) = match self.registry.read() {
            Ok(registry) => (
                registry
                    .custom
                    .get(&event.name)
                    .and_then(|e| e.custom_hook().cloned()),
                registry
                    .core
                    .get(&event.name)
                    .and_then(|e| e.core_hook().cloned()),
            ),
            Err(_) => {
                error!("Event registry lock poisoned");
                return DispatchOutcome::Failed;
            }
        };

        let ctx = EventContext::new(services.clone(), event.clone());
        let chain = AssertUnwindSafe(self.run_chain(&ctx, custom, core)).catch_unwind();
        match chain.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("Event '{}' handler failed: {}", event.name, e);
                DispatchOutcome::Failed
            }
            Err(panic) => {
                error!("Event '{}' handler panicked: {}", event.name, panic_message(panic.as_ref()));
                DispatchOutcome::Failed
            }
        }
    }

    async fn run_chain(
        &self,
        ctx: &EventContext,
        custom: Option<Arc<dyn CustomEvent>>,
        core: Option<Arc<dyn CoreEvent>>,
    ) -> Result<DispatchOutcome, BotError> {
        match (custom, core) {
            (Some(custom), core) => {
                if custom.before(ctx).await? {
                    return Ok(DispatchOutcome::Vetoed);
                }
                if custom.has_after() {
                    let handled = match core {
                        Some(core) => self.run_core(ctx, &core).await?,
                        None => false,
                    };
                    if !handled {
                        custom.after(ctx).await?;
                    }
                }
                Ok(DispatchOutcome::Completed)
            }
            (None, Some(core)) => {
                self.run_core(ctx, &core).await?;
                Ok(DispatchOutcome::Completed)
            }
            (None, None) => Ok(DispatchOutcome::Unhandled),
        }
    }

    async fn run_core(&self, ctx: &EventContext, core: &Arc<dyn CoreEvent>) -> Result<bool, BotError> {
        let result = core.every(ctx).await;
        if core.once() {
            self.retire(&ctx.event.name, core).await;
        }
        result
    }

    /// Drop a `once` core handler if it is still the registered one
    async fn retire(&self, name: &str, handler: &Arc<dyn CoreEvent>) {
        let removed = match self.registry.write() {
            Ok(mut registry) => {
                let same = registry
                    .core
                    .get(name)
                    .and_then(|e| e.core_hook())
                    .map(|h| Arc::as_ptr(h) as *const () == Arc::as_ptr(handler) as *const ())
                    .unwrap_or(false);
                if same {
                    registry.core.remove(name)
                } else {
                    None
                }
            }
            Err(_) => None,
        };
        if let Some(event) = removed {
            if let Err(e) = event.handler.exit().await {
                error!("Event '{}' failed to exit: {}", name, e);
            }
            debug!("Retired once handler for '{}'", name);
        }
    }

    /// Run every handler's `exit` hook, see [`CommandManager::exit`]
    ///
    /// [`CommandManager::exit`]: super::CommandManager::exit
    pub async fn exit(&self, waitable: bool) {
        let handlers: Vec<(String, EventHandler)> = match self.registry.read() {
            Ok(registry) => registry
                .core
                .values()
                .chain(registry.custom.values())
                .map(|e| (e.name.clone(), e.handler.clone()))
                .collect(),
            Err(_) => return,
        };

        if waitable {
            let results = join_all(handlers.iter().map(|(_, h)| h.exit())).await;
            for ((name, _), result) in handlers.iter().zip(results) {
                if let Err(e) = result {
                    error!("Event '{}' failed to exit: {}", name, e);
                }
            }
        } else {
            for (name, handler) in handlers {
                tokio::spawn(async move {
                    if let Err(e) = handler.exit().await {
                        error!("Event '{}' failed to exit: {}", name, e);
                    }
                });
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::Settings;
    use crate::application::managers::{CommandManager, ModuleManager};
    use crate::domain::entities::EventPayload;
    use crate::infrastructure::adapters::console::ConsoleClient;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Calls {
        before: AtomicUsize,
        every: AtomicUsize,
        after: AtomicUsize,
    }

    struct Core {
        calls: Arc<Calls>,
        stop: bool,
        once: bool,
        fail: bool,
    }

    #[async_trait]
    impl CoreEvent for Core {
        async fn every(&self, _ctx: &EventContext) -> Result<bool, BotError> {
            self.calls.every.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BotError::Internal("core blew up".into()));
            }
            Ok(self.stop)
        }

        fn once(&self) -> bool {
            self.once
        }
    }

    struct Custom {
        calls: Arc<Calls>,
        veto: bool,
        has_after: bool,
    }

    #[async_trait]
    impl CustomEvent for Custom {
        async fn before(&self, _ctx: &EventContext) -> Result<bool, BotError> {
            self.calls.before.fetch_add(1, Ordering::SeqCst);
            Ok(self.veto)
        }

        fn has_after(&self) -> bool {
            self.has_after
        }

        async fn after(&self, _ctx: &EventContext) -> Result<(), BotError> {
            self.calls.after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Panics on its first occurrence only
    struct Flaky {
        calls: Arc<Calls>,
    }

    #[async_trait]
    impl CoreEvent for Flaky {
        async fn every(&self, _ctx: &EventContext) -> Result<bool, BotError> {
            if self.calls.every.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("handler bug");
            }
            Ok(false)
        }
    }

    fn core(calls: &Arc<Calls>) -> Core {
        Core { calls: calls.clone(), stop: false, once: false, fail: false }
    }

    fn custom(calls: &Arc<Calls>, veto: bool) -> Custom {
        Custom { calls: calls.clone(), veto, has_after: true }
    }

    fn services() -> Services {
        Services::new(
            Arc::new(ConsoleClient::new()),
            Arc::new(CommandManager::new()),
            Arc::new(ModuleManager::new()),
            Settings::default(),
        )
    }

    fn occurrence(name: &str) -> Arc<Event> {
        Arc::new(Event::new(name, EventPayload::Empty))
    }

    fn counts(calls: &Calls) -> (usize, usize, usize) {
        (
            calls.before.load(Ordering::SeqCst),
            calls.every.load(Ordering::SeqCst),
            calls.after.load(Ordering::SeqCst),
        )
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let calls = Arc::new(Calls::default());
        let manager = Arc::new(EventManager::new());
        manager
            .register(EventHandler::core(Flaky { calls: calls.clone() }), "message", "core", true)
            .unwrap();
        manager.attach(services());

        let first = manager.event(Event::new("message", EventPayload::Empty)).unwrap();
        assert_eq!(first.await.unwrap(), DispatchOutcome::Failed);
        let second = manager.event(Event::new("message", EventPayload::Empty)).unwrap();
        assert_eq!(second.await.unwrap(), DispatchOutcome::Completed);
        assert_eq!(calls.every.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_veto_skips_core_and_after() {
        let calls = Arc::new(Calls::default());
        let manager = EventManager::new();
        manager.register(EventHandler::core(core(&calls)), "message", "src/events/message.yaml", true).unwrap();
        manager.register(EventHandler::custom(custom(&calls, true)), "message", "events/message.yaml", false).unwrap();

        let outcome = manager.dispatch(&services(), occurrence("message")).await;
        assert_eq!(outcome, DispatchOutcome::Vetoed);
        assert_eq!(counts(&calls), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_wrapped_chain_order() {
        let calls = Arc::new(Calls::default());
        let manager = EventManager::new();
        manager.register(EventHandler::core(core(&calls)), "message", "core", true).unwrap();
        manager.register(EventHandler::custom(custom(&calls, false)), "message", "custom", false).unwrap();

        let outcome = manager.dispatch(&services(), occurrence("message")).await;
        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(counts(&calls), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_core_returning_true_skips_after() {
        let calls = Arc::new(Calls::default());
        let manager = EventManager::new();
        let mut stopping = core(&calls);
        stopping.stop = true;
        manager.register(EventHandler::core(stopping), "ready", "core", true).unwrap();
        manager.register(EventHandler::custom(custom(&calls, false)), "ready", "custom", false).unwrap();

        manager.dispatch(&services(), occurrence("ready")).await;
        assert_eq!(counts(&calls), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_custom_without_after_keeps_core_silent() {
        let calls = Arc::new(Calls::default());
        let manager = EventManager::new();
        manager.register(EventHandler::core(core(&calls)), "ready", "core", true).unwrap();
        let mut hook = custom(&calls, false);
        hook.has_after = false;
        manager.register(EventHandler::custom(hook), "ready", "custom", false).unwrap();

        manager.dispatch(&services(), occurrence("ready")).await;
        assert_eq!(counts(&calls), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_custom_only_runs_after() {
        let calls = Arc::new(Calls::default());
        let manager = EventManager::new();
        manager.register(EventHandler::custom(custom(&calls, false)), "member_join", "custom", false).unwrap();

        manager.dispatch(&services(), occurrence("member_join")).await;
        assert_eq!(counts(&calls), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_core_only_runs_once_per_occurrence() {
        let calls = Arc::new(Calls::default());
        let manager = EventManager::new();
        manager.register(EventHandler::core(core(&calls)), "message", "core", true).unwrap();

        let services = services();
        for _ in 0..3 {
            manager.dispatch(&services, occurrence("message")).await;
        }
        assert_eq!(counts(&calls), (0, 3, 0));
    }

    #[tokio::test]
    async fn test_failure_is_contained() {
        let calls = Arc::new(Calls::default());
        let manager = EventManager::new();
        let mut failing = core(&calls);
        failing.fail = true;
        manager.register(EventHandler::core(failing), "message", "core", true).unwrap();
        manager.register(EventHandler::custom(custom(&calls, false)), "message", "custom", false).unwrap();

        let outcome = manager.dispatch(&services(), occurrence("message")).await;
        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(counts(&calls), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_once_handler_is_retired() {
        let calls = Arc::new(Calls::default());
        let manager = EventManager::new();
        let mut single = core(&calls);
        single.once = true;
        manager.register(EventHandler::core(single), "ready", "core", true).unwrap();

        let services = services();
        manager.dispatch(&services, occurrence("ready")).await;
        let second = manager.dispatch(&services, occurrence("ready")).await;
        assert_eq!(second, DispatchOutcome::Unhandled);
        assert_eq!(counts(&calls), (0, 1, 0));
    }

    #[tokio::test]
    async fn test_ignored_and_unhandled() {
        let manager = EventManager::new();
        let services = services();
        assert_eq!(manager.dispatch(&services, occurrence("raw")).await, DispatchOutcome::Ignored);
        assert_eq!(manager.dispatch(&services, occurrence("typing")).await, DispatchOutcome::Unhandled);
    }

    #[tokio::test]
    async fn test_register_rejects_partition_mismatch() {
        let calls = Arc::new(Calls::default());
        let manager = EventManager::new();
        let err = manager
            .register(EventHandler::core(core(&calls)), "message", "events/message.yaml", false)
            .unwrap_err();
        assert!(matches!(err, BotError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unregister_prefers_core() {
        let calls = Arc::new(Calls::default());
        let manager = EventManager::new();
        manager.register(EventHandler::core(core(&calls)), "message", "core", true).unwrap();
        manager.register(EventHandler::custom(custom(&calls, false)), "message", "custom", false).unwrap();

        assert!(manager.unregister("message").await);
        assert!(manager.get_core("message").is_none());
        assert!(manager.get_custom("message").is_some());
        assert!(manager.unregister("message").await);
        assert!(!manager.unregister("message").await);
    }

    #[tokio::test]
    async fn test_attached_client_delivers_events() {
        let calls = Arc::new(Calls::default());
        let manager = Arc::new(EventManager::new());
        manager.register(EventHandler::core(core(&calls)), "message", "core", true).unwrap();

        let client = Arc::new(ConsoleClient::new());
        let services = Services::new(
            client.clone(),
            Arc::new(CommandManager::new()),
            Arc::new(ModuleManager::new()),
            Settings::default(),
        );
        manager.attach(services);

        let handles = client.emit(Event::new("message", EventPayload::Empty));
        assert_eq!(handles, 1);
        client.emit(Event::new("raw", EventPayload::Empty));

        // The dispatch runs on a spawned task
        for _ in 0..50 {
            if calls.every.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(calls.every.load(Ordering::SeqCst), 1);
    }
}
