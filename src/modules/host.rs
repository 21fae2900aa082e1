//! Module host — owns the modules and drives the tick loop.
//!
//! Each tick the host first applies writes queued from other threads, then
//! ticks every module in registration order. All of that happens on the
//! host's thread, which gives the store its single global write order: a
//! module's writes are visible to every module ticked after it in the same
//! frame.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::blackboard::{DataStore, Inbox, RemoteWriter};

use super::error::ModuleError;
use super::module::{DisplayHook, Module, ModuleContext};

/// Runs registered modules against one shared store.
pub struct ModuleHost {
    store: Arc<DataStore>,
    inbox: Inbox,
    modules: Vec<Box<dyn Module>>,
    display: Option<DisplayHook>,
    started: bool,
    tick_count: u64,
}

impl ModuleHost {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self {
            store,
            inbox: Inbox::new(),
            modules: Vec::new(),
            display: None,
            started: false,
            tick_count: 0,
        }
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    /// Route every [`ModuleContext::set_value`] change of contexts created
    /// afterwards through `display`.
    pub fn set_display(&mut self, display: DisplayHook) {
        self.display = Some(display);
    }

    /// A store handle for a module named `name`.
    pub fn context(&self, name: impl Into<String>) -> ModuleContext {
        let ctx = ModuleContext::new(name, Arc::clone(&self.store));
        match &self.display {
            Some(display) => ctx.with_display(Arc::clone(display)),
            None => ctx,
        }
    }

    /// A thread-safe writer whose writes land at the start of the next tick.
    pub fn remote_writer(&self, name: impl Into<String>) -> RemoteWriter {
        self.inbox.writer(name)
    }

    // -----------------------------------------------------------------------
    // Module lifecycle
    // -----------------------------------------------------------------------

    /// Add a module. If the host is already running, the module is started
    /// immediately.
    pub fn register(&mut self, module: impl Module + 'static) -> Result<(), ModuleError> {
        self.register_boxed(Box::new(module))
    }

    pub fn register_boxed(&mut self, mut module: Box<dyn Module>) -> Result<(), ModuleError> {
        let name = module.name().to_string();
        if self.modules.iter().any(|m| m.name() == name) {
            return Err(ModuleError::AlreadyRegistered(name));
        }
        if self.started {
            module.start()?;
        }
        log::debug!("[ModuleHost] registered {}", name);
        self.modules.push(module);
        Ok(())
    }

    /// Stop and remove a module.
    pub fn remove(&mut self, name: &str) -> Result<Box<dyn Module>, ModuleError> {
        let index = self
            .modules
            .iter()
            .position(|m| m.name() == name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;
        let mut module = self.modules.remove(index);
        if self.started {
            module.stop();
        }
        Ok(module)
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Start every module in registration order. Start-up failures are
    /// configuration errors and abort immediately.
    pub fn start(&mut self) -> Result<(), ModuleError> {
        if self.started {
            return Ok(());
        }
        for module in &mut self.modules {
            log::debug!("[ModuleHost] starting {}", module.name());
            module.start()?;
        }
        self.started = true;
        Ok(())
    }

    /// Stop every module in reverse registration order.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        for module in self.modules.iter_mut().rev() {
            module.stop();
        }
        self.started = false;
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Run one frame. Returns the number of modules whose tick failed;
    /// failures are logged and do not stop the other modules.
    pub fn tick(&mut self) -> usize {
        let remote = self.inbox.drain(&self.store);
        if remote > 0 {
            log::trace!("[ModuleHost] applied {} queued writes", remote);
        }

        let mut failed = 0;
        for module in &mut self.modules {
            if let Err(e) = module.tick() {
                log::error!("[ModuleHost] {} tick failed: {}", module.name(), e);
                failed += 1;
            }
        }
        self.tick_count += 1;
        failed
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Start if needed, then tick `ticks` times, one tick per `period`.
    pub async fn run_ticks(&mut self, period: Duration, ticks: u64) -> Result<(), ModuleError> {
        self.start()?;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        for _ in 0..ticks {
            interval.tick().await;
            self.tick();
        }
        Ok(())
    }

    /// Start if needed, tick every `period` until `shutdown` resolves, then
    /// stop all modules.
    pub async fn run_until<F>(&mut self, period: Duration, shutdown: F) -> Result<(), ModuleError>
    where
        F: Future<Output = ()>,
    {
        self.start()?;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        log::info!("[ModuleHost] shutting down after {} ticks", self.tick_count);
        self.stop();
        Ok(())
    }
}

impl std::fmt::Debug for ModuleHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHost")
            .field("modules", &self.module_names())
            .field("started", &self.started)
            .field("tick_count", &self.tick_count)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Copies one key to another each tick.
    struct Relay {
        ctx: ModuleContext,
        from: &'static str,
        to: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl Module for Relay {
        fn name(&self) -> &str {
            self.ctx.name()
        }

        fn start(&mut self) -> Result<(), ModuleError> {
            self.journal.lock().push(format!("start {}", self.ctx.name()));
            Ok(())
        }

        fn tick(&mut self) -> Result<(), ModuleError> {
            if let Some(value) = self.ctx.get(self.from) {
                self.ctx.set_value(self.to, value, "relay");
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.journal.lock().push(format!("stop {}", self.ctx.name()));
        }
    }

    struct Broken;

    impl Module for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn tick(&mut self) -> Result<(), ModuleError> {
            Err(ModuleError::Runtime {
                module: "Broken".into(),
                message: "sensor unplugged".into(),
            })
        }
    }

    fn relay(host: &ModuleHost, name: &str, from: &'static str, to: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Relay {
        Relay {
            ctx: host.context(name),
            from,
            to,
            journal: journal.clone(),
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut host = ModuleHost::new(Arc::new(DataStore::new()));
        host.register(relay(&host, "A", "x", "y", &journal)).unwrap();
        let err = host.register(relay(&host, "A", "y", "z", &journal)).unwrap_err();
        assert!(matches!(err, ModuleError::AlreadyRegistered(name) if name == "A"));
        assert_eq!(host.len(), 1);
    }

    #[test]
    fn test_writes_visible_later_in_same_tick() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(DataStore::new());
        let mut host = ModuleHost::new(store.clone());
        host.register(relay(&host, "First", "a", "b", &journal)).unwrap();
        host.register(relay(&host, "Second", "b", "c", &journal)).unwrap();
        host.start().unwrap();

        store.set("a", 5i64, "test", "");
        host.tick();
        assert_eq!(store.get_typed("c", 0i64), 5);
    }

    #[test]
    fn test_remote_writes_applied_before_modules() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(DataStore::new());
        let mut host = ModuleHost::new(store.clone());
        host.register(relay(&host, "Relay", "remote", "local", &journal)).unwrap();

        let writer = host.remote_writer("Bridge");
        std::thread::spawn(move || {
            writer.set("remote", "hello", "from socket");
        })
        .join()
        .unwrap();

        host.tick();
        assert_eq!(store.get_typed("local", String::new()), "hello");
    }

    #[test]
    fn test_failing_module_does_not_stop_others() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(DataStore::new());
        let mut host = ModuleHost::new(store.clone());
        host.register(Broken).unwrap();
        host.register(relay(&host, "Relay", "a", "b", &journal)).unwrap();

        store.set("a", true, "test", "");
        assert_eq!(host.tick(), 1);
        assert!(store.get_typed("b", false));
        assert_eq!(host.tick_count(), 1);
    }

    #[test]
    fn test_lifecycle_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut host = ModuleHost::new(Arc::new(DataStore::new()));
        host.register(relay(&host, "A", "x", "y", &journal)).unwrap();
        host.register(relay(&host, "B", "x", "y", &journal)).unwrap();
        host.start().unwrap();
        host.register(relay(&host, "C", "x", "y", &journal)).unwrap();
        let removed = host.remove("B").unwrap();
        assert_eq!(removed.name(), "B");
        host.stop();

        assert_eq!(
            *journal.lock(),
            vec!["start A", "start B", "start C", "stop B", "stop C", "stop A"]
        );
        assert!(matches!(host.remove("B"), Err(ModuleError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_run_ticks() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(DataStore::new());
        let mut host = ModuleHost::new(store.clone());
        host.register(relay(&host, "Relay", "a", "b", &journal)).unwrap();
        store.set("a", 1i64, "test", "");

        host.run_ticks(Duration::from_millis(1), 3).await.unwrap();
        assert_eq!(host.tick_count(), 3);
        assert_eq!(store.get_typed("b", 0i64), 1);
    }

    #[tokio::test]
    async fn test_run_until_stops_modules() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut host = ModuleHost::new(Arc::new(DataStore::new()));
        host.register(relay(&host, "A", "x", "y", &journal)).unwrap();

        host.run_until(Duration::from_millis(1), tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap();

        assert!(host.tick_count() >= 1);
        assert_eq!(*journal.lock(), vec!["start A", "stop A"]);
    }
}
