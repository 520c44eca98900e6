//! Plugin lifecycle integration tests
//! Run with: cargo test --test plugin_lifecycle_test

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nami_bot::application::errors::{BotError, PluginError};
use nami_bot::application::services::CommandService;
use nami_bot::domain::entities::{Message, PluginMetadata, User};
use nami_bot::domain::traits::{LoadedModule, ModuleLoader, Plugin, ReplySink};
use nami_bot::infrastructure::manifest::ManifestReader;
use nami_bot::infrastructure::package_manager::{PackageManager, PkgOperation, PkgOutcome};
use nami_bot::infrastructure::state::PluginStateStore;
use nami_bot::plugins::commands::register_plugin_commands;
use nami_bot::plugins::{Discoverer, PluginHost, PluginManager};

struct StubPlugin(PluginMetadata);

impl Plugin for StubPlugin {
    fn init(&self) -> Result<(), PluginError> {
        Ok(())
    }
    fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }
    fn metadata(&self) -> PluginMetadata {
        self.0.clone()
    }
}

/// Link-time loader over a shared id set; records how often `load` runs
struct FakeLoader {
    ids: Arc<Mutex<HashSet<String>>>,
    fail_load: HashSet<String>,
    load_calls: Arc<AtomicUsize>,
}

impl FakeLoader {
    fn new(ids: Arc<Mutex<HashSet<String>>>) -> Self {
        Self {
            ids,
            fail_load: HashSet::new(),
            load_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing_load(mut self, id: &str) -> Self {
        self.fail_load.insert(id.to_string());
        self
    }
}

impl ModuleLoader for FakeLoader {
    fn probe(&self, id: &str) -> Result<PluginMetadata, PluginError> {
        if self.ids.lock().unwrap().contains(id) {
            Ok(PluginMetadata {
                name: id.to_string(),
                version: "1.0.0".to_string(),
                description: None,
            })
        } else {
            Err(PluginError::Load(format!("unknown package '{}'", id)))
        }
    }

    fn source(&self, id: &str) -> Option<PathBuf> {
        Some(PathBuf::from("/plugins").join(id))
    }

    fn load(&self, id: &str) -> Result<LoadedModule, PluginError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.contains(id) {
            return Err(PluginError::Load(format!("broken package '{}'", id)));
        }
        let metadata = self.probe(id)?;
        Ok(LoadedModule {
            metadata: metadata.clone(),
            instance: Arc::new(StubPlugin(metadata)),
            keepalive: None,
        })
    }
}

/// Manifest over the same shared id set the loader uses
struct FakeManifest {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl ManifestReader for FakeManifest {
    fn dependency_ids(&self) -> Result<Vec<String>, PluginError> {
        Ok(self.ids.lock().unwrap().iter().cloned().collect())
    }
    fn plugin_dir_ids(&self) -> Result<Vec<String>, PluginError> {
        Ok(Vec::new())
    }
}

#[derive(Clone, Copy)]
enum PmBehavior {
    Succeed,
    SpawnFail,
    ExitWith(i32),
}

/// Package manager double: programmable outcome, call counting, optional
/// delay so tests can overlap operations on the same id
struct FakePackageManager {
    behavior: PmBehavior,
    delay_ms: u64,
    calls: Arc<AtomicUsize>,
}

impl FakePackageManager {
    fn new(behavior: PmBehavior) -> Self {
        Self {
            behavior,
            delay_ms: 0,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }
}

#[async_trait]
impl PackageManager for FakePackageManager {
    async fn run(&self, _op: PkgOperation, package: &str) -> Result<PkgOutcome, PluginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.behavior {
            PmBehavior::Succeed => Ok(PkgOutcome {
                exit_code: 0,
                stdout: format!("added {}", package),
                stderr: String::new(),
            }),
            PmBehavior::SpawnFail => Err(PluginError::SpawnFailed("no such binary".to_string())),
            PmBehavior::ExitWith(code) => Ok(PkgOutcome {
                exit_code: code,
                stdout: String::new(),
                stderr: format!("cannot resolve {}", package),
            }),
        }
    }
}

struct Fixture {
    manager: Arc<PluginManager>,
    ids: Arc<Mutex<HashSet<String>>>,
    load_calls: Arc<AtomicUsize>,
    pm_calls: Arc<AtomicUsize>,
    _dir: tempfile::TempDir,
}

fn fixture(plugin_ids: &[&str], pm: FakePackageManager, broken: &[&str]) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let ids = Arc::new(Mutex::new(
        plugin_ids.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
    ));

    let mut loader = FakeLoader::new(Arc::clone(&ids));
    for id in broken {
        loader = loader.failing_load(id);
    }
    let load_calls = Arc::clone(&loader.load_calls);
    let pm_calls = Arc::clone(&pm.calls);

    let loader = Arc::new(loader);
    let host = Arc::new(PluginHost::new(loader.clone()));
    let state = Arc::new(
        PluginStateStore::open(dir.path().join("state.yaml")).expect("open state store"),
    );
    let discoverer = Discoverer::new(
        Arc::new(FakeManifest {
            ids: Arc::clone(&ids),
        }),
        loader,
        "/builtin",
    );
    let manager =
        Arc::new(PluginManager::new(host, state, Arc::new(pm), discoverer).expect("manager"));
    manager.discover().expect("initial discover");

    Fixture {
        manager,
        ids,
        load_calls,
        pm_calls,
        _dir: dir,
    }
}

#[tokio::test]
async fn second_disable_is_already_in_state_and_leaves_state_alone() {
    let f = fixture(&["nami-plugin-ping"], FakePackageManager::new(PmBehavior::Succeed), &[]);

    f.manager.disable("nami-plugin-ping").await.unwrap();
    let after_first = f.manager.state().snapshot();

    let second = f.manager.disable("nami-plugin-ping").await;
    assert!(matches!(
        second,
        Err(PluginError::AlreadyInState { state: "disabled", .. })
    ));
    assert_eq!(f.manager.state().snapshot(), after_first);
}

#[tokio::test]
async fn enable_round_trip_restores_state_without_touching_other_ids() {
    let f = fixture(
        &["nami-plugin-ping", "nami-plugin-dice"],
        FakePackageManager::new(PmBehavior::Succeed),
        &[],
    );

    f.manager.disable("nami-plugin-ping").await.unwrap();
    f.manager.enable("nami-plugin-ping").await.unwrap();

    let doc = f.manager.state().snapshot();
    assert_eq!(doc.enabled.get("nami-plugin-ping"), Some(&true));
    // The untouched plugin never gained an entry
    assert!(!doc.enabled.contains_key("nami-plugin-dice"));
    assert!(doc.auto_load.is_empty());
}

#[tokio::test]
async fn enable_of_unknown_id_is_not_found_and_mutates_nothing() {
    let f = fixture(&["nami-plugin-ping"], FakePackageManager::new(PmBehavior::Succeed), &[]);
    let before = f.manager.state().snapshot();

    assert!(matches!(
        f.manager.enable("nami-plugin-ghost").await,
        Err(PluginError::NotFound(_))
    ));
    assert_eq!(f.manager.state().snapshot(), before);
}

#[tokio::test]
async fn disabled_plugin_is_blocked_by_the_policy_hook() {
    let f = fixture(&["nami-plugin-ping"], FakePackageManager::new(PmBehavior::Succeed), &[]);

    f.manager.load("nami-plugin-ping").unwrap();
    assert!(f.manager.host().is_loaded("nami-plugin-ping"));

    let outcome = f.manager.disable("nami-plugin-ping").await.unwrap();
    assert!(outcome.unload_error.is_none());
    assert!(!f.manager.host().is_loaded("nami-plugin-ping"));

    let blocked = f.manager.load("nami-plugin-ping");
    match blocked {
        Err(PluginError::HookRejected { hook, .. }) => assert_eq!(hook, "plugin_state"),
        other => panic!("expected hook rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn unloading_an_unloaded_plugin_is_a_no_op_success() {
    let f = fixture(&["nami-plugin-ping"], FakePackageManager::new(PmBehavior::Succeed), &[]);
    assert!(f.manager.unload("nami-plugin-ping").is_ok());
}

#[tokio::test]
async fn failed_install_spawn_mutates_nothing_and_never_loads() {
    let f = fixture(&["nami-plugin-ping"], FakePackageManager::new(PmBehavior::SpawnFail), &[]);
    let before = f.manager.state().snapshot();

    let result = f.manager.install("nami-plugin-new").await;
    assert!(matches!(result, Err(PluginError::SpawnFailed(_))));
    assert_eq!(f.manager.state().snapshot(), before);
    assert_eq!(f.load_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_install_exit_code_reports_stderr_and_mutates_nothing() {
    let f = fixture(&["nami-plugin-ping"], FakePackageManager::new(PmBehavior::ExitWith(1)), &[]);
    let before = f.manager.state().snapshot();

    match f.manager.install("nami-plugin-new").await {
        Err(PluginError::PackageManagerFailed { code, stderr }) => {
            assert_eq!(code, 1);
            assert!(stderr.contains("cannot resolve"));
        }
        other => panic!("expected package manager failure, got {:?}", other),
    }
    assert_eq!(f.manager.state().snapshot(), before);
}

#[tokio::test]
async fn successful_install_persists_autoload_loads_and_refreshes() {
    let f = fixture(&["nami-plugin-ping"], FakePackageManager::new(PmBehavior::Succeed), &[]);

    // The package manager makes the new package appear on disk
    f.ids.lock().unwrap().insert("nami-plugin-new".to_string());

    let outcome = f.manager.install("nami-plugin-new").await.unwrap();
    assert!(outcome.load_error.is_none());
    assert!(f.manager.state().auto_load("nami-plugin-new"));
    assert!(f.manager.host().is_loaded("nami-plugin-new"));
    // Visible after the refresh install itself ran
    assert!(f.manager.load("nami-plugin-new").is_ok());
}

#[tokio::test]
async fn uninstall_removes_persisted_keys_and_unloads() {
    let f = fixture(&["nami-plugin-ping"], FakePackageManager::new(PmBehavior::Succeed), &[]);

    f.manager.load("nami-plugin-ping").unwrap();
    f.manager.set_auto_load("nami-plugin-ping", true).await.unwrap();

    f.manager.uninstall("nami-plugin-ping").await.unwrap();

    let doc = f.manager.state().snapshot();
    assert!(!doc.enabled.contains_key("nami-plugin-ping"));
    assert!(!doc.auto_load.contains_key("nami-plugin-ping"));
    assert!(!f.manager.host().is_loaded("nami-plugin-ping"));
}

#[tokio::test]
async fn failed_uninstall_leaves_persisted_state_untouched() {
    let f = fixture(&["nami-plugin-ping"], FakePackageManager::new(PmBehavior::ExitWith(2)), &[]);
    f.manager.set_auto_load("nami-plugin-ping", true).await.unwrap();
    let before = f.manager.state().snapshot();

    assert!(f.manager.uninstall("nami-plugin-ping").await.is_err());
    assert_eq!(f.manager.state().snapshot(), before);
}

#[tokio::test]
async fn concurrent_installs_spawn_exactly_one_subprocess() {
    let f = fixture(
        &["nami-plugin-ping"],
        FakePackageManager::new(PmBehavior::Succeed).with_delay(100),
        &[],
    );

    let m1 = Arc::clone(&f.manager);
    let m2 = Arc::clone(&f.manager);
    let first = tokio::spawn(async move { m1.install("nami-plugin-x").await });
    // Give the first call time to take the busy flag
    tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    let second = tokio::spawn(async move { m2.install("nami-plugin-x").await });

    let second = second.await.unwrap();
    assert!(matches!(second, Err(PluginError::Busy(_))));

    let _ = first.await.unwrap();
    assert_eq!(f.pm_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn list_never_observes_a_partially_built_registry() {
    let f = fixture(
        &["nami-plugin-a", "nami-plugin-b", "nami-plugin-c"],
        FakePackageManager::new(PmBehavior::Succeed),
        &[],
    );

    let discoverer = Arc::clone(&f.manager);
    let refresher = tokio::spawn(async move {
        for _ in 0..50 {
            discoverer.discover().unwrap();
            tokio::task::yield_now().await;
        }
    });

    for _ in 0..200 {
        let listed = f.manager.list(false).unwrap();
        // Either snapshot is fine; a mix or a transient empty one is not
        assert_eq!(listed.len(), 3);
        tokio::task::yield_now().await;
    }

    refresher.await.unwrap();
}

#[tokio::test]
async fn discovery_skips_broken_candidates_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let ids: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(
        ["nami-plugin-good", "nami-plugin-probe-fails"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    ));

    // The loader only answers probes for the good one
    struct HalfLoader {
        inner: FakeLoader,
    }
    impl ModuleLoader for HalfLoader {
        fn probe(&self, id: &str) -> Result<PluginMetadata, PluginError> {
            if id.ends_with("probe-fails") {
                Err(PluginError::Load("corrupt manifest".to_string()))
            } else {
                self.inner.probe(id)
            }
        }
        fn source(&self, id: &str) -> Option<PathBuf> {
            self.inner.source(id)
        }
        fn load(&self, id: &str) -> Result<LoadedModule, PluginError> {
            self.inner.load(id)
        }
    }

    let loader = Arc::new(HalfLoader {
        inner: FakeLoader::new(Arc::clone(&ids)),
    });
    let host = Arc::new(PluginHost::new(loader.clone()));
    let state = Arc::new(PluginStateStore::open(dir.path().join("state.yaml")).unwrap());
    let discoverer = Discoverer::new(Arc::new(FakeManifest { ids }), loader, "/builtin");
    let manager = PluginManager::new(
        host,
        state,
        Arc::new(FakePackageManager::new(PmBehavior::Succeed)),
        discoverer,
    )
    .unwrap();

    assert_eq!(manager.discover().unwrap(), 1);
    assert!(manager.load("nami-plugin-good").is_ok());
    assert!(matches!(
        manager.load("nami-plugin-probe-fails"),
        Err(PluginError::NotFound(_))
    ));
}

#[tokio::test]
async fn autoload_failures_do_not_stop_other_plugins() {
    let f = fixture(
        &["nami-plugin-good", "nami-plugin-broken"],
        FakePackageManager::new(PmBehavior::Succeed),
        &["nami-plugin-broken"],
    );

    f.manager.set_auto_load("nami-plugin-good", true).await.unwrap();
    f.manager.set_auto_load("nami-plugin-broken", true).await.unwrap();

    let loaded = f.manager.autoload_all().await;
    assert_eq!(loaded, 1);
    assert!(f.manager.host().is_loaded("nami-plugin-good"));
    assert!(!f.manager.host().is_loaded("nami-plugin-broken"));
}

struct RecordingSink {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send(&self, text: &str) -> Result<(), BotError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn plugin_command_replies_with_status_text() {
    let f = fixture(&["nami-plugin-ping"], FakePackageManager::new(PmBehavior::Succeed), &[]);

    let mut service = CommandService::new("/");
    register_plugin_commands(&mut service, Arc::clone(&f.manager));

    let sink = Arc::new(RecordingSink {
        sent: Mutex::new(Vec::new()),
    });

    let msg = Message::from_command(
        "chat-1",
        "plugin",
        vec!["disable".to_string(), "nami-plugin-ping".to_string()],
    )
    .with_sender(User::new("admin"));
    service.handle(&msg, sink.clone()).await.unwrap();

    let msg = Message::from_command("chat-1", "plugins", vec!["-r".to_string()])
        .with_sender(User::new("admin"));
    service.handle(&msg, sink.clone()).await.unwrap();

    let sent = sink.sent.lock().unwrap();
    assert_eq!(sent[0], "Plugin nami-plugin-ping disabled and unloaded");
    assert!(sent[1].contains("1 plugins known (refreshed)"));
    assert!(sent[1].contains("enabled: no"));
}
