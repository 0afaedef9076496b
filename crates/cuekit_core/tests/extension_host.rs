use cuekit_core::extension::loader::discover;
use cuekit_core::{
    Capability, Descriptor, Extension, ExtensionCatalog, ExtensionError, ExtensionHost,
    ExtensionLocation, HostConfig, HostEvent, HostEventKind, InitEnv, LocationKind,
    MemorySettingsStore, Project, RegistryError, SqliteSettingsStore,
};
use serde_json::{json, Value};
use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

#[derive(Default)]
struct Lifecycle {
    initialized: Cell<u32>,
    shut_down: Cell<u32>,
}

struct Plain {
    descriptor: Descriptor,
    fail_init: bool,
    saved: Option<Value>,
    lifecycle: Rc<Lifecycle>,
}

impl Plain {
    fn new(id: &str) -> Self {
        Self {
            descriptor: Descriptor::new(id, id, "1.0.0"),
            fail_init: false,
            saved: None,
            lifecycle: Rc::default(),
        }
    }
}

impl Extension for Plain {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn initialize(&mut self, _env: &InitEnv<'_>) -> Result<(), ExtensionError> {
        if self.fail_init {
            return Err(ExtensionError::new("dependency missing"));
        }
        self.lifecycle
            .initialized
            .set(self.lifecycle.initialized.get() + 1);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.lifecycle.shut_down.set(self.lifecycle.shut_down.get() + 1);
    }

    fn save_settings(&self) -> Option<Value> {
        self.saved.clone()
    }
}

fn good_one() -> Box<dyn Extension> {
    Box::new(Plain::new("good.one"))
}

fn good_two() -> Box<dyn Extension> {
    Box::new(Plain::new("good.two"))
}

fn broken() -> Box<dyn Extension> {
    let mut extension = Plain::new("broken.init");
    extension.fail_init = true;
    Box::new(extension)
}

fn exploding() -> Box<dyn Extension> {
    panic!("constructor blew up")
}

fn future_api() -> Box<dyn Extension> {
    let mut extension = Plain::new("future.api");
    extension.descriptor = extension.descriptor.with_api_version(5);
    Box::new(extension)
}

fn legacy_api() -> Box<dyn Extension> {
    let mut extension = Plain::new("legacy.api");
    extension.descriptor = extension.descriptor.with_api_version(1);
    Box::new(extension)
}

fn packaged() -> Box<dyn Extension> {
    Box::new(Plain::new("packaged.ext"))
}

fn catalog() -> ExtensionCatalog {
    ExtensionCatalog::new()
        .with_export("good_one", "Extension", good_one)
        .with_export("good_two", "Extension", good_two)
        .with_export("broken", "Extension", broken)
        .with_export("exploding", "Extension", exploding)
        .with_export("future_api", "Extension", future_api)
        .with_export("legacy_api", "Extension", legacy_api)
        .with_export("pkg_ext", "Extension", packaged)
}

fn write_unit(dir: &Path, file: &str, unit: &str) {
    let manifest = json!({"unit": unit, "exports": ["Extension"]});
    fs::write(dir.join(file), manifest.to_string()).expect("write manifest");
}

fn config_for(dir: &Path) -> HostConfig {
    HostConfig {
        locations: vec![ExtensionLocation::new(LocationKind::External, dir)],
        ..HostConfig::default()
    }
}

fn host_for(dir: &Path, store: MemorySettingsStore) -> ExtensionHost {
    ExtensionHost::new(config_for(dir), catalog(), Box::new(store))
}

#[test]
fn failing_candidates_are_skipped_and_the_rest_still_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_unit(dir.path(), "a_good.json", "good_one");
    write_unit(dir.path(), "b_broken.json", "broken");
    write_unit(dir.path(), "c_exploding.json", "exploding");
    write_unit(dir.path(), "d_good.json", "good_two");

    let mut host = host_for(dir.path(), MemorySettingsStore::new());
    let loaded = host.load_all();

    assert_eq!(loaded, 2);
    assert_eq!(host.registry().ids(), ["good.one", "good.two"]);
    assert!(host.context("broken.init").is_none());
    assert_eq!(host.contexts().len(), 2);
}

#[test]
fn api_gate_refuses_newer_and_tolerates_older_descriptors() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_unit(dir.path(), "future.json", "future_api");
    write_unit(dir.path(), "legacy.json", "legacy_api");

    let config = HostConfig {
        api_version: 3,
        api_version_min: 2,
        ..config_for(dir.path())
    };
    let mut host = ExtensionHost::new(config, catalog(), Box::new(MemorySettingsStore::new()));

    assert_eq!(host.load_all(), 1);
    assert!(host.registry().contains("legacy.api"));
    assert!(!host.registry().contains("future.api"));
}

#[test]
fn unknown_units_and_bad_manifests_do_not_stop_discovery() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("a_garbage.json"), "{ not json").expect("write garbage");
    write_unit(dir.path(), "b_unknown.json", "not_in_catalog");
    write_unit(dir.path(), "c_good.json", "good_one");

    let mut host = host_for(dir.path(), MemorySettingsStore::new());
    assert_eq!(host.load_all(), 1);
    assert!(host.registry().contains("good.one"));
}

#[test]
fn discovery_skips_hidden_and_underscore_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_unit(dir.path(), "_draft.json", "good_one");
    write_unit(dir.path(), ".hidden.json", "good_one");
    write_unit(dir.path(), "visible.json", "good_one");
    let package = dir.path().join("_private_pkg");
    fs::create_dir_all(&package).expect("create package");
    write_unit(&package, "extension.json", "good_two");
    fs::create_dir_all(dir.path().join("no_manifest")).expect("create empty dir");

    let location = ExtensionLocation::new(LocationKind::User, dir.path());
    let candidates = discover(&[location]);

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].default_unit, "visible");
}

#[test]
fn package_locales_and_manifest_capabilities_reach_the_context() {
    let dir = tempfile::tempdir().expect("tempdir");
    let package = dir.path().join("pkg_ext");
    fs::create_dir_all(package.join("locales")).expect("create package");
    fs::write(
        package.join("extension.json"),
        json!({"exports": ["Extension"], "capabilities": ["network"]}).to_string(),
    )
    .expect("write manifest");
    fs::write(
        package.join("locales").join("en.json"),
        json!({"greeting": {"hello": "Hello from the package"}}).to_string(),
    )
    .expect("write locale");

    let mut host = host_for(dir.path(), MemorySettingsStore::new());
    assert_eq!(host.load_all(), 1);

    let context = host.context("packaged.ext").expect("context");
    assert_eq!(context.tr("greeting.hello"), "Hello from the package");
    assert_eq!(context.tr("greeting.missing"), "greeting.missing");
    assert!(context.is_granted(Capability::Network));
    assert!(!context.is_granted(Capability::ShowUi));
    assert_eq!(
        host.registry()
            .get("packaged.ext")
            .and_then(|entry| entry.resource_root()),
        Some(package.as_path())
    );
}

#[test]
fn persisted_enabled_ids_decide_enablement_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_unit(dir.path(), "a.json", "good_one");
    write_unit(dir.path(), "b.json", "good_two");

    let store = MemorySettingsStore::new().with_enabled(["good.two", "not.loaded"]);
    let mut host = host_for(dir.path(), store);
    host.load_all();

    assert!(!host.registry().is_enabled("good.one"));
    assert!(host.registry().is_enabled("good.two"));
    assert!(host.is_persisted_enabled("not.loaded"));
}

#[test]
fn settings_survive_a_restart_through_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("state").join("settings.db");

    {
        let store = SqliteSettingsStore::open(&db_path).expect("open store");
        let mut host =
            ExtensionHost::new(HostConfig::default(), catalog(), Box::new(store));
        let mut extension = Plain::new("persisted.ext");
        extension.saved = Some(json!({"volume": 3}));
        host.install(Box::new(extension), false)
            .expect("install persisted.ext");
        host.enable("persisted.ext").expect("enable");
        let context = host.context("persisted.ext").expect("context");
        assert!(context.set_setting("theme", json!("dark")));

        assert!(host.teardown());
        assert!(!host.teardown());
        assert!(host.registry().is_empty());
    }

    let store = SqliteSettingsStore::open(&db_path).expect("reopen store");
    let mut host = ExtensionHost::new(HostConfig::default(), catalog(), Box::new(store));
    assert!(host.is_persisted_enabled("persisted.ext"));
    assert_eq!(
        host.registry().settings("persisted.ext"),
        Some(&json!({"theme": "dark", "volume": 3}))
    );

    host.install(Box::new(Plain::new("persisted.ext")), true)
        .expect("reinstall");
    let context = host.context("persisted.ext").expect("context");
    assert_eq!(context.setting("theme"), Some(json!("dark")));
    assert_eq!(context.setting("volume"), Some(json!(3)));
}

#[test]
fn uninstall_keeps_settings_and_drops_the_context() {
    let mut host = ExtensionHost::new(
        HostConfig::default(),
        catalog(),
        Box::new(MemorySettingsStore::new()),
    );
    host.install(Box::new(Plain::new("leaving")), true)
        .expect("install leaving");
    let context = host.context("leaving").expect("context");
    context.set_setting("answer", json!(42));

    host.uninstall("leaving").expect("uninstall");

    assert!(host.context("leaving").is_none());
    assert!(!host.registry().contains("leaving"));
    assert_eq!(
        host.registry().settings("leaving"),
        Some(&json!({"answer": 42}))
    );
    assert_eq!(
        host.uninstall("leaving"),
        Err(RegistryError::UnknownId("leaving".to_string()))
    );
}

#[test]
fn rejected_install_creates_no_context() {
    let mut host = ExtensionHost::new(
        HostConfig::default(),
        catalog(),
        Box::new(MemorySettingsStore::new()),
    );
    let err = host.install(broken(), true).expect_err("initialize fails");
    assert!(matches!(err, RegistryError::InitializationRejected { .. }));
    assert!(host.contexts().is_empty());
}

#[test]
fn project_lifecycle_events_reach_subscribers() {
    let mut host = ExtensionHost::new(
        HostConfig::default(),
        catalog(),
        Box::new(MemorySettingsStore::new()),
    );
    host.install(good_one(), true).expect("install");
    let context = host.context("good.one").expect("context");
    let opened = Rc::new(Cell::new(0));
    let counter = opened.clone();
    context.subscribe(
        HostEventKind::ProjectOpened,
        Rc::new(move |event: &HostEvent| {
            if let HostEvent::ProjectOpened { title, .. } = event {
                assert_eq!(title, "Episode 1");
                counter.set(counter.get() + 1);
            }
            Ok(())
        }),
    );

    let report = host.open_project(Project::new("Episode 1").into_shared());
    assert_eq!(report.invoked, 1);
    assert_eq!(opened.get(), 1);
    assert_eq!(context.project_title().as_deref(), Some("Episode 1"));

    host.close_project();
    assert!(!context.has_project());
}

#[test]
fn load_all_keeps_settings_collected_since_the_last_save() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = MemorySettingsStore::new().with_settings("kept.ext", json!({"k": 1}));
    let mut host = host_for(dir.path(), store);
    host.install(Box::new(Plain::new("kept.ext")), true)
        .expect("install kept.ext");
    let context = host.context("kept.ext").expect("context");
    assert_eq!(context.setting("k"), Some(json!(1)));
    assert!(context.set_setting("k", json!(2)));

    host.uninstall("kept.ext").expect("uninstall");
    assert_eq!(host.registry().settings("kept.ext"), Some(&json!({"k": 2})));

    host.load_all();
    assert_eq!(host.registry().settings("kept.ext"), Some(&json!({"k": 2})));

    host.install(Box::new(Plain::new("kept.ext")), true)
        .expect("reinstall kept.ext");
    let context = host.context("kept.ext").expect("context");
    assert_eq!(context.setting("k"), Some(json!(2)));
}

#[test]
fn teardown_then_drop_shuts_each_extension_down_once() {
    let lifecycle = Rc::new(Lifecycle::default());
    {
        let mut host = ExtensionHost::new(
            HostConfig::default(),
            catalog(),
            Box::new(MemorySettingsStore::new()),
        );
        let mut extension = Plain::new("counted.ext");
        extension.lifecycle = lifecycle.clone();
        host.install(Box::new(extension), false)
            .expect("install counted.ext");

        let mut duplicate = Plain::new("counted.ext");
        duplicate.lifecycle = lifecycle.clone();
        host.install(Box::new(duplicate), true)
            .expect_err("duplicate install");
        host.enable("counted.ext").expect("enable");
        assert!(host.disable("counted.ext"));
        assert_eq!(lifecycle.initialized.get(), 1);
        assert_eq!(lifecycle.shut_down.get(), 0);

        assert!(host.teardown());
        assert_eq!(lifecycle.shut_down.get(), 1);
    }
    assert_eq!(lifecycle.initialized.get(), 1);
    assert_eq!(lifecycle.shut_down.get(), 1);
}

#[test]
fn dropping_a_live_host_shuts_extensions_down() {
    let lifecycle = Rc::new(Lifecycle::default());
    {
        let mut host = ExtensionHost::new(
            HostConfig::default(),
            catalog(),
            Box::new(MemorySettingsStore::new()),
        );
        let mut extension = Plain::new("dropped.ext");
        extension.lifecycle = lifecycle.clone();
        host.install(Box::new(extension), true)
            .expect("install dropped.ext");
    }
    assert_eq!(lifecycle.shut_down.get(), 1);
}

#[test]
fn inverted_api_range_is_clamped_to_the_current_version() {
    let config = HostConfig {
        api_version: 3,
        api_version_min: 5,
        ..HostConfig::default()
    };
    let mut host = ExtensionHost::new(config, catalog(), Box::new(MemorySettingsStore::new()));
    assert_eq!(host.config().api_version_min, 3);

    host.install(good_one(), true).expect("install");
    let context = host.context("good.one").expect("context");
    assert!(context.is_compatible(3));
    assert!(!context.is_compatible(2));
}

#[test]
fn unreadable_locations_yield_no_candidates() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_unit(dir.path(), "good.json", "good_one");
    let missing = ExtensionLocation::new(LocationKind::External, dir.path().join("absent"));
    let present = ExtensionLocation::new(LocationKind::User, dir.path());

    let candidates = discover(&[missing, present]);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].default_unit, "good");
}
