use cuekit_core::builtin::{
    self, GermanLanguage, GlossaryBackend, GlossaryEntry, GlossaryExtension, Translator,
    BASIC_QA_ID, CSV_EXPORT_ID, GERMAN_LANGUAGE_ID, GLOSSARY_ID, TRANSLATOR_ID,
};
use cuekit_core::{
    Capability, Cue, ExportOptions, ExportRunError, ExtensionHost, HostConfig, HostEvent,
    HostEventKind, LanguageRegistration, LocaleCatalog, MemorySettingsStore, Project,
    RegistryError, Severity,
};
use serde_json::json;
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

fn host_with_builtins() -> ExtensionHost {
    let mut host = ExtensionHost::new(
        HostConfig::default(),
        builtin::catalog(),
        Box::new(MemorySettingsStore::new()),
    );
    for extension in builtin::extensions() {
        host.install(extension, true).expect("install builtin");
    }
    host
}

fn sample_project() -> Project {
    let mut project = Project::new("Pilot");
    project.cues.push(
        Cue::new(1, 1_000, 2_500, "Hello there")
            .with_translation("Szia")
            .with_character("ANNA"),
    );
    project.cues.push(Cue::new(2, 3_000, 4_000, "Where; now?"));
    project
}

#[test]
fn builtins_register_with_their_roles() {
    let host = host_with_builtins();
    let registry = host.registry();

    assert_eq!(registry.len(), 5);
    assert_eq!(registry.export_extensions(true).len(), 1);
    assert_eq!(registry.qa_extensions(true).len(), 1);
    assert_eq!(registry.ui_extensions(true).len(), 4);
    assert_eq!(registry.language_extensions(true).len(), 1);
    assert_eq!(registry.translation_extensions(true).len(), 1);
    assert_eq!(registry.service_extensions(true).len(), 1);
    assert!(registry.get(GERMAN_LANGUAGE_ID).is_some());

    let translator = host.context(TRANSLATOR_ID).expect("translator context");
    assert!(translator.is_granted(Capability::Network));
    let glossary = host.context(GLOSSARY_ID).expect("glossary context");
    assert!(glossary.is_granted(Capability::ShowUi));
    assert!(!glossary.is_granted(Capability::Network));
}

#[test]
fn csv_export_writes_bom_header_and_quoted_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("pilot.csv");
    let mut host = host_with_builtins();
    host.open_project(sample_project().into_shared());

    host.run_export(CSV_EXPORT_ID, &output, &ExportOptions::new())
        .expect("export");

    let bytes = fs::read(&output).expect("read export");
    assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
    let text = String::from_utf8(bytes[3..].to_vec()).expect("utf8");
    let lines: Vec<&str> = text.split("\r\n").collect();
    assert_eq!(
        lines[0],
        "#;Start;End;Character;Source;Translation;Notes;SFX"
    );
    assert_eq!(
        lines[1],
        "1;00:00:01,000;00:00:02,500;ANNA;Hello there;Szia;;"
    );
    assert_eq!(lines[2], "2;00:00:03,000;00:00:04,000;;\"Where; now?\";;;");
    assert_eq!(lines[3], "");
}

#[test]
fn csv_export_honours_option_overrides() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("slim.csv");
    let mut host = host_with_builtins();
    host.open_project(sample_project().into_shared());

    let options = json!({
        "delimiter": ",",
        "include_timecodes": false,
        "include_notes": false,
        "include_sfx": false,
    });
    let options = options.as_object().expect("object").clone();
    host.run_export(CSV_EXPORT_ID, &output, &options)
        .expect("export");

    let text = fs::read_to_string(&output).expect("read export");
    let text = text.trim_start_matches('\u{feff}');
    assert!(text.starts_with("#,Character,Source,Translation\r\n"));
    assert!(text.contains("2,,Where; now?,\r\n"));
}

#[test]
fn run_export_reports_why_it_could_not_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("never.csv");
    let mut host = host_with_builtins();
    let options = ExportOptions::new();

    assert_eq!(
        host.run_export(CSV_EXPORT_ID, &output, &options),
        Err(ExportRunError::NoProject)
    );

    host.open_project(sample_project().into_shared());
    assert_eq!(
        host.run_export("missing.ext", &output, &options),
        Err(ExportRunError::UnknownExtension("missing.ext".to_string()))
    );
    assert_eq!(
        host.run_export(BASIC_QA_ID, &output, &options),
        Err(ExportRunError::NotAnExporter(BASIC_QA_ID.to_string()))
    );
    host.disable(CSV_EXPORT_ID);
    assert_eq!(
        host.run_export(CSV_EXPORT_ID, &output, &options),
        Err(ExportRunError::Disabled(CSV_EXPORT_ID.to_string()))
    );
    let bad = json!({"delimiter": ";;"}).as_object().expect("object").clone();
    host.enable(CSV_EXPORT_ID).expect("enable");
    assert!(matches!(
        host.run_export(CSV_EXPORT_ID, &output, &bad),
        Err(ExportRunError::Failed(_))
    ));
}

#[test]
fn export_events_bracket_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("events.csv");
    let mut host = host_with_builtins();
    host.open_project(sample_project().into_shared());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let context = host.context(CSV_EXPORT_ID).expect("context");
    for kind in [HostEventKind::ExportStarted, HostEventKind::ExportFinished] {
        let seen = seen.clone();
        context.subscribe(
            kind,
            Rc::new(move |event: &HostEvent| {
                let label = match event {
                    HostEvent::ExportFinished { success, .. } => format!("finished:{success}"),
                    other => other.kind().as_str().to_string(),
                };
                seen.borrow_mut().push(label);
                Ok(())
            }),
        );
    }

    host.run_export(CSV_EXPORT_ID, &output, &ExportOptions::new())
        .expect("export");
    assert_eq!(seen.borrow().len(), 2);
    assert_eq!(seen.borrow()[1], "finished:true");
    assert!(context
        .journal()
        .iter()
        .any(|entry| entry.message.starts_with("exported 2 cues")));
}

#[test]
fn run_qa_reports_issues_from_basic_checks() {
    let mut host = host_with_builtins();
    assert!(host.run_qa().is_empty());

    let mut project = sample_project();
    project.cues[0].lip_sync_ratio = Some(1.2);
    host.open_project(project.into_shared());

    let reports = host.run_qa();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].extension_id, BASIC_QA_ID);
    let issues: Vec<(i64, Severity)> = reports[0]
        .issues
        .iter()
        .map(|issue| (issue.cue_id, issue.severity))
        .collect();
    assert_eq!(issues, vec![(1, Severity::Error), (2, Severity::Warning)]);
    assert_eq!(reports[0].issues[0].message, "Text too long (lip-sync: 120%)");
}

#[test]
fn disabled_qa_extension_is_not_run() {
    let mut host = host_with_builtins();
    host.open_project(sample_project().into_shared());
    host.disable(BASIC_QA_ID);
    assert!(host.run_qa().is_empty());
}

#[test]
fn ui_contributions_cover_enabled_ui_extensions() {
    let host = host_with_builtins();
    let contributions = host.ui_contributions();

    let ids: Vec<&str> = contributions
        .iter()
        .map(|contribution| contribution.extension_id.as_str())
        .collect();
    assert_eq!(ids, vec![CSV_EXPORT_ID, BASIC_QA_ID, GLOSSARY_ID, TRANSLATOR_ID]);
    assert!(contributions[0].dock_panel.is_none());
    assert_eq!(contributions[0].menu_items[0].id, "csv_export.run");
    assert_eq!(
        contributions[1].dock_panel.as_ref().map(|panel| panel.id.as_str()),
        Some("qaCheckDock")
    );
    assert_eq!(contributions[1].menu_items.len(), 2);
    assert_eq!(
        contributions[2].dock_panel.as_ref().map(|panel| panel.id.as_str()),
        Some("glossaryDock")
    );
    assert_eq!(
        contributions[3].dock_panel.as_ref().map(|panel| panel.id.as_str()),
        Some("translatorDock")
    );
}

#[test]
fn german_language_pack_registers_and_switches() {
    let mut host = host_with_builtins();
    let codes: Vec<String> = host
        .localization()
        .borrow()
        .available_languages()
        .into_iter()
        .map(|language| language.code)
        .collect();
    assert!(codes.contains(&"de".to_string()));

    let context = host.context(GERMAN_LANGUAGE_ID).expect("context");
    let changed = Rc::new(RefCell::new(None));
    let sink = changed.clone();
    context.subscribe(
        HostEventKind::LanguageChanged,
        Rc::new(move |event: &HostEvent| {
            if let HostEvent::LanguageChanged { code } = event {
                *sink.borrow_mut() = Some(code.clone());
            }
            Ok(())
        }),
    );

    assert_eq!(context.tr("menu.file"), "menu.file");
    assert!(host.set_language("de"));
    assert_eq!(changed.borrow().as_deref(), Some("de"));
    assert_eq!(context.app_language(), "de");
    assert_eq!(
        host.localization().borrow().text("menu.file").as_deref(),
        Some("Datei")
    );
    assert_eq!(context.tr("status.ready"), "Bereit");
    assert_eq!(
        context.tr_with("status.exported", &[("count", "12")]),
        "12 Cues exportiert"
    );
    assert!(!host.set_language("xx"));
}

#[test]
fn german_pack_is_rejected_when_the_language_already_exists() {
    let localization = LocaleCatalog::shared();
    assert!(localization
        .borrow_mut()
        .register_language(LanguageRegistration::new("de", "Deutsch")));
    let mut host = ExtensionHost::with_localization(
        HostConfig::default(),
        builtin::catalog(),
        Box::new(MemorySettingsStore::new()),
        localization,
    );

    let err = host
        .install(Box::new(GermanLanguage::new()), true)
        .expect_err("second de registration");
    assert!(matches!(
        err,
        RegistryError::InitializationRejected { ref id, ref reason }
            if id == GERMAN_LANGUAGE_ID && reason.contains("already registered")
    ));
    assert!(host.context(GERMAN_LANGUAGE_ID).is_none());
}

fn host_with_glossary_translator() -> (ExtensionHost, builtin::SharedGlossary) {
    let mut host = ExtensionHost::new(
        HostConfig::default(),
        builtin::catalog(),
        Box::new(MemorySettingsStore::new()),
    );
    let glossary = GlossaryExtension::new();
    let shared = glossary.glossary();
    let translator = Translator::with_backend(Box::new(GlossaryBackend::new(shared.clone())));
    host.install(Box::new(glossary), true)
        .expect("install glossary");
    host.install(Box::new(translator), true)
        .expect("install translator");
    (host, shared)
}

#[test]
fn glossary_announces_terms_of_the_selected_cue() {
    let (mut host, glossary) = host_with_glossary_translator();
    glossary
        .borrow_mut()
        .upsert(GlossaryEntry::new("hello", "szia").with_notes("informal"));
    host.open_project(sample_project().into_shared());

    host.select_cue(1);

    let context = host.context(GLOSSARY_ID).expect("context");
    let journal = context.journal();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].message, "[STATUS] Glossary: hello → szia");
}

#[test]
fn glossary_survives_uninstall_and_reinstall() {
    let (mut host, glossary) = host_with_glossary_translator();
    glossary
        .borrow_mut()
        .upsert(GlossaryEntry::new("Captain", "Kapitány"));

    host.uninstall(GLOSSARY_ID).expect("uninstall");
    let restored = GlossaryExtension::new();
    let handle = restored.glossary();
    host.install(Box::new(restored), true)
        .expect("reinstall glossary");

    assert_eq!(handle.borrow().find_translation("captain"), Some("Kapitány"));
}

#[test]
fn translator_serves_translations_from_the_glossary() {
    let (mut host, glossary) = host_with_glossary_translator();
    glossary
        .borrow_mut()
        .upsert(GlossaryEntry::new("Hello there", "Szia"));

    {
        let registry = host.registry();
        let service = registry.service_extensions(true)[0];
        assert_eq!(service.service_name(), "translator_builtin.translator");
        assert_eq!(service.status(), "OK");
        let translation = registry.translation_extensions(true)[0];
        assert_eq!(
            translation
                .translate("hello there", "en", "hu")
                .expect("translate"),
            "Szia"
        );
        assert_eq!(translation.supported_languages().len(), 2);
    }

    host.open_project(sample_project().into_shared());
    host.select_cue(2);
    let context = host.context(TRANSLATOR_ID).expect("context");
    assert!(context
        .journal()
        .iter()
        .any(|entry| entry.message.starts_with("cue 2: no glossary entry")));
}

#[test]
fn catalog_translator_without_backend_reports_unavailable() {
    let mut host = ExtensionHost::new(
        HostConfig::default(),
        builtin::catalog(),
        Box::new(MemorySettingsStore::new()),
    );
    host.install(Box::new(Translator::new()), true)
        .expect("install translator");

    let registry = host.registry();
    let service = registry.service_extensions(false)[0];
    assert!(!service.is_available());
    assert_eq!(service.status(), "Unavailable");
    assert!(registry.translation_extensions(false)[0]
        .translate("text", "en", "hu")
        .is_err());
}

#[test]
fn csv_settings_round_trip_through_the_host() {
    let mut host = ExtensionHost::new(
        HostConfig::default(),
        builtin::catalog(),
        Box::new(
            MemorySettingsStore::new().with_settings(CSV_EXPORT_ID, json!({"delimiter": "\t"})),
        ),
    );
    host.install(Box::new(builtin::CsvExport::new()), true)
        .expect("install csv");

    let entry = host.registry().get(CSV_EXPORT_ID).expect("entry");
    assert_eq!(entry.extension().save_settings().expect("settings")["delimiter"], "\t");
    assert_eq!(
        host.long_description(CSV_EXPORT_ID).as_deref(),
        Some("Export cues to CSV")
    );
}
