mod common;

use std::sync::Arc;

use assert_matches::assert_matches;

use rdl_migrator::app::{App, UploadOptions};
use rdl_migrator::domain::{CatalogPath, ItemType, ReportDocument};
use rdl_migrator::error::MigrateError;
use rdl_migrator::events::{MemorySink, NoopSink, Outcome};

use common::{DeadServer, FakeCatalog};

fn path(value: &str) -> CatalogPath {
    value.parse().unwrap()
}

fn sample_catalog() -> FakeCatalog {
    FakeCatalog::new()
        .with_folder("/Finance")
        .with_report("/Finance/Monthly", b"<Report>monthly</Report>")
        .with_report("/Finance/Quarterly", b"<Report>quarterly</Report>")
        .with_folder("/Finance/Archive")
        .with_report("/Finance/Archive/Old", b"<Report>old</Report>")
        .with_data_source("/Finance/Archive/Legacy")
        .with_data_source("/Shared/Warehouse")
}

#[test]
fn list_children_immediate() {
    let catalog = sample_catalog();
    let app = App::new(&catalog, Arc::new(NoopSink));
    let items = app.list_children(&path("/Finance"), false).unwrap();

    assert_eq!(items.len(), 3);
    let reports = items.iter().filter(|i| i.item_type == ItemType::Report).count();
    let folders = items.iter().filter(|i| i.item_type == ItemType::Folder).count();
    assert_eq!((reports, folders), (2, 1));
    let archive = items.iter().find(|i| i.name == "Archive").unwrap();
    assert_eq!(archive.path, "/Finance/Archive");
}

#[test]
fn list_children_recursive_includes_nested() {
    let catalog = sample_catalog();
    let app = App::new(&catalog, Arc::new(NoopSink));
    let items = app.list_children(&path("/Finance"), true).unwrap();

    assert_eq!(items.len(), 5);
    assert!(items.iter().any(|i| i.path == "/Finance/Archive/Old"));
    assert_eq!(catalog.operations(), vec!["ListChildren"]);
}

#[test]
fn data_sources_are_found_anywhere() {
    let catalog = sample_catalog();
    let app = App::new(&catalog, Arc::new(NoopSink));
    let sources = app.list_data_sources(&CatalogPath::root()).unwrap();
    let paths: Vec<_> = sources.iter().map(|s| s.path.as_str()).collect();
    assert_eq!(paths, vec!["/Finance/Archive/Legacy", "/Shared/Warehouse"]);
}

#[test]
fn list_reports_is_not_recursive() {
    let catalog = sample_catalog();
    let app = App::new(&catalog, Arc::new(NoopSink));
    let reports = app.list_reports(&path("/Finance")).unwrap();
    let names: Vec<_> = reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Monthly", "Quarterly"]);
}

#[test]
fn metadata_uses_single_listing() {
    let catalog = sample_catalog();
    let app = App::new(&catalog, Arc::new(NoopSink));
    let reports = app.report_metadata(&path("/Finance")).unwrap();

    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.is_report()));
    assert_eq!(reports[0].created_at.as_deref(), Some("2024-05-01T08:00:00"));
    assert_eq!(reports[0].modified_at.as_deref(), Some("2024-05-02T09:30:00"));
    assert_eq!(catalog.operations(), vec!["ListChildren"]);
}

#[test]
fn connection_check_on_empty_root_is_false() {
    let catalog = FakeCatalog::new();
    let app = App::new(&catalog, Arc::new(NoopSink));
    assert!(!app.check_connection().unwrap());

    let populated = sample_catalog();
    let app = App::new(&populated, Arc::new(NoopSink));
    assert!(app.check_connection().unwrap());
}

#[test]
fn connection_check_propagates_transport_errors() {
    let app = App::new(DeadServer, Arc::new(NoopSink));
    assert_matches!(app.check_connection(), Err(MigrateError::Connection(_)));
}

#[test]
fn download_all_fetches_every_report() {
    let catalog = sample_catalog();
    let app = App::new(&catalog, Arc::new(NoopSink));
    let result = app.download_all(&path("/Finance")).unwrap();

    let names: Vec<_> = result.files.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Monthly.rdl", "Old.rdl", "Quarterly.rdl"]);
    assert_eq!(result.files["Old.rdl"], b"<Report>old</Report>");
    assert!(result.outcome.is_clean());
}

#[test]
fn download_all_fails_only_when_listing_fails() {
    let app = App::new(DeadServer, Arc::new(NoopSink));
    assert_matches!(app.download_all(&path("/Finance")), Err(MigrateError::Connection(_)));
}

#[test]
fn download_all_isolates_failing_items() {
    let catalog = FakeCatalog::new()
        .dropping_connection_on("Quarterly")
        .with_folder("/Finance")
        .with_report("/Finance/Monthly", b"<Report>monthly</Report>")
        .with_report("/Finance/Quarterly", b"<Report>quarterly</Report>")
        .with_report("/Finance/Weekly", b"<Report>weekly</Report>")
        .with_report("/Finance/Yearly", b"<Report>yearly</Report>");
    catalog.forget_definition("/Finance/Monthly");
    let app = App::new(&catalog, Arc::new(NoopSink));

    let result = app.download_all(&path("/Finance")).unwrap();

    let names: Vec<_> = result.files.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Weekly.rdl", "Yearly.rdl"]);
    assert_eq!(result.outcome.succeeded, 2);
    assert_eq!(result.outcome.failed, 2);
    let failed: Vec<_> = result
        .outcome
        .failures
        .iter()
        .map(|failure| failure.item.as_str())
        .collect();
    assert_eq!(failed, vec!["Monthly", "Quarterly"]);
    assert!(result.outcome.failures[0].error.contains("cannot be found"));
    assert_eq!(
        result.outcome.failures[1].error,
        "cannot reach report server: authentication rejected (403)"
    );
}

#[test]
fn download_selected_skips_missing_items() {
    let catalog = sample_catalog();
    let sink = Arc::new(MemorySink::default());
    let app = App::new(&catalog, sink.clone());
    let names = vec!["Monthly".to_string(), "Ghost".to_string()];
    let result = app.download_selected(&path("/Finance"), &names).unwrap();

    assert_eq!(result.files.len(), 1);
    assert!(result.files.contains_key("Monthly.rdl"));
    assert_eq!(result.outcome.succeeded, 1);
    assert_eq!(result.outcome.failures[0].item, "Ghost");
    assert!(result.outcome.failures[0].error.contains("cannot be found"));

    let failed: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|event| event.outcome == Outcome::Failed)
        .map(|event| (event.operation, event.target))
        .collect();
    assert_eq!(
        failed,
        vec![
            ("download.item".to_string(), "Ghost".to_string()),
            ("download".to_string(), "/Finance".to_string()),
        ]
    );
}

#[test]
fn download_selected_from_root_builds_single_slash_paths() {
    let catalog = FakeCatalog::new().with_report("/Top", b"<Report/>");
    let app = App::new(&catalog, Arc::new(NoopSink));
    let result = app
        .download_selected(&CatalogPath::root(), &["Top".to_string()])
        .unwrap();
    assert!(result.files.contains_key("Top.rdl"));
}

#[test]
fn upload_then_download_round_trips_bytes() {
    let catalog = FakeCatalog::new().with_folder("/Drop");
    let app = App::new(&catalog, Arc::new(NoopSink));
    let original = "\u{feff}<?xml version=\"1.0\"?>\r\n<Report xmlns=\"urn:rdl\">\r\n  <Body>ä</Body>\r\n</Report>"
        .as_bytes()
        .to_vec();

    let outcome = app
        .upload_batch(
            &path("/Drop"),
            vec![ReportDocument::new("Invoice", original.clone())],
            &UploadOptions::default(),
        )
        .unwrap();
    assert_eq!(outcome.succeeded, 1);

    let result = app
        .download_selected(&path("/Drop"), &["Invoice".to_string()])
        .unwrap();
    assert_eq!(result.files["Invoice.rdl"], original);
}
