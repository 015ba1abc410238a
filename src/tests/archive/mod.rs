use std::sync::atomic::Ordering;

use base64::Engine;
use indexmap::indexmap;

use crate::{
    ErrorDetail, Stage,
    job::{ArchiveMode, Pipeline, RunOptions, RunSummary},
    progress::{EntryStatus, NullReporter, RunPhase, tests::RecordingReporter},
};

use super::{ArchiveRow, Fixture, MemoryArchive, MemorySource, archive_rows, table};

async fn run(fixture: &Fixture, options: RunOptions) -> Result<RunSummary, crate::Error> {
    let references = fixture.graph.references();
    Pipeline {
        schema: &fixture.schema,
        resolver: &fixture.resolver,
        references: &references,
        source: fixture.source.source().await.unwrap(),
        archive: fixture.destination.archive(table("archive")).await.unwrap(),
        reporter: &NullReporter,
    }
    .run(options)
    .await
}

fn decoded(row: &ArchiveRow) -> (String, String) {
    let engine = base64::engine::general_purpose::STANDARD;
    (
        String::from_utf8(engine.decode(&row.class).unwrap()).unwrap(),
        String::from_utf8(engine.decode(&row.payload).unwrap()).unwrap(),
    )
}

#[tokio::test]
async fn test_fresh_run_archives_every_row() {
    let fixture = super::fixture().await;
    let summary = run(&fixture, RunOptions::default()).await.unwrap();
    assert_eq!(
        summary,
        RunSummary {
            pages: 2,
            fetched: 3,
            archived: 3,
            blank: 0,
            failed: 0,
            watermark: Some("3".to_owned()),
            mode: ArchiveMode::Insert,
        }
    );

    let rows = archive_rows(&fixture.destination, "archive").await;
    assert_eq!(
        rows.iter().map(|row| row.id.as_str()).collect::<Vec<_>>(),
        ["1", "2", "3"]
    );
    let (class, payload) = decoded(&rows[1]);
    assert_eq!(class, "accession");
    assert_eq!(
        payload,
        "<record id=\"2\" type=\"accession\">\
         <f t=\"1\">MEX002</f><f t=\"2\">CIMMYT-2</f><f t=\"3\">Zea</f><f t=\"10\">MEX002</f>\
         </record>"
    );
}

#[tokio::test]
async fn test_blank_rows_never_reach_the_builder() {
    let mut fixture = super::fixture().await;
    // The blank row has no id, so building it would fail the run.
    fixture.schema = super::parse_schema(
        r#"
kind: specimen
table: specimens
id_column: id
page_size: 1
fields:
  - { type: value, column: genus, tag: "mcpd:genus" }
"#,
    );
    let summary = run(&fixture, RunOptions::default()).await.unwrap();
    assert_eq!((summary.fetched, summary.blank, summary.archived), (3, 1, 2));
    assert_eq!(summary.pages, 3);
    let rows = archive_rows(&fixture.destination, "archive").await;
    assert_eq!(
        rows.iter().map(|row| row.id.as_str()).collect::<Vec<_>>(),
        ["1", "3"]
    );
}

#[tokio::test]
async fn test_resume_only_touches_rows_after_watermark() {
    let fixture = super::fixture().await;
    run(&fixture, RunOptions::default()).await.unwrap();
    let before = archive_rows(&fixture.destination, "archive").await;

    sqlx::query("UPDATE accessions SET genus = 'Changed'")
        .execute(fixture.source.pool())
        .await
        .unwrap();
    let summary = run(
        &fixture,
        RunOptions {
            watermark: Some("2".to_owned()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(summary.mode, ArchiveMode::Replace);
    assert_eq!((summary.fetched, summary.archived), (1, 1));
    assert_eq!(summary.watermark.as_deref(), Some("3"));

    let after = archive_rows(&fixture.destination, "archive").await;
    assert_eq!(after[..2], before[..2]);
    assert_ne!(after[2], before[2]);
    assert!(decoded(&after[2]).1.contains("<f t=\"3\">Changed</f>"));
}

const LOOSE: &str = r#"
kind: accession
table: loose
id_column: id
page_size: 1
fields:
  - { type: value, column: genus, tag: "mcpd:genus" }
relations:
  - name: collectors
    tag: "mcpd:collectors"
    table: loose_collectors
    foreign_key: accession_id
    fields:
      - { type: value, column: name, tag: "mcpd:collname" }
"#;

#[tokio::test]
async fn test_resume_on_untyped_columns() {
    let mut fixture = super::fixture().await;
    sqlx::raw_sql(
        "CREATE TABLE loose (id, genus);
         INSERT INTO loose VALUES (1, 'Zea'), (2, 'Oryza'), (3, 'Solanum');
         CREATE TABLE loose_collectors (accession_id, name);
         INSERT INTO loose_collectors VALUES (2, 'Ana');",
    )
    .execute(fixture.source.pool())
    .await
    .unwrap();
    fixture.schema = super::parse_schema(LOOSE);

    let summary = run(
        &fixture,
        RunOptions {
            watermark: Some("1".to_owned()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!((summary.fetched, summary.archived), (2, 2));
    assert_eq!(summary.watermark.as_deref(), Some("3"));

    let rows = archive_rows(&fixture.destination, "archive").await;
    assert_eq!(
        rows.iter().map(|row| row.id.as_str()).collect::<Vec<_>>(),
        ["2", "3"]
    );
    assert_eq!(
        decoded(&rows[0]).1,
        "<record id=\"2\" type=\"accession\">\
         <f t=\"3\">Oryza</f><g t=\"13\"><f t=\"14\">Ana</f></g>\
         </record>"
    );
}

#[tokio::test]
async fn test_replace_run_is_idempotent() {
    let fixture = super::fixture().await;
    let options = RunOptions {
        watermark: Some("1".to_owned()),
        ..Default::default()
    };
    run(&fixture, options.clone()).await.unwrap();
    let once = archive_rows(&fixture.destination, "archive").await;
    run(&fixture, options).await.unwrap();
    let twice = archive_rows(&fixture.destination, "archive").await;
    assert_eq!(once.len(), 2);
    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_insert_rejects_existing_entries() {
    let fixture = super::fixture().await;
    run(&fixture, RunOptions::default()).await.unwrap();
    let err = run(
        &fixture,
        RunOptions {
            watermark: Some("1".to_owned()),
            mode: Some(ArchiveMode::Insert),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.context.stage, Stage::Archive);
    assert_eq!(err.context.id.as_deref(), Some("2"));
    assert!(matches!(*err.detail, ErrorDetail::DuplicateEntry(ref id) if id == "2"));
}

#[tokio::test]
async fn test_fresh_insert_run_clears_destination() {
    let fixture = super::fixture().await;
    run(&fixture, RunOptions::default()).await.unwrap();
    sqlx::query("DELETE FROM accessions WHERE id = 2")
        .execute(fixture.source.pool())
        .await
        .unwrap();
    run(&fixture, RunOptions::default()).await.unwrap();
    let rows = archive_rows(&fixture.destination, "archive").await;
    assert_eq!(
        rows.iter().map(|row| row.id.as_str()).collect::<Vec<_>>(),
        ["1", "3"]
    );
}

#[tokio::test]
async fn test_record_errors_follow_caller_policy() {
    let fixture = super::fixture().await;
    sqlx::query("UPDATE accessions SET origcty = 'ZZZ' WHERE id = 2")
        .execute(fixture.source.pool())
        .await
        .unwrap();

    let err = run(&fixture, RunOptions::default()).await.unwrap_err();
    assert_eq!(err.context.stage, Stage::Build);
    assert!(err.is_record_level());

    let summary = run(
        &fixture,
        RunOptions {
            abort_on_record_error: false,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!((summary.archived, summary.failed), (2, 1));
    let rows = archive_rows(&fixture.destination, "archive").await;
    assert_eq!(
        rows.iter().map(|row| row.id.as_str()).collect::<Vec<_>>(),
        ["1", "3"]
    );
}

#[tokio::test]
async fn test_progress_is_reported_per_page() {
    let fixture = super::fixture().await;
    let references = fixture.graph.references();
    let reporter = RecordingReporter::default();
    Pipeline {
        schema: &fixture.schema,
        resolver: &fixture.resolver,
        references: &references,
        source: fixture.source.source().await.unwrap(),
        archive: fixture.destination.archive(table("archive")).await.unwrap(),
        reporter: &reporter,
    }
    .run(RunOptions::default())
    .await
    .unwrap();

    assert_eq!(*reporter.pages.lock().unwrap(), [(1, 2), (2, 1)]);
    assert_eq!(
        *reporter.phases.lock().unwrap(),
        [
            RunPhase::PreparingArchive,
            RunPhase::Archiving,
            RunPhase::Completed
        ]
    );
    let entries = reporter.entries.lock().unwrap();
    assert_eq!(
        entries
            .iter()
            .filter(|(_, status)| *status == EntryStatus::Done)
            .count(),
        3
    );
    assert_eq!(
        *reporter.warnings.lock().unwrap(),
        ["1: unknown institute \"XYZ001\" in donorcode, value omitted",
         "1: unknown institute \"NOWHERE\" in institute, value omitted"]
    );
    assert_eq!(
        *reporter.infos.lock().unwrap(),
        ["3 records archived, 0 blank rows, 0 failed"]
    );
    assert!(*reporter.finished.lock().unwrap());
}

#[tokio::test]
async fn test_sessions_released_on_fatal_error() {
    let fixture = super::fixture().await;
    let accession = |id: &str| {
        indexmap! {
            "id".to_owned() => id.to_owned(),
            "instcode".to_owned() => "MEX002".to_owned(),
            "accenumb".to_owned() => format!("CIMMYT-{id}"),
        }
    };
    let mut source = MemorySource::new(vec![accession("1"), accession("2"), accession("3")]);
    source.fail_after = Some(1);
    let archive = MemoryArchive::default();
    let references = fixture.graph.references();
    let reporter = RecordingReporter::default();

    let err = Pipeline {
        schema: &fixture.schema,
        resolver: &fixture.resolver,
        references: &references,
        source: &source,
        archive: &archive,
        reporter: &reporter,
    }
    .run(RunOptions::default())
    .await
    .unwrap_err();

    assert_eq!(err.context.stage, Stage::Fetch);
    assert!(matches!(*err.detail, ErrorDetail::Source(_)));
    assert!(source.released.load(Ordering::SeqCst));
    assert!(archive.released.load(Ordering::SeqCst));
    assert_eq!(archive.entries.lock().unwrap().len(), 2);
    assert!(matches!(
        reporter.phases.lock().unwrap().last(),
        Some(RunPhase::Failed(_))
    ));
}
