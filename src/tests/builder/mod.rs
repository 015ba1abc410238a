use chrono::NaiveDate;
use indexmap::indexmap;

use crate::{
    ErrorDetail,
    lookup::ReferenceKind,
    normalize::{NormalizedFields, normalize},
    record::{Fields, RecordBuilder, RelatedRows, TaggedRecord, Value},
    tag::Tag,
    warning::{Warning, collect_warnings},
};

fn row(pairs: &[(&str, &str)]) -> NormalizedFields {
    normalize(
        pairs
            .iter()
            .map(|(column, value)| (column.to_string(), value.to_string())),
    )
}

fn tag(code: u32) -> Tag {
    Tag::new(code)
}

#[tokio::test]
async fn test_build_accession_with_collectors() {
    let fixture = super::fixture().await;
    let references = fixture.graph.references();
    let builder = RecordBuilder::new(&fixture.schema, &fixture.resolver, &references);

    let main = row(&[
        ("id", "1"),
        ("instcode", "MEX002"),
        ("accenumb", "CIMMYT-1"),
        ("genus", " Zea "),
        ("othername", "A; B; ;A"),
        ("status", "3"),
        ("acqdate", "19991231"),
        ("elevation", "2240"),
        ("available", "yes"),
        ("origcty", "MEX"),
        ("donorcode", "XYZ001"),
        ("yield", "4.5"),
    ]);
    let related: RelatedRows = indexmap! {
        "collectors".to_owned() => vec![
            row(&[("id", "1"), ("accession_id", "1"), ("name", "Ana"), ("institute", "MEX002")]),
            row(&[("id", "2"), ("accession_id", "1"), ("name", "   ")]),
            row(&[("id", "3"), ("accession_id", "1"), ("name", "Ben"), ("institute", "NOWHERE")]),
        ],
    };
    let (record, warnings) = collect_warnings(builder.build(&main, &related)).await;

    let mut economic = Fields::new();
    economic.set(tag(12), 4.5);
    let mut ana = Fields::new();
    ana.set(tag(14), "Ana");
    ana.set(tag(15), "MEX002");
    let mut ben = Fields::new();
    ben.set(tag(14), "Ben");
    let mut expected = TaggedRecord::new("1", "accession");
    expected.fields.set(tag(1), "MEX002");
    expected.fields.set(tag(2), "CIMMYT-1");
    expected.fields.set(tag(3), "Zea");
    expected
        .fields
        .insert(tag(4), Value::List(vec!["A".into(), "B".into()]));
    expected.fields.set(tag(5), ":status:3");
    expected
        .fields
        .set(tag(6), NaiveDate::from_ymd_opt(1999, 12, 31).unwrap());
    expected.fields.set(tag(7), 2240_i64);
    expected.fields.set(tag(8), true);
    expected.fields.set(tag(9), "Mexico");
    expected.fields.insert(tag(11), Value::Record(economic));
    expected
        .fields
        .insert(tag(13), Value::Records(vec![ana, ben]));

    assert_eq!(record.unwrap(), expected);
    assert_eq!(
        warnings,
        [
            Warning::UnknownReference {
                kind: ReferenceKind::Institute,
                code: "XYZ001".to_owned(),
                column: "donorcode".to_owned(),
            },
            Warning::UnknownReference {
                kind: ReferenceKind::Institute,
                code: "NOWHERE".to_owned(),
                column: "institute".to_owned(),
            },
        ]
    );
}

#[tokio::test]
async fn test_absent_fields_are_not_written() {
    let fixture = super::fixture().await;
    let references = fixture.graph.references();
    let builder = RecordBuilder::new(&fixture.schema, &fixture.resolver, &references);

    let main = row(&[("id", "3"), ("accenumb", "CIP-3"), ("othername", " ; ")]);
    let related: RelatedRows = indexmap! {
        "collectors".to_owned() => vec![row(&[("id", "4"), ("accession_id", "3")])],
    };
    let record = builder.build(&main, &related).await.unwrap();
    assert_eq!(
        record.fields.iter().map(|(tag, _)| tag).collect::<Vec<_>>(),
        [tag(2)]
    );
}

#[tokio::test]
async fn test_enum_value_is_prefixed_with_path() {
    let fixture = super::fixture().await;
    let references = fixture.graph.references();
    let builder = RecordBuilder::new(&fixture.schema, &fixture.resolver, &references);

    let record = builder
        .build(&row(&[("id", "9"), ("status", "3")]), &RelatedRows::new())
        .await
        .unwrap();
    assert_eq!(
        record.fields.get(tag(5)),
        Some(&Value::Scalar(":status:3".into()))
    );
}

#[tokio::test]
async fn test_unknown_country_fails_the_record() {
    let fixture = super::fixture().await;
    let references = fixture.graph.references();
    let builder = RecordBuilder::new(&fixture.schema, &fixture.resolver, &references);

    let err = builder
        .build(&row(&[("id", "9"), ("origcty", "ZZZ")]), &RelatedRows::new())
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        ErrorDetail::UnresolvedReference { kind: ReferenceKind::Country, code } if code == "ZZZ"
    ));
    assert!(err.is_record_level());
}

#[tokio::test]
async fn test_record_level_defects() {
    let fixture = super::fixture().await;
    let references = fixture.graph.references();
    let builder = RecordBuilder::new(&fixture.schema, &fixture.resolver, &references);

    let missing_id = builder
        .build(&row(&[("genus", "Zea")]), &RelatedRows::new())
        .await
        .unwrap_err();
    assert!(matches!(missing_id, ErrorDetail::MissingField(column) if column == "id"));

    let invalid = builder
        .build(&row(&[("id", "9"), ("elevation", "high")]), &RelatedRows::new())
        .await
        .unwrap_err();
    assert!(matches!(
        invalid,
        ErrorDetail::InvalidValue { expected: "integer", .. }
    ));

    let not_a_number = builder
        .build(&row(&[("id", "9"), ("yield", "NaN")]), &RelatedRows::new())
        .await
        .unwrap_err();
    assert!(matches!(
        not_a_number,
        ErrorDetail::InvalidValue { expected: "float", ref value, .. } if value == "NaN"
    ));
}

const LENIENT: &str = r#"
kind: accession
table: accessions
id_column: id
strict_tags: false
identity:
  - { type: value, column: instcode, tag: "mcpd:instcode" }
fields:
  - { type: value, column: extra, tag: "mcpd:nosuch" }
  - { type: reference, column: origcty, tag: "mcpd:origcty", reference: country, on_missing: skip }
"#;

#[tokio::test]
async fn test_lenient_mapping_omits_unknown_tags_and_references() {
    let fixture = super::fixture().await;
    let references = fixture.graph.references();
    let schema = super::parse_schema(LENIENT);
    let builder = RecordBuilder::new(&schema, &fixture.resolver, &references);

    let (record, warnings) = collect_warnings(builder.build(
        &row(&[("id", "9"), ("instcode", "MEX002"), ("extra", "x"), ("origcty", "ZZZ")]),
        &RelatedRows::new(),
    ))
    .await;
    let mut expected = TaggedRecord::new("9", "accession");
    expected.fields.set(tag(1), "MEX002");
    assert_eq!(record.unwrap(), expected);
    assert_eq!(
        warnings,
        [
            Warning::UnknownTag("mcpd:nosuch".into()),
            Warning::UnknownReference {
                kind: ReferenceKind::Country,
                code: "ZZZ".to_owned(),
                column: "origcty".to_owned(),
            },
        ]
    );
}

#[tokio::test]
async fn test_strict_mapping_rejects_unknown_tags() {
    let fixture = super::fixture().await;
    let references = fixture.graph.references();
    let schema = super::parse_schema(&LENIENT.replace("strict_tags: false", "strict_tags: true"));
    let builder = RecordBuilder::new(&schema, &fixture.resolver, &references);

    let err = builder
        .build(&row(&[("id", "9"), ("extra", "x")]), &RelatedRows::new())
        .await
        .unwrap_err();
    assert!(matches!(&err, ErrorDetail::UnresolvedTag(path) if path == "mcpd:nosuch"));
    assert!(!err.is_record_level());
}

#[tokio::test]
async fn test_identity_is_always_strict() {
    let fixture = super::fixture().await;
    let references = fixture.graph.references();
    let schema = super::parse_schema(&LENIENT.replace("mcpd:instcode", "mcpd:nosuch_id"));
    let builder = RecordBuilder::new(&schema, &fixture.resolver, &references);

    let err = builder
        .build(&row(&[("id", "9"), ("instcode", "MEX002")]), &RelatedRows::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ErrorDetail::UnresolvedTag(_)));
}

#[tokio::test]
async fn test_kind_mismatch_is_reported() {
    let fixture = super::fixture().await;
    let references = fixture.graph.references();
    let schema = super::parse_schema(
        r#"
kind: accession
table: accessions
id_column: id
fields:
  - { type: list, column: genus, tag: "mcpd:genus" }
"#,
    );
    let builder = RecordBuilder::new(&schema, &fixture.resolver, &references);

    let err = builder
        .build(&row(&[("id", "9"), ("genus", "Zea")]), &RelatedRows::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ErrorDetail::KindMismatch { mapped: "list", .. }));
}
