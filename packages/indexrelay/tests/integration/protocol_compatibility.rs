//! Protocol compatibility tests
//!
//! Every field kind survives the wire, older minors decode with defaults,
//! and newer or foreign versions are refused before the body is read.

use std::collections::BTreeMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

use indexrelay::features::deletion_query::{
    DeletionQuery, DeletionQueryError, DeletionQueryRegistry, SINGULAR_TERM_KEY,
};
use indexrelay::features::protocol::{
    write_frame, MsgpackSerializationProvider, ProtocolError, ProtocolVersion, WorkSerializer,
};
use indexrelay::features::work::{
    BinaryField, Document, EntityId, Field, IndexMode, NumericKind, NumericValue, ReaderField,
    Store, TermVector, TextField, Token, TokenAttribute, TokenStreamField, Work,
    DEFAULT_PRECISION_STEP,
};

fn serializer() -> WorkSerializer {
    WorkSerializer::new(
        Arc::new(MsgpackSerializationProvider),
        Arc::new(DeletionQueryRegistry::standard()),
    )
}

fn frame(version: ProtocolVersion, body: &serde_json::Value) -> Vec<u8> {
    write_frame(version, &rmp_serde::to_vec_named(body).unwrap()).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// Round trips
// ═══════════════════════════════════════════════════════════════════════════

fn every_field_kind() -> Document {
    Document::with_boost(2.5)
        .field(Field::Binary(BinaryField {
            name: "cover".to_string(),
            value: vec![0, 1, 2, 3, 4],
            offset: 1,
            length: 3,
        }))
        .field(Field::Text(TextField {
            name: "title".to_string(),
            value: "The Left Hand of Darkness".to_string(),
            store: Store::Compress,
            index: IndexMode::AnalyzedNoNorms,
            term_vector: TermVector::WithPositionsOffsets,
            boost: 1.5,
            omit_norms: true,
            omit_term_freq_and_positions: true,
        }))
        .field(Field::numeric("pages", NumericValue::Int(304)))
        .field(Field::numeric("isbn13", NumericValue::Long(9_780_441_478_125)))
        .field(Field::numeric("rating", NumericValue::Float(4.5)))
        .field(Field::numeric("price", NumericValue::Double(12.99)))
        .field(Field::Reader(ReaderField {
            name: "summary".to_string(),
            content: "A human envoy visits Gethen.".to_string(),
            term_vector: TermVector::Yes,
        }))
        .field(Field::TokenStream(TokenStreamField {
            name: "tags".to_string(),
            tokens: vec![
                Token::new(vec![
                    TokenAttribute::CharTerm("winter".to_string()),
                    TokenAttribute::Payload(vec![9]),
                    TokenAttribute::Keyword(true),
                    TokenAttribute::PositionIncrement(1),
                ]),
                Token::new(vec![
                    TokenAttribute::CharTerm("ambisexual".to_string()),
                    TokenAttribute::Flags(3),
                    TokenAttribute::Type("word".to_string()),
                    TokenAttribute::Offset { start: 7, end: 17 },
                    TokenAttribute::Custom {
                        type_name: "org.example.Lemma".to_string(),
                        data: vec![1, 2],
                    },
                ]),
            ],
            term_vector: TermVector::WithOffsets,
        }))
        .field(Field::custom("shelf", "org.example.Shelf", vec![7, 7, 7]))
}

#[test]
fn test_every_field_kind_round_trips() {
    let mut analyzers = BTreeMap::new();
    analyzers.insert("title".to_string(), "english".to_string());
    let batch = vec![
        Work::add("Book", 1, every_field_kind())
            .with_tenant("acme")
            .with_field_analyzers(analyzers),
        Work::update("Book", "le-guin-1969", every_field_kind()),
    ];

    let s = serializer();
    let decoded = s.to_works(&s.to_serialized_model(&batch).unwrap()).unwrap();
    assert_eq!(decoded, batch);
}

#[test]
fn test_every_identifier_kind_round_trips() {
    let ids = vec![
        EntityId::Int(-3),
        EntityId::Long(1 << 40),
        EntityId::Float(0.25),
        EntityId::Double(-1.5e300),
        EntityId::String("978-0441478125".to_string()),
        EntityId::Opaque(vec![0xca, 0xfe]),
    ];
    let batch: Vec<Work> = ids.into_iter().map(|id| Work::delete("Book", id)).collect();

    let s = serializer();
    assert_eq!(s.to_works(&s.to_serialized_model(&batch).unwrap()).unwrap(), batch);
}

#[test]
fn test_deletion_queries_cross_the_wire() {
    let range = DeletionQuery::numeric_range(
        "pages",
        NumericKind::Long,
        None,
        Some(NumericValue::Long(100)),
        false,
        true,
    )
    .unwrap()
    .with_precision_step(8);
    let batch = vec![
        Work::delete_by_query("Book", DeletionQuery::term("isbn", "978-0441478125")),
        Work::delete_by_query("Book", range).with_tenant("acme"),
    ];

    let s = serializer();
    assert_eq!(s.to_works(&s.to_serialized_model(&batch).unwrap()).unwrap(), batch);
}

// ═══════════════════════════════════════════════════════════════════════════
// Versioning
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_older_message_missing_numeric_attributes_uses_defaults() {
    let body = json!({
        "operations": [{
            "kind": "Add",
            "entity_type": "Book",
            "id": {"type": "Long", "value": 42},
            "document": {
                "fields": [
                    {"kind": "Long", "name": "pages", "value": 304,
                     "attrs": {"precision_step": 4, "store": true, "indexed": true}},
                    {"kind": "Int", "name": "edition", "value": 2},
                    {"kind": "String", "name": "title", "value": "Dune",
                     "store": "yes", "index": "analyzed"}
                ]
            }
        }]
    });

    let works = serializer().to_works(&frame(ProtocolVersion::V1_0, &body)).unwrap();
    let Work::Add(add) = &works[0] else {
        panic!("expected an add, got {:?}", works[0]);
    };
    assert_eq!(add.id, EntityId::Long(42));
    assert_eq!(add.id_in_string, "42");
    assert_eq!(add.tenant_id, None);
    assert_eq!(add.document.boost, 1.0);

    let Some(Field::Numeric(pages)) = add.document.get("pages") else {
        panic!("pages should decode as numeric");
    };
    assert_eq!(pages.value, NumericValue::Long(304));
    assert_eq!(pages.precision_step, 4);
    assert!(pages.store);
    assert_eq!(pages.boost, 1.0);
    assert!(pages.omit_norms);
    assert!(pages.omit_term_freq_and_positions);

    let Some(Field::Numeric(edition)) = add.document.get("edition") else {
        panic!("edition should decode as numeric");
    };
    assert_eq!(edition.precision_step, DEFAULT_PRECISION_STEP);
    assert!(!edition.store);
    assert!(edition.indexed);

    let Some(Field::Text(title)) = add.document.get("title") else {
        panic!("title should decode as text");
    };
    assert_eq!(title.boost, 1.0);
    assert_eq!(title.term_vector, TermVector::No);
    assert!(!title.omit_norms);
}

#[test]
fn test_newer_minor_is_rejected() {
    let body = json!({"operations": []});
    let err = serializer()
        .to_works(&frame(ProtocolVersion::new(1, 3), &body))
        .unwrap_err();
    assert!(matches!(err, ProtocolError::UnsupportedVersion { major: 1, minor: 3, .. }));
}

#[test]
fn test_foreign_major_is_rejected() {
    let body = json!({"operations": []});
    let err = serializer()
        .to_works(&frame(ProtocolVersion::new(2, 0), &body))
        .unwrap_err();
    assert!(matches!(err, ProtocolError::UnsupportedVersion { major: 2, .. }));
}

#[test]
fn test_every_older_minor_is_readable() {
    let body = json!({"operations": [{"kind": "Flush", "entity_type": "Book"}]});
    for version in [ProtocolVersion::V1_0, ProtocolVersion::V1_1, ProtocolVersion::V1_2] {
        let works = serializer().to_works(&frame(version, &body)).unwrap();
        assert_eq!(works, vec![Work::flush(Some("Book".to_string()))], "version {}", version);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Rejections
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_unknown_query_key_fails_whole_message() {
    let body = json!({
        "operations": [
            {"kind": "PurgeAll", "entity_type": "Book"},
            {"kind": "DeleteByQuery", "entity_type": "Book", "query_key": 9, "query": ["a", "b"]}
        ]
    });
    let err = serializer()
        .to_works(&frame(ProtocolVersion::CURRENT, &body))
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::DeletionQuery(DeletionQueryError::UnknownQueryKey(9))
    ));
}

#[test]
fn test_term_query_with_wrong_arity_fails() {
    let body = json!({
        "operations": [{
            "kind": "DeleteByQuery",
            "entity_type": "Book",
            "query_key": SINGULAR_TERM_KEY,
            "query": ["isbn"]
        }]
    });
    let err = serializer()
        .to_works(&frame(ProtocolVersion::CURRENT, &body))
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::DeletionQuery(DeletionQueryError::Arity { expected: 2, found: 1, .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════════════
// Properties
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// Any string identifier and text value survives the wire unchanged
    #[test]
    fn prop_string_content_round_trips(
        id in ".*",
        tenant in proptest::option::of("[a-z]{1,8}"),
        title in ".*",
        year in any::<i32>(),
    ) {
        let document = Document::new()
            .field(Field::text("title", title))
            .field(Field::numeric("year", NumericValue::Int(year)));
        let mut work = Work::add("Book", EntityId::String(id), document);
        if let Some(tenant) = tenant {
            work = work.with_tenant(tenant);
        }

        let s = serializer();
        let decoded = s.to_works(&s.to_serialized_model(std::slice::from_ref(&work)).unwrap()).unwrap();
        prop_assert_eq!(decoded, vec![work]);
    }

    /// Term deletion queries survive the registry's string encoding
    #[test]
    fn prop_term_query_string_round_trip(field in "[a-z_]{1,12}", value in ".*") {
        let registry = DeletionQueryRegistry::standard();
        let query = DeletionQuery::term(field, value);
        let parts = registry.to_string_array(&query).unwrap();
        prop_assert_eq!(parts.len(), 2);
        prop_assert_eq!(registry.from_string_array(SINGULAR_TERM_KEY, &parts).unwrap(), query);
    }
}
