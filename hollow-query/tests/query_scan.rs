//! Field-match query scenarios, including single-field reference chases
//! and sequential/parallel agreement.

use hollow_core::{
    FieldType, FieldValue, Ordinal, Schema, SchemaField, SchemaSet,
};
use hollow_query::{FieldMatchQuery, ScanPool};
use hollow_read::{freeze_engine, ReadStateEngine, RecordRow, TypeDataBuilder};
use std::sync::Arc;

fn object_row(values: Vec<FieldValue>) -> RecordRow {
    RecordRow::Object(values)
}

/// `B { string name }`, `A { B b }` with two A records chasing two Bs.
fn reference_engine() -> Arc<ReadStateEngine> {
    let schemas = Arc::new(
        SchemaSet::new(vec![
            Schema::object("B", [SchemaField::new("name", FieldType::String)]),
            Schema::object("A", [SchemaField::new("b", FieldType::Reference("B".into()))]),
        ])
        .unwrap(),
    );
    let mut b = TypeDataBuilder::new(schemas.at(0).clone());
    b.set_row(0, object_row(vec![FieldValue::Str("x".into())]));
    b.set_row(1, object_row(vec![FieldValue::Str("y".into())]));
    let mut a = TypeDataBuilder::new(schemas.at(1).clone());
    a.set_row(0, object_row(vec![FieldValue::Ref(Some(0))]));
    a.set_row(1, object_row(vec![FieldValue::Ref(Some(1))]));
    Arc::new(freeze_engine(schemas, &[b, a]).unwrap())
}

#[test]
fn reference_chase_projects_matches_through_the_reference() {
    let engine = reference_engine();
    let query = FieldMatchQuery::new(engine);

    let matches = query.find_matching_records("name", "x");
    // both the B record itself and the A record referencing it match
    assert_eq!(matches["B"].iter().collect::<Vec<_>>(), vec![0]);
    assert_eq!(matches["A"].iter().collect::<Vec<_>>(), vec![0]);

    let matches = query.find_matching_records("name", "y");
    assert_eq!(matches["A"].iter().collect::<Vec<_>>(), vec![1]);

    assert!(query.find_matching_records("name", "z").is_empty());
}

#[test]
fn chained_single_field_references_recurse() {
    // C { string tag } <- B { C c } <- A { B b }
    let schemas = Arc::new(
        SchemaSet::new(vec![
            Schema::object("C", [SchemaField::new("tag", FieldType::String)]),
            Schema::object("B", [SchemaField::new("c", FieldType::Reference("C".into()))]),
            Schema::object("A", [SchemaField::new("b", FieldType::Reference("B".into()))]),
        ])
        .unwrap(),
    );
    let mut c = TypeDataBuilder::new(schemas.at(0).clone());
    c.set_row(0, object_row(vec![FieldValue::Str("hit".into())]));
    c.set_row(1, object_row(vec![FieldValue::Str("miss".into())]));
    let mut b = TypeDataBuilder::new(schemas.at(1).clone());
    b.set_row(0, object_row(vec![FieldValue::Ref(Some(0))]));
    b.set_row(1, object_row(vec![FieldValue::Ref(Some(1))]));
    let mut a = TypeDataBuilder::new(schemas.at(2).clone());
    a.set_row(0, object_row(vec![FieldValue::Ref(Some(1))]));
    a.set_row(1, object_row(vec![FieldValue::Ref(Some(0))]));
    let engine = Arc::new(freeze_engine(schemas, &[c, b, a]).unwrap());

    let matches = FieldMatchQuery::new(engine).find_matching_records("c", "hit");
    // B's own field "c" chases into C; A's reference chain reaches the
    // same named field one level deeper
    assert_eq!(matches["B"].iter().collect::<Vec<_>>(), vec![0]);
    assert_eq!(matches["A"].iter().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn multi_field_reference_targets_are_not_chased() {
    let schemas = Arc::new(
        SchemaSet::new(vec![
            Schema::object(
                "Wide",
                [
                    SchemaField::new("name", FieldType::String),
                    SchemaField::new("rank", FieldType::Int),
                ],
            ),
            Schema::object(
                "Holder",
                [SchemaField::new("w", FieldType::Reference("Wide".into()))],
            ),
        ])
        .unwrap(),
    );
    let mut wide = TypeDataBuilder::new(schemas.at(0).clone());
    wide.set_row(
        0,
        object_row(vec![FieldValue::Str("x".into()), FieldValue::Int(1)]),
    );
    let mut holder = TypeDataBuilder::new(schemas.at(1).clone());
    holder.set_row(0, object_row(vec![FieldValue::Ref(Some(0))]));
    let engine = Arc::new(freeze_engine(schemas, &[wide, holder]).unwrap());

    let query = FieldMatchQuery::new(engine);
    // "w" names a reference to a two-field schema: no traversal
    assert!(query.find_matching_records("w", "x").is_empty());
    // the scalar field still matches on its owner
    let matches = query.find_matching_records("name", "x");
    assert_eq!(matches["Wide"].iter().collect::<Vec<_>>(), vec![0]);
}

#[test]
fn unparseable_text_matches_nothing() {
    let schemas = Arc::new(
        SchemaSet::new(vec![Schema::object(
            "N",
            [SchemaField::new("count", FieldType::Int)],
        )])
        .unwrap(),
    );
    let mut n = TypeDataBuilder::new(schemas.at(0).clone());
    n.set_row(0, object_row(vec![FieldValue::Int(5)]));
    let engine = Arc::new(freeze_engine(schemas, &[n]).unwrap());

    let query = FieldMatchQuery::new(engine);
    assert!(query.find_matching_records("count", "five").is_empty());
    assert_eq!(
        query.find_matching_records("count", "5")["N"]
            .iter()
            .collect::<Vec<_>>(),
        vec![0]
    );
}

#[test]
fn same_field_name_matches_across_types() {
    let schemas = Arc::new(
        SchemaSet::new(vec![
            Schema::object("P", [SchemaField::new("name", FieldType::String)]),
            Schema::object("Q", [SchemaField::new("name", FieldType::String)]),
        ])
        .unwrap(),
    );
    let mut p = TypeDataBuilder::new(schemas.at(0).clone());
    p.set_row(0, object_row(vec![FieldValue::Str("same".into())]));
    let mut q = TypeDataBuilder::new(schemas.at(1).clone());
    q.set_row(3, object_row(vec![FieldValue::Str("same".into())]));
    q.set_row(5, object_row(vec![FieldValue::Str("other".into())]));
    let engine = Arc::new(freeze_engine(schemas, &[p, q]).unwrap());

    let matches = FieldMatchQuery::new(engine).find_matching_records("name", "same");
    assert_eq!(matches["P"].iter().collect::<Vec<_>>(), vec![0]);
    assert_eq!(matches["Q"].iter().collect::<Vec<_>>(), vec![3]);
}

/// A large scattered engine for comparing sequential and parallel scans.
fn large_engine(records: u32) -> Arc<ReadStateEngine> {
    let schemas = Arc::new(
        SchemaSet::new(vec![Schema::object(
            "Item",
            [
                SchemaField::new("bucket", FieldType::Long),
                SchemaField::new("label", FieldType::String),
            ],
        )])
        .unwrap(),
    );
    let mut items = TypeDataBuilder::new(schemas.at(0).clone());
    // leave gaps so chunk boundaries cross unpopulated ordinals
    for i in 0..records {
        let ordinal: Ordinal = i * 3;
        items.set_row(
            ordinal,
            object_row(vec![
                FieldValue::Long(i64::from(i % 7)),
                FieldValue::Str(format!("item-{i}")),
            ]),
        );
    }
    Arc::new(freeze_engine(schemas, &[items]).unwrap())
}

#[test]
fn parallel_scan_agrees_with_sequential() {
    let engine = large_engine(2_000);
    let query = FieldMatchQuery::new(engine);
    let pool = ScanPool::with_workers(4);

    let sequential = query.find_matching_records("bucket", "3");
    let parallel = query.find_matching_records_parallel("bucket", "3", &pool);
    assert_eq!(sequential["Item"], parallel["Item"]);
    assert!(sequential["Item"].cardinality() > 100);

    let sequential = query.find_matching_records("label", "item-42");
    let parallel = query.find_matching_records_parallel("label", "item-42", &pool);
    assert_eq!(sequential["Item"], parallel["Item"]);
    assert_eq!(parallel["Item"].iter().collect::<Vec<_>>(), vec![126]);
}

#[test]
fn parallel_reference_chase_agrees_with_sequential() {
    let engine = reference_engine();
    let query = FieldMatchQuery::new(engine);
    let pool = ScanPool::with_workers(3);

    let sequential = query.find_matching_records("name", "x");
    let parallel = query.find_matching_records_parallel("name", "x", &pool);
    assert_eq!(sequential.len(), parallel.len());
    assert_eq!(sequential["A"], parallel["A"]);
    assert_eq!(sequential["B"], parallel["B"]);
}
