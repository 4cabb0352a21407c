//! Shared test data.

use tmerge_store::{FieldDefinition, InMemoryTermStore};
use tmerge_types::{Cardinality, EntityId, FieldValue, Term, TermId};

pub(crate) fn tid(n: u64) -> TermId {
    TermId::new(n)
}

/// `tags`: A(1) -> B(2), C(3).
///
/// Fields: `field_notes` (2 values), `field_color` (1 value),
/// `field_synonyms` (unlimited), and a base field `name`.
/// Entities: node/1 tags [C], node/2 tags [C, B], node/3 tags [A].
pub(crate) fn scenario_store() -> InMemoryTermStore {
    let store = InMemoryTermStore::new();
    store.insert_term(Term::new(tid(1), "tags".into(), "A")).unwrap();
    store
        .insert_term(Term::new(tid(2), "tags".into(), "B").with_parent(tid(1)))
        .unwrap();
    store.insert_term(Term::new(tid(3), "tags".into(), "C")).unwrap();

    store
        .define_field(FieldDefinition::new("tags", "field_notes", Cardinality::Limited(2)))
        .unwrap();
    store
        .define_field(FieldDefinition::new("tags", "field_color", Cardinality::Limited(1)))
        .unwrap();
    store
        .define_field(FieldDefinition::new("tags", "field_synonyms", Cardinality::Unlimited))
        .unwrap();
    let mut name = FieldDefinition::new("tags", "name", Cardinality::Limited(1));
    name.base = true;
    store.define_field(name).unwrap();

    store.insert_entity(EntityId::node(1), "field_tags", vec![tid(3)]).unwrap();
    store
        .insert_entity(EntityId::node(2), "field_tags", vec![tid(3), tid(2)])
        .unwrap();
    store.insert_entity(EntityId::node(3), "field_tags", vec![tid(1)]).unwrap();
    store
}

pub(crate) fn texts(values: &[&str]) -> Vec<FieldValue> {
    values.iter().map(|v| FieldValue::text(*v)).collect()
}
