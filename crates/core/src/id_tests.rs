use super::*;
use crate::{define_id, define_uuid_id};

define_id! {
    /// Scratch ID type used only by these tests.
    pub struct TestShortId("tst-");
}

define_uuid_id! {
    /// Scratch UUID ID type used only by these tests.
    pub struct TestUuidId;
}

#[test]
fn short_ids_carry_their_prefix() {
    let id = TestShortId::new();
    assert!(id.as_str().starts_with("tst-"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
}

#[test]
fn short_ids_round_trip_through_serde() {
    let id = TestShortId::new();
    let json = serde_json::to_string(&id).unwrap();
    let back: TestShortId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, back);
}

#[test]
fn short_ids_are_distinct() {
    assert_ne!(TestShortId::new(), TestShortId::new());
}

#[test]
fn short_id_suffix_strips_prefix() {
    let id = TestShortId::from_string("tst-abc");
    assert_eq!(id.suffix(), "abc");
}

#[test]
fn short_id_is_usable_as_hashmap_key_by_str() {
    use std::collections::HashMap;
    let id = TestShortId::new();
    let mut map: HashMap<TestShortId, u32> = HashMap::new();
    map.insert(id, 7);
    assert_eq!(map.get(id.as_str()), None); // &str doesn't directly Borrow<TestShortId>
    assert_eq!(map.get(&id), Some(&7));
}

#[test]
fn uuid_ids_round_trip_through_display_and_from_str() {
    use std::str::FromStr;
    let id = TestUuidId::new();
    let text = id.to_string();
    let parsed = TestUuidId::from_str(&text).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn uuid_ids_round_trip_through_serde_as_plain_string() {
    let id = TestUuidId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id));
}
