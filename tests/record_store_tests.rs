//! Record store behaviour against the mock backend.

mod fixtures;

use serde_json::json;
use sheetshard::{DeleteQuery, InsertQuery, SelectQuery, ShardError, ShardId, UpdateQuery};

use fixtures::{Harness, SHEET, START, TOKEN};

fn names(records: &[sheetshard::ShardRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string())
        .collect()
}

// =============================================================================
// select
// =============================================================================

#[test]
fn test_select_merges_in_shard_order_and_tags_rows() {
    let h = Harness::orders();

    let records = h
        .store
        .select(&SelectQuery::new(SHEET).with_criteria(""))
        .unwrap();

    assert_eq!(names(&records), vec!["Ada", "Bob", "Cy"]);
    let shards: Vec<&str> = records.iter().map(|r| r.shard_id.as_str()).collect();
    assert_eq!(shards, vec!["wb-a", "wb-a", "wb-b"]);

    let value = serde_json::to_value(&records[2]).unwrap();
    assert_eq!(value["workbook_id"], "wb-b");
    assert_eq!(value["name"], "Cy");
}

#[test]
fn test_select_applies_criteria_and_columns() {
    let h = Harness::orders();

    let query = SelectQuery::new(SHEET)
        .with_criteria(h.store.escape(r#""team"="${team}""#, &[("${team}", "red")]))
        .with_columns(["name"]);
    let records = h.store.select(&query).unwrap();

    assert_eq!(names(&records), vec!["Ada", "Cy"]);
    assert!(records.iter().all(|r| r.get("team").is_none()));
}

#[test]
fn test_select_with_no_matches_is_empty() {
    let h = Harness::orders();
    let records = h
        .store
        .select(&SelectQuery::new(SHEET).with_criteria(r#""name"="Nobody""#))
        .unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_select_contacts_every_shard_once() {
    let h = Harness::orders().warmed();

    h.store
        .select(&SelectQuery::new(SHEET).with_criteria(""))
        .unwrap();

    assert_eq!(h.backend.calls_to("wb-a"), 1);
    assert_eq!(h.backend.calls_to("wb-b"), 1);
    assert_eq!(h.backend.calls_to("wb-x"), 0);
}

#[test]
fn test_select_missing_arguments_make_no_requests() {
    let h = Harness::orders();

    let missing_criteria = h.store.select(&SelectQuery::new(SHEET));
    assert!(matches!(missing_criteria, Err(ShardError::MissingData(ref m)) if m.contains("criteria")));

    let blank_table = h.store.select(&SelectQuery::new("  ").with_criteria(""));
    assert!(matches!(blank_table, Err(ShardError::MissingData(ref m)) if m.contains("table")));

    assert!(h.backend.calls().is_empty());
}

#[test]
fn test_select_fails_when_any_shard_fails() {
    let h = Harness::orders();
    h.backend.fail_workbook("wb-b", "Rate limit exceeded");

    let result = h.store.select(&SelectQuery::new(SHEET).with_criteria(""));

    match result {
        Err(ShardError::UnexpectedResponse(message)) => assert_eq!(message, "Rate limit exceeded"),
        other => panic!("expected UnexpectedResponse, got {:?}", other),
    }
}

#[test]
fn test_every_request_carries_bearer_token() {
    let h = Harness::orders();

    h.store
        .select(&SelectQuery::new(SHEET).with_criteria(""))
        .unwrap();

    let calls = h.backend.calls();
    assert!(!calls.is_empty());
    let expected = format!("Bearer {}", TOKEN);
    assert!(calls
        .iter()
        .all(|c| c.authorization.as_deref() == Some(expected.as_str())));
}

// =============================================================================
// insert
// =============================================================================

#[test]
fn test_insert_goes_to_first_shard() {
    let h = Harness::orders();

    let inserted = h
        .store
        .insert(&InsertQuery::new(SHEET).with_data(json!({"name": "Di"})))
        .unwrap();

    assert!(inserted);
    assert_eq!(h.backend.rows("wb-a", SHEET).len(), 3);
    assert_eq!(h.backend.rows("wb-b", SHEET).len(), 1);
}

#[test]
fn test_insert_accepts_row_arrays() {
    let h = Harness::orders();

    let rows = json!([{"name": "Di"}, {"name": "Ed"}]);
    assert!(h.store.insert(&InsertQuery::new(SHEET).with_data(rows)).unwrap());
    assert_eq!(h.backend.rows("wb-a", SHEET).len(), 4);
}

#[test]
fn test_insert_skips_full_shard_and_marks_it() {
    let h = Harness::orders().warmed();
    h.backend.set_row_limit("wb-a", 2);

    let inserted = h
        .store
        .insert(&InsertQuery::new(SHEET).with_data(json!({"name": "Di"})))
        .unwrap();

    assert!(inserted);
    assert_eq!(h.backend.rows("wb-b", SHEET).len(), 2);
    assert_eq!(h.store.ledger().marked_at(&ShardId::new("wb-a")).unwrap(), Some(START));
    assert_eq!(h.store.ledger().marked_at(&ShardId::new("wb-b")).unwrap(), None);
}

#[test]
fn test_avoided_shard_is_not_contacted() {
    let h = Harness::orders().warmed();
    h.backend.set_row_limit("wb-a", 2);
    let query = InsertQuery::new(SHEET).with_data(json!({"name": "Di"}));
    h.store.insert(&query).unwrap();
    h.backend.clear_calls();

    h.clock.advance(3599);
    assert!(h.store.insert(&query).unwrap());

    assert_eq!(h.backend.calls_to("wb-a"), 0);
    assert_eq!(h.backend.calls_to("wb-b"), 1);
}

#[test]
fn test_shard_is_retried_after_window() {
    let h = Harness::orders().warmed();
    h.backend.set_row_limit("wb-a", 2);
    let query = InsertQuery::new(SHEET).with_data(json!({"name": "Di"}));
    h.store.insert(&query).unwrap();
    h.backend.clear_calls();

    h.clock.advance(3600);
    assert!(!h.store.ledger().is_avoided(&ShardId::new("wb-a")).unwrap());
    // Expired marker was purged
    assert_eq!(h.store.ledger().marked_at(&ShardId::new("wb-a")).unwrap(), None);

    assert!(h.store.insert(&query).unwrap());
    assert_eq!(h.backend.calls_to("wb-a"), 1);
    // Still full, so marked again at the new time
    assert_eq!(
        h.store.ledger().marked_at(&ShardId::new("wb-a")).unwrap(),
        Some(START + 3600)
    );
}

#[test]
fn test_insert_returns_false_when_every_shard_is_full() {
    let h = Harness::orders().warmed();
    h.backend.set_row_limit("wb-a", 2);
    h.backend.set_row_limit("wb-b", 1);

    let inserted = h
        .store
        .insert(&InsertQuery::new(SHEET).with_data(json!({"name": "Di"})))
        .unwrap();

    assert!(!inserted);
    assert!(h.store.ledger().is_avoided(&ShardId::new("wb-a")).unwrap());
    assert!(h.store.ledger().is_avoided(&ShardId::new("wb-b")).unwrap());

    // Nothing is contacted until the window passes
    h.backend.clear_calls();
    let again = h
        .store
        .insert(&InsertQuery::new(SHEET).with_data(json!({"name": "Di"})))
        .unwrap();
    assert!(!again);
    assert!(h.backend.calls().is_empty());
}

#[test]
fn test_alternate_capacity_code_is_recognised() {
    let h = Harness::orders();
    h.backend.set_row_limit("wb-a", 2);
    h.backend.set_capacity_code("wb-a", 2872);

    assert!(h
        .store
        .insert(&InsertQuery::new(SHEET).with_data(json!({"name": "Di"})))
        .unwrap());
    assert!(h.store.ledger().is_avoided(&ShardId::new("wb-a")).unwrap());
}

#[test]
fn test_other_failure_stops_the_walk() {
    let h = Harness::orders().warmed();
    h.backend.fail_workbook("wb-a", "Internal error");

    let result = h
        .store
        .insert(&InsertQuery::new(SHEET).with_data(json!({"name": "Di"})));

    assert!(matches!(result, Err(ShardError::UnexpectedResponse(ref m)) if m == "Internal error"));
    assert_eq!(h.backend.calls_to("wb-b"), 0);
    assert_eq!(h.store.ledger().marked_at(&ShardId::new("wb-a")).unwrap(), None);
}

#[test]
fn test_insert_rejects_bad_data() {
    let h = Harness::orders();

    let missing = h.store.insert(&InsertQuery::new(SHEET));
    assert!(matches!(missing, Err(ShardError::MissingData(ref m)) if m.contains("data")));

    let scalar = h.store.insert(&InsertQuery::new(SHEET).with_data(json!("Di")));
    assert!(matches!(scalar, Err(ShardError::InvalidType(_))));

    let empty = h.store.insert(&InsertQuery::new(SHEET).with_data(json!([])));
    assert!(matches!(empty, Err(ShardError::InvalidType(_))));

    assert!(h.backend.calls().is_empty());
}

// =============================================================================
// update
// =============================================================================

#[test]
fn test_update_fans_out_with_or_semantics() {
    let h = Harness::orders().warmed();

    let query = UpdateQuery::new(SHEET)
        .with_criteria(r#""name"="Ada""#)
        .with_data(json!({"team": "green"}));
    assert!(h.store.update(&query).unwrap());

    assert_eq!(h.backend.calls_to("wb-a"), 1);
    assert_eq!(h.backend.calls_to("wb-b"), 1);
    assert_eq!(h.backend.rows("wb-a", SHEET)[0]["team"], "green");
}

#[test]
fn test_update_with_no_matches_is_false() {
    let h = Harness::orders();
    let query = UpdateQuery::new(SHEET)
        .with_criteria(r#""name"="Nobody""#)
        .with_data(json!({"team": "green"}));
    assert!(!h.store.update(&query).unwrap());
}

#[test]
fn test_update_explicit_shard_only() {
    let h = Harness::orders().warmed();

    let query = UpdateQuery::new(SHEET)
        .with_criteria(r#""team"="red""#)
        .with_data(json!({"team": "green"}))
        .with_shard("wb-b");
    assert!(h.store.update(&query).unwrap());

    assert_eq!(h.backend.calls_to("wb-a"), 0);
    assert_eq!(h.backend.calls_to("wb-b"), 1);
    assert_eq!(h.backend.rows("wb-a", SHEET)[0]["team"], "red");
    assert_eq!(h.backend.rows("wb-b", SHEET)[0]["team"], "green");
}

#[test]
fn test_update_explicit_shard_needs_no_shard_list() {
    let h = Harness::orders();

    let query = UpdateQuery::new(SHEET)
        .with_criteria("")
        .with_data(json!({"team": "green"}))
        .with_shard("wb-x");
    assert!(h.store.update(&query).unwrap());

    assert_eq!(h.backend.calls_to("workbooks"), 0);
}

#[test]
fn test_update_blank_shard_fans_out() {
    let h = Harness::orders().warmed();

    let query = UpdateQuery::new(SHEET)
        .with_criteria(r#""name"="Cy""#)
        .with_data(json!({"team": "green"}))
        .with_shard("   ");
    assert!(h.store.update(&query).unwrap());

    assert_eq!(h.backend.calls_to("wb-a"), 1);
    assert_eq!(h.backend.calls_to("wb-b"), 1);
}

#[test]
fn test_update_failure_status_wins() {
    let h = Harness::orders();
    h.backend.fail_workbook("wb-b", "Worksheet is locked");

    let query = UpdateQuery::new(SHEET)
        .with_criteria(r#""name"="Ada""#)
        .with_data(json!({"team": "green"}));
    let result = h.store.update(&query);

    assert!(matches!(result, Err(ShardError::UnexpectedResponse(ref m)) if m == "Worksheet is locked"));
}

#[test]
fn test_update_rejects_non_object_data() {
    let h = Harness::orders();
    let query = UpdateQuery::new(SHEET)
        .with_criteria("")
        .with_data(json!(["team", "green"]));
    assert!(matches!(h.store.update(&query), Err(ShardError::InvalidType(_))));
    assert!(h.backend.calls().is_empty());
}

// =============================================================================
// delete
// =============================================================================

#[test]
fn test_delete_fans_out() {
    let h = Harness::orders();

    let query = DeleteQuery::new(SHEET).with_criteria(r#""team"="red""#);
    assert!(h.store.delete(&query).unwrap());

    assert_eq!(h.backend.rows("wb-a", SHEET).len(), 1);
    assert!(h.backend.rows("wb-b", SHEET).is_empty());
}

#[test]
fn test_delete_with_no_matches_is_false() {
    let h = Harness::orders();
    let query = DeleteQuery::new(SHEET).with_criteria(r#""name"="Nobody""#);
    assert!(!h.store.delete(&query).unwrap());
}

#[test]
fn test_delete_single_row_on_explicit_shard() {
    let h = Harness::orders().warmed();

    // Bob is the second data row of wb-a
    let query = DeleteQuery::new(SHEET)
        .with_criteria("")
        .with_shard("wb-a")
        .with_row_id(3);
    assert!(h.store.delete(&query).unwrap());

    let remaining = h.backend.rows("wb-a", SHEET);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["name"], "Ada");
    assert_eq!(h.backend.calls_to("wb-b"), 0);

    let sent = &h.backend.calls()[0];
    assert_eq!(sent.form_value("row_array"), Some("[3]"));
    assert_eq!(sent.form_value("delete_rows"), Some("true"));
}

#[test]
fn test_delete_clears_full_marker() {
    let h = Harness::orders();
    h.backend.set_row_limit("wb-a", 2);
    h.store
        .insert(&InsertQuery::new(SHEET).with_data(json!({"name": "Di"})))
        .unwrap();
    assert!(h.store.ledger().is_avoided(&ShardId::new("wb-a")).unwrap());

    let query = DeleteQuery::new(SHEET).with_criteria(r#""name"="Bob""#);
    assert!(h.store.delete(&query).unwrap());

    assert_eq!(h.store.ledger().marked_at(&ShardId::new("wb-a")).unwrap(), None);
    // wb-a has room again
    h.backend.clear_calls();
    assert!(h
        .store
        .insert(&InsertQuery::new(SHEET).with_data(json!({"name": "Ed"})))
        .unwrap());
    assert_eq!(h.backend.calls_to("wb-a"), 1);
    assert_eq!(h.backend.calls_to("wb-b"), 0);
}

#[test]
fn test_delete_keeps_marker_when_nothing_deleted() {
    let h = Harness::orders();
    h.backend.set_row_limit("wb-a", 2);
    h.store
        .insert(&InsertQuery::new(SHEET).with_data(json!({"name": "Di"})))
        .unwrap();

    let query = DeleteQuery::new(SHEET).with_criteria(r#""name"="Di""#);
    assert!(h.store.delete(&query).unwrap());

    // Di landed on wb-b; wb-a deleted nothing and stays avoided
    assert!(h.store.ledger().is_avoided(&ShardId::new("wb-a")).unwrap());
}
