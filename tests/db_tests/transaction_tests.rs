//! Transaction tests
//!
//! These tests verify:
//! - Read-your-writes and pending deletes
//! - Flush versus commit
//! - Trigger ordering and replacement
//! - Abandon and drop discard everything

use std::sync::Arc;

use parking_lot::Mutex;
use tidekv::{Direction, WriteView};

use super::{keys, setup_temp_db};

#[test]
fn test_read_your_writes() {
    let (_temp, db) = setup_temp_db();
    db.put(b"base", b"db");
    let mut txn = db.new_transaction();

    txn.put(b"new", b"txn");
    txn.put(b"base", b"txn");

    assert_eq!(txn.get(b"new"), Some(b"txn".to_vec()));
    assert_eq!(txn.get(b"base"), Some(b"txn".to_vec()));
    assert_eq!(db.get(b"new"), None);
    assert_eq!(db.get(b"base"), Some(b"db".to_vec()));
}

#[test]
fn test_pending_delete_reads_as_missing() {
    let (_temp, db) = setup_temp_db();
    db.put(b"k", b"v");
    let mut txn = db.new_transaction();

    txn.delete(b"k");

    assert_eq!(txn.get(b"k"), None);
    assert!(!txn.exists(b"k"));
    assert!(db.exists(b"k"));
}

#[test]
fn test_reads_fall_through_to_live_database() {
    let (_temp, db) = setup_temp_db();
    let txn = db.new_transaction();
    db.put(b"later", b"x");

    assert_eq!(txn.get(b"later"), Some(b"x".to_vec()));
}

#[test]
fn test_commit_applies_everything() {
    let (_temp, db) = setup_temp_db();
    db.put(b"doomed", b"x");
    let mut txn = db.new_transaction();
    txn.put(b"a", b"1");
    txn.put(b"b", b"2");
    txn.delete(b"doomed");
    assert_eq!(txn.mutation_count(), 3);

    let before = db.engine().last_sequence();
    txn.commit();

    assert_eq!(db.engine().last_sequence(), before + 1);
    assert_eq!(keys(db.iter(Direction::Forward)), vec!["a", "b"]);
    assert!(txn.is_empty());
    assert_eq!(txn.mutation_count(), 0);
}

#[test]
fn test_flush_writes_without_running_triggers() {
    let (_temp, db) = setup_temp_db();
    let fired = Arc::new(Mutex::new(0));
    let mut txn = db.new_transaction();
    {
        let fired = Arc::clone(&fired);
        txn.add_anonymous_trigger(move || *fired.lock() += 1);
    }
    txn.put(b"k", b"v");

    txn.flush();

    assert_eq!(db.get(b"k"), Some(b"v".to_vec()));
    assert_eq!(txn.mutation_count(), 0);
    assert_eq!(*fired.lock(), 0);

    txn.commit();
    assert_eq!(*fired.lock(), 1);

    // Triggers run once
    txn.commit();
    assert_eq!(*fired.lock(), 1);
}

#[test]
fn test_keyed_triggers_run_in_key_order_before_anonymous() {
    let (_temp, db) = setup_temp_db();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut txn = db.new_transaction();

    let push = |label: &'static str| {
        let log = Arc::clone(&log);
        move || log.lock().push(label)
    };
    txn.add_anonymous_trigger(push("anon-1"));
    txn.add_commit_trigger("zeta", push("zeta"));
    txn.add_commit_trigger("alpha", push("alpha-first"));
    txn.add_commit_trigger("alpha", push("alpha-second"));
    txn.add_anonymous_trigger(push("anon-2"));
    txn.put(b"k", b"v");

    txn.commit();

    assert_eq!(
        *log.lock(),
        vec!["alpha-second", "zeta", "anon-1", "anon-2"]
    );
}

#[test]
fn test_after_commit_through_write_view() {
    let (_temp, db) = setup_temp_db();
    let fired = Arc::new(Mutex::new(false));

    let mut txn = db.new_transaction();
    {
        let fired = Arc::clone(&fired);
        WriteView::after_commit(&mut txn, "stats", Box::new(move || *fired.lock() = true));
    }
    assert!(!*fired.lock());
    txn.commit();
    assert!(*fired.lock());

    // On the database itself the callback runs at once
    let mut direct = db.clone();
    let fired_now = Arc::new(Mutex::new(false));
    {
        let fired_now = Arc::clone(&fired_now);
        direct.after_commit("stats", Box::new(move || *fired_now.lock() = true));
    }
    assert!(*fired_now.lock());
}

#[test]
fn test_abandon_discards_writes_and_triggers() {
    let (_temp, db) = setup_temp_db();
    let fired = Arc::new(Mutex::new(false));
    let mut txn = db.new_transaction();
    {
        let fired = Arc::clone(&fired);
        txn.add_commit_trigger("t", move || *fired.lock() = true);
    }
    txn.put(b"k", b"v");

    txn.abandon();
    txn.commit();

    assert_eq!(db.get(b"k"), None);
    assert!(!*fired.lock());
}

#[test]
fn test_drop_without_commit_abandons() {
    let (_temp, db) = setup_temp_db();
    {
        let mut txn = db.new_transaction();
        txn.put(b"k", b"v");
    }
    assert_eq!(db.get(b"k"), None);
}
