//! Full-text index test suite


use tempfile::TempDir;
use tidekv::fulltext::{parse_terms, FullTextIndex, ResultIterator};
use tidekv::{Config, Cursor, Db};

pub fn setup() -> (TempDir, Db, FullTextIndex) {
    let temp_dir = TempDir::new().unwrap();
    let db = Db::open(Config::builder().data_dir(temp_dir.path()).build()).unwrap();
    let index = FullTextIndex::open(&db, "contacts").unwrap();
    (temp_dir, db, index)
}

/// Index `text` for `doc_id` in its own committed transaction
pub fn index_doc(db: &Db, index: &FullTextIndex, doc_id: &str, sort_key: &str, text: &str) {
    let mut txn = db.new_transaction();
    index.update_index(&mut txn, doc_id, sort_key, &parse_terms(text));
    txn.commit();
}

pub fn doc_ids<C: Cursor>(mut results: ResultIterator<C>) -> Vec<String> {
    let mut out = Vec::new();
    while results.valid() {
        out.push(results.doc_id().to_string());
        results.next();
    }
    out
}
