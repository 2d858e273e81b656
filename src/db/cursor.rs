//! Store Cursor
//!
//! Ordered cursor over a pinned engine view.

use std::ops::Bound;

use crate::engine::View;
use crate::error::OrFatal;

use super::{Cursor, Direction};

/// Cursor over the merged memtable + SSTable contents of one [`View`]
///
/// Every step is a fresh seek relative to the current key, so the cursor
/// holds no file positions between calls.
pub struct StoreCursor {
    view: View,
    direction: Direction,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl StoreCursor {
    pub(crate) fn new(view: View, direction: Direction) -> Self {
        Self {
            view,
            direction,
            current: None,
        }
    }

    /// Re-pin to a newer view, keeping the direction; position is reset
    pub(crate) fn repin(&mut self, view: View) {
        self.view = view;
        self.current = None;
    }

    fn position(&mut self, from: Bound<&[u8]>) {
        self.current = self
            .view
            .seek(from, self.direction.is_reverse())
            .or_fatal("cursor seek");
    }
}

impl Cursor for StoreCursor {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        self.current.as_ref().map_or(&[][..], |(k, _)| k.as_slice())
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().map_or(&[][..], |(_, v)| v.as_slice())
    }

    fn next(&mut self) {
        if let Some((key, _)) = self.current.take() {
            self.position(Bound::Excluded(key.as_slice()));
        }
    }

    fn seek(&mut self, target: &[u8]) {
        self.position(Bound::Included(target));
    }

    fn rewind(&mut self) {
        self.position(Bound::Unbounded);
    }

    fn direction(&self) -> Direction {
        self.direction
    }
}
