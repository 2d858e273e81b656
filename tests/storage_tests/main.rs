//! Storage test suite: SSTable files and the storage manager
