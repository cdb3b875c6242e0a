//! Report Data Sets - Row Bundles With Derived Aggregates
//!
//! Aggregates are computed from the rows on every access; nothing is cached.

use std::any::Any;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// A named bundle of rows. One instance per kind per report.
pub trait DataSet: Serialize + Any + Send + Sync + fmt::Debug {
    /// Registry key; stable across builds (unlike `type_name`).
    const KIND: &'static str;

    fn row_count(&self) -> usize;

    /// Template-facing view: rows plus whatever aggregates the kind derives.
    fn context(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Object-safe form of [`DataSet`] used for storage and lookup by kind.
pub trait AnyDataSet: Send + Sync + fmt::Debug {
    fn kind(&self) -> &'static str;
    fn row_count(&self) -> usize;
    fn context(&self) -> Result<Value, serde_json::Error>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: DataSet> AnyDataSet for T {
    fn kind(&self) -> &'static str {
        T::KIND
    }

    fn row_count(&self) -> usize {
        DataSet::row_count(self)
    }

    fn context(&self) -> Result<Value, serde_json::Error> {
        DataSet::context(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
