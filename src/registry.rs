//! Registries - Per-Report Parameter and Data Set Stores
//!
//! Keys are unique within one report. Reads are typed and checked; a
//! mismatch is an error, never an unchecked cast.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::datasets::{AnyDataSet, DataSet};
use crate::parameters::{FromParameter, ParameterValue, ReportParameter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Parameter,
    DataSet,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parameter => f.write_str("parameter"),
            Self::DataSet => f.write_str("dataset"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A {kind} with the name '{key}' already exists for the Report '{report}'")]
    DuplicateKey {
        report: String,
        kind: EntryKind,
        key: String,
    },

    #[error("A {kind} with the name '{key}' does not exist for the Report '{report}'")]
    NotFound {
        report: String,
        kind: EntryKind,
        key: String,
    },

    #[error("Parameter '{name}' of the Report '{report}' holds {actual}, not {expected}")]
    TypeMismatch {
        report: String,
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Parameters of one report, iterated in name order.
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    report: String,
    entries: BTreeMap<String, ReportParameter>,
}

impl ParameterRegistry {
    pub fn new(report: impl Into<String>) -> Self {
        Self {
            report: report.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, parameter: ReportParameter) -> Result<(), RegistryError> {
        if self.entries.contains_key(&parameter.name) {
            return Err(RegistryError::DuplicateKey {
                report: self.report.clone(),
                kind: EntryKind::Parameter,
                key: parameter.name,
            });
        }
        tracing::trace!(report = %self.report, parameter = %parameter.name, "parameter added");
        self.entries.insert(parameter.name.clone(), parameter);
        Ok(())
    }

    pub fn get_value(&self, name: &str) -> Result<&ParameterValue, RegistryError> {
        self.entries
            .get(name)
            .map(|p| &p.value)
            .ok_or_else(|| RegistryError::NotFound {
                report: self.report.clone(),
                kind: EntryKind::Parameter,
                key: name.to_string(),
            })
    }

    pub fn get<T: FromParameter>(&self, name: &str) -> Result<T, RegistryError> {
        let value = self.get_value(name)?;
        T::from_parameter(value).ok_or_else(|| RegistryError::TypeMismatch {
            report: self.report.clone(),
            name: name.to_string(),
            expected: T::TYPE_NAME,
            actual: value.type_name(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportParameter> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Data sets of one report, keyed by [`DataSet::KIND`].
#[derive(Debug)]
pub struct DataSetRegistry {
    report: String,
    entries: BTreeMap<&'static str, Box<dyn AnyDataSet>>,
}

impl DataSetRegistry {
    pub fn new(report: impl Into<String>) -> Self {
        Self {
            report: report.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn add<T: DataSet>(&mut self, dataset: T) -> Result<(), RegistryError> {
        if self.entries.contains_key(T::KIND) {
            return Err(RegistryError::DuplicateKey {
                report: self.report.clone(),
                kind: EntryKind::DataSet,
                key: T::KIND.to_string(),
            });
        }
        tracing::trace!(
            report = %self.report,
            dataset = T::KIND,
            rows = DataSet::row_count(&dataset),
            "dataset added"
        );
        self.entries.insert(T::KIND, Box::new(dataset));
        Ok(())
    }

    pub fn get<T: DataSet>(&self) -> Result<&T, RegistryError> {
        self.get_by_kind(T::KIND)?
            .as_any()
            .downcast_ref::<T>()
            // Another type registered under the same KIND string.
            .ok_or_else(|| self.not_found(T::KIND))
    }

    pub fn get_by_kind(&self, kind: &str) -> Result<&dyn AnyDataSet, RegistryError> {
        self.entries
            .get(kind)
            .map(|d| d.as_ref())
            .ok_or_else(|| self.not_found(kind))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn AnyDataSet> {
        self.entries.values().map(|d| d.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn not_found(&self, kind: &str) -> RegistryError {
        RegistryError::NotFound {
            report: self.report.clone(),
            kind: EntryKind::DataSet,
            key: kind.to_string(),
        }
    }
}
