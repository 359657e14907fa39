use chrono::{DateTime, Utc};
use ipcsniff_common::classifier::classify;
use ipcsniff_common::process::{ProcessRecord, ProcessRole};
use std::collections::HashMap;

/// Immutable view of the process table taken by one registry refresh.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    monitored_name: String,
    records: HashMap<u32, ProcessRecord>,
    taken_at: DateTime<Utc>,
}

impl ProcessSnapshot {
    pub fn new(monitored_name: impl Into<String>, records: Vec<ProcessRecord>) -> Self {
        Self {
            monitored_name: monitored_name.into(),
            records: records
                .into_iter()
                .map(|record| (record.pid, record))
                .collect(),
            taken_at: Utc::now(),
        }
    }

    pub fn empty(monitored_name: impl Into<String>) -> Self {
        Self::new(monitored_name, Vec::new())
    }

    pub fn monitored_name(&self) -> &str {
        &self.monitored_name
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.records.get(&pid)
    }

    /// Unknown pids are simply not monitored: processes exit at any time.
    pub fn is_monitored(&self, pid: u32) -> bool {
        self.records
            .get(&pid)
            .is_some_and(|record| record.is_named(&self.monitored_name))
    }

    pub fn monitored(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records
            .values()
            .filter(|record| record.is_named(&self.monitored_name))
    }

    pub fn running_pids(&self) -> Vec<u32> {
        self.monitored().map(|record| record.pid).collect()
    }

    pub fn role_of(&self, pid: u32) -> ProcessRole {
        self.records
            .get(&pid)
            .map(|record| classify(record, &self.monitored_name))
            .unwrap_or_default()
    }
}
