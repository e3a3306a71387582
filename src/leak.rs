//! Process-lifetime containers that only ever grow.
//!
//! The server owns a single [`LeakStore`] for its whole lifetime and hands it
//! to the handlers through `Arc`. None of the leak paths read the data back.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::body::Bytes;
use http::{HeaderMap, Method, Uri, Version};
use serde::Serialize;

use crate::error::AppResult;
use crate::random::random_string;

pub const LEAK_RECORD_TEXT: &str = "help i am leaking";
pub const SLOT_KEY_LEN: usize = 10;
pub const SLOT_VALUE_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct LeakRecord {
    pub some_string: String,
}

impl Default for LeakRecord {
    fn default() -> Self {
        Self {
            some_string: LEAK_RECORD_TEXT.to_string(),
        }
    }
}

/// Owned copy of an inbound request, detached from the transport.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub enum Retained {
    Record(LeakRecord),
    Request(RequestSnapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeakStats {
    pub retained: usize,
    pub global_slots: usize,
}

#[derive(Debug, Default)]
pub struct LeakStore {
    retained: Mutex<Vec<Retained>>,
    global_slots: Mutex<HashMap<String, String>>,
}

impl LeakStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one [`LeakRecord`]; returns the new length of the sequence.
    pub fn add_object_leak(&self) -> AppResult<usize> {
        self.push(Retained::Record(LeakRecord::default()))
    }

    /// Keeps the whole request alive, headers and body included.
    pub fn add_request_leak(&self, request: RequestSnapshot) -> AppResult<usize> {
        self.push(Retained::Request(request))
    }

    /// Stores a random 100-char value under a fresh random 10-char key.
    ///
    /// Returns the generated key.
    pub fn add_global_slot_leak(&self) -> AppResult<String> {
        let key = random_string(SLOT_KEY_LEN)?;
        let value = random_string(SLOT_VALUE_LEN)?;

        self.global_slots.lock()?.insert(key.clone(), value);
        Ok(key)
    }

    pub fn retained_len(&self) -> AppResult<usize> {
        Ok(self.retained.lock()?.len())
    }

    pub fn global_slot_count(&self) -> AppResult<usize> {
        Ok(self.global_slots.lock()?.len())
    }

    pub fn stats(&self) -> AppResult<LeakStats> {
        Ok(LeakStats {
            retained: self.retained_len()?,
            global_slots: self.global_slot_count()?,
        })
    }

    fn push(&self, item: Retained) -> AppResult<usize> {
        let mut retained = self.retained.lock()?;
        retained.push(item);
        Ok(retained.len())
    }
}
