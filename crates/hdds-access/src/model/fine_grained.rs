// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-peer read/write allow-lists attached to a single topic rule.

use super::Handle;
use crate::error::{AccessError, Result};

/// Data flow a fine-grained list restricts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Precedence tier of a fine-grained list. App-level lists win.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FineGrainedTier {
    Admin,
    App,
}

/// Explicit participant handles allowed to read and to write one topic.
///
/// Lists are bounded by the capacity given at construction. Input slices are
/// `0`-terminated: anything after the first `0` is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FineGrainedTopic {
    read: Vec<Handle>,
    write: Vec<Handle>,
}

impl FineGrainedTopic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lists(read: &[Handle], write: &[Handle], capacity: usize) -> Result<Self> {
        Ok(Self {
            read: bounded(read, capacity)?,
            write: bounded(write, capacity)?,
        })
    }

    pub fn read(&self) -> &[Handle] {
        &self.read
    }

    pub fn write(&self) -> &[Handle] {
        &self.write
    }

    pub fn list(&self, direction: Direction) -> &[Handle] {
        match direction {
            Direction::Read => &self.read,
            Direction::Write => &self.write,
        }
    }

    /// Scan until `handle` is found (allow) or the list ends (deny).
    pub fn allows(&self, direction: Direction, handle: Handle) -> bool {
        handle != 0
            && self
                .list(direction)
                .iter()
                .take_while(|&&h| h != 0)
                .any(|&h| h == handle)
    }

    pub fn add(&mut self, direction: Direction, handle: Handle, capacity: usize) -> Result<()> {
        if handle == 0 {
            return Err(AccessError::BadParameter(
                "handle 0 cannot be listed".to_string(),
            ));
        }
        let list = match direction {
            Direction::Read => &mut self.read,
            Direction::Write => &mut self.write,
        };
        if list.contains(&handle) {
            return Ok(());
        }
        if list.len() >= capacity {
            return Err(AccessError::OutOfResources(format!(
                "fine-grained list full ({} entries)",
                capacity
            )));
        }
        list.try_reserve(1)?;
        list.push(handle);
        Ok(())
    }

    pub fn remove(&mut self, direction: Direction, handle: Handle) -> bool {
        let list = match direction {
            Direction::Read => &mut self.read,
            Direction::Write => &mut self.write,
        };
        let before = list.len();
        list.retain(|&h| h != handle);
        list.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}

fn bounded(handles: &[Handle], capacity: usize) -> Result<Vec<Handle>> {
    let live: Vec<Handle> = handles.iter().copied().take_while(|&h| h != 0).collect();
    if live.len() > capacity {
        return Err(AccessError::OutOfResources(format!(
            "fine-grained list of {} entries exceeds capacity {}",
            live.len(),
            capacity
        )));
    }
    let mut out = Vec::new();
    out.try_reserve(live.len())?;
    out.extend(live);
    Ok(out)
}
