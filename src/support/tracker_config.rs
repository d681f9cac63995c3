//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Uidtrack.
//
// Uidtrack is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Uidtrack is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Uidtrack. If not, see <http://www.gnu.org/licenses/>.

use serde::{Deserialize, Serialize};

use super::error::Error;

/// Configuration for mailbox change tracking.
///
/// This is normally embedded in the server's own configuration file; every
/// field has a usable default, so an empty document is a valid configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Options for the per-session analysers.
    pub analyser: AnalyserConfig,

    /// Options for the cache of live mailbox trackers.
    pub cache: CacheConfig,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnalyserConfig {
    /// If true, a session is not told about flag changes it made itself.
    ///
    /// This corresponds to the `.SILENT` variants of `STORE`, where the client
    /// has asked not to receive `FETCH` responses for its own modifications.
    /// Changes made by other sessions are always reported.
    pub silent_flag_changes: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// If true, a mailbox tracker is dropped from the cache as soon as its
    /// last listener goes away.
    ///
    /// When false, trackers stay resident until the mailbox is deleted or
    /// found not to exist, which avoids rebuilding the UID cache when a
    /// client repeatedly selects and deselects the same mailbox.
    pub evict_unused: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { evict_unused: true }
    }
}

impl TrackerConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }
}
