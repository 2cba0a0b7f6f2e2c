// fmctl - CLI for the Cisco Firepower Management Center API
// Copyright (C) 2026 The fmctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use thiserror::Error;

/// Failures raised while talking to the FMC or reshaping its data.
#[derive(Debug, Error)]
pub enum FmcError {
    #[error("authentication failed at {url}: {reason}")]
    Auth { url: String, reason: String },

    #[error("HTTP {status} from {method} {url}\n\nResponse: {body}")]
    Transport {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("request to {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("bulk create of {resource} returned {created} object(s) for {requested} requested")]
    ShortCreate {
        resource: &'static str,
        requested: usize,
        created: usize,
    },

    #[error("{kind} `{name}` not found")]
    Lookup { kind: &'static str, name: String },

    #[error("invalid entry `{input}`: {reason}")]
    Parse { input: String, reason: String },

    #[error(
        "created {} object(s) but group `{group}` was not updated; remove them manually if unused: {}",
        created.len(),
        created.join(", ")
    )]
    PartialCommit {
        group: String,
        created: Vec<String>,
        #[source]
        source: Box<FmcError>,
    },
}

impl FmcError {
    pub fn parse(input: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            input: input.into(),
            reason: reason.to_string(),
        }
    }
}
