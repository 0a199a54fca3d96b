//! Conflict resolution strategies.

use serde::{Deserialize, Serialize};

use crate::models::{ConflictWinner, Task};

/// Policy for settling a detected conflict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum SyncStrategy {
    /// The stored version always wins
    ServerWins,
    /// The submitted version always wins
    ClientWins,
    /// The version with the later `updated_at` wins; ties go to the server
    #[default]
    TimeBased,
    /// Nothing is written; both versions are reported back to the caller
    #[serde(rename = "manual_resolve")]
    Manual,
}

impl SyncStrategy {
    /// Wire tag for this strategy
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerWins => "server_wins",
            Self::ClientWins => "client_wins",
            Self::TimeBased => "time_based",
            Self::Manual => "manual_resolve",
        }
    }

    /// Parse a strategy tag, accepting hyphenated and short aliases.
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase().replace('-', "_");
        match tag.as_str() {
            "server_wins" | "server" => Some(Self::ServerWins),
            "client_wins" | "client" => Some(Self::ClientWins),
            "time_based" | "time" | "lww" => Some(Self::TimeBased),
            "manual_resolve" | "manual" => Some(Self::Manual),
            _ => None,
        }
    }

    /// Parse a strategy tag, falling back to [`SyncStrategy::TimeBased`] for
    /// anything unrecognized.
    pub fn parse_lenient(tag: &str) -> Self {
        Self::parse(tag).unwrap_or_else(|| {
            tracing::warn!(tag, "Unknown sync strategy, using time_based");
            Self::TimeBased
        })
    }

    /// Whether conflicts are settled without the caller's involvement
    pub const fn auto_resolves(self) -> bool {
        !matches!(self, Self::Manual)
    }

    /// Pick the side that survives a conflict.
    ///
    /// `Manual` never picks the submitted version; the stored state is left
    /// as it is.
    pub fn winner(self, local: &Task, server: &Task) -> ConflictWinner {
        match self {
            Self::ClientWins => ConflictWinner::Local,
            Self::ServerWins | Self::Manual => ConflictWinner::Server,
            Self::TimeBased => {
                if local.updated_at > server.updated_at {
                    ConflictWinner::Local
                } else {
                    ConflictWinner::Server
                }
            }
        }
    }

    /// Resolve a conflict to exactly one of the two inputs, unmodified.
    pub fn resolve(self, local: &Task, server: &Task) -> Task {
        match self.winner(local, server) {
            ConflictWinner::Local => local.clone(),
            ConflictWinner::Server => server.clone(),
        }
    }
}

impl From<String> for SyncStrategy {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl std::fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
