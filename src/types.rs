use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque connection identifier (ulid string), generated at connect time.
pub type ConnectionId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Host,
    Admin,
}

/// The eight fixed characteristic categories every participant is dealt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Bandage,
    Actions,
    Fact,
    Phobia,
    Health,
    Hobby,
    Age,
    Profession,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Bandage,
        Category::Actions,
        Category::Fact,
        Category::Phobia,
        Category::Health,
        Category::Hobby,
        Category::Age,
        Category::Profession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bandage => "bandage",
            Category::Actions => "actions",
            Category::Fact => "fact",
            Category::Phobia => "phobia",
            Category::Health => "health",
            Category::Hobby => "hobby",
            Category::Age => "age",
            Category::Profession => "profession",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable card catalog entry, loaded once from the data file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub value: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub experience: Option<u32>,
}

/// A dealt characteristic card. Starts hidden; `revealed` flips once and the
/// snapshot shows it to everyone after that.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub value: String,
    pub description: String,
    pub experience: Option<u32>,
    pub revealed: bool,
}

impl From<&CatalogEntry> for Card {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            value: entry.value.clone(),
            description: entry.description.clone(),
            experience: entry.experience,
            revealed: false,
        }
    }
}

/// One card per category once dealt. BTreeMap keeps wire order stable.
pub type CategoryMap = BTreeMap<Category, Card>;

/// A connected participant. Owned exclusively by the registry; mutated only
/// through session handlers.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ConnectionId,
    pub name: String,
    pub role: Role,
    pub ready: bool,
    pub characteristics: Option<CategoryMap>,
    pub muted: bool,
    pub immunity: bool,
    pub mirror_camera: bool,
}

impl Participant {
    pub fn new(id: ConnectionId, name: String, role: Role) -> Self {
        Self {
            id,
            name,
            role,
            ready: false,
            characteristics: None,
            muted: false,
            immunity: false,
            mirror_camera: false,
        }
    }
}

/// Top-level game phase state, created once per process and reset in place.
#[derive(Debug, Clone)]
pub struct GameState {
    pub started: bool,
    pub started_at: Option<i64>,
    pub ready_to_start: bool,
    pub current_round: u32,
    pub total_rounds: u32,
}

impl GameState {
    pub fn new(total_rounds: u32) -> Self {
        Self {
            started: false,
            started_at: None,
            ready_to_start: false,
            current_round: 0,
            total_rounds,
        }
    }

    /// Back to lobby defaults, keeping the configured round count.
    pub fn reset(&mut self) {
        self.started = false;
        self.started_at = None;
        self.ready_to_start = false;
        self.current_round = 0;
    }
}

/// Voting sub-protocol phase: `none -> selecting -> voting -> none`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VotePhase {
    #[default]
    None,
    Selecting,
    Voting,
}

/// Per-candidate tally line of a finished voting cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoteResultEntry {
    pub id: ConnectionId,
    pub name: String,
    pub votes: u32,
}

/// Append-only audit record of one completed voting cycle.
#[derive(Debug, Clone, Serialize)]
pub struct VotingHistoryEntry {
    pub timestamp: i64,
    pub results: Vec<VoteResultEntry>,
    pub candidates: Vec<ConnectionId>,
}
