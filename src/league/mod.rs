use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::debug;

pub mod priority;
pub mod roles;
pub mod selection;
pub mod store;
pub mod sweep;
pub mod teams;

use priority::PriorityUpdate;
use roles::RoleAssignment;
use selection::Selection;
use store::{MemoryStore, SelectionState, SelectionStore};

/// Identifies an isolated state scope, one per guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub u64);

/// A member of the voice channel as reported at the time of the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
}

impl Participant {
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id: ParticipantId(id),
            display_name: display_name.into(),
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// Recoverable failures of the league operations.
///
/// None of these are fatal; the command layer turns them into replies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeagueError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not enough members: need {needed}, have {available}")]
    InsufficientMembers { needed: usize, available: usize },
    #[error("automatic role assignment does not support {0} members")]
    UnsupportedSize(usize),
    #[error("no member matched {0:?}")]
    NoMatch(Vec<String>),
}

pub type LeagueResult<T> = Result<T, LeagueError>;

/// Source of "now" for activity timestamps and the idle sweep.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Case-insensitive display name match used by both the priority list and
/// the role target filter.
pub fn name_matches(participant: &Participant, query: &str) -> bool {
    participant
        .display_name
        .to_lowercase()
        .contains(&query.to_lowercase())
}

/// Split a comma separated user argument into trimmed, non-empty tokens.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Teams produced by [`League::team`].
#[derive(Debug, Clone)]
pub struct Teams {
    pub team_a: Vec<Participant>,
    pub team_b: Vec<Participant>,
}

/// Entry point of the core: per-room state plus the stateless helpers.
///
/// Every state mutation goes through [`SelectionStore::update`], which holds
/// the room's lock for the whole read-modify-write.
pub struct League<S = MemoryStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl League<MemoryStore> {
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            StdRng::from_entropy(),
        )
    }
}

impl Default for League<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SelectionStore> League<S> {
    pub fn with_parts(store: Arc<S>, clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self {
            store,
            clock,
            rng: Mutex::new(rng),
        }
    }

    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // a poisoned rng is still a usable rng
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    pub fn team(&self, room: RoomId, roster: &[Participant]) -> LeagueResult<Teams> {
        debug!(room = room.0, members = roster.len(), "splitting teams");
        let (team_a, team_b) = self.with_rng(|rng| teams::split_teams(roster, rng))?;
        Ok(Teams { team_a, team_b })
    }

    /// Pick `count` members, avoiding the previous pick for this room.
    ///
    /// With `use_priority` set, the room's priority list (if any) restricts
    /// the candidate pool.
    pub fn select(
        &self,
        room: RoomId,
        roster: &[Participant],
        count: usize,
        use_priority: bool,
    ) -> LeagueResult<Selection> {
        let now = self.clock.now();
        let result: LeagueResult<Selection> = self.store.update(room, |state| {
            let priority = if use_priority {
                state.priority.clone()
            } else {
                None
            };
            let (selection, next) = self.with_rng(|rng| {
                selection::select(roster, count, priority.as_ref(), state, now, rng)
            })?;
            *state = next;
            debug!(
                room = room.0,
                selected = selection.selected.len(),
                reset = selection.reset_occurred,
                "selection updated"
            );
            Ok(selection)
        });
        if result.is_err() {
            // a rejected select must not leave a fresh empty room behind
            self.store.remove_if(room, SelectionState::is_empty);
        }
        result
    }

    /// Assign roles to the roster, optionally narrowed to the members whose
    /// names match any of `target`.
    pub fn assign_roles(
        &self,
        room: RoomId,
        roster: &[Participant],
        explicit_roles: Option<&str>,
        target: Option<&[String]>,
    ) -> LeagueResult<Vec<RoleAssignment>> {
        let members: Vec<Participant> = match target {
            Some(queries) if !queries.is_empty() => {
                let narrowed: Vec<Participant> = roster
                    .iter()
                    .filter(|p| queries.iter().any(|q| name_matches(p, q)))
                    .cloned()
                    .collect();
                if narrowed.is_empty() {
                    return Err(LeagueError::NoMatch(queries.to_vec()));
                }
                narrowed
            }
            _ => roster.to_vec(),
        };
        debug!(room = room.0, members = members.len(), "assigning roles");
        self.with_rng(|rng| roles::assign_roles(&members, explicit_roles, rng))
    }

    pub fn set_priority(
        &self,
        room: RoomId,
        roster: &[Participant],
        queries: &[String],
    ) -> LeagueResult<PriorityUpdate> {
        let update = priority::match_queries(roster, queries)?;
        let ids: HashSet<ParticipantId> = update.matched.iter().map(|p| p.id).collect();
        let now = self.clock.now();
        self.store.update(room, |state| {
            state.priority = Some(ids);
            state.last_activity = Some(now);
        });
        debug!(
            room = room.0,
            matched = update.matched.len(),
            "priority list replaced"
        );
        Ok(update)
    }

    /// Returns whether a priority list was present.
    pub fn clear_priority(&self, room: RoomId) -> bool {
        self.store
            .modify(room, |state| state.priority.take().is_some())
            .unwrap_or(false)
    }

    pub fn priority(&self, room: RoomId) -> Option<HashSet<ParticipantId>> {
        self.store.get(room).and_then(|state| state.priority)
    }

    /// Forget the previous pick. Idempotent; the priority list is kept.
    ///
    /// The room is left with nothing for the idle sweep to expire, and is
    /// dropped entirely when it has no priority list either.
    pub fn reset_selection(&self, room: RoomId) {
        self.store.clear(room);
        self.store.remove_if(room, SelectionState::is_empty);
        debug!(room = room.0, "selection reset");
    }
}
