use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use super::store::SelectionState;
use super::{LeagueError, LeagueResult, Participant, ParticipantId};

/// Outcome of one selection round.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Order carries no meaning.
    pub selected: Vec<Participant>,
    /// Everyone in the pool had been picked last round, so the rotation
    /// started over.
    pub reset_occurred: bool,
    /// Roster members left out by the priority list.
    pub excluded: Vec<Participant>,
    /// How many fewer than requested were picked because the priority list
    /// left too few eligible members.
    pub short_by: usize,
}

/// Pick `count` members of `roster`, preferring those not picked last time.
///
/// Returns the selection together with the state to store for the room.
/// Ids in `state` that are no longer in the roster are ignored.
pub fn select<R: Rng + ?Sized>(
    roster: &[Participant],
    count: usize,
    priority: Option<&HashSet<ParticipantId>>,
    state: &SelectionState,
    now: DateTime<Utc>,
    rng: &mut R,
) -> LeagueResult<(Selection, SelectionState)> {
    if count == 0 {
        return Err(LeagueError::InvalidArgument(
            "count must be at least 1".to_string(),
        ));
    }
    if count > roster.len() {
        return Err(LeagueError::InvalidArgument(format!(
            "cannot select {} from a roster of {}",
            count,
            roster.len()
        )));
    }

    let restriction = priority.filter(|ids| !ids.is_empty());
    let (pool, excluded): (Vec<&Participant>, Vec<&Participant>) = match restriction {
        Some(ids) => roster.iter().partition(|p| ids.contains(&p.id)),
        None => (roster.iter().collect(), Vec::new()),
    };

    let (mut eligible, mut picked_last): (Vec<&Participant>, Vec<&Participant>) = pool
        .iter()
        .copied()
        .partition(|p| !state.last_selected.contains(&p.id));

    // an empty pool has nothing to start over with
    let reset_occurred = eligible.is_empty() && !pool.is_empty();
    if reset_occurred {
        eligible = pool.clone();
        picked_last.clear();
    }

    let mut short_by = 0;
    let selected: Vec<&Participant> = if eligible.len() >= count {
        eligible.choose_multiple(rng, count).copied().collect()
    } else if restriction.is_some() {
        short_by = count - eligible.len();
        eligible
    } else {
        let shortfall = count - eligible.len();
        if picked_last.len() < shortfall {
            return Err(LeagueError::InsufficientMembers {
                needed: count,
                available: eligible.len() + picked_last.len(),
            });
        }
        picked_last.shuffle(rng);
        eligible.extend(picked_last.into_iter().take(shortfall));
        eligible
    };

    let next = SelectionState {
        last_selected: selected.iter().map(|p| p.id).collect(),
        priority: state.priority.clone(),
        last_activity: Some(now),
    };
    let selection = Selection {
        selected: selected.into_iter().cloned().collect(),
        reset_occurred,
        excluded: excluded.into_iter().cloned().collect(),
        short_by,
    };
    Ok((selection, next))
}
