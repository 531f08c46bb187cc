use rand::seq::SliceRandom;
use rand::Rng;

use super::{LeagueError, LeagueResult, Participant};

/// Shuffle the roster and cut it in half. The second team gets the odd one.
pub fn split_teams<R: Rng + ?Sized>(
    roster: &[Participant],
    rng: &mut R,
) -> LeagueResult<(Vec<Participant>, Vec<Participant>)> {
    if roster.len() < 2 {
        return Err(LeagueError::InsufficientMembers {
            needed: 2,
            available: roster.len(),
        });
    }

    let mut members = roster.to_vec();
    members.shuffle(rng);
    let team_b = members.split_off(members.len() / 2);
    Ok((members, team_b))
}
