use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;

use super::{split_list, LeagueError, LeagueResult, Participant};

/// The five League of Legends lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Top,
    Jungle,
    Mid,
    Adc,
    Support,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Top, Role::Jungle, Role::Mid, Role::Adc, Role::Support];
    const SOLO: [Role; 3] = [Role::Top, Role::Jungle, Role::Mid];
    const BOT: [Role; 2] = [Role::Adc, Role::Support];

    pub fn label(self) -> &'static str {
        match self {
            Role::Top => "TOP",
            Role::Jungle => "JG",
            Role::Mid => "MID",
            Role::Adc => "ADC",
            Role::Support => "SUP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub participant: Participant,
    pub role: String,
}

/// Give each member one role, in roster order.
///
/// Without `explicit` the fixed lanes are used: up to three members share
/// TOP/JG/MID, four members add one bot lane, five fill every lane.
/// `explicit` is a comma separated list of role names; duplicates are
/// dropped and there must be at least one per member.
pub fn assign_roles<R: Rng + ?Sized>(
    roster: &[Participant],
    explicit: Option<&str>,
    rng: &mut R,
) -> LeagueResult<Vec<RoleAssignment>> {
    if roster.is_empty() {
        return Err(LeagueError::InsufficientMembers {
            needed: 1,
            available: 0,
        });
    }

    let roles = match explicit.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => explicit_roles(raw, roster.len(), rng)?,
        None => automatic_roles(roster.len(), rng)?,
    };

    Ok(roster
        .iter()
        .cloned()
        .zip(roles)
        .map(|(participant, role)| RoleAssignment { participant, role })
        .collect())
}

fn automatic_roles<R: Rng + ?Sized>(size: usize, rng: &mut R) -> LeagueResult<Vec<String>> {
    let roles: Vec<Role> = match size {
        1..=3 => {
            let mut solo = Role::SOLO.to_vec();
            solo.shuffle(rng);
            solo.truncate(size);
            solo
        }
        4 => {
            let mut solo = Role::SOLO.to_vec();
            solo.shuffle(rng);
            let bot = *Role::BOT.choose(rng).unwrap_or(&Role::Adc);
            // the bot laner goes to a random member
            let seat = (0..size).choose(rng).unwrap_or(0);
            solo.insert(seat, bot);
            solo
        }
        5 => {
            let mut all = Role::ALL.to_vec();
            all.shuffle(rng);
            all
        }
        n => return Err(LeagueError::UnsupportedSize(n)),
    };
    Ok(roles.into_iter().map(|role| role.label().to_string()).collect())
}

fn explicit_roles<R: Rng + ?Sized>(
    raw: &str,
    size: usize,
    rng: &mut R,
) -> LeagueResult<Vec<String>> {
    let mut unique: Vec<String> = Vec::new();
    for token in split_list(raw) {
        let role = token.to_uppercase();
        if !unique.contains(&role) {
            unique.push(role);
        }
    }

    if unique.len() < size {
        return Err(LeagueError::InvalidArgument(format!(
            "{} distinct roles given for {} members",
            unique.len(),
            size
        )));
    }
    unique.shuffle(rng);
    unique.truncate(size);
    Ok(unique)
}
