use super::{name_matches, LeagueError, LeagueResult, Participant};

/// Result of matching name queries against the roster.
#[derive(Debug, Clone, Default)]
pub struct PriorityUpdate {
    /// Roster order, each participant at most once.
    pub matched: Vec<Participant>,
    /// Queries that matched nobody.
    pub not_found: Vec<String>,
}

/// Resolve `queries` to roster members by case-insensitive substring.
///
/// A query may match several members. Fails with `NoMatch` when nothing
/// matched at all, so the caller can leave its previous list in place.
pub fn match_queries(roster: &[Participant], queries: &[String]) -> LeagueResult<PriorityUpdate> {
    let mut not_found = Vec::new();
    let mut hit = vec![false; roster.len()];

    for query in queries {
        let mut any = false;
        for (i, participant) in roster.iter().enumerate() {
            if name_matches(participant, query) {
                hit[i] = true;
                any = true;
            }
        }
        if !any {
            not_found.push(query.clone());
        }
    }

    let matched: Vec<Participant> = roster
        .iter()
        .zip(&hit)
        .filter(|(_, hit)| **hit)
        .map(|(p, _)| p.clone())
        .collect();

    if matched.is_empty() {
        return Err(LeagueError::NoMatch(queries.to_vec()));
    }
    Ok(PriorityUpdate { matched, not_found })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::league::test_util::roster;

    fn queries(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|q| q.to_string()).collect()
    }

    #[test]
    fn test_substring_matches_many() {
        let members = roster(&["Takeshi", "takuya", "Hana"]);
        let update = match_queries(&members, &queries(&["TAK", "nobody"])).unwrap();

        let names: Vec<&str> = update
            .matched
            .iter()
            .map(|p| p.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Takeshi", "takuya"]);
        assert_eq!(update.not_found, vec!["nobody".to_string()]);
    }

    #[test]
    fn test_overlapping_queries_do_not_duplicate() {
        let members = roster(&["Hana", "Hanako"]);
        let update = match_queries(&members, &queries(&["hana", "ko"])).unwrap();
        assert_eq!(update.matched.len(), 2);
        assert!(update.not_found.is_empty());
    }

    #[test]
    fn test_no_match() {
        let members = roster(&["Hana"]);
        let err = match_queries(&members, &queries(&["zzz"])).unwrap_err();
        assert_eq!(err, LeagueError::NoMatch(vec!["zzz".to_string()]));

        let err = match_queries(&members, &[]).unwrap_err();
        assert_eq!(err, LeagueError::NoMatch(Vec::new()));
    }
}
