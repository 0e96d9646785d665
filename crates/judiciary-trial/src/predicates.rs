//! Stage predicates — what each admissibility stage looks for in this trial
//!
//! Identity stages (res judicata, lis pendens, repeated request) search one
//! list each for the identical 4-tuple. Joinder wants same parties and
//! cause with claims in a strict subset relation. Connection wants a shared
//! cause or overlapping claims, but never the joinder precondition: rows
//! with same parties and same cause belong to joinder. First match in
//! creation order wins.

use crate::store::TrialState;
use judiciary_core::{CandidateLawsuit, Lawsuit, MatchKind, Stage};

pub fn evaluate<'a>(
    state: &'a TrialState,
    stage: Stage,
    candidate: &CandidateLawsuit,
) -> Option<(MatchKind, &'a Lawsuit)> {
    match stage {
        Stage::ResJudicata => find_identical(&state.dismissed_with_merit, candidate)
            .map(|s| (MatchKind::ResJudicata, s)),
        Stage::LisPendens => {
            find_identical(&state.active, candidate).map(|s| (MatchKind::LisPendens, s))
        }
        Stage::RepeatedRequest => find_identical(&state.dismissed_without_merit, candidate)
            .map(|s| (MatchKind::RepeatedRequest, s)),
        Stage::Joinder => find_joinder(&state.active, candidate),
        Stage::Connection => {
            find_connection(&state.active, candidate).map(|s| (MatchKind::Connection, s))
        }
    }
}

fn find_identical<'a>(list: &'a [Lawsuit], candidate: &CandidateLawsuit) -> Option<&'a Lawsuit> {
    list.iter().find(|suit| candidate.is_identical_to(suit))
}

fn find_joinder<'a>(
    active: &'a [Lawsuit],
    candidate: &CandidateLawsuit,
) -> Option<(MatchKind, &'a Lawsuit)> {
    for suit in active {
        if !candidate.same_parties_and_cause(suit) {
            continue;
        }
        // Equal claim sets were the identity stages' business.
        if candidate.claims == suit.claims {
            continue;
        }
        if candidate.claims.is_strict_subset_of(&suit.claims) {
            return Some((MatchKind::JoinderContained, suit));
        }
        if suit.claims.is_strict_subset_of(&candidate.claims) {
            return Some((MatchKind::JoinderContinent, suit));
        }
    }
    None
}

fn find_connection<'a>(
    active: &'a [Lawsuit],
    candidate: &CandidateLawsuit,
) -> Option<&'a Lawsuit> {
    active.iter().find(|suit| {
        if candidate.same_parties_and_cause(suit) {
            return false;
        }
        suit.cause_action == candidate.cause_id || suit.claims.overlaps(&candidate.claims)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use judiciary_core::ClaimSet;

    fn suit(id: &str, plaintiff: &str, defendant: &str, cause: u32, claims: &[u32]) -> Lawsuit {
        Lawsuit {
            id: id.parse().unwrap(),
            plaintiff: plaintiff.into(),
            defendant: defendant.into(),
            cause_action: cause,
            claims: ClaimSet::new(claims.to_vec()),
            connected: Vec::new(),
            legacy_claim: None,
        }
    }

    fn cand(plaintiff: &str, defendant: &str, cause: u32, claims: &[u32]) -> CandidateLawsuit {
        CandidateLawsuit::new(plaintiff, defendant, cause, claims.to_vec())
    }

    fn state_with(
        active: Vec<Lawsuit>,
        with_merit: Vec<Lawsuit>,
        without_merit: Vec<Lawsuit>,
    ) -> TrialState {
        TrialState {
            district_id: 1,
            district_name: "Alpha".into(),
            trial_id: 1,
            trial_addr: "127.0.0.1:9101".into(),
            next_seq: 10,
            active,
            dismissed_with_merit: with_merit,
            dismissed_without_merit: without_merit,
        }
    }

    #[test]
    fn identity_stages_search_disjoint_lists() {
        let state = state_with(
            vec![suit("1.1.1", "Ana", "Bia", 7, &[10, 20])],
            vec![suit("1.1.2", "Ana", "Bia", 7, &[10, 20])],
            vec![suit("1.1.3", "Ana", "Bia", 7, &[10, 20])],
        );
        let c = cand("ana", "BIA", 7, &[20, 10]);

        let (kind, hit) = evaluate(&state, Stage::ResJudicata, &c).unwrap();
        assert_eq!(kind, MatchKind::ResJudicata);
        assert_eq!(hit.id.to_string(), "1.1.2");

        let (kind, hit) = evaluate(&state, Stage::LisPendens, &c).unwrap();
        assert_eq!(kind, MatchKind::LisPendens);
        assert_eq!(hit.id.to_string(), "1.1.1");

        let (kind, hit) = evaluate(&state, Stage::RepeatedRequest, &c).unwrap();
        assert_eq!(kind, MatchKind::RepeatedRequest);
        assert_eq!(hit.id.to_string(), "1.1.3");
    }

    #[test]
    fn identity_requires_the_full_tuple() {
        let state = state_with(vec![suit("1.1.1", "Ana", "Bia", 7, &[10, 20])], vec![], vec![]);
        assert!(evaluate(&state, Stage::LisPendens, &cand("Ana", "Bia", 8, &[10, 20])).is_none());
        assert!(evaluate(&state, Stage::LisPendens, &cand("Ana", "Bia", 7, &[10])).is_none());
        assert!(evaluate(&state, Stage::LisPendens, &cand("Ana", "Caio", 7, &[10, 20])).is_none());
    }

    #[test]
    fn joinder_contained_when_candidate_is_the_smaller_set() {
        let state = state_with(vec![suit("1.1.5", "Ana", "Bia", 7, &[10, 20, 30])], vec![], vec![]);
        let (kind, hit) = evaluate(&state, Stage::Joinder, &cand("Ana", "Bia", 7, &[10])).unwrap();
        assert_eq!(kind, MatchKind::JoinderContained);
        assert_eq!(hit.id.to_string(), "1.1.5");
    }

    #[test]
    fn joinder_continent_when_candidate_is_the_larger_set() {
        let state = state_with(vec![suit("1.1.5", "Ana", "Bia", 7, &[10])], vec![], vec![]);
        let (kind, hit) =
            evaluate(&state, Stage::Joinder, &cand("Ana", "Bia", 7, &[10, 20, 30])).unwrap();
        assert_eq!(kind, MatchKind::JoinderContinent);
        assert_eq!(hit.id.to_string(), "1.1.5");
        assert!(hit.claims.is_strict_subset_of(&cand("Ana", "Bia", 7, &[10, 20, 30]).claims));
    }

    #[test]
    fn joinder_skips_equal_claims_and_disjoint_unrelated_sets() {
        let state = state_with(vec![suit("1.1.1", "Ana", "Bia", 7, &[10, 20])], vec![], vec![]);
        // Equal claims are the identity stages' business.
        assert!(evaluate(&state, Stage::Joinder, &cand("Ana", "Bia", 7, &[10, 20])).is_none());
        // Overlapping but no subset relation either way.
        assert!(evaluate(&state, Stage::Joinder, &cand("Ana", "Bia", 7, &[20, 30])).is_none());
        // Different parties never joinder.
        assert!(evaluate(&state, Stage::Joinder, &cand("Caio", "Bia", 7, &[10])).is_none());
    }

    #[test]
    fn connection_fires_on_shared_cause_or_claim_overlap() {
        let state = state_with(vec![suit("2.1.1", "Carlos", "Dora", 9, &[40])], vec![], vec![]);
        // Same cause, different parties.
        let (kind, hit) =
            evaluate(&state, Stage::Connection, &cand("Eve", "Frank", 9, &[41])).unwrap();
        assert_eq!(kind, MatchKind::Connection);
        assert_eq!(hit.id.to_string(), "2.1.1");
        // Overlapping claims, different cause.
        assert!(evaluate(&state, Stage::Connection, &cand("Eve", "Frank", 5, &[40])).is_some());
        // Neither.
        assert!(evaluate(&state, Stage::Connection, &cand("Eve", "Frank", 5, &[41])).is_none());
    }

    #[test]
    fn connection_never_fires_on_the_joinder_precondition() {
        // Same parties + same cause belongs to joinder even when only the
        // claims overlap.
        let state = state_with(vec![suit("1.1.1", "Ana", "Bia", 7, &[10, 20])], vec![], vec![]);
        assert!(evaluate(&state, Stage::Connection, &cand("Ana", "Bia", 7, &[20, 30])).is_none());
        // But the same row still connects for a different plaintiff.
        assert!(evaluate(&state, Stage::Connection, &cand("Caio", "Bia", 7, &[20, 30])).is_some());
    }

    #[test]
    fn first_match_in_creation_order_wins() {
        let state = state_with(
            vec![
                suit("1.1.1", "Ana", "Bia", 9, &[1]),
                suit("1.1.2", "Carlos", "Dora", 9, &[2]),
            ],
            vec![],
            vec![],
        );
        let (_, hit) = evaluate(&state, Stage::Connection, &cand("Eve", "Frank", 9, &[3])).unwrap();
        assert_eq!(hit.id.to_string(), "1.1.1");
    }
}
