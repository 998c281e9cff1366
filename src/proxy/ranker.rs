//! Ranking of checked proxies by reliability

use crate::proxy::models::{ProxyResult, RankedSnapshot};
use chrono::Utc;

/// Order results by descending score and stamp the snapshot
///
/// The sort is stable: proxies with equal scores keep their input order.
pub fn rank(mut results: Vec<ProxyResult>) -> RankedSnapshot {
    results.sort_by_key(|r| std::cmp::Reverse(r.score()));
    RankedSnapshot {
        generated_at: Utc::now(),
        proxies: results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::{Candidate, ProbeOutcome, TargetOutcome};

    fn result_with_score(address: &str, score: usize, targets: usize) -> ProxyResult {
        let outcomes = (0..targets)
            .map(|i| TargetOutcome {
                label: format!("t{}", i),
                outcome: if i < score {
                    ProbeOutcome::success(200, 10)
                } else {
                    ProbeOutcome::timeout()
                },
            })
            .collect();
        ProxyResult::new(Candidate::parse(address, "80").unwrap(), outcomes)
    }

    #[test]
    fn test_rank_is_stable_descending() {
        let results = vec![
            result_with_score("10.0.0.0", 1, 3),
            result_with_score("10.0.0.1", 3, 3),
            result_with_score("10.0.0.2", 1, 3),
            result_with_score("10.0.0.3", 2, 3),
        ];

        let snapshot = rank(results);
        let order: Vec<_> = snapshot
            .proxies
            .iter()
            .map(|p| p.candidate.address())
            .collect();
        assert_eq!(order, vec!["10.0.0.1", "10.0.0.3", "10.0.0.0", "10.0.0.2"]);
    }

    #[test]
    fn test_rank_keeps_zero_score_proxies() {
        let snapshot = rank(vec![
            result_with_score("10.0.0.0", 0, 2),
            result_with_score("10.0.0.1", 2, 2),
        ]);
        assert_eq!(snapshot.proxies.len(), 2);
        assert_eq!(snapshot.proxies[1].score(), 0);
        assert_eq!(snapshot.working().count(), 1);
    }

    #[test]
    fn test_rank_empty() {
        let before = Utc::now();
        let snapshot = rank(Vec::new());
        assert!(snapshot.proxies.is_empty());
        assert!(snapshot.generated_at >= before);
    }
}
