use rand::seq::SliceRandom;
use rand::Rng;

/// Result of a retention sample: entries left for a human, and the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sample {
    pub keep: Vec<i64>,
    pub overflow: Vec<i64>,
}

/// Pick at most `limit` candidates uniformly at random without replacement.
///
/// Every candidate has the same chance of being kept. Candidates not kept are
/// returned as overflow so the caller can mark them read.
pub fn sample<R: Rng + ?Sized>(mut candidates: Vec<i64>, limit: usize, rng: &mut R) -> Sample {
    if candidates.len() <= limit {
        return Sample {
            keep: candidates,
            overflow: Vec::new(),
        };
    }

    let (keep, overflow) = candidates.partial_shuffle(rng, limit);

    Sample {
        keep: keep.to_vec(),
        overflow: overflow.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_fewer_candidates_than_limit_keeps_all() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = sample(vec![3, 1, 2], 10, &mut rng);
        assert_eq!(result.keep, vec![3, 1, 2]);
        assert!(result.overflow.is_empty());
    }

    #[test]
    fn test_exactly_limit_keeps_all() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = sample((0..10).collect(), 10, &mut rng);
        assert_eq!(result.keep.len(), 10);
        assert!(result.overflow.is_empty());
    }

    #[test]
    fn test_fifteen_candidates_limit_ten() {
        let mut rng = StdRng::seed_from_u64(42);
        let result = sample((100..115).collect(), 10, &mut rng);
        assert_eq!(result.keep.len(), 10);
        assert_eq!(result.overflow.len(), 5);
    }

    #[test]
    fn test_zero_limit_overflows_everything() {
        let mut rng = StdRng::seed_from_u64(7);
        let result = sample(vec![1, 2, 3], 0, &mut rng);
        assert!(result.keep.is_empty());
        assert_eq!(result.overflow.len(), 3);
    }

    #[test]
    fn test_membership_is_roughly_uniform() {
        // 10 candidates, keep 2: each should be kept ~20% of the time
        let mut rng = StdRng::seed_from_u64(0xfeed);
        let trials = 20_000;
        let mut counts = [0usize; 10];
        for _ in 0..trials {
            for id in sample((0..10).collect(), 2, &mut rng).keep {
                counts[id as usize] += 1;
            }
        }
        let expected = trials * 2 / 10;
        for (id, count) in counts.iter().enumerate() {
            let deviation = (*count as f64 - expected as f64).abs() / expected as f64;
            assert!(
                deviation < 0.08,
                "candidate {} kept {} times, expected about {}",
                id,
                count,
                expected
            );
        }
    }

    proptest! {
        #[test]
        fn prop_sample_partitions_candidates(
            ids in prop::collection::hash_set(any::<i64>(), 0..60),
            limit in 0usize..40,
            seed in any::<u64>(),
        ) {
            let candidates: Vec<i64> = ids.iter().copied().collect();
            let mut rng = StdRng::seed_from_u64(seed);
            let result = sample(candidates.clone(), limit, &mut rng);

            prop_assert_eq!(result.keep.len(), limit.min(candidates.len()));
            prop_assert_eq!(result.keep.len() + result.overflow.len(), candidates.len());

            let keep: HashSet<i64> = result.keep.iter().copied().collect();
            let overflow: HashSet<i64> = result.overflow.iter().copied().collect();
            prop_assert_eq!(keep.len(), result.keep.len());
            prop_assert!(keep.is_disjoint(&overflow));
            let union: HashSet<i64> = keep.union(&overflow).copied().collect();
            prop_assert_eq!(union, ids);
        }
    }
}
