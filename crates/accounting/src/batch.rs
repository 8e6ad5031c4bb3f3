//! Splitting a level's demand into ceiling-bounded CSR batches.
//!
//! Large certification requests are broken into chunks so a single request
//! never exceeds the backend's safety ceiling. Batches are produced in a fixed
//! order: full batches first, the remainder last.

use crate::LevelPlan;
use std::num::NonZeroU32;

/// Split `needed` into batches of at most `ceiling`.
///
/// The batches sum exactly to `needed`; `needed == 0` yields no batches.
pub fn split_batches(needed: u32, ceiling: NonZeroU32) -> Vec<u32> {
    let ceiling = ceiling.get();
    let mut batches = Vec::with_capacity(needed.div_ceil(ceiling) as usize);
    let mut remaining = needed;
    while remaining != 0 {
        let batch = remaining.min(ceiling);
        batches.push(batch);
        remaining -= batch;
    }
    batches
}

/// One CSR batch and the generation work preceding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSlice {
    /// Keys to certify in this batch.
    pub certify: u32,
    /// New key pairs to generate before submitting the batch.
    ///
    /// Less than `certify` while unattested keys left over from earlier runs
    /// are being consumed.
    pub generate: u32,
}

/// Ordered batches for one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSchedule {
    slices: Vec<BatchSlice>,
}

impl BatchSchedule {
    /// Carve a level plan into batches.
    ///
    /// Existing unattested keys are consumed first, so the generation counts
    /// across all slices sum to `plan.keys_to_generate`.
    pub fn for_plan(plan: &LevelPlan, ceiling: NonZeroU32) -> Self {
        let mut available = plan.existing_unattested();
        let slices = split_batches(plan.keys_to_certify, ceiling)
            .into_iter()
            .map(|certify| {
                let reused = certify.min(available);
                available -= reused;
                BatchSlice {
                    certify,
                    generate: certify - reused,
                }
            })
            .collect();
        Self { slices }
    }

    pub fn slices(&self) -> &[BatchSlice] {
        &self.slices
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Keys certified if every batch succeeds.
    pub fn total_certify(&self) -> u32 {
        self.slices.iter().map(|s| s.certify).sum()
    }

    /// Keys generated if every batch succeeds.
    pub fn total_generate(&self) -> u32 {
        self.slices.iter().map(|s| s.generate).sum()
    }
}

impl IntoIterator for BatchSchedule {
    type Item = BatchSlice;
    type IntoIter = std::vec::IntoIter<BatchSlice>;

    fn into_iter(self) -> Self::IntoIter {
        self.slices.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PoolAccountant;
    use keypool_test_helpers::{config_with_extra, status, tee};
    use keypool_types::PoolStatus;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn ceiling(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_split_exact_and_remainder() {
        assert_eq!(split_batches(0, ceiling(20)), Vec::<u32>::new());
        assert_eq!(split_batches(20, ceiling(20)), vec![20]);
        assert_eq!(split_batches(45, ceiling(20)), vec![20, 20, 5]);
        assert_eq!(split_batches(3, ceiling(1)), vec![1, 1, 1]);
    }

    #[test]
    fn test_split_sums_and_respects_ceiling() {
        let mut rng = ChaCha8Rng::seed_from_u64(12345);
        for _ in 0..500 {
            let needed = rng.gen_range(0..2_000);
            let c = rng.gen_range(1..64);
            let batches = split_batches(needed, ceiling(c));

            assert_eq!(batches.iter().sum::<u32>(), needed);
            assert!(batches.iter().all(|&b| b > 0 && b <= c));
        }
    }

    #[test]
    fn test_schedule_cold_start() {
        let plan = PoolAccountant::plan_level(tee(), PoolStatus::EMPTY, &config_with_extra(45));
        let schedule = BatchSchedule::for_plan(&plan, ceiling(20));

        assert_eq!(
            schedule.slices(),
            &[
                BatchSlice {
                    certify: 20,
                    generate: 20
                },
                BatchSlice {
                    certify: 20,
                    generate: 20
                },
                BatchSlice {
                    certify: 5,
                    generate: 5
                },
            ]
        );
    }

    #[test]
    fn test_schedule_reuses_unattested_first() {
        // 25 unattested keys, target 30: generate 5, certify 30
        let plan = PoolAccountant::plan_level(tee(), status(25, 0, 0, 0), &config_with_extra(30));
        assert_eq!(plan.keys_to_generate, 5);

        let schedule = BatchSchedule::for_plan(&plan, ceiling(20));
        assert_eq!(
            schedule.slices(),
            &[
                BatchSlice {
                    certify: 20,
                    generate: 0
                },
                BatchSlice {
                    certify: 10,
                    generate: 5
                },
            ]
        );
        assert_eq!(schedule.total_certify(), plan.keys_to_certify);
        assert_eq!(schedule.total_generate(), plan.keys_to_generate);
    }

    #[test]
    fn test_schedule_empty_when_not_needed() {
        let plan = PoolAccountant::plan_level(tee(), status(6, 6, 6, 0), &config_with_extra(6));
        assert!(BatchSchedule::for_plan(&plan, ceiling(20)).is_empty());
    }
}
