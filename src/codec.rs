//! Integer encoding of tours by request group.
//!
//! Every store that supplies at least one job gets a code; the store and all
//! of its jobs encode to that code. Decoding replays the codes left to right:
//! the first occurrence of a code becomes the store, the following ones
//! become its jobs in instance order. The round trip therefore moves every
//! store in front of its jobs, which is how routes get repaired.

use crate::error::{Result, SolverError};
use crate::evaluators::Evaluator;
use crate::instance::ProblemInstance;
use crate::locations::{EntityId, Stop};
use ordered_float::OrderedFloat;
use std::collections::HashMap;

pub type Code = u32;

#[derive(Debug, Clone)]
struct CodeGroup {
    store: EntityId,
    jobs: Vec<EntityId>,
}

#[derive(Debug, Clone, Default)]
pub struct Codec {
    /// Group of code `c` lives at index `c - 1`.
    groups: Vec<CodeGroup>,
    store_codes: HashMap<EntityId, Code>,
    job_codes: HashMap<EntityId, Code>,
}

impl Codec {
    /// Assign codes to stores in instance order, starting at 1.
    pub fn new(instance: &ProblemInstance) -> Self {
        let mut codec = Codec::default();
        for store in instance.stores() {
            if codec.store_codes.contains_key(&store.id) {
                log::warn!("Store {} listed twice, keeping its first code", store.id);
                continue;
            }
            let jobs: Vec<EntityId> = instance.jobs_for_store(store.id).map(|j| j.id).collect();
            if jobs.is_empty() {
                continue;
            }

            let code = codec.groups.len() as Code + 1;
            codec.store_codes.insert(store.id, code);
            for &job in &jobs {
                codec.job_codes.insert(job, code);
            }
            codec.groups.push(CodeGroup { store: store.id, jobs });
        }
        log::debug!("Codec built with {} request groups", codec.groups.len());
        codec
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Store and jobs behind a code.
    pub fn group(&self, code: Code) -> Option<(EntityId, &[EntityId])> {
        self.group_slot(code).map(|g| (g.store, g.jobs.as_slice()))
    }

    pub fn code_of(&self, stop: &Stop) -> Result<Code> {
        let code = match stop {
            Stop::Job(id) => self.job_codes.get(id),
            Stop::Store(visit) => self.store_codes.get(&visit.store),
        };
        code.copied()
            .ok_or_else(|| SolverError::malformed(format!("{} belongs to no request group", stop)))
    }

    pub fn encode(&self, tour: &[Stop]) -> Result<Vec<Code>> {
        tour.iter().map(|stop| self.code_of(stop)).collect()
    }

    /// Replay a code sequence into a tour of plain store stops and jobs.
    pub fn decode(&self, codes: &[Code]) -> Result<Vec<Stop>> {
        let mut seen: HashMap<Code, usize> = HashMap::new();
        let mut tour = Vec::with_capacity(codes.len());

        for &code in codes {
            let group = self
                .group_slot(code)
                .ok_or_else(|| SolverError::malformed(format!("unknown code {}", code)))?;
            let occurrence = seen.entry(code).or_insert(0);
            let stop = if *occurrence == 0 {
                Stop::store(group.store)
            } else {
                let job = group.jobs.get(*occurrence - 1).ok_or_else(|| {
                    SolverError::malformed(format!(
                        "code {} occurs more often than store {} has jobs",
                        code, group.store
                    ))
                })?;
                Stop::Job(*job)
            };
            *occurrence += 1;
            tour.push(stop);
        }
        Ok(tour)
    }

    /// Decode, then score one candidate per pair of job positions of every
    /// group holding more than one job, and keep the cheapest.
    ///
    /// Every candidate is a copy of the plain decode; the position pairs only
    /// decide how many are scored. Candidates are scored with the driver
    /// returning to start.
    pub fn decode_exhaustive(
        &self,
        codes: &[Code],
        instance: &ProblemInstance,
        evaluator: &dyn Evaluator,
    ) -> Result<Vec<Stop>> {
        let base = self.decode(codes)?;
        let mut candidates = vec![base.clone()];

        for code in first_appearance_order(codes) {
            let positions: Vec<usize> = codes
                .iter()
                .enumerate()
                .filter(|&(_, &c)| c == code)
                .map(|(i, _)| i)
                .collect();
            if positions.len() <= 2 {
                continue;
            }
            for _ in make_pairs(&positions[1..]) {
                candidates.push(base.clone());
            }
        }

        let mut best: Option<(OrderedFloat<f64>, Vec<Stop>)> = None;
        for candidate in candidates {
            let score = OrderedFloat(evaluator.evaluate(instance, &candidate, true)?);
            if best.as_ref().map_or(true, |(b, _)| score < *b) {
                best = Some((score, candidate));
            }
        }
        Ok(best.map(|(_, tour)| tour).unwrap_or(base))
    }

    fn group_slot(&self, code: Code) -> Option<&CodeGroup> {
        (code as usize).checked_sub(1).and_then(|i| self.groups.get(i))
    }
}

/// Pairs of unequal values at increasing positions, in input order.
pub fn make_pairs<T: Copy + PartialEq>(values: &[T]) -> Vec<(T, T)> {
    let mut pairs = Vec::new();
    for (i, &a) in values.iter().enumerate() {
        for &b in &values[i + 1..] {
            if a != b {
                pairs.push((a, b));
            }
        }
    }
    pairs
}

fn first_appearance_order(codes: &[Code]) -> Vec<Code> {
    let mut order = Vec::new();
    for &code in codes {
        if !order.contains(&code) {
            order.push(code);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::{DistanceEvaluator, EvaluatorKind};
    use crate::instance::test_instances::small_city;

    #[test]
    fn test_codes_follow_store_order() {
        let instance = small_city();
        let codec = Codec::new(&instance);
        assert_eq!(codec.len(), 2);
        assert_eq!(codec.group(1), Some((1, &[10, 11][..])));
        assert_eq!(codec.group(2), Some((2, &[12][..])));
        assert_eq!(codec.group(0), None);
        assert_eq!(codec.group(3), None);
    }

    #[test]
    fn test_encode() {
        let instance = small_city();
        let codec = Codec::new(&instance);
        let tour = vec![Stop::Job(12), Stop::store(1), Stop::Job(10), Stop::store_for(2, 12), Stop::Job(11)];
        assert_eq!(codec.encode(&tour).unwrap(), vec![2, 1, 1, 2, 1]);
        assert!(matches!(
            codec.encode(&[Stop::Job(99)]),
            Err(SolverError::MalformedTour { .. })
        ));
    }

    #[test]
    fn test_decode_puts_stores_first() {
        let instance = small_city();
        let codec = Codec::new(&instance);
        let tour = codec.decode(&[2, 1, 1, 2, 1]).unwrap();
        assert_eq!(
            tour,
            vec![Stop::store(2), Stop::store(1), Stop::Job(10), Stop::Job(12), Stop::Job(11)]
        );
        assert_eq!(DistanceEvaluator::precedence_violations(&instance, &tour).unwrap(), 0);
    }

    #[test]
    fn test_repair_round_trip() {
        let instance = small_city();
        let codec = Codec::new(&instance);
        let broken = vec![Stop::Job(10), Stop::Job(12), Stop::store(1), Stop::Job(11), Stop::store(2)];
        let repaired = codec.decode(&codec.encode(&broken).unwrap()).unwrap();
        assert_eq!(DistanceEvaluator::precedence_violations(&instance, &repaired).unwrap(), 0);

        // A decoded tour is a fixed point.
        let again = codec.decode(&codec.encode(&repaired).unwrap()).unwrap();
        assert_eq!(again, repaired);
    }

    #[test]
    fn test_decode_rejects_bad_sequences() {
        let instance = small_city();
        let codec = Codec::new(&instance);
        assert!(matches!(codec.decode(&[7]), Err(SolverError::MalformedTour { .. })));
        assert!(matches!(codec.decode(&[2, 2, 2]), Err(SolverError::MalformedTour { .. })));
        assert!(codec.decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_exhaustive_decode_matches_plain_decode() {
        let instance = small_city();
        let codec = Codec::new(&instance);
        let evaluator = EvaluatorKind::Distance.evaluator();
        let codes = [1, 2, 1, 2, 1];
        assert_eq!(
            codec.decode_exhaustive(&codes, &instance, evaluator).unwrap(),
            codec.decode(&codes).unwrap()
        );
    }

    #[test]
    fn test_make_pairs() {
        assert_eq!(make_pairs(&[1, 2, 3]), vec![(1, 2), (1, 3), (2, 3)]);
        assert_eq!(make_pairs(&[4, 4, 5]), vec![(4, 5), (4, 5)]);
        assert!(make_pairs(&[7, 7]).is_empty());
        assert!(make_pairs::<u32>(&[1]).is_empty());
    }
}
