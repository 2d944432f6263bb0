//! Bounded archive of the best distinct solutions seen during a search.

use crate::solution::Solution;

/// The K lowest-cost distinct solutions, sorted by non-decreasing cost.
///
/// Ties keep insertion order: a newcomer goes after every kept solution of
/// equal cost. A solution structurally equal to a kept one is rejected.
#[derive(Debug, Clone)]
pub struct EliteArchive {
    capacity: usize,
    solutions: Vec<Solution>,
}

impl EliteArchive {
    pub fn new(capacity: usize) -> Self {
        EliteArchive {
            capacity: capacity.max(1),
            solutions: Vec::with_capacity(capacity.max(1) + 1),
        }
    }

    /// Insert a solution, returns whether it was kept
    pub fn add(&mut self, solution: Solution) -> bool {
        if self.solutions.contains(&solution) {
            return false;
        }

        let cost = solution.total_cost();
        let position = self.solutions.partition_point(|s| s.total_cost() <= cost);
        if position >= self.capacity {
            return false;
        }

        self.solutions.insert(position, solution);
        self.solutions.truncate(self.capacity);
        true
    }

    /// Insert every solution in order, returns how many were kept
    pub fn merge<I>(&mut self, solutions: I) -> usize
    where
        I: IntoIterator<Item = Solution>,
    {
        let mut admitted = 0;
        for solution in solutions {
            if self.add(solution) {
                admitted += 1;
            }
        }
        admitted
    }

    pub fn best(&self) -> Option<&Solution> {
        self.solutions.first()
    }

    /// Cost of the last kept solution
    pub fn worst_cost(&self) -> Option<f64> {
        self.solutions.last().map(|s| s.total_cost())
    }

    pub fn is_full(&self) -> bool {
        self.solutions.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    pub fn into_solutions(self) -> Vec<Solution> {
        self.solutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::construction::{ConstructionHeuristic, NaiveRoundRobin};
    use crate::test_utils::line_instance;
    use proptest::prelude::*;

    /// One vehicle at city 0 serving a single task 0 -> `city`
    fn solution(city: usize, cost_per_km: f64) -> Solution {
        let instance = line_instance(&[(10, cost_per_km, 0)], &[(0, city, 1)]);
        NaiveRoundRobin.construct(&instance).unwrap()
    }

    fn costs(archive: &EliteArchive) -> Vec<f64> {
        archive.solutions().iter().map(|s| s.total_cost()).collect()
    }

    #[test]
    fn test_insert_keeps_k_best() {
        let mut archive = EliteArchive::new(3);
        for city in [2, 4, 6] {
            assert!(archive.add(solution(city, 5.0)));
        }
        assert_eq!(costs(&archive), vec![10.0, 20.0, 30.0]);
        assert!(archive.is_full());

        assert!(archive.add(solution(3, 5.0)));
        assert_eq!(costs(&archive), vec![10.0, 15.0, 20.0]);
        assert_eq!(archive.worst_cost(), Some(20.0));

        // Same structure as the kept cost-20 solution
        assert!(!archive.add(solution(4, 5.0)));
        assert_eq!(costs(&archive), vec![10.0, 15.0, 20.0]);

        // Worse than everything kept
        assert!(!archive.add(solution(8, 5.0)));
        assert_eq!(archive.len(), 3);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let first = solution(2, 1.0);
        // Different structure, same cost
        let second = line_instance(&[(10, 1.0, 4)], &[(4, 2, 1)]);
        let second = NaiveRoundRobin.construct(&second).unwrap();
        assert_eq!(first.total_cost(), second.total_cost());

        let mut archive = EliteArchive::new(2);
        archive.add(first.clone());
        archive.add(second.clone());
        assert_eq!(archive.solutions(), &[first.clone(), second]);

        // A full archive rejects a tie with its worst element
        archive.add(solution(1, 1.0));
        assert_eq!(archive.best().map(|s| s.total_cost()), Some(1.0));
        assert_eq!(archive.solutions()[1], first);
        let tie = NaiveRoundRobin.construct(&line_instance(&[(10, 1.0, 3)], &[(3, 1, 1)])).unwrap();
        assert_eq!(tie.total_cost(), 2.0);
        assert!(!archive.add(tie));
    }

    #[test]
    fn test_merge_counts_admitted() {
        let mut archive = EliteArchive::new(2);
        archive.add(solution(5, 1.0));

        let admitted = archive.merge(vec![solution(1, 1.0), solution(5, 1.0), solution(9, 1.0)]);
        assert_eq!(admitted, 1);
        assert_eq!(costs(&archive), vec![1.0, 5.0]);
    }

    proptest! {
        #[test]
        fn prop_archive_sorted_and_distinct(
            capacity in 1usize..6,
            inserts in prop::collection::vec((1usize..12, 1u32..4), 0..30),
        ) {
            let mut archive = EliteArchive::new(capacity);
            for (city, factor) in inserts {
                archive.add(solution(city, factor as f64));
            }

            prop_assert!(archive.len() <= capacity);
            let kept = archive.solutions();
            for pair in kept.windows(2) {
                prop_assert!(pair[0].total_cost() <= pair[1].total_cost());
            }
            for (i, a) in kept.iter().enumerate() {
                for b in &kept[i + 1..] {
                    prop_assert!(a != b);
                }
            }
        }
    }
}
