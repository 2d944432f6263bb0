//! Initial solution construction.
//!
//! Every policy puts a task's pickup immediately followed by its delivery, so
//! a vehicle never carries more than one task at a time: the resulting agendas
//! are capacity-feasible as soon as each vehicle can carry each task it gets.

use crate::agenda::Agenda;
use crate::error::InfeasibleFleetError;
use crate::instance::{Instance, Task, Vehicle};
use crate::solution::Solution;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub trait ConstructionHeuristic {
    fn construct(&self, instance: &Instance) -> Result<Solution, InfeasibleFleetError>;
    fn name(&self) -> &str;
}

fn check_fits(vehicle: &Vehicle, task: &Task) -> Result<(), InfeasibleFleetError> {
    if vehicle.capacity() < task.weight {
        return Err(InfeasibleFleetError {
            task: task.id,
            weight: task.weight,
            capacity: vehicle.capacity(),
        });
    }
    Ok(())
}

fn into_solution(instance: &Instance, agendas: Vec<Agenda>) -> Solution {
    Solution::from_shared(instance, agendas.into_iter().map(Arc::new).collect())
}

/// Naive round-robin
///
/// Hands the tasks, in input order, to the vehicles in rotation. The
/// rotation does not look at capacities; a task landing on a vehicle too
/// small for it aborts the construction.
pub struct NaiveRoundRobin;

impl ConstructionHeuristic for NaiveRoundRobin {
    fn construct(&self, instance: &Instance) -> Result<Solution, InfeasibleFleetError> {
        let mut agendas = vec![Agenda::new(); instance.num_vehicles()];

        for (i, task) in instance.tasks.iter().enumerate() {
            let v = i % instance.num_vehicles();
            check_fits(&instance.vehicles[v], task)?;
            agendas[v].push_task(*task);
        }

        Ok(into_solution(instance, agendas))
    }

    fn name(&self) -> &str {
        "NaiveRoundRobin"
    }
}

/// Greedy first-fit
///
/// Each task goes to the first vehicle of the fleet able to carry it.
pub struct GreedyFirstFit;

impl ConstructionHeuristic for GreedyFirstFit {
    fn construct(&self, instance: &Instance) -> Result<Solution, InfeasibleFleetError> {
        let mut agendas = vec![Agenda::new(); instance.num_vehicles()];

        for task in &instance.tasks {
            let vehicle = instance
                .vehicles
                .iter()
                .position(|v| v.capacity() >= task.weight)
                .ok_or_else(|| InfeasibleFleetError {
                    task: task.id,
                    weight: task.weight,
                    capacity: instance.vehicles.iter().map(|v| v.capacity()).max().unwrap_or(0),
                })?;
            agendas[vehicle].push_task(*task);
        }

        Ok(into_solution(instance, agendas))
    }

    fn name(&self) -> &str {
        "GreedyFirstFit"
    }
}

/// Chaining round-robin
///
/// Round-robin over the vehicles, but a vehicle keeps taking tasks as long
/// as some remaining task starts in the city where its last delivery ended.
pub struct ChainingRoundRobin;

impl ConstructionHeuristic for ChainingRoundRobin {
    fn construct(&self, instance: &Instance) -> Result<Solution, InfeasibleFleetError> {
        let mut agendas = vec![Agenda::new(); instance.num_vehicles()];
        let mut remaining: Vec<Task> = instance.tasks.clone();

        while !remaining.is_empty() {
            for (v, vehicle) in instance.vehicles.iter().enumerate() {
                if remaining.is_empty() {
                    break;
                }

                let mut index = 0;
                loop {
                    let task = remaining.remove(index);
                    check_fits(vehicle, &task)?;
                    agendas[v].push_task(task);

                    match remaining.iter().position(|t| t.pickup_city == task.delivery_city) {
                        Some(next) => index = next,
                        None => break,
                    }
                }
            }
        }

        Ok(into_solution(instance, agendas))
    }

    fn name(&self) -> &str {
        "ChainingRoundRobin"
    }
}

/// Which construction builds the first solution of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitialPolicy {
    /// Naive when every vehicle fits every task, greedy first-fit otherwise
    #[default]
    Auto,
    Naive,
    Greedy,
    Chaining,
}

impl InitialPolicy {
    pub fn heuristic(&self, instance: &Instance) -> Box<dyn ConstructionHeuristic + Send + Sync> {
        match self {
            InitialPolicy::Auto => {
                if instance.every_vehicle_fits_every_task() {
                    Box::new(NaiveRoundRobin)
                } else {
                    Box::new(GreedyFirstFit)
                }
            }
            InitialPolicy::Naive => Box::new(NaiveRoundRobin),
            InitialPolicy::Greedy => Box::new(GreedyFirstFit),
            InitialPolicy::Chaining => Box::new(ChainingRoundRobin),
        }
    }

    pub fn construct(&self, instance: &Instance) -> Result<Solution, InfeasibleFleetError> {
        self.heuristic(instance).construct(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::line_instance;

    #[test]
    fn test_naive_round_robin() {
        let instance = line_instance(
            &[(10, 1.0, 0), (10, 1.0, 0)],
            &[(1, 2, 4), (2, 3, 4), (3, 4, 4)],
        );
        let solution = NaiveRoundRobin.construct(&instance).unwrap();

        assert_eq!(solution.agenda(0).to_string(), "[P0 D0 P2 D2]");
        assert_eq!(solution.agenda(1).to_string(), "[P1 D1]");
        assert!(solution.is_capacity_feasible(&instance));
        assert_eq!(solution.check_structure(&instance), Ok(()));
    }

    #[test]
    fn test_greedy_rejects_oversized_task() {
        let instance = line_instance(&[(5, 1.0, 0), (5, 1.0, 0)], &[(1, 2, 6)]);
        let err = GreedyFirstFit.construct(&instance).unwrap_err();

        assert_eq!(err, InfeasibleFleetError { task: 0, weight: 6, capacity: 5 });
    }

    #[test]
    fn test_greedy_first_fit() {
        let instance = line_instance(
            &[(3, 1.0, 0), (8, 1.0, 0), (10, 1.0, 0)],
            &[(1, 2, 2), (2, 3, 7), (3, 4, 9)],
        );
        let solution = GreedyFirstFit.construct(&instance).unwrap();

        assert_eq!(solution.vehicle_of(0), Some(0));
        assert_eq!(solution.vehicle_of(1), Some(1));
        assert_eq!(solution.vehicle_of(2), Some(2));
        assert!(solution.is_capacity_feasible(&instance));
    }

    #[test]
    fn test_naive_refuses_small_vehicle() {
        let instance = line_instance(&[(10, 1.0, 0), (3, 1.0, 0)], &[(1, 2, 2), (2, 3, 7)]);
        let err = NaiveRoundRobin.construct(&instance).unwrap_err();
        assert_eq!(err.task, 1);

        // Auto falls back to first-fit on such fleets
        let solution = InitialPolicy::Auto.construct(&instance).unwrap();
        assert_eq!(solution.busy_vehicles(), vec![0]);
    }

    #[test]
    fn test_chaining_follows_delivery_cities() {
        let instance = line_instance(
            &[(10, 1.0, 0), (10, 1.0, 0)],
            &[(1, 2, 1), (5, 6, 1), (2, 3, 1), (6, 8, 1)],
        );
        let solution = ChainingRoundRobin.construct(&instance).unwrap();

        // 0 ends in 2 where 2 starts, 1 ends in 6 where 3 starts
        assert_eq!(solution.agenda(0).to_string(), "[P0 D0 P2 D2]");
        assert_eq!(solution.agenda(1).to_string(), "[P1 D1 P3 D3]");
    }

    #[test]
    fn test_no_tasks_gives_empty_agendas() {
        let instance = line_instance(&[(10, 1.0, 0)], &[]);
        let solution = InitialPolicy::Naive.construct(&instance).unwrap();

        assert!(solution.busy_vehicles().is_empty());
        assert_eq!(solution.total_cost(), 0.0);
    }
}
