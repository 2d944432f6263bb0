//! Neighborhood generation for the stochastic local search.
//!
//! The elementary move is [`transfer_task`]: take one task out of a vehicle
//! and insert its pickup and delivery somewhere in a (possibly the same)
//! vehicle. Larger neighborhoods enumerate its parameters. [`swap_two_tasks`]
//! is a secondary move that exchanges the slots of two tasks of one vehicle.
//!
//! Every operator returns only capacity-feasible solutions; infeasible
//! candidates are silently dropped.

use crate::agenda::can_be_carried;
use crate::instance::{Instance, Task, TaskId, VehicleId};
use crate::solution::Solution;
use serde::{Deserialize, Serialize};

/// Trait for neighborhood operators
pub trait NeighborhoodOperator {
    /// Solutions reachable from `solution` by moving tasks of `vehicle`
    fn neighbors(&self, instance: &Instance, solution: &Solution, vehicle: VehicleId) -> Vec<Solution>;
    fn name(&self) -> &str;
}

/// Move `task` from `v_from` to `v_to`, pickup at `pickup_pos` and delivery
/// at `delivery_pos`.
///
/// The task is removed from `v_from` first, so when both vehicles are the same
/// the positions refer to the agenda without the task. The delivery position
/// is counted in the agenda that already holds the pickup, and both positions
/// are clamped to the end of the agenda. Returns `None` when
/// `pickup_pos >= delivery_pos`, when `v_from` does not handle the task, or
/// when `v_to` cannot carry its new agenda.
pub fn transfer_task(
    instance: &Instance,
    solution: &Solution,
    v_from: VehicleId,
    v_to: VehicleId,
    task: &Task,
    pickup_pos: usize,
    delivery_pos: usize,
) -> Option<Solution> {
    if pickup_pos >= delivery_pos || !solution.agenda(v_from).contains_task(task.id) {
        return None;
    }

    let from_agenda = solution.agenda(v_from).without_task(task.id);
    let to_agenda = if v_from == v_to {
        from_agenda.with_task_inserted(*task, pickup_pos, delivery_pos)
    } else {
        solution.agenda(v_to).with_task_inserted(*task, pickup_pos, delivery_pos)
    };

    if !can_be_carried(&instance.vehicles[v_to], &to_agenda) {
        return None;
    }

    // Removing a task never raises the load of v_from, no need to re-check it
    let changes = if v_from == v_to {
        vec![(v_to, to_agenda)]
    } else {
        vec![(v_from, from_agenda), (v_to, to_agenda)]
    };
    Some(solution.with_agendas(instance, changes))
}

/// For every task handled by `v_from`, transfer it to every vehicle
/// (including `v_from` itself) at every admissible pair of positions.
pub fn transfer_all_tasks_to_all_vehicles(
    instance: &Instance,
    solution: &Solution,
    v_from: VehicleId,
) -> Vec<Solution> {
    let mut solutions = Vec::new();

    for task in solution.agenda(v_from).tasks() {
        for v_to in 0..solution.num_vehicles() {
            // Length of the agenda the insertion applies to
            let len = if v_to == v_from {
                solution.agenda(v_to).len() - 2
            } else {
                solution.agenda(v_to).len()
            };

            for pickup in 0..=len {
                for delivery in pickup + 1..=len + 1 {
                    if let Some(s) = transfer_task(instance, solution, v_from, v_to, &task, pickup, delivery) {
                        solutions.push(s);
                    }
                }
            }
        }
    }

    solutions
}

/// Transfer the first task of `v_from` to the front of every other vehicle,
/// with its delivery at every later position.
pub fn transfer_first_task(instance: &Instance, solution: &Solution, v_from: VehicleId) -> Vec<Solution> {
    let mut solutions = Vec::new();

    let task = match solution.agenda(v_from).first_task() {
        Some(task) => task,
        None => return solutions,
    };

    for v_to in (0..solution.num_vehicles()).filter(|&v| v != v_from) {
        let len = solution.agenda(v_to).len();
        for delivery in 1..=len + 1 {
            if let Some(s) = transfer_task(instance, solution, v_from, v_to, &task, 0, delivery) {
                solutions.push(s);
            }
        }
    }

    solutions
}

/// Exchange the slots of two tasks of the same vehicle: A's pickup and
/// delivery take B's pickup and delivery slots, and conversely.
///
/// The carried weights are reordered, so the agenda is checked against the
/// vehicle's capacity again. `None` if a task is not handled by the vehicle
/// or the swapped agenda overflows.
pub fn swap_two_tasks(
    instance: &Instance,
    solution: &Solution,
    vehicle: VehicleId,
    task_a: TaskId,
    task_b: TaskId,
) -> Option<Solution> {
    if task_a == task_b {
        return None;
    }
    let agenda = solution.agenda(vehicle).with_tasks_swapped(task_a, task_b)?;
    if !can_be_carried(&instance.vehicles[vehicle], &agenda) {
        return None;
    }
    Some(solution.with_agendas(instance, vec![(vehicle, agenda)]))
}

/// Swap the first task of the vehicle with every other task it handles,
/// one solution per swap
pub fn swap_first_task(instance: &Instance, solution: &Solution, vehicle: VehicleId) -> Vec<Solution> {
    let tasks = solution.agenda(vehicle).tasks();
    let Some((first, others)) = tasks.split_first() else {
        return Vec::new();
    };

    others
        .iter()
        .filter_map(|other| swap_two_tasks(instance, solution, vehicle, first.id, other.id))
        .collect()
}

/// Relocate any task of the source vehicle anywhere in the fleet
pub struct TransferAllTasks;

impl NeighborhoodOperator for TransferAllTasks {
    fn neighbors(&self, instance: &Instance, solution: &Solution, vehicle: VehicleId) -> Vec<Solution> {
        transfer_all_tasks_to_all_vehicles(instance, solution, vehicle)
    }

    fn name(&self) -> &str {
        "TransferAllTasks"
    }
}

/// Move the first task of the source vehicle to the front of another vehicle
pub struct TransferFirstTask;

impl NeighborhoodOperator for TransferFirstTask {
    fn neighbors(&self, instance: &Instance, solution: &Solution, vehicle: VehicleId) -> Vec<Solution> {
        transfer_first_task(instance, solution, vehicle)
    }

    fn name(&self) -> &str {
        "TransferFirstTask"
    }
}

/// Swap the first task of the vehicle with each of its other tasks
pub struct SwapFirstTask;

impl NeighborhoodOperator for SwapFirstTask {
    fn neighbors(&self, instance: &Instance, solution: &Solution, vehicle: VehicleId) -> Vec<Solution> {
        swap_first_task(instance, solution, vehicle)
    }

    fn name(&self) -> &str {
        "SwapFirstTask"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferMode {
    /// Every task of the source vehicle, every vehicle, every position pair
    #[default]
    AllTasks,
    /// First task of the source vehicle, front of every other vehicle
    FirstTask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwapMode {
    #[default]
    Off,
    /// Swap neighbors of each transfer neighbor, on the vehicles it changed
    Layered,
    /// Swap neighbors of the current solution, next to the transfer neighbors
    Independent,
}

/// How the operators are combined into one neighborhood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborhoodConfig {
    pub transfer: TransferMode,
    pub swap: SwapMode,
}

/// Builds the neighborhood of a solution around a source vehicle
pub struct NeighborhoodGenerator {
    transfer: Box<dyn NeighborhoodOperator + Send + Sync>,
    swap: SwapFirstTask,
    swap_mode: SwapMode,
}

impl NeighborhoodGenerator {
    pub fn new(config: &NeighborhoodConfig) -> Self {
        let transfer: Box<dyn NeighborhoodOperator + Send + Sync> = match config.transfer {
            TransferMode::AllTasks => Box::new(TransferAllTasks),
            TransferMode::FirstTask => Box::new(TransferFirstTask),
        };
        NeighborhoodGenerator { transfer, swap: SwapFirstTask, swap_mode: config.swap }
    }

    /// Every feasible solution one move away from `solution`. The solution
    /// itself is not part of the result.
    pub fn generate(&self, instance: &Instance, solution: &Solution, source: VehicleId) -> Vec<Solution> {
        let mut neighbors = self.transfer.neighbors(instance, solution, source);

        match self.swap_mode {
            SwapMode::Off => {}
            SwapMode::Layered => {
                let mut swapped = Vec::new();
                for neighbor in &neighbors {
                    for vehicle in 0..neighbor.num_vehicles() {
                        if !neighbor.shares_agenda(solution, vehicle) {
                            swapped.extend(self.swap.neighbors(instance, neighbor, vehicle));
                        }
                    }
                }
                neighbors.extend(swapped);
            }
            SwapMode::Independent => {
                neighbors.extend(self.swap.neighbors(instance, solution, source));
            }
        }

        log::trace!(
            "{} from vehicle {}: {} neighbors",
            self.transfer.name(),
            source,
            neighbors.len()
        );
        neighbors
    }
}

impl Default for NeighborhoodGenerator {
    fn default() -> Self {
        Self::new(&NeighborhoodConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::construction::{ConstructionHeuristic, NaiveRoundRobin};
    use crate::test_utils::line_instance;

    fn assert_valid(instance: &Instance, solutions: &[Solution]) {
        for s in solutions {
            assert_eq!(s.check_structure(instance), Ok(()));
            assert!(s.is_capacity_feasible(instance));
        }
    }

    #[test]
    fn test_transfer_between_vehicles() {
        let instance = line_instance(&[(10, 1.0, 0), (10, 1.0, 5)], &[(1, 2, 3), (6, 7, 3)]);
        let solution = NaiveRoundRobin.construct(&instance).unwrap();
        let task = instance.tasks[0];

        let moved = transfer_task(&instance, &solution, 0, 1, &task, 0, 1).unwrap();
        assert!(moved.agenda(0).is_empty());
        assert_eq!(moved.agenda(1).to_string(), "[P0 D0 P1 D1]");
        // The source solution is untouched
        assert_eq!(solution.agenda(0).to_string(), "[P0 D0]");

        // Clamped to the end of the destination agenda
        let appended = transfer_task(&instance, &solution, 0, 1, &task, 7, 9).unwrap();
        assert_eq!(appended.agenda(1).to_string(), "[P1 D1 P0 D0]");

        assert!(transfer_task(&instance, &solution, 0, 1, &task, 1, 1).is_none());
        // Task 0 is not handled by vehicle 1
        assert!(transfer_task(&instance, &solution, 1, 0, &task, 0, 1).is_none());
    }

    #[test]
    fn test_transfer_rejects_capacity_overflow() {
        // Vehicle 1 already carries 6 over its whole agenda
        let instance = line_instance(&[(10, 1.0, 0), (10, 1.0, 0)], &[(1, 2, 5), (3, 4, 6)]);
        let solution = NaiveRoundRobin.construct(&instance).unwrap();
        let task = instance.tasks[0];

        // Pickup before P1, delivery after D1: 5 + 6 = 11 > 10
        assert!(transfer_task(&instance, &solution, 0, 1, &task, 0, 3).is_none());
        // One after the other fits
        assert!(transfer_task(&instance, &solution, 0, 1, &task, 2, 3).is_some());
        assert_eq!(solution.agenda(0).to_string(), "[P0 D0]");
        assert_eq!(solution.agenda(1).to_string(), "[P1 D1]");
    }

    #[test]
    fn test_transfer_within_same_vehicle() {
        let instance = line_instance(&[(10, 1.0, 0)], &[(1, 2, 1), (3, 4, 1)]);
        let solution = NaiveRoundRobin.construct(&instance).unwrap();
        let task = instance.tasks[0];

        // Positions refer to [P1 D1]
        let moved = transfer_task(&instance, &solution, 0, 0, &task, 1, 3).unwrap();
        assert_eq!(moved.agenda(0).to_string(), "[P1 P0 D1 D0]");
    }

    #[test]
    fn test_transfer_all_enumerates_every_slot() {
        let instance = line_instance(&[(10, 1.0, 0), (10, 1.0, 0)], &[(1, 2, 1), (3, 4, 1)]);
        let solution = NaiveRoundRobin.construct(&instance).unwrap();

        let neighbors = transfer_all_tasks_to_all_vehicles(&instance, &solution, 0);
        // Into vehicle 1 (length 2): 6 position pairs; back into empty vehicle 0: 1
        assert_eq!(neighbors.len(), 7);
        assert_valid(&instance, &neighbors);

        let distinct: Vec<&Solution> = neighbors.iter().fold(Vec::new(), |mut acc, s| {
            if !acc.contains(&s) {
                acc.push(s);
            }
            acc
        });
        assert_eq!(distinct.len(), neighbors.len());
        assert!(neighbors.contains(&solution));
    }

    #[test]
    fn test_single_vehicle_identity_is_best() {
        // One vehicle at city 1, two tasks of weight 4 picked up and delivered
        // in the same city, at distinct cities
        let instance = line_instance(&[(10, 1.0, 1)], &[(1, 1, 4), (4, 4, 4)]);
        let solution = NaiveRoundRobin.construct(&instance).unwrap();
        assert!(solution.is_capacity_feasible(&instance));

        let neighbors = transfer_all_tasks_to_all_vehicles(&instance, &solution, 0);
        assert!(!neighbors.is_empty());
        assert_valid(&instance, &neighbors);
        assert!(neighbors.iter().all(|n| n.total_cost() >= solution.total_cost() - 1e-9));
    }

    #[test]
    fn test_transfer_all_finds_batching() {
        // Both tasks go from 1 to 3: carrying them together saves a round trip
        let instance = line_instance(&[(10, 1.0, 0)], &[(1, 3, 4), (1, 3, 4)]);
        let solution = NaiveRoundRobin.construct(&instance).unwrap();

        let best = transfer_all_tasks_to_all_vehicles(&instance, &solution, 0)
            .into_iter()
            .min_by(|a, b| a.total_cost().total_cmp(&b.total_cost()))
            .unwrap();
        assert!((solution.total_cost() - 7.0).abs() < 1e-9);
        assert!((best.total_cost() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_transfer_first_task() {
        let instance = line_instance(&[(10, 1.0, 0), (10, 1.0, 0), (10, 1.0, 0)], &[(1, 2, 1), (3, 4, 1)]);
        let solution = NaiveRoundRobin.construct(&instance).unwrap();

        let neighbors = transfer_first_task(&instance, &solution, 0);
        // Vehicle 1 holds [P1 D1]: delivery after P0 at 1, 2 or 3; empty vehicle 2: 1
        assert_eq!(neighbors.len(), 4);
        assert!(neighbors.iter().all(|n| n.agenda(0).is_empty()));
        assert!(transfer_first_task(&instance, &solution, 2).is_empty());
    }

    #[test]
    fn test_swap_rechecks_capacity() {
        let instance = line_instance(&[(10, 1.0, 0)], &[(1, 5, 2), (2, 3, 9), (4, 6, 1)]);
        let t0 = instance.tasks[0];
        let t1 = instance.tasks[1];
        let t2 = instance.tasks[2];

        // [P0 P2 D2 D0 P1 D1]: max load 9
        let agenda = crate::agenda::Agenda::new()
            .with_task_inserted(t0, 0, 1)
            .with_task_inserted(t2, 1, 2)
            .with_task_inserted(t1, 4, 5);
        let solution = Solution::new(&instance, vec![agenda]).unwrap();
        assert_eq!(solution.agenda(0).to_string(), "[P0 P2 D2 D0 P1 D1]");

        // Task 1 takes task 2's slots inside task 0: 2 + 9 > 10
        assert!(swap_two_tasks(&instance, &solution, 0, 2, 1).is_none());
        // Task 0 and task 2 exchange slots: still fits
        let swapped = swap_two_tasks(&instance, &solution, 0, 0, 2).unwrap();
        assert_eq!(swapped.agenda(0).to_string(), "[P2 P0 D0 D2 P1 D1]");

        let all = swap_first_task(&instance, &solution, 0);
        assert_eq!(all.len(), 2);
        assert_valid(&instance, &all);
    }

    #[test]
    fn test_generator_modes() {
        let instance = line_instance(&[(10, 1.0, 0), (10, 1.0, 3)], &[(1, 2, 1), (3, 4, 1), (5, 6, 1)]);
        let solution = NaiveRoundRobin.construct(&instance).unwrap();

        let plain = NeighborhoodGenerator::default().generate(&instance, &solution, 0);
        let layered = NeighborhoodGenerator::new(&NeighborhoodConfig {
            transfer: TransferMode::AllTasks,
            swap: SwapMode::Layered,
        })
        .generate(&instance, &solution, 0);
        let independent = NeighborhoodGenerator::new(&NeighborhoodConfig {
            transfer: TransferMode::AllTasks,
            swap: SwapMode::Independent,
        })
        .generate(&instance, &solution, 0);

        assert!(layered.len() > plain.len());
        // Vehicle 0 handles tasks 0 and 2: one extra swap neighbor
        assert_eq!(independent.len(), plain.len() + 1);
        assert_valid(&instance, &layered);
        assert_valid(&instance, &independent);
    }
}
