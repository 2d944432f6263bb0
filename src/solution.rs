//! Solution representation and evaluation.
//!
//! A [`Solution`] maps every vehicle of the fleet to its [`Agenda`] and caches
//! the total cost. Solutions are never mutated once built: operators derive
//! new solutions that share the untouched agendas with their parent.

use crate::agenda::{can_be_carried, Agenda};
use crate::error::StructuralError;
use crate::instance::{Instance, TaskId, VehicleId};
use serde::Serialize;
use std::sync::Arc;

/// A complete assignment of tasks to vehicles
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    /// One agenda per vehicle, indexed by vehicle id
    agendas: Vec<Arc<Agenda>>,
    /// Route cost of each vehicle
    vehicle_costs: Vec<f64>,
    /// Sum of the vehicle costs
    total_cost: f64,
}

impl Solution {
    /// Build a solution from one agenda per vehicle, checking its structure
    pub fn new(instance: &Instance, agendas: Vec<Agenda>) -> Result<Self, StructuralError> {
        let agendas: Vec<Arc<Agenda>> = agendas.into_iter().map(Arc::new).collect();
        check_structure(instance, &agendas)?;
        Ok(Self::evaluate(instance, agendas))
    }

    /// Build a solution from agendas that operators already keep consistent
    pub(crate) fn from_shared(instance: &Instance, agendas: Vec<Arc<Agenda>>) -> Self {
        debug_assert_eq!(check_structure(instance, &agendas), Ok(()));
        Self::evaluate(instance, agendas)
    }

    fn evaluate(instance: &Instance, agendas: Vec<Arc<Agenda>>) -> Self {
        let vehicle_costs: Vec<f64> = agendas
            .iter()
            .enumerate()
            .map(|(v, agenda)| route_cost(instance, v, agenda))
            .collect();
        let total_cost = vehicle_costs.iter().sum();

        Solution { agendas, vehicle_costs, total_cost }
    }

    /// Derive a new solution where only the given vehicles get new agendas.
    ///
    /// Untouched agendas are shared with `self` and their costs reused.
    pub(crate) fn with_agendas(&self, instance: &Instance, changes: Vec<(VehicleId, Agenda)>) -> Solution {
        let mut agendas = self.agendas.clone();
        let mut vehicle_costs = self.vehicle_costs.clone();

        for (vehicle, agenda) in changes {
            vehicle_costs[vehicle] = route_cost(instance, vehicle, &agenda);
            agendas[vehicle] = Arc::new(agenda);
        }
        debug_assert_eq!(check_structure(instance, &agendas), Ok(()));

        let total_cost = vehicle_costs.iter().sum();
        Solution { agendas, vehicle_costs, total_cost }
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn vehicle_cost(&self, vehicle: VehicleId) -> f64 {
        self.vehicle_costs[vehicle]
    }

    pub fn agenda(&self, vehicle: VehicleId) -> &Agenda {
        &self.agendas[vehicle]
    }

    pub fn agendas(&self) -> impl Iterator<Item = &Agenda> {
        self.agendas.iter().map(|a| a.as_ref())
    }

    pub fn num_vehicles(&self) -> usize {
        self.agendas.len()
    }

    /// Vehicles with at least one task
    pub fn busy_vehicles(&self) -> Vec<VehicleId> {
        self.agendas
            .iter()
            .enumerate()
            .filter(|(_, agenda)| !agenda.is_empty())
            .map(|(v, _)| v)
            .collect()
    }

    /// Vehicle in charge of a task
    pub fn vehicle_of(&self, task: TaskId) -> Option<VehicleId> {
        self.agendas.iter().position(|agenda| agenda.contains_task(task))
    }

    /// Whether the agendas are physically the same objects as in `other`
    pub fn shares_agenda(&self, other: &Solution, vehicle: VehicleId) -> bool {
        Arc::ptr_eq(&self.agendas[vehicle], &other.agendas[vehicle])
    }

    /// Check every vehicle against its capacity
    pub fn is_capacity_feasible(&self, instance: &Instance) -> bool {
        self.agendas
            .iter()
            .zip(&instance.vehicles)
            .all(|(agenda, vehicle)| can_be_carried(vehicle, agenda))
    }

    /// Full consistency check (task coverage and ordering)
    pub fn check_structure(&self, instance: &Instance) -> Result<(), StructuralError> {
        check_structure(instance, &self.agendas)
    }
}

/// Two solutions are equal when every vehicle has the same sequence of events
impl PartialEq for Solution {
    fn eq(&self, other: &Self) -> bool {
        self.agendas == other.agendas
    }
}

impl Eq for Solution {}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution")?;
        writeln!(f, "  Total cost: {:.2}", self.total_cost)?;
        for (v, agenda) in self.agendas.iter().enumerate() {
            writeln!(f, "  Vehicle {} ({:.2}): {}", v, self.vehicle_costs[v], agenda)?;
        }
        Ok(())
    }
}

/// Cost of one vehicle following its agenda from its current city
pub fn route_cost(instance: &Instance, vehicle: VehicleId, agenda: &Agenda) -> f64 {
    let vehicle = &instance.vehicles[vehicle];
    let distance = agenda.distance(vehicle.current_city(), |a, b| instance.distance(a, b));
    distance * vehicle.cost_per_distance()
}

fn check_structure(instance: &Instance, agendas: &[Arc<Agenda>]) -> Result<(), StructuralError> {
    if agendas.len() != instance.num_vehicles() {
        return Err(StructuralError::FleetMismatch {
            expected: instance.num_vehicles(),
            found: agendas.len(),
        });
    }

    let num_tasks = instance.num_tasks();
    let mut pickup_vehicle: Vec<Option<VehicleId>> = vec![None; num_tasks];
    let mut delivery_vehicle: Vec<Option<VehicleId>> = vec![None; num_tasks];

    for (vehicle, agenda) in agendas.iter().enumerate() {
        for event in agenda.events() {
            let task = event.task_id();
            if task >= num_tasks {
                return Err(StructuralError::UnknownTask(task));
            }
            let slot = if event.is_pickup() {
                &mut pickup_vehicle[task]
            } else {
                &mut delivery_vehicle[task]
            };
            if slot.is_some() {
                return Err(StructuralError::DuplicateTask { task, vehicle });
            }
            *slot = Some(vehicle);
        }
    }

    for task in 0..num_tasks {
        match (pickup_vehicle[task], delivery_vehicle[task]) {
            (Some(p), Some(d)) if p != d => return Err(StructuralError::SplitTask { task }),
            (Some(_), Some(_)) => {}
            _ => return Err(StructuralError::MissingTask(task)),
        }
    }

    for (vehicle, agenda) in agendas.iter().enumerate() {
        let mut picked = vec![false; num_tasks];
        for event in agenda.events() {
            if event.is_pickup() {
                picked[event.task_id()] = true;
            } else if !picked[event.task_id()] {
                return Err(StructuralError::DeliveryBeforePickup { task: event.task_id(), vehicle });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agenda::TaskWrapper;
    use crate::test_utils::line_instance;

    #[test]
    fn test_cost_follows_agenda_order() {
        // Cities on a line at x = 0, 1, 2, ...; vehicle 0 at city 0 (cost 2/km)
        let instance = line_instance(&[(10, 2.0, 0)], &[(1, 3, 1), (2, 4, 1)]);
        let tasks = &instance.tasks;

        let mut agenda = Agenda::new();
        agenda.push_task(tasks[0]);
        agenda.push_task(tasks[1]);
        let solution = Solution::new(&instance, vec![agenda]).unwrap();

        // 0 -> 1 -> 3 -> 2 -> 4 = 1 + 2 + 1 + 2 = 6 km
        assert!((solution.total_cost() - 12.0).abs() < 1e-9);
        assert!(solution.is_capacity_feasible(&instance));
    }

    #[test]
    fn test_structural_errors() {
        let instance = line_instance(&[(10, 1.0, 0), (10, 1.0, 0)], &[(1, 2, 1), (2, 3, 1)]);
        let t0 = instance.tasks[0];
        let t1 = instance.tasks[1];

        let mut only_first = Agenda::new();
        only_first.push_task(t0);
        assert_eq!(
            Solution::new(&instance, vec![only_first.clone(), Agenda::new()]),
            Err(StructuralError::MissingTask(1))
        );

        assert_eq!(
            Solution::new(&instance, vec![only_first.clone()]),
            Err(StructuralError::FleetMismatch { expected: 2, found: 1 })
        );

        let mut twice = only_first.clone();
        twice.push_task(t1);
        let mut other = Agenda::new();
        other.push_task(t1);
        assert_eq!(
            Solution::new(&instance, vec![twice, other]),
            Err(StructuralError::DuplicateTask { task: 1, vehicle: 1 })
        );

        let reversed = Agenda::from_events(vec![
            TaskWrapper::delivery(t0),
            TaskWrapper::pickup(t0),
            TaskWrapper::pickup(t1),
            TaskWrapper::delivery(t1),
        ]);
        assert_eq!(
            Solution::new(&instance, vec![reversed, Agenda::new()]),
            Err(StructuralError::DeliveryBeforePickup { task: 0, vehicle: 0 })
        );

        let split_a = Agenda::from_events(vec![TaskWrapper::pickup(t0), TaskWrapper::pickup(t1), TaskWrapper::delivery(t1)]);
        let split_b = Agenda::from_events(vec![TaskWrapper::delivery(t0)]);
        assert_eq!(
            Solution::new(&instance, vec![split_a, split_b]),
            Err(StructuralError::SplitTask { task: 0 })
        );
    }

    #[test]
    fn test_with_agendas_shares_untouched_vehicles() {
        let instance = line_instance(&[(10, 1.0, 0), (10, 1.0, 5)], &[(1, 2, 1), (6, 7, 1)]);
        let mut a = Agenda::new();
        a.push_task(instance.tasks[0]);
        let mut b = Agenda::new();
        b.push_task(instance.tasks[1]);
        let solution = Solution::new(&instance, vec![a.clone(), b]).unwrap();

        let reordered = Agenda::new().with_task_inserted(instance.tasks[0], 0, 1);
        let next = solution.with_agendas(&instance, vec![(0, reordered)]);

        assert!(next.shares_agenda(&solution, 1));
        assert!(!next.shares_agenda(&solution, 0));
        assert_eq!(next, solution);
        assert!((next.total_cost() - solution.total_cost()).abs() < 1e-9);
        assert_eq!(next.vehicle_of(1), Some(1));
    }

    #[test]
    fn test_agendas_from_outside_are_checked() {
        let instance = line_instance(&[(10, 1.0, 0), (10, 1.0, 5)], &[(1, 2, 1), (6, 7, 1)]);
        let mut a = Agenda::new();
        a.push_task(instance.tasks[0]);
        let mut b = Agenda::new();
        b.push_task(instance.tasks[1]);
        let solution = Solution::new(&instance, vec![a, b]).unwrap();

        // Dropping a vehicle's agenda loses its task
        let mut agendas: Vec<Agenda> = solution.agendas().cloned().collect();
        agendas[1] = Agenda::new();
        assert_eq!(Solution::new(&instance, agendas), Err(StructuralError::MissingTask(1)));

        // Copying it onto the other vehicle assigns it twice
        let mut agendas: Vec<Agenda> = solution.agendas().cloned().collect();
        agendas[0] = solution.agenda(1).clone();
        agendas[0].push_task(instance.tasks[0]);
        assert_eq!(
            Solution::new(&instance, agendas),
            Err(StructuralError::DuplicateTask { task: 1, vehicle: 1 })
        );
    }
}
