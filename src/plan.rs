//! Expansion of agendas into concrete per-vehicle action lists.

use crate::instance::{CityId, Instance, TaskId, VehicleId};
use crate::solution::Solution;
use serde::Serialize;

/// A single step of a vehicle plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "id", rename_all = "lowercase")]
pub enum Action {
    Move(CityId),
    Pickup(TaskId),
    Delivery(TaskId),
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Move(city) => write!(f, "move {}", city),
            Action::Pickup(task) => write!(f, "pickup {}", task),
            Action::Delivery(task) => write!(f, "deliver {}", task),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VehiclePlan {
    pub vehicle: VehicleId,
    pub actions: Vec<Action>,
    pub distance: f64,
    pub cost: f64,
}

impl VehiclePlan {
    pub fn num_moves(&self) -> usize {
        self.actions.iter().filter(|a| matches!(a, Action::Move(_))).count()
    }
}

/// Plan of every vehicle: each event of the agenda is preceded by the moves
/// along the shortest path from the previous city.
pub fn materialize(instance: &Instance, solution: &Solution) -> Vec<VehiclePlan> {
    solution
        .agendas()
        .enumerate()
        .map(|(v, agenda)| {
            let vehicle = &instance.vehicles[v];
            let mut actions = Vec::with_capacity(agenda.len() * 2);
            let mut current = vehicle.current_city();
            let mut distance = 0.0;

            for event in agenda.events() {
                let target = event.end_city();
                for city in instance.topology.path(current, target) {
                    distance += instance.distance(current, city);
                    actions.push(Action::Move(city));
                    current = city;
                }
                actions.push(if event.is_pickup() {
                    Action::Pickup(event.task_id())
                } else {
                    Action::Delivery(event.task_id())
                });
            }

            VehiclePlan {
                vehicle: v,
                actions,
                distance,
                cost: distance * vehicle.cost_per_distance(),
            }
        })
        .collect()
}
