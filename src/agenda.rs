//! Per-vehicle agendas of pickup and delivery events.
//!
//! An [`Agenda`] is the "simple" plan of a vehicle: the ordered list of
//! events it performs, without the moves between cities. Agendas are values;
//! every editing method returns a new agenda.

use crate::instance::{CityId, Task, TaskId, Vehicle};
use serde::{Deserialize, Serialize};

/// A single pickup or delivery event of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskWrapper {
    task: Task,
    pickup: bool,
}

impl TaskWrapper {
    pub fn pickup(task: Task) -> Self {
        TaskWrapper { task, pickup: true }
    }

    pub fn delivery(task: Task) -> Self {
        TaskWrapper { task, pickup: false }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id
    }

    pub fn is_pickup(&self) -> bool {
        self.pickup
    }

    /// City where the event takes place, and where the vehicle stands after it
    pub fn end_city(&self) -> CityId {
        if self.pickup {
            self.task.pickup_city
        } else {
            self.task.delivery_city
        }
    }

    /// Change in carried weight caused by this event
    pub fn load_delta(&self) -> i32 {
        if self.pickup {
            self.task.weight
        } else {
            -self.task.weight
        }
    }
}

impl std::fmt::Display for TaskWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.pickup { "P" } else { "D" };
        write!(f, "{}{}", kind, self.task.id)
    }
}

/// Ordered events of one vehicle
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Agenda {
    events: Vec<TaskWrapper>,
}

impl Agenda {
    pub fn new() -> Self {
        Agenda { events: Vec::new() }
    }

    pub fn from_events(events: Vec<TaskWrapper>) -> Self {
        Agenda { events }
    }

    pub fn events(&self) -> &[TaskWrapper] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append a task as a unit: pickup immediately followed by delivery
    pub fn push_task(&mut self, task: Task) {
        self.events.push(TaskWrapper::pickup(task));
        self.events.push(TaskWrapper::delivery(task));
    }

    /// Tasks handled by this agenda, in pickup order
    pub fn tasks(&self) -> Vec<Task> {
        self.events
            .iter()
            .filter(|e| e.is_pickup())
            .map(|e| *e.task())
            .collect()
    }

    /// First task picked up by this agenda
    pub fn first_task(&self) -> Option<Task> {
        self.events.iter().find(|e| e.is_pickup()).map(|e| *e.task())
    }

    pub fn contains_task(&self, task: TaskId) -> bool {
        self.events.iter().any(|e| e.task_id() == task)
    }

    /// Positions of the pickup and delivery events of a task
    pub fn positions(&self, task: TaskId) -> (Option<usize>, Option<usize>) {
        let mut pickup = None;
        let mut delivery = None;
        for (i, event) in self.events.iter().enumerate() {
            if event.task_id() == task {
                if event.is_pickup() {
                    pickup = Some(i);
                } else {
                    delivery = Some(i);
                }
            }
        }
        (pickup, delivery)
    }

    /// Copy of this agenda without any event of `task`
    pub fn without_task(&self, task: TaskId) -> Agenda {
        Agenda {
            events: self.events.iter().filter(|e| e.task_id() != task).copied().collect(),
        }
    }

    /// Copy of this agenda with `task` inserted.
    ///
    /// The pickup goes to `pickup_pos`, then the delivery goes to
    /// `delivery_pos` in the agenda that already holds the pickup. Both
    /// positions are clamped to the end of the agenda.
    pub fn with_task_inserted(&self, task: Task, pickup_pos: usize, delivery_pos: usize) -> Agenda {
        let mut events = Vec::with_capacity(self.events.len() + 2);
        events.extend_from_slice(&self.events);

        let pickup_pos = pickup_pos.min(events.len());
        events.insert(pickup_pos, TaskWrapper::pickup(task));

        let delivery_pos = delivery_pos.min(events.len());
        events.insert(delivery_pos, TaskWrapper::delivery(task));

        Agenda { events }
    }

    /// Copy of this agenda with the slots of two tasks exchanged: A's pickup
    /// takes B's pickup slot, A's delivery takes B's delivery slot, and
    /// conversely. `None` if either task is not fully present.
    pub fn with_tasks_swapped(&self, task_a: TaskId, task_b: TaskId) -> Option<Agenda> {
        let (pickup_a, delivery_a) = self.positions(task_a);
        let (pickup_b, delivery_b) = self.positions(task_b);
        let (pickup_a, delivery_a) = (pickup_a?, delivery_a?);
        let (pickup_b, delivery_b) = (pickup_b?, delivery_b?);

        let mut events = self.events.clone();
        events.swap(pickup_a, pickup_b);
        events.swap(delivery_a, delivery_b);
        Some(Agenda { events })
    }

    /// Carried weight after each event
    pub fn load_profile(&self) -> Vec<i32> {
        let mut load = 0;
        self.events
            .iter()
            .map(|e| {
                load += e.load_delta();
                load
            })
            .collect()
    }

    /// Maximum carried weight over the agenda (0 for an empty agenda)
    pub fn max_load(&self) -> i32 {
        let mut load = 0;
        let mut max_load = 0;
        for event in &self.events {
            load += event.load_delta();
            max_load = max_load.max(load);
        }
        max_load
    }

    /// Travelled distance from `start` through every event city
    pub fn distance<F>(&self, start: CityId, distance: F) -> f64
    where
        F: Fn(CityId, CityId) -> f64,
    {
        let mut from = start;
        let mut total = 0.0;
        for event in &self.events {
            let to = event.end_city();
            total += distance(from, to);
            from = to;
        }
        total
    }
}

impl std::fmt::Display for Agenda {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, event) in self.events.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", event)?;
        }
        write!(f, "]")
    }
}

/// Whether the vehicle can carry out the agenda, i.e. whether at no point
/// it has to carry strictly more than its capacity
pub fn can_be_carried(vehicle: &Vehicle, agenda: &Agenda) -> bool {
    agenda.max_load() <= vehicle.capacity()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: TaskId, weight: i32) -> Task {
        Task::new(id, id, id + 1, weight)
    }

    #[test]
    fn test_wrapper_equality_and_cities() {
        let t = Task::new(0, 2, 5, 3);
        assert_eq!(TaskWrapper::pickup(t), TaskWrapper::pickup(t));
        assert_ne!(TaskWrapper::pickup(t), TaskWrapper::delivery(t));
        assert_eq!(TaskWrapper::pickup(t).end_city(), 2);
        assert_eq!(TaskWrapper::delivery(t).end_city(), 5);
    }

    #[test]
    fn test_insert_clamps_positions() {
        let mut agenda = Agenda::new();
        agenda.push_task(task(0, 1));

        let agenda = agenda.with_task_inserted(task(1, 1), 10, 20);
        assert_eq!(agenda.to_string(), "[P0 D0 P1 D1]");

        let agenda = agenda.with_task_inserted(task(2, 1), 0, 2);
        assert_eq!(agenda.to_string(), "[P2 P0 D2 D0 P1 D1]");
    }

    #[test]
    fn test_without_task() {
        let mut agenda = Agenda::new();
        agenda.push_task(task(0, 1));
        agenda.push_task(task(1, 1));

        let agenda = agenda.without_task(0);
        assert_eq!(agenda.to_string(), "[P1 D1]");
        assert!(!agenda.contains_task(0));
    }

    #[test]
    fn test_swap_exchanges_slots() {
        let agenda = Agenda::from_events(vec![
            TaskWrapper::pickup(task(0, 1)),
            TaskWrapper::pickup(task(1, 1)),
            TaskWrapper::delivery(task(0, 1)),
            TaskWrapper::delivery(task(1, 1)),
        ]);

        let swapped = agenda.with_tasks_swapped(0, 1).unwrap();
        assert_eq!(swapped.to_string(), "[P1 P0 D1 D0]");
        assert!(agenda.with_tasks_swapped(0, 7).is_none());
    }

    #[test]
    fn test_capacity_checker_uses_prefix_maximum() {
        let vehicle = Vehicle::new(0, "v", 0, 10, 1.0);

        // 4 + 4 carried together, fits
        let agenda = Agenda::new()
            .with_task_inserted(task(0, 4), 0, 1)
            .with_task_inserted(task(1, 4), 1, 2);
        assert_eq!(agenda.load_profile(), vec![4, 8, 4, 0]);
        assert!(can_be_carried(&vehicle, &agenda));

        // 6 + 6 carried together, overflows in the middle
        let agenda = Agenda::new()
            .with_task_inserted(task(0, 6), 0, 1)
            .with_task_inserted(task(1, 6), 1, 2);
        assert_eq!(agenda.max_load(), 12);
        assert!(!can_be_carried(&vehicle, &agenda));

        // Same tasks one after the other, fits
        let mut sequential = Agenda::new();
        sequential.push_task(task(0, 6));
        sequential.push_task(task(1, 6));
        assert!(can_be_carried(&vehicle, &sequential));
        assert!(can_be_carried(&vehicle, &Agenda::new()));
    }
}
