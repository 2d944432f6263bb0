use crate::instance::{City, Instance, Task, Topology, Vehicle};

pub const LINE_CITIES: usize = 12;

/// Instance whose cities lie on a line at x = 0, 1, 2, ... (complete graph).
///
/// Vehicles are `(capacity, cost_per_km, home_city)`, tasks are
/// `(pickup_city, delivery_city, weight)`.
pub fn line_instance(vehicles: &[(i32, f64, usize)], tasks: &[(usize, usize, i32)]) -> Instance {
    let cities = (0..LINE_CITIES)
        .map(|i| City::new(i, &format!("c{}", i), i as f64, 0.0))
        .collect();
    let topology = Topology::new(cities, Vec::new()).unwrap();

    let vehicles = vehicles
        .iter()
        .enumerate()
        .map(|(i, &(capacity, cost, home))| Vehicle::new(i, &format!("v{}", i), home, capacity, cost))
        .collect();
    let tasks = tasks
        .iter()
        .enumerate()
        .map(|(i, &(pickup, delivery, weight))| Task::new(i, pickup, delivery, weight))
        .collect();

    Instance::new("line", topology, vehicles, tasks).unwrap()
}
