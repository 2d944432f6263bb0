//! Module for parsing and representing pickup-and-delivery instances.
//!
//! An instance is a topology (cities and optional roads), a fleet of
//! capacity-constrained vehicles and a set of transport tasks. Two input
//! formats are supported: a section-based text format in the spirit of
//! TSP-LIB, and JSON.
//!
//! ```text
//! NAME: small
//! COMMENT: two vehicles
//! CITY_SECTION
//! 1 Lausanne 0.0 0.0
//! 2 Geneva -50.0 -20.0
//! ROAD_SECTION
//! 1 2
//! VEHICLE_SECTION
//! 1 truck-a 1 30 5.0
//! TASK_SECTION
//! 1 1 2 10
//! EOF
//! ```
//!
//! Ids are 1-indexed in files and 0-indexed internally. Vehicle lines are
//! `id name home_city capacity cost_per_km`, task lines are
//! `id pickup_city delivery_city weight`.

use crate::error::InstanceError;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub type CityId = usize;
pub type TaskId = usize;
pub type VehicleId = usize;

/// A city of the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    /// City identifier (0-indexed)
    pub id: CityId,
    /// Display name
    pub name: String,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl City {
    pub fn new(id: CityId, name: &str, x: f64, y: f64) -> Self {
        City { id, name: name.to_string(), x, y }
    }

    /// Straight-line distance to another city
    pub fn euclidean_distance(&self, other: &City) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Cities plus precomputed all-pairs shortest distances.
///
/// Without roads every pair of cities is directly connected. With roads,
/// travel follows the road network and `path` yields the intermediate cities.
#[derive(Debug, Clone)]
pub struct Topology {
    cities: Vec<City>,
    roads: Vec<(CityId, CityId)>,
    distance_matrix: Vec<Vec<f64>>,
    /// `next_hop[i][j]` is the first city after `i` on a shortest path to `j`
    next_hop: Vec<Vec<Option<CityId>>>,
}

impl Topology {
    /// Build a topology. An empty road list means a complete Euclidean graph.
    pub fn new(cities: Vec<City>, roads: Vec<(CityId, CityId)>) -> Result<Self, InstanceError> {
        let n = cities.len();
        for (i, city) in cities.iter().enumerate() {
            if city.id != i {
                return Err(InstanceError::Invalid(format!(
                    "city ids must be dense, found id {} at position {}", city.id, i
                )));
            }
        }
        for &(a, b) in &roads {
            if a >= n || b >= n {
                return Err(InstanceError::Invalid(format!("road {}-{} references an unknown city", a, b)));
            }
        }

        let (distance_matrix, next_hop) = if roads.is_empty() {
            Self::complete_graph(&cities)
        } else {
            Self::shortest_paths(&cities, &roads)?
        };

        Ok(Topology { cities, roads, distance_matrix, next_hop })
    }

    fn complete_graph(cities: &[City]) -> (Vec<Vec<f64>>, Vec<Vec<Option<CityId>>>) {
        let n = cities.len();
        let mut matrix = vec![vec![0.0; n]; n];
        let mut next = vec![vec![None; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    matrix[i][j] = cities[i].euclidean_distance(&cities[j]);
                    next[i][j] = Some(j);
                }
            }
        }

        (matrix, next)
    }

    /// Floyd-Warshall over the road network
    fn shortest_paths(
        cities: &[City],
        roads: &[(CityId, CityId)],
    ) -> Result<(Vec<Vec<f64>>, Vec<Vec<Option<CityId>>>), InstanceError> {
        let n = cities.len();
        let mut dist = vec![vec![f64::INFINITY; n]; n];
        let mut next = vec![vec![None; n]; n];

        for i in 0..n {
            dist[i][i] = 0.0;
        }
        for &(a, b) in roads {
            if a == b {
                continue;
            }
            let length = cities[a].euclidean_distance(&cities[b]);
            if length < dist[a][b] {
                dist[a][b] = length;
                dist[b][a] = length;
                next[a][b] = Some(b);
                next[b][a] = Some(a);
            }
        }

        for k in 0..n {
            for i in 0..n {
                if dist[i][k].is_infinite() {
                    continue;
                }
                for j in 0..n {
                    let through_k = dist[i][k] + dist[k][j];
                    if through_k < dist[i][j] {
                        dist[i][j] = through_k;
                        next[i][j] = next[i][k];
                    }
                }
            }
        }

        for i in 0..n {
            for j in 0..n {
                if dist[i][j].is_infinite() {
                    return Err(InstanceError::Disconnected { from: i, to: j });
                }
            }
        }

        Ok((dist, next))
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn roads(&self) -> &[(CityId, CityId)] {
        &self.roads
    }

    pub fn city(&self, id: CityId) -> &City {
        &self.cities[id]
    }

    pub fn num_cities(&self) -> usize {
        self.cities.len()
    }

    /// Get the travel distance between two cities
    #[inline]
    pub fn distance(&self, from: CityId, to: CityId) -> f64 {
        self.distance_matrix[from][to]
    }

    /// Cities visited when travelling from `from` to `to`, excluding `from`
    /// and ending with `to`. Empty when both are the same city.
    pub fn path(&self, from: CityId, to: CityId) -> Vec<CityId> {
        let mut path = Vec::new();
        let mut current = from;
        while current != to {
            match self.next_hop[current][to] {
                Some(hop) => {
                    path.push(hop);
                    current = hop;
                }
                None => break,
            }
        }
        path
    }
}

/// A transport task: carry `weight` from `pickup_city` to `delivery_city`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub pickup_city: CityId,
    pub delivery_city: CityId,
    pub weight: i32,
}

impl Task {
    pub fn new(id: TaskId, pickup_city: CityId, delivery_city: CityId, weight: i32) -> Self {
        Task { id, pickup_city, delivery_city, weight }
    }
}

/// A vehicle of the fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub name: String,
    /// City the vehicle starts from
    pub home_city: CityId,
    pub capacity: i32,
    pub cost_per_km: f64,
}

impl Vehicle {
    pub fn new(id: VehicleId, name: &str, home_city: CityId, capacity: i32, cost_per_km: f64) -> Self {
        Vehicle { id, name: name.to_string(), home_city, capacity, cost_per_km }
    }

    #[inline]
    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    #[inline]
    pub fn cost_per_distance(&self) -> f64 {
        self.cost_per_km
    }

    #[inline]
    pub fn current_city(&self) -> CityId {
        self.home_city
    }
}

/// Serializable form of an instance (JSON input/output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceData {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub cities: Vec<City>,
    #[serde(default)]
    pub roads: Vec<(CityId, CityId)>,
    pub vehicles: Vec<Vehicle>,
    pub tasks: Vec<Task>,
}

/// Parameters of the random instance generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomInstanceParams {
    pub num_cities: usize,
    pub num_vehicles: usize,
    pub num_tasks: usize,
    /// Cities are drawn uniformly in `[0, grid_size]^2`
    pub grid_size: f64,
    pub max_weight: i32,
    /// Vehicle capacities are drawn in `[max_weight, max_capacity]`
    pub max_capacity: i32,
    pub max_cost_per_km: f64,
}

impl Default for RandomInstanceParams {
    fn default() -> Self {
        RandomInstanceParams {
            num_cities: 16,
            num_vehicles: 4,
            num_tasks: 20,
            grid_size: 100.0,
            max_weight: 10,
            max_capacity: 30,
            max_cost_per_km: 5.0,
        }
    }
}

/// Represents a complete pickup-and-delivery instance
#[derive(Debug, Clone)]
pub struct Instance {
    /// Name of the instance
    pub name: String,
    /// Comment/description
    pub comment: String,
    pub topology: Topology,
    /// The fleet, in a fixed order for the whole run
    pub vehicles: Vec<Vehicle>,
    pub tasks: Vec<Task>,
}

impl Instance {
    /// Build and validate an instance
    pub fn new(
        name: &str,
        topology: Topology,
        vehicles: Vec<Vehicle>,
        tasks: Vec<Task>,
    ) -> Result<Self, InstanceError> {
        let instance = Instance {
            name: name.to_string(),
            comment: String::new(),
            topology,
            vehicles,
            tasks,
        };
        instance.validate()?;
        Ok(instance)
    }

    fn validate(&self) -> Result<(), InstanceError> {
        let n = self.topology.num_cities();
        if self.vehicles.is_empty() {
            return Err(InstanceError::Invalid("the fleet is empty".to_string()));
        }
        for (i, vehicle) in self.vehicles.iter().enumerate() {
            if vehicle.id != i {
                return Err(InstanceError::Invalid(format!(
                    "vehicle ids must be dense, found id {} at position {}", vehicle.id, i
                )));
            }
            if vehicle.home_city >= n {
                return Err(InstanceError::Invalid(format!(
                    "vehicle {} starts from unknown city {}", vehicle.id, vehicle.home_city
                )));
            }
            if vehicle.capacity <= 0 {
                return Err(InstanceError::Invalid(format!("vehicle {} has no capacity", vehicle.id)));
            }
            if vehicle.cost_per_km < 0.0 {
                return Err(InstanceError::Invalid(format!("vehicle {} has a negative cost", vehicle.id)));
            }
        }
        for (i, task) in self.tasks.iter().enumerate() {
            if task.id != i {
                return Err(InstanceError::Invalid(format!(
                    "task ids must be dense, found id {} at position {}", task.id, i
                )));
            }
            if task.pickup_city >= n || task.delivery_city >= n {
                return Err(InstanceError::Invalid(format!("task {} references an unknown city", task.id)));
            }
            if task.weight < 0 {
                return Err(InstanceError::Invalid(format!("task {} has a negative weight", task.id)));
            }
        }
        Ok(())
    }

    /// Build an instance from its serializable form
    pub fn from_data(data: InstanceData) -> Result<Self, InstanceError> {
        let topology = Topology::new(data.cities, data.roads)?;
        let mut instance = Instance::new(&data.name, topology, data.vehicles, data.tasks)?;
        instance.comment = data.comment;
        Ok(instance)
    }

    /// Serializable form of this instance
    pub fn to_data(&self) -> InstanceData {
        InstanceData {
            name: self.name.clone(),
            comment: self.comment.clone(),
            cities: self.topology.cities().to_vec(),
            roads: self.topology.roads().to_vec(),
            vehicles: self.vehicles.clone(),
            tasks: self.tasks.clone(),
        }
    }

    /// Load an instance, choosing the format from the file extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InstanceError> {
        let is_json = path.as_ref().extension().map(|e| e == "json").unwrap_or(false);
        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_file(path)
        }
    }

    /// Load an instance from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, InstanceError> {
        let file = File::open(path)?;
        let data: InstanceData = serde_json::from_reader(BufReader::new(file))?;
        Self::from_data(data)
    }

    /// Parse an instance from the section-based text format
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, InstanceError> {
        let file = File::open(&path)?;
        Self::parse(BufReader::new(file))
    }

    /// Parse the section-based text format from any reader
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, InstanceError> {
        let mut name = String::new();
        let mut comment = String::new();
        let mut cities: Vec<City> = Vec::new();
        let mut roads: Vec<(CityId, CityId)> = Vec::new();
        let mut vehicles: Vec<Vehicle> = Vec::new();
        let mut tasks: Vec<Task> = Vec::new();

        let mut section = String::new();

        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "EOF" {
                break;
            }

            if let Some(rest) = line.strip_prefix("NAME:") {
                name = rest.trim().to_string();
                continue;
            }
            if let Some(rest) = line.strip_prefix("COMMENT:") {
                comment = rest.trim().to_string();
                continue;
            }

            if line.starts_with("CITY_SECTION") {
                section = "cities".to_string();
                continue;
            }
            if line.starts_with("ROAD_SECTION") {
                section = "roads".to_string();
                continue;
            }
            if line.starts_with("VEHICLE_SECTION") {
                section = "vehicles".to_string();
                continue;
            }
            if line.starts_with("TASK_SECTION") {
                section = "tasks".to_string();
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            match section.as_str() {
                "cities" => {
                    if parts.len() < 4 {
                        return Err(InstanceError::parse(line_no, "expected `id name x y`"));
                    }
                    let id = parse_id(parts[0], line_no, "city id")?;
                    let x: f64 = parts[2].parse().map_err(|_| InstanceError::parse(line_no, "invalid x coordinate"))?;
                    let y: f64 = parts[3].parse().map_err(|_| InstanceError::parse(line_no, "invalid y coordinate"))?;
                    cities.push(City::new(id, parts[1], x, y));
                }
                "roads" => {
                    if parts.len() < 2 {
                        return Err(InstanceError::parse(line_no, "expected `from to`"));
                    }
                    let a = parse_id(parts[0], line_no, "road endpoint")?;
                    let b = parse_id(parts[1], line_no, "road endpoint")?;
                    roads.push((a, b));
                }
                "vehicles" => {
                    if parts.len() < 5 {
                        return Err(InstanceError::parse(line_no, "expected `id name home capacity cost_per_km`"));
                    }
                    let id = parse_id(parts[0], line_no, "vehicle id")?;
                    let home = parse_id(parts[2], line_no, "home city")?;
                    let capacity: i32 = parts[3].parse().map_err(|_| InstanceError::parse(line_no, "invalid capacity"))?;
                    let cost: f64 = parts[4].parse().map_err(|_| InstanceError::parse(line_no, "invalid cost per km"))?;
                    vehicles.push(Vehicle::new(id, parts[1], home, capacity, cost));
                }
                "tasks" => {
                    if parts.len() < 4 {
                        return Err(InstanceError::parse(line_no, "expected `id pickup delivery weight`"));
                    }
                    let id = parse_id(parts[0], line_no, "task id")?;
                    let pickup = parse_id(parts[1], line_no, "pickup city")?;
                    let delivery = parse_id(parts[2], line_no, "delivery city")?;
                    let weight: i32 = parts[3].parse().map_err(|_| InstanceError::parse(line_no, "invalid weight"))?;
                    tasks.push(Task::new(id, pickup, delivery, weight));
                }
                _ => {
                    return Err(InstanceError::parse(line_no, format!("unexpected line `{}`", line)));
                }
            }
        }

        cities.sort_by_key(|c| c.id);
        vehicles.sort_by_key(|v| v.id);
        tasks.sort_by_key(|t| t.id);

        Self::from_data(InstanceData { name, comment, cities, roads, vehicles, tasks })
    }

    /// Generate a random, always solvable instance. Deterministic via seed.
    pub fn random(params: &RandomInstanceParams, seed: u64) -> Result<Self, InstanceError> {
        if params.num_cities == 0 {
            return Err(InstanceError::Invalid("at least one city is required".to_string()));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let cities: Vec<City> = (0..params.num_cities)
            .map(|i| {
                let x = rng.gen_range(0.0..=params.grid_size);
                let y = rng.gen_range(0.0..=params.grid_size);
                City::new(i, &format!("city-{}", i + 1), x, y)
            })
            .collect();

        let max_weight = params.max_weight.max(1);
        let max_capacity = params.max_capacity.max(max_weight);
        let vehicles: Vec<Vehicle> = (0..params.num_vehicles)
            .map(|i| {
                let home = rng.gen_range(0..params.num_cities);
                let capacity = rng.gen_range(max_weight..=max_capacity);
                let cost = rng.gen_range(1.0..=params.max_cost_per_km.max(1.0));
                Vehicle::new(i, &format!("vehicle-{}", i + 1), home, capacity, cost)
            })
            .collect();

        let tasks: Vec<Task> = (0..params.num_tasks)
            .map(|i| {
                let pickup = rng.gen_range(0..params.num_cities);
                let delivery = rng.gen_range(0..params.num_cities);
                let weight = rng.gen_range(1..=max_weight);
                Task::new(i, pickup, delivery, weight)
            })
            .collect();

        let mut instance = Instance::new(
            &format!("random-{}c-{}v-{}t-s{}", params.num_cities, params.num_vehicles, params.num_tasks, seed),
            Topology::new(cities, Vec::new())?,
            vehicles,
            tasks,
        )?;
        instance.comment = format!("generated with seed {}", seed);
        Ok(instance)
    }

    #[inline]
    pub fn distance(&self, from: CityId, to: CityId) -> f64 {
        self.topology.distance(from, to)
    }

    pub fn num_vehicles(&self) -> usize {
        self.vehicles.len()
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Heaviest task weight (0 when there are no tasks)
    pub fn max_task_weight(&self) -> i32 {
        self.tasks.iter().map(|t| t.weight).max().unwrap_or(0)
    }

    /// Whether every vehicle can carry every task on its own
    pub fn every_vehicle_fits_every_task(&self) -> bool {
        let heaviest = self.max_task_weight();
        self.vehicles.iter().all(|v| v.capacity >= heaviest)
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let total_weight: i32 = self.tasks.iter().map(|t| t.weight).sum();
        let total_capacity: i32 = self.vehicles.iter().map(|v| v.capacity).sum();

        let mut distances: Vec<f64> = Vec::new();
        let n = self.topology.num_cities();
        for i in 0..n {
            for j in i + 1..n {
                distances.push(self.distance(i, j));
            }
        }
        let avg_distance = if distances.is_empty() {
            0.0
        } else {
            distances.iter().sum::<f64>() / distances.len() as f64
        };
        let max_distance = distances.iter().cloned().fold(0.0, f64::max);

        let direct_task_distance: f64 = self.tasks.iter()
            .map(|t| self.distance(t.pickup_city, t.delivery_city))
            .sum();

        InstanceStatistics {
            name: self.name.clone(),
            num_cities: n,
            num_roads: self.topology.roads().len(),
            num_vehicles: self.vehicles.len(),
            num_tasks: self.tasks.len(),
            total_weight,
            max_weight: self.max_task_weight(),
            total_capacity,
            avg_distance,
            max_distance,
            direct_task_distance,
        }
    }
}

fn parse_id(token: &str, line: usize, what: &str) -> Result<usize, InstanceError> {
    let id: usize = token
        .parse()
        .map_err(|_| InstanceError::parse(line, format!("invalid {}", what)))?;
    if id == 0 {
        return Err(InstanceError::parse(line, format!("{} must be 1-indexed", what)));
    }
    Ok(id - 1)
}

/// Statistics about an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_cities: usize,
    pub num_roads: usize,
    pub num_vehicles: usize,
    pub num_tasks: usize,
    pub total_weight: i32,
    pub max_weight: i32,
    pub total_capacity: i32,
    pub avg_distance: f64,
    pub max_distance: f64,
    /// Sum of pickup-to-delivery distances, a lower bound on loaded travel
    pub direct_task_distance: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        if self.num_roads > 0 {
            writeln!(f, "  Cities: {} ({} roads)", self.num_cities, self.num_roads)?;
        } else {
            writeln!(f, "  Cities: {} (complete graph)", self.num_cities)?;
        }
        writeln!(f, "  Vehicles: {} (total capacity {})", self.num_vehicles, self.total_capacity)?;
        writeln!(f, "  Tasks: {} (total weight {}, heaviest {})", self.num_tasks, self.total_weight, self.max_weight)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)?;
        writeln!(f, "  Direct task distance: {:.2}", self.direct_task_distance)
    }
}
