pub mod dijkstra;

pub use dijkstra::{ShortestPath, calculate_shortest_paths};
