//! Vehicle data API access.

mod client;

pub use client::{Vehicle, VehicleClient, VehicleList, VehicleStatus};
