pub mod compliance;
pub mod math;

pub use compliance::{evaluate, ComplianceResult, NonCompliance};
pub use math::{distance_meters, is_within_zone, nearest_zone};
