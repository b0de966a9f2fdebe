pub mod attendance;
pub mod locations;
pub mod networks;
pub mod photos;

pub use photos::StoredPhoto;
