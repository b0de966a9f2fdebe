pub mod attendance;
pub mod geo;

pub use attendance::{
    AttendanceRecord, AttendanceStatus, AttendanceUpdate, ClockAction, ClockEvent,
    NewAttendanceRecord, NewPhoto,
};
pub use geo::{
    AllowedNetwork, AllowedZone, Coordinate, InvalidCoordinate, NetworkIdentity,
    PositionReading, PositionSource,
};
