pub mod providers;
pub mod resolver;

pub use providers::{
    GeolocationErrorCode, GeolocationFailure, GeolocationProvider, IpLocator, MockGeolocationProvider,
    MockIpLocator, MockNetworkProbe, NetworkProbe, PositionOptions, RawFix,
};
pub use resolver::{LocationError, LocationResolver, ResolveOptions};
