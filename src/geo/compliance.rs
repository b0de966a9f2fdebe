//! Clock-in authorization against configured zones and networks.
//!
//! A recognized network is authoritative proof of presence. Without one, the
//! reading must fall inside at least one zone. With nothing configured the
//! answer is always no.

use serde::Serialize;

use crate::models::{AllowedNetwork, AllowedZone, NetworkIdentity, PositionReading};

use super::math::{distance_meters, nearest_zone};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum NonCompliance {
    NoAuthorizedLocations,
    OutsideAllZones {
        nearest_zone: String,
        distance_meters: f64,
    },
    NetworkNotRecognized,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResult {
    pub is_compliant: bool,
    pub matched_zone: Option<AllowedZone>,
    pub matched_network: Option<AllowedNetwork>,
    pub nearest_zone: Option<AllowedZone>,
    pub distance_to_nearest: Option<f64>,
    pub reason: Option<NonCompliance>,
}

impl ComplianceResult {
    /// Name of whatever authorized the reading.
    pub fn matched_location(&self) -> Option<&str> {
        self.matched_zone
            .as_ref()
            .map(|zone| zone.name.as_str())
            .or_else(|| self.matched_network.as_ref().map(|net| net.name.as_str()))
    }
}

pub fn evaluate(
    reading: &PositionReading,
    zones: &[AllowedZone],
    network: Option<&NetworkIdentity>,
    allowed_networks: &[AllowedNetwork],
) -> ComplianceResult {
    let nearest = nearest_zone(&reading.coords, zones);
    let nearest_zone = nearest.map(|(zone, _)| zone.clone());
    let distance_to_nearest = nearest.map(|(_, distance)| distance);

    let matched_network = network.and_then(|current| {
        allowed_networks
            .iter()
            .find(|allowed| allowed.matches(current))
            .cloned()
    });

    if matched_network.is_some() {
        return ComplianceResult {
            is_compliant: true,
            matched_zone: None,
            matched_network,
            nearest_zone,
            distance_to_nearest,
            reason: None,
        };
    }

    // Zones may overlap; the nearest containing one is reported.
    let matched_zone = zones
        .iter()
        .map(|zone| (zone, distance_meters(&reading.coords, &zone.center)))
        .filter(|(zone, distance)| *distance <= zone.radius_meters)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(zone, _)| zone.clone());

    if matched_zone.is_some() {
        return ComplianceResult {
            is_compliant: true,
            matched_zone,
            matched_network: None,
            nearest_zone,
            distance_to_nearest,
            reason: None,
        };
    }

    let reason = match (&nearest_zone, distance_to_nearest) {
        (Some(zone), Some(distance)) => NonCompliance::OutsideAllZones {
            nearest_zone: zone.name.clone(),
            distance_meters: distance,
        },
        _ if allowed_networks.is_empty() => NonCompliance::NoAuthorizedLocations,
        _ => NonCompliance::NetworkNotRecognized,
    };

    ComplianceResult {
        is_compliant: false,
        matched_zone: None,
        matched_network: None,
        nearest_zone,
        distance_to_nearest,
        reason: Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::geo::math::EARTH_RADIUS_METERS;
    use crate::models::{Coordinate, PositionSource};

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate::new(latitude, longitude).expect("valid coordinate")
    }

    fn reading_at(latitude: f64, longitude: f64) -> PositionReading {
        PositionReading {
            coords: coord(latitude, longitude),
            accuracy_meters: Some(8.0),
            source: PositionSource::Gps,
            captured_at: Utc::now(),
        }
    }

    fn zone(id: &str, latitude: f64, longitude: f64, radius_meters: f64) -> AllowedZone {
        AllowedZone {
            id: id.into(),
            name: format!("Zone {id}"),
            center: coord(latitude, longitude),
            radius_meters,
            is_default: id == "hq",
        }
    }

    fn office_wifi() -> AllowedNetwork {
        AllowedNetwork {
            id: "net-1".into(),
            name: "Office Wi-Fi".into(),
            ssid: "HQ-Staff".into(),
            bssid: None,
        }
    }

    #[test]
    fn reading_inside_single_zone_is_compliant() {
        let hq = zone("hq", 17.966667, 102.600000, 500.0);
        let result = evaluate(&reading_at(17.966700, 102.600050), &[hq.clone()], None, &[]);

        assert!(result.is_compliant);
        assert_eq!(result.matched_zone, Some(hq));
        let distance = result.distance_to_nearest.expect("nearest distance");
        assert!((5.5..7.5).contains(&distance), "got {distance}");
        assert_eq!(result.reason, None);
    }

    #[test]
    fn reading_inside_one_of_several_zones_is_compliant() {
        let zones = vec![
            zone("north", 18.5, 102.6, 200.0),
            zone("branch", 17.9, 102.55, 300.0),
            zone("south", 17.0, 102.6, 200.0),
        ];
        let result = evaluate(&reading_at(17.9005, 102.5502), &zones, None, &[]);

        assert!(result.is_compliant);
        assert_eq!(result.matched_zone.map(|z| z.id), Some("branch".to_string()));
    }

    #[test]
    fn reading_two_kilometers_away_reports_nearest_zone() {
        let hq = zone("hq", 17.966667, 102.6, 500.0);
        let offset = (2000.0 / EARTH_RADIUS_METERS).to_degrees();
        let result = evaluate(&reading_at(17.966667 + offset, 102.6), &[hq.clone()], None, &[]);

        assert!(!result.is_compliant);
        assert_eq!(result.nearest_zone, Some(hq));
        let distance = result.distance_to_nearest.expect("nearest distance");
        assert!((distance - 2000.0).abs() < 1.0, "got {distance}");
        match result.reason {
            Some(NonCompliance::OutsideAllZones {
                nearest_zone,
                distance_meters,
            }) => {
                assert_eq!(nearest_zone, "Zone hq");
                assert!((distance_meters - 2000.0).abs() < 1.0);
            }
            other => panic!("unexpected reason {other:?}"),
        }
    }

    #[test]
    fn matching_network_wins_regardless_of_distance() {
        let hq = zone("hq", 17.966667, 102.6, 100.0);
        let current = NetworkIdentity {
            ssid: "HQ-Staff".into(),
            bssid: Some("aa:bb:cc:dd:ee:ff".into()),
        };
        let result = evaluate(
            &reading_at(13.7563, 100.5018),
            &[hq],
            Some(&current),
            &[office_wifi()],
        );

        assert!(result.is_compliant);
        assert_eq!(result.matched_network, Some(office_wifi()));
        assert_eq!(result.matched_zone, None);
        assert_eq!(result.matched_location(), Some("Office Wi-Fi"));
        assert!(result.distance_to_nearest.expect("diagnostic kept") > 500_000.0);
    }

    #[test]
    fn nothing_configured_is_never_compliant() {
        let current = NetworkIdentity {
            ssid: "HQ-Staff".into(),
            bssid: None,
        };
        let result = evaluate(&reading_at(17.966667, 102.6), &[], Some(&current), &[]);

        assert!(!result.is_compliant);
        assert_eq!(result.reason, Some(NonCompliance::NoAuthorizedLocations));
        assert_eq!(result.nearest_zone, None);
    }

    #[test]
    fn unknown_network_without_zones_is_rejected() {
        let current = NetworkIdentity {
            ssid: "CoffeeShop".into(),
            bssid: None,
        };
        let result = evaluate(
            &reading_at(17.966667, 102.6),
            &[],
            Some(&current),
            &[office_wifi()],
        );

        assert!(!result.is_compliant);
        assert_eq!(result.reason, Some(NonCompliance::NetworkNotRecognized));
    }

    #[test]
    fn overlapping_zones_report_the_closest_match() {
        let zones = vec![
            zone("campus", 17.96, 102.6, 2_000.0),
            zone("hq", 17.966667, 102.6, 300.0),
        ];
        let result = evaluate(&reading_at(17.9667, 102.6), &zones, None, &[]);

        assert_eq!(result.matched_zone.map(|z| z.id), Some("hq".to_string()));
    }
}
