use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Row};

use crate::db::connection::Database;
use crate::models::{AllowedNetwork, AllowedZone, Coordinate};
use crate::store::LocationDirectory;

fn row_to_zone(row: &Row) -> Result<AllowedZone> {
    let latitude: f64 = row.get("latitude")?;
    let longitude: f64 = row.get("longitude")?;
    let center = Coordinate::new(latitude, longitude)
        .map_err(|err| anyhow!("location has an invalid center: {err}"))?;

    Ok(AllowedZone {
        id: row.get("id")?,
        name: row.get("name")?,
        center,
        radius_meters: row.get("radius_meters")?,
        is_default: row.get("is_default")?,
    })
}

impl Database {
    /// Authorized zones, default zone first.
    pub async fn list_zones(&self) -> Result<Vec<AllowedZone>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, latitude, longitude, radius_meters, is_default
                 FROM locations
                 ORDER BY is_default DESC, name ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut zones = Vec::new();
            while let Some(row) = rows.next()? {
                zones.push(row_to_zone(row)?);
            }
            Ok(zones)
        })
        .await
    }

    pub async fn insert_zone(&self, zone: AllowedZone) -> Result<()> {
        if zone.radius_meters.is_nan() || zone.radius_meters <= 0.0 {
            return Err(anyhow!("zone {} must have a positive radius", zone.name));
        }

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO locations (id, name, latitude, longitude, radius_meters, is_default, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    zone.id,
                    zone.name,
                    zone.center.latitude(),
                    zone.center.longitude(),
                    zone.radius_meters,
                    zone.is_default,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to insert location {}", zone.name))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl LocationDirectory for Database {
    async fn allowed_zones(&self) -> Result<Vec<AllowedZone>> {
        self.list_zones().await
    }

    async fn allowed_networks(&self) -> Result<Vec<AllowedNetwork>> {
        self.list_networks().await
    }
}
