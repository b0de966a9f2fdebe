use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use rusqlite::{params, Connection};

use crate::db::connection::Database;
use crate::models::AllowedNetwork;

fn insert(conn: &Connection, network: &AllowedNetwork) -> Result<()> {
    conn.execute(
        "INSERT INTO networks (id, name, ssid, bssid, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            network.id,
            network.name,
            network.ssid,
            network.bssid,
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("failed to insert network {}", network.name))?;
    Ok(())
}

impl Database {
    pub async fn list_networks(&self) -> Result<Vec<AllowedNetwork>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, ssid, bssid FROM networks ORDER BY name ASC")?;
            let mut rows = stmt.query([])?;
            let mut networks = Vec::new();
            while let Some(row) = rows.next()? {
                networks.push(AllowedNetwork {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    ssid: row.get(2)?,
                    bssid: row.get(3)?,
                });
            }
            Ok(networks)
        })
        .await
    }

    pub async fn insert_network(&self, network: AllowedNetwork) -> Result<()> {
        self.execute(move |conn| insert(conn, &network)).await
    }

    /// Seeds `networks` only when the table is empty. Once anything is stored
    /// the table is the source of truth. Returns how many rows were added.
    pub async fn seed_bootstrap_networks(&self, networks: Vec<AllowedNetwork>) -> Result<usize> {
        if networks.is_empty() {
            return Ok(0);
        }

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let existing: i64 = tx.query_row("SELECT COUNT(*) FROM networks", [], |row| row.get(0))?;
            if existing > 0 {
                return Ok(0);
            }

            for network in &networks {
                insert(&tx, network)?;
            }
            tx.commit().context("failed to commit bootstrap networks")?;

            info!("Seeded {} bootstrap networks", networks.len());
            Ok(networks.len())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(id: &str, ssid: &str) -> AllowedNetwork {
        AllowedNetwork {
            id: id.into(),
            name: format!("{ssid} network"),
            ssid: ssid.into(),
            bssid: None,
        }
    }

    #[tokio::test]
    async fn bootstrap_only_fills_an_empty_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("geoclock.db")).expect("open db");

        let added = db
            .seed_bootstrap_networks(vec![network("n-1", "HQ-Staff")])
            .await
            .expect("seed");
        assert_eq!(added, 1);

        let added = db
            .seed_bootstrap_networks(vec![network("n-2", "Guest")])
            .await
            .expect("seed again");
        assert_eq!(added, 0);

        let stored = db.list_networks().await.expect("networks");
        assert_eq!(stored, vec![network("n-1", "HQ-Staff")]);
    }

    #[tokio::test]
    async fn bssid_is_optional() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("geoclock.db")).expect("open db");

        let pinned = AllowedNetwork {
            bssid: Some("aa:bb:cc:dd:ee:ff".into()),
            ..network("n-1", "HQ-Staff")
        };
        db.insert_network(pinned.clone()).await.expect("insert");
        assert_eq!(db.list_networks().await.expect("networks"), vec![pinned]);
    }
}
