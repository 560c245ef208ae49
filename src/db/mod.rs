// Database access layer (SQLite via sqlx).

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::editor::{Color, Point, TerritoryExport, TerritorySet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MapRecord {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TerritoryRow {
    name: String,
    color: String,
    points: String,
}

impl TerritoryRow {
    fn decode(self) -> Result<TerritoryExport, sqlx::Error> {
        let points: Vec<Point> =
            serde_json::from_str(&self.points).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let color: Color = self
            .color
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(TerritoryExport {
            name: self.name,
            points,
            color,
        })
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // Every connection to `:memory:` is a separate database
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS maps (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                image_url TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS territories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                map_id TEXT NOT NULL REFERENCES maps(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                color TEXT NOT NULL,
                points TEXT NOT NULL,
                UNIQUE(map_id, position)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Maps ──────────────────────────────────────────────────────────

    pub async fn create_map(
        &self,
        name: &str,
        image_url: Option<&str>,
    ) -> Result<MapRecord, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let row = sqlx::query_as::<_, MapRecord>(
            "INSERT INTO maps (id, name, image_url) VALUES (?, ?, ?) RETURNING id, name, image_url, created_at, updated_at",
        )
        .bind(&id)
        .bind(name)
        .bind(image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_maps(&self) -> Result<Vec<MapRecord>, sqlx::Error> {
        let rows = sqlx::query_as::<_, MapRecord>(
            "SELECT id, name, image_url, created_at, updated_at FROM maps ORDER BY created_at, name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_map(&self, id: &str) -> Result<Option<MapRecord>, sqlx::Error> {
        let row = sqlx::query_as::<_, MapRecord>(
            "SELECT id, name, image_url, created_at, updated_at FROM maps WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_map(
        &self,
        id: &str,
        name: &str,
        image_url: Option<&str>,
    ) -> Result<Option<MapRecord>, sqlx::Error> {
        let row = sqlx::query_as::<_, MapRecord>(
            "UPDATE maps SET name = ?, image_url = ?, updated_at = datetime('now') WHERE id = ? RETURNING id, name, image_url, created_at, updated_at",
        )
        .bind(name)
        .bind(image_url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_map(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM maps WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Territories ───────────────────────────────────────────────────

    /// The saved set for a map, in saved order. Empty if nothing was saved.
    pub async fn load_territories(&self, map_id: &str) -> Result<TerritorySet, sqlx::Error> {
        let rows = sqlx::query_as::<_, TerritoryRow>(
            "SELECT name, color, points FROM territories WHERE map_id = ? ORDER BY position",
        )
        .bind(map_id)
        .fetch_all(&self.pool)
        .await?;
        let territories = rows
            .into_iter()
            .map(TerritoryRow::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TerritorySet { territories })
    }

    /// Replace a map's territory set in one transaction.
    pub async fn save_territories(
        &self,
        map_id: &str,
        set: &TerritorySet,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM territories WHERE map_id = ?")
            .bind(map_id)
            .execute(&mut *tx)
            .await?;

        for (position, territory) in set.territories.iter().enumerate() {
            let points = serde_json::to_string(&territory.points)
                .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
            sqlx::query(
                "INSERT INTO territories (map_id, position, name, color, points) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(map_id)
            .bind(position as i64)
            .bind(territory.name.trim())
            .bind(territory.color.to_string())
            .bind(points)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE maps SET updated_at = datetime('now') WHERE id = ?")
            .bind(map_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
