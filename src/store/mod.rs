//! `store` — recipe history in a single SQLite table.
//!
//! Every generated meal is recorded with the date it is planned for. The
//! history drives the exclusion list (dishes not to repeat) and the daily
//! reminder. Calls are blocking; async callers go through
//! `tokio::task::spawn_blocking`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::error::AppError;
use crate::planner::normalize::NewRecipe;

const SCHEMA_VERSION: i64 = 1;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A stored recipe row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub id: i64,
    pub meal_date: NaiveDate,
    pub meal_name: String,
    pub recipe_full: Option<String>,
    /// RFC 3339 UTC timestamp of insertion.
    pub generated_at: String,
}

/// Handle to the recipe database. Cheap to clone; each operation opens its
/// own connection so handles can move freely between blocking tasks.
#[derive(Debug, Clone)]
pub struct RecipeStore {
    db_path: PathBuf,
}

impl RecipeStore {
    /// Open (creating if needed) the database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Store(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let store = Self { db_path: db_path.to_path_buf() };
        store.init_db()?;
        info!(path = %db_path.display(), "recipe store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Insert `recipes` in one transaction. Returns the number of rows written.
    pub fn save_recipes(&self, recipes: &[NewRecipe]) -> Result<usize, AppError> {
        let mut conn = self.open_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Store(format!("begin tx: {e}")))?;
        let generated_at = now_iso8601();
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO recipes_history (meal_date, meal_name, recipe_full, generated_at) VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| AppError::Store(format!("prepare insert: {e}")))?;
            for r in recipes {
                stmt.execute(params![
                    r.meal_date.format(DATE_FORMAT).to_string(),
                    r.meal_name,
                    r.recipe_full,
                    generated_at,
                ])
                .map_err(|e| AppError::Store(format!("insert '{}': {e}", r.meal_name)))?;
            }
        }
        tx.commit()
            .map_err(|e| AppError::Store(format!("commit save_recipes: {e}")))?;
        debug!(count = recipes.len(), "recipes saved");
        Ok(recipes.len())
    }

    /// Distinct dish names planned on or after `since`, sorted.
    pub fn exclusion_list(&self, since: NaiveDate) -> Result<Vec<String>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT meal_name FROM recipes_history WHERE meal_date >= ?1 ORDER BY meal_name",
            )
            .map_err(|e| AppError::Store(format!("prepare exclusion_list: {e}")))?;
        let rows = stmt
            .query_map(params![since.format(DATE_FORMAT).to_string()], |row| row.get::<_, String>(0))
            .map_err(|e| AppError::Store(format!("query exclusion_list: {e}")))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row.map_err(|e| AppError::Store(format!("map exclusion_list row: {e}")))?);
        }
        Ok(names)
    }

    /// Recipes planned for `date`, in insertion order.
    pub fn recipes_for_date(&self, date: NaiveDate) -> Result<Vec<Recipe>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, meal_date, meal_name, recipe_full, generated_at FROM recipes_history WHERE meal_date = ?1 ORDER BY id",
            )
            .map_err(|e| AppError::Store(format!("prepare recipes_for_date: {e}")))?;
        let rows = stmt
            .query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| AppError::Store(format!("query recipes_for_date: {e}")))?;

        let mut recipes = Vec::new();
        for row in rows {
            let (id, meal_date, meal_name, recipe_full, generated_at) =
                row.map_err(|e| AppError::Store(format!("map recipes_for_date row: {e}")))?;
            let meal_date = NaiveDate::parse_from_str(&meal_date, DATE_FORMAT)
                .map_err(|e| AppError::Store(format!("row {id}: bad meal_date '{meal_date}': {e}")))?;
            recipes.push(Recipe { id, meal_date, meal_name, recipe_full, generated_at });
        }
        Ok(recipes)
    }

    /// Delete the whole history. Returns the number of rows removed.
    pub fn clear(&self) -> Result<usize, AppError> {
        let conn = self.open_conn()?;
        let n = conn
            .execute("DELETE FROM recipes_history", [])
            .map_err(|e| AppError::Store(format!("clear history: {e}")))?;
        info!(deleted = n, "recipe history cleared");
        Ok(n)
    }

    pub fn count(&self) -> Result<usize, AppError> {
        let conn = self.open_conn()?;
        conn.query_row("SELECT COUNT(*) FROM recipes_history", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|e| AppError::Store(format!("count: {e}")))
    }

    fn init_db(&self) -> Result<(), AppError> {
        let conn = self.open_conn()?;
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| AppError::Store(format!("read user_version: {e}")))?;

        if version >= SCHEMA_VERSION {
            return Ok(());
        }

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS recipes_history (
                id INTEGER PRIMARY KEY,
                meal_date TEXT NOT NULL,
                meal_name TEXT NOT NULL,
                recipe_full TEXT,
                generated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_recipes_history_meal_date
                ON recipes_history (meal_date);

            PRAGMA user_version = 1;
            ",
        )
        .map_err(|e| AppError::Store(format!("initialize schema: {e}")))
    }

    /// Open a connection with WAL journaling and a 5 s busy timeout.
    fn open_conn(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| AppError::Store(format!("open {}: {e}", self.db_path.display())))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| AppError::Store(format!("set journal_mode WAL: {e}")))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| AppError::Store(format!("set busy_timeout: {e}")))?;
        Ok(conn)
    }
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn recipe(date: NaiveDate, name: &str) -> NewRecipe {
        NewRecipe { meal_date: date, meal_name: name.into(), recipe_full: format!("{name} recipe") }
    }

    fn store() -> (TempDir, RecipeStore) {
        let tmp = TempDir::new().unwrap();
        let store = RecipeStore::open(&tmp.path().join("nested").join("recipes.db")).unwrap();
        (tmp, store)
    }

    #[test]
    fn open_creates_parent_dirs_and_db() {
        let (tmp, store) = store();
        assert!(tmp.path().join("nested").join("recipes.db").exists());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn reopen_keeps_rows() {
        let (_tmp, store) = store();
        store.save_recipes(&[recipe(ymd(2026, 10, 19), "Soup")]).unwrap();
        let again = RecipeStore::open(store.path()).unwrap();
        assert_eq!(again.count().unwrap(), 1);
    }

    #[test]
    fn exclusion_list_is_distinct_and_windowed() {
        let (_tmp, store) = store();
        store
            .save_recipes(&[
                recipe(ymd(2026, 9, 1), "Old stew"),
                recipe(ymd(2026, 10, 10), "Pilaf"),
                recipe(ymd(2026, 10, 12), "Omelette"),
                recipe(ymd(2026, 10, 13), "Pilaf"),
                recipe(ymd(2026, 10, 30), "Future curry"),
            ])
            .unwrap();
        let names = store.exclusion_list(ymd(2026, 10, 10)).unwrap();
        assert_eq!(names, vec!["Future curry", "Omelette", "Pilaf"]);
    }

    #[test]
    fn recipes_for_date_in_insertion_order() {
        let (_tmp, store) = store();
        let day = ymd(2026, 10, 19);
        store
            .save_recipes(&[recipe(day, "Porridge"), recipe(ymd(2026, 10, 20), "Other"), recipe(day, "Salad")])
            .unwrap();
        let today = store.recipes_for_date(day).unwrap();
        let names: Vec<_> = today.iter().map(|r| r.meal_name.as_str()).collect();
        assert_eq!(names, vec!["Porridge", "Salad"]);
        assert_eq!(today[0].recipe_full.as_deref(), Some("Porridge recipe"));
        assert_eq!(today[0].meal_date, day);
        assert!(store.recipes_for_date(ymd(2027, 1, 1)).unwrap().is_empty());
    }

    #[test]
    fn clear_reports_deleted_rows() {
        let (_tmp, store) = store();
        store.save_recipes(&[recipe(ymd(2026, 10, 19), "A"), recipe(ymd(2026, 10, 19), "B")]).unwrap();
        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.clear().unwrap(), 0);
        assert!(store.exclusion_list(ymd(2000, 1, 1)).unwrap().is_empty());
    }

    #[test]
    fn save_empty_is_noop() {
        let (_tmp, store) = store();
        assert_eq!(store.save_recipes(&[]).unwrap(), 0);
    }
}
