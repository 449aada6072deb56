use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use split_core::{
    ConfigurationDetail, ConfigurationId, ConfigurationRepository, ConfigurationSummary,
    HouseholdId, NewConfiguration, RepositoryError, SavedExpense, UserId,
};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::decimal::{decimal_to_text, get_decimal};

/// Message raised by the `configurations_limit` trigger.
const LIMIT_MARKER: &str = "configuration_limit";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connects to `database_url`. In-memory databases get a single
    /// connection so every query sees the same schema.
    pub async fn new(database_url: &str) -> Result<Self> {
        let mut options = SqlitePoolOptions::new();
        if database_url.contains(":memory:") {
            options = options.max_connections(1);
        }
        let pool = options
            .connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_error(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.message().contains(LIMIT_MARKER) => {
            RepositoryError::LimitReached
        }
        _ => RepositoryError::Database(e.to_string()),
    }
}

fn get<'r, T>(
    row: &'r sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| RepositoryError::Database(format!("Failed to get {}: {}", column, e)))
}

fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<SavedExpense, RepositoryError> {
    Ok(SavedExpense {
        id: get(row, "id")?,
        label: get(row, "label")?,
        amount: get_decimal(row, "amount")?,
        sort_order: get(row, "sort_order")?,
    })
}

#[async_trait]
impl ConfigurationRepository for SqliteRepository {
    async fn household_for_user(&self, user: &UserId) -> Result<Option<HouseholdId>, RepositoryError> {
        let row = sqlx::query("SELECT household_id FROM household_members WHERE user_id = ?")
            .bind(&user.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(|row| get(&row, "household_id").map(HouseholdId))
            .transpose()
    }

    async fn create_household(&self, owner: &UserId) -> Result<HouseholdId, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query("INSERT INTO households (currency, created_at) VALUES ('USD', ?)")
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        let household = HouseholdId(result.last_insert_rowid());

        sqlx::query(
            "INSERT INTO household_members (user_id, household_id, role, created_at)
             VALUES (?, ?, 'owner', ?)",
        )
        .bind(&owner.0)
        .bind(household.0)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(household)
    }

    async fn create_configuration(
        &self,
        household: HouseholdId,
        name: &str,
        config: &NewConfiguration,
    ) -> Result<ConfigurationId, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            "INSERT INTO configurations (
                household_id, name, person1_name, person2_name,
                person1_salary, person2_salary, currency, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(household.0)
        .bind(name)
        .bind(&config.person1_name)
        .bind(&config.person2_name)
        .bind(decimal_to_text(config.person1_salary))
        .bind(decimal_to_text(config.person2_salary))
        .bind(&config.currency)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        let id = result.last_insert_rowid();

        for (sort_order, expense) in config.expenses.iter().enumerate() {
            sqlx::query(
                "INSERT INTO expenses (configuration_id, label, amount, sort_order)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(&expense.label)
            .bind(decimal_to_text(expense.amount))
            .bind(sort_order as i64)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        debug!(%household, id, expenses = config.expenses.len(), "inserted configuration");
        Ok(ConfigurationId(id))
    }

    async fn list_configurations(
        &self,
        household: HouseholdId,
    ) -> Result<Vec<ConfigurationSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, person1_name, person2_name, currency, created_at, updated_at
             FROM configurations
             WHERE household_id = ? AND deleted_at IS NULL
             ORDER BY updated_at DESC, id DESC",
        )
        .bind(household.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let amounts = sqlx::query(
            "SELECT e.configuration_id, e.amount
             FROM expenses e
             JOIN configurations c ON c.id = e.configuration_id
             WHERE c.household_id = ? AND c.deleted_at IS NULL AND e.deleted_at IS NULL",
        )
        .bind(household.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut totals: HashMap<i64, (Decimal, usize)> = HashMap::new();
        for row in &amounts {
            let entry = totals.entry(get(row, "configuration_id")?).or_default();
            entry.0 += get_decimal(row, "amount")?;
            entry.1 += 1;
        }

        rows.iter()
            .map(|row| {
                let id: i64 = get(row, "id")?;
                let (total_expenses, expense_count) = totals.get(&id).copied().unwrap_or_default();
                Ok(ConfigurationSummary {
                    id: ConfigurationId(id),
                    name: get(row, "name")?,
                    person1_name: get(row, "person1_name")?,
                    person2_name: get(row, "person2_name")?,
                    total_expenses,
                    expense_count,
                    currency: get(row, "currency")?,
                    created_at: get::<DateTime<Utc>>(row, "created_at")?,
                    updated_at: get::<DateTime<Utc>>(row, "updated_at")?,
                })
            })
            .collect()
    }

    async fn get_configuration(
        &self,
        household: HouseholdId,
        id: ConfigurationId,
    ) -> Result<ConfigurationDetail, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, person1_name, person2_name, person1_salary, person2_salary,
                    currency, created_at, updated_at
             FROM configurations
             WHERE id = ? AND household_id = ? AND deleted_at IS NULL",
        )
        .bind(id.0)
        .bind(household.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        let expense_rows = sqlx::query(
            "SELECT id, label, amount, sort_order
             FROM expenses
             WHERE configuration_id = ? AND deleted_at IS NULL
             ORDER BY sort_order, id",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(ConfigurationDetail {
            id,
            name: get(&row, "name")?,
            person1_name: get(&row, "person1_name")?,
            person2_name: get(&row, "person2_name")?,
            person1_salary: get_decimal(&row, "person1_salary")?,
            person2_salary: get_decimal(&row, "person2_salary")?,
            currency: get(&row, "currency")?,
            expenses: expense_rows
                .iter()
                .map(row_to_expense)
                .collect::<Result<_, _>>()?,
            created_at: get::<DateTime<Utc>>(&row, "created_at")?,
            updated_at: get::<DateTime<Utc>>(&row, "updated_at")?,
        })
    }

    async fn rename_configuration(
        &self,
        household: HouseholdId,
        id: ConfigurationId,
        name: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE configurations SET name = ?, updated_at = ?
             WHERE id = ? AND household_id = ? AND deleted_at IS NULL",
        )
        .bind(name)
        .bind(Utc::now())
        .bind(id.0)
        .bind(household.0)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_configuration(
        &self,
        household: HouseholdId,
        id: ConfigurationId,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            "UPDATE configurations SET deleted_at = ?
             WHERE id = ? AND household_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id.0)
        .bind(household.0)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            "UPDATE expenses SET deleted_at = ?
             WHERE configuration_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn get_currency(&self, household: HouseholdId) -> Result<String, RepositoryError> {
        let row = sqlx::query("SELECT currency FROM households WHERE id = ?")
            .bind(household.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or(RepositoryError::NotFound)?;

        get(&row, "currency")
    }

    async fn set_currency(
        &self,
        household: HouseholdId,
        code: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE households SET currency = ? WHERE id = ?")
            .bind(code)
            .bind(household.0)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
