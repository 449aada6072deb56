//! In-memory [`ConfigurationRepository`] used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::repository::{ConfigurationRepository, MAX_CONFIGURATIONS, RepositoryError};
use crate::models::{
    ConfigurationDetail, ConfigurationId, ConfigurationSummary, HouseholdId, NewConfiguration,
    SavedExpense, UserId,
};

struct StoredConfiguration {
    household: HouseholdId,
    detail: ConfigurationDetail,
    deleted: bool,
}

#[derive(Default)]
struct State {
    members: HashMap<UserId, HouseholdId>,
    currencies: HashMap<HouseholdId, String>,
    configurations: Vec<StoredConfiguration>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut State) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        f(&mut state)
    }
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live(
        &mut self,
        household: HouseholdId,
        id: ConfigurationId,
    ) -> Result<&mut StoredConfiguration, RepositoryError> {
        self.configurations
            .iter_mut()
            .find(|c| c.household == household && c.detail.id == id && !c.deleted)
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl ConfigurationRepository for MemoryRepository {
    async fn household_for_user(&self, user: &UserId) -> Result<Option<HouseholdId>, RepositoryError> {
        self.with_state(|s| Ok(s.members.get(user).copied()))
    }

    async fn create_household(&self, owner: &UserId) -> Result<HouseholdId, RepositoryError> {
        self.with_state(|s| {
            let household = HouseholdId(s.next_id());
            s.members.insert(owner.clone(), household);
            s.currencies.insert(household, "USD".to_string());
            Ok(household)
        })
    }

    async fn create_configuration(
        &self,
        household: HouseholdId,
        name: &str,
        config: &NewConfiguration,
    ) -> Result<ConfigurationId, RepositoryError> {
        self.with_state(|s| {
            let live = s
                .configurations
                .iter()
                .filter(|c| c.household == household && !c.deleted)
                .count();
            if live >= MAX_CONFIGURATIONS {
                return Err(RepositoryError::LimitReached);
            }

            let id = ConfigurationId(s.next_id());
            let now = Utc::now();
            let mut expenses = Vec::with_capacity(config.expenses.len());
            for (i, e) in config.expenses.iter().enumerate() {
                expenses.push(SavedExpense {
                    id: s.next_id(),
                    label: e.label.clone(),
                    amount: e.amount,
                    sort_order: i as i32,
                });
            }
            s.configurations.push(StoredConfiguration {
                household,
                detail: ConfigurationDetail {
                    id,
                    name: name.to_string(),
                    person1_name: config.person1_name.clone(),
                    person2_name: config.person2_name.clone(),
                    person1_salary: config.person1_salary,
                    person2_salary: config.person2_salary,
                    currency: config.currency.clone(),
                    expenses,
                    created_at: now,
                    updated_at: now,
                },
                deleted: false,
            });
            Ok(id)
        })
    }

    async fn list_configurations(
        &self,
        household: HouseholdId,
    ) -> Result<Vec<ConfigurationSummary>, RepositoryError> {
        self.with_state(|s| {
            let mut rows: Vec<(DateTime<Utc>, ConfigurationSummary)> = s
                .configurations
                .iter()
                .filter(|c| c.household == household && !c.deleted)
                .map(|c| {
                    let d = &c.detail;
                    let total: Decimal = d.expenses.iter().map(|e| e.amount).sum();
                    (
                        d.updated_at,
                        ConfigurationSummary {
                            id: d.id,
                            name: d.name.clone(),
                            person1_name: d.person1_name.clone(),
                            person2_name: d.person2_name.clone(),
                            total_expenses: total,
                            expense_count: d.expenses.len(),
                            currency: d.currency.clone(),
                            created_at: d.created_at,
                            updated_at: d.updated_at,
                        },
                    )
                })
                .collect();
            rows.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.id.0.cmp(&a.1.id.0)));
            Ok(rows.into_iter().map(|(_, summary)| summary).collect())
        })
    }

    async fn get_configuration(
        &self,
        household: HouseholdId,
        id: ConfigurationId,
    ) -> Result<ConfigurationDetail, RepositoryError> {
        self.with_state(|s| Ok(s.live(household, id)?.detail.clone()))
    }

    async fn rename_configuration(
        &self,
        household: HouseholdId,
        id: ConfigurationId,
        name: &str,
    ) -> Result<(), RepositoryError> {
        self.with_state(|s| {
            let stored = s.live(household, id)?;
            stored.detail.name = name.to_string();
            stored.detail.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn delete_configuration(
        &self,
        household: HouseholdId,
        id: ConfigurationId,
    ) -> Result<(), RepositoryError> {
        self.with_state(|s| {
            s.live(household, id)?.deleted = true;
            Ok(())
        })
    }

    async fn get_currency(&self, household: HouseholdId) -> Result<String, RepositoryError> {
        self.with_state(|s| {
            s.currencies
                .get(&household)
                .cloned()
                .ok_or(RepositoryError::NotFound)
        })
    }

    async fn set_currency(
        &self,
        household: HouseholdId,
        code: &str,
    ) -> Result<(), RepositoryError> {
        self.with_state(|s| {
            s.currencies.insert(household, code.to_string());
            Ok(())
        })
    }
}
