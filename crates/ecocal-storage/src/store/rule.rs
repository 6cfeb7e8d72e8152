use anyhow::Result;
use chrono::Utc;
use ecocal_common::types::{CategoryRule, Impact, LeadTime};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter,
    QueryOrder, SqlErr,
};

use crate::entities::category_rule::{self, Column, Entity};
use crate::error::StorageError;
use crate::store::Store;

fn to_rule(m: category_rule::Model) -> Result<CategoryRule> {
    let impact = m.impact.parse::<Impact>().map_err(|_| StorageError::InvalidColumn {
        column: "category_rules.impact",
        value: m.impact.clone(),
    })?;
    let lead_time =
        LeadTime::try_from_secs(m.lead_time_secs).map_err(|_| StorageError::InvalidColumn {
            column: "category_rules.lead_time_secs",
            value: m.lead_time_secs.to_string(),
        })?;
    Ok(CategoryRule {
        id: m.id,
        impact,
        lead_time,
        destination: m.destination,
        active: m.active,
    })
}

impl Store {
    // ---- category_rules ----

    async fn find_category_rule(
        &self,
        impact: Impact,
        lead_time: LeadTime,
        destination: &str,
    ) -> Result<Option<category_rule::Model>> {
        Ok(Entity::find()
            .filter(Column::Impact.eq(impact.to_string()))
            .filter(Column::LeadTimeSecs.eq(lead_time.as_secs()))
            .filter(Column::Destination.eq(destination))
            .one(self.db())
            .await?)
    }

    /// Creates a rule unless one with the same (impact, lead time,
    /// destination) already exists, in which case that rule is returned
    /// (reactivated if it was inactive). The flag is `true` only when a new
    /// row was inserted.
    pub async fn create_category_rule(
        &self,
        impact: Impact,
        lead_time: LeadTime,
        destination: &str,
    ) -> Result<(CategoryRule, bool)> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(StorageError::InvalidInput("rule destination is empty".to_string()).into());
        }

        if let Some(existing) = self.find_category_rule(impact, lead_time, destination).await? {
            return Ok((self.reactivate(existing).await?, false));
        }

        let now = Utc::now().fixed_offset();
        let am = category_rule::ActiveModel {
            id: Set(ecocal_common::id::next_id()),
            impact: Set(impact.to_string()),
            lead_time_secs: Set(lead_time.as_secs()),
            destination: Set(destination.to_string()),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        match am.insert(self.db()).await {
            Ok(model) => {
                tracing::info!(
                    rule_id = %model.id,
                    impact = %impact,
                    lead_time_secs = lead_time.as_secs(),
                    destination = %destination,
                    "Created category rule"
                );
                Ok((to_rule(model)?, true))
            }
            // Lost a race against a concurrent create of the same triple.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                let existing = self
                    .find_category_rule(impact, lead_time, destination)
                    .await?
                    .ok_or(StorageError::ConflictVanished {
                        entity: "category_rule",
                    })?;
                Ok((self.reactivate(existing).await?, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reactivate(&self, model: category_rule::Model) -> Result<CategoryRule> {
        if model.active {
            return to_rule(model);
        }
        tracing::info!(rule_id = %model.id, "Reactivating category rule");
        let mut am: category_rule::ActiveModel = model.into();
        am.active = Set(true);
        am.updated_at = Set(Utc::now().fixed_offset());
        to_rule(am.update(self.db()).await?)
    }

    pub async fn get_category_rule(&self, id: &str) -> Result<Option<CategoryRule>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_rule).transpose()
    }

    /// All rules in creation order, optionally only the active ones.
    pub async fn list_category_rules(&self, active_only: bool) -> Result<Vec<CategoryRule>> {
        let mut q = Entity::find();
        if active_only {
            q = q.filter(Column::Active.eq(true));
        }
        let rows = q
            .order_by(Column::CreatedAt, Order::Asc)
            .order_by(Column::Id, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_rule).collect()
    }

    pub async fn list_active_category_rules(&self) -> Result<Vec<CategoryRule>> {
        self.list_category_rules(true).await
    }

    pub async fn set_category_rule_active(&self, id: &str, active: bool) -> Result<CategoryRule> {
        let model = Entity::find_by_id(id)
            .one(self.db())
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: "category_rule",
                id: id.to_string(),
            })?;
        let mut am: category_rule::ActiveModel = model.into();
        am.active = Set(active);
        am.updated_at = Set(Utc::now().fixed_offset());
        to_rule(am.update(self.db()).await?)
    }

    /// Returns whether a row was deleted.
    pub async fn delete_category_rule(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    /// Deletes every rule, returning how many were removed.
    pub async fn clear_category_rules(&self) -> Result<u64> {
        let res = Entity::delete_many().exec(self.db()).await?;
        Ok(res.rows_affected)
    }
}
