use anyhow::Result;
use chrono::{DateTime, Utc};
use ecocal_common::types::{EconomicEvent, Impact};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};

use crate::entities::economic_event::{self, Column, Entity};
use crate::error::StorageError;
use crate::store::Store;

/// Event data as it arrives from an import, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEconomicEvent {
    pub name: String,
    pub scheduled_at: DateTime<Utc>,
    pub impact: Impact,
    #[serde(default)]
    pub forecast: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub actual: Option<String>,
}

pub(crate) fn to_event(m: economic_event::Model) -> Result<EconomicEvent> {
    let impact = m.impact.parse::<Impact>().map_err(|_| StorageError::InvalidColumn {
        column: "economic_events.impact",
        value: m.impact.clone(),
    })?;
    Ok(EconomicEvent {
        id: m.id,
        name: m.name,
        scheduled_at: m.scheduled_at.with_timezone(&Utc),
        impact,
        forecast: m.forecast,
        previous: m.previous,
        actual: m.actual,
    })
}

fn to_events(models: Vec<economic_event::Model>) -> Result<Vec<EconomicEvent>> {
    models.into_iter().map(to_event).collect()
}

impl Store {
    // ---- economic_events ----

    /// Inserts the event, or updates impact and values of the existing row
    /// with the same name and time. Returns the stored event and whether a
    /// new row was created.
    pub async fn upsert_event(&self, event: &NewEconomicEvent) -> Result<(EconomicEvent, bool)> {
        let name = event.name.trim();
        if name.is_empty() {
            return Err(StorageError::InvalidInput("event name is empty".to_string()).into());
        }
        let scheduled_at = event.scheduled_at.fixed_offset();
        let now = Utc::now().fixed_offset();

        let existing = Entity::find()
            .filter(Column::Name.eq(name))
            .filter(Column::ScheduledAt.eq(scheduled_at))
            .one(self.db())
            .await?;

        if let Some(model) = existing {
            let mut am: economic_event::ActiveModel = model.into();
            am.impact = Set(event.impact.to_string());
            am.forecast = Set(event.forecast.clone());
            am.previous = Set(event.previous.clone());
            am.actual = Set(event.actual.clone());
            am.updated_at = Set(now);
            let updated = am.update(self.db()).await?;
            return Ok((to_event(updated)?, false));
        }

        let am = economic_event::ActiveModel {
            id: Set(ecocal_common::id::next_id()),
            name: Set(name.to_string()),
            scheduled_at: Set(scheduled_at),
            impact: Set(event.impact.to_string()),
            forecast: Set(event.forecast.clone()),
            previous: Set(event.previous.clone()),
            actual: Set(event.actual.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok((to_event(model)?, true))
    }

    pub async fn get_event_by_id(&self, id: &str) -> Result<Option<EconomicEvent>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_event).transpose()
    }

    /// Events scheduled strictly after `now`, earliest first.
    pub async fn list_upcoming_events(&self, now: DateTime<Utc>) -> Result<Vec<EconomicEvent>> {
        let rows = Entity::find()
            .filter(Column::ScheduledAt.gt(now.fixed_offset()))
            .order_by(Column::ScheduledAt, Order::Asc)
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        to_events(rows)
    }

    /// Events in `[from, to)`, earliest first.
    pub async fn list_events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EconomicEvent>> {
        let rows = Entity::find()
            .filter(Column::ScheduledAt.gte(from.fixed_offset()))
            .filter(Column::ScheduledAt.lt(to.fixed_offset()))
            .order_by(Column::ScheduledAt, Order::Asc)
            .order_by(Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        to_events(rows)
    }

    pub async fn count_events(&self) -> Result<u64> {
        Ok(Entity::find().count(self.db()).await?)
    }
}
