//! Plan queries and status transitions.

use jiff::Timestamp;
use rusqlite::{params, types::Type, OptionalExtension};

use crate::{
    error::{DatabaseResultExt, LeaseError, Result},
    models::{Plan, PlanStatus},
};

const SELECT_PLAN_SQL: &str = "SELECT id, node_id, source, start_at, stop_at, compute_class, invoice_amount, status, created_at, updated_at FROM plans WHERE id = ?1";
const SELECT_PLANS_SQL: &str = "SELECT id, node_id, source, start_at, stop_at, compute_class, invoice_amount, status, created_at, updated_at FROM plans";
const CHECK_PLAN_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM plans WHERE id = ?1)";

/// Converts a stored epoch-millisecond column into a timestamp.
pub(super) fn timestamp_from_millis(idx: usize, millis: i64) -> rusqlite::Result<Timestamp> {
    Timestamp::from_millisecond(millis)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

/// Parses a stored RFC 3339 text column into a timestamp.
pub(super) fn timestamp_from_text(idx: usize, text: &str) -> rusqlite::Result<Timestamp> {
    text.parse::<Timestamp>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl super::Database {
    /// Helper function to construct a Plan (without jobs) from a database row
    fn build_plan_from_row(row: &rusqlite::Row) -> rusqlite::Result<Plan> {
        let status_str: String = row.get(7)?;
        let status = status_str.parse::<PlanStatus>().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                Type::Text,
                format!("Invalid plan status: {status_str}").into(),
            )
        })?;

        Ok(Plan {
            id: row.get::<_, i64>(0)? as u64,
            node_id: row.get(1)?,
            source: row.get(2)?,
            start_at: timestamp_from_millis(3, row.get(3)?)?,
            stop_at: timestamp_from_millis(4, row.get(4)?)?,
            compute_class: row.get(5)?,
            invoice_amount: row.get(6)?,
            status,
            created_at: timestamp_from_text(8, &row.get::<_, String>(8)?)?,
            updated_at: timestamp_from_text(9, &row.get::<_, String>(9)?)?,
            jobs: Vec::new(),
        })
    }

    /// Retrieves a plan and its job chain by ID.
    pub fn get_plan(&self, id: u64) -> Result<Option<Plan>> {
        let mut plan = self
            .connection
            .query_row(SELECT_PLAN_SQL, params![id as i64], Self::build_plan_from_row)
            .optional()
            .db_context("Failed to query plan")?;

        // Eagerly load jobs if plan exists
        if let Some(ref mut plan) = plan {
            plan.jobs = self.get_jobs(plan.id)?;
        }

        Ok(plan)
    }

    /// Lists plans, optionally restricted to one status, newest window first.
    pub fn list_plans(&self, status: Option<PlanStatus>) -> Result<Vec<Plan>> {
        let mut query = SELECT_PLANS_SQL.to_string();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = status {
            query.push_str(" WHERE status = ?");
            params_vec.push(Box::new(status.as_str()));
        }
        query.push_str(" ORDER BY start_at DESC, id DESC");

        let mut stmt = self
            .connection
            .prepare(&query)
            .db_context("Failed to prepare query")?;

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| &**b).collect();

        let mut plans = stmt
            .query_map(&params_refs[..], Self::build_plan_from_row)
            .db_context("Failed to query plans")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch plans")?;

        for plan in &mut plans {
            plan.jobs = self.get_jobs(plan.id)?;
        }

        Ok(plans)
    }

    /// Moves a plan forward to `status`.
    ///
    /// Returns `true` when the row changed and `false` when the plan was
    /// already at (or past) `status`, so repeating a transition is a no-op.
    pub fn update_plan_status(&mut self, id: u64, status: PlanStatus) -> Result<bool> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let predecessors = status.predecessors();
        let placeholders = (0..predecessors.len())
            .map(|i| format!("?{}", i + 4))
            .collect::<Vec<_>>()
            .join(", ");

        let rows_affected = if predecessors.is_empty() {
            0
        } else {
            let sql = format!(
                "UPDATE plans SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status IN ({placeholders})"
            );
            let now = Timestamp::now().to_string();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
                Box::new(status.as_str()),
                Box::new(now),
                Box::new(id as i64),
            ];
            values.extend(
                predecessors
                    .iter()
                    .map(|p| Box::new(p.as_str()) as Box<dyn rusqlite::ToSql>),
            );
            let refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| &**b).collect();
            tx.execute(&sql, &refs[..])
                .db_context("Failed to update plan status")?
        };

        if rows_affected == 0 {
            let exists: bool = tx
                .query_row(CHECK_PLAN_EXISTS_SQL, params![id as i64], |row| row.get(0))
                .db_context("Failed to check plan existence")?;

            if !exists {
                return Err(LeaseError::PlanNotFound { id });
            }
        }

        tx.commit().db_context("Failed to commit transaction")?;

        Ok(rows_affected > 0)
    }
}
