use crate::config::DatasetConfig;
use crate::database::manager::DatabaseManager;

use super::params::DatasetParams;
use super::types::{QueryPlan, SqlParam, SqlResult};
use super::QueryError;

/// Builds the paired count/page statements for one dataset view.
///
/// Identifiers come from validated configuration and are quoted once here.
/// Request values never enter the SQL text: the time range, offset and limit
/// are always positional parameters. The only request-dependent part of the
/// text is whether the time predicate is present at all.
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    relation: String,
    time_column: String,
    order_by: String,
}

impl QueryPlanner {
    pub fn new(dataset: &DatasetConfig) -> Self {
        let relation = format!(
            "{}.{}",
            DatabaseManager::quote_identifier(&dataset.schema),
            DatabaseManager::quote_identifier(&dataset.relation)
        );
        let time_column = DatabaseManager::quote_identifier(&dataset.time_column);

        let mut order = vec![format!("{} ASC", time_column)];
        order.extend(
            dataset
                .tiebreak_columns
                .iter()
                .map(|c| format!("{} ASC", DatabaseManager::quote_identifier(c))),
        );

        Self { relation, time_column, order_by: order.join(", ") }
    }

    pub fn plan(&self, params: &DatasetParams) -> Result<QueryPlan, QueryError> {
        let window = params.window()?;

        let mut predicate_params = Vec::new();
        let where_clause = match &params.range {
            Some(range) => {
                predicate_params.push(SqlParam::Timestamp(range.start));
                predicate_params.push(SqlParam::Timestamp(range.end));
                format!(" WHERE {col} >= $1 AND {col} < $2", col = self.time_column)
            }
            None => String::new(),
        };

        let count = SqlResult {
            query: format!("SELECT COUNT(*) AS total FROM {}{}", self.relation, where_clause),
            params: predicate_params.clone(),
        };

        let offset_idx = predicate_params.len() + 1;
        let limit_idx = offset_idx + 1;
        let mut page_params = predicate_params;
        page_params.push(SqlParam::BigInt(window.offset));
        page_params.push(SqlParam::BigInt(window.limit));

        let page = SqlResult {
            query: format!(
                "SELECT * FROM {}{} ORDER BY {} OFFSET ${} LIMIT ${}",
                self.relation, where_clause, self.order_by, offset_idx, limit_idx
            ),
            params: page_params,
        };

        Ok(QueryPlan { count, page, range: params.range, window })
    }
}
