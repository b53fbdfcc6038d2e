use serde::Serialize;

use crate::database::{PageResult, RowRecord};
use crate::query::DatasetParams;

/// Pagination block of a dataset response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// `{ dataset, meta: { page, page_size, total }, data: [...] }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetPage {
    pub dataset: String,
    pub meta: PageMeta,
    pub data: Vec<RowRecord>,
}

pub fn assemble(dataset: &str, params: &DatasetParams, result: PageResult) -> DatasetPage {
    DatasetPage {
        dataset: dataset.to_string(),
        meta: PageMeta {
            page: params.page,
            page_size: params.page_size,
            total: result.total,
        },
        data: result.rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_shape() {
        let mut row = RowRecord::new();
        row.insert("event_time".into(), json!("2019-10-01T00:00:00"));
        row.insert("event_type".into(), json!("view"));
        row.insert("price".into(), json!(12.5));

        let params = DatasetParams { page: 3, page_size: 100, range: None };
        let page = assemble("ecom_events", &params, PageResult { total: 250, rows: vec![row] });

        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({
                "dataset": "ecom_events",
                "meta": { "page": 3, "page_size": 100, "total": 250 },
                "data": [
                    { "event_time": "2019-10-01T00:00:00", "event_type": "view", "price": 12.5 }
                ]
            })
        );
    }

    #[test]
    fn column_order_is_preserved() {
        let mut row = RowRecord::new();
        row.insert("zeta".into(), json!(1));
        row.insert("alpha".into(), json!(2));
        let params = DatasetParams { page: 1, page_size: 1, range: None };
        let page = assemble("ecom_events", &params, PageResult { total: 1, rows: vec![row] });

        let text = serde_json::to_string(&page).unwrap();
        assert!(text.find("\"zeta\"").unwrap() < text.find("\"alpha\"").unwrap());
    }

    #[test]
    fn empty_page_keeps_total() {
        let params = DatasetParams { page: 9, page_size: 100, range: None };
        let page = assemble("ecom_events", &params, PageResult { total: 250, rows: vec![] });
        assert_eq!(page.meta.total, 250);
        assert!(page.data.is_empty());
    }
}
