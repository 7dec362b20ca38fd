//! Shared helpers for provider query tests.

use std::sync::Arc;

use datafusion::arrow::array::{ArrayRef, Int64Array, StringArray, TimestampMillisecondArray};
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::prelude::SessionContext;
use serde_json::Value;

use crate::events::listens_schema;
use crate::messages::batches_to_rows;

/// Register each (name, batch) pair as a table, run `sql`, return JSON rows.
pub async fn run_query(tables: Vec<(&str, RecordBatch)>, sql: &str) -> Vec<Value> {
    let ctx = SessionContext::new();
    for (name, batch) in tables {
        ctx.register_batch(name, batch).unwrap();
    }
    let batches = ctx.sql(sql).await.unwrap().collect().await.unwrap();
    batches_to_rows(&batches).unwrap()
}

/// Listens-shaped batch: (listened_at_ms, user_id, artist_name, artist_mbid).
/// Release and track columns are null.
pub fn listen_batch(rows: &[(i64, i64, &str, Option<&str>)]) -> RecordBatch {
    let n = rows.len();
    let nulls = || -> ArrayRef {
        Arc::new(StringArray::from_iter(
            std::iter::repeat(None::<&str>).take(n),
        ))
    };
    RecordBatch::try_new(
        listens_schema(),
        vec![
            Arc::new(TimestampMillisecondArray::from(
                rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            )),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.1).collect::<Vec<_>>())),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.2).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.3).collect::<Vec<_>>(),
            )),
            nulls(),
            nulls(),
            nulls(),
            nulls(),
        ],
    )
    .unwrap()
}

/// Partial-aggregate batch for (name, mbid, listen_count) schemas.
pub fn partial_batch(schema: &SchemaRef, rows: &[(&str, Option<&str>, i64)]) -> RecordBatch {
    RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            )),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.2).collect::<Vec<_>>())),
        ],
    )
    .unwrap()
}

/// Artist→country lookup batch.
pub fn country_batch(rows: &[(&str, &str)]) -> RecordBatch {
    use datafusion::arrow::datatypes::{DataType, Field, Schema};

    let schema = Arc::new(Schema::new(vec![
        Field::new("artist_mbid", DataType::Utf8, true),
        Field::new("country_code", DataType::Utf8, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            )),
        ],
    )
    .unwrap()
}

/// Sort JSON rows by one key for order-insensitive comparison.
pub fn sorted_by(mut rows: Vec<Value>, key: &str) -> Vec<Value> {
    rows.sort_by_key(|row| row[key].to_string());
    rows
}
