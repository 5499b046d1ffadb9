use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::Response,
};

use convalid_core::aligner::AlignedTable;

use crate::routes::validate::{run_comparison, ValidateQuery};
use crate::{error::AppError, state::AppState};

/// `GET /api/conversions/validate/export` - aligned table as CSV.
///
/// Same parameters and range limit as the JSON endpoint. Null variances are
/// empty cells.
#[tracing::instrument(skip(state))]
pub async fn export_comparison(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ValidateQuery>,
) -> Result<Response, AppError> {
    let result = run_comparison(&state, &query).await?;
    let csv_bytes = Bytes::from(build_csv(&result.comparison).map_err(AppError::Internal)?);
    let filename = format!(
        "conversions-{}-{}-{}.csv",
        filename_safe(&result.customer_id),
        result.date_range.start(),
        result.date_range.end()
    );

    build_csv_response(&filename, csv_bytes)
}

fn filename_safe(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// Writes `table` with the same column names the JSON rows use.
pub fn build_csv(table: &AlignedTable) -> anyhow::Result<Vec<u8>> {
    let compared = table.compared_sources();
    let mut wtr = csv::Writer::from_writer(Vec::with_capacity(table.rows.len().saturating_mul(128)));

    let mut header = vec!["date".to_string()];
    for source in &table.sources {
        header.push(format!("{}_conversions", source.slug()));
        header.push(format!("{}_conversions_value", source.slug()));
        header.push(format!("{}_cost", source.slug()));
    }
    for source in &compared {
        header.push(format!("variance_{}", source.slug()));
    }
    wtr.write_record(&header)
        .map_err(|e| anyhow::anyhow!("csv write_record failed: {e}"))?;

    for row in &table.rows {
        let mut record = vec![row.date.to_string()];
        for &source in &table.sources {
            let v = row.values(source);
            record.push(v.conversions.to_string());
            record.push(v.conversions_value.to_string());
            record.push(v.cost.to_string());
        }
        for &source in &compared {
            record.push(row.variance(source).map(|v| v.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record)
            .map_err(|e| anyhow::anyhow!("csv write_record failed: {e}"))?;
    }

    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("csv flush failed: {e}"))
}

fn build_csv_response(filename: &str, csv_bytes: Bytes) -> Result<Response, AppError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(axum::body::Body::from(csv_bytes))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("response build failed: {e}")))
}
