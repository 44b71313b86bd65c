use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};
use futures::future::try_join_all;
use tracing::info;

use super::{ApiError, AppState};
use crate::clients::distinct_operators_within_window;
use crate::dal;
use crate::model::api_model::{OperatorProfile, OperatorProfiles};

const OPERATOR_WINDOW_MINUTES: u32 = 90;
const MAX_OPERATORS: usize = 5;

fn operator_prompt(operator: &str) -> String {
    format!("please tell me about {operator}. Only return the text without newline signal")
}

/// `GET /operator-profiles/{id}` describes the operators departing from a stop soon
pub async fn operator_profiles(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<OperatorProfiles>, ApiError> {
    let Path(stop_id) = path?;

    dal::get_stop(stop_id, &state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;

    let operators = distinct_operators_within_window(
        state.transit.as_ref(),
        stop_id,
        OPERATOR_WINDOW_MINUTES,
        MAX_OPERATORS,
    )
    .await?;

    if operators.is_empty() {
        return Err(ApiError::not_found("Not found."));
    }

    info!("generating profiles for {} operators", operators.len());

    let profiles = try_join_all(operators.into_iter().map(|operator_name| {
        let enrichment = state.enrichment.clone();
        async move {
            let information = enrichment.complete(&operator_prompt(&operator_name)).await?;
            Ok::<_, ApiError>(OperatorProfile {
                operator_name,
                information,
            })
        }
    }))
    .await?;

    Ok(Json(OperatorProfiles { stop_id, profiles }))
}
