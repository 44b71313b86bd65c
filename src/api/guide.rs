use anyhow::Context;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use tracing::info;

use super::{ApiError, AppState};
use crate::dal;
use crate::model::db_model::StopDb;

fn guide_prompt(source: &StopDb, destination: &StopDb) -> String {
    format!(
        "I need a tourist explore guidance. I will tell you a source place and a destination place. \
         The guidance should include substantial information about at least one point of interest at the source. \
         It should also include substantial information about at least one point of interest at the destination, \
         and other substantial information to enhance a tourist's experience using the guide. \
         Please tell me the tour plan and POI details. \
         The source is {} (latitude {}, longitude {}), the destination is {} (latitude {}, longitude {}).",
        source.name,
        source.latitude,
        source.longitude,
        destination.name,
        destination.latitude,
        destination.longitude,
    )
}

/// `GET /guide` plans a trip between two random cached stops and serves it as a text file
pub async fn tourism_guide(State(state): State<AppState>) -> Result<Response, ApiError> {
    let (source, destination) = dal::sample_two_distinct_stops(&state.pool)
        .await?
        .ok_or_else(|| {
            ApiError::invalid_field("At least two stops must be cached to create a guide")
        })?;

    let guide = state
        .enrichment
        .complete(&guide_prompt(&source, &destination))
        .await?;

    let artifact = &state.guide;
    let contents = {
        let _guard = artifact.lock.lock().await;

        tokio::fs::write(&artifact.path, format!("{guide}\n"))
            .await
            .with_context(|| format!("Error writing guide to {}", artifact.path.display()))?;

        tokio::fs::read(&artifact.path)
            .await
            .with_context(|| format!("Error reading guide from {}", artifact.path.display()))?
    };

    info!(
        "wrote guide from {} to {} ({} bytes)",
        source.name,
        destination.name,
        contents.len()
    );

    let file_name = artifact
        .path
        .file_name()
        .map_or_else(|| "guide.txt".into(), |n| n.to_string_lossy());

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        contents,
    )
        .into_response())
}
