//! POST /identify-sound
//!
//! Accepts a multipart upload in the `audio_file` field, runs it through
//! the identification pipeline and returns the feature record together
//! with the placeholder match list.

use axum::extract::{Multipart, State};
use axum::Json;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::IdentifyResponse;
use crate::services::{AudioBuffer, ContainerHint};
use crate::AppState;

/// Multipart field carrying the clip
pub const AUDIO_FIELD: &str = "audio_file";

/// POST /identify-sound
pub async fn identify_sound(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<IdentifyResponse>> {
    let span = info_span!("identify", request_id = %Uuid::new_v4());

    async move {
        let result = identify(&state, multipart).await;

        let failure = result.as_ref().err().map(|err| err.to_string());
        if let Some(message) = failure {
            warn!(error = %message, "Identification failed");
            *state.last_error.write().await = Some(message);
        }
        result
    }
    .instrument(span)
    .await
}

async fn identify(state: &AppState, multipart: Multipart) -> ApiResult<Json<IdentifyResponse>> {
    let buffer = read_audio_field(multipart).await?;
    let outcome = state.pipeline.process(buffer).await?;
    Ok(Json(IdentifyResponse::new(outcome.features, outcome.analysis)))
}

/// Pull the `audio_file` part out of the form, ignoring other fields
async fn read_audio_field(mut multipart: Multipart) -> ApiResult<AudioBuffer> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(AUDIO_FIELD) {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        let container =
            ContainerHint::resolve(filename.as_deref(), content_type.as_deref(), &bytes);
        debug!(
            filename = ?filename,
            content_type = ?content_type,
            size = bytes.len(),
            container = %container,
            "Received upload"
        );

        return Ok(AudioBuffer::new(bytes.to_vec(), container));
    }

    Err(ApiError::BadRequest(format!("Missing '{}' upload field", AUDIO_FIELD)))
}
