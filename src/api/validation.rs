use super::ApiError;
use crate::model::api_model::StopPatch;
use crate::utils::parse_timestamp;

/// Checks the fields present in a patch. Absent fields are not validated.
pub fn validate_patch(patch: &StopPatch) -> Result<(), ApiError> {
    if patch.name.as_deref() == Some("") {
        return Err(ApiError::invalid_field("Name cannot be blank"));
    }

    if patch.next_departure.as_deref() == Some("") {
        return Err(ApiError::invalid_field("Next departure cannot be blank"));
    }

    if let Some(latitude) = patch.latitude {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ApiError::invalid_field(
                "Latitude must be between -90 and 90",
            ));
        }
    }

    if let Some(longitude) = patch.longitude {
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ApiError::invalid_field(
                "Longitude must be between -180 and 180",
            ));
        }
    }

    if let Some(last_updated) = &patch.last_updated {
        if parse_timestamp(last_updated).is_none() {
            return Err(ApiError::invalid_field(
                "Last updated must be in the format yyyy-mm-dd-hh:mm:ss",
            ));
        }
    }

    Ok(())
}
