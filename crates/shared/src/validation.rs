//! Common validation utilities.

use chrono::{Datelike, Utc};
use validator::ValidationError;

/// Earliest year a visit may be dated. The product predates nothing older.
const MIN_VISIT_YEAR: i32 = 1970;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates that a share code is exactly four ASCII digits.
pub fn validate_share_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 4 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("share_code_format");
        err.message = Some("Share code must be exactly 4 digits".into());
        Err(err)
    }
}

/// Validates that a visit year is plausible (1970 through next year).
///
/// Next year is allowed so a visit logged near midnight on New Year's Eve
/// in a timezone ahead of the server does not bounce.
pub fn validate_visit_year(year: i32) -> Result<(), ValidationError> {
    let max_year = Utc::now().year() + 1;
    if (MIN_VISIT_YEAR..=max_year).contains(&year) {
        Ok(())
    } else {
        let mut err = ValidationError::new("visit_year_range");
        err.message = Some("Visit year is out of range".into());
        Err(err)
    }
}
