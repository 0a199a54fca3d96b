use axum::http::HeaderMap;

use crate::error::AppError;

pub const USER_HEADER: &str = "x-user-id";
pub const DEVICE_HEADER: &str = "x-device-id";

/// Identity asserted by the upstream authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub device_id: Option<String>,
}

impl Caller {
    /// Device identity, empty when the header was absent
    pub fn device_id(&self) -> &str {
        self.device_id.as_deref().unwrap_or_default()
    }
}

/// Read the caller identity headers.
///
/// The user header is mandatory. The device header is optional here; the
/// operations that need a device reject an empty one.
pub fn extract_caller(headers: &HeaderMap) -> Result<Caller, AppError> {
    let user_id = header_value(headers, USER_HEADER)?
        .ok_or_else(|| AppError::unauthorized("Missing X-User-Id header"))?;
    let device_id = header_value(headers, DEVICE_HEADER)?;
    Ok(Caller { user_id, device_id })
}

fn header_value(headers: &HeaderMap, name: &'static str) -> Result<Option<String>, AppError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::unauthorized(format!("{name} header is not valid UTF-8")))?
        .trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}
