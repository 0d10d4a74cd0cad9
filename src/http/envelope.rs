use serde::Serialize;

/// Uniform response envelope for the control API (spec.md §6): HTTP status
/// is always 200, success/failure is signaled in the body.
#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: 0,
            message: String::new(),
            data: Some(data),
        }
    }
}

pub fn ok_empty() -> Envelope<()> {
    Envelope {
        status: 0,
        message: String::new(),
        data: None,
    }
}

pub fn err(message: impl Into<String>) -> Envelope<()> {
    Envelope {
        status: 1,
        message: message.into(),
        data: None,
    }
}
