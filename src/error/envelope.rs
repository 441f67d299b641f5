// src/error/envelope.rs
//
// Backend response envelope: { code, message, data }
//
// Maps the envelope into ServiceResult so collaborators never branch on raw codes.

use serde::{Deserialize, Serialize};

use super::types::{ServiceError, ServiceResult};

/// Code the backend uses for an accepted operation
pub const SUCCESS_CODE: i64 = 0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    pub fn into_result(self) -> ServiceResult<T> {
        if !self.is_success() {
            let message = self
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("Request rejected with code {}", self.code));
            return Err(ServiceError::business(self.code.to_string(), message));
        }

        self.data
            .ok_or_else(|| ServiceError::transport("Response is missing its data field"))
    }
}

impl<T> ApiEnvelope<T>
where
    T: serde::de::DeserializeOwned,
{
    /// Parses a raw body and normalizes it in one step
    pub fn parse(body: &str) -> ServiceResult<T> {
        let envelope: ApiEnvelope<T> = serde_json::from_str(body)?;
        envelope.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_success_envelope_yields_data() {
        let result = ApiEnvelope::<Vec<String>>::parse(r#"{"code":0,"data":["movies","shows"]}"#);
        assert_eq!(result.unwrap(), vec!["movies".to_string(), "shows".to_string()]);
    }

    #[test]
    fn test_rejected_envelope_yields_business_error() {
        let error = ApiEnvelope::<u32>::parse(r#"{"code":40101,"msg":"token invalid"}"#).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Business);
        assert!(error.has_code("40101"));
        assert_eq!(error.message, "token invalid");
    }

    #[test]
    fn test_rejected_envelope_without_message() {
        let error = ApiEnvelope::<u32>::parse(r#"{"code":500}"#).unwrap_err();
        assert_eq!(error.message, "Request rejected with code 500");
    }

    #[test]
    fn test_success_without_data_is_transport_error() {
        let error = ApiEnvelope::<u32>::parse(r#"{"code":0}"#).unwrap_err();
        assert!(error.is_transport());
    }

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Drive {
        id: String,
    }

    #[test]
    fn test_data_without_default_impl() {
        let drive = ApiEnvelope::<Drive>::parse(r#"{"code":0,"data":{"id":"d-1"}}"#).unwrap();
        assert_eq!(drive, Drive { id: "d-1".to_string() });
        assert!(ApiEnvelope::<Drive>::parse(r#"{"code":0}"#).unwrap_err().is_transport());
    }

    #[test]
    fn test_malformed_body_is_transport_error() {
        let error = ApiEnvelope::<u32>::parse("<html>502</html>").unwrap_err();
        assert!(error.is_transport());
    }
}
