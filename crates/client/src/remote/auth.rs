//! Credential exchange.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use basket_core::Email;
use basket_core::wire::{LoginRequest, LoginResponse};

use super::{ApiClient, RemoteError};

impl ApiClient {
    /// Exchange email and password for a session token (`POST /auth/login`).
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Unauthorized` for wrong credentials, or any
    /// other `RemoteError` if the request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<LoginResponse, RemoteError> {
        let request = self
            .unauthenticated(Method::POST, "auth/login")?
            .json(&LoginRequest {
                email: email.clone(),
                password: password.expose_secret().to_owned(),
            });
        self.execute_json(request).await
    }
}
