//! Authentication configuration.

use anyhow::{Context, Result};

use crate::idp::{IdpVerifier, Jwks};

const DEFAULT_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const DEFAULT_FRONTEND_BASE_URL: &str = "https://hub.uvaq.edu.mx";

/// Settings for the authentication layer: the OAuth client id the provider
/// tokens must be issued for, where to find the provider's signing keys,
/// and the web frontend origin allowed to call the API.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    google_client_id: String,
    certs_url: String,
    certs_file: Option<String>,
    frontend_base_url: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(google_client_id: String) -> Self {
        Self {
            google_client_id,
            certs_url: DEFAULT_CERTS_URL.to_string(),
            certs_file: None,
            frontend_base_url: DEFAULT_FRONTEND_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_certs_url(mut self, url: String) -> Self {
        self.certs_url = url;
        self
    }

    /// Use a local JWKS file instead of fetching from the provider. Meant
    /// for airgapped deployments and tests.
    #[must_use]
    pub fn with_certs_file(mut self, path: String) -> Self {
        self.certs_file = Some(path);
        self
    }

    #[must_use]
    pub fn with_frontend_base_url(mut self, url: String) -> Self {
        self.frontend_base_url = url;
        self
    }

    #[must_use]
    pub fn google_client_id(&self) -> &str {
        &self.google_client_id
    }

    #[must_use]
    pub fn certs_url(&self) -> &str {
        &self.certs_url
    }

    #[must_use]
    pub fn certs_file(&self) -> Option<&str> {
        self.certs_file.as_deref()
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    /// Build the token verifier: a static keyset when a file is configured,
    /// otherwise the provider's certificate endpoint with in-memory caching.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyset file cannot be read or parsed, or the
    /// HTTP client cannot be built.
    pub async fn build_verifier(&self) -> Result<IdpVerifier> {
        if let Some(path) = &self.certs_file {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read JWKS file: {path}"))?;
            let jwks = Jwks::from_json(&json)
                .with_context(|| format!("Invalid JWKS JSON in {path}"))?;
            return Ok(IdpVerifier::new(jwks, self.google_client_id.clone()));
        }
        IdpVerifier::new_remote(self.certs_url.clone(), self.google_client_id.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new("client-id".to_string());

        assert_eq!(config.google_client_id(), "client-id");
        assert_eq!(config.certs_url(), DEFAULT_CERTS_URL);
        assert_eq!(config.certs_file(), None);
        assert_eq!(config.frontend_base_url(), DEFAULT_FRONTEND_BASE_URL);

        let config = config
            .with_certs_url("https://certs.test/jwks.json".to_string())
            .with_certs_file("/etc/hub/jwks.json".to_string())
            .with_frontend_base_url("http://localhost:5173".to_string());

        assert_eq!(config.certs_url(), "https://certs.test/jwks.json");
        assert_eq!(config.certs_file(), Some("/etc/hub/jwks.json"));
        assert_eq!(config.frontend_base_url(), "http://localhost:5173");
    }

    #[tokio::test]
    async fn build_verifier_reads_static_keyset() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join("campus-hub-config-test");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("jwks.json");
        std::fs::write(&path, r#"{"keys": []}"#)?;

        let config = AuthConfig::new("client-id".to_string())
            .with_certs_file(path.to_string_lossy().into_owned());
        let verifier = config.build_verifier().await?;
        assert_eq!(verifier.audience(), "client-id");
        Ok(())
    }

    #[tokio::test]
    async fn build_verifier_rejects_bad_keyset_file() {
        let config = AuthConfig::new("client-id".to_string())
            .with_certs_file("/nonexistent/jwks.json".to_string());
        assert!(config.build_verifier().await.is_err());
    }
}
