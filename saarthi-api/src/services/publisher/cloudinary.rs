//! Cloudinary image host client
//!
//! Signed upload and destroy calls against the Cloudinary REST API. Requests
//! are signed with SHA-1 unless the account is configured for SHA-256.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

use saarthi_common::config::{CloudinaryCredentials, SignatureAlgorithm};

use super::{public_id_from_url, AssetPublisher, PublishError, UnpublishOutcome};

const API_BASE_URL: &str = "https://api.cloudinary.com/v1_1";
const DELIVERY_BASE_URL: &str = "https://res.cloudinary.com";
/// On-the-fly format and quality selection
const DELIVERY_TRANSFORMATION: &str = "f_auto,q_auto";
const USER_AGENT: &str = concat!("saarthi/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Cloudinary API client
pub struct CloudinaryPublisher {
    http_client: reqwest::Client,
    credentials: CloudinaryCredentials,
}

impl CloudinaryPublisher {
    pub fn new(credentials: CloudinaryCredentials, timeout: Duration) -> Result<Self, PublishError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            credentials,
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            API_BASE_URL, self.credentials.cloud_name, action
        )
    }

    /// Stable delivery URL for an uploaded object
    pub fn delivery_url(&self, public_id: &str) -> String {
        format!(
            "{}/{}/image/upload/{}/{}",
            DELIVERY_BASE_URL, self.credentials.cloud_name, DELIVERY_TRANSFORMATION, public_id
        )
    }

    fn sign(&self, params: &[(&str, String)]) -> String {
        sign(
            params,
            &self.credentials.api_secret,
            self.credentials.signature_algorithm,
        )
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }

    async fn destroy(&self, public_id: &str) -> Result<(), String> {
        let timestamp = Self::timestamp();
        let mut params = vec![
            ("invalidate", "true".to_string()),
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
        ];
        let signature = self.sign(&params);
        params.push(("api_key", self.credentials.api_key.clone()));
        params.push(("signature", signature));

        let response = self
            .http_client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_message(status.as_u16(), response).await);
        }

        let body: DestroyResponse = response.json().await.map_err(|e| e.to_string())?;
        if body.result == "ok" {
            Ok(())
        } else {
            Err(format!("destroy returned '{}'", body.result))
        }
    }
}

#[async_trait]
impl AssetPublisher for CloudinaryPublisher {
    async fn publish(&self, local_path: &Path, logical_id: &str) -> Result<String, PublishError> {
        let bytes = tokio::fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.png", logical_id));

        let timestamp = Self::timestamp();
        let params = [
            ("overwrite", "true".to_string()),
            ("public_id", logical_id.to_string()),
            ("timestamp", timestamp.clone()),
        ];
        let signature = self.sign(&params);

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(|e| PublishError::Network(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("api_key", self.credentials.api_key.clone())
            .text("overwrite", "true")
            .text("public_id", logical_id.to_string())
            .text("timestamp", timestamp)
            .text("signature", signature);

        tracing::debug!(public_id = %logical_id, "Uploading chart to Cloudinary");

        let response = self
            .http_client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(status.as_u16(), response).await;
            return Err(PublishError::Api(status.as_u16(), message));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Response(e.to_string()))?;

        Ok(self.delivery_url(&body.public_id))
    }

    async fn unpublish(&self, url: &str) -> UnpublishOutcome {
        let Some(public_id) = public_id_from_url(url) else {
            return UnpublishOutcome::Failed(format!("no object id in url '{}'", url));
        };

        match self.destroy(public_id).await {
            Ok(()) => {
                tracing::debug!(public_id = %public_id, "Deleted chart from Cloudinary");
                UnpublishOutcome::Ok
            }
            Err(reason) => UnpublishOutcome::Failed(reason),
        }
    }

    fn name(&self) -> &'static str {
        "cloudinary"
    }
}

/// Request signature: digest of the sorted `k=v` pairs joined by '&', then the secret
pub fn sign(params: &[(&str, String)], api_secret: &str, algorithm: SignatureAlgorithm) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    match algorithm {
        SignatureAlgorithm::Sha1 => hex_digest::<Sha1>(&to_sign, api_secret),
        SignatureAlgorithm::Sha256 => hex_digest::<Sha256>(&to_sign, api_secret),
    }
}

fn hex_digest<D: Digest>(to_sign: &str, api_secret: &str) -> String {
    let mut hasher = D::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

async fn error_message(status: u16, response: reqwest::Response) -> String {
    match response.json::<ErrorResponse>().await {
        Ok(body) => body.error.message,
        Err(_) => format!("HTTP {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> CloudinaryPublisher {
        CloudinaryPublisher::new(
            CloudinaryCredentials {
                cloud_name: "demo".to_string(),
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
                signature_algorithm: SignatureAlgorithm::Sha1,
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn delivery_url_applies_auto_transformation() {
        assert_eq!(
            publisher().delivery_url("corr_matrix_abc"),
            "https://res.cloudinary.com/demo/image/upload/f_auto,q_auto/corr_matrix_abc"
        );
    }

    #[test]
    fn signature_ignores_parameter_order() {
        let a = [
            ("timestamp", "1700000000".to_string()),
            ("public_id", "box_plots_1".to_string()),
        ];
        let b = [
            ("public_id", "box_plots_1".to_string()),
            ("timestamp", "1700000000".to_string()),
        ];
        let sha1 = SignatureAlgorithm::Sha1;
        assert_eq!(sign(&a, "secret", sha1), sign(&b, "secret", sha1));
        assert_ne!(sign(&a, "secret", sha1), sign(&a, "other", sha1));
    }

    // Worked example from the Cloudinary signature documentation
    fn documented_params() -> [(&'static str, String); 3] {
        [
            ("timestamp", "1315060510".to_string()),
            ("public_id", "sample_image".to_string()),
            ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop".to_string()),
        ]
    }

    #[test]
    fn sha1_signature_matches_documented_example() {
        assert_eq!(
            sign(&documented_params(), "abcd", SignatureAlgorithm::Sha1),
            "bfd09f95f331f558cbd1320e67aa8d488770583e"
        );
    }

    #[test]
    fn sha256_signature_matches_documented_example() {
        assert_eq!(
            sign(&documented_params(), "abcd", SignatureAlgorithm::Sha256),
            "cc927e1290f9e3ae4c1a741eda21a4630b4ce80f9ce0bc0296337d25cf40f91e"
        );
    }

    #[tokio::test]
    async fn unpublish_rejects_url_without_id() {
        let outcome = publisher().unpublish("").await;
        assert!(matches!(outcome, UnpublishOutcome::Failed(_)));
    }
}
