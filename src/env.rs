use std::fmt;

use crate::error::PublishError;

pub const ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
pub const ENDPOINT: &str = "R2_ENDPOINT";
pub const BUCKET: &str = "R2_BUCKET";
/// Optional public base URL (custom domain or `r2.dev` host) used for download hints.
pub const PUBLIC_URL: &str = "R2_PUBLIC_URL";

pub const REQUIRED_VARS: [&str; 4] = [ACCESS_KEY_ID, SECRET_ACCESS_KEY, ENDPOINT, BUCKET];

/// Object store settings, assembled once at startup and passed down explicitly.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: String,
    pub bucket: String,
    pub public_url: Option<String>,
}

impl StoreConfig {
    /// Build the settings through `lookup`. Unset and blank values both count as missing,
    /// and every missing name is reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PublishError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let values = REQUIRED_VARS.map(|name| read(name));
        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .zip(values.iter())
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(PublishError::Config { missing });
        }

        let [Some(access_key_id), Some(secret_access_key), Some(endpoint), Some(bucket)] = values
        else {
            return Err(PublishError::Config {
                missing: REQUIRED_VARS.to_vec(),
            });
        };

        Ok(Self {
            access_key_id,
            secret_access_key,
            endpoint,
            bucket,
            public_url: read(PUBLIC_URL),
        })
    }

    /// Endpoint without a trailing slash, ready for joining with `/{bucket}/{key}`.
    pub fn endpoint_base(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// Download URL written into the release manifest for `key`.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint_base(), self.bucket, key)
    }

    /// Best guess at a publicly reachable URL for `key`.
    ///
    /// Uses `R2_PUBLIC_URL` when configured, otherwise rewrites the API endpoint to the
    /// `pub-` host, which only resolves once public access is enabled on the bucket.
    pub fn public_url_hint(&self, key: &str) -> String {
        match &self.public_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!(
                "{}/{}/{}",
                self.endpoint_base().replacen("https://", "https://pub-", 1),
                self.bucket,
                key
            ),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("public_url", &self.public_url)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_lookup(name: &str) -> Option<String> {
    match name {
        ACCESS_KEY_ID => Some("AKIDEXAMPLE".into()),
        SECRET_ACCESS_KEY => Some("wJalrXUtnFEMI/K7MDENG".into()),
        ENDPOINT => Some("https://acct.r2.cloudflarestorage.com/".into()),
        BUCKET => Some("releases".into()),
        _ => None,
    }
}
