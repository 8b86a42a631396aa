//! Restic repository backend descriptor
//!
//! A backend names exactly one storage target. Credentials are always
//! secret references; they become `valueFrom.secretKeyRef` env entries and
//! are never inlined into a Job.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVarSource, SecretKeySelector, VolumeMount};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::RESTIC_PASSWORD_ENV;

/// Reference to a single key in a Secret
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SecretKeyRef {
    /// Secret name
    pub name: String,
    /// Key within the secret
    pub key: String,
}

impl SecretKeyRef {
    /// Create a reference to `key` in secret `name`
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Env var source resolving this reference at container start
    pub fn to_env_source(&self) -> EnvVarSource {
        EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: self.name.clone(),
                key: self.key.clone(),
                optional: None,
            }),
            ..Default::default()
        }
    }
}

/// Local (mounted) repository
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalSpec {
    /// Path inside the job container where the repository lives
    pub mount_path: String,
}

/// S3 or S3-compatible repository
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct S3Spec {
    /// Endpoint URL (e.g., "https://s3.eu-west-1.amazonaws.com", "http://minio:9000")
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Secret key holding the access key id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id_secret_ref: Option<SecretKeyRef>,
    /// Secret key holding the secret access key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key_secret_ref: Option<SecretKeyRef>,
}

/// Google Cloud Storage repository
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GcsSpec {
    /// Bucket name
    pub bucket: String,
    /// Secret key holding the GCP project id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id_secret_ref: Option<SecretKeyRef>,
    /// Secret key holding an OAuth access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_secret_ref: Option<SecretKeyRef>,
}

/// Azure Blob Storage repository
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AzureSpec {
    /// Blob container name
    pub container: String,
    /// Secret key holding the storage account name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name_secret_ref: Option<SecretKeyRef>,
    /// Secret key holding the storage account key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_key_secret_ref: Option<SecretKeyRef>,
}

/// Backblaze B2 repository
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct B2Spec {
    /// Bucket name
    pub bucket: String,
    /// Path prefix inside the bucket
    #[serde(default)]
    pub path: String,
    /// Secret key holding the account id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id_secret_ref: Option<SecretKeyRef>,
    /// Secret key holding the account key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_key_secret_ref: Option<SecretKeyRef>,
}

/// OpenStack Swift repository
///
/// Swift authenticates through the `OS_*` variables, usually injected with `envFrom`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwiftSpec {
    /// Container name
    pub container: String,
    /// Path prefix inside the container
    #[serde(default)]
    pub path: String,
}

/// restic REST server repository
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestServerSpec {
    /// Server URL (e.g., "https://rest.example.com:8000/repo")
    pub url: String,
    /// Secret key holding the basic-auth user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_secret_ref: Option<SecretKeyRef>,
    /// Secret key holding the basic-auth password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret_ref: Option<SecretKeyRef>,
}

/// TLS material paths handed to the job container
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TlsOptions {
    /// CA certificate used to verify the repository endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,
    /// Client certificate for mutual TLS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_cert: Option<String>,
    /// Client key for mutual TLS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
}

impl TlsOptions {
    /// Command line flags for the job container.
    ///
    /// `-caCert <path>` when a CA is set, then `-clientCert <cert> -clientKey <key>`
    /// only when both halves of the client pair are set.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ca) = non_empty(&self.ca_cert) {
            args.push("-caCert".to_string());
            args.push(ca.to_string());
        }
        if let (Some(cert), Some(key)) = (non_empty(&self.client_cert), non_empty(&self.client_key))
        {
            args.push("-clientCert".to_string());
            args.push(cert.to_string());
            args.push("-clientKey".to_string());
            args.push(key.to_string());
        }
        args
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Repository backend of a maintenance request
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    /// Secret key holding the restic repository password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_password_secret_ref: Option<SecretKeyRef>,

    /// Local repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalSpec>,

    /// S3 repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Spec>,

    /// GCS repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs: Option<GcsSpec>,

    /// Azure repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureSpec>,

    /// B2 repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b2: Option<B2Spec>,

    /// Swift repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swift: Option<SwiftSpec>,

    /// REST server repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<RestServerSpec>,

    /// TLS options for talking to the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_options: Option<TlsOptions>,

    /// Extra mounts carrying TLS material into the job container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_mounts: Option<Vec<VolumeMount>>,
}

/// The single storage target a backend points at
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StorageTarget<'a> {
    /// Local repository
    Local(&'a LocalSpec),
    /// S3 repository
    S3(&'a S3Spec),
    /// GCS repository
    Gcs(&'a GcsSpec),
    /// Azure repository
    Azure(&'a AzureSpec),
    /// B2 repository
    B2(&'a B2Spec),
    /// Swift repository
    Swift(&'a SwiftSpec),
    /// REST server repository
    Rest(&'a RestServerSpec),
}

impl StorageTarget<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::S3(_) => "s3",
            Self::Gcs(_) => "gcs",
            Self::Azure(_) => "azure",
            Self::B2(_) => "b2",
            Self::Swift(_) => "swift",
            Self::Rest(_) => "rest",
        }
    }
}

impl Backend {
    /// The configured storage target.
    ///
    /// Exactly one target must be set.
    pub fn storage(&self) -> Result<StorageTarget<'_>, Error> {
        let targets: Vec<StorageTarget<'_>> = [
            self.local.as_ref().map(StorageTarget::Local),
            self.s3.as_ref().map(StorageTarget::S3),
            self.gcs.as_ref().map(StorageTarget::Gcs),
            self.azure.as_ref().map(StorageTarget::Azure),
            self.b2.as_ref().map(StorageTarget::B2),
            self.swift.as_ref().map(StorageTarget::Swift),
            self.rest.as_ref().map(StorageTarget::Rest),
        ]
        .into_iter()
        .flatten()
        .collect();

        match targets.as_slice() {
            [target] => Ok(*target),
            [] => Err(Error::configuration_for_field(
                "spec.backend",
                "no storage target configured",
            )),
            many => Err(Error::configuration_for_field(
                "spec.backend",
                format!(
                    "multiple storage targets configured: {}",
                    many.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ")
                ),
            )),
        }
    }

    /// Serialized repository location, as understood by restic
    pub fn repository(&self) -> Result<String, Error> {
        let repo = match self.storage()? {
            StorageTarget::Local(local) => {
                require("spec.backend.local.mountPath", &local.mount_path)?;
                local.mount_path.clone()
            }
            StorageTarget::S3(s3) => {
                require("spec.backend.s3.endpoint", &s3.endpoint)?;
                require("spec.backend.s3.bucket", &s3.bucket)?;
                format!("s3:{}/{}", s3.endpoint.trim_end_matches('/'), s3.bucket)
            }
            StorageTarget::Gcs(gcs) => {
                require("spec.backend.gcs.bucket", &gcs.bucket)?;
                format!("gs:{}:/", gcs.bucket)
            }
            StorageTarget::Azure(azure) => {
                require("spec.backend.azure.container", &azure.container)?;
                format!("azure:{}:/", azure.container)
            }
            StorageTarget::B2(b2) => {
                require("spec.backend.b2.bucket", &b2.bucket)?;
                format!("b2:{}:{}", b2.bucket, b2.path)
            }
            StorageTarget::Swift(swift) => {
                require("spec.backend.swift.container", &swift.container)?;
                format!("swift:{}:{}", swift.container, swift.path)
            }
            StorageTarget::Rest(rest) => {
                require("spec.backend.rest.url", &rest.url)?;
                format!("rest:{}", rest.url)
            }
        };
        Ok(repo)
    }

    /// Env var name to secret reference for every credential this backend needs
    pub fn credential_env(&self) -> Result<BTreeMap<String, SecretKeyRef>, Error> {
        let mut refs: Vec<(&str, Option<&SecretKeyRef>)> =
            vec![(RESTIC_PASSWORD_ENV, self.repo_password_secret_ref.as_ref())];

        match self.storage()? {
            StorageTarget::Local(_) | StorageTarget::Swift(_) => {}
            StorageTarget::S3(s3) => {
                refs.push(("AWS_ACCESS_KEY_ID", s3.access_key_id_secret_ref.as_ref()));
                refs.push((
                    "AWS_SECRET_ACCESS_KEY",
                    s3.secret_access_key_secret_ref.as_ref(),
                ));
            }
            StorageTarget::Gcs(gcs) => {
                refs.push(("GOOGLE_PROJECT_ID", gcs.project_id_secret_ref.as_ref()));
                refs.push(("GOOGLE_ACCESS_TOKEN", gcs.access_token_secret_ref.as_ref()));
            }
            StorageTarget::Azure(azure) => {
                refs.push(("AZURE_ACCOUNT_NAME", azure.account_name_secret_ref.as_ref()));
                refs.push(("AZURE_ACCOUNT_KEY", azure.account_key_secret_ref.as_ref()));
            }
            StorageTarget::B2(b2) => {
                refs.push(("B2_ACCOUNT_ID", b2.account_id_secret_ref.as_ref()));
                refs.push(("B2_ACCOUNT_KEY", b2.account_key_secret_ref.as_ref()));
            }
            StorageTarget::Rest(rest) => {
                refs.push(("USER", rest.user_secret_ref.as_ref()));
                refs.push(("PASSWORD", rest.password_secret_ref.as_ref()));
            }
        }

        Ok(refs
            .into_iter()
            .filter_map(|(name, r)| r.map(|r| (name.to_string(), r.clone())))
            .collect())
    }
}

fn require(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::configuration_for_field(field, "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3_backend() -> Backend {
        Backend {
            repo_password_secret_ref: Some(SecretKeyRef::new("restic-repo", "password")),
            s3: Some(S3Spec {
                endpoint: "http://minio.minio:9000/".to_string(),
                bucket: "backups".to_string(),
                access_key_id_secret_ref: Some(SecretKeyRef::new("minio-creds", "username")),
                secret_access_key_secret_ref: Some(SecretKeyRef::new("minio-creds", "password")),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn repository_strings_per_storage_type() {
        assert_eq!(
            s3_backend().repository().unwrap(),
            "s3:http://minio.minio:9000/backups"
        );

        let cases = [
            (
                Backend {
                    local: Some(LocalSpec {
                        mount_path: "/data/repo".to_string(),
                    }),
                    ..Default::default()
                },
                "/data/repo",
            ),
            (
                Backend {
                    gcs: Some(GcsSpec {
                        bucket: "snapshots".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                "gs:snapshots:/",
            ),
            (
                Backend {
                    azure: Some(AzureSpec {
                        container: "restic".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                "azure:restic:/",
            ),
            (
                Backend {
                    b2: Some(B2Spec {
                        bucket: "vault".to_string(),
                        path: "/cluster-a".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                "b2:vault:/cluster-a",
            ),
            (
                Backend {
                    swift: Some(SwiftSpec {
                        container: "restic".to_string(),
                        path: "/prod".to_string(),
                    }),
                    ..Default::default()
                },
                "swift:restic:/prod",
            ),
            (
                Backend {
                    rest: Some(RestServerSpec {
                        url: "https://rest.example.com:8000/repo".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                "rest:https://rest.example.com:8000/repo",
            ),
        ];

        for (backend, expected) in cases {
            assert_eq!(backend.repository().unwrap(), expected);
        }
    }

    #[test]
    fn backend_without_target_is_a_configuration_error() {
        let err = Backend::default().repository().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("no storage target"));
    }

    #[test]
    fn backend_with_two_targets_is_a_configuration_error() {
        let mut backend = s3_backend();
        backend.gcs = Some(GcsSpec {
            bucket: "other".to_string(),
            ..Default::default()
        });
        let err = backend.storage().unwrap_err();
        assert!(err.to_string().contains("s3, gcs"));
    }

    #[test]
    fn empty_bucket_is_rejected_with_field_path() {
        let mut backend = s3_backend();
        if let Some(s3) = backend.s3.as_mut() {
            s3.bucket = String::new();
        }
        match backend.repository().unwrap_err() {
            Error::Configuration { field, .. } => {
                assert_eq!(field.as_deref(), Some("spec.backend.s3.bucket"))
            }
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn s3_credentials_are_secret_references() {
        let creds = s3_backend().credential_env().unwrap();
        let keys: Vec<&str> = creds.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "RESTIC_PASSWORD"]
        );
        assert_eq!(creds["RESTIC_PASSWORD"], SecretKeyRef::new("restic-repo", "password"));

        let source = creds["AWS_ACCESS_KEY_ID"].to_env_source();
        let selector = source.secret_key_ref.unwrap();
        assert_eq!(selector.name, "minio-creds");
        assert_eq!(selector.key, "username");
    }

    #[test]
    fn unset_credentials_are_omitted() {
        let backend = Backend {
            rest: Some(RestServerSpec {
                url: "http://rest:8000".to_string(),
                password_secret_ref: Some(SecretKeyRef::new("rest", "password")),
                ..Default::default()
            }),
            ..Default::default()
        };
        let creds = backend.credential_env().unwrap();
        assert_eq!(creds.len(), 1);
        assert!(creds.contains_key("PASSWORD"));
    }

    #[test]
    fn tls_args_require_complete_client_pair() {
        let opts = TlsOptions {
            ca_cert: Some("/mnt/ca/ca.crt".to_string()),
            client_cert: Some("/mnt/tls/tls.crt".to_string()),
            client_key: None,
        };
        assert_eq!(opts.args(), vec!["-caCert", "/mnt/ca/ca.crt"]);

        let opts = TlsOptions {
            ca_cert: None,
            client_cert: Some("/mnt/tls/tls.crt".to_string()),
            client_key: Some("/mnt/tls/tls.key".to_string()),
        };
        assert_eq!(
            opts.args(),
            vec![
                "-clientCert",
                "/mnt/tls/tls.crt",
                "-clientKey",
                "/mnt/tls/tls.key"
            ]
        );

        assert!(TlsOptions::default().args().is_empty());
    }

    #[test]
    fn backend_deserializes_from_camel_case() {
        let backend: Backend = serde_json::from_value(serde_json::json!({
            "repoPasswordSecretRef": {"name": "repo", "key": "password"},
            "s3": {"endpoint": "https://s3.amazonaws.com", "bucket": "b"},
            "tlsOptions": {"caCert": "/certs/ca.crt"}
        }))
        .unwrap();
        assert_eq!(backend.repository().unwrap(), "s3:https://s3.amazonaws.com/b");
        assert_eq!(
            backend.tls_options.unwrap().ca_cert.as_deref(),
            Some("/certs/ca.crt")
        );
    }
}
