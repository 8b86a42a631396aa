//! Retention policy to container env
//!
//! Entries are produced in a fixed order: the `KEEP_*` counts, `KEEP_TAGS`,
//! backend credentials, `RESTIC_REPOSITORY`, `PROM_URL`. Namespace defaults
//! are merged afterwards and never override a policy-derived key.

use std::sync::Arc;

use k8s_openapi::api::core::v1::EnvVar;
use kube::ResourceExt;
use tracing::warn;

use stash_common::crd::{Prune, DEFAULT_KEEP_DAILY};
use stash_common::env::EnvVarSet;
use stash_common::{
    Error, OperatorConfig, PROM_URL_ENV, RESTIC_PASSWORD_ENV, RESTIC_REPOSITORY_ENV,
    STATS_URL_ENV,
};

/// Source of the namespace-scoped default env for job containers
pub trait DefaultEnvSource: Send + Sync {
    /// Defaults for jobs running in `namespace`
    fn default_env(&self, namespace: &str) -> EnvVarSet;
}

/// Defaults derived from the operator configuration
///
/// `HOSTNAME` is the namespace so snapshots are grouped per namespace; the
/// cluster-wide repository and its credentials are only present when configured.
#[derive(Clone, Debug)]
pub struct ConfigDefaultEnv {
    config: Arc<OperatorConfig>,
}

impl ConfigDefaultEnv {
    /// Create a default env source over `config`
    pub fn new(config: Arc<OperatorConfig>) -> Self {
        Self { config }
    }
}

impl DefaultEnvSource for ConfigDefaultEnv {
    fn default_env(&self, namespace: &str) -> EnvVarSet {
        let mut vars = EnvVarSet::new();
        vars.set_string("HOSTNAME", namespace);
        if let Some(url) = &self.config.global_stats_url {
            vars.set_string(STATS_URL_ENV, url.clone());
        }
        if let Some(repo) = self.config.global_repository() {
            vars.set_string(RESTIC_REPOSITORY_ENV, repo);
        }
        if let Some(secret) = &self.config.global_repo_password {
            vars.set_source(RESTIC_PASSWORD_ENV, secret.to_env_source());
        }
        if let Some(secret) = &self.config.global_access_key_id {
            vars.set_source("AWS_ACCESS_KEY_ID", secret.to_env_source());
        }
        if let Some(secret) = &self.config.global_secret_access_key {
            vars.set_source("AWS_SECRET_ACCESS_KEY", secret.to_env_source());
        }
        vars
    }
}

/// Env derived from the request alone, before defaults are merged
pub fn policy_env(prune: &Prune, config: &OperatorConfig) -> Result<EnvVarSet, Error> {
    let retention = &prune.spec.retention;
    let mut vars = EnvVarSet::new();

    set_positive(&mut vars, "KEEP_LAST", retention.keep_last);
    set_positive(&mut vars, "KEEP_HOURLY", retention.keep_hourly);
    let keep_daily = if retention.keep_daily > 0 {
        retention.keep_daily
    } else {
        DEFAULT_KEEP_DAILY
    };
    vars.set_string("KEEP_DAILY", keep_daily.to_string());
    set_positive(&mut vars, "KEEP_WEEKLY", retention.keep_weekly);
    set_positive(&mut vars, "KEEP_MONTHLY", retention.keep_monthly);
    set_positive(&mut vars, "KEEP_YEARLY", retention.keep_yearly);

    if !retention.keep_tags.is_empty() {
        vars.set_string("KEEP_TAGS", retention.keep_tags.join(","));
    }

    if let Some(backend) = &prune.spec.backend {
        for (name, secret) in backend.credential_env()? {
            vars.set_source(name, secret.to_env_source());
        }
        vars.set_string(RESTIC_REPOSITORY_ENV, backend.repository()?);
    }

    vars.set_string(PROM_URL_ENV, config.prom_url.clone());

    Ok(vars)
}

/// Full container env: policy env followed by the namespace defaults it does not already set
pub fn retention_env(
    prune: &Prune,
    config: &OperatorConfig,
    defaults: &dyn DefaultEnvSource,
) -> Result<Vec<EnvVar>, Error> {
    let mut vars = policy_env(prune, config)?;
    let namespace = prune.namespace().unwrap_or_default();

    if let Err(conflict) = vars.merge(defaults.default_env(&namespace)) {
        warn!(
            prune = %prune.name_any(),
            namespace = %namespace,
            keys = ?conflict.keys,
            "error while merging the environment variables"
        );
    }

    Ok(vars.into_vars())
}

fn set_positive(vars: &mut EnvVarSet, name: &str, value: i32) {
    if value > 0 {
        vars.set_string(name, value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_common::crd::{Backend, PruneSpec, RetentionPolicy, S3Spec, SecretKeyRef};

    struct NoDefaults;

    impl DefaultEnvSource for NoDefaults {
        fn default_env(&self, _namespace: &str) -> EnvVarSet {
            EnvVarSet::new()
        }
    }

    fn prune(retention: RetentionPolicy, backend: Option<Backend>) -> Prune {
        let mut prune = Prune::new(
            "nightly",
            PruneSpec {
                retention,
                backend,
                ..Default::default()
            },
        );
        prune.metadata.namespace = Some("backups".to_string());
        prune
    }

    fn value<'a>(vars: &'a [EnvVar], name: &str) -> Option<&'a str> {
        vars.iter()
            .find(|v| v.name == name)
            .and_then(|v| v.value.as_deref())
    }

    fn names(vars: &[EnvVar]) -> Vec<&str> {
        vars.iter().map(|v| v.name.as_str()).collect()
    }

    fn s3_backend() -> Backend {
        Backend {
            repo_password_secret_ref: Some(SecretKeyRef::new("restic-repo", "password")),
            s3: Some(S3Spec {
                endpoint: "http://minio:9000".to_string(),
                bucket: "backups".to_string(),
                access_key_id_secret_ref: Some(SecretKeyRef::new("minio", "username")),
                secret_access_key_secret_ref: Some(SecretKeyRef::new("minio", "password")),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn unset_keep_daily_defaults_to_14() {
        for keep_daily in [0, -3] {
            let p = prune(
                RetentionPolicy {
                    keep_daily,
                    ..Default::default()
                },
                None,
            );
            let vars = retention_env(&p, &OperatorConfig::default(), &NoDefaults).unwrap();
            assert_eq!(value(&vars, "KEEP_DAILY"), Some("14"));
        }
    }

    #[test]
    fn positive_keep_daily_is_used_verbatim() {
        let p = prune(
            RetentionPolicy {
                keep_daily: 7,
                ..Default::default()
            },
            None,
        );
        let vars = retention_env(&p, &OperatorConfig::default(), &NoDefaults).unwrap();
        assert_eq!(value(&vars, "KEEP_DAILY"), Some("7"));
    }

    #[test]
    fn counts_are_present_only_when_positive() {
        let p = prune(
            RetentionPolicy {
                keep_last: 5,
                keep_hourly: 0,
                keep_daily: 7,
                keep_weekly: -1,
                keep_monthly: 12,
                keep_yearly: 0,
                keep_tags: vec!["a".to_string(), "b".to_string()],
                tags: vec![],
            },
            None,
        );
        let vars = retention_env(&p, &OperatorConfig::default(), &NoDefaults).unwrap();

        assert_eq!(value(&vars, "KEEP_LAST"), Some("5"));
        assert_eq!(value(&vars, "KEEP_MONTHLY"), Some("12"));
        for absent in ["KEEP_HOURLY", "KEEP_WEEKLY", "KEEP_YEARLY"] {
            assert!(value(&vars, absent).is_none(), "{absent} should be absent");
        }
        assert_eq!(value(&vars, "KEEP_TAGS"), Some("a,b"));
    }

    #[test]
    fn scenario_keep_last_daily_and_tags() {
        let p = prune(
            RetentionPolicy {
                keep_last: 5,
                keep_daily: 7,
                keep_tags: vec!["a".to_string(), "b".to_string()],
                ..Default::default()
            },
            None,
        );
        let vars = retention_env(&p, &OperatorConfig::default(), &NoDefaults).unwrap();
        assert_eq!(
            names(&vars),
            vec!["KEEP_LAST", "KEEP_DAILY", "KEEP_TAGS", "PROM_URL"]
        );
    }

    #[test]
    fn keep_tags_absent_when_empty() {
        let p = prune(RetentionPolicy::default(), None);
        let vars = retention_env(&p, &OperatorConfig::default(), &NoDefaults).unwrap();
        assert!(value(&vars, "KEEP_TAGS").is_none());
    }

    #[test]
    fn keep_tags_single_has_no_separator() {
        let p = prune(
            RetentionPolicy {
                keep_tags: vec!["monthly".to_string()],
                ..Default::default()
            },
            None,
        );
        let vars = retention_env(&p, &OperatorConfig::default(), &NoDefaults).unwrap();
        assert_eq!(value(&vars, "KEEP_TAGS"), Some("monthly"));
    }

    #[test]
    fn backend_adds_secret_refs_and_repository_before_prom_url() {
        let p = prune(RetentionPolicy::default(), Some(s3_backend()));
        let config = OperatorConfig {
            prom_url: "http://pushgateway:9091".to_string(),
            ..Default::default()
        };
        let vars = retention_env(&p, &config, &NoDefaults).unwrap();

        assert_eq!(
            names(&vars),
            vec![
                "KEEP_DAILY",
                "AWS_ACCESS_KEY_ID",
                "AWS_SECRET_ACCESS_KEY",
                "RESTIC_PASSWORD",
                "RESTIC_REPOSITORY",
                "PROM_URL",
            ]
        );
        let password = vars.iter().find(|v| v.name == "RESTIC_PASSWORD").unwrap();
        assert!(password.value.is_none());
        let selector = password
            .value_from
            .as_ref()
            .and_then(|s| s.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(selector.name, "restic-repo");
        assert_eq!(selector.key, "password");

        assert_eq!(
            value(&vars, "RESTIC_REPOSITORY"),
            Some("s3:http://minio:9000/backups")
        );
        assert_eq!(value(&vars, "PROM_URL"), Some("http://pushgateway:9091"));
    }

    #[test]
    fn malformed_backend_is_a_configuration_error() {
        let p = prune(RetentionPolicy::default(), Some(Backend::default()));
        let err = retention_env(&p, &OperatorConfig::default(), &NoDefaults).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn defaults_fill_gaps_but_never_override() {
        let config = Arc::new(OperatorConfig {
            global_stats_url: Some("http://stats".to_string()),
            global_s3_endpoint: Some("https://s3.global".to_string()),
            global_s3_bucket: Some("global".to_string()),
            global_repo_password: Some(SecretKeyRef::new("global-repo", "password")),
            ..Default::default()
        });
        let defaults = ConfigDefaultEnv::new(config.clone());
        let p = prune(RetentionPolicy::default(), Some(s3_backend()));

        let vars = retention_env(&p, &config, &defaults).unwrap();

        assert_eq!(value(&vars, "HOSTNAME"), Some("backups"));
        assert_eq!(value(&vars, "STATS_URL"), Some("http://stats"));
        assert_eq!(
            value(&vars, "RESTIC_REPOSITORY"),
            Some("s3:http://minio:9000/backups")
        );
        let password = vars.iter().find(|v| v.name == "RESTIC_PASSWORD").unwrap();
        assert_eq!(
            password
                .value_from
                .as_ref()
                .and_then(|s| s.secret_key_ref.as_ref())
                .map(|s| s.name.as_str()),
            Some("restic-repo")
        );
        assert_eq!(
            vars.iter().filter(|v| v.name == "RESTIC_REPOSITORY").count(),
            1
        );
    }

    #[test]
    fn global_repository_used_without_backend() {
        let config = Arc::new(OperatorConfig {
            global_s3_endpoint: Some("https://s3.global".to_string()),
            global_s3_bucket: Some("global".to_string()),
            ..Default::default()
        });
        let defaults = ConfigDefaultEnv::new(config.clone());
        let p = prune(RetentionPolicy::default(), None);

        let vars = retention_env(&p, &config, &defaults).unwrap();
        assert_eq!(
            value(&vars, "RESTIC_REPOSITORY"),
            Some("s3:https://s3.global/global")
        );
    }
}
