use std::time::Duration;

use crate::models::Config;

/// Longest long-poll wait the SQS `ReceiveMessage` call accepts.
pub const SQS_MAX_WAIT_TIME: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint(
        &mut self,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Applies guard rails to a composed configuration.
///
/// Values that cannot be honoured are adjusted in place and reported.
pub fn apply_guard_rails(config: &mut Config) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    if config.kubernetes.insecure_skip_tls_verify {
        warnings.push_with_hint(
            "TLS verification for the Kubernetes API server is disabled",
            "Set kubernetes.ca_file instead of kubernetes.insecure_skip_tls_verify",
        );
    }

    if config.kubernetes.list_page_size == 0 {
        config.kubernetes.list_page_size = 1;
        warnings.push("kubernetes.list_page_size must be positive; using 1");
    }

    if let Some(sqs) = config.sqs.as_mut() {
        if sqs.wait_time > SQS_MAX_WAIT_TIME {
            warnings.push_with_hint(
                format!(
                    "sqs.wait_time of {} exceeds the service maximum; using {}",
                    humantime::format_duration(sqs.wait_time),
                    humantime::format_duration(SQS_MAX_WAIT_TIME)
                ),
                "Lower sqs.wait_time to 20s or less",
            );
            sqs.wait_time = SQS_MAX_WAIT_TIME;
        }
        if sqs.error_backoff.is_zero() {
            warnings.push(
                "sqs.error_backoff is zero; receive failures will be retried immediately",
            );
        }
    }

    warnings
}
