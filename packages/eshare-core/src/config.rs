//! Service configuration.

use chrono::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Default share lifetime: 7 days
pub const DEFAULT_SHARE_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Default maximum encrypted blob size: 100 MiB
pub const DEFAULT_MAX_BLOB_BYTES: u64 = 100 * 1024 * 1024;

/// Default base URL for share links
pub const DEFAULT_APP_URL: &str = "http://localhost:3000";

/// Configuration for [`crate::ShareService`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareConfig {
    /// How long a share stays claimable, in seconds
    pub share_ttl_secs: i64,
    /// Largest encrypted blob accepted, in bytes
    pub max_blob_bytes: u64,
    /// Base URL used to build share links
    pub app_url: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            share_ttl_secs: DEFAULT_SHARE_TTL_SECS,
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
            app_url: DEFAULT_APP_URL.to_string(),
        }
    }
}

impl ShareConfig {
    /// Share lifetime as a duration
    ///
    /// Fails when `share_ttl_secs` is outside chrono's representable range.
    pub fn share_ttl(&self) -> Result<Duration> {
        Duration::try_seconds(self.share_ttl_secs).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "share TTL of {} seconds is out of range",
                self.share_ttl_secs
            ))
        })
    }

    /// Link the recipient opens to claim a share
    pub fn share_link(&self, share_id: &Uuid) -> String {
        format!("{}/s/{}", self.app_url.trim_end_matches('/'), share_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShareConfig::default();
        assert_eq!(config.share_ttl().unwrap(), Duration::days(7));
        assert_eq!(config.max_blob_bytes, 104_857_600);
        assert_eq!(config.app_url, "http://localhost:3000");
    }

    #[test]
    fn test_share_ttl_out_of_range() {
        let config = ShareConfig {
            share_ttl_secs: i64::MAX,
            ..ShareConfig::default()
        };
        assert!(matches!(config.share_ttl(), Err(Error::InvalidConfig(_))));

        let config = ShareConfig {
            share_ttl_secs: i64::MIN,
            ..ShareConfig::default()
        };
        assert!(config.share_ttl().is_err());
    }

    #[test]
    fn test_share_link() {
        let id = Uuid::parse_str("6f9619ff-8b86-4d11-b42d-00c04fc964ff").unwrap();
        let config = ShareConfig {
            app_url: "https://eshare.example/".into(),
            ..ShareConfig::default()
        };
        assert_eq!(
            config.share_link(&id),
            "https://eshare.example/s/6f9619ff-8b86-4d11-b42d-00c04fc964ff"
        );
    }
}
