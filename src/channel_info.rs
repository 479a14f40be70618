//! Channel Info (§4.1, component C1): normalizes user-supplied channel
//! configuration and validates it once, up front.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalingError};

const MIN_TTL_SECS: u32 = 5;
const MAX_TTL_SECS: u32 = 120;
const MAX_CHANNEL_NAME_LEN: usize = 256;
const MAX_TAGS: usize = 50;
const MAX_TAG_NAME_LEN: usize = 128;
const MAX_TAG_VALUE_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelRole {
    Master,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    SingleMaster,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

/// Caller-facing, not-yet-validated channel configuration.
#[derive(Debug, Clone, Default)]
pub struct RawChannelInfo {
    pub channel_name: Option<String>,
    pub channel_arn: Option<String>,
    pub region: String,
    pub role: Option<ChannelRole>,
    pub channel_type: Option<ChannelType>,
    pub message_ttl_secs: Option<u32>,
    pub tags: Vec<Tag>,
    pub control_plane_url: Option<String>,
    pub retry: bool,
    pub reconnect: bool,
    pub cache_policy: bool,
    pub async_ice: bool,
}

/// Immutable-after-validation channel configuration (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel_name: Option<String>,
    pub channel_arn: Option<String>,
    pub region: String,
    pub role: ChannelRole,
    pub channel_type: ChannelType,
    pub message_ttl_secs: u32,
    pub tags: Vec<Tag>,
    pub control_plane_url: String,
    pub retry: bool,
    pub reconnect: bool,
    pub cache_policy: bool,
    pub async_ice: bool,
}

impl ChannelInfo {
    /// Validates and normalizes a [`RawChannelInfo`] into a [`ChannelInfo`].
    ///
    /// # Errors
    ///
    /// Returns [`SignalingError::InvalidArg`] if neither a channel name nor
    /// an ARN is provided, or if any field is out of bounds; returns
    /// [`SignalingError::InvalidArg`] (tag-limit variant folded into the
    /// same kind, since `spec.md` lists `TagLimit` as a distinct abstract
    /// kind but this crate's flat error enum carries the detail in the
    /// message) when the tag list is too large or malformed.
    pub fn validate(raw: RawChannelInfo) -> Result<Self> {
        let has_name = raw
            .channel_name
            .as_deref()
            .map_or(false, |n| !n.is_empty());
        let has_arn = raw.channel_arn.as_deref().map_or(false, |a| !a.is_empty());
        if !has_name && !has_arn {
            return Err(SignalingError::InvalidArg(
                "exactly one of channel name or channel ARN is required".into(),
            ));
        }
        if let Some(name) = &raw.channel_name {
            if name.len() > MAX_CHANNEL_NAME_LEN {
                return Err(SignalingError::InvalidArg(format!(
                    "channel name exceeds {MAX_CHANNEL_NAME_LEN} characters"
                )));
            }
        }
        if raw.tags.len() > MAX_TAGS {
            return Err(SignalingError::InvalidArg(format!(
                "tag count {} exceeds the limit of {MAX_TAGS}",
                raw.tags.len()
            )));
        }
        for tag in &raw.tags {
            if tag.name.len() > MAX_TAG_NAME_LEN {
                return Err(SignalingError::InvalidArg(format!(
                    "tag name exceeds {MAX_TAG_NAME_LEN} characters"
                )));
            }
            if tag.value.len() > MAX_TAG_VALUE_LEN {
                return Err(SignalingError::InvalidArg(format!(
                    "tag value exceeds {MAX_TAG_VALUE_LEN} characters"
                )));
            }
        }

        let region = raw.region.to_ascii_lowercase();
        if region.is_empty() {
            return Err(SignalingError::InvalidArg("region must not be empty".into()));
        }

        let ttl = raw
            .message_ttl_secs
            .unwrap_or(MIN_TTL_SECS)
            .clamp(MIN_TTL_SECS, MAX_TTL_SECS);

        let control_plane_url = raw
            .control_plane_url
            .unwrap_or_else(|| format!("https://kinesisvideo.{region}.amazonaws.com"));

        Ok(Self {
            channel_name: raw.channel_name,
            channel_arn: raw.channel_arn,
            region,
            role: raw.role.unwrap_or(ChannelRole::Viewer),
            channel_type: raw.channel_type.unwrap_or(ChannelType::SingleMaster),
            message_ttl_secs: ttl,
            tags: raw.tags,
            control_plane_url,
            retry: raw.retry,
            reconnect: raw.reconnect,
            cache_policy: raw.cache_policy,
            async_ice: raw.async_ice,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_raw() -> RawChannelInfo {
        RawChannelInfo {
            channel_name: Some("my-channel".into()),
            region: "US-WEST-2".into(),
            ..Default::default()
        }
    }

    #[test]
    fn requires_name_or_arn() {
        let raw = RawChannelInfo {
            region: "us-west-2".into(),
            ..Default::default()
        };
        assert!(ChannelInfo::validate(raw).is_err());
    }

    #[test]
    fn normalizes_region_and_derives_url() {
        let info = ChannelInfo::validate(base_raw()).unwrap();
        assert_eq!(info.region, "us-west-2");
        assert_eq!(info.control_plane_url, "https://kinesisvideo.us-west-2.amazonaws.com");
    }

    #[test]
    fn clamps_ttl_bounds() {
        let mut raw = base_raw();
        raw.message_ttl_secs = Some(1);
        assert_eq!(ChannelInfo::validate(raw).unwrap().message_ttl_secs, MIN_TTL_SECS);

        let mut raw = base_raw();
        raw.message_ttl_secs = Some(10_000);
        assert_eq!(ChannelInfo::validate(raw).unwrap().message_ttl_secs, MAX_TTL_SECS);
    }

    #[test]
    fn rejects_too_many_tags() {
        let mut raw = base_raw();
        raw.tags = (0..51)
            .map(|i| Tag {
                name: format!("n{i}"),
                value: "v".into(),
            })
            .collect();
        assert!(ChannelInfo::validate(raw).is_err());
    }

    #[test]
    fn validate_is_idempotent() {
        let info = ChannelInfo::validate(base_raw()).unwrap();
        let raw2 = RawChannelInfo {
            channel_name: info.channel_name.clone(),
            channel_arn: info.channel_arn.clone(),
            region: info.region.clone(),
            role: Some(info.role),
            channel_type: Some(info.channel_type),
            message_ttl_secs: Some(info.message_ttl_secs),
            tags: info.tags.clone(),
            control_plane_url: Some(info.control_plane_url.clone()),
            retry: info.retry,
            reconnect: info.reconnect,
            cache_policy: info.cache_policy,
            async_ice: info.async_ice,
        };
        let info2 = ChannelInfo::validate(raw2).unwrap();
        assert_eq!(info, info2);
    }
}
