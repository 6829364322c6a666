//! Content rules and wire shape for each supported platform

use super::MediaRequirement;

/// How a platform receives posts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// JSON POST to `api_url` with a bearer `access_token`
    BearerApi,
    /// JSON POST to an unauthenticated `webhook_url`
    Webhook,
}

/// Static description of one publishing target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    pub name: &'static str,
    pub max_length: Option<usize>,
    pub media: MediaRequirement,
    pub delivery: Delivery,
    /// JSON field carrying the post text
    pub text_field: &'static str,
    /// Prefix for synthesized external ids when the platform returns none
    pub id_prefix: &'static str,
}

const fn api(
    name: &'static str,
    max_length: Option<usize>,
    media: MediaRequirement,
    text_field: &'static str,
    id_prefix: &'static str,
) -> PlatformProfile {
    PlatformProfile {
        name,
        max_length,
        media,
        delivery: Delivery::BearerApi,
        text_field,
        id_prefix,
    }
}

const fn webhook(
    name: &'static str,
    max_length: usize,
    text_field: &'static str,
    id_prefix: &'static str,
) -> PlatformProfile {
    PlatformProfile {
        name,
        max_length: Some(max_length),
        media: MediaRequirement::None,
        delivery: Delivery::Webhook,
        text_field,
        id_prefix,
    }
}

pub const INSTAGRAM: PlatformProfile =
    api("instagram", Some(2200), MediaRequirement::Image, "caption", "ig");
pub const FACEBOOK: PlatformProfile =
    api("facebook", Some(5000), MediaRequirement::None, "message", "fb");
pub const TIKTOK: PlatformProfile =
    api("tiktok", Some(4000), MediaRequirement::Video, "description", "tt");
pub const LINKEDIN: PlatformProfile =
    api("linkedin", Some(3000), MediaRequirement::None, "text", "li");
pub const YOUTUBE: PlatformProfile =
    api("youtube", None, MediaRequirement::Video, "description", "yt");
pub const TWITTER: PlatformProfile =
    api("twitter", Some(280), MediaRequirement::None, "text", "tw");
pub const REDDIT: PlatformProfile =
    api("reddit", Some(40000), MediaRequirement::None, "text", "rd");
pub const PINTEREST: PlatformProfile =
    api("pinterest", None, MediaRequirement::Image, "note", "pin");
pub const BLUESKY: PlatformProfile =
    api("bluesky", Some(300), MediaRequirement::None, "text", "bsky");
pub const TELEGRAM: PlatformProfile = webhook("telegram", 4000, "text", "tg");
pub const DISCORD: PlatformProfile = webhook("discord", 2000, "content", "dc");

/// Every built-in platform
pub const ALL: &[PlatformProfile] = &[
    INSTAGRAM, FACEBOOK, TIKTOK, LINKEDIN, YOUTUBE, TWITTER, TELEGRAM, DISCORD, REDDIT,
    PINTEREST, BLUESKY,
];

/// Look up a built-in profile by case-insensitive name
pub fn by_name(name: &str) -> Option<PlatformProfile> {
    ALL.iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .copied()
}
