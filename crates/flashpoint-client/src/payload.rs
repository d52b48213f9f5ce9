//! Request payloads and fetch items for the upstream API.

use serde_json::{json, Value as JsonValue};

use flashpoint_core::defaults::{ASSET_ID_PARAM, IMAGE_CONTENT_TYPE, JSON_CONTENT_TYPE};
use flashpoint_core::{CorrelationKey, DateRange, FetchItem, HttpMethod, SessionConfig};

/// Source fields returned for every search hit.
pub const SOURCE_INCLUDES: &[&str] = &[
    "type",
    "value",
    "basetypes",
    "fpid",
    "sort_date",
    "breach",
    "domain",
    "affected_domain",
    "email",
    "password",
    "username",
    "is_fresh",
    "credential_record_fpid",
    "password_complexity",
    "ransomer.fpid",
    "ransomer.names",
    "container.fpid",
    "container.name",
    "container.title",
    "container.type",
    "container.native_id",
    "container.container.native_id",
    "container.container.title",
    "body.text/plain",
    "account_organization",
    "infected_host_attributes",
    "cookies",
    "email_domain",
    "prices",
    "site.title",
    "site.source_uri",
    "site_actor.native_id",
    "site_actor.names",
    "site_actor.username",
    "raw_href",
    "title",
    "base.title",
    "card_type",
    "bin",
    "source_uri",
    "attack_ids",
    "category",
    "geolocation",
    "media.caption",
    "media.file_name",
    "media.fpid",
    "media.media_type",
    "media.mime_type",
    "media.phash",
    "media.sha1",
    "media.size",
    "media_v2",
    "media.storage_uri",
    "enrichments.card-numbers.card-numbers.bin",
    "enrichments.v1.ip_addresses.ip_address",
    "enrichments.v1.email_addresses.email_address",
    "enrichments.v1.urls.domain",
    "enrichments.v1.monero_addresses.monero_address",
    "enrichments.v1.ethereum_addresses.ethereum_address",
    "enrichments.v1.bitcoin_addresses.bitcoin_address",
    "enrichments.v1.social_media.handle",
    "enrichments.v1.social_media.site",
];

/// Stored fields returned alongside `_source`.
pub const FIELDS: &[&str] = &[
    "enrichments",
    "body.text/html+sanitized",
    "body.text/plain",
    "user.names.handle",
    "site_actor.names.handle",
    "site_actor.names.aliases",
    "site_actor.fpid",
    "title",
    "container.fpid",
    "container.title",
    "container.container.title",
    "site.source_uri",
    "site.title",
    "native_id",
    "media_v2",
];

const CHAT_MESSAGES: &str = "+basetypes:((chat AND message))";

fn date_clause(range: &DateRange) -> String {
    format!("+sort_date:[{} TO {}]", range.start(), range.end())
}

/// Query string for a media search: chat messages with an analyzed image.
pub fn media_query(query: &str, range: &DateRange) -> String {
    format!(
        "+({}) {} {} +_exists_:media.storage_uri +_exists_:media.image_enrichment.enrichments.v1.image-analysis",
        query,
        date_clause(range),
        CHAT_MESSAGES
    )
}

/// Query string for a chat search.
pub fn chat_query(query: &str, range: &DateRange) -> String {
    format!("+({}) {} {}", query, date_clause(range), CHAT_MESSAGES)
}

/// Full search body for a composed query string.
pub fn search_payload(query: &str, limit: u32) -> JsonValue {
    json!({
        "collapse_field": "media.sha1.keyword",
        "from": 0,
        "track_total_hits": 10000,
        "traditional_query": true,
        "_source_includes": SOURCE_INCLUDES,
        "highlight": false,
        "fields": FIELDS,
        "sort": ["sort_date:desc"],
        "size": limit,
        "query": query,
    })
}

fn headers(config: &SessionConfig, content_type: &str) -> Vec<(String, String)> {
    vec![
        ("Authorization".to_string(), config.bearer()),
        ("Content-Type".to_string(), content_type.to_string()),
    ]
}

/// POST to the search endpoint.
pub fn search_item(
    config: &SessionConfig,
    key: CorrelationKey,
    query: &str,
    limit: u32,
) -> FetchItem {
    FetchItem::new(
        HttpMethod::Post,
        config.search_url(),
        key,
        search_payload(query, limit),
        headers(config, JSON_CONTENT_TYPE),
    )
}

/// GET one media asset by storage URI.
pub fn image_item(config: &SessionConfig, storage_uri: &str, key: CorrelationKey) -> FetchItem {
    FetchItem::new(
        HttpMethod::Get,
        config.media_assets_url.clone(),
        key,
        json!({ ASSET_ID_PARAM: storage_uri }),
        headers(config, IMAGE_CONTENT_TYPE),
    )
}
