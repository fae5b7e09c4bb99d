//! Source event types.
//!
//! A [`SourceEvent`] is one tweet as delivered by the stream. The struct
//! deserializes from the Twitter v1.1 JSON shape; attributes the typed model
//! does not name are kept in [`SourceEvent::extra`] so they can still be
//! mapped generically.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inbound tweet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Tweet identifier.
    pub id: i64,
    /// Raw text body.
    #[serde(default, alias = "full_text")]
    pub text: String,
    /// Author of the tweet.
    #[serde(default)]
    pub user: User,
    /// Creation time.
    #[serde(default, with = "twitter_date")]
    pub created_at: DateTime<Utc>,
    /// Ids of users who contributed to the tweet.
    #[serde(default, deserialize_with = "contributor_ids")]
    pub contributors: Vec<i64>,
    /// Exact coordinates, when the author shared them.
    #[serde(default, rename = "coordinates")]
    pub geo_location: Option<GeoLocation>,
    /// Place the tweet is associated with.
    #[serde(default)]
    pub place: Option<Place>,
    /// Hashtags, mentions and links found in the text.
    #[serde(default)]
    pub entities: Option<Entities>,
    #[serde(default)]
    pub in_reply_to_screen_name: Option<String>,
    #[serde(default)]
    pub in_reply_to_status_id: Option<i64>,
    #[serde(default)]
    pub in_reply_to_user_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub retweet_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorite_count: i64,
    /// Client used to post the tweet.
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorited: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub possibly_sensitive: bool,
    /// Set when the viewing account retweeted this tweet.
    #[serde(default, deserialize_with = "null_as_default")]
    pub retweeted: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub truncated: bool,
    /// The original tweet when this one is a retweet.
    #[serde(default)]
    pub retweeted_status: Option<Box<SourceEvent>>,
    /// Attributes not covered by the typed fields above.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SourceEvent {
    /// Create an event with the given id, text and author handle.
    pub fn new(id: i64, text: impl Into<String>, screen_name: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            user: User {
                screen_name: screen_name.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Whether this event is a retweet of another tweet.
    pub fn is_retweet(&self) -> bool {
        self.retweeted_status.is_some()
    }
}

/// Tweet author.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub screen_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub followers_count: Option<i64>,
}

/// A point on the globe.
///
/// On the wire this is a GeoJSON point, `{"type": "Point", "coordinates":
/// [longitude, latitude]}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "GeoPoint", into = "GeoPoint")]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Deserialize)]
struct GeoPoint {
    #[serde(rename = "type", default = "point_type")]
    kind: String,
    coordinates: [f64; 2],
}

fn point_type() -> String {
    "Point".to_string()
}

impl From<GeoPoint> for GeoLocation {
    fn from(point: GeoPoint) -> Self {
        Self {
            longitude: point.coordinates[0],
            latitude: point.coordinates[1],
        }
    }
}

impl From<GeoLocation> for GeoPoint {
    fn from(location: GeoLocation) -> Self {
        Self {
            kind: point_type(),
            coordinates: [location.longitude, location.latitude],
        }
    }
}

/// A named place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Place {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub place_type: Option<String>,
    #[serde(default)]
    pub attributes: PlaceAttributes,
}

impl Place {
    pub fn street_address(&self) -> Option<&str> {
        self.attributes.street_address.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceAttributes {
    #[serde(default)]
    pub street_address: Option<String>,
}

/// Entities extracted from the tweet text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub hashtags: Vec<Hashtag>,
    #[serde(default)]
    pub user_mentions: Vec<UserMention>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hashtag {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMention {
    pub screen_name: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// v1.1 sends contributors as `{id, id_str, screen_name}` objects; bare ids
/// are accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum Contributor {
    Id(i64),
    User { id: i64 },
}

fn contributor_ids<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let contributors: Option<Vec<Contributor>> = Option::deserialize(deserializer)?;
    Ok(contributors
        .unwrap_or_default()
        .into_iter()
        .map(|contributor| match contributor {
            Contributor::Id(id) | Contributor::User { id } => id,
        })
        .collect())
}

/// Twitter's `created_at` format (`Wed Oct 10 20:19:24 +0000 2018`), with
/// RFC 3339 accepted as well.
mod twitter_date {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_str(&raw, FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(&raw))
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
