//! Catalog record and its TSV row form

use std::fmt::Write as _;

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer};

/// Wire format of `general_firstup` / `general_lastup`
const API_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One catalog entry, as selected by [`crate::api::FIELD_SELECTOR`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    /// Stable catalog key (`ncode`), the dedup key
    #[serde(rename = "ncode")]
    pub id: String,
    #[serde(rename = "userid")]
    pub owner_id: i64,
    #[serde(rename = "genre")]
    pub category: i64,
    #[serde(rename = "general_firstup", deserialize_with = "de_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "general_lastup", deserialize_with = "de_timestamp")]
    pub last_updated_at: DateTime<Utc>,
    #[serde(rename = "noveltype")]
    pub kind: i64,
    #[serde(rename = "end")]
    pub completion_flag: i64,
    #[serde(rename = "general_all_no")]
    pub part_count: i64,
    #[serde(rename = "length")]
    pub size_class: i64,
    #[serde(rename = "istensei")]
    pub flag_a: i64,
    #[serde(rename = "istenni")]
    pub flag_b: i64,
    #[serde(rename = "global_point")]
    pub popularity_score: i64,
    #[serde(rename = "fav_novel_cnt")]
    pub favorite_count: i64,
    #[serde(rename = "impression_cnt")]
    pub comment_count: i64,
    #[serde(rename = "review_cnt")]
    pub review_count: i64,
    #[serde(rename = "all_point")]
    pub rating_score: i64,
    #[serde(rename = "all_hyoka_cnt")]
    pub rating_vote_count: i64,
}

/// Zone-less API timestamps are taken as UTC; the cursor correction
/// accounts for the real offset.
fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(&s, API_TIMESTAMP_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {s:?}: {e}")))
}

/// `Y-MM-DD HH:mm` in UTC; the year is not padded.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    format!(
        "{}-{:02}-{:02} {:02}:{:02}",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute()
    )
}

impl Record {
    /// Tab-separated row without terminator.
    ///
    /// Column order: id, owner, category, created, last updated, kind,
    /// completion, parts, size class, flag a, flag b, then the six metrics.
    pub fn to_row(&self) -> String {
        let mut row = String::with_capacity(128);
        row.push_str(&self.id);
        // write! to a String is infallible
        let _ = write!(
            row,
            "\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.owner_id,
            self.category,
            format_timestamp(&self.created_at),
            format_timestamp(&self.last_updated_at),
            self.kind,
            self.completion_flag,
            self.part_count,
            self.size_class,
            self.flag_a,
            self.flag_b,
            self.popularity_score,
            self.favorite_count,
            self.comment_count,
            self.review_count,
            self.rating_score,
            self.rating_vote_count,
        );
        row
    }
}

#[cfg(test)]
pub(crate) fn sample(id: &str, last_updated_at: DateTime<Utc>) -> Record {
    Record {
        id: id.to_string(),
        owner_id: 1,
        category: 201,
        created_at: last_updated_at,
        last_updated_at,
        kind: 1,
        completion_flag: 0,
        part_count: 3,
        size_class: 12_000,
        flag_a: 0,
        flag_b: 1,
        popularity_score: 10,
        favorite_count: 2,
        comment_count: 0,
        review_count: 0,
        rating_score: 6,
        rating_vote_count: 1,
    }
}
