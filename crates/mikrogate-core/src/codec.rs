// ── Comment metadata codec ──
//
// The device has no native concept of price, expiry, or batch
// membership, so that metadata is embedded in each object's single
// free-text comment field. The format is versioned by a leading system
// tag so legacy untagged comments are distinguishable from ours:
//
//   MGATE1|<object_type>|<price_sell>|<first_login>|<valid_until>|<batch_id>
//
// Timestamps are decimal epoch seconds; an empty field means "not set"
// (for valid_until: never expires). The trailing batch field is
// optional on decode so five-field comments from older writers still
// parse as V1. Decoding NEVER fails -- malformed input yields a partial
// record that callers treat as "needs migration".

use chrono::{DateTime, Utc};
use strum::{Display, EnumString};

/// Leading marker identifying a comment as ours.
pub const SYSTEM_TAG: &str = "MGATE1";

/// Comment format version. `Legacy` is any comment without our tag,
/// including empty ones -- format version 0, scheduled for migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatVersion {
    Legacy,
    #[default]
    V1,
}

/// Business classification of the object carried in the comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ObjectClass {
    /// Prepaid hotspot voucher.
    Voucher,
    /// Recurring PPPoE member account.
    Member,
}

/// Decoded form of a device object's comment field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataRecord {
    pub version: FormatVersion,
    pub object_type: Option<ObjectClass>,
    /// Sell price in minor currency units.
    pub price_sell: Option<u64>,
    /// When the subscriber first logged in. `None` = not yet used.
    pub first_login: Option<DateTime<Utc>>,
    /// Expiry. `None` = never expires.
    pub valid_until: Option<DateTime<Utc>>,
    pub batch_id: Option<String>,
    /// Original text of a legacy comment, preserved for audit.
    pub legacy_text: Option<String>,
}

impl MetadataRecord {
    /// `true` for comments that predate the tagged format and must be
    /// migrated by recreating the object.
    pub fn needs_migration(&self) -> bool {
        self.version == FormatVersion::Legacy
    }
}

/// Encode a record into the current (V1) comment format.
///
/// Deterministic: the same record always produces the same string.
/// `legacy_text` and `version` are ignored -- encoding always writes
/// the current format.
pub fn encode(record: &MetadataRecord) -> String {
    format!(
        "{SYSTEM_TAG}|{}|{}|{}|{}|{}",
        record.object_type.map(|t| t.to_string()).unwrap_or_default(),
        record.price_sell.map(|p| p.to_string()).unwrap_or_default(),
        record.first_login.map(|t| t.timestamp().to_string()).unwrap_or_default(),
        record.valid_until.map(|t| t.timestamp().to_string()).unwrap_or_default(),
        record.batch_id.as_deref().unwrap_or_default(),
    )
}

/// Decode a comment field. Never fails: anything without the system tag
/// comes back as a `Legacy` record with the raw text preserved, and
/// unparseable fields inside a tagged comment decode to `None`.
pub fn decode(comment: &str) -> MetadataRecord {
    let Some(rest) = comment.strip_prefix(SYSTEM_TAG).and_then(|r| r.strip_prefix('|')) else {
        return MetadataRecord {
            version: FormatVersion::Legacy,
            legacy_text: (!comment.is_empty()).then(|| comment.to_owned()),
            ..MetadataRecord::default()
        };
    };

    let mut fields = rest.split('|');
    let object_type = fields.next().and_then(|f| f.parse().ok());
    let price_sell = fields.next().and_then(|f| f.parse().ok());
    let first_login = fields.next().and_then(parse_epoch);
    let valid_until = fields.next().and_then(parse_epoch);
    let batch_id = fields
        .next()
        .filter(|f| !f.is_empty())
        .map(ToOwned::to_owned);

    MetadataRecord {
        version: FormatVersion::V1,
        object_type,
        price_sell,
        first_login,
        valid_until,
        batch_id,
        legacy_text: None,
    }
}

fn parse_epoch(field: &str) -> Option<DateTime<Utc>> {
    field.parse::<i64>().ok().and_then(|s| DateTime::from_timestamp(s, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MetadataRecord {
        MetadataRecord {
            version: FormatVersion::V1,
            object_type: Some(ObjectClass::Voucher),
            price_sell: Some(10_000),
            first_login: DateTime::from_timestamp(1_700_000_000, 0),
            valid_until: DateTime::from_timestamp(1_700_086_400, 0),
            batch_id: Some("b-42".into()),
            legacy_text: None,
        }
    }

    #[test]
    fn encode_produces_tagged_pipe_format() {
        assert_eq!(
            encode(&record()),
            "MGATE1|voucher|10000|1700000000|1700086400|b-42"
        );
    }

    #[test]
    fn round_trip_preserves_all_fields() {
        let r = record();
        assert_eq!(decode(&encode(&r)), r);
    }

    #[test]
    fn empty_timestamp_fields_mean_not_set() {
        let decoded = decode("MGATE1|member|50000|||");
        assert_eq!(decoded.version, FormatVersion::V1);
        assert_eq!(decoded.object_type, Some(ObjectClass::Member));
        assert_eq!(decoded.price_sell, Some(50_000));
        assert_eq!(decoded.first_login, None);
        assert_eq!(decoded.valid_until, None);
        assert_eq!(decoded.batch_id, None);
        assert!(!decoded.needs_migration());
    }

    #[test]
    fn five_field_comment_from_older_writer_still_decodes() {
        let decoded = decode("MGATE1|voucher|2500|1700000000|1700086400");
        assert_eq!(decoded.version, FormatVersion::V1);
        assert_eq!(decoded.price_sell, Some(2500));
        assert_eq!(decoded.batch_id, None);
    }

    #[test]
    fn untagged_comment_is_legacy_and_preserved() {
        let decoded = decode("3 day voucher Rp10.000 exp 2023-01-05");
        assert_eq!(decoded.version, FormatVersion::Legacy);
        assert!(decoded.needs_migration());
        assert_eq!(
            decoded.legacy_text.as_deref(),
            Some("3 day voucher Rp10.000 exp 2023-01-05")
        );
        assert_eq!(decoded.price_sell, None);
    }

    #[test]
    fn empty_comment_is_legacy_without_text() {
        let decoded = decode("");
        assert!(decoded.needs_migration());
        assert_eq!(decoded.legacy_text, None);
    }

    #[test]
    fn malformed_tagged_fields_decode_to_none_without_panicking() {
        let decoded = decode("MGATE1|rocket|not-a-price|later||");
        assert_eq!(decoded.version, FormatVersion::V1);
        assert_eq!(decoded.object_type, None);
        assert_eq!(decoded.price_sell, None);
        assert_eq!(decoded.first_login, None);
    }

    #[test]
    fn decode_is_total_over_arbitrary_junk() {
        for junk in ["|||||", "MGATE1", "MGATE1|", "\u{0}\u{1}", "🙂🙂", "a|b|c|d|e|f|g"] {
            let _ = decode(junk);
        }
    }
}
