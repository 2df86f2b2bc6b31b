/*
[INPUT]:  Identities, start time, sample count and interval
[OUTPUT]: Synthetic item values and the demo raw-history filter
[POS]:    Data layer - what the session script writes and filters on
[UPDATE]: When changing generated data or the filtered read condition
*/

use chrono::{DateTime, TimeDelta, Utc};
use historian_adapter::{Field, FilterExpr, Identity, ItemValue, Quality};

/// `samples` values per identity: `i * 10` at `start + i * interval`, good quality.
///
/// Generation for an identity stops at the first timestamp chrono cannot
/// represent; `ScriptConfig::validate` rejects such layouts up front.
pub fn generate_write_items(
    identities: &[Identity],
    start_time: DateTime<Utc>,
    samples: u32,
    interval: TimeDelta,
) -> Vec<ItemValue> {
    identities
        .iter()
        .flat_map(|identity| {
            (0..samples).map_while(move |index| {
                let offset = interval.checked_mul(i32::try_from(index).ok()?)?;
                let timestamp = start_time.checked_add_signed(offset)?;
                Some(ItemValue::new(
                    identity.path.as_str(),
                    i64::from(index) * 10,
                    Quality::GOOD,
                    timestamp,
                ))
            })
        })
        .collect()
}

/// Rows of any `...Item100` between 10 and 41, rows of `second` between 40
/// and 61, bad rows, and rows stamped exactly at `start_time`.
pub fn demo_filter(second: &Identity, start_time: DateTime<Utc>) -> FilterExpr {
    Field::Path
        .ends_with("Item100")
        .and(Field::Value.between(10, 41))
        .or(Field::Path.is(second.path.as_str()).and(Field::Value.between(40, 61)))
        .or(Field::QualityText.is("Bad"))
        .or(Field::Timestamp.is(start_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn generates_samples_per_identity() {
        let identities = [Identity::new("/a/DC4711"), Identity::new("/a/DC666")];
        let items = generate_write_items(&identities, start(), 7, TimeDelta::seconds(1));

        assert_eq!(items.len(), 14);
        assert_eq!(items[0].to_string(), "/a/DC4711 V:0 Q:0 T:2018-01-01T00:00:00.000Z");
        assert_eq!(items[6].to_string(), "/a/DC4711 V:60 Q:0 T:2018-01-01T00:00:06.000Z");
        assert_eq!(items[7].path, "/a/DC666");
        assert_eq!(items[7].timestamp, start());
    }

    #[test]
    fn generation_stops_at_the_end_of_time() {
        let identities = [Identity::new("/a/DC4711")];
        let interval = TimeDelta::days(365 * 100_000);
        let items = generate_write_items(&identities, start(), 10, interval);

        assert!(!items.is_empty());
        assert!(items.len() < 10);
        assert_eq!(items[0].timestamp, start());
        assert!(items.windows(2).all(|pair| pair[0].timestamp < pair[1].timestamp));
    }

    #[test]
    fn demo_filter_reads_like_the_condition() {
        let filter = demo_filter(&Identity::new("/a/DC666"), start());
        assert_eq!(
            filter.to_string(),
            "((path.ends_with(\"Item100\") && (value > 10 && value < 41)) \
             || (path == \"/a/DC666\" && (value > 40 && value < 61)) \
             || quality_text == \"Bad\" \
             || timestamp == \"2018-01-01T00:00:00.000Z\")"
        );
    }
}
