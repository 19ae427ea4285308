// 🌍 Timezone Layer
// Zone id normalization, IANA resolution, civil-time conversion and
// coordinate → zone lookup used at import time.

use crate::error::{Result, TransactionError};
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use tzf_rs::DefaultFinder;

/// Prefix of the POSIX-style fixed offset zones whose sign reads backwards
/// (`Etc/GMT+5` is five hours *behind* UTC).
const ETC_GMT_PREFIX: &str = "Etc/GMT";

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Map a stored zone id to the id handed to the zone database.
///
/// `Etc/GMT±N` ids get their sign swapped exactly once so that the label
/// resolves to the offset it reads as. Every other id passes through as-is.
pub fn normalize_zone_id(zone_id: &str) -> String {
    if !zone_id.starts_with(ETC_GMT_PREFIX) {
        return zone_id.to_string();
    }

    // Per-char swap, so a '+' turned into '-' is never swapped back.
    zone_id
        .chars()
        .map(|c| match c {
            '+' => '-',
            '-' => '+',
            other => other,
        })
        .collect()
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Resolve a caller-supplied IANA id as written.
pub fn resolve_zone(zone_id: &str) -> Result<Tz> {
    let trimmed = zone_id.trim();
    if trimmed.is_empty() {
        return Err(TransactionError::zone(zone_id));
    }

    trimmed
        .parse::<Tz>()
        .map_err(|_| TransactionError::zone(zone_id))
}

/// Resolve the zone id stored on a transaction (normalized first).
pub fn resolve_stored_zone(zone_id: &str) -> Result<Tz> {
    resolve_zone(&normalize_zone_id(zone_id))
}

// ============================================================================
// CONVERSION
// ============================================================================

/// Pin a naive civil time in `zone` to an absolute instant.
///
/// Fold (repeated hour): the earlier instant wins.
/// Gap (skipped hour): the pre-transition offset is applied, which moves the
/// time forward by the length of the gap.
pub fn to_instant(local: NaiveDateTime, zone: &Tz) -> DateTime<Utc> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // A day earlier is safely before the transition for any real zone.
            let before = zone.offset_from_utc_datetime(&(local - Duration::days(1))).fix();
            let utc = local - Duration::seconds(i64::from(before.local_minus_utc()));
            Utc.from_utc_datetime(&utc)
        }
    }
}

/// Re-express civil time `local` in `source` as civil time in `target`.
pub fn convert_local_time(local: NaiveDateTime, source: &Tz, target: &Tz) -> NaiveDateTime {
    to_instant(local, source).with_timezone(target).naive_local()
}

// ============================================================================
// COORDINATE LOOKUP
// ============================================================================

/// Coordinates → IANA zone id. Called once per imported row.
pub trait TimezoneLookup: Send + Sync {
    fn resolve(&self, latitude: f64, longitude: f64) -> Result<String>;
}

/// Offline lookup backed by the tzf polygon data set.
pub struct GeoTimezoneLookup {
    finder: DefaultFinder,
}

impl GeoTimezoneLookup {
    pub fn new() -> Self {
        GeoTimezoneLookup {
            finder: DefaultFinder::new(),
        }
    }
}

impl Default for GeoTimezoneLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl TimezoneLookup for GeoTimezoneLookup {
    fn resolve(&self, latitude: f64, longitude: f64) -> Result<String> {
        let name = self.finder.get_tz_name(longitude, latitude);
        if name.is_empty() {
            return Err(TransactionError::zone(format!("{},{}", latitude, longitude)));
        }
        Ok(name.to_string())
    }
}
