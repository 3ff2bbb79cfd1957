//! Human-readable slot labels for presentation layers.

use serde::Serialize;

use crate::slots::Slot;
use crate::timezone::{to_zone, ZoneId};

/// A slot rendered in the member's zone, and optionally the visitor's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotDisplay {
    /// `"09:00–09:30 Europe/Copenhagen"`
    pub primary: String,
    /// `"(03:00–03:30 America/New_York your time)"`, only when the visitor's
    /// zone differs from the member's.
    pub secondary: Option<String>,
}

fn span(slot: &Slot, zone: ZoneId) -> String {
    format!(
        "{}–{} {}",
        to_zone(slot.start, zone).format("%H:%M"),
        to_zone(slot.end, zone).format("%H:%M"),
        zone
    )
}

/// Format `slot` for display.
///
/// # Example
///
/// ```
/// use booking_engine::{convert_for_display, Slot, ZoneId};
/// use chrono::{TimeZone, Utc};
///
/// let slot = Slot::new(
///     Utc.with_ymd_and_hms(2025, 6, 2, 7, 0, 0).unwrap(),
///     Utc.with_ymd_and_hms(2025, 6, 2, 7, 30, 0).unwrap(),
/// )
/// .unwrap();
/// let member = ZoneId::parse("Europe/Copenhagen").unwrap();
/// let visitor = ZoneId::parse("America/New_York").unwrap();
///
/// let shown = convert_for_display(&slot, member, Some(visitor));
/// assert_eq!(shown.primary, "09:00–09:30 Europe/Copenhagen");
/// assert_eq!(
///     shown.secondary.as_deref(),
///     Some("(03:00–03:30 America/New_York your time)")
/// );
/// ```
pub fn convert_for_display(
    slot: &Slot,
    member_zone: ZoneId,
    visitor_zone: Option<ZoneId>,
) -> SlotDisplay {
    SlotDisplay {
        primary: span(slot, member_zone),
        secondary: visitor_zone
            .filter(|v| *v != member_zone)
            .map(|v| format!("({} your time)", span(slot, v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn slot(h: u32, m: u32) -> Slot {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap();
        Slot::new(start, start + chrono::Duration::minutes(30)).unwrap()
    }

    fn zone(name: &str) -> ZoneId {
        ZoneId::parse(name).unwrap()
    }

    #[test]
    fn test_same_zone_has_no_secondary() {
        let cph = zone("Europe/Copenhagen");
        let shown = convert_for_display(&slot(7, 0), cph, Some(cph));
        assert_eq!(shown.primary, "09:00–09:30 Europe/Copenhagen");
        assert_eq!(shown.secondary, None);
    }

    #[test]
    fn test_without_visitor() {
        let shown = convert_for_display(&slot(13, 30), zone("Asia/Kolkata"), None);
        assert_eq!(shown.primary, "19:00–19:30 Asia/Kolkata");
        assert!(shown.secondary.is_none());
    }

    #[test]
    fn test_crosses_midnight_for_visitor() {
        let shown = convert_for_display(
            &slot(23, 45),
            ZoneId::UTC,
            Some(zone("Asia/Tokyo")),
        );
        assert_eq!(shown.primary, "23:45–00:15 UTC");
        assert_eq!(
            shown.secondary.as_deref(),
            Some("(08:45–09:15 Asia/Tokyo your time)")
        );
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let s = slot(7, 0);
        let member = zone("Europe/Copenhagen");
        let visitor = Some(zone("America/New_York"));
        assert_eq!(
            convert_for_display(&s, member, visitor),
            convert_for_display(&s, member, visitor)
        );
    }
}
