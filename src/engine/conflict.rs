use chrono::{NaiveDate, Utc};

use crate::limits::*;
use crate::model::{DateRange, VehicleState};

use super::BookingError;

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Shape and window checks on a requested range. Anything that fails here
/// never touches vehicle state.
pub(crate) fn validate_range(range: &DateRange, today: NaiveDate) -> Result<(), BookingError> {
    if range.start > range.end {
        return Err(BookingError::InvalidInterval("start after end"));
    }
    if range.start < today {
        return Err(BookingError::InvalidInterval("starts in the past"));
    }
    if range.days() > MAX_RESERVATION_DAYS {
        return Err(BookingError::InvalidInterval("range too long"));
    }
    if (range.start - today).num_days() > MAX_ADVANCE_DAYS {
        return Err(BookingError::InvalidInterval("starts too far ahead"));
    }
    Ok(())
}

/// Availability check. Must run under the vehicle's write guard so the
/// answer stays true through the subsequent commit.
pub(crate) fn check_no_conflict(vs: &VehicleState, range: &DateRange) -> Result<(), BookingError> {
    match vs.find_conflict(range) {
        Some(holder) => Err(BookingError::Conflict(holder)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn rel(today: NaiveDate, from: u64, to: u64) -> DateRange {
        DateRange {
            start: today + Days::new(from),
            end: today + Days::new(to),
        }
    }

    #[test]
    fn inverted_range_rejected() {
        let today = today();
        let range = DateRange {
            start: today + Days::new(5),
            end: today + Days::new(2),
        };
        assert!(matches!(
            validate_range(&range, today),
            Err(BookingError::InvalidInterval("start after end"))
        ));
    }

    #[test]
    fn past_start_rejected() {
        let today = today();
        let range = DateRange {
            start: today - Days::new(1),
            end: today + Days::new(2),
        };
        assert!(matches!(
            validate_range(&range, today),
            Err(BookingError::InvalidInterval("starts in the past"))
        ));
    }

    #[test]
    fn today_is_bookable() {
        let today = today();
        assert!(validate_range(&rel(today, 0, 3), today).is_ok());
    }

    #[test]
    fn overlong_range_rejected() {
        let today = today();
        let range = rel(today, 1, 1 + MAX_RESERVATION_DAYS as u64);
        assert!(matches!(
            validate_range(&range, today),
            Err(BookingError::InvalidInterval("range too long"))
        ));
    }

    #[test]
    fn too_far_ahead_rejected() {
        let today = today();
        let start = MAX_ADVANCE_DAYS as u64 + 1;
        let range = rel(today, start, start + 2);
        assert!(matches!(
            validate_range(&range, today),
            Err(BookingError::InvalidInterval("starts too far ahead"))
        ));
    }
}
