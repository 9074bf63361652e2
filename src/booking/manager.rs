use chrono::NaiveDate;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::forms::BookingForm;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub confirmation_number: String,
    pub status: BookingStatus,
    pub created_at: String,
    pub is_suspicious: bool,
    #[serde(skip)]
    pub site_id: String,
    #[serde(skip)]
    pub form: BookingForm,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BookingError {
    #[error("Booking not found.")]
    NotFound,
    #[error("Booking already processed.")]
    AlreadyProcessed,
    #[error("Booking already cancelled.")]
    AlreadyCancelled,
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

/// `BK-<base36 millis>-<6 random base36>`, upper-cased.
pub fn generate_confirmation_number() -> String {
    format!("BK-{}-{}", to_base36(now_millis()), random_base36(6)).to_uppercase()
}

fn generate_booking_id() -> String {
    format!("booking_{}_{}", now_millis(), random_base36(7))
}

/// In-process booking book. Bookings live as long as the process and are
/// only visible to the site that created them.
#[derive(Default)]
pub struct BookingManager {
    bookings: Mutex<HashMap<String, Booking>>,
}

impl BookingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, site_id: &str, form: BookingForm, is_suspicious: bool) -> Booking {
        let booking = Booking {
            id: generate_booking_id(),
            confirmation_number: generate_confirmation_number(),
            status: BookingStatus::Pending,
            created_at: chrono::Utc::now().to_rfc3339(),
            is_suspicious,
            site_id: site_id.to_string(),
            form,
        };
        self.bookings
            .lock()
            .insert(booking.id.clone(), booking.clone());
        booking
    }

    pub fn get(&self, site_id: &str, id: &str) -> Option<Booking> {
        self.bookings
            .lock()
            .get(id)
            .filter(|b| b.site_id == site_id)
            .cloned()
    }

    /// Only a pending booking can be confirmed.
    pub fn confirm(&self, site_id: &str, id: &str) -> Result<Booking, BookingError> {
        self.transition(site_id, id, |booking| {
            if booking.status != BookingStatus::Pending {
                return Err(BookingError::AlreadyProcessed);
            }
            booking.status = BookingStatus::Confirmed;
            Ok(())
        })
    }

    pub fn cancel(&self, site_id: &str, id: &str) -> Result<Booking, BookingError> {
        self.transition(site_id, id, |booking| {
            if booking.status == BookingStatus::Cancelled {
                return Err(BookingError::AlreadyCancelled);
            }
            booking.status = BookingStatus::Cancelled;
            Ok(())
        })
    }

    fn transition<F>(&self, site_id: &str, id: &str, apply: F) -> Result<Booking, BookingError>
    where
        F: FnOnce(&mut Booking) -> Result<(), BookingError>,
    {
        let mut bookings = self.bookings.lock();
        let booking = bookings
            .get_mut(id)
            .filter(|b| b.site_id == site_id)
            .ok_or(BookingError::NotFound)?;
        apply(booking)?;
        Ok(booking.clone())
    }
}

/// `Tuesday, March 10, 2026`
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_number_shape() {
        let number = generate_confirmation_number();
        let parts: Vec<_> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "BK");
        assert_eq!(parts[2].len(), 6);
        assert!(number
            .chars()
            .all(|c| c == '-' || c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn base36_encodes() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn confirm_then_cancel_lifecycle() {
        let manager = BookingManager::new();
        let booking = manager.create("salon", BookingForm::default(), false);

        assert_eq!(manager.confirm("salon", &booking.id).unwrap().status, BookingStatus::Confirmed);
        assert_eq!(manager.confirm("salon", &booking.id).unwrap_err(), BookingError::AlreadyProcessed);

        assert_eq!(manager.cancel("salon", &booking.id).unwrap().status, BookingStatus::Cancelled);
        assert_eq!(manager.cancel("salon", &booking.id).unwrap_err(), BookingError::AlreadyCancelled);
        assert_eq!(manager.confirm("salon", &booking.id).unwrap_err(), BookingError::AlreadyProcessed);
    }

    #[test]
    fn bookings_are_invisible_to_other_sites() {
        let manager = BookingManager::new();
        let booking = manager.create("salon", BookingForm::default(), false);

        assert!(manager.get("plumber", &booking.id).is_none());
        assert_eq!(manager.confirm("plumber", &booking.id).unwrap_err(), BookingError::NotFound);
        assert_eq!(manager.cancel("plumber", &booking.id).unwrap_err(), BookingError::NotFound);
        assert_eq!(manager.get("salon", &booking.id).unwrap().status, BookingStatus::Pending);
    }

    #[test]
    fn unknown_booking_is_not_found() {
        let manager = BookingManager::new();
        assert_eq!(manager.confirm("salon", "nope").unwrap_err(), BookingError::NotFound);
        assert_eq!(manager.cancel("salon", "nope").unwrap_err(), BookingError::NotFound);
        assert!(manager.get("salon", "nope").is_none());
    }

    #[test]
    fn long_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert_eq!(format_long_date(date), "Tuesday, March 10, 2026");
    }
}
