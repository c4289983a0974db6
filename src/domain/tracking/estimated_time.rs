use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::TrackingError;
use super::value_objects::{ItemCategory, LineItem, OrderStatus};

// ============================================================================
// Estimated Preparation Time
// ============================================================================
//
// Estimates are whole minutes rendered as HH:MM:SS. Hours are never capped,
// so a large order renders as "01:55:00" or "166:55:00" rather than wrapping.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EstimatedTime {
    total_seconds: u64,
}

impl EstimatedTime {
    pub const fn from_minutes(minutes: u64) -> Self {
        Self {
            total_seconds: minutes * 60,
        }
    }

    pub const fn from_seconds(total_seconds: u64) -> Self {
        Self { total_seconds }
    }

    pub const fn total_minutes(&self) -> u64 {
        self.total_seconds / 60
    }

    pub const fn as_duration(&self) -> Duration {
        Duration::from_secs(self.total_seconds)
    }
}

impl fmt::Display for EstimatedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.total_seconds / 3600;
        let minutes = (self.total_seconds % 3600) / 60;
        let seconds = self.total_seconds % 60;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
    }
}

impl FromStr for EstimatedTime {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TrackingError::InvalidEstimatedTime(s.to_string());

        let parts: Vec<&str> = s.trim().split(':').collect();
        let [hours, minutes, seconds] = parts.as_slice() else {
            return Err(invalid());
        };

        let hours: u64 = hours.parse().map_err(|_| invalid())?;
        let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
        let seconds: u64 = seconds.parse().map_err(|_| invalid())?;

        if minutes >= 60 || seconds >= 60 {
            return Err(invalid());
        }

        Ok(Self::from_seconds(hours * 3600 + minutes * 60 + seconds))
    }
}

impl Serialize for EstimatedTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EstimatedTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Calculator
// ============================================================================

pub struct EstimatedTimeCalculator;

impl EstimatedTimeCalculator {
    pub const BASE_MINUTES: u64 = 15;

    /// Remaining time for an order sitting in `status`.
    pub const fn status_minutes(status: OrderStatus) -> u64 {
        match status {
            OrderStatus::Received => 5,
            OrderStatus::InPreparation => 15,
            OrderStatus::Ready => 10,
            OrderStatus::Completed => 0,
        }
    }

    /// Minutes added per unit of an item. Unknown categories are priced like
    /// desserts.
    pub const fn minutes_per_unit(category: ItemCategory) -> u64 {
        match category {
            ItemCategory::Lanche => 5,
            ItemCategory::Acompanhamento => 2,
            ItemCategory::Bebida => 1,
            ItemCategory::Sobremesa => 3,
            ItemCategory::Unknown => 3,
        }
    }

    pub fn by_status(status: OrderStatus) -> EstimatedTime {
        EstimatedTime::from_minutes(Self::status_minutes(status))
    }

    /// Preparation estimate for a fresh order. An empty slice yields the base
    /// time alone.
    pub fn by_items(items: &[LineItem]) -> EstimatedTime {
        let additional: u64 = items
            .iter()
            .map(|item| Self::minutes_per_unit(item.item_category()) * u64::from(item.quantity()))
            .sum();

        EstimatedTime::from_minutes(Self::BASE_MINUTES + additional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(category: &str, quantity: i64) -> LineItem {
        LineItem::new(1, quantity, Some(category.to_string())).unwrap()
    }

    #[test]
    fn test_empty_order_gets_base_time() {
        assert_eq!(EstimatedTimeCalculator::by_items(&[]).to_string(), "00:15:00");
    }

    #[test]
    fn test_snacks_and_drink_fixture() {
        let items = vec![item("LANCHE", 2), item("BEBIDA", 1)];
        assert_eq!(EstimatedTimeCalculator::by_items(&items).to_string(), "00:26:00");
    }

    #[test]
    fn test_unknown_category_uses_default_rate() {
        let items = vec![item("FOO", 3)];
        assert_eq!(EstimatedTimeCalculator::by_items(&items).to_string(), "00:24:00");

        let uncategorized = vec![LineItem::new(4, 2, None).unwrap()];
        assert_eq!(
            EstimatedTimeCalculator::by_items(&uncategorized).to_string(),
            "00:21:00"
        );
    }

    #[test]
    fn test_every_category_rate() {
        let items = vec![
            item("lanche", 1),
            item("Acompanhamento", 1),
            item("bebida", 1),
            item("SOBREMESA", 1),
        ];
        // 15 + 5 + 2 + 1 + 3
        assert_eq!(EstimatedTimeCalculator::by_items(&items).total_minutes(), 26);
    }

    #[test]
    fn test_hours_roll_over_without_cap() {
        let items = vec![item("LANCHE", 20)];
        assert_eq!(EstimatedTimeCalculator::by_items(&items).to_string(), "01:55:00");

        let huge = vec![item("LANCHE", 2000)];
        assert_eq!(EstimatedTimeCalculator::by_items(&huge).to_string(), "166:55:00");
    }

    #[test]
    fn test_estimate_by_status() {
        assert_eq!(EstimatedTimeCalculator::by_status(OrderStatus::Received).to_string(), "00:05:00");
        assert_eq!(
            EstimatedTimeCalculator::by_status(OrderStatus::InPreparation).to_string(),
            "00:15:00"
        );
        assert_eq!(EstimatedTimeCalculator::by_status(OrderStatus::Ready).to_string(), "00:10:00");
        assert_eq!(EstimatedTimeCalculator::by_status(OrderStatus::Completed).to_string(), "00:00:00");
    }

    #[test]
    fn test_parse_and_render_round_trip() {
        let parsed: EstimatedTime = "00:20:30".parse().unwrap();
        assert_eq!(parsed.as_duration(), Duration::from_secs(20 * 60 + 30));
        assert_eq!(parsed.to_string(), "00:20:30");

        assert!("20 minutes".parse::<EstimatedTime>().is_err());
        assert!("00:61:00".parse::<EstimatedTime>().is_err());
        assert!("00:20".parse::<EstimatedTime>().is_err());
    }
}
