//! Order status as reported by the backend.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle status of an order.
///
/// The backend sends PascalCase strings. Unknown values are kept verbatim so
/// a new backend status still renders instead of failing the orders page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Other(String),
}

impl OrderStatus {
    /// Parse a backend status string.
    #[must_use]
    pub fn from_backend(raw: &str) -> Self {
        match raw {
            "Pending" => Self::Pending,
            "Paid" => Self::Paid,
            "Processing" => Self::Processing,
            "Shipped" => Self::Shipped,
            "Delivered" => Self::Delivered,
            "Cancelled" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }

    /// The backend spelling of this status.
    #[must_use]
    pub fn as_backend_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Other(raw) => raw,
        }
    }

    /// Customer-facing label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Pending => "Chờ xử lý",
            Self::Paid => "Đã thanh toán",
            Self::Processing => "Đang xử lý",
            Self::Shipped => "Đã giao hàng",
            Self::Delivered => "Đã nhận hàng",
            Self::Cancelled => "Đã hủy",
            Self::Other(raw) => raw,
        }
    }

    /// CSS modifier for the status badge.
    #[must_use]
    pub const fn badge_class(&self) -> &'static str {
        match self {
            Self::Pending => "badge--pending",
            Self::Paid => "badge--paid",
            Self::Processing => "badge--processing",
            Self::Shipped => "badge--shipped",
            Self::Delivered | Self::Other(_) => "badge--neutral",
            Self::Cancelled => "badge--cancelled",
        }
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_backend_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_backend(&raw))
    }
}
