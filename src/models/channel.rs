//! Supported booking channels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One external booking platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Airbnb,
    Vrbo,
    Booking,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Airbnb, Channel::Vrbo, Channel::Booking];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Airbnb => "airbnb",
            Self::Vrbo => "vrbo",
            Self::Booking => "booking",
        }
    }

    /// Human-facing platform name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Airbnb => "Airbnb",
            Self::Vrbo => "Vrbo",
            Self::Booking => "Booking.com",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "airbnb" => Ok(Self::Airbnb),
            "vrbo" | "homeaway" => Ok(Self::Vrbo),
            "booking" | "booking.com" | "bookingcom" => Ok(Self::Booking),
            other => Err(format!("unknown channel: {}", other)),
        }
    }
}
