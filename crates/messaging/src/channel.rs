//! Named outbound channels, one per backend entity type.

use std::str::FromStr;

use crate::MessagingError;

/// Suffix appended to a channel name for its dead-letter channel.
pub const DEAD_LETTER_SUFFIX: &str = ".dlq";

/// The three event channels of the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Products,
    Recommendations,
    Reviews,
}

impl Channel {
    /// All channels, in dispatch order.
    pub const ALL: [Channel; 3] = [Channel::Products, Channel::Recommendations, Channel::Reviews];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Products => "products",
            Channel::Recommendations => "recommendations",
            Channel::Reviews => "reviews",
        }
    }

    pub fn dead_letter(&self) -> String {
        dead_letter_channel(self.as_str())
    }
}

/// Name of the dead-letter channel for `channel`.
pub fn dead_letter_channel(channel: &str) -> String {
    format!("{channel}{DEAD_LETTER_SUFFIX}")
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| MessagingError::UnknownChannel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
        assert!(matches!(
            "orders".parse::<Channel>(),
            Err(MessagingError::UnknownChannel(_))
        ));
    }

    #[test]
    fn dead_letter_names() {
        assert_eq!(Channel::Reviews.dead_letter(), "reviews.dlq");
        assert_eq!(dead_letter_channel("x"), "x.dlq");
    }
}
