//! Subscription Channel Types
//!
//! Deribit names its public order book topics as dot separated strings:
//!
//! - `book.{instrument}.{interval}` (e.g. `book.BTC-PERPETUAL.100ms`)
//! - `book.{instrument}.{group}.{depth}.{interval}` for grouped books
//!
//! Instrument names are passed through untouched. A malformed instrument
//! produces a channel the venue rejects or ignores; nothing is validated
//! locally.

use std::fmt;

mod request;

pub use request::{
    JsonRpcRequest, SUBSCRIBE_METHOD, SUBSCRIBE_REQUEST_ID, SubscribeParams, SubscribeRequest,
};

// =============================================================================
// Constants
// =============================================================================

/// Topic prefix for order book channels.
pub const BOOK_CHANNEL_PREFIX: &str = "book";

/// Default update cadence.
pub const DEFAULT_INTERVAL: &str = "100ms";

// =============================================================================
// Types
// =============================================================================

/// An instrument identifier (e.g. `BTC-PERPETUAL`, `ETH-27DEC24-3000-C`).
pub type Instrument = String;

/// Price grouping and depth for the grouped book channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookGrouping {
    /// Price grouping (`none`, `1`, `2`, `5`, `10`, ...).
    pub group: String,
    /// Number of price levels.
    pub depth: u32,
}

/// Shape of the order book channel to subscribe to.
///
/// The instrument is supplied separately so one value can name the channel
/// for any instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookChannel {
    /// Update cadence suffix (`raw`, `100ms`, `agg2`).
    pub interval: String,
    /// Optional grouping; plain book channel when absent.
    pub grouping: Option<BookGrouping>,
}

impl Default for BookChannel {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL.to_string(),
            grouping: None,
        }
    }
}

impl BookChannel {
    /// Create a plain book channel with the given cadence.
    #[must_use]
    pub fn new(interval: impl Into<String>) -> Self {
        Self {
            interval: interval.into(),
            grouping: None,
        }
    }

    /// Use the grouped book channel.
    #[must_use]
    pub fn with_grouping(mut self, group: impl Into<String>, depth: u32) -> Self {
        self.grouping = Some(BookGrouping {
            group: group.into(),
            depth,
        });
        self
    }

    /// Build the channel name for an instrument.
    #[must_use]
    pub fn channel_for(&self, instrument: &str) -> String {
        match &self.grouping {
            None => format!("{BOOK_CHANNEL_PREFIX}.{instrument}.{}", self.interval),
            Some(grouping) => format!(
                "{BOOK_CHANNEL_PREFIX}.{instrument}.{}.{}.{}",
                grouping.group, grouping.depth, self.interval
            ),
        }
    }
}

impl fmt::Display for BookChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.channel_for("{instrument}"))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn default_channel() {
        let channel = BookChannel::default();
        assert_eq!(channel.channel_for("BTC-PERPETUAL"), "book.BTC-PERPETUAL.100ms");
    }

    #[test]
    fn raw_cadence() {
        let channel = BookChannel::new("raw");
        assert_eq!(channel.channel_for("ETH-PERPETUAL"), "book.ETH-PERPETUAL.raw");
    }

    #[test]
    fn grouped_channel() {
        let channel = BookChannel::default().with_grouping("none", 10);
        assert_eq!(
            channel.channel_for("BTC-PERPETUAL"),
            "book.BTC-PERPETUAL.none.10.100ms"
        );
    }

    #[test]
    fn display_shows_template() {
        assert_eq!(BookChannel::default().to_string(), "book.{instrument}.100ms");
    }

    #[test]
    fn instrument_is_not_validated() {
        let channel = BookChannel::default();
        assert_eq!(channel.channel_for(""), "book..100ms");
        assert_eq!(channel.channel_for("a.b c"), "book.a.b c.100ms");
    }

    proptest! {
        #[test]
        fn channel_wraps_instrument_exactly_once(instrument in ".*") {
            let name = BookChannel::default().channel_for(&instrument);
            prop_assert_eq!(name, format!("book.{instrument}.100ms"));
        }
    }
}
