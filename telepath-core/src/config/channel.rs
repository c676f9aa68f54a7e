//! Channel configuration.

use compact_str::CompactString;
use std::time::Duration;

/// TTL for channels whose consumer is expected to be watching live.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// TTL for channels read after a human-scale delay.
pub const LONG_HOLD_TTL: Duration = Duration::from_secs(600);

/// What a new subscriber gets when it connects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CatchUp {
    /// Push the cached event right away if it is still fresh.
    #[default]
    Immediate,
    /// Withhold the cached event; the subscriber only sees live publishes.
    Silent,
}

/// Static configuration of one broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub id: CompactString,
    /// The channel's valid symbol set.
    pub symbols: Vec<CompactString>,
    pub ttl: Duration,
    pub catch_up: CatchUp,
    /// Optional attributes carried from the producer request into the event.
    pub extra_fields: Vec<CompactString>,
}

impl ChannelConfig {
    /// A channel with default TTL, immediate catch-up and no extra fields.
    pub fn new<I, S>(id: impl Into<CompactString>, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        Self {
            id: id.into(),
            symbols: symbols.into_iter().map(Into::into).collect(),
            ttl: DEFAULT_TTL,
            catch_up: CatchUp::Immediate,
            extra_fields: Vec::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_catch_up(mut self, catch_up: CatchUp) -> Self {
        self.catch_up = catch_up;
        self
    }

    pub fn with_extra_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.extra_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `kind` belongs to the valid symbol set.
    pub fn accepts(&self, kind: &str) -> bool {
        self.symbols.iter().any(|s| s.as_str() == kind)
    }

    /// Whether `field` is part of the channel's extra-attribute schema.
    pub fn carries(&self, field: &str) -> bool {
        self.extra_fields.iter().any(|f| f.as_str() == field)
    }
}
