//! Special-media overrides
//!
//! Calendar-keyed rules replace the requested item while their predicate
//! holds; the `MediaMissing` rule stands in when the upstream lookup fails.
//! Rules with an unknown key or any empty field are dropped when the policy
//! is built, so a selected rule is always complete.

mod calendar;

pub use calendar::{CalendarPredicate, DateList, FixedDateWindow, calendar_offset, predicate_for};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::config::{CalendarConfig, SpecialMediaConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverrideKey {
    ChineseNewYearEve,
    October1,
    December13,
    September18,
    MediaMissing,
}

impl OverrideKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideKey::ChineseNewYearEve => "ChineseNewYearEve",
            OverrideKey::October1 => "October1",
            OverrideKey::December13 => "December13",
            OverrideKey::September18 => "September18",
            OverrideKey::MediaMissing => "MediaMissing",
        }
    }
}

impl fmt::Display for OverrideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown override key: {0}")]
pub struct UnknownOverrideKey(pub String);

impl FromStr for OverrideKey {
    type Err = UnknownOverrideKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ChineseNewYearEve" => Ok(OverrideKey::ChineseNewYearEve),
            "October1" => Ok(OverrideKey::October1),
            "December13" => Ok(OverrideKey::December13),
            "September18" => Ok(OverrideKey::September18),
            "MediaMissing" => Ok(OverrideKey::MediaMissing),
            other => Err(UnknownOverrideKey(other.to_string())),
        }
    }
}

/// A complete substitute target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRule {
    pub key: OverrideKey,
    pub name: String,
    pub media_path: String,
    pub item_id: String,
    pub media_source_id: String,
}

impl OverrideRule {
    /// Convert a configured special media, rejecting unknown keys and empty fields.
    pub fn from_config(media: &SpecialMediaConfig) -> Option<Self> {
        if !media.is_complete() {
            return None;
        }
        let key = media.key.parse().ok()?;
        Some(Self {
            key,
            name: media.name.clone(),
            media_path: media.media_path.clone(),
            item_id: media.item_id.clone(),
            media_source_id: media.media_source_id.clone(),
        })
    }
}

struct CalendarRule {
    rule: OverrideRule,
    predicate: Box<dyn CalendarPredicate>,
}

/// Ordered calendar rules plus the optional missing-media fallback.
#[derive(Default)]
pub struct OverridePolicy {
    calendar: Vec<CalendarRule>,
    missing: Option<OverrideRule>,
}

impl fmt::Debug for OverridePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverridePolicy")
            .field(
                "calendar",
                &self.calendar.iter().map(|c| c.predicate.name()).collect::<Vec<_>>(),
            )
            .field("missing", &self.missing)
            .finish()
    }
}

impl OverridePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the policy from configuration, keeping declaration order.
    pub fn from_config(medias: &[SpecialMediaConfig], calendar: &CalendarConfig) -> Self {
        let mut policy = Self::new();
        for rule in medias.iter().filter_map(OverrideRule::from_config) {
            match predicate_for(rule.key, calendar) {
                Some(predicate) => policy = policy.with_calendar_rule(rule, predicate),
                None => policy = policy.with_missing_media(rule),
            }
        }
        policy
    }

    /// Append a calendar rule with a custom predicate.
    pub fn with_calendar_rule(mut self, rule: OverrideRule, predicate: Box<dyn CalendarPredicate>) -> Self {
        self.calendar.push(CalendarRule { rule, predicate });
        self
    }

    /// Set the missing-media fallback; the first configured one wins.
    pub fn with_missing_media(mut self, rule: OverrideRule) -> Self {
        if self.missing.is_none() {
            self.missing = Some(rule);
        }
        self
    }

    /// First calendar rule whose predicate holds at `now`.
    pub fn pre_check(&self, now: DateTime<Utc>) -> Option<&OverrideRule> {
        let hit = self
            .calendar
            .iter()
            .find(|entry| entry.predicate.matches(now))?;
        debug!(rule = %hit.rule.name, predicate = hit.predicate.name(), "Calendar override active");
        Some(&hit.rule)
    }

    pub fn missing_media_fallback(&self) -> Option<&OverrideRule> {
        self.missing.as_ref()
    }
}
