//! Inline-button callback payloads.
//!
//! Every payload the bot emits maps to exactly one [`CallbackToken`]; parsing
//! is an exact lookup, so a range token can never be mistaken for a group-by
//! token or vice versa.

use crate::daterange::{GroupBy, RangeOption};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackToken {
    Range(RangeOption),
    GroupBy(GroupBy),
    EditKey,
    DeleteKey,
    ConfirmDelete,
    CancelDelete,
}

impl CallbackToken {
    /// Wire payload carried in `callback_data`.
    pub fn data(self) -> &'static str {
        match self {
            CallbackToken::Range(RangeOption::Today) => "stats_today",
            CallbackToken::Range(RangeOption::Yesterday) => "stats_yesterday",
            CallbackToken::Range(RangeOption::Last7Days) => "stats_last_7_days",
            CallbackToken::Range(RangeOption::Last10Days) => "stats_last_10_days",
            CallbackToken::Range(RangeOption::Last30Days) => "stats_last_30_days",
            CallbackToken::Range(RangeOption::ThisMonth) => "stats_this_month",
            CallbackToken::GroupBy(GroupBy::Date) => "group_by_date",
            CallbackToken::GroupBy(GroupBy::Domain) => "group_by_domain",
            CallbackToken::GroupBy(GroupBy::Country) => "group_by_country",
            CallbackToken::EditKey => "edit_api_key",
            CallbackToken::DeleteKey => "delete_api_key",
            CallbackToken::ConfirmDelete => "delete_api_key_yes",
            CallbackToken::CancelDelete => "delete_api_key_no",
        }
    }

    /// Every token the bot can emit.
    pub fn all() -> impl Iterator<Item = CallbackToken> {
        RangeOption::ALL
            .into_iter()
            .map(CallbackToken::Range)
            .chain(GroupBy::ALL.into_iter().map(CallbackToken::GroupBy))
            .chain([
                CallbackToken::EditKey,
                CallbackToken::DeleteKey,
                CallbackToken::ConfirmDelete,
                CallbackToken::CancelDelete,
            ])
    }

    /// Resolve a payload; unknown payloads yield `None`.
    pub fn parse(data: &str) -> Option<Self> {
        Self::all().find(|token| token.data() == data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_token_round_trips_through_its_payload() {
        for token in CallbackToken::all() {
            assert_eq!(CallbackToken::parse(token.data()), Some(token));
        }
    }

    #[test]
    fn payloads_are_unique_and_fit_telegram_limit() {
        let payloads: HashSet<&str> = CallbackToken::all().map(CallbackToken::data).collect();
        assert_eq!(payloads.len(), CallbackToken::all().count());
        assert!(payloads.iter().all(|p| p.len() <= 64));
    }

    #[test]
    fn unknown_and_prefix_payloads_are_rejected() {
        assert_eq!(CallbackToken::parse("stats_custom"), None);
        assert_eq!(CallbackToken::parse("stats_"), None);
        assert_eq!(CallbackToken::parse("group_by"), None);
        assert_eq!(CallbackToken::parse("group_by_date_extra"), None);
        assert_eq!(CallbackToken::parse("yes"), None);
        assert_eq!(CallbackToken::parse(""), None);
    }

    #[test]
    fn known_payloads_map_to_expected_tokens() {
        assert_eq!(
            CallbackToken::parse("stats_last_7_days"),
            Some(CallbackToken::Range(RangeOption::Last7Days))
        );
        assert_eq!(
            CallbackToken::parse("group_by_domain"),
            Some(CallbackToken::GroupBy(GroupBy::Domain))
        );
        assert_eq!(
            CallbackToken::parse("delete_api_key_yes"),
            Some(CallbackToken::ConfirmDelete)
        );
    }
}
