//! Keyboards shown by the bot.

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};

use crate::callback::CallbackToken;
use crate::daterange::{GroupBy, RangeOption};

pub const STATISTICS_LABEL: &str = "📊 Statistics";
pub const DIRECT_LINKS_LABEL: &str = "🔗 Direct Links";
pub const WEBSITES_LABEL: &str = "🌐 Websites";
pub const BALANCE_LABEL: &str = "💰 Balance";
pub const SETUP_COMMAND: &str = "/setup_api";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    /// Reply keyboard for registered users.
    Main,
    /// Reply keyboard offering `/setup_api`.
    Guest,
    DateRange,
    GroupBy,
    /// Edit / Delete buttons under the stored key.
    KeyManagement,
    /// Yes / No under the delete prompt.
    ConfirmDelete,
}

fn button(label: &str, token: CallbackToken) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label, token.data())
}

impl Menu {
    /// Inline menus can be attached to edited messages; reply keyboards cannot.
    pub fn is_inline(self) -> bool {
        !matches!(self, Menu::Main | Menu::Guest)
    }

    pub fn inline_markup(self) -> Option<InlineKeyboardMarkup> {
        let rows = match self {
            Menu::Main | Menu::Guest => return None,
            Menu::DateRange => {
                let range = |opt: RangeOption| button(opt.label(), CallbackToken::Range(opt));
                vec![
                    vec![range(RangeOption::Today), range(RangeOption::Yesterday)],
                    vec![range(RangeOption::Last7Days), range(RangeOption::Last10Days)],
                    vec![range(RangeOption::Last30Days)],
                    vec![range(RangeOption::ThisMonth)],
                ]
            }
            Menu::GroupBy => vec![GroupBy::ALL
                .into_iter()
                .map(|g| button(g.label(), CallbackToken::GroupBy(g)))
                .collect()],
            Menu::KeyManagement => vec![vec![
                button("Edit", CallbackToken::EditKey),
                button("Delete", CallbackToken::DeleteKey),
            ]],
            Menu::ConfirmDelete => vec![vec![
                button("Yes", CallbackToken::ConfirmDelete),
                button("No", CallbackToken::CancelDelete),
            ]],
        };
        Some(InlineKeyboardMarkup::new(rows))
    }

    pub fn markup(self) -> ReplyMarkup {
        match self {
            Menu::Main => ReplyMarkup::Keyboard(
                KeyboardMarkup::new(vec![
                    vec![KeyboardButton::new(STATISTICS_LABEL)],
                    vec![
                        KeyboardButton::new(DIRECT_LINKS_LABEL),
                        KeyboardButton::new(WEBSITES_LABEL),
                    ],
                    vec![KeyboardButton::new(BALANCE_LABEL)],
                ])
                .resize_keyboard(true),
            ),
            Menu::Guest => ReplyMarkup::Keyboard(
                KeyboardMarkup::new(vec![vec![KeyboardButton::new(SETUP_COMMAND)]])
                    .resize_keyboard(true),
            ),
            inline => ReplyMarkup::InlineKeyboard(inline.inline_markup().unwrap_or_default()),
        }
    }
}
