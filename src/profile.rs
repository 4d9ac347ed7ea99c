//! Messenger Profile settings
//!
//! Bodies for the `me/messenger_profile` endpoint: domain whitelisting, the
//! persistent menu and the "Get Started" button.

use serde::Serialize;

use crate::message::Button;

/// Default payload of the "Get Started" postback.
pub const DEFAULT_GET_STARTED_PAYLOAD: &str = "get_started";

/// A persistent menu for one locale.
///
/// # Example
/// ```rust
/// use messenger_platform_rs::{message::Button, profile::Menu};
///
/// let menu = Menu::new([
///     Button::postback("Restart", "RESTART"),
///     Button::url("Website", "https://example.com"),
/// ])
/// .composer_input_disabled(false);
/// ```
#[derive(Serialize, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Menu {
    pub locale: String,
    pub composer_input_disabled: bool,
    pub call_to_actions: Vec<Button>,
}

impl Menu {
    /// A menu for the `default` locale.
    pub fn new(items: impl IntoIterator<Item = Button>) -> Self {
        Self {
            locale: "default".to_owned(),
            composer_input_disabled: false,
            call_to_actions: items.into_iter().collect(),
        }
    }

    /// Restricts the menu to a locale such as `fr_FR`.
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Hides the composer so users can only interact through the menu.
    pub fn composer_input_disabled(mut self, disabled: bool) -> Self {
        self.composer_input_disabled = disabled;
        self
    }

    pub fn item(mut self, item: Button) -> Self {
        self.call_to_actions.push(item);
        self
    }
}

#[derive(Serialize, Debug)]
pub(crate) struct WhitelistRequest<'a> {
    pub(crate) whitelisted_domains: &'a [String],
}

#[derive(Serialize, Debug)]
pub(crate) struct PersistentMenuRequest<'a> {
    pub(crate) persistent_menu: &'a [Menu],
    pub(crate) get_started: GetStarted<'a>,
}

#[derive(Serialize, Debug)]
pub(crate) struct GetStarted<'a> {
    pub(crate) payload: &'a str,
}
