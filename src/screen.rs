//! # Screen Module
//!
//! Transport-neutral description of what the bot shows next: body text, a
//! grid of controls each carrying the action token it echoes back, and
//! whether the chat message that triggered the update is edited in place or
//! a new message is sent. The Telegram layer turns these into API calls.

use serde::Serialize;

/// A labelled inline control
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    pub label: String,
    pub token: String,
}

impl Control {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Keyboard attached to a screen
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum Keyboard {
    #[default]
    None,
    /// Buttons under the message, one inner `Vec` per row
    Inline(Vec<Vec<Control>>),
    /// Persistent keyboard at the bottom of the chat; buttons send their label
    Reply(Vec<Vec<String>>),
}

/// How the screen reaches the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Delivery {
    /// Replace the message whose control was pressed
    EditCurrent,
    SendNew,
}

/// Which screen of the navigation state machine is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScreenKind {
    MainMenu,
    CategoryBrowse {
        category_id: i32,
        page: u32,
    },
    VariantBrowse {
        category_id: i32,
        dish_id: i32,
        child_category_id: i32,
        page: u32,
    },
    CartSummary,
    EmptyCart,
    PaymentInstructions,
    AdminUnconfirmedList,
    SettingsList,
    TodayReport,
    Help,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screen {
    pub kind: ScreenKind,
    pub text: String,
    pub keyboard: Keyboard,
    pub delivery: Delivery,
    /// Text uses Telegram's HTML markup
    pub html: bool,
}

impl Screen {
    pub fn new(kind: ScreenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            keyboard: Keyboard::None,
            delivery: Delivery::SendNew,
            html: false,
        }
    }

    pub fn with_inline(mut self, rows: Vec<Vec<Control>>) -> Self {
        self.keyboard = Keyboard::Inline(rows);
        self
    }

    pub fn with_reply_keyboard(mut self, rows: Vec<Vec<String>>) -> Self {
        self.keyboard = Keyboard::Reply(rows);
        self
    }

    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn html(mut self) -> Self {
        self.html = true;
        self
    }

    /// Inline controls in row-major order
    pub fn controls(&self) -> Vec<&Control> {
        match &self.keyboard {
            Keyboard::Inline(rows) => rows.iter().flatten().collect(),
            _ => Vec::new(),
        }
    }

    /// First inline control with the given label
    pub fn control(&self, label: &str) -> Option<&Control> {
        self.controls().into_iter().find(|c| c.label == label)
    }
}

/// Out-of-band message to another chat (admin notice, confirmation, reminder)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub external_id: i64,
    pub text: String,
    pub html: bool,
}

impl Notification {
    pub fn new(external_id: i64, text: impl Into<String>) -> Self {
        Self {
            external_id,
            text: text.into(),
            html: false,
        }
    }

    pub fn html(mut self) -> Self {
        self.html = true;
        self
    }
}

/// Everything produced for one inbound update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reply {
    /// `None` leaves the chat untouched
    pub screen: Option<Screen>,
    pub notifications: Vec<Notification>,
}

impl Reply {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn screen(screen: Screen) -> Self {
        Self {
            screen: Some(screen),
            notifications: Vec::new(),
        }
    }

    pub fn with_notification(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    pub fn with_notifications(
        mut self,
        notifications: impl IntoIterator<Item = Notification>,
    ) -> Self {
        self.notifications.extend(notifications);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.screen.is_none() && self.notifications.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_are_row_major() {
        let screen = Screen::new(ScreenKind::MainMenu, "menu").with_inline(vec![
            vec![Control::new("a", "1"), Control::new("b", "2")],
            vec![Control::new("c", "3")],
        ]);
        let labels: Vec<&str> = screen.controls().iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["a", "b", "c"]);
        assert_eq!(screen.control("c").map(|c| c.token.as_str()), Some("3"));
        assert!(screen.control("d").is_none());
    }

    #[test]
    fn test_reply_keyboard_has_no_inline_controls() {
        let screen = Screen::new(ScreenKind::Help, "help")
            .with_reply_keyboard(vec![vec!["Menu".to_string()]]);
        assert!(screen.controls().is_empty());
        assert_eq!(screen.delivery, Delivery::SendNew);
    }

    #[test]
    fn test_empty_reply() {
        assert!(Reply::none().is_empty());
        let reply = Reply::none().with_notification(Notification::new(1, "hi"));
        assert!(!reply.is_empty());
    }
}
