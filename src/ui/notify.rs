/// Toast notifications
///
/// Every toast is mirrored into the log at a matching level. Toasts expire
/// on their own; the app prunes them from a periodic tick.

use iced::widget::{column, container, text};
use iced::{Color, Element, Length};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::Message;

/// How long a toast stays up
pub const TOAST_LIFETIME: Duration = Duration::from_secs(4);
/// Older toasts are dropped beyond this many
const MAX_TOASTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    fn color(self) -> Color {
        match self {
            Level::Info => Color::from_rgb8(0x3b, 0x82, 0xf6),
            Level::Success => Color::from_rgb8(0x22, 0xc5, 0x5e),
            Level::Warning => Color::from_rgb8(0xf5, 0x9e, 0x0b),
            Level::Error => Color::from_rgb8(0xef, 0x44, 0x44),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub level: Level,
    pub message: String,
    pub created: Instant,
}

#[derive(Debug, Default)]
pub struct Toasts {
    items: VecDeque<Toast>,
}

impl Toasts {
    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        self.push_at(level, message, Instant::now());
    }

    pub fn push_at(&mut self, level: Level, message: impl Into<String>, now: Instant) {
        let message = message.into();
        match level {
            Level::Info | Level::Success => info!("🔔 {}", message),
            Level::Warning => warn!("🔔 {}", message),
            Level::Error => error!("🔔 {}", message),
        }

        self.items.push_back(Toast {
            level,
            message,
            created: now,
        });
        while self.items.len() > MAX_TOASTS {
            self.items.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Level::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Level::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Level::Error, message);
    }

    /// Drop expired toasts
    pub fn prune(&mut self, now: Instant) {
        self.items
            .retain(|toast| now.saturating_duration_since(toast.created) < TOAST_LIFETIME);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&Toast> {
        self.items.back()
    }

    pub fn view(&self) -> Element<'_, Message> {
        let cards = self.items.iter().map(|toast| {
            let color = toast.level.color();
            container(text(toast.message.clone()).size(14).color(Color::WHITE))
                .padding(10)
                .width(Length::Fixed(320.0))
                .style(move |_theme| container::Style {
                    background: Some(color.into()),
                    border: iced::Border {
                        radius: 6.0.into(),
                        ..Default::default()
                    },
                    ..Default::default()
                })
                .into()
        });

        column(cards).spacing(8).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toasts_expire_after_lifetime() {
        let start = Instant::now();
        let mut toasts = Toasts::default();
        toasts.push_at(Level::Info, "first", start);
        toasts.push_at(Level::Error, "second", start + Duration::from_secs(3));

        toasts.prune(start + Duration::from_secs(4));
        let left: Vec<&str> = toasts.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(left, ["second"]);

        toasts.prune(start + Duration::from_secs(8));
        assert!(toasts.is_empty());
    }

    #[test]
    fn test_oldest_dropped_when_full() {
        let mut toasts = Toasts::default();
        for i in 0..6 {
            toasts.info(format!("toast {}", i));
        }
        assert_eq!(toasts.iter().count(), MAX_TOASTS);
        assert_eq!(toasts.iter().next().unwrap().message, "toast 2");
        assert_eq!(toasts.last().unwrap().message, "toast 5");
    }
}
