//! Toast text for incoming notifications.

use std::time::Duration;

use market_core::traits::{Toast, ToastIcon};

use super::chat::ChatNotification;
use super::order::OrderNotification;

/// Longest message preview shown in a chat toast, in characters.
const PREVIEW_CHARS: usize = 60;

/// Formats toasts for the two live feeds.
pub struct NotificationFormatter;

impl NotificationFormatter {
    /// Toast for a new order.
    pub fn new_order(order: &OrderNotification, duration: Duration) -> Toast {
        Toast {
            icon: ToastIcon::Order,
            message: format!(
                "Yeni sipariş! #{} - ₺{:.2}",
                order.order_number, order.total_amount
            ),
            duration,
        }
    }

    /// Toast for a new customer chat message.
    pub fn new_message(message: &ChatNotification, duration: Duration) -> Toast {
        Toast {
            icon: ToastIcon::Message,
            message: format!(
                "Yeni mesaj (Sipariş #{}): {}",
                message.order_number,
                preview(&message.message)
            ),
            duration,
        }
    }
}

/// Truncates on a character boundary, marking the cut with an ellipsis.
fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use market_core::types::{MessageId, OrderId};

    #[test]
    fn test_order_toast() {
        let order = OrderNotification {
            id: OrderId::new(),
            order_number: "DM-1042".to_string(),
            total_amount: 149.5,
            created_at: Utc::now(),
            is_read: false,
        };
        let toast = NotificationFormatter::new_order(&order, Duration::from_secs(5));
        assert_eq!(toast.icon, ToastIcon::Order);
        assert_eq!(toast.message, "Yeni sipariş! #DM-1042 - ₺149.50");
        assert_eq!(toast.duration, Duration::from_secs(5));
    }

    #[test]
    fn test_chat_toast_truncates_multibyte_text() {
        let message = ChatNotification {
            id: MessageId::new(),
            order_id: OrderId::new(),
            order_number: "DM-7".to_string(),
            message: "ş".repeat(80),
            created_at: Utc::now(),
            is_read: false,
        };
        let toast = NotificationFormatter::new_message(&message, Duration::from_secs(4));
        assert!(toast.message.starts_with("Yeni mesaj (Sipariş #DM-7): "));
        assert!(toast.message.ends_with('…'));
        let body = toast.message.split_once("): ").unwrap().1;
        assert_eq!(body.chars().count(), PREVIEW_CHARS + 1);
    }
}
