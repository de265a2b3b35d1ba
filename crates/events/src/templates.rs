//! Plain-text email templates.
//!
//! Pure functions so wording can be tested without SMTP.

use chrono::{DateTime, Utc};
use onenumber_core::types::MinorUnits;

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
}

const SIGNATURE: &str = "\n\n-- \nThe OneNumber team";

fn message(subject: impl Into<String>, body: String) -> EmailMessage {
    EmailMessage {
        subject: subject.into(),
        body: format!("{body}{SIGNATURE}"),
    }
}

/// `150000, "NGN"` -> `NGN 1,500.00`.
pub fn format_amount(amount: MinorUnits, currency: &str) -> String {
    let major = amount / 100;
    let minor = (amount % 100).abs();
    let digits = major.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{currency} {sign}{grouped}.{minor:02}")
}

pub fn welcome(full_name: &str, base_url: &str, token: &str) -> EmailMessage {
    message(
        "Welcome to OneNumber - confirm your email",
        format!(
            "Hi {full_name},\n\nThanks for signing up. Confirm your email address to \
             start buying numbers:\n\n{base_url}/verify-email?token={token}\n\n\
             This link expires in 24 hours."
        ),
    )
}

pub fn email_verification(full_name: &str, base_url: &str, token: &str) -> EmailMessage {
    message(
        "Confirm your OneNumber email",
        format!(
            "Hi {full_name},\n\nUse the link below to confirm your email address:\n\n\
             {base_url}/verify-email?token={token}\n\nThis link expires in 24 hours."
        ),
    )
}

pub fn password_reset(full_name: &str, base_url: &str, token: &str) -> EmailMessage {
    message(
        "Reset your OneNumber password",
        format!(
            "Hi {full_name},\n\nWe received a request to reset your password. \
             Choose a new one here:\n\n{base_url}/reset-password?token={token}\n\n\
             This link expires in 1 hour. If you did not ask for this, ignore this email."
        ),
    )
}

pub fn payment_receipt(
    full_name: &str,
    reference: &str,
    amount: MinorUnits,
    currency: &str,
    display_number: &str,
) -> EmailMessage {
    message(
        format!("Payment received - {reference}"),
        format!(
            "Hi {full_name},\n\nWe received your payment of {} for {display_number}.\n\n\
             Reference: {reference}",
            format_amount(amount, currency)
        ),
    )
}

pub fn payment_failed(full_name: &str, reference: &str, reason: &str) -> EmailMessage {
    message(
        format!("Payment not completed - {reference}"),
        format!(
            "Hi {full_name},\n\nYour payment {reference} could not be completed: {reason}.\n\n\
             No money was taken for this attempt. You can try again from your dashboard."
        ),
    )
}

pub fn subscription_activated(
    full_name: &str,
    display_number: &str,
    period_end: Option<DateTime<Utc>>,
) -> EmailMessage {
    let until = period_end
        .map(|end| format!(" It is yours until {}.", end.format("%-d %B %Y")))
        .unwrap_or_default();
    message(
        format!("{display_number} is now yours"),
        format!("Hi {full_name},\n\nYour subscription for {display_number} is active.{until}"),
    )
}

pub fn subscription_expired(full_name: &str, display_number: &str) -> EmailMessage {
    message(
        format!("Your subscription for {display_number} has ended"),
        format!(
            "Hi {full_name},\n\nYour subscription for {display_number} has expired and the \
             number has been returned to inventory."
        ),
    )
}
