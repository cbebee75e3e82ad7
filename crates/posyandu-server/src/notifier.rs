//! Outbound SMS delivery seam.
//!
//! Server-initiated texts (reminders, overdue alerts, weekly education) go
//! through a [`Notifier`]; inbound-command replies do not, they travel back
//! as the webhook HTTP response. The default implementation only traces the
//! message, a real gateway client would slot in behind the same trait.

use std::future::Future;

use posyandu_core::{
  log::{Direction, NewSmsLog},
  store::RegistryStore,
};

/// Delivery of one text message to one phone number.
pub trait Notifier: Send + Sync {
  fn send<'a>(
    &'a self,
    phone: &'a str,
    text: &'a str,
  ) -> impl Future<Output = ()> + Send + 'a;
}

/// Gateway stand-in: normalizes the number and traces the send.
#[derive(Clone, Default)]
pub struct SimulatedGateway;

impl Notifier for SimulatedGateway {
  async fn send(&self, phone: &str, text: &str) {
    let phone = normalize_phone(phone);
    tracing::info!(%phone, chars = text.len(), "outbound sms");
    tracing::debug!(%phone, text, "outbound sms body");
  }
}

/// Send `text` to `phone` and record it in the SMS log, bracketing the send
/// with an append and a processed-flag update. Log failures are traced and
/// do not block delivery.
pub async fn send_logged<S, N>(store: &S, notifier: &N, phone: &str, text: &str)
where
  S: RegistryStore,
  N: Notifier,
{
  let log_id = match store
    .append_log(NewSmsLog {
      phone:     phone.to_string(),
      direction: Direction::Outgoing,
      content:   text.to_string(),
    })
    .await
  {
    Ok(log) => Some(log.log_id),
    Err(e) => {
      tracing::error!(error = %e, phone, "failed to log outbound message");
      None
    }
  };

  notifier.send(phone, text).await;

  if let Some(log_id) = log_id
    && let Err(e) = store.finish_log(log_id, true, None).await
  {
    tracing::error!(error = %e, log_id, "failed to finalize outbound log");
  }
}

/// Normalize a phone number to the `+62` international form. Numbers that
/// match no known prefix pass through untouched.
pub fn normalize_phone(phone: &str) -> String {
  let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
  if let Some(rest) = digits.strip_prefix('0') {
    format!("+62{rest}")
  } else if digits.starts_with("62") {
    format!("+{digits}")
  } else if digits.starts_with('8') {
    format!("+62{digits}")
  } else {
    phone.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalizes_local_prefixes() {
    assert_eq!(normalize_phone("081234567890"), "+6281234567890");
    assert_eq!(normalize_phone("6281234567890"), "+6281234567890");
    assert_eq!(normalize_phone("81234567890"), "+6281234567890");
    assert_eq!(normalize_phone("+62 812-3456-7890"), "+6281234567890");
  }

  #[test]
  fn unknown_prefix_passes_through() {
    assert_eq!(normalize_phone("+15551234567"), "+15551234567");
  }
}
