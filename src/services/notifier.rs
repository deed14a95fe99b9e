//! Delivery of the join link a player receives after registering.

use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NotifierConfig;

/// Message carrying a player's join link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLinkMessage {
    /// Recipient email.
    pub to: String,
    /// Nickname used in the greeting.
    pub display_name: String,
    /// Link to the game screen.
    pub link: String,
}

/// Failures while handing a message to the delivery provider.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The provider could not be reached.
    #[cfg(feature = "resend-notifier")]
    #[error("failed to reach the email provider")]
    Transport {
        #[source]
        source: reqwest::Error,
    },
    /// The provider refused the message.
    #[error("email provider rejected the message with status {status}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: u16,
    },
}

/// Outbound channel for join links.
pub trait JoinLinkNotifier: Send + Sync {
    /// Deliver `message`.
    fn send_join_link(&self, message: JoinLinkMessage) -> BoxFuture<'static, Result<(), NotifyError>>;
}

/// Notifier that only logs the link; used when no provider key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl JoinLinkNotifier for LogNotifier {
    fn send_join_link(&self, message: JoinLinkMessage) -> BoxFuture<'static, Result<(), NotifyError>> {
        Box::pin(async move {
            info!(to = %message.to, link = %message.link, "join link (email delivery disabled)");
            Ok(())
        })
    }
}

#[cfg(feature = "resend-notifier")]
pub use self::resend::ResendNotifier;

#[cfg(feature = "resend-notifier")]
mod resend {
    use futures::future::BoxFuture;
    use reqwest::Client;
    use serde::Serialize;

    use super::{JoinLinkMessage, JoinLinkNotifier, NotifyError, join_link_html};

    const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
    const SUBJECT: &str = "Your game link";

    #[derive(Serialize)]
    struct SendEmail<'a> {
        from: &'a str,
        to: [&'a str; 1],
        subject: &'a str,
        html: String,
    }

    /// Sends join links through the Resend HTTP API.
    #[derive(Clone)]
    pub struct ResendNotifier {
        client: Client,
        api_key: String,
        from: String,
    }

    impl ResendNotifier {
        /// Notifier authenticating with `api_key` and sending as `from`.
        pub fn new(api_key: String, from: String) -> Self {
            Self {
                client: Client::new(),
                api_key,
                from,
            }
        }
    }

    impl JoinLinkNotifier for ResendNotifier {
        fn send_join_link(
            &self,
            message: JoinLinkMessage,
        ) -> BoxFuture<'static, Result<(), NotifyError>> {
            let notifier = self.clone();
            Box::pin(async move {
                let body = SendEmail {
                    from: &notifier.from,
                    to: [&message.to],
                    subject: SUBJECT,
                    html: join_link_html(&message),
                };

                let response = notifier
                    .client
                    .post(RESEND_ENDPOINT)
                    .bearer_auth(&notifier.api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|source| NotifyError::Transport { source })?;

                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(NotifyError::Rejected {
                        status: status.as_u16(),
                    })
                }
            })
        }
    }
}

/// Pick the notifier matching the configuration.
pub fn from_config(config: &NotifierConfig) -> Arc<dyn JoinLinkNotifier> {
    #[cfg(feature = "resend-notifier")]
    if let Some(api_key) = &config.api_key {
        info!("join links will be emailed through Resend");
        return Arc::new(ResendNotifier::new(api_key.clone(), config.from.clone()));
    }

    if config.api_key.is_some() {
        warn!("email api key configured but the resend-notifier feature is disabled");
    }
    Arc::new(LogNotifier)
}

/// Send `message` in the background; failures are only logged.
pub fn dispatch(notifier: Arc<dyn JoinLinkNotifier>, message: JoinLinkMessage) {
    tokio::spawn(async move {
        let to = message.to.clone();
        if let Err(err) = notifier.send_join_link(message).await {
            warn!(%to, error = %err, "failed to deliver join link");
        }
    });
}

#[cfg_attr(not(feature = "resend-notifier"), allow(dead_code))]
fn join_link_html(message: &JoinLinkMessage) -> String {
    format!(
        "<h1>Welcome {}!</h1><p>Click below to join:</p><a href=\"{}\">Join Game</a>",
        escape_html(&message.display_name),
        escape_html(&message.link)
    )
}

#[cfg_attr(not(feature = "resend-notifier"), allow(dead_code))]
fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
