//! Email service for sending verification links

use crate::config::{EmailConfig, SiteConfig};
use anyhow::{anyhow, Result};
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// Email service for sending emails
pub struct EmailService {
    email: EmailConfig,
    site: SiteConfig,
}

impl EmailService {
    pub fn new(email: EmailConfig, site: SiteConfig) -> Self {
        Self { email, site }
    }

    /// Check if outbound mail is configured at all
    pub fn is_configured(&self) -> bool {
        !self.email.smtp_host.is_empty() && !self.email.from_address.is_empty()
    }

    /// Build the link a new account must follow to verify its address
    pub fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/auth/verify-email?token={}",
            self.site.base_url.trim_end_matches('/'),
            urlencoding::encode(token)
        )
    }

    /// Send the email-verification link for a freshly registered account
    pub async fn send_verification_email(&self, to_email: &str, token: &str) -> Result<()> {
        if !self.is_configured() {
            return Err(anyhow!(
                "SMTP host not configured. Please configure SMTP settings first."
            ));
        }

        let link = self.verification_link(token);
        let from = format!("{} <{}>", self.email.from_name, self.email.from_address);
        let subject = format!("[{}] Verify your email address", self.site.name);
        let body = format!(
            "Hello!\n\n\
             Thanks for signing up at {site}. Please confirm your email address by\n\
             opening the link below:\n\n\
             {link}\n\n\
             The link works once. If you did not create this account, you can\n\
             safely ignore this message.\n\n\
             The {site} team",
            site = self.site.name,
            link = link
        );

        let message = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to_email.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let creds = Credentials::new(
            self.email.smtp_username.clone(),
            self.email.smtp_password.clone(),
        );

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.email.smtp_host)
                .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
                .credentials(creds)
                .port(self.email.smtp_port)
                .build();

        mailer
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}
