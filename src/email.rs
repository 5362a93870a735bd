use crate::config::Config;
use anyhow::Context;
use lettre::{
    message::Mailbox,
    transport::smtp::{
        authentication::Credentials, response::Response as LettreResponse, Error as LettreError,
    },
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// Outgoing mail for password resets. Absent when no smtp account is configured.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    pub address: Address,
}

impl Mailer {
    pub fn from_config(config: &Config) -> anyhow::Result<Option<Mailer>> {
        let (Some(username), Some(password)) = (&config.email_username, &config.email_password) else {
            return Ok(None);
        };

        let address = username
            .parse::<Address>()
            .context("EMAIL_USERNAME is not a valid address")?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_relay)?
            .credentials(Credentials::new(username.clone(), password.clone()))
            .build();

        Ok(Some(Mailer { transport, address }))
    }

    pub fn sender(&self) -> Mailbox {
        Mailbox::new(Some("Clubhouse".to_string()), self.address.clone())
    }

    pub async fn sanity_check(&self) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.sender())
            .to(Mailbox::new(None, self.address.clone()))
            .subject("Ensuring provided email is valid")
            .body("SANITY CHECK".to_string())?;

        self.send(email).await?;
        Ok(())
    }

    pub async fn send(&self, msg: Message) -> Result<LettreResponse, LettreError> {
        self.transport.send(msg).await
    }
}
