use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: String,
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,
    /// Base url this server is reachable on, used to build file urls.
    #[envconfig(from = "PUBLIC_URL", default = "http://localhost:8080")]
    pub public_url: String,
    #[envconfig(from = "FRONTEND_HOST", default = "http://localhost:3000")]
    pub frontend_host: String,
    #[envconfig(from = "STORAGE_DIR", default = "storage")]
    pub storage_dir: String,
    #[envconfig(from = "PLACEHOLDER_IMAGE", default = "/placeholder-image.png")]
    pub placeholder_image: String,
    /// Comma separated list of emails that get the admin flag at sign-up.
    #[envconfig(from = "ADMIN_EMAILS", default = "")]
    pub admin_emails: String,
    #[envconfig(from = "EMAIL_USERNAME")]
    pub email_username: Option<String>,
    #[envconfig(from = "EMAIL_PASSWORD")]
    pub email_password: Option<String>,
    #[envconfig(from = "SMTP_RELAY", default = "smtp.gmail.com")]
    pub smtp_relay: String,
    #[envconfig(from = "LOG_FORMAT", default = "pretty")]
    pub log_format: String,
    #[envconfig(from = "CHAT_BUFFER", default = "256")]
    pub chat_buffer: usize,
    /// Largest request body accepted, in bytes. Bigger requests get 413.
    #[envconfig(from = "MAX_UPLOAD_BYTES", default = "10485760")]
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .any(|e| e.eq_ignore_ascii_case(email.trim()))
    }

    pub fn public_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        db_url: "postgres://localhost/clubhouse_test".to_string(),
        port: 0,
        public_url: "http://localhost:8080/".to_string(),
        frontend_host: "http://localhost:3000".to_string(),
        storage_dir: "storage".to_string(),
        placeholder_image: "/placeholder-image.png".to_string(),
        admin_emails: "root@club.house, Boss@Club.House".to_string(),
        email_username: None,
        email_password: None,
        smtp_relay: "smtp.gmail.com".to_string(),
        log_format: "pretty".to_string(),
        chat_buffer: 16,
        max_upload_bytes: 1024 * 1024,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_emails_are_trimmed_and_case_insensitive() {
        let config = test_config();
        assert!(config.is_admin_email("root@club.house"));
        assert!(config.is_admin_email("boss@club.house "));
        assert!(!config.is_admin_email("someone@club.house"));
        assert!(!config.is_admin_email(""));
    }

    #[test]
    fn public_url_drops_trailing_slash() {
        assert_eq!(test_config().public_url(), "http://localhost:8080");
    }
}
