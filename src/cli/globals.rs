use secrecy::SecretString;

/// Runtime configuration shared across handlers (gateway credentials, signing
/// secret, upload location, allowed CORS origins).
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub token_secret: SecretString,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: SecretString,
    pub smtp_from: String,
    pub uploads_dir: String,
    pub allowed_origins: Vec<String>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: SecretString::from(""),
            smtp_from: String::new(),
            uploads_dir: "uploads".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(SecretString::from("swordfish"));
        assert_eq!(args.token_secret.expose_secret(), "swordfish");
        assert_eq!(args.smtp_port, 587);
        assert!(args.smtp_host.is_none());
        assert_eq!(args.uploads_dir, "uploads");
        assert!(args.allowed_origins.is_empty());
    }
}
