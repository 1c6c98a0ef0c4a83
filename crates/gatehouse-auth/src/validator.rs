//! Fail-closed session validation.

use std::time::Duration;

use gatehouse_api::{GateError, IdentityProvider, Result, SessionTokens, ValidatedSession};

/// Outcome of asking the identity provider about a token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid(ValidatedSession),
    Invalid,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }
}

/// Wraps an [`IdentityProvider`] so that every failure mode collapses into
/// [`Validation::Invalid`], and every call is bounded by a timeout.
#[derive(Debug, Clone)]
pub struct SessionValidator<P> {
    provider: P,
    timeout: Duration,
}

impl<P: IdentityProvider> SessionValidator<P> {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(provider: P) -> Self {
        Self {
            provider,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Validate and refresh a token pair. On success the caller must persist
    /// the returned pair; the provider may have rotated it.
    pub async fn refresh(&self, tokens: &SessionTokens) -> Validation {
        match tokio::time::timeout(self.timeout, self.provider.set_session(tokens)).await {
            Ok(Ok(session)) if session.tokens.is_complete() => Validation::Valid(session),
            Ok(Ok(_)) => {
                tracing::warn!("identity provider returned an incomplete token pair");
                Validation::Invalid
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "identity provider rejected session");
                Validation::Invalid
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis(),
                    "identity provider timed out validating session"
                );
                Validation::Invalid
            }
        }
    }

    /// Establish a session from a one-time authorization code.
    pub async fn exchange(&self, code: &str) -> Result<SessionTokens> {
        let tokens = tokio::time::timeout(
            self.timeout,
            self.provider.exchange_code_for_session(code),
        )
        .await
        .map_err(|_| {
            GateError::Provider(format!(
                "code exchange timed out after {}ms",
                self.timeout.as_millis()
            ))
        })??;

        if !tokens.is_complete() {
            return Err(GateError::Provider(
                "code exchange returned an incomplete token pair".to_string(),
            ));
        }
        Ok(tokens)
    }

    /// Start an email sign-in.
    pub async fn send_sign_in_link(&self, email: &str) -> Result<()> {
        tokio::time::timeout(self.timeout, self.provider.sign_in_with_otp(email))
            .await
            .map_err(|_| {
                GateError::Provider(format!(
                    "email sign-in timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
    }

    pub fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String> {
        self.provider.authorize_url(provider, redirect_to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_api::Identity;

    struct Scripted {
        delay: Duration,
        rotate_to: Option<SessionTokens>,
    }

    impl IdentityProvider for Scripted {
        async fn set_session(&self, tokens: &SessionTokens) -> Result<ValidatedSession> {
            tokio::time::sleep(self.delay).await;
            if tokens.access_token != "good" {
                return Err(GateError::Provider("invalid JWT".to_string()));
            }
            Ok(ValidatedSession {
                tokens: self.rotate_to.clone().unwrap_or_else(|| tokens.clone()),
                identity: Identity {
                    user_id: "u-1".to_string(),
                    email: Some("ada@example.com".to_string()),
                },
            })
        }

        async fn exchange_code_for_session(&self, code: &str) -> Result<SessionTokens> {
            tokio::time::sleep(self.delay).await;
            match code {
                "good-code" => Ok(SessionTokens::new("good", "r")),
                "half-code" => Ok(SessionTokens::new("good", "")),
                _ => Err(GateError::Provider("bad code".to_string())),
            }
        }

        async fn sign_in_with_otp(&self, _email: &str) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    fn validator(rotate_to: Option<SessionTokens>) -> SessionValidator<Scripted> {
        SessionValidator::new(Scripted {
            delay: Duration::ZERO,
            rotate_to,
        })
    }

    #[tokio::test]
    async fn accepted_pair_is_valid() {
        let v = validator(None);
        match v.refresh(&SessionTokens::new("good", "r")).await {
            Validation::Valid(session) => {
                assert_eq!(session.identity.email.as_deref(), Some("ada@example.com"));
                assert_eq!(session.tokens, SessionTokens::new("good", "r"));
            }
            Validation::Invalid => panic!("expected a valid session"),
        }
    }

    #[tokio::test]
    async fn rotated_pair_is_returned() {
        let v = validator(Some(SessionTokens::new("good", "rotated")));
        let Validation::Valid(session) = v.refresh(&SessionTokens::new("good", "r")).await else {
            panic!("expected a valid session");
        };
        assert_eq!(session.tokens.refresh_token, "rotated");
    }

    #[tokio::test]
    async fn provider_errors_are_invalid() {
        let v = validator(None);
        assert_eq!(
            v.refresh(&SessionTokens::new("expired", "r")).await,
            Validation::Invalid
        );
    }

    #[tokio::test]
    async fn incomplete_pair_is_invalid() {
        let v = validator(Some(SessionTokens::new("good", "")));
        assert!(!v.refresh(&SessionTokens::new("good", "r")).await.is_valid());
    }

    #[tokio::test]
    async fn timeout_is_invalid() {
        let v = SessionValidator::new(Scripted {
            delay: Duration::from_secs(5),
            rotate_to: None,
        })
        .with_timeout(Duration::from_millis(10));
        assert_eq!(
            v.refresh(&SessionTokens::new("good", "r")).await,
            Validation::Invalid
        );
        assert!(v.exchange("good-code").await.is_err());
    }

    #[tokio::test]
    async fn exchange_returns_complete_pairs_only() {
        let v = validator(None);
        assert_eq!(
            v.exchange("good-code").await.unwrap(),
            SessionTokens::new("good", "r")
        );
        assert!(v.exchange("half-code").await.is_err());
        assert!(v.exchange("nope").await.is_err());
    }

    #[tokio::test]
    async fn sign_in_link_is_bounded_by_the_timeout() {
        assert!(validator(None).send_sign_in_link("ada@example.com").await.is_ok());

        let slow = SessionValidator::new(Scripted {
            delay: Duration::from_secs(5),
            rotate_to: None,
        })
        .with_timeout(Duration::from_millis(10));
        assert!(slow.send_sign_in_link("ada@example.com").await.is_err());
    }

    #[test]
    fn oauth_is_unsupported_unless_the_provider_offers_it() {
        let err = validator(None)
            .authorize_url("github", "http://localhost/api/auth/callback")
            .unwrap_err();
        assert!(err.to_string().contains("github"));
    }
}
