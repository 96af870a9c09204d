//! Stateless password reset links.
//!
//! A reset link carries two path segments:
//!
//! - `uidb64`: the user ID in URL-safe base64 without padding
//! - `token`: `{timestamp_base36}-{hmac_hex}`
//!
//! The HMAC-SHA256 is keyed by the server secret and covers the user ID, the
//! current password hash, the last login time, the timestamp and the email.
//! Changing the password or logging in therefore invalidates outstanding
//! links, and links expire after the configured timeout.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use ecommerce_core::UserId;

use crate::models::User;

type HmacSha256 = Hmac<Sha256>;

const KEY_SALT: &str = "ecommerce.password-reset";

/// Encode a user ID for a reset link.
#[must_use]
pub fn encode_uid(id: UserId) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

/// Decode the `uidb64` segment of a reset link.
#[must_use]
pub fn decode_uid(uidb64: &str) -> Option<UserId> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}

/// Generates and checks reset tokens.
pub struct PasswordResetTokens {
    secret: SecretString,
    timeout: Duration,
}

impl PasswordResetTokens {
    #[must_use]
    pub const fn new(secret: SecretString, timeout: Duration) -> Self {
        Self { secret, timeout }
    }

    /// Make a token for a user and their current password hash.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLength` if the signing key is rejected.
    pub fn make_token(
        &self,
        user: &User,
        password_hash: Option<&str>,
    ) -> Result<String, InvalidLength> {
        self.make_token_at(user, password_hash, Utc::now().timestamp())
    }

    /// Check a token against the user's current state.
    #[must_use]
    pub fn check_token(&self, user: &User, password_hash: Option<&str>, token: &str) -> bool {
        self.check_token_at(user, password_hash, token, Utc::now().timestamp())
    }

    fn make_token_at(
        &self,
        user: &User,
        password_hash: Option<&str>,
        timestamp: i64,
    ) -> Result<String, InvalidLength> {
        let ts = to_base36(u64::try_from(timestamp).unwrap_or(0));
        let mac = self.mac(user, password_hash, timestamp)?;
        Ok(format!("{ts}-{}", hex::encode(mac.finalize().into_bytes())))
    }

    fn check_token_at(
        &self,
        user: &User,
        password_hash: Option<&str>,
        token: &str,
        now: i64,
    ) -> bool {
        let Some((ts, signature)) = token.split_once('-') else {
            return false;
        };
        let Some(timestamp) = from_base36(ts).and_then(|t| i64::try_from(t).ok()) else {
            return false;
        };
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };

        let Ok(mac) = self.mac(user, password_hash, timestamp) else {
            return false;
        };
        // Constant-time comparison
        if mac.verify_slice(&signature).is_err() {
            return false;
        }

        let age = now - timestamp;
        let timeout = i64::try_from(self.timeout.as_secs()).unwrap_or(i64::MAX);
        (0..=timeout).contains(&age)
    }

    fn mac(
        &self,
        user: &User,
        password_hash: Option<&str>,
        timestamp: i64,
    ) -> Result<HmacSha256, InvalidLength> {
        let key = format!("{KEY_SALT}{}", self.secret.expose_secret());
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())?;

        let last_login = user
            .last_login
            .map(|t: DateTime<Utc>| t.timestamp_micros().to_string())
            .unwrap_or_default();
        let email = user.email.as_ref().map(|e| e.as_str()).unwrap_or_default();

        mac.update(
            format!(
                "{}{}{last_login}{timestamp}{email}",
                user.id,
                password_hash.unwrap_or_default()
            )
            .as_bytes(),
        );
        Ok(mac)
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[usize::try_from(n % 36).unwrap_or(0)]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn from_base36(s: &str) -> Option<u64> {
    if s.is_empty() || s.len() > 13 {
        return None;
    }
    u64::from_str_radix(s, 36).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use ecommerce_core::{Email, Username};

    use super::*;

    const HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA";
    const NOW: i64 = 1_700_000_000;

    fn user() -> User {
        User {
            id: UserId::new(42),
            username: Username::parse("alice").unwrap(),
            email: Some(Email::parse("alice@example.com").unwrap()),
            phone_number: None,
            is_verified: true,
            is_active: true,
            is_staff: false,
            last_login: Some(Utc.timestamp_opt(1_690_000_000, 0).unwrap()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn tokens() -> PasswordResetTokens {
        PasswordResetTokens::new(
            SecretString::from("k3Jq9!vR2#mXw8@Lp5$Tz7&Yb4^Hn6*Df"),
            Duration::from_secs(3600),
        )
    }

    #[test]
    fn test_uid_roundtrip() {
        let encoded = encode_uid(UserId::new(42));
        assert_eq!(encoded, "NDI");
        assert_eq!(decode_uid(&encoded), Some(UserId::new(42)));
        assert_eq!(decode_uid("NDI="), Some(UserId::new(42)));
        assert_eq!(decode_uid("!!!"), None);
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("abc")), None);
    }

    #[test]
    fn test_token_valid() {
        let tokens = tokens();
        let user = user();
        let token = tokens.make_token_at(&user, Some(HASH), NOW).unwrap();
        assert!(token.starts_with(&format!("{}-", to_base36(1_700_000_000))));
        assert!(tokens.check_token_at(&user, Some(HASH), &token, NOW + 10));
    }

    #[test]
    fn test_token_invalid_after_password_change() {
        let tokens = tokens();
        let user = user();
        let token = tokens.make_token_at(&user, Some(HASH), NOW).unwrap();
        assert!(!tokens.check_token_at(&user, Some("$argon2id$other"), &token, NOW));
    }

    #[test]
    fn test_token_invalid_after_login() {
        let tokens = tokens();
        let mut user = user();
        let token = tokens.make_token_at(&user, Some(HASH), NOW).unwrap();
        user.last_login = Some(Utc.timestamp_opt(NOW + 5, 0).unwrap());
        assert!(!tokens.check_token_at(&user, Some(HASH), &token, NOW + 10));
    }

    #[test]
    fn test_token_expires() {
        let tokens = tokens();
        let user = user();
        let token = tokens.make_token_at(&user, Some(HASH), NOW).unwrap();
        assert!(tokens.check_token_at(&user, Some(HASH), &token, NOW + 3600));
        assert!(!tokens.check_token_at(&user, Some(HASH), &token, NOW + 3601));
    }

    #[test]
    fn test_token_malformed() {
        let tokens = tokens();
        let user = user();
        for bad in ["", "abc", "-", "zz-nothex", "1-00"] {
            assert!(!tokens.check_token_at(&user, Some(HASH), bad, NOW));
        }
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(from_base36("10"), Some(36));
        assert_eq!(from_base36(""), None);
    }
}
