use std::collections::BTreeMap;

/// A parsed bearer token of the form `key=value|key=value|...`.
///
/// The canonical text used for signature verification ([`AuthToken::text`])
/// excludes the `sig` segment itself; [`AuthToken::token`] retains the full
/// original string including it.
#[derive(Debug, Clone, Default)]
pub struct AuthToken {
    parts: BTreeMap<String, String>,
    text: String,
    token: String,
    binary_signature: Vec<u8>,
    valid: bool,
}

const REQUIRED_KEYS: [&str; 4] = ["un", "SigningSubject", "sig", "expiry"];

impl AuthToken {
    /// Parses `raw` into an `AuthToken`. Parsing never fails outright: a
    /// malformed or incomplete token simply comes back with `valid() == false`.
    pub fn parse(raw: &str) -> AuthToken {
        let mut parts = BTreeMap::new();
        let mut text = String::new();
        let mut binary_signature = Vec::new();
        let mut first = true;

        for segment in raw.split('|') {
            let Some((k, v)) = segment.split_once('=') else {
                continue;
            };
            let v = v.trim_end_matches('\n');

            if k == "sig" {
                if let Some(bytes) = decode_hex(v) {
                    binary_signature = bytes;
                }
            } else {
                if !first {
                    text.push('|');
                }
                first = false;
                text.push_str(k);
                text.push('=');
                text.push_str(v);
            }
            parts.insert(k.to_string(), v.to_string());
        }

        AuthToken {
            parts,
            text,
            token: raw.to_string(),
            binary_signature,
            valid: false,
        }
        .finalize()
    }

    fn finalize(mut self) -> AuthToken {
        self.valid = REQUIRED_KEYS
            .iter()
            .all(|k| self.parts.get(*k).is_some_and(|v| !v.is_empty()));
        self
    }

    /// The user identifier carried by the `un` field.
    pub fn user(&self) -> Option<&str> {
        self.parts.get("un").map(String::as_str)
    }

    /// The URL of the issuer's public-key document.
    pub fn signing_subject(&self) -> Option<&str> {
        self.parts.get("SigningSubject").map(String::as_str)
    }

    /// The hex-encoded signature as presented.
    pub fn signature(&self) -> Option<&str> {
        self.parts.get("sig").map(String::as_str)
    }

    /// The hex-decoded signature bytes.
    pub fn binary_signature(&self) -> &[u8] {
        &self.binary_signature
    }

    /// Absolute expiry, seconds since the epoch.
    pub fn expiry(&self) -> Option<i64> {
        self.parts.get("expiry").and_then(|v| v.parse().ok())
    }

    /// The canonical signed form: all fields except `sig`, in presentation order.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The full raw token string, including `sig`.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// True iff all required fields (`un`, `SigningSubject`, `sig`, `expiry`) were present and non-empty.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// True iff `expiry` has passed relative to `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry().map(|e| e < now).unwrap_or(true)
    }

    /// Marks this token invalid, e.g. after signature verification fails.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_well_formed_token() {
        let raw = "un=alice|SigningSubject=https://auth.example/cert|expiry=99999999999|sig=deadbeef";
        let tok = AuthToken::parse(raw);
        assert!(tok.valid());
        assert_eq!(tok.user(), Some("alice"));
        assert_eq!(tok.binary_signature(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(tok.text(), "un=alice|SigningSubject=https://auth.example/cert|expiry=99999999999");
        assert_eq!(tok.token(), raw);
    }

    #[test]
    fn missing_required_key_is_invalid() {
        let tok = AuthToken::parse("un=alice|expiry=1");
        assert!(!tok.valid());
    }

    #[test]
    fn empty_required_value_is_invalid() {
        let tok = AuthToken::parse("un=|SigningSubject=x|expiry=1|sig=ab");
        assert!(!tok.valid());
    }

    #[test]
    fn expiry_is_checked_against_supplied_now() {
        let tok = AuthToken::parse("un=alice|SigningSubject=x|expiry=100|sig=ab");
        assert!(tok.is_expired(200));
        assert!(!tok.is_expired(50));
    }

    #[test]
    fn garbage_input_is_invalid_not_panicking() {
        let tok = AuthToken::parse("not a token at all");
        assert!(!tok.valid());
    }

    #[test]
    fn sig_in_the_middle_does_not_drop_trailing_fields() {
        let raw = "un=alice|sig=deadbeef|SigningSubject=https://auth.example/cert|expiry=99999999999";
        let tok = AuthToken::parse(raw);
        assert!(tok.valid());
        assert_eq!(tok.binary_signature(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(tok.text(), "un=alice|SigningSubject=https://auth.example/cert|expiry=99999999999");
        assert_eq!(tok.token(), raw);
    }
}
