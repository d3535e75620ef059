//! Pattern extraction of the per-session values the router embeds in its pages
//!
//! The web UI has no API, so the login secret and the anti-forgery token are
//! scraped out of the served HTML. Each value has exactly one pattern here.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExtractionError;

/// `hmac(..., __pass.value, "<secret>")` inside the login page script
static HMAC_SECRET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"__pass\.value,\s+"(\w+?)""#).expect("HMAC_SECRET_RE should compile"));

/// Hidden form token input, in the exact shape the firmware renders it
static FORM_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input type=hidden name="__formtok" value="(\w+?)">"#).expect("FORM_TOKEN_RE should compile")
});

/// Key material for the login hash, valid for one authentication attempt
#[derive(Clone, PartialEq, Eq)]
pub struct HmacSecret(Vec<u8>);

impl HmacSecret {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for HmacSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HmacSecret(..)")
    }
}

/// Anti-forgery token handed out after login
#[derive(Clone, PartialEq, Eq)]
pub struct FormToken(String);

impl FormToken {
    /// Placeholder sent where the firmware expects a token but none is issued yet
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FormToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FormToken(..)")
    }
}

/// Extract the HMAC secret from the login page
pub fn extract_hmac_secret(page_body: &str) -> Result<HmacSecret, ExtractionError> {
    let caps = HMAC_SECRET_RE
        .captures(page_body)
        .ok_or_else(ExtractionError::secret_not_found)?;
    let secret = caps.get(1).ok_or_else(ExtractionError::secret_not_found)?;
    Ok(HmacSecret(secret.as_str().as_bytes().to_vec()))
}

/// Extract the `__formtok` value from a post-login page
pub fn extract_form_token(page_body: &str) -> Result<FormToken, ExtractionError> {
    FORM_TOKEN_RE
        .captures(page_body)
        .and_then(|caps| caps.get(1))
        .map(|m| FormToken(m.as_str().to_string()))
        .ok_or_else(ExtractionError::token_not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionErrorKind;

    const LOGIN_PAGE: &str = r#"<html><head><script>
function doLogin() {
    document.forms[0].__hash.value = hmac(document.forms[0].__user.value + document.forms[0].__pass.value, "abc123");
}
function unused() { hmac(x.__pass.value, "nope!"); }
</script></head><body><form method=post>
<input type=hidden name="__formtok" value="">
</form></body></html>"#;

    #[test]
    fn test_extract_hmac_secret() {
        let secret = extract_hmac_secret(LOGIN_PAGE).unwrap();
        assert_eq!(secret.as_bytes(), b"abc123");
    }

    #[test]
    fn test_extract_hmac_secret_tolerates_whitespace_runs() {
        let page = "x.__pass.value,\n\t  \"Zz_09\")";
        assert_eq!(extract_hmac_secret(page).unwrap().as_bytes(), b"Zz_09");
    }

    #[test]
    fn test_extract_hmac_secret_missing() {
        let err = extract_hmac_secret("<html><body>Welcome</body></html>").unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::SecretNotFound);
    }

    #[test]
    fn test_extract_hmac_secret_malformed() {
        // No whitespace after the comma
        assert!(extract_hmac_secret(r#"__pass.value,"abc123""#).is_err());
        // Value is not a word token
        assert!(extract_hmac_secret(r#"__pass.value, "abc-123""#).is_err());
        // Empty value
        assert!(extract_hmac_secret(r#"__pass.value, """#).is_err());
        // Unescaped dot must not match any character
        assert!(extract_hmac_secret(r#"__passXvalue, "abc123""#).is_err());
    }

    #[test]
    fn test_extract_form_token() {
        let page = r#"<form><input type=hidden name="__formtok" value="f00dBEEF_1"><input name="x"></form>"#;
        assert_eq!(extract_form_token(page).unwrap().as_str(), "f00dBEEF_1");
    }

    #[test]
    fn test_extract_form_token_requires_exact_tag_shape() {
        let cases = [
            r#"<input type="hidden" name="__formtok" value="abc">"#,
            r#"<input type=hidden name='__formtok' value='abc'>"#,
            r#"<input type=hidden name="__formtok" value="abc" id="t">"#,
            r#"<input type=hidden name="__formtoken" value="abc">"#,
            r#"<input type=hidden name="__formtok" value="">"#,
        ];
        for page in cases {
            let err = extract_form_token(page).unwrap_err();
            assert_eq!(err.kind, ExtractionErrorKind::TokenNotFound, "page: {}", page);
        }
    }

    #[test]
    fn test_secrets_are_not_printed() {
        let secret = extract_hmac_secret(LOGIN_PAGE).unwrap();
        assert_eq!(format!("{:?}", secret), "HmacSecret(..)");
    }
}
