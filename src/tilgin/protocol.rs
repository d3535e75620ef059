//! Wire-level description of the Tilgin web management forms

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use super::extract::{FormToken, HmacSecret};

type HmacSha1 = Hmac<Sha1>;

pub const FIELD_FORM_TOKEN: &str = "__formtok";
pub const FIELD_AUTH: &str = "__auth";
pub const FIELD_USER: &str = "__user";
pub const FIELD_HASH: &str = "__hash";
pub const FIELD_FORM: &str = "__form";

/// Firmware generation of the router web UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ProtocolVariant {
    /// Login answers with a `__formtok` that must accompany the restart form
    FormToken,
    /// Older firmware: restart is posted to the index with an empty token
    Legacy,
}

impl ProtocolVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVariant::FormToken => "form_token",
            ProtocolVariant::Legacy => "legacy",
        }
    }
}

/// Paths and capabilities the sequencer needs to talk to one firmware variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub requires_form_token: bool,
    pub restart_path: &'static str,
}

impl Protocol {
    pub fn for_variant(variant: ProtocolVariant) -> Self {
        match variant {
            ProtocolVariant::FormToken => Self {
                requires_form_token: true,
                restart_path: "/tools/restart",
            },
            ProtocolVariant::Legacy => Self {
                requires_form_token: false,
                restart_path: "",
            },
        }
    }

    /// Login form. The token field is always an empty placeholder: the
    /// firmware only issues a token once the session is authenticated.
    pub fn login_form(&self, username: &str, hash: String) -> Vec<(&'static str, String)> {
        vec![
            (FIELD_FORM_TOKEN, String::new()),
            (FIELD_AUTH, "login".to_string()),
            (FIELD_USER, username.to_string()),
            (FIELD_HASH, hash),
        ]
    }

    pub fn restart_form(&self, token: &FormToken) -> Vec<(&'static str, String)> {
        vec![
            (FIELD_FORM_TOKEN, token.as_str().to_string()),
            (FIELD_FORM, "restart".to_string()),
        ]
    }
}

/// `hex(HMAC-SHA1(secret, username || password))`, as computed by the login page script
pub fn credential_hash(secret: &HmacSecret, username: &str, password: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(username.as_bytes());
    mac.update(password.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
