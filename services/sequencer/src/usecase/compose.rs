//! Message composition: personalisation, tracking injection, subject
//! normalisation and RFC 2822 encoding.

use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::Utc;
use regex::Regex;

use crate::domain::types::{Contact, Sender};

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*(["'])(https?://[^"']+)(["'])"#).expect("valid href regex")
    })
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|amp|lt|gt|quot|apos);")
            .expect("valid entity regex")
    })
}

fn reply_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(\s*re\s*:\s*)+").expect("valid reply prefix regex"))
}

/// Substitute `{{first_name}}`, `{{last_name}}`, `{{email}}` and `{{company}}`.
/// Missing fields become empty strings.
pub fn personalize(template: &str, contact: &Contact) -> String {
    template
        .replace("{{first_name}}", contact.first_name.as_deref().unwrap_or_default())
        .replace("{{last_name}}", contact.last_name.as_deref().unwrap_or_default())
        .replace("{{email}}", &contact.email)
        .replace("{{company}}", contact.company.as_deref().unwrap_or_default())
}

pub fn open_pixel_url(base_url: &str, hash: &str) -> String {
    format!("{}/t/o/{hash}.gif", base_url.trim_end_matches('/'))
}

/// Resolve the character references an attribute value may carry, so the
/// redirector receives the URL the browser would have followed.
fn decode_entities(value: &str) -> std::borrow::Cow<'_, str> {
    entity_re().replace_all(value, |caps: &regex::Captures<'_>| {
        let entity = &caps[1];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => {
                let code = match entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => entity[1..].parse().ok(),
                };
                code.and_then(char::from_u32)
            }
        };
        decoded.map_or_else(|| caps[0].to_owned(), String::from)
    })
}

pub fn click_url(base_url: &str, hash: &str, target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("{}/t/c/{hash}?url={encoded}", base_url.trim_end_matches('/'))
}

/// Produce the recipient-facing body: every absolute http(s) link is routed
/// through the click redirector and an open pixel is appended.
pub fn inject_tracking(html: &str, base_url: &str, hash: &str) -> String {
    let tracked_prefix = format!("{}/t/", base_url.trim_end_matches('/'));
    let rewritten = href_re().replace_all(html, |caps: &regex::Captures<'_>| {
        let target = &caps[2];
        if target.starts_with(&tracked_prefix) {
            return caps[0].to_owned();
        }
        format!(
            "href={}{}{}",
            &caps[1],
            click_url(base_url, hash, &decode_entities(target)),
            &caps[3]
        )
    });

    let pixel = format!(
        r#"<img src="{}" width="1" height="1" alt="" style="display:none" />"#,
        open_pixel_url(base_url, hash)
    );
    match rewritten.rfind("</body>") {
        Some(idx) => format!("{}{pixel}{}", &rewritten[..idx], &rewritten[idx..]),
        None => format!("{rewritten}{pixel}"),
    }
}

/// Strip any run of leading `Re:` prefixes and add exactly one when replying.
pub fn normalize_subject(subject: &str, is_reply: bool) -> String {
    let bare = reply_prefix_re().replace(subject, "");
    let bare = bare.trim();
    if is_reply {
        format!("Re: {bare}")
    } else {
        bare.to_owned()
    }
}

/// RFC 2047 B-encoding for header values that are not plain ASCII.
pub fn encode_header_word(value: &str) -> String {
    if value.is_ascii() {
        value.to_owned()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Fold control characters, CR and LF included, into spaces so a value
/// cannot terminate its header line.
fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

pub fn new_message_id(sender_email: &str) -> String {
    let domain = sender_email
        .rsplit_once('@')
        .map(|(_, d)| d)
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost");
    format!("<{}@{domain}>", uuid::Uuid::new_v4())
}

fn format_address(sender: &Sender) -> String {
    let email = single_line(&sender.email);
    match sender.display_name.as_deref().map(single_line) {
        Some(name) if name.trim().is_empty() => email,
        Some(name) if name.is_ascii() => format!("\"{}\" <{email}>", name.replace('"', "")),
        Some(name) => format!("{} <{email}>", encode_header_word(&name)),
        None => email,
    }
}

fn wrap_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / 38);
    for (i, chunk) in encoded.as_bytes().chunks(76).enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        // base64 output is ASCII.
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
    }
    out
}

/// A single-part HTML message ready for encoding.
#[derive(Debug, Clone)]
pub struct MessageDraft<'a> {
    pub from: &'a Sender,
    pub to: &'a str,
    /// Already normalised; encoded on output.
    pub subject: &'a str,
    pub html: &'a str,
    pub message_id: &'a str,
    pub in_reply_to: Option<&'a str>,
    pub references: &'a [String],
}

impl MessageDraft<'_> {
    pub fn to_rfc2822(&self) -> String {
        let mut headers = vec![
            format!("From: {}", format_address(self.from)),
            format!("To: {}", single_line(self.to)),
            format!("Subject: {}", encode_header_word(&single_line(self.subject))),
            format!("Date: {}", Utc::now().to_rfc2822()),
            format!("Message-ID: {}", single_line(self.message_id)),
        ];
        if let Some(parent) = self.in_reply_to {
            headers.push(format!("In-Reply-To: {}", single_line(parent)));
        }
        if !self.references.is_empty() {
            headers.push(format!(
                "References: {}",
                single_line(&self.references.join(" "))
            ));
        }
        headers.push("MIME-Version: 1.0".to_owned());
        headers.push("Content-Type: text/html; charset=\"UTF-8\"".to_owned());
        headers.push("Content-Transfer-Encoding: base64".to_owned());

        format!(
            "{}\r\n\r\n{}",
            headers.join("\r\n"),
            wrap_base64(self.html.as_bytes())
        )
    }

    /// Base64url (no padding) of the RFC 2822 text, as the provider API expects.
    pub fn encode_raw(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_rfc2822().as_bytes())
    }
}
