use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use url::{Url, form_urlencoded};

use super::types::{WebSocketError, WebSocketResult};

/// Placeholder replaced by the encoded subject id.
pub const SUBJECT_PLACEHOLDER: &str = "{subject}";

/// Bytes escaped when the subject fills a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Endpoint URL template for one channel, e.g. `wss://crm.example.com` + `/ws/notify?u={subject}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelEndpoint {
    base_url: String,
    path_template: String,
}

impl ChannelEndpoint {
    pub fn new(base_url: impl Into<String>, path_template: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path_template: path_template.into(),
        }
    }

    /// Substitute the subject id and validate the result as a ws/wss URL.
    pub fn resolve(&self, subject: &str) -> WebSocketResult<String> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(WebSocketError::InvalidState(
                "subject id is empty".to_string(),
            ));
        }

        // Path segments take percent-encoding; the query takes form encoding.
        let (path, query) = match self.path_template.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.path_template.as_str(), None),
        };
        let segment = utf8_percent_encode(subject, PATH_SEGMENT).to_string();
        let mut path = path.replace(SUBJECT_PLACEHOLDER, &segment);
        if let Some(query) = query {
            let form: String = form_urlencoded::byte_serialize(subject.as_bytes()).collect();
            path.push('?');
            path.push_str(&query.replace(SUBJECT_PLACEHOLDER, &form));
        }
        let raw = format!("{}{}", self.base_url.trim_end_matches('/'), path);

        let url = Url::parse(&raw).map_err(|err| WebSocketError::InvalidUrl(format!("{raw}: {err}")))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url.to_string()),
            other => Err(WebSocketError::InvalidUrl(format!(
                "{raw}: unsupported scheme {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_subject_in_path_and_query() {
        let alerts = ChannelEndpoint::new(
            "wss://crm.example.com/",
            "/api/v1/ws/notification/{subject}",
        );
        assert_eq!(
            alerts.resolve("EMP042").unwrap(),
            "wss://crm.example.com/api/v1/ws/notification/EMP042"
        );

        let unread = ChannelEndpoint::new("wss://crm.example.com", "/ws/notify?u={subject}");
        assert_eq!(
            unread.resolve(" a&b ").unwrap(),
            "wss://crm.example.com/ws/notify?u=a%26b"
        );
    }

    #[test]
    fn path_placeholder_uses_percent_encoding() {
        let alerts = ChannelEndpoint::new("wss://crm.example.com", "/api/v1/ws/notification/{subject}");
        assert_eq!(
            alerts.resolve("A B").unwrap(),
            "wss://crm.example.com/api/v1/ws/notification/A%20B"
        );
        assert_eq!(
            alerts.resolve("a/b+c").unwrap(),
            "wss://crm.example.com/api/v1/ws/notification/a%2Fb+c"
        );

        let unread = ChannelEndpoint::new("wss://crm.example.com", "/ws/notify?u={subject}");
        assert_eq!(
            unread.resolve("A B").unwrap(),
            "wss://crm.example.com/ws/notify?u=A+B"
        );
    }

    #[test]
    fn rejects_empty_subject_and_bad_scheme() {
        let endpoint = ChannelEndpoint::new("wss://crm.example.com", "/ws/{subject}");
        assert!(matches!(
            endpoint.resolve("   "),
            Err(WebSocketError::InvalidState(_))
        ));

        let http = ChannelEndpoint::new("https://crm.example.com", "/ws/{subject}");
        assert!(matches!(
            http.resolve("E1"),
            Err(WebSocketError::InvalidUrl(_))
        ));
    }
}
