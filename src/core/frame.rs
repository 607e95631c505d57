use bytes::Bytes;

/// Transport-neutral websocket frame type.
///
/// Transports convert their native frame representation into/from `WsFrame`, which keeps the
/// channel logic independent of the websocket implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WsFrame {
    Text(Bytes),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<WsCloseFrame>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WsCloseFrame {
    pub code: u16,
    pub reason: Bytes,
}

impl WsCloseFrame {
    pub fn describe(&self) -> String {
        format!(
            "code={} reason={}",
            self.code,
            String::from_utf8_lossy(self.reason.as_ref())
        )
    }
}

impl WsFrame {
    #[inline]
    pub fn text_static(s: &'static str) -> Self {
        Self::Text(Bytes::from_static(s.as_bytes()))
    }

    #[inline]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(Bytes::from(s.into()))
    }

    /// Text payload as `&str`, if this is a text frame holding valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsFrame::Text(bytes) => std::str::from_utf8(bytes.as_ref()).ok(),
            _ => None,
        }
    }
}
