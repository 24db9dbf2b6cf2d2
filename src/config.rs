use std::env;

use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    handshake::client::Request,
    http::{header::AUTHORIZATION, HeaderValue},
};
use url::Url;

use crate::error::{config, ChatErr, ChatResult};

pub const DEFAULT_PAGE_ORIGIN: &str = "http://localhost:8000";
const WS_PATH: &str = "/ws";

/// Where the chat server lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Explicit server base, e.g. `https://chat.example.com`. When unset the
    /// host of `page_origin` is used.
    pub api_url:     Option<String>,
    /// Origin the UI was served from. Its scheme picks ws vs wss.
    pub page_origin: String,
    /// Bearer token from the auth collaborator, sent on the handshake.
    pub token:       Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { api_url: None, page_origin: DEFAULT_PAGE_ORIGIN.into(), token: None }
    }
}

impl ChatConfig {
    /// `CHAT_API_URL`, `CHAT_PAGE_ORIGIN`, `CHAT_TOKEN`. Empty values count as unset.
    pub fn from_env() -> Self {
        let var = |k: &str| env::var(k).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_url:     var("CHAT_API_URL"),
            page_origin: var("CHAT_PAGE_ORIGIN").unwrap_or_else(|| DEFAULT_PAGE_ORIGIN.into()),
            token:       var("CHAT_TOKEN"),
        }
    }

    /// `ws[s]://<host>/ws?roomId=<room>`; the scheme mirrors the page.
    pub fn endpoint(&self, room_id: &str) -> ChatResult<Url> {
        if room_id.trim().is_empty() {
            return Err(config("room id must not be empty"));
        }
        let page = Url::parse(&self.page_origin)?;
        let scheme = if page.scheme() == "https" { "wss" } else { "ws" };

        let host = match self.api_url.as_deref() {
            Some(api) => strip_http(api).trim_end_matches('/').to_string(),
            None => {
                let host = page
                    .host_str()
                    .ok_or_else(|| config(format!("page origin {} has no host", self.page_origin)))?;
                match page.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                }
            }
        };
        if host.is_empty() {
            return Err(config("chat host is empty"));
        }

        let mut url = Url::parse(&format!("{scheme}://{host}{WS_PATH}"))?;
        url.query_pairs_mut().append_pair("roomId", room_id);
        Ok(url)
    }

    /// Handshake request for `room_id`, carrying the bearer token if any.
    pub fn request(&self, room_id: &str) -> ChatResult<Request> {
        let mut req = self.endpoint(room_id)?.as_str().into_client_request()?;
        if let Some(token) = self.token.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(config)?;
            req.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(req)
    }
}

fn strip_http(s: &str) -> &str {
    s.strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(s)
}

impl TryFrom<&str> for ChatConfig {
    type Error = ChatErr;

    /// Shorthand for tests and tools: a page origin with no api override.
    fn try_from(page_origin: &str) -> ChatResult<Self> {
        Url::parse(page_origin)?;
        Ok(Self { page_origin: page_origin.into(), ..Self::default() })
    }
}
