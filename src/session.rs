use crate::bus::envelope::{Message, SourceId};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

pub const SESSION_QUERY_KEY: &str = "session";
pub const ROLE_QUERY_KEY: &str = "role";

/// Assigned when a window is opened, never inferred from traffic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Source,
    Mirror,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Mirror => "mirror",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "source" => Some(Role::Source),
            "mirror" => Some(Role::Mirror),
            _ => None,
        }
    }

    fn page(self) -> &'static str {
        match self {
            Role::Source => "present",
            Role::Mirror => "presenter",
        }
    }

    pub fn may_post(self, message: &Message) -> bool {
        self == Role::Source || !message.is_authoritative()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub source_id: SourceId,
    pub role: Role,
}

impl Identity {
    pub fn new(role: Role) -> Self {
        Self {
            source_id: SourceId::generate(),
            role,
        }
    }
}

pub fn slide_topic(session_id: &str) -> String {
    format!("session-{session_id}")
}

pub fn drawing_topic(session_id: &str) -> String {
    format!("session-{session_id}-drawing")
}

/// What a freshly opened window learns from its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pub session_id: String,
    pub role: Role,
}

impl LaunchParams {
    pub fn new(session_id: impl Into<String>, role: Role) -> Self {
        Self {
            session_id: session_id.into(),
            role,
        }
    }

    pub fn to_url(&self, base: &Url) -> Result<Url> {
        let mut url = base
            .join(self.role.page())
            .with_context(|| format!("join launch page onto {base}"))?;
        url.query_pairs_mut()
            .clear()
            .append_pair(SESSION_QUERY_KEY, &self.session_id)
            .append_pair(ROLE_QUERY_KEY, self.role.as_str());
        Ok(url)
    }

    pub fn from_url(url: &Url) -> Result<Self> {
        let mut session_id = None;
        let mut role = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                SESSION_QUERY_KEY => session_id = Some(value.into_owned()),
                ROLE_QUERY_KEY => {
                    role = Some(
                        Role::parse(&value).ok_or_else(|| anyhow!("unknown window role '{value}'"))?,
                    )
                }
                _ => {}
            }
        }
        let session_id = session_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("launch url {url} has no session id"))?;
        Ok(Self {
            session_id,
            role: role.unwrap_or(Role::Mirror),
        })
    }

    pub fn slide_topic(&self) -> String {
        slide_topic(&self.session_id)
    }

    pub fn drawing_topic(&self) -> String {
        drawing_topic(&self.session_id)
    }
}
