//! `dictation-relay://record` style deep links.

use thiserror::Error;
use url::Url;

pub const URL_SCHEME: &str = "dictation-relay";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepLink {
    /// Start a recording on the primary process.
    Record,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeepLinkError {
    #[error("not a URL: {0}")]
    Malformed(String),

    #[error("unsupported scheme `{0}`")]
    Scheme(String),

    #[error("unknown action `{0}`")]
    Action(String),
}

impl DeepLink {
    pub fn parse(raw: &str) -> Result<Self, DeepLinkError> {
        let url = Url::parse(raw.trim()).map_err(|e| DeepLinkError::Malformed(e.to_string()))?;

        if !url.scheme().eq_ignore_ascii_case(URL_SCHEME) {
            return Err(DeepLinkError::Scheme(url.scheme().to_string()));
        }

        match url.host_str() {
            Some(host) if host.eq_ignore_ascii_case("record") => Ok(DeepLink::Record),
            Some(host) => Err(DeepLinkError::Action(host.to_string())),
            None => Err(DeepLinkError::Action(String::new())),
        }
    }

    pub fn url(self) -> String {
        match self {
            DeepLink::Record => format!("{URL_SCHEME}://record"),
        }
    }
}

impl std::str::FromStr for DeepLink {
    type Err = DeepLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_link_parses() {
        assert_eq!(DeepLink::parse("dictation-relay://record"), Ok(DeepLink::Record));
        assert_eq!(DeepLink::parse("dictation-relay://record/"), Ok(DeepLink::Record));
        assert_eq!("DICTATION-RELAY://RECORD".parse(), Ok(DeepLink::Record));
    }

    #[test]
    fn url_round_trips() {
        assert_eq!(DeepLink::parse(&DeepLink::Record.url()), Ok(DeepLink::Record));
    }

    #[test]
    fn other_schemes_and_hosts_are_rejected() {
        assert_eq!(
            DeepLink::parse("https://record"),
            Err(DeepLinkError::Scheme("https".into()))
        );
        assert_eq!(
            DeepLink::parse("dictation-relay://settings"),
            Err(DeepLinkError::Action("settings".into()))
        );
        assert!(matches!(
            DeepLink::parse("record"),
            Err(DeepLinkError::Malformed(_))
        ));
    }
}
