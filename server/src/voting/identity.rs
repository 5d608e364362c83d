use std::fmt::{self, Display, Formatter};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use super::id::Id;

const TOKEN_LEN: usize = 32;
const MAX_TOKEN_LEN: usize = 128;

/// Which request attribute deduplicates votes. Chosen once, by configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentitySource {
    User,
    Ip,
    Token,
    Anonymous,
}

impl FromStr for IdentitySource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(IdentitySource::User),
            "ip" => Ok(IdentitySource::Ip),
            "token" => Ok(IdentitySource::Token),
            "anonymous" | "none" => Ok(IdentitySource::Anonymous),
            other => Err(format!("expected one of user, ip, token, anonymous; got {other:?}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VoterIdentity {
    User(Id),
    Ip(IpAddr),
    Token(String),
    Anonymous,
}

impl VoterIdentity {
    /// The value stored in `votes.voter`; `None` is never deduplicated.
    pub fn key(&self) -> Option<String> {
        match self {
            VoterIdentity::User(id) => Some(format!("user:{id}")),
            VoterIdentity::Ip(ip) => Some(format!("ip:{ip}")),
            VoterIdentity::Token(token) => Some(format!("token:{token}")),
            VoterIdentity::Anonymous => None,
        }
    }
}

impl Display for VoterIdentity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.key() {
            Some(key) => f.write_str(&key),
            None => f.write_str("anonymous"),
        }
    }
}

/// Everything a request can tell us about who is voting.
#[derive(Clone, Debug, Default)]
pub struct IdentityClaims {
    pub user_id: Option<Id>,
    pub forwarded_for: Option<String>,
    pub peer: Option<SocketAddr>,
    pub token: Option<String>,
}

impl IdentityClaims {
    /// Falls back to a token carried in the request body when no header was sent.
    pub fn with_body_token(mut self, token: Option<String>) -> IdentityClaims {
        if self.token.is_none() {
            self.token = token;
        }
        self
    }

    fn client_ip(&self) -> Option<IpAddr> {
        let forwarded = self
            .forwarded_for
            .as_deref()
            .and_then(|list| list.split(',').next())
            .and_then(|first| first.trim().parse().ok());
        forwarded.or_else(|| self.peer.map(|addr| addr.ip()))
    }

    fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && t.len() <= MAX_TOKEN_LEN)
    }
}

impl IdentitySource {
    /// `None` means the request carries no usable identity for this source.
    pub fn resolve(&self, claims: &IdentityClaims) -> Option<VoterIdentity> {
        match self {
            IdentitySource::User => claims.user_id.map(VoterIdentity::User),
            IdentitySource::Ip => claims.client_ip().map(VoterIdentity::Ip),
            IdentitySource::Token => claims.token().map(|t| VoterIdentity::Token(t.to_string())),
            IdentitySource::Anonymous => Some(VoterIdentity::Anonymous),
        }
    }
}

/// Fresh client-side voter token.
pub fn generate_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_configured_sources() {
        assert_eq!("USER".parse::<IdentitySource>(), Ok(IdentitySource::User));
        assert_eq!(" ip ".parse::<IdentitySource>(), Ok(IdentitySource::Ip));
        assert_eq!("none".parse::<IdentitySource>(), Ok(IdentitySource::Anonymous));
        assert!("cookie".parse::<IdentitySource>().is_err());
    }

    #[test]
    fn ip_prefers_first_forwarded_address() {
        let claims = IdentityClaims {
            forwarded_for: Some(String::from("203.0.113.7, 10.0.0.1")),
            peer: Some("10.0.0.2:5000".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(
            IdentitySource::Ip.resolve(&claims),
            Some(VoterIdentity::Ip("203.0.113.7".parse().unwrap()))
        );

        let claims = IdentityClaims {
            forwarded_for: Some(String::from("garbage")),
            peer: Some("10.0.0.2:5000".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(
            IdentitySource::Ip.resolve(&claims).and_then(|i| i.key()),
            Some(String::from("ip:10.0.0.2"))
        );
    }

    #[test]
    fn user_source_needs_a_session() {
        assert_eq!(IdentitySource::User.resolve(&IdentityClaims::default()), None);

        let id = Id::new();
        let claims = IdentityClaims { user_id: Some(id), ..Default::default() };
        assert_eq!(IdentitySource::User.resolve(&claims), Some(VoterIdentity::User(id)));
    }

    #[test]
    fn token_header_wins_over_body() {
        let claims = IdentityClaims {
            token: Some(String::from("header")),
            ..Default::default()
        }
        .with_body_token(Some(String::from("body")));
        assert_eq!(
            IdentitySource::Token.resolve(&claims),
            Some(VoterIdentity::Token(String::from("header")))
        );

        let claims = IdentityClaims::default().with_body_token(Some(String::from("  ")));
        assert_eq!(IdentitySource::Token.resolve(&claims), None);
    }

    #[test]
    fn anonymous_always_resolves() {
        let identity = IdentitySource::Anonymous.resolve(&IdentityClaims::default());
        assert_eq!(identity, Some(VoterIdentity::Anonymous));
        assert_eq!(VoterIdentity::Anonymous.key(), None);
    }

    #[test]
    fn generated_tokens_are_alphanumeric() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token());
    }
}
