use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// One of the independent live feeds the service fans out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    /// Likes, comments, reposts, follows, mentions
    Notifications,
    /// Direct messages
    Messages,
}

impl Feed {
    pub const ALL: [Feed; 2] = [Feed::Notifications, Feed::Messages];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Notifications => "notifications",
            Feed::Messages => "messages",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFeed(pub String);

impl FromStr for Feed {
    type Err = UnknownFeed;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notifications" => Ok(Feed::Notifications),
            "messages" => Ok(Feed::Messages),
            other => Err(UnknownFeed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed() {
        assert_eq!("notifications".parse::<Feed>(), Ok(Feed::Notifications));
        assert_eq!("messages".parse::<Feed>(), Ok(Feed::Messages));
        assert!("posts".parse::<Feed>().is_err());
    }
}
