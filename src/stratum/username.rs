use super::*;

/// The dotted `address.worker` login miners put in `mining.authorize` and
/// `mining.submit`. The address part is taken on faith; payout script
/// derivation decides what it is worth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.trim_matches('"')
    }

    /// Everything before the first dot.
    pub fn address(&self) -> &str {
        self.as_str()
            .split_once('.')
            .map(|(address, _)| address)
            .unwrap_or_else(|| self.as_str())
    }

    /// Everything after the first dot, defaulting to `"default"`.
    pub fn worker(&self) -> &str {
        match self.as_str().split_once('.') {
            Some((_, worker)) if !worker.is_empty() => worker,
            _ => "default",
        }
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Username {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_only() {
        let username = Username::new("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
        assert_eq!(
            username.address(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
        assert_eq!(username.worker(), "default");
    }

    #[test]
    fn address_with_worker() {
        let username = Username::new("3EktnHQD7RiAE6uzMj2ZifT9YgRrkSgzQX.worker1");
        assert_eq!(username.address(), "3EktnHQD7RiAE6uzMj2ZifT9YgRrkSgzQX");
        assert_eq!(username.worker(), "worker1");
    }

    #[test]
    fn split_happens_at_the_first_dot() {
        let username = Username::new("addr.rig.3");
        assert_eq!(username.address(), "addr");
        assert_eq!(username.worker(), "rig.3");
    }

    #[test]
    fn trailing_dot_means_default_worker() {
        let username = Username::new("addr.");
        assert_eq!(username.address(), "addr");
        assert_eq!(username.worker(), "default");
    }

    #[test]
    fn strips_stray_quotes() {
        let username = Username::new("\"1CPDJtMzuSyvnGi8o9ZAtAWPfqHZhjQQhB.worker1\"");
        assert_eq!(username.address(), "1CPDJtMzuSyvnGi8o9ZAtAWPfqHZhjQQhB");
        assert_eq!(username.worker(), "worker1");
    }

    #[test]
    fn serialize_round_trip() {
        let username = Username::new("bc1qexample.worker1");
        let json = serde_json::to_string(&username).unwrap();
        assert_eq!(json, r#""bc1qexample.worker1""#);
        assert_eq!(serde_json::from_str::<Username>(&json).unwrap(), username);
    }
}
