use super::*;

#[derive(Debug, PartialEq)]
pub struct Authorize {
    pub username: Username,
    pub password: Option<String>,
}

impl Serialize for Authorize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.password.is_some() { 2 } else { 1 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.username)?;
        if let Some(pass) = &self.password {
            seq.serialize_element(pass)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Authorize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (username, password) = <(Username, Option<String>)>::deserialize(deserializer)?;
        Ok(Authorize { username, password })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_password() {
        let authorize: Authorize =
            serde_json::from_str(r#"["bc1qexample.worker1","x"]"#).unwrap();
        assert_eq!(authorize.username.as_str(), "bc1qexample.worker1");
        assert_eq!(authorize.password.as_deref(), Some("x"));
    }

    #[test]
    fn password_is_optional() {
        let authorize: Authorize = serde_json::from_str(r#"["bc1qexample"]"#).unwrap();
        assert_eq!(authorize.username.as_str(), "bc1qexample");
        assert_eq!(authorize.password, None);
    }
}
