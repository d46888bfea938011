use super::*;

#[derive(Debug, PartialEq, Clone)]
pub struct Configure {
    pub extensions: Vec<String>,
    pub minimum_difficulty_value: Option<f64>,
    pub version_rolling_mask: Option<Version>,
    pub version_rolling_min_bit_count: Option<u32>,
}

impl Configure {
    pub fn requests_version_rolling(&self) -> bool {
        self.extensions.iter().any(|e| e == "version-rolling")
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct ConfigureOptions {
    #[serde(
        rename = "minimum-difficulty.value",
        skip_serializing_if = "Option::is_none"
    )]
    minimum_difficulty_value: Option<f64>,

    #[serde(
        rename = "version-rolling.mask",
        skip_serializing_if = "Option::is_none"
    )]
    version_rolling_mask: Option<Version>,

    #[serde(
        rename = "version-rolling.min-bit-count",
        skip_serializing_if = "Option::is_none"
    )]
    version_rolling_min_bit_count: Option<u32>,
}

impl Serialize for Configure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let opts = ConfigureOptions {
            minimum_difficulty_value: self.minimum_difficulty_value,
            version_rolling_mask: self.version_rolling_mask,
            version_rolling_min_bit_count: self.version_rolling_min_bit_count,
        };

        (&self.extensions, &opts).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Configure {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One((Vec<String>,)),
            Two((Vec<String>, ConfigureOptions)),
        }

        match Raw::deserialize(deserializer)? {
            Raw::One((extensions,)) => Ok(Configure {
                extensions,
                minimum_difficulty_value: None,
                version_rolling_mask: None,
                version_rolling_min_bit_count: None,
            }),
            Raw::Two((extensions, opts)) => Ok(Configure {
                extensions,
                minimum_difficulty_value: opts.minimum_difficulty_value,
                version_rolling_mask: opts.version_rolling_mask,
                version_rolling_min_bit_count: opts.version_rolling_min_bit_count,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_rolling_request() {
        let configure: Configure = serde_json::from_str(
            r#"[["version-rolling"],{"version-rolling.mask":"ffffffff"}]"#,
        )
        .unwrap();

        assert!(configure.requests_version_rolling());
        assert_eq!(
            configure.version_rolling_mask,
            Some("ffffffff".parse().unwrap())
        );
    }

    #[test]
    fn with_options() {
        let configure: Configure = serde_json::from_str(
            r#"[["minimum-difficulty","version-rolling"],{"minimum-difficulty.value":2048,"version-rolling.mask":"00fff000","version-rolling.min-bit-count":2}]"#,
        )
        .unwrap();

        assert!(configure.requests_version_rolling());
        assert_eq!(configure.extensions.len(), 2);
        assert_eq!(configure.minimum_difficulty_value, Some(2048.0));
        assert_eq!(configure.version_rolling_min_bit_count, Some(2));
    }

    #[test]
    fn extensions_only() {
        let configure: Configure =
            serde_json::from_str(r#"[["subscribe-extranonce"]]"#).unwrap();

        assert!(!configure.requests_version_rolling());
        assert_eq!(configure.extensions, vec!["subscribe-extranonce"]);
    }
}
