use std::{
    fmt::{self, Display},
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use url::Url;

use crate::standard::{self, DEFAULT_L1_CONTRACTS_TAG, DEFAULT_L2_CONTRACTS_TAG};

const TAG_SCHEME: &str = "tag://";
const TAG_NAMESPACE: &str = "op-contracts/";
const URL_SCHEMES: [&str; 3] = ["file", "http", "https"];

#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("unsupported scheme")]
    UnsupportedScheme,
    #[error("invalid tag: {0}")]
    InvalidTag(String),
    #[error(transparent)]
    UnknownTag(#[from] standard::StandardError),
    #[error("failed to parse URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid file path: {0}")]
    InvalidPath(String),
}

/// Reference to a contract artifacts bundle: either a registered release tag
/// or a direct `http(s)`/`file` URL.
///
/// Locators compare and serialize through their text form, so a tag and the
/// URL it resolves to are different locators.
#[derive(Debug, Clone)]
pub enum Locator {
    Tag(String),
    Url(Url),
}

impl Locator {
    pub fn from_tag(tag: &str) -> Result<Self, LocatorError> {
        format!("{TAG_SCHEME}{tag}").parse()
    }

    /// Parses a URL, accepting `tag://` references too.
    pub fn from_url(url: &str) -> Result<Self, LocatorError> {
        if let Some(tag) = url.strip_prefix(TAG_SCHEME) {
            return Self::from_tag(tag);
        }
        Ok(Locator::Url(Url::parse(url)?))
    }

    pub fn file(path: impl AsRef<Path>) -> Result<Self, LocatorError> {
        let path = path.as_ref();
        let absolute =
            std::path::absolute(path).map_err(|e| LocatorError::InvalidPath(e.to_string()))?;
        Url::from_file_path(&absolute)
            .map(Locator::Url)
            .map_err(|_| LocatorError::InvalidPath(path.display().to_string()))
    }

    pub fn default_l1() -> Self {
        Locator::Tag(DEFAULT_L1_CONTRACTS_TAG.to_string())
    }

    pub fn default_l2() -> Self {
        Locator::Tag(DEFAULT_L2_CONTRACTS_TAG.to_string())
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Locator::Tag(_))
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Locator::Tag(tag) => Some(tag),
            Locator::Url(_) => None,
        }
    }

    pub fn equal(&self, other: &Locator) -> bool {
        self.to_string() == other.to_string()
    }
}

impl PartialEq for Locator {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl Eq for Locator {}

impl Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Tag(tag) => write!(f, "{TAG_SCHEME}{tag}"),
            Locator::Url(url) => write!(f, "{url}"),
        }
    }
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(tag) = s.strip_prefix(TAG_SCHEME) {
            return parse_tag(tag);
        }

        let supported = URL_SCHEMES
            .iter()
            .any(|scheme| s.strip_prefix(scheme).is_some_and(|r| r.starts_with("://")));
        if !supported {
            return Err(LocatorError::UnsupportedScheme);
        }
        Ok(Locator::Url(Url::parse(s)?))
    }
}

fn parse_tag(tag: &str) -> Result<Locator, LocatorError> {
    if !tag.starts_with(TAG_NAMESPACE) {
        return Err(LocatorError::InvalidTag(tag.to_string()));
    }
    standard::artifacts_url_for_tag(tag)?;
    Ok(Locator::Tag(tag.to_string()))
}

impl Serialize for Locator {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Locator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standard::CONTRACTS_V160_TAG;

    #[test]
    fn unmarshal_text() {
        let cases: [(&str, Option<Locator>); 6] = [
            (
                "tag://op-contracts/v1.6.0",
                Some(Locator::Tag(CONTRACTS_V160_TAG.to_string())),
            ),
            (
                "https://example.com/artifacts.tar.gz",
                Some(Locator::Url(
                    Url::parse("https://example.com/artifacts.tar.gz").unwrap(),
                )),
            ),
            (
                "file:///tmp/artifacts",
                Some(Locator::Url(Url::parse("file:///tmp/artifacts").unwrap())),
            ),
            ("tag://op-contracts/v0.0.1", None),
            ("tag://other-namespace/v1.6.0", None),
            ("ftp://example.com/artifacts.tar.gz", None),
        ];

        for (input, expected) in cases {
            let parsed: Result<Locator, _> = input.parse();
            match expected {
                Some(expected) => assert_eq!(parsed.unwrap(), expected, "{input}"),
                None => assert!(parsed.is_err(), "{input} should fail"),
            }
        }
    }

    #[test]
    fn marshal_text() {
        let cases = [
            (
                Locator::Tag(CONTRACTS_V160_TAG.to_string()),
                "tag://op-contracts/v1.6.0",
            ),
            (
                Locator::Url(Url::parse("https://example.com/artifacts.tar.gz").unwrap()),
                "https://example.com/artifacts.tar.gz",
            ),
            (
                Locator::Url(Url::parse("file:///tmp/artifacts").unwrap()),
                "file:///tmp/artifacts",
            ),
        ];

        for (locator, expected) in cases {
            assert_eq!(locator.to_string(), expected);
            let reparsed: Locator = expected.parse().unwrap();
            assert_eq!(reparsed.to_string(), expected);
        }
    }

    #[test]
    fn json_uses_text_form() {
        let locator = Locator::from_tag(CONTRACTS_V160_TAG).unwrap();
        let json = serde_json::to_string(&locator).unwrap();
        assert_eq!(json, r#""tag://op-contracts/v1.6.0""#);
        let back: Locator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, locator);

        assert!(serde_json::from_str::<Locator>(r#""tag://op-contracts/v9.9.9""#).is_err());
    }

    #[test]
    fn equal() {
        let tag = Locator::from_tag(CONTRACTS_V160_TAG).unwrap();
        let same_tag = Locator::from_url("tag://op-contracts/v1.6.0").unwrap();
        let resolved_url = standard::artifacts_url_for_tag(CONTRACTS_V160_TAG).unwrap();
        let resolved = Locator::from_url(resolved_url.as_str()).unwrap();
        let other = Locator::from_url("https://example.com/other.tar.gz").unwrap();

        assert!(tag.equal(&tag));
        assert!(tag.equal(&same_tag));
        assert!(!tag.equal(&resolved));
        assert!(!resolved.equal(&other));
        assert!(resolved.equal(&resolved.clone()));
    }

    #[test]
    fn file_locator_is_absolute() {
        let locator = Locator::file("/tmp/forge").unwrap();
        assert_eq!(locator.to_string(), "file:///tmp/forge");
        assert!(!locator.is_tag());
    }
}
