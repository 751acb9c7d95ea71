use std::fmt;
use std::str::FromStr;

/// Separator between keychain segments.
pub const SEPARATOR: char = '/';

/// First character of a token key: `[A-Za-z0-9_]`.
pub fn is_key_start(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Remaining characters of a token key: `[A-Za-z0-9_.-]`.
pub fn is_key_char(c: char) -> bool {
    is_key_start(c) || c == '.' || c == '-'
}

/// True when `s` is a single key usable inside tokens.
pub fn is_valid_key(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(is_key_start) && chars.all(is_key_char)
}

/// True for `/?(key/)*key/?`, the keychain form accepted inside tokens.
pub fn is_valid_keychain(s: &str) -> bool {
    let s = s.strip_prefix(SEPARATOR).unwrap_or(s);
    let s = s.strip_suffix(SEPARATOR).unwrap_or(s);
    !s.is_empty() && s.split(SEPARATOR).all(is_valid_key)
}

/// An ordered path of mapping keys addressing a node in a [`Tree`](crate::Tree).
///
/// Keychains are usually written as strings:
///
/// - `a/b` is relative: its first segment is located by search
/// - `/a/b` is absolute: resolved top-down from the root
/// - `a/b/` (trailing separator) selects the contents of the addressed
///   mapping instead of a single-entry wrapper
/// - `""` and `"/"` address the root
///
/// # Examples
///
/// ```
/// use cfgweave::Keychain;
///
/// let kc: Keychain = "/svc/db/".parse().unwrap();
/// assert!(kc.is_absolute());
/// assert!(kc.is_trailing());
/// assert_eq!(kc.segments(), ["svc", "db"]);
/// assert_eq!(kc.to_string(), "/svc/db/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Keychain {
    segments: Vec<String>,
    absolute: bool,
    trailing: bool,
}

impl Keychain {
    /// The root keychain.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a keychain string. Never fails; empty interior segments are
    /// dropped.
    pub fn parse(s: &str) -> Self {
        let absolute = s.starts_with(SEPARATOR);
        let trailing = s.len() > 1 && s.ends_with(SEPARATOR);
        let segments = s
            .split(SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Keychain {
            segments,
            absolute,
            trailing,
        }
    }

    /// Relative keychain from segments.
    pub fn relative<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Keychain {
            segments: segments.into_iter().map(Into::into).collect(),
            absolute: false,
            trailing: false,
        }
    }

    /// Absolute keychain from segments.
    pub fn absolute<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Keychain {
            absolute: true,
            ..Self::relative(segments)
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The root is addressed by an empty keychain, absolute or not.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn is_trailing(&self) -> bool {
        self.trailing
    }

    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Same segments, without the root anchor.
    pub fn to_relative(&self) -> Self {
        Keychain {
            absolute: false,
            ..self.clone()
        }
    }

    /// Same segments, anchored at the root.
    pub fn to_absolute(&self) -> Self {
        Keychain {
            absolute: true,
            ..self.clone()
        }
    }

    /// Same addressing with the trailing separator set or cleared.
    pub fn with_trailing(&self, trailing: bool) -> Self {
        Keychain {
            trailing,
            ..self.clone()
        }
    }

    /// Keychain of the enclosing mapping.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Keychain {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            absolute: self.absolute,
            trailing: false,
        })
    }

    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.into());
        Keychain {
            segments,
            absolute: self.absolute,
            trailing: false,
        }
    }

    pub fn starts_with(&self, prefix: &Keychain) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Segment by index; negative indices count from the end.
    pub fn segment(&self, index: i64) -> Option<&str> {
        let len = self.segments.len() as i64;
        let index = if index < 0 { len + index } else { index };
        if index < 0 || index >= len {
            return None;
        }
        Some(&self.segments[index as usize])
    }
}

impl fmt::Display for Keychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            f.write_str("/")?;
        }
        f.write_str(&self.segments.join("/"))?;
        if self.trailing && !self.segments.is_empty() {
            f.write_str("/")?;
        }
        Ok(())
    }
}

impl FromStr for Keychain {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Keychain::parse(s))
    }
}

impl From<&str> for Keychain {
    fn from(s: &str) -> Self {
        Keychain::parse(s)
    }
}

impl From<&String> for Keychain {
    fn from(s: &String) -> Self {
        Keychain::parse(s)
    }
}

impl From<&Keychain> for Keychain {
    fn from(kc: &Keychain) -> Self {
        kc.clone()
    }
}

impl From<Vec<&str>> for Keychain {
    fn from(segments: Vec<&str>) -> Self {
        Keychain::relative(segments)
    }
}

#[test]
fn test_parse_forms() {
    let kc = Keychain::parse("a/b");
    assert!(!kc.is_absolute());
    assert!(!kc.is_trailing());
    assert_eq!(kc.segments(), ["a", "b"]);

    let kc = Keychain::parse("/a/");
    assert!(kc.is_absolute());
    assert!(kc.is_trailing());
    assert_eq!(kc.segments(), ["a"]);

    assert!(Keychain::parse("").is_root());
    assert!(Keychain::parse("/").is_root());
    assert!(!Keychain::parse("/").is_trailing());
}

#[test]
fn test_display_round_trips() {
    for s in ["", "/", "a", "a/b", "/a/b", "a/b/", "/a/b/"] {
        assert_eq!(Keychain::parse(s).to_string(), s);
    }
}

#[test]
fn test_double_separators_are_collapsed() {
    assert_eq!(Keychain::parse("//port").to_string(), "/port");
    assert_eq!(Keychain::parse("a//b").segments(), ["a", "b"]);
}

#[test]
fn test_token_key_charset() {
    assert!(is_valid_key("db-host.v2"));
    assert!(is_valid_key("_private"));
    assert!(!is_valid_key("-leading"));
    assert!(!is_valid_key("has space"));
    assert!(is_valid_keychain("/svc/db/"));
    assert!(is_valid_keychain("svc/db"));
    assert!(!is_valid_keychain("svc//db"));
    assert!(!is_valid_keychain("/"));
}

#[test]
fn test_negative_segment_index() {
    let kc = Keychain::parse("/svc/db/host");
    assert_eq!(kc.segment(0), Some("svc"));
    assert_eq!(kc.segment(-1), Some("host"));
    assert_eq!(kc.segment(-3), Some("svc"));
    assert_eq!(kc.segment(3), None);
    assert_eq!(kc.segment(-4), None);
}
