//! Locating templates and reading their header line.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::util::IndexMap;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The version of this crate.
    pub fn current() -> Self {
        env!("CARGO_PKG_VERSION").parse().unwrap_or_default()
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.').map(|p| {
            p.parse::<u32>()
                .map_err(|_| format!("invalid version component {p:?} in {s:?}"))
        });
        let major = parts.next().ok_or_else(|| format!("empty version {s:?}"))??;
        let minor = parts.next().transpose()?.unwrap_or(0);
        let patch = parts.next().transpose()?.unwrap_or(0);
        if parts.next().is_some() {
            return Err(format!("too many components in version {s:?}"));
        }
        Ok(Self::new(major, minor, patch))
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The first line of a template: `backend-name minimum-version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub backend: String,
    pub min_version: Version,
}

impl Header {
    /// Splits a template into its header and body.
    pub fn split<'a>(template: &str, text: &'a str) -> Result<(Header, &'a str), Error> {
        let (first, body) = text.split_once('\n').unwrap_or((text, ""));
        let malformed = || Error::MalformedHeader {
            template: template.to_string(),
            line: first.trim_end().to_string(),
        };
        let mut words = first.split_whitespace();
        let (Some(backend), Some(version), None) = (words.next(), words.next(), words.next())
        else {
            return Err(malformed());
        };
        let min_version = version.parse().map_err(|_| malformed())?;
        Ok((
            Header {
                backend: backend.to_string(),
                min_version,
            },
            body,
        ))
    }

    pub fn validate(&self, template: &str, backend: &str, available: Version) -> Result<(), Error> {
        if self.backend != backend {
            return Err(Error::BackendMismatch {
                template: template.to_string(),
                found: self.backend.clone(),
                expected: backend.to_string(),
            });
        }
        if self.min_version > available {
            return Err(Error::VersionIncompatibility {
                template: template.to_string(),
                backend: self.backend.clone(),
                required: self.min_version,
                available,
            });
        }
        Ok(())
    }
}

pub trait TemplateSource {
    fn load(&self, name: &str) -> Result<String, Error>;
}

/// Searches a list of directories, in order.
#[derive(Debug, Clone, Default)]
pub struct TemplateDirs {
    dirs: Vec<PathBuf>,
}

impl TemplateDirs {
    pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            dirs: dirs.into_iter().collect(),
        }
    }
}

impl TemplateSource for TemplateDirs {
    fn load(&self, name: &str) -> Result<String, Error> {
        let direct = PathBuf::from(name);
        let candidates = self
            .dirs
            .iter()
            .map(|dir| dir.join(name))
            .chain(direct.is_absolute().then_some(direct));
        for path in candidates {
            if path.is_file() {
                log::debug!("loading template {}", path.display());
                return std::fs::read_to_string(&path).map_err(|err| Error::IoError(path, err));
            }
        }
        Err(Error::TemplateNotFound(name.to_string()))
    }
}

/// Templates held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplates {
    templates: IndexMap<String, String>,
}

impl MemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.templates.insert(name.into(), text.into());
    }
}

impl TemplateSource for MemoryTemplates {
    fn load(&self, name: &str) -> Result<String, Error> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions() {
        assert_eq!("1.2".parse::<Version>(), Ok(Version::new(1, 2, 0)));
        assert_eq!("3".parse::<Version>(), Ok(Version::new(3, 0, 0)));
        assert!("1.x".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
        assert!(Version::new(0, 2, 0) > Version::new(0, 1, 9));
        assert_eq!(Version::current().to_string(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn header_split() {
        let (header, body) = Header::split("t", "cpp 0.1\nline 1\nline 2\n").unwrap();
        assert_eq!(header.backend, "cpp");
        assert_eq!(header.min_version, Version::new(0, 1, 0));
        assert_eq!(body, "line 1\nline 2\n");
    }

    #[test]
    fn malformed_headers() {
        for text in ["", "cpp", "cpp 0.1 extra\n", "cpp latest\n"] {
            assert!(
                matches!(Header::split("t", text), Err(Error::MalformedHeader { .. })),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn header_validation() {
        let (header, _) = Header::split("t", "cpp 0.3").unwrap();
        assert!(header.validate("t", "cpp", Version::new(0, 3, 0)).is_ok());
        assert!(matches!(
            header.validate("t", "python", Version::new(1, 0, 0)),
            Err(Error::BackendMismatch { .. })
        ));
        assert!(matches!(
            header.validate("t", "cpp", Version::new(0, 2, 9)),
            Err(Error::VersionIncompatibility { .. })
        ));
    }

    #[test]
    fn memory_templates() {
        let templates = MemoryTemplates::new().with("a", "cpp 0.1\n");
        assert_eq!(templates.load("a").unwrap(), "cpp 0.1\n");
        assert!(matches!(templates.load("b"), Err(Error::TemplateNotFound(_))));
    }
}
