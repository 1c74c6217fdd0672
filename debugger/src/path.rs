//! Translation between the paths the debugger engine reports and the
//! paths the local editor can open.
use std::collections::BTreeMap;

use crate::Error;

/// Ordered remote-to-local prefix substitutions.
///
/// Longer remote prefixes are tried first, so an overlapping pair like
/// `/var/www` and `/var/www/lib` resolves to the more specific mapping.
#[derive(Debug, Clone, Default)]
pub struct PathMap {
    /// (remote prefix, local prefix) pairs, longest remote first.
    maps: Vec<(String, String)>,
}

impl PathMap {
    pub fn new(maps: &BTreeMap<String, String>) -> Self {
        let mut maps: Vec<_> = maps
            .iter()
            .map(|(remote, local)| (remote.clone(), local.clone()))
            .collect();
        maps.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { maps }
    }

    fn to_local(&self, path: &str) -> String {
        for (remote, local) in &self.maps {
            if let Some(rest) = path.strip_prefix(remote.as_str()) {
                return format!("{local}{rest}");
            }
        }
        path.to_string()
    }

    fn to_remote(&self, path: &str) -> String {
        // pick the longest matching local prefix
        let mut best: Option<(&str, &str)> = None;
        for (remote, local) in &self.maps {
            if path.starts_with(local.as_str())
                && best.map_or(true, |(_, l)| local.len() > l.len())
            {
                best = Some((remote, local));
            }
        }
        match best {
            Some((remote, local)) => format!("{remote}{}", &path[local.len()..]),
            None => path.to_string(),
        }
    }
}

/// A source file in both of its spellings: the local path the editor
/// opens, and the remote path the engine knows it by.
///
/// Equality considers the local form only, so a path that arrived from
/// the engine compares equal to the same file named by the editor.
#[derive(Debug, Clone)]
pub struct FilePath {
    local: String,
    remote: String,
}

impl FilePath {
    /// Build from a path the engine reported, usually a `file://` URI.
    pub fn from_remote(raw: &str, map: &PathMap) -> crate::Result<Self> {
        let remote = strip_uri_scheme(raw);
        if remote.is_empty() {
            return Err(Error::FilePath("File path is empty".to_string()));
        }
        Ok(Self {
            local: map.to_local(remote),
            remote: remote.to_string(),
        })
    }

    /// Build from a path named by the editor.
    pub fn from_local(raw: &str, map: &PathMap) -> crate::Result<Self> {
        let local = strip_uri_scheme(raw);
        if local.is_empty() {
            return Err(Error::FilePath("File path is empty".to_string()));
        }
        Ok(Self {
            local: local.to_string(),
            remote: map.to_remote(local),
        })
    }

    pub fn as_local(&self) -> &str {
        &self.local
    }

    /// The remote form as a URI, the way breakpoint commands want it.
    pub fn as_remote(&self) -> String {
        format!("file://{}", self.remote)
    }
}

impl PartialEq for FilePath {
    fn eq(&self, other: &Self) -> bool {
        self.local == other.local
    }
}

impl Eq for FilePath {}

impl std::fmt::Display for FilePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.local)
    }
}

fn strip_uri_scheme(raw: &str) -> &str {
    raw.trim()
        .strip_prefix("file://")
        .or_else(|| raw.trim().strip_prefix("file:"))
        .unwrap_or(raw.trim())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::Error;

    use super::{FilePath, PathMap};

    fn map(pairs: &[(&str, &str)]) -> PathMap {
        let maps: BTreeMap<String, String> = pairs
            .iter()
            .map(|(r, l)| (r.to_string(), l.to_string()))
            .collect();
        PathMap::new(&maps)
    }

    #[test]
    fn remote_uri_is_translated_to_local() {
        let map = map(&[("/srv/www", "/home/user/www")]);
        let path = FilePath::from_remote("file:///srv/www/index.php", &map).unwrap();
        assert_eq!(path.as_local(), "/home/user/www/index.php");
        assert_eq!(path.as_remote(), "file:///srv/www/index.php");
    }

    #[test]
    fn local_path_is_translated_to_remote() {
        let map = map(&[("/srv/www", "/home/user/www")]);
        let path = FilePath::from_local("/home/user/www/lib/db.php", &map).unwrap();
        assert_eq!(path.as_remote(), "file:///srv/www/lib/db.php");
        assert_eq!(path.as_local(), "/home/user/www/lib/db.php");
    }

    #[test]
    fn round_trip_is_stable() {
        let map = map(&[("/remote/app", "/local/app")]);
        let from_remote = FilePath::from_remote("file:///remote/app/main.php", &map).unwrap();
        let from_local = FilePath::from_local(from_remote.as_local(), &map).unwrap();
        assert_eq!(from_remote, from_local);
        assert_eq!(from_remote.as_remote(), from_local.as_remote());
    }

    #[test]
    fn longest_remote_prefix_wins() {
        let map = map(&[("/var/www", "/short"), ("/var/www/lib", "/long")]);
        let path = FilePath::from_remote("file:///var/www/lib/a.php", &map).unwrap();
        assert_eq!(path.as_local(), "/long/a.php");
    }

    #[test]
    fn unmapped_paths_pass_through() {
        let map = map(&[]);
        let path = FilePath::from_remote("file:///tmp/script.php", &map).unwrap();
        assert_eq!(path.as_local(), "/tmp/script.php");
        assert_eq!(path.as_remote(), "file:///tmp/script.php");
    }

    #[test]
    fn bare_file_scheme_is_stripped() {
        let map = map(&[]);
        let path = FilePath::from_remote("file:/tmp/script.php", &map).unwrap();
        assert_eq!(path.as_local(), "/tmp/script.php");
    }

    #[test]
    fn empty_path_is_an_error() {
        let map = map(&[]);
        assert!(matches!(
            FilePath::from_remote("", &map),
            Err(Error::FilePath(_))
        ));
        assert!(matches!(
            FilePath::from_local("file://", &map),
            Err(Error::FilePath(_))
        ));
    }

    #[test]
    fn equality_is_on_the_local_form() {
        let map = map(&[("/srv/www", "/home/user/www")]);
        let a = FilePath::from_remote("file:///srv/www/index.php", &map).unwrap();
        let b = FilePath::from_local("/home/user/www/index.php", &map).unwrap();
        assert_eq!(a, b);
    }
}
