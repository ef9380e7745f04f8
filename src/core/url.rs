//! Composing a project's effective fetch URL from the manifest's base URL
//! and the project's remote-relative path.

/// Join a base URL with a (possibly relative) path.
///
/// If `path` is absolute (starts with `/`) or scheme-qualified (contains
/// `:`), it is returned unchanged. Otherwise leading `./` and `../`
/// segments of `path` are consumed against `base`, popping a path
/// component per `../` the way `dirname` would, and the result is
/// concatenated onto whatever scheme prefix (`scheme://`) `base` carries.
pub fn url_join(base: Option<&str>, path: &str) -> String {
    let Some(base) = base else {
        return path.to_string();
    };
    if path.starts_with('/') || path.contains(':') {
        return path.to_string();
    }

    let (scheme, mut rest) = match base.find("://") {
        Some(idx) => (&base[..idx + 3], &base[idx + 3..]),
        None => ("", base),
    };

    let mut path = path;
    loop {
        if let Some(stripped) = path.strip_prefix("./") {
            path = stripped;
            continue;
        }
        if path == "." {
            path = "";
            break;
        }
        if let Some(stripped) = path.strip_prefix("../") {
            rest = dirname(rest);
            path = stripped;
            continue;
        }
        if path == ".." {
            rest = dirname(rest);
            path = "";
            break;
        }
        break;
    }

    let base_part = if rest == "." { "" } else { rest };
    let needs_slash = !base_part.is_empty() && !base_part.ends_with('/') && !path.is_empty();

    let mut joined = String::with_capacity(scheme.len() + base_part.len() + 1 + path.len());
    joined.push_str(scheme);
    joined.push_str(base_part);
    if needs_slash {
        joined.push('/');
    }
    joined.push_str(path);
    joined
}

/// `dirname`-style pop of the last path component, mirroring POSIX
/// `dirname`: a path with no `/` becomes `.`, a trailing `/` is ignored
/// before popping, and `/` stays `/`.
fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.starts_with('/') { "/" } else { "." };
    }
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None => ".",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_passes_through() {
        assert_eq!(url_join(Some("http://h/a/b"), "/etc/foo"), "/etc/foo");
    }

    #[test]
    fn scheme_qualified_path_passes_through() {
        assert_eq!(
            url_join(Some("http://h/a/b"), "git://other/repo"),
            "git://other/repo"
        );
    }

    #[test]
    fn no_base_returns_path() {
        assert_eq!(url_join(None, "some/thing"), "some/thing");
    }

    #[test]
    fn parent_segment_pops_a_component() {
        assert_eq!(url_join(Some("http://h/a/b"), "../c"), "http://h/a/c");
    }

    #[test]
    fn dot_segment_appends_in_place() {
        assert_eq!(url_join(Some("http://h/a/b"), "./c"), "http://h/a/b/c");
    }

    #[test]
    fn double_parent_pops_twice() {
        assert_eq!(url_join(Some("http://h/a/b/c"), "../../d"), "http://h/a/d");
    }

    #[test]
    fn bare_trailing_dot() {
        assert_eq!(url_join(Some("http://h/a/b"), "."), "http://h/a/b");
    }

    #[test]
    fn bare_trailing_dotdot() {
        assert_eq!(url_join(Some("http://h/a/b"), ".."), "http://h/a");
    }

    #[test]
    fn plain_relative_path_is_appended() {
        assert_eq!(url_join(Some("http://h/a/b"), "sub/repo"), "http://h/a/b/sub/repo");
    }

    #[test]
    fn filesystem_style_base_without_scheme() {
        assert_eq!(url_join(Some("/srv/repos/base"), "../other"), "/srv/repos/other");
    }

    #[test]
    fn base_reduced_to_dot_has_no_separator() {
        assert_eq!(url_join(Some("single"), ".."), "");
    }
}
