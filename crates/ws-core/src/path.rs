use crate::model::WorkspaceRecord;

/// A parsed workspace path: `/owner/wsname/a/b/.../name`.
///
/// `path` is the slash-joined sequence of folder components strictly
/// between the workspace name and the final `name` component; it is empty
/// when `name` addresses an object directly under the workspace root, and
/// both `path` and `name` are empty when the parsed string addresses the
/// workspace itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPath {
    /// Identifier of the workspace owner, taken from the path's first segment.
    pub owner: String,
    /// Workspace name, taken from the path's second segment.
    pub wsname: String,
    /// Folder components between the workspace root and `name`, joined by a single `/`.
    pub path: String,
    /// The final path component (an object or folder name), or empty for the workspace root.
    pub name: String,
}

impl ParsedPath {
    /// True if no segment at all was parsed (the bare string `"/"` or `""`).
    pub fn is_root(&self) -> bool {
        self.owner.is_empty() && self.wsname.is_empty()
    }

    /// True if this path addresses the workspace itself, not an object within it.
    pub fn is_workspace_only(&self) -> bool {
        !self.wsname.is_empty() && self.path.is_empty() && self.name.is_empty()
    }

    /// The full slash-joined path of the addressed entry within the workspace,
    /// with no leading or trailing slash. Empty for the workspace root.
    pub fn full_path(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else if self.name.is_empty() {
            self.path.clone()
        } else {
            format!("{}/{}", self.path, self.name)
        }
    }

    /// The parent of this path: its `name` becomes the last component of `path`,
    /// and `path` becomes everything before it. The workspace root is its own parent.
    pub fn parent_path(&self) -> ParsedPath {
        if self.path.is_empty() {
            ParsedPath {
                owner: self.owner.clone(),
                wsname: self.wsname.clone(),
                path: String::new(),
                name: String::new(),
            }
        } else {
            let mut components: Vec<&str> = self.path.split('/').collect();
            let name = components.pop().unwrap_or_default().to_string();
            ParsedPath {
                owner: self.owner.clone(),
                wsname: self.wsname.clone(),
                path: components.join("/"),
                name,
            }
        }
    }

    /// Rewrites this path to replace a matching leading prefix with `to`, used by
    /// recursive copy/move to relocate descendants under a new destination root.
    pub fn replace_path_prefix(&self, from: &str, to: &str) -> ParsedPath {
        let full = self.full_path();
        let rewritten = if full == from {
            to.to_string()
        } else if let Some(rest) = full.strip_prefix(&format!("{from}/")) {
            if to.is_empty() {
                rest.to_string()
            } else {
                format!("{to}/{rest}")
            }
        } else {
            full
        };
        let mut components: Vec<&str> = rewritten.split('/').filter(|s| !s.is_empty()).collect();
        let name = components.pop().unwrap_or_default().to_string();
        ParsedPath {
            owner: self.owner.clone(),
            wsname: self.wsname.clone(),
            path: components.join("/"),
            name,
        }
    }
}

/// Non-empty and contains no `/`.
pub fn has_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}

/// A `ParsedPath` joined with the workspace record it resolved to, if any.
/// `workspace` is `None` when `(owner, wsname)` does not yet exist.
#[derive(Debug, Clone, Default)]
pub struct WSPath {
    /// The parsed path components.
    pub parsed: ParsedPath,
    /// The resolved workspace record, when the named workspace exists.
    pub workspace: Option<WorkspaceRecord>,
}

impl WSPath {
    /// Delegates to [`ParsedPath::full_path`].
    pub fn full_path(&self) -> String {
        self.parsed.full_path()
    }

    /// Delegates to [`ParsedPath::is_workspace_only`].
    pub fn is_workspace_only(&self) -> bool {
        self.parsed.is_workspace_only()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    OwnerStart,
    Owner,
    WsnameStart,
    Wsname,
    PathStart,
    Path,
}

/// A small state machine that decomposes a workspace path string into its
/// `(owner, wsname, path, name)` components without performing any I/O.
///
/// Accepts any of `/`, `/owner`, `/owner/wsname`, or
/// `/owner/wsname/a/b/.../name`, collapsing arbitrary runs of `/`.
#[derive(Debug, Default)]
pub struct WSPathParser {
    state: Option<State>,
    owner: String,
    wsname: String,
    path_component: String,
    path: Vec<String>,
}

impl WSPathParser {
    /// Creates a fresh parser.
    pub fn new() -> Self {
        WSPathParser::default()
    }

    /// Parses `s`, returning the decomposed path. Fails only when `s` does not
    /// begin with `/` (the only construct the state machine rejects outright).
    pub fn parse(s: &str) -> Option<ParsedPath> {
        let mut p = WSPathParser::new();
        p.state = Some(State::Start);
        for c in s.chars() {
            if !p.parse_char(c) {
                return None;
            }
        }
        p.finish();
        Some(p.extract())
    }

    fn parse_char(&mut self, c: char) -> bool {
        use State::*;
        match self.state.unwrap_or(Start) {
            Start => {
                if c == '/' {
                    self.state = Some(OwnerStart);
                } else {
                    return false;
                }
            }
            OwnerStart => {
                if c != '/' {
                    self.owner.push(c);
                    self.state = Some(Owner);
                }
            }
            Owner => {
                if c == '/' {
                    self.state = Some(WsnameStart);
                } else {
                    self.owner.push(c);
                }
            }
            WsnameStart => {
                if c != '/' {
                    self.wsname.push(c);
                    self.state = Some(Wsname);
                }
            }
            Wsname => {
                if c == '/' {
                    self.state = Some(PathStart);
                } else {
                    self.wsname.push(c);
                }
            }
            PathStart => {
                if c != '/' {
                    self.path_component.push(c);
                    self.state = Some(Path);
                }
            }
            Path => {
                if c == '/' {
                    self.path.push(std::mem::take(&mut self.path_component));
                    self.state = Some(PathStart);
                } else {
                    self.path_component.push(c);
                }
            }
        }
        true
    }

    fn finish(&mut self) {
        if self.state == Some(State::Path) && !self.path_component.is_empty() {
            self.path.push(std::mem::take(&mut self.path_component));
        }
    }

    fn extract(mut self) -> ParsedPath {
        let name = self.path.pop().unwrap_or_default();
        ParsedPath {
            owner: self.owner,
            wsname: self.wsname,
            path: self.path.join("/"),
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_root() {
        let p = WSPathParser::parse("/").unwrap();
        assert!(p.is_root());
    }

    #[test]
    fn parses_workspace_only() {
        let p = WSPathParser::parse("/alice/docs").unwrap();
        assert_eq!(p.owner, "alice");
        assert_eq!(p.wsname, "docs");
        assert!(p.is_workspace_only());
    }

    #[test]
    fn parses_nested_object() {
        let p = WSPathParser::parse("/alice/docs/a/b/c.txt").unwrap();
        assert_eq!(p.owner, "alice");
        assert_eq!(p.wsname, "docs");
        assert_eq!(p.path, "a/b");
        assert_eq!(p.name, "c.txt");
        assert_eq!(p.full_path(), "a/b/c.txt");
    }

    #[test]
    fn collapses_duplicate_slashes() {
        let p = WSPathParser::parse("//alice///docs//a//b.txt").unwrap();
        assert_eq!(p.owner, "alice");
        assert_eq!(p.wsname, "docs");
        assert_eq!(p.full_path(), "a/b.txt");
    }

    #[test]
    fn rejects_strings_without_leading_slash() {
        assert!(WSPathParser::parse("alice/docs").is_none());
    }

    #[test]
    fn parent_of_root_is_root() {
        let p = WSPathParser::parse("/alice/docs").unwrap();
        let parent = p.parent_path();
        assert_eq!(parent.path, "");
        assert_eq!(parent.name, "");
    }

    #[test]
    fn parent_of_nested_object() {
        let p = WSPathParser::parse("/alice/docs/a/b/c.txt").unwrap();
        let parent = p.parent_path();
        assert_eq!(parent.path, "a");
        assert_eq!(parent.name, "b");
    }

    #[test]
    fn replace_prefix_rewrites_descendant() {
        let p = WSPathParser::parse("/alice/docs/src/a/b.txt").unwrap();
        let rewritten = p.replace_path_prefix("src", "dst");
        assert_eq!(rewritten.full_path(), "dst/a/b.txt");
    }

    #[test]
    fn valid_name_rejects_slash_and_empty() {
        assert!(has_valid_name("a.txt"));
        assert!(!has_valid_name(""));
        assert!(!has_valid_name("a/b"));
    }
}
