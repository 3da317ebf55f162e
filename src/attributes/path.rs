//! Dotted/bracketed attribute paths (`a.b[0].c`), parsed once at registration time.

use std::fmt;

/// One step of an attribute path: a map key or a list index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// A parsed attribute path. Predicates bind to a `Path` once at registration instead of
/// re-parsing the dotted string on every record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path(pub Vec<PathSegment>);

impl Path {
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push_field(&self, field: &str) -> Path {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(field.to_string()));
        Path(segments)
    }

    pub fn push_index(&self, index: usize) -> Path {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Path(segments)
    }

    /// Canonical string key used in the diff map (`"a.b[0].c"`). Matches the wire-facing form
    /// described in the dispatch spec, so diff entries are human-readable in logs and reports.
    pub fn to_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                PathSegment::Field(name) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{name}")?;
                }
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}

impl Path {
    /// Parse a dotted/bracketed path string. `"preferences.theme"`, `"tags[2]"`, and
    /// `"a.b[0].c"` are all accepted. An empty string is the root path.
    pub fn parse(s: &str) -> Path {
        let mut segments = Vec::new();
        let mut field = String::new();
        let mut chars = s.chars().peekable();

        let flush_field = |field: &mut String, segments: &mut Vec<PathSegment>| {
            if !field.is_empty() {
                segments.push(PathSegment::Field(std::mem::take(field)));
            }
        };

        while let Some(c) = chars.next() {
            match c {
                '.' => flush_field(&mut field, &mut segments),
                '[' => {
                    flush_field(&mut field, &mut segments);
                    let mut digits = String::new();
                    for d in chars.by_ref() {
                        if d == ']' {
                            break;
                        }
                        digits.push(d);
                    }
                    if let Ok(idx) = digits.parse::<usize>() {
                        segments.push(PathSegment::Index(idx));
                    }
                }
                _ => field.push(c),
            }
        }
        flush_field(&mut field, &mut segments);
        Path(segments)
    }
}
