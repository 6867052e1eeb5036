use serde_json::Value;
use std::fmt;

/// One step into a state tree: an object key or an array index.
///
/// Lookups are lenient in the way dot paths require: a numeric key reaches
/// into arrays, and an index reaches into objects by its decimal key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    /// Resolve this segment against `value`, borrowing the child if present.
    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match (value, self) {
            (Value::Object(map), Segment::Key(key)) => map.get(key),
            (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
            (Value::Array(items), Segment::Index(index)) => items.get(*index),
            (Value::Array(items), Segment::Key(key)) => {
                key.parse::<usize>().ok().and_then(|index| items.get(index))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::Key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

/// A dot-separated accessor path such as `"todos.0.title"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// Split `path` on dots. Empty components are skipped, so `""` is the root.
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('.')
            .filter(|part| !part.is_empty())
            .map(Segment::from)
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walk the path from `value`, returning `None` at the first missing step.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |node, segment| segment.lookup(node))
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Path::parse(path)
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_splits_on_dots() {
        let path = Path::parse("todos.0.title");
        assert_eq!(
            path.segments(),
            &[
                Segment::from("todos"),
                Segment::from("0"),
                Segment::from("title")
            ]
        );
        assert_eq!(path.to_string(), "todos.0.title");
    }

    #[test]
    fn empty_path_is_root() {
        let state = json!({"a": 1});
        let path = Path::parse("");
        assert!(path.is_root());
        assert_eq!(path.resolve(&state), Some(&state));
    }

    #[test]
    fn numeric_keys_reach_into_arrays() {
        let state = json!({"todos": [{"title": "milk"}, {"title": "eggs"}]});
        assert_eq!(
            Path::parse("todos.1.title").resolve(&state),
            Some(&json!("eggs"))
        );
    }

    #[test]
    fn indices_reach_into_objects_by_key() {
        let state = json!({"3": "three"});
        assert_eq!(Segment::Index(3).lookup(&state), Some(&json!("three")));
    }

    #[test]
    fn missing_steps_resolve_to_none() {
        let state = json!({"todos": []});
        assert_eq!(Path::parse("todos.0.title").resolve(&state), None);
        assert_eq!(Path::parse("count.value").resolve(&json!({"count": 4})), None);
    }
}
