//! Core types shared by the watcher, the compiler and the directive handlers.
//!
//! - [`Path`] / [`Segment`] - structured access paths into the model
//! - [`Change`] / [`ChangeKind`] - what a subscriber is told when the model moves
//! - [`LoopContext`] - per-repetition state threaded through `v-for` bodies
//! - value helpers ([`lookup`], [`truthy`], [`display_value`])

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

pub use serde_json::Value;

// =============================================================================
// Path
// =============================================================================

/// One step from a value to one of its children.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Object member.
    Field(String),
    /// Array element.
    Index(usize),
}

impl Segment {
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Segment::Field(name) => Some(name),
            Segment::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(index) => Some(*index),
            Segment::Field(_) => None,
        }
    }
}

impl From<&str> for Segment {
    fn from(name: &str) -> Self {
        Segment::Field(name.to_string())
    }
}

impl From<String> for Segment {
    fn from(name: String) -> Self {
        Segment::Field(name)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => f.write_str(name),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// How two paths relate to each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathRelation {
    Equal,
    /// `self` is a strict prefix of the other path.
    Ancestor,
    /// The other path is a strict prefix of `self`.
    Descendant,
    Unrelated,
}

/// Location of one value reachable from the model root.
///
/// A path is a sequence of tagged segments rather than a delimiter-joined
/// string, so a field name can never collide with the separator.
///
/// ```ignore
/// let path = Path::parse("todos.3.title");
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.to_string(), "todos.3.title");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: SmallVec<[Segment; 4]>,
}

impl Path {
    /// The model root itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Single-field path.
    pub fn field(name: impl Into<String>) -> Self {
        let mut path = Self::default();
        path.segments.push(Segment::Field(name.into()));
        path
    }

    /// Parse a dotted expression. All-digit segments become indices and
    /// empty segments are skipped.
    pub fn parse(expression: &str) -> Self {
        let segments = expression
            .split('.')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.parse::<usize>() {
                Ok(index) if part.bytes().all(|b| b.is_ascii_digit()) => Segment::Index(index),
                _ => Segment::Field(part.to_string()),
            })
            .collect();
        Self { segments }
    }

    pub fn from_segments(segments: &[Segment]) -> Self {
        Self {
            segments: segments.iter().cloned().collect(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn push(&mut self, segment: impl Into<Segment>) {
        self.segments.push(segment.into());
    }

    /// New path with one more segment.
    pub fn child(&self, segment: impl Into<Segment>) -> Path {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    /// New path with `rest` appended.
    pub fn join(&self, rest: &[Segment]) -> Path {
        let mut path = self.clone();
        path.segments.extend(rest.iter().cloned());
        path
    }

    pub fn parent(&self) -> Option<Path> {
        if self.segments.is_empty() {
            return None;
        }
        Some(self.truncated(self.segments.len() - 1))
    }

    /// First `len` segments (the whole path if it is shorter).
    pub fn truncated(&self, len: usize) -> Path {
        let len = len.min(self.segments.len());
        Self::from_segments(&self.segments[..len])
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Segments below `prefix`, if `prefix` is a prefix of this path.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<&[Segment]> {
        if self.starts_with(prefix) {
            Some(&self.segments[prefix.len()..])
        } else {
            None
        }
    }

    pub fn relation(&self, other: &Path) -> PathRelation {
        if self.segments == other.segments {
            PathRelation::Equal
        } else if other.starts_with(self) {
            PathRelation::Ancestor
        } else if self.starts_with(other) {
            PathRelation::Descendant
        } else {
            PathRelation::Unrelated
        }
    }

    /// True when the paths are equal or one contains the other.
    pub fn overlaps(&self, other: &Path) -> bool {
        self.relation(other) != PathRelation::Unrelated
    }

    /// Move the index segment at position `at` by `delta`.
    ///
    /// Returns false (and leaves the path untouched) when there is no index
    /// segment at `at` or the result would be negative.
    pub fn shift_index(&mut self, at: usize, delta: isize) -> bool {
        let Some(Segment::Index(index)) = self.segments.get_mut(at) else {
            return false;
        };
        match index.checked_add_signed(delta) {
            Some(shifted) => {
                *index = shifted;
                true
            }
            None => false,
        }
    }
}

impl From<&str> for Path {
    fn from(expression: &str) -> Self {
        Path::parse(expression)
    }
}

impl From<String> for Path {
    fn from(expression: String) -> Self {
        Path::parse(&expression)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

// =============================================================================
// Change notifications
// =============================================================================

/// The mutation that produced a [`Change`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// Plain assignment (or handler replacement).
    Assign,
    Push,
    Pop,
    Unshift,
    Shift,
    Splice,
    Sort,
    Reverse,
}

impl ChangeKind {
    /// Array operations that change element count or order.
    pub fn is_structural(self) -> bool {
        !matches!(self, ChangeKind::Assign)
    }
}

/// What a subscriber receives when the model changes.
///
/// `path`, `value` and `old` describe the write itself. `target` is the path the
/// receiving subscriber is currently registered under, which may sit above or
/// below the written path.
#[derive(Clone, Debug)]
pub struct Change {
    pub seq: u64,
    pub kind: ChangeKind,
    pub path: Path,
    pub target: Path,
    pub value: Value,
    pub old: Value,
}

impl Change {
    pub fn new(seq: u64, kind: ChangeKind, path: Path, value: Value, old: Value) -> Self {
        Self {
            seq,
            kind,
            target: path.clone(),
            path,
            value,
            old,
        }
    }

    /// The write hit the subscriber's own path.
    pub fn is_direct(&self) -> bool {
        self.path == self.target
    }

    /// Segments of the written path below the subscriber's path, when the
    /// write happened strictly inside the subscribed value.
    pub fn below_target(&self) -> Option<&[Segment]> {
        self.path
            .strip_prefix(&self.target)
            .filter(|rest| !rest.is_empty())
    }

    /// New value at the subscriber's path, when the write replaced it or one
    /// of its ancestors.
    pub fn value_at_target(&self) -> Option<&Value> {
        let rest = self.target.strip_prefix(&self.path)?;
        lookup(&self.value, rest)
    }

    /// Previous value at the subscriber's path, when derivable from the write.
    pub fn old_at_target(&self) -> Option<&Value> {
        let rest = self.target.strip_prefix(&self.path)?;
        lookup(&self.old, rest)
    }

    pub(crate) fn retarget(&self, target: &Path) -> Change {
        Change {
            target: target.clone(),
            ..self.clone()
        }
    }
}

// =============================================================================
// Loop Context
// =============================================================================

/// An outer loop alias visible from a nested repetition.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeEntry {
    pub item: Value,
    pub path: Path,
    pub level: usize,
}

/// Per-repetition compile state for one clone of a `v-for` template.
///
/// `scope` holds every enclosing alias (not the innermost one, which is
/// `alias`/`item`/`path` itself). `level` grows by one per nesting step.
#[derive(Clone, Debug)]
pub struct LoopContext {
    pub item: Value,
    pub index: usize,
    pub path: Path,
    pub alias: String,
    pub scope: Rc<FxHashMap<String, ScopeEntry>>,
    pub level: usize,
}

impl LoopContext {
    /// Context for element `index` of the array at `array_path`, nested inside
    /// `parent` when the loop itself sits in a repetition.
    pub fn new(
        item: Value,
        index: usize,
        array_path: &Path,
        alias: &str,
        parent: Option<&LoopContext>,
    ) -> Self {
        let (scope, level) = match parent {
            Some(parent) => {
                let mut scope = (*parent.scope).clone();
                scope.insert(
                    parent.alias.clone(),
                    ScopeEntry {
                        item: parent.item.clone(),
                        path: parent.path.clone(),
                        level: parent.level,
                    },
                );
                (scope, parent.level + 1)
            }
            None => (FxHashMap::default(), 1),
        };

        Self {
            item,
            index,
            path: array_path.child(index),
            alias: alias.to_string(),
            scope: Rc::new(scope),
            level,
        }
    }

    /// Same repetition after its element moved to `path` (index realignment).
    /// Outer aliases that were prefixes of the old path are moved with it.
    pub fn rebased(&self, path: &Path, item: Value) -> LoopContext {
        let scope = self
            .scope
            .iter()
            .map(|(name, entry)| {
                let mut entry = entry.clone();
                if self.path.starts_with(&entry.path) {
                    entry.path = path.truncated(entry.path.len());
                }
                (name.clone(), entry)
            })
            .collect();

        LoopContext {
            item,
            index: path.last().and_then(Segment::as_index).unwrap_or(self.index),
            path: path.clone(),
            alias: self.alias.clone(),
            scope: Rc::new(scope),
            level: self.level,
        }
    }

    /// Same repetition after the array at `base` moved its elements by
    /// `delta`. `None` when neither this element nor an outer one moved.
    pub fn shifted(&self, base: &Path, delta: isize) -> Option<LoopContext> {
        let at = base.len();
        let shift = |path: &Path| {
            let mut path = path.clone();
            (path.starts_with(base) && path.shift_index(at, delta)).then_some(path)
        };

        let mut moved = false;
        let path = match shift(&self.path) {
            Some(path) => {
                moved = true;
                path
            }
            None => self.path.clone(),
        };
        let mut scope = FxHashMap::default();
        for (name, entry) in self.scope.iter() {
            let mut entry = entry.clone();
            if let Some(path) = shift(&entry.path) {
                entry.path = path;
                moved = true;
            }
            scope.insert(name.clone(), entry);
        }
        if !moved {
            return None;
        }

        Some(LoopContext {
            item: self.item.clone(),
            index: path.last().and_then(Segment::as_index).unwrap_or(self.index),
            path,
            alias: self.alias.clone(),
            scope: Rc::new(scope),
            level: self.level,
        })
    }

    /// Resolve an expression whose first segment names a loop alias.
    ///
    /// Returns the fully qualified access path and the current value (from the
    /// captured item). `None` means the expression is not loop-scoped.
    pub fn resolve(&self, expression: &Path) -> Option<(Path, Option<Value>)> {
        let name = expression.first()?.as_field()?;
        let rest = &expression.segments()[1..];

        if name == self.alias {
            return Some((self.path.join(rest), lookup(&self.item, rest).cloned()));
        }

        let entry = self.scope.get(name)?;
        // Outer aliases are prefixes of the innermost path when the loops are
        // nested through their items; cut the current path back to that depth.
        let base = if self.path.starts_with(&entry.path) {
            self.path.truncated(entry.path.len())
        } else {
            entry.path.clone()
        };
        Some((base.join(rest), lookup(&entry.item, rest).cloned()))
    }
}

// =============================================================================
// Value helpers
// =============================================================================

/// Walk `segments` down from `value`.
pub fn lookup<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments.iter().try_fold(value, |current, segment| match (current, segment) {
        (Value::Object(map), Segment::Field(name)) => map.get(name),
        (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        _ => None,
    })
}

/// Mutable variant of [`lookup`].
pub fn lookup_mut<'a>(value: &'a mut Value, segments: &[Segment]) -> Option<&'a mut Value> {
    segments.iter().try_fold(value, |current, segment| match (current, segment) {
        (Value::Object(map), Segment::Field(name)) => map.get_mut(name),
        (Value::Object(map), Segment::Index(index)) => map.get_mut(&index.to_string()),
        (Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
        _ => None,
    })
}

/// Script-style truthiness: `null`, `false`, `0`, `NaN` and `""` are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text rendering of a model value. Strings render bare, `null` renders empty.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_display() {
        let path = Path::parse("todos.3.title");
        assert_eq!(
            path.segments(),
            &[
                Segment::Field("todos".into()),
                Segment::Index(3),
                Segment::Field("title".into())
            ]
        );
        assert_eq!(path.to_string(), "todos.3.title");
        assert_eq!(Path::parse(" a . b ").to_string(), "a.b");
    }

    #[test]
    fn test_relation() {
        let list = Path::parse("items");
        let item = Path::parse("items.0");
        let other = Path::parse("other.0");

        assert_eq!(list.relation(&item), PathRelation::Ancestor);
        assert_eq!(item.relation(&list), PathRelation::Descendant);
        assert_eq!(item.relation(&item.clone()), PathRelation::Equal);
        assert_eq!(item.relation(&other), PathRelation::Unrelated);
        // "items" is not a prefix of "itemsX"
        assert!(!Path::parse("itemsX").starts_with(&list));
    }

    #[test]
    fn test_shift_index() {
        let mut path = Path::parse("items.2.name");
        assert!(path.shift_index(1, 1));
        assert_eq!(path.to_string(), "items.3.name");
        assert!(path.shift_index(1, -3));
        assert_eq!(path.to_string(), "items.0.name");
        assert!(!path.shift_index(1, -1), "cannot go below zero");
        assert!(!path.shift_index(0, 1), "field segments do not shift");
    }

    #[test]
    fn test_change_target_views() {
        let change = Change::new(
            1,
            ChangeKind::Assign,
            Path::parse("items.0"),
            json!({"name": "new"}),
            json!({"name": "old"}),
        )
        .retarget(&Path::parse("items.0.name"));

        assert!(!change.is_direct());
        assert_eq!(change.value_at_target(), Some(&json!("new")));
        assert_eq!(change.old_at_target(), Some(&json!("old")));
        assert!(change.below_target().is_none());

        let inner = Change::new(
            2,
            ChangeKind::Assign,
            Path::parse("classes.b"),
            json!(true),
            json!(false),
        )
        .retarget(&Path::parse("classes"));
        assert_eq!(inner.below_target(), Some(&[Segment::Field("b".into())][..]));
    }

    #[test]
    fn test_loop_context_resolution() {
        let outer = LoopContext::new(
            json!({"name": "g", "tags": ["x", "y"]}),
            1,
            &Path::parse("groups"),
            "group",
            None,
        );
        let inner = LoopContext::new(json!("y"), 1, &Path::parse("groups.1.tags"), "tag", Some(&outer));

        assert_eq!(inner.level, 2);

        let (path, value) = inner.resolve(&Path::parse("tag")).unwrap();
        assert_eq!(path.to_string(), "groups.1.tags.1");
        assert_eq!(value, Some(json!("y")));

        let (path, value) = inner.resolve(&Path::parse("group.name")).unwrap();
        assert_eq!(path.to_string(), "groups.1.name");
        assert_eq!(value, Some(json!("g")));

        assert!(inner.resolve(&Path::parse("title")).is_none());
    }

    #[test]
    fn test_loop_context_rebased() {
        let outer = LoopContext::new(json!({"tags": ["x"]}), 0, &Path::parse("groups"), "group", None);
        let inner = LoopContext::new(json!("x"), 0, &Path::parse("groups.0.tags"), "tag", Some(&outer));

        let moved = inner.rebased(&Path::parse("groups.1.tags.0"), json!("x"));
        let (path, _) = moved.resolve(&Path::parse("group.tags")).unwrap();
        assert_eq!(path.to_string(), "groups.1.tags");
        assert_eq!(moved.index, 0);
        assert_eq!(moved.level, 2);
    }

    #[test]
    fn test_loop_context_shifted() {
        let outer = LoopContext::new(json!({"tags": ["x"]}), 0, &Path::parse("groups"), "group", None);
        let inner = LoopContext::new(json!("x"), 0, &Path::parse("groups.0.tags"), "tag", Some(&outer));

        let moved = outer.shifted(&Path::parse("groups"), 1).unwrap();
        assert_eq!(moved.index, 1);
        assert_eq!(moved.path.to_string(), "groups.1");

        // Outer move: the inner index stays, its paths follow
        let moved = inner.shifted(&Path::parse("groups"), 1).unwrap();
        assert_eq!(moved.index, 0);
        assert_eq!(moved.path.to_string(), "groups.1.tags.0");
        let (path, _) = moved.resolve(&Path::parse("group.tags")).unwrap();
        assert_eq!(path.to_string(), "groups.1.tags");

        assert!(inner.shifted(&Path::parse("other"), 1).is_none());
        assert!(outer.shifted(&Path::parse("groups"), -1).is_none());
    }

    #[test]
    fn test_truthy_and_display() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!([])));

        assert_eq!(display_value(&json!("hi")), "hi");
        assert_eq!(display_value(&json!(null)), "");
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!(true)), "true");
    }
}
