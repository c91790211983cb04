use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

/// One step in a [`Path`]: a map key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
	Key(Arc<str>),
	Index(usize),
}

impl Segment {
	/// The key, if this is a key segment.
	pub fn as_key(&self) -> Option<&str> {
		match self {
			Self::Key(key) => Some(key),
			Self::Index(_) => None,
		}
	}

	/// The index, if this is an index segment.
	pub fn as_index(&self) -> Option<usize> {
		match self {
			Self::Index(index) => Some(*index),
			Self::Key(_) => None,
		}
	}
}

impl From<&str> for Segment {
	fn from(key: &str) -> Self {
		Self::Key(key.into())
	}
}

impl From<String> for Segment {
	fn from(key: String) -> Self {
		Self::Key(key.into())
	}
}

impl From<Arc<str>> for Segment {
	fn from(key: Arc<str>) -> Self {
		Self::Key(key)
	}
}

impl From<&Arc<str>> for Segment {
	fn from(key: &Arc<str>) -> Self {
		Self::Key(Arc::clone(key))
	}
}

impl From<usize> for Segment {
	fn from(index: usize) -> Self {
		Self::Index(index)
	}
}

impl fmt::Display for Segment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Key(key) => f.write_str(key),
			Self::Index(index) => write!(f, "{index}"),
		}
	}
}

/// Ordered segments addressing a location in a [`Value`](crate::Value) tree
/// or a slot in a handler registry.
///
/// Most paths are short, so segments are stored inline up to four deep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(SmallVec<[Segment; 4]>);

impl Path {
	/// The root path, with no segments.
	pub fn new() -> Self {
		Self(SmallVec::new())
	}

	/// Builds a path from anything convertible to segments.
	pub fn from_segments<I, S>(segments: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Segment>,
	{
		Self(segments.into_iter().map(Into::into).collect())
	}

	pub fn segments(&self) -> &[Segment] {
		&self.0
	}

	/// Number of segments.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// True for the root path.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn first(&self) -> Option<&Segment> {
		self.0.first()
	}

	/// The final segment, e.g. the variable name of a session path.
	pub fn last(&self) -> Option<&Segment> {
		self.0.last()
	}

	/// Appends `segment` in place.
	pub fn push(&mut self, segment: impl Into<Segment>) {
		self.0.push(segment.into());
	}

	/// Returns a new path with `segment` appended.
	#[must_use]
	pub fn join(&self, segment: impl Into<Segment>) -> Self {
		let mut joined = self.clone();
		joined.push(segment);
		joined
	}

	/// Returns the path without its last segment, or `None` for the root.
	pub fn parent(&self) -> Option<Self> {
		let (_, parent) = self.0.split_last()?;
		Some(Self(parent.iter().cloned().collect()))
	}

	/// Returns the first `len` segments.
	pub fn prefix(&self, len: usize) -> Self {
		Self(self.0.iter().take(len).cloned().collect())
	}

	/// True if `prefix` is a prefix of this path, including equal paths.
	pub fn starts_with(&self, prefix: &Path) -> bool {
		self.0.starts_with(&prefix.0)
	}

	/// Returns the segments after `prefix`, if this path starts with it.
	pub fn strip_prefix(&self, prefix: &Path) -> Option<&[Segment]> {
		self.0.strip_prefix(prefix.0.as_slice())
	}
}

impl FromIterator<Segment> for Path {
	fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

impl From<Segment> for Path {
	fn from(segment: Segment) -> Self {
		Self::from_segments([segment])
	}
}

impl From<&str> for Path {
	fn from(key: &str) -> Self {
		Self::from_segments([key])
	}
}

impl From<Vec<Segment>> for Path {
	fn from(segments: Vec<Segment>) -> Self {
		Self(SmallVec::from_vec(segments))
	}
}

impl<S: Into<Segment>, const N: usize> From<[S; N]> for Path {
	fn from(segments: [S; N]) -> Self {
		Self::from_segments(segments)
	}
}

impl From<&Path> for Path {
	fn from(path: &Path) -> Self {
		path.clone()
	}
}

impl<'a> IntoIterator for &'a Path {
	type Item = &'a Segment;
	type IntoIter = std::slice::Iter<'a, Segment>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}

impl fmt::Display for Path {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.0.is_empty() {
			return f.write_str("/");
		}
		for (i, segment) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str("/")?;
			}
			write!(f, "{segment}")?;
		}
		Ok(())
	}
}

/// Builds a [`Path`] from mixed key and index segments.
///
/// ```
/// use pagesync_primitives::{Segment, path};
///
/// let p = path!["dataSources", 2usize, "trackPath"];
/// assert_eq!(p.segments()[1], Segment::Index(2));
/// ```
#[macro_export]
macro_rules! path {
	() => {
		$crate::Path::new()
	};
	($($segment:expr),+ $(,)?) => {
		<$crate::Path as ::core::iter::FromIterator<$crate::Segment>>::from_iter([
			$($crate::Segment::from($segment)),+
		])
	};
}
