//! Path parsing
//!
//! Paths are `/`-delimited. A leading `/` starts from the root, anything
//! else from the current directory. Empty components (`a//b`, trailing `/`)
//! are ignored.

/// One component of a parsed path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component<'a> {
    /// `.`
    Current,
    /// `..`
    Parent,
    /// Any other name
    Name(&'a str),
}

/// A path split into components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath<'a> {
    /// Whether resolution starts at the root
    pub absolute: bool,
    pub components: Vec<Component<'a>>,
}

impl<'a> ParsedPath<'a> {
    /// Splits off the final component
    ///
    /// Returns the path of the containing directory and the last component,
    /// or `None` when the path has no components at all (`""`, `"/"`).
    pub fn split_last(&self) -> Option<(ParsedPath<'a>, Component<'a>)> {
        let (last, rest) = self.components.split_last()?;
        Some((
            ParsedPath {
                absolute: self.absolute,
                components: rest.to_vec(),
            },
            *last,
        ))
    }

    /// Returns true if the path has no components
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Path resolver
///
/// Handles splitting paths into components and validating names.
pub struct PathResolver;

impl PathResolver {
    /// Parses a path into components
    ///
    /// # Examples
    ///
    /// ```
    /// use fs_tree::{Component, PathResolver};
    ///
    /// let path = PathResolver::parse("/docs/../notes.txt");
    /// assert!(path.absolute);
    /// assert_eq!(
    ///     path.components,
    ///     vec![Component::Name("docs"), Component::Parent, Component::Name("notes.txt")]
    /// );
    /// ```
    pub fn parse(path: &str) -> ParsedPath<'_> {
        let components = path
            .split('/')
            .filter(|component| !component.is_empty())
            .map(|component| match component {
                "." => Component::Current,
                ".." => Component::Parent,
                name => Component::Name(name),
            })
            .collect();

        ParsedPath {
            absolute: path.starts_with('/'),
            components,
        }
    }

    /// Validates a single entry name
    ///
    /// Returns true if the name is valid for a directory entry.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains('\0')
    }
}
