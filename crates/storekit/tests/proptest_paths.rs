//! Property-based tests for path normalization
//!
//! Generates messy but valid raw paths (mixed separators, doubled slashes,
//! optional leading slash) and checks the normalization invariants.

use proptest::prelude::*;
use storekit::StoragePath;

mod strategies {
    use proptest::prelude::*;

    /// A single path segment without dots or reserved characters.
    pub fn segment() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9_ -]{0,8}[a-zA-Z0-9_-]").unwrap()
    }

    pub fn separator() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("/"), Just("//"), Just("\\")]
    }

    /// Raw path plus its segments and directory flag.
    pub fn raw_path() -> impl Strategy<Value = (String, Vec<String>, bool)> {
        (
            prop::collection::vec((segment(), separator()), 1..6),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(parts, leading, directory)| {
                let mut raw = String::new();
                if leading {
                    raw.push('/');
                }
                let last = parts.len() - 1;
                for (i, (segment, separator)) in parts.iter().enumerate() {
                    raw.push_str(segment);
                    if i < last || directory {
                        raw.push_str(separator);
                    }
                }
                let segments = parts.into_iter().map(|(segment, _)| segment).collect();
                (raw, segments, directory)
            })
    }

    /// Separator-only input, which parses to the root.
    pub fn root_path() -> impl Strategy<Value = String> {
        prop::collection::vec(separator(), 1..4).prop_map(|parts| parts.concat())
    }

    /// Any valid raw path, the root included.
    pub fn any_path() -> impl Strategy<Value = String> {
        prop_oneof![
            4 => raw_path().prop_map(|(raw, _, _)| raw),
            1 => root_path(),
        ]
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn normalization_is_idempotent(raw in strategies::any_path()) {
        let path = StoragePath::parse(&raw).unwrap();
        let again = StoragePath::parse(&path.to_string()).unwrap();
        prop_assert_eq!(again.normalized(), path.normalized());
        prop_assert_eq!(again.is_directory(), path.is_directory());
        prop_assert_eq!(&again, &path);
        if !path.is_root() {
            prop_assert_eq!(&StoragePath::parse(path.normalized()).unwrap(), &path);
        }
    }

    #[test]
    fn serde_round_trips(raw in strategies::any_path()) {
        let path = StoragePath::parse(&raw).unwrap();
        let json = serde_json::to_string(&path).unwrap();
        let back: StoragePath = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.is_directory(), path.is_directory());
        prop_assert_eq!(back, path);
    }

    #[test]
    fn separators_alone_parse_to_root(raw in strategies::root_path()) {
        let path = StoragePath::parse(&raw).unwrap();
        prop_assert!(path.is_root());
        prop_assert!(path.is_directory());
        prop_assert!(path.path_tree().is_empty());
    }

    #[test]
    fn normalized_form_is_canonical((raw, segments, directory) in strategies::raw_path()) {
        let path = StoragePath::parse(&raw).unwrap();
        let mut expected = segments.join("/");
        if directory {
            expected.push('/');
        }
        prop_assert_eq!(path.normalized(), expected.as_str());
        prop_assert_eq!(path.is_directory(), directory);
        prop_assert_eq!(path.original(), raw.as_str());
    }

    #[test]
    fn path_tree_ends_with_the_path((raw, segments, _) in strategies::raw_path()) {
        let path = StoragePath::parse(&raw).unwrap();
        let tree = path.path_tree();
        prop_assert_eq!(tree.len(), segments.len());
        prop_assert_eq!(tree.last(), Some(&path));
        for ancestor in &tree[..tree.len() - 1] {
            prop_assert!(ancestor.is_directory());
            prop_assert!(path.is_within(ancestor));
        }
    }

    #[test]
    fn combine_and_strip_are_inverse(
        (root_raw, _, _) in strategies::raw_path(),
        (raw, _, _) in strategies::raw_path(),
    ) {
        let root = StoragePath::parse(&root_raw).unwrap().as_directory();
        let path = StoragePath::parse(&raw).unwrap();
        let combined = root.combine(&path).unwrap();
        prop_assert!(combined.is_within(&root));
        prop_assert_eq!(combined.remove_root_path(&root), Some(path));
    }

    #[test]
    fn parse_never_panics(raw in ".{0,64}") {
        let _ = StoragePath::parse(&raw);
    }
}
