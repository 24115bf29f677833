// tests/path_map_props.rs

use std::path::Path;

use proptest::prelude::*;

use pipewatch::types::EventKind;
use pipewatch::watch::{map, map_event, CanonicalPath};

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,7}"
}

fn segments(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 1..=max)
}

/// Join segments with a randomly chosen messy separator between each pair,
/// optionally behind a leading `./`.
fn messy_path(max: usize) -> impl Strategy<Value = (Vec<String>, String)> {
    segments(max).prop_flat_map(|segs| {
        let n = segs.len();
        (
            Just(segs),
            prop::collection::vec(prop::sample::select(vec!["/", "\\", "//", "/./", "\\\\", "\\./"]), n),
            any::<bool>(),
        )
            .prop_map(|(segs, seps, dot_prefix)| {
                let mut raw = if dot_prefix { "./".to_string() } else { String::new() };
                for (i, seg) in segs.iter().enumerate() {
                    if i > 0 {
                        raw.push_str(seps[i]);
                    }
                    raw.push_str(seg);
                }
                // A trailing separator is noise too.
                raw.push_str(seps[0]);
                (segs, raw)
            })
    })
}

proptest! {
    /// Whatever sits before and after the source root survives the mapping.
    #[test]
    fn mapping_preserves_prefix_and_suffix(
        prefix in prop::collection::vec(segment(), 0..3),
        src in segments(3),
        build in segments(3),
        rest in segments(4),
    ) {
        let event: Vec<String> = prefix.iter().chain(&src).chain(&rest).cloned().collect();
        prop_assume!(event.windows(src.len()).filter(|w| *w == src.as_slice()).count() == 1);
        let out = map(&event.join("/"), &src.join("/"), &build.join("/")).unwrap();

        let expected: Vec<String> = prefix.iter().chain(&build).chain(&rest).cloned().collect();
        prop_assert_eq!(out.segments(), expected.as_slice());
    }

    /// Backslash and forward-slash spellings of the same path map identically.
    #[test]
    fn separator_style_is_irrelevant(
        src in segments(3),
        build in segments(3),
        rest in segments(3),
    ) {
        let event: Vec<String> = src.iter().chain(&rest).cloned().collect();

        let forward = map(&event.join("/"), &src.join("/"), &build.join("/")).unwrap();
        let backward = map(&event.join("\\"), &format!("{}\\", src.join("\\")), &build.join("/")).unwrap();
        prop_assert_eq!(forward, backward);
    }

    /// Added events target the directory; changed and removed the file itself.
    #[test]
    fn added_maps_to_parent_of_changed(
        src in segments(2),
        build in segments(2),
        rest in segments(3),
    ) {
        let event: Vec<String> = src.iter().chain(&rest).cloned().collect();
        let event_path = event.join("/");

        let file = map_event(EventKind::Changed, Path::new(&event_path), Path::new(&src.join("/")), Path::new(&build.join("/"))).unwrap();
        let removed = map_event(EventKind::Removed, Path::new(&event_path), Path::new(&src.join("/")), Path::new(&build.join("/"))).unwrap();
        let dir = map_event(EventKind::Added, Path::new(&event_path), Path::new(&src.join("/")), Path::new(&build.join("/"))).unwrap();

        prop_assert_eq!(&file, &removed);
        prop_assert_eq!(CanonicalPath::from_path(&file).parent(), Some(CanonicalPath::from_path(&dir)));
    }

    /// Paths outside the source root never map.
    #[test]
    fn unrelated_paths_are_not_mappable(
        src in segments(2),
        other in segments(3),
    ) {
        prop_assume!(!other.windows(src.len()).any(|w| w == src.as_slice()));
        prop_assert!(map(&other.join("/"), &src.join("/"), "build").is_err());
    }

    /// Normalizing an already normalized path changes nothing.
    #[test]
    fn parse_is_idempotent((segs, raw) in messy_path(5)) {
        let once = CanonicalPath::parse(&raw);
        prop_assert_eq!(once.segments(), segs.as_slice());
        prop_assert_eq!(CanonicalPath::parse(&once.to_string()), once);
    }

    /// Mapping a messy spelling and mapping its normalized rendering agree,
    /// and the mapped output is itself already normalized.
    #[test]
    fn mapping_is_stable_under_renormalization(
        (src, src_raw) in messy_path(3),
        (rest, rest_raw) in messy_path(3),
        build in segments(3),
    ) {
        let event_raw = format!("{src_raw}{rest_raw}");
        let event = CanonicalPath::parse(&event_raw);
        let expected: Vec<String> = src.iter().chain(&rest).cloned().collect();
        prop_assert_eq!(event.segments(), expected.as_slice());
        prop_assume!(expected.windows(src.len()).filter(|w| *w == src.as_slice()).count() == 1);

        let messy = map(&event_raw, &src_raw, &build.join("/")).unwrap();
        let clean = map(&event.to_string(), &src.join("/"), &build.join("/")).unwrap();
        prop_assert_eq!(&messy, &clean);
        prop_assert_eq!(CanonicalPath::parse(&messy.to_string()), messy);
    }
}
