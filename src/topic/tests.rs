use super::{Topics, is_match, match_topic};

#[test]
fn test_literal_match() {
    assert!(match_topic("foo/bar", "foo/bar", &mut []));
    assert!(!match_topic("foo/bar", "bar/foo", &mut []));
}

#[test]
fn test_single_level_wildcard_positions() {
    let mut arg = [""];
    assert!(match_topic("foo/bar/+", "foo/bar/test", &mut arg));
    assert_eq!(arg, ["test"]);

    let mut arg = [""];
    assert!(match_topic("foo/+/bar", "foo/test/bar", &mut arg));
    assert_eq!(arg, ["test"]);

    let mut arg = [""];
    assert!(match_topic("+/foo/bar", "test/foo/bar", &mut arg));
    assert_eq!(arg, ["test"]);
}

#[test]
fn test_consecutive_single_level_wildcards() {
    let mut args = [""; 2];
    assert!(match_topic("+/+", "foo/bar", &mut args));
    assert_eq!(args, ["foo", "bar"]);
}

#[test]
fn test_scattered_single_level_wildcards() {
    let mut args = [""; 4];
    assert!(match_topic("+/+/bar/+/foo/+", "a/b/bar/c/foo/d", &mut args));
    assert_eq!(args, ["a", "b", "c", "d"]);

    let mut args = [""; 2];
    assert!(match_topic("a/+/c/+", "a/x/c/y", &mut args));
    assert_eq!(args, ["x", "y"]);
}

#[test]
fn test_multi_level_wildcard_captures_suffix() {
    let mut arg = [""];
    assert!(match_topic("foo/bar/#", "foo/bar/a", &mut arg));
    assert_eq!(arg, ["a"]);

    let mut arg = [""];
    assert!(match_topic("a/b/#", "a/b/c/d", &mut arg));
    assert_eq!(arg, ["c/d"]);
}

#[test]
fn test_multi_level_wildcard_needs_a_level() {
    let mut arg = [""];
    assert!(!match_topic("a/b/#", "a/b", &mut arg));
    assert_eq!(arg, [""]);
    assert!(!match_topic("foo/bar/#", "bar/foo", &mut arg));
}

#[test]
fn test_wildcard_needs_topic_left() {
    let mut arg = [""];
    assert!(!match_topic("a/b/#", "a/b/", &mut arg));
    assert!(!match_topic("a/b/+", "a/b/", &mut arg));
    assert!(!match_topic("+", "", &mut arg));
    assert!(!match_topic("#", "", &mut arg));
    assert_eq!(arg, [""]);

    // empty middle levels still count
    let mut arg = ["stale"];
    assert!(match_topic("a/+/c", "a//c", &mut arg));
    assert_eq!(arg, [""]);
    assert!(match_topic("a/", "a/", &mut []));
}

#[test]
fn test_topic_exhausted_before_pattern() {
    let mut arg = [""];
    assert!(!match_topic("foo/bar/+", "foo/bar", &mut arg));

    let mut args = [""; 4];
    assert!(!match_topic("+/+/bar/+/foo/+", "bar/foo", &mut args));
    assert_eq!(args, [""; 4]);
}

#[test]
fn test_pattern_exhausted_before_topic() {
    assert!(!match_topic("foo/bar", "foo/bar/baz", &mut []));

    let mut arg = [""];
    assert!(!match_topic("device-manager/device/+", "device-manager/device/r1/lw", &mut arg));
    assert_eq!(arg, [""]);
}

#[test]
fn test_partial_captures_are_reset_on_mismatch() {
    let mut args = ["stale"; 2];
    assert!(!match_topic("+/x/+", "a/y/b", &mut args));
    assert_eq!(args[0], "");
    // never reached, left as supplied
    assert_eq!(args[1], "stale");
}

#[test]
fn test_missing_capture_slot_does_not_panic() {
    assert!(!match_topic("+/+", "a/b", &mut [""]));
}

#[test]
fn test_is_match() {
    assert!(is_match("device-manager/device/+", "device-manager/device/r1"));
    assert!(is_match("device-manager/device/+/lw", "device-manager/device/r1/lw"));
    assert!(!is_match("device-manager/device/+", "device-manager/device/r1/lw"));
}

#[test]
fn test_topics_from_prefix() {
    let topics = Topics::new("gw/");
    assert_eq!(topics.devices, "gw/device/+");
    assert_eq!(topics.last_will, "gw/device/+/lw");
    assert_eq!(topics.refresh, "gw/refresh");
    assert_eq!(Topics::default().devices, "device-manager/device/+");
}
