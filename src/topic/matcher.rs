//! Subscription pattern matching
//!
//! Patterns are `/`-delimited. A `+` level matches exactly one topic level
//! and a `#` level matches everything that remains. Matching walks the
//! pattern and the topic in lockstep, slicing the topic as it goes, so no
//! level vectors are built.
//!
//! A wildcard never matches at the very end of the topic: `a/b/#` does not
//! match `a/b/` and `+` does not match `""`. An empty level in the middle
//! (`a//c` against `a/+/c`) is still captured as `""`.

const LEVEL_SEPARATOR: char = '/';
const SINGLE_LEVEL_WILDCARD: &str = "+";
const MULTI_LEVEL_WILDCARD: &str = "#";

/// Matches `topic` against `pattern`, writing the wildcard captures into
/// `captures` in pattern order.
///
/// The caller supplies exactly one slot per wildcard level. A `#` capture
/// holds the whole remaining suffix (for example `"c/d"`). When the topic
/// does not match, every slot written during the attempt is reset to `""`.
///
/// ```
/// use devicehub::topic::match_topic;
///
/// let mut captures = [""; 2];
/// assert!(match_topic("a/+/c/+", "a/x/c/y", &mut captures));
/// assert_eq!(captures, ["x", "y"]);
/// ```
pub fn match_topic<'t>(pattern: &str, topic: &'t str, captures: &mut [&'t str]) -> bool {
    let mut filled = 0;
    let matched = walk(pattern, topic, |capture| match captures.get_mut(filled) {
        Some(slot) => {
            *slot = capture;
            filled += 1;
            true
        }
        None => false,
    });
    if !matched {
        for slot in captures.iter_mut().take(filled) {
            *slot = "";
        }
    }
    matched
}

/// Reports whether `topic` matches `pattern`, discarding captures.
pub fn is_match(pattern: &str, topic: &str) -> bool {
    walk(pattern, topic, |_| true)
}

fn walk<'t>(pattern: &str, topic: &'t str, mut on_capture: impl FnMut(&'t str) -> bool) -> bool {
    // `None` once every topic level has been consumed.
    let mut remaining = Some(topic);

    for level in pattern.split(LEVEL_SEPARATOR) {
        let Some(current) = remaining else {
            return false;
        };

        let wildcard = level == MULTI_LEVEL_WILDCARD || level == SINGLE_LEVEL_WILDCARD;
        if wildcard && current.is_empty() {
            return false;
        }
        if level == MULTI_LEVEL_WILDCARD {
            return on_capture(current);
        }

        let (topic_level, rest) = match current.split_once(LEVEL_SEPARATOR) {
            Some((head, tail)) => (head, Some(tail)),
            None => (current, None),
        };

        if level == SINGLE_LEVEL_WILDCARD {
            if !on_capture(topic_level) {
                return false;
            }
        } else if level != topic_level {
            return false;
        }

        remaining = rest;
    }

    remaining.is_none()
}
