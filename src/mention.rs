//! Mention extraction from message content.

use regex::Regex;
use std::sync::LazyLock;

/// `@name` or `@multi-part-name`: word characters, optionally extended with
/// `-word` segments. Case-sensitive.
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+(?:-\w+)*)").expect("mention pattern"));

/// Extract mentioned agent names in order of appearance, duplicates kept.
///
/// Pure; callers record the result on the message before persisting it.
pub fn extract_mentions(content: &str) -> Vec<String> {
    MENTION_RE
        .captures_iter(content)
        .map(|cap| cap[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_mentions() {
        assert_eq!(extract_mentions("hello @Bob"), vec!["Bob"]);
    }

    #[test]
    fn extracts_hyphenated_names() {
        assert_eq!(
            extract_mentions("ping @code-review-bot please"),
            vec!["code-review-bot"]
        );
    }

    #[test]
    fn preserves_order_and_duplicates() {
        assert_eq!(
            extract_mentions("@a then @b then @a again"),
            vec!["a", "b", "a"]
        );
    }

    #[test]
    fn is_case_sensitive() {
        assert_eq!(extract_mentions("@Bob @bob"), vec!["Bob", "bob"]);
    }

    #[test]
    fn ignores_bare_at_and_trailing_hyphen() {
        assert_eq!(extract_mentions("a @ b"), Vec::<String>::new());
        // A trailing hyphen is not part of the mention.
        assert_eq!(extract_mentions("hey @bob- ok"), vec!["bob"]);
    }

    #[test]
    fn reparse_is_stable() {
        let content = "fyi @alice @multi-part-name @alice";
        assert_eq!(extract_mentions(content), extract_mentions(content));
    }
}
