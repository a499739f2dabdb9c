/// The classic lorem ipsum paragraph.
const COMMON_PARAGRAPH: &str = "Lorem ipsum dolor sit amet, consectetur adipisicing elit, sed \
do eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis \
nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat. Duis aute irure \
dolor in reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla pariatur. \
Excepteur sint occaecat cupidatat non proident, sunt in culpa qui officia deserunt mollit anim \
id est laborum.";

/// Return the given number of filler paragraphs, separated by blank lines.
pub(crate) fn paragraphs(count: usize) -> String {
    vec![COMMON_PARAGRAPH; count].join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::paragraphs;

    #[test]
    fn test_paragraphs() {
        assert_eq!(paragraphs(0), "");
        assert!(paragraphs(1).starts_with("Lorem ipsum"));
        assert_eq!(paragraphs(2).matches("Lorem ipsum").count(), 2);
    }
}
