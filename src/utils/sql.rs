/// 转义 LIKE 模式中的通配符
///
/// 用户输入的搜索词在拼入 LIKE 模式前必须转义 `%`、`_` 和转义符本身。
pub fn escape_like_pattern(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_percent() {
        assert_eq!(escape_like_pattern("100%"), "100\\%");
    }

    #[test]
    fn test_escape_underscore() {
        assert_eq!(escape_like_pattern("TXN_001"), "TXN\\_001");
    }

    #[test]
    fn test_escape_backslash_first() {
        assert_eq!(escape_like_pattern("a\\%b"), "a\\\\\\%b");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(escape_like_pattern("receipt 2025"), "receipt 2025");
    }
}
