/// Mask a secret value for safe display in logs and settings previews.
/// Shows the first 4 and last 4 characters, the rest as `****`. Counts
/// characters, not bytes; channel secrets are operator input and may
/// contain multibyte text.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "****".to_string()
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}****{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_hides_middle_of_long_secrets() {
        assert_eq!(mask_secret("1234567890abcdef"), "1234****cdef");
    }

    #[test]
    fn short_secrets_are_fully_masked() {
        assert_eq!(mask_secret(""), "****");
        assert_eq!(mask_secret("short"), "****");
        assert_eq!(mask_secret("12345678"), "****");
    }

    #[test]
    fn multibyte_secrets_mask_without_panicking() {
        assert_eq!(mask_secret("日本語シークレット"), "日本語シ****クレット");
        assert_eq!(mask_secret("日本語"), "****");
    }
}
