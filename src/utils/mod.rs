// Utility functions for the user admin service

/// Mask email address for log output
pub fn mask_email(email: &str) -> String {
    if let Some(at_pos) = email.find('@') {
        let local = &email[..at_pos];
        let domain = &email[at_pos..];

        if local.chars().count() <= 2 {
            return email.to_string();
        }

        let visible: String = local.chars().take(2).collect();
        format!("{}***{}", visible, domain)
    } else {
        email.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("maria@example.com"), "ma***@example.com");
        assert_eq!(mask_email("ab@example.com"), "ab@example.com");
        assert_eq!(mask_email("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn test_mask_email_multibyte_local_part() {
        assert_eq!(mask_email("joão@example.com"), "jo***@example.com");
    }
}
