/// Get the RDN (first component before the first comma).
pub fn rdn(dn: &str) -> &str {
    dn.split(',').next().unwrap_or(dn)
}

/// Check if `dn` equals `base` or sits anywhere below it.
pub fn is_within(dn: &str, base: &str) -> bool {
    if base.is_empty() {
        return true;
    }
    let dn_lower = dn.to_lowercase();
    let base_lower = base.to_lowercase();
    dn_lower == base_lower || dn_lower.ends_with(&format!(",{}", base_lower))
}

/// Extract the value of the first `CN=` component of a member DN.
///
/// Components are split on commas and trimmed; the `CN=` prefix is matched
/// case-insensitively. Returns `None` when no component carries a non-empty CN.
pub fn common_name(dn: &str) -> Option<&str> {
    dn.split(',')
        .map(str::trim)
        .find(|part| {
            part.get(..3)
                .map(|p| p.eq_ignore_ascii_case("cn="))
                .unwrap_or(false)
        })
        .map(|part| part[3..].trim())
        .filter(|cn| !cn.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rdn() {
        assert_eq!(rdn("cn=admin,dc=example,dc=com"), "cn=admin");
        assert_eq!(rdn("dc=com"), "dc=com");
        assert_eq!(rdn(""), "");
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("cn=admin,dc=example,dc=com", "dc=example,dc=com"));
        assert!(is_within("dc=example,dc=com", "dc=example,dc=com"));
        assert!(!is_within("cn=admin,dc=other,dc=com", "dc=example,dc=com"));
        assert!(!is_within("cn=admin,xdc=example,dc=com", "dc=example,dc=com"));
    }

    #[test]
    fn test_is_within_case_insensitive() {
        assert!(is_within("cn=Admin,DC=EXAMPLE,DC=COM", "dc=example,dc=com"));
    }

    #[test]
    fn test_is_within_empty_base() {
        assert!(is_within("dc=example,dc=com", ""));
    }

    #[test]
    fn test_common_name_ad_style() {
        assert_eq!(
            common_name("CN=Jane Doe,OU=Users,DC=example,DC=com"),
            Some("Jane Doe")
        );
    }

    #[test]
    fn test_common_name_lowercase_prefix() {
        assert_eq!(common_name("cn=jdoe,ou=people,dc=example"), Some("jdoe"));
    }

    #[test]
    fn test_common_name_not_first_component() {
        assert_eq!(
            common_name("uid=jdoe, CN=John Doe,dc=example"),
            Some("John Doe")
        );
    }

    #[test]
    fn test_common_name_missing() {
        assert_eq!(common_name("uid=jdoe,ou=people,dc=example"), None);
        assert_eq!(common_name("CN=,OU=Users"), None);
        assert_eq!(common_name(""), None);
    }
}
