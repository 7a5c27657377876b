//! Sender and recipient policy.
//!
//! An [`AddressFilter`] holds the compiled rules of a resolved configuration
//! and splits every submission into allowed and denied recipients. It never
//! mutates after construction, so a single instance is shared by every
//! concurrent `send` call.
//!
//! Rules are evaluated per recipient in this order, the first hit wins:
//!
//! 1. sender rejected by the sender allow pattern: every recipient is denied
//! 2. recipient matches the deny pattern
//! 3. recipient fails the allow pattern (only when one is configured)
//! 4. recipient domain is not in the allowed domain list (only when non-empty)
//!
//! Domains are compared ASCII case-insensitively, so `user@EXAMPLE.ORG`
//! passes an `example.org` entry. Patterns stay case-sensitive unless they
//! say otherwise.

use regex::Regex;

use crate::error::FilterError;

#[derive(Debug, Clone, Default)]
pub struct AddressFilter {
    allow_from: Option<Regex>,
    deny_to: Option<Regex>,
    allow_to: Option<Regex>,
    allow_to_domains: Vec<String>,
}

/// Result of filtering one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub allowed: Vec<String>,
    pub denied: Vec<String>,
    pub error: Option<FilterError>,
}

impl AddressFilter {
    pub fn new(
        allow_from: Option<Regex>,
        deny_to: Option<Regex>,
        allow_to: Option<Regex>,
        allow_to_domains: Vec<String>,
    ) -> Self {
        Self {
            allow_from,
            deny_to,
            allow_to,
            allow_to_domains,
        }
    }

    pub fn allowed_domains(&self) -> &[String] {
        &self.allow_to_domains
    }

    pub fn sender_allowed(&self, sender: &str) -> bool {
        self.allow_from.as_ref().map_or(true, |re| re.is_match(sender))
    }

    pub fn recipient_denied(&self, recipient: &str) -> bool {
        self.deny_to.as_ref().is_some_and(|re| re.is_match(recipient))
    }

    pub fn recipient_allowed(&self, recipient: &str) -> bool {
        self.allow_to.as_ref().map_or(true, |re| re.is_match(recipient))
    }

    pub fn domain_allowed(&self, recipient: &str) -> bool {
        if self.allow_to_domains.is_empty() {
            return true;
        }
        let domain = extract_domain(recipient);
        self.allow_to_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(domain))
    }

    /// Whether any positive recipient rule (pattern or domain list) is configured.
    pub fn has_allow_list(&self) -> bool {
        self.allow_to.is_some() || !self.allow_to_domains.is_empty()
    }

    /// Partitions `recipients` into allowed and denied, preserving input order.
    pub fn filter(&self, sender: &str, recipients: &[String]) -> FilterOutcome {
        let sender_allowed = self.sender_allowed(sender);
        let mut outcome = FilterOutcome::default();

        for recipient in recipients {
            let denied = !sender_allowed
                || self.recipient_denied(recipient)
                || !self.recipient_allowed(recipient)
                || !self.domain_allowed(recipient);

            if denied {
                outcome.denied.push(recipient.clone());
            } else {
                outcome.allowed.push(recipient.clone());
            }
        }

        outcome.error = if !sender_allowed {
            Some(FilterError::DeniedSender)
        } else if outcome.denied.is_empty() {
            None
        } else if self.has_allow_list() {
            Some(FilterError::DeniedRecipientsNotAllowed)
        } else {
            Some(FilterError::DeniedRecipients)
        };

        outcome
    }
}

/// Everything after the first `@`, or an empty string when there is none.
pub fn extract_domain(address: &str) -> &str {
    address.split_once('@').map_or("", |(_, domain)| domain)
}

/// Splits a comma separated domain list, trimming entries and dropping empty ones.
pub fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn re(pattern: &str) -> Option<Regex> {
        Some(Regex::new(pattern).unwrap())
    }

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn domains(list: &[&str]) -> Vec<String> {
        addrs(list)
    }

    #[test]
    fn test_filter_no_rules() {
        let filter = AddressFilter::default();
        let outcome = filter.filter(
            "sender@example.com",
            &addrs(&["user1@example.org", "user2@example.org"]),
        );

        assert_eq!(outcome.allowed, addrs(&["user1@example.org", "user2@example.org"]));
        assert!(outcome.denied.is_empty());
        assert_eq!(outcome.error, None);
    }

    #[test]
    fn test_filter_allow_to() {
        let filter = AddressFilter::new(None, None, re(r"^allowed@example\.org$"), vec![]);
        let outcome = filter.filter(
            "sender@example.com",
            &addrs(&["allowed@example.org", "other@example.org"]),
        );

        assert_eq!(outcome.allowed, addrs(&["allowed@example.org"]));
        assert_eq!(outcome.denied, addrs(&["other@example.org"]));
        assert_eq!(outcome.error, Some(FilterError::DeniedRecipientsNotAllowed));
    }

    #[test]
    fn test_filter_allow_to_domains() {
        let filter = AddressFilter::new(None, None, None, domains(&["example.org"]));
        let outcome = filter.filter(
            "sender@example.com",
            &addrs(&["user@example.org", "user@other.com", "admin@example.org"]),
        );

        assert_eq!(outcome.allowed, addrs(&["user@example.org", "admin@example.org"]));
        assert_eq!(outcome.denied, addrs(&["user@other.com"]));
        assert_eq!(outcome.error, Some(FilterError::DeniedRecipientsNotAllowed));
    }

    #[test]
    fn test_filter_multiple_domains() {
        let filter =
            AddressFilter::new(None, None, None, domains(&["example.org", "example.com"]));
        let outcome = filter.filter(
            "sender@example.com",
            &addrs(&["user@example.org", "user@example.com", "admin@other.org"]),
        );

        assert_eq!(outcome.allowed, addrs(&["user@example.org", "user@example.com"]));
        assert_eq!(outcome.denied, addrs(&["admin@other.org"]));
        assert_eq!(outcome.error, Some(FilterError::DeniedRecipientsNotAllowed));
    }

    #[test]
    fn test_filter_combined_rules() {
        // admin@denied.org matches the allow pattern but the deny rule runs first.
        let filter = AddressFilter::new(
            None,
            re(r"^admin@denied\.org$"),
            re("^admin@"),
            domains(&["example.org"]),
        );
        let outcome = filter.filter(
            "sender@example.com",
            &addrs(&["admin@example.org", "admin@denied.org", "user@example.org"]),
        );

        assert_eq!(outcome.allowed, addrs(&["admin@example.org"]));
        assert_eq!(outcome.denied, addrs(&["admin@denied.org", "user@example.org"]));
        assert_eq!(outcome.error, Some(FilterError::DeniedRecipientsNotAllowed));
    }

    #[test]
    fn test_filter_sender_denied() {
        let filter = AddressFilter::new(
            re(r"^allowed@sender\.com$"),
            None,
            re("^admin@"),
            vec![],
        );
        let outcome = filter.filter(
            "notallowed@sender.com",
            &addrs(&["admin@example.org", "user@example.org"]),
        );

        assert!(outcome.allowed.is_empty());
        assert_eq!(outcome.denied, addrs(&["admin@example.org", "user@example.org"]));
        assert_eq!(outcome.error, Some(FilterError::DeniedSender));
    }

    #[test]
    fn test_filter_sender_denied_without_recipients() {
        let filter = AddressFilter::new(re("^nobody$"), None, None, vec![]);
        let outcome = filter.filter("sender@example.com", &[]);

        assert!(outcome.allowed.is_empty());
        assert!(outcome.denied.is_empty());
        assert_eq!(outcome.error, Some(FilterError::DeniedSender));
    }

    #[test]
    fn test_filter_deny_to_only() {
        let filter = AddressFilter::new(None, re("^blocked@"), None, vec![]);
        let outcome = filter.filter(
            "sender@example.com",
            &addrs(&["blocked@example.org", "allowed@example.org"]),
        );

        assert_eq!(outcome.allowed, addrs(&["allowed@example.org"]));
        assert_eq!(outcome.denied, addrs(&["blocked@example.org"]));
        assert_eq!(outcome.error, Some(FilterError::DeniedRecipients));
    }

    #[test]
    fn test_filter_recipient_without_domain() {
        let filter = AddressFilter::new(None, None, None, domains(&["example.org"]));
        let outcome = filter.filter("sender@example.com", &addrs(&["invalid-email"]));
        assert_eq!(outcome.denied, addrs(&["invalid-email"]));

        let outcome = AddressFilter::default().filter("sender@example.com", &addrs(&["invalid-email"]));
        assert_eq!(outcome.allowed, addrs(&["invalid-email"]));
    }

    #[test]
    fn test_filter_keeps_duplicates() {
        let filter = AddressFilter::new(None, re("^b@"), None, vec![]);
        let outcome = filter.filter(
            "s@example.com",
            &addrs(&["a@example.org", "b@example.org", "a@example.org", "b@example.org"]),
        );
        assert_eq!(outcome.allowed, addrs(&["a@example.org", "a@example.org"]));
        assert_eq!(outcome.denied, addrs(&["b@example.org", "b@example.org"]));
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("user@example.org"), "example.org");
        assert_eq!(extract_domain("admin@mail.example.com"), "mail.example.com");
        assert_eq!(extract_domain("odd@at@example.com"), "at@example.com");
        assert_eq!(extract_domain("test@"), "");
        assert_eq!(extract_domain("invalid-email"), "");
        assert_eq!(extract_domain(""), "");
    }

    #[test]
    fn test_domain_allowed() {
        let filter = AddressFilter::new(None, None, None, domains(&["example.org", "test.com"]));
        assert!(filter.domain_allowed("user@example.org"));
        assert!(filter.domain_allowed("user@Example.ORG"));
        assert!(filter.domain_allowed("admin@test.com"));
        assert!(!filter.domain_allowed("user@other.org"));
        assert!(!filter.domain_allowed("user@sub.example.org"));
        assert!(!filter.domain_allowed("invalid-email"));
        assert!(AddressFilter::default().domain_allowed("anything"));
    }

    #[test]
    fn test_parse_domain_list() {
        assert_eq!(
            parse_domain_list(" example.org , example.com , "),
            domains(&["example.org", "example.com"])
        );
        assert!(parse_domain_list("").is_empty());
        assert!(parse_domain_list(" , ,").is_empty());
    }

    fn recipient() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-c]{1,3}@(example\\.org|example\\.com|other\\.net)",
            "[a-c]{1,5}",
        ]
    }

    proptest! {
        #[test]
        fn prop_filter_partitions_recipients(
            recipients in prop::collection::vec(recipient(), 0..12),
            deny in prop::option::of("[a-c]"),
            allow in prop::option::of("[a-c]"),
            restrict_domains in any::<bool>(),
            sender_ok in any::<bool>(),
        ) {
            let filter = AddressFilter::new(
                Some(Regex::new(if sender_ok { "^s@" } else { "^nobody@" }).unwrap()),
                deny.map(|d| Regex::new(&format!("^{d}")).unwrap()),
                allow.map(|a| Regex::new(&format!("^{a}")).unwrap()),
                if restrict_domains { domains(&["example.org"]) } else { vec![] },
            );
            let outcome = filter.filter("s@example.com", &recipients);

            prop_assert_eq!(outcome.allowed.len() + outcome.denied.len(), recipients.len());

            let mut merged: Vec<String> =
                outcome.allowed.iter().chain(outcome.denied.iter()).cloned().collect();
            let mut expected = recipients.clone();
            merged.sort();
            expected.sort();
            prop_assert_eq!(merged, expected);

            if !sender_ok {
                prop_assert!(outcome.allowed.is_empty());
                prop_assert_eq!(outcome.error, Some(FilterError::DeniedSender));
            } else if outcome.denied.is_empty() {
                prop_assert_eq!(outcome.error, None);
            }
        }
    }
}
