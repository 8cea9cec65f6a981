//! Reply composition

use mail_builder::headers::address::Address;
use mail_builder::MessageBuilder;
use replybox_common::{Error, Result};
use replybox_storage::EmailRecord;

/// Split a `Name <address>` header value into its parts
pub fn split_mailbox(value: &str) -> (Option<&str>, &str) {
    let value = value.trim();
    match (value.rfind('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => {
            let name = value[..start].trim().trim_matches('"').trim();
            let address = value[start + 1..end].trim();
            ((!name.is_empty()).then_some(name), address)
        }
        _ => (None, value),
    }
}

/// Subject line for a reply, adding `Re:` once
pub fn reply_subject(subject: &str) -> String {
    let subject = subject.trim();
    if subject
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"))
    {
        subject.to_string()
    } else if subject.is_empty() {
        "Re:".to_string()
    } else {
        format!("Re: {}", subject)
    }
}

/// Build the RFC 5322 reply to `original`
///
/// The reply goes to the original sender and references the original
/// `Message-ID` when it is known.
pub fn compose_reply(original: &EmailRecord, content: &str, from: Option<&str>) -> Result<Vec<u8>> {
    let (name, address) = split_mailbox(&original.sender);
    if !address.contains('@') {
        return Err(Error::Validation(format!(
            "Email {} has no reply address (sender: {:?})",
            original.id, original.sender
        )));
    }

    let to: Address<'_> = match name {
        Some(name) => (name, address).into(),
        None => address.into(),
    };

    let mut builder = MessageBuilder::new()
        .to(to)
        .subject(reply_subject(&original.subject))
        .text_body(content);

    if let Some(from) = from {
        let (from_name, from_address) = split_mailbox(from);
        builder = match from_name {
            Some(from_name) => builder.from((from_name, from_address)),
            None => builder.from(from_address),
        };
    }

    if let Some(message_id) = original.message_id_header.as_deref() {
        builder = builder.in_reply_to(message_id).references(message_id);
    }

    builder
        .write_to_vec()
        .map_err(|e| Error::Internal(format!("Failed to build reply: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn original(sender: &str, message_id: Option<&str>) -> EmailRecord {
        EmailRecord {
            id: 7,
            sender: sender.to_string(),
            subject: "Project kickoff".to_string(),
            body: "Can we meet Monday?".to_string(),
            replied: false,
            provider_message_id: Some("m7".to_string()),
            thread_id: Some("t7".to_string()),
            message_id_header: message_id.map(str::to_string),
            created_at: Utc::now(),
            replied_at: None,
        }
    }

    #[test]
    fn test_split_mailbox() {
        assert_eq!(
            split_mailbox("Alice Example <alice@example.com>"),
            (Some("Alice Example"), "alice@example.com")
        );
        assert_eq!(
            split_mailbox("\"Example, Alice\" <alice@example.com>"),
            (Some("Example, Alice"), "alice@example.com")
        );
        assert_eq!(split_mailbox("<bob@example.com>"), (None, "bob@example.com"));
        assert_eq!(split_mailbox(" carol@example.com "), (None, "carol@example.com"));
    }

    #[test]
    fn test_reply_subject() {
        assert_eq!(reply_subject("Project kickoff"), "Re: Project kickoff");
        assert_eq!(reply_subject("RE: Project kickoff"), "RE: Project kickoff");
        assert_eq!(reply_subject("re: hi"), "re: hi");
        assert_eq!(reply_subject(""), "Re:");
    }

    #[test]
    fn test_reply_subject_multibyte() {
        assert_eq!(reply_subject("🎉 Party"), "Re: 🎉 Party");
        assert_eq!(reply_subject("ü€ Angebot"), "Re: ü€ Angebot");
        assert_eq!(reply_subject("Ré"), "Re: Ré");
        assert_eq!(reply_subject("RE: 🎉"), "RE: 🎉");
    }

    #[test]
    fn test_compose_reply_headers() {
        let raw = compose_reply(
            &original("Alice Example <alice@example.com>", Some("kickoff-1@example.com")),
            "Monday works.",
            Some("Support <support@example.org>"),
        )
        .unwrap();
        let text = String::from_utf8(raw).unwrap();

        assert!(text.contains("alice@example.com"));
        assert!(text.contains("support@example.org"));
        assert!(text.contains("Subject: Re: Project kickoff"));
        assert!(text.contains("In-Reply-To: <kickoff-1@example.com>"));
        assert!(text.contains("References: <kickoff-1@example.com>"));
        assert!(text.contains("Monday works."));
    }

    #[test]
    fn test_compose_reply_without_message_id() {
        let raw = compose_reply(&original("bob@example.com", None), "Thanks!", None).unwrap();
        let text = String::from_utf8(raw).unwrap();
        assert!(!text.contains("In-Reply-To"));
        assert!(text.contains("bob@example.com"));
    }

    #[test]
    fn test_compose_reply_requires_address() {
        let err = compose_reply(&original("", None), "Thanks!", None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
