//! Buyer identity reference codec
//!
//! The ticketing provider masks `full_name` and `email` on issued tickets
//! unless they were collected through its own checkout. Tickets issued by
//! ticketdesk therefore carry the buyer identity in the free-form `reference`
//! field as `name|email`, which the provider returns unmasked.
//!
//! This is a workaround tied to the provider's masking behaviour. If the
//! provider ever exposes unmasked fields natively this codec can go.

use crate::error::ReferenceError;

/// Separator between the name and email parts
pub const REFERENCE_DELIMITER: char = '|';

/// Encode a buyer identity as a ticket reference.
///
/// Fails when either field contains the delimiter, since the result could not
/// be split back into the same two parts.
pub fn encode_reference(name: &str, email: &str) -> Result<String, ReferenceError> {
    if name.contains(REFERENCE_DELIMITER) {
        return Err(ReferenceError::DelimiterInField {
            field: "buyer_name",
            delimiter: REFERENCE_DELIMITER,
        });
    }
    if email.contains(REFERENCE_DELIMITER) {
        return Err(ReferenceError::DelimiterInField {
            field: "buyer_email",
            delimiter: REFERENCE_DELIMITER,
        });
    }
    Ok(format!("{name}{REFERENCE_DELIMITER}{email}"))
}

/// Decode a ticket reference into `(name, email)`.
///
/// Returns `None` unless the reference splits into exactly two parts.
/// Parts are returned as-is, so callers decide what an empty part means.
pub fn decode_reference(reference: &str) -> Option<(&str, &str)> {
    let mut parts = reference.split(REFERENCE_DELIMITER);
    let name = parts.next()?;
    let email = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((name, email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reference() {
        assert_eq!(
            decode_reference("Jane Doe|jane@x.com"),
            Some(("Jane Doe", "jane@x.com"))
        );
        assert_eq!(decode_reference("|jane@x.com"), Some(("", "jane@x.com")));
        assert_eq!(decode_reference("no separator"), None);
        assert_eq!(decode_reference("a|b|c"), None);
        assert_eq!(decode_reference(""), None);
    }

    #[test]
    fn test_encode_rejects_delimiter() {
        assert_eq!(
            encode_reference("Jane Doe", "jane@x.com").as_deref(),
            Ok("Jane Doe|jane@x.com")
        );
        assert!(encode_reference("Jane|Doe", "jane@x.com").is_err());
        assert!(encode_reference("Jane", "jane|@x.com").is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_encoded_reference_decodes_to_inputs(
            name in "[^|]{0,40}",
            email in "[^|]{0,40}",
        ) {
            let encoded = encode_reference(&name, &email).unwrap();
            proptest::prop_assert_eq!(
                decode_reference(&encoded),
                Some((name.as_str(), email.as_str()))
            );
        }
    }
}
