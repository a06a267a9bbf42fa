//! Routing-key extraction from provider source identifiers.
//!
//! Source identifiers look like
//! `arn:aws:dynamodb:eu-west-1:123456789012:table/UserProfiles/stream/2024-01-01T00:00:00.000`
//! or `arn:aws:sqs:eu-west-1:123456789012:orders.fifo`. Anything with fewer
//! segments than expected is rejected instead of guessed at.

use thiserror::Error;

const FIFO_SUFFIX: &str = ".fifo";

/// Malformed source identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArnError {
    #[error("source identifier `{arn}` has {found} `{separator}`-separated segments, expected at least {expected}")]
    TooFewSegments {
        arn: String,
        separator: char,
        expected: usize,
        found: usize,
    },

    #[error("source identifier `{arn}` yields an empty name")]
    EmptyName { arn: String },
}

/// Table name of a stream identifier: the third-from-last `/` segment.
pub fn table_name_from_stream_arn(arn: &str) -> Result<&str, ArnError> {
    let segments: Vec<&str> = arn.split('/').collect();
    if segments.len() < 3 {
        return Err(ArnError::TooFewSegments {
            arn: arn.to_string(),
            separator: '/',
            expected: 3,
            found: segments.len(),
        });
    }

    let name = segments[segments.len() - 3];
    if name.is_empty() {
        return Err(ArnError::EmptyName {
            arn: arn.to_string(),
        });
    }
    Ok(name)
}

/// Queue name of a queue identifier: the trailing `:` segment without `.fifo`.
pub fn queue_name_from_arn(arn: &str) -> Result<&str, ArnError> {
    let Some((_, tail)) = arn.rsplit_once(':') else {
        return Err(ArnError::TooFewSegments {
            arn: arn.to_string(),
            separator: ':',
            expected: 2,
            found: 1,
        });
    };

    let name = tail.strip_suffix(FIFO_SUFFIX).unwrap_or(tail);
    if name.is_empty() {
        return Err(ArnError::EmptyName {
            arn: arn.to_string(),
        });
    }
    Ok(name)
}

/// `UserProfiles` -> `user_profiles`.
///
/// A new token starts at every uppercase character; each token is lowercased.
/// A leading lowercase run forms its own token (`userProfiles` ->
/// `user_profiles`).
///
/// This deliberately differs from the capital-split rule, which only emits
/// tokens that start with an uppercase character and so drops a leading
/// lowercase run: under that rule `userProfiles` routes to `profiles`. Here
/// it routes to `user_profiles`, so handlers for such tables must be
/// registered under the full name.
pub fn snake_case(name: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();

    for ch in name.chars() {
        if ch.is_uppercase() && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens.join("_")
}

/// Routing key of a change-feed record: the snake-cased table name.
pub fn change_feed_routing_key(arn: &str) -> Result<String, ArnError> {
    let table = table_name_from_stream_arn(arn)?;
    Ok(snake_case(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const STREAM_ARN: &str =
        "arn:aws:dynamodb:eu-west-1:123456789012:table/UserProfiles/stream/2024-01-01T00:00:00.000";

    #[test]
    fn table_name_is_third_from_last() {
        assert_eq!(table_name_from_stream_arn(STREAM_ARN).unwrap(), "UserProfiles");
        assert_eq!(table_name_from_stream_arn("Orders/stream/x").unwrap(), "Orders");
    }

    #[test]
    fn stream_arn_with_too_few_segments() {
        for arn in ["", "table", "table/Orders", "arn:aws:dynamodb:eu-west-1:1:table/Orders"] {
            match table_name_from_stream_arn(arn) {
                Err(ArnError::TooFewSegments { expected: 3, .. }) => {}
                other => panic!("expected TooFewSegments for `{arn}`, got {other:?}"),
            }
        }
    }

    #[test]
    fn stream_arn_with_empty_table_segment() {
        assert!(matches!(
            table_name_from_stream_arn("table//stream/x"),
            Err(ArnError::EmptyName { .. })
        ));
    }

    #[test]
    fn queue_name_is_trailing_segment() {
        assert_eq!(
            queue_name_from_arn("arn:aws:sqs:eu-west-1:123456789012:myqueue").unwrap(),
            "myqueue"
        );
        assert_eq!(queue_name_from_arn("...:myqueue").unwrap(), "myqueue");
    }

    #[test]
    fn queue_name_strips_fifo_suffix() {
        assert_eq!(
            queue_name_from_arn("arn:aws:sqs:eu-west-1:1:orders.fifo").unwrap(),
            "orders"
        );
    }

    #[test]
    fn queue_arn_malformed() {
        assert!(matches!(
            queue_name_from_arn("myqueue"),
            Err(ArnError::TooFewSegments { separator: ':', .. })
        ));
        assert!(matches!(queue_name_from_arn("arn:aws:sqs:"), Err(ArnError::EmptyName { .. })));
        assert!(matches!(queue_name_from_arn("arn:aws:sqs:.fifo"), Err(ArnError::EmptyName { .. })));
    }

    #[test]
    fn leading_lowercase_run_is_kept() {
        assert_eq!(snake_case("userProfiles"), "user_profiles");
        assert_eq!(snake_case("users"), "users");
        assert_ne!(snake_case("userProfiles"), "profiles");
    }

    #[test]
    fn snake_case_splits_on_capitals() {
        assert_eq!(snake_case("UserProfiles"), "user_profiles");
        assert_eq!(snake_case("Orders"), "orders");
        assert_eq!(snake_case("APIKeys"), "a_p_i_keys");
        assert_eq!(snake_case(""), "");
    }

    #[test]
    fn routing_key_from_stream_arn() {
        assert_eq!(change_feed_routing_key(STREAM_ARN).unwrap(), "user_profiles");
    }

    proptest! {
        #[test]
        fn snake_case_is_lowercase_and_keeps_letters(name in "[A-Za-z]{1,24}") {
            let key = snake_case(&name);
            prop_assert!(!key.chars().any(char::is_uppercase));
            let letters: String = key.chars().filter(|c| *c != '_').collect();
            prop_assert_eq!(letters, name.to_lowercase());
        }

        #[test]
        fn queue_arn_never_panics(arn in ".{0,64}") {
            let _ = queue_name_from_arn(&arn);
            let _ = table_name_from_stream_arn(&arn);
        }

        #[test]
        fn queue_name_round_trips(name in "[a-z][a-z0-9_-]{0,30}") {
            let arn = format!("arn:aws:sqs:eu-west-1:123456789012:{name}.fifo");
            prop_assert_eq!(queue_name_from_arn(&arn).unwrap(), name.as_str());
        }
    }
}
