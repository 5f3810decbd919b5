//! Aggregated failure digest rendering and delivery.

use crate::{Notifier, NotifyError};

/// Render one aggregated failure message: the header followed by the
/// entries, 1-indexed and newline-joined, in input order.
pub fn render_digest(header: &str, entries: &[String]) -> String {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(header.to_string());
    for (index, entry) in entries.iter().enumerate() {
        lines.push(format!("{}. {}", index + 1, entry));
    }
    lines.join("\n")
}

/// Deliver one digest for a failure category. Each category is delivered at
/// most once per invocation; delivery failure propagates rather than being
/// swallowed, so notification outages stay visible.
pub async fn notify_failures(
    notifier: &dyn Notifier,
    header: &str,
    entries: &[String],
) -> Result<(), NotifyError> {
    notifier.post_message(&render_digest(header, entries)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn renders_numbered_entries_in_order() {
        let entries = vec![
            "export task ami-1 failed".to_string(),
            "export task ami-2 failed".to_string(),
            "export task ami-3 failed".to_string(),
        ];
        assert_eq!(
            render_digest("Image export failures:", &entries),
            "Image export failures:\n\
             1. export task ami-1 failed\n\
             2. export task ami-2 failed\n\
             3. export task ami-3 failed"
        );
    }

    #[test]
    fn renders_header_alone_for_no_entries() {
        assert_eq!(render_digest("nothing to report", &[]), "nothing to report");
    }

    proptest! {
        #[test]
        fn line_count_is_entries_plus_header(
            entries in proptest::collection::vec("[a-z0-9 -]{1,40}", 0..25)
        ) {
            let rendered = render_digest("failures:", &entries);
            prop_assert_eq!(rendered.lines().count(), entries.len() + 1);
        }

        #[test]
        fn entries_keep_input_order_and_one_based_index(
            entries in proptest::collection::vec("[a-z0-9 -]{1,40}", 1..25)
        ) {
            let rendered = render_digest("failures:", &entries);
            for (index, line) in rendered.lines().skip(1).enumerate() {
                let expected = format!("{}. {}", index + 1, entries[index]);
                prop_assert_eq!(line, expected.as_str());
            }
        }
    }
}
