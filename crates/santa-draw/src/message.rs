use std::fmt::Write;

use santa_types::models::{DrawSummary, Participant, ResolvedPair};

const NOT_SPECIFIED: &str = "not specified";

/// Text sent to a giver once the draw is committed.
pub fn assignment_notice(receiver: &Participant, budget: &str) -> String {
    format!(
        "The Secret Santa draw has taken place!\n\
         Your recipient: {}.\n\
         Delivery details: {}.\n\
         Wishes: {}.\n\
         Gift budget: {}.",
        receiver.display_name(),
        receiver.delivery_info,
        receiver.gift_wishes.as_deref().unwrap_or(NOT_SPECIFIED),
        budget,
    )
}

/// Text for a participant asking who they give to.
pub fn recipient_card(receiver: &Participant, budget: &str) -> String {
    format!(
        "Your Secret Santa recipient:\n\
         Name: {}\n\
         Delivery details: {}\n\
         Wishes: {}\n\
         Gift budget: {}",
        receiver.display_name(),
        receiver.delivery_info,
        receiver.gift_wishes.as_deref().unwrap_or(NOT_SPECIFIED),
        budget,
    )
}

/// Administrator-facing summary of a draw or a re-send.
pub fn render_summary(summary: &DrawSummary) -> String {
    let mut out = format!(
        "Draw {}: {} pairs stored. Notifications: {} delivered, {} failed.",
        summary.draw_id, summary.pairs_created, summary.delivered, summary.failed
    );

    if summary.interrupted {
        let _ = write!(
            out,
            "\nDispatch was interrupted, {} recipients were not attempted. Re-send to reach them.",
            summary.unattempted()
        );
    }

    if !summary.failures.is_empty() {
        out.push_str("\nDelivery failures (assignment is stored, follow up manually):");
        for failure in &summary.failures {
            let _ = write!(out, "\nTG {}: {}", failure.recipient_id, failure.reason);
        }
    }

    out
}

/// One line per stored pair: giver -> receiver with external ids.
pub fn render_pairs(pairs: &[ResolvedPair]) -> String {
    if pairs.is_empty() {
        return "No pairs found. Run a draw first.".to_string();
    }

    pairs
        .iter()
        .map(|p| {
            format!(
                "Giver: {} (TG {}) -> Receiver: {} (TG {})",
                p.giver.display_name(),
                p.giver.telegram_id,
                p.receiver.display_name(),
                p.receiver.telegram_id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
