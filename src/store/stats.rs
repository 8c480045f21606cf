//! Mailbox statistics computed from the local store.

use std::fmt;

/// Days listed in [`MailboxStats::by_day`].
pub const STATS_DAYS: usize = 7;

/// Senders listed in [`MailboxStats::top_senders`].
pub const STATS_TOP_SENDERS: usize = 10;

/// Number of applied actions for one (rule, action type) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleActionCount {
    pub rule_id: String,
    pub action_type: String,
    pub count: usize,
}

/// Summary of the stored mailbox and the applied-action log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStats {
    pub total: usize,
    pub unread: usize,
    /// `(YYYY-MM-DD, count)` for the most recent days with mail, newest first.
    pub by_day: Vec<(String, usize)>,
    /// Display name (text before `<`, or the whole address) and count, busiest first.
    pub top_senders: Vec<(String, usize)>,
    /// Every stored label with the number of messages carrying it, most used first.
    pub labels: Vec<(String, usize)>,
    pub rule_actions: Vec<RuleActionCount>,
}

fn write_counts(f: &mut fmt::Formatter<'_>, title: &str, rows: &[(String, usize)]) -> fmt::Result {
    writeln!(f, "{title}:")?;
    if rows.is_empty() {
        return writeln!(f, "  (none)");
    }
    for (key, count) in rows {
        writeln!(f, "  {key}: {count}")?;
    }
    Ok(())
}

impl fmt::Display for MailboxStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total messages: {}", self.total)?;
        writeln!(f, "Unread: {}", self.unread)?;
        write_counts(f, "Messages by day", &self.by_day)?;
        write_counts(f, "Top senders", &self.top_senders)?;
        write_counts(f, "Labels", &self.labels)?;
        writeln!(f, "Rule actions:")?;
        if self.rule_actions.is_empty() {
            return write!(f, "  (none)");
        }
        for (i, entry) in self.rule_actions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {} {}: {}", entry.rule_id, entry.action_type, entry.count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_render_placeholders() {
        let text = MailboxStats::default().to_string();
        assert!(text.starts_with("Total messages: 0\nUnread: 0\n"));
        assert_eq!(text.matches("(none)").count(), 4);
    }

    #[test]
    fn display_lists_each_section() {
        let stats = MailboxStats {
            total: 3,
            unread: 1,
            by_day: vec![("2026-02-15".into(), 2), ("2026-02-14".into(), 1)],
            top_senders: vec![("Shop".into(), 2)],
            labels: vec![("INBOX".into(), 3)],
            rule_actions: vec![RuleActionCount {
                rule_id: "rule1".into(),
                action_type: "mark_as_read".into(),
                count: 2,
            }],
        };
        let text = stats.to_string();
        assert!(text.contains("Messages by day:\n  2026-02-15: 2\n  2026-02-14: 1\n"));
        assert!(text.contains("Top senders:\n  Shop: 2\n"));
        assert!(text.contains("Labels:\n  INBOX: 3\n"));
        assert!(text.ends_with("Rule actions:\n  rule1 mark_as_read: 2"));
    }
}
