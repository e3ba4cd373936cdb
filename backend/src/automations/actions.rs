// Action model helpers: capability allow-list, skip reasons, field rules

use chrono::NaiveDate;

/// Entity tables the update_record_status action may touch. The set is a
/// deliberate capability restriction; a table outside it is a fatal error,
/// not a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedTable {
    Tickets,
    Tasks,
    Projects,
    Invoices,
}

impl AllowedTable {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "tickets" => Some(Self::Tickets),
            "tasks" => Some(Self::Tasks),
            "projects" => Some(Self::Projects),
            "invoices" => Some(Self::Invoices),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tickets => "tickets",
            Self::Tasks => "tasks",
            Self::Projects => "projects",
            Self::Invoices => "invoices",
        }
    }
}

// Skip reasons recorded on skipped action steps
pub const SKIP_MISSING_TARGET_USER: &str = "missing_target_user_id";
pub const SKIP_MISSING_PAYLOAD: &str = "missing_payload";
pub const SKIP_MISSING_TITLE: &str = "missing_title";

// Fixed values applied by the dispatcher
pub const AUTOMATION_NOTIFICATION_TYPE: &str = "automation";
pub const AUTOMATION_NOTIFICATION_PRIORITY: &str = "medium";
pub const TASK_INITIAL_STATUS: &str = "todo";

/// Parse an optional due-date string. Absence and unparseable input both
/// yield None; a missing due date is not an error.
pub fn parse_due_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_is_closed() {
        assert_eq!(AllowedTable::parse("tickets"), Some(AllowedTable::Tickets));
        assert_eq!(AllowedTable::parse("tasks"), Some(AllowedTable::Tasks));
        assert_eq!(AllowedTable::parse("projects"), Some(AllowedTable::Projects));
        assert_eq!(AllowedTable::parse("invoices"), Some(AllowedTable::Invoices));

        assert_eq!(AllowedTable::parse("users"), None);
        assert_eq!(AllowedTable::parse("TICKETS"), None);
        assert_eq!(AllowedTable::parse(""), None);
    }

    #[test]
    fn due_date_parsing_is_lenient() {
        assert_eq!(
            parse_due_date(Some("2026-09-01")),
            NaiveDate::from_ymd_opt(2026, 9, 1)
        );
        assert_eq!(parse_due_date(Some(" 2026-09-01 ")), NaiveDate::from_ymd_opt(2026, 9, 1));
        assert_eq!(parse_due_date(Some("next tuesday")), None);
        assert_eq!(parse_due_date(None), None);
    }
}
