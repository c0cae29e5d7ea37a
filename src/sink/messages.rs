use chrono::NaiveDateTime;

pub const SPOT_FETCH_FAILED: &str = "Binance price fetch failed.";
pub const FX_FETCH_FAILED: &str = "XE rate fetch failed.";
pub const BACKOFFICE_UNREACHABLE: &str = "VPN REQUIRED TO ACCESS BO.";
pub const COMPARISON_FAILED: &str = "Coin automation Failed.";
pub const COMPARISON_COMPLETED: &str = "Coin automation completed successfully.";
pub const OVERRIDE_FAILED: &str = "Bonasa automation Failed.";
pub const OVERRIDE_COMPLETED: &str = "Bonasa automation completed successfully.";
pub const SCHEDULER_ERROR: &str = "Scheduler runtime error.";

fn stamp(now: NaiveDateTime) -> String {
    now.format("%B %d, %Y %I:%M %p").to_string()
}

pub fn automation_success(now: NaiveDateTime, detail: &str) -> String {
    format!("<b>(SERVER)Automation Success</b>\nDate: {}\n{detail}", stamp(now))
}

pub fn automation_failed(now: NaiveDateTime, reason: &str) -> String {
    format!("<b>(SERVER)Automation Failed</b>\nDate: {}\n{reason}", stamp(now))
}

pub fn override_missing(sheet_date: &str, now: NaiveDateTime) -> String {
    format!(
        "<b>(SERVER)BONASA NOT UPDATED</b>\nDate: {sheet_date} {}\nPurchase Rate not yet updated.",
        now.format("%H:%M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(11, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_success_message() {
        assert_eq!(
            automation_success(now(), "Coin automation completed successfully."),
            "<b>(SERVER)Automation Success</b>\nDate: March 04, 2025 11:30 AM\nCoin automation completed successfully."
        );
    }

    #[test]
    fn test_failure_and_alert_messages() {
        assert!(automation_failed(now(), "XE rate fetch failed.").ends_with("\nXE rate fetch failed."));
        assert_eq!(
            override_missing("4/3/2025", now()),
            "<b>(SERVER)BONASA NOT UPDATED</b>\nDate: 4/3/2025 11:30\nPurchase Rate not yet updated."
        );
    }
}
