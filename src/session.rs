//! Trading-session calendar helpers for the NSE (IST).
//!
//! Both helpers take the current instant as an argument so callers and
//! tests stay deterministic; the CLI passes `Utc::now()`.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Asia::Kolkata;

/// The most recent trading day whose candles are fully published.
///
/// The provider publishes a day's confirmed candles by 16:00 IST; before
/// that cutoff "today" still means the previous calendar day.
pub fn completed_trading_day(now: DateTime<Utc>) -> NaiveDate {
    let ist = now.with_timezone(&Kolkata);
    if ist.hour() < 16 {
        (ist - chrono::Duration::days(1)).date_naive()
    } else {
        ist.date_naive()
    }
}

/// Whether the NSE cash session (closes 15:30 IST) is over for the day.
///
/// The final daily candle only exists on the intraday feed after this.
pub fn is_after_market_close(now: DateTime<Utc>) -> bool {
    let ist = now.with_timezone(&Kolkata);
    ist.hour() > 15 || (ist.hour() == 15 && ist.minute() >= 30)
}
