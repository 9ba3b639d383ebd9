//! Network trace capture and correlation.
//!
//! This module turns the raw protocol events of one page load into finalized
//! request records:
//! - `event`: the append-only protocol event log
//! - `capture`: builds request records from the live event stream
//! - `correlate`: attaches timing breakdowns and cookies after the load
//! - `timing` and `cookie`: the value types produced by correlation

mod capture;
mod cookie;
mod correlate;
mod event;
mod request;
mod timing;

pub use capture::RequestCapture;
pub use cookie::CookieRecord;
pub use correlate::correlate;
pub use event::{EventLog, ProtocolEvent};
pub use request::{hostname_of, url_hash, CapturedRequest, RemoteAddress};
pub use timing::{RawTiming, TimingBreakdown, NOT_MEASURED};
