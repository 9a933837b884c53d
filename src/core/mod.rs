pub mod detail;
pub mod etl;
pub mod event_select;
pub mod extract;
pub mod paginate;
pub mod scrape;
pub mod selectors;
pub mod sink;
pub mod wait;
pub mod workflow;

pub use crate::domain::ports::{BrowserSession, Clock, JobTrigger, ObjectStore, TableSource};
pub use crate::utils::error::Result;
pub use paginate::{PaginationDriver, ScrapeReport, ScrapeState, StopReason};
pub use scrape::scrape_event;
pub use wait::TokioClock;
