pub mod codec;
pub mod naming;
pub mod session;

pub use codec::{collect, from_backend_row, to_backend_row, FilterForm};
pub use naming::identify_filter_name;
pub use session::{AppliedFilter, ApplyGuard, FilterSession, LogListState};
