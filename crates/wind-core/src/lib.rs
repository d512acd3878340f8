//! `wind-core` dispatches requests to wind functions.
//!
//! A request names a dotted function path (`f=users.list`). The dispatcher
//! resolves it through the [`ProgramCache`], runs the compiled program
//! against a per-request [`Context`](wind_lang::Context) and produces exactly
//! one [`Response`]. Programs may call each other by name, sharing (`call`)
//! or isolating (`icall`) the caller's variables, and a single request may
//! carry a batch of independent sub-requests (`rpkg`/`mreq`).
//!
//! ## Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use wind_core::{Dispatcher, ProgramCache, RequestParams};
//!
//! let cache = Arc::new(ProgramCache::new("resources/wind", "resources/windc"));
//! let params: RequestParams = [("f", "users.list")].into_iter().collect();
//!
//! let response = Dispatcher::new(cache).main(params).unwrap();
//! println!("{}", response.body);
//! ```
mod batch;
mod cache;
mod call_stack;
mod dispatcher;
mod error;
mod params;
mod path;
mod reply;
mod status;

pub use batch::{BatchEntry, MAX_BATCH_ENTRIES, parse_envelope};
pub use cache::{
    CacheError, DEFAULT_CACHE_ROOT, DEFAULT_SOURCE_ROOT, Fingerprint, ProgramCache,
    SOURCE_EXTENSION,
};
pub use call_stack::{CallFrame, CallStack, CallStackError};
pub use dispatcher::{DEFAULT_MAX_DEPTH, DispatchOptions, Dispatcher, Outcome};
pub use error::{DispatchError, Fault};
pub use params::RequestParams;
pub use path::{FunctionPath, RELATIVE_MARKER};
pub use reply::{JSON_CONTENT_TYPE, Reply, ReplyEngine, ReplyState, Response, TEXT_CONTENT_TYPE};
pub use status::Status;
