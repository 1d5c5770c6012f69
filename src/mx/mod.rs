//! DNS MX resolution.
//!
//! [`resolve_mail_exchangers`] never fails: a missing domain, an empty MX set
//! and a resolver failure all yield an empty exchange set, which the pipeline
//! reports as `invalid_domain`.

mod error;
mod resolver;
mod types;

pub use error::MxError as Error;
pub use resolver::{LookupHost, LookupMx, SystemResolver, resolve_mail_exchangers};
pub use types::MxRecord;
