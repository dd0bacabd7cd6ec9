//! Request execution for the Making Tax Digital VAT API
//!
//! Sends calls with the bearer credentials held by `mtd_auth::CredentialStore`
//! and recovers from expired access tokens:
//!
//! 1. Caller builds a `CallContext` (directly or with the `vat` builders)
//! 2. `Executor::execute` sends it with the credential class's bearer token
//! 3. 2xx → `CallStatus::Success`
//! 4. 401 `INVALID_CREDENTIALS` → refresh once, rotate tokens, resend
//! 5. Resend succeeds → `CallStatus::SuccessWithRotatedCredentials` with the new pair
//! 6. Anything else → `CallStatus::Error` with a `CallError`

pub mod classify;
pub mod context;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod outcome;
pub mod types;
pub mod vat;

pub use classify::{INVALID_CREDENTIALS, ResponseClass, classify_response};
pub use context::CallContext;
pub use error::{Error, Result};
pub use executor::{Executor, Step, next_step};
pub use outcome::{CallError, CallOutcome, CallStatus, Receipt};
pub use types::{ObligationStatus, VatReturn};
pub use vat::VatClient;
