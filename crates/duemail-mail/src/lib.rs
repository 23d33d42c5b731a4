//! # DueMail Mail
//!
//! SMTP dispatcher (async lettre). One [`SmtpMailer`] is built per
//! invocation; its transport pools the authenticated connection and is
//! reused for every branch message. Inline images are attached by
//! Content-ID inside a `multipart/related` body.

pub mod smtp;

pub use smtp::{SmtpMailer, build_message};
