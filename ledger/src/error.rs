// ledger/src/error.rs
//! Classified failures with a call-site trace.
//!
//! Every fallible ledger operation returns [`LedgerResult`]. A failure is an
//! ordered list of [`ErrorFrame`]s: the first frame carries the root
//! [`ErrorCause`] assigned where the failure was classified, later frames are
//! appended by [`ResultExt::chain`] as the failure travels up through the
//! layers. Re-describing a failure never changes its root cause.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Fixed failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCause {
    /// Referenced party, transaction or balance is absent.
    NotFound,
    /// Outflow (or amendment) would take a balance below zero.
    InsufficientBalance,
    /// Non-positive volume/price or unsupported transaction type.
    InvalidInput,
    /// Caller does not own the transaction it is trying to amend.
    Unauthorized,
    /// Uniqueness violation.
    Duplicate,
    /// Unclassified storage or infrastructure fault.
    InternalFault,
}

impl ErrorCause {
    /// Generic, caller-safe description of the cause.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotFound => "Entity not found",
            Self::InsufficientBalance => "Insufficient oil balance",
            Self::InvalidInput => "Bad request",
            Self::Unauthorized => "Not authorized",
            Self::Duplicate => "Entity already exists",
            Self::InternalFault => "Internal service error",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Duplicate => "DUPLICATE",
            Self::InternalFault => "INTERNAL_FAULT",
        }
    }
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// One entry of the trace.
#[derive(Debug, Clone)]
pub struct ErrorFrame {
    caller: &'static Location<'static>,
    message: String,
    cause: ErrorCause,
    expected: bool,
}

impl ErrorFrame {
    pub fn caller(&self) -> &'static Location<'static> {
        self.caller
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> ErrorCause {
        self.cause
    }

    /// Expected frames are safe to show to the caller verbatim.
    pub fn is_expected(&self) -> bool {
        self.expected
    }
}

/// A classified failure. Never empty: construction always records a root frame.
///
/// `Display` shows only the caller-safe message; use
/// [`render_trace`](Self::render_trace) for logs.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", public_message(.frames))]
pub struct LedgerError {
    frames: Vec<ErrorFrame>,
}

impl LedgerError {
    #[track_caller]
    pub fn new(message: impl Into<String>, cause: ErrorCause, expected: bool) -> Self {
        let mut frames = Vec::with_capacity(4);
        frames.push(ErrorFrame {
            caller: Location::caller(),
            message: message.into(),
            cause,
            expected,
        });
        Self { frames }
    }

    /// Expected domain failure.
    #[track_caller]
    pub fn expected(message: impl Into<String>, cause: ErrorCause) -> Self {
        Self::new(message, cause, true)
    }

    /// Unclassified fault. The message is kept for logs only.
    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCause::InternalFault, false)
    }

    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::expected(message, ErrorCause::NotFound)
    }

    #[track_caller]
    pub fn insufficient_balance(message: impl Into<String>) -> Self {
        Self::expected(message, ErrorCause::InsufficientBalance)
    }

    #[track_caller]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::expected(message, ErrorCause::InvalidInput)
    }

    /// Appends a frame at the caller's location, keeping the root cause.
    #[track_caller]
    pub fn chain(mut self, message: impl Into<String>, expected: bool) -> Self {
        let cause = self.root_cause();
        self.frames.push(ErrorFrame {
            caller: Location::caller(),
            message: message.into(),
            cause,
            expected,
        });
        self
    }

    pub fn root(&self) -> &ErrorFrame {
        &self.frames[0]
    }

    pub fn last(&self) -> &ErrorFrame {
        &self.frames[self.frames.len() - 1]
    }

    pub fn root_cause(&self) -> ErrorCause {
        self.root().cause
    }

    pub fn first_expected(&self) -> Option<&ErrorFrame> {
        self.frames.iter().find(|frame| frame.expected)
    }

    pub fn frames(&self) -> &[ErrorFrame] {
        &self.frames
    }

    pub fn is(&self, cause: ErrorCause) -> bool {
        self.root_cause() == cause
    }

    pub fn is_internal(&self) -> bool {
        self.is(ErrorCause::InternalFault)
    }

    /// The view of this failure that may cross the boundary.
    ///
    /// A failure rooted in `InternalFault` only ever exposes a frame that was
    /// explicitly flagged as expected, or the generic cause message.
    pub fn public(&self) -> PublicError {
        public_view(&self.frames)
    }

    /// Full trace, one `file:line` header per frame. For logs.
    pub fn render_trace(&self) -> String {
        render_frames(&self.frames)
    }
}

fn public_view(frames: &[ErrorFrame]) -> PublicError {
    let root = &frames[0];
    let cause = root.cause;
    match (cause, frames.iter().find(|frame| frame.expected)) {
        (_, Some(frame)) => PublicError {
            cause,
            message: frame.message.clone(),
            is_expected: true,
        },
        (ErrorCause::InternalFault, None) => PublicError {
            cause,
            message: cause.message().to_string(),
            is_expected: false,
        },
        (_, None) => PublicError {
            cause,
            message: root.message.clone(),
            is_expected: false,
        },
    }
}

fn public_message(frames: &[ErrorFrame]) -> String {
    public_view(frames).message
}

fn render_frames(frames: &[ErrorFrame]) -> String {
    let mut out = String::new();
    for frame in frames {
        out.push_str(&format!(
            "{}:{}: [{}] {}\n",
            frame.caller.file(),
            frame.caller.line(),
            frame.cause.as_str(),
            frame.message
        ));
    }
    out
}

/// Failure shape handed to the boundary layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicError {
    pub cause: ErrorCause,
    pub message: String,
    pub is_expected: bool,
}

/// Chaining on results, so `?`-style call sites can add context.
pub trait ResultExt<T> {
    #[track_caller]
    fn chain(self, message: impl Into<String>, expected: bool) -> LedgerResult<T>;
}

impl<T> ResultExt<T> for LedgerResult<T> {
    #[track_caller]
    fn chain(self, message: impl Into<String>, expected: bool) -> LedgerResult<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(err.chain(message, expected)),
        }
    }
}
