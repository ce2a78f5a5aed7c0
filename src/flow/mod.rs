//! Login attempt flow: ledger, controller, code entry and the verification client.

pub mod code;
pub mod config;
pub mod controller;
pub mod error;
pub mod ledger;
pub mod types;
pub mod verifier;

pub use self::config::{ConfigError, FlowConfig, LedgerConfig, VerifierConfig};
pub use self::controller::{
    AuthFlowController, FlowContext, FlowMessage, FlowOutcome, FlowSnapshot, MessageKind,
    PrimaryInput, Stage,
};
pub use self::error::{ErrorKind, FlowError, VerifyError};
pub use self::ledger::{AttemptLedger, AttemptStage, LedgerDecision};
pub use self::verifier::{HttpVerifier, Verifier};
