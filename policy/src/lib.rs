//! On-chain half of the single-token minting policy.
//!
//! [`validator::validate`] is the authorization rule the ledger runs for every
//! transaction that mints or burns under the policy id. [`template`] binds the
//! compiled validator to a [`PolicyConfiguration`] and derives that id, and
//! [`engine`] is the host side that meters and runs a program against a
//! transaction view.

pub mod blueprint;
pub mod config;
pub mod engine;
pub mod error;
pub mod synthetic;
pub mod template;
pub mod types;
pub mod validator;

pub use blueprint::Blueprint;
pub use config::PolicyConfiguration;
pub use engine::{ExUnits, ScriptEngine, ScriptFailure};
pub use error::PolicyError;
pub use template::{instantiate, MintingPolicy, Program, ValidatorTemplate};
pub use types::{AssetDelta, AssetGroupId, AssetName, KeyHash, MintMap, MAX_ASSET_NAME_LEN};
pub use validator::{validate, EngineFault, RejectReason, TransactionView, ValidationError};
