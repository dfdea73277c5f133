//! Operation descriptors carried by PREPARE messages

use crate::common::wire::kind;
use crate::common::{AccountId, Amount, Error, Record, Result};

/// What a client write asks for. Each worker derives its own staged ops from
/// this, depending on which of the named accounts it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpDescriptor {
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
    Create {
        account: AccountId,
        initial: Amount,
    },
    Delete {
        account: AccountId,
    },
}

impl OpDescriptor {
    /// Accounts whose partitions take part in the transaction.
    pub fn accounts(&self) -> Vec<AccountId> {
        match self {
            OpDescriptor::Transfer { from, to, .. } => vec![*from, *to],
            OpDescriptor::Create { account, .. } | OpDescriptor::Delete { account } => {
                vec![*account]
            }
        }
    }

    pub fn prepare_kind(&self) -> &'static str {
        match self {
            OpDescriptor::Transfer { .. } => kind::PREPARE_TRANSFER,
            OpDescriptor::Create { .. } => kind::PREPARE_CREATE,
            OpDescriptor::Delete { .. } => kind::PREPARE_DELETE,
        }
    }

    /// Rejects amounts no worker could ever accept.
    pub fn validate(&self) -> Result<()> {
        match self {
            OpDescriptor::Transfer { amount, .. } if !amount.is_positive() => Err(
                Error::Validation(format!("transfer amount must be positive, got {}", amount)),
            ),
            OpDescriptor::Create { initial, .. } if initial.is_negative() => Err(
                Error::Validation(format!("initial balance must not be negative, got {}", initial)),
            ),
            _ => Ok(()),
        }
    }

    /// The PREPARE message sent to every participant.
    pub fn to_prepare(&self, tx_id: &str) -> Record {
        let rec = Record::request(self.prepare_kind()).with("tx_id", tx_id);
        match self {
            OpDescriptor::Transfer { from, to, amount } => {
                rec.with("from", from).with("to", to).with("amount", amount)
            }
            OpDescriptor::Create { account, initial } => {
                rec.with("account", account).with("initial", initial)
            }
            OpDescriptor::Delete { account } => rec.with("account", account),
        }
    }

    /// Operands of a PREPARE_* message (worker side).
    pub fn from_prepare(req: &Record) -> Result<Self> {
        let kind = req.kind().unwrap_or_default();
        Self::from_operands(&kind, req)
    }

    /// Operands of a client write (coordinator side).
    pub fn from_client(req: &Record) -> Result<Self> {
        let kind = match req.kind().as_deref() {
            Some(kind::TRANSFER) => kind::PREPARE_TRANSFER,
            Some(kind::CREATE_ACCOUNT) => kind::PREPARE_CREATE,
            Some(kind::DELETE_ACCOUNT) => kind::PREPARE_DELETE,
            other => return Err(Error::UnknownRequestType(other.unwrap_or("").to_string())),
        };
        Self::from_operands(kind, req)
    }

    fn from_operands(kind: &str, req: &Record) -> Result<Self> {
        let desc = match kind {
            kind::PREPARE_TRANSFER => OpDescriptor::Transfer {
                from: req.require_account("from")?,
                to: req.require_account("to")?,
                amount: req.require_amount("amount")?,
            },
            kind::PREPARE_CREATE => OpDescriptor::Create {
                account: req.require_account("account")?,
                initial: req.require_amount("initial")?,
            },
            kind::PREPARE_DELETE => OpDescriptor::Delete {
                account: req.require_account("account")?,
            },
            other => return Err(Error::UnknownRequestType(other.to_string())),
        };
        Ok(desc)
    }
}
