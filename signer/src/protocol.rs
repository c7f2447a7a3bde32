//! The device–host dialogue: typed requests, replies, and the transport and
//! confirmation seams the signer suspends on.
//!
//! The dialogue is strictly turn-taking. The device sends a `TxRequest`
//! naming the piece it needs next and carrying the serialized fragment
//! produced since the last exchange; the host answers with the matching
//! `TxAck` payload. A session begins when the host submits a `SignTx` and
//! ends when the device requests `TxFinished`.

use async_trait::async_trait;

use sigstream_btc::types::{ScriptPubkey, ScriptSig};
use sigstream_core::hashes::Hash256Digest;

use crate::{coins::CoinInfo, error::SigningError, multisig::MultisigDescriptor};

/// Script types a host may supply for an input being spent.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum InputScriptType {
    /// Pay-to-pubkey-hash, or pay-to-script-hash multisig via `SpendMultisig`.
    #[default]
    SpendAddress,
    /// Pay-to-script-hash multisig.
    SpendMultisig,
    /// Native segwit (p2wpkh or p2wsh).
    SpendWitness,
    /// Segwit nested in p2sh.
    SpendP2shWitness,
}

impl InputScriptType {
    /// True for the segwit class of input script types.
    pub fn is_segwit(&self) -> bool {
        matches!(self, Self::SpendWitness | Self::SpendP2shWitness)
    }

    /// True for the legacy class of input script types.
    pub fn is_nonsegwit(&self) -> bool {
        matches!(self, Self::SpendAddress | Self::SpendMultisig)
    }
}

/// Script types a host may supply for an output being created.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputScriptType {
    /// Pay to a Base58Check, Bech32, or CashAddr address.
    PayToAddress,
    /// Pay to a script hash address.
    PayToScriptHash,
    /// Pay to an m-of-n multisig script.
    PayToMultisig,
    /// Pay to a native witness program.
    PayToWitness,
    /// Pay to segwit nested in p2sh.
    PayToP2shWitness,
    /// An OP_RETURN data carrier output.
    PayToOpReturn,
}

impl OutputScriptType {
    /// Maps a change output's script type to the input script type its
    /// address derives with. `None` for types that can never be change.
    pub fn change_input_type(&self) -> Option<InputScriptType> {
        match self {
            Self::PayToAddress => Some(InputScriptType::SpendAddress),
            Self::PayToMultisig => Some(InputScriptType::SpendMultisig),
            Self::PayToWitness => Some(InputScriptType::SpendWitness),
            Self::PayToP2shWitness => Some(InputScriptType::SpendP2shWitness),
            _ => None,
        }
    }
}

/// The transaction header submitted by the host to open a session.
/// Immutable after sanitization.
#[derive(Clone, Debug)]
pub struct SignTx {
    /// Transaction version.
    pub version: u32,
    /// Number of inputs the host will stream.
    pub inputs_count: u32,
    /// Number of outputs the host will stream.
    pub outputs_count: u32,
    /// The nLockTime field.
    pub lock_time: u32,
    /// Header timestamp, for coins that carry one.
    pub timestamp: Option<u32>,
}

impl SignTx {
    /// Validates the header against the coin's capabilities.
    pub fn sanitize(self, coin: &CoinInfo) -> Result<Self, SigningError> {
        if coin.timestamp && self.timestamp.is_none() {
            return Err(SigningError::DataError("Timestamp must be set."));
        }
        if !coin.timestamp && self.timestamp.is_some() {
            return Err(SigningError::DataError("Timestamp not enabled on this coin."));
        }
        if self.inputs_count == 0 || self.outputs_count == 0 {
            return Err(SigningError::DataError(
                "Transaction must have inputs and outputs",
            ));
        }
        Ok(self)
    }
}

/// One transaction input, as streamed by the host. When streaming a
/// previous transaction's inputs, only the outpoint, script_sig, and
/// sequence are meaningful.
#[derive(Clone, Debug, Default)]
pub struct TxInput {
    /// The id of the transaction being spent, in display (reversed) order.
    pub prev_hash: Hash256Digest,
    /// The index of the output being spent.
    pub prev_index: u32,
    /// The sequence number.
    pub sequence: u32,
    /// The amount being spent. Optional for legacy inputs, whose amount is
    /// authenticated from the previous transaction; mandatory for segwit
    /// and BIP-143 inputs.
    pub amount: Option<u64>,
    /// How the input is spent.
    pub script_type: InputScriptType,
    /// The BIP-32 path of the signing key.
    pub address_n: Vec<u32>,
    /// The multisig descriptor for multisig spends.
    pub multisig: Option<MultisigDescriptor>,
    /// The signature script, used only when streaming previous-transaction
    /// inputs for id reconstruction.
    pub script_sig: ScriptSig,
}

/// One transaction output, as streamed by the host.
#[derive(Clone, Debug)]
pub struct TxOutput {
    /// The amount in atomic units.
    pub amount: u64,
    /// How the output is locked.
    pub script_type: OutputScriptType,
    /// The destination address. Absent for change outputs and OP_RETURN.
    pub address: Option<String>,
    /// The BIP-32 path of a change destination. Empty unless this is a
    /// change output.
    pub address_n: Vec<u32>,
    /// The multisig descriptor for multisig destinations.
    pub multisig: Option<MultisigDescriptor>,
    /// OP_RETURN payload for data carrier outputs.
    pub op_return_data: Vec<u8>,
}

/// Metadata of a previous transaction, streamed before its body to size the
/// reconstruction loop.
#[derive(Clone, Debug)]
pub struct PrevTxMeta {
    /// Previous transaction version.
    pub version: u32,
    /// Number of inputs in the previous transaction.
    pub inputs_count: u32,
    /// Number of outputs in the previous transaction.
    pub outputs_count: u32,
    /// The nLockTime field.
    pub lock_time: u32,
    /// Header timestamp, for coins that carry one.
    pub timestamp: Option<u32>,
    /// Length of the trailing opaque data, for coins that have it.
    pub extra_data_len: u32,
}

/// A binary output of a previous transaction.
#[derive(Clone, Debug)]
pub struct PrevTxOutput {
    /// The amount in atomic units.
    pub amount: u64,
    /// The literal script pubkey.
    pub script_pubkey: ScriptPubkey,
}

/// The kind of data the device is asking the host for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RequestType {
    /// An input of the current transaction, or of the previous transaction
    /// named in the details.
    TxInput,
    /// An output of the current transaction, or of the previous transaction
    /// named in the details.
    TxOutput,
    /// The metadata of a previous transaction.
    TxMeta,
    /// A chunk of a previous transaction's trailing data.
    TxExtraData,
    /// Nothing further; the session is complete.
    TxFinished,
}

/// Addressing details for a request.
#[derive(Clone, Debug, Default)]
pub struct TxRequestDetails {
    /// The index of the requested input or output.
    pub request_index: u32,
    /// When set, the request targets the previous transaction with this id
    /// (display order) instead of the transaction being signed.
    pub tx_hash: Option<Hash256Digest>,
    /// Offset into the previous transaction's trailing data.
    pub extra_data_offset: u32,
    /// Length of the requested trailing data chunk.
    pub extra_data_len: u32,
}

/// The serialized payload piggybacked on each request: everything the
/// device has produced since the last exchange.
#[derive(Clone, Debug, Default)]
pub struct TxRequestSerialized {
    /// The next chunk of the signed transaction.
    pub serialized_tx: Vec<u8>,
    /// The input index a freshly produced signature belongs to.
    pub signature_index: Option<u32>,
    /// The freshly produced DER signature, if any.
    pub signature: Vec<u8>,
}

/// A device-to-host request.
#[derive(Clone, Debug)]
pub struct TxRequest {
    /// What the device needs next.
    pub request_type: RequestType,
    /// Which piece, exactly.
    pub details: TxRequestDetails,
    /// Serialized results produced since the last exchange.
    pub serialized: TxRequestSerialized,
}

/// A host reply carrying the requested piece.
#[derive(Clone, Debug)]
pub enum TxAck {
    /// An input of the transaction being signed (or of a previous one).
    Input(TxInput),
    /// An output of the transaction being signed.
    Output(TxOutput),
    /// A binary output of a previous transaction.
    PrevOutput(PrevTxOutput),
    /// Previous-transaction metadata.
    Meta(PrevTxMeta),
    /// A chunk of previous-transaction trailing data.
    ExtraData(Vec<u8>),
    /// Acknowledgement of `TxFinished`.
    Finished,
}

/// The host transport. The signer suspends on every exchange; the device
/// runtime services the UI and the wire in between.
#[async_trait(?Send)]
pub trait Host {
    /// Sends a request to the host and awaits its reply.
    async fn exchange(&mut self, request: TxRequest) -> Result<TxAck, SigningError>;
}

/// The user-confirmation surface. Each method returns whether the user
/// approved; a decline aborts the session.
#[async_trait(?Send)]
pub trait Confirmations {
    /// Asks the user to confirm an output's destination and amount.
    async fn confirm_output(&mut self, output: &TxOutput, coin: &CoinInfo) -> bool;

    /// Asks the user to confirm the total being spent and the fee. The fee
    /// is negative for reward transactions on coins that permit them.
    async fn confirm_total(&mut self, spending: u64, fee: i64, coin: &CoinInfo) -> bool;

    /// Asks the user to allow a fee above the coin's threshold.
    async fn confirm_fee_over_threshold(&mut self, fee: u64, coin: &CoinInfo) -> bool;

    /// Asks the user to confirm a non-default lock time.
    async fn confirm_nondefault_locktime(&mut self, lock_time: u32) -> bool;

    /// Warns that an input path does not look like a wallet path for this
    /// coin.
    async fn confirm_foreign_address(&mut self, address_n: &[u32]) -> bool;
}
