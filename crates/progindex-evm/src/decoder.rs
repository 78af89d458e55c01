//! `ProgramActivated` decoder.
//!
//! ArbWasm emits
//! `ProgramActivated(bytes32 indexed codehash, bytes32 moduleHash, address program, uint256 dataFee, uint16 version)`.
//! `topics[1]` carries the code hash; `data` is the ABI-encoded tuple of the
//! four non-indexed fields. Any shape mismatch is an error: a record is never
//! produced from a partially understood payload.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256, U256};

use progindex_core::error::IndexerError;
use progindex_core::types::{BlockNumber, ChainId, DeploymentRecord};

use crate::fetcher::RawLog;

/// `keccak256("ProgramActivated(bytes32,bytes32,address,uint256,uint16)")`.
pub const PROGRAM_ACTIVATED_TOPIC: &str =
    "0xc0e812780707128d9a180db8ee4d1c1f1300b6dd0626d577b5d9ac759b76253c";

/// The ArbWasm precompile that emits the event.
pub const ARBWASM_ADDRESS: &str = "0x0000000000000000000000000000000000000071";

/// Four static fields, one 32-byte word each.
const PAYLOAD_LEN: usize = 4 * 32;

/// The non-indexed fields of one `ProgramActivated` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramActivated {
    pub module_hash: B256,
    pub program: Address,
    pub data_fee: U256,
    pub version: u16,
}

fn payload_type() -> DynSolType {
    DynSolType::Tuple(vec![
        DynSolType::FixedBytes(32),
        DynSolType::Address,
        DynSolType::Uint(256),
        DynSolType::Uint(16),
    ])
}

/// Decode the `data` payload of a `ProgramActivated` log.
pub fn decode_payload(data: &[u8]) -> Result<ProgramActivated, IndexerError> {
    if data.len() != PAYLOAD_LEN {
        return Err(IndexerError::Decode(format!(
            "payload is {} bytes, expected {PAYLOAD_LEN}",
            data.len()
        )));
    }

    // The address word is left-padded; dirty high bytes mean a different type.
    if data[32..44].iter().any(|b| *b != 0) {
        return Err(IndexerError::Decode("program: address word has non-zero padding".into()));
    }

    let decoded = payload_type()
        .abi_decode(data)
        .map_err(|e| IndexerError::Decode(format!("abi decode: {e}")))?;
    let values = match decoded {
        DynSolValue::Tuple(vals) => vals,
        other => {
            return Err(IndexerError::Decode(format!("expected tuple, got {other:?}")));
        }
    };

    let [module_hash, program, data_fee, version]: [DynSolValue; 4] = values
        .try_into()
        .map_err(|v: Vec<DynSolValue>| {
            IndexerError::Decode(format!("expected 4 arguments, got {}", v.len()))
        })?;

    let module_hash = match module_hash {
        DynSolValue::FixedBytes(word, 32) => word,
        other => return Err(IndexerError::Decode(format!("moduleHash: {other:?}"))),
    };
    let program = match program {
        DynSolValue::Address(addr) => addr,
        other => return Err(IndexerError::Decode(format!("program: {other:?}"))),
    };
    let data_fee = match data_fee {
        DynSolValue::Uint(fee, 256) => fee,
        other => return Err(IndexerError::Decode(format!("dataFee: {other:?}"))),
    };
    let version = match version {
        DynSolValue::Uint(v, 16) => u16::try_from(v)
            .map_err(|_| IndexerError::Decode(format!("version out of range: {v}")))?,
        other => return Err(IndexerError::Decode(format!("version: {other:?}"))),
    };

    Ok(ProgramActivated {
        module_hash,
        program,
        data_fee,
        version,
    })
}

/// Decode one raw log into a deployment record.
pub fn decode_log(chain_id: ChainId, log: &RawLog) -> Result<DeploymentRecord, IndexerError> {
    let code_hash = log.topics.get(1).ok_or_else(|| {
        IndexerError::Decode(format!("tx {}: missing codehash topic", log.transaction_hash))
    })?;
    let data = decode_hex(&log.data)?;
    let event = decode_payload(&data)
        .map_err(|e| IndexerError::Decode(format!("tx {}: {e}", log.transaction_hash)))?;

    Ok(DeploymentRecord {
        chain_id,
        block_number: parse_quantity(&log.block_number)?,
        block_hash: log.block_hash.clone(),
        transaction_hash: log.transaction_hash.clone(),
        contract_address: format!("0x{}", hex::encode(event.program.as_slice())),
        code_hash: code_hash.clone(),
        module_hash: format!("0x{}", hex::encode(event.module_hash.as_slice())),
        data_fee: event.data_fee.to_string(),
        version: event.version,
    })
}

/// Parse a `0x`-prefixed JSON-RPC quantity.
pub fn parse_quantity(s: &str) -> Result<BlockNumber, IndexerError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| IndexerError::Decode(format!("quantity without 0x prefix: {s:?}")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| IndexerError::Decode(format!("bad quantity {s:?}: {e}")))
}

/// Format a block number as a JSON-RPC quantity.
pub fn to_quantity(n: BlockNumber) -> String {
    format!("0x{n:x}")
}

fn decode_hex(s: &str) -> Result<Vec<u8>, IndexerError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| IndexerError::Decode(format!("invalid hex payload: {e}")))
}
