//! Envelope to record mappings.
//!
//! Records are plain serde structs. Keys and addresses are base58, digests
//! and opaque byte blobs are hex, answers are decimal strings.

use crate::error::{ExportError, ExportResult};
use chrono::{DateTime, Utc};
use feedmon_core::{
    ChainConfig, ConfigState, FeedConfig, StateEnvelope, TransmissionEnvelope, MAX_ORACLES,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRecord {
    pub network_name: String,
    pub network_id: String,
    pub chain_id: String,
}

impl From<&ChainConfig> for ChainRecord {
    fn from(chain: &ChainConfig) -> Self {
        Self {
            network_name: chain.network_name.clone(),
            network_id: chain.network_id.clone(),
            chain_id: chain.chain_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfigRecord {
    pub config_digest: String,
    pub config_count: u32,
    /// Hex encoded signer addresses.
    pub signers: Vec<String>,
    pub transmitters: Vec<String>,
    pub f: u8,
    pub onchain_config: String,
    pub offchain_config_version: u64,
    pub offchain_config: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRecord {
    pub signer: String,
    pub transmitter: String,
    pub payee: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub observation_payment_gjuels: u32,
    pub transmission_payment_gjuels: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub version: u8,
    pub owner: String,
    pub latest_config_block_number: u64,
    pub billing: BillingRecord,
    pub requester_access_controller: String,
    pub billing_access_controller: String,
    pub transmissions: String,
    pub oracles: Vec<OracleRecord>,
}

/// Full configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSetRecord {
    pub block_number: u64,
    pub observed_at: DateTime<Utc>,
    pub contract_config: ContractConfigRecord,
    pub solana_program_id: String,
    pub solana_chain_config: ChainRecord,
    pub state: StateRecord,
    pub feed_config: FeedConfig,
}

/// Flattened configuration snapshot for consumers that do not handle
/// nested records. List and struct fields are JSON strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSetSimplifiedRecord {
    pub config_digest: String,
    pub block_number: u64,
    pub observed_at: DateTime<Utc>,
    pub signers: String,
    pub transmitters: String,
    pub billing: String,
    pub f: u8,
    pub oracle_count: u8,
    pub offchain_config_version: u64,
    pub feed_state_account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Raw answer, decimal.
    pub data: String,
    pub timestamp: u32,
    pub config_digest: String,
    pub epoch: u32,
    pub round: u32,
}

/// Latest answer snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionRecord {
    pub block_number: u64,
    pub observed_at: DateTime<Utc>,
    pub answer: AnswerRecord,
    pub solana_chain_config: ChainRecord,
    pub feed_config: FeedConfig,
}

/// Reject configurations that cannot come from a well-formed state account.
fn validate_config(state: &ConfigState) -> ExportResult<()> {
    let n = state.oracles.len();
    if n == 0 {
        return Err(ExportError::Mapping("config has no oracles".to_string()));
    }
    if n > MAX_ORACLES {
        return Err(ExportError::Mapping(format!(
            "config has {n} oracles, at most {MAX_ORACLES} allowed"
        )));
    }
    if state.f == 0 || 3 * usize::from(state.f) >= n {
        return Err(ExportError::Mapping(format!(
            "fault tolerance f={} invalid for {n} oracles",
            state.f
        )));
    }
    if state.offchain_config.payload().is_none() {
        return Err(ExportError::Mapping(format!(
            "offchain config declares {} bytes, only {} available",
            state.offchain_config.declared_len,
            state.offchain_config.data.len()
        )));
    }
    Ok(())
}

fn signers(state: &ConfigState) -> Vec<String> {
    state.oracles.iter().map(|o| hex::encode(o.signer)).collect()
}

fn transmitters(state: &ConfigState) -> Vec<String> {
    state
        .oracles
        .iter()
        .map(|o| o.transmitter.to_base58())
        .collect()
}

fn billing(state: &ConfigState) -> BillingRecord {
    BillingRecord {
        observation_payment_gjuels: state.billing.observation_payment_gjuels,
        transmission_payment_gjuels: state.billing.transmission_payment_gjuels,
    }
}

fn to_json_string<T: Serialize>(value: &T) -> ExportResult<String> {
    serde_json::to_string(value).map_err(|e| ExportError::Mapping(e.to_string()))
}

pub fn make_config_set_mapping(
    envelope: &StateEnvelope,
    chain: &ChainConfig,
    feed: &FeedConfig,
) -> ExportResult<ConfigSetRecord> {
    let state = &envelope.state;
    validate_config(state)?;
    let offchain = state.offchain_config.payload().unwrap_or_default();

    Ok(ConfigSetRecord {
        block_number: state.block_height,
        observed_at: envelope.observed_at,
        contract_config: ContractConfigRecord {
            config_digest: state.config_digest.hex(),
            config_count: state.config_count,
            signers: signers(state),
            transmitters: transmitters(state),
            f: state.f,
            onchain_config: hex::encode(&state.onchain_config),
            offchain_config_version: state.offchain_config.version,
            offchain_config: hex::encode(offchain),
        },
        solana_program_id: feed.contract_address.to_base58(),
        solana_chain_config: chain.into(),
        state: StateRecord {
            version: state.version,
            owner: state.owner.to_base58(),
            latest_config_block_number: state.latest_config_block_number,
            billing: billing(state),
            requester_access_controller: state.requester_access_controller.to_base58(),
            billing_access_controller: state.billing_access_controller.to_base58(),
            transmissions: state.transmissions.to_base58(),
            oracles: state
                .oracles
                .iter()
                .map(|o| OracleRecord {
                    signer: hex::encode(o.signer),
                    transmitter: o.transmitter.to_base58(),
                    payee: o.payee.to_base58(),
                })
                .collect(),
        },
        feed_config: feed.clone(),
    })
}

pub fn make_config_set_simplified_mapping(
    envelope: &StateEnvelope,
    feed: &FeedConfig,
) -> ExportResult<ConfigSetSimplifiedRecord> {
    let state = &envelope.state;
    validate_config(state)?;

    Ok(ConfigSetSimplifiedRecord {
        config_digest: state.config_digest.hex(),
        block_number: state.block_height,
        observed_at: envelope.observed_at,
        signers: to_json_string(&signers(state))?,
        transmitters: to_json_string(&transmitters(state))?,
        billing: to_json_string(&billing(state))?,
        f: state.f,
        oracle_count: state.oracles.len() as u8,
        offchain_config_version: state.offchain_config.version,
        feed_state_account: feed.state_account.to_base58(),
    })
}

pub fn make_transmission_mapping(
    envelope: &TransmissionEnvelope,
    chain: &ChainConfig,
    feed: &FeedConfig,
) -> ExportResult<TransmissionRecord> {
    let tx = &envelope.transmission;
    Ok(TransmissionRecord {
        block_number: tx.block_height,
        observed_at: envelope.observed_at,
        answer: AnswerRecord {
            data: tx.answer.to_string(),
            timestamp: tx.timestamp,
            config_digest: tx.config_digest.hex(),
            epoch: tx.epoch,
            round: tx.round_id,
        },
        solana_chain_config: chain.into(),
        feed_config: feed.clone(),
    })
}
