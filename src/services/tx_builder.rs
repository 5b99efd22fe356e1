//! Transaction builder
//!
//! Maps an operation for an account onto an unsigned EIP-1559 contract call.
//! Calldata must match the deployed token, NFT and game contracts byte for
//! byte, so every call is encoded from its Solidity signature.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::config::{ContractAddresses, GasLimits};
use crate::types::{BetSide, FeeParameters, Operation, TransactionType, UnsignedCall};

sol! {
    function approve(address spender, uint256 value) external returns (bool);

    function mint(bytes32 key_) external;

    function claim(uint256[] epochs_) external;

    function betHigh(uint256 epoch_, uint256 amount_) external;

    function betLow(uint256 epoch_, uint256 amount_) external;

    function currentEpoch() external view returns (uint256);
}

/// Derives the key argument of `mint` from the minting account
pub trait MintKeyHasher: Send + Sync {
    fn mint_key(&self, account: Address) -> B256;
}

/// `keccak256(abi.encode(account))`, what the NFT contract recomputes
#[derive(Debug, Clone, Copy, Default)]
pub struct AbiKeccakHasher;

impl MintKeyHasher for AbiKeccakHasher {
    fn mint_key(&self, account: Address) -> B256 {
        // abi.encode(address) - address left-padded to 32 bytes
        let mut padded = [0u8; 32];
        padded[12..32].copy_from_slice(account.as_slice());
        keccak256(padded)
    }
}

/// Calldata for `currentEpoch()`
pub fn current_epoch_calldata() -> Bytes {
    currentEpochCall {}.abi_encode().into()
}

pub struct TransactionBuilder<H = AbiKeccakHasher> {
    contracts: ContractAddresses,
    chain_id: u64,
    gas_limits: GasLimits,
    hasher: H,
}

impl TransactionBuilder<AbiKeccakHasher> {
    pub fn new(contracts: ContractAddresses, chain_id: u64, gas_limits: GasLimits) -> Self {
        Self::with_hasher(contracts, chain_id, gas_limits, AbiKeccakHasher)
    }
}

impl<H: MintKeyHasher> TransactionBuilder<H> {
    pub fn with_hasher(contracts: ContractAddresses, chain_id: u64, gas_limits: GasLimits, hasher: H) -> Self {
        Self {
            contracts,
            chain_id,
            gas_limits,
            hasher,
        }
    }

    /// Assemble the unsigned call. Pure: no I/O, no hidden state.
    pub fn build(&self, operation: &Operation, account: Address, nonce: u64, fees: FeeParameters) -> UnsignedCall {
        let (to, input, gas_limit) = match operation {
            Operation::Approve => {
                let call = approveCall {
                    spender: self.contracts.game,
                    value: U256::MAX,
                };
                (self.contracts.token, call.abi_encode(), self.gas_limits.approve)
            }
            Operation::Mint => {
                let call = mintCall {
                    key_: self.hasher.mint_key(account),
                };
                (self.contracts.nft, call.abi_encode(), self.gas_limits.mint)
            }
            Operation::Bet(bet) => {
                let input = match bet.side {
                    BetSide::High => betHighCall {
                        epoch_: bet.epoch,
                        amount_: bet.amount,
                    }
                    .abi_encode(),
                    BetSide::Low => betLowCall {
                        epoch_: bet.epoch,
                        amount_: bet.amount,
                    }
                    .abi_encode(),
                };
                (self.contracts.game, input, self.gas_limits.bet)
            }
            Operation::Claim { epochs } => {
                let call = claimCall {
                    epochs_: epochs.clone(),
                };
                (self.contracts.game, call.abi_encode(), self.gas_limits.claim)
            }
        };

        UnsignedCall {
            to,
            input: input.into(),
            nonce,
            gas_limit,
            chain_id: self.chain_id,
            fees,
            tx_type: TransactionType::Eip1559,
        }
    }
}
