//! Order and auth signing for the Polymarket CLOB.
//!
//! Orders are EIP-712 typed data against the CTF exchange contract. The L1
//! auth message (`ClobAuth`) proves key ownership when deriving API
//! credentials.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, PrimitiveSignature, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use alloy::sol;
use alloy::sol_types::eip712_domain;
use alloy::sol_types::SolStruct;
use pmlag_core::OrderSide;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use zeroize::Zeroizing;

use crate::error::{ExecutorError, ExecutorResult, VenueError, VenueResult};
use crate::venue::OrderArgs;

pub const EXCHANGE_DOMAIN_NAME: &str = "Polymarket CTF Exchange";
pub const EXCHANGE_DOMAIN_VERSION: &str = "1";
pub const EXCHANGE_ADDRESS: Address =
    alloy::primitives::address!("4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E");
pub const NEG_RISK_EXCHANGE_ADDRESS: Address =
    alloy::primitives::address!("C5d563A36AE78145C45a50134d48A1215220f80a");

pub const AUTH_DOMAIN_NAME: &str = "ClobAuthDomain";
pub const AUTH_DOMAIN_VERSION: &str = "1";
pub const AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

/// Collateral and outcome tokens both use 6 decimals.
const TOKEN_DECIMALS: u32 = 6;
/// Collateral amounts are truncated to this many decimals.
const MAKER_AMOUNT_DECIMALS: u32 = 4;

sol! {
    #[derive(Debug)]
    struct Order {
        uint256 salt;
        address maker;
        address signer;
        address taker;
        uint256 tokenId;
        uint256 makerAmount;
        uint256 takerAmount;
        uint256 expiration;
        uint256 nonce;
        uint256 feeRateBps;
        uint8 side;
        uint8 signatureType;
    }

    #[derive(Debug)]
    struct ClobAuth {
        address address;
        string timestamp;
        uint256 nonce;
        string message;
    }
}

// =============================================================================
// KeyManager
// =============================================================================

/// Holds the trading key.
///
/// Never log key material. The raw bytes are zeroized after parsing.
pub struct KeyManager {
    signer: PrivateKeySigner,
}

impl KeyManager {
    /// Parse a hex private key (optional `0x` prefix, surrounding whitespace).
    pub fn from_hex(hex_str: &str) -> ExecutorResult<Self> {
        let trimmed = hex_str.trim().trim_start_matches("0x");
        let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(hex::decode(trimmed)?);
        let signer = PrivateKeySigner::from_slice(&bytes)
            .map_err(|e| ExecutorError::InvalidKey(e.to_string()))?;
        Ok(Self { signer })
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Parse a `0x` address.
pub fn parse_address(raw: &str) -> ExecutorResult<Address> {
    Address::from_str(raw.trim()).map_err(|e| ExecutorError::InvalidAddress(format!("{raw}: {e}")))
}

// =============================================================================
// Amounts
// =============================================================================

/// Maker/taker amounts in token base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderAmounts {
    pub maker: U256,
    pub taker: U256,
}

impl OrderAmounts {
    /// BUY pays collateral for shares; SELL gives shares for collateral.
    pub fn compute(args: &OrderArgs) -> VenueResult<Self> {
        let shares = args.size.inner();
        let collateral = (shares * args.limit_price.inner())
            .round_dp_with_strategy(MAKER_AMOUNT_DECIMALS, rust_decimal::RoundingStrategy::ToZero);
        let (maker, taker) = match args.side {
            OrderSide::Buy => (collateral, shares),
            OrderSide::Sell => (shares, collateral),
        };
        Ok(Self {
            maker: to_base_units(maker)?,
            taker: to_base_units(taker)?,
        })
    }
}

fn to_base_units(value: Decimal) -> VenueResult<U256> {
    let scaled = (value * Decimal::from(10u64.pow(TOKEN_DECIMALS))).trunc();
    scaled
        .to_u128()
        .map(U256::from)
        .ok_or_else(|| VenueError::Signing(format!("amount {value} out of range")))
}

/// Random order salt. Kept below 2^53 so JSON consumers read it exactly.
pub fn generate_salt() -> u64 {
    (uuid::Uuid::new_v4().as_u128() & ((1u128 << 53) - 1)) as u64
}

fn normalized_signature(signature: &PrimitiveSignature) -> String {
    let mut bytes = signature.as_bytes();
    if bytes[64] < 27 {
        bytes[64] += 27;
    }
    format!("0x{}", hex::encode(bytes))
}

// =============================================================================
// OrderSigner
// =============================================================================

/// Signs CLOB orders and L1 auth messages.
pub struct OrderSigner {
    keys: Arc<KeyManager>,
    /// Address holding the funds (the proxy wallet for signature type 1).
    funder: Address,
    signature_type: u8,
    chain_id: u64,
    exchange: Address,
}

impl OrderSigner {
    pub fn new(
        keys: Arc<KeyManager>,
        funder: Option<Address>,
        signature_type: u8,
        chain_id: u64,
        neg_risk: bool,
    ) -> Self {
        let funder = funder.unwrap_or_else(|| keys.address());
        Self {
            keys,
            funder,
            signature_type,
            chain_id,
            exchange: if neg_risk {
                NEG_RISK_EXCHANGE_ADDRESS
            } else {
                EXCHANGE_ADDRESS
            },
        }
    }

    pub fn signer_address(&self) -> Address {
        self.keys.address()
    }

    pub fn funder(&self) -> Address {
        self.funder
    }

    /// Build the typed order for `args`.
    pub fn build_order(&self, args: &OrderArgs, salt: u64) -> VenueResult<Order> {
        let token_id = U256::from_str_radix(args.instrument.as_str(), 10).map_err(|e| {
            VenueError::Signing(format!("token id {} is not numeric: {e}", args.instrument))
        })?;
        let amounts = OrderAmounts::compute(args)?;

        Ok(Order {
            salt: U256::from(salt),
            maker: self.funder,
            signer: self.keys.address(),
            taker: Address::ZERO,
            tokenId: token_id,
            makerAmount: amounts.maker,
            takerAmount: amounts.taker,
            expiration: U256::ZERO,
            nonce: U256::ZERO,
            feeRateBps: U256::ZERO,
            side: match args.side {
                OrderSide::Buy => 0,
                OrderSide::Sell => 1,
            },
            signatureType: self.signature_type,
        })
    }

    /// Sign `args` and return the wire representation of the order.
    pub async fn sign_order(&self, args: &OrderArgs) -> VenueResult<Value> {
        let salt = generate_salt();
        let order = self.build_order(args, salt)?;

        let domain = eip712_domain! {
            name: EXCHANGE_DOMAIN_NAME,
            version: EXCHANGE_DOMAIN_VERSION,
            chain_id: self.chain_id,
            verifying_contract: self.exchange,
        };
        let hash = order.eip712_signing_hash(&domain);
        let signature = self
            .keys
            .signer()
            .sign_hash(&hash)
            .await
            .map_err(|e| VenueError::Signing(e.to_string()))?;

        Ok(order_wire(&order, args.side, salt, &normalized_signature(&signature)))
    }

    /// Sign the L1 auth message used to create or derive API credentials.
    pub async fn sign_clob_auth(&self, timestamp: i64, nonce: u64) -> VenueResult<String> {
        let auth = ClobAuth {
            address: self.keys.address(),
            timestamp: timestamp.to_string(),
            nonce: U256::from(nonce),
            message: AUTH_MESSAGE.to_string(),
        };
        let domain = eip712_domain! {
            name: AUTH_DOMAIN_NAME,
            version: AUTH_DOMAIN_VERSION,
            chain_id: self.chain_id,
        };
        let hash = auth.eip712_signing_hash(&domain);
        let signature = self
            .keys
            .signer()
            .sign_hash(&hash)
            .await
            .map_err(|e| VenueError::Signing(e.to_string()))?;
        Ok(normalized_signature(&signature))
    }
}

/// JSON order as the CLOB expects it: amounts as decimal strings, salt as a
/// number, side as text.
fn order_wire(order: &Order, side: OrderSide, salt: u64, signature: &str) -> Value {
    json!({
        "salt": salt,
        "maker": order.maker.to_checksum(None),
        "signer": order.signer.to_checksum(None),
        "taker": order.taker.to_checksum(None),
        "tokenId": order.tokenId.to_string(),
        "makerAmount": order.makerAmount.to_string(),
        "takerAmount": order.takerAmount.to_string(),
        "expiration": order.expiration.to_string(),
        "nonce": order.nonce.to_string(),
        "feeRateBps": order.feeRateBps.to_string(),
        "side": side.as_str(),
        "signatureType": order.signatureType,
        "signature": signature,
    })
}
