//! # Contract ABI Codec
//!
//! Just enough of the Solidity ABI to talk to an ERC-20 token and an
//! ERC-4626-style vault: every argument and return value we deal with is a
//! static 32-byte word (`address` or `uint256`), so there is no head/tail
//! encoding, no dynamic arrays and no tuples.
//!
//! ```text
//! calldata = keccak256(signature)[0..4] || word(arg0) || word(arg1) || ...
//! ```

use ethereum_types::{Address, U256};
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Size of one ABI word.
pub const WORD_LEN: usize = 32;

/// Size of a function selector.
pub const SELECTOR_LEN: usize = 4;

/// Errors that can occur while decoding contract return data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    /// `0x` came back. Usually the target address has no code.
    #[error("empty return data (is the contract deployed?)")]
    EmptyReturnData,

    #[error("return data too short: expected at least {expected} bytes, got {got}")]
    ShortReturnData { expected: usize, got: usize },

    #[error("invalid hex data: {0}")]
    InvalidHex(String),
}

/// A single static ABI argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
}

impl Token {
    /// Left-pads the value into a 32-byte word.
    pub fn to_word(&self) -> [u8; WORD_LEN] {
        let mut word = [0u8; WORD_LEN];
        match self {
            Token::Address(address) => word[12..].copy_from_slice(address.as_bytes()),
            Token::Uint(value) => value.to_big_endian(&mut word),
        }
        word
    }
}

/// Keccak-256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First four bytes of the Keccak-256 hash of a canonical signature such as
/// `"balanceOf(address)"`.
pub fn selector(signature: &str) -> [u8; SELECTOR_LEN] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Builds calldata for a call to `signature` with the given arguments.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = Vec::with_capacity(SELECTOR_LEN + args.len() * WORD_LEN);
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(&arg.to_word());
    }
    data
}

fn first_word(data: &[u8]) -> Result<&[u8], AbiError> {
    if data.is_empty() {
        return Err(AbiError::EmptyReturnData);
    }
    data.get(..WORD_LEN).ok_or(AbiError::ShortReturnData {
        expected: WORD_LEN,
        got: data.len(),
    })
}

/// Decodes a single `uint256` return value.
pub fn decode_uint(data: &[u8]) -> Result<U256, AbiError> {
    first_word(data).map(U256::from_big_endian)
}

/// Decodes a single `address` return value (the low 20 bytes of the word).
pub fn decode_address(data: &[u8]) -> Result<Address, AbiError> {
    first_word(data).map(|word| Address::from_slice(&word[12..]))
}

// ---------------------------------------------------------------------------
// Hex helpers
// ---------------------------------------------------------------------------

/// `0x`-prefixed lowercase hex.
pub fn to_hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Accepts hex with or without the `0x` prefix.
pub fn from_hex_data(text: &str) -> Result<Vec<u8>, AbiError> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(digits).map_err(|e| AbiError::InvalidHex(format!("{text}: {e}")))
}

/// Parses a 20-byte account or contract address.
pub fn parse_address(text: &str) -> Result<Address, AbiError> {
    let bytes = from_hex_data(text.trim())?;
    if bytes.len() != 20 {
        return Err(AbiError::InvalidHex(format!(
            "{text}: expected 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// Full lowercase `0x` form of an address. `Display` on `H160` abbreviates.
pub fn address_hex(address: &Address) -> String {
    to_hex_data(address.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn well_known_selectors() {
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("approve(address,uint256)")), "095ea7b3");
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("allowance(address,address)")), "dd62ed3e");
        assert_eq!(hex::encode(selector("totalAssets()")), "01e1d114");
        assert_eq!(hex::encode(selector("asset()")), "38d52e0f");
        assert_eq!(hex::encode(selector("deposit(uint256,address)")), "6e553f65");
    }

    #[test]
    fn encode_call_layout() {
        let data = encode_call(
            "approve(address,uint256)",
            &[Token::Address(addr(0xAB)), Token::Uint(U256::from(1000u64))],
        );
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &selector("approve(address,uint256)"));
        assert!(data[4..16].iter().all(|b| *b == 0));
        assert!(data[16..36].iter().all(|b| *b == 0xAB));
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(1000u64));
    }

    #[test]
    fn encode_call_without_args_is_just_selector() {
        assert_eq!(encode_call("totalAssets()", &[]).len(), 4);
    }

    #[test]
    fn decode_uint_word() {
        let word = Token::Uint(U256::exp10(18)).to_word();
        assert_eq!(decode_uint(&word).unwrap(), U256::exp10(18));
    }

    #[test]
    fn decode_address_word() {
        let word = Token::Address(addr(0x11)).to_word();
        assert_eq!(decode_address(&word).unwrap(), addr(0x11));
    }

    #[test]
    fn decode_rejects_empty_and_short() {
        assert_eq!(decode_uint(&[]), Err(AbiError::EmptyReturnData));
        assert_eq!(
            decode_uint(&[0u8; 8]),
            Err(AbiError::ShortReturnData { expected: 32, got: 8 })
        );
    }

    #[test]
    fn hex_round_trip() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        assert_eq!(to_hex_data(&bytes), "0xdeadbeef");
        assert_eq!(from_hex_data("0xdeadbeef").unwrap(), bytes);
        assert_eq!(from_hex_data("deadbeef").unwrap(), bytes);
        assert!(from_hex_data("0xzz").is_err());
    }

    #[test]
    fn parse_address_checks_length() {
        let parsed = parse_address("0x1111111111111111111111111111111111111111").unwrap();
        assert_eq!(parsed, addr(0x11));
        assert_eq!(address_hex(&parsed), "0x1111111111111111111111111111111111111111");
        assert!(parse_address("0x1234").is_err());
    }
}
