//! Minimal call-data encoding for the token calls scenario tasks make
//!
//! Only the fixed set of token functions below is supported; contract ABI
//! management lives outside the player.

use crate::common::{Error, Result};

use super::Address;

/// `transfer(address,uint256)`
const TRANSFER_SELECTOR: &str = "a9059cbb";
/// `mint(uint256)`
const MINT_SELECTOR: &str = "a0712d68";
/// `balanceOf(address)`
const BALANCE_OF_SELECTOR: &str = "70a08231";

/// Length of one ABI word in hex digits
const WORD: usize = 64;

fn uint_word(value: u128) -> String {
    format!("{:064x}", value)
}

fn address_word(address: &Address) -> String {
    format!("{:0>64}", address.digits())
}

fn string_words(s: &str) -> String {
    let mut out = uint_word(s.len() as u128);
    let mut data: String = s.bytes().map(|b| format!("{:02x}", b)).collect();
    let padded = data.len().div_ceil(WORD) * WORD;
    data.extend(std::iter::repeat('0').take(padded - data.len()));
    out.push_str(&data);
    out
}

pub fn encode_transfer(to: &Address, amount: u128) -> String {
    format!("0x{}{}{}", TRANSFER_SELECTOR, address_word(to), uint_word(amount))
}

pub fn encode_mint(amount: u128) -> String {
    format!("0x{}{}", MINT_SELECTOR, uint_word(amount))
}

pub fn encode_balance_of(owner: &Address) -> String {
    format!("0x{}{}", BALANCE_OF_SELECTOR, address_word(owner))
}

/// Constructor arguments of the test token:
/// `(uint256 initial_supply, uint8 decimals, string name, string symbol)`
///
/// Appended to the contract bytecode to form deployment data.
pub fn encode_token_constructor(name: &str, symbol: &str) -> String {
    let name_words = string_words(name);
    let name_offset = 4 * 32;
    let symbol_offset = name_offset + name_words.len() / 2;
    let mut out = String::new();
    out.push_str(&uint_word(0));
    out.push_str(&uint_word(0));
    out.push_str(&uint_word(name_offset as u128));
    out.push_str(&uint_word(symbol_offset as u128));
    out.push_str(&name_words);
    out.push_str(&string_words(symbol));
    out
}

/// Parse a JSON-RPC hex quantity such as `0x1b4`
pub fn parse_quantity(s: &str) -> Result<u128> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| Error::Chain(format!("Invalid quantity '{}'", s)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.len() > 32 {
        return Err(Error::Chain(format!("Quantity '{}' overflows u128", s)));
    }
    if trimmed.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(trimmed, 16)
        .map_err(|e| Error::Chain(format!("Invalid quantity '{}': {}", s, e)))
}

/// Format a value as a JSON-RPC hex quantity
pub fn quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tail: &str) -> Address {
        Address::parse(&format!("0x{:0>40}", tail)).unwrap()
    }

    #[test]
    fn test_encode_transfer() {
        let data = encode_transfer(&addr("ab"), 10);
        assert!(data.starts_with("0xa9059cbb"));
        assert_eq!(data.len(), 2 + 8 + 2 * WORD);
        assert!(data.ends_with(&format!("{:064x}", 10)));
        assert_eq!(&data[10..10 + WORD], &format!("{:0>64}", "ab"));
    }

    #[test]
    fn test_constructor_layout() {
        let data = encode_token_constructor("Token", "TKN");
        // head (4 words) + name (len + 1 data word) + symbol (len + 1 data word)
        assert_eq!(data.len(), 8 * WORD);
        assert_eq!(&data[2 * WORD..3 * WORD], &uint_word(0x80));
        assert_eq!(&data[3 * WORD..4 * WORD], &uint_word(0xc0));
        assert_eq!(&data[4 * WORD..5 * WORD], &uint_word(5));
        assert!(data[5 * WORD..6 * WORD].starts_with("546f6b656e"));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert_eq!(parse_quantity(&format!("0x{:064x}", 7)).unwrap(), 7);
        assert!(parse_quantity("12").is_err());
        assert!(parse_quantity(&format!("0x1{:064x}", 0)).is_err());
        assert_eq!(quantity(436), "0x1b4");
    }
}
