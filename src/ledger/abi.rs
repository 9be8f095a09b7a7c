//! Minimal word-level ABI codec for the fixed claim schema.
//!
//! The executor only ever touches `address`, `uint256` and dynamic `bytes`
//! parameters, so a full ABI library is not needed: values are 32-byte head
//! words, dynamic bytes go through an offset word into the tail.

use alloy_primitives::{keccak256, Address, Bytes, U256};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiError {
    #[error("abi data truncated")]
    Truncated,

    #[error("abi tail offset out of range")]
    BadOffset,

    #[error("abi dynamic length out of range")]
    BadLength,
}

/// 4-byte function selector for a canonical signature string.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Selector plus ABI-encoded arguments, ready for an eth_call / transaction
/// data field.
pub fn encode_call(signature: &str, args: AbiEncoder) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&args.finish());
    data
}

enum Token {
    Word([u8; 32]),
    DynamicBytes(Vec<u8>),
}

/// Head/tail ABI encoder over the three parameter types the claim schema
/// uses. Arguments are pushed in call order.
#[derive(Default)]
pub struct AbiEncoder {
    tokens: Vec<Token>,
}

impl AbiEncoder {
    pub fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn push_address(&mut self, value: Address) {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(value.as_slice());
        self.tokens.push(Token::Word(word));
    }

    pub fn push_uint(&mut self, value: U256) {
        self.tokens.push(Token::Word(value.to_be_bytes::<32>()));
    }

    pub fn push_bytes(&mut self, value: &[u8]) {
        self.tokens.push(Token::DynamicBytes(value.to_vec()));
    }

    pub fn finish(self) -> Vec<u8> {
        let head_len = self.tokens.len() * 32;
        let mut head = Vec::with_capacity(head_len);
        let mut tail = Vec::new();

        for token in &self.tokens {
            match token {
                Token::Word(word) => head.extend_from_slice(word),
                Token::DynamicBytes(bytes) => {
                    let offset = U256::from(head_len + tail.len());
                    head.extend_from_slice(&offset.to_be_bytes::<32>());

                    tail.extend_from_slice(&U256::from(bytes.len()).to_be_bytes::<32>());
                    tail.extend_from_slice(bytes);
                    let padding = (32 - bytes.len() % 32) % 32;
                    tail.extend(std::iter::repeat(0u8).take(padding));
                }
            }
        }

        head.extend_from_slice(&tail);
        head
    }
}

/// Sequential decoder over an ABI-encoded blob (event data or call return).
/// Head words are consumed in order; dynamic bytes follow their offset word
/// into the tail.
pub struct AbiDecoder<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> AbiDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn head_word(&mut self) -> Result<[u8; 32], AbiError> {
        let end = self.cursor.checked_add(32).ok_or(AbiError::Truncated)?;
        let slice = self.data.get(self.cursor..end).ok_or(AbiError::Truncated)?;
        self.cursor = end;
        let mut word = [0u8; 32];
        word.copy_from_slice(slice);
        Ok(word)
    }

    pub fn address(&mut self) -> Result<Address, AbiError> {
        let word = self.head_word()?;
        Ok(Address::from_slice(&word[12..]))
    }

    pub fn uint(&mut self) -> Result<U256, AbiError> {
        Ok(U256::from_be_bytes(self.head_word()?))
    }

    pub fn bytes(&mut self) -> Result<Bytes, AbiError> {
        let offset = word_to_usize(self.head_word()?).ok_or(AbiError::BadOffset)?;

        let len_end = offset.checked_add(32).ok_or(AbiError::BadOffset)?;
        let len_slice = self.data.get(offset..len_end).ok_or(AbiError::BadOffset)?;
        let mut len_word = [0u8; 32];
        len_word.copy_from_slice(len_slice);
        let len = word_to_usize(len_word).ok_or(AbiError::BadLength)?;

        let data_end = len_end.checked_add(len).ok_or(AbiError::BadLength)?;
        let payload = self.data.get(len_end..data_end).ok_or(AbiError::BadLength)?;
        Ok(Bytes::from(payload.to_vec()))
    }
}

fn word_to_usize(word: [u8; 32]) -> Option<usize> {
    let value = U256::from_be_bytes(word);
    let as_u64: u64 = value.try_into().ok()?;
    usize::try_from(as_u64).ok()
}
