use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use rlp::RlpStream;
use secp256k1::{Message, PublicKey, SECP256K1, SecretKey};
use sha3::{Digest, Keccak256};

const EIP1559_TX_TYPE: u8 = 0x02;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("failed to sign transaction: {0}")]
    Signing(#[from] secp256k1::Error),
}

/// An unsigned EIP-1559 transaction with an empty access list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

impl Eip1559Transaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.chain_id);
        stream.append(&self.nonce);
        stream.append(&self.max_priority_fee_per_gas);
        stream.append(&self.max_fee_per_gas);
        stream.append(&self.gas_limit);
        match self.to {
            Some(to) => stream.append(&to),
            None => stream.append_empty_data(),
        };
        stream.append(&self.value);
        stream.append(&self.data.to_vec());
        stream.begin_list(0);
    }

    pub fn signing_hash(&self) -> H256 {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        keccak(&[&[EIP1559_TX_TYPE], stream.as_raw()].concat())
    }

    /// Typed envelope `0x02 || rlp(fields, y_parity, r, s)`.
    fn encode_signed(&self, y_parity: u8, r: U256, s: U256) -> Bytes {
        let mut stream = RlpStream::new_list(12);
        self.append_fields(&mut stream);
        stream.append(&y_parity);
        stream.append(&r);
        stream.append(&s);
        let mut out = Vec::with_capacity(stream.as_raw().len() + 1);
        out.push(EIP1559_TX_TYPE);
        out.extend_from_slice(stream.as_raw());
        Bytes::from(out)
    }
}

pub trait TxSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Returns the raw signed transaction ready for `eth_sendRawTransaction`.
    fn sign(&self, tx: &Eip1559Transaction) -> Result<Bytes, SignerError>;
}

#[derive(Debug, Clone)]
pub struct LocalSigner {
    secret_key: SecretKey,
    address: Address,
}

impl LocalSigner {
    pub fn new(secret_key: SecretKey) -> Self {
        let address = address_from_secret_key(&secret_key);
        Self {
            secret_key,
            address,
        }
    }

    /// Parses a hex private key, with or without `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, SignerError> {
        let raw = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|e| SignerError::InvalidPrivateKey(e.to_string()))?;
        let secret_key = SecretKey::from_slice(&raw)
            .map_err(|e| SignerError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::new(secret_key))
    }
}

impl TxSigner for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign(&self, tx: &Eip1559Transaction) -> Result<Bytes, SignerError> {
        let hash = tx.signing_hash();
        let message = Message::from_digest(hash.0);
        let (recovery_id, signature) = SECP256K1
            .sign_ecdsa_recoverable(&message, &self.secret_key)
            .serialize_compact();
        let y_parity = u8::try_from(i32::from(recovery_id))
            .map_err(|_| SignerError::Signing(secp256k1::Error::InvalidRecoveryId))?;
        let r = U256::from_big_endian(&signature[..32]);
        let s = U256::from_big_endian(&signature[32..]);
        Ok(tx.encode_signed(y_parity, r, s))
    }
}

pub fn address_from_secret_key(secret_key: &SecretKey) -> Address {
    let public_key = PublicKey::from_secret_key(SECP256K1, secret_key);
    let hash = keccak(&public_key.serialize_uncompressed()[1..]);
    Address::from_slice(&hash.as_bytes()[12..])
}

pub fn keccak(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}
