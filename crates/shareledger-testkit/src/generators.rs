//! Proptest generators for property-based testing.

use proptest::prelude::*;

use shareledger_core::{
    Blake3Hash, ChainPosition, CumulativeTotals, Ed25519PublicKey, Keypair, RecordId, ShareRecord,
    ShareRecordBuilder, Visibility,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random RecordId.
pub fn record_id() -> impl Strategy<Value = RecordId> {
    any::<[u8; 32]>().prop_map(RecordId::from_bytes)
}

/// Generate a random Blake3Hash.
pub fn blake3_hash() -> impl Strategy<Value = Blake3Hash> {
    any::<[u8; 32]>().prop_map(Blake3Hash)
}

/// Generate a random Ed25519PublicKey.
pub fn public_key() -> impl Strategy<Value = Ed25519PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_000_000_000_000i64
}

pub fn visibility() -> impl Strategy<Value = Visibility> {
    prop_oneof![Just(Visibility::Public), Just(Visibility::Private)]
}

/// Generate a chain position for `device`: genesis or a non-zero head.
pub fn chain_position(device: Ed25519PublicKey) -> impl Strategy<Value = ChainPosition> {
    prop_oneof![
        Just(ChainPosition::genesis(device)),
        (record_id(), 1u64..=100_000, 0u64..=u32::MAX as u64, 0u64..=u32::MAX as u64)
            .prop_filter("head must be non-zero", |(head, ..)| !head.is_zero())
            .prop_map(move |(head, index, sent, received)| ChainPosition {
                device,
                head,
                index,
                totals: CumulativeTotals::new(sent, received),
            }),
    ]
}

/// Parameters for generating a co-signed share record.
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub sender: Keypair,
    pub receiver: Keypair,
    pub sender_pos: ChainPosition,
    pub receiver_pos: ChainPosition,
    pub request_hash: Blake3Hash,
    pub file_hash: Blake3Hash,
    pub chunk_hashes: Vec<Blake3Hash>,
    pub bytes_total: u64,
    pub visibility: Visibility,
    pub timestamp: i64,
}

impl Arbitrary for TransferParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<[u8; 32]>(), any::<[u8; 32]>())
            .prop_filter("parties must differ", |(a, b)| a != b)
            .prop_flat_map(|(sender_seed, receiver_seed)| {
                let sender = Keypair::from_seed(&sender_seed);
                let receiver = Keypair::from_seed(&receiver_seed);
                (
                    Just(sender.clone()),
                    Just(receiver.clone()),
                    chain_position(sender.public_key()),
                    chain_position(receiver.public_key()),
                    blake3_hash(),
                    blake3_hash(),
                    prop::collection::vec(blake3_hash(), 0..8),
                    0u64..=1u64 << 40,
                    visibility(),
                    timestamp(),
                )
            })
            .prop_map(
                |(
                    sender,
                    receiver,
                    sender_pos,
                    receiver_pos,
                    request_hash,
                    file_hash,
                    chunk_hashes,
                    bytes_total,
                    visibility,
                    timestamp,
                )| TransferParams {
                    sender,
                    receiver,
                    sender_pos,
                    receiver_pos,
                    request_hash,
                    file_hash,
                    chunk_hashes,
                    bytes_total,
                    visibility,
                    timestamp,
                },
            )
            .boxed()
    }
}

/// Build and co-sign a record from parameters.
///
/// # Panics
///
/// Never for parameters produced by the strategy above.
pub fn record_from_params(params: &TransferParams) -> ShareRecord {
    ShareRecordBuilder::new(params.sender_pos, params.receiver_pos)
        .request_hash(params.request_hash)
        .file_hash(params.file_hash)
        .chunk_hashes(params.chunk_hashes.clone())
        .bytes_total(params.bytes_total)
        .visibility(params.visibility)
        .timestamp(params.timestamp)
        .build()
        .sign_as_sender(&params.sender)
        .expect("sender signs")
        .countersign(&params.receiver)
        .expect("receiver countersigns")
}
