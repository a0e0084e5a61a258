//! Golden test vectors for the signable encoding.
//!
//! Each vector fixes every input, including keys derived from fixed seeds,
//! and records the expected signable bytes, the hash derived from them (for
//! entities that have one) and the Ed25519 signature. Any implementation of
//! the ledger must reproduce these exactly.

use serde::Serialize;

use shareledger_core::{
    Blake3Hash, ChainPosition, Checkpoint, CumulativeTotals, Ed25519PublicKey, Ed25519Signature,
    FileMetaBuilder, ForkEvidence, Keypair, RecordId, ShareRecordBuilder, TransferRequest,
    Visibility,
};

/// 2025-10-09T08:53:20Z in Unix milliseconds.
pub const VECTOR_TIMESTAMP: i64 = 1_760_000_000_000;

/// What a vector produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorOutput {
    pub signable: Vec<u8>,
    /// Record id or request hash.
    pub hash: Option<[u8; 32]>,
    /// For share records, the sender's signature.
    pub signature: Ed25519Signature,
}

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Builds the entity from fixed inputs.
    pub build: fn() -> VectorOutput,
    /// Expected signable bytes (hex).
    pub expected_signable: &'static str,
    /// Expected id or request hash (hex).
    pub expected_hash: Option<&'static str>,
    /// Expected signature (hex).
    pub expected_signature: &'static str,
}

fn keypair(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

fn filled(byte: u8) -> Blake3Hash {
    Blake3Hash([byte; 32])
}

fn genesis_transfer() -> VectorOutput {
    let sender = keypair(0x01);
    let receiver = keypair(0x02);
    let record = ShareRecordBuilder::new(
        ChainPosition::genesis(sender.public_key()),
        ChainPosition::genesis(receiver.public_key()),
    )
    .request_hash(filled(0x11))
    .file_hash(filled(0x22))
    .chunk_hashes(vec![filled(0x33), filled(0x44)])
    .bytes_total(1_048_576)
    .visibility(Visibility::Public)
    .timestamp(VECTOR_TIMESTAMP)
    .build()
    .sign_as_sender(&sender)
    .and_then(|pending| pending.countersign(&receiver))
    .expect("vector inputs are valid");

    VectorOutput {
        signable: record.header.signable_bytes().expect("encodable"),
        hash: Some(record.id.0),
        signature: record.sender_sig,
    }
}

fn mid_chain_private_transfer() -> VectorOutput {
    let sender = keypair(0x02);
    let receiver = keypair(0x03);
    let record = ShareRecordBuilder::new(
        ChainPosition {
            device: sender.public_key(),
            head: RecordId([0xAA; 32]),
            index: 4,
            totals: CumulativeTotals::new(5000, 7000),
        },
        ChainPosition {
            device: receiver.public_key(),
            head: RecordId([0xBB; 32]),
            index: 9,
            totals: CumulativeTotals::new(1, 2),
        },
    )
    .request_hash(filled(0x11))
    .file_hash(filled(0x22))
    .visibility(Visibility::Private)
    .timestamp(-1)
    .build()
    .sign_as_sender(&sender)
    .and_then(|pending| pending.countersign(&receiver))
    .expect("vector inputs are valid");

    VectorOutput {
        signable: record.header.signable_bytes().expect("encodable"),
        hash: Some(record.id.0),
        signature: record.sender_sig,
    }
}

fn transfer_request() -> VectorOutput {
    let request = TransferRequest::create_with_nonce(
        &keypair(0x03),
        filled(0x22),
        vec![0, 7, u32::MAX],
        [0x5A; 16],
        VECTOR_TIMESTAMP,
    )
    .expect("vector inputs are valid");

    VectorOutput {
        signable: request.signable_bytes().expect("encodable"),
        hash: Some(request.request_hash().expect("encodable").0),
        signature: request.signature,
    }
}

fn file_meta() -> VectorOutput {
    let file = FileMetaBuilder::new(filled(0x22), "clip.mp4")
        .file_size(2500)
        .chunk_size(1000)
        .chunk_hashes(vec![filled(0x31), filled(0x32), filled(0x33)])
        .created_at(VECTOR_TIMESTAMP)
        .sign(&keypair(0x04))
        .expect("vector inputs are valid");

    VectorOutput {
        signable: file.signable_bytes().expect("encodable"),
        hash: None,
        signature: file.origin_sig,
    }
}

fn checkpoint() -> VectorOutput {
    let device = keypair(0x01);
    let position = ChainPosition {
        device: device.public_key(),
        head: RecordId([0xCC; 32]),
        index: 12,
        totals: CumulativeTotals::new(100, 200),
    };
    let checkpoint = Checkpoint::create(&device, &position, 4096, 2000, VECTOR_TIMESTAMP)
        .expect("vector inputs are valid");

    VectorOutput {
        signable: checkpoint.signable_bytes(),
        hash: None,
        signature: checkpoint.device_sig,
    }
}

fn fork_evidence() -> VectorOutput {
    let device: Ed25519PublicKey = keypair(0x01).public_key();
    // Passed in descending order; creation sorts them.
    let evidence = ForkEvidence::create(
        &keypair(0x05),
        device,
        RecordId([0x02; 32]),
        RecordId([0x01; 32]),
        VECTOR_TIMESTAMP,
    )
    .expect("vector inputs are valid");

    VectorOutput {
        signable: evidence.signable_bytes(),
        hash: None,
        signature: evidence.reporter_sig,
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "share record, both chains at genesis",
            build: genesis_transfer,
            expected_signable: "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c\
                                8139770ea87d175f56a35466c34c7ecccb8d8a91b4ee37a25df60f5b8fc9b394\
                                0000000000000000000000000000000000000000000000000000000000000000\
                                0000000000000000000000000000000000000000000000000000000000000000\
                                0000000000000001\
                                0000000000000001\
                                00000000000000000000000000000000\
                                00000000000000000000000000000000\
                                1111111111111111111111111111111111111111111111111111111111111111\
                                2222222222222222222222222222222222222222222222222222222222222222\
                                00000002\
                                3333333333333333333333333333333333333333333333333333333333333333\
                                4444444444444444444444444444444444444444444444444444444444444444\
                                0000000000100000\
                                00000000\
                                00000199c82cc000",
            expected_hash: Some(
                "5932634ef7e13ad681fe0ca0e37d794f8dc29416e0847dc847b5cf81a7ae2c9a",
            ),
            expected_signature: "532d84e469231323fbc51cc778da05b64c7c437d101926ad21173c15cedd9536\
                                 d2f1d4c3beba729dd22caf7d8823a98114fe2198c9cdf8666e0d7100770d2405",
        },
        GoldenVector {
            name: "share record mid-chain, private, negative timestamp",
            build: mid_chain_private_transfer,
            expected_signable: "8139770ea87d175f56a35466c34c7ecccb8d8a91b4ee37a25df60f5b8fc9b394\
                                ed4928c628d1c2c6eae90338905995612959273a5c63f93636c14614ac8737d1\
                                aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
                                bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\
                                0000000000000005\
                                000000000000000a\
                                00000000000013880000000000001b58\
                                00000000000000010000000000000002\
                                1111111111111111111111111111111111111111111111111111111111111111\
                                2222222222222222222222222222222222222222222222222222222222222222\
                                00000000\
                                0000000000000000\
                                00000001\
                                ffffffffffffffff",
            expected_hash: Some(
                "b39a5991eb160d824a4b95a4bd9aa0ae7c6ba6bc96ce6a9b083ad9ec9799d784",
            ),
            expected_signature: "bfa67ea84fa8b1d53aeae00c84bc99feecbf77174d74c0e8c8043363dcba20ff\
                                 91c44303a97e91ef1b5628de0cf43b14868ab5e96d4cccd56e81e9565cf37200",
        },
        GoldenVector {
            name: "transfer request with boundary indices",
            build: transfer_request,
            expected_signable: "ed4928c628d1c2c6eae90338905995612959273a5c63f93636c14614ac8737d1\
                                2222222222222222222222222222222222222222222222222222222222222222\
                                00000003\
                                00000000\
                                00000007\
                                ffffffff\
                                5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a\
                                00000199c82cc000",
            expected_hash: Some(
                "9353a5a3cd7b2cc3582b19fc03db57313ea29c40ce129aaf9cf95aa181b9758e",
            ),
            expected_signature: "8ceffda6754a545b72ebc7ee4df4bb7eeda6ad4136b140070133120fc2670098\
                                 fd40a17063ab7eec96afe7cfb30eadfa23a56796bca3d7c79e8b3d1249f3a60c",
        },
        GoldenVector {
            name: "file metadata, three chunks",
            build: file_meta,
            expected_signable: "2222222222222222222222222222222222222222222222222222222222222222\
                                636c69702e6d7034\
                                00000000000009c4\
                                00000000000003e8\
                                00000003\
                                3131313131313131313131313131313131313131313131313131313131313131\
                                3232323232323232323232323232323232323232323232323232323232323232\
                                3333333333333333333333333333333333333333333333333333333333333333\
                                ca93ac1705187071d67b83c7ff0efe8108e8ec4530575d7726879333dbdabe7c\
                                00000199c82cc000",
            expected_hash: None,
            expected_signature: "89a4a83dfc0f5bace6685f3cbf80fd3007be76a7ea3544ad01c9056f53c1b20f\
                                 99e4df2151569d89c16233df7f9f07a9e1ef9bd312e1ddc16a5b8db751cbf10c",
        },
        GoldenVector {
            name: "checkpoint",
            build: checkpoint,
            expected_signable: "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c\
                                cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc\
                                000000000000000c\
                                000000000000006400000000000000c8\
                                0000000000001000\
                                07d0\
                                00000199c82cc000",
            expected_hash: None,
            expected_signature: "25617b921be06eaa308bf5962bc7fe8bc6f6362946716ea161697f632dba9590\
                                 324f6b35cc7073e01d93b7439c944f66a03c47018ac14bac5486af5f891e3101",
        },
        GoldenVector {
            name: "fork evidence, ids sorted",
            build: fork_evidence,
            expected_signable: "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c\
                                0101010101010101010101010101010101010101010101010101010101010101\
                                0202020202020202020202020202020202020202020202020202020202020202\
                                00000199c82cc000",
            expected_hash: None,
            expected_signature: "13f8d387b2795b4a848ea4bfca0f7e4570e700d6cea57d51c9243dfd4a8ad185\
                                 187ddc58cbe6e53fd399f2c3a6a6b9cbb3d384415cdcd3e0da16a1dc36d07f01",
        },
    ]
}

/// Check every vector. Returns `(name, matches, detail)` per vector, where
/// detail names the first mismatching field.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let out = (v.build)();
            let signable = hex::encode(&out.signable);
            let hash = out.hash.map(hex::encode);
            let signature = hex::encode(out.signature.0);

            let detail = if signable != v.expected_signable {
                format!("signable bytes: got {}", signable)
            } else if hash.as_deref() != v.expected_hash {
                format!("hash: got {:?}", hash)
            } else if signature != v.expected_signature {
                format!("signature: got {}", signature)
            } else {
                String::new()
            };

            (v.name.to_string(), detail.is_empty(), detail)
        })
        .collect()
}

#[derive(Serialize)]
struct ExportedVector {
    name: &'static str,
    signable: String,
    hash: Option<String>,
    signature: String,
}

/// All vectors as pretty JSON, for checking other implementations.
pub fn vectors_json() -> serde_json::Result<String> {
    let exported: Vec<_> = all_vectors()
        .into_iter()
        .map(|v| ExportedVector {
            name: v.name,
            signable: v.expected_signable.to_string(),
            hash: v.expected_hash.map(str::to_string),
            signature: v.expected_signature.to_string(),
        })
        .collect();
    serde_json::to_string_pretty(&exported)
}
