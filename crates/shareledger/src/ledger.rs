//! The Ledger: one device's view of the share network.
//!
//! The Ledger ties the validator, chain linker, fork detector, credit engine
//! and storage into a single interface. It owns the device keypair and is the
//! only writer of the device's own chain.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

use shareledger_core::{
    check_link, claimed_predecessor, validate_checkpoint, validate_file_meta,
    validate_fork_evidence, validate_share_record, validate_transfer_request,
    verify_fork_evidence, Blake3Hash, ChainPosition, Checkpoint, Ed25519PublicKey, FileMeta,
    FileMetaBuilder, ForkEvidence, Keypair, PeerInfo, PendingShareRecord, RecordId,
    RequestStatus, ShareRecord, ShareRecordBuilder, TransferRequest, ValidationError, Visibility,
    MAX_CONFIDENCE_BPS,
};
use shareledger_credit::{CreditEngine, CreditReport};
use shareledger_store::{InsertResult, Store, StoreExt};
use shareledger_wire::Envelope;

use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};

/// Result of ingesting a share record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Record was new and stored.
    Accepted(RecordId),
    /// Record was already stored.
    Duplicate,
    /// The record exposed equivocation. Evidence has been stored and the
    /// device flagged. Same-index conflicts are not stored; continuity breaks
    /// are, so the evidence can be checked later.
    Forked(ForkEvidence),
}

/// What the sender is about to bill for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTerms {
    pub request_hash: Blake3Hash,
    pub file_hash: Blake3Hash,
    pub chunk_hashes: Vec<Blake3Hash>,
    pub bytes_total: u64,
    pub visibility: Visibility,
}

impl TransferTerms {
    /// Terms for serving the chunks `request` asks for out of `file`.
    pub fn for_request(request: &TransferRequest, file: &FileMeta) -> Result<Self> {
        if request.file_hash != file.file_hash {
            return Err(LedgerError::NotFound(format!(
                "request is for file {}, not {}",
                request.file_hash.to_hex(),
                file.file_hash.to_hex()
            )));
        }

        let mut chunk_hashes = Vec::with_capacity(request.chunk_indices.len());
        let mut bytes_total = 0u64;
        for &index in &request.chunk_indices {
            let hash = file.chunk_hashes.get(index as usize).ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "chunk {} of file {}",
                    index,
                    file.file_hash.to_hex()
                ))
            })?;
            chunk_hashes.push(*hash);

            let start = u64::from(index).saturating_mul(file.chunk_size);
            let len = file.file_size.saturating_sub(start).min(file.chunk_size);
            bytes_total = bytes_total.saturating_add(len);
        }

        Ok(Self {
            request_hash: request.request_hash()?,
            file_hash: file.file_hash,
            chunk_hashes,
            bytes_total,
            visibility: Visibility::Public,
        })
    }
}

/// Guarded by the write lock.
#[derive(Debug, Default)]
struct WriteState {
    /// Own chain index reserved by a proposal awaiting countersignature.
    outstanding: Option<u64>,
}

/// The main Ledger struct.
///
/// Provides a unified API for:
/// - Proposing and countersigning transfers
/// - Ingesting records, files, requests, checkpoints and fork evidence
/// - Computing balances
pub struct Ledger<S: Store> {
    /// The identity keypair for this device.
    keypair: Keypair,
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: LedgerConfig,
    /// Credit engine built from `config.credit`.
    credit: CreditEngine,
    /// When this device joined, for the drip allowance.
    created_at: i64,
    /// Serializes every write that assigns or consumes an own chain index.
    write: Mutex<WriteState>,
}

impl<S: Store> Ledger<S> {
    /// Create a new ledger. The configuration is validated here.
    pub fn new(keypair: Keypair, store: S, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let credit = CreditEngine::new(config.credit.clone())?;
        Ok(Self {
            keypair,
            store: Arc::new(store),
            config,
            credit,
            created_at: now_millis(),
            write: Mutex::new(WriteState::default()),
        })
    }

    /// Set when this device joined the network.
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Get the device's public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn credit(&self) -> &CreditEngine {
        &self.credit
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Own Chain
    // ─────────────────────────────────────────────────────────────────────────

    /// This device's chain head, index and totals.
    pub async fn chain_position(&self) -> Result<ChainPosition> {
        Ok(self.store.chain_position(&self.public_key()).await?)
    }

    /// The index reserved by an unsettled proposal, if any.
    pub async fn outstanding_proposal(&self) -> Option<u64> {
        self.write.lock().await.outstanding
    }

    /// Abandon an unsettled proposal so a new one can be made.
    ///
    /// If the receiver countersigned it anyway, the record still ingests;
    /// a second proposal for the same index would then be equivocation.
    pub async fn cancel_proposal(&self) {
        let mut state = self.write.lock().await;
        if let Some(index) = state.outstanding.take() {
            tracing::debug!(index, "proposal cancelled");
        }
    }

    fn check_outstanding(state: &WriteState, position: &ChainPosition) -> Result<()> {
        match state.outstanding {
            Some(index) if index > position.index => Err(LedgerError::ProposalOutstanding { index }),
            _ => Ok(()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Two-Phase Transfer
    // ─────────────────────────────────────────────────────────────────────────

    /// Phase one: as sender, propose a record to `receiver`.
    ///
    /// The next own index is reserved until the countersigned record is
    /// ingested or the proposal is cancelled.
    pub async fn propose_transfer(
        &self,
        receiver: &ChainPosition,
        terms: TransferTerms,
    ) -> Result<PendingShareRecord> {
        let me = self.public_key();
        if receiver.device == me {
            return Err(ValidationError::SelfTransfer.into());
        }
        if self.store.is_forked(&receiver.device).await? {
            tracing::warn!(peer = %receiver.device, "refusing to propose to forked peer");
            return Err(LedgerError::PeerForked(receiver.device));
        }
        if let Some(peer) = self.store.get_peer(&receiver.device).await? {
            if peer.chain_index > receiver.index {
                return Err(LedgerError::StaleProposal(format!(
                    "receiver claims index {} but {} is known",
                    receiver.index, peer.chain_index
                )));
            }
        }

        let mut state = self.write.lock().await;
        let position = self.chain_position().await?;
        Self::check_outstanding(&state, &position)?;

        let pending = ShareRecordBuilder::new(position, *receiver)
            .request_hash(terms.request_hash)
            .file_hash(terms.file_hash)
            .chunk_hashes(terms.chunk_hashes)
            .bytes_total(terms.bytes_total)
            .visibility(terms.visibility)
            .timestamp(now_millis())
            .build()
            .sign_as_sender(&self.keypair)?;

        state.outstanding = Some(position.next_index());
        tracing::debug!(
            receiver = %receiver.device,
            index = position.next_index(),
            bytes = terms.bytes_total,
            "proposed transfer"
        );
        Ok(pending)
    }

    /// Phase two: as receiver, countersign a proposal and store the record.
    ///
    /// The proposed receiver index, predecessor and totals must equal this
    /// device's current chain position.
    pub async fn countersign(&self, pending: PendingShareRecord) -> Result<ShareRecord> {
        let me = self.public_key();
        let sender = pending.header.sender;
        if self.store.is_forked(&sender).await? {
            tracing::warn!(peer = %sender, "refusing to countersign for forked peer");
            return Err(LedgerError::PeerForked(sender));
        }

        let state = self.write.lock().await;
        let now = now_millis();
        let position = self.chain_position().await?;
        Self::check_outstanding(&state, &position)?;

        let header = &pending.header;
        if header.receiver == me
            && (header.receiver_record_index != position.next_index()
                || header.prev_receiver != position.head
                || header.receiver_totals != position.totals)
        {
            return Err(LedgerError::StaleProposal(format!(
                "proposal puts us at index {} after {}, chain is at {} with head {}",
                header.receiver_record_index, header.prev_receiver, position.index, position.head
            )));
        }

        // A different record already held at the sender's index means the
        // sender is signing two histories.
        let expected_id = pending.expected_id()?;
        if let Some(existing) = self
            .store
            .get_record_at(&sender, header.sender_record_index)
            .await?
        {
            if existing.id != expected_id {
                let evidence =
                    ForkEvidence::create(&self.keypair, sender, existing.id, expected_id, now)?;
                self.record_fork(&evidence, now).await?;
                return Err(LedgerError::PeerForked(sender));
            }
        }

        let record = pending.countersign(&self.keypair)?;
        validate_share_record(&record)?;

        // A proposal that does not link to the sender's records we hold is a
        // fork too.
        if let Some(evidence) = self.check_neighbours(&sender, &record, now).await? {
            self.record_fork(&evidence, now).await?;
            return Err(LedgerError::PeerForked(sender));
        }

        if let InsertResult::Conflict {
            device,
            index,
            existing,
        } = self.store.insert_record(&record).await?
        {
            return Err(LedgerError::Conflict {
                device,
                index,
                existing,
            });
        }

        self.observe_parties(&record, now).await?;
        self.settle_request(&record).await?;
        drop(state);

        tracing::debug!(
            record = %record.id,
            sender = %sender,
            bytes = record.bytes_total(),
            "countersigned transfer"
        );
        Ok(record)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ingest
    // ─────────────────────────────────────────────────────────────────────────

    /// Ingest a co-signed record from any source.
    ///
    /// Invalid records are returned as errors and never stored.
    pub async fn ingest_record(&self, record: &ShareRecord) -> Result<IngestOutcome> {
        if let Err(e) = validate_share_record(record) {
            tracing::warn!(record = %record.id, error = %e, "rejected share record");
            return Err(e.into());
        }

        let _state = self.write.lock().await;
        let now = now_millis();

        match self.store.insert_record(record).await? {
            InsertResult::AlreadyExists => {
                tracing::debug!(record = %record.id, "duplicate share record");
                Ok(IngestOutcome::Duplicate)
            }
            InsertResult::Conflict {
                device,
                index,
                existing,
            } => {
                let evidence =
                    ForkEvidence::create(&self.keypair, device, existing, record.id, now)?;
                tracing::warn!(%device, index, %existing, conflicting = %record.id, "fork detected");
                self.record_fork(&evidence, now).await?;
                Ok(IngestOutcome::Forked(evidence))
            }
            InsertResult::Inserted => {
                let mut first = None;
                for device in [*record.sender(), *record.receiver()] {
                    if let Some(evidence) = self.check_neighbours(&device, record, now).await? {
                        self.record_fork(&evidence, now).await?;
                        first.get_or_insert(evidence);
                    }
                }

                self.observe_parties(record, now).await?;
                self.settle_request(record).await?;

                match first {
                    Some(evidence) => Ok(IngestOutcome::Forked(evidence)),
                    None => {
                        tracing::debug!(
                            record = %record.id,
                            sender = %record.sender(),
                            receiver = %record.receiver(),
                            "accepted share record"
                        );
                        Ok(IngestOutcome::Accepted(record.id))
                    }
                }
            }
        }
    }

    /// Check `record` against the stored records either side of it in
    /// `device`'s chain.
    async fn check_neighbours(
        &self,
        device: &Ed25519PublicKey,
        record: &ShareRecord,
        now: i64,
    ) -> Result<Option<ForkEvidence>> {
        let Some(index) = record.index_for(device) else {
            return Ok(None);
        };

        if index > 1 {
            if let Some(predecessor) = self.store.get_record_at(device, index - 1).await? {
                if let Err(e) = check_link(device, &predecessor, record) {
                    if let Some(claimed) = claimed_predecessor(device, record) {
                        tracing::warn!(%device, index, error = %e, "chain continuity broken");
                        return Ok(Some(ForkEvidence::create(
                            &self.keypair,
                            *device,
                            predecessor.id,
                            claimed,
                            now,
                        )?));
                    }
                }
            }
        }

        if let Some(successor) = self.store.get_record_at(device, index + 1).await? {
            if let Err(e) = check_link(device, record, &successor) {
                if let Some(claimed) = claimed_predecessor(device, &successor) {
                    tracing::warn!(%device, index, error = %e, "chain continuity broken");
                    return Ok(Some(ForkEvidence::create(
                        &self.keypair,
                        *device,
                        record.id,
                        claimed,
                        now,
                    )?));
                }
            }
        }

        Ok(None)
    }

    /// Ingest file metadata. Returns true if it was new.
    pub async fn ingest_file_meta(&self, file: &FileMeta) -> Result<bool> {
        if let Err(e) = validate_file_meta(file) {
            tracing::warn!(file = %file.file_hash.to_hex(), error = %e, "rejected file metadata");
            return Err(e.into());
        }
        Ok(self.store.insert_file(file).await?)
    }

    /// Ingest a transfer request. Returns true if it was new.
    pub async fn ingest_transfer_request(&self, request: &TransferRequest) -> Result<bool> {
        if let Err(e) = validate_transfer_request(request) {
            tracing::warn!(requester = %request.requester, error = %e, "rejected transfer request");
            return Err(e.into());
        }
        Ok(self.store.insert_request(request).await?)
    }

    /// Ingest a checkpoint, keeping any witnesses it carries.
    pub async fn ingest_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Err(e) = validate_checkpoint(checkpoint) {
            tracing::warn!(device = %checkpoint.device, error = %e, "rejected checkpoint");
            return Err(e.into());
        }
        self.store.append_checkpoint(checkpoint).await?;
        tracing::debug!(
            device = %checkpoint.device,
            index = checkpoint.chain_index,
            witnesses = checkpoint.witnesses.len(),
            "stored checkpoint"
        );
        Ok(())
    }

    /// Ingest fork evidence from another reporter. Returns true if it was new.
    ///
    /// When both named records are held locally they must actually conflict.
    pub async fn ingest_fork_evidence(&self, evidence: &ForkEvidence) -> Result<bool> {
        if let Err(e) = validate_fork_evidence(evidence) {
            tracing::warn!(reporter = %evidence.reporter, error = %e, "rejected fork evidence");
            return Err(e.into());
        }

        let a = self.store.get_record(&evidence.record_a).await?;
        let b = self.store.get_record(&evidence.record_b).await?;
        if let (Some(a), Some(b)) = (a, b) {
            verify_fork_evidence(evidence, &a, &b)?;
        }

        self.record_fork(evidence, now_millis()).await
    }

    /// Dispatch an incoming envelope. Returns the reply to send, if any.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Result<Option<Envelope>> {
        tracing::trace!(kind = envelope.kind(), "handling envelope");
        match envelope {
            Envelope::FileMeta(file) => {
                self.ingest_file_meta(&file).await?;
                Ok(None)
            }
            Envelope::TransferRequest(request) => {
                self.ingest_transfer_request(&request).await?;
                Ok(None)
            }
            Envelope::ProposedRecord(pending) => {
                let record = self.countersign(pending).await?;
                Ok(Some(Envelope::ShareRecord(record)))
            }
            Envelope::ShareRecord(record) => match self.ingest_record(&record).await? {
                IngestOutcome::Forked(evidence) => Ok(Some(Envelope::ForkEvidence(evidence))),
                IngestOutcome::Accepted(_) | IngestOutcome::Duplicate => Ok(None),
            },
            Envelope::ChainPosition(position) => {
                if let Some(mut peer) = self.store.get_peer(&position.device).await? {
                    peer.last_seen = peer.last_seen.max(now_millis());
                    self.store.upsert_peer(&peer).await?;
                }
                Ok(None)
            }
            Envelope::Checkpoint(checkpoint) => {
                if checkpoint.device == self.public_key() {
                    self.ingest_checkpoint(&checkpoint).await?;
                    Ok(None)
                } else {
                    let witnessed = self.witness_checkpoint(checkpoint).await?;
                    Ok(Some(Envelope::Checkpoint(witnessed)))
                }
            }
            Envelope::ForkEvidence(evidence) => {
                self.ingest_fork_evidence(&evidence).await?;
                Ok(None)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Files and Requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Chunk, hash, sign and store a file this device originates.
    pub async fn create_file_meta(
        &self,
        file_name: &str,
        content: &[u8],
        chunk_size: u64,
    ) -> Result<FileMeta> {
        let file = FileMetaBuilder::from_content(file_name, content, chunk_size)
            .created_at(now_millis())
            .sign(&self.keypair)?;
        validate_file_meta(&file)?;
        self.store.insert_file(&file).await?;
        tracing::debug!(file = %file.file_hash.to_hex(), chunks = file.chunk_hashes.len(), "created file");
        Ok(file)
    }

    /// Sign and store a request for chunks of a file.
    pub async fn create_transfer_request(
        &self,
        file_hash: Blake3Hash,
        chunk_indices: Vec<u32>,
    ) -> Result<TransferRequest> {
        let request =
            TransferRequest::create(&self.keypair, file_hash, chunk_indices, now_millis())?;
        self.store.insert_request(&request).await?;
        Ok(request)
    }

    pub async fn fulfil_request(&self, request_hash: &Blake3Hash) -> Result<()> {
        Ok(self
            .store
            .set_request_status(request_hash, RequestStatus::Fulfilled)
            .await?)
    }

    pub async fn reject_request(&self, request_hash: &Blake3Hash) -> Result<()> {
        Ok(self
            .store
            .set_request_status(request_hash, RequestStatus::Rejected)
            .await?)
    }

    /// Mark the request a record answers as fulfilled, if it is pending here.
    async fn settle_request(&self, record: &ShareRecord) -> Result<()> {
        let request_hash = record.header.request_hash;
        if let Some(stored) = self.store.get_request(&request_hash).await? {
            if stored.status == RequestStatus::Pending {
                self.store
                    .set_request_status(&request_hash, RequestStatus::Fulfilled)
                    .await?;
                tracing::debug!(request = %request_hash.to_hex(), record = %record.id, "request fulfilled");
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checkpoints
    // ─────────────────────────────────────────────────────────────────────────

    /// True if a full epoch has passed since the last own checkpoint.
    pub async fn checkpoint_due(&self, now: i64) -> Result<bool> {
        let last = self.store.latest_checkpoint(&self.public_key()).await?;
        Ok(Checkpoint::is_due(
            last.as_ref(),
            now,
            self.credit.params().epoch_len_ms,
        ))
    }

    /// Snapshot the own chain and balance.
    ///
    /// Confidence is the diversity factor in basis points.
    pub async fn create_checkpoint(&self, now: i64) -> Result<Checkpoint> {
        let _state = self.write.lock().await;
        let position = self.chain_position().await?;
        let report = self.balance(&position.device, self.created_at, now).await?;

        let confidence = (report.diversity_factor * f64::from(MAX_CONFIDENCE_BPS)).round();
        let confidence = confidence.clamp(0.0, f64::from(MAX_CONFIDENCE_BPS)) as u16;

        let checkpoint =
            Checkpoint::create(&self.keypair, &position, report.balance, confidence, now)?;
        self.store.append_checkpoint(&checkpoint).await?;
        tracing::info!(
            index = checkpoint.chain_index,
            balance = checkpoint.raw_balance,
            confidence_bps = checkpoint.confidence_bps,
            "created checkpoint"
        );
        Ok(checkpoint)
    }

    /// Countersign another device's checkpoint and store the result.
    ///
    /// Refused if the device is known to have forked, or if the record held
    /// locally at the checkpoint index is not its claimed head.
    pub async fn witness_checkpoint(&self, mut checkpoint: Checkpoint) -> Result<Checkpoint> {
        validate_checkpoint(&checkpoint)?;
        if self.store.is_forked(&checkpoint.device).await? {
            return Err(LedgerError::PeerForked(checkpoint.device));
        }
        if checkpoint.chain_index > 0 {
            if let Some(local) = self
                .store
                .get_record_at(&checkpoint.device, checkpoint.chain_index)
                .await?
            {
                if local.id != checkpoint.chain_head {
                    return Err(LedgerError::CheckpointMismatch {
                        claimed: checkpoint.chain_head,
                        local: local.id,
                    });
                }
            }
        }

        checkpoint.add_witness(&self.keypair)?;
        self.store.append_checkpoint(&checkpoint).await?;
        tracing::debug!(device = %checkpoint.device, index = checkpoint.chain_index, "witnessed checkpoint");
        Ok(checkpoint)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credit
    // ─────────────────────────────────────────────────────────────────────────

    /// Compute `device`'s credit as of `now`.
    ///
    /// Devices with fork evidence against them get an empty report.
    pub async fn balance(
        &self,
        device: &Ed25519PublicKey,
        created_at: i64,
        now: i64,
    ) -> Result<CreditReport> {
        if self.store.is_forked(device).await? {
            tracing::debug!(%device, "forked device has zero balance");
            return Ok(CreditReport::empty(*device, now));
        }

        let records = self.history(device).await?;
        let window = usize::try_from(self.credit.params().diversity_window).unwrap_or(usize::MAX);
        let diversity = self.store.counterparty_diversity(device, window).await?;

        Ok(self
            .credit
            .compute_with_diversity(device, created_at, &records, &diversity, now))
    }

    /// This device's own credit.
    pub async fn own_balance(&self, now: i64) -> Result<CreditReport> {
        self.balance(&self.public_key(), self.created_at, now).await
    }

    /// The most recent `history_limit` records of `device`'s chain, ascending.
    pub async fn history(&self, device: &Ed25519PublicKey) -> Result<Vec<ShareRecord>> {
        let position = self.store.chain_position(device).await?;
        if position.index == 0 {
            return Ok(Vec::new());
        }
        let limit = self.config.history_limit;
        let from = position
            .index
            .saturating_sub((limit as u64).saturating_sub(1))
            .max(1);
        Ok(self.store.get_records_by_device(device, from, limit).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Peers
    // ─────────────────────────────────────────────────────────────────────────

    /// Cached peers, most recently seen first.
    pub async fn peers(&self, limit: usize) -> Result<Vec<PeerInfo>> {
        Ok(self.store.list_peers(limit).await?)
    }

    /// Fold a stored record into the cached view of each counterparty.
    async fn observe_parties(&self, record: &ShareRecord, now: i64) -> Result<()> {
        let me = self.public_key();
        for party in [*record.sender(), *record.receiver()] {
            if party == me {
                continue;
            }
            let mut peer = self.peer_or_new(&party, now).await?;
            peer.observe(record, now);
            if self.store.is_forked(&party).await? {
                peer.mark_forked();
            }
            self.store.upsert_peer(&peer).await?;
        }
        self.trim_peers().await
    }

    /// Store evidence and flag the device. Returns true if it was new.
    async fn record_fork(&self, evidence: &ForkEvidence, now: i64) -> Result<bool> {
        let added = self.store.append_fork_evidence(evidence).await?;
        if added {
            tracing::warn!(
                device = %evidence.device,
                record_a = %evidence.record_a,
                record_b = %evidence.record_b,
                reporter = %evidence.reporter,
                "stored fork evidence"
            );
        }

        if evidence.device != self.public_key() {
            let mut peer = self.peer_or_new(&evidence.device, now).await?;
            peer.mark_forked();
            self.store.upsert_peer(&peer).await?;
            self.trim_peers().await?;
        }
        Ok(added)
    }

    async fn peer_or_new(&self, pubkey: &Ed25519PublicKey, now: i64) -> Result<PeerInfo> {
        Ok(self
            .store
            .get_peer(pubkey)
            .await?
            .unwrap_or_else(|| PeerInfo::new(*pubkey, self.config.transport_type.as_str(), now)))
    }

    async fn trim_peers(&self) -> Result<()> {
        let evicted = self.store.evict_peers(self.config.peer_cache_limit).await?;
        if evicted > 0 {
            tracing::debug!(evicted, "evicted stale peers");
        }
        Ok(())
    }
}

/// Get current time in milliseconds since Unix epoch.
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
