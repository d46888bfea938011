use super::*;

/// The in-process statistics store. Session entries mirror per-connection
/// counters for the API layer; address totals outlive disconnects. All reads
/// copy out, so nothing here ever blocks a session for long.
pub struct Ledger {
    sessions: Mutex<HashMap<u32, SessionEntry>>,
    addresses: Mutex<HashMap<String, AddressTotals>>,
    blocks: Mutex<Vec<BlockRecord>>,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    address: String,
    worker: String,
    hashrate: HashRate,
    shares_accepted: u64,
    shares_rejected: u64,
    best_difficulty: f64,
    last_share_ms: Option<u64>,
    connected_at_ms: u64,
}

#[derive(Debug, Clone, Default)]
struct AddressTotals {
    shares_accepted: u64,
    shares_rejected: u64,
    best_difficulty: f64,
    last_share_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub address: String,
    pub worker: String,
    pub height: u64,
}

/// Copy-out view of one live session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub address: String,
    pub worker: String,
    pub hashrate: HashRate,
    pub shares_accepted: u64,
    pub shares_rejected: u64,
    pub best_difficulty: f64,
    pub last_share: Option<u64>,
    pub connected_at: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            addresses: Mutex::new(HashMap::new()),
            blocks: Mutex::new(Vec::new()),
        }
    }

    pub fn register_session(
        &self,
        key: u32,
        address: &str,
        worker: &str,
        connected_at_ms: u64,
    ) {
        self.sessions.lock().unwrap().insert(
            key,
            SessionEntry {
                address: address.into(),
                worker: worker.into(),
                hashrate: HashRate::ZERO,
                shares_accepted: 0,
                shares_rejected: 0,
                best_difficulty: 0.0,
                last_share_ms: None,
                connected_at_ms,
            },
        );
    }

    pub fn remove_session(&self, key: u32) {
        self.sessions.lock().unwrap().remove(&key);
    }

    /// Points a live session at a new address and worker, keeping its
    /// counters. A mid-session re-authorize changes identity only.
    pub fn update_session_identity(&self, key: u32, address: &str, worker: &str) {
        if let Some(entry) = self.sessions.lock().unwrap().get_mut(&key) {
            entry.address = address.into();
            entry.worker = worker.into();
        }
    }

    /// Folds an accepted share into the owning session's counters and
    /// hashrate estimate.
    pub fn session_share_accepted(&self, key: u32, share_difficulty: f64, now_ms: u64) {
        let mut sessions = self.sessions.lock().unwrap();

        let Some(entry) = sessions.get_mut(&key) else {
            return;
        };

        let since_ms = entry.last_share_ms.unwrap_or(entry.connected_at_ms);
        let interval_seconds = (now_ms.saturating_sub(since_ms)) as f64 / 1000.0;

        entry.hashrate = entry.hashrate.smooth(share_difficulty, interval_seconds);
        entry.shares_accepted += 1;
        entry.last_share_ms = Some(now_ms);
        entry.best_difficulty = entry.best_difficulty.max(share_difficulty);
    }

    pub fn session_share_rejected(&self, key: u32) {
        if let Some(entry) = self.sessions.lock().unwrap().get_mut(&key) {
            entry.shares_rejected += 1;
        }
    }

    pub fn record_share(
        &self,
        address: &str,
        worker: &str,
        difficulty: f64,
        accepted: bool,
        timestamp_ms: u64,
    ) {
        let mut addresses = self.addresses.lock().unwrap();
        let totals = addresses.entry(address.into()).or_default();

        if accepted {
            totals.shares_accepted += 1;
            totals.last_share_ms = Some(timestamp_ms);
        } else {
            totals.shares_rejected += 1;
        }

        debug!(
            "Share from {address}.{worker}: difficulty {difficulty}, {}",
            if accepted { "accepted" } else { "rejected" }
        );
    }

    pub fn update_best_difficulty(&self, address: &str, difficulty: f64) {
        let mut addresses = self.addresses.lock().unwrap();
        let totals = addresses.entry(address.into()).or_default();
        totals.best_difficulty = totals.best_difficulty.max(difficulty);
    }

    pub fn record_block_found(&self, address: &str, worker: &str, height: u64) {
        info!("Block found at height {height} by {address}.{worker}");
        self.blocks.lock().unwrap().push(BlockRecord {
            address: address.into(),
            worker: worker.into(),
            height,
        });
    }

    pub fn snapshot_sessions(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .map(|entry| SessionSnapshot {
                address: entry.address.clone(),
                worker: entry.worker.clone(),
                hashrate: entry.hashrate,
                shares_accepted: entry.shares_accepted,
                shares_rejected: entry.shares_rejected,
                best_difficulty: entry.best_difficulty,
                last_share: entry.last_share_ms,
                connected_at: entry.connected_at_ms,
            })
            .collect()
    }

    pub fn blocks_found(&self) -> Vec<BlockRecord> {
        self.blocks.lock().unwrap().clone()
    }

    pub fn best_difficulty(&self, address: &str) -> f64 {
        self.addresses
            .lock()
            .unwrap()
            .get(address)
            .map(|totals| totals.best_difficulty)
            .unwrap_or_default()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_register_and_remove() {
        let ledger = Ledger::new();

        ledger.register_session(1, "bc1qexample", "worker1", 1000);
        assert_eq!(ledger.snapshot_sessions().len(), 1);

        ledger.remove_session(1);
        assert!(ledger.snapshot_sessions().is_empty());
    }

    #[test]
    fn accepted_shares_update_counters_and_best() {
        let ledger = Ledger::new();
        ledger.register_session(1, "bc1qexample", "worker1", 0);

        ledger.session_share_accepted(1, 96.0, 10_000);
        ledger.session_share_accepted(1, 64.0, 20_000);

        let snapshot = &ledger.snapshot_sessions()[0];
        assert_eq!(snapshot.shares_accepted, 2);
        assert_eq!(snapshot.shares_rejected, 0);
        assert_eq!(snapshot.best_difficulty, 96.0);
        assert_eq!(snapshot.last_share, Some(20_000));
        assert!(snapshot.hashrate.as_f64() > 0.0);
    }

    #[test]
    fn hashrate_smooths_across_shares() {
        let ledger = Ledger::new();
        ledger.register_session(1, "bc1qexample", "worker1", 0);

        // 10 seconds since connect
        ledger.session_share_accepted(1, 64.0, 10_000);

        let first = ledger.snapshot_sessions()[0].hashrate;
        assert_eq!(
            first,
            HashRate::ZERO.smooth(64.0, 10.0),
            "first share smooths against zero"
        );

        // 10 more seconds
        ledger.session_share_accepted(1, 64.0, 20_000);
        assert_eq!(
            ledger.snapshot_sessions()[0].hashrate,
            first.smooth(64.0, 10.0)
        );
    }

    #[test]
    fn stale_intervals_leave_the_estimate_alone() {
        let ledger = Ledger::new();
        ledger.register_session(1, "bc1qexample", "worker1", 0);

        ledger.session_share_accepted(1, 64.0, 10_000);
        let before = ledger.snapshot_sessions()[0].hashrate;

        // 700 seconds later, outside the window
        ledger.session_share_accepted(1, 64.0, 710_000);
        assert_eq!(ledger.snapshot_sessions()[0].hashrate, before);
        assert_eq!(ledger.snapshot_sessions()[0].shares_accepted, 2);
    }

    #[test]
    fn identity_update_keeps_counters() {
        let ledger = Ledger::new();
        ledger.register_session(1, "bc1qexample", "worker1", 1_000);

        ledger.session_share_accepted(1, 96.0, 10_000);
        ledger.session_share_rejected(1);

        ledger.update_session_identity(1, "bc1qother", "rig2");

        let snapshot = &ledger.snapshot_sessions()[0];
        assert_eq!(snapshot.address, "bc1qother");
        assert_eq!(snapshot.worker, "rig2");
        assert_eq!(snapshot.shares_accepted, 1);
        assert_eq!(snapshot.shares_rejected, 1);
        assert_eq!(snapshot.best_difficulty, 96.0);
        assert_eq!(snapshot.connected_at, 1_000);
    }

    #[test]
    fn identity_update_of_an_unknown_session_is_a_no_op() {
        let ledger = Ledger::new();
        ledger.update_session_identity(9, "bc1qexample", "rig2");
        assert!(ledger.snapshot_sessions().is_empty());
    }

    #[test]
    fn rejected_shares_only_bump_the_reject_counter() {
        let ledger = Ledger::new();
        ledger.register_session(1, "bc1qexample", "worker1", 0);

        ledger.session_share_rejected(1);

        let snapshot = &ledger.snapshot_sessions()[0];
        assert_eq!(snapshot.shares_accepted, 0);
        assert_eq!(snapshot.shares_rejected, 1);
        assert_eq!(snapshot.last_share, None);
    }

    #[test]
    fn address_totals_survive_session_removal() {
        let ledger = Ledger::new();
        ledger.register_session(1, "bc1qexample", "worker1", 0);

        ledger.record_share("bc1qexample", "worker1", 70.0, true, 1000);
        ledger.update_best_difficulty("bc1qexample", 70.0);
        ledger.remove_session(1);

        assert_eq!(ledger.best_difficulty("bc1qexample"), 70.0);
    }

    #[test]
    fn best_difficulty_is_monotonic() {
        let ledger = Ledger::new();

        ledger.update_best_difficulty("bc1qexample", 70.0);
        ledger.update_best_difficulty("bc1qexample", 50.0);

        assert_eq!(ledger.best_difficulty("bc1qexample"), 70.0);
    }

    #[test]
    fn blocks_are_recorded_in_order() {
        let ledger = Ledger::new();

        ledger.record_block_found("bc1qexample", "worker1", 840_000);
        ledger.record_block_found("bc1qother", "default", 840_001);

        let blocks = ledger.blocks_found();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].height, 840_000);
        assert_eq!(blocks[1].worker, "default");
    }
}
