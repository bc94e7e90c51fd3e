//! Single entry point over the governance components.

use crate::config::GovernanceConfig;
use crate::domain::{
    AdmissionController, BootstrapContract, EntryStatus, PermissionLevel, ProgressivePermission,
    Proposal, ProposalStatus, ProposalTarget, ProposalType, UpgradeModeChecker, ValidatorLedger,
    VotingManager, WhitelistManager,
};
use crate::error::{GovernanceError, GovernanceResult};
use crate::metrics;
use crate::service::executor::GovernanceExecutor;
use crate::service::policy::GovernancePolicy;
use ec_01_attestation::{verify_and_extract, MeasurementPolicy, QuoteVerifier};
use enclave_telemetry::log_proposal_event;
use primitive_types::U256;
use shared_types::{Address, Hash, Measurement, NodeId, ZERO_ADDRESS};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Aggregate of whitelist, voting, staking, admission, progressive
/// permission, bootstrap and upgrade mode.
///
/// Whitelist mutations go through proposals; callers never write the
/// table directly.
pub struct GovernanceFacade {
    config: GovernanceConfig,
    whitelist: Arc<WhitelistManager>,
    ledger: Arc<ValidatorLedger>,
    voting: VotingManager,
    executor: GovernanceExecutor,
    admission: AdmissionController,
    progressive: ProgressivePermission,
    bootstrap: Arc<BootstrapContract>,
    upgrade: Arc<UpgradeModeChecker>,
    policy: Arc<GovernancePolicy>,
    verifier: Arc<dyn QuoteVerifier>,
}

impl GovernanceFacade {
    pub fn new(
        config: GovernanceConfig,
        local_mr: Measurement,
        verifier: Arc<dyn QuoteVerifier>,
    ) -> GovernanceResult<Self> {
        config.validate()?;
        let whitelist = Arc::new(WhitelistManager::new());
        let ledger = Arc::new(ValidatorLedger::new(config.staking.clone()));
        let bootstrap = Arc::new(BootstrapContract::new(&config.bootstrap));
        let upgrade = Arc::new(UpgradeModeChecker::new(local_mr, whitelist.clone()));
        let policy = Arc::new(GovernancePolicy::new(whitelist.clone(), bootstrap.clone()));
        let verify_timeout = Duration::from_millis(config.verify_timeout_ms);

        Ok(Self {
            voting: VotingManager::new(config.voting.clone(), ledger.clone()),
            executor: GovernanceExecutor::new(
                whitelist.clone(),
                ledger.clone(),
                upgrade.clone(),
                config.upgrade.upgrade_window_blocks,
            ),
            admission: AdmissionController::new(verifier.clone(), policy.clone(), verify_timeout),
            progressive: ProgressivePermission::new(config.progressive.clone()),
            config,
            whitelist,
            ledger,
            bootstrap,
            upgrade,
            policy,
            verifier,
        })
    }

    fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.config.verify_timeout_ms)
    }

    fn observe<T>(result: GovernanceResult<T>) -> GovernanceResult<T> {
        if let Err(e) = &result {
            metrics::record_error(e.kind());
        }
        result
    }

    // =========================================================================
    // PROPOSALS
    // =========================================================================

    /// File any proposal. The proposer must be an active validator.
    pub fn propose(
        &self,
        proposer: Address,
        proposal_type: ProposalType,
        target: ProposalTarget,
        description: impl Into<String>,
        current_block: u64,
    ) -> GovernanceResult<Hash> {
        let result = self.ledger.require_active(&proposer).and_then(|_| {
            self.voting.create(
                proposal_type,
                proposer,
                target.encode(),
                description.into(),
                current_block,
            )
        });
        if result.is_ok() {
            metrics::record_proposal("created");
        }
        Self::observe(result)
    }

    /// Propose whitelisting a measurement not yet present.
    pub fn propose_add_mr(
        &self,
        proposer: Address,
        mr: Measurement,
        description: impl Into<String>,
        current_block: u64,
    ) -> GovernanceResult<Hash> {
        if self.whitelist.contains(&mr) {
            return Self::observe(Err(GovernanceError::MrAlreadyExists(mr)));
        }
        self.propose(
            proposer,
            ProposalType::AddMrEnclave,
            ProposalTarget::Measurement(mr),
            description,
            current_block,
        )
    }

    pub fn propose_remove_mr(
        &self,
        proposer: Address,
        mr: Measurement,
        description: impl Into<String>,
        current_block: u64,
    ) -> GovernanceResult<Hash> {
        if !self.whitelist.contains(&mr) {
            return Self::observe(Err(GovernanceError::MrNotFound(mr)));
        }
        self.propose(
            proposer,
            ProposalType::RemoveMrEnclave,
            ProposalTarget::Measurement(mr),
            description,
            current_block,
        )
    }

    /// Propose raising a measurement's permission level.
    pub fn propose_upgrade_permission(
        &self,
        proposer: Address,
        mr: Measurement,
        new_level: PermissionLevel,
        description: impl Into<String>,
        current_block: u64,
    ) -> GovernanceResult<Hash> {
        let entry = match self.whitelist.get_entry(&mr) {
            Some(entry) => entry,
            None => return Self::observe(Err(GovernanceError::MrNotFound(mr))),
        };
        if new_level <= entry.permission_level {
            return Self::observe(Err(GovernanceError::InvalidPermissionUpgrade));
        }
        self.propose(
            proposer,
            ProposalType::UpgradePermission,
            ProposalTarget::Permission(mr, new_level),
            description,
            current_block,
        )
    }

    pub fn vote(
        &self,
        id: &Hash,
        voter: Address,
        support: bool,
        signature: &[u8],
        current_block: u64,
    ) -> GovernanceResult<()> {
        let result = self.voting.vote(id, voter, support, signature, current_block);
        if result.is_ok() {
            self.ledger.record_activity(voter, current_block);
            if let Some(chamber) = self.ledger.get_voter_type(&voter) {
                metrics::record_vote(match chamber {
                    crate::domain::Chamber::Core => "core",
                    crate::domain::Chamber::Community => "community",
                });
            }
        }
        Self::observe(result)
    }

    pub fn check_status(&self, id: &Hash, current_block: u64) -> GovernanceResult<ProposalStatus> {
        Self::observe(self.voting.check_status(id, current_block))
    }

    /// Execute a passed proposal through the governance executor.
    pub fn execute(&self, id: &Hash, current_block: u64) -> GovernanceResult<()> {
        let result = self.voting.execute(id, current_block, &self.executor);
        if result.is_ok() {
            metrics::record_proposal("executed");
            self.refresh_gauges();
            self.activate_new_measurements(id, current_block);
        }
        Self::observe(result)
    }

    fn activate_new_measurements(&self, id: &Hash, current_block: u64) {
        let Some(proposal) = self.voting.get_proposal(id) else {
            return;
        };
        if let Ok(ProposalTarget::Measurement(mr)) = proposal.decoded_target() {
            if self.whitelist.is_allowed(&mr) {
                self.progressive.activate_node(mr, current_block);
            }
        }
    }

    pub fn cancel(&self, id: &Hash, caller: Address) -> GovernanceResult<()> {
        let result = self.voting.cancel(id, caller);
        if result.is_ok() {
            metrics::record_proposal("cancelled");
        }
        Self::observe(result)
    }

    pub fn expire_stale(&self, current_block: u64) -> Vec<Hash> {
        let expired = self.voting.expire_stale(current_block);
        for _ in &expired {
            metrics::record_proposal("expired");
        }
        expired
    }

    /// Per-block housekeeping: close due proposals, execute ready ones,
    /// expire stale ones. Returns the ids executed at this block.
    pub fn process_block(&self, current_block: u64) -> Vec<Hash> {
        for (id, status) in self.voting.close_due(current_block) {
            metrics::record_proposal(match status {
                ProposalStatus::Passed => "passed",
                _ => "rejected",
            });
            log_proposal_event!(info, "[ec-02] proposal closed", hex::encode(id), ?status, block = current_block);
        }
        let mut executed = Vec::new();
        for id in self.voting.executable(current_block) {
            match self.execute(&id, current_block) {
                Ok(()) => executed.push(id),
                Err(e) => warn!(
                    proposal_id = %hex::encode(id),
                    kind = e.kind(),
                    "[ec-02] proposal execution failed: {}",
                    e
                ),
            }
        }
        self.expire_stale(current_block);
        self.ledger.accrue_rewards(current_block);
        executed
    }

    pub fn get_proposal(&self, id: &Hash) -> Option<Proposal> {
        self.voting.get_proposal(id)
    }

    pub fn pending_proposals(&self) -> Vec<Proposal> {
        self.voting.proposals_with_status(ProposalStatus::Pending)
    }

    // =========================================================================
    // BOOTSTRAP
    // =========================================================================

    /// Register a founder from its quote. The quote's producer id must be `caller`.
    ///
    /// When this registration fills the window, the whitelist is seeded with
    /// the bootstrap measurement and every founder becomes a core validator.
    pub async fn register_founder(
        &self,
        caller: Address,
        quote: &[u8],
        current_block: u64,
    ) -> GovernanceResult<bool> {
        let result: GovernanceResult<bool> = async {
            if self.bootstrap.is_ended() {
                return Err(GovernanceError::BootstrapEnded);
            }
            let verified =
                verify_and_extract(self.verifier.as_ref(), quote, self.verify_timeout()).await?;
            if verified.report_data.producer != caller {
                return Err(GovernanceError::AdmissionDenied(
                    "quote producer does not match caller".into(),
                ));
            }
            let ended = self.bootstrap.register_founder(
                caller,
                verified.measurement,
                verified.hardware_id,
            )?;
            if ended {
                self.hand_off(current_block)?;
            }
            Ok(ended)
        }
        .await;
        Self::observe(result)
    }

    fn hand_off(&self, current_block: u64) -> GovernanceResult<()> {
        let mr = self.bootstrap.allowed_mr();
        self.whitelist.insert(
            mr,
            EntryStatus::Active,
            PermissionLevel::Full,
            current_block,
            ZERO_ADDRESS,
        );
        for (hardware_id, founder) in self.bootstrap.founder_hardware() {
            self.ledger.add_core_validator(founder, mr, current_block);
            self.admission.register_validator_hardware(founder, hardware_id)?;
        }
        self.progressive.activate_node(mr, current_block);
        self.refresh_gauges();
        info!(
            mr_enclave = %mr,
            founders = self.bootstrap.founders().len(),
            "[ec-02] bootstrap complete, whitelist governance active"
        );
        Ok(())
    }

    pub fn is_bootstrap_ended(&self) -> bool {
        self.bootstrap.is_ended()
    }

    // =========================================================================
    // ADMISSION / VALIDATORS
    // =========================================================================

    pub async fn admit_node(
        &self,
        node_id: NodeId,
        claimed_mr: Measurement,
        quote: &[u8],
        now: u64,
    ) -> GovernanceResult<Address> {
        Self::observe(self.admission.admit(node_id, claimed_mr, quote, now).await)
    }

    pub fn is_validator_active(&self, address: &Address) -> bool {
        self.ledger.is_active(address)
    }

    pub fn stake(&self, address: Address, amount: U256, current_block: u64) -> GovernanceResult<U256> {
        let result = self.ledger.stake(address, amount, current_block);
        self.refresh_gauges();
        Self::observe(result)
    }

    pub fn unstake(&self, address: Address, amount: U256, current_block: u64) -> GovernanceResult<u64> {
        let result = self.ledger.unstake(address, amount, current_block);
        self.refresh_gauges();
        Self::observe(result)
    }

    pub fn withdraw(&self, address: Address, current_block: u64) -> GovernanceResult<U256> {
        Self::observe(self.ledger.withdraw(address, current_block))
    }

    pub fn slash(&self, address: Address, reason: &str) -> GovernanceResult<U256> {
        let result = self.ledger.slash(address, reason);
        self.refresh_gauges();
        Self::observe(result)
    }

    pub fn claim_rewards(&self, address: Address) -> GovernanceResult<U256> {
        Self::observe(self.ledger.claim_rewards(address))
    }

    /// Feed an uptime sample for a measurement's progressive permission.
    pub fn report_uptime(
        &self,
        mr: &Measurement,
        current_block: u64,
        uptime_bps: u64,
    ) -> GovernanceResult<PermissionLevel> {
        Self::observe(self.progressive.check_upgrade(mr, current_block, uptime_bps))
    }

    // =========================================================================
    // UPGRADE MODE
    // =========================================================================

    pub fn check_write(&self) -> GovernanceResult<()> {
        self.upgrade.check_write()
    }

    pub fn should_reject_peer(&self, peer_mr: &Measurement) -> bool {
        self.upgrade.should_reject_peer(peer_mr)
    }

    fn refresh_gauges(&self) {
        metrics::set_whitelist_allowed(self.whitelist.allowed_entries().len());
        metrics::set_active_validators(self.ledger.active_count());
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn whitelist(&self) -> &Arc<WhitelistManager> {
        &self.whitelist
    }

    pub fn ledger(&self) -> &Arc<ValidatorLedger> {
        &self.ledger
    }

    pub fn voting(&self) -> &VotingManager {
        &self.voting
    }

    pub fn executor(&self) -> &GovernanceExecutor {
        &self.executor
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn progressive(&self) -> &ProgressivePermission {
        &self.progressive
    }

    pub fn bootstrap(&self) -> &BootstrapContract {
        &self.bootstrap
    }

    pub fn upgrade(&self) -> &UpgradeModeChecker {
        &self.upgrade
    }

    /// Policy handle for consensus and other admission paths.
    pub fn policy(&self) -> Arc<dyn MeasurementPolicy> {
        self.policy.clone()
    }
}

impl MeasurementPolicy for GovernanceFacade {
    fn is_allowed(&self, measurement: &Measurement) -> bool {
        self.policy.is_allowed(measurement)
    }
}
