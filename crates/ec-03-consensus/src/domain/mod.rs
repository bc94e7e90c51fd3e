//! Pure consensus logic and the in-memory tables it owns.

pub mod candidates;
pub mod extra;
pub mod fork_choice;
pub mod multi_producer;
pub mod penalty;
pub mod quality;
pub mod reputation;
pub mod reward;
pub mod scheduler;
pub mod uptime;

pub use candidates::{BlockCandidate, CandidateCollector, SubmitOutcome};
pub use extra::{decode_header_extra, seal_hash, ExtraData, MAX_EXTRA_LEN, MIN_EXTRA_LEN, SIGNATURE_LEN};
pub use fork_choice::{compare, compare_headers, fork_choice_ordering, header_ordering, select_best};
pub use multi_producer::{
    validate_reward_distribution, CandidateReward, MultiProducerRewards, RewardDistribution,
};
pub use penalty::{PenaltyKind, PenaltyManager, PenaltyRecord, ProducerPenaltyTracker, ProducerVerdict};
pub use quality::{quality_bonus, reward_multiplier_bps, QualityScore, QualityScorer, QualityTier};
pub use reputation::{ReputationManager, ReputationRecord};
pub use reward::{RewardBreakdown, RewardEngine};
pub use scheduler::{OnDemandScheduler, ProduceDecision};
pub use uptime::{NetworkTotals, ResponseStats, UptimeAggregator, UptimeSnapshot};
