use crate::summary::HarvestSummary;
use crate::{DedupStore, HarvestSettings, ListingRecord};

/// 1-based session number; also the count of sessions attempted so far.
pub type SessionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Acquiring {
        session: SessionId,
    },
    Fetching {
        session: SessionId,
        descriptor: usize,
    },
    /// Waiting out the request delay before `next`.
    Pacing {
        session: SessionId,
        next: usize,
    },
    BetweenSessions,
    Cooldown,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct RunCounters {
    pub(crate) requests_issued: u32,
    pub(crate) acquisition_failures: u32,
    pub(crate) auth_rejections: u32,
    pub(crate) transient_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HarvestState {
    settings: HarvestSettings,
    catalog_len: usize,
    phase: Phase,
    sessions_attempted: SessionId,
    session_new_records: usize,
    store: DedupStore,
    counters: RunCounters,
    cancelled: bool,
}

impl HarvestState {
    pub fn new(settings: HarvestSettings, catalog_len: usize) -> Self {
        Self {
            settings,
            catalog_len,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog_len
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn sessions_attempted(&self) -> SessionId {
        self.sessions_attempted
    }

    pub fn collected(&self) -> usize {
        self.store.len()
    }

    pub fn records(&self) -> &[ListingRecord] {
        self.store.snapshot()
    }

    pub fn into_records(self) -> Vec<ListingRecord> {
        self.store.into_records()
    }

    /// The loop condition checked before every session.
    pub fn should_start_session(&self) -> bool {
        !self.cancelled
            && self.collected() < self.settings.target_count
            && self.sessions_attempted < self.settings.token_budget
    }

    pub fn view(&self) -> HarvestSummary {
        HarvestSummary {
            sessions_attempted: self.sessions_attempted,
            token_budget: self.settings.token_budget,
            collected: self.collected(),
            target_count: self.settings.target_count,
            requests_issued: self.counters.requests_issued,
            acquisition_failures: self.counters.acquisition_failures,
            auth_rejections: self.counters.auth_rejections,
            transient_failures: self.counters.transient_failures,
            cancelled: self.cancelled,
        }
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn open_session(&mut self) -> SessionId {
        self.sessions_attempted += 1;
        self.session_new_records = 0;
        self.sessions_attempted
    }

    /// Gives back the slot of a session whose acquisition was never run.
    pub(crate) fn abandon_session(&mut self) {
        self.sessions_attempted = self.sessions_attempted.saturating_sub(1);
        self.session_new_records = 0;
    }

    /// Merges a mapped page through the dedup store; returns how many were new.
    pub(crate) fn merge(&mut self, records: Vec<ListingRecord>) -> usize {
        let mut added = 0;
        for record in records {
            if self.store.try_add(record) {
                added += 1;
            }
        }
        self.session_new_records += added;
        added
    }

    pub(crate) fn take_session_new_records(&mut self) -> usize {
        std::mem::take(&mut self.session_new_records)
    }

    pub(crate) fn counters_mut(&mut self) -> &mut RunCounters {
        &mut self.counters
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }
}
