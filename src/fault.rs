//! Fault taxonomy (§3 `FaultKind`) shared by Flight Control and Engine
//! Control, plus a bounded fault history: subsystem id + fault type +
//! timestamp, evicting the oldest entry once the history is full.

use heapless::Vec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    ChamberPressureHigh,
    ChamberPressureLow,
    TurbopumpUnderspeed,
    NozzleOverTemp,
    SensorInjected,
    WatchdogTimeout,
    DeadlineMiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warn,
    Minor,
    Major,
    Critical,
    Catastrophic,
}

impl FaultKind {
    /// Fixed severity mapping (§3, §4.G/H).
    pub fn severity(self) -> Severity {
        match self {
            FaultKind::ChamberPressureHigh => Severity::Critical,
            FaultKind::ChamberPressureLow => Severity::Critical,
            FaultKind::TurbopumpUnderspeed => Severity::Major,
            FaultKind::NozzleOverTemp => Severity::Critical,
            FaultKind::SensorInjected => Severity::Minor,
            FaultKind::WatchdogTimeout => Severity::Major,
            FaultKind::DeadlineMiss => Severity::Warn,
        }
    }
}

const MAX_FAULT_HISTORY: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultRecord {
    pub id: u32,
    pub engine_id: Option<u8>,
    pub kind: FaultKind,
    pub mission_time_s: f64,
    pub resolved: bool,
}

#[derive(Debug)]
pub struct FaultManager {
    history: Vec<FaultRecord, MAX_FAULT_HISTORY>,
    next_id: u32,
}

impl FaultManager {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            next_id: 1,
        }
    }

    pub fn record(&mut self, engine_id: Option<u8>, kind: FaultKind, mission_time_s: f64) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        if self.history.is_full() {
            self.history.remove(0);
        }
        let _ = self.history.push(FaultRecord {
            id,
            engine_id,
            kind,
            mission_time_s,
            resolved: false,
        });
        id
    }

    pub fn resolve(&mut self, id: u32) -> bool {
        if let Some(rec) = self.history.iter_mut().find(|r| r.id == id) {
            rec.resolved = true;
            true
        } else {
            false
        }
    }

    pub fn active(&self) -> impl Iterator<Item = &FaultRecord> {
        self.history.iter().filter(|r| !r.resolved)
    }

    pub fn history(&self) -> &[FaultRecord] {
        &self.history
    }
}

impl Default for FaultManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_faults_map_to_critical_severity() {
        assert_eq!(
            FaultKind::ChamberPressureHigh.severity(),
            Severity::Critical
        );
        assert_eq!(FaultKind::NozzleOverTemp.severity(), Severity::Critical);
    }

    #[test]
    fn history_evicts_oldest_when_full() {
        let mut mgr = FaultManager::new();
        for i in 0..(MAX_FAULT_HISTORY + 5) {
            mgr.record(None, FaultKind::SensorInjected, i as f64);
        }
        assert_eq!(mgr.history().len(), MAX_FAULT_HISTORY);
    }

    #[test]
    fn resolve_marks_record_and_excludes_from_active() {
        let mut mgr = FaultManager::new();
        let id = mgr.record(Some(1), FaultKind::TurbopumpUnderspeed, 10.0);
        assert_eq!(mgr.active().count(), 1);
        assert!(mgr.resolve(id));
        assert_eq!(mgr.active().count(), 0);
    }
}
