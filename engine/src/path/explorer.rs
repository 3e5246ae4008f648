//! Decision bookkeeping of one split.
//!
//! A [`PathExplorer`] lives for the duration of one `split_merge`. The first
//! fork runs with an empty prefix; at every fresh decision the explorer runs
//! the first option and queues the others as prefixes of pending forks. A
//! pending fork replays its prefix and then explores on its own.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::compare::CompareOutcome;
use crate::error::{EngineError, EngineResult};

/// Which semantics a fork still follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForkRole {
    /// Float and real executions agree so far
    #[default]
    Both,
    /// Only the floating-point execution is on this path
    FloatOnly,
    /// Only the real execution is on this path
    RealOnly,
}

impl ForkRole {
    pub fn is_float_valid(&self) -> bool {
        matches!(self, ForkRole::Both | ForkRole::FloatOnly)
    }

    pub fn is_real_valid(&self) -> bool {
        matches!(self, ForkRole::Both | ForkRole::RealOnly)
    }

    /// Role after taking `option`
    pub fn after(self, option: BranchOption) -> ForkRole {
        match (self, option) {
            (ForkRole::Both, BranchOption::FloatSide(_)) => ForkRole::FloatOnly,
            (ForkRole::Both, BranchOption::RealSide(_)) => ForkRole::RealOnly,
            (role, _) => role,
        }
    }
}

/// One way to resolve a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchOption {
    /// Float and real executions both take the branch
    Consistent(bool),
    /// Only the float execution takes the branch
    FloatSide(bool),
    /// Only the real execution takes the branch
    RealSide(bool),
}

impl BranchOption {
    /// Branch executed under this option
    pub fn taken(&self) -> bool {
        match *self {
            BranchOption::Consistent(b) | BranchOption::FloatSide(b) | BranchOption::RealSide(b) => b,
        }
    }

    /// Options of a fresh decision for a fork in `role`; the first one is
    /// float-valid whenever the role allows it
    pub fn enumerate(role: ForkRole, outcome: &CompareOutcome) -> Vec<BranchOption> {
        let float = outcome.implementation;
        let reals = outcome.real_outcomes();
        match role {
            ForkRole::FloatOnly => vec![BranchOption::FloatSide(float)],
            ForkRole::RealOnly => reals.into_iter().map(BranchOption::RealSide).collect(),
            ForkRole::Both => {
                let mut options = Vec::with_capacity(2);
                if reals.contains(&float) {
                    options.push(BranchOption::Consistent(float));
                } else {
                    options.push(BranchOption::FloatSide(float));
                }
                options.extend(
                    reals
                        .into_iter()
                        .filter(|r| *r != float)
                        .map(BranchOption::RealSide),
                );
                options
            }
        }
    }
}

impl fmt::Display for BranchOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchOption::Consistent(b) => write!(f, "consistent({})", b),
            BranchOption::FloatSide(b) => write!(f, "float({})", b),
            BranchOption::RealSide(b) => write!(f, "real({})", b),
        }
    }
}

/// A decision taken along a fork
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSelection {
    pub site: String,
    pub option: BranchOption,
}

/// Replay prefix, decision log and pending forks of one split
#[derive(Debug, Clone)]
pub struct PathExplorer {
    initial_role: ForkRole,
    role: ForkRole,
    prefix: Vec<BranchSelection>,
    log: Vec<BranchSelection>,
    pending: VecDeque<Vec<BranchSelection>>,
    forks_opened: usize,
}

impl PathExplorer {
    pub fn new(role: ForkRole) -> Self {
        Self {
            initial_role: role,
            role,
            prefix: Vec::new(),
            log: Vec::new(),
            pending: VecDeque::new(),
            forks_opened: 0,
        }
    }

    /// Start a fork that replays `prefix`
    pub fn begin_fork(&mut self, prefix: Vec<BranchSelection>) {
        self.role = self.initial_role;
        self.prefix = prefix;
        self.log.clear();
    }

    /// Prefix of the next pending fork
    pub fn next_pending(&mut self) -> Option<Vec<BranchSelection>> {
        self.pending.pop_front()
    }

    /// No fork left to run
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn role(&self) -> ForkRole {
        self.role
    }

    /// Decisions taken by the current fork so far
    pub fn log(&self) -> &[BranchSelection] {
        &self.log
    }

    /// Forks queued over the life of the split
    pub fn forks_opened(&self) -> usize {
        self.forks_opened
    }

    /// Resolve a decision point for the current fork
    pub fn decide(&mut self, site: &str, outcome: &CompareOutcome) -> EngineResult<BranchOption> {
        let position = self.log.len();
        if let Some(recorded) = self.prefix.get(position) {
            if recorded.site != site {
                return Err(EngineError::ReplayDiverged {
                    expected: recorded.site.clone(),
                    found: site.to_string(),
                });
            }
            let option = recorded.option;
            trace!(site, %option, "replaying decision");
            self.take(site, option);
            return Ok(option);
        }

        let options = BranchOption::enumerate(self.role, outcome);
        let Some((&first, rest)) = options.split_first() else {
            return Err(EngineError::EmptyBranch {
                site: site.to_string(),
            });
        };
        for &option in rest {
            let mut prefix = self.log.clone();
            prefix.push(BranchSelection {
                site: site.to_string(),
                option,
            });
            self.pending.push_back(prefix);
            self.forks_opened += 1;
        }
        trace!(site, option = %first, queued = rest.len(), "fresh decision");
        self.take(site, first);
        Ok(first)
    }

    fn take(&mut self, site: &str, option: BranchOption) {
        self.role = self.role.after(option);
        self.log.push(BranchSelection {
            site: site.to_string(),
            option,
        });
    }
}
