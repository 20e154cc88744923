//! Scripted user journey against the live service.
//!
//! Each virtual actor repeatedly runs create → update → delete → list, the
//! same four operations the directory performs, and the run is judged
//! against latency and error-rate thresholds.
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::api::{NewUser, UserUpdate, UsersApi};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Update,
    Delete,
    List,
}

impl Op {
    pub const ALL: [Op; 4] = [Op::Create, Op::Update, Op::Delete, Op::List];
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Op::Create => "create",
            Op::Update => "update",
            Op::Delete => "delete",
            Op::List => "list",
        })
    }
}

#[derive(Clone, Debug)]
pub struct JourneyConfig {
    pub actors: usize,
    pub iterations: usize,
    /// Pause after each step, mimicking operator think time.
    pub think_time: Duration,
    /// 95th percentile request latency must stay below this.
    pub p95_budget: Duration,
    /// Fraction of failed requests tolerated.
    pub max_failure_rate: f64,
    /// Fraction of checks that must pass.
    pub min_check_rate: f64,
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            actors: 1,
            iterations: 1,
            think_time: Duration::ZERO,
            p95_budget: Duration::from_millis(500),
            max_failure_rate: 0.01,
            min_check_rate: 0.99,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Sample {
    pub op: Op,
    pub latency: Duration,
    pub ok: bool,
}

#[derive(Clone, Debug)]
pub struct Check {
    pub name: &'static str,
    pub passed: bool,
}

/// Requests of one kind within a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepSummary {
    pub op: Op,
    pub count: usize,
    pub failures: usize,
    pub p95: Duration,
}

/// Outcomes of one named check within a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckSummary {
    pub name: &'static str,
    pub passed: usize,
    pub total: usize,
}

fn p95_of(mut lat: Vec<Duration>) -> Duration {
    if lat.is_empty() {
        return Duration::ZERO;
    }
    lat.sort();
    let idx = ((lat.len() as f64) * 0.95).ceil() as usize;
    lat[idx.saturating_sub(1).min(lat.len() - 1)]
}

#[derive(Clone, Debug, Default)]
pub struct JourneyReport {
    pub samples: Vec<Sample>,
    pub checks: Vec<Check>,
}

impl JourneyReport {
    pub fn p95(&self) -> Duration {
        p95_of(self.samples.iter().map(|s| s.latency).collect())
    }

    /// Per-operation counts, failures and p95, skipping operations never attempted.
    pub fn steps(&self) -> Vec<StepSummary> {
        Op::ALL
            .iter()
            .filter_map(|&op| {
                let of_op: Vec<&Sample> = self.samples.iter().filter(|s| s.op == op).collect();
                if of_op.is_empty() {
                    return None;
                }
                Some(StepSummary {
                    op,
                    count: of_op.len(),
                    failures: of_op.iter().filter(|s| !s.ok).count(),
                    p95: p95_of(of_op.iter().map(|s| s.latency).collect()),
                })
            })
            .collect()
    }

    /// Pass counts per check name, in the order checks first appear.
    pub fn check_summaries(&self) -> Vec<CheckSummary> {
        let mut out: Vec<CheckSummary> = Vec::new();
        for c in &self.checks {
            match out.iter_mut().find(|s| s.name == c.name) {
                Some(s) => {
                    s.total += 1;
                    s.passed += usize::from(c.passed);
                }
                None => out.push(CheckSummary { name: c.name, passed: usize::from(c.passed), total: 1 }),
            }
        }
        out
    }

    pub fn failure_rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().filter(|s| !s.ok).count() as f64 / self.samples.len() as f64
    }

    pub fn check_rate(&self) -> f64 {
        if self.checks.is_empty() {
            return 1.0;
        }
        self.checks.iter().filter(|c| c.passed).count() as f64 / self.checks.len() as f64
    }

    /// Names of thresholds the run violated; empty means the run passed.
    pub fn violations(&self, cfg: &JourneyConfig) -> Vec<String> {
        let mut out = Vec::new();
        if self.p95() >= cfg.p95_budget {
            out.push(format!("p95 latency {:?} >= {:?}", self.p95(), cfg.p95_budget));
        }
        if self.failure_rate() >= cfg.max_failure_rate {
            out.push(format!("failure rate {:.2}% >= {:.2}%", self.failure_rate() * 100.0, cfg.max_failure_rate * 100.0));
        }
        if self.check_rate() <= cfg.min_check_rate {
            out.push(format!("check rate {:.2}% <= {:.2}%", self.check_rate() * 100.0, cfg.min_check_rate * 100.0));
        }
        out
    }

    fn merge(&mut self, other: JourneyReport) {
        self.samples.extend(other.samples);
        self.checks.extend(other.checks);
    }
}

/// Run `cfg.actors` concurrent actors, each doing `cfg.iterations` journeys.
///
/// `run_tag` keeps emails unique across runs against the same service.
pub async fn run(api: Arc<dyn UsersApi>, cfg: &JourneyConfig, run_tag: &str) -> JourneyReport {
    let mut set = JoinSet::new();
    for actor in 1..=cfg.actors {
        let api = api.clone();
        let cfg = cfg.clone();
        let tag = run_tag.to_string();
        set.spawn(async move {
            let mut report = JourneyReport::default();
            for iter in 0..cfg.iterations {
                report.merge(iteration(api.as_ref(), actor, iter, &tag, cfg.think_time).await);
            }
            report
        });
    }
    let mut total = JourneyReport::default();
    while let Some(res) = set.join_next().await {
        match res {
            Ok(report) => total.merge(report),
            Err(e) => tracing::warn!(error = %e, "journey actor panicked"),
        }
    }
    total
}

async fn iteration(api: &dyn UsersApi, actor: usize, iter: usize, tag: &str, think: Duration) -> JourneyReport {
    let mut r = JourneyReport::default();
    let email = format!("user.vu{actor}.iter{iter}.{tag}@test.com");
    let new_user = NewUser {
        name: format!("Test User VU={actor}"),
        email: email.clone(),
        password: "a_strong_password_123".to_string(),
    };

    let started = Instant::now();
    let created = api.create(&new_user).await;
    r.samples.push(Sample { op: Op::Create, latency: started.elapsed(), ok: created.is_ok() });
    r.checks.push(Check { name: "create succeeded", passed: created.is_ok() });
    pause(think).await;

    if let Ok(user) = created {
        r.checks.push(Check { name: "create returned id", passed: user.id > 0 });

        let changes = UserUpdate { name: format!("Updated User VU={actor}"), email };
        let started = Instant::now();
        let updated = api.update(user.id, &changes).await;
        r.samples.push(Sample { op: Op::Update, latency: started.elapsed(), ok: updated.is_ok() });
        r.checks.push(Check { name: "update succeeded", passed: updated.is_ok() });
        r.checks.push(Check {
            name: "update changed name",
            passed: updated.as_ref().is_ok_and(|u| u.name == changes.name),
        });
        pause(think).await;

        let started = Instant::now();
        let deleted = api.delete(user.id).await;
        r.samples.push(Sample { op: Op::Delete, latency: started.elapsed(), ok: deleted.is_ok() });
        r.checks.push(Check { name: "delete succeeded", passed: deleted.is_ok() });
        pause(think).await;
    }

    let started = Instant::now();
    let listed = api.list().await;
    r.samples.push(Sample { op: Op::List, latency: started.elapsed(), ok: listed.is_ok() });
    r.checks.push(Check { name: "list succeeded", passed: listed.is_ok() });
    r
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}
