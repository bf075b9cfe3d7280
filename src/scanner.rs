//! Scan driver.
//!
//! Verdicts are computed on a rayon pool, sharing the annotation matcher and
//! loading context read-only. They are then folded into the match set on the
//! calling thread in input order, so the result order does not depend on the
//! number of threads.

use anyhow::Result;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;

use crate::cache::VerdictCache;
use crate::classpath::{self, Candidate, ClasspathEntry};
use crate::error::{ErrorKind, ReadError, ScanError};
use crate::filter::{ClassFilter, Verdict};
use crate::resolve::{ClasspathIndex, TypeHandle};

/// What to do when a matching class cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ResolutionPolicy {
    /// Abort the scan on the first unresolvable match.
    #[default]
    Strict,
    /// Record the failure and keep scanning.
    Lenient,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanConfig {
    /// Worker threads; 0 lets rayon decide.
    pub threads: usize,
    pub policy: ResolutionPolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputError {
    pub origin: String,
    pub candidate: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl InputError {
    fn from_scan_error(origin: &str, err: &ScanError) -> Self {
        Self {
            origin: origin.to_string(),
            candidate: err.candidate().to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    fn unreadable(entry: &ClasspathEntry, err: &anyhow::Error) -> Self {
        Self {
            origin: entry.origin(),
            candidate: String::new(),
            kind: ErrorKind::Unreadable,
            message: format!("{err:#}"),
        }
    }
}

fn walk_failures<'a>(
    entry: &'a ClasspathEntry,
    failures: &'a [String],
) -> impl Iterator<Item = InputError> + 'a {
    failures.iter().map(move |message| {
        warn!("could not walk part of {}: {message}", entry.origin());
        InputError {
            origin: entry.origin(),
            candidate: String::new(),
            kind: ErrorKind::Unreadable,
            message: message.clone(),
        }
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub matches: Vec<TypeHandle>,
    pub errors: Vec<InputError>,
    pub scanned: usize,
    pub cache_hits: usize,
    pub duration_ms: u64,
}

#[derive(Default)]
struct Tally {
    errors: Vec<InputError>,
    scanned: usize,
    cache_hits: usize,
}

struct Outcome {
    verdict: Result<Verdict, ReadError>,
    cache_key: Option<String>,
    cached: bool,
}

pub struct Scanner<'c> {
    config: ScanConfig,
    cache: Option<&'c VerdictCache>,
}

impl<'c> Scanner<'c> {
    pub fn new(config: ScanConfig, cache: Option<&'c VerdictCache>) -> Self {
        Self { config, cache }
    }

    /// Catalog every entry into a loading context. Entries that cannot be
    /// listed, and parts of entries the walk could not reach, are reported.
    pub fn build_index(&self, entries: &[ClasspathEntry]) -> (ClasspathIndex, Vec<InputError>) {
        let mut index = ClasspathIndex::new();
        let mut errors = Vec::new();
        for entry in entries {
            match classpath::catalog(entry) {
                Ok(listing) => {
                    let origin = entry.origin();
                    index.extend(listing.items.iter().map(String::as_str), &origin);
                    errors.extend(walk_failures(entry, &listing.failures));
                }
                Err(err) => {
                    warn!("skipping {}: {err:#}", entry.origin());
                    errors.push(InputError::unreadable(entry, &err));
                }
            }
        }
        debug!("indexed {} classes", index.len());
        (index, errors)
    }

    /// Scan every entry in order, reading and evaluating one entry at a time.
    /// `indexed` holds the errors [`Scanner::build_index`] reported; entries
    /// named there are not reported a second time.
    pub fn scan_classpath(
        &self,
        filter: &mut ClassFilter,
        entries: &[ClasspathEntry],
        indexed: Vec<InputError>,
    ) -> Result<ScanReport> {
        let start = Instant::now();
        let fingerprint = filter.matcher().fingerprint();
        let pool = self.pool()?;
        let reported: HashSet<String> = indexed.iter().map(|e| e.origin.clone()).collect();
        let mut tally = Tally {
            errors: indexed,
            ..Default::default()
        };

        for entry in entries {
            let origin = entry.origin();
            let listing = match classpath::candidates(entry, |name| filter.accept(name)) {
                Ok(listing) => listing,
                Err(err) => {
                    if !reported.contains(&origin) {
                        warn!("skipping {origin}: {err:#}");
                        tally.errors.push(InputError::unreadable(entry, &err));
                    }
                    continue;
                }
            };
            if !reported.contains(&origin) {
                tally.errors.extend(walk_failures(entry, &listing.failures));
            }
            debug!("{origin}: {} candidates", listing.items.len());
            self.fold(filter, &listing.items, &fingerprint, &pool, &mut tally)?;
        }

        Ok(self.finish(filter, tally, start))
    }

    /// Scan candidates already held in memory, as one batch.
    pub fn scan(&self, filter: &mut ClassFilter, candidates: &[Candidate]) -> Result<ScanReport> {
        let start = Instant::now();
        let fingerprint = filter.matcher().fingerprint();
        let pool = self.pool()?;
        let mut tally = Tally::default();
        self.fold(filter, candidates, &fingerprint, &pool, &mut tally)?;
        Ok(self.finish(filter, tally, start))
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()?)
    }

    /// Evaluate a batch in parallel, then insert verdicts in batch order.
    fn fold(
        &self,
        filter: &mut ClassFilter,
        candidates: &[Candidate],
        fingerprint: &str,
        pool: &rayon::ThreadPool,
        tally: &mut Tally,
    ) -> Result<()> {
        let outcomes: Vec<Outcome> = {
            let shared: &ClassFilter = filter;
            pool.install(|| {
                candidates
                    .par_iter()
                    .map(|c| self.evaluate(shared, c, fingerprint))
                    .collect()
            })
        };

        let mut pending: Vec<(String, Verdict)> = Vec::new();
        tally.scanned += candidates.len();

        for (candidate, outcome) in candidates.iter().zip(outcomes) {
            if outcome.cached {
                tally.cache_hits += 1;
            }
            let verdict = match outcome.verdict {
                Ok(verdict) => verdict,
                Err(source) => {
                    let err = ScanError::MalformedRecord {
                        candidate: candidate.name.clone(),
                        source,
                    };
                    warn!("{} ({})", err, candidate.origin);
                    tally.errors.push(InputError::from_scan_error(&candidate.origin, &err));
                    continue;
                }
            };
            if let Some(key) = outcome.cache_key {
                pending.push((key, verdict.clone()));
            }

            if let Err(err) = filter.insert_verdict(&candidate.name, &verdict) {
                match self.config.policy {
                    ResolutionPolicy::Strict => {
                        self.store(&pending);
                        return Err(err.into());
                    }
                    ResolutionPolicy::Lenient => {
                        warn!("{} ({})", err, candidate.origin);
                        tally.errors.push(InputError::from_scan_error(&candidate.origin, &err));
                    }
                }
            }
        }

        self.store(&pending);
        Ok(())
    }

    fn finish(&self, filter: &ClassFilter, tally: Tally, start: Instant) -> ScanReport {
        if let Some(cache) = self.cache
            && let Err(err) = cache.record_scan()
        {
            warn!("failed to update cache metadata: {err:#}");
        }

        let report = ScanReport {
            matches: filter.matches().iter().cloned().collect(),
            errors: tally.errors,
            scanned: tally.scanned,
            cache_hits: tally.cache_hits,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "scanned {} class files: {} matched, {} errors, {} cache hits",
            report.scanned,
            report.matches.len(),
            report.errors.len(),
            report.cache_hits
        );
        report
    }

    fn evaluate(&self, filter: &ClassFilter, candidate: &Candidate, fingerprint: &str) -> Outcome {
        let Some(cache) = self.cache else {
            return Outcome {
                verdict: filter.evaluate(&candidate.bytes),
                cache_key: None,
                cached: false,
            };
        };

        let key = VerdictCache::key(&candidate.bytes, fingerprint);
        match cache.get(&key) {
            Ok(Some(verdict)) => {
                return Outcome {
                    verdict: Ok(verdict),
                    cache_key: None,
                    cached: true,
                };
            }
            Ok(None) => {}
            Err(err) => warn!("cache lookup failed for {}: {err:#}", candidate.name),
        }

        let verdict = filter.evaluate(&candidate.bytes);
        let cache_key = verdict.is_ok().then_some(key);
        Outcome {
            verdict,
            cache_key,
            cached: false,
        }
    }

    fn store(&self, pending: &[(String, Verdict)]) {
        let Some(cache) = self.cache else {
            return;
        };
        match cache.put_many(pending) {
            Ok(n) => debug!("cached {n} verdicts"),
            Err(err) => warn!("failed to write verdict cache: {err:#}"),
        }
    }
}
